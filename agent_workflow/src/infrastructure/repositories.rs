// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Repository Implementations
//!
//! Concrete implementations of the domain persistence ports. The
//! relational trace store remains an external collaborator; the in-memory
//! implementation here backs tests and single-process deployments.

pub mod in_memory_agent_memory;

pub use in_memory_agent_memory::InMemoryAgentMemoryRepository;
