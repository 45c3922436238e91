// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Logging Infrastructure
//!
//! Tracing-based structured logging setup for the orchestrator.

pub mod observability;

pub use observability::{init_observability, ObservabilityConfig};
