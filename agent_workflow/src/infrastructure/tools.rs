// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tool Infrastructure
//!
//! Concrete implementations of the domain `Tool` port. Tools report every
//! failure, including security rejections, as a structured
//! `ExecutionResult` so agents can observe and react without aborting the
//! attempt.

pub mod file_read;

pub use file_read::{FileReadTool, FileReadToolConfig};
