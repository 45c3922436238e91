// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Application Services

pub mod workflow_service;

pub use workflow_service::{FailurePolicy, WorkflowService};
