// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Workflow Domain
//!
//! The workflow domain represents the core business logic and rules of the
//! agent workflow orchestrator. It is completely independent of external
//! concerns like LLM clients, file systems, schedulers, or metric sinks.
//!
//! ## Module Structure
//!
//! - [`entities`]: objects with identity and lifecycle within one
//!   execution (`StageDefinition`, `ExecutionContext`, `StageResult`,
//!   `WorkflowResult`)
//! - [`value_objects`]: immutable self-validating values (`StageName`,
//!   `ExecutionId`)
//! - [`services`]: capability ports and stateless helpers (`Agent`,
//!   `LlmProvider`, `Tool`, `ResultValidator`, RFC3339 serde)
//! - [`repositories`]: infrastructure ports (`StageExecutor`,
//!   `AgentMemoryRepository`)
//! - [`error`]: the domain error model (`WorkflowError`)
//!
//! ## Business Rules and Invariants
//!
//! ### Stage Rules
//! - Stage names are non-blank and unique within a workflow
//! - A stage definition never mutates during execution
//! - A stage produces exactly one `StageResult` per execution
//! - A retry budget of 0 means the stage makes no attempts at all
//!
//! ### Context Rules
//! - Keys `<stage>.result` and `<stage>.output` are reserved for the driver
//! - Stage *k+1* observes every context write of stages 1..k
//! - Concurrent executions never share a context
//!
//! ### Failure Rules
//! - Attempt and validation failures stay inside the retry loop
//! - Exhausted stages surface as data, not errors
//! - Only precondition violations and fatal resource errors raise

pub mod entities;
pub mod error;
pub mod repositories;
pub mod services;
pub mod value_objects;

pub use entities::{AgentDefinition, ExecutionContext, StageDefinition, StageDefinitionBuilder, StageResult, WorkflowResult};
pub use error::WorkflowError;
pub use repositories::{AgentFactory, AgentMemoryRepository, ConversationTrace, PromptFactory, StageExecutor};
pub use services::{Agent, AgentProvider, ExecutionInput, ExecutionResult, LlmProvider, ResultValidator, Tool, ValidationResult};
pub use value_objects::{ExecutionId, StageName};

/// Default retry budget for stages that do not configure their own.
pub use entities::stage_definition::DEFAULT_MAX_RETRIES;
