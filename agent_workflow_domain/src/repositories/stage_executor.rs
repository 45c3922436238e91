// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stage Executor Port
//!
//! This module defines the contract for the engine that drives one stage:
//! the attempt loop, validator demotion, and terminal result production.
//!
//! ## Execution Model
//!
//! For each attempt, the executor obtains a fresh agent from the agent
//! factory, renders the prompt through the prompt factory (both receive
//! the 1-based attempt number so retry prompts can carry feedback), and
//! invokes the agent. A validator rejection or any attempt-level failure
//! consumes one unit of the stage's retry budget.
//!
//! ## Failure Semantics
//!
//! The executor never raises for anything that happens *inside* an
//! attempt: agent errors, provider errors, prompt rendering failures, and
//! validator rejections are all folded into the loop. An exhausted stage
//! surfaces as a failing [`StageResult`]. The `Err` channel is reserved
//! for caller mistakes detected before any attempt runs.
//!
//! ## Thread Safety
//!
//! Implementations must be `Send + Sync`: one executor instance serves
//! concurrent workflow executions, each with its own context.

use async_trait::async_trait;

use crate::entities::{ExecutionContext, StageDefinition, StageResult};
use crate::error::WorkflowError;
use crate::services::agent::Agent;
use std::sync::Arc;

/// Factory producing a fresh agent for the given 1-based attempt.
///
/// A factory error counts as an attempt failure, not an input error.
pub type AgentFactory = dyn Fn(u32) -> Result<Arc<dyn Agent>, WorkflowError> + Send + Sync;

/// Factory rendering the stage prompt for the given attempt against the
/// live execution context.
pub type PromptFactory = dyn Fn(u32, &ExecutionContext) -> Result<String, WorkflowError> + Send + Sync;

/// Engine that executes a single stage to a terminal [`StageResult`].
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// Runs the stage's attempt loop.
    ///
    /// # Returns
    ///
    /// * `Ok(StageResult)` with `success == true` when some attempt passed
    ///   (including its validator, if any)
    /// * `Ok(StageResult)` with `success == false` when the retry budget
    ///   was exhausted, or when `max_retries` is 0 and no attempt ran
    /// * `Err(WorkflowError)` only for precondition violations
    async fn execute_stage(
        &self,
        stage: &StageDefinition,
        agent_factory: &AgentFactory,
        prompt_factory: &PromptFactory,
        context: &ExecutionContext,
    ) -> Result<StageResult, WorkflowError>;
}
