// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Agent, Provider, and Tool Ports
//!
//! This module defines the capability ports through which the orchestrator
//! core talks to external collaborators, and the input/result value types
//! that flow across those boundaries.
//!
//! ## Overview
//!
//! - **LlmProvider**: one blocking-ish generation call per prompt. No
//!   streaming; retries across calls belong to the stage executor, not the
//!   provider.
//! - **Agent**: the unit the stage executor invokes once per attempt.
//!   Agents may internally use a provider, tools, or nothing at all.
//! - **Tool**: a named capability an agent can call. Tools report failures
//!   as structured results, never as errors, so a denied file read cannot
//!   abort an attempt by itself.
//! - **AgentProvider**: the factory port the driver uses to obtain a fresh
//!   agent for every attempt of a stage.
//!
//! ## Thread Safety
//!
//! All ports are `Send + Sync`; implementations are shared across stages
//! behind `Arc` and must tolerate concurrent workflow executions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::entities::stage_definition::AgentDefinition;
use crate::error::WorkflowError;

/// Input handed to an agent or tool invocation.
///
/// `content` carries the rendered prompt (for agents) or the operand (for
/// tools, e.g. a relative file path). `metadata` is an opaque JSON value
/// for implementation-specific hints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionInput {
    pub content: String,
    pub metadata: Option<Value>,
}

impl ExecutionInput {
    /// Creates an input carrying only content.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: None,
        }
    }

    /// Creates an input with attached metadata.
    pub fn with_metadata(content: impl Into<String>, metadata: Value) -> Self {
        Self {
            content: content.into(),
            metadata: Some(metadata),
        }
    }
}

/// Outcome of an agent or tool invocation.
///
/// A failed invocation is data, not an exception: `success` is false and
/// `error` carries the reason. The stage executor decides whether a failed
/// result is retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub metadata: Option<Value>,
}

impl ExecutionResult {
    /// Creates a successful result
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
            metadata: None,
        }
    }

    /// Creates a successful result with metadata
    pub fn success_with_metadata(output: impl Into<String>, metadata: Value) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
            metadata: Some(metadata),
        }
    }

    /// Creates a failed result
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
            metadata: None,
        }
    }

    /// Creates a failed result with metadata
    pub fn failure_with_metadata(error: impl Into<String>, metadata: Value) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
            metadata: Some(metadata),
        }
    }
}

/// Port for language-model text generation.
///
/// A provider accepts a prompt and returns generated text or a typed
/// provider error. Providers perform no retry of their own.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stable name used in logs and agent identifiers
    fn provider_name(&self) -> &str;

    /// Generates a completion for the prompt
    async fn generate(&self, prompt: &str) -> Result<String, WorkflowError>;
}

/// Port for an executable agent.
///
/// The stage executor calls `execute` exactly once per attempt. An agent
/// may signal failure either by returning `Err` or by returning an
/// `ExecutionResult` with `success == false`; both count against the
/// stage's retry budget.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Identifier recorded in the stage result for the attempt
    fn agent_id(&self) -> &str;

    /// Executes the agent against the rendered prompt
    async fn execute(&self, input: ExecutionInput) -> Result<ExecutionResult, WorkflowError>;
}

/// Port for a named tool an agent can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Stable tool name used for registry lookup
    fn tool_name(&self) -> &str;

    /// Human-readable description surfaced to planning agents
    fn tool_description(&self) -> &str;

    /// Runs the tool. Failures are reported in the result, never raised.
    async fn run_tool(&self, input: ExecutionInput) -> ExecutionResult;
}

/// Factory port producing a fresh agent for each stage attempt.
///
/// `attempt` is 1-based. A factory error counts as an attempt failure in
/// the retry loop of the stage executor.
pub trait AgentProvider: Send + Sync {
    /// Creates the agent used for one attempt of a stage
    fn create_agent(&self, definition: &AgentDefinition, attempt: u32) -> Result<Arc<dyn Agent>, WorkflowError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_constructors() {
        let ok = ExecutionResult::success("done");
        assert!(ok.success);
        assert_eq!(ok.output, "done");
        assert!(ok.error.is_none());
        assert!(ok.metadata.is_none());

        let ok = ExecutionResult::success_with_metadata("done", serde_json::json!({"tokens": 42}));
        assert!(ok.success);
        assert_eq!(ok.metadata.unwrap()["tokens"], 42);
    }

    #[test]
    fn test_failure_constructors() {
        let err = ExecutionResult::failure("model unavailable");
        assert!(!err.success);
        assert!(err.output.is_empty());
        assert_eq!(err.error.as_deref(), Some("model unavailable"));

        let err = ExecutionResult::failure_with_metadata("denied", serde_json::json!({"code": 403}));
        assert!(!err.success);
        assert_eq!(err.metadata.unwrap()["code"], 403);
    }

    #[test]
    fn test_input_constructors() {
        let input = ExecutionInput::new("read notes.txt");
        assert!(input.metadata.is_none());

        let input = ExecutionInput::with_metadata("read notes.txt", serde_json::json!({"caller": "planner"}));
        assert_eq!(input.metadata.unwrap()["caller"], "planner");
    }
}
