// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Agent Workflow Orchestrator
//!
//! A multi-agent workflow orchestrator that executes a directed sequence
//! of stages, where each stage invokes a language-model (or tool-using)
//! agent with a templated prompt, validates the agent's output, retries
//! on failure, and threads outputs forward as context for subsequent
//! stages.
//!
//! ## Architecture
//!
//! The workspace follows a domain/implementation split:
//!
//! - `agent-workflow-domain` holds entities, value objects, the error
//!   model, and the capability ports (`Agent`, `LlmProvider`, `Tool`,
//!   `StageExecutor`, `AgentMemoryRepository`)
//! - this crate provides the [`application`] driver and the
//!   [`infrastructure`] behind the ports
//!
//! ## Subsystems
//!
//! - **Stage execution** ([`infrastructure::runtime::stage_executor`],
//!   [`application::services::workflow_service`]): per-stage retry and
//!   validation, sequential chaining with context propagation
//! - **Prompt templates** ([`infrastructure::templates`]): a mini
//!   expression language with filters, conditionals, and loops, backed by
//!   an LRU + TTL compiled-template cache
//! - **Memory management** ([`infrastructure::runtime::memory_manager`]):
//!   heap-pressure state machine, cleanup callbacks, weak and expirable
//!   resource tracking
//! - **Path security** ([`infrastructure::security`]): the defensive
//!   screen in front of the sandboxed file-read tool
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use agent_workflow::application::services::WorkflowService;
//! use agent_workflow::infrastructure::runtime::RetryingStageExecutor;
//! use agent_workflow::infrastructure::templates::TemplateEngine;
//! use agent_workflow_domain::{AgentDefinition, StageDefinition};
//!
//! # async fn example(provider: Arc<dyn agent_workflow_domain::AgentProvider>) {
//! let service = WorkflowService::new(
//!     Arc::new(RetryingStageExecutor::new()),
//!     Arc::new(TemplateEngine::default()),
//!     provider,
//! );
//!
//! let stages = vec![StageDefinition::builder("draft")
//!     .agent(AgentDefinition::new("writer", "drafts text").unwrap())
//!     .prompt_template("Write about {{topic}}")
//!     .build()
//!     .unwrap()];
//!
//! let mut vars = HashMap::new();
//! vars.insert("topic".to_string(), serde_json::json!("cats"));
//!
//! let result = service.execute_workflow(&stages, vars).await.unwrap();
//! assert!(result.success);
//! # }
//! ```

pub mod application;
pub mod infrastructure;

pub use application::services::{FailurePolicy, WorkflowService};
pub use infrastructure::runtime::RetryingStageExecutor;
pub use infrastructure::security::{PathSecurityConfig, PathSecurityValidator, PathValidation};
pub use infrastructure::templates::{TemplateEngine, TemplateError};
pub use infrastructure::tools::FileReadTool;
