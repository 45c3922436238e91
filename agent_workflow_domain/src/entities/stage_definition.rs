// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stage Definition Entity
//!
//! The immutable description of one unit of agent work inside a workflow:
//! which agent runs, with which prompt template, how many attempts it is
//! allowed, and how its output is judged.
//!
//! ## Overview
//!
//! A stage definition carries:
//!
//! - **Identity**: a validated, workflow-unique [`StageName`]
//! - **Agent Descriptor**: name, description, optional provider handle and
//!   system prompt, resolved to a live agent per attempt through the
//!   `AgentProvider` port
//! - **Prompt Template**: a non-blank template rendered against the live
//!   execution context before every attempt
//! - **Retry Budget**: `max_retries`, where 0 means *no attempts at all*
//!   (the stage fails synthetically without ever invoking the agent) and 1
//!   means exactly one attempt with no retry
//! - **Task Metadata**: opaque JSON values handed to the agent factory
//! - **Validator**: an optional [`ResultValidator`] whose rejection demotes
//!   an otherwise successful attempt to a retry
//!
//! ## Immutability
//!
//! Definitions are constructed through [`StageDefinitionBuilder`], validated
//! at `build`, and never mutate once a workflow starts. The driver clones
//! cheaply: provider handles and validators are shared behind `Arc`.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::WorkflowError;
use crate::services::agent::LlmProvider;
use crate::services::validation::ResultValidator;
use crate::value_objects::StageName;

/// Fallback retry budget applied when a stage does not set its own.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Descriptor of the agent a stage runs.
///
/// This is configuration, not a live agent: the `AgentProvider` port turns
/// it into an executable agent once per attempt.
#[derive(Clone)]
pub struct AgentDefinition {
    name: String,
    description: String,
    provider: Option<Arc<dyn LlmProvider>>,
    system_prompt: Option<String>,
}

impl AgentDefinition {
    /// Creates an agent descriptor with a non-blank name.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Result<Self, WorkflowError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(WorkflowError::invalid_config("Agent name cannot be blank"));
        }
        Ok(Self {
            name,
            description: description.into(),
            provider: None,
            system_prompt: None,
        })
    }

    /// Attaches the LLM provider this agent should use
    pub fn with_provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Attaches a system prompt prepended by the agent implementation
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Agent name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Optional provider handle
    pub fn provider(&self) -> Option<&Arc<dyn LlmProvider>> {
        self.provider.as_ref()
    }

    /// Optional system prompt
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }
}

impl fmt::Debug for AgentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("provider", &self.provider.as_ref().map(|p| p.provider_name()))
            .field("system_prompt", &self.system_prompt)
            .finish()
    }
}

/// Immutable definition of one workflow stage.
#[derive(Clone)]
pub struct StageDefinition {
    name: StageName,
    agent: AgentDefinition,
    prompt_template: String,
    max_retries: u32,
    task_metadata: HashMap<String, Value>,
    validator: Option<Arc<dyn ResultValidator>>,
}

impl StageDefinition {
    /// Starts building a stage definition with the given name.
    pub fn builder(name: impl Into<String>) -> StageDefinitionBuilder {
        StageDefinitionBuilder::new(name)
    }

    /// Stage name, unique within the workflow
    pub fn name(&self) -> &StageName {
        &self.name
    }

    /// Agent descriptor for this stage
    pub fn agent(&self) -> &AgentDefinition {
        &self.agent
    }

    /// Prompt template rendered before every attempt
    pub fn prompt_template(&self) -> &str {
        &self.prompt_template
    }

    /// Retry budget. 0 means the stage never attempts; 1 means one attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Opaque task metadata handed to the agent factory
    pub fn task_metadata(&self) -> &HashMap<String, Value> {
        &self.task_metadata
    }

    /// Optional output validator
    pub fn validator(&self) -> Option<&Arc<dyn ResultValidator>> {
        self.validator.as_ref()
    }
}

impl fmt::Debug for StageDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageDefinition")
            .field("name", &self.name)
            .field("agent", &self.agent)
            .field("prompt_template", &self.prompt_template)
            .field("max_retries", &self.max_retries)
            .field("task_metadata", &self.task_metadata)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

/// Builder returning a validated [`StageDefinition`].
pub struct StageDefinitionBuilder {
    name: String,
    agent: Option<AgentDefinition>,
    prompt_template: Option<String>,
    max_retries: u32,
    task_metadata: HashMap<String, Value>,
    validator: Option<Arc<dyn ResultValidator>>,
}

impl StageDefinitionBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agent: None,
            prompt_template: None,
            max_retries: DEFAULT_MAX_RETRIES,
            task_metadata: HashMap::new(),
            validator: None,
        }
    }

    /// Sets the agent descriptor (required)
    pub fn agent(mut self, agent: AgentDefinition) -> Self {
        self.agent = Some(agent);
        self
    }

    /// Sets the prompt template (required, non-blank)
    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = Some(template.into());
        self
    }

    /// Sets the retry budget.
    ///
    /// Note the zero case: `max_retries(0)` configures a stage that makes
    /// *no attempts at all* and fails synthetically without invoking its
    /// agent. Use `max_retries(1)` for "one attempt, no retries".
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Adds one metadata entry
    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.task_metadata.insert(key.into(), value);
        self
    }

    /// Replaces the whole metadata map
    pub fn task_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.task_metadata = metadata;
        self
    }

    /// Sets the output validator
    pub fn validator(mut self, validator: Arc<dyn ResultValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Validates and builds the definition.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::InvalidConfiguration` when the name is
    /// blank, the agent descriptor is missing, or the prompt template is
    /// missing or blank.
    pub fn build(self) -> Result<StageDefinition, WorkflowError> {
        let name = StageName::new(self.name)?;

        let agent = self
            .agent
            .ok_or_else(|| WorkflowError::invalid_config(format!("Stage '{}' has no agent descriptor", name)))?;

        let prompt_template = self
            .prompt_template
            .ok_or_else(|| WorkflowError::invalid_config(format!("Stage '{}' has no prompt template", name)))?;
        if prompt_template.trim().is_empty() {
            return Err(WorkflowError::invalid_config(format!(
                "Stage '{}' has a blank prompt template",
                name
            )));
        }

        Ok(StageDefinition {
            name,
            agent,
            prompt_template,
            max_retries: self.max_retries,
            task_metadata: self.task_metadata,
            validator: self.validator,
        })
    }
}
