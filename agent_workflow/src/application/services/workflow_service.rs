// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Workflow Service
//!
//! The sequential workflow driver. One call to
//! [`WorkflowService::execute_workflow`] runs an ordered stage list to a
//! [`WorkflowResult`]:
//!
//! 1. Inputs are validated synchronously: a non-empty stage list with
//!    unique names. Violations raise before any stage runs.
//! 2. A fresh [`ExecutionContext`] is seeded with the caller's initial
//!    variables; no state is shared between executions, so one service
//!    instance serves concurrent workflows.
//! 3. Stages run strictly in order through the [`StageExecutor`] port.
//!    The prompt factory renders the stage template against the live
//!    context (exposing the attempt number as `attempt`); the agent
//!    factory resolves the stage's agent descriptor once per attempt.
//! 4. After every stage, success or failure, the driver writes
//!    `<stage>.result` and `<stage>.output` into the context so
//!    downstream stages observe the outcome.
//! 5. A failing stage either aborts the workflow (default) or lets it
//!    continue, per [`FailurePolicy`].
//!
//! Cancellation is honoured at stage boundaries: a cancelled token
//! finalises the result with the stages completed so far and a
//! "cancelled" error. Cancellation mid-agent-call is the agent's
//! responsibility. With an attached `ShutdownCoordinator`, every
//! execution is additionally registered for draining, so a graceful
//! shutdown can wait until in-flight workflows have finalised.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

use agent_workflow_domain::{
    AgentProvider, ExecutionContext, StageDefinition, StageDefinitionBuilder, StageExecutor, WorkflowError,
    WorkflowResult,
};

use crate::infrastructure::metrics::MetricsService;
use crate::infrastructure::runtime::shutdown::{CancellationToken, ShutdownCoordinator};
use crate::infrastructure::templates::TemplateEngine;

/// What the driver does when a stage exhausts its retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failing stage and fail the workflow
    Abort,
    /// Record the failure and keep executing later stages; the workflow
    /// still completes as failed if any stage failed
    Continue,
}

/// Sequential driver over the stage executor port.
pub struct WorkflowService {
    executor: Arc<dyn StageExecutor>,
    template_engine: Arc<TemplateEngine>,
    agent_provider: Arc<dyn AgentProvider>,
    metrics: Option<Arc<MetricsService>>,
    cancellation: Option<CancellationToken>,
    shutdown: Option<ShutdownCoordinator>,
    failure_policy: FailurePolicy,
    default_max_retries: u32,
}

impl WorkflowService {
    /// Creates a driver with the abort-on-failure policy.
    pub fn new(
        executor: Arc<dyn StageExecutor>,
        template_engine: Arc<TemplateEngine>,
        agent_provider: Arc<dyn AgentProvider>,
    ) -> Self {
        Self {
            executor,
            template_engine,
            agent_provider,
            metrics: None,
            cancellation: None,
            shutdown: None,
            failure_policy: FailurePolicy::Abort,
            default_max_retries: agent_workflow_domain::DEFAULT_MAX_RETRIES,
        }
    }

    /// Attaches a metrics service
    pub fn with_metrics(mut self, metrics: Arc<MetricsService>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Attaches a cancellation token observed at stage boundaries
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Attaches a shutdown coordinator.
    ///
    /// The driver observes the coordinator's token at stage boundaries
    /// and registers every execution with it, so
    /// [`ShutdownCoordinator::shutdown`] can wait for in-flight workflows
    /// to finalise before the process exits.
    pub fn with_shutdown_coordinator(mut self, coordinator: ShutdownCoordinator) -> Self {
        self.cancellation = Some(coordinator.token());
        self.shutdown = Some(coordinator);
        self
    }

    /// Sets the failure policy
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Sets the fallback retry budget used by [`Self::stage_builder`]
    pub fn with_default_max_retries(mut self, max_retries: u32) -> Self {
        self.default_max_retries = max_retries;
        self
    }

    /// Starts a stage builder pre-seeded with the configured retry
    /// fallback.
    pub fn stage_builder(&self, name: impl Into<String>) -> StageDefinitionBuilder {
        StageDefinition::builder(name).max_retries(self.default_max_retries)
    }

    /// Shared template engine handle
    pub fn template_engine(&self) -> &Arc<TemplateEngine> {
        &self.template_engine
    }

    /// Executes a workflow over a fresh context seeded with
    /// `initial_vars`.
    ///
    /// # Errors
    ///
    /// Raises only for precondition violations: an empty stage list or
    /// duplicate stage names. Stage and workflow failures are returned as
    /// data inside the [`WorkflowResult`].
    pub async fn execute_workflow(
        &self,
        stages: &[StageDefinition],
        initial_vars: HashMap<String, Value>,
    ) -> Result<WorkflowResult, WorkflowError> {
        let (workflow, _context) = self.execute_workflow_with_context(stages, initial_vars).await?;
        Ok(workflow)
    }

    /// Executes a workflow and also returns the final execution context,
    /// including the reserved `<stage>.result` / `<stage>.output` entries
    /// written by the driver.
    ///
    /// # Errors
    ///
    /// As [`Self::execute_workflow`].
    pub async fn execute_workflow_with_context(
        &self,
        stages: &[StageDefinition],
        initial_vars: HashMap<String, Value>,
    ) -> Result<(WorkflowResult, ExecutionContext), WorkflowError> {
        self.validate_stages(stages)?;

        // Registered for the whole execution so a draining shutdown waits
        // for this workflow to finalise.
        let _execution_guard = self.shutdown.as_ref().map(ShutdownCoordinator::track_execution);

        let mut context = ExecutionContext::with_initial(initial_vars);
        let mut workflow = WorkflowResult::started();
        let execution_id = workflow.execution_id;

        if let Some(metrics) = &self.metrics {
            metrics.record_workflow_started();
        }

        let span = info_span!("workflow", execution_id = %execution_id, stages = stages.len());
        let outcome = self
            .run_stages(stages, &mut context, &mut workflow)
            .instrument(span)
            .await;

        if let Some(metrics) = &self.metrics {
            metrics.record_workflow_completed(workflow.total_duration().unwrap_or_default(), workflow.success);
            metrics.record_template_cache_stats(&self.template_engine.cache_stats());
        }

        outcome?;
        Ok((workflow, context))
    }

    fn validate_stages(&self, stages: &[StageDefinition]) -> Result<(), WorkflowError> {
        if stages.is_empty() {
            return Err(WorkflowError::invalid_config(
                "Workflow must contain at least one stage",
            ));
        }
        let mut seen = HashSet::new();
        for stage in stages {
            if !seen.insert(stage.name().as_str()) {
                return Err(WorkflowError::invalid_config(format!(
                    "Duplicate stage name '{}'",
                    stage.name()
                )));
            }
        }
        Ok(())
    }

    async fn run_stages(
        &self,
        stages: &[StageDefinition],
        context: &mut ExecutionContext,
        workflow: &mut WorkflowResult,
    ) -> Result<(), WorkflowError> {
        for stage in stages {
            if self
                .cancellation
                .as_ref()
                .map(CancellationToken::is_cancelled)
                .unwrap_or(false)
            {
                warn!(stage = %stage.name(), "workflow cancelled before stage");
                workflow.complete_failure(format!("workflow cancelled before stage '{}'", stage.name()));
                return Ok(());
            }

            let engine = Arc::clone(&self.template_engine);
            let template = stage.prompt_template().to_string();
            let prompt_factory = move |attempt: u32, ctx: &ExecutionContext| -> Result<String, WorkflowError> {
                let mut variables = ctx.variables().clone();
                variables.insert("attempt".to_string(), Value::from(attempt));
                engine.render(&template, &variables).map_err(WorkflowError::from)
            };

            let provider = Arc::clone(&self.agent_provider);
            let definition = stage.agent().clone();
            let agent_factory = move |attempt: u32| provider.create_agent(&definition, attempt);

            let stage_result = self
                .executor
                .execute_stage(stage, &agent_factory, &prompt_factory, context)
                .await?;

            if let Some(metrics) = &self.metrics {
                for attempt in 1..=stage_result.attempt {
                    metrics.record_stage_attempt(attempt);
                }
                if !stage_result.success {
                    metrics.record_stage_failure();
                }
            }

            // The outcome is recorded even for failed stages so later
            // stages can observe and react to the failure.
            context.record_stage_outcome(stage.name(), &stage_result)?;

            let failed = !stage_result.success;
            let error = stage_result.error.clone();
            workflow.push_stage_result(stage_result);

            if failed && self.failure_policy == FailurePolicy::Abort {
                let message = error.unwrap_or_else(|| format!("stage '{}' failed", stage.name()));
                warn!(stage = %stage.name(), error = %message, "aborting workflow on stage failure");
                workflow.complete_failure(message);
                return Ok(());
            }
        }

        if workflow.stage_results.iter().all(|r| r.success) {
            workflow.complete_success();
            info!(
                stages = workflow.stage_results.len(),
                duration_ms = workflow.total_duration().unwrap_or_default().as_millis() as u64,
                "workflow completed"
            );
        } else {
            let failed: Vec<&str> = workflow
                .stage_results
                .iter()
                .filter(|r| !r.success)
                .map(|r| r.stage_name.as_str())
                .collect();
            workflow.complete_failure(format!("stages failed: {}", failed.join(", ")));
        }

        Ok(())
    }
}
