// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Retrying Stage Executor
//!
//! Concrete implementation of the domain `StageExecutor` port: the
//! attempt loop that drives one stage to a terminal [`StageResult`].
//!
//! ## Attempt Loop
//!
//! For attempts 1 through `max_retries`, the executor:
//!
//! 1. obtains a fresh agent from the agent factory,
//! 2. renders the prompt through the prompt factory with the live context,
//! 3. invokes the agent, and
//! 4. runs the stage's validator against a successful output.
//!
//! A validator rejection demotes the attempt; any error from the factory,
//! prompt rendering, or the agent consumes the attempt and is remembered
//! as the last failure. The loop never raises for anything that happens
//! inside an attempt.
//!
//! ## Zero-Retry Semantics
//!
//! `max_retries == 0` means *no attempts at all*: the stage produces a
//! synthetic failure result without invoking its agent factory. Callers
//! wanting "one attempt, no retries" must configure `max_retries == 1`.
//!
//! ## Backoff
//!
//! A fixed, configurable delay runs between attempts; the default is no
//! delay. Wall-clock time is measured per attempt, and the reported
//! `execution_time` belongs to the attempt that produced the returned
//! result.

use async_trait::async_trait;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use agent_workflow_domain::repositories::stage_executor::{AgentFactory, PromptFactory};
use agent_workflow_domain::{
    ExecutionContext, ExecutionInput, StageDefinition, StageExecutor, StageResult, WorkflowError,
};

/// Stage executor with per-attempt retry and validator demotion.
#[derive(Debug, Clone)]
pub struct RetryingStageExecutor {
    retry_backoff: Duration,
}

impl RetryingStageExecutor {
    /// Creates an executor with no delay between attempts.
    pub fn new() -> Self {
        Self {
            retry_backoff: Duration::ZERO,
        }
    }

    /// Creates an executor with a fixed delay between attempts.
    pub fn with_backoff(retry_backoff: Duration) -> Self {
        Self { retry_backoff }
    }

    /// Runs one attempt to completion.
    ///
    /// Returns the successful result, or the failure message with the
    /// attempt's elapsed time and the agent id when one was resolved.
    async fn run_attempt(
        &self,
        stage: &StageDefinition,
        agent_factory: &AgentFactory,
        prompt_factory: &PromptFactory,
        context: &ExecutionContext,
        attempt: u32,
    ) -> Result<StageResult, (String, Duration, Option<String>)> {
        let started = Instant::now();

        let agent = agent_factory(attempt)
            .map_err(|e| (format!("agent factory failed: {}", e), started.elapsed(), None))?;
        let agent_id = agent.agent_id().to_string();

        let prompt = prompt_factory(attempt, context).map_err(|e| {
            (
                format!("prompt rendering failed: {}", e),
                started.elapsed(),
                Some(agent_id.clone()),
            )
        })?;

        let input = if stage.task_metadata().is_empty() {
            ExecutionInput::new(prompt)
        } else {
            let metadata = Value::Object(
                stage
                    .task_metadata()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            );
            ExecutionInput::with_metadata(prompt, metadata)
        };

        match agent.execute(input).await {
            Ok(result) if result.success => Ok(StageResult::success(
                stage.name().as_str(),
                result.output,
                attempt,
                started.elapsed(),
                agent_id,
            )),
            Ok(result) => Err((
                result
                    .error
                    .unwrap_or_else(|| "agent reported an unsuccessful result".to_string()),
                started.elapsed(),
                Some(agent_id),
            )),
            Err(e) => Err((e.to_string(), started.elapsed(), Some(agent_id))),
        }
    }
}

impl Default for RetryingStageExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StageExecutor for RetryingStageExecutor {
    async fn execute_stage(
        &self,
        stage: &StageDefinition,
        agent_factory: &AgentFactory,
        prompt_factory: &PromptFactory,
        context: &ExecutionContext,
    ) -> Result<StageResult, WorkflowError> {
        let stage_name = stage.name().as_str();
        let max_retries = stage.max_retries();

        if max_retries == 0 {
            debug!(stage = stage_name, "zero retry budget; stage fails without attempts");
            return Ok(StageResult::failure(
                stage_name,
                "stage has a zero retry budget; no attempts were made",
                0,
                Duration::ZERO,
                stage.agent().name(),
            ));
        }

        let mut last_error: Option<String> = None;
        let mut last_elapsed = Duration::ZERO;
        let mut last_agent_id = stage.agent().name().to_string();

        for attempt in 1..=max_retries {
            if attempt > 1 && !self.retry_backoff.is_zero() {
                tokio::time::sleep(self.retry_backoff).await;
            }

            match self
                .run_attempt(stage, agent_factory, prompt_factory, context, attempt)
                .await
            {
                Ok(result) => {
                    if let Some(validator) = stage.validator() {
                        let verdict = validator.validate(&result);
                        if !verdict.is_valid() {
                            let reason = verdict.reason().unwrap_or("output rejected").to_string();
                            warn!(stage = stage_name, attempt, reason = %reason, "validator rejected attempt");
                            last_elapsed = result.execution_time;
                            last_agent_id = result.agent_id.clone();
                            last_error = Some(format!("validator rejected attempt {}: {}", attempt, reason));
                            continue;
                        }
                    }

                    info!(
                        stage = stage_name,
                        attempt,
                        elapsed_ms = result.execution_time.as_millis() as u64,
                        agent = %result.agent_id,
                        "stage attempt succeeded"
                    );
                    return Ok(result);
                }
                Err((error, elapsed, agent_id)) => {
                    warn!(stage = stage_name, attempt, error = %error, "stage attempt failed");
                    last_error = Some(error);
                    last_elapsed = elapsed;
                    if let Some(agent_id) = agent_id {
                        last_agent_id = agent_id;
                    }
                }
            }
        }

        Ok(StageResult::failure(
            stage_name,
            last_error.unwrap_or_else(|| "validation failed".to_string()),
            max_retries,
            last_elapsed,
            last_agent_id,
        ))
    }
}
