// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stage and Workflow Result Records
//!
//! Result records accumulated by the workflow driver. A stage produces
//! exactly one [`StageResult`] per execution, whether it succeeded on some
//! attempt or exhausted its retry budget. A workflow execution produces
//! exactly one [`WorkflowResult`] holding the ordered stage results.
//!
//! Both records serialize to JSON: stage results are written verbatim into
//! the execution context under the reserved `<stage>.result` key so that
//! downstream stages (and their prompt templates) can inspect them.
//!
//! ## Invariants
//!
//! - `error` is present iff `success` is false
//! - `attempt` is 1-based; a stage configured with zero retries reports
//!   attempt 0 because no attempt ever ran
//! - `execution_time` covers only the attempt that produced the record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::services::datetime_serde;
use crate::value_objects::ExecutionId;

/// Outcome of one stage execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// Name of the stage that produced this result
    pub stage_name: String,

    /// Agent output text; empty for terminal failures
    pub output: String,

    /// Whether the stage ultimately succeeded
    pub success: bool,

    /// Failure reason, present iff `success` is false
    pub error: Option<String>,

    /// 1-based attempt number that produced this record
    pub attempt: u32,

    /// Wall-clock time of the producing attempt
    #[serde(with = "duration_millis")]
    pub execution_time: Duration,

    /// Identifier of the agent used for the producing attempt
    pub agent_id: String,
}

impl StageResult {
    /// Creates a successful stage result.
    pub fn success(
        stage_name: impl Into<String>,
        output: impl Into<String>,
        attempt: u32,
        execution_time: Duration,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            stage_name: stage_name.into(),
            output: output.into(),
            success: true,
            error: None,
            attempt,
            execution_time,
            agent_id: agent_id.into(),
        }
    }

    /// Creates a failed stage result.
    pub fn failure(
        stage_name: impl Into<String>,
        error: impl Into<String>,
        attempt: u32,
        execution_time: Duration,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            stage_name: stage_name.into(),
            output: String::new(),
            success: false,
            error: Some(error.into()),
            attempt,
            execution_time,
            agent_id: agent_id.into(),
        }
    }

    /// Demotes an otherwise successful result after a validator rejection.
    ///
    /// The agent output is preserved so a later prompt can show the model
    /// what was rejected and why.
    pub fn demoted(mut self, reason: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(reason.into());
        self
    }
}

/// Outcome of one workflow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    /// Identity of this execution
    pub execution_id: ExecutionId,

    /// Wall-clock instant the driver started
    #[serde(with = "datetime_serde")]
    pub started_at: DateTime<Utc>,

    /// Wall-clock instant the driver finished; absent while running
    #[serde(with = "datetime_serde::optional")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Whether every executed stage succeeded
    pub success: bool,

    /// Error of the stage (or cancellation) that ended the workflow
    pub error: Option<String>,

    /// Results in stage order, one per executed stage
    pub stage_results: Vec<StageResult>,
}

impl WorkflowResult {
    /// Creates a result record stamped with the current instant.
    pub fn started() -> Self {
        Self {
            execution_id: ExecutionId::new(),
            started_at: Utc::now(),
            completed_at: None,
            success: false,
            error: None,
            stage_results: Vec::new(),
        }
    }

    /// Appends the result of the stage that just executed.
    pub fn push_stage_result(&mut self, result: StageResult) {
        self.stage_results.push(result);
    }

    /// Marks the execution successful and stamps the completion instant.
    pub fn complete_success(&mut self) {
        self.success = true;
        self.error = None;
        self.completed_at = Some(Utc::now());
    }

    /// Marks the execution failed and stamps the completion instant.
    pub fn complete_failure(&mut self, error: impl Into<String>) {
        self.success = false;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    /// Total wall-clock duration, available once the execution completed.
    pub fn total_duration(&self) -> Option<Duration> {
        self.completed_at
            .map(|end| (end - self.started_at).to_std().unwrap_or(Duration::ZERO))
    }

    /// Looks up the result of a stage by name.
    pub fn stage_result(&self, stage_name: &str) -> Option<&StageResult> {
        self.stage_results.iter().find(|r| r.stage_name == stage_name)
    }
}

/// Millisecond serialization for `Duration` fields.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
