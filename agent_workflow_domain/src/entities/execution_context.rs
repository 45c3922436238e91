// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Execution Context
//!
//! The mutable key to value mapping threaded across the stages of one
//! workflow execution. The driver owns the context; stages observe a
//! read-only view while they run, and the driver writes the reserved
//! `<stage>.result` and `<stage>.output` keys after every stage, success
//! or failure, before the next stage starts.
//!
//! ## Ordering Guarantee
//!
//! Stage *k+1* observes every write produced by stages 1..k. Concurrent
//! workflow executions never share a context, so no synchronization is
//! required here.
//!
//! ## Reserved Keys
//!
//! Keys of the form `<stageName>.result` and `<stageName>.output` belong
//! to the driver. Any such key present when stage *k* starts refers to a
//! stage that executed before *k*.

use serde_json::Value;
use std::collections::HashMap;

use crate::entities::workflow_result::StageResult;
use crate::error::WorkflowError;
use crate::value_objects::StageName;

/// Key to value mapping carried across the stages of one execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    values: HashMap<String, Value>,
}

impl ExecutionContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Creates a context seeded with caller-supplied initial variables.
    pub fn with_initial(initial: HashMap<String, Value>) -> Self {
        Self { values: initial }
    }

    /// Gets a value by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Gets a value as a string slice, if it is a JSON string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Sets a value, replacing any previous entry under the same key
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Checks whether a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the context holds no entries
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Read-only view of all entries, used for prompt rendering
    pub fn variables(&self) -> &HashMap<String, Value> {
        &self.values
    }

    /// Records a finished stage under the reserved keys.
    ///
    /// Writes `<stage>.result` (the full serialized [`StageResult`]) and
    /// `<stage>.output` (the output text). Failed stages are recorded the
    /// same way so that downstream stages can observe and react to the
    /// failure.
    pub fn record_stage_outcome(&mut self, stage_name: &StageName, result: &StageResult) -> Result<(), WorkflowError> {
        let serialized = serde_json::to_value(result)?;
        self.values.insert(stage_name.result_key(), serialized);
        self.values
            .insert(stage_name.output_key(), Value::String(result.output.clone()));
        Ok(())
    }
}

impl From<HashMap<String, Value>> for ExecutionContext {
    fn from(values: HashMap<String, Value>) -> Self {
        Self { values }
    }
}
