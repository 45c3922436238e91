// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Execution Identifier Value Object
//!
//! ULID-based identity for one workflow execution.
//!
//! ## Why ULID
//!
//! - **Time-Ordered**: Lexicographic order matches creation order, so
//!   execution histories sort chronologically without a second column
//! - **Collision-Resistant**: 80 bits of randomness per millisecond
//! - **Portable**: 26-character Crockford base32, URL and log friendly
//!
//! Two concurrent executions of the same stage list receive distinct ids;
//! the id appears in every log span and metric label the driver emits.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

use crate::error::WorkflowError;

/// Unique, time-ordered identifier for a single workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(Ulid);

impl ExecutionId {
    /// Creates a new execution id stamped with the current time.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parses an execution id from its canonical string form.
    pub fn parse(s: &str) -> Result<Self, WorkflowError> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| WorkflowError::invalid_config(format!("Invalid execution id '{}': {}", s, e)))
    }

    /// Gets the underlying ULID
    pub fn as_ulid(&self) -> Ulid {
        self.0
    }

    /// Gets the embedded creation timestamp in milliseconds since the epoch
    pub fn timestamp_ms(&self) -> u64 {
        self.0.timestamp_ms()
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ids_are_unique() {
        let a = ExecutionId::new();
        let b = ExecutionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_round_trip() {
        let id = ExecutionId::new();
        let parsed = ExecutionId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ExecutionId::parse("not-a-ulid").is_err());
        assert!(ExecutionId::parse("").is_err());
    }

    #[test]
    fn test_ids_are_time_ordered() {
        let a = ExecutionId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = ExecutionId::new();
        assert!(a < b);
    }
}
