// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stage Name Value Object
//!
//! Validated stage identifier used to key context entries and stage results.
//! Stage names must be non-blank and are limited to a length that keeps the
//! derived context keys (`<name>.result`, `<name>.output`) readable in logs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::WorkflowError;

/// Maximum accepted stage name length in characters.
pub const MAX_STAGE_NAME_LENGTH: usize = 256;

/// A validated, non-blank stage name.
///
/// The name doubles as the prefix of the reserved context keys written by
/// the workflow driver, so it must survive a round trip through the
/// execution context unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageName(String);

impl StageName {
    /// Creates a stage name, rejecting blank or oversized input.
    ///
    /// Leading and trailing whitespace is trimmed before validation; the
    /// stored name is the trimmed form.
    pub fn new(name: impl Into<String>) -> Result<Self, WorkflowError> {
        let name = name.into();
        let trimmed = name.trim();

        if trimmed.is_empty() {
            return Err(WorkflowError::invalid_config("Stage name cannot be blank"));
        }

        if trimmed.chars().count() > MAX_STAGE_NAME_LENGTH {
            return Err(WorkflowError::invalid_config(format!(
                "Stage name exceeds maximum length of {} characters",
                MAX_STAGE_NAME_LENGTH
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Gets the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives the reserved context key holding this stage's full result.
    pub fn result_key(&self) -> String {
        format!("{}.result", self.0)
    }

    /// Derives the reserved context key holding this stage's output text.
    pub fn output_key(&self) -> String {
        format!("{}.output", self.0)
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for StageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for StageName {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_stage_name() {
        let name = StageName::new("draft").unwrap();
        assert_eq!(name.as_str(), "draft");
        assert_eq!(name.to_string(), "draft");
    }

    #[test]
    fn test_blank_names_rejected() {
        assert!(StageName::new("").is_err());
        assert!(StageName::new("   ").is_err());
        assert!(StageName::new("\t\n").is_err());
    }

    #[test]
    fn test_whitespace_trimmed() {
        let name = StageName::new("  review  ").unwrap();
        assert_eq!(name.as_str(), "review");
    }

    #[test]
    fn test_length_limit() {
        let long = "s".repeat(MAX_STAGE_NAME_LENGTH);
        assert!(StageName::new(long.as_str()).is_ok());

        let too_long = "s".repeat(MAX_STAGE_NAME_LENGTH + 1);
        assert!(StageName::new(too_long.as_str()).is_err());
    }

    #[test]
    fn test_reserved_context_keys() {
        let name = StageName::new("draft").unwrap();
        assert_eq!(name.result_key(), "draft.result");
        assert_eq!(name.output_key(), "draft.output");
    }
}
