// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stage Result Validation
//!
//! A validator is a pure function from a produced [`StageResult`] to a
//! [`ValidationResult`]. An invalid verdict does not raise an error: the
//! stage executor demotes the attempt to a retry and tries again within the
//! stage's retry budget.
//!
//! Validators are expected to be fast and non-blocking; anything that needs
//! I/O belongs inside the agent, not the validator.

use crate::entities::workflow_result::StageResult;

/// Verdict produced by a [`ResultValidator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    valid: bool,
    reason: Option<String>,
}

impl ValidationResult {
    /// Creates a passing verdict
    pub fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    /// Creates a failing verdict with the reason shown in the stage error
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }

    /// Whether the validated output was accepted
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Rejection reason, present iff the verdict is invalid
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

/// Port for per-stage output validation.
///
/// Implementations must be deterministic for a given result; the executor
/// may call them once per attempt.
pub trait ResultValidator: Send + Sync {
    /// Judges one stage result
    fn validate(&self, result: &StageResult) -> ValidationResult;
}

// Closures are the common case in tests and inline stage definitions.
impl<F> ResultValidator for F
where
    F: Fn(&StageResult) -> ValidationResult + Send + Sync,
{
    fn validate(&self, result: &StageResult) -> ValidationResult {
        self(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample_result(output: &str) -> StageResult {
        StageResult::success("draft", output, 1, Duration::from_millis(5), "stub")
    }

    #[test]
    fn test_valid_verdict() {
        let verdict = ValidationResult::valid();
        assert!(verdict.is_valid());
        assert!(verdict.reason().is_none());
    }

    #[test]
    fn test_invalid_verdict_carries_reason() {
        let verdict = ValidationResult::invalid("too short");
        assert!(!verdict.is_valid());
        assert_eq!(verdict.reason(), Some("too short"));
    }

    #[test]
    fn test_closure_validator() {
        let validator = |result: &StageResult| {
            if result.output.len() >= 10 {
                ValidationResult::valid()
            } else {
                ValidationResult::invalid("output shorter than 10 characters")
            }
        };

        assert!(validator.validate(&sample_result("long enough output")).is_valid());
        assert!(!validator.validate(&sample_result("short")).is_valid());
    }
}
