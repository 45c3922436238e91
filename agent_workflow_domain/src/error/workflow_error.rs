// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! This module provides the hierarchical error system for the agent workflow
//! domain. It categorizes failures, provides actionable error messages, and
//! supports both automated recovery decisions and human-readable diagnostics.
//!
//! ## Error Architecture
//!
//! The error system organizes failures into logical categories:
//!
//! #### Configuration Errors
//! - **InvalidConfiguration**: Malformed or missing configuration settings
//! - **ValidationError**: Precondition or data validation failures
//! - **StageNotFound**: Reference to a stage that is not part of the workflow
//!
//! #### Execution Errors
//! - **ExecutionFailed**: General stage or workflow execution failures
//! - **AgentError**: An agent raised or returned a structured failure
//! - **ProviderError**: An LLM provider call failed
//! - **TemplateError**: Syntactic fault in a prompt template
//!
//! #### Security Errors
//! - **SecurityViolation**: Path sandbox escapes and injection attempts
//!
//! #### Infrastructure Errors
//! - **IoError**: File system and network I/O failures
//! - **DatabaseError**: Persistence operation failures
//! - **ResourceExhausted**: Memory or scheduler resource limitations
//! - **TimeoutError**: Operation timeout failures
//!
//! #### System Errors
//! - **InternalError**: Unexpected system failures
//! - **MetricsError**: Metrics collection and registration failures
//! - **Cancelled**: User or system-initiated cancellation
//!
//! ## Error Recovery
//!
//! Some errors indicate temporary conditions that are worth retrying:
//! timeouts, resource exhaustion, transient I/O faults, and provider
//! failures. Others indicate permanent faults requiring intervention:
//! security violations, malformed configuration, and template syntax
//! errors. `is_recoverable` encodes that distinction for retry loops.
//!
//! ## Propagation Policy
//!
//! Within a stage, attempt-level failures (agent, provider, prompt factory)
//! are folded into the retry loop and never escape as errors; exhausted
//! stages surface as failing `StageResult` values. Only input errors and
//! fatal resource errors propagate as `Err` to callers.

use thiserror::Error;

/// Domain-specific errors for the agent workflow system.
///
/// This enum represents all possible errors that can occur within the domain
/// layer. Each variant includes a descriptive message and is designed to
/// provide clear information about what went wrong and potentially how to
/// fix it.
///
/// ## Design Principles
///
/// - **Specific**: Each error type represents a specific failure mode
/// - **Actionable**: Error messages provide enough context for debugging
/// - **Categorized**: Errors are grouped by type for systematic handling
/// - **Recoverable**: Some errors indicate retry-able conditions
#[derive(Error, Debug, Clone)]
pub enum WorkflowError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Stage not found: {0}")]
    StageNotFound(String),

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Agent error: {0}")]
    AgentError(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Security violation: {0}")]
    SecurityViolation(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Metrics error: {0}")]
    MetricsError(String),
}

impl WorkflowError {
    /// Creates a new configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a new validation error
    pub fn validation_error(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Creates a new template error
    pub fn template_error(msg: impl Into<String>) -> Self {
        Self::TemplateError(msg.into())
    }

    /// Creates a new execution error
    pub fn execution_failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }

    /// Creates a new agent error
    pub fn agent_error(msg: impl Into<String>) -> Self {
        Self::AgentError(msg.into())
    }

    /// Creates a new provider error
    pub fn provider_error(msg: impl Into<String>) -> Self {
        Self::ProviderError(msg.into())
    }

    /// Creates a new security violation error
    pub fn security_violation(msg: impl Into<String>) -> Self {
        Self::SecurityViolation(msg.into())
    }

    /// Creates a new resource exhausted error
    pub fn resource_exhausted(msg: impl Into<String>) -> Self {
        Self::ResourceExhausted(msg.into())
    }

    /// Creates a new IO error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::IoError(msg.into())
    }

    /// Creates a new database error
    pub fn database_error(msg: impl Into<String>) -> Self {
        Self::DatabaseError(msg.into())
    }

    /// Creates a new timeout error
    pub fn timeout_error(msg: impl Into<String>) -> Self {
        Self::TimeoutError(msg.into())
    }

    /// Creates a new cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Creates a new internal error
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Creates a new metrics error
    pub fn metrics_error(msg: impl Into<String>) -> Self {
        Self::MetricsError(msg.into())
    }

    /// Checks if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            WorkflowError::TimeoutError(_)
                | WorkflowError::ResourceExhausted(_)
                | WorkflowError::IoError(_)
                | WorkflowError::ProviderError(_)
        )
    }

    /// Checks if the error is a security-related error
    pub fn is_security_error(&self) -> bool {
        matches!(self, WorkflowError::SecurityViolation(_))
    }

    /// Gets the error category
    pub fn category(&self) -> &'static str {
        match self {
            WorkflowError::InvalidConfiguration(_) => "configuration",
            WorkflowError::ValidationError(_) => "validation",
            WorkflowError::StageNotFound(_) => "configuration",
            WorkflowError::TemplateError(_) => "template",
            WorkflowError::ExecutionFailed(_) => "execution",
            WorkflowError::AgentError(_) => "agent",
            WorkflowError::ProviderError(_) => "provider",
            WorkflowError::SecurityViolation(_) => "security",
            WorkflowError::ResourceExhausted(_) => "resource",
            WorkflowError::IoError(_) => "io",
            WorkflowError::DatabaseError(_) => "database",
            WorkflowError::SerializationError(_) => "serialization",
            WorkflowError::TimeoutError(_) => "timeout",
            WorkflowError::Cancelled(_) => "cancellation",
            WorkflowError::InternalError(_) => "internal",
            WorkflowError::MetricsError(_) => "metrics",
        }
    }
}

// Implement conversion from standard library errors
impl From<std::io::Error> for WorkflowError {
    fn from(err: std::io::Error) -> Self {
        WorkflowError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for WorkflowError {
    fn from(err: serde_json::Error) -> Self {
        WorkflowError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(WorkflowError::invalid_config("x").category(), "configuration");
        assert_eq!(WorkflowError::template_error("x").category(), "template");
        assert_eq!(WorkflowError::security_violation("x").category(), "security");
        assert_eq!(WorkflowError::cancelled("x").category(), "cancellation");
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(WorkflowError::timeout_error("slow provider").is_recoverable());
        assert!(WorkflowError::resource_exhausted("heap").is_recoverable());
        assert!(WorkflowError::provider_error("http 503").is_recoverable());
        assert!(!WorkflowError::security_violation("traversal").is_recoverable());
        assert!(!WorkflowError::invalid_config("empty stages").is_recoverable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: WorkflowError = io.into();
        assert!(matches!(err, WorkflowError::IoError(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_security_classification() {
        assert!(WorkflowError::security_violation("escape").is_security_error());
        assert!(!WorkflowError::io_error("disk").is_security_error());
    }
}
