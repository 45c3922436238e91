// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Agent Memory Port
//!
//! Persistence contract for conversational traces recorded by agents
//! between workflow executions. The stage executor never touches this
//! port; agents that keep memory do.
//!
//! ## Storage Contract
//!
//! Implementations backed by a relational store must:
//!
//! - roll back the surrounding transaction on any error and never leak a
//!   connection;
//! - preserve trace content byte-for-byte as UTF-8, including 4-byte
//!   codepoints and control characters, for values of at least 1 MiB per
//!   row. NUL bytes are rejected at this port, so storage layers never see
//!   them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::services::datetime_serde;

/// One persisted conversational exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTrace {
    /// Agent the trace belongs to
    pub agent_id: String,

    /// Originator of the content, e.g. "user", "assistant", "tool"
    pub role: String,

    /// Verbatim exchange content
    pub content: String,

    /// Instant the trace was recorded
    #[serde(with = "datetime_serde")]
    pub recorded_at: DateTime<Utc>,
}

impl ConversationTrace {
    /// Creates a trace stamped with the current instant.
    ///
    /// # Errors
    ///
    /// Rejects blank agent ids and content containing NUL bytes; storage
    /// layers rely on both being screened here.
    pub fn new(
        agent_id: impl Into<String>,
        role: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Self, WorkflowError> {
        let agent_id = agent_id.into();
        if agent_id.trim().is_empty() {
            return Err(WorkflowError::invalid_config("Trace agent id cannot be blank"));
        }

        let content = content.into();
        if content.contains('\0') {
            return Err(WorkflowError::validation_error(
                "Trace content cannot contain NUL bytes",
            ));
        }

        Ok(Self {
            agent_id,
            role: role.into(),
            content,
            recorded_at: Utc::now(),
        })
    }
}

/// Port for conversational trace persistence.
#[async_trait]
pub trait AgentMemoryRepository: Send + Sync {
    /// Appends one trace for its agent
    async fn append_trace(&self, trace: ConversationTrace) -> Result<(), WorkflowError>;

    /// Loads the most recent traces for an agent, newest last
    async fn load_traces(&self, agent_id: &str, limit: usize) -> Result<Vec<ConversationTrace>, WorkflowError>;

    /// Removes every trace for an agent, returning the removed count
    async fn prune_traces(&self, agent_id: &str) -> Result<u64, WorkflowError>;

    /// Whether the backing store is reachable and writable
    async fn is_healthy(&self) -> bool;
}
