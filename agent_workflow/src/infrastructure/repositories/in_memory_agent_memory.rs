// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # In-Memory Agent Memory Repository
//!
//! Process-local implementation of the `AgentMemoryRepository` port.
//! Traces are held verbatim in memory, preserving the byte-fidelity
//! contract of the port (4-byte UTF-8, control characters, large values)
//! trivially. Suitable for tests and single-process deployments; durable
//! storage is an external collaborator.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use agent_workflow_domain::{AgentMemoryRepository, ConversationTrace, WorkflowError};

/// Thread-safe in-memory trace store keyed by agent id.
#[derive(Default)]
pub struct InMemoryAgentMemoryRepository {
    traces: RwLock<HashMap<String, Vec<ConversationTrace>>>,
}

impl InMemoryAgentMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total trace count across all agents
    pub fn len(&self) -> usize {
        self.traces.read().values().map(Vec::len).sum()
    }

    /// Whether the store holds no traces
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AgentMemoryRepository for InMemoryAgentMemoryRepository {
    async fn append_trace(&self, trace: ConversationTrace) -> Result<(), WorkflowError> {
        self.traces
            .write()
            .entry(trace.agent_id.clone())
            .or_default()
            .push(trace);
        Ok(())
    }

    async fn load_traces(&self, agent_id: &str, limit: usize) -> Result<Vec<ConversationTrace>, WorkflowError> {
        let traces = self.traces.read();
        let all = traces.get(agent_id).map(Vec::as_slice).unwrap_or_default();
        let start = all.len().saturating_sub(limit);
        Ok(all[start..].to_vec())
    }

    async fn prune_traces(&self, agent_id: &str) -> Result<u64, WorkflowError> {
        let removed = self
            .traces
            .write()
            .remove(agent_id)
            .map(|traces| traces.len() as u64)
            .unwrap_or(0);
        Ok(removed)
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_load_in_order() {
        let repo = InMemoryAgentMemoryRepository::new();
        repo.append_trace(ConversationTrace::new("writer", "user", "first").unwrap())
            .await
            .unwrap();
        repo.append_trace(ConversationTrace::new("writer", "assistant", "second").unwrap())
            .await
            .unwrap();

        let traces = repo.load_traces("writer", 10).await.unwrap();
        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0].content, "first");
        assert_eq!(traces[1].content, "second");
    }

    #[tokio::test]
    async fn test_limit_returns_newest() {
        let repo = InMemoryAgentMemoryRepository::new();
        for i in 0..5 {
            repo.append_trace(ConversationTrace::new("writer", "assistant", format!("msg {i}")).unwrap())
                .await
                .unwrap();
        }

        let traces = repo.load_traces("writer", 2).await.unwrap();
        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0].content, "msg 3");
        assert_eq!(traces[1].content, "msg 4");
    }

    #[tokio::test]
    async fn test_prune_removes_only_that_agent() {
        let repo = InMemoryAgentMemoryRepository::new();
        repo.append_trace(ConversationTrace::new("a", "user", "x").unwrap())
            .await
            .unwrap();
        repo.append_trace(ConversationTrace::new("b", "user", "y").unwrap())
            .await
            .unwrap();

        assert_eq!(repo.prune_traces("a").await.unwrap(), 1);
        assert_eq!(repo.len(), 1);
        assert!(repo.load_traces("a", 10).await.unwrap().is_empty());
        assert_eq!(repo.load_traces("b", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_content_preserved_byte_for_byte() {
        let repo = InMemoryAgentMemoryRepository::new();
        let content = format!("wide \u{1F980} control \u{0007} large {}", "x".repeat(1024 * 1024));
        repo.append_trace(ConversationTrace::new("writer", "assistant", content.clone()).unwrap())
            .await
            .unwrap();

        let traces = repo.load_traces("writer", 1).await.unwrap();
        assert_eq!(traces[0].content, content);
        assert!(repo.is_healthy().await);
    }
}
