// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Metrics Service Implementation
//!
//! Prometheus-based metrics collection and export for orchestrator
//! observability. Provides execution metrics (workflows started, failed,
//! duration), stage metrics (attempts, retries), memory-pressure gauges,
//! and template-cache statistics. Thread-safe with low overhead.

use prometheus::{Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry};
use std::sync::Arc;
use tracing::debug;

use agent_workflow_domain::WorkflowError;

use crate::infrastructure::templates::CacheStats;

const NAMESPACE: &str = "agent_workflow";

/// Prometheus metrics service for workflow observability.
///
/// This service handles all metrics collection and export, covering:
///
/// - **Execution Metrics**: workflow counts, failures, durations
/// - **Stage Metrics**: attempts and retries across all workflows
/// - **Memory Metrics**: heap usage gauge, cleanup counters
/// - **Cache Metrics**: compiled-template cache size and hit rate
#[derive(Clone)]
pub struct MetricsService {
    registry: Arc<Registry>,

    // Workflow execution metrics
    workflows_started_total: IntCounter,
    workflows_failed_total: IntCounter,
    workflow_duration: Histogram,
    active_workflows: IntGauge,

    // Stage metrics
    stage_attempts_total: IntCounter,
    stage_retries_total: IntCounter,
    stage_failures_total: IntCounter,

    // Memory metrics
    memory_usage_percentage: Gauge,
    memory_cleanup_duration: Histogram,
    memory_cleanup_freed_bytes: IntCounter,
    memory_cleanups_total: IntCounter,

    // Template cache metrics
    template_cache_size: IntGauge,
    template_cache_hit_rate: Gauge,
}

impl MetricsService {
    /// Create a new MetricsService with its own Prometheus registry
    pub fn new() -> Result<Self, WorkflowError> {
        let registry = Registry::new();

        let workflows_started_total = IntCounter::with_opts(
            Opts::new("workflows_started_total", "Total workflow executions started").namespace(NAMESPACE),
        )
        .map_err(|e| WorkflowError::metrics_error(format!("Failed to create workflows_started_total: {}", e)))?;

        let workflows_failed_total = IntCounter::with_opts(
            Opts::new("workflows_failed_total", "Total workflow executions that failed").namespace(NAMESPACE),
        )
        .map_err(|e| WorkflowError::metrics_error(format!("Failed to create workflows_failed_total: {}", e)))?;

        let workflow_duration = Histogram::with_opts(
            HistogramOpts::new("workflow_duration_seconds", "Wall-clock time of workflow executions")
                .namespace(NAMESPACE)
                .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]),
        )
        .map_err(|e| WorkflowError::metrics_error(format!("Failed to create workflow_duration: {}", e)))?;

        let active_workflows = IntGauge::with_opts(
            Opts::new("workflow_active_count", "Number of workflow executions in flight").namespace(NAMESPACE),
        )
        .map_err(|e| WorkflowError::metrics_error(format!("Failed to create active_workflows: {}", e)))?;

        let stage_attempts_total = IntCounter::with_opts(
            Opts::new("stage_attempts_total", "Total stage attempts across all workflows").namespace(NAMESPACE),
        )
        .map_err(|e| WorkflowError::metrics_error(format!("Failed to create stage_attempts_total: {}", e)))?;

        let stage_retries_total = IntCounter::with_opts(
            Opts::new("stage_retries_total", "Total stage attempts beyond the first").namespace(NAMESPACE),
        )
        .map_err(|e| WorkflowError::metrics_error(format!("Failed to create stage_retries_total: {}", e)))?;

        let stage_failures_total = IntCounter::with_opts(
            Opts::new("stage_failures_total", "Total stages that exhausted their retry budget").namespace(NAMESPACE),
        )
        .map_err(|e| WorkflowError::metrics_error(format!("Failed to create stage_failures_total: {}", e)))?;

        let memory_usage_percentage = Gauge::with_opts(
            Opts::new(
                "memory_usage_heap_percentage",
                "Current heap usage as a percentage of the limit",
            )
            .namespace(NAMESPACE),
        )
        .map_err(|e| WorkflowError::metrics_error(format!("Failed to create memory_usage_percentage: {}", e)))?;

        let memory_cleanup_duration = Histogram::with_opts(
            HistogramOpts::new("memory_cleanup_duration_seconds", "Time spent in memory cleanup passes")
                .namespace(NAMESPACE)
                .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0]),
        )
        .map_err(|e| WorkflowError::metrics_error(format!("Failed to create memory_cleanup_duration: {}", e)))?;

        let memory_cleanup_freed_bytes = IntCounter::with_opts(
            Opts::new("memory_cleanup_freed_bytes", "Estimated bytes freed by cleanups").namespace(NAMESPACE),
        )
        .map_err(|e| WorkflowError::metrics_error(format!("Failed to create memory_cleanup_freed_bytes: {}", e)))?;

        let memory_cleanups_total = IntCounter::with_opts(
            Opts::new("memory_cleanups_total", "Total memory cleanup passes").namespace(NAMESPACE),
        )
        .map_err(|e| WorkflowError::metrics_error(format!("Failed to create memory_cleanups_total: {}", e)))?;

        let template_cache_size = IntGauge::with_opts(
            Opts::new("template_cache_size", "Entries currently in the template cache").namespace(NAMESPACE),
        )
        .map_err(|e| WorkflowError::metrics_error(format!("Failed to create template_cache_size: {}", e)))?;

        let template_cache_hit_rate = Gauge::with_opts(
            Opts::new("template_cache_hit_rate", "Template cache hit rate in [0, 1]").namespace(NAMESPACE),
        )
        .map_err(|e| WorkflowError::metrics_error(format!("Failed to create template_cache_hit_rate: {}", e)))?;

        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(workflows_started_total.clone()),
            Box::new(workflows_failed_total.clone()),
            Box::new(workflow_duration.clone()),
            Box::new(active_workflows.clone()),
            Box::new(stage_attempts_total.clone()),
            Box::new(stage_retries_total.clone()),
            Box::new(stage_failures_total.clone()),
            Box::new(memory_usage_percentage.clone()),
            Box::new(memory_cleanup_duration.clone()),
            Box::new(memory_cleanup_freed_bytes.clone()),
            Box::new(memory_cleanups_total.clone()),
            Box::new(template_cache_size.clone()),
            Box::new(template_cache_hit_rate.clone()),
        ];
        for collector in collectors {
            registry
                .register(collector)
                .map_err(|e| WorkflowError::metrics_error(format!("Failed to register metric: {}", e)))?;
        }

        debug!("MetricsService initialized with Prometheus registry");

        Ok(Self {
            registry: Arc::new(registry),
            workflows_started_total,
            workflows_failed_total,
            workflow_duration,
            active_workflows,
            stage_attempts_total,
            stage_retries_total,
            stage_failures_total,
            memory_usage_percentage,
            memory_cleanup_duration,
            memory_cleanup_freed_bytes,
            memory_cleanups_total,
            template_cache_size,
            template_cache_hit_rate,
        })
    }

    /// Record the start of a workflow execution
    pub fn record_workflow_started(&self) {
        self.workflows_started_total.inc();
        self.active_workflows.inc();
    }

    /// Record the end of a workflow execution
    pub fn record_workflow_completed(&self, duration: std::time::Duration, success: bool) {
        self.active_workflows.dec();
        self.workflow_duration.observe(duration.as_secs_f64());
        if !success {
            self.workflows_failed_total.inc();
        }
    }

    /// Record one stage attempt; attempts beyond the first count as retries
    pub fn record_stage_attempt(&self, attempt: u32) {
        self.stage_attempts_total.inc();
        if attempt > 1 {
            self.stage_retries_total.inc();
        }
    }

    /// Record a stage that exhausted its retry budget
    pub fn record_stage_failure(&self) {
        self.stage_failures_total.inc();
    }

    /// Publish the heap usage gauge
    pub fn set_memory_usage_percentage(&self, percentage: f64) {
        self.memory_usage_percentage.set(percentage);
    }

    /// Record one memory cleanup pass
    pub fn record_memory_cleanup(&self, duration: std::time::Duration, freed_bytes: u64) {
        self.memory_cleanup_duration.observe(duration.as_secs_f64());
        self.memory_cleanup_freed_bytes.inc_by(freed_bytes);
        self.memory_cleanups_total.inc();
    }

    /// Publish template cache gauges from a stats snapshot
    pub fn record_template_cache_stats(&self, stats: &CacheStats) {
        self.template_cache_size.set(stats.current_size as i64);
        self.template_cache_hit_rate.set(stats.hit_rate);
    }

    /// Get Prometheus metrics in text format for scraping
    pub fn get_metrics(&self) -> Result<String, WorkflowError> {
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        encoder
            .encode_to_string(&metric_families)
            .map_err(|e| WorkflowError::metrics_error(format!("Failed to encode metrics: {}", e)))
    }

    /// Get the Prometheus registry for advanced usage
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }
}

impl Default for MetricsService {
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self::new().expect("Failed to create default MetricsService")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_service_creation() {
        let service = MetricsService::new().unwrap();
        let output = service.get_metrics().unwrap();
        assert!(output.contains("agent_workflow_workflows_started_total"));
        assert!(output.contains("agent_workflow_memory_usage_heap_percentage"));
    }

    #[test]
    fn test_workflow_lifecycle_counters() {
        let service = MetricsService::new().unwrap();

        service.record_workflow_started();
        service.record_workflow_completed(std::time::Duration::from_millis(120), false);

        let output = service.get_metrics().unwrap();
        assert!(output.contains("agent_workflow_workflows_failed_total 1"));
        assert!(output.contains("agent_workflow_workflow_active_count 0"));
    }

    #[test]
    fn test_stage_attempt_counters() {
        let service = MetricsService::new().unwrap();

        service.record_stage_attempt(1);
        service.record_stage_attempt(2);
        service.record_stage_attempt(3);
        service.record_stage_failure();

        let output = service.get_metrics().unwrap();
        assert!(output.contains("agent_workflow_stage_attempts_total 3"));
        assert!(output.contains("agent_workflow_stage_retries_total 2"));
        assert!(output.contains("agent_workflow_stage_failures_total 1"));
    }

    #[test]
    fn test_memory_gauges() {
        let service = MetricsService::new().unwrap();

        service.set_memory_usage_percentage(42.5);
        service.record_memory_cleanup(std::time::Duration::from_millis(5), 4096);

        let output = service.get_metrics().unwrap();
        assert!(output.contains("agent_workflow_memory_usage_heap_percentage 42.5"));
        assert!(output.contains("agent_workflow_memory_cleanups_total 1"));
        assert!(output.contains("agent_workflow_memory_cleanup_freed_bytes 4096"));
    }

    #[test]
    fn test_template_cache_gauges() {
        let service = MetricsService::new().unwrap();

        let stats = CacheStats {
            current_size: 3,
            max_size: 100,
            hits: 9,
            misses: 3,
            lru_evictions: 0,
            ttl_evictions: 0,
            hit_rate: 0.75,
        };
        service.record_template_cache_stats(&stats);

        let output = service.get_metrics().unwrap();
        assert!(output.contains("agent_workflow_template_cache_size 3"));
        assert!(output.contains("agent_workflow_template_cache_hit_rate 0.75"));
    }
}
