// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Memory Manager
//!
//! Process-wide memory governance: heap-pressure reporting, cleanup
//! callbacks, and weak or expirable resource tracking.
//!
//! ## Pressure State Machine
//!
//! The manager computes the usage fraction `u = used / limit` from its
//! [`MemorySource`] and maps it onto four levels:
//!
//! ```text
//! NORMAL     u <  warning
//! WARNING    warning   <= u < critical
//! CRITICAL   critical  <= u < emergency
//! EMERGENCY  emergency <= u
//! ```
//!
//! Each transition is logged exactly once and the current percentage is
//! published as the `memory_usage_heap_percentage` gauge.
//!
//! ## Background Loops
//!
//! `start` spawns two supervised loops on the tokio runtime:
//!
//! - **Monitor** (every `monitoring_interval`): samples usage, updates the
//!   level, and triggers a cleanup when usage is at or above the critical
//!   threshold and at least 60 seconds have passed since the last cleanup.
//!   The cleanup is aggressive iff usage is at or above the emergency
//!   threshold.
//! - **Cleanup** (every `cleanup_interval`): runs a non-aggressive cleanup
//!   unconditionally.
//!
//! ## Cleanup Sequence
//!
//! 1. Drain the expirable-resource queue while its head has expired,
//!    closing each resource; close errors are logged, never raised.
//! 2. Sweep weak registrations whose referent is gone.
//! 3. Invoke every cleanup callback with the aggressive flag; a panic in
//!    one callback does not prevent the others from running.
//! 4. For aggressive cleanups, schedule a deferred usage sample and log
//!    after `gc_log_delay`. There is no collector to hint at in Rust;
//!    reclamation comes from the closed resources themselves.
//! 5. Record cleanup duration, freed estimate, and count metrics, then
//!    stamp the cleanup time.
//!
//! The three phases are individually thread-safe but not atomic as a
//! whole; callbacks must not assume the queue and the weak map were swept
//! in the same instant.

use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, error, info, warn};

use agent_workflow_domain::WorkflowError;

use crate::infrastructure::metrics::MetricsService;
use crate::infrastructure::runtime::shutdown::CancellationToken;
use crate::infrastructure::runtime::supervisor::SupervisedTask;

/// Minimum spacing between reactive (pressure-triggered) cleanups.
const MIN_REACTIVE_CLEANUP_SPACING: Duration = Duration::from_secs(60);

/// Grace window for stopping the background loops on close.
const CLOSE_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Heap pressure levels ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemoryPressureLevel {
    Normal,
    Warning,
    Critical,
    Emergency,
}

impl std::fmt::Display for MemoryPressureLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MemoryPressureLevel::Normal => "NORMAL",
            MemoryPressureLevel::Warning => "WARNING",
            MemoryPressureLevel::Critical => "CRITICAL",
            MemoryPressureLevel::Emergency => "EMERGENCY",
        };
        write!(f, "{}", label)
    }
}

/// One memory sample: bytes used against the applicable limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    pub used: u64,
    pub limit: u64,
}

impl MemoryUsage {
    /// Usage fraction in `[0, 1]`-ish space; 0 when the limit is unknown.
    pub fn fraction(&self) -> f64 {
        if self.limit == 0 {
            0.0
        } else {
            self.used as f64 / self.limit as f64
        }
    }
}

/// Source of memory samples. Production uses [`SystemMemorySource`];
/// tests inject scripted sources.
pub trait MemorySource: Send + Sync {
    fn sample(&self) -> MemoryUsage;
}

/// Memory source backed by the operating system.
///
/// With a configured limit, the process resident set is measured against
/// that limit; without one, system-wide used memory is measured against
/// total memory.
pub struct SystemMemorySource {
    system: Mutex<System>,
    pid: Option<Pid>,
    limit_override: Option<u64>,
}

impl SystemMemorySource {
    pub fn new(limit_override: Option<u64>) -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
            limit_override,
        }
    }
}

impl MemorySource for SystemMemorySource {
    fn sample(&self) -> MemoryUsage {
        let mut system = self.system.lock();
        match (self.limit_override, self.pid) {
            (Some(limit), Some(pid)) => {
                system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                let used = system.process(pid).map(|p| p.memory()).unwrap_or(0);
                MemoryUsage { used, limit }
            }
            _ => {
                system.refresh_memory();
                MemoryUsage {
                    used: system.used_memory(),
                    limit: system.total_memory(),
                }
            }
        }
    }
}

/// A resource the manager can close during cleanup.
pub trait ManagedResource: Send {
    /// Short label used in cleanup logs
    fn describe(&self) -> String;

    /// Releases the resource. Errors are logged and suppressed.
    fn close(&mut self) -> Result<(), WorkflowError>;
}

/// Named cleanup callback taking the aggressive flag.
struct CleanupTask {
    name: String,
    callback: Box<dyn Fn(bool) + Send + Sync>,
}

/// Owned resource with a wall-clock expiration.
struct ExpirableEntry {
    name: String,
    resource: Box<dyn ManagedResource>,
    expires_at: Instant,
}

impl PartialEq for ExpirableEntry {
    fn eq(&self, other: &Self) -> bool {
        self.expires_at == other.expires_at
    }
}

impl Eq for ExpirableEntry {}

impl PartialOrd for ExpirableEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExpirableEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed so the binary heap pops the earliest expiration first.
        other.expires_at.cmp(&self.expires_at)
    }
}

/// Configuration for [`MemoryManager`].
#[derive(Debug, Clone)]
pub struct MemoryManagerConfig {
    /// Usage fraction at which WARNING starts
    pub warning_threshold: f64,

    /// Usage fraction at which CRITICAL starts
    pub critical_threshold: f64,

    /// Usage fraction at which EMERGENCY starts
    pub emergency_threshold: f64,

    /// Monitor loop period
    pub monitoring_interval: Duration,

    /// Cleanup loop period
    pub cleanup_interval: Duration,

    /// Optional hard limit in bytes for the process; system totals are
    /// used when unset
    pub memory_limit: Option<u64>,

    /// Delay before the post-cleanup usage log of an aggressive cleanup
    pub gc_log_delay: Duration,
}

impl Default for MemoryManagerConfig {
    fn default() -> Self {
        Self {
            warning_threshold: 0.75,
            critical_threshold: 0.85,
            emergency_threshold: 0.95,
            monitoring_interval: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(300),
            memory_limit: None,
            gc_log_delay: Duration::from_millis(500),
        }
    }
}

impl MemoryManagerConfig {
    /// Validates threshold ordering and ranges.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        let thresholds = [
            self.warning_threshold,
            self.critical_threshold,
            self.emergency_threshold,
        ];
        if thresholds.iter().any(|t| !(0.0..=1.0).contains(t) || *t == 0.0) {
            return Err(WorkflowError::invalid_config(
                "memory thresholds must lie in (0, 1]",
            ));
        }
        if !(self.warning_threshold < self.critical_threshold
            && self.critical_threshold < self.emergency_threshold)
        {
            return Err(WorkflowError::invalid_config(
                "memory thresholds must be strictly ascending: warning < critical < emergency",
            ));
        }
        Ok(())
    }
}

/// Process-wide memory manager.
pub struct MemoryManager {
    config: MemoryManagerConfig,
    source: Arc<dyn MemorySource>,
    metrics: Option<Arc<MetricsService>>,
    level: Mutex<MemoryPressureLevel>,
    cleanup_tasks: RwLock<HashMap<String, Arc<CleanupTask>>>,
    weak_resources: RwLock<HashMap<String, Weak<dyn Any + Send + Sync>>>,
    expirable: Mutex<BinaryHeap<ExpirableEntry>>,
    last_cleanup: Mutex<Option<Instant>>,
    cleanup_count: AtomicU64,
    closed: AtomicBool,
    started: AtomicBool,
    token: CancellationToken,
    loops: Mutex<Vec<SupervisedTask<()>>>,
}

impl MemoryManager {
    /// Creates a manager over the given memory source.
    pub fn new(config: MemoryManagerConfig, source: Arc<dyn MemorySource>) -> Result<Self, WorkflowError> {
        config.validate()?;
        Ok(Self {
            config,
            source,
            metrics: None,
            level: Mutex::new(MemoryPressureLevel::Normal),
            cleanup_tasks: RwLock::new(HashMap::new()),
            weak_resources: RwLock::new(HashMap::new()),
            expirable: Mutex::new(BinaryHeap::new()),
            last_cleanup: Mutex::new(None),
            cleanup_count: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            started: AtomicBool::new(false),
            token: CancellationToken::new(),
            loops: Mutex::new(Vec::new()),
        })
    }

    /// Creates a manager backed by the operating system.
    pub fn with_system_source(config: MemoryManagerConfig) -> Result<Self, WorkflowError> {
        let source = Arc::new(SystemMemorySource::new(config.memory_limit));
        Self::new(config, source)
    }

    /// Attaches a metrics service for gauges and cleanup counters.
    pub fn with_metrics(mut self, metrics: Arc<MetricsService>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    // -- state machine ------------------------------------------------------

    /// Maps a usage fraction onto a pressure level.
    pub fn level_for_fraction(&self, fraction: f64) -> MemoryPressureLevel {
        if fraction >= self.config.emergency_threshold {
            MemoryPressureLevel::Emergency
        } else if fraction >= self.config.critical_threshold {
            MemoryPressureLevel::Critical
        } else if fraction >= self.config.warning_threshold {
            MemoryPressureLevel::Warning
        } else {
            MemoryPressureLevel::Normal
        }
    }

    /// Current pressure level
    pub fn current_level(&self) -> MemoryPressureLevel {
        *self.level.lock()
    }

    /// Samples the memory source, updates the level, and publishes the
    /// usage gauge. Returns the sample and the (possibly new) level.
    pub fn sample_and_update(&self) -> (MemoryUsage, MemoryPressureLevel) {
        let usage = self.source.sample();
        let fraction = usage.fraction();
        let new_level = self.level_for_fraction(fraction);

        {
            let mut level = self.level.lock();
            if *level != new_level {
                let previous = *level;
                *level = new_level;
                match new_level {
                    MemoryPressureLevel::Normal => {
                        info!(from = %previous, to = %new_level, usage = %format!("{:.1}%", fraction * 100.0), "memory pressure transition")
                    }
                    MemoryPressureLevel::Warning => {
                        warn!(from = %previous, to = %new_level, usage = %format!("{:.1}%", fraction * 100.0), "memory pressure transition")
                    }
                    MemoryPressureLevel::Critical | MemoryPressureLevel::Emergency => {
                        error!(from = %previous, to = %new_level, usage = %format!("{:.1}%", fraction * 100.0), "memory pressure transition")
                    }
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.set_memory_usage_percentage(fraction * 100.0);
        }

        (usage, new_level)
    }

    // -- registration -------------------------------------------------------

    /// Registers a named cleanup callback.
    pub fn register_cleanup_task(
        &self,
        name: impl Into<String>,
        callback: impl Fn(bool) + Send + Sync + 'static,
    ) -> Result<(), WorkflowError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(WorkflowError::invalid_config("Cleanup task name cannot be blank"));
        }
        let mut tasks = self.cleanup_tasks.write();
        if tasks.contains_key(&name) {
            return Err(WorkflowError::invalid_config(format!(
                "Cleanup task '{}' is already registered",
                name
            )));
        }
        tasks.insert(
            name.clone(),
            Arc::new(CleanupTask {
                name,
                callback: Box::new(callback),
            }),
        );
        Ok(())
    }

    /// Removes a cleanup callback; returns whether it existed.
    pub fn unregister_cleanup_task(&self, name: &str) -> bool {
        self.cleanup_tasks.write().remove(name).is_some()
    }

    /// Number of registered cleanup callbacks
    pub fn cleanup_task_count(&self) -> usize {
        self.cleanup_tasks.read().len()
    }

    /// Tracks an externally-owned resource without keeping it alive.
    ///
    /// The entry is removed automatically once the last owner drops the
    /// resource; the manager never closes weakly-tracked resources.
    pub fn register_weak_resource<R>(&self, name: impl Into<String>, resource: &Arc<R>) -> Result<(), WorkflowError>
    where
        R: Any + Send + Sync,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(WorkflowError::invalid_config("Weak resource name cannot be blank"));
        }
        let mut resources = self.weak_resources.write();
        if resources.contains_key(&name) {
            return Err(WorkflowError::invalid_config(format!(
                "Weak resource '{}' is already registered",
                name
            )));
        }
        let dyn_resource: Arc<dyn Any + Send + Sync> = resource.clone();
        let weak: Weak<dyn Any + Send + Sync> = Arc::downgrade(&dyn_resource);
        resources.insert(name, weak);
        Ok(())
    }

    /// Number of weakly tracked resources (live or not yet swept)
    pub fn weak_resource_count(&self) -> usize {
        self.weak_resources.read().len()
    }

    /// Transfers ownership of a resource to the manager until it expires.
    ///
    /// The resource is closed and dropped by the first cleanup that runs
    /// at or after `expires_at`.
    pub fn register_expirable_resource(
        &self,
        name: impl Into<String>,
        resource: Box<dyn ManagedResource>,
        expires_at: Instant,
    ) -> Result<(), WorkflowError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(WorkflowError::invalid_config(
                "Expirable resource name cannot be blank",
            ));
        }
        if expires_at <= Instant::now() {
            return Err(WorkflowError::invalid_config(format!(
                "Expirable resource '{}' has an expiration in the past",
                name
            )));
        }
        let mut queue = self.expirable.lock();
        if queue.iter().any(|entry| entry.name == name) {
            return Err(WorkflowError::invalid_config(format!(
                "Expirable resource '{}' is already registered",
                name
            )));
        }
        queue.push(ExpirableEntry {
            name,
            resource,
            expires_at,
        });
        Ok(())
    }

    /// Number of queued expirable resources
    pub fn expirable_resource_count(&self) -> usize {
        self.expirable.lock().len()
    }

    /// Number of cleanups performed so far
    pub fn cleanup_runs(&self) -> u64 {
        self.cleanup_count.load(Ordering::Relaxed)
    }

    // -- cleanup ------------------------------------------------------------

    /// Runs one cleanup pass.
    pub fn perform_cleanup(&self, aggressive: bool) {
        let started = Instant::now();
        let usage_before = self.source.sample();

        // Phase 1: close expired resources in expiration order.
        let mut closed = 0usize;
        loop {
            let entry = {
                let mut queue = self.expirable.lock();
                match queue.peek() {
                    Some(head) if head.expires_at <= Instant::now() => queue.pop(),
                    _ => None,
                }
            };
            let Some(mut entry) = entry else { break };
            debug!(resource = %entry.name, detail = %entry.resource.describe(), "closing expired resource");
            if let Err(e) = entry.resource.close() {
                warn!(resource = %entry.name, error = %e, "expired resource failed to close");
            }
            closed += 1;
        }

        // Phase 2: sweep weak registrations whose referent is gone.
        let swept = {
            let mut resources = self.weak_resources.write();
            let before = resources.len();
            resources.retain(|_, weak| weak.strong_count() > 0);
            before - resources.len()
        };

        // Phase 3: run callbacks from a snapshot so concurrent
        // registration cannot deadlock or be skipped mid-iteration.
        let tasks: Vec<Arc<CleanupTask>> = self.cleanup_tasks.read().values().cloned().collect();
        for task in tasks {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| (task.callback)(aggressive)));
            if outcome.is_err() {
                warn!(task = %task.name, "cleanup task panicked; continuing with remaining tasks");
            }
        }

        // Phase 4: aggressive cleanups log usage again after a short delay
        // so the effect of the closures is visible.
        if aggressive {
            let source = Arc::clone(&self.source);
            let delay = self.config.gc_log_delay;
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let usage = source.sample();
                    info!(
                        usage = %format!("{:.1}%", usage.fraction() * 100.0),
                        "post-aggressive-cleanup memory usage"
                    );
                });
            } else {
                let usage = source.sample();
                info!(
                    usage = %format!("{:.1}%", usage.fraction() * 100.0),
                    "post-aggressive-cleanup memory usage"
                );
            }
        }

        // Phase 5: metrics and bookkeeping.
        let duration = started.elapsed();
        let usage_after = self.source.sample();
        let freed = usage_before.used.saturating_sub(usage_after.used);
        let total = self.cleanup_count.fetch_add(1, Ordering::Relaxed) + 1;
        *self.last_cleanup.lock() = Some(Instant::now());

        if let Some(metrics) = &self.metrics {
            metrics.record_memory_cleanup(duration, freed);
        }

        info!(
            aggressive,
            closed,
            swept,
            freed_bytes = freed,
            duration_ms = duration.as_millis() as u64,
            total_cleanups = total,
            "memory cleanup completed"
        );
    }

    // -- background loops ---------------------------------------------------

    /// Starts the monitor and cleanup loops. Idempotent; must be called
    /// from within a tokio runtime. Callers keep their own handle and
    /// pass a clone: `Arc::clone(&manager).start()`.
    pub fn start(self: Arc<Self>) {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let monitor = {
            let manager = Arc::clone(&self);
            let token = self.token.clone();
            SupervisedTask::spawn("memory-monitor", async move {
                let mut ticker = tokio::time::interval(manager.config.monitoring_interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => return Ok(()),
                        _ = ticker.tick() => {
                            let (_, level) = manager.sample_and_update();
                            if level >= MemoryPressureLevel::Critical {
                                let due = (*manager.last_cleanup.lock())
                                    .map(|at| at.elapsed() >= MIN_REACTIVE_CLEANUP_SPACING)
                                    .unwrap_or(true);
                                if due {
                                    manager.perform_cleanup(level >= MemoryPressureLevel::Emergency);
                                }
                            }
                        }
                    }
                }
            })
        };

        let cleanup = {
            let manager = Arc::clone(&self);
            let token = self.token.clone();
            SupervisedTask::spawn("memory-cleanup", async move {
                let mut ticker = tokio::time::interval(manager.config.cleanup_interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                // Skip the immediate first tick.
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = token.cancelled() => return Ok(()),
                        _ = ticker.tick() => manager.perform_cleanup(false),
                    }
                }
            })
        };

        self.loops.lock().extend([monitor, cleanup]);
    }

    /// Stops the background loops and runs one final cleanup. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.token.cancel();

        let loops: Vec<_> = self.loops.lock().drain(..).collect();
        for task in loops {
            if let Err(e) = task.join_within(CLOSE_GRACE_PERIOD).await {
                warn!(error = %e, "memory manager loop did not stop cleanly");
            }
        }

        self.perform_cleanup(false);
        info!("memory manager closed");
    }
}
