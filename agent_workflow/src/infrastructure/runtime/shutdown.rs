// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Shutdown and Execution Draining
//!
//! Cancellation is honoured at stage boundaries: a workflow that observes
//! a cancelled token finalises with the stages completed so far instead
//! of starting the next one. This module provides the two pieces behind
//! that contract:
//!
//! - [`CancellationToken`], the clone-able signal observed by the
//!   workflow driver between stages and by the memory manager's
//!   background loops;
//! - [`ShutdownCoordinator`], which owns a token, counts in-flight
//!   workflow executions through RAII [`ExecutionGuard`]s, and on
//!   [`ShutdownCoordinator::shutdown`] cancels the token and waits for
//!   the in-flight count to drain within a grace period.
//!
//! A drain can only make progress at stage boundaries, so the grace
//! period should comfortably exceed the longest expected single stage;
//! an agent that ignores cancellation mid-call is reported as an
//! unfinished execution when the grace period expires.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{info, warn};

/// Default grace period for draining in-flight executions (in seconds)
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 10;

/// Shared state behind every clone of one token.
struct TokenState {
    cancelled: AtomicBool,
    wakers: Notify,
}

/// Clone-able cancellation signal.
///
/// All clones observe the same state; cancelling any clone wakes every
/// waiter. Once cancelled, a token stays cancelled.
#[derive(Clone)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl CancellationToken {
    /// Creates an uncancelled token.
    pub fn new() -> Self {
        Self {
            state: Arc::new(TokenState {
                cancelled: AtomicBool::new(false),
                wakers: Notify::new(),
            }),
        }
    }

    /// Cancels the token and wakes every waiter.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        self.state.wakers.notify_waiters();
    }

    /// Checks cancellation without blocking.
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Waits until the token is cancelled.
    pub async fn cancelled(&self) {
        // Register interest before the flag re-check so a cancel landing
        // between the check and the await cannot be missed.
        let mut waiter = std::pin::pin!(self.state.wakers.notified());
        waiter.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        waiter.await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared state behind every clone of one coordinator.
struct CoordinatorState {
    token: CancellationToken,
    in_flight: AtomicUsize,
    drained: Notify,
}

/// RAII marker for one in-flight workflow execution.
///
/// The workflow driver holds a guard for the duration of
/// `execute_workflow`; dropping the last guard wakes a pending
/// [`ShutdownCoordinator::shutdown`] call.
pub struct ExecutionGuard {
    state: Arc<CoordinatorState>,
}

impl Drop for ExecutionGuard {
    fn drop(&mut self) {
        if self.state.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.state.drained.notify_waiters();
        }
    }
}

/// Coordinates graceful shutdown across workflow executions.
///
/// One coordinator is shared between the embedding application (which
/// calls [`shutdown`](Self::shutdown)) and the workflow services whose
/// executions it tracks.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    state: Arc<CoordinatorState>,
    grace_period: Duration,
}

impl ShutdownCoordinator {
    /// Creates a coordinator with the given drain grace period.
    pub fn new(grace_period: Duration) -> Self {
        Self {
            state: Arc::new(CoordinatorState {
                token: CancellationToken::new(),
                in_flight: AtomicUsize::new(0),
                drained: Notify::new(),
            }),
            grace_period,
        }
    }

    /// The cancellation token workflow drivers observe at stage
    /// boundaries
    pub fn token(&self) -> CancellationToken {
        self.state.token.clone()
    }

    /// Registers one in-flight execution; the returned guard must live
    /// for the duration of the execution.
    pub fn track_execution(&self) -> ExecutionGuard {
        self.state.in_flight.fetch_add(1, Ordering::SeqCst);
        ExecutionGuard {
            state: Arc::clone(&self.state),
        }
    }

    /// Number of executions currently in flight
    pub fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    /// Whether shutdown has been requested
    pub fn is_shutting_down(&self) -> bool {
        self.state.token.is_cancelled()
    }

    /// Cancels the token and waits for in-flight executions to drain.
    ///
    /// Executions finalise at their next stage boundary, so the wait is
    /// bounded by the slowest running stage. Returns `true` when every
    /// tracked execution finished within the grace period; `false` leaves
    /// the stragglers running (they still observe the cancelled token).
    /// Safe to call more than once.
    pub async fn shutdown(&self) -> bool {
        self.state.token.cancel();

        let deadline = tokio::time::Instant::now() + self.grace_period;
        loop {
            if self.in_flight() == 0 {
                info!("all workflow executions drained");
                return true;
            }

            let mut drained = std::pin::pin!(self.state.drained.notified());
            drained.as_mut().enable();
            if self.in_flight() == 0 {
                return true;
            }

            tokio::select! {
                _ = &mut drained => {}
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(
                        in_flight = self.in_flight(),
                        "shutdown grace period expired with executions still in flight"
                    );
                    return false;
                }
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_GRACE_PERIOD_SECS))
    }
}
