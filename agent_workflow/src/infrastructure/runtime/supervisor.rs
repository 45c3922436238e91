// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Background Task Supervision
//!
//! The orchestrator's long-lived loops (memory monitor, memory cleanup)
//! run as [`SupervisedTask`]s: named handles whose failures are logged
//! with the task name, whose panics surface as typed errors instead of
//! being swallowed by the runtime, and which can be joined against a
//! deadline during shutdown. A task that overruns its deadline is
//! aborted so `close` can always complete.

use std::future::Future;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tracing::error;

use agent_workflow_domain::WorkflowError;

/// Named handle to a supervised background task.
pub struct SupervisedTask<T> {
    name: &'static str,
    handle: JoinHandle<Result<T, WorkflowError>>,
}

impl<T: Send + 'static> SupervisedTask<T> {
    /// Spawns the future on the tokio runtime under the given name.
    ///
    /// A failing task is logged at spawn-side with its name; the error is
    /// still returned to whoever joins the handle.
    pub fn spawn<F>(name: &'static str, fut: F) -> Self
    where
        F: Future<Output = Result<T, WorkflowError>> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let result = fut.await;
            if let Err(e) = &result {
                error!(task = name, error = %e, "background task failed");
            }
            result
        });

        Self { name, handle }
    }

    /// Task name used in logs and error messages
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Waits for the task to finish.
    pub async fn join(self) -> Result<T, WorkflowError> {
        let Self { name, handle } = self;
        map_join(name, handle.await)
    }

    /// Waits for the task with a deadline, aborting it on overrun.
    ///
    /// Cooperative loops that observe a cancellation token normally exit
    /// well inside the deadline; the abort is the backstop for a loop
    /// stuck in a callback.
    pub async fn join_within(self, deadline: Duration) -> Result<T, WorkflowError> {
        let Self { name, handle } = self;
        let abort = handle.abort_handle();

        match tokio::time::timeout(deadline, handle).await {
            Ok(join_result) => map_join(name, join_result),
            Err(_) => {
                abort.abort();
                Err(WorkflowError::timeout_error(format!(
                    "background task '{}' exceeded its shutdown deadline",
                    name
                )))
            }
        }
    }
}

/// Converts a join outcome into the domain error model, naming the task.
fn map_join<T>(name: &'static str, joined: Result<Result<T, WorkflowError>, JoinError>) -> Result<T, WorkflowError> {
    match joined {
        Ok(task_result) => task_result,
        Err(e) if e.is_panic() => Err(WorkflowError::internal_error(format!(
            "background task '{}' panicked",
            name
        ))),
        Err(_) => Err(WorkflowError::cancelled(format!(
            "background task '{}' was aborted",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_returns_task_value() {
        let task = SupervisedTask::spawn("answer", async { Ok::<_, WorkflowError>(21) });
        assert_eq!(task.name(), "answer");
        assert_eq!(task.join().await.unwrap(), 21);
    }

    #[tokio::test]
    async fn test_task_error_reaches_joiner() {
        let task = SupervisedTask::spawn("doomed", async {
            Err::<(), _>(WorkflowError::resource_exhausted("no scheduler slots"))
        });
        let err = task.join().await.unwrap_err();
        assert!(matches!(err, WorkflowError::ResourceExhausted(_)));
    }

    #[tokio::test]
    async fn test_panic_surfaces_as_named_internal_error() {
        let task = SupervisedTask::spawn("panicky", async {
            if std::env::var("NEVER_SET_VARIABLE").is_err() {
                panic!("loop bug");
            }
            Ok::<(), WorkflowError>(())
        });

        let err = task.join().await.unwrap_err();
        assert!(matches!(err, WorkflowError::InternalError(_)));
        assert!(err.to_string().contains("panicky"));
    }

    #[tokio::test]
    async fn test_join_within_aborts_overrunning_task() {
        let task = SupervisedTask::spawn("stuck-loop", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<(), WorkflowError>(())
        });

        let err = task.join_within(Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, WorkflowError::TimeoutError(_)));
        assert!(err.to_string().contains("stuck-loop"));
    }

    #[tokio::test]
    async fn test_join_within_passes_prompt_results_through() {
        let task = SupervisedTask::spawn("quick", async { Ok::<_, WorkflowError>("done") });
        assert_eq!(task.join_within(Duration::from_secs(1)).await.unwrap(), "done");
    }
}
