//! Keyboard shortcut task lookup
//!
//! Shortcuts that focus or launch an app first look for a task of that app.
//! The search may run on a runtime; callers either await the result or, when
//! their thread is not driving a runtime, block on it.

use std::collections::BTreeSet;

use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::error::{DeskError, DeskResult};
use crate::ids::TaskId;
use crate::task::RunningTask;

/// Result of a task lookup that may still be in flight
#[derive(Debug)]
pub struct PendingLookup {
    rx: oneshot::Receiver<Option<TaskId>>,
}

impl PendingLookup {
    /// A lookup that already has its answer
    pub fn ready(result: Option<TaskId>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }

    /// Run `job` on the blocking pool of `handle`
    pub fn spawn<F>(handle: &Handle, job: F) -> Self
    where
        F: FnOnce() -> Option<TaskId> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        handle.spawn_blocking(move || {
            if tx.send(job()).is_err() {
                tracing::debug!("Task lookup finished after its caller gave up");
            }
        });
        Self { rx }
    }

    pub async fn resolve(self) -> DeskResult<Option<TaskId>> {
        self.rx.await.map_err(|_| DeskError::LookupCancelled)
    }

    /// Block the current thread until the lookup completes
    ///
    /// Refused on threads that are driving an async runtime.
    pub fn wait(self) -> DeskResult<Option<TaskId>> {
        if Handle::try_current().is_ok() {
            return Err(DeskError::InvalidOperation(
                "cannot block on a task lookup inside an async runtime".to_string(),
            ));
        }
        self.rx.blocking_recv().map_err(|_| DeskError::LookupCancelled)
    }
}

/// Pick the task a shortcut for `app` should focus
///
/// Tasks already in a desk win over others; within each group the front-most
/// running task is chosen. `tasks` is front to back.
pub fn find_task_for_app(tasks: &[RunningTask], in_desks: &BTreeSet<TaskId>, app: &str) -> Option<TaskId> {
    let mut candidates = tasks.iter().filter(|task| task.app == app && task.running);
    let first = candidates.clone().next().map(|task| task.id);
    candidates
        .find(|task| in_desks.contains(&task.id))
        .map(|task| task.id)
        .or(first)
}
