//! Desk task limit policy

use crate::ids::TaskId;

/// Picks the task to minimize when a desk would exceed its task limit
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskLimiter {
    max_tasks: Option<usize>,
}

impl TaskLimiter {
    pub fn new(max_tasks: Option<usize>) -> Self {
        Self { max_tasks }
    }

    pub fn max_tasks(&self) -> Option<usize> {
        self.max_tasks
    }

    /// The backmost task to minimize, if any
    ///
    /// `expanded` is front to back. `new_task` goes to the front; a pending
    /// launch whose task id is not known yet counts as one more task.
    pub fn task_to_minimize(
        &self,
        expanded: &[TaskId],
        new_task: Option<TaskId>,
        pending_launch: bool,
    ) -> Option<TaskId> {
        let limit = self.max_tasks?;
        let ordered: Vec<TaskId> = new_task
            .into_iter()
            .chain(expanded.iter().copied().filter(|t| Some(*t) != new_task))
            .collect();
        let count = ordered.len() + usize::from(pending_launch);
        if count <= limit {
            return None;
        }
        let victim = ordered.last().copied().filter(|t| Some(*t) != new_task);
        if let Some(victim) = victim {
            tracing::debug!("Task limit {limit} reached, minimizing {victim}");
        }
        victim
    }
}
