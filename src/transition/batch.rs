//! Window-tree mutation batches

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::ids::{DeskId, DisplayId, TaskId};
use crate::task::WindowingMode;

/// One window-tree mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BatchOp {
    ReorderToTop { task: TaskId },
    ReorderToBack { task: TaskId },
    SetBounds { task: TaskId, bounds: Rect },
    SetWindowingMode { task: TaskId, mode: WindowingMode },
    /// Start a task that is not running
    StartTask { task: TaskId },
    RemoveTask { task: TaskId },
    ExitSplit { task: TaskId },
    ExitImmersive { task: TaskId },
    /// Reparent a task under a desk root
    MoveTaskToDesk { task: TaskId, desk: DeskId },
    ActivateDesk { display: DisplayId, desk: DeskId },
    DeactivateDesk { desk: DeskId },
    RemoveDeskRoot { desk: DeskId },
    LaunchHome { display: DisplayId },
    ShowWallpaper { display: DisplayId },
    RemoveWallpaper { display: DisplayId },
    ReparentToDisplay { task: TaskId, display: DisplayId },
    ReorderDisplayToTop { display: DisplayId },
    EnterPip { task: TaskId },
    StartNewInstance { app: String, desk: DeskId, bounds: Rect },
    /// Hand the task to split-select placement
    SplitSelect { task: TaskId, left: bool },
    /// Put windows back in the order they had before a gesture
    RestoreOrder { task: TaskId },
}

impl BatchOp {
    /// The task this op targets, if any
    pub fn task(&self) -> Option<TaskId> {
        match self {
            BatchOp::ReorderToTop { task }
            | BatchOp::ReorderToBack { task }
            | BatchOp::SetBounds { task, .. }
            | BatchOp::SetWindowingMode { task, .. }
            | BatchOp::StartTask { task }
            | BatchOp::RemoveTask { task }
            | BatchOp::ExitSplit { task }
            | BatchOp::ExitImmersive { task }
            | BatchOp::MoveTaskToDesk { task, .. }
            | BatchOp::ReparentToDisplay { task, .. }
            | BatchOp::EnterPip { task }
            | BatchOp::SplitSelect { task, .. }
            | BatchOp::RestoreOrder { task } => Some(*task),
            BatchOp::ActivateDesk { .. }
            | BatchOp::DeactivateDesk { .. }
            | BatchOp::RemoveDeskRoot { .. }
            | BatchOp::LaunchHome { .. }
            | BatchOp::ShowWallpaper { .. }
            | BatchOp::RemoveWallpaper { .. }
            | BatchOp::ReorderDisplayToTop { .. }
            | BatchOp::StartNewInstance { .. } => None,
        }
    }
}

/// Ordered mutations applied atomically by one transition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationBatch {
    ops: Vec<BatchOp>,
}

impl MutationBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: BatchOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    /// Append `other` after this batch's ops
    pub fn merge(&mut self, other: MutationBatch) {
        self.ops.extend(other.ops);
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn contains(&self, op: &BatchOp) -> bool {
        self.ops.contains(op)
    }

    pub fn any(&self, predicate: impl Fn(&BatchOp) -> bool) -> bool {
        self.ops.iter().any(predicate)
    }

    /// Final bounds set for `task`, if any
    pub fn bounds_for(&self, task: TaskId) -> Option<Rect> {
        self.ops.iter().rev().find_map(|op| match op {
            BatchOp::SetBounds { task: t, bounds } if *t == task => Some(*bounds),
            _ => None,
        })
    }
}
