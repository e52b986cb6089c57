//! Per-desk task bookkeeping

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::event::TileSide;
use crate::ids::{DeskId, DisplayId, TaskId};

/// A collection of freeform tasks presented together on one display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Desk {
    pub id: DeskId,
    pub display: DisplayId,
    /// Tasks shown in this desk and not yet fully removed
    pub active_tasks: BTreeSet<TaskId>,
    /// Active tasks currently on screen
    pub visible_tasks: BTreeSet<TaskId>,
    /// Active tasks hidden by a minimize
    pub minimized_tasks: BTreeSet<TaskId>,
    /// Active tasks mid-close
    pub closing_tasks: BTreeSet<TaskId>,
    /// Front to back stacking order of the active tasks
    pub freeform_tasks_in_z_order: Vec<TaskId>,
    pub full_immersive_task: Option<TaskId>,
    pub top_transparent_fullscreen_task: Option<TaskId>,
    pub left_tiled_task: Option<TaskId>,
    pub right_tiled_task: Option<TaskId>,
    pub pip_task: Option<TaskId>,
}

impl Desk {
    pub fn new(id: DeskId, display: DisplayId) -> Self {
        Self {
            id,
            display,
            active_tasks: BTreeSet::new(),
            visible_tasks: BTreeSet::new(),
            minimized_tasks: BTreeSet::new(),
            closing_tasks: BTreeSet::new(),
            freeform_tasks_in_z_order: Vec::new(),
            full_immersive_task: None,
            top_transparent_fullscreen_task: None,
            left_tiled_task: None,
            right_tiled_task: None,
            pip_task: None,
        }
    }

    pub fn contains(&self, task: TaskId) -> bool {
        self.active_tasks.contains(&task)
    }

    /// Register `task` as active and move it to the front of the z-order
    pub fn bring_to_front(&mut self, task: TaskId) {
        self.active_tasks.insert(task);
        self.freeform_tasks_in_z_order.retain(|t| *t != task);
        self.freeform_tasks_in_z_order.insert(0, task);
    }

    /// Set visibility; a visible task is never minimized
    pub fn set_visible(&mut self, task: TaskId, visible: bool) {
        if visible {
            self.visible_tasks.insert(task);
            self.minimized_tasks.remove(&task);
        } else {
            self.visible_tasks.remove(&task);
        }
    }

    /// Remove every trace of `task` from this desk
    ///
    /// Returns true if the task was active here.
    pub fn remove_task(&mut self, task: TaskId) -> bool {
        let was_active = self.active_tasks.remove(&task);
        self.visible_tasks.remove(&task);
        self.minimized_tasks.remove(&task);
        self.closing_tasks.remove(&task);
        self.freeform_tasks_in_z_order.retain(|t| *t != task);
        for slot in [
            &mut self.full_immersive_task,
            &mut self.top_transparent_fullscreen_task,
            &mut self.left_tiled_task,
            &mut self.right_tiled_task,
            &mut self.pip_task,
        ] {
            if *slot == Some(task) {
                *slot = None;
            }
        }
        was_active
    }

    /// Drop all tasks, keeping identity
    pub fn clear(&mut self) {
        *self = Desk::new(self.id, self.display);
    }

    /// Active, non-minimized tasks from front to back
    pub fn expanded_tasks_ordered(&self) -> Vec<TaskId> {
        self.freeform_tasks_in_z_order
            .iter()
            .copied()
            .filter(|t| !self.minimized_tasks.contains(t))
            .collect()
    }

    /// `visible - closing - minimized == {task}`
    pub fn is_only_visible_non_closing_task(&self, task: TaskId) -> bool {
        let mut remaining = self
            .visible_tasks
            .iter()
            .filter(|t| !self.closing_tasks.contains(t) && !self.minimized_tasks.contains(t));
        remaining.next() == Some(&task) && remaining.next().is_none()
    }

    pub fn tiled_task(&self, side: TileSide) -> Option<TaskId> {
        match side {
            TileSide::Left => self.left_tiled_task,
            TileSide::Right => self.right_tiled_task,
        }
    }

    /// Tile `task` on `side`, clearing it from the opposite side
    pub fn set_tiled_task(&mut self, side: TileSide, task: Option<TaskId>) {
        if let Some(task) = task {
            self.untile(task);
        }
        match side {
            TileSide::Left => self.left_tiled_task = task,
            TileSide::Right => self.right_tiled_task = task,
        }
    }

    pub fn untile(&mut self, task: TaskId) {
        if self.left_tiled_task == Some(task) {
            self.left_tiled_task = None;
        }
        if self.right_tiled_task == Some(task) {
            self.right_tiled_task = None;
        }
    }
}
