//! Deferred repository mutations
//!
//! The controller decides synchronously what the repository should look like
//! once a transition plays, but the repository must not change until the
//! transition is confirmed started. Decisions are recorded as
//! [`RepositoryEffect`] values and run exactly once by consuming the
//! [`PendingEffects`] that hold them.

use serde::{Deserialize, Serialize};

use crate::error::DeskResult;
use crate::event::{DesktopEvent, TileSide};
use crate::geometry::Rect;
use crate::ids::{DeskId, DisplayId, TaskId};
use crate::repository::{BoundsSlot, DeskRepository};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum RepositoryEffect {
    ActivateDesk {
        display: DisplayId,
        desk: DeskId,
    },
    DeactivateDesk {
        desk: DeskId,
    },
    AddTaskToDesk {
        display: DisplayId,
        desk: DeskId,
        task: TaskId,
        visible: bool,
    },
    MinimizeTask {
        display: DisplayId,
        task: TaskId,
    },
    UnminimizeTask {
        display: DisplayId,
        task: TaskId,
    },
    SetPipTask {
        desk: DeskId,
        task: Option<TaskId>,
    },
    RemoveTask {
        display: DisplayId,
        task: TaskId,
    },
    RemoveTaskFromDesk {
        desk: DeskId,
        task: TaskId,
    },
    RemoveDesk {
        desk: DeskId,
    },
    SaveBounds {
        task: TaskId,
        slot: BoundsSlot,
        bounds: Rect,
    },
    ClearBounds {
        task: TaskId,
        slot: BoundsSlot,
    },
    SetFullImmersive {
        display: DisplayId,
        task: TaskId,
        immersive: bool,
    },
    SetTiled {
        desk: DeskId,
        side: TileSide,
        task: TaskId,
    },
    Untile {
        desk: DeskId,
        task: TaskId,
    },
    /// Publish an event once the transition starts
    Emit(DesktopEvent),
}

impl RepositoryEffect {
    fn apply(self, repo: &mut DeskRepository, events: &mut Vec<DesktopEvent>) -> DeskResult<()> {
        match self {
            RepositoryEffect::ActivateDesk { display, desk } => repo.set_active_desk(display, desk)?,
            RepositoryEffect::DeactivateDesk { desk } => repo.set_desk_inactive(desk),
            RepositoryEffect::AddTaskToDesk {
                display,
                desk,
                task,
                visible,
            } => repo.add_task_to_desk(display, desk, task, visible)?,
            RepositoryEffect::MinimizeTask { display, task } => repo.minimize_task(display, task)?,
            RepositoryEffect::UnminimizeTask { display, task } => {
                repo.unminimize_task(display, task)?
            }
            RepositoryEffect::SetPipTask { desk, task } => repo.set_pip_task(desk, task)?,
            RepositoryEffect::RemoveTask { display, task } => {
                repo.remove_task(display, task);
            }
            RepositoryEffect::RemoveTaskFromDesk { desk, task } => {
                repo.remove_task_from_desk(desk, task)?;
            }
            RepositoryEffect::RemoveDesk { desk } => {
                let removed = repo.remove_desk(desk)?;
                tracing::debug!("{desk} removed with {} tasks", removed.len());
            }
            RepositoryEffect::SaveBounds { task, slot, bounds } => {
                repo.save_bounds(task, slot, bounds)
            }
            RepositoryEffect::ClearBounds { task, slot } => {
                repo.remove_saved_bounds(task, slot);
            }
            RepositoryEffect::SetFullImmersive {
                display,
                task,
                immersive,
            } => repo.set_task_in_full_immersive(display, task, immersive)?,
            RepositoryEffect::SetTiled { desk, side, task } => {
                repo.set_tiled_task(desk, side, Some(task))?
            }
            RepositoryEffect::Untile { desk, task } => repo.untile_task(desk, task)?,
            RepositoryEffect::Emit(event) => events.push(event),
        }
        Ok(())
    }
}

/// Effects to run when a transition is confirmed started
#[must_use = "pending effects must be registered against a transition or run"]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingEffects {
    effects: Vec<RepositoryEffect>,
}

impl PendingEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, effect: RepositoryEffect) {
        self.effects.push(effect);
    }

    pub fn emit(&mut self, event: DesktopEvent) {
        self.effects.push(RepositoryEffect::Emit(event));
    }

    /// Append `other` after these effects
    pub fn merge(&mut self, other: PendingEffects) {
        self.effects.extend(other.effects);
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn effects(&self) -> &[RepositoryEffect] {
        &self.effects
    }

    /// Apply the effects in order, returning the events to publish
    ///
    /// Stops at the first failing effect.
    pub fn run(self, repo: &mut DeskRepository) -> DeskResult<Vec<DesktopEvent>> {
        let mut events = Vec::new();
        for effect in self.effects {
            effect.apply(repo, &mut events)?;
        }
        Ok(events)
    }
}
