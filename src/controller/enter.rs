//! Entering desktop windowing: moving tasks into desks and bringing them up

use super::DesktopController;
use crate::config::DesktopFeatures;
use crate::error::{DeskError, DeskResult, OptionExt};
use crate::event::{DesktopEvent, EnterReason, ExitReason, UnminimizeReason};
use crate::geometry::Rect;
use crate::ids::{DeskId, DisplayId, TaskId, TransitionToken};
use crate::repository::BoundsSlot;
use crate::task::{RunningTask, WindowingMode};
use crate::transition::{
    AnimationHandler, BatchOp, MutationBatch, PendingEffects, RepositoryEffect, TransitionKind,
};

impl DesktopController {
    /// Move `task` into `desk`, or the target desk of its display
    ///
    /// Tasks that cannot run in a desk are sent fullscreen instead.
    pub fn move_task_to_desk(
        &mut self,
        task: TaskId,
        desk: Option<DeskId>,
        reason: EnterReason,
    ) -> DeskResult<TransitionToken> {
        let running = self.running_task(task)?;
        if !self.compat.is_compatible(&running) {
            tracing::info!("{task} ({}) cannot enter a desk, keeping it fullscreen", running.app);
            return self.move_task_to_fullscreen(task, ExitReason::Incompatible);
        }

        let desk = match desk {
            Some(desk) => desk,
            None => self
                .repo()
                .target_desk_id(running.display)
                .ok_or_log(|| DeskError::NoDeskOnDisplay(running.display))?,
        };
        let display = self.desk_display(desk, running.display)?;
        let (batch, effects) = self.prepare_move_task_to_desk(&running, display, desk, reason, None)?;
        Ok(self.submit(
            TransitionKind::EnterDesktop(reason),
            batch,
            effects,
            Some(AnimationHandler::Desktop),
        ))
    }

    /// Batch and effects that move `running` into `desk` on `display`
    ///
    /// `bounds` overrides the computed initial bounds, as when a drag is
    /// released at a specific spot.
    pub fn prepare_move_task_to_desk(
        &self,
        running: &RunningTask,
        display: DisplayId,
        desk: DeskId,
        reason: EnterReason,
        bounds: Option<Rect>,
    ) -> DeskResult<(MutationBatch, PendingEffects)> {
        let task = running.id;
        if !self.compat.is_compatible(running) {
            tracing::warn!("{task} ({}) cannot enter {desk}", running.app);
            return Err(DeskError::IncompatibleTask(task));
        }
        let info = self.display_info(display)?;
        let repo = self.repo();
        let mut batch = MutationBatch::new();
        let mut effects = PendingEffects::new();

        if running.mode == WindowingMode::MultiWindow {
            batch.push(BatchOp::ExitSplit { task });
        }

        if let Some(immersive) = repo
            .desk(desk)
            .and_then(|d| d.full_immersive_task)
            .filter(|t| *t != task)
        {
            tracing::debug!("{immersive} leaves immersive mode for {task}");
            batch.push(BatchOp::ExitImmersive { task: immersive });
            effects.push(RepositoryEffect::SetFullImmersive {
                display,
                task: immersive,
                immersive: false,
            });
        }

        let bounds = match bounds {
            Some(bounds) => bounds,
            None if running.is_freeform() && !running.bounds.is_empty() => running.bounds,
            None => self.initial_bounds(running, desk, &info),
        };

        batch
            .push(BatchOp::SetWindowingMode {
                task,
                mode: WindowingMode::Freeform,
            })
            .push(BatchOp::SetBounds { task, bounds })
            .push(BatchOp::MoveTaskToDesk { task, desk });

        let entering = !repo.is_desk_active(desk);
        if entering {
            self.add_desk_activation(display, desk, Some(task), reason, &mut batch, &mut effects);
        }
        batch.push(BatchOp::ReorderToTop { task });

        self.apply_task_limit(display, desk, Some(task), false, &mut batch, &mut effects);
        effects.push(RepositoryEffect::AddTaskToDesk {
            display,
            desk,
            task,
            visible: true,
        });
        Ok((batch, effects))
    }

    /// Where a task entering `desk` is placed
    ///
    /// A closing window of the same app hands its bounds over, otherwise the
    /// default bounds are cascaded past the desk's visible windows.
    fn initial_bounds(&self, running: &RunningTask, desk: DeskId, info: &crate::display::DisplayInfo) -> Rect {
        let repo = self.repo();
        let Some(current) = repo.desk(desk) else {
            return self.default_bounds(info, 0);
        };

        if self.has(DesktopFeatures::INHERIT_CLOSING_BOUNDS) {
            let inherited = current
                .closing_tasks
                .iter()
                .filter_map(|closing| self.tasks.task(*closing))
                .find(|closing| closing.app == running.app && !closing.bounds.is_empty())
                .map(|closing| closing.bounds);
            if let Some(bounds) = inherited {
                tracing::debug!("{} inherits bounds {bounds:?} from a closing window", running.id);
                return bounds;
            }
        }

        let others = current
            .visible_tasks
            .iter()
            .filter(|t| **t != running.id && !current.closing_tasks.contains(t))
            .count();
        self.default_bounds(info, others)
    }

    /// Bring `task` to front, unminimizing it if needed
    pub fn move_task_to_front(
        &mut self,
        task: TaskId,
        reason: UnminimizeReason,
    ) -> DeskResult<TransitionToken> {
        self.bring_to_front(task, Some(reason))
    }

    /// Show a task from the taskbar or launcher, starting it if it is not running
    pub fn launch_task(&mut self, task: TaskId) -> DeskResult<TransitionToken> {
        self.bring_to_front(task, None)
    }

    fn bring_to_front(
        &mut self,
        task: TaskId,
        unminimize: Option<UnminimizeReason>,
    ) -> DeskResult<TransitionToken> {
        let running = self.running_task(task)?;
        let repo = self.repo();

        let Some(desk) = repo.desk_id_for_task(task) else {
            if repo.is_any_desk_active(running.display) && self.compat.is_compatible(&running) {
                let reason = if unminimize.is_some() {
                    EnterReason::TaskToFront
                } else {
                    EnterReason::AppLaunch
                };
                return self.move_task_to_desk(task, None, reason);
            }
            let mut batch = MutationBatch::new();
            let kind = if running.running {
                batch.push(BatchOp::ReorderToTop { task });
                TransitionKind::ToFront
            } else {
                batch.push(BatchOp::StartTask { task });
                TransitionKind::Launch
            };
            return Ok(self.submit(kind, batch, PendingEffects::new(), None));
        };

        let display = self.desk_display(desk, running.display)?;
        let was_minimized = repo.is_minimized_task(task);
        let mut batch = MutationBatch::new();
        let mut effects = PendingEffects::new();

        if !repo.is_desk_active(desk) {
            self.add_desk_activation(
                display,
                desk,
                Some(task),
                EnterReason::TaskToFront,
                &mut batch,
                &mut effects,
            );
        }
        if was_minimized {
            if let Some(bounds) = repo.saved_bounds(task, BoundsSlot::BeforeMinimize) {
                batch.push(BatchOp::SetBounds { task, bounds });
                effects.push(RepositoryEffect::ClearBounds {
                    task,
                    slot: BoundsSlot::BeforeMinimize,
                });
            }
        }
        let kind = if running.running {
            batch.push(BatchOp::ReorderToTop { task });
            TransitionKind::ToFront
        } else {
            batch.push(BatchOp::StartTask { task });
            TransitionKind::Launch
        };

        self.apply_task_limit(display, desk, Some(task), false, &mut batch, &mut effects);
        effects.push(RepositoryEffect::AddTaskToDesk {
            display,
            desk,
            task,
            visible: true,
        });

        if !running.running {
            effects.emit(DesktopEvent::TaskLaunched { task, desk });
        } else if was_minimized {
            effects.emit(DesktopEvent::TaskUnminimized {
                task,
                reason: unminimize.unwrap_or(UnminimizeReason::TaskLaunch),
            });
        }

        Ok(self.submit(kind, batch, effects, Some(AnimationHandler::Desktop)))
    }

    /// Start another instance of `task`'s app in the same desk
    pub fn open_new_instance(&mut self, task: TaskId) -> DeskResult<TransitionToken> {
        let running = self.running_task(task)?;
        let repo = self.repo();
        let desk = match repo.desk_id_for_task(task) {
            Some(desk) => desk,
            None => repo
                .target_desk_id(running.display)
                .ok_or_log(|| DeskError::NoDeskOnDisplay(running.display))?,
        };
        let display = self.desk_display(desk, running.display)?;
        let info = self.display_info(display)?;

        let visible = repo
            .desk(desk)
            .map_or(0, |d| d.visible_tasks.len() - d.closing_tasks.intersection(&d.visible_tasks).count());
        let bounds = self.default_bounds(&info, visible);

        let mut batch = MutationBatch::new();
        let mut effects = PendingEffects::new();
        if !repo.is_desk_active(desk) {
            self.add_desk_activation(display, desk, None, EnterReason::AppLaunch, &mut batch, &mut effects);
        }
        batch.push(BatchOp::StartNewInstance {
            app: running.app.clone(),
            desk,
            bounds,
        });
        self.apply_task_limit(display, desk, None, true, &mut batch, &mut effects);

        tracing::debug!("New instance of {} in {desk} at {bounds:?}", running.app);
        Ok(self.submit(
            TransitionKind::Launch,
            batch,
            effects,
            Some(AnimationHandler::Desktop),
        ))
    }
}
