//! Bounds changes that keep desk membership: snap, maximize, immersive, and
//! moving a task to another display

use super::DesktopController;
use crate::config::DesktopFeatures;
use crate::display::scale_bounds_between;
use crate::error::{DeskError, DeskResult, OptionExt};
use crate::event::{DesktopEvent, EnterReason, ExitReason, TileSide};
use crate::geometry::Rect;
use crate::ids::{DeskId, DisplayId, TaskId, TransitionToken};
use crate::repository::BoundsSlot;
use crate::task::{Notice, WindowingMode};
use crate::transition::{
    AnimationHandler, BatchOp, MutationBatch, PendingEffects, RepositoryEffect, TransitionKind,
};

impl DesktopController {
    fn desk_of(&self, task: TaskId) -> DeskResult<DeskId> {
        self.repo()
            .desk_id_for_task(task)
            .ok_or_log(|| DeskError::InvalidOperation(format!("{task} is not in a desk")))
    }

    /// Tile `task` to one half of the stable area
    ///
    /// A task that cannot be resized bounces back to `drag_start_bounds` and a
    /// notice is shown instead.
    pub fn snap_to_half(
        &mut self,
        task: TaskId,
        side: TileSide,
        drag_start_bounds: Option<Rect>,
    ) -> DeskResult<TransitionToken> {
        let running = self.running_task(task)?;
        let desk = self.desk_of(task)?;
        let display = self.desk_display(desk, running.display)?;
        let info = self.display_info(display)?;
        let mut batch = MutationBatch::new();
        let mut effects = PendingEffects::new();

        if !running.resizable {
            tracing::info!("{task} is not resizable, rejecting snap");
            self.notices.show(Notice::SnapNotResizable { task });
            let back = drag_start_bounds.unwrap_or(running.bounds);
            batch.push(BatchOp::SetBounds { task, bounds: back });
            effects.emit(DesktopEvent::SnapRejected { task });
            return Ok(self.submit(TransitionKind::ResizeSnap, batch, effects, None));
        }

        let target = info.stable_bounds.half(side == TileSide::Left);
        batch.push(BatchOp::SetBounds {
            task,
            bounds: target,
        });
        if self
            .repo()
            .saved_bounds(task, BoundsSlot::BeforeMaximize)
            .is_none()
        {
            effects.push(RepositoryEffect::SaveBounds {
                task,
                slot: BoundsSlot::BeforeMaximize,
                bounds: drag_start_bounds.unwrap_or(running.bounds),
            });
        }
        effects.push(RepositoryEffect::SetTiled { desk, side, task });
        effects.emit(DesktopEvent::TaskSnapped { task, side });

        Ok(self.submit(TransitionKind::ResizeSnap, batch, effects, None))
    }

    /// Fill the stable area, or restore the bounds saved before doing so
    pub fn toggle_maximize(&mut self, task: TaskId) -> DeskResult<TransitionToken> {
        let running = self.running_task(task)?;
        let desk = self.desk_of(task)?;
        let display = self.desk_display(desk, running.display)?;
        let info = self.display_info(display)?;
        let stable = info.stable_bounds;
        let mut batch = MutationBatch::new();
        let mut effects = PendingEffects::new();

        if running.bounds == stable {
            let restore = self
                .repo()
                .saved_bounds(task, BoundsSlot::BeforeMaximize)
                .unwrap_or_else(|| self.default_bounds(&info, 0));
            batch.push(BatchOp::SetBounds {
                task,
                bounds: restore,
            });
            effects.push(RepositoryEffect::ClearBounds {
                task,
                slot: BoundsSlot::BeforeMaximize,
            });
        } else {
            batch.push(BatchOp::SetBounds {
                task,
                bounds: stable,
            });
            effects.push(RepositoryEffect::SaveBounds {
                task,
                slot: BoundsSlot::BeforeMaximize,
                bounds: running.bounds,
            });
        }
        effects.push(RepositoryEffect::Untile { desk, task });

        Ok(self.submit(TransitionKind::ToggleMaximize, batch, effects, None))
    }

    /// Cover the whole display, or restore the bounds saved before doing so
    pub fn toggle_full_immersive(&mut self, task: TaskId) -> DeskResult<TransitionToken> {
        let running = self.running_task(task)?;
        let desk = self.desk_of(task)?;
        let display = self.desk_display(desk, running.display)?;
        let info = self.display_info(display)?;
        let immersive = self
            .repo()
            .desk(desk)
            .and_then(|d| d.full_immersive_task)
            == Some(task);
        let mut batch = MutationBatch::new();
        let mut effects = PendingEffects::new();

        if immersive {
            let restore = self
                .repo()
                .saved_bounds(task, BoundsSlot::BeforeFullImmersive)
                .unwrap_or_else(|| self.default_bounds(&info, 0));
            batch
                .push(BatchOp::ExitImmersive { task })
                .push(BatchOp::SetBounds {
                    task,
                    bounds: restore,
                });
            effects.push(RepositoryEffect::ClearBounds {
                task,
                slot: BoundsSlot::BeforeFullImmersive,
            });
        } else {
            batch.push(BatchOp::SetBounds {
                task,
                bounds: info.bounds,
            });
            effects.push(RepositoryEffect::SaveBounds {
                task,
                slot: BoundsSlot::BeforeFullImmersive,
                bounds: running.bounds,
            });
        }
        effects.push(RepositoryEffect::SetFullImmersive {
            display,
            task,
            immersive: !immersive,
        });

        Ok(self.submit(TransitionKind::FullImmersive, batch, effects, None))
    }

    /// Move `task` into the target desk of `display`
    ///
    /// Bounds keep their physical size and relative position; when they do
    /// not fit the destination the default bounds are used. Returns None when
    /// the task is already there.
    pub fn move_task_to_display(
        &mut self,
        task: TaskId,
        display_id: DisplayId,
    ) -> DeskResult<Option<TransitionToken>> {
        let running = self.running_task(task)?;
        if running.display == display_id {
            tracing::debug!("{task} is already on {display_id}");
            return Ok(None);
        }
        let src = self.display_info(running.display)?;
        let dst = self.display_info(display_id)?;
        if !self.compat.is_compatible(&running) {
            tracing::info!("{task} ({}) cannot enter a desk, moving it fullscreen", running.app);
            return self
                .move_fullscreen_to_display(task, src.id, display_id)
                .map(Some);
        }
        if !dst.supports_desktop {
            return Err(DeskError::InvalidOperation(format!(
                "{display_id} does not support desktop windowing"
            )));
        }

        let repo = self.repo();
        let dst_desk = repo
            .target_desk_id(display_id)
            .ok_or_log(|| DeskError::NoDeskOnDisplay(display_id))?;
        let bounds = scale_bounds_between(running.bounds, &src, &dst).unwrap_or_else(|| {
            tracing::debug!("{task} does not fit {display_id}, using default bounds");
            let visible = repo.desk(dst_desk).map_or(0, |d| d.visible_tasks.len());
            self.default_bounds(&dst, visible)
        });

        let mut batch = MutationBatch::new();
        let mut effects = PendingEffects::new();
        batch
            .push(BatchOp::ReparentToDisplay { task, display: display_id })
            .push(BatchOp::SetBounds { task, bounds })
            .push(BatchOp::MoveTaskToDesk {
                task,
                desk: dst_desk,
            });
        if !repo.is_desk_active(dst_desk) {
            self.add_desk_activation(
                display_id,
                dst_desk,
                Some(task),
                EnterReason::TaskMovedToDisplay,
                &mut batch,
                &mut effects,
            );
        }
        batch.push(BatchOp::ReorderToTop { task });
        self.apply_task_limit(display_id, dst_desk, Some(task), false, &mut batch, &mut effects);

        if let Some(src_desk) = repo.desk_id_for_task(task) {
            if self.exits_desk(task, src_desk) {
                self.add_desk_exit_cleanup(
                    src.id,
                    src_desk,
                    ExitReason::TaskMovedToDisplay,
                    true,
                    &mut batch,
                    &mut effects,
                );
            }
        }
        effects.push(RepositoryEffect::AddTaskToDesk {
            display: display_id,
            desk: dst_desk,
            task,
            visible: true,
        });

        if self.has(DesktopFeatures::DISPLAY_FOCUS_FOLLOWS_TASK) {
            batch.push(BatchOp::ReorderDisplayToTop { display: display_id });
        }

        Ok(Some(self.submit(
            TransitionKind::MoveToDisplay,
            batch,
            effects,
            Some(AnimationHandler::Desktop),
        )))
    }

    /// Reparent `task` onto `display_id` fullscreen, leaving its desk
    fn move_fullscreen_to_display(
        &mut self,
        task: TaskId,
        src: DisplayId,
        display_id: DisplayId,
    ) -> DeskResult<TransitionToken> {
        let repo = self.repo();
        let mut batch = MutationBatch::new();
        let mut effects = PendingEffects::new();
        batch
            .push(BatchOp::ReparentToDisplay {
                task,
                display: display_id,
            })
            .push(BatchOp::SetWindowingMode {
                task,
                mode: WindowingMode::Fullscreen,
            })
            .push(BatchOp::ReorderToTop { task });

        if let Some(desk) = repo.desk_id_for_task(task) {
            if self.exits_desk(task, desk) {
                let display = self.desk_display(desk, src)?;
                self.add_desk_exit_cleanup(
                    display,
                    desk,
                    ExitReason::Incompatible,
                    true,
                    &mut batch,
                    &mut effects,
                );
            }
            effects.push(RepositoryEffect::RemoveTaskFromDesk { desk, task });
        }
        if self.has(DesktopFeatures::DISPLAY_FOCUS_FOLLOWS_TASK) {
            batch.push(BatchOp::ReorderDisplayToTop {
                display: display_id,
            });
        }

        Ok(self.submit(
            TransitionKind::ExitDesktop(ExitReason::Incompatible),
            batch,
            effects,
            Some(AnimationHandler::Desktop),
        ))
    }

    /// Whether a visible task touches the taskbar edge, either maximized or
    /// tiled, so the taskbar should drop its rounded corners
    pub fn does_any_task_require_taskbar_rounding(&self, display: DisplayId) -> bool {
        let Some(info) = self.displays.get(display) else {
            return false;
        };
        let stable = info.stable_bounds;
        let edge_filling = [stable, stable.half(true), stable.half(false)];
        let repo = self.repo();
        repo.expanded_tasks_ordered(display)
            .into_iter()
            .filter(|task| repo.is_visible_task(*task))
            .filter_map(|task| self.tasks.task(task))
            .any(|task| edge_filling.contains(&task.bounds))
    }
}
