//! Drag-to-desktop gesture wiring

use super::DesktopController;
use crate::drag::{DragAction, DragOrigin, FinishOutcome, MergeOutcome, TerminalOutcome};
use crate::error::{DeskError, DeskResult, OptionExt};
use crate::event::{CancelKind, DesktopEvent, EnterReason};
use crate::geometry::Rect;
use crate::ids::{TaskId, TransitionToken};
use crate::task::WindowingMode;
use crate::transition::{AnimationHandler, BatchOp, MutationBatch, PendingEffects, TransitionKind};

impl DesktopController {
    /// The user started dragging `task` towards desktop windowing
    pub fn start_drag_to_desktop(
        &mut self,
        task: TaskId,
        pointer_bounds: Rect,
    ) -> DeskResult<DragAction> {
        if !self.drag.is_idle() {
            tracing::warn!("Drag already in progress, ignoring {task}");
            return Ok(DragAction::Ignored);
        }
        let running = self.running_task(task)?;
        if !self.compat.is_compatible(&running) {
            tracing::info!("{task} ({}) cannot enter a desk, ignoring drag", running.app);
            return Ok(DragAction::Ignored);
        }
        let origin = if running.mode == WindowingMode::MultiWindow {
            let other_task = self
                .tasks
                .running_tasks(running.display)
                .into_iter()
                .find(|t| t.id != task && t.mode == WindowingMode::MultiWindow)
                .map(|t| t.id);
            DragOrigin::FromSplit { task, other_task }
        } else {
            DragOrigin::FromFullscreen { task }
        };

        let mut batch = MutationBatch::new();
        batch
            .push(BatchOp::ShowWallpaper {
                display: running.display,
            })
            .push(BatchOp::ReorderToTop { task });
        let mut effects = PendingEffects::new();
        effects.emit(DesktopEvent::DragStarted { task });

        let token = self.submit(
            TransitionKind::DragToDesktopStart,
            batch,
            effects,
            Some(AnimationHandler::DragToDesktop),
        );
        self.drag.begin(token, origin, pointer_bounds);
        Ok(DragAction::Requested(token))
    }

    pub fn update_drag_position(&mut self, pointer_bounds: Rect) {
        self.drag.update_pointer(pointer_bounds);
    }

    /// Release the drag into desktop windowing at `final_bounds`
    pub fn finish_drag_to_desktop(&mut self, final_bounds: Rect) -> DeskResult<DragAction> {
        let Some(session) = self.drag.session() else {
            return Ok(DragAction::Ignored);
        };
        if session.terminal_outcome().is_some() {
            tracing::debug!("Drag already ending, ignoring commit");
            return Ok(DragAction::Ignored);
        }
        let task = session.origin.task();
        let running = self.running_task(task)?;
        let desk = self
            .repo()
            .target_desk_id(running.display)
            .ok_or_log(|| DeskError::NoDeskOnDisplay(running.display))?;
        let display = self.desk_display(desk, running.display)?;
        let (batch, mut effects) = self.prepare_move_task_to_desk(
            &running,
            display,
            desk,
            EnterReason::DragToDesktop,
            Some(final_bounds),
        )?;
        effects.emit(DesktopEvent::DragCommitted { task });

        if self
            .drag
            .latch(TerminalOutcome::Commit { final_bounds })
            .is_none()
        {
            return Ok(DragAction::Ignored);
        }
        let token = self.submit(
            TransitionKind::DragToDesktopEnd,
            batch,
            effects,
            Some(AnimationHandler::DragToDesktop),
        );
        self.drag.set_terminal_token(token);
        Ok(DragAction::Requested(token))
    }

    /// Abandon the drag, returning the task where it came from or into split
    pub fn cancel_drag_to_desktop(&mut self, kind: CancelKind) -> DragAction {
        let Some(latched) = self.drag.latch(TerminalOutcome::Cancel(kind)) else {
            return DragAction::Ignored;
        };
        match latched.shrink_back {
            Some(animation) => DragAction::Animating(animation),
            None => DragAction::Requested(self.request_drag_restore(latched.origin, kind)),
        }
    }

    fn request_drag_restore(&mut self, origin: DragOrigin, kind: CancelKind) -> TransitionToken {
        let task = origin.task();
        let mut batch = MutationBatch::new();
        match kind {
            CancelKind::Standard => {
                if let DragOrigin::FromSplit {
                    other_task: Some(other),
                    ..
                } = origin
                {
                    batch.push(BatchOp::ReorderToTop { task: other });
                }
                batch.push(BatchOp::RestoreOrder { task });
            }
            CancelKind::SplitLeft | CancelKind::SplitRight => {
                batch.push(BatchOp::RestoreOrder { task }).push(BatchOp::SplitSelect {
                    task,
                    left: kind == CancelKind::SplitLeft,
                });
            }
        }
        let mut effects = PendingEffects::new();
        effects.emit(DesktopEvent::DragCancelled { task, kind });

        let token = self.submit(
            TransitionKind::DragToDesktopCancel,
            batch,
            effects,
            Some(AnimationHandler::DragToDesktop),
        );
        self.drag.set_terminal_token(token);
        token
    }

    /// `merged` asks to play inside the running transition `into`
    pub fn merge_animation(
        &mut self,
        merged: TransitionToken,
        into: TransitionToken,
    ) -> DeskResult<DragAction> {
        self.on_transition_merged(merged, into)?;
        Ok(match self.drag.merge(merged, into) {
            MergeOutcome::NotOurs => DragAction::Ignored,
            MergeOutcome::PlayCommit(animation) => DragAction::Animating(animation),
            MergeOutcome::FinishBoth { start, terminal } => {
                self.transitions.finish_transition(terminal);
                self.transitions.finish_transition(start);
                DragAction::Completed
            }
        })
    }

    /// A drag animation handed out as [`DragAction::Animating`] finished
    pub fn on_drag_animation_finished(&mut self) -> DragAction {
        if let Some((start, terminal)) = self.drag.on_commit_animation_finished() {
            self.transitions.finish_transition(terminal);
            self.transitions.finish_transition(start);
            return DragAction::Completed;
        }
        if let Some((origin, kind)) = self.drag.on_shrink_back_finished() {
            return DragAction::Requested(self.request_drag_restore(origin, kind));
        }
        DragAction::Ignored
    }

    pub(super) fn finish_drag_transition(&mut self, token: TransitionToken, aborted: bool) {
        match self.drag.on_transition_finished(token, aborted) {
            FinishOutcome::FinishStart(start) => self.transitions.finish_transition(start),
            FinishOutcome::Reset {
                orphaned: Some(terminal),
            } => {
                tracing::info!("Drag ended under {token}, dropping {terminal}");
                self.observer.discard(terminal);
                self.transitions.finish_transition(terminal);
            }
            FinishOutcome::Reset { orphaned: None } | FinishOutcome::NotOurs => {}
        }
    }
}
