//! Leaving desktop windowing: fullscreen, minimize and close

use super::DesktopController;
use crate::config::DesktopFeatures;
use crate::error::{DeskError, DeskResult, OptionExt};
use crate::event::{DesktopEvent, ExitReason, MinimizeReason};
use crate::ids::{TaskId, TransitionToken};
use crate::repository::BoundsSlot;
use crate::task::WindowingMode;
use crate::transition::{
    AnimationHandler, BatchOp, MutationBatch, PendingEffects, RepositoryEffect, TransitionKind,
};

impl DesktopController {
    /// Take `task` out of its desk and show it fullscreen
    ///
    /// The desk is torn down only when it is active and `task` was its last
    /// visible task. Home is not relaunched because the task fills the screen.
    pub fn move_task_to_fullscreen(
        &mut self,
        task: TaskId,
        reason: ExitReason,
    ) -> DeskResult<TransitionToken> {
        let running = self.running_task(task)?;
        let repo = self.repo();
        let mut batch = MutationBatch::new();
        let mut effects = PendingEffects::new();

        batch
            .push(BatchOp::SetWindowingMode {
                task,
                mode: WindowingMode::Fullscreen,
            })
            .push(BatchOp::ReorderToTop { task });

        if let Some(desk) = repo.desk_id_for_task(task) {
            let display = self.desk_display(desk, running.display)?;
            if self.exits_desk(task, desk) {
                self.add_desk_exit_cleanup(display, desk, reason, false, &mut batch, &mut effects);
            }
            if repo.desk(desk).and_then(|d| d.full_immersive_task) == Some(task) {
                effects.push(RepositoryEffect::SetFullImmersive {
                    display,
                    task,
                    immersive: false,
                });
            }
            effects.push(RepositoryEffect::RemoveTaskFromDesk { desk, task });
        }

        Ok(self.submit(
            TransitionKind::ExitDesktop(reason),
            batch,
            effects,
            Some(AnimationHandler::Desktop),
        ))
    }

    /// Minimize `task`, into picture-in-picture when it asks for it
    pub fn minimize_task(
        &mut self,
        task: TaskId,
        reason: MinimizeReason,
    ) -> DeskResult<TransitionToken> {
        let running = self.running_task(task)?;
        let desk = self
            .repo()
            .desk_id_for_task(task)
            .ok_or_log(|| DeskError::InvalidOperation(format!("{task} is not in a desk")))?;
        let display = self.desk_display(desk, running.display)?;

        let mut batch = MutationBatch::new();
        let mut effects = PendingEffects::new();
        effects.push(RepositoryEffect::SaveBounds {
            task,
            slot: BoundsSlot::BeforeMinimize,
            bounds: running.bounds,
        });

        let enter_pip = running.auto_enters_pip && self.has(DesktopFeatures::PIP_ON_MINIMIZE);
        let kind = if enter_pip {
            tracing::debug!("{task} enters picture-in-picture on minimize");
            batch.push(BatchOp::EnterPip { task });
            effects.push(RepositoryEffect::MinimizeTask { display, task });
            effects.push(RepositoryEffect::SetPipTask {
                desk,
                task: Some(task),
            });
            TransitionKind::EnterPip
        } else {
            batch.push(BatchOp::ReorderToBack { task });
            effects.push(RepositoryEffect::MinimizeTask { display, task });
            TransitionKind::Minimize
        };
        effects.emit(DesktopEvent::TaskMinimized { task, reason });

        if self.has(DesktopFeatures::EXIT_ON_LAST_MINIMIZE) && self.exits_desk(task, desk) {
            self.add_desk_exit_cleanup(
                display,
                desk,
                ExitReason::LastTaskMinimized,
                true,
                &mut batch,
                &mut effects,
            );
        }

        Ok(self.submit(kind, batch, effects, Some(AnimationHandler::Desktop)))
    }

    /// Close `task`
    ///
    /// The observer marks it closing once the transition starts and drops it
    /// when the transition finishes.
    pub fn close_task(&mut self, task: TaskId) -> DeskResult<TransitionToken> {
        let running = self.running_task(task)?;
        let mut batch = MutationBatch::new();
        let mut effects = PendingEffects::new();
        batch.push(BatchOp::RemoveTask { task });

        if let Some(desk) = self.repo().desk_id_for_task(task) {
            if self.has(DesktopFeatures::EXIT_ON_LAST_CLOSE) && self.exits_desk(task, desk) {
                let display = self.desk_display(desk, running.display)?;
                self.add_desk_exit_cleanup(
                    display,
                    desk,
                    ExitReason::LastTaskClosed,
                    true,
                    &mut batch,
                    &mut effects,
                );
            }
        }

        Ok(self.submit(TransitionKind::Close, batch, effects, None))
    }
}
