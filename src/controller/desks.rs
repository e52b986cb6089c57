//! Desk lifecycle and display hotplug

use std::collections::BTreeSet;

use super::DesktopController;
use crate::config::{DeskMode, DesktopFeatures};
use crate::display::DisplayInfo;
use crate::error::{DeskError, DeskResult, OptionExt};
use crate::event::{EnterReason, ExitReason};
use crate::ids::{DeskId, DisplayId, TaskId, TransitionToken};
use crate::transition::{
    AnimationHandler, BatchOp, MutationBatch, PendingEffects, RepositoryEffect, TransitionKind,
};

impl DesktopController {
    fn display_of_desk(&self, desk: DeskId) -> DeskResult<DisplayId> {
        self.repo()
            .display_for_desk(desk)
            .ok_or_log(|| DeskError::DeskNotFound(desk))
    }

    /// Create a new, inactive desk on `display`
    pub fn create_desk(&mut self, display_id: DisplayId) -> DeskResult<DeskId> {
        let info = self.display_info(display_id)?;
        if !info.supports_desktop {
            return Err(DeskError::InvalidOperation(format!(
                "{display_id} does not support desktop windowing"
            )));
        }
        let desk = self.repo().next_desk_id(display_id);
        self.repos.current_mut().add_desk(display_id, desk)?;
        tracing::info!("Created {desk} on {display_id}");
        Ok(desk)
    }

    /// Present `desk` on its display
    pub fn activate_desk(&mut self, desk: DeskId) -> DeskResult<TransitionToken> {
        let display = self.display_of_desk(desk)?;
        let mut batch = MutationBatch::new();
        let mut effects = PendingEffects::new();
        self.add_desk_activation(
            display,
            desk,
            None,
            EnterReason::DeskSwitch,
            &mut batch,
            &mut effects,
        );
        Ok(self.submit(
            TransitionKind::ActivateDesk,
            batch,
            effects,
            Some(AnimationHandler::Desktop),
        ))
    }

    /// Stop presenting `desk` and go home
    pub fn deactivate_desk(&mut self, desk: DeskId) -> DeskResult<TransitionToken> {
        let display = self.display_of_desk(desk)?;
        let mut batch = MutationBatch::new();
        let mut effects = PendingEffects::new();
        self.add_desk_exit_cleanup(
            display,
            desk,
            ExitReason::ReturnHome,
            true,
            &mut batch,
            &mut effects,
        );
        Ok(self.submit(
            TransitionKind::DeactivateDesk,
            batch,
            effects,
            Some(AnimationHandler::Desktop),
        ))
    }

    /// Remove `desk` and close its tasks
    ///
    /// Only available with back navigation; returns None otherwise.
    pub fn remove_desk(&mut self, desk: DeskId) -> DeskResult<Option<TransitionToken>> {
        if !self.has(DesktopFeatures::BACK_NAVIGATION) {
            tracing::debug!("Desk removal is disabled, keeping {desk}");
            return Ok(None);
        }
        let display = self.display_of_desk(desk)?;
        let tasks: BTreeSet<TaskId> = self
            .repo()
            .desk(desk)
            .map(|d| d.active_tasks.clone())
            .unwrap_or_default();

        let mut batch = MutationBatch::new();
        let mut effects = PendingEffects::new();
        for task in &tasks {
            batch.push(BatchOp::RemoveTask { task: *task });
        }
        batch.push(BatchOp::RemoveDeskRoot { desk });
        if self.repo().is_desk_active(desk) {
            self.add_desk_exit_cleanup(
                display,
                desk,
                ExitReason::DeskRemoved,
                true,
                &mut batch,
                &mut effects,
            );
        }
        effects.push(RepositoryEffect::RemoveDesk { desk });

        tracing::info!("Removing {desk} with {} tasks", tasks.len());
        Ok(Some(self.submit(
            TransitionKind::RemoveDesk,
            batch,
            effects,
            Some(AnimationHandler::Desktop),
        )))
    }

    /// Register a display; with multiple desks a first desk is created for it
    pub fn on_display_added(&mut self, info: DisplayInfo) -> DeskResult<Option<DeskId>> {
        let display_id = info.id;
        let supports_desktop = info.supports_desktop;
        tracing::info!("{display_id} added at {} dpi", info.density_dpi);
        self.displays.add(info);

        if self.config.desk_mode == DeskMode::Multi
            && supports_desktop
            && self.repo().number_of_desks(display_id) == 0
        {
            return self.create_desk(display_id).map(Some);
        }
        Ok(None)
    }

    /// Forget a display and its desks, returning the tasks they held
    pub fn on_display_removed(&mut self, display_id: DisplayId) -> BTreeSet<TaskId> {
        tracing::info!("{display_id} removed");
        self.displays.remove(display_id);
        self.repos.current_mut().remove_display(display_id)
    }
}
