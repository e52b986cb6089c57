//! Consistency checks for desk bookkeeping
//!
//! This module validates that:
//! - A task is active in at most one desk
//! - Visible, minimized and closing tasks are active tasks
//! - No task is both visible and minimized
//! - The z-order is a permutation of the active tasks
//! - Active desks exist on the display that claims them

use std::collections::{BTreeMap, BTreeSet};

use super::store::DeskStore;
use crate::ids::{DeskId, DisplayId, TaskId};

/// Errors that can occur during desk validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Multiple desks claim the same task
    TaskInMultipleDesks { task: TaskId, desks: Vec<DeskId> },
    /// A task is visible but not active
    VisibleTaskNotActive { desk: DeskId, task: TaskId },
    /// A task is minimized but not active
    MinimizedTaskNotActive { desk: DeskId, task: TaskId },
    /// A task is closing but not active
    ClosingTaskNotActive { desk: DeskId, task: TaskId },
    /// A task is both visible and minimized
    VisibleAndMinimized { desk: DeskId, task: TaskId },
    /// Z-order does not list exactly the active tasks
    ZOrderMismatch { desk: DeskId },
    /// An active desk is not on the display it is active for
    ActiveDeskOnWrongDisplay { display: DisplayId, desk: DeskId },
}

/// Result type for validation operations
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Trait for types that can validate their internal consistency
pub trait ValidateConsistency {
    /// Validate internal consistency, returning errors if any invariants are violated
    fn validate_consistency(&self) -> ValidationResult;
}

/// Validate every desk held by `store`
pub fn validate_store(store: &dyn DeskStore) -> ValidationResult {
    let mut errors = Vec::new();
    let mut locations: BTreeMap<TaskId, Vec<DeskId>> = BTreeMap::new();

    for desk in store.desks() {
        for &task in &desk.active_tasks {
            locations.entry(task).or_default().push(desk.id);
        }

        for &task in desk.visible_tasks.difference(&desk.active_tasks) {
            errors.push(ValidationError::VisibleTaskNotActive {
                desk: desk.id,
                task,
            });
        }
        for &task in desk.minimized_tasks.difference(&desk.active_tasks) {
            errors.push(ValidationError::MinimizedTaskNotActive {
                desk: desk.id,
                task,
            });
        }
        for &task in desk.closing_tasks.difference(&desk.active_tasks) {
            errors.push(ValidationError::ClosingTaskNotActive {
                desk: desk.id,
                task,
            });
        }

        for &task in desk.visible_tasks.intersection(&desk.minimized_tasks) {
            errors.push(ValidationError::VisibleAndMinimized {
                desk: desk.id,
                task,
            });
        }

        let z_order: BTreeSet<TaskId> = desk.freeform_tasks_in_z_order.iter().copied().collect();
        if z_order != desk.active_tasks
            || z_order.len() != desk.freeform_tasks_in_z_order.len()
        {
            errors.push(ValidationError::ZOrderMismatch { desk: desk.id });
        }
    }

    for (task, desks) in locations {
        if desks.len() > 1 {
            errors.push(ValidationError::TaskInMultipleDesks { task, desks });
        }
    }

    for desk in store.all_active_desks() {
        if store.display_for_desk(desk.id) != Some(desk.display) {
            errors.push(ValidationError::ActiveDeskOnWrongDisplay {
                display: desk.display,
                desk: desk.id,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Debug helper to log validation errors
pub fn log_validation_errors(errors: &[ValidationError]) {
    for error in errors {
        tracing::error!("Desk validation error: {:?}", error);
    }
}
