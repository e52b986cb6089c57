//! Error types for deskmode
//!
//! This module defines the error types used throughout the desktop session layer.
//! We use thiserror for convenient error derivation and avoid panics
//! in production code by properly propagating errors.

use std::fmt;

use crate::ids::{DeskId, DisplayId, TaskId, TransitionToken};

/// Main error type for deskmode operations
#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    /// A desk the caller asserted must exist is missing
    #[error("Desk {0} not found")]
    DeskNotFound(DeskId),

    /// A display has no desk although one is required
    #[error("No desk available on display {0}")]
    NoDeskOnDisplay(DisplayId),

    /// Display is not registered
    #[error("Display {0} not found")]
    DisplayNotFound(DisplayId),

    /// Task is not known to the task source
    #[error("Task {0} not found")]
    TaskNotFound(TaskId),

    /// Task cannot run in desktop windowing
    #[error("Task {0} cannot run in a desk")]
    IncompatibleTask(TaskId),

    /// A desk id was already used and retired
    #[error("Desk {0} was removed and cannot be reused")]
    DeskRetired(DeskId),

    /// Transition token is not tracked
    #[error("Transition {0} is not tracked")]
    UnknownTransition(TransitionToken),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A shortcut lookup was dropped before it produced a result
    #[error("Task lookup was cancelled")]
    LookupCancelled,

    /// Remote facade error
    #[error("Remote error: {0}")]
    Remote(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for deskmode operations
pub type DeskResult<T> = Result<T, DeskError>;

/// Extension trait for Option to convert to Result with error context
pub trait OptionExt<T> {
    /// Convert None to an error with context
    fn ok_or_log<F>(self, error_fn: F) -> DeskResult<T>
    where
        F: FnOnce() -> DeskError;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_log<F>(self, error_fn: F) -> DeskResult<T>
    where
        F: FnOnce() -> DeskError,
    {
        match self {
            Some(val) => Ok(val),
            None => {
                let err = error_fn();
                tracing::error!("{err}");
                Err(err)
            }
        }
    }
}

/// Helper for operations that should log errors but not propagate them
pub fn log_error<T, E: fmt::Display>(result: Result<T, E>) -> Option<T> {
    match result {
        Ok(val) => Some(val),
        Err(err) => {
            tracing::error!("Operation failed: {err}");
            None
        }
    }
}

/// Helper for operations that should log errors and provide a default value
pub fn log_error_default<T: Default, E: fmt::Display>(result: Result<T, E>) -> T {
    match result {
        Ok(val) => val,
        Err(err) => {
            tracing::error!("Operation failed, using default: {err}");
            T::default()
        }
    }
}
