//! deskmode - desktop windowing session state
//!
//! deskmode keeps track of which tasks live in which desk on which display and
//! keeps that bookkeeping consistent while the window system plays
//! asynchronous, possibly aborted or merged transitions.
//!
//! - **Desks**: per-display collections of freeform tasks, stored either as one
//!   implicit desk per display or as several desks per display
//! - **Deferred mutation**: repository changes caused by a transition are held
//!   back until the transition is confirmed started
//! - **Drag to desktop**: a gesture that coordinates a start transition with
//!   exactly one commit or cancel
//!
//! # Architecture
//!
//! - [`repository`]: desk and task state, listeners and persistence
//! - [`controller`]: builds transitions for every desktop operation
//! - [`observer`]: runs deferred effects and reconciles external changes
//! - [`drag`]: drag-to-desktop state machine
//! - [`remote`]: desk events and commands for out-of-thread clients
//! - [`harness`]: headless collaborators for tests and replays

#![warn(rust_2018_idioms)]

pub mod compat;
pub mod config;
pub mod controller;
pub mod display;
pub mod drag;
pub mod error;
pub mod event;
pub mod geometry;
pub mod harness;
pub mod ids;
pub mod limiter;
pub mod observer;
pub mod remote;
pub mod repository;
pub mod shortcut;
pub mod task;
pub mod transition;

pub use controller::DesktopController;
pub use error::{DeskError, DeskResult};
pub use repository::DeskRepository;
