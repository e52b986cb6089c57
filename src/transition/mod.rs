//! Transition system interface
//!
//! A transition is one asynchronous, possibly animated batch of window-tree
//! mutations identified by a [`TransitionToken`]. Its lifecycle is
//! requested -> ready (started) -> optionally merged -> finished or aborted.
//! Repository mutations caused by a transition are deferred as
//! [`PendingEffects`] until the transition is ready.

pub mod batch;
pub mod effect;

use serde::{Deserialize, Serialize};

use crate::event::{EnterReason, ExitReason};
use crate::geometry::Rect;
use crate::ids::{DisplayId, TaskId, TransitionToken};
use crate::task::WindowingMode;

pub use batch::{BatchOp, MutationBatch};
pub use effect::{PendingEffects, RepositoryEffect};

/// What a transition does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum TransitionKind {
    // Originated by the system
    Open,
    Close,
    ToFront,
    ToBack,
    Change,
    /// Back gesture or back key
    BackNavigation,

    // Originated by the desktop controller
    EnterDesktop(EnterReason),
    ExitDesktop(ExitReason),
    Minimize,
    EnterPip,
    Launch,
    DragToDesktopStart,
    DragToDesktopEnd,
    DragToDesktopCancel,
    ResizeSnap,
    ToggleMaximize,
    FullImmersive,
    MoveToDisplay,
    ActivateDesk,
    DeactivateDesk,
    RemoveDesk,
}

impl TransitionKind {
    /// Transitions whose changes the observer reconciles into the repository
    pub fn is_system(&self) -> bool {
        matches!(
            self,
            TransitionKind::Open
                | TransitionKind::Close
                | TransitionKind::ToFront
                | TransitionKind::ToBack
                | TransitionKind::Change
                | TransitionKind::BackNavigation
        )
    }
}

/// What happened to one task inside a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeMode {
    Open,
    Close,
    ToFront,
    ToBack,
    Change,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionChange {
    pub task: TaskId,
    pub display: DisplayId,
    pub mode: ChangeMode,
    /// Windowing mode at the end of the transition
    pub windowing_mode: WindowingMode,
    #[serde(default)]
    pub start_bounds: Option<Rect>,
    #[serde(default)]
    pub end_bounds: Option<Rect>,
    #[serde(default)]
    pub app: String,
    /// Translucent task, relevant for transparent fullscreen tracking
    #[serde(default)]
    pub transparent: bool,
}

/// Description of a transition once it is ready to play
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionInfo {
    pub kind: TransitionKind,
    pub changes: Vec<TransitionChange>,
}

impl TransitionInfo {
    pub fn new(kind: TransitionKind) -> Self {
        Self {
            kind,
            changes: Vec::new(),
        }
    }

    pub fn change_for(&self, task: TaskId) -> Option<&TransitionChange> {
        self.changes.iter().find(|change| change.task == task)
    }
}

/// Which animation handler should play a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationHandler {
    /// Played by the drag-to-desktop gesture
    DragToDesktop,
    /// Standard desktop enter/exit animations
    Desktop,
}

/// The window system's transition player
pub trait Transitions {
    /// Request a transition; the returned token identifies all later callbacks
    fn start_transition(
        &mut self,
        kind: TransitionKind,
        batch: MutationBatch,
        handler: Option<AnimationHandler>,
    ) -> TransitionToken;

    /// Signal that the animation of `token` is done
    fn finish_transition(&mut self, token: TransitionToken);
}
