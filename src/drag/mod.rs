//! Drag-to-desktop gesture state machine
//!
//! A drag starts a transient "start" transition that brings the wallpaper up
//! behind the task while the task follows the pointer. The gesture then ends in
//! exactly one terminal outcome:
//! - commit: the real desktop transition merges into the start transition, a
//!   bounds animation plays from the last pointer bounds to the final bounds,
//!   and both transitions finish together
//! - cancel: optionally shrink back to the captured surface first, then a
//!   restore transition merges into start (with split-select for the split
//!   variants)
//!
//! The first terminal call latches the outcome, later ones are ignored. If the
//! start transition is aborted the machine resets and hands back any terminal
//! transition still in flight so its effects can be dropped.
//!
//! The machine only keeps state. [`crate::controller::DesktopController`]
//! builds and submits the transitions it asks for.

mod animation;

use serde::{Deserialize, Serialize};

use crate::event::CancelKind;
use crate::geometry::Rect;
use crate::ids::{TaskId, TransitionToken};

pub use animation::BoundsAnimation;

/// Where the dragged task came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum DragOrigin {
    FromFullscreen { task: TaskId },
    FromSplit { task: TaskId, other_task: Option<TaskId> },
}

impl DragOrigin {
    pub fn task(&self) -> TaskId {
        match self {
            DragOrigin::FromFullscreen { task } | DragOrigin::FromSplit { task, .. } => *task,
        }
    }
}

/// How the gesture ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalOutcome {
    Commit { final_bounds: Rect },
    Cancel(CancelKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TerminalPhase {
    /// Cancel animation towards the captured surface is playing
    ShrinkingBack,
    /// Terminal transition requested, waiting for it to merge into start
    AwaitingMerge,
    /// Commit merged, bounds animation playing
    Animating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Terminal {
    outcome: TerminalOutcome,
    token: Option<TransitionToken>,
    phase: TerminalPhase,
}

/// Fields shared by every drag origin
#[derive(Debug, Clone, PartialEq)]
pub struct DragCommon {
    pub start_token: TransitionToken,
    /// The start transition began animating
    pub started: bool,
    /// Task surface bounds captured when the start animation began
    pub captured_surface: Option<Rect>,
    /// Latest bounds following the pointer
    pub pointer_bounds: Rect,
    terminal: Option<Terminal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub origin: DragOrigin,
    pub common: DragCommon,
}

impl DragSession {
    pub fn terminal_outcome(&self) -> Option<TerminalOutcome> {
        self.common.terminal.map(|t| t.outcome)
    }

    pub fn terminal_token(&self) -> Option<TransitionToken> {
        self.common.terminal.and_then(|t| t.token)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(DragSession),
}

/// Result of latching a terminal outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latched {
    pub origin: DragOrigin,
    /// Shrink-back animation to play before the restore transition is requested
    pub shrink_back: Option<BoundsAnimation>,
}

/// What the caller should do with a merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Not a drag transition
    NotOurs,
    /// Play the commit animation, then call `on_commit_animation_finished`
    PlayCommit(BoundsAnimation),
    /// Finish both transitions now
    FinishBoth {
        start: TransitionToken,
        terminal: TransitionToken,
    },
}

/// What the caller should do when a transition ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishOutcome {
    NotOurs,
    /// The gesture is over; `orphaned` is a terminal transition that was
    /// already requested and must not touch the desks any more
    Reset { orphaned: Option<TransitionToken> },
    /// The terminal transition aborted, finish the start transition
    FinishStart(TransitionToken),
}

/// What a gesture call led to, as seen by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragAction {
    /// Ignored, no gesture or outcome already latched
    Ignored,
    /// A transition was requested
    Requested(TransitionToken),
    /// Play this animation and report back when done
    Animating(BoundsAnimation),
    /// The gesture is over
    Completed,
}

#[derive(Debug, Default)]
pub struct DragToDesktop {
    state: DragState,
}

impl DragToDesktop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn session(&self) -> Option<&DragSession> {
        match &self.state {
            DragState::Idle => None,
            DragState::Dragging(session) => Some(session),
        }
    }

    fn session_mut(&mut self) -> Option<&mut DragSession> {
        match &mut self.state {
            DragState::Idle => None,
            DragState::Dragging(session) => Some(session),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, DragState::Idle)
    }

    fn reset(&mut self) {
        if let DragState::Dragging(session) = &self.state {
            tracing::debug!("Drag of {} reset", session.origin.task());
        }
        self.state = DragState::Idle;
    }

    /// Enter `Dragging`; refused while another gesture is in progress
    pub fn begin(&mut self, start_token: TransitionToken, origin: DragOrigin, pointer_bounds: Rect) -> bool {
        if !self.is_idle() {
            tracing::warn!("Drag already in progress, ignoring drag of {}", origin.task());
            return false;
        }
        self.state = DragState::Dragging(DragSession {
            origin,
            common: DragCommon {
                start_token,
                started: false,
                captured_surface: None,
                pointer_bounds,
                terminal: None,
            },
        });
        true
    }

    pub fn update_pointer(&mut self, bounds: Rect) {
        if let Some(session) = self.session_mut() {
            if session.common.terminal.is_none() {
                session.common.pointer_bounds = bounds;
            }
        }
    }

    /// The start transition began animating; returns false for other tokens
    pub fn on_start_animation(&mut self, token: TransitionToken, captured: Option<Rect>) -> bool {
        match self.session_mut() {
            Some(session) if session.common.start_token == token => {
                session.common.started = true;
                session.common.captured_surface = captured;
                true
            }
            _ => false,
        }
    }

    /// Latch the terminal outcome; None when idle or already latched
    pub fn latch(&mut self, outcome: TerminalOutcome) -> Option<Latched> {
        let session = self.session_mut()?;
        if let Some(existing) = session.common.terminal {
            tracing::debug!(
                "Drag outcome {:?} already chosen, ignoring {outcome:?}",
                existing.outcome
            );
            return None;
        }

        let shrink_back = match (outcome, session.common.captured_surface) {
            (TerminalOutcome::Cancel(_), Some(surface)) => {
                Some(BoundsAnimation::new(session.common.pointer_bounds, surface))
            }
            _ => None,
        };
        let phase = if shrink_back.is_some() {
            TerminalPhase::ShrinkingBack
        } else {
            TerminalPhase::AwaitingMerge
        };
        session.common.terminal = Some(Terminal {
            outcome,
            token: None,
            phase,
        });
        Some(Latched {
            origin: session.origin,
            shrink_back,
        })
    }

    /// Record the token of the terminal transition
    pub fn set_terminal_token(&mut self, token: TransitionToken) {
        if let Some(terminal) = self.session_mut().and_then(|s| s.common.terminal.as_mut()) {
            terminal.token = Some(token);
            terminal.phase = TerminalPhase::AwaitingMerge;
        }
    }

    /// The shrink-back animation finished; returns what the restore needs
    pub fn on_shrink_back_finished(&mut self) -> Option<(DragOrigin, CancelKind)> {
        let session = self.session()?;
        match session.common.terminal {
            Some(Terminal {
                outcome: TerminalOutcome::Cancel(kind),
                phase: TerminalPhase::ShrinkingBack,
                ..
            }) => Some((session.origin, kind)),
            _ => None,
        }
    }

    /// `merged` was requested to merge into `into`
    pub fn merge(&mut self, merged: TransitionToken, into: TransitionToken) -> MergeOutcome {
        let Some(session) = self.session_mut() else {
            return MergeOutcome::NotOurs;
        };
        let start = session.common.start_token;
        let pointer_bounds = session.common.pointer_bounds;
        let Some(terminal) = session.common.terminal.as_mut() else {
            return MergeOutcome::NotOurs;
        };
        if into != start || terminal.token != Some(merged) {
            return MergeOutcome::NotOurs;
        }

        match terminal.outcome {
            TerminalOutcome::Commit { final_bounds } => {
                terminal.phase = TerminalPhase::Animating;
                MergeOutcome::PlayCommit(BoundsAnimation::new(pointer_bounds, final_bounds))
            }
            TerminalOutcome::Cancel(_) => {
                self.reset();
                MergeOutcome::FinishBoth {
                    start,
                    terminal: merged,
                }
            }
        }
    }

    /// The commit animation finished; returns (start, terminal) to finish
    pub fn on_commit_animation_finished(&mut self) -> Option<(TransitionToken, TransitionToken)> {
        let session = self.session()?;
        let terminal = session.common.terminal?;
        if terminal.phase != TerminalPhase::Animating {
            return None;
        }
        let tokens = (session.common.start_token, terminal.token?);
        self.reset();
        Some(tokens)
    }

    pub fn on_transition_finished(&mut self, token: TransitionToken, aborted: bool) -> FinishOutcome {
        let Some(session) = self.session() else {
            return FinishOutcome::NotOurs;
        };
        let start = session.common.start_token;
        if token == start {
            let orphaned = session.terminal_token();
            if aborted {
                tracing::info!("Drag start transition {token} aborted");
            }
            self.reset();
            return FinishOutcome::Reset { orphaned };
        }
        if session.terminal_token() == Some(token) && aborted {
            tracing::info!("Drag terminal transition {token} aborted");
            self.reset();
            return FinishOutcome::FinishStart(start);
        }
        FinishOutcome::NotOurs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dragging() -> (DragToDesktop, TransitionToken) {
        let mut drag = DragToDesktop::new();
        let start = TransitionToken::next();
        assert!(drag.begin(
            start,
            DragOrigin::FromFullscreen { task: TaskId::new(1) },
            Rect::new(0, 0, 400, 300),
        ));
        (drag, start)
    }

    #[test]
    fn second_terminal_is_ignored() {
        let (mut drag, _) = dragging();
        assert!(drag
            .latch(TerminalOutcome::Commit { final_bounds: Rect::new(10, 10, 800, 600) })
            .is_some());
        assert!(drag.latch(TerminalOutcome::Cancel(CancelKind::Standard)).is_none());
        assert!(matches!(
            drag.session().and_then(|s| s.terminal_outcome()),
            Some(TerminalOutcome::Commit { .. })
        ));
    }

    #[test]
    fn commit_merge_plays_then_finishes_both() {
        let (mut drag, start) = dragging();
        drag.update_pointer(Rect::new(50, 50, 400, 300));
        drag.latch(TerminalOutcome::Commit { final_bounds: Rect::new(100, 100, 800, 600) });
        let commit = TransitionToken::next();
        drag.set_terminal_token(commit);

        assert_eq!(
            drag.merge(commit, start),
            MergeOutcome::PlayCommit(BoundsAnimation::new(
                Rect::new(50, 50, 400, 300),
                Rect::new(100, 100, 800, 600)
            ))
        );
        assert_eq!(drag.on_commit_animation_finished(), Some((start, commit)));
        assert!(drag.is_idle());
    }

    #[test]
    fn cancel_after_capture_shrinks_back_first() {
        let (mut drag, start) = dragging();
        assert!(drag.on_start_animation(start, Some(Rect::new(0, 0, 1000, 800))));
        let latched = drag.latch(TerminalOutcome::Cancel(CancelKind::SplitLeft)).unwrap();
        assert!(latched.shrink_back.is_some());
        assert!(drag.on_shrink_back_finished().is_some());

        let restore = TransitionToken::next();
        drag.set_terminal_token(restore);
        assert_eq!(
            drag.merge(restore, start),
            MergeOutcome::FinishBoth { start, terminal: restore }
        );
        assert!(drag.is_idle());
    }

    #[test]
    fn fast_cancel_skips_shrink_back() {
        let (mut drag, _) = dragging();
        let latched = drag.latch(TerminalOutcome::Cancel(CancelKind::Standard)).unwrap();
        assert_eq!(latched.shrink_back, None);
        assert_eq!(drag.on_shrink_back_finished(), None);
    }

    #[test]
    fn start_abort_resets_and_orphans_terminal() {
        let (mut drag, start) = dragging();
        drag.latch(TerminalOutcome::Commit { final_bounds: Rect::default() });
        let commit = TransitionToken::next();
        drag.set_terminal_token(commit);

        assert_eq!(
            drag.on_transition_finished(start, true),
            FinishOutcome::Reset { orphaned: Some(commit) }
        );
        assert!(drag.is_idle());
        assert_eq!(drag.merge(commit, start), MergeOutcome::NotOurs);
        assert_eq!(drag.on_transition_finished(commit, false), FinishOutcome::NotOurs);
    }

    #[test]
    fn terminal_abort_finishes_start() {
        let (mut drag, start) = dragging();
        drag.latch(TerminalOutcome::Cancel(CancelKind::Standard));
        let restore = TransitionToken::next();
        drag.set_terminal_token(restore);
        assert_eq!(
            drag.on_transition_finished(restore, true),
            FinishOutcome::FinishStart(start)
        );
        assert!(drag.is_idle());
    }
}
