//! Transition observer
//!
//! Owns the ledger of deferred effects keyed by transition token and reconciles
//! changes that originate outside the controller (external close, back
//! navigation, tasks opening on their own, windowing mode conversions).

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::config::DesktopFeatures;
use crate::error::DeskResult;
use crate::event::{DesktopEvent, MinimizeReason};
use crate::ids::{DisplayId, TaskId, TransitionToken};
use crate::repository::DeskRepository;
use crate::task::WindowingMode;
use crate::transition::{ChangeMode, PendingEffects, TransitionChange, TransitionInfo, TransitionKind};

#[derive(Debug, Default)]
pub struct TransitionObserver {
    pending: HashMap<TransitionToken, PendingEffects>,
    /// Tasks marked closing, removed when the transition finishes
    closing: HashMap<TransitionToken, BTreeSet<(DisplayId, TaskId)>>,
    ready: HashSet<TransitionToken>,
}

impl TransitionObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defer `effects` until `token` is ready
    pub fn add_pending(&mut self, token: TransitionToken, effects: PendingEffects) {
        if effects.is_empty() {
            return;
        }
        tracing::trace!("{token}: {} pending effects", effects.len());
        self.pending.entry(token).or_default().merge(effects);
    }

    pub fn has_pending(&self, token: TransitionToken) -> bool {
        self.pending.contains_key(&token)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Forget the effects of `token` without running them
    pub fn discard(&mut self, token: TransitionToken) -> bool {
        match self.pending.remove(&token) {
            Some(effects) => {
                tracing::debug!("{token}: discarding {} pending effects", effects.len());
                drop(effects);
                true
            }
            None => false,
        }
    }

    /// The transition started: run its effects, then reconcile its changes
    pub fn on_transition_ready(
        &mut self,
        token: TransitionToken,
        info: &TransitionInfo,
        repo: &mut DeskRepository,
        features: DesktopFeatures,
    ) -> DeskResult<Vec<DesktopEvent>> {
        self.ready.insert(token);
        let mut events = match self.pending.remove(&token) {
            Some(effects) => effects.run(repo)?,
            None => Vec::new(),
        };

        if info.kind.is_system() {
            for change in &info.changes {
                self.reconcile(token, info.kind, change, repo, features, &mut events)?;
            }
        }
        Ok(events)
    }

    fn reconcile(
        &mut self,
        token: TransitionToken,
        kind: TransitionKind,
        change: &TransitionChange,
        repo: &mut DeskRepository,
        features: DesktopFeatures,
        events: &mut Vec<DesktopEvent>,
    ) -> DeskResult<()> {
        let task = change.task;
        let display = change.display;
        let desk = repo.desk_id_for_task(task);
        let back_minimizes =
            kind == TransitionKind::BackNavigation && features.contains(DesktopFeatures::BACK_NAVIGATION);

        if repo.top_transparent_fullscreen_task(display) == Some(task)
            && matches!(change.mode, ChangeMode::Close | ChangeMode::ToBack)
        {
            repo.set_top_transparent_fullscreen_task(display, None)?;
        }

        match change.mode {
            ChangeMode::Open | ChangeMode::ToFront => match change.windowing_mode {
                WindowingMode::Freeform => {
                    if desk.is_some() {
                        repo.update_task(display, task, true)?;
                    } else if repo.target_desk_id(display).is_some() {
                        tracing::debug!("{task} opened freeform outside a desk, adopting it");
                        repo.add_task(display, task, true)?;
                    }
                }
                WindowingMode::Fullscreen if change.transparent => {
                    if repo.is_any_desk_active(display) {
                        repo.set_top_transparent_fullscreen_task(display, Some(task))?;
                    }
                }
                _ => {}
            },
            ChangeMode::Close => {
                let Some(desk) = desk else {
                    return Ok(());
                };
                if back_minimizes {
                    repo.minimize_task(display, task)?;
                    events.push(DesktopEvent::TaskMinimized {
                        task,
                        reason: MinimizeReason::BackNavigation,
                    });
                } else {
                    repo.add_closing_task(desk, task)?;
                    self.closing.entry(token).or_default().insert((display, task));
                }
            }
            ChangeMode::ToBack => {
                if desk.is_none() {
                    return Ok(());
                }
                if back_minimizes {
                    repo.minimize_task(display, task)?;
                    events.push(DesktopEvent::TaskMinimized {
                        task,
                        reason: MinimizeReason::BackNavigation,
                    });
                } else {
                    repo.update_task(display, task, false)?;
                }
            }
            ChangeMode::Change => {
                let Some(desk) = desk else {
                    return Ok(());
                };
                if !matches!(
                    change.windowing_mode,
                    WindowingMode::Freeform | WindowingMode::Pinned
                ) {
                    tracing::debug!("{task} left freeform, removing it from {desk}");
                    repo.remove_task_from_desk(desk, task)?;
                }
            }
        }
        Ok(())
    }

    /// `merged` was folded into `playing`
    ///
    /// Leftover effects and closing tasks follow the playing transition. If it
    /// already started the effects run right away.
    pub fn on_transition_merged(
        &mut self,
        merged: TransitionToken,
        playing: TransitionToken,
        repo: &mut DeskRepository,
    ) -> DeskResult<Vec<DesktopEvent>> {
        if let Some(closing) = self.closing.remove(&merged) {
            self.closing.entry(playing).or_default().extend(closing);
        }
        let Some(effects) = self.pending.remove(&merged) else {
            return Ok(Vec::new());
        };
        if self.ready.contains(&playing) {
            effects.run(repo)
        } else {
            self.pending.entry(playing).or_default().merge(effects);
            Ok(Vec::new())
        }
    }

    /// The transition finished or was aborted
    pub fn on_transition_finished(
        &mut self,
        token: TransitionToken,
        aborted: bool,
        repo: &mut DeskRepository,
    ) {
        self.ready.remove(&token);
        if let Some(effects) = self.pending.remove(&token) {
            tracing::debug!("{token} ended before starting, dropping {} effects", effects.len());
            drop(effects);
        }

        let closing = self.closing.remove(&token).unwrap_or_default();
        for (display, task) in closing {
            if aborted {
                repo.remove_closing_task(task);
            } else {
                repo.remove_task(display, task);
            }
        }
    }
}
