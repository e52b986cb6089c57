//! Per-user repository routing

use std::collections::BTreeMap;

use super::{DeskRepository, PersistenceDispatcher};
use crate::config::DeskMode;
use crate::ids::UserId;

/// One repository per user, created on first use
///
/// Listeners registered on the current repository follow the session when the
/// user switches, and are told how the incoming user's desks differ.
#[derive(Debug)]
pub struct UserRepositories {
    mode: DeskMode,
    persistence: PersistenceDispatcher,
    current: DeskRepository,
    parked: BTreeMap<UserId, DeskRepository>,
}

impl UserRepositories {
    pub fn new(mode: DeskMode, persistence: PersistenceDispatcher) -> Self {
        Self {
            mode,
            current: DeskRepository::new(UserId::SYSTEM, mode, persistence.clone()),
            persistence,
            parked: BTreeMap::new(),
        }
    }

    pub fn current_user(&self) -> UserId {
        self.current.user()
    }

    pub fn current(&self) -> &DeskRepository {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut DeskRepository {
        &mut self.current
    }

    /// Make `user` current, carrying the registered listeners over
    pub fn switch_user(&mut self, user: UserId) {
        if user == self.current.user() {
            return;
        }
        tracing::info!("Switching desks from {} to {user}", self.current.user());
        let listeners = self.current.listeners().clone();
        let next = self
            .parked
            .remove(&user)
            .unwrap_or_else(|| DeskRepository::new(user, self.mode, self.persistence.clone()));
        let previous = std::mem::replace(&mut self.current, next);
        self.current.set_listeners(listeners);
        self.current.announce_takeover(&previous);
        self.parked.insert(previous.user(), previous);
    }
}
