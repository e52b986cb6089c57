//! Best-effort desk persistence
//!
//! The repository stays the source of truth. Writes are dispatched fire and
//! forget, failures are logged and dropped, nothing is retried or rolled back.
//! Writes from one dispatcher land in the order they were made.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use super::desk::Desk;
use crate::error::log_error;
use crate::ids::{DeskId, DisplayId, TaskId, UserId};

/// What gets written for one desk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskSnapshot {
    pub user: UserId,
    pub desk: DeskId,
    pub display: DisplayId,
    pub visible_tasks: Vec<TaskId>,
    pub minimized_tasks: Vec<TaskId>,
    pub z_order: Vec<TaskId>,
    pub tiled_left: Option<TaskId>,
    pub tiled_right: Option<TaskId>,
}

impl DeskSnapshot {
    pub fn from_desk(user: UserId, desk: &Desk) -> Self {
        Self {
            user,
            desk: desk.id,
            display: desk.display,
            visible_tasks: desk.visible_tasks.iter().copied().collect(),
            minimized_tasks: desk.minimized_tasks.iter().copied().collect(),
            z_order: desk.freeform_tasks_in_z_order.clone(),
            tiled_left: desk.left_tiled_task,
            tiled_right: desk.right_tiled_task,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("failed to encode desk: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage backend for desk snapshots
pub trait DeskPersistence: Send + Sync {
    fn upsert_desk(&self, snapshot: &DeskSnapshot) -> Result<(), PersistenceError>;
    fn remove_desk(&self, user: UserId, desk: DeskId) -> Result<(), PersistenceError>;
}

type Job = Box<dyn FnOnce(&dyn DeskPersistence) + Send>;

#[derive(Clone, Default)]
enum Dispatch {
    #[default]
    Disabled,
    Inline(Arc<dyn DeskPersistence>),
    Queued(mpsc::UnboundedSender<Job>),
}

/// Routes repository writes to a persistence backend
#[derive(Clone, Default)]
pub struct PersistenceDispatcher {
    dispatch: Dispatch,
}

impl std::fmt::Debug for PersistenceDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.dispatch {
            Dispatch::Disabled => "disabled",
            Dispatch::Inline(_) => "inline",
            Dispatch::Queued(_) => "queued",
        };
        f.debug_struct("PersistenceDispatcher")
            .field("mode", &mode)
            .finish()
    }
}

impl PersistenceDispatcher {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Write on the runtime's blocking pool, one write at a time
    pub fn new(store: Arc<dyn DeskPersistence>, handle: tokio::runtime::Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        handle.spawn(async move {
            while let Some(job) = rx.recv().await {
                let store = store.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || job(store.as_ref())).await {
                    tracing::error!("Persistence write failed to run: {e}");
                }
            }
            tracing::debug!("Persistence queue closed");
        });
        Self {
            dispatch: Dispatch::Queued(tx),
        }
    }

    /// Write synchronously on the calling thread
    pub fn inline(store: Arc<dyn DeskPersistence>) -> Self {
        Self {
            dispatch: Dispatch::Inline(store),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.dispatch, Dispatch::Disabled)
    }

    pub fn upsert_desk(&self, snapshot: DeskSnapshot) {
        self.run(move |store| {
            tracing::trace!("Persisting {}", snapshot.desk);
            log_error(store.upsert_desk(&snapshot));
        });
    }

    pub fn remove_desk(&self, user: UserId, desk: DeskId) {
        self.run(move |store| {
            tracing::trace!("Removing persisted {desk}");
            log_error(store.remove_desk(user, desk));
        });
    }

    fn run<F>(&self, job: F)
    where
        F: FnOnce(&dyn DeskPersistence) + Send + 'static,
    {
        match &self.dispatch {
            Dispatch::Disabled => {}
            Dispatch::Inline(store) => job(store.as_ref()),
            Dispatch::Queued(tx) => {
                if tx.send(Box::new(job)).is_err() {
                    tracing::warn!("Persistence queue is gone, dropping write");
                }
            }
        }
    }
}

/// In-memory backend, keyed by user and desk
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    desks: Mutex<BTreeMap<(UserId, DeskId), DeskSnapshot>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user: UserId, desk: DeskId) -> Option<DeskSnapshot> {
        self.desks
            .lock()
            .ok()
            .and_then(|desks| desks.get(&(user, desk)).cloned())
    }

    pub fn len(&self) -> usize {
        self.desks.lock().map(|desks| desks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DeskPersistence for MemoryPersistence {
    fn upsert_desk(&self, snapshot: &DeskSnapshot) -> Result<(), PersistenceError> {
        let mut desks = self
            .desks
            .lock()
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        desks.insert((snapshot.user, snapshot.desk), snapshot.clone());
        Ok(())
    }

    fn remove_desk(&self, user: UserId, desk: DeskId) -> Result<(), PersistenceError> {
        let mut desks = self
            .desks
            .lock()
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        desks.remove(&(user, desk));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Backend whose first write is slow, recording visible counts in write order
    #[derive(Default)]
    struct SlowFirstWrite {
        writes: Mutex<Vec<usize>>,
    }

    impl DeskPersistence for SlowFirstWrite {
        fn upsert_desk(&self, snapshot: &DeskSnapshot) -> Result<(), PersistenceError> {
            if snapshot.visible_tasks.len() == 1 {
                std::thread::sleep(Duration::from_millis(200));
            }
            self.writes
                .lock()
                .map_err(|e| PersistenceError::Unavailable(e.to_string()))?
                .push(snapshot.visible_tasks.len());
            Ok(())
        }

        fn remove_desk(&self, _user: UserId, _desk: DeskId) -> Result<(), PersistenceError> {
            Ok(())
        }
    }

    fn snapshot(visible: &[u32]) -> DeskSnapshot {
        DeskSnapshot {
            user: UserId::SYSTEM,
            desk: DeskId::new(0),
            display: DisplayId::DEFAULT,
            visible_tasks: visible.iter().copied().map(TaskId::new).collect(),
            minimized_tasks: Vec::new(),
            z_order: Vec::new(),
            tiled_left: None,
            tiled_right: None,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn queued_writes_keep_their_order() {
        let backend = Arc::new(SlowFirstWrite::default());
        let dispatcher =
            PersistenceDispatcher::new(backend.clone(), tokio::runtime::Handle::current());

        dispatcher.upsert_desk(snapshot(&[1]));
        dispatcher.upsert_desk(snapshot(&[1, 2]));

        for _ in 0..100 {
            if backend.writes.lock().unwrap().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*backend.writes.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn latest_snapshot_wins() {
        let store = Arc::new(MemoryPersistence::new());
        let dispatcher = PersistenceDispatcher::new(store.clone(), tokio::runtime::Handle::current());

        dispatcher.upsert_desk(snapshot(&[1]));
        dispatcher.upsert_desk(snapshot(&[1, 2]));
        dispatcher.remove_desk(UserId::SYSTEM, DeskId::new(0));
        dispatcher.upsert_desk(snapshot(&[3]));

        let expected = Some(snapshot(&[3]));
        for _ in 0..100 {
            if store.get(UserId::SYSTEM, DeskId::new(0)) == expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.get(UserId::SYSTEM, DeskId::new(0)), expected);
    }
}
