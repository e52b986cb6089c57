//! Repository change listeners
//!
//! Listeners are registered as (listener, delivery context) pairs. The delivery
//! context decides where the callback runs, so the repository stays agnostic of
//! any particular runtime.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::geometry::Region;
use crate::ids::{DeskId, DisplayId, TaskId};

/// Where listener callbacks run
pub trait DeliveryContext: Send + Sync {
    fn deliver(&self, job: Box<dyn FnOnce() + Send>);
}

/// Runs callbacks inline on the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct Immediate;

impl DeliveryContext for Immediate {
    fn deliver(&self, job: Box<dyn FnOnce() + Send>) {
        job();
    }
}

type Callback = Box<dyn FnOnce() + Send>;

/// Runs callbacks on a tokio runtime, one after another in delivery order
#[derive(Debug, Clone)]
pub struct TokioDelivery {
    tx: mpsc::UnboundedSender<Callback>,
}

impl TokioDelivery {
    pub fn new(handle: &tokio::runtime::Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Callback>();
        handle.spawn(async move {
            while let Some(job) = rx.recv().await {
                job();
            }
        });
        Self { tx }
    }
}

impl DeliveryContext for TokioDelivery {
    fn deliver(&self, job: Box<dyn FnOnce() + Send>) {
        if self.tx.send(job).is_err() {
            tracing::warn!("Listener runtime is gone, dropping callback");
        }
    }
}

/// Desk lifecycle and activation changes
pub trait DeskChangeListener: Send + Sync {
    fn on_desk_added(&self, display: DisplayId, desk: DeskId);
    fn on_desk_removed(&self, display: DisplayId, desk: DeskId);
    fn on_active_desk_changed(&self, display: DisplayId, new: DeskId, old: Option<DeskId>);
    fn on_desk_deactivated(&self, display: DisplayId, desk: DeskId);
}

pub trait ActiveTasksListener: Send + Sync {
    fn on_active_tasks_changed(&self, display: DisplayId, tasks: &BTreeSet<TaskId>);
}

pub trait VisibleTasksListener: Send + Sync {
    fn on_visible_tasks_changed(&self, display: DisplayId, visible_count: usize);
}

pub trait ExclusionRegionListener: Send + Sync {
    fn on_exclusion_region_changed(&self, region: &Region);
}

type Delivered<L> = (Arc<L>, Arc<dyn DeliveryContext>);

/// All registered listeners of one repository
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    pub(crate) desk_changes: Vec<Arc<dyn DeskChangeListener>>,
    pub(crate) active_tasks: Vec<Arc<dyn ActiveTasksListener>>,
    pub(crate) visible_tasks: Vec<Delivered<dyn VisibleTasksListener>>,
    pub(crate) exclusion: Vec<Delivered<dyn ExclusionRegionListener>>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("desk_changes", &self.desk_changes.len())
            .field("active_tasks", &self.active_tasks.len())
            .field("visible_tasks", &self.visible_tasks.len())
            .field("exclusion", &self.exclusion.len())
            .finish()
    }
}

impl ListenerRegistry {
    pub(crate) fn desk_added(&self, display: DisplayId, desk: DeskId) {
        for listener in &self.desk_changes {
            listener.on_desk_added(display, desk);
        }
    }

    pub(crate) fn desk_removed(&self, display: DisplayId, desk: DeskId) {
        for listener in &self.desk_changes {
            listener.on_desk_removed(display, desk);
        }
    }

    pub(crate) fn active_desk_changed(&self, display: DisplayId, new: DeskId, old: Option<DeskId>) {
        for listener in &self.desk_changes {
            listener.on_active_desk_changed(display, new, old);
        }
    }

    pub(crate) fn desk_deactivated(&self, display: DisplayId, desk: DeskId) {
        for listener in &self.desk_changes {
            listener.on_desk_deactivated(display, desk);
        }
    }

    pub(crate) fn active_tasks_changed(&self, display: DisplayId, tasks: &BTreeSet<TaskId>) {
        for listener in &self.active_tasks {
            listener.on_active_tasks_changed(display, tasks);
        }
    }

    pub(crate) fn visible_count_changed(&self, display: DisplayId, count: usize) {
        for (listener, context) in &self.visible_tasks {
            deliver_visible(listener, context.as_ref(), display, count);
        }
    }

    pub(crate) fn exclusion_changed(&self, region: &Region) {
        for (listener, context) in &self.exclusion {
            let listener = listener.clone();
            let region = region.clone();
            context.deliver(Box::new(move || listener.on_exclusion_region_changed(&region)));
        }
    }
}

pub(crate) fn deliver_visible(
    listener: &Arc<dyn VisibleTasksListener>,
    context: &dyn DeliveryContext,
    display: DisplayId,
    count: usize,
) {
    let listener = listener.clone();
    context.deliver(Box::new(move || {
        listener.on_visible_tasks_changed(display, count)
    }));
}
