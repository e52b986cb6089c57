//! Remote desktop facade
//!
//! Lets clients outside the controller's thread follow desk changes of a
//! display and queue commands back to the controller. Events fan out through
//! one broadcast channel per display; commands go through a single unbounded
//! queue that the controller drains on its own thread.

pub mod server;

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::error::{DeskError, DeskResult};
use crate::ids::{DeskId, DisplayId, TaskId};
use crate::repository::{ActiveTasksListener, DeskChangeListener, VisibleTasksListener};

pub use server::{RemoteServer, SOCKET_ENV};

const EVENT_CAPACITY: usize = 100;

/// Desk changes pushed to remote subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemoteEvent {
    DeskAdded {
        display: DisplayId,
        desk: DeskId,
    },
    DeskRemoved {
        display: DisplayId,
        desk: DeskId,
    },
    ActiveDeskChanged {
        display: DisplayId,
        desk: DeskId,
        previous: Option<DeskId>,
    },
    DeskDeactivated {
        display: DisplayId,
        desk: DeskId,
    },
    VisibleTaskCount {
        display: DisplayId,
        count: usize,
    },
    ActiveTasks {
        display: DisplayId,
        tasks: Vec<TaskId>,
    },
}

/// Requests queued by remote clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum RemoteCommand {
    ActivateDesk { desk: DeskId },
    RemoveDesk { desk: DeskId },
    CreateDesk { display: DisplayId },
    MoveToDesktop {
        task: TaskId,
        #[serde(default)]
        desk: Option<DeskId>,
    },
}

/// Receiving end of the remote command queue, owned by the controller
#[derive(Debug)]
pub struct RemoteCommandQueue {
    rx: mpsc::UnboundedReceiver<RemoteCommand>,
}

impl RemoteCommandQueue {
    /// Next queued command without waiting
    pub fn try_next(&mut self) -> Option<RemoteCommand> {
        self.rx.try_recv().ok()
    }

    pub async fn recv(&mut self) -> Option<RemoteCommand> {
        self.rx.recv().await
    }
}

#[derive(Debug)]
pub struct RemoteDesktopFacade {
    /// Per-display event channels; entries are only ever added
    sessions: DashMap<DisplayId, broadcast::Sender<RemoteEvent>>,
    commands: mpsc::UnboundedSender<RemoteCommand>,
}

impl RemoteDesktopFacade {
    pub fn new() -> (Arc<Self>, RemoteCommandQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        let facade = Arc::new(Self {
            sessions: DashMap::new(),
            commands: tx,
        });
        (facade, RemoteCommandQueue { rx })
    }

    /// Follow the desk events of `display`
    pub fn subscribe(&self, display: DisplayId) -> broadcast::Receiver<RemoteEvent> {
        self.sessions
            .entry(display)
            .or_insert_with(|| broadcast::channel(EVENT_CAPACITY).0)
            .subscribe()
    }

    pub fn subscriber_count(&self, display: DisplayId) -> usize {
        self.sessions
            .get(&display)
            .map_or(0, |tx| tx.receiver_count())
    }

    pub fn send_command(&self, command: RemoteCommand) -> DeskResult<()> {
        tracing::debug!("Queueing remote command {command:?}");
        self.commands
            .send(command)
            .map_err(|_| DeskError::Remote("command queue closed".to_string()))
    }

    fn publish(&self, display_id: DisplayId, event: RemoteEvent) {
        let Some(tx) = self.sessions.get(&display_id) else {
            return;
        };
        if tx.send(event).is_err() {
            tracing::trace!("No remote subscribers left on {display_id}");
        }
    }
}

impl DeskChangeListener for RemoteDesktopFacade {
    fn on_desk_added(&self, display: DisplayId, desk: DeskId) {
        self.publish(display, RemoteEvent::DeskAdded { display, desk });
    }

    fn on_desk_removed(&self, display: DisplayId, desk: DeskId) {
        self.publish(display, RemoteEvent::DeskRemoved { display, desk });
    }

    fn on_active_desk_changed(&self, display: DisplayId, new: DeskId, old: Option<DeskId>) {
        self.publish(
            display,
            RemoteEvent::ActiveDeskChanged {
                display,
                desk: new,
                previous: old,
            },
        );
    }

    fn on_desk_deactivated(&self, display: DisplayId, desk: DeskId) {
        self.publish(display, RemoteEvent::DeskDeactivated { display, desk });
    }
}

impl VisibleTasksListener for RemoteDesktopFacade {
    fn on_visible_tasks_changed(&self, display: DisplayId, visible_count: usize) {
        self.publish(
            display,
            RemoteEvent::VisibleTaskCount {
                display,
                count: visible_count,
            },
        );
    }
}

impl ActiveTasksListener for RemoteDesktopFacade {
    fn on_active_tasks_changed(&self, display: DisplayId, tasks: &BTreeSet<TaskId>) {
        self.publish(
            display,
            RemoteEvent::ActiveTasks {
                display,
                tasks: tasks.iter().copied().collect(),
            },
        );
    }
}
