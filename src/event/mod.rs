//! Event system for deskmode
//!
//! Interaction events (desk entered/exited, task launched or unminimized, drag
//! outcomes...) are published on an [`EventBus`] so clients that care *why*
//! something became visible do not have to reverse engineer it from repository
//! listeners.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::ids::{DeskId, DisplayId, TaskId};

/// Why a desk became active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnterReason {
    AppHandleMenu,
    KeyboardShortcut,
    DragToDesktop,
    AppLaunch,
    TaskToFront,
    DeskSwitch,
    TaskMovedToDisplay,
    Remote,
    Unknown,
}

/// Why a desk stopped being active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    LastTaskMinimized,
    LastTaskClosed,
    TaskFullscreen,
    TaskMovedToDisplay,
    ReturnHome,
    DeskRemoved,
    Incompatible,
    Unknown,
}

/// Why a minimized task was brought back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnminimizeReason {
    TaskbarTap,
    AltTab,
    TaskLaunch,
    Unknown,
}

/// Why a task was minimized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinimizeReason {
    MinimizeButton,
    KeyboardShortcut,
    TaskLimit,
    BackNavigation,
}

/// Which half of the stable area a task is tiled to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileSide {
    Left,
    Right,
}

/// How a drag-to-desktop gesture was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelKind {
    /// Return the task to where it came from
    Standard,
    /// Drop the task into the left split slot
    SplitLeft,
    /// Drop the task into the right split slot
    SplitRight,
}

/// Desktop interaction events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DesktopEvent {
    /// A desk became the presented desk of its display
    DeskEntered {
        display: DisplayId,
        desk: DeskId,
        task: Option<TaskId>,
        reason: EnterReason,
    },

    /// A desk stopped being presented
    DeskExited {
        display: DisplayId,
        desk: DeskId,
        reason: ExitReason,
    },

    /// A task was launched for the first time
    TaskLaunched { task: TaskId, desk: DeskId },

    /// A minimized task became visible again
    TaskUnminimized {
        task: TaskId,
        reason: UnminimizeReason,
    },

    /// A task was minimized
    TaskMinimized { task: TaskId, reason: MinimizeReason },

    /// A task was snapped to half of the screen
    TaskSnapped { task: TaskId, side: TileSide },

    /// A snap request was rejected because the task cannot be resized
    SnapRejected { task: TaskId },

    /// A drag-to-desktop gesture started
    DragStarted { task: TaskId },

    /// A drag-to-desktop gesture was released into desktop mode
    DragCommitted { task: TaskId },

    /// A drag-to-desktop gesture was cancelled
    DragCancelled { task: TaskId, kind: CancelKind },
}

/// An event together with the instant it was published
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub event: DesktopEvent,
    pub timestamp: Instant,
}

/// Event handler trait
pub trait EventHandler {
    /// Handle an event
    fn handle_event(&mut self, record: &EventRecord);
}

/// Logs every event through tracing
#[derive(Debug, Default)]
pub struct TracingEventHandler;

impl EventHandler for TracingEventHandler {
    fn handle_event(&mut self, record: &EventRecord) {
        tracing::debug!("Desktop event: {:?}", record.event);
    }
}

/// Event bus for distributing events to handlers
#[derive(Default)]
pub struct EventBus {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers_count", &self.handlers.len())
            .finish()
    }
}

impl EventBus {
    /// Create a new event bus with the tracing handler attached
    pub fn new() -> Self {
        Self {
            handlers: vec![Box::new(TracingEventHandler)],
        }
    }

    /// Register an event handler
    pub fn register_handler(&mut self, handler: Box<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    /// Emit an event to all registered handlers
    pub fn emit(&mut self, event: DesktopEvent) {
        let record = EventRecord {
            event,
            timestamp: Instant::now(),
        };
        for handler in &mut self.handlers {
            handler.handle_event(&record);
        }
    }

    /// Emit a batch of events in order
    pub fn emit_all(&mut self, events: impl IntoIterator<Item = DesktopEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Collect(Rc<RefCell<Vec<DesktopEvent>>>);

    impl EventHandler for Collect {
        fn handle_event(&mut self, record: &EventRecord) {
            self.0.borrow_mut().push(record.event.clone());
        }
    }

    #[test]
    fn bus_delivers_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.register_handler(Box::new(Collect(seen.clone())));

        bus.emit_all([
            DesktopEvent::DragStarted { task: TaskId::new(1) },
            DesktopEvent::DragCommitted { task: TaskId::new(1) },
        ]);

        assert_eq!(
            *seen.borrow(),
            vec![
                DesktopEvent::DragStarted { task: TaskId::new(1) },
                DesktopEvent::DragCommitted { task: TaskId::new(1) },
            ]
        );
    }

    #[test]
    fn events_serialize_tagged() {
        let json = serde_json::to_string(&DesktopEvent::TaskMinimized {
            task: TaskId::new(4),
            reason: MinimizeReason::TaskLimit,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"task_minimized","task":4,"reason":"task_limit"}"#);
    }
}
