//! Running tasks as reported by the window system

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::ids::{DisplayId, TaskId};

/// How a task is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WindowingMode {
    #[default]
    Fullscreen,
    Freeform,
    /// Split screen
    MultiWindow,
    Pinned,
    Undefined,
}

/// What the window system knows about a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningTask {
    pub id: TaskId,
    pub display: DisplayId,
    /// Application identity, used to match instances of the same app
    pub app: String,
    #[serde(default)]
    pub mode: WindowingMode,
    #[serde(default)]
    pub bounds: Rect,
    #[serde(default = "default_true")]
    pub resizable: bool,
    #[serde(default)]
    pub auto_enters_pip: bool,
    #[serde(default)]
    pub system_ui: bool,
    /// Translucent single-activity task
    #[serde(default)]
    pub transparent: bool,
    /// False for recent tasks whose process is gone
    #[serde(default = "default_true")]
    pub running: bool,
}

fn default_true() -> bool {
    true
}

impl RunningTask {
    pub fn new(id: TaskId, display: DisplayId, app: impl Into<String>) -> Self {
        Self {
            id,
            display,
            app: app.into(),
            mode: WindowingMode::Fullscreen,
            bounds: Rect::default(),
            resizable: true,
            auto_enters_pip: false,
            system_ui: false,
            transparent: false,
            running: true,
        }
    }

    pub fn is_freeform(&self) -> bool {
        self.mode == WindowingMode::Freeform
    }
}

/// Source of running and recent tasks
pub trait TaskSource {
    fn task(&self, id: TaskId) -> Option<RunningTask>;

    /// Tasks on `display`, front to back
    fn running_tasks(&self, display: DisplayId) -> Vec<RunningTask>;
}

/// Short user-facing messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The task cannot be resized so it cannot be snapped
    SnapNotResizable { task: TaskId },
}

pub trait NoticeSink {
    fn show(&mut self, notice: Notice);
}

/// Logs notices instead of showing them
#[derive(Debug, Default)]
pub struct LogNotices;

impl NoticeSink for LogNotices {
    fn show(&mut self, notice: Notice) {
        tracing::info!("Notice: {notice:?}");
    }
}
