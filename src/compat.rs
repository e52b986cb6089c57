//! Which tasks may enter a desk

use once_cell::sync::Lazy;
use std::collections::HashSet;

use crate::task::RunningTask;

/// Apps that never run in desktop windowing regardless of configuration
static BUILTIN_INCOMPATIBLE_APPS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["org.shell.systemui", "org.shell.launcher", "org.shell.setupwizard"]
        .into_iter()
        .collect()
});

#[derive(Debug, Clone, Default)]
pub struct CompatPolicy {
    incompatible_apps: HashSet<String>,
}

impl CompatPolicy {
    pub fn new(incompatible_apps: &[String]) -> Self {
        Self {
            incompatible_apps: incompatible_apps.iter().cloned().collect(),
        }
    }

    /// Whether `task` may be shown in a desk
    ///
    /// System UI, built-in and configured apps, and transparent single-activity
    /// tasks are kept fullscreen.
    pub fn is_compatible(&self, task: &RunningTask) -> bool {
        !(task.system_ui
            || task.transparent
            || BUILTIN_INCOMPATIBLE_APPS.contains(task.app.as_str())
            || self.incompatible_apps.contains(&task.app))
    }
}
