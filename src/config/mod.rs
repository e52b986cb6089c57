//! Desktop session configuration
//!
//! Configuration is read from a sway-style line file. Feature switches that
//! change policy (back navigation, exit behaviour, PiP on minimize...) live in a
//! single [`DesktopFeatures`] flag set so call sites test one bit instead of
//! threading booleans around.

use std::collections::HashMap;
use std::path::Path;

pub mod parser;


/// Environment variable naming a config file to load at startup
pub const CONFIG_FILE_ENV: &str = "DESKMODE_CONFIG_FILE";

bitflags::bitflags! {
    /// Policy switches for the desktop session
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct DesktopFeatures: u32 {
        /// Back gesture minimizes freeform tasks; also enables desk removal
        const BACK_NAVIGATION = 1;
        /// Moving a task to another display moves focus to that display
        const DISPLAY_FOCUS_FOLLOWS_TASK = 1 << 1;
        /// A transparent fullscreen task on top still counts as desktop mode showing
        const TRANSPARENT_FULLSCREEN_IS_DESKTOP = 1 << 2;
        /// Minimizing the last visible task exits the desk
        const EXIT_ON_LAST_MINIMIZE = 1 << 3;
        /// Closing the last visible task exits the desk
        const EXIT_ON_LAST_CLOSE = 1 << 4;
        /// Relaunch home when a desk exit should end at home
        const RELAUNCH_HOME_ON_EXIT = 1 << 5;
        /// Remove the wallpaper surrogate when a desk exits
        const REMOVE_WALLPAPER_ON_EXIT = 1 << 6;
        /// Tasks that auto-enter picture-in-picture do so when minimized
        const PIP_ON_MINIMIZE = 1 << 7;
        /// New tasks inherit the bounds of a closing task of the same app
        const INHERIT_CLOSING_BOUNDS = 1 << 8;
        /// Cascade new windows away from existing ones
        const CASCADE_WINDOWS = 1 << 9;
        /// Persist desk snapshots
        const PERSIST_DESKS = 1 << 10;
    }
}

impl Default for DesktopFeatures {
    fn default() -> Self {
        DesktopFeatures::all() - DesktopFeatures::TRANSPARENT_FULLSCREEN_IS_DESKTOP
    }
}

/// Which desk bookkeeping strategy to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeskMode {
    /// One implicit desk per display, desk id == display id
    #[default]
    Single,
    /// Any number of desks per display with explicit activation
    Multi,
}

/// Errors produced while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

#[derive(Debug, Clone)]
pub struct DesktopConfig {
    /// Variables defined with 'set'
    pub variables: HashMap<String, String>,
    /// Desk storage strategy
    pub desk_mode: DeskMode,
    /// Policy switches
    pub features: DesktopFeatures,
    /// Maximum number of expanded tasks per desk, None for unlimited
    pub max_tasks: Option<usize>,
    /// Cascade step in density independent pixels
    pub cascade_offset_dp: i32,
    /// Initial window size as a fraction of the stable area
    pub initial_bounds_scale: f32,
    /// Apps that must never enter a desk
    pub incompatible_apps: Vec<String>,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            variables: HashMap::new(),
            desk_mode: DeskMode::default(),
            features: DesktopFeatures::default(),
            max_tasks: Some(4),
            cascade_offset_dp: 40,
            initial_bounds_scale: 0.75,
            incompatible_apps: Vec::new(),
        }
    }
}

impl DesktopConfig {
    /// Load config from file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        parser::parse_config(&content)
    }

    /// Load the file named by `DESKMODE_CONFIG_FILE`, falling back to defaults
    pub fn from_env() -> Self {
        match std::env::var(CONFIG_FILE_ENV) {
            Ok(path) => {
                tracing::info!("Loading config from {path}");
                crate::error::log_error_default(Self::load_from_file(Path::new(&path)))
            }
            Err(_) => Self::default(),
        }
    }

    /// Get a variable value
    pub fn get_variable(&self, name: &str) -> Option<String> {
        self.variables.get(name).cloned()
    }

    /// Whether a feature switch is on
    pub fn has(&self, feature: DesktopFeatures) -> bool {
        self.features.contains(feature)
    }

    /// Expand variables in a string
    pub fn expand_variables(&self, text: &str) -> String {
        let mut result = text.to_string();
        for (name, value) in &self.variables {
            result = result.replace(&format!("${name}"), value);
        }
        result
    }
}
