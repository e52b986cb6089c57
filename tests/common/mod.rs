//! Common testing utilities for deskmode integration tests

#![allow(dead_code)]

use deskmode::config::{DeskMode, DesktopConfig, DesktopFeatures};
use deskmode::display::DisplayInfo;
use deskmode::geometry::Rect;
use deskmode::harness::Harness;
use deskmode::ids::{DeskId, DisplayId, TaskId};
use deskmode::task::{RunningTask, WindowingMode};
use deskmode::DeskResult;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Stable area of the built-in display: 1920x1080 minus a 48px taskbar
pub const STABLE: Rect = Rect::new(0, 0, 1920, 1032);

/// Default bounds of a first window on the built-in display
pub const DEFAULT_BOUNDS: Rect = Rect::new(240, 129, 1440, 774);

pub fn desk0() -> DeskId {
    DeskId::for_display(DisplayId::DEFAULT)
}

pub fn task(id: u32) -> TaskId {
    TaskId::new(id)
}

/// 1080p at baseline density
pub fn builtin_display() -> DisplayInfo {
    DisplayInfo::new(DisplayId::DEFAULT, 160, Rect::new(0, 0, 1920, 1080), STABLE)
}

/// 4k at double density
pub fn external_display(id: u32) -> DisplayInfo {
    DisplayInfo::new(
        DisplayId::new(id),
        320,
        Rect::new(0, 0, 3840, 2160),
        Rect::new(0, 0, 3840, 2112),
    )
}

pub fn fullscreen_task(id: u32, app: &str) -> RunningTask {
    let mut running = RunningTask::new(TaskId::new(id), DisplayId::DEFAULT, app);
    running.bounds = Rect::new(0, 0, 1920, 1080);
    running
}

pub fn freeform_task(id: u32, app: &str, bounds: Rect) -> RunningTask {
    let mut running = RunningTask::new(TaskId::new(id), DisplayId::DEFAULT, app);
    running.mode = WindowingMode::Freeform;
    running.bounds = bounds;
    running
}

pub fn config(mode: DeskMode) -> DesktopConfig {
    DesktopConfig {
        desk_mode: mode,
        ..DesktopConfig::default()
    }
}

pub fn config_without(mode: DeskMode, features: DesktopFeatures) -> DesktopConfig {
    let mut config = config(mode);
    config.features.remove(features);
    config
}

/// Harness with the built-in display registered
pub fn harness(config: DesktopConfig) -> DeskResult<Harness> {
    let mut harness = Harness::new(config);
    harness.add_display(builtin_display())?;
    Ok(harness)
}

/// Start `tasks` fullscreen and move them into the target desk one by one,
/// so the last one ends up in front
pub fn enter_desk(harness: &mut Harness, tasks: &[(u32, &str)]) -> DeskResult<()> {
    for (id, app) in tasks {
        harness.add_task(fullscreen_task(*id, app));
        harness.controller.move_task_to_desk(
            TaskId::new(*id),
            None,
            deskmode::event::EnterReason::KeyboardShortcut,
        )?;
        harness.settle()?;
    }
    Ok(())
}
