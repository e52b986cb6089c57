mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{
    builtin_display, config, config_without, desk0, enter_desk, fullscreen_task, harness, task,
    TestResult, DEFAULT_BOUNDS,
};
use deskmode::config::{DeskMode, DesktopFeatures};
use deskmode::event::{DesktopEvent, EnterReason, ExitReason, MinimizeReason, UnminimizeReason};
use deskmode::geometry::Rect;
use deskmode::harness::Harness;
use deskmode::ids::{DeskId, DisplayId, UserId};
use deskmode::repository::{
    BoundsSlot, DeskPersistence, DeskSnapshot, MemoryPersistence, PersistenceDispatcher, PersistenceError,
};
use deskmode::task::WindowingMode;
use deskmode::transition::{BatchOp, ChangeMode, TransitionChange, TransitionKind};

fn system_change(id: u32, mode: ChangeMode) -> TransitionChange {
    TransitionChange {
        task: task(id),
        display: DisplayId::DEFAULT,
        mode,
        windowing_mode: WindowingMode::Freeform,
        start_bounds: None,
        end_bounds: None,
        app: "browser".to_string(),
        transparent: false,
    }
}

#[test]
fn test_first_task_enters_at_default_bounds() -> TestResult {
    let mut h = harness(config(DeskMode::Single))?;
    enter_desk(&mut h, &[(1, "browser")])?;

    let running = h.tasks.get(task(1)).ok_or("task 1 is gone")?;
    assert_eq!(running.mode, WindowingMode::Freeform);
    assert_eq!(running.bounds, DEFAULT_BOUNDS);
    assert!(h.repo().is_visible_task(task(1)));
    assert!(h.controller.is_desktop_mode_showing(DisplayId::DEFAULT));
    assert!(h.events.events().contains(&DesktopEvent::DeskEntered {
        display: DisplayId::DEFAULT,
        desk: desk0(),
        task: Some(task(1)),
        reason: EnterReason::KeyboardShortcut,
    }));
    Ok(())
}

#[test]
fn test_second_task_cascades() -> TestResult {
    let mut h = harness(config(DeskMode::Single))?;
    enter_desk(&mut h, &[(1, "browser"), (2, "editor")])?;

    let second = h.tasks.get(task(2)).ok_or("task 2 is gone")?;
    assert_eq!(second.bounds, Rect::new(280, 169, 1440, 774));
    assert_eq!(
        h.repo().expanded_tasks_in_desk_ordered(desk0()),
        vec![task(2), task(1)]
    );
    Ok(())
}

#[test]
fn test_aborted_enter_leaves_repository_untouched() -> TestResult {
    let mut h = harness(config(DeskMode::Single))?;
    h.add_task(fullscreen_task(1, "browser"));
    let before = h.repo().snapshot();

    let token = h
        .controller
        .move_task_to_desk(task(1), None, EnterReason::AppHandleMenu)?;
    assert!(h.controller.observer().has_pending(token));
    h.abort(token);

    assert_eq!(h.repo().snapshot(), before);
    assert_eq!(h.controller.observer().pending_count(), 0);
    assert!(!h.repo().is_active_task(task(1)));
    Ok(())
}

#[test]
fn test_minimizing_last_task_exits_desk() -> TestResult {
    let mut h = harness(config(DeskMode::Single))?;
    enter_desk(&mut h, &[(1, "browser")])?;

    let token = h
        .controller
        .minimize_task(task(1), MinimizeReason::MinimizeButton)?;
    let started = h.transitions.get(token).ok_or("minimize was not started")?;
    assert_eq!(started.kind, TransitionKind::Minimize);
    assert!(started.batch.contains(&BatchOp::RemoveWallpaper {
        display: DisplayId::DEFAULT
    }));
    assert!(started.batch.contains(&BatchOp::LaunchHome {
        display: DisplayId::DEFAULT
    }));
    // Nothing changes before the transition starts
    assert!(h.repo().is_visible_task(task(1)));

    h.settle()?;
    assert!(h.repo().is_minimized_task(task(1)));
    assert!(!h.repo().is_visible_task(task(1)));
    assert!(!h.repo().is_any_desk_active(DisplayId::DEFAULT));
    assert!(h.events.events().contains(&DesktopEvent::DeskExited {
        display: DisplayId::DEFAULT,
        desk: desk0(),
        reason: ExitReason::LastTaskMinimized,
    }));
    Ok(())
}

#[test]
fn test_minimize_keeps_desk_when_exit_is_disabled() -> TestResult {
    let mut h = harness(config_without(
        DeskMode::Multi,
        DesktopFeatures::EXIT_ON_LAST_MINIMIZE,
    ))?;
    enter_desk(&mut h, &[(1, "browser")])?;
    let desk = h.repo().active_desk_id(DisplayId::DEFAULT).ok_or("no active desk")?;

    let token = h
        .controller
        .minimize_task(task(1), MinimizeReason::KeyboardShortcut)?;
    let started = h.transitions.get(token).ok_or("minimize was not started")?;
    assert!(!started.batch.any(|op| matches!(op, BatchOp::DeactivateDesk { .. })));
    h.settle()?;

    assert!(h.repo().is_minimized_task(task(1)));
    assert_eq!(h.repo().active_desk_id(DisplayId::DEFAULT), Some(desk));
    assert!(!h
        .events
        .events()
        .iter()
        .any(|e| matches!(e, DesktopEvent::DeskExited { .. })));
    Ok(())
}

#[test]
fn test_minimize_enters_pip_for_auto_pip_tasks() -> TestResult {
    let mut h = harness(config(DeskMode::Single))?;
    let mut video = fullscreen_task(1, "video");
    video.auto_enters_pip = true;
    h.add_task(video);
    h.controller
        .move_task_to_desk(task(1), None, EnterReason::KeyboardShortcut)?;
    h.settle()?;

    let token = h
        .controller
        .minimize_task(task(1), MinimizeReason::MinimizeButton)?;
    let started = h.transitions.get(token).ok_or("minimize was not started")?;
    assert_eq!(started.kind, TransitionKind::EnterPip);
    h.settle()?;

    let desk = h.repo().desk(desk0()).ok_or("no desk")?;
    assert_eq!(desk.pip_task, Some(task(1)));
    assert!(desk.minimized_tasks.contains(&task(1)));
    assert_eq!(
        h.tasks.get(task(1)).map(|t| t.mode),
        Some(WindowingMode::Pinned)
    );
    Ok(())
}

#[test]
fn test_task_limit_minimizes_backmost() -> TestResult {
    let mut cfg = config(DeskMode::Single);
    cfg.max_tasks = Some(3);
    let mut h = harness(cfg)?;
    // Entered back to front: 1 ends up in front of 2 and 3
    enter_desk(&mut h, &[(3, "c"), (2, "b"), (1, "a")])?;
    assert_eq!(
        h.repo().expanded_tasks_in_desk_ordered(desk0()),
        vec![task(1), task(2), task(3)]
    );

    enter_desk(&mut h, &[(4, "d")])?;
    assert!(h.repo().is_minimized_task(task(3)));
    assert_eq!(
        h.repo().expanded_tasks_in_desk_ordered(desk0()),
        vec![task(4), task(1), task(2)]
    );
    assert!(h.events.events().contains(&DesktopEvent::TaskMinimized {
        task: task(3),
        reason: MinimizeReason::TaskLimit,
    }));
    Ok(())
}

#[test]
fn test_closing_last_task_exits_and_removes() -> TestResult {
    let mut h = harness(config(DeskMode::Single))?;
    enter_desk(&mut h, &[(1, "browser")])?;

    let token = h.controller.close_task(task(1))?;
    let started = h.transitions.get(token).ok_or("close was not started")?;
    assert!(started.batch.contains(&BatchOp::RemoveTask { task: task(1) }));
    assert!(started.batch.contains(&BatchOp::DeactivateDesk { desk: desk0() }));

    h.ready(token)?;
    assert!(h.repo().is_closing_task(task(1)));
    h.finish(token);
    assert!(!h.repo().is_active_task(task(1)));
    Ok(())
}

#[test]
fn test_incompatible_app_stays_fullscreen() -> TestResult {
    let mut cfg = config(DeskMode::Single);
    cfg.incompatible_apps = vec!["camera".to_string()];
    let mut h = harness(cfg)?;
    h.add_task(fullscreen_task(1, "camera"));

    let token = h
        .controller
        .move_task_to_desk(task(1), None, EnterReason::KeyboardShortcut)?;
    let started = h.transitions.get(token).ok_or("nothing started")?;
    assert_eq!(
        started.kind,
        TransitionKind::ExitDesktop(ExitReason::Incompatible)
    );
    h.settle()?;
    assert!(!h.repo().is_active_task(task(1)));
    Ok(())
}

#[test]
fn test_moving_to_fullscreen_leaves_desk() -> TestResult {
    let mut h = harness(config(DeskMode::Single))?;
    enter_desk(&mut h, &[(1, "browser")])?;

    let token = h
        .controller
        .move_task_to_fullscreen(task(1), ExitReason::TaskFullscreen)?;
    let started = h.transitions.get(token).ok_or("nothing started")?;
    // The task itself covers the screen, so home is not relaunched
    assert!(!started.batch.any(|op| matches!(op, BatchOp::LaunchHome { .. })));
    h.settle()?;

    assert!(!h.repo().is_active_task(task(1)));
    assert_eq!(
        h.tasks.get(task(1)).map(|t| t.mode),
        Some(WindowingMode::Fullscreen)
    );
    Ok(())
}

#[test]
fn test_bringing_minimized_task_to_front() -> TestResult {
    let mut h = harness(config(DeskMode::Single))?;
    enter_desk(&mut h, &[(1, "browser"), (2, "editor")])?;
    h.controller
        .minimize_task(task(1), MinimizeReason::MinimizeButton)?;
    h.settle()?;
    assert!(h.repo().is_minimized_task(task(1)));
    assert_eq!(
        h.repo().saved_bounds(task(1), BoundsSlot::BeforeMinimize),
        Some(DEFAULT_BOUNDS)
    );

    let token = h
        .controller
        .move_task_to_front(task(1), UnminimizeReason::TaskbarTap)?;
    let started = h.transitions.get(token).ok_or("unminimize was not started")?;
    assert!(started.batch.contains(&BatchOp::SetBounds {
        task: task(1),
        bounds: DEFAULT_BOUNDS,
    }));
    h.settle()?;

    assert_eq!(
        h.repo().saved_bounds(task(1), BoundsSlot::BeforeMinimize),
        None
    );
    assert_eq!(h.tasks.get(task(1)).map(|t| t.bounds), Some(DEFAULT_BOUNDS));
    assert!(h.repo().is_visible_task(task(1)));
    assert!(!h.repo().is_minimized_task(task(1)));
    assert_eq!(
        h.repo().expanded_tasks_in_desk_ordered(desk0()),
        vec![task(1), task(2)]
    );
    assert!(h.events.events().contains(&DesktopEvent::TaskUnminimized {
        task: task(1),
        reason: UnminimizeReason::TaskbarTap,
    }));
    Ok(())
}

#[test]
fn test_launch_while_desk_showing_joins_desk() -> TestResult {
    let mut h = harness(config(DeskMode::Single))?;
    enter_desk(&mut h, &[(1, "browser")])?;
    h.add_task(fullscreen_task(2, "mail"));

    let token = h.controller.launch_task(task(2))?;
    let started = h.transitions.get(token).ok_or("nothing started")?;
    assert_eq!(
        started.kind,
        TransitionKind::EnterDesktop(EnterReason::AppLaunch)
    );
    h.settle()?;
    assert_eq!(h.repo().desk_id_for_task(task(2)), Some(desk0()));
    Ok(())
}

#[test]
fn test_new_instance_is_cascaded_in_same_desk() -> TestResult {
    let mut h = harness(config(DeskMode::Single))?;
    enter_desk(&mut h, &[(1, "browser")])?;

    let token = h.controller.open_new_instance(task(1))?;
    let started = h.transitions.get(token).ok_or("nothing started")?;
    assert_eq!(started.kind, TransitionKind::Launch);
    assert!(started.batch.contains(&BatchOp::StartNewInstance {
        app: "browser".to_string(),
        desk: desk0(),
        bounds: Rect::new(280, 169, 1440, 774),
    }));
    Ok(())
}

#[test]
fn test_external_close_marks_then_removes() -> TestResult {
    let mut h = harness(config(DeskMode::Single))?;
    enter_desk(&mut h, &[(1, "browser"), (2, "editor")])?;

    let token = h.system_transition(
        TransitionKind::Close,
        vec![system_change(1, ChangeMode::Close)],
    )?;
    assert!(h.repo().is_closing_task(task(1)));
    assert!(h
        .repo()
        .is_only_visible_non_closing_task_in_desk(task(2), desk0()));

    h.finish(token);
    assert!(!h.repo().is_active_task(task(1)));
    assert!(h.repo().is_visible_task(task(2)));
    Ok(())
}

#[test]
fn test_back_navigation_minimizes() -> TestResult {
    let mut h = harness(config(DeskMode::Single))?;
    enter_desk(&mut h, &[(1, "browser")])?;

    h.system_transition(
        TransitionKind::BackNavigation,
        vec![system_change(1, ChangeMode::ToBack)],
    )?;
    assert!(h.repo().is_minimized_task(task(1)));
    assert!(h.events.events().contains(&DesktopEvent::TaskMinimized {
        task: task(1),
        reason: MinimizeReason::BackNavigation,
    }));
    Ok(())
}

#[test]
fn test_desk_changes_are_persisted() -> TestResult {
    let store = Arc::new(MemoryPersistence::new());
    let mut h = Harness::with_persistence(
        config(DeskMode::Single),
        PersistenceDispatcher::inline(store.clone()),
    );
    h.add_display(builtin_display())?;
    enter_desk(&mut h, &[(1, "browser")])?;

    let saved = store
        .get(UserId::SYSTEM, desk0())
        .ok_or("desk was not persisted")?;
    assert_eq!(saved.visible_tasks, vec![task(1)]);
    Ok(())
}

/// Storage whose first write stalls, so later writes queue up behind it
#[derive(Default)]
struct StallingStore {
    inner: MemoryPersistence,
    writes: AtomicUsize,
    stalled_write_done: AtomicBool,
}

impl DeskPersistence for StallingStore {
    fn upsert_desk(&self, snapshot: &DeskSnapshot) -> Result<(), PersistenceError> {
        let first = self.writes.fetch_add(1, Ordering::SeqCst) == 0;
        if first {
            std::thread::sleep(Duration::from_millis(200));
        }
        self.inner.upsert_desk(snapshot)?;
        if first {
            self.stalled_write_done.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn remove_desk(&self, user: UserId, desk: DeskId) -> Result<(), PersistenceError> {
        self.inner.remove_desk(user, desk)
    }
}

#[test]
fn test_runtime_persistence_ends_on_latest_desk() -> TestResult {
    let runtime = tokio::runtime::Runtime::new()?;
    let store = Arc::new(StallingStore::default());
    let mut h = Harness::with_persistence(
        config(DeskMode::Single),
        PersistenceDispatcher::new(store.clone(), runtime.handle().clone()),
    );
    h.add_display(builtin_display())?;
    enter_desk(&mut h, &[(1, "browser"), (2, "mail")])?;

    let expected = h.repo().desk(desk0()).map(|desk| desk.visible_tasks.len());
    assert_eq!(expected, Some(2));
    let persisted = || {
        store
            .inner
            .get(UserId::SYSTEM, desk0())
            .map(|saved| saved.visible_tasks.len())
    };

    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if store.stalled_write_done.load(Ordering::SeqCst) && persisted() == expected {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(store.stalled_write_done.load(Ordering::SeqCst));
    assert_eq!(persisted(), expected);
    Ok(())
}

#[test]
fn test_persistence_follows_feature_switch() -> TestResult {
    let store = Arc::new(MemoryPersistence::new());
    let mut h = Harness::with_persistence(
        config_without(DeskMode::Single, DesktopFeatures::PERSIST_DESKS),
        PersistenceDispatcher::inline(store.clone()),
    );
    h.add_display(builtin_display())?;
    enter_desk(&mut h, &[(1, "browser")])?;

    assert!(store.is_empty());
    Ok(())
}

#[test]
fn test_shortcut_prefers_task_in_desk() -> TestResult {
    let mut h = harness(config(DeskMode::Single))?;
    enter_desk(&mut h, &[(1, "browser")])?;
    h.add_task(fullscreen_task(2, "browser"));

    let found = h.controller.lookup_shortcut_task("browser").wait()?;
    assert_eq!(found, Some(task(1)));
    assert_eq!(h.controller.lookup_shortcut_task("mail").wait()?, None);
    Ok(())
}
