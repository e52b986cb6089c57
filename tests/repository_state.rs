mod common;

use std::sync::{Arc, Mutex};

use common::{task, TestResult};
use deskmode::config::DeskMode;
use deskmode::ids::{DeskId, DisplayId, UserId};
use deskmode::repository::{
    DeskChangeListener, DeskRepository, Immediate, MemoryPersistence, PersistenceDispatcher,
    VisibleTasksListener,
};

fn repo(mode: DeskMode) -> DeskRepository {
    DeskRepository::new(UserId::SYSTEM, mode, PersistenceDispatcher::disabled())
}

#[derive(Default)]
struct Recorder {
    log: Mutex<Vec<String>>,
}

impl Recorder {
    fn entries(&self) -> Vec<String> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    fn push(&self, entry: String) {
        if let Ok(mut log) = self.log.lock() {
            log.push(entry);
        }
    }
}

impl DeskChangeListener for Recorder {
    fn on_desk_added(&self, _display: DisplayId, desk: DeskId) {
        self.push(format!("added {}", desk.get()));
    }

    fn on_desk_removed(&self, _display: DisplayId, desk: DeskId) {
        self.push(format!("removed {}", desk.get()));
    }

    fn on_active_desk_changed(&self, _display: DisplayId, desk: DeskId, _previous: Option<DeskId>) {
        self.push(format!("active {}", desk.get()));
    }

    fn on_desk_deactivated(&self, _display: DisplayId, desk: DeskId) {
        self.push(format!("inactive {}", desk.get()));
    }
}

impl VisibleTasksListener for Recorder {
    fn on_visible_tasks_changed(&self, display: DisplayId, visible_count: usize) {
        self.push(format!("visible {} {visible_count}", display.get()));
    }
}

#[test]
fn test_task_lives_in_one_desk_only() -> TestResult {
    let mut repo = repo(DeskMode::Multi);
    let display = DisplayId::DEFAULT;
    repo.add_desk(display, DeskId::new(0))?;
    repo.add_desk(display, DeskId::new(1))?;

    repo.add_task_to_desk(display, DeskId::new(0), task(3), true)?;
    repo.add_task_to_desk(display, DeskId::new(1), task(3), true)?;

    assert_eq!(repo.desk_id_for_task(task(3)), Some(DeskId::new(1)));
    let first = repo.desk(DeskId::new(0)).ok_or("desk 0 missing")?;
    assert!(first.active_tasks.is_empty());
    assert!(first.freeform_tasks_in_z_order.is_empty());
    Ok(())
}

#[test]
fn test_readding_only_updates_visibility_and_order() -> TestResult {
    let mut repo = repo(DeskMode::Single);
    let display = DisplayId::DEFAULT;
    repo.add_task(display, task(1), true)?;
    repo.add_task(display, task(2), true)?;
    repo.add_task(display, task(1), false)?;

    let desk = repo.desk(DeskId::for_display(display)).ok_or("no desk")?;
    assert_eq!(desk.active_tasks.len(), 2);
    assert_eq!(desk.freeform_tasks_in_z_order, vec![task(1), task(2)]);
    assert!(!desk.visible_tasks.contains(&task(1)));
    assert!(desk.visible_tasks.is_subset(&desk.active_tasks));
    Ok(())
}

#[test]
fn test_only_visible_ignores_closing_tasks() -> TestResult {
    let mut repo = repo(DeskMode::Single);
    let display = DisplayId::DEFAULT;
    let desk = DeskId::for_display(display);
    repo.add_task(display, task(5), true)?;
    repo.add_task(display, task(7), true)?;
    repo.add_closing_task(desk, task(7))?;

    assert!(repo.is_only_visible_non_closing_task_in_desk(task(5), desk));
    assert!(!repo.is_only_visible_non_closing_task_in_desk(task(7), desk));

    repo.remove_closing_task(task(7));
    assert!(!repo.is_only_visible_non_closing_task_in_desk(task(5), desk));
    Ok(())
}

#[test]
fn test_minimize_hides_and_unminimize_keeps_hidden() -> TestResult {
    let mut repo = repo(DeskMode::Single);
    let display = DisplayId::DEFAULT;
    repo.add_task(display, task(1), true)?;
    repo.minimize_task(display, task(1))?;

    assert!(repo.is_minimized_task(task(1)));
    assert!(!repo.is_visible_task(task(1)));
    assert!(!repo.is_any_desk_active(display));

    repo.unminimize_task(display, task(1))?;
    assert!(!repo.is_minimized_task(task(1)));
    assert!(repo.is_active_task(task(1)));
    Ok(())
}

#[test]
fn test_single_desk_removal_clears_in_place() -> TestResult {
    let mut repo = repo(DeskMode::Single);
    let display = DisplayId::new(2);
    repo.add_task(display, task(1), true)?;

    let removed = repo.remove_desk(DeskId::new(2))?;
    assert!(removed.contains(&task(1)));
    assert_eq!(repo.number_of_desks(display), 1);
    assert!(!repo.is_active_task(task(1)));
    assert_eq!(repo.target_desk_id(display), Some(DeskId::new(2)));
    Ok(())
}

#[test]
fn test_listeners_only_hear_real_changes() -> TestResult {
    let mut repo = repo(DeskMode::Multi);
    let recorder = Arc::new(Recorder::default());
    repo.add_desk_change_listener(recorder.clone());
    repo.add_visible_tasks_listener(recorder.clone(), Arc::new(Immediate));

    let display = DisplayId::DEFAULT;
    repo.add_desk(display, DeskId::new(0))?;
    repo.set_active_desk(display, DeskId::new(0))?;
    repo.add_task_to_desk(display, DeskId::new(0), task(1), true)?;
    // Same state again
    repo.add_task_to_desk(display, DeskId::new(0), task(1), true)?;
    repo.set_desk_inactive(DeskId::new(0));

    println!("{:?}", recorder.entries());
    assert_eq!(
        recorder.entries(),
        vec![
            "added 0".to_string(),
            "active 0".to_string(),
            "visible 0 1".to_string(),
            "inactive 0".to_string(),
            "visible 0 0".to_string(),
        ]
    );
    Ok(())
}

#[test]
fn test_changed_desks_are_persisted() -> TestResult {
    let store = Arc::new(MemoryPersistence::new());
    let mut repo = DeskRepository::new(
        UserId::SYSTEM,
        DeskMode::Multi,
        PersistenceDispatcher::inline(store.clone()),
    );
    let display = DisplayId::DEFAULT;
    repo.add_desk(display, DeskId::new(0))?;
    repo.add_task_to_desk(display, DeskId::new(0), task(4), true)?;

    let saved = store
        .get(UserId::SYSTEM, DeskId::new(0))
        .ok_or("desk 0 was not persisted")?;
    assert_eq!(saved.visible_tasks, vec![task(4)]);
    assert_eq!(saved.z_order, vec![task(4)]);

    repo.remove_desk(DeskId::new(0))?;
    assert!(store.is_empty());
    Ok(())
}
