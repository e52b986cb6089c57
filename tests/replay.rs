mod common;

use common::{task, TestResult};
use deskmode::config::{DeskMode, DesktopConfig};
use deskmode::harness::{self, ScriptStep};
use deskmode::ids::{DeskId, DisplayId};

const DISPLAY: &str = r#"{
    "step": "add_display",
    "display": {
        "id": 0,
        "density_dpi": 160,
        "bounds": { "x": 0, "y": 0, "w": 1920, "h": 1080 },
        "stable_bounds": { "x": 0, "y": 0, "w": 1920, "h": 1032 }
    }
}"#;

fn steps(body: &[&str]) -> Result<Vec<ScriptStep>, serde_json::Error> {
    let json = format!("[{DISPLAY},{}]", body.join(","));
    serde_json::from_str(&json)
}

#[test]
fn test_replay_enter_and_snap() -> TestResult {
    let script = steps(&[
        r#"{ "step": "add_task", "task": { "id": 1, "display": 0, "app": "browser" } }"#,
        r#"{ "step": "add_task", "task": { "id": 2, "display": 0, "app": "mail" } }"#,
        r#"{ "step": "move_to_desk", "task": 1 }"#,
        r#"{ "step": "move_to_desk", "task": 2 }"#,
        r#"{ "step": "snap", "task": 2, "side": "left" }"#,
        r#"{ "step": "minimize", "task": 1 }"#,
    ])?;

    let snapshot = harness::replay(DesktopConfig::default(), script)?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    assert_eq!(snapshot.desks.len(), 1);
    let desk = &snapshot.desks[0];
    assert_eq!(desk.id, DeskId::for_display(DisplayId::DEFAULT));
    assert_eq!(desk.left_tiled_task, Some(task(2)));
    assert!(desk.minimized_tasks.contains(&task(1)));
    assert!(desk.visible_tasks.contains(&task(2)));
    assert_eq!(
        snapshot.active_desks.get(&DisplayId::DEFAULT),
        Some(&desk.id)
    );
    Ok(())
}

#[test]
fn test_replay_drag_gesture() -> TestResult {
    let script = steps(&[
        r#"{ "step": "add_task", "task": { "id": 7, "display": 0, "app": "browser",
             "bounds": { "x": 0, "y": 0, "w": 1920, "h": 1080 } } }"#,
        r#"{ "step": "drag_start", "task": 7, "bounds": { "x": 600, "y": 40, "w": 720, "h": 405 } }"#,
        r#"{ "step": "drag_move", "bounds": { "x": 500, "y": 300, "w": 720, "h": 405 } }"#,
        r#"{ "step": "drag_commit", "bounds": { "x": 300, "y": 200, "w": 800, "h": 600 } }"#,
    ])?;

    let snapshot = harness::replay(DesktopConfig::default(), script)?;
    let desk = snapshot.desks.first().ok_or("no desk was created")?;
    assert_eq!(desk.freeform_tasks_in_z_order, vec![task(7)]);
    assert!(desk.visible_tasks.contains(&task(7)));
    Ok(())
}

#[test]
fn test_replay_with_config_file() -> TestResult {
    let path = std::env::temp_dir().join(format!("deskmode-replay-{}.conf", std::process::id()));
    std::fs::write(&path, "desks multi\nmax_tasks 1\n")?;
    let config = DesktopConfig::load_from_file(&path);
    let _ = std::fs::remove_file(&path);
    let config = config?;
    assert_eq!(config.desk_mode, DeskMode::Multi);

    let script = steps(&[
        r#"{ "step": "add_task", "task": { "id": 1, "display": 0, "app": "browser" } }"#,
        r#"{ "step": "add_task", "task": { "id": 2, "display": 0, "app": "mail" } }"#,
        r#"{ "step": "move_to_desk", "task": 1 }"#,
        r#"{ "step": "move_to_desk", "task": 2 }"#,
    ])?;
    let snapshot = harness::replay(config, script)?;

    let desk = snapshot.desks.first().ok_or("no desk was created")?;
    assert_eq!(desk.id, DeskId::new(0));
    assert!(desk.minimized_tasks.contains(&task(1)));
    assert_eq!(desk.visible_tasks.iter().copied().collect::<Vec<_>>(), vec![task(2)]);
    Ok(())
}

#[test]
fn test_replay_stops_at_failing_step() {
    let script = steps(&[r#"{ "step": "minimize", "task": 42 }"#]);
    let Ok(script) = script else {
        panic!("script should parse");
    };
    assert!(harness::replay(DesktopConfig::default(), script).is_err());
}
