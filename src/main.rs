//! deskmode - headless desktop session driver
//!
//! Replays a JSON script of desktop operations against recording
//! collaborators and prints the resulting repository state:
//! - **--replay FILE**: steps to run, see `harness::ScriptStep`
//! - **--config FILE**: desktop config, defaults to `DESKMODE_CONFIG_FILE`
//!
//! Run with `--help` to see the options.

use std::path::Path;

use deskmode::config::DesktopConfig;
use deskmode::harness::{self, ScriptStep};

static USAGE: &[&str] = &[
    "--replay FILE : Replay a JSON list of steps and print the final desk state.",
    "--config FILE : Load the desktop config from FILE.",
];

fn print_usage() {
    println!("USAGE: deskmode --replay FILE [--config FILE]");
    println!();
    println!("Options:");
    for line in USAGE {
        println!("\t{line}");
    }
}

fn run(script: &str, config_file: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = match config_file {
        Some(path) => DesktopConfig::load_from_file(Path::new(&path))?,
        None => DesktopConfig::from_env(),
    };
    let steps: Vec<ScriptStep> = serde_json::from_str(&std::fs::read_to_string(script)?)?;
    tracing::info!("Replaying {} steps from {script}", steps.len());

    let snapshot = harness::replay(config, steps)?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn main() {
    if let Ok(env_filter) = tracing_subscriber::EnvFilter::try_from_default_env() {
        tracing_subscriber::fmt()
            .compact()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().compact().init();
    }

    let args: Vec<String> = std::env::args().collect();
    let mut script = None;
    let mut config_file = None;
    let mut i = 1;
    while i < args.len() {
        if args[i] == "--replay" && i + 1 < args.len() {
            script = Some(args[i + 1].clone());
            i += 2;
        } else if args[i] == "--config" && i + 1 < args.len() {
            config_file = Some(args[i + 1].clone());
            tracing::info!("Using config file: {}", args[i + 1]);
            i += 2;
        } else if args[i] == "--help" || args[i] == "-h" {
            print_usage();
            return;
        } else {
            tracing::warn!("Ignoring unknown argument {}", args[i]);
            i += 1;
        }
    }

    let Some(script) = script else {
        print_usage();
        std::process::exit(1);
    };

    if let Err(e) = run(&script, config_file) {
        tracing::error!("Replay failed: {e}");
        std::process::exit(1);
    }
}
