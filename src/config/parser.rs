use super::*;

/// Parse a desktop config file
///
/// Malformed lines are logged and skipped so one typo does not cost the user
/// the rest of their configuration.
pub fn parse_config(content: &str) -> Result<DesktopConfig, ConfigError> {
    let mut config = DesktopConfig::default();

    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Err(message) = parse_line(&mut config, line) {
            let err = ConfigError::Parse {
                line: line_num + 1,
                message,
            };
            tracing::warn!("Skipping config line '{line}': {err}");
        }
    }

    Ok(config)
}

fn parse_line(config: &mut DesktopConfig, line: &str) -> Result<(), String> {
    let expanded = config.expand_variables(line);
    let parts: Vec<&str> = if line.starts_with("set ") {
        line.split_whitespace().collect()
    } else {
        expanded.split_whitespace().collect()
    };
    let (first_part, rest) = parts.split_first().ok_or("Empty command line")?;

    match *first_part {
        "set" => parse_set(config, rest),
        "desks" => parse_desks(config, rest),
        "max_tasks" => parse_max_tasks(config, rest),
        "feature" => parse_feature(config, rest),
        "cascade_offset" => parse_cascade_offset(config, rest),
        "initial_bounds_scale" => parse_bounds_scale(config, rest),
        "incompatible_app" => parse_incompatible_app(config, rest),
        _ => {
            // Ignore unrecognized commands for now
            tracing::debug!("Ignoring unknown config command {first_part}");
            Ok(())
        }
    }
}

fn parse_set(config: &mut DesktopConfig, parts: &[&str]) -> Result<(), String> {
    let (var_name, value) = parts
        .split_first()
        .filter(|(_, value)| !value.is_empty())
        .ok_or("set requires variable name and value")?;

    // Remove leading $ from variable name if present
    let var_name = var_name.strip_prefix('$').unwrap_or(var_name);

    // Expand any variables in the value
    let expanded_value = config.expand_variables(&value.join(" "));
    config
        .variables
        .insert(var_name.to_string(), expanded_value);

    Ok(())
}

fn parse_desks(config: &mut DesktopConfig, parts: &[&str]) -> Result<(), String> {
    config.desk_mode = match parts.first().copied() {
        Some("single") => DeskMode::Single,
        Some("multi") => DeskMode::Multi,
        other => return Err(format!("desks expects single|multi, got {other:?}")),
    };
    Ok(())
}

fn parse_max_tasks(config: &mut DesktopConfig, parts: &[&str]) -> Result<(), String> {
    let value = parts.first().ok_or("max_tasks requires a value")?;
    config.max_tasks = match *value {
        "none" | "unlimited" | "0" => None,
        n => Some(
            n.parse::<usize>()
                .map_err(|e| format!("invalid max_tasks {n}: {e}"))?,
        ),
    };
    Ok(())
}

fn parse_feature(config: &mut DesktopConfig, parts: &[&str]) -> Result<(), String> {
    let [name, state] = parts else {
        return Err("feature requires a name and enable|disable".to_string());
    };
    let flag = DesktopFeatures::from_name(&name.to_uppercase())
        .ok_or_else(|| format!("unknown feature {name}"))?;
    let enabled = parse_bool(state)?;
    config.features.set(flag, enabled);
    Ok(())
}

fn parse_cascade_offset(config: &mut DesktopConfig, parts: &[&str]) -> Result<(), String> {
    let value = parts.first().ok_or("cascade_offset requires a value")?;
    config.cascade_offset_dp = value
        .parse::<i32>()
        .map_err(|e| format!("invalid cascade_offset {value}: {e}"))?;
    Ok(())
}

fn parse_bounds_scale(config: &mut DesktopConfig, parts: &[&str]) -> Result<(), String> {
    let value = parts.first().ok_or("initial_bounds_scale requires a value")?;
    let scale = value
        .parse::<f32>()
        .map_err(|e| format!("invalid initial_bounds_scale {value}: {e}"))?;
    if !(0.1..=1.0).contains(&scale) {
        return Err(format!("initial_bounds_scale {scale} out of range 0.1..=1.0"));
    }
    config.initial_bounds_scale = scale;
    Ok(())
}

fn parse_incompatible_app(config: &mut DesktopConfig, parts: &[&str]) -> Result<(), String> {
    if parts.is_empty() {
        return Err("incompatible_app requires an app name".to_string());
    }
    config
        .incompatible_apps
        .extend(parts.iter().map(|app| app.to_string()));
    Ok(())
}

/// Booleans compatible with i3/sway: yes/no, true/false, on/off, enable/disable, 1/0
fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_lowercase().as_str() {
        "yes" | "true" | "on" | "enable" | "enabled" | "1" => Ok(true),
        "no" | "false" | "off" | "disable" | "disabled" | "0" => Ok(false),
        other => Err(format!("expected a boolean, got {other}")),
    }
}
