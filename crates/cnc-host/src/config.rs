//! Machine configuration loader.
//!
//! Reads an INI-style machine file into the core [`Settings`] struct. Every
//! key is optional and falls back to the built-in defaults, so a minimal
//! file only names what differs from a stock 3-axis machine.

use anyhow::{anyhow, Context, Result};
use configparser::ini::Ini;
use motion::Settings;
use std::path::Path;

const AXIS_SECTIONS: [&str; 6] = ["axis_x", "axis_y", "axis_z", "axis_a", "axis_b", "axis_c"];

fn get_float(ini: &Ini, section: &str, key: &str, default: f32) -> Result<f32> {
    match ini.getfloat(section, key) {
        Ok(Some(value)) => Ok(value as f32),
        Ok(None) => Ok(default),
        Err(error) => Err(anyhow!("[{section}] {key}: {error}")),
    }
}

fn get_uint(ini: &Ini, section: &str, key: &str, default: u64) -> Result<u64> {
    match ini.getuint(section, key) {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Ok(default),
        Err(error) => Err(anyhow!("[{section}] {key}: {error}")),
    }
}

fn get_bool(ini: &Ini, section: &str, key: &str, default: bool) -> Result<bool> {
    match ini.getbool(section, key) {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Ok(default),
        Err(error) => Err(anyhow!("[{section}] {key}: {error}")),
    }
}

/// Loads and parses the machine configuration from the given path.
pub fn load(path: &Path) -> Result<Settings> {
    let mut ini = Ini::new();
    ini.load(path)
        .map_err(|e| anyhow!(e))
        .with_context(|| format!("failed to load machine configuration: {path:?}"))?;

    let mut settings = Settings::default();

    settings.axis_count = get_uint(&ini, "machine", "axis_count", 3)? as u8;
    settings.stepper_count =
        get_uint(&ini, "machine", "stepper_count", settings.axis_count as u64)? as u8;
    settings.soft_limits_enabled =
        get_bool(&ini, "machine", "soft_limits", settings.soft_limits_enabled)?;
    settings.origin_at_home_pos = get_bool(
        &ini,
        "machine",
        "origin_at_home_pos",
        settings.origin_at_home_pos,
    )?;

    for (i, section) in AXIS_SECTIONS.iter().enumerate() {
        settings.step_per_mm[i] =
            get_float(&ini, section, "steps_per_mm", settings.step_per_mm[i])?;
        settings.max_distance[i] =
            get_float(&ini, section, "max_distance", settings.max_distance[i])?;
        settings.backlash_steps[i] = get_uint(
            &ini,
            section,
            "backlash_steps",
            settings.backlash_steps[i] as u64,
        )? as u16;
    }

    settings.acceleration =
        get_float(&ini, "planner", "acceleration", settings.acceleration)?;
    settings.max_step_rate =
        get_float(&ini, "planner", "max_step_rate", settings.max_step_rate)?;
    settings.junction_deviation = get_float(
        &ini,
        "planner",
        "junction_deviation",
        settings.junction_deviation,
    )?;

    settings.arc_tolerance = get_float(&ini, "arc", "tolerance", settings.arc_tolerance)?;

    settings.homing_fast_feed =
        get_float(&ini, "homing", "fast_feed", settings.homing_fast_feed)?;
    settings.homing_slow_feed =
        get_float(&ini, "homing", "slow_feed", settings.homing_slow_feed)?;
    settings.homing_offset = get_float(&ini, "homing", "offset", settings.homing_offset)?;
    settings.homing_dir_invert_mask = get_uint(
        &ini,
        "homing",
        "dir_invert_mask",
        settings.homing_dir_invert_mask as u64,
    )? as u8;
    settings.debounce_ms =
        get_uint(&ini, "homing", "debounce_ms", settings.debounce_ms as u64)? as u32;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let mut file = tempfile();
        writeln!(
            file.1,
            "[machine]\naxis_count = 4\n\n[axis_x]\nsteps_per_mm = 80\n\n[homing]\noffset = 3.5\n"
        )
        .unwrap();

        let settings = load(&file.0).unwrap();
        assert_eq!(settings.axis_count, 4);
        assert_eq!(settings.stepper_count, 4);
        assert_eq!(settings.step_per_mm[0], 80.0);
        assert_eq!(settings.step_per_mm[1], 100.0);
        assert_eq!(settings.homing_offset, 3.5);
        assert_eq!(settings.arc_tolerance, 0.002);
    }

    fn tempfile() -> (std::path::PathBuf, std::fs::File) {
        let path = std::env::temp_dir().join(format!(
            "cnc-host-config-test-{}.cfg",
            std::process::id()
        ));
        let file = std::fs::File::create(&path).unwrap();
        (path, file)
    }
}
