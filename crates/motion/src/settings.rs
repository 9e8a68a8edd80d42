//! Machine settings consumed by the motion pipeline.
//!
//! The controller and planner only ever read these values; ownership of the
//! persisted configuration (files, EEPROM) stays with the host.

use crate::{MAX_AXES, MAX_STEPPERS};

/// Laser is pulsed at a fixed pulses-per-inch density.
pub const LASER_PPI_MODE: u8 = 1 << 0;
/// Laser pulse density additionally blends with the commanded power.
pub const LASER_PPI_VARPOWER_MODE: u8 = 1 << 1;

/// Runtime machine configuration.
///
/// Linear quantities are expressed in work units (mm or inch) and minutes,
/// matching the command language; the planner fields (`acceleration`,
/// `max_step_rate`, `junction_deviation`) are expressed in dominant-axis
/// steps and seconds, the planner's native space.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub struct Settings {
    /// Number of active user axes, `1..=MAX_AXES`.
    pub axis_count: u8,
    /// Number of active actuators, `1..=MAX_STEPPERS`.
    pub stepper_count: u8,
    pub step_per_mm: [f32; MAX_STEPPERS],
    pub max_distance: [f32; MAX_AXES],
    pub backlash_steps: [u16; MAX_STEPPERS],
    /// Maximum chord sagitta allowed when tessellating arcs.
    pub arc_tolerance: f32,
    /// Dominant-axis acceleration limit, steps/s².
    pub acceleration: f32,
    /// Absolute dominant-axis step rate ceiling, steps/s. Non-finite block
    /// feeds (rapids, backlash take-up) clamp to this.
    pub max_step_rate: f32,
    /// Junction deviation distance used for corner speed planning, steps.
    pub junction_deviation: f32,
    pub homing_fast_feed: f32,
    pub homing_slow_feed: f32,
    /// Distance the machine parks away from a released limit switch.
    pub homing_offset: f32,
    /// Bit `i` set inverts the homing seek direction of axis `i`.
    pub homing_dir_invert_mask: u8,
    pub debounce_ms: u32,
    pub soft_limits_enabled: bool,
    /// After homing the runtime position is seeded with zero when set,
    /// otherwise with 0 or `max_distance` per the homing direction.
    pub origin_at_home_pos: bool,
    pub skew_compensation: bool,
    pub skew_xy_factor: f32,
    pub skew_xz_factor: f32,
    pub skew_yz_factor: f32,
    /// `LASER_PPI_MODE` / `LASER_PPI_VARPOWER_MODE` bits.
    pub laser_mode: u8,
    /// Power/density blend for `LASER_PPI_VARPOWER_MODE`, `0.0..=1.0`.
    pub laser_ppi_mix: f32,
    pub spindle_max_rpm: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            axis_count: 3,
            stepper_count: 3,
            step_per_mm: [100.0; MAX_STEPPERS],
            max_distance: [200.0, 200.0, 100.0, 360.0, 360.0, 360.0],
            backlash_steps: [0; MAX_STEPPERS],
            arc_tolerance: 0.002,
            acceleration: 10_000.0,
            max_step_rate: 30_000.0,
            junction_deviation: 1.0,
            homing_fast_feed: 600.0,
            homing_slow_feed: 60.0,
            homing_offset: 2.0,
            homing_dir_invert_mask: 0,
            debounce_ms: 250,
            soft_limits_enabled: true,
            origin_at_home_pos: true,
            skew_compensation: false,
            skew_xy_factor: 0.0,
            skew_xz_factor: 0.0,
            skew_yz_factor: 0.0,
            laser_mode: 0,
            laser_ppi_mix: 0.0,
            spindle_max_rpm: 1000,
        }
    }
}
