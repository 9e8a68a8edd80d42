//! # Motion Control Crate
//!
//! A deterministic CNC motion control library usable on both host and MCU
//! (`no_std`-friendly).
//!
//! Provides the core motion pipeline:
//! - Kinematics (Cartesian, CoreXY) with skew compensation and soft limits
//! - Bounded planner queue with junction speed planning
//! - The motion controller: lines, arcs, dwell, homing and probing cycles
//! - A `Machine` contract abstracting the interpolator, IO and the
//!   cooperative scheduler, so tests can substitute a scripted fake

#![cfg_attr(not(feature = "std"), no_std)]

pub mod controller;
pub mod errors;
pub mod kinematics;
pub mod machine;
mod math;
pub mod planner;
pub mod settings;

// Re-export core types for easier access
pub use controller::{Capabilities, MotionController, ProbeFlags};
pub use errors::{AlarmCode, MotionError, PlannerError, ProbeResult};
pub use kinematics::{CartesianKinematics, CoreXyKinematics, Kinematics};
pub use machine::{ExecState, Machine};
pub use planner::{MotionBlock, MotionMode, Planner, PlannerBlock};
pub use settings::Settings;

/// Maximum user-space degrees of freedom (X, Y, Z, A, B, C).
pub const MAX_AXES: usize = 6;
/// Maximum physical actuators. One extra channel beyond the axes may be
/// repurposed (e.g. as a laser pulse counter).
pub const MAX_STEPPERS: usize = 6;

pub const AXIS_X: usize = 0;
pub const AXIS_Y: usize = 1;
pub const AXIS_Z: usize = 2;
pub const AXIS_A: usize = 3;
pub const AXIS_B: usize = 4;
pub const AXIS_C: usize = 5;

/// Capacity of the planner ring buffer.
pub const PLANNER_BUFFER_SIZE: usize = 32;

/// Ceiling of the 16-bit Bresenham counter used by the step generator.
/// Lines above this step count are split into equal sub-segments.
pub const MAX_STEPS_PER_LINE_BITS: u32 = 16;
pub const MAX_STEPS_PER_LINE: u32 = (1 << MAX_STEPS_PER_LINE_BITS) - 1;

/// Number of small-angle arc rotations applied before the radius vector is
/// re-seeded from an exact cos/sin evaluation.
pub const N_ARC_CORRECTION: u16 = 16;
