//! The machine contract: everything the motion controller needs from the
//! rest of the firmware, gathered behind one trait so tests can substitute a
//! scripted fake.
//!
//! The trait groups four seams:
//! - the interpolator (step timer owner): sync/stop/clear and the runtime
//!   position snapshot,
//! - raw IO: limit switches and the probe input,
//! - the execution state register and alarms,
//! - the cooperative scheduler glue serviced while the controller spins.

use crate::errors::{AlarmCode, MotionError};
use crate::planner::Planner;
use crate::{MAX_AXES, MAX_STEPPERS};
use bitflags::bitflags;

bitflags! {
    /// Global execution state bits shared between the foreground pipeline
    /// and the interrupt layer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ExecState: u8 {
        /// The interpolator is emitting pulses.
        const RUN = 1 << 0;
        /// Feed hold: motion is parked until resumed.
        const HOLD = 1 << 1;
        /// The current motion was issued by a jog command.
        const JOG = 1 << 2;
        /// A homing cycle is running; kinematic transforms and soft limits
        /// are bypassed.
        const HOMING = 1 << 3;
        /// An alarm is latched; motion is globally inhibited.
        const ALARM = 1 << 4;
        /// Pulse generation was halted mid-block.
        const HALT = 1 << 5;
    }
}

/// Collaborator contract consumed by [`MotionController`].
///
/// The implementation owns the planner ring; the controller is its only
/// producer and reaches it through [`Machine::planner`]. All waiting is
/// cooperative: the controller spins on [`Machine::dotasks`], which services
/// IO and watchdogs and reports whether a fatal abort has been latched.
///
/// [`MotionController`]: crate::controller::MotionController
pub trait Machine {
    /// The planner ring fed by the controller and drained by the step
    /// interpolator.
    fn planner(&mut self) -> &mut Planner;

    // --- interpolator ---

    /// Blocks until every queued block has been fully executed and the
    /// in-flight block is finished, or motion was halted.
    ///
    /// Establishes a happens-before edge: every block enqueued before the
    /// call has been executed when it returns.
    fn sync(&mut self) -> Result<(), MotionError>;
    /// Ceases pulse emission and discards the in-flight block.
    fn stop_pulses(&mut self);
    /// Resets interpolator runtime state to match a cleared planner.
    fn clear_interpolator(&mut self);
    /// Atomic snapshot of the real-time actuator positions.
    fn rt_position(&self) -> [i32; MAX_STEPPERS];
    /// Seeds the runtime position from a user-space coordinate after homing.
    fn reset_rt_position(&mut self, axis: &[f32; MAX_AXES]);
    /// Re-applies the planned tool state to the spindle output.
    fn sync_spindle(&mut self);
    /// Current real-time dominant-axis step rate.
    fn rt_feed(&self) -> f32;

    // --- io ---

    /// Raw asserted limit switch mask, bit `i` for axis `i`.
    fn limits(&self) -> u8;
    /// Raw probe input level.
    fn probe_pin(&self) -> bool;
    /// Restricts which limit switches may trigger the halt ISR.
    fn lock_limits(&mut self, mask: u8);
    /// Temporarily inverts the ISR polarity of the masked switches so a
    /// release edge fires instead of an assert edge. Zero restores normal
    /// polarity.
    fn invert_limits(&mut self, mask: u8);
    fn enable_probe(&mut self);
    fn disable_probe(&mut self);

    // --- execution state ---

    /// Returns the intersection of the current state with `mask`.
    fn exec_state(&self, mask: ExecState) -> ExecState;
    fn set_exec_state(&mut self, state: ExecState);
    fn clear_exec_state(&mut self, state: ExecState);
    /// True iff any bit of `mask` is currently set.
    fn has_exec_state(&self, mask: ExecState) -> bool {
        !self.exec_state(mask).is_empty()
    }
    /// Latches an alarm; motion is globally inhibited until unlocked.
    fn alarm(&mut self, code: AlarmCode);
    /// Clears latched HALT/HOLD/ALARM/HOMING state so a new motion can start.
    fn unlock(&mut self);
    /// Immediately terminates in-flight motion (`HALT` path).
    fn halt(&mut self);

    // --- cooperative glue ---

    /// Services pending IO, watchdog and runtime callbacks. Returns `false`
    /// iff a fatal abort condition has been latched; the caller then unwinds
    /// with [`MotionError::CriticalFail`]. Must never call back into the
    /// motion controller.
    fn dotasks(&mut self) -> bool;
    fn delay_ms(&mut self, ms: u32);

    // --- parser callbacks ---

    /// Publishes the captured probe trigger position.
    fn update_probe_position(&mut self, steps: &[i32; MAX_STEPPERS]);
    /// Mirrors the controller position into the command parser.
    fn sync_parser_position(&mut self, axis: &[f32; MAX_AXES]);
}
