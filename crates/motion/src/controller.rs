//! # Motion controller
//!
//! The single producer of planner blocks. Every motion, whatever the
//! source, funnels through [`MotionController::line`], which:
//!
//! 1. decouples the target point from the remaining pipeline,
//! 2. applies the kinematic transform to the target,
//! 3. gates the target against the soft-limit envelope,
//! 4. converts the target to actuator positions,
//! 5. derives the per-actuator motion change from the previous line,
//! 6. splits lines too big for the step generator into sub-segments.
//!
//! Arcs are tessellated into chords and re-enter through `line`; homing and
//! probing are limit-switch-terminated motions orchestrated on top of it.

use crate::errors::{AlarmCode, MotionError, ProbeResult};
use crate::kinematics::{check_boundaries, Kinematics};
use crate::machine::{ExecState, Machine};
use crate::math;
use crate::planner::{MotionBlock, MotionMode};
use crate::settings::{Settings, LASER_PPI_MODE, LASER_PPI_VARPOWER_MODE};
use crate::{MAX_AXES, MAX_STEPPERS, MAX_STEPS_PER_LINE, MAX_STEPS_PER_LINE_BITS, N_ARC_CORRECTION};
use bitflags::bitflags;
use core::f32::consts::PI;

bitflags! {
    /// Probe cycle options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ProbeFlags: u8 {
        /// Expect the probe input to read low on contact.
        const INVERT = 1 << 0;
        /// Report a miss through the return value only, without latching an
        /// alarm.
        const NO_ALARM_ON_FAIL = 1 << 1;
    }
}

/// Optional pipeline behaviours selected at construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    /// Inject slack take-up blocks on actuator direction reversals.
    pub backlash_compensation: bool,
    /// Repurpose the last actuator channel as a laser pulse counter.
    pub laser_ppi: bool,
    /// Planner is linear-actuator driven: accumulate `full_steps` and hand
    /// over raw (un-normalised) direction vectors.
    pub linact_planner: bool,
}

/// The motion controller. Owns the planned position state and drives the
/// machine through the [`Machine`] contract; the generic seams let tests
/// instantiate isolated controllers over scripted fakes.
pub struct MotionController<K: Kinematics, M: Machine> {
    settings: Settings,
    kinematics: K,
    machine: M,
    caps: Capabilities,
    /// Step position the planner tail has reached.
    last_step_pos: [i32; MAX_STEPPERS],
    /// Last user-space target handed in (post transform).
    last_target: [f32; MAX_AXES],
    /// Direction pattern of the most recent non-backlash block.
    last_dirbits: u8,
    /// Dry run: commands are validated but nothing is enqueued.
    checkmode: bool,
}

impl<K: Kinematics, M: Machine> MotionController<K, M> {
    pub fn new(settings: Settings, kinematics: K, machine: M, caps: Capabilities) -> Self {
        let mut controller = Self {
            settings,
            kinematics,
            machine,
            caps,
            last_step_pos: [0; MAX_STEPPERS],
            last_target: [0.0; MAX_AXES],
            last_dirbits: 0,
            checkmode: false,
        };
        controller.sync_position();
        controller
    }

    pub fn checkmode(&self) -> bool {
        self.checkmode
    }

    pub fn toggle_checkmode(&mut self) -> bool {
        self.checkmode = !self.checkmode;
        self.checkmode
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut M {
        &mut self.machine
    }

    /// Step position of the planner tail.
    pub fn last_step_position(&self) -> [i32; MAX_STEPPERS] {
        self.last_step_pos
    }

    /// Actuator channels that carry axis motion. With the laser PPI
    /// capability the last channel counts laser pulses instead.
    fn axis_to_steppers(&self) -> usize {
        let count = self.settings.stepper_count as usize;
        if self.caps.laser_ppi {
            count - 1
        } else {
            count
        }
    }

    /// Issues a straight motion to `target` (user space, work units).
    ///
    /// On a mid-line failure `target` is rewritten with the point the
    /// motion actually reached, so the caller knows where the machine
    /// stopped.
    pub fn line(
        &mut self,
        target: &mut [f32; MAX_AXES],
        block: &mut MotionBlock,
    ) -> Result<(), MotionError> {
        // reset dirbits (this prevents odd behaviour generated by long arcs)
        block.dirbits = 0;

        // In homing mode no kinematic modification is applied, to prevent
        // unwanted movement of the axes that are not being homed.
        let homing = self.machine.has_exec_state(ExecState::HOMING);
        if !homing {
            self.kinematics.apply_transform(&self.settings, target);
        }

        if !check_boundaries(&self.settings, target, homing) {
            if self.machine.has_exec_state(ExecState::JOG) {
                return Err(MotionError::TravelExceeded);
            }
            self.machine.alarm(AlarmCode::SoftLimit);
            return Ok(());
        }

        let mut step_new_pos = [0i32; MAX_STEPPERS];
        self.kinematics
            .apply_inverse(&self.settings, target, &mut step_new_pos);

        // amount of stepper motion for this line
        let mut max_steps = 0u32;
        block.main_stepper = u8::MAX;
        for i in (0..self.axis_to_steppers()).rev() {
            let steps = step_new_pos[i] - self.last_step_pos[i];
            if steps < 0 {
                block.dirbits |= 1 << i;
            }
            let steps = steps.unsigned_abs();
            if max_steps < steps {
                max_steps = steps;
                block.main_stepper = i as u8;
            }
        }

        // no significant motion will take place. don't send anything to the
        // planner
        if max_steps == 0 {
            return Ok(());
        }

        let mut prev_target = self.last_target;

        let mut motion_segment = [0.0f32; MAX_AXES];
        let axis_count = self.settings.axis_count as usize;
        let mut dist_sqr = 0.0f32;
        for i in (0..axis_count).rev() {
            motion_segment[i] = target[i] - prev_target[i];
            block.dir_vect[i] = motion_segment[i];
            dist_sqr += motion_segment[i] * motion_segment[i];
        }
        let line_dist = math::sqrtf(dist_sqr);
        let inv_dist = 1.0 / line_dist;

        // the junction speed factor is axis driven unless the planner works
        // on the linear actuators directly
        if !self.caps.linact_planner {
            for i in (0..axis_count).rev() {
                block.dir_vect[i] *= inv_dist;
            }
        }

        if self.caps.laser_ppi {
            let ppi = self.settings.stepper_count as usize - 1;
            self.last_step_pos[ppi] = 0;
            let mut pulses = 0.0f32;
            if block.spindle_running && block.spindle != 0 {
                let mut pulses_per_mm = self.settings.step_per_mm[ppi];
                if self.settings.laser_mode & LASER_PPI_MODE != 0 {
                    let mut scale =
                        block.spindle as f32 / self.settings.spindle_max_rpm as f32;
                    if self.settings.laser_mode & LASER_PPI_VARPOWER_MODE != 0 {
                        let blend = self.settings.laser_ppi_mix;
                        scale = scale * blend + (1.0 - blend);
                    }
                    pulses_per_mm *= scale;
                }
                pulses = pulses_per_mm * line_dist;
            }
            step_new_pos[ppi] = pulses as i32;
            max_steps = max_steps.max(step_new_pos[ppi] as u32);
        }

        // total motion execution rate at the given feed, as dominant-axis
        // steps per second
        let feed = block.feed;
        let inv_delta = if block.motion_mode.contains(MotionMode::INVERSE_FEED) {
            block.feed * (1.0 / 60.0)
        } else {
            block.feed * (1.0 / 60.0) * inv_dist
        };
        block.feed = max_steps as f32 * inv_delta;

        // if the line is too big to be executed correctly by the step
        // generator, break it into smaller segments
        let mut line_segments = 1u32;
        if let Some(factor) = self.kinematics.segment_factor() {
            line_segments = (math::ceilf(line_dist * factor) as u32).max(1);
            let m_inv = 1.0 / line_segments as f32;
            for i in (0..axis_count).rev() {
                motion_segment[i] *= m_inv;
            }
        } else if max_steps > MAX_STEPS_PER_LINE {
            line_segments += max_steps >> MAX_STEPS_PER_LINE_BITS;
            let m_inv = 1.0 / line_segments as f32;
            for i in (0..axis_count).rev() {
                motion_segment[i] *= m_inv;
            }
        }

        while line_segments > 1 {
            line_segments -= 1;
            block.motion_mode |= MotionMode::IS_SUBSEGMENT;
            for i in (0..axis_count).rev() {
                prev_target[i] += motion_segment[i];
            }
            self.kinematics
                .apply_inverse(&self.settings, &prev_target, &mut step_new_pos);
            if let Err(error) = self.emit_segment(&step_new_pos, block) {
                // report back where the motion actually stopped
                *target = prev_target;
                block.feed = feed;
                return Err(error);
            }
        }

        // the last segment targets the exact commanded endpoint, never the
        // accumulated sub-target, to avoid drift
        if block.motion_mode.contains(MotionMode::IS_SUBSEGMENT) {
            self.kinematics
                .apply_inverse(&self.settings, target, &mut step_new_pos);
        }

        let result = self.emit_segment(&step_new_pos, block);
        self.last_target = *target;
        block.feed = feed;
        block.motion_mode.remove(MotionMode::IS_SUBSEGMENT);
        result
    }

    /// Recomputes the block's actuator deltas against the planned position
    /// and enqueues it, preceded by a backlash block when any actuator
    /// reverses.
    fn emit_segment(
        &mut self,
        step_new_pos: &[i32; MAX_STEPPERS],
        block: &mut MotionBlock,
    ) -> Result<(), MotionError> {
        let stepper_count = self.settings.stepper_count as usize;
        // with a nonlinear model the actuator deltas decide direction and
        // dominance, not the axis deltas
        let nonlinear = self.kinematics.segment_factor().is_some();

        block.total_steps = 0;
        block.full_steps = 0;
        if nonlinear {
            block.dirbits = 0;
        }
        for i in (0..stepper_count).rev() {
            let delta = step_new_pos[i] - self.last_step_pos[i];
            let steps = delta.unsigned_abs();
            block.steps[i] = steps;
            if nonlinear && delta < 0 {
                block.dirbits |= 1 << i;
            }
            if self.caps.linact_planner {
                block.full_steps += steps;
            }
            if block.total_steps < steps {
                block.total_steps = steps;
                if nonlinear {
                    block.main_stepper = i as u8;
                }
            }
        }

        if block.total_steps == 0 {
            return Ok(());
        }

        self.last_step_pos = *step_new_pos;

        // check mode runs the full validation pipeline but keeps the
        // planner untouched
        if self.checkmode {
            return Ok(());
        }

        if self.caps.backlash_compensation {
            let inverted = self.last_dirbits ^ block.dirbits;
            if inverted != 0 {
                let mut backlash = *block;
                backlash.steps = [0; MAX_STEPPERS];
                backlash.total_steps = 0;
                backlash.full_steps = 0;
                backlash.feed = f32::INFINITY;
                backlash.motion_mode |= MotionMode::BACKLASH_COMPENSATION;
                for i in (0..stepper_count).rev() {
                    if inverted & (1 << i) != 0 {
                        backlash.steps[i] = self.settings.backlash_steps[i] as u32;
                        if self.caps.linact_planner {
                            backlash.full_steps += backlash.steps[i];
                        }
                        if backlash.total_steps < backlash.steps[i] {
                            backlash.total_steps = backlash.steps[i];
                            backlash.main_stepper = i as u8;
                        }
                    }
                }

                if backlash.total_steps != 0 {
                    self.wait_for_planner_slot()?;
                    self.machine
                        .planner()
                        .add_line(&backlash)
                        .map_err(|_| MotionError::CriticalFail)?;
                }
                // dwell only executes on the first block of the move
                block.dwell = 0;
                self.last_dirbits = block.dirbits;
            }
        }

        self.wait_for_planner_slot()?;
        self.machine
            .planner()
            .add_line(block)
            .map_err(|_| MotionError::CriticalFail)?;
        block.dwell = 0;

        Ok(())
    }

    fn wait_for_planner_slot(&mut self) -> Result<(), MotionError> {
        while self.machine.planner().is_full() {
            if !self.machine.dotasks() {
                return Err(MotionError::CriticalFail);
            }
        }
        Ok(())
    }

    /// Issues a circular motion in the `(axis_0, axis_1)` plane from the
    /// current position to `target`, linearly interpolating every other
    /// axis. The arc is approximated by chords whose sagitta stays within
    /// the configured arc tolerance, each emitted through [`Self::line`].
    #[allow(clippy::too_many_arguments)]
    pub fn arc(
        &mut self,
        target: &mut [f32; MAX_AXES],
        center_offset_a: f32,
        center_offset_b: f32,
        radius: f32,
        axis_0: usize,
        axis_1: usize,
        clockwise: bool,
        block: &mut MotionBlock,
    ) -> Result<(), MotionError> {
        let mut position = [0.0f32; MAX_AXES];
        self.get_position(&mut position);

        let center_a = position[axis_0] + center_offset_a;
        let center_b = position[axis_1] + center_offset_b;

        // radius vectors from the center to the start and end points
        let mut pt_a = -center_offset_a;
        let mut pt_b = -center_offset_b;
        let end_a = target[axis_0] - center_a;
        let end_b = target[axis_1] - center_b;

        let dotprod = pt_a * end_a + pt_b * end_b;
        let det = pt_a * end_b - pt_b * end_a;
        let mut arc_angle = math::atan2f(det, dotprod);
        if clockwise {
            if arc_angle >= 0.0 {
                arc_angle -= 2.0 * PI;
            }
        } else if arc_angle <= 0.0 {
            arc_angle += 2.0 * PI;
        }

        // chord count that keeps the sagitta within tolerance
        let tolerance = self.settings.arc_tolerance;
        let half_sweep = 0.5 * (radius * arc_angle);
        let segment_count = math::floorf(
            math::fabsf(half_sweep) / math::sqrtf(tolerance * (2.0 * radius - tolerance)),
        ) as u16;
        let arc_per_sgm = if segment_count != 0 {
            arc_angle / segment_count as f32
        } else {
            arc_angle
        };

        // linear advance of the out-of-plane axes per segment
        let axis_count = self.settings.axis_count as usize;
        let mut increment = [0.0f32; MAX_AXES];
        for i in (0..axis_count).rev() {
            increment[i] = (target[i] - position[i]) / segment_count as f32;
        }
        increment[axis_0] = 0.0;
        increment[axis_1] = 0.0;

        if block.motion_mode.contains(MotionMode::INVERSE_FEED) {
            // split the required time across the sub-segments so the whole
            // arc keeps the commanded duration
            block.feed *= segment_count as f32;
        }

        // Approximate sin/cos of the per-segment angle with a Taylor
        // expansion, correcting the cosine with one extra term. The radius
        // vector is re-seeded with an exact evaluation every
        // N_ARC_CORRECTION segments, the same scheme grbl uses.
        let arc_per_sgm_sqr = arc_per_sgm * arc_per_sgm;
        let mut cos_per_sgm = 1.0 - (1.0 / 6.0) * arc_per_sgm_sqr;
        let sin_per_sgm = arc_per_sgm * cos_per_sgm;
        cos_per_sgm = arc_per_sgm_sqr * (cos_per_sgm + 1.0);
        cos_per_sgm = 1.0 - 0.25 * cos_per_sgm;

        let mut count = 0u16;
        for i in 1..segment_count {
            if count < N_ARC_CORRECTION {
                // incremental rotation of the radius vector
                let new_pt = pt_a * sin_per_sgm + pt_b * cos_per_sgm;
                pt_a = pt_a * cos_per_sgm - pt_b * sin_per_sgm;
                pt_b = new_pt;
                count += 1;
            } else {
                // exact re-seed from the original offset vector; sine from
                // the cosine through sin² + cos² = 1, which is cheaper than
                // a second trig evaluation
                let angle = i as f32 * arc_per_sgm;
                let precise_cos = math::cosf(angle);
                let mut precise_sin = math::sqrtf(1.0 - precise_cos * precise_cos);
                if angle >= 0.0 {
                    if math::fabsf(angle) > PI {
                        precise_sin = -precise_sin;
                    }
                } else if math::fabsf(angle) <= PI {
                    precise_sin = -precise_sin;
                }

                pt_a = -center_offset_a * precise_cos + center_offset_b * precise_sin;
                pt_b = -center_offset_a * precise_sin - center_offset_b * precise_cos;
                count = 0;
            }

            position[axis_0] = center_a + pt_a;
            position[axis_1] = center_b + pt_b;
            for j in (0..axis_count).rev() {
                if j != axis_0 && j != axis_1 {
                    position[j] += increment[j];
                }
            }

            self.line(&mut position, block)?;
        }

        // ensure the last segment arrives exactly at the target location
        self.line(target, block)
    }

    /// Flushes tool state and pauses for the block's dwell time.
    pub fn dwell(&mut self, block: &mut MotionBlock) -> Result<(), MotionError> {
        if !self.checkmode {
            self.update_tools(block)?;
            self.machine.delay_ms(block.dwell);
        }
        Ok(())
    }

    /// Drains the pipeline and raises a feed hold.
    pub fn pause(&mut self) -> Result<(), MotionError> {
        if !self.checkmode {
            self.machine.sync()?;
            self.machine.set_exec_state(ExecState::HOLD);
        }
        Ok(())
    }

    /// Drains the pipeline and re-synchronizes the spindle and coolant
    /// outputs with the block's tool state.
    pub fn update_tools(&mut self, block: &MotionBlock) -> Result<(), MotionError> {
        if !self.checkmode {
            self.machine.sync()?;
            self.machine.planner().sync_tools(block);
            self.machine.sync_spindle();
        }
        Ok(())
    }

    /// Homes a single axis against the limit switches in `limit_mask`.
    ///
    /// Fast-seeks into the switch at 1.5× the axis travel, then backs off at
    /// the slow feed with the switch polarity inverted so the release edge
    /// terminates the motion. Alarms and fails when the switch state does
    /// not match the expected phase.
    pub fn home_axis(&mut self, axis: usize, limit_mask: u8) -> Result<(), MotionError> {
        let axis_mask = 1u8 << axis;
        let mut block = MotionBlock::default();

        self.machine.unlock();

        // only the target switch may terminate the seek
        self.machine.lock_limits(limit_mask);
        self.machine.invert_limits(0);
        if self.machine.has_exec_state(ExecState::HOLD | ExecState::ALARM)
            || self.machine.limits() != 0
        {
            self.machine.alarm(AlarmCode::HomingFailLimitActive);
            return Err(MotionError::CriticalFail);
        }

        let mut max_home_dist = -self.settings.max_distance[axis] * 1.5;
        if self.settings.homing_dir_invert_mask & axis_mask != 0 {
            max_home_dist = -max_home_dist;
        }

        self.sync_position();
        let mut target = [0.0f32; MAX_AXES];
        self.get_position(&mut target);
        target[axis] += max_home_dist;

        block.total_steps = math::fabsf(max_home_dist) as u32;
        block.steps = [0; MAX_STEPPERS];
        block.steps[axis] = math::fabsf(max_home_dist) as u32;
        block.feed = self.settings.homing_fast_feed;
        block.spindle = 0;
        block.dwell = 0;
        block.motion_mode = MotionMode::FEED;

        self.machine.unlock();
        // the unlock clears HOMING; re-flag it
        self.machine.set_exec_state(ExecState::HOMING);
        let _ = self.line(&mut target, &mut block);

        self.machine.sync()?;

        // flush whatever the switch interrupted
        self.machine.stop_pulses();
        self.machine.clear_interpolator();
        self.machine.planner().clear();

        self.machine.delay_ms(self.settings.debounce_ms);
        if self.machine.limits() & limit_mask == 0 {
            // the seek ended without the right switch
            self.machine.set_exec_state(ExecState::HALT);
            self.machine.alarm(AlarmCode::HomingFailApproach);
            return Err(MotionError::CriticalFail);
        }

        // back off from the switch at lower speed
        let mut backoff_dist = self.settings.homing_offset * 5.0;
        self.sync_position();
        self.get_position(&mut target);
        if self.settings.homing_dir_invert_mask & axis_mask != 0 {
            backoff_dist = -backoff_dist;
        }
        target[axis] += backoff_dist;
        block.feed = self.settings.homing_slow_feed;
        block.total_steps = math::fabsf(backoff_dist) as u32;
        block.steps[axis] = math::fabsf(backoff_dist) as u32;
        // fire on the release edge instead
        self.machine.invert_limits(limit_mask);

        self.machine.unlock();
        self.machine.set_exec_state(ExecState::HOMING);
        let _ = self.line(&mut target, &mut block);

        self.machine.sync()?;

        self.machine.delay_ms(self.settings.debounce_ms);
        self.machine.invert_limits(0);
        // stops, flushes buffers and clears any pending hold
        self.machine.halt();
        self.machine.clear_interpolator();
        self.machine.planner().clear();

        self.machine.delay_ms(self.settings.debounce_ms);
        if self.machine.limits() & limit_mask != 0 {
            // the switch never released
            self.machine.set_exec_state(ExecState::HALT);
            self.machine.alarm(AlarmCode::HomingFailApproach);
            return Err(MotionError::CriticalFail);
        }

        Ok(())
    }

    /// Runs the full homing cycle in the kinematics' axis order, then moves
    /// to the homing offset and seeds the runtime position with the machine
    /// origin.
    pub fn home(&mut self) -> Result<(), MotionError> {
        let order = self.kinematics.home_order(self.settings.axis_count);
        for &axis in order.iter() {
            self.home_axis(axis as usize, 1 << axis)?;
        }

        // park at the homing offset
        self.machine.unlock();
        self.machine.set_exec_state(ExecState::HOMING);
        let mut block = MotionBlock::default();
        let mut target = [0.0f32; MAX_AXES];
        self.get_position(&mut target);
        for i in 0..self.settings.axis_count as usize {
            if self.settings.homing_dir_invert_mask & (1 << i) != 0 {
                target[i] -= self.settings.homing_offset;
            } else {
                target[i] += self.settings.homing_offset;
            }
        }
        block.feed = self.settings.homing_fast_feed;
        let _ = self.line(&mut target, &mut block);
        let _ = self.machine.sync();

        self.machine.clear_exec_state(ExecState::HOMING);

        let mut origin = [0.0f32; MAX_AXES];
        if !self.settings.origin_at_home_pos {
            for i in (0..self.settings.axis_count as usize).rev() {
                origin[i] = if self.settings.homing_dir_invert_mask & (1 << i) == 0 {
                    0.0
                } else {
                    self.settings.max_distance[i]
                };
            }
        }
        self.machine.reset_rt_position(&origin);
        self.sync_position();

        Ok(())
    }

    /// Probing motion: advances toward `target` until the probe input
    /// reaches the expected level or the travel completes, then captures
    /// the contact position.
    pub fn probe(
        &mut self,
        target: &mut [f32; MAX_AXES],
        flags: ProbeFlags,
        block: &mut MotionBlock,
    ) -> Result<ProbeResult, MotionError> {
        let prev_state = self.machine.exec_state(ExecState::HOLD);
        self.machine.enable_probe();
        let _ = self.line(target, block);

        // poll fallback for pins without an edge interrupt
        loop {
            if !self.machine.dotasks() {
                return Err(MotionError::CriticalFail);
            }
            if self.machine.probe_pin() != flags.contains(ProbeFlags::INVERT) {
                break;
            }
            if !self.machine.has_exec_state(ExecState::RUN) {
                break;
            }
        }

        self.machine.disable_probe();
        self.machine.halt();
        self.machine.clear_interpolator();
        self.machine.planner().clear();
        let captured = self.machine.rt_position();
        self.machine.update_probe_position(&captured);
        self.sync_position();
        // restores the previous HOLD state
        self.machine.clear_exec_state(!prev_state | !ExecState::HOLD);
        self.machine.delay_ms(self.settings.debounce_ms);

        let mut probe_ok = self.machine.probe_pin();
        if flags.contains(ProbeFlags::INVERT) {
            probe_ok = !probe_ok;
        }
        if !probe_ok {
            if !flags.contains(ProbeFlags::NO_ALARM_ON_FAIL) {
                self.machine.alarm(AlarmCode::ProbeFailContact);
            }
            return Ok(ProbeResult::Missed);
        }

        Ok(ProbeResult::Contact)
    }

    /// Copies the last commanded position, undoing the kinematic transform
    /// so the caller sees pre-compensation user coordinates.
    pub fn get_position(&self, target: &mut [f32; MAX_AXES]) {
        *target = self.last_target;
        self.kinematics.apply_reverse_transform(&self.settings, target);
    }

    /// Reseeds the planned position from the machine's real-time position.
    /// Called whenever the pipeline is drained (homing, probing, hold
    /// recovery).
    pub fn sync_position(&mut self) {
        self.last_step_pos = self.machine.rt_position();
        self.kinematics
            .apply_forward(&self.settings, &self.last_step_pos, &mut self.last_target);
        let position = self.last_target;
        self.machine.sync_parser_position(&position);
    }
}
