//! # Planner queue
//!
//! A bounded ring of motion blocks sitting between the motion controller
//! (sole producer) and the step interpolator (sole consumer).
//!
//! ## Operation
//!
//! 1.  **`add_line`**: a fully prepared [`MotionBlock`] is converted to a
//!     [`PlannerBlock`] with a junction speed limit derived from the angle
//!     between its direction vector and the previous block's.
//!
//! 2.  **Recalculation**: a backward pass walks the ring from the tail,
//!     capping each entry speed by what the acceleration limit can shed
//!     before the (zero-speed) end of the queue; a forward pass then caps
//!     entries by what can be gained since the head.
//!
//! 3.  **Draining**: the interpolator consumes blocks in FIFO order through
//!     [`Planner::next_block`] / [`Planner::discard_block`]. Capacity is the
//!     sole back-pressure mechanism; the producer spins cooperatively while
//!     [`Planner::is_full`].
//!
//! A block enqueued after [`Planner::clear`] always starts from a
//! zero-velocity junction.

use crate::errors::PlannerError;
use crate::math;
use crate::settings::Settings;
use crate::{MAX_AXES, MAX_STEPPERS, PLANNER_BUFFER_SIZE};
use bitflags::bitflags;

bitflags! {
    /// Motion block mode bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MotionMode: u8 {
        /// Ordinary feed-rate motion.
        const FEED = 1 << 0;
        /// `feed` expresses inverse time (whole-move duration) rather than
        /// a rate.
        const INVERSE_FEED = 1 << 1;
        /// Synthesized block taking up mechanical slack after a direction
        /// reversal.
        const BACKLASH_COMPENSATION = 1 << 2;
        /// This block is one fragment of a longer line.
        const IS_SUBSEGMENT = 1 << 3;
    }
}

/// A fully prepared motion handed to the planner by the controller.
///
/// `steps` are absolute per-actuator magnitudes; `dirbits` carries the
/// signs. `feed` enters the controller in work units per minute and leaves
/// it as dominant-axis steps per second.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MotionBlock {
    pub steps: [u32; MAX_STEPPERS],
    /// `max(steps[i])`; drives the dominant-axis Bresenham counter.
    pub total_steps: u32,
    /// `sum(steps[i])`, accumulated only in linear-actuator planner mode.
    pub full_steps: u32,
    /// Index of the actuator achieving `total_steps`.
    pub main_stepper: u8,
    /// Bit `i` set iff actuator `i` moves in the negative direction.
    pub dirbits: u8,
    /// User-space direction of the move; unit length unless the planner is
    /// linear-actuator driven.
    pub dir_vect: [f32; MAX_AXES],
    pub feed: f32,
    pub motion_mode: MotionMode,
    /// Milliseconds of post-move pause, consumed by the first block of a
    /// logical move.
    pub dwell: u32,
    pub spindle: u16,
    pub spindle_running: bool,
    pub coolant: u8,
}

impl Default for MotionBlock {
    fn default() -> Self {
        Self {
            steps: [0; MAX_STEPPERS],
            total_steps: 0,
            full_steps: 0,
            main_stepper: u8::MAX,
            dirbits: 0,
            dir_vect: [0.0; MAX_AXES],
            feed: 0.0,
            motion_mode: MotionMode::FEED,
            dwell: 0,
            spindle: 0,
            spindle_running: false,
            coolant: 0,
        }
    }
}

/// A queued block with its planned junction speeds, in dominant-axis step
/// space (speeds squared, steps²/s²).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PlannerBlock {
    pub steps: [u32; MAX_STEPPERS],
    pub total_steps: u32,
    pub full_steps: u32,
    pub main_stepper: u8,
    pub dirbits: u8,
    pub dir_vect: [f32; MAX_AXES],
    /// Target cruise speed squared.
    pub feed_sqr: f32,
    /// Planned speed squared at the block junction.
    pub entry_feed_sqr: f32,
    /// Junction geometry ceiling for `entry_feed_sqr`.
    pub entry_max_feed_sqr: f32,
    pub acceleration: f32,
    pub motion_mode: MotionMode,
    pub dwell: u32,
    pub spindle: u16,
    pub spindle_running: bool,
    pub coolant: u8,
}

impl Default for PlannerBlock {
    fn default() -> Self {
        Self {
            steps: [0; MAX_STEPPERS],
            total_steps: 0,
            full_steps: 0,
            main_stepper: u8::MAX,
            dirbits: 0,
            dir_vect: [0.0; MAX_AXES],
            feed_sqr: 0.0,
            entry_feed_sqr: 0.0,
            entry_max_feed_sqr: 0.0,
            acceleration: 0.0,
            motion_mode: MotionMode::FEED,
            dwell: 0,
            spindle: 0,
            spindle_running: false,
            coolant: 0,
        }
    }
}

impl PlannerBlock {
    /// Exit speed squared reachable from the entry under the acceleration
    /// limit over this block's dominant travel.
    fn max_exit_sqr(&self) -> f32 {
        self.entry_feed_sqr + 2.0 * self.acceleration * self.total_steps as f32
    }
}

/// The bounded planner ring.
pub struct Planner {
    blocks: [PlannerBlock; PLANNER_BUFFER_SIZE],
    head: usize,
    count: usize,
    prev_dir_vect: [f32; MAX_AXES],
    prev_feed_sqr: f32,
    /// Cleared by [`Planner::clear`]; the next block then plans from a
    /// zero-velocity junction.
    have_prev: bool,
    acceleration: f32,
    max_step_rate: f32,
    junction_deviation: f32,
    spindle: u16,
    spindle_running: bool,
    coolant: u8,
}

impl Planner {
    pub fn new(settings: &Settings) -> Self {
        Self {
            blocks: [PlannerBlock::default(); PLANNER_BUFFER_SIZE],
            head: 0,
            count: 0,
            prev_dir_vect: [0.0; MAX_AXES],
            prev_feed_sqr: 0.0,
            have_prev: false,
            acceleration: settings.acceleration,
            max_step_rate: settings.max_step_rate,
            junction_deviation: settings.junction_deviation,
            spindle: 0,
            spindle_running: false,
            coolant: 0,
        }
    }

    pub fn is_full(&self) -> bool {
        self.count == PLANNER_BUFFER_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn len(&self) -> usize {
        self.count
    }

    /// Queued blocks in FIFO order.
    pub fn iter(&self) -> impl Iterator<Item = &PlannerBlock> {
        (0..self.count).map(move |k| &self.blocks[(self.head + k) % PLANNER_BUFFER_SIZE])
    }

    /// Enqueues a block and replans junction speeds across the ring.
    pub fn add_line(&mut self, block: &MotionBlock) -> Result<(), PlannerError> {
        if self.is_full() {
            return Err(PlannerError::QueueFull);
        }

        // Rapids and backlash take-up request an unbounded feed; clamp to
        // the machine step rate ceiling.
        let feed = if block.feed.is_finite() {
            math::fminf(block.feed, self.max_step_rate)
        } else {
            self.max_step_rate
        };
        let feed_sqr = feed * feed;
        let entry_max_feed_sqr = self.junction_speed_sqr(block, feed_sqr);

        let idx = (self.head + self.count) % PLANNER_BUFFER_SIZE;
        self.blocks[idx] = PlannerBlock {
            steps: block.steps,
            total_steps: block.total_steps,
            full_steps: block.full_steps,
            main_stepper: block.main_stepper,
            dirbits: block.dirbits,
            dir_vect: block.dir_vect,
            feed_sqr,
            entry_feed_sqr: 0.0,
            entry_max_feed_sqr,
            acceleration: self.acceleration,
            motion_mode: block.motion_mode,
            dwell: block.dwell,
            spindle: block.spindle,
            spindle_running: block.spindle_running,
            coolant: block.coolant,
        };
        self.count += 1;

        self.prev_dir_vect = block.dir_vect;
        self.prev_feed_sqr = feed_sqr;
        self.have_prev = true;

        self.recalculate();
        Ok(())
    }

    /// Head block, if any. The consumer executes it in place and then calls
    /// [`Planner::discard_block`].
    pub fn next_block(&mut self) -> Option<&mut PlannerBlock> {
        if self.count == 0 {
            None
        } else {
            Some(&mut self.blocks[self.head])
        }
    }

    pub fn discard_block(&mut self) {
        if self.count > 0 {
            self.head = (self.head + 1) % PLANNER_BUFFER_SIZE;
            self.count -= 1;
        }
    }

    /// Empties the ring. The next block starts from a zero-velocity
    /// junction.
    pub fn clear(&mut self) {
        self.count = 0;
        self.have_prev = false;
        self.prev_feed_sqr = 0.0;
    }

    /// Latches the tool state carried by `block` so the interpolator can
    /// re-apply it after a synchronous drain.
    pub fn sync_tools(&mut self, block: &MotionBlock) {
        self.spindle = block.spindle;
        self.spindle_running = block.spindle_running;
        self.coolant = block.coolant;
    }

    /// Last synchronized (spindle rpm, running, coolant) tool state.
    pub fn tool_state(&self) -> (u16, bool, u8) {
        (self.spindle, self.spindle_running, self.coolant)
    }

    /// Junction speed ceiling (squared) between the previous queued motion
    /// and `block`, from the junction deviation model: the corner is
    /// approximated by an arc of radius proportional to the deviation
    /// distance and the centripetal acceleration limit bounds the speed.
    fn junction_speed_sqr(&self, block: &MotionBlock, feed_sqr: f32) -> f32 {
        if !self.have_prev {
            return 0.0;
        }

        let mut dot = 0.0f32;
        let mut prev_mag_sqr = 0.0f32;
        let mut cur_mag_sqr = 0.0f32;
        for i in 0..MAX_AXES {
            dot += self.prev_dir_vect[i] * block.dir_vect[i];
            prev_mag_sqr += self.prev_dir_vect[i] * self.prev_dir_vect[i];
            cur_mag_sqr += block.dir_vect[i] * block.dir_vect[i];
        }
        if prev_mag_sqr <= 0.0 || cur_mag_sqr <= 0.0 {
            return 0.0;
        }

        // cos of the deviation angle between the two travel directions
        let cos_theta = dot / math::sqrtf(prev_mag_sqr * cur_mag_sqr);
        let limit = math::fminf(feed_sqr, self.prev_feed_sqr);
        if cos_theta > 0.9999 {
            // effectively collinear
            return limit;
        }
        if cos_theta < -0.9999 {
            // full reversal
            return 0.0;
        }

        let sin_half = math::sqrtf(0.5 * (1.0 - cos_theta));
        let junction_sqr =
            self.acceleration * self.junction_deviation * sin_half / (1.0 - sin_half);
        math::fminf(junction_sqr, limit)
    }

    /// Backward-then-forward pass restoring the reachability invariant:
    /// every junction speed is attainable under the acceleration limit from
    /// both its neighbours, with the queue tail treated as a full stop.
    fn recalculate(&mut self) {
        if self.count == 0 {
            return;
        }

        let mut exit_sqr = 0.0f32;
        for k in (0..self.count).rev() {
            let idx = (self.head + k) % PLANNER_BUFFER_SIZE;
            let block = &mut self.blocks[idx];
            let reachable = exit_sqr + 2.0 * block.acceleration * block.total_steps as f32;
            block.entry_feed_sqr = math::fminf(block.entry_max_feed_sqr, reachable);
            exit_sqr = block.entry_feed_sqr;
        }

        let mut entry_cap = self.blocks[self.head].entry_feed_sqr;
        for k in 0..self.count {
            let idx = (self.head + k) % PLANNER_BUFFER_SIZE;
            let block = &mut self.blocks[idx];
            block.entry_feed_sqr = math::fminf(block.entry_feed_sqr, entry_cap);
            entry_cap = block.max_exit_sqr();
        }
    }
}
