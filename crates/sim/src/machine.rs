//! Scripted machine behavior: a positional step engine over the planner
//! ring, limit switch and probe pin models, and the execution state
//! register.

use crate::trace::TraceEvent;
use motion::{
    AlarmCode, ExecState, Machine, MotionError, Planner, Settings, MAX_AXES, MAX_STEPPERS,
};
use tracing::debug;

/// A limit switch scripted by a step position on one axis.
#[derive(Debug, Clone, Copy)]
pub struct LimitSwitch {
    pub axis: usize,
    pub trigger_at: i32,
    /// Asserted while the axis position is at or below `trigger_at`;
    /// otherwise at or above.
    pub when_below: bool,
}

impl LimitSwitch {
    fn asserted(&self, rt_steps: &[i32; MAX_STEPPERS]) -> bool {
        if self.when_below {
            rt_steps[self.axis] <= self.trigger_at
        } else {
            rt_steps[self.axis] >= self.trigger_at
        }
    }
}

/// The probe input scripted by a step position on one axis.
#[derive(Debug, Clone, Copy)]
pub struct ProbeTrigger {
    pub axis: usize,
    pub trigger_at: i32,
    pub when_below: bool,
}

/// One planner block being executed step by step.
struct ExecBlock {
    steps: [u32; MAX_STEPPERS],
    dirbits: u8,
    total_steps: u32,
    remaining: u32,
    errors: [i64; MAX_STEPPERS],
}

/// Scripted implementation of the full machine contract.
pub struct SimMachine {
    planner: Planner,
    step_per_mm: [f32; MAX_STEPPERS],
    exec: ExecState,
    rt_steps: [i32; MAX_STEPPERS],
    rt_feed: f32,
    lock_mask: u8,
    invert_mask: u8,
    probe_enabled: bool,
    limit_switches: Vec<LimitSwitch>,
    probe_trigger: Option<ProbeTrigger>,
    current: Option<ExecBlock>,
    trace: Vec<TraceEvent>,
    parser_position: [f32; MAX_AXES],
    probe_capture: Option<[i32; MAX_STEPPERS]>,
    clock_ms: u64,
    /// Latch a fatal abort after this many `dotasks` calls.
    abort_after: Option<u32>,
    aborted: bool,
    /// Steps executed per cooperative poll; small values model a slow
    /// foreground loop relative to the step rate.
    steps_per_poll: u32,
}

impl SimMachine {
    pub fn new(settings: &Settings) -> Self {
        Self {
            planner: Planner::new(settings),
            step_per_mm: settings.step_per_mm,
            exec: ExecState::empty(),
            rt_steps: [0; MAX_STEPPERS],
            rt_feed: 0.0,
            lock_mask: u8::MAX,
            invert_mask: 0,
            probe_enabled: false,
            limit_switches: Vec::new(),
            probe_trigger: None,
            current: None,
            trace: Vec::new(),
            parser_position: [0.0; MAX_AXES],
            probe_capture: None,
            clock_ms: 0,
            abort_after: None,
            aborted: false,
            steps_per_poll: 8,
        }
    }

    pub fn with_limit_switch(mut self, switch: LimitSwitch) -> Self {
        self.limit_switches.push(switch);
        self
    }

    pub fn with_probe_trigger(mut self, trigger: ProbeTrigger) -> Self {
        self.probe_trigger = Some(trigger);
        self
    }

    pub fn with_abort_after(mut self, polls: u32) -> Self {
        self.abort_after = Some(polls);
        self
    }

    pub fn with_steps_per_poll(mut self, steps: u32) -> Self {
        self.steps_per_poll = steps;
        self
    }

    pub fn trace(&self) -> &[TraceEvent] {
        &self.trace
    }

    pub fn trace_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.trace)
    }

    pub fn probe_capture(&self) -> Option<[i32; MAX_STEPPERS]> {
        self.probe_capture
    }

    /// Whether the probe interrupt is currently armed.
    pub fn probe_enabled(&self) -> bool {
        self.probe_enabled
    }

    pub fn parser_position(&self) -> [f32; MAX_AXES] {
        self.parser_position
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.clock_ms
    }

    fn raw_limits(&self) -> u8 {
        let mut mask = 0;
        for switch in &self.limit_switches {
            if switch.asserted(&self.rt_steps) {
                mask |= 1 << switch.axis;
            }
        }
        mask
    }

    fn raw_probe(&self) -> bool {
        match self.probe_trigger {
            Some(trigger) => {
                if trigger.when_below {
                    self.rt_steps[trigger.axis] <= trigger.trigger_at
                } else {
                    self.rt_steps[trigger.axis] >= trigger.trigger_at
                }
            }
            None => false,
        }
    }

    /// Limit ISR model: fires when a lockable switch matches the current
    /// polarity, terminating the in-flight block.
    fn check_limit_isr(&mut self) -> bool {
        let fired = (self.raw_limits() ^ self.invert_mask) & self.lock_mask;
        if fired == 0 {
            return false;
        }
        debug!(mask = fired, "limit interrupt");
        self.trace.push(TraceEvent::LimitTriggered { mask: fired });
        self.current = None;
        self.exec.remove(ExecState::RUN);
        self.exec.insert(ExecState::HALT);
        if !self.exec.contains(ExecState::HOMING) {
            self.exec.insert(ExecState::ALARM);
        }
        true
    }

    /// Executes up to `budget` dominant-axis steps from the planner queue.
    fn advance(&mut self, budget: u32) {
        if self
            .exec
            .intersects(ExecState::HALT | ExecState::HOLD | ExecState::ALARM)
        {
            return;
        }

        for _ in 0..budget {
            if self.current.is_none() {
                let Some(block) = self.planner.next_block().map(|b| *b) else {
                    self.exec.remove(ExecState::RUN);
                    self.rt_feed = 0.0;
                    return;
                };
                self.planner.discard_block();
                if block.total_steps == 0 {
                    continue;
                }
                debug!(
                    total_steps = block.total_steps,
                    dirbits = block.dirbits,
                    "block started"
                );
                self.trace.push(TraceEvent::BlockStarted {
                    total_steps: block.total_steps,
                    dirbits: block.dirbits,
                });
                self.exec.insert(ExecState::RUN);
                self.rt_feed = block.feed_sqr.sqrt();
                self.current = Some(ExecBlock {
                    steps: block.steps,
                    dirbits: block.dirbits,
                    total_steps: block.total_steps,
                    remaining: block.total_steps,
                    errors: [0; MAX_STEPPERS],
                });
            }

            let Some(block) = self.current.as_mut() else {
                continue;
            };
            let finished = {
                for i in 0..MAX_STEPPERS {
                    block.errors[i] += block.steps[i] as i64;
                    if 2 * block.errors[i] >= block.total_steps as i64 {
                        block.errors[i] -= block.total_steps as i64;
                        if block.dirbits & (1 << i) != 0 {
                            self.rt_steps[i] -= 1;
                        } else {
                            self.rt_steps[i] += 1;
                        }
                    }
                }
                block.remaining -= 1;
                block.remaining == 0
            };
            if finished {
                self.current = None;
            }
            if self.check_limit_isr() {
                return;
            }
        }
    }
}

impl Machine for SimMachine {
    fn planner(&mut self) -> &mut Planner {
        &mut self.planner
    }

    fn sync(&mut self) -> Result<(), MotionError> {
        loop {
            if self.aborted {
                return Err(MotionError::CriticalFail);
            }
            if self
                .exec
                .intersects(ExecState::HALT | ExecState::HOLD | ExecState::ALARM)
            {
                return Ok(());
            }
            if self.current.is_none() && self.planner.is_empty() {
                self.exec.remove(ExecState::RUN);
                return Ok(());
            }
            self.advance(1024);
        }
    }

    fn stop_pulses(&mut self) {
        self.current = None;
        self.exec.remove(ExecState::RUN);
        self.rt_feed = 0.0;
    }

    fn clear_interpolator(&mut self) {
        self.current = None;
        self.exec.remove(ExecState::RUN);
        self.rt_feed = 0.0;
    }

    fn rt_position(&self) -> [i32; MAX_STEPPERS] {
        self.rt_steps
    }

    fn reset_rt_position(&mut self, axis: &[f32; MAX_AXES]) {
        for i in 0..MAX_AXES.min(MAX_STEPPERS) {
            self.rt_steps[i] = (axis[i] * self.step_per_mm[i]).round() as i32;
        }
    }

    fn sync_spindle(&mut self) {}

    fn rt_feed(&self) -> f32 {
        self.rt_feed
    }

    fn limits(&self) -> u8 {
        self.raw_limits()
    }

    fn probe_pin(&self) -> bool {
        self.raw_probe()
    }

    fn lock_limits(&mut self, mask: u8) {
        self.lock_mask = mask;
    }

    fn invert_limits(&mut self, mask: u8) {
        self.invert_mask = mask;
    }

    fn enable_probe(&mut self) {
        self.probe_enabled = true;
    }

    fn disable_probe(&mut self) {
        self.probe_enabled = false;
    }

    fn exec_state(&self, mask: ExecState) -> ExecState {
        self.exec & mask
    }

    fn set_exec_state(&mut self, state: ExecState) {
        self.exec |= state;
    }

    fn clear_exec_state(&mut self, state: ExecState) {
        self.exec &= !state;
    }

    fn alarm(&mut self, code: AlarmCode) {
        debug!(?code, "alarm");
        self.trace.push(TraceEvent::AlarmRaised { code });
        self.exec.insert(ExecState::ALARM);
        self.current = None;
        self.exec.remove(ExecState::RUN);
    }

    fn unlock(&mut self) {
        self.exec.remove(
            ExecState::HOLD | ExecState::ALARM | ExecState::HALT | ExecState::HOMING,
        );
    }

    fn halt(&mut self) {
        self.current = None;
        self.exec.remove(ExecState::RUN | ExecState::HOLD);
        self.rt_feed = 0.0;
    }

    fn dotasks(&mut self) -> bool {
        if let Some(polls) = self.abort_after.as_mut() {
            if *polls == 0 {
                self.aborted = true;
            } else {
                *polls -= 1;
            }
        }
        if self.aborted {
            return false;
        }
        self.advance(self.steps_per_poll);
        true
    }

    fn delay_ms(&mut self, ms: u32) {
        self.clock_ms += u64::from(ms);
    }

    fn update_probe_position(&mut self, steps: &[i32; MAX_STEPPERS]) {
        self.trace.push(TraceEvent::ProbeCaptured {
            steps: steps.to_vec(),
        });
        self.probe_capture = Some(*steps);
    }

    fn sync_parser_position(&mut self, axis: &[f32; MAX_AXES]) {
        self.parser_position = *axis;
    }
}
