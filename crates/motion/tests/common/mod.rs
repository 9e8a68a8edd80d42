//! Shared test double: a machine whose interpolator applies planner blocks
//! instantly, recording everything the controller does to it.

#![allow(dead_code)]

use motion::{
    AlarmCode, Capabilities, CartesianKinematics, ExecState, Machine, MotionController,
    MotionError, Planner, PlannerBlock, Settings, MAX_AXES, MAX_STEPPERS,
};

pub struct NullMachine {
    pub planner: Planner,
    pub exec: ExecState,
    pub rt_steps: [i32; MAX_STEPPERS],
    pub step_per_mm: [f32; MAX_STEPPERS],
    /// Blocks consumed by the instant interpolator, in execution order.
    pub executed: Vec<PlannerBlock>,
    pub alarms: Vec<AlarmCode>,
    pub delays: Vec<u32>,
    pub parser_position: [f32; MAX_AXES],
    pub probe_captures: Vec<[i32; MAX_STEPPERS]>,
    /// When set, `dotasks` reports a latched abort.
    pub abort: bool,
}

impl NullMachine {
    pub fn new(settings: &Settings) -> Self {
        Self {
            planner: Planner::new(settings),
            exec: ExecState::empty(),
            rt_steps: [0; MAX_STEPPERS],
            step_per_mm: settings.step_per_mm,
            executed: Vec::new(),
            alarms: Vec::new(),
            delays: Vec::new(),
            parser_position: [0.0; MAX_AXES],
            probe_captures: Vec::new(),
            abort: false,
        }
    }

    fn execute_one(&mut self) {
        let Some(block) = self.planner.next_block().map(|b| *b) else {
            return;
        };
        self.planner.discard_block();
        for i in 0..MAX_STEPPERS {
            let delta = block.steps[i] as i32;
            if block.dirbits & (1 << i) != 0 {
                self.rt_steps[i] -= delta;
            } else {
                self.rt_steps[i] += delta;
            }
        }
        self.executed.push(block);
    }
}

impl Machine for NullMachine {
    fn planner(&mut self) -> &mut Planner {
        &mut self.planner
    }

    fn sync(&mut self) -> Result<(), MotionError> {
        if self.abort {
            return Err(MotionError::CriticalFail);
        }
        while !self.planner.is_empty() {
            self.execute_one();
        }
        Ok(())
    }

    fn stop_pulses(&mut self) {}

    fn clear_interpolator(&mut self) {}

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
        0.0
    }

    fn limits(&self) -> u8 {
        0
    }

    fn probe_pin(&self) -> bool {
        false
    }

    fn lock_limits(&mut self, _mask: u8) {}

    fn invert_limits(&mut self, _mask: u8) {}

    fn enable_probe(&mut self) {}

    fn disable_probe(&mut self) {}

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
        self.alarms.push(code);
        self.exec |= ExecState::ALARM;
    }

    fn unlock(&mut self) {
        self.exec &= !(ExecState::HOLD | ExecState::ALARM | ExecState::HALT | ExecState::HOMING);
    }

    fn halt(&mut self) {}

    fn dotasks(&mut self) -> bool {
        if self.abort {
            return false;
        }
        // emulate the step interrupt making room while the producer spins
        if self.planner.is_full() {
            self.execute_one();
        }
        true
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
    }

    fn update_probe_position(&mut self, steps: &[i32; MAX_STEPPERS]) {
        self.probe_captures.push(*steps);
    }

    fn sync_parser_position(&mut self, axis: &[f32; MAX_AXES]) {
        self.parser_position = *axis;
    }
}

pub type TestController = MotionController<CartesianKinematics, NullMachine>;

pub fn controller(settings: Settings, caps: Capabilities) -> TestController {
    let machine = NullMachine::new(&settings);
    MotionController::new(settings, CartesianKinematics, machine, caps)
}

/// Drains the queue and returns every block executed so far.
pub fn drain(controller: &mut TestController) -> Vec<PlannerBlock> {
    controller.machine_mut().sync().expect("sync failed");
    std::mem::take(&mut controller.machine_mut().executed)
}

pub fn axis(x: f32, y: f32, z: f32) -> [f32; MAX_AXES] {
    [x, y, z, 0.0, 0.0, 0.0]
}
