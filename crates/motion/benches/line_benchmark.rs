//! Throughput benchmark for the line pipeline feeding a free-running
//! planner consumer.

use criterion::{criterion_group, criterion_main, Criterion};
use motion::{
    AlarmCode, Capabilities, CartesianKinematics, ExecState, Machine, MotionBlock,
    MotionController, MotionError, Planner, Settings, MAX_AXES, MAX_STEPPERS,
};

/// Machine stub whose interpolator discards blocks as fast as they arrive.
struct FreeRunner {
    planner: Planner,
    exec: ExecState,
}

impl Machine for FreeRunner {
    fn planner(&mut self) -> &mut Planner {
        &mut self.planner
    }

    fn sync(&mut self) -> Result<(), MotionError> {
        self.planner.clear();
        Ok(())
    }

    fn stop_pulses(&mut self) {}
    fn clear_interpolator(&mut self) {}

    fn rt_position(&self) -> [i32; MAX_STEPPERS] {
        [0; MAX_STEPPERS]
    }

    fn reset_rt_position(&mut self, _axis: &[f32; MAX_AXES]) {}
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

    fn alarm(&mut self, _code: AlarmCode) {}
    fn unlock(&mut self) {}
    fn halt(&mut self) {}

    fn dotasks(&mut self) -> bool {
        while !self.planner.is_empty() {
            self.planner.discard_block();
        }
        true
    }

    fn delay_ms(&mut self, _ms: u32) {}
    fn update_probe_position(&mut self, _steps: &[i32; MAX_STEPPERS]) {}
    fn sync_parser_position(&mut self, _axis: &[f32; MAX_AXES]) {}
}

fn line_throughput(c: &mut Criterion) {
    let settings = Settings {
        soft_limits_enabled: false,
        ..Settings::default()
    };
    let machine = FreeRunner {
        planner: Planner::new(&settings),
        exec: ExecState::empty(),
    };
    let mut controller = MotionController::new(
        settings,
        CartesianKinematics,
        machine,
        Capabilities::default(),
    );

    let mut toggle = false;
    c.bench_function("line 10mm diagonal", |b| {
        b.iter(|| {
            toggle = !toggle;
            let offset = if toggle { 10.0 } else { 0.0 };
            let mut target = [offset, offset, 0.0, 0.0, 0.0, 0.0];
            let mut block = MotionBlock {
                feed: 1200.0,
                ..MotionBlock::default()
            };
            controller.line(&mut target, &mut block).unwrap();
        })
    });
}

criterion_group!(benches, line_throughput);
criterion_main!(benches);
