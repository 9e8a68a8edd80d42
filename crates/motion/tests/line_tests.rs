//! Behavioural tests for the straight-line motion pipeline: soft limits,
//! block preparation, backlash injection, fragmentation and check mode.

mod common;

use common::{axis, controller, drain};
use motion::settings::LASER_PPI_MODE;
use motion::{
    AlarmCode, Capabilities, CartesianKinematics, ExecState, Kinematics, Machine, MotionBlock,
    MotionError, MotionMode, Settings, MAX_STEPPERS,
};

fn scenario_settings() -> Settings {
    Settings {
        backlash_steps: [4; MAX_STEPPERS],
        ..Settings::default()
    }
}

fn feed_block(feed: f32) -> MotionBlock {
    MotionBlock {
        feed,
        ..MotionBlock::default()
    }
}

#[test]
fn subthreshold_line_is_a_no_op() {
    let mut ctrl = controller(scenario_settings(), Capabilities::default());

    let mut target = axis(0.004, 0.0, 0.0);
    let mut block = feed_block(600.0);
    ctrl.line(&mut target, &mut block).unwrap();

    assert!(ctrl.machine_mut().planner.is_empty());
    assert_eq!(ctrl.last_step_position(), [0; MAX_STEPPERS]);
    let mut position = [0.0; 6];
    ctrl.get_position(&mut position);
    assert_eq!(position, axis(0.0, 0.0, 0.0));
}

#[test]
fn simple_line_builds_one_rate_correct_block() {
    let mut ctrl = controller(scenario_settings(), Capabilities::default());

    let mut target = axis(10.0, 0.0, 0.0);
    let mut block = feed_block(600.0);
    ctrl.line(&mut target, &mut block).unwrap();

    let blocks = drain(&mut ctrl);
    assert_eq!(blocks.len(), 1);
    let queued = &blocks[0];
    assert_eq!(queued.steps[..3], [1000, 0, 0]);
    assert_eq!(queued.total_steps, 1000);
    assert_eq!(queued.main_stepper, 0);
    assert_eq!(queued.dirbits, 0b000);
    // 600 mm/min over 10 mm at 100 steps/mm: 1000 steps/s on the dominant
    // axis
    assert!((queued.feed_sqr.sqrt() - 1000.0).abs() < 1e-2);
    // the commanded feed is handed back untouched
    assert_eq!(block.feed, 600.0);
    assert_eq!(ctrl.last_step_position()[..3], [1000, 0, 0]);
}

#[test]
fn reversal_injects_backlash_block() {
    let caps = Capabilities {
        backlash_compensation: true,
        ..Capabilities::default()
    };
    let mut ctrl = controller(scenario_settings(), caps);

    let mut block = feed_block(600.0);
    ctrl.line(&mut axis(10.0, 0.0, 0.0), &mut block).unwrap();
    drain(&mut ctrl);

    let mut block = feed_block(600.0);
    block.dwell = 500;
    ctrl.line(&mut axis(9.0, 0.0, 0.0), &mut block).unwrap();

    let blocks = drain(&mut ctrl);
    assert_eq!(blocks.len(), 2);

    let backlash = &blocks[0];
    assert!(backlash.motion_mode.contains(MotionMode::BACKLASH_COMPENSATION));
    assert_eq!(backlash.steps[..3], [4, 0, 0]);
    assert_eq!(backlash.total_steps, 4);
    assert_eq!(backlash.main_stepper, 0);
    assert_eq!(backlash.dirbits, 0b001);
    // unbounded feed request clamps to the rapid step rate
    let rapid = scenario_settings().max_step_rate;
    assert_eq!(backlash.feed_sqr, rapid * rapid);
    // the dwell rides on the first block of the logical move
    assert_eq!(backlash.dwell, 500);

    let main = &blocks[1];
    assert!(!main.motion_mode.contains(MotionMode::BACKLASH_COMPENSATION));
    assert_eq!(main.steps[..3], [100, 0, 0]);
    assert_eq!(main.dirbits, 0b001);
    assert_eq!(main.dwell, 0);
    assert_eq!(block.dwell, 0);

    // continuing in the same direction injects nothing
    let mut block = feed_block(600.0);
    ctrl.line(&mut axis(8.0, 0.0, 0.0), &mut block).unwrap();
    assert_eq!(drain(&mut ctrl).len(), 1);
}

#[test]
fn jog_past_soft_limit_is_recoverable() {
    let mut ctrl = controller(scenario_settings(), Capabilities::default());
    ctrl.machine_mut().set_exec_state(ExecState::JOG);

    let mut target = axis(250.0, 0.0, 0.0);
    let mut block = feed_block(600.0);
    let result = ctrl.line(&mut target, &mut block);

    assert_eq!(result, Err(MotionError::TravelExceeded));
    assert!(ctrl.machine_mut().planner.is_empty());
    assert!(ctrl.machine().alarms.is_empty());
}

#[test]
fn soft_limit_outside_jog_raises_alarm() {
    let mut ctrl = controller(scenario_settings(), Capabilities::default());

    let mut target = axis(250.0, 0.0, 0.0);
    let mut block = feed_block(600.0);
    let result = ctrl.line(&mut target, &mut block);

    // the alarm terminates motion globally; the call itself reports success
    assert_eq!(result, Ok(()));
    assert_eq!(ctrl.machine().alarms, vec![AlarmCode::SoftLimit]);
    assert!(ctrl.machine_mut().planner.is_empty());
}

#[test]
fn duplicate_line_enqueues_once() {
    let mut ctrl = controller(scenario_settings(), Capabilities::default());

    let mut block = feed_block(600.0);
    ctrl.line(&mut axis(10.0, 5.0, 0.0), &mut block).unwrap();
    let mut block = feed_block(600.0);
    ctrl.line(&mut axis(10.0, 5.0, 0.0), &mut block).unwrap();

    assert_eq!(drain(&mut ctrl).len(), 1);
}

#[test]
fn checkmode_validates_without_enqueuing() {
    let mut ctrl = controller(scenario_settings(), Capabilities::default());
    assert!(ctrl.toggle_checkmode());

    let mut block = feed_block(600.0);
    ctrl.line(&mut axis(10.0, 0.0, 0.0), &mut block).unwrap();
    let mut block = feed_block(600.0);
    ctrl.line(&mut axis(10.0, 20.0, 0.0), &mut block).unwrap();

    assert!(ctrl.machine_mut().planner.is_empty());
    assert!(ctrl.machine().executed.is_empty());
    // validation still tracks the planned position
    assert_eq!(ctrl.last_step_position()[..3], [1000, 2000, 0]);
    assert!(!ctrl.toggle_checkmode());
}

#[test]
fn long_line_fragments_without_drift() {
    let settings = Settings {
        max_distance: [1000.0; 6],
        ..Settings::default()
    };
    let mut ctrl = controller(settings, Capabilities::default());

    // 700 mm at 100 steps/mm overflows the 16-bit step generator counter
    let mut target = axis(700.0, 0.0, 0.0);
    let mut block = feed_block(600.0);
    ctrl.line(&mut target, &mut block).unwrap();

    let blocks = drain(&mut ctrl);
    assert_eq!(blocks.len(), 2);
    let total: u32 = blocks.iter().map(|b| b.steps[0]).sum();
    assert_eq!(total, 70_000);
    for piece in &blocks {
        assert_eq!(piece.steps[0], 35_000);
        assert!(piece.motion_mode.contains(MotionMode::IS_SUBSEGMENT));
        // the whole line shares one dominant-axis rate
        assert!((piece.feed_sqr.sqrt() - 1000.0).abs() < 1e-2);
    }
    // the final fragment lands exactly on the commanded target
    assert_eq!(ctrl.last_step_position()[..3], [70_000, 0, 0]);
    assert_eq!(block.feed, 600.0);
    assert!(!block.motion_mode.contains(MotionMode::IS_SUBSEGMENT));
}

#[test]
fn aborted_wait_reports_reached_position() {
    let settings = Settings {
        max_distance: [1000.0; 6],
        ..Settings::default()
    };
    let mut ctrl = controller(settings, Capabilities::default());

    for i in 1..=32 {
        let mut block = feed_block(600.0);
        ctrl.line(&mut axis(i as f32, 0.0, 0.0), &mut block).unwrap();
    }
    assert!(ctrl.machine_mut().planner.is_full());
    ctrl.machine_mut().abort = true;

    // 700 mm from 32 mm splits at 382 mm; the queue never opens up
    let mut target = axis(732.0, 0.0, 0.0);
    let mut block = feed_block(600.0);
    let result = ctrl.line(&mut target, &mut block);

    assert_eq!(result, Err(MotionError::CriticalFail));
    assert!((target[0] - 382.0).abs() < 1e-3);
    assert_eq!(block.feed, 600.0);
}

#[test]
fn inverse_feed_expresses_duration() {
    let mut ctrl = controller(scenario_settings(), Capabilities::default());

    // complete the move in half a minute: feed value 2 (moves per minute)
    let mut block = feed_block(2.0);
    block.motion_mode |= MotionMode::INVERSE_FEED;
    ctrl.line(&mut axis(10.0, 0.0, 0.0), &mut block).unwrap();

    let blocks = drain(&mut ctrl);
    // 1000 steps over 30 s
    assert!((blocks[0].feed_sqr.sqrt() - 1000.0 / 30.0).abs() < 1e-3);
}

#[test]
fn planner_blocks_keep_dominant_axis_invariants() {
    let caps = Capabilities {
        backlash_compensation: true,
        ..Capabilities::default()
    };
    let mut ctrl = controller(scenario_settings(), caps);

    let moves = [
        axis(10.0, 3.0, 1.0),
        axis(4.0, 8.0, 1.0),
        axis(4.0, 8.0, 9.5),
        axis(0.5, 0.5, 0.5),
    ];
    for point in moves {
        let mut block = feed_block(900.0);
        ctrl.line(&mut point.clone(), &mut block).unwrap();
    }

    for queued in drain(&mut ctrl) {
        let max = *queued.steps.iter().max().unwrap();
        assert!(queued.total_steps > 0);
        assert_eq!(queued.total_steps, max);
        assert_eq!(queued.steps[queued.main_stepper as usize], max);
    }
}

#[test]
fn planned_position_matches_inverse_kinematics() {
    let settings = scenario_settings();
    let mut ctrl = controller(settings.clone(), Capabilities::default());

    for point in [axis(10.0, 3.0, 1.0), axis(0.07, 199.99, 42.42)] {
        let mut block = feed_block(600.0);
        ctrl.line(&mut point.clone(), &mut block).unwrap();

        let mut position = [0.0; 6];
        ctrl.get_position(&mut position);
        let mut steps = [0i32; MAX_STEPPERS];
        CartesianKinematics.apply_inverse(&settings, &position, &mut steps);
        assert_eq!(steps, ctrl.last_step_position());
    }
}

#[test]
fn laser_ppi_pulses_ride_the_spare_channel() {
    let mut settings = Settings {
        stepper_count: 4,
        laser_mode: LASER_PPI_MODE,
        spindle_max_rpm: 1000,
        ..Settings::default()
    };
    // pulse density of the laser channel
    settings.step_per_mm[3] = 200.0;
    let caps = Capabilities {
        laser_ppi: true,
        ..Capabilities::default()
    };
    let mut ctrl = controller(settings, caps);

    // half power halves the pulse density: 100 pulses/mm over 10 mm
    let mut block = feed_block(600.0);
    block.spindle = 500;
    block.spindle_running = true;
    ctrl.line(&mut axis(10.0, 0.0, 0.0), &mut block).unwrap();

    let blocks = drain(&mut ctrl);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].steps[0], 1000);
    assert_eq!(blocks[0].steps[3], 1000);

    // the pulse channel restarts from zero on every line
    let mut block = feed_block(600.0);
    block.spindle = 500;
    block.spindle_running = true;
    ctrl.line(&mut axis(20.0, 0.0, 0.0), &mut block).unwrap();
    assert_eq!(drain(&mut ctrl)[0].steps[3], 1000);
}

#[test]
fn linact_planner_carries_raw_direction_and_full_steps() {
    let caps = Capabilities {
        linact_planner: true,
        ..Capabilities::default()
    };
    let mut ctrl = controller(scenario_settings(), caps);

    let mut block = feed_block(600.0);
    ctrl.line(&mut axis(3.0, 4.0, 0.0), &mut block).unwrap();

    let blocks = drain(&mut ctrl);
    assert_eq!(blocks[0].full_steps, 700);
    // direction vector left un-normalised for the planner's own geometry
    assert_eq!(blocks[0].dir_vect[..2], [3.0, 4.0]);
}

#[test]
fn dwell_flushes_tools_and_waits() {
    let mut ctrl = controller(scenario_settings(), Capabilities::default());

    let mut block = feed_block(600.0);
    block.dwell = 250;
    block.spindle = 8000;
    block.spindle_running = true;
    ctrl.dwell(&mut block).unwrap();

    assert_eq!(ctrl.machine().delays, vec![250]);
    assert_eq!(ctrl.machine_mut().planner.tool_state(), (8000, true, 0));
}

#[test]
fn pause_drains_and_raises_hold() {
    let mut ctrl = controller(scenario_settings(), Capabilities::default());

    let mut block = feed_block(600.0);
    ctrl.line(&mut axis(5.0, 0.0, 0.0), &mut block).unwrap();
    ctrl.pause().unwrap();

    assert!(ctrl.machine_mut().planner.is_empty());
    assert!(ctrl.machine().exec.contains(ExecState::HOLD));
}
