//! Offline toolpath processor.
//!
//! Streams a toolpath record file through the motion controller against the
//! simulated machine, for testing and analysis without hardware. In check
//! mode every record is validated but nothing reaches the planner.

use crate::config;
use crate::toolpath::{parse_record, Record};
use anyhow::{bail, Context, Result};
use clap::Parser;
use motion::{
    Capabilities, CartesianKinematics, ExecState, Machine, MotionBlock, MotionController,
    MotionError, ProbeFlags, Settings, MAX_AXES,
};
use sim::{LimitSwitch, ProbeTrigger, SimMachine};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use tracing::{info, warn};

/// Arguments for the `batch` and `check` subcommands.
#[derive(Parser, Debug)]
pub struct BatchArgs {
    /// Path to the toolpath file to process.
    #[arg(required = true)]
    toolpath: PathBuf,

    /// Path to the machine configuration file.
    #[arg(short, long, default_value = "machine.cfg")]
    config: PathBuf,

    /// Script the simulated probe to trigger at this Z height (work units).
    #[arg(long)]
    probe_z: Option<f32>,

    /// Write the machine event trace to this file as JSON.
    #[arg(long)]
    trace: Option<PathBuf>,
}

/// Builds a simulated machine whose limit switches sit a few millimetres
/// past the homing side of each axis, so `home` records work out of the box.
fn build_machine(settings: &Settings, probe_z: Option<f32>) -> SimMachine {
    let mut machine = SimMachine::new(settings).with_steps_per_poll(64);

    for axis in 0..settings.axis_count as usize {
        let steps_per_mm = settings.step_per_mm[axis];
        let inverted = settings.homing_dir_invert_mask & (1 << axis) != 0;
        let switch = if inverted {
            LimitSwitch {
                axis,
                trigger_at: ((settings.max_distance[axis] + 5.0) * steps_per_mm) as i32,
                when_below: false,
            }
        } else {
            LimitSwitch {
                axis,
                trigger_at: (-5.0 * steps_per_mm) as i32,
                when_below: true,
            }
        };
        machine = machine.with_limit_switch(switch);
    }

    if let Some(z) = probe_z {
        machine = machine.with_probe_trigger(ProbeTrigger {
            axis: 2,
            trigger_at: (z * settings.step_per_mm[2]) as i32,
            when_below: true,
        });
    }

    machine
}

fn merge_target(
    controller: &MotionController<CartesianKinematics, SimMachine>,
    axes: &[Option<f32>; MAX_AXES],
) -> [f32; MAX_AXES] {
    let mut target = [0.0; MAX_AXES];
    controller.get_position(&mut target);
    for (i, value) in axes.iter().enumerate() {
        if let Some(v) = *value {
            target[i] = v;
        }
    }
    target
}

pub fn run(args: BatchArgs, checkmode: bool) -> Result<()> {
    let settings = if args.config.exists() {
        config::load(&args.config)?
    } else {
        warn!(path = ?args.config, "no machine configuration found, using defaults");
        Settings::default()
    };

    let machine = build_machine(&settings, args.probe_z);
    let mut controller = MotionController::new(
        settings,
        CartesianKinematics,
        machine,
        Capabilities {
            backlash_compensation: true,
            ..Capabilities::default()
        },
    );
    if checkmode {
        controller.toggle_checkmode();
        info!("check mode: validating without motion");
    }

    let file = File::open(&args.toolpath)
        .with_context(|| format!("failed to open toolpath file: {:?}", args.toolpath))?;
    let reader = BufReader::new(file);

    let mut feed = 600.0f32;
    for (index, line) in reader.lines().enumerate() {
        let number = index + 1;
        let text = line?;
        let Some(record) = parse_record(&text, number)? else {
            continue;
        };

        match record {
            Record::Line { axes, feed: f } => {
                feed = f.unwrap_or(feed);
                let mut target = merge_target(&controller, &axes);
                let mut block = MotionBlock {
                    feed,
                    ..MotionBlock::default()
                };
                match controller.line(&mut target, &mut block) {
                    Ok(()) => info!(line = number, ?target, feed, "line planned"),
                    Err(MotionError::TravelExceeded) => {
                        warn!(line = number, "jog target outside travel, skipped")
                    }
                    Err(error) => bail!("line {number}: motion aborted: {error:?}"),
                }
            }
            Record::Arc {
                axes,
                offset_a,
                offset_b,
                feed: f,
                clockwise,
            } => {
                feed = f.unwrap_or(feed);
                let mut target = merge_target(&controller, &axes);
                let radius = (offset_a * offset_a + offset_b * offset_b).sqrt();
                let mut block = MotionBlock {
                    feed,
                    ..MotionBlock::default()
                };
                match controller.arc(
                    &mut target,
                    offset_a,
                    offset_b,
                    radius,
                    0,
                    1,
                    clockwise,
                    &mut block,
                ) {
                    Ok(()) => info!(line = number, ?target, radius, clockwise, "arc planned"),
                    Err(error) => bail!("line {number}: arc aborted: {error:?}"),
                }
            }
            Record::Dwell { ms } => {
                let mut block = MotionBlock {
                    dwell: ms,
                    ..MotionBlock::default()
                };
                controller
                    .dwell(&mut block)
                    .map_err(|e| anyhow::anyhow!("line {number}: dwell aborted: {e:?}"))?;
                info!(line = number, ms, "dwell");
            }
            Record::Probe {
                axes,
                feed: f,
                no_alarm,
            } => {
                if checkmode {
                    info!(line = number, "probe skipped in check mode");
                    continue;
                }
                feed = f.unwrap_or(feed);
                let mut target = merge_target(&controller, &axes);
                let mut flags = ProbeFlags::empty();
                if no_alarm {
                    flags |= ProbeFlags::NO_ALARM_ON_FAIL;
                }
                let mut block = MotionBlock {
                    feed,
                    ..MotionBlock::default()
                };
                match controller.probe(&mut target, flags, &mut block) {
                    Ok(result) => {
                        let capture = controller.machine().probe_capture();
                        info!(line = number, ?result, ?capture, "probe finished")
                    }
                    Err(error) => bail!("line {number}: probe aborted: {error:?}"),
                }
            }
            Record::Home => {
                if checkmode {
                    info!(line = number, "home skipped in check mode");
                    continue;
                }
                controller
                    .home()
                    .map_err(|e| anyhow::anyhow!("line {number}: homing failed: {e:?}"))?;
                info!(line = number, "homing cycle complete");
            }
            Record::Pause => {
                controller
                    .pause()
                    .map_err(|e| anyhow::anyhow!("line {number}: pause aborted: {e:?}"))?;
                // batch runs resume immediately
                controller.machine_mut().clear_exec_state(ExecState::HOLD);
                info!(line = number, "hold raised and released");
            }
        }

        if controller
            .machine()
            .has_exec_state(ExecState::ALARM)
        {
            bail!("line {number}: machine alarmed, aborting batch");
        }
    }

    controller
        .machine_mut()
        .sync()
        .map_err(|e| anyhow::anyhow!("final drain failed: {e:?}"))?;

    let mut position = [0.0; MAX_AXES];
    controller.get_position(&mut position);
    println!("final position: {position:?}");
    println!(
        "blocks executed: {}, simulated time: {} ms",
        controller
            .machine()
            .trace()
            .iter()
            .filter(|e| matches!(e, sim::TraceEvent::BlockStarted { .. }))
            .count(),
        controller.machine().elapsed_ms()
    );

    if let Some(path) = args.trace {
        let json = controller.machine().trace_json()?;
        File::create(&path)
            .and_then(|mut f| f.write_all(json.as_bytes()))
            .with_context(|| format!("failed to write trace file: {path:?}"))?;
        info!(?path, "trace written");
    }

    Ok(())
}
