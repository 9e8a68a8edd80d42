//! # Simulated machine
//!
//! An in-process implementation of the [`motion::Machine`] contract for
//! integration tests and offline toolpath processing. The simulated
//! interpolator drains planner blocks one Bresenham step at a time inside
//! the cooperative `dotasks` hook, so probe polls and planner back-pressure
//! observe realistic incremental progress. Limit switches and the probe
//! input are scripted by step positions, letting homing and probing cycles
//! run end to end without hardware.

mod machine;
mod trace;

pub use machine::{LimitSwitch, ProbeTrigger, SimMachine};
pub use trace::TraceEvent;
