//! Machine event trace captured during a simulation run, serializable for
//! analysis and CI validation.

use motion::AlarmCode;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum TraceEvent {
    BlockStarted { total_steps: u32, dirbits: u8 },
    LimitTriggered { mask: u8 },
    AlarmRaised { code: AlarmCode },
    ProbeCaptured { steps: Vec<i32> },
}
