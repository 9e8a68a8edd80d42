//! Error and status types for the motion control crate.

/// Represents errors returned by the motion controller to its caller.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MotionError {
    /// A jog command requested a target outside the soft-limit envelope.
    /// Recoverable: nothing was enqueued and no alarm was raised.
    TravelExceeded,
    /// A cooperative wait was aborted or a machine sync was interrupted.
    /// The caller must abort the current motion sequence; controller state
    /// stays consistent with a subsequent `sync_position` call.
    CriticalFail,
}

/// Represents errors that can occur when queueing planner blocks.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PlannerError {
    /// The planner ring is full and cannot accept new blocks.
    QueueFull,
}

/// Outcome of a probing motion that ran to completion.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ProbeResult {
    /// The probe touched in the expected direction.
    Contact,
    /// The commanded travel finished without contact.
    Missed,
}

/// Alarm conditions raised out-of-band through the machine exec state,
/// never returned as errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum AlarmCode {
    /// A non-jog motion crossed the soft-limit envelope.
    SoftLimit,
    /// Homing was requested while a limit switch was already asserted or
    /// the machine was held/alarmed.
    HomingFailLimitActive,
    /// The homing seek or back-off finished without the expected limit
    /// switch transition.
    HomingFailApproach,
    /// The probe finished its travel without contact.
    ProbeFailContact,
}
