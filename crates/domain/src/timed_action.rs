//! Timed action: an actuator hold that must auto-revert.
//!
//! At most one timed action is outstanding per actuator. A new one for the
//! same actuator supersedes the previous one (cancel-and-replace).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::actuator::ActuatorId;
use crate::time::{self, Timestamp};

/// Blink toggle period of the eyes pattern.
pub const BLINK_PERIOD: Duration = Duration::from_millis(500);

/// Hard upper bound on any single motor run. Not caller-configurable.
pub const MOTOR_SAFETY_CEILING: Duration = Duration::from_secs(5);

/// What the hold is doing while it lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimedActionKind {
    Blink,
    Buzz,
    MotorRun,
}

/// An in-flight hold on an actuator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedAction {
    pub actuator: ActuatorId,
    pub kind: TimedActionKind,
    pub started_at: Timestamp,
    pub duration: Duration,
}

impl TimedAction {
    /// Start a new hold now.
    #[must_use]
    pub fn start(actuator: ActuatorId, kind: TimedActionKind, duration: Duration) -> Self {
        Self {
            actuator,
            kind,
            started_at: time::now(),
            duration,
        }
    }

    /// Duration in whole milliseconds, saturating.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }

    /// When the hold reverts, if representable.
    #[must_use]
    pub fn deadline(&self) -> Option<Timestamp> {
        time::offset(self.started_at, self.duration)
    }
}

/// Convert a caller-supplied duration in seconds.
///
/// Returns `None` for negative, NaN, infinite or unrepresentable values.
#[must_use]
pub fn duration_from_secs(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_compute_deadline_from_start() {
        let action = TimedAction::start(
            ActuatorId::Eyes,
            TimedActionKind::Blink,
            Duration::from_secs(2),
        );
        let deadline = action.deadline().unwrap();
        assert_eq!((deadline - action.started_at).num_milliseconds(), 2_000);
        assert_eq!(action.duration_ms(), 2_000);
    }

    #[test]
    fn should_accept_zero_and_fractional_seconds() {
        assert_eq!(duration_from_secs(0.0), Some(Duration::ZERO));
        assert_eq!(duration_from_secs(1.5), Some(Duration::from_millis(1_500)));
    }

    #[test]
    fn should_reject_negative_or_non_finite_seconds() {
        assert_eq!(duration_from_secs(-1.0), None);
        assert_eq!(duration_from_secs(f64::NAN), None);
        assert_eq!(duration_from_secs(f64::INFINITY), None);
    }

    #[test]
    fn should_keep_motor_ceiling_at_five_seconds() {
        assert_eq!(MOTOR_SAFETY_CEILING, Duration::from_secs(5));
    }
}
