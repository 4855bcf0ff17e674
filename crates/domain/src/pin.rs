//! Pin addresses and the fixed pin assignment table of the Chotu board.
//!
//! Single source of truth: every actuator references this module rather
//! than hard-coding pin numbers. The table is a physical binding and is not
//! configurable at runtime.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A pin on the microcontroller, either a digital header pin or an analog
/// input channel (`A0`, `A1`, …).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pin {
    Digital(u8),
    Analog(u8),
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Digital(n) => write!(f, "{n}"),
            Self::Analog(n) => write!(f, "A{n}"),
        }
    }
}

/// Electrical mode a pin is configured for before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinMode {
    /// Digital output (HIGH/LOW).
    Output,
    /// PWM output (duty 0–255).
    Pwm,
    /// Hobby-servo output (angle 0–180).
    Servo,
    /// Analog input with periodic sample reporting.
    Analog,
}

// ---------------------------------------------------------------------------
// Lights (binary outputs)
// ---------------------------------------------------------------------------

/// Piezo buzzer, driven as a binary output.
pub const BUZZER: Pin = Pin::Digital(12);
/// Eye LEDs.
pub const EYES: Pin = Pin::Digital(10);
/// Fan, switched as a binary output.
pub const FAN: Pin = Pin::Digital(4);

// ---------------------------------------------------------------------------
// Motion
// ---------------------------------------------------------------------------

/// Motor driver speed input (PWM).
pub const MOTOR_PWM: Pin = Pin::Digital(6);
/// Motor driver direction input: LOW = forward, HIGH = reverse.
pub const MOTOR_DIR: Pin = Pin::Digital(7);
/// Servo signal.
pub const SERVO: Pin = Pin::Digital(5);

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

pub const RELAY: Pin = Pin::Digital(3);

// ---------------------------------------------------------------------------
// Sensors (analog inputs)
// ---------------------------------------------------------------------------

/// Temperature sensor.
pub const TEMPERATURE: Pin = Pin::Analog(0);
/// Distance sensor.
pub const DISTANCE: Pin = Pin::Analog(1);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_digital_pin_as_number() {
        assert_eq!(BUZZER.to_string(), "12");
    }

    #[test]
    fn should_display_analog_pin_with_prefix() {
        assert_eq!(TEMPERATURE.to_string(), "A0");
        assert_eq!(DISTANCE.to_string(), "A1");
    }

    #[test]
    fn should_distinguish_digital_and_analog_with_same_number() {
        assert_ne!(Pin::Digital(0), Pin::Analog(0));
    }
}
