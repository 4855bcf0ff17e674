//! Actuators: the physical devices of the robot and their commanded state.
//!
//! | Actuator | Kind | Pins |
//! |----------|------|------|
//! | buzzer | Light | 12 |
//! | eyes | Light | 10 |
//! | motor | VariableMotor | pwm 6, dir 7 |
//! | servo | ContinuousServo | 5 |
//! | fan | Light | 4 |
//! | relay | Relay | 3 |
//! | temperature | AnalogSensor | A0 |
//! | distance | AnalogSensor | A1 |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pin::{self, Pin};

/// Identity of one of the eight fixed actuators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorId {
    Buzzer,
    Eyes,
    Motor,
    Servo,
    Fan,
    Relay,
    Temperature,
    Distance,
}

impl ActuatorId {
    /// Every actuator, in binding order.
    pub const ALL: [Self; 8] = [
        Self::Buzzer,
        Self::Eyes,
        Self::Motor,
        Self::Servo,
        Self::Fan,
        Self::Relay,
        Self::Temperature,
        Self::Distance,
    ];

    /// Stable lowercase name, used in logs.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Buzzer => "buzzer",
            Self::Eyes => "eyes",
            Self::Motor => "motor",
            Self::Servo => "servo",
            Self::Fan => "fan",
            Self::Relay => "relay",
            Self::Temperature => "temperature",
            Self::Distance => "distance",
        }
    }

    /// Which controller family drives this actuator.
    #[must_use]
    pub fn kind(self) -> ActuatorKind {
        match self {
            Self::Buzzer | Self::Eyes | Self::Fan => ActuatorKind::Light,
            Self::Motor => ActuatorKind::VariableMotor,
            Self::Servo => ActuatorKind::ContinuousServo,
            Self::Relay => ActuatorKind::Relay,
            Self::Temperature | Self::Distance => ActuatorKind::AnalogSensor,
        }
    }

    /// Pins owned by this actuator. No pin belongs to two actuators.
    #[must_use]
    pub fn pins(self) -> &'static [Pin] {
        match self {
            Self::Buzzer => &[pin::BUZZER],
            Self::Eyes => &[pin::EYES],
            Self::Motor => &[pin::MOTOR_PWM, pin::MOTOR_DIR],
            Self::Servo => &[pin::SERVO],
            Self::Fan => &[pin::FAN],
            Self::Relay => &[pin::RELAY],
            Self::Temperature => &[pin::TEMPERATURE],
            Self::Distance => &[pin::DISTANCE],
        }
    }
}

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Controller family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActuatorKind {
    Light,
    ContinuousServo,
    VariableMotor,
    Relay,
    AnalogSensor,
}

/// What a light-kind output is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightState {
    #[default]
    Off,
    On,
    /// Toggling on a fixed period until reverted.
    Blinking,
}

impl LightState {
    /// Whether the output is in its idle (off) state.
    #[must_use]
    pub fn is_idle(self) -> bool {
        matches!(self, Self::Off)
    }
}

/// Rotation direction of the motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotorDirection {
    #[default]
    Forward,
    Reverse,
}

/// Snapshot of an actuator's last commanded value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActuatorState {
    Light {
        state: LightState,
    },
    Motor {
        /// PWM duty, 0 when stopped.
        duty: u8,
        direction: MotorDirection,
    },
    Servo {
        /// `None` until the first move.
        angle: Option<u8>,
    },
    Relay {
        open: bool,
    },
    Sensor {
        /// Latest raw 10-bit sample.
        raw: u16,
    },
}

impl ActuatorState {
    /// Whether the actuator sits in its terminal/idle state.
    ///
    /// Servo and sensor are always idle: they hold no timed action.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        match self {
            Self::Light { state } => state.is_idle(),
            Self::Motor { duty, .. } => *duty == 0,
            Self::Relay { open } => !open,
            Self::Servo { .. } | Self::Sensor { .. } => true,
        }
    }
}
