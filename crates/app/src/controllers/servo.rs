//! Hobby servo: immediate positioning, no timer.

use std::sync::Arc;

use tokio::sync::Mutex;

use chotu_domain::actuator::{ActuatorId, ActuatorState};
use chotu_domain::command::require_range;
use chotu_domain::error::ChotuError;
use chotu_domain::pin::{Pin, PinMode};

use crate::ports::{BoardLink, LinkError};

/// Largest accepted angle in degrees.
pub const MAX_ANGLE: f64 = 180.0;

/// Controller for the servo.
pub struct ServoController {
    pin: Pin,
    link: Arc<dyn BoardLink>,
    angle: Mutex<Option<u8>>,
}

impl ServoController {
    pub(crate) fn bind(pin: Pin, link: Arc<dyn BoardLink>) -> Result<Self, LinkError> {
        link.set_pin_mode(pin, PinMode::Servo)?;
        Ok(Self {
            pin,
            link,
            angle: Mutex::new(None),
        })
    }

    /// Move to `angle` degrees (rounded). Moving to the current angle
    /// writes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ChotuError::InvalidArgument`] outside `0..=180`, or
    /// [`ChotuError::LinkFault`] if the write fails.
    pub async fn move_to(&self, angle: f64) -> Result<(), ChotuError> {
        let angle = require_range("angle", angle, 0.0, MAX_ANGLE)?;
        let target = whole_degrees(angle);

        let mut current = self.angle.lock().await;
        if *current == Some(target) {
            return Ok(());
        }
        self.link.analog_write(self.pin, u16::from(target))?;
        *current = Some(target);
        tracing::info!(actuator = %ActuatorId::Servo, angle = target, "servo moved");
        Ok(())
    }

    /// Snapshot of the commanded state.
    pub async fn state(&self) -> ActuatorState {
        ActuatorState::Servo {
            angle: *self.angle.lock().await,
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_degrees(angle: f64) -> u8 {
    angle.round().clamp(0.0, MAX_ANGLE) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{LinkOp, RecordingLink};
    use chotu_domain::pin;

    fn servo(link: &Arc<RecordingLink>) -> ServoController {
        let ctrl = ServoController::bind(pin::SERVO, link.clone()).unwrap();
        link.clear();
        ctrl
    }

    #[tokio::test]
    async fn should_write_angle_on_move() {
        let link = RecordingLink::new();
        let servo = servo(&link);

        servo.move_to(90.0).await.unwrap();

        assert_eq!(link.ops_on(pin::SERVO), [LinkOp::Analog(pin::SERVO, 90)]);
        assert_eq!(servo.state().await, ActuatorState::Servo { angle: Some(90) });
    }

    #[tokio::test]
    async fn should_be_idempotent_for_same_angle() {
        let link = RecordingLink::new();
        let servo = servo(&link);

        servo.move_to(45.0).await.unwrap();
        servo.move_to(45.0).await.unwrap();

        assert_eq!(link.ops_on(pin::SERVO).len(), 1);
    }

    #[tokio::test]
    async fn should_reject_angle_outside_range() {
        let link = RecordingLink::new();
        let servo = servo(&link);

        assert!(matches!(
            servo.move_to(181.0).await,
            Err(ChotuError::InvalidArgument(_))
        ));
        assert!(matches!(
            servo.move_to(-1.0).await,
            Err(ChotuError::InvalidArgument(_))
        ));
        assert!(link.ops().is_empty());
        assert_eq!(servo.state().await, ActuatorState::Servo { angle: None });
    }

    #[tokio::test]
    async fn should_round_fractional_angle() {
        let link = RecordingLink::new();
        let servo = servo(&link);

        servo.move_to(44.6).await.unwrap();

        assert_eq!(link.ops_on(pin::SERVO), [LinkOp::Analog(pin::SERVO, 45)]);
    }
}
