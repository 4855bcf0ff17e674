//! The bound set of controllers, one per [`ActuatorId`].

use std::sync::Arc;

use chotu_domain::actuator::{ActuatorId, ActuatorState};
use chotu_domain::pin;

use crate::controllers::{
    LightController, MotorController, RelayController, SensorController, ServoController,
};
use crate::ports::{BoardLink, LinkError};

/// Every controller of the robot, bound to one link.
pub struct Actuators {
    pub buzzer: LightController,
    pub eyes: LightController,
    pub fan: LightController,
    pub motor: MotorController,
    pub servo: ServoController,
    pub relay: RelayController,
    pub temperature: SensorController,
    pub distance: SensorController,
}

impl Actuators {
    /// Bind every controller to `link`, configuring pin modes and idle levels.
    pub(crate) fn bind(link: &Arc<dyn BoardLink>) -> Result<Self, LinkError> {
        let actuators = Self {
            buzzer: LightController::bind(ActuatorId::Buzzer, pin::BUZZER, Arc::clone(link))?,
            eyes: LightController::bind(ActuatorId::Eyes, pin::EYES, Arc::clone(link))?,
            fan: LightController::bind(ActuatorId::Fan, pin::FAN, Arc::clone(link))?,
            motor: MotorController::bind(pin::MOTOR_PWM, pin::MOTOR_DIR, Arc::clone(link))?,
            servo: ServoController::bind(pin::SERVO, Arc::clone(link))?,
            relay: RelayController::bind(pin::RELAY, Arc::clone(link))?,
            temperature: SensorController::bind(
                ActuatorId::Temperature,
                pin::TEMPERATURE,
                Arc::clone(link),
            )?,
            distance: SensorController::bind(
                ActuatorId::Distance,
                pin::DISTANCE,
                Arc::clone(link),
            )?,
        };
        tracing::debug!(count = ActuatorId::ALL.len(), "actuators bound");
        Ok(actuators)
    }

    /// Last commanded state of one actuator.
    pub async fn state(&self, id: ActuatorId) -> ActuatorState {
        match id {
            ActuatorId::Buzzer => self.buzzer.state().await,
            ActuatorId::Eyes => self.eyes.state().await,
            ActuatorId::Fan => self.fan.state().await,
            ActuatorId::Motor => self.motor.state().await,
            ActuatorId::Servo => self.servo.state().await,
            ActuatorId::Relay => self.relay.state().await,
            ActuatorId::Temperature => self.temperature.state(),
            ActuatorId::Distance => self.distance.state(),
        }
    }

    /// State of every actuator, in [`ActuatorId::ALL`] order.
    pub async fn snapshot(&self) -> Vec<(ActuatorId, ActuatorState)> {
        let mut out = Vec::with_capacity(ActuatorId::ALL.len());
        for id in ActuatorId::ALL {
            out.push((id, self.state(id).await));
        }
        out
    }
}
