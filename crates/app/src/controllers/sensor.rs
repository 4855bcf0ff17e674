//! Analog sensor: pure read of the latest reported sample.

use std::sync::Arc;

use chotu_domain::actuator::{ActuatorId, ActuatorState};
use chotu_domain::pin::{Pin, PinMode};

use crate::ports::{BoardLink, LinkError};

/// Controller for an analog input.
pub struct SensorController {
    id: ActuatorId,
    pin: Pin,
    link: Arc<dyn BoardLink>,
}

impl SensorController {
    /// Configure the pin as an analog input and enable sample reporting.
    pub(crate) fn bind(
        id: ActuatorId,
        pin: Pin,
        link: Arc<dyn BoardLink>,
    ) -> Result<Self, LinkError> {
        link.set_pin_mode(pin, PinMode::Analog)?;
        link.report_analog(pin, true)?;
        Ok(Self { id, pin, link })
    }

    /// Latest raw 10-bit sample.
    ///
    /// Returns 0 until the board has reported a first sample; the magnitude
    /// is not validated.
    #[must_use]
    pub fn read_value(&self) -> u16 {
        let raw = self.link.analog_value(self.pin);
        if raw.is_none() {
            tracing::debug!(actuator = %self.id, "no sample reported yet");
        }
        raw.unwrap_or(0)
    }

    /// Snapshot of the last reported value.
    #[must_use]
    pub fn state(&self) -> ActuatorState {
        ActuatorState::Sensor {
            raw: self.read_value(),
        }
    }
}
