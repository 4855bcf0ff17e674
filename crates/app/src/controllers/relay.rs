//! Relay: immediate open/close.

use std::sync::Arc;

use tokio::sync::Mutex;

use chotu_domain::actuator::{ActuatorId, ActuatorState};
use chotu_domain::error::ChotuError;
use chotu_domain::pin::{Pin, PinMode};

use crate::ports::{BoardLink, LinkError};

/// Controller for the relay. Open drives the coil pin HIGH.
pub struct RelayController {
    pin: Pin,
    link: Arc<dyn BoardLink>,
    open: Mutex<bool>,
}

impl RelayController {
    pub(crate) fn bind(pin: Pin, link: Arc<dyn BoardLink>) -> Result<Self, LinkError> {
        link.set_pin_mode(pin, PinMode::Output)?;
        link.digital_write(pin, false)?;
        Ok(Self {
            pin,
            link,
            open: Mutex::new(false),
        })
    }

    /// Open (`true`) or close the relay. Repeating the current state writes
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ChotuError::LinkFault`] if the write fails.
    pub async fn set_state(&self, open: bool) -> Result<(), ChotuError> {
        let mut current = self.open.lock().await;
        if *current == open {
            return Ok(());
        }
        self.link.digital_write(self.pin, open)?;
        *current = open;
        tracing::info!(actuator = %ActuatorId::Relay, open, "relay switched");
        Ok(())
    }

    /// Snapshot of the commanded state.
    pub async fn state(&self) -> ActuatorState {
        ActuatorState::Relay {
            open: *self.open.lock().await,
        }
    }
}
