//! # chotu-adapter-virtual
//!
//! Simulated board for demo runs and end-to-end tests. No hardware needed.
//!
//! ## Behaviour
//!
//! | Board feature | Simulation |
//! |---------------|------------|
//! | Handshake | Completes immediately |
//! | Pin writes | Stored per pin, inspectable via [`VirtualLink::pin`] |
//! | Analog inputs | Canned raw samples, reported once reporting is enabled |
//! | Link fault | Triggered by [`VirtualBoard::disconnect`] |
//!
//! ## Dependency rule
//!
//! Depends on `chotu-app` (port traits) and `chotu-domain` only.

mod link;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

use chotu_app::ports::{BoardConnector, BoardLink, LinkError, LinkSession};
use chotu_domain::pin::{self, Pin};

pub use link::{MAX_ANALOG_PIN, MAX_DIGITAL_PIN, PinSnapshot, VirtualLink};

const DEFAULT_TEMPERATURE_RAW: u16 = 512;
const DEFAULT_DISTANCE_RAW: u16 = 120;

struct Connected {
    link: Arc<VirtualLink>,
    fault_tx: Option<oneshot::Sender<LinkError>>,
}

/// Simulated board connector.
pub struct VirtualBoard {
    samples: HashMap<Pin, u16>,
    connected: Mutex<Option<Connected>>,
}

impl Default for VirtualBoard {
    fn default() -> Self {
        Self {
            samples: HashMap::from([
                (pin::TEMPERATURE, DEFAULT_TEMPERATURE_RAW),
                (pin::DISTANCE, DEFAULT_DISTANCE_RAW),
            ]),
            connected: Mutex::new(None),
        }
    }
}

impl VirtualBoard {
    /// Canned raw sample reported for analog input `pin`.
    #[must_use]
    pub fn with_sample(mut self, pin: Pin, raw: u16) -> Self {
        self.samples.insert(pin, raw);
        self
    }

    /// The link handed out by the last `connect`, if any.
    #[must_use]
    pub fn link(&self) -> Option<Arc<VirtualLink>> {
        self.connected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| Arc::clone(&c.link))
    }

    /// Simulate the cable being pulled.
    pub fn disconnect(&self) {
        let mut connected = self.connected.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(conn) = connected.as_mut() {
            conn.link.close();
            if let Some(tx) = conn.fault_tx.take() {
                tracing::warn!("virtual board disconnected");
                let _ = tx.send(LinkError::Closed);
            }
        }
    }
}

impl BoardConnector for VirtualBoard {
    fn name(&self) -> &'static str {
        "virtual"
    }

    async fn connect(&self, address: &str) -> Result<LinkSession, LinkError> {
        let link = Arc::new(VirtualLink::new(self.samples.clone()));
        let (fault_tx, faults) = oneshot::channel();
        *self.connected.lock().unwrap_or_else(PoisonError::into_inner) = Some(Connected {
            link: Arc::clone(&link),
            fault_tx: Some(fault_tx),
        });
        tracing::info!(address, "virtual board connected");

        let link: Arc<dyn BoardLink> = link;
        Ok(LinkSession { link, faults })
    }
}
