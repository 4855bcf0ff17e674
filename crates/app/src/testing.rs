//! Test doubles shared by the unit tests of this crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;
use tokio::time::Instant;

use chotu_domain::pin::{Pin, PinMode};

use crate::ports::{BoardConnector, BoardLink, LinkError, LinkSession};

/// A single pin operation, as seen by the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOp {
    Mode(Pin, PinMode),
    Digital(Pin, bool),
    Analog(Pin, u16),
    Report(Pin, bool),
}

/// Operation plus the (tokio) instant it was issued.
#[derive(Debug, Clone, Copy)]
pub struct Recorded {
    pub at: Instant,
    pub op: LinkOp,
}

/// In-memory link recording every operation.
#[derive(Default)]
pub struct RecordingLink {
    ops: Mutex<Vec<Recorded>>,
    samples: Mutex<HashMap<Pin, u16>>,
    broken: AtomicBool,
}

impl RecordingLink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn ops(&self) -> Vec<Recorded> {
        self.ops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Operations on `pin` only, without timestamps.
    pub fn ops_on(&self, pin: Pin) -> Vec<LinkOp> {
        self.ops()
            .into_iter()
            .map(|r| r.op)
            .filter(|op| match op {
                LinkOp::Mode(p, _)
                | LinkOp::Digital(p, _)
                | LinkOp::Analog(p, _)
                | LinkOp::Report(p, _) => *p == pin,
            })
            .collect()
    }

    /// Digital writes of `level` to `pin`, with timestamps.
    pub fn digital_writes(&self, pin: Pin, level: bool) -> Vec<Instant> {
        self.ops()
            .into_iter()
            .filter(|r| r.op == LinkOp::Digital(pin, level))
            .map(|r| r.at)
            .collect()
    }

    pub fn clear(&self) {
        self.ops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn set_sample(&self, pin: Pin, raw: u16) {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pin, raw);
    }

    /// Make every subsequent write fail with [`LinkError::Closed`].
    pub fn break_link(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    fn record(&self, op: LinkOp) -> Result<(), LinkError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(LinkError::Closed);
        }
        self.ops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Recorded {
                at: Instant::now(),
                op,
            });
        Ok(())
    }
}

impl BoardLink for RecordingLink {
    fn set_pin_mode(&self, pin: Pin, mode: PinMode) -> Result<(), LinkError> {
        self.record(LinkOp::Mode(pin, mode))
    }

    fn digital_write(&self, pin: Pin, high: bool) -> Result<(), LinkError> {
        self.record(LinkOp::Digital(pin, high))
    }

    fn analog_write(&self, pin: Pin, value: u16) -> Result<(), LinkError> {
        self.record(LinkOp::Analog(pin, value))
    }

    fn report_analog(&self, pin: Pin, enable: bool) -> Result<(), LinkError> {
        self.record(LinkOp::Report(pin, enable))
    }

    fn analog_value(&self, pin: Pin) -> Option<u16> {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&pin)
            .copied()
    }
}

/// Connector handing out a [`RecordingLink`], or failing on demand.
pub struct ScriptedConnector {
    pub link: Arc<RecordingLink>,
    fail: bool,
    fault_tx: Mutex<Option<oneshot::Sender<LinkError>>>,
}

impl ScriptedConnector {
    pub fn succeeding(link: Arc<RecordingLink>) -> Self {
        Self {
            link,
            fail: false,
            fault_tx: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            link: RecordingLink::new(),
            fail: true,
            fault_tx: Mutex::new(None),
        }
    }

    /// Simulate the link dropping after it was established.
    pub fn drop_link(&self) {
        let tx = self
            .fault_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = tx {
            let _ = tx.send(LinkError::Closed);
        }
    }
}

impl BoardConnector for ScriptedConnector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn connect(&self, _address: &str) -> Result<LinkSession, LinkError> {
        if self.fail {
            return Err(LinkError::HandshakeTimeout { secs: 1 });
        }
        let (tx, rx) = oneshot::channel();
        *self
            .fault_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);
        let link: Arc<dyn BoardLink> = self.link.clone();
        Ok(LinkSession { link, faults: rx })
    }
}
