//! Board port: pin I/O and link establishment for the microcontroller.
//!
//! A board adapter (Firmata over serial, virtual, …) turns a pin number and
//! an analog/digital operation into electrical signals. The controllers in
//! this crate are the only callers.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::oneshot;

use chotu_domain::error::ChotuError;
use chotu_domain::pin::{Pin, PinMode};

/// Failure of the physical link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The link was closed (cable pulled, port gone, peer dropped).
    #[error("board link closed")]
    Closed,

    /// The board did not complete its handshake in time.
    #[error("board handshake timed out after {secs}s")]
    HandshakeTimeout { secs: u64 },

    /// The pin cannot be addressed by this board.
    #[error("pin {pin} is not addressable")]
    UnsupportedPin { pin: Pin },

    /// The adapter's transport failed.
    #[error("board transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LinkError {
    /// Wrap an adapter-specific error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Box::new(err))
    }
}

impl From<LinkError> for ChotuError {
    fn from(err: LinkError) -> Self {
        ChotuError::link_fault(err)
    }
}

/// Synchronous pin I/O over an established link.
///
/// Writes are expected to be non-blocking (queued to the transport).
pub trait BoardLink: Send + Sync {
    /// Configure the electrical mode of `pin`.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError`] when the link is down or the pin unsupported.
    fn set_pin_mode(&self, pin: Pin, mode: PinMode) -> Result<(), LinkError>;

    /// Drive a digital output HIGH (`true`) or LOW.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError`] when the link is down or the pin unsupported.
    fn digital_write(&self, pin: Pin, high: bool) -> Result<(), LinkError>;

    /// Write a PWM duty (0–255) or servo angle (0–180).
    ///
    /// # Errors
    ///
    /// Returns [`LinkError`] when the link is down or the pin unsupported.
    fn analog_write(&self, pin: Pin, value: u16) -> Result<(), LinkError>;

    /// Enable or disable periodic sample reporting for an analog input.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError`] when the link is down or the pin unsupported.
    fn report_analog(&self, pin: Pin, enable: bool) -> Result<(), LinkError>;

    /// Latest sample reported for an analog input, if any arrived yet.
    fn analog_value(&self, pin: Pin) -> Option<u16>;
}

impl<T: BoardLink + ?Sized> BoardLink for Arc<T> {
    fn set_pin_mode(&self, pin: Pin, mode: PinMode) -> Result<(), LinkError> {
        (**self).set_pin_mode(pin, mode)
    }

    fn digital_write(&self, pin: Pin, high: bool) -> Result<(), LinkError> {
        (**self).digital_write(pin, high)
    }

    fn analog_write(&self, pin: Pin, value: u16) -> Result<(), LinkError> {
        (**self).analog_write(pin, value)
    }

    fn report_analog(&self, pin: Pin, enable: bool) -> Result<(), LinkError> {
        (**self).report_analog(pin, enable)
    }

    fn analog_value(&self, pin: Pin) -> Option<u16> {
        (**self).analog_value(pin)
    }
}

/// An established link plus the signal that fires if it later drops.
pub struct LinkSession {
    pub link: Arc<dyn BoardLink>,
    /// Resolves with the fault once the link fails. A dropped sender is
    /// treated as [`LinkError::Closed`].
    pub faults: oneshot::Receiver<LinkError>,
}

/// Opens a link to the board.
///
/// Implementations live in adapter crates (e.g. `adapter_firmata`).
pub trait BoardConnector: Send + Sync + 'static {
    /// Unique name identifying this adapter (e.g. `"firmata"`).
    fn name(&self) -> &'static str;

    /// Open the link at `address` and resolve once the board has completed
    /// its handshake. No retry is attempted.
    fn connect(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<LinkSession, LinkError>> + Send;
}
