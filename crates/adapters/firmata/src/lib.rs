//! # chotu-adapter-firmata
//!
//! Board adapter speaking the Firmata protocol over a serial port, the
//! standard sketch for Arduino-class boards.
//!
//! ## Architecture
//!
//! - [`FirmataConnector`] opens the port (`tokio-serial`) and runs the version
//!   handshake
//! - A reader task decodes incoming frames and keeps the latest analog samples
//! - A writer task drains the frame queue fed by [`FirmataLink`]
//! - Either task ending raises the session's link fault
//!
//! ## Dependency rule
//!
//! Depends on `chotu-app` (port traits) and `chotu-domain` only.

pub mod codec;
mod connector;
mod error;
mod link;

pub use connector::{
    DEFAULT_BAUD_RATE, DEFAULT_HANDSHAKE_TIMEOUT, FirmataConfig, FirmataConnector, attach,
};
pub use error::FirmataError;
pub use link::{ANALOG_PIN_OFFSET, FirmataLink};
