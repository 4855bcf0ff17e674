//! # chotu-app
//!
//! Application layer: board lifecycle, actuator controllers, command
//! dispatch and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `BoardLink`: synchronous pin I/O over an established link
//!   - `BoardConnector`: open the link and complete the board handshake
//! - Own the **board lifecycle**: `BoardConnection` (Disconnected → Connecting
//!   → Ready | Error) and the one-time binding of the actuator set
//! - Provide the **actuator controllers** (light, motor, servo, relay,
//!   sensor) with their timing and safety rules
//! - Provide the **driving/inbound port** used by transports:
//!   `CommandDispatcher`: `(name, raw arguments) → CommandResult`
//!
//! ## Dependency rule
//! Depends on `chotu-domain` only (plus `tokio` for timers and sync).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod actuators;
pub mod board;
pub mod controllers;
pub mod dispatcher;
pub mod ports;

#[cfg(test)]
mod testing;
