//! # chotu-domain
//!
//! Pure domain model for the Chotu robot controller.
//!
//! ## Responsibilities
//! - Foundational types: error taxonomy, timestamps
//! - Define **Pins** and the fixed pin assignment table of the robot board
//! - Define **Actuators** (buzzer, eyes, motor, servo, fan, relay, sensors),
//!   their kinds and commanded state
//! - Define **Timed actions** (holds that must auto-revert)
//! - Define **Command shapes** (argument validation) and the response envelope
//! - Define the **Prompt catalog** (canned narrative texts)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod time;

pub mod actuator;
pub mod command;
pub mod pin;
pub mod prompt;
pub mod timed_action;
