//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`ChotuError`]
//! via `#[from]` or an `into_domain` helper. Only [`ChotuError::LinkFault`]
//! is fatal; every other variant rejects a single invocation.

use crate::command::ArgType;

/// Top-level error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum ChotuError {
    /// The physical link to the board could not be established or dropped.
    #[error("board link fault")]
    LinkFault(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A command arrived before the board (and its actuators) became ready.
    #[error("device not ready")]
    NotReady,

    /// An argument failed validation. Nothing reached the hardware.
    #[error("invalid argument")]
    InvalidArgument(#[from] InvalidArgumentError),

    /// No command is registered under the requested name.
    #[error("unknown command")]
    UnknownCommand(#[from] UnknownCommandError),

    /// No prompt is registered under the requested name.
    #[error("unknown prompt")]
    UnknownPrompt(#[from] UnknownPromptError),
}

impl ChotuError {
    /// Wrap any error as a link fault.
    pub fn link_fault(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::LinkFault(Box::new(err))
    }

    /// Whether this error must bring the process down.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::LinkFault(_))
    }

    /// One-line description including the nested cause, suitable for
    /// returning to a caller.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::LinkFault(source) => format!("{self}: {source}"),
            Self::NotReady => self.to_string(),
            Self::InvalidArgument(inner) => format!("{self}: {inner}"),
            Self::UnknownCommand(inner) => format!("{self}: {inner}"),
            Self::UnknownPrompt(inner) => format!("{self}: {inner}"),
        }
    }
}

/// Why an argument was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidArgumentError {
    /// Arguments were not a JSON object (or null).
    #[error("arguments must be an object")]
    NotAnObject,

    /// A required field is absent.
    #[error("missing required argument `{name}`")]
    Missing { name: &'static str },

    /// A field has the wrong JSON type.
    #[error("argument `{name}` must be a {expected}")]
    WrongType {
        name: &'static str,
        expected: ArgType,
    },

    /// A numeric field is NaN or infinite.
    #[error("argument `{name}` must be a finite number")]
    NotFinite { name: &'static str },

    /// A numeric field lies outside the actuator's accepted range.
    #[error("argument `{name}` = {value} is outside {min}..={max}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A duration in seconds is negative, non-finite or too large.
    #[error("argument `{name}` = {value} is not a valid duration in seconds")]
    InvalidDuration { name: &'static str, value: f64 },

    /// A string field is not one of the allowed values.
    #[error("argument `{name}` must be one of {allowed:?}, got `{value}`")]
    NotAllowed {
        name: &'static str,
        value: String,
        allowed: &'static [&'static str],
    },
}

/// The requested command name is not registered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no command named `{name}`")]
pub struct UnknownCommandError {
    pub name: String,
}

/// The requested prompt name is not in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no prompt named `{name}`")]
pub struct UnknownPromptError {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("port closed")]
    struct PortClosed;

    #[test]
    fn should_treat_only_link_fault_as_fatal() {
        assert!(ChotuError::link_fault(PortClosed).is_fatal());
        assert!(!ChotuError::NotReady.is_fatal());
        assert!(
            !ChotuError::from(UnknownCommandError {
                name: "doBackflip".to_string()
            })
            .is_fatal()
        );
    }

    #[test]
    fn should_display_not_ready() {
        assert_eq!(ChotuError::NotReady.to_string(), "device not ready");
    }

    #[test]
    fn should_describe_unknown_command_with_name() {
        let err = ChotuError::from(UnknownCommandError {
            name: "doBackflip".to_string(),
        });
        assert_eq!(
            err.describe(),
            "unknown command: no command named `doBackflip`"
        );
    }

    #[test]
    fn should_describe_link_fault_with_source() {
        let err = ChotuError::link_fault(PortClosed);
        assert_eq!(err.describe(), "board link fault: port closed");
    }

    #[test]
    fn should_display_out_of_range_bounds() {
        let err = InvalidArgumentError::OutOfRange {
            name: "angle",
            value: 200.0,
            min: 0.0,
            max: 180.0,
        };
        assert_eq!(err.to_string(), "argument `angle` = 200 is outside 0..=180");
    }

    #[test]
    fn should_display_wrong_type_with_expected_type() {
        let err = InvalidArgumentError::WrongType {
            name: "state",
            expected: ArgType::Boolean,
        };
        assert_eq!(err.to_string(), "argument `state` must be a boolean");
    }
}
