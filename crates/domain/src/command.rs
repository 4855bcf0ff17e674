//! Command shapes: argument declarations, validation, and the response
//! envelope.
//!
//! Commands arrive as `(name, raw JSON arguments)`. The shape validates the
//! raw value into typed [`Arguments`] before anything touches hardware.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::InvalidArgumentError;

/// Semantic type of a declared argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    Number,
    Boolean,
    String,
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number => f.write_str("number"),
            Self::Boolean => f.write_str("boolean"),
            Self::String => f.write_str("string"),
        }
    }
}

/// One declared argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgDecl {
    pub name: &'static str,
    pub ty: ArgType,
    pub description: &'static str,
    /// For string arguments restricted to an enumeration.
    pub allowed: Option<&'static [&'static str]>,
}

/// The declared argument list of a command or prompt.
///
/// Every declared argument is required. Undeclared fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentShape {
    args: Vec<ArgDecl>,
}

impl ArgumentShape {
    /// A shape that takes no arguments.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Declare a numeric argument.
    #[must_use]
    pub fn number(self, name: &'static str, description: &'static str) -> Self {
        self.with(name, ArgType::Number, description, None)
    }

    /// Declare a boolean argument.
    #[must_use]
    pub fn boolean(self, name: &'static str, description: &'static str) -> Self {
        self.with(name, ArgType::Boolean, description, None)
    }

    /// Declare a free string argument.
    #[must_use]
    pub fn string(self, name: &'static str, description: &'static str) -> Self {
        self.with(name, ArgType::String, description, None)
    }

    /// Declare a string argument restricted to `allowed`.
    #[must_use]
    pub fn one_of(
        self,
        name: &'static str,
        description: &'static str,
        allowed: &'static [&'static str],
    ) -> Self {
        self.with(name, ArgType::String, description, Some(allowed))
    }

    fn with(
        mut self,
        name: &'static str,
        ty: ArgType,
        description: &'static str,
        allowed: Option<&'static [&'static str]>,
    ) -> Self {
        self.args.push(ArgDecl {
            name,
            ty,
            description,
            allowed,
        });
        self
    }

    /// Declared arguments, in declaration order.
    #[must_use]
    pub fn args(&self) -> &[ArgDecl] {
        &self.args
    }

    /// Validate raw JSON arguments against this shape.
    ///
    /// `null` is accepted as "no arguments".
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgumentError`] if `raw` is not an object, a
    /// declared field is missing, or a field has the wrong type.
    pub fn validate(&self, raw: &Value) -> Result<Arguments, InvalidArgumentError> {
        let empty = serde_json::Map::new();
        let fields = match raw {
            Value::Null => &empty,
            Value::Object(map) => map,
            _ => return Err(InvalidArgumentError::NotAnObject),
        };

        let mut values = BTreeMap::new();
        for arg in &self.args {
            let raw_value = fields
                .get(arg.name)
                .ok_or(InvalidArgumentError::Missing { name: arg.name })?;
            values.insert(arg.name, Self::coerce(arg, raw_value)?);
        }
        Ok(Arguments { values })
    }

    fn coerce(arg: &ArgDecl, raw: &Value) -> Result<ArgValue, InvalidArgumentError> {
        let wrong_type = || InvalidArgumentError::WrongType {
            name: arg.name,
            expected: arg.ty,
        };
        match arg.ty {
            ArgType::Number => raw.as_f64().map(ArgValue::Number).ok_or_else(wrong_type),
            ArgType::Boolean => raw.as_bool().map(ArgValue::Boolean).ok_or_else(wrong_type),
            ArgType::String => {
                let s = raw.as_str().ok_or_else(wrong_type)?;
                if let Some(allowed) = arg.allowed {
                    if !allowed.contains(&s) {
                        return Err(InvalidArgumentError::NotAllowed {
                            name: arg.name,
                            value: s.to_string(),
                            allowed,
                        });
                    }
                }
                Ok(ArgValue::String(s.to_string()))
            }
        }
    }

    /// JSON-Schema object describing this shape.
    #[must_use]
    pub fn json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        for arg in &self.args {
            let mut prop = serde_json::json!({
                "type": arg.ty,
                "description": arg.description,
            });
            if let Some(allowed) = arg.allowed {
                prop["enum"] = serde_json::json!(allowed);
            }
            properties.insert(arg.name.to_string(), prop);
        }
        let required: Vec<&str> = self.args.iter().map(|a| a.name).collect();
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// A validated argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Number(f64),
    Boolean(bool),
    String(String),
}

/// Validated arguments, keyed by declared name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: BTreeMap<&'static str, ArgValue>,
}

impl Arguments {
    /// Numeric argument `name`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgumentError`] if the argument is absent or not a
    /// number.
    pub fn number(&self, name: &'static str) -> Result<f64, InvalidArgumentError> {
        match self.values.get(name) {
            Some(ArgValue::Number(n)) => Ok(*n),
            Some(_) => Err(InvalidArgumentError::WrongType {
                name,
                expected: ArgType::Number,
            }),
            None => Err(InvalidArgumentError::Missing { name }),
        }
    }

    /// Boolean argument `name`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgumentError`] if the argument is absent or not a
    /// boolean.
    pub fn boolean(&self, name: &'static str) -> Result<bool, InvalidArgumentError> {
        match self.values.get(name) {
            Some(ArgValue::Boolean(b)) => Ok(*b),
            Some(_) => Err(InvalidArgumentError::WrongType {
                name,
                expected: ArgType::Boolean,
            }),
            None => Err(InvalidArgumentError::Missing { name }),
        }
    }

    /// String argument `name`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgumentError`] if the argument is absent or not a
    /// string.
    pub fn string(&self, name: &'static str) -> Result<&str, InvalidArgumentError> {
        match self.values.get(name) {
            Some(ArgValue::String(s)) => Ok(s),
            Some(_) => Err(InvalidArgumentError::WrongType {
                name,
                expected: ArgType::String,
            }),
            None => Err(InvalidArgumentError::Missing { name }),
        }
    }
}

/// Reject `value` unless it is finite and within `min..=max`.
///
/// # Errors
///
/// Returns [`InvalidArgumentError::NotFinite`] or
/// [`InvalidArgumentError::OutOfRange`].
pub fn require_range(
    name: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<f64, InvalidArgumentError> {
    if !value.is_finite() {
        return Err(InvalidArgumentError::NotFinite { name });
    }
    if value < min || value > max {
        return Err(InvalidArgumentError::OutOfRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

/// The uniform success envelope: one human-readable line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub text: String,
}

impl CommandResult {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
