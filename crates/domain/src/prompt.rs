//! Prompt catalog: canned narrative texts describing robot actions.
//!
//! Pure template rendering: no state, no hardware.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::{ArgumentShape, Arguments};
use crate::error::{ChotuError, UnknownPromptError};

const DIRECTIONS: &[&str] = &["left", "right"];

/// Speaker of a rendered prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

/// A rendered prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub text: String,
}

/// A prompt known to the catalog.
#[derive(Debug, Clone)]
pub struct PromptDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub shape: ArgumentShape,
    render: fn(&Arguments) -> Result<String, ChotuError>,
}

/// The fixed set of narrative prompts.
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    prompts: Vec<PromptDefinition>,
}

impl Default for PromptCatalog {
    fn default() -> Self {
        let prompts = vec![
            PromptDefinition {
                name: "move-chotu",
                description: "Move Chotu a number of steps",
                shape: ArgumentShape::none().string("steps", "How many steps to move"),
                render: |args| {
                    Ok(format!(
                        "I will move Chotu this many steps:\n\n{}",
                        args.string("steps")?
                    ))
                },
            },
            PromptDefinition {
                name: "start-chotu",
                description: "Start Chotu",
                shape: ArgumentShape::none(),
                render: |_| Ok("Initializing Chotu and getting ready to operate.".to_string()),
            },
            PromptDefinition {
                name: "stop-chotu",
                description: "Stop Chotu",
                shape: ArgumentShape::none(),
                render: |_| Ok("Stopping Chotu safely and shutting down operations.".to_string()),
            },
            PromptDefinition {
                name: "turn-chotu",
                description: "Turn Chotu left or right",
                shape: ArgumentShape::none().one_of("direction", "Direction to turn", DIRECTIONS),
                render: |args| Ok(format!("Turning Chotu to the {}.", args.string("direction")?)),
            },
            PromptDefinition {
                name: "set-chotu-speed",
                description: "Set Chotu's speed",
                shape: ArgumentShape::none().string("speed", "Desired speed"),
                render: |args| Ok(format!("Setting Chotu's speed to {}.", args.string("speed")?)),
            },
        ];
        Self { prompts }
    }
}

impl PromptCatalog {
    /// Every prompt, in registration order.
    #[must_use]
    pub fn prompts(&self) -> &[PromptDefinition] {
        &self.prompts
    }

    /// Render prompt `name` with raw JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ChotuError::UnknownPrompt`] for an unregistered name and
    /// [`ChotuError::InvalidArgument`] when `raw` does not match the shape.
    pub fn render(&self, name: &str, raw: &Value) -> Result<PromptMessage, ChotuError> {
        let prompt = self
            .prompts
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| UnknownPromptError {
                name: name.to_string(),
            })?;
        let args = prompt.shape.validate(raw)?;
        Ok(PromptMessage {
            role: Role::User,
            text: (prompt.render)(&args)?,
        })
    }
}
