//! Command registry and the invocation gateway.
//!
//! `invoke` checks, in order: the name resolves, the arguments match the
//! registered shape, the board is Ready. Only then does the handler run, so
//! rejected invocations never reach the hardware.
//!
//! ## Ordering
//!
//! Commands bound to the same actuator take a [`Turn`] from
//! [`CommandDispatcher::admit`] in arrival order. A handler runs its apply
//! phase only after the previous holder's apply phase has finished. Waiting
//! for a pulse to settle happens after the turn is handed on, so a later
//! pulse can still supersede an earlier one.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::oneshot;

use chotu_domain::actuator::ActuatorId;
use chotu_domain::command::{ArgumentShape, Arguments, CommandResult};
use chotu_domain::error::{ChotuError, UnknownCommandError};

use crate::actuators::Actuators;
use crate::board::BoardHandle;
use crate::controllers::light::PulseKind;

/// Result of a handler's apply phase.
pub enum Outcome {
    /// The command is finished.
    Complete(CommandResult),
    /// The command is applied; the reply waits for the actuator to settle.
    Settling(Pin<Box<dyn Future<Output = CommandResult> + Send>>),
}

impl Outcome {
    pub fn settling(fut: impl Future<Output = CommandResult> + Send + 'static) -> Self {
        Self::Settling(Box::pin(fut))
    }

    async fn finish(self) -> CommandResult {
        match self {
            Self::Complete(result) => result,
            Self::Settling(fut) => fut.await,
        }
    }
}

impl From<CommandResult> for Outcome {
    fn from(result: CommandResult) -> Self {
        Self::Complete(result)
    }
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Outcome, ChotuError>> + Send>>;
pub type Handler = Arc<dyn Fn(Arc<Actuators>, Arguments) -> HandlerFuture + Send + Sync>;

/// A registered command.
#[derive(Clone)]
pub struct CommandDefinition {
    pub name: &'static str,
    pub description: &'static str,
    /// Actuator the command drives; commands on the same one apply in order.
    pub actuator: Option<ActuatorId>,
    pub shape: ArgumentShape,
    handler: Handler,
}

impl fmt::Debug for CommandDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDefinition")
            .field("name", &self.name)
            .field("actuator", &self.actuator)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

/// Named commands plus their aliases.
#[derive(Default)]
pub struct CommandRegistry {
    commands: Vec<CommandDefinition>,
    aliases: HashMap<&'static str, &'static str>,
}

impl CommandRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`. A later registration with the same
    /// name replaces the earlier one.
    pub fn register<F, Fut>(
        &mut self,
        name: &'static str,
        actuator: Option<ActuatorId>,
        description: &'static str,
        shape: ArgumentShape,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(Arc<Actuators>, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome, ChotuError>> + Send + 'static,
    {
        let handler: Handler =
            Arc::new(move |actuators, args| -> HandlerFuture { Box::pin(handler(actuators, args)) });
        self.commands.retain(|c| c.name != name);
        self.commands.push(CommandDefinition {
            name,
            description,
            actuator,
            shape,
            handler,
        });
        self
    }

    /// Accept `alias` as another name for the registered `target`.
    pub fn alias(&mut self, alias: &'static str, target: &'static str) -> &mut Self {
        self.aliases.insert(alias, target);
        self
    }

    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&CommandDefinition> {
        let name = self.aliases.get(name).copied().unwrap_or(name);
        self.commands.iter().find(|c| c.name == name)
    }

    /// Every registered command, in registration order. Aliases are not listed.
    #[must_use]
    pub fn commands(&self) -> &[CommandDefinition] {
        &self.commands
    }

    /// The robot's fixed command surface.
    #[must_use]
    pub fn chotu() -> Self {
        let mut registry = Self::new();
        registry
            .register(
                "blinkEyes",
                Some(ActuatorId::Eyes),
                "Blink Chotu's eyes for a number of seconds",
                ArgumentShape::none().number("time", "Blink duration in seconds"),
                blink_eyes,
            )
            .register(
                "buzzSound",
                Some(ActuatorId::Buzzer),
                "Sound Chotu's buzzer for a number of seconds",
                ArgumentShape::none().number("time", "Buzz duration in seconds"),
                buzz_sound,
            )
            .register(
                "runMotor",
                Some(ActuatorId::Motor),
                "Run the motor at a speed (-255 to 255), stopping after 5 seconds",
                ArgumentShape::none().number("speed", "PWM speed, sign selects direction"),
                run_motor,
            )
            .register(
                "moveServo",
                Some(ActuatorId::Servo),
                "Move the servo to an angle (0 to 180 degrees)",
                ArgumentShape::none().number("angle", "Target angle in degrees"),
                move_servo,
            )
            .register(
                "controlFan",
                Some(ActuatorId::Fan),
                "Turn the fan on or off",
                ArgumentShape::none().boolean("state", "true for on, false for off"),
                control_fan,
            )
            .register(
                "toggleRelay",
                Some(ActuatorId::Relay),
                "Switch the relay on or off",
                ArgumentShape::none().boolean("state", "true for on, false for off"),
                toggle_relay,
            )
            .register(
                "readTemperature",
                None,
                "Read the temperature sensor",
                ArgumentShape::none(),
                read_temperature,
            )
            .register(
                "readDistance",
                None,
                "Read the distance sensor",
                ArgumentShape::none(),
                read_distance,
            )
            .alias("chotuBlinkEyes", "blinkEyes")
            .alias("chotuBuzzSound", "buzzSound");
        registry
    }
}

async fn blink_eyes(actuators: Arc<Actuators>, args: Arguments) -> Result<Outcome, ChotuError> {
    let time = args.number("time")?;
    let done = actuators.eyes.start_pulse(PulseKind::Blink, time).await?;
    Ok(Outcome::settling(async move {
        done.settled().await;
        CommandResult::new(format!("I am blinking the eyes of Chotu for {time} ms"))
    }))
}

async fn buzz_sound(actuators: Arc<Actuators>, args: Arguments) -> Result<Outcome, ChotuError> {
    let time = args.number("time")?;
    let done = actuators.buzzer.start_pulse(PulseKind::Buzz, time).await?;
    Ok(Outcome::settling(async move {
        done.settled().await;
        CommandResult::new(format!("I am buzzing Chotu for {time} ms"))
    }))
}

async fn run_motor(actuators: Arc<Actuators>, args: Arguments) -> Result<Outcome, ChotuError> {
    let speed = args.number("speed")?;
    actuators.motor.run(speed).await?;
    Ok(CommandResult::new(format!("Motor running at speed {speed}.")).into())
}

async fn move_servo(actuators: Arc<Actuators>, args: Arguments) -> Result<Outcome, ChotuError> {
    let angle = args.number("angle")?;
    actuators.servo.move_to(angle).await?;
    Ok(CommandResult::new(format!("Servo moved to {angle} degrees.")).into())
}

async fn control_fan(actuators: Arc<Actuators>, args: Arguments) -> Result<Outcome, ChotuError> {
    let text = if args.boolean("state")? {
        actuators.fan.set_on().await?;
        "Fan turned on."
    } else {
        actuators.fan.set_off().await?;
        "Fan turned off."
    };
    Ok(CommandResult::new(text).into())
}

async fn toggle_relay(actuators: Arc<Actuators>, args: Arguments) -> Result<Outcome, ChotuError> {
    let open = args.boolean("state")?;
    actuators.relay.set_state(open).await?;
    let text = if open {
        "Relay switched ON."
    } else {
        "Relay switched OFF."
    };
    Ok(CommandResult::new(text).into())
}

async fn read_temperature(
    actuators: Arc<Actuators>,
    _args: Arguments,
) -> Result<Outcome, ChotuError> {
    let value = actuators.temperature.read_value();
    Ok(CommandResult::new(format!("Current temperature: {value}°C.")).into())
}

async fn read_distance(
    actuators: Arc<Actuators>,
    _args: Arguments,
) -> Result<Outcome, ChotuError> {
    let value = actuators.distance.read_value();
    Ok(CommandResult::new(format!("Detected object at {value} cm.")).into())
}

/// A place in an actuator's queue, claimed when the command arrives.
///
/// Dropping an unused turn still keeps the queue ordered: the next holder
/// waits for this one's predecessor.
#[must_use]
pub struct Turn {
    prev: Option<oneshot::Receiver<()>>,
    done: Option<oneshot::Sender<()>>,
}

impl Turn {
    /// A turn that waits for nothing, for commands without an actuator.
    pub fn unordered() -> Self {
        Self {
            prev: None,
            done: None,
        }
    }

    async fn wait(&mut self) {
        if let Some(prev) = self.prev.take() {
            // Err means the predecessor finished without signalling.
            let _ = prev.await;
        }
    }

    fn release(&mut self) {
        self.done.take();
    }
}

impl Drop for Turn {
    fn drop(&mut self) {
        if let (Some(prev), Some(done)) = (self.prev.take(), self.done.take()) {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(async move {
                    let _ = prev.await;
                    drop(done);
                });
            }
        }
    }
}

impl fmt::Debug for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Turn")
            .field("ordered", &self.done.is_some())
            .finish()
    }
}

/// Entry point for the transport: `(name, raw arguments) → CommandResult`.
pub struct CommandDispatcher {
    registry: CommandRegistry,
    board: BoardHandle,
    /// Release signal of the last turn handed out per actuator.
    lanes: Mutex<HashMap<ActuatorId, oneshot::Receiver<()>>>,
}

impl CommandDispatcher {
    #[must_use]
    pub fn new(registry: CommandRegistry, board: BoardHandle) -> Self {
        Self {
            registry,
            board,
            lanes: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Claim the next turn on the actuator behind `name`.
    ///
    /// Call this in arrival order; the apply phases of the resulting
    /// invocations run in the same order.
    pub fn admit(&self, name: &str) -> Turn {
        let Some(actuator) = self.registry.resolve(name).and_then(|c| c.actuator) else {
            return Turn::unordered();
        };
        let (done, next) = oneshot::channel();
        let prev = self
            .lanes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(actuator, next);
        Turn {
            prev,
            done: Some(done),
        }
    }

    /// Invoke command `name` with raw JSON arguments.
    ///
    /// # Errors
    ///
    /// See [`invoke_in_turn`](Self::invoke_in_turn).
    pub async fn invoke(&self, name: &str, raw: &Value) -> Result<CommandResult, ChotuError> {
        let turn = self.admit(name);
        self.invoke_in_turn(turn, name, raw).await
    }

    /// Invoke command `name` once `turn` comes up.
    ///
    /// # Errors
    ///
    /// - [`ChotuError::UnknownCommand`] for an unregistered name
    /// - [`ChotuError::InvalidArgument`] when `raw` does not match the shape
    ///   or a value is outside the actuator's range
    /// - [`ChotuError::NotReady`] when the board is not Ready
    /// - [`ChotuError::LinkFault`] when a pin write fails
    pub async fn invoke_in_turn(
        &self,
        mut turn: Turn,
        name: &str,
        raw: &Value,
    ) -> Result<CommandResult, ChotuError> {
        let command = self
            .registry
            .resolve(name)
            .ok_or_else(|| UnknownCommandError {
                name: name.to_string(),
            })?;
        let args = command.shape.validate(raw)?;
        let actuators = self.board.actuators().ok_or(ChotuError::NotReady)?;

        turn.wait().await;
        tracing::debug!(command = command.name, "invoking command");
        let applied = (command.handler)(actuators, args).await;
        turn.release();

        let result = match applied {
            Ok(outcome) => Ok(outcome.finish().await),
            Err(err) => Err(err),
        };
        match &result {
            Ok(output) => tracing::info!(command = command.name, result = %output, "command done"),
            Err(err) => {
                tracing::warn!(command = command.name, error = %err.describe(), "command failed");
            }
        }
        result
    }
}
