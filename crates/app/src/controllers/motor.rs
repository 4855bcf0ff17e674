//! Variable-speed motor on a PWM + direction pin pair.
//!
//! ## Safety contract
//!
//! A `run` on a stopped motor schedules a stop after [`MOTOR_SAFETY_CEILING`],
//! whatever the requested speed. A `run` issued while that stop is
//! outstanding changes speed and direction but keeps the earlier deadline, so
//! no command keeps the motor running past the ceiling of the run that
//! started it. Only a `run` after the stop opens a new window.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use chotu_domain::actuator::{ActuatorId, ActuatorState, MotorDirection};
use chotu_domain::command::require_range;
use chotu_domain::error::ChotuError;
use chotu_domain::pin::{Pin, PinMode};
use chotu_domain::timed_action::{MOTOR_SAFETY_CEILING, TimedAction, TimedActionKind};

use crate::ports::{BoardLink, LinkError};

/// Largest accepted speed magnitude (full PWM duty).
pub const MAX_SPEED: f64 = 255.0;

struct PendingStop {
    action: TimedAction,
    task: JoinHandle<()>,
}

struct MotorInner {
    duty: u8,
    direction: MotorDirection,
    generation: u64,
    pending: Option<PendingStop>,
}

impl MotorInner {
    fn cancel_pending(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(pending) = self.pending.take() {
            pending.task.abort();
        }
    }
}

/// Controller for the drive motor.
pub struct MotorController {
    pwm: Pin,
    dir: Pin,
    link: Arc<dyn BoardLink>,
    inner: Arc<Mutex<MotorInner>>,
}

impl MotorController {
    /// Configure PWM and direction pins and hold the motor stopped.
    pub(crate) fn bind(pwm: Pin, dir: Pin, link: Arc<dyn BoardLink>) -> Result<Self, LinkError> {
        link.set_pin_mode(pwm, PinMode::Pwm)?;
        link.set_pin_mode(dir, PinMode::Output)?;
        link.analog_write(pwm, 0)?;
        link.digital_write(dir, false)?;
        Ok(Self {
            pwm,
            dir,
            link,
            inner: Arc::new(Mutex::new(MotorInner {
                duty: 0,
                direction: MotorDirection::Forward,
                generation: 0,
                pending: None,
            })),
        })
    }

    /// Command `speed` immediately and make sure a safety stop is scheduled.
    ///
    /// The sign selects the direction, the rounded magnitude the PWM duty.
    /// A zero speed stops the motor at once. An outstanding safety stop is
    /// kept as is. Returns without waiting for the stop.
    ///
    /// # Errors
    ///
    /// Returns [`ChotuError::InvalidArgument`] when `speed` is non-finite or
    /// outside ±[`MAX_SPEED`] (nothing is written), or
    /// [`ChotuError::LinkFault`] if a write fails.
    pub async fn run(&self, speed: f64) -> Result<(), ChotuError> {
        let speed = require_range("speed", speed, -MAX_SPEED, MAX_SPEED)?;
        let duty = duty_for(speed);
        let direction = if speed < 0.0 {
            MotorDirection::Reverse
        } else {
            MotorDirection::Forward
        };

        let mut inner = self.inner.lock().await;

        if duty == 0 {
            inner.cancel_pending();
            self.write_stop(&mut inner)?;
            tracing::info!(actuator = %ActuatorId::Motor, "motor stopped");
            return Ok(());
        }

        self.link
            .digital_write(self.dir, matches!(direction, MotorDirection::Reverse))?;
        self.link.analog_write(self.pwm, u16::from(duty))?;
        inner.duty = duty;
        inner.direction = direction;

        if let Some(pending) = &inner.pending {
            tracing::info!(
                actuator = %ActuatorId::Motor,
                duty,
                direction = ?direction,
                started_at = %pending.action.started_at,
                "motor speed changed, safety stop kept"
            );
            return Ok(());
        }

        let generation = inner.generation;
        let action = TimedAction::start(
            ActuatorId::Motor,
            TimedActionKind::MotorRun,
            MOTOR_SAFETY_CEILING,
        );
        let task = tokio::spawn(safety_stop(
            Arc::clone(&self.inner),
            Arc::clone(&self.link),
            self.pwm,
            generation,
        ));
        inner.pending = Some(PendingStop { action, task });

        tracing::info!(
            actuator = %ActuatorId::Motor,
            duty,
            direction = ?direction,
            ceiling_ms = MOTOR_SAFETY_CEILING.as_millis(),
            "motor started"
        );
        Ok(())
    }

    /// Stop the motor now, cancelling the outstanding safety stop.
    ///
    /// # Errors
    ///
    /// Returns [`ChotuError::LinkFault`] if the write fails.
    pub async fn stop(&self) -> Result<(), ChotuError> {
        let mut inner = self.inner.lock().await;
        inner.cancel_pending();
        self.write_stop(&mut inner)?;
        Ok(())
    }

    fn write_stop(&self, inner: &mut MotorInner) -> Result<(), LinkError> {
        self.link.analog_write(self.pwm, 0)?;
        inner.duty = 0;
        Ok(())
    }

    /// Snapshot of the commanded state.
    pub async fn state(&self) -> ActuatorState {
        let inner = self.inner.lock().await;
        ActuatorState::Motor {
            duty: inner.duty,
            direction: inner.direction,
        }
    }

    /// The outstanding run, if any.
    pub async fn pending(&self) -> Option<TimedAction> {
        self.inner
            .lock()
            .await
            .pending
            .as_ref()
            .map(|p| p.action.clone())
    }
}

/// Rounded PWM duty for a validated speed.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn duty_for(speed: f64) -> u8 {
    speed.abs().round().min(MAX_SPEED) as u8
}

async fn safety_stop(
    inner: Arc<Mutex<MotorInner>>,
    link: Arc<dyn BoardLink>,
    pwm: Pin,
    generation: u64,
) {
    tokio::time::sleep(MOTOR_SAFETY_CEILING).await;

    let mut guard = inner.lock().await;
    if guard.generation != generation {
        return;
    }
    match link.analog_write(pwm, 0) {
        Ok(()) => tracing::info!(actuator = %ActuatorId::Motor, "motor safety stop"),
        Err(err) => {
            tracing::error!(actuator = %ActuatorId::Motor, error = %err, "motor safety stop failed");
        }
    }
    guard.duty = 0;
    guard.pending = None;
}
