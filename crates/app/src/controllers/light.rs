//! Light-kind output: buzzer, eyes, fan.
//!
//! `pulse` starts an active pattern (blink or solid buzz), schedules the
//! revert, and completes only once the output is back off. A new pulse or an
//! explicit `set_on`/`set_off` supersedes the outstanding one: its revert
//! task is cancelled and its waiters are carried over (or released).

use std::sync::Arc;

use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use chotu_domain::actuator::{ActuatorId, ActuatorState, LightState};
use chotu_domain::error::{ChotuError, InvalidArgumentError};
use chotu_domain::pin::{Pin, PinMode};
use chotu_domain::timed_action::{self, BLINK_PERIOD, TimedAction, TimedActionKind};

use crate::ports::{BoardLink, LinkError};

/// Pattern played while a pulse lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseKind {
    /// Toggle every [`BLINK_PERIOD`].
    Blink,
    /// Solid on.
    Buzz,
}

impl PulseKind {
    fn action_kind(self) -> TimedActionKind {
        match self {
            Self::Blink => TimedActionKind::Blink,
            Self::Buzz => TimedActionKind::Buzz,
        }
    }

    fn active_state(self) -> LightState {
        match self {
            Self::Blink => LightState::Blinking,
            Self::Buzz => LightState::On,
        }
    }
}

/// Completion of a started pulse.
#[must_use = "a pulse keeps running whether or not it is awaited"]
pub struct PulseDone(oneshot::Receiver<()>);

impl PulseDone {
    /// Wait until the output is back off.
    pub async fn settled(self) {
        // A dropped sender means the pulse was torn down; nothing left to wait for.
        let _ = self.0.await;
    }
}

struct PendingPulse {
    action: TimedAction,
    task: JoinHandle<()>,
    /// Callers waiting for the output to return to idle.
    waiters: Vec<oneshot::Sender<()>>,
}

struct LightInner {
    state: LightState,
    /// Electrical level currently driven on the pin.
    level: bool,
    /// Bumped on every supersession; stale tasks compare and bail out.
    generation: u64,
    pending: Option<PendingPulse>,
}

impl LightInner {
    /// Cancel the outstanding pulse, returning its waiters.
    fn cancel_pending(&mut self) -> Vec<oneshot::Sender<()>> {
        self.generation = self.generation.wrapping_add(1);
        match self.pending.take() {
            Some(pending) => {
                pending.task.abort();
                pending.waiters
            }
            None => Vec::new(),
        }
    }
}

/// Controller for a binary output.
pub struct LightController {
    id: ActuatorId,
    pin: Pin,
    link: Arc<dyn BoardLink>,
    inner: Arc<Mutex<LightInner>>,
}

impl LightController {
    /// Configure the pin as an output and drive it LOW.
    pub(crate) fn bind(
        id: ActuatorId,
        pin: Pin,
        link: Arc<dyn BoardLink>,
    ) -> Result<Self, LinkError> {
        link.set_pin_mode(pin, PinMode::Output)?;
        link.digital_write(pin, false)?;
        Ok(Self {
            id,
            pin,
            link,
            inner: Arc::new(Mutex::new(LightInner {
                state: LightState::Off,
                level: false,
                generation: 0,
                pending: None,
            })),
        })
    }

    #[must_use]
    pub fn id(&self) -> ActuatorId {
        self.id
    }

    /// Turn the output on, cancelling any outstanding pulse.
    ///
    /// # Errors
    ///
    /// Returns [`ChotuError::LinkFault`] if the write fails.
    pub async fn set_on(&self) -> Result<(), ChotuError> {
        self.set_steady(LightState::On).await
    }

    /// Turn the output off, cancelling any outstanding pulse.
    ///
    /// # Errors
    ///
    /// Returns [`ChotuError::LinkFault`] if the write fails.
    pub async fn set_off(&self) -> Result<(), ChotuError> {
        self.set_steady(LightState::Off).await
    }

    async fn set_steady(&self, target: LightState) -> Result<(), ChotuError> {
        let high = matches!(target, LightState::On);
        let mut inner = self.inner.lock().await;
        let waiters = inner.cancel_pending();

        let unchanged = waiters.is_empty() && inner.state == target && inner.level == high;
        if !unchanged {
            self.link.digital_write(self.pin, high)?;
            inner.level = high;
            inner.state = target;
            tracing::debug!(actuator = %self.id, state = ?target, "light set");
        }
        drop(inner);

        for waiter in waiters {
            let _ = waiter.send(());
        }
        Ok(())
    }

    /// Play `kind` for `duration_secs`, then turn off.
    ///
    /// Resolves once the output has returned to off, whether by this pulse's
    /// own revert or by that of a pulse which superseded it.
    ///
    /// # Errors
    ///
    /// Returns [`ChotuError::InvalidArgument`] for a negative or non-finite
    /// duration (nothing is written), or [`ChotuError::LinkFault`] if the
    /// initial write fails.
    pub async fn pulse(&self, kind: PulseKind, duration_secs: f64) -> Result<(), ChotuError> {
        self.start_pulse(kind, duration_secs).await?.settled().await;
        Ok(())
    }

    /// Start a pulse and return as soon as the active pattern is on the pin.
    ///
    /// The returned [`PulseDone`] resolves at the revert, like [`pulse`](Self::pulse).
    ///
    /// # Errors
    ///
    /// Same as [`pulse`](Self::pulse).
    pub async fn start_pulse(
        &self,
        kind: PulseKind,
        duration_secs: f64,
    ) -> Result<PulseDone, ChotuError> {
        let duration = timed_action::duration_from_secs(duration_secs).ok_or(
            InvalidArgumentError::InvalidDuration {
                name: "time",
                value: duration_secs,
            },
        )?;

        let done = {
            let mut inner = self.inner.lock().await;
            let mut waiters = inner.cancel_pending();
            let generation = inner.generation;

            self.link.digital_write(self.pin, true)?;
            inner.level = true;
            inner.state = kind.active_state();

            let (tx, rx) = oneshot::channel();
            waiters.push(tx);

            let action = TimedAction::start(self.id, kind.action_kind(), duration);
            tracing::info!(
                actuator = %self.id,
                kind = ?action.kind,
                duration_ms = action.duration_ms(),
                superseded = waiters.len() > 1,
                "pulse started"
            );

            let task = tokio::spawn(run_pulse(
                Arc::clone(&self.inner),
                Arc::clone(&self.link),
                self.id,
                self.pin,
                kind,
                duration,
                generation,
            ));
            inner.pending = Some(PendingPulse {
                action,
                task,
                waiters,
            });
            rx
        };
        Ok(PulseDone(done))
    }

    /// Snapshot of the commanded state.
    pub async fn state(&self) -> ActuatorState {
        ActuatorState::Light {
            state: self.inner.lock().await.state,
        }
    }

    /// The outstanding pulse, if any.
    pub async fn pending(&self) -> Option<TimedAction> {
        self.inner
            .lock()
            .await
            .pending
            .as_ref()
            .map(|p| p.action.clone())
    }
}

async fn run_pulse(
    inner: Arc<Mutex<LightInner>>,
    link: Arc<dyn BoardLink>,
    id: ActuatorId,
    pin: Pin,
    kind: PulseKind,
    duration: std::time::Duration,
    generation: u64,
) {
    let revert = tokio::time::sleep(duration);
    tokio::pin!(revert);

    if kind == PulseKind::Blink {
        let mut ticker = tokio::time::interval_at(Instant::now() + BLINK_PERIOD, BLINK_PERIOD);
        loop {
            tokio::select! {
                biased;
                () = &mut revert => break,
                _ = ticker.tick() => {
                    let mut guard = inner.lock().await;
                    if guard.generation != generation {
                        return;
                    }
                    let next = !guard.level;
                    match link.digital_write(pin, next) {
                        Ok(()) => guard.level = next,
                        Err(err) => tracing::warn!(actuator = %id, error = %err, "blink toggle failed"),
                    }
                }
            }
        }
    } else {
        revert.await;
    }

    let mut guard = inner.lock().await;
    if guard.generation != generation {
        return;
    }
    if let Err(err) = link.digital_write(pin, false) {
        tracing::error!(actuator = %id, error = %err, "pulse revert failed");
    }
    guard.level = false;
    guard.state = LightState::Off;
    let waiters = guard.pending.take().map(|p| p.waiters).unwrap_or_default();
    drop(guard);

    tracing::info!(actuator = %id, "pulse reverted");
    for waiter in waiters {
        let _ = waiter.send(());
    }
}
