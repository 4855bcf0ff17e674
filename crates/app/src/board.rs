//! Board lifecycle: link establishment and the one-time Ready transition.
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──handshake ok──▶ Ready ──fault──▶ Error
//!                                 └────────handshake failed──────────────▶ Error
//! ```
//!
//! The actuator set is bound exactly once, on the transition to Ready, and
//! published through a [`OnceLock`]. `Error` is terminal: there is no
//! reconnect.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tokio::sync::watch;

use chotu_domain::error::ChotuError;

use crate::actuators::Actuators;
use crate::ports::{BoardConnector, LinkError, LinkSession};

/// Lifecycle state of the board link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardStatus {
    Disconnected,
    Connecting,
    Ready,
    Error,
}

impl fmt::Display for BoardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Error => "error",
        })
    }
}

struct Shared {
    status: watch::Sender<BoardStatus>,
    actuators: OnceLock<Arc<Actuators>>,
    fault: Mutex<Option<Arc<LinkError>>>,
}

impl Shared {
    fn fail(&self, err: LinkError) {
        tracing::error!(error = %err, "board link fault");
        let mut fault = self.fault.lock().unwrap_or_else(PoisonError::into_inner);
        if fault.is_none() {
            *fault = Some(Arc::new(err));
        }
        drop(fault);
        self.status.send_replace(BoardStatus::Error);
    }

    fn fault_error(&self) -> ChotuError {
        let fault = self
            .fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match fault {
            Some(err) => ChotuError::link_fault(err),
            None => ChotuError::link_fault(LinkError::Closed),
        }
    }
}

/// Owner of the physical link. Exactly one per process.
pub struct BoardConnection<C> {
    connector: Arc<C>,
    shared: Arc<Shared>,
}

impl<C: BoardConnector> BoardConnection<C> {
    /// Create a disconnected board using `connector` to open the link.
    pub fn new(connector: C) -> Self {
        let (status, _) = watch::channel(BoardStatus::Disconnected);
        Self {
            connector: Arc::new(connector),
            shared: Arc::new(Shared {
                status,
                actuators: OnceLock::new(),
                fault: Mutex::new(None),
            }),
        }
    }

    /// The adapter used to open the link.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Begin establishing the link in the background.
    ///
    /// Returns `false` (and does nothing) unless the board is still
    /// [`BoardStatus::Disconnected`]. Must be called within a tokio runtime.
    pub fn connect(&self, address: impl Into<String>) -> bool {
        let started = self.shared.status.send_if_modified(|status| {
            if *status == BoardStatus::Disconnected {
                *status = BoardStatus::Connecting;
                true
            } else {
                false
            }
        });
        if !started {
            tracing::warn!(status = %self.status(), "connect ignored, board already started");
            return false;
        }

        tokio::spawn(establish(
            Arc::clone(&self.connector),
            Arc::clone(&self.shared),
            address.into(),
        ));
        true
    }

    #[must_use]
    pub fn status(&self) -> BoardStatus {
        *self.shared.status.borrow()
    }

    /// A cloneable, read-only view for the dispatch layer.
    #[must_use]
    pub fn handle(&self) -> BoardHandle {
        BoardHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Wait for the one-time Ready transition.
    ///
    /// Never resolves if [`connect`](Self::connect) is never called.
    ///
    /// # Errors
    ///
    /// Returns [`ChotuError::LinkFault`] if the board entered Error instead.
    pub async fn ready(&self) -> Result<Arc<Actuators>, ChotuError> {
        let mut rx = self.shared.status.subscribe();
        let reached = rx
            .wait_for(|s| matches!(s, BoardStatus::Ready | BoardStatus::Error))
            .await
            .map(|s| *s);
        match reached {
            Ok(BoardStatus::Ready) => self
                .shared
                .actuators
                .get()
                .cloned()
                .ok_or(ChotuError::NotReady),
            _ => Err(self.shared.fault_error()),
        }
    }

    /// Wait until the board enters Error and return the fault.
    pub async fn fault(&self) -> ChotuError {
        let mut rx = self.shared.status.subscribe();
        let _ = rx.wait_for(|s| *s == BoardStatus::Error).await;
        self.shared.fault_error()
    }
}

async fn establish<C: BoardConnector>(connector: Arc<C>, shared: Arc<Shared>, address: String) {
    tracing::info!(adapter = connector.name(), %address, "connecting to board");

    let LinkSession { link, faults } = match connector.connect(&address).await {
        Ok(session) => session,
        Err(err) => {
            shared.fail(err);
            return;
        }
    };

    let actuators = match Actuators::bind(&link) {
        Ok(actuators) => Arc::new(actuators),
        Err(err) => {
            shared.fail(err);
            return;
        }
    };
    if shared.actuators.set(actuators).is_err() {
        tracing::warn!("actuators already bound");
        return;
    }
    shared.status.send_replace(BoardStatus::Ready);
    tracing::info!(adapter = connector.name(), %address, "board ready");

    let fault = faults.await.unwrap_or(LinkError::Closed);
    shared.fail(fault);
}

/// Read-only view of the board for the dispatcher.
#[derive(Clone)]
pub struct BoardHandle {
    shared: Arc<Shared>,
}

impl BoardHandle {
    #[must_use]
    pub fn status(&self) -> BoardStatus {
        *self.shared.status.borrow()
    }

    /// The bound actuators, only while the board is Ready.
    #[must_use]
    pub fn actuators(&self) -> Option<Arc<Actuators>> {
        if self.status() != BoardStatus::Ready {
            return None;
        }
        self.shared.actuators.get().cloned()
    }

    /// Subscribe to status transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<BoardStatus> {
        self.shared.status.subscribe()
    }
}

impl fmt::Debug for BoardHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoardHandle")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{LinkOp, RecordingLink, ScriptedConnector};
    use chotu_domain::pin::{self, PinMode};

    #[test]
    fn should_start_disconnected() {
        let board = BoardConnection::new(ScriptedConnector::succeeding(RecordingLink::new()));
        assert_eq!(board.status(), BoardStatus::Disconnected);
        assert!(board.handle().actuators().is_none());
    }

    #[tokio::test]
    async fn should_bind_actuators_on_ready() {
        let link = RecordingLink::new();
        let board = BoardConnection::new(ScriptedConnector::succeeding(link.clone()));

        assert!(board.connect("/dev/test"));
        board.ready().await.unwrap();

        assert_eq!(board.status(), BoardStatus::Ready);
        assert!(board.handle().actuators().is_some());
        assert!(
            link.ops_on(pin::EYES)
                .contains(&LinkOp::Mode(pin::EYES, PinMode::Output))
        );
    }

    #[tokio::test]
    async fn should_reject_second_connect() {
        let board = BoardConnection::new(ScriptedConnector::succeeding(RecordingLink::new()));

        assert!(board.connect("/dev/test"));
        assert!(!board.connect("/dev/test"));
        board.ready().await.unwrap();
        assert!(!board.connect("/dev/test"));
    }

    #[tokio::test]
    async fn should_enter_error_when_handshake_fails() {
        let board = BoardConnection::new(ScriptedConnector::failing());

        board.connect("/dev/test");
        let err = board.ready().await.err().unwrap();

        assert!(err.is_fatal());
        assert_eq!(board.status(), BoardStatus::Error);
        assert!(board.handle().actuators().is_none());
        assert!(board.fault().await.describe().contains("handshake timed out"));
    }

    #[tokio::test]
    async fn should_enter_error_when_link_drops_after_ready() {
        let board = BoardConnection::new(ScriptedConnector::succeeding(RecordingLink::new()));
        board.connect("/dev/test");
        board.ready().await.unwrap();

        board.connector().drop_link();
        let fault = board.fault().await;

        assert!(fault.is_fatal());
        assert_eq!(board.handle().status(), BoardStatus::Error);
        assert!(board.handle().actuators().is_none());
        assert!(board.ready().await.is_err());
    }

    #[tokio::test]
    async fn should_fail_bind_when_link_breaks_during_setup() {
        let link = RecordingLink::new();
        link.break_link();
        let board = BoardConnection::new(ScriptedConnector::succeeding(link));

        board.connect("/dev/test");

        assert!(board.ready().await.is_err());
        assert_eq!(board.status(), BoardStatus::Error);
    }
}
