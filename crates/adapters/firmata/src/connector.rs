//! Serial connector and the reader/writer tasks behind a [`FirmataLink`].

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio_serial::SerialPortBuilderExt;

use chotu_app::ports::{BoardConnector, BoardLink, LinkError, LinkSession};

use crate::codec::{self, Decoder, Message};
use crate::error::FirmataError;
use crate::link::{FirmataLink, Samples};

pub const DEFAULT_BAUD_RATE: u32 = 57_600;
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between version queries while waiting for the board to boot.
const VERSION_QUERY_INTERVAL: Duration = Duration::from_secs(1);

/// Serial parameters for [`FirmataConnector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmataConfig {
    pub baud_rate: u32,
    pub handshake_timeout: Duration,
}

impl Default for FirmataConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

/// Opens a Firmata link on a serial port.
#[derive(Debug, Default)]
pub struct FirmataConnector {
    config: FirmataConfig,
}

impl FirmataConnector {
    #[must_use]
    pub fn new(config: FirmataConfig) -> Self {
        Self { config }
    }
}

impl BoardConnector for FirmataConnector {
    fn name(&self) -> &'static str {
        "firmata"
    }

    async fn connect(&self, address: &str) -> Result<LinkSession, LinkError> {
        let port = tokio_serial::new(address, self.config.baud_rate)
            .open_native_async()
            .map_err(|source| FirmataError::Open {
                address: address.to_string(),
                source,
            })?;
        tracing::debug!(address, baud_rate = self.config.baud_rate, "serial port open");
        attach(port, self.config.handshake_timeout).await
    }
}

/// Fault sender shared by the reader and writer; the first fault wins.
#[derive(Clone)]
struct FaultSlot(Arc<Mutex<Option<oneshot::Sender<LinkError>>>>);

impl FaultSlot {
    fn new() -> (Self, oneshot::Receiver<LinkError>) {
        let (tx, rx) = oneshot::channel();
        (Self(Arc::new(Mutex::new(Some(tx)))), rx)
    }

    fn raise(&self, err: LinkError) {
        let tx = self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(tx) = tx {
            let _ = tx.send(err);
        }
    }
}

/// Run the Firmata handshake over an open byte stream and start the I/O tasks.
///
/// Resolves once the board has answered a version query.
///
/// # Errors
///
/// Returns [`LinkError::HandshakeTimeout`] if no version report arrives within
/// `handshake_timeout`, or [`LinkError::Closed`] if the stream ends first.
pub async fn attach<S>(stream: S, handshake_timeout: Duration) -> Result<LinkSession, LinkError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let (faults, fault_rx) = FaultSlot::new();
    let samples = Samples::default();
    let (version_tx, mut version_rx) = oneshot::channel();
    let (tx, rx) = mpsc::unbounded_channel();

    let reader_task = tokio::spawn(read_loop(
        reader,
        Arc::clone(&samples),
        version_tx,
        faults.clone(),
    ));
    let writer_task = tokio::spawn(write_loop(writer, rx, faults));

    let link = FirmataLink::new(tx, samples);
    let handshake = async {
        let mut ticker = tokio::time::interval(VERSION_QUERY_INTERVAL);
        loop {
            tokio::select! {
                version = &mut version_rx => return version.map_err(|_| LinkError::Closed),
                _ = ticker.tick() => link.send(codec::query_version())?,
            }
        }
    };
    let version = tokio::time::timeout(handshake_timeout, handshake)
        .await
        .map_err(|_| LinkError::HandshakeTimeout {
            secs: handshake_timeout.as_secs(),
        })
        .and_then(|version| version);
    let (major, minor) = match version {
        Ok(version) => version,
        Err(err) => {
            // Both halves must go so the port is released.
            reader_task.abort();
            writer_task.abort();
            tracing::warn!(error = %err, "firmata handshake failed");
            return Err(err);
        }
    };
    tracing::info!(major, minor, "firmata handshake complete");
    link.send(codec::query_firmware())?;

    let link: Arc<dyn BoardLink> = Arc::new(link);
    Ok(LinkSession {
        link,
        faults: fault_rx,
    })
}

async fn read_loop<R>(
    mut reader: R,
    samples: Samples,
    version_tx: oneshot::Sender<(u8, u8)>,
    faults: FaultSlot,
) where
    R: AsyncRead + Unpin,
{
    let mut decoder = Decoder::new();
    let mut version_tx = Some(version_tx);
    let mut buf = [0u8; 256];

    let err = loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break FirmataError::Eof,
            Ok(n) => n,
            Err(err) => break FirmataError::Io(err),
        };
        for message in decoder.decode(&buf[..n]) {
            match message {
                Message::ProtocolVersion { major, minor } => {
                    if let Some(tx) = version_tx.take() {
                        let _ = tx.send((major, minor));
                    }
                }
                Message::Firmware { major, minor, name } => {
                    tracing::info!(%name, major, minor, "board firmware");
                }
                Message::AnalogValue { channel, value } => {
                    samples
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(channel, value);
                }
                Message::DigitalPort { port, mask } => {
                    tracing::trace!(port, mask, "digital port report");
                }
            }
        }
    };
    tracing::warn!(error = %err, "firmata reader stopped");
    faults.raise(err.into());
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Vec<u8>>, faults: FaultSlot)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        if let Err(err) = writer.write_all(&frame).await {
            tracing::warn!(error = %err, "firmata writer stopped");
            faults.raise(FirmataError::Io(err).into());
            return;
        }
        if let Err(err) = writer.flush().await {
            faults.raise(FirmataError::Io(err).into());
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::DuplexStream;

    use chotu_domain::pin::{Pin, PinMode};

    use super::*;

    async fn read_frame(board: &mut DuplexStream, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        board.read_exact(&mut buf).await.unwrap();
        buf
    }

    async fn handshake(board: &mut DuplexStream) {
        assert_eq!(read_frame(board, 1).await, [codec::REPORT_VERSION]);
        board.write_all(&[0xF9, 2, 5]).await.unwrap();
    }

    #[tokio::test]
    async fn should_complete_handshake_on_version_report() {
        let (host, mut board) = tokio::io::duplex(1024);
        let board_task = tokio::spawn(async move {
            handshake(&mut board).await;
            assert_eq!(read_frame(&mut board, 3).await, codec::query_firmware());
            board
        });

        let session = attach(host, Duration::from_secs(5)).await.unwrap();
        let mut board = board_task.await.unwrap();

        session
            .link
            .set_pin_mode(Pin::Digital(10), PinMode::Output)
            .unwrap();
        assert_eq!(read_frame(&mut board, 3).await, [0xF4, 10, 1]);
    }

    #[tokio::test]
    async fn should_store_reported_analog_samples() {
        let (host, mut board) = tokio::io::duplex(1024);
        let board_task = tokio::spawn(async move {
            handshake(&mut board).await;
            board.write_all(&[0xE1, 0x78, 0x00]).await.unwrap();
            board
        });

        let session = attach(host, Duration::from_secs(5)).await.unwrap();
        let _board = board_task.await.unwrap();

        let mut value = None;
        for _ in 0..100 {
            value = session.link.analog_value(Pin::Analog(1));
            if value.is_some() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(value, Some(120));
    }

    #[tokio::test(start_paused = true)]
    async fn should_time_out_when_board_stays_silent() {
        let (host, _board) = tokio::io::duplex(1024);

        let err = attach(host, Duration::from_secs(3)).await.err().unwrap();

        assert!(matches!(err, LinkError::HandshakeTimeout { secs: 3 }));
    }

    #[tokio::test(start_paused = true)]
    async fn should_release_stream_after_handshake_timeout() {
        let (host, mut board) = tokio::io::duplex(1024);

        let err = attach(host, Duration::from_secs(3)).await.err().unwrap();
        assert!(matches!(err, LinkError::HandshakeTimeout { .. }));

        let mut queries = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(1), board.read_to_end(&mut queries))
            .await
            .expect("host side should be closed");
        read.unwrap();
        assert!(!queries.is_empty());
        assert!(queries.iter().all(|b| *b == codec::REPORT_VERSION));
    }

    #[tokio::test]
    async fn should_raise_fault_when_board_goes_away() {
        let (host, mut board) = tokio::io::duplex(1024);
        let board_task = tokio::spawn(async move {
            handshake(&mut board).await;
            board
        });

        let session = attach(host, Duration::from_secs(5)).await.unwrap();
        drop(board_task.await.unwrap());

        assert!(matches!(session.faults.await, Ok(LinkError::Closed)));
    }
}
