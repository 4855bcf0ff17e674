//! # chotud: Chotu robot daemon
//!
//! Composition root that wires the board adapter, the command dispatcher and
//! the MCP server together, then serves JSON-RPC on stdin/stdout.
//!
//! ## Responsibilities
//! - Load configuration (`chotu.toml`, env vars)
//! - Initialize tracing on stderr (stdout carries the protocol)
//! - Pick the board adapter (Firmata serial or virtual) and wait for Ready
//! - Serve MCP until input closes, a signal arrives, or the link faults
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer: no domain logic belongs here.

mod config;

use std::process::ExitCode;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tracing_subscriber::EnvFilter;

use chotu_adapter_firmata::{FirmataConfig, FirmataConnector};
use chotu_adapter_mcp::{McpError, McpHandler, McpServer};
use chotu_adapter_virtual::VirtualBoard;
use chotu_app::board::BoardConnection;
use chotu_app::dispatcher::{CommandDispatcher, CommandRegistry};
use chotu_app::ports::BoardConnector;
use chotu_domain::error::ChotuError;
use chotu_domain::pin;
use chotu_domain::prompt::PromptCatalog;

use crate::config::{BoardKind, Config, LinkFaultPolicy};

#[derive(Debug, thiserror::Error)]
enum DaemonError {
    #[error("board failed: {}", .0.describe())]
    Board(#[from] ChotuError),
    #[error("mcp transport failed")]
    Transport(#[from] McpError),
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("chotud: {err}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.logging.filter);

    let result = match config.board.kind {
        BoardKind::Firmata => {
            let connector = FirmataConnector::new(FirmataConfig {
                baud_rate: config.board.baud_rate,
                handshake_timeout: config.board.handshake_timeout(),
            });
            run(connector, &config).await
        }
        BoardKind::Virtual => {
            let connector = VirtualBoard::default()
                .with_sample(pin::TEMPERATURE, config.virtual_board.temperature_raw)
                .with_sample(pin::DISTANCE, config.virtual_board.distance_raw);
            run(connector, &config).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "chotud terminated");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run<C: BoardConnector>(connector: C, config: &Config) -> Result<(), DaemonError> {
    let board = BoardConnection::new(connector);
    board.connect(config.board.address.clone());

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    tokio::select! {
        result = session(&board, config.safety.on_link_fault, stdin, stdout) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, shutting down");
            Ok(())
        }
    }
}

/// Wait for the board, then serve MCP on `reader`/`writer` under `policy`.
async fn session<C, R, W>(
    board: &BoardConnection<C>,
    policy: LinkFaultPolicy,
    reader: R,
    writer: W,
) -> Result<(), DaemonError>
where
    C: BoardConnector,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let actuators = board.ready().await?;

    let dispatcher = CommandDispatcher::new(CommandRegistry::chotu(), board.handle());
    let server = McpServer::new(McpHandler::new(
        Arc::new(dispatcher),
        PromptCatalog::default(),
    ));
    tracing::info!(policy = ?policy, "serving mcp on stdio");

    let serving = server.serve(reader, writer);
    tokio::pin!(serving);

    let result = tokio::select! {
        result = &mut serving => result.map_err(DaemonError::from),
        fault = board.fault() => match policy {
            LinkFaultPolicy::Terminate => Err(DaemonError::Board(fault)),
            LinkFaultPolicy::Degrade => {
                tracing::warn!(error = %fault.describe(), "board link lost, serving degraded");
                serving.await.map_err(DaemonError::from)
            }
        },
    };

    if let Err(err) = actuators.motor.stop().await {
        tracing::debug!(error = %err.describe(), "motor stop on shutdown failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::Value;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, DuplexStream, Lines};
    use tokio::task::JoinHandle;

    use chotu_app::board::BoardStatus;

    use super::*;

    struct Client {
        input: DuplexStream,
        output: Lines<BufReader<DuplexStream>>,
    }

    impl Client {
        async fn call(&mut self, id: u64, name: &str) -> Value {
            let line = format!(
                r#"{{"jsonrpc":"2.0","id":{id},"method":"tools/call","params":{{"name":"{name}","arguments":{{}}}}}}"#
            );
            self.input.write_all(line.as_bytes()).await.unwrap();
            self.input.write_all(b"\n").await.unwrap();
            let reply = self.output.next_line().await.unwrap().unwrap();
            serde_json::from_str(&reply).unwrap()
        }
    }

    fn start(
        policy: LinkFaultPolicy,
    ) -> (
        Arc<BoardConnection<VirtualBoard>>,
        Client,
        JoinHandle<Result<(), DaemonError>>,
    ) {
        let board = Arc::new(BoardConnection::new(VirtualBoard::default()));
        board.connect("virtual");

        let (client_in, server_in) = tokio::io::duplex(4096);
        let (server_out, client_out) = tokio::io::duplex(4096);
        let task = tokio::spawn({
            let board = Arc::clone(&board);
            async move { session(&board, policy, BufReader::new(server_in), server_out).await }
        });
        let client = Client {
            input: client_in,
            output: BufReader::new(client_out).lines(),
        };
        (board, client, task)
    }

    #[tokio::test]
    async fn should_exit_with_board_error_under_terminate_policy() {
        let (board, mut client, task) = start(LinkFaultPolicy::Terminate);
        let reply = client.call(1, "readDistance").await;
        assert_eq!(reply["result"]["isError"], false);

        board.connector().disconnect();
        let result = task.await.unwrap();
        assert!(matches!(result, Err(DaemonError::Board(_))));
        assert_eq!(board.status(), BoardStatus::Error);
    }

    #[tokio::test]
    async fn should_keep_serving_not_ready_under_degrade_policy() {
        let (board, mut client, task) = start(LinkFaultPolicy::Degrade);
        client.call(1, "readDistance").await;

        board.connector().disconnect();
        let mut status = board.handle().subscribe();
        status
            .wait_for(|s| *s == BoardStatus::Error)
            .await
            .unwrap();

        let reply = client.call(2, "readDistance").await;
        assert_eq!(reply["result"]["isError"], true);
        assert_eq!(
            reply["result"]["content"][0]["text"],
            "Error: device not ready"
        );
        assert!(!task.is_finished());

        drop(client.input);
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_motor_when_input_closes() {
        let (board, mut client, task) = start(LinkFaultPolicy::Terminate);
        let line = r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"runMotor","arguments":{"speed":200}}}"#;
        client.input.write_all(line.as_bytes()).await.unwrap();
        client.input.write_all(b"\n").await.unwrap();
        client.output.next_line().await.unwrap().unwrap();

        drop(client.input);
        assert!(task.await.unwrap().is_ok());
        let link = board.connector().link().unwrap();
        assert_eq!(link.pin(pin::MOTOR_PWM).value, 0);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(link.pin(pin::MOTOR_PWM).value, 0);
    }
}
