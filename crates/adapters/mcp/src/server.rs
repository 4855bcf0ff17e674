//! Newline-delimited JSON-RPC loop.
//!
//! Every request runs on its own task so a suspended pulse never holds up
//! other commands. Tool calls claim their actuator turn on the reading task,
//! so calls on one actuator still apply in wire order. Responses are
//! funnelled through a single writer task, one JSON object per line.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::McpError;
use crate::handler::McpHandler;
use crate::protocol::{JsonRpcRequest, JsonRpcResponse, error_codes};

pub struct McpServer {
    handler: Arc<McpHandler>,
}

impl McpServer {
    #[must_use]
    pub fn new(handler: McpHandler) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// Serve until `reader` reaches end of input and every in-flight request
    /// has been answered.
    ///
    /// # Errors
    ///
    /// Returns [`McpError`] if reading the input or writing a response fails.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), McpError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(write_loop(writer, rx));

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse(line) {
                Ok(request) => {
                    // Admitted here, before the task is detached, so same-actuator
                    // calls apply in the order they were read.
                    let turn = self.handler.admit(&request);
                    let handler = Arc::clone(&self.handler);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        if let Some(response) = handler.handle_in_turn(request, turn).await {
                            let _ = tx.send(response);
                        }
                    });
                }
                Err(Some(response)) => {
                    let _ = tx.send(response);
                }
                Err(None) => {}
            }
        }
        tracing::info!("mcp input closed");

        drop(tx);
        writer_task.await?
    }
}

/// Parse one line; `Err` carries the error response to send, if any.
fn parse(line: &str) -> Result<JsonRpcRequest, Option<JsonRpcResponse>> {
    let value: Value = serde_json::from_str(line).map_err(|err| {
        tracing::warn!(error = %err, "unparseable mcp message");
        Some(JsonRpcResponse::error(
            Value::Null,
            error_codes::PARSE_ERROR,
            format!("Parse error: {err}"),
        ))
    })?;
    let id = value.get("id").cloned();
    serde_json::from_value(value).map_err(|err| {
        id.map(|id| {
            JsonRpcResponse::error(
                id,
                error_codes::INVALID_REQUEST,
                format!("Invalid request: {err}"),
            )
        })
    })
}

async fn write_loop<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<JsonRpcResponse>,
) -> Result<(), McpError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_vec(&response)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}
