/// Errors raised by the MCP transport.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("mcp stream I/O failed")]
    Io(#[from] std::io::Error),

    #[error("failed to encode mcp response")]
    Encode(#[from] serde_json::Error),

    #[error("mcp writer task failed")]
    Writer(#[from] tokio::task::JoinError),
}
