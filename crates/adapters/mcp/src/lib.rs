//! # chotu-adapter-mcp
//!
//! Driving adapter: exposes the robot over the Model Context Protocol,
//! newline-delimited JSON-RPC 2.0 on a byte stream (stdio in production).
//!
//! | Method | Backed by |
//! |--------|-----------|
//! | `initialize`, `ping` | server info |
//! | `tools/list`, `tools/call` | `CommandDispatcher` |
//! | `prompts/list`, `prompts/get` | `PromptCatalog` |
//!
//! ## Dependency rule
//!
//! Depends on `chotu-app` and `chotu-domain` only.

mod error;
mod handler;
pub mod protocol;
mod server;

pub use error::McpError;
pub use handler::McpHandler;
pub use server::McpServer;
