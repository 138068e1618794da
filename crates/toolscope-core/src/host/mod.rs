//! Tool hosts
//!
//! A [`ToolHost`] is where tools live: it advertises tool definitions
//! and executes calls against them. [`McpToolHost`] speaks the MCP
//! protocol over streamable HTTP; [`StaticToolHost`] serves a preset
//! catalog for tests and embedding.

mod mcp;
mod memory;

pub use mcp::McpToolHost;
pub use memory::StaticToolHost;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::types::ToolDef;

/// Tool host errors
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Listing tools failed: {0}")]
    ListTools(String),

    #[error("Tool execution failed: {0}")]
    Execution(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Host not connected")]
    NotConnected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Convenience alias for host results
pub type HostResult<T> = Result<T, HostError>;

/// A source of invocable tools
///
/// Execution failures surface as `Err`; the caller decides whether a
/// failed tool call aborts or degrades the turn.
#[async_trait]
pub trait ToolHost: Send + Sync {
    /// Establish the connection; idempotent once connected
    async fn connect(&self) -> HostResult<()>;

    /// Definitions of every tool the host currently serves
    async fn list_tools(&self) -> HostResult<Vec<ToolDef>>;

    /// Execute one tool with JSON arguments
    async fn call_tool(&self, name: &str, arguments: Value) -> HostResult<Value>;

    /// Tear down the connection; further calls fail
    async fn close(&self) -> HostResult<()>;
}
