//! Toolscope Core
//!
//! Tool-relevance filtering and conversation orchestration for
//! MCP-backed agents. A host advertising hundreds of tools overwhelms
//! a model's context; this crate ranks the catalog against each user
//! message with BM25 plus relevance boosts, passes only the winners to
//! the model, executes the requested tool calls and feeds the results
//! back for a final answer. Both blocking and streaming turn APIs are
//! provided.
//!
//! ```rust,ignore
//! use toolscope_core::{Agent, AgentConfig, ChatOptions, McpToolHost};
//!
//! let connection = toolscope_core::resolve_host_config(params)?;
//! let host = Arc::new(McpToolHost::new(connection.clone(), logger.clone()));
//! let mut agent = Agent::new(backend, host, AgentConfig::new("observee", connection), logger);
//!
//! agent.initialize().await?;
//! let turn = agent.chat_with_tools("What does the transcript say?", &ChatOptions::default()).await?;
//! ```

pub mod agent;
pub mod backend;
pub mod config;
pub mod error;
pub mod filter;
pub mod host;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use types::{
    ChatResponse, ChatTurn, Message, MessageRole, StreamEvent, ToolCall, ToolDef, ToolResult,
    TurnPhase,
};

pub use agent::{Agent, EventSender, TurnStream};

pub use backend::{
    BackendChunk, BackendError, BackendResult, BackendStream, GenerateRequest, GenerateResponse,
    MockBackend, ModelBackend,
};

pub use config::{
    resolve_host_config, resolve_host_config_from, AgentConfig, ChatOptions, ConfigError,
    FilterType, HostConnection, HostParams,
};

pub use error::{AgentError, AgentResult};

pub use filter::{Bm25ToolFilter, FilterContext, RankedTool, RankingWeights, ToolDescriptor};

pub use host::{HostError, HostResult, McpToolHost, StaticToolHost, ToolHost};

pub use logging::{ConsoleLogger, Logger, NoOpLogger, SharedLogger};
