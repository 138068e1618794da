//! Model backend abstraction
//!
//! A [`ModelBackend`] turns a conversation (plus an optional tool
//! catalog) into a model response. Implementations wrap concrete APIs;
//! [`MockBackend`] serves tests and offline development.

mod error;
mod mock;

pub use error::{BackendError, BackendResult};
pub use mock::MockBackend;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::types::{Message, ToolCall, ToolDef};

/// One generation request
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Full conversation so far, oldest first
    pub messages: Vec<Message>,
    /// Tools the model may call; `None` disables tool use entirely
    pub tools: Option<Vec<ToolDef>>,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl GenerateRequest {
    /// Build a request for a plain completion without tools
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: None,
            max_tokens: 1000,
            temperature: 0.7,
        }
    }

    /// Attach a tool catalog
    pub fn with_tools(mut self, tools: Option<Vec<ToolDef>>) -> Self {
        self.tools = tools;
        self
    }

    /// Override sampling limits
    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }
}

/// One generation result
#[derive(Debug, Clone, Default)]
pub struct GenerateResponse {
    /// Generated text, possibly empty when the model only calls tools
    pub content: String,
    /// Tool invocations the model requested, in order
    pub tool_calls: Vec<ToolCall>,
}

impl GenerateResponse {
    /// Build a text-only response
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Build a response that requests tool calls
    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
        }
    }
}

/// Incremental output of a natively streaming backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendChunk {
    /// A fragment of generated text
    Content { text: String },
    /// A complete tool invocation request
    ToolCall { tool_call: ToolCall },
    /// Terminal marker; no chunks follow
    Done,
}

/// Boxed stream of backend chunks
pub type BackendStream = Pin<Box<dyn Stream<Item = BackendResult<BackendChunk>> + Send>>;

/// A model capable of turning conversations into responses
///
/// Streaming is an optional capability: `supports_streaming` reports
/// it and `generate_stream` errors by default, so callers can fall
/// back to simulated streaming over `generate`.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Human-readable backend name, used in logs and errors
    fn name(&self) -> &str;

    /// Produce a complete response for the request
    async fn generate(&self, request: GenerateRequest) -> BackendResult<GenerateResponse>;

    /// Whether this backend can stream natively
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Stream a response incrementally
    ///
    /// Only meaningful when `supports_streaming` returns true.
    async fn generate_stream(&self, _request: GenerateRequest) -> BackendResult<BackendStream> {
        Err(BackendError::StreamingUnsupported {
            backend: self.name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare;

    #[async_trait]
    impl ModelBackend for Bare {
        fn name(&self) -> &str {
            "bare"
        }

        async fn generate(&self, _request: GenerateRequest) -> BackendResult<GenerateResponse> {
            Ok(GenerateResponse::text("ok"))
        }
    }

    #[tokio::test]
    async fn test_streaming_is_opt_in() {
        let backend = Bare;
        assert!(!backend.supports_streaming());

        let request = GenerateRequest::new(vec![Message::user("hi")]);
        let err = backend.generate_stream(request).await.err();
        assert!(matches!(
            err,
            Some(BackendError::StreamingUnsupported { backend }) if backend == "bare"
        ));
    }

    #[test]
    fn test_chunk_serialization() {
        let chunk = BackendChunk::Content {
            text: "hello".to_string(),
        };
        let json = serde_json::to_string(&chunk).unwrap();
        assert!(json.contains("\"type\":\"content\""));

        let done = serde_json::to_string(&BackendChunk::Done).unwrap();
        assert!(done.contains("\"type\":\"done\""));
    }
}
