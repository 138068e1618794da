//! Mock backend for testing
//!
//! Deterministic, configurable responses without network dependencies.
//! Useful for exercising the agent loop, tool execution, and streaming
//! without a real model.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};

use super::error::{BackendError, BackendResult};
use super::{BackendChunk, BackendStream, GenerateRequest, GenerateResponse, ModelBackend};
use crate::logging::Logger;
use crate::types::MessageRole;

/// Mock response mode
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Echo back the last user message
    Echo,
    /// Return a fixed response
    Fixed(String),
    /// Pop scripted responses in order, erroring when exhausted
    Scripted,
    /// Fail every request
    Error(String),
}

impl Default for MockMode {
    fn default() -> Self {
        MockMode::Echo
    }
}

/// Mock model backend
///
/// The scripted queue lets a test drive a full tool-use turn: first a
/// response carrying tool calls, then the final response after tool
/// results are appended.
pub struct MockBackend {
    mode: MockMode,
    script: Mutex<VecDeque<GenerateResponse>>,
    streaming: bool,
    chunk_delay_ms: u64,
    logger: Arc<dyn Logger>,
}

impl MockBackend {
    /// Create an echo backend
    pub fn echo(logger: Arc<dyn Logger>) -> Self {
        Self {
            mode: MockMode::Echo,
            script: Mutex::new(VecDeque::new()),
            streaming: false,
            chunk_delay_ms: 0,
            logger,
        }
    }

    /// Create a backend that always returns the same text
    pub fn fixed(response: impl Into<String>, logger: Arc<dyn Logger>) -> Self {
        Self {
            mode: MockMode::Fixed(response.into()),
            script: Mutex::new(VecDeque::new()),
            streaming: false,
            chunk_delay_ms: 0,
            logger,
        }
    }

    /// Create a backend that plays back the given responses in order
    pub fn scripted(responses: Vec<GenerateResponse>, logger: Arc<dyn Logger>) -> Self {
        Self {
            mode: MockMode::Scripted,
            script: Mutex::new(responses.into()),
            streaming: false,
            chunk_delay_ms: 0,
            logger,
        }
    }

    /// Create a backend that fails every request
    pub fn error(message: impl Into<String>, logger: Arc<dyn Logger>) -> Self {
        Self {
            mode: MockMode::Error(message.into()),
            script: Mutex::new(VecDeque::new()),
            streaming: false,
            chunk_delay_ms: 0,
            logger,
        }
    }

    /// Enable native streaming with an inter-chunk delay
    pub fn with_streaming(mut self, chunk_delay_ms: u64) -> Self {
        self.streaming = true;
        self.chunk_delay_ms = chunk_delay_ms;
        self
    }

    fn next_response(&self, request: &GenerateRequest) -> BackendResult<GenerateResponse> {
        match &self.mode {
            MockMode::Echo => {
                let last = request
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.role == MessageRole::User)
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                Ok(GenerateResponse::text(format!("Echo: {}", last)))
            }
            MockMode::Fixed(response) => Ok(GenerateResponse::text(response.clone())),
            MockMode::Scripted => {
                let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
                script
                    .pop_front()
                    .ok_or_else(|| BackendError::Other("mock script exhausted".to_string()))
            }
            MockMode::Error(message) => Err(BackendError::Api(message.clone())),
        }
    }
}

#[async_trait]
impl ModelBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: GenerateRequest) -> BackendResult<GenerateResponse> {
        self.logger.debug(&format!(
            "MockBackend: generate with {} messages, tools: {}",
            request.messages.len(),
            request.tools.as_ref().map(Vec::len).unwrap_or(0)
        ));
        self.next_response(&request)
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    async fn generate_stream(&self, request: GenerateRequest) -> BackendResult<BackendStream> {
        if !self.streaming {
            return Err(BackendError::StreamingUnsupported {
                backend: self.name().to_string(),
            });
        }

        let response = self.next_response(&request)?;
        let delay_ms = self.chunk_delay_ms;

        let words: Vec<&str> = response.content.split_whitespace().collect();
        let mut chunks: Vec<BackendChunk> = words
            .iter()
            .enumerate()
            .map(|(i, word)| BackendChunk::Content {
                text: if i + 1 == words.len() {
                    (*word).to_string()
                } else {
                    format!("{} ", word)
                },
            })
            .collect();
        for tool_call in response.tool_calls {
            chunks.push(BackendChunk::ToolCall { tool_call });
        }
        chunks.push(BackendChunk::Done);

        let stream = stream::iter(chunks.into_iter().enumerate()).then(move |(i, chunk)| async move {
            if i > 0 && delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Ok(chunk)
        });

        Ok(Box::pin(stream))
    }
}
