//! Streaming turn execution
//!
//! A streamed turn is driven by a future that borrows the agent and
//! pushes [`StreamEvent`]s through a channel; [`TurnStream`] polls the
//! future and the channel together so the caller sees events as they
//! happen.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use super::{synthesize_results_message, Agent};
use crate::backend::{BackendChunk, GenerateRequest, GenerateResponse};
use crate::config::ChatOptions;
use crate::error::{AgentError, AgentResult};
use crate::types::{ChatResponse, ChatTurn, Message, StreamEvent, ToolDef, ToolResult, TurnPhase};

/// Delay between words when streaming is simulated over a complete
/// response
const SIMULATED_WORD_DELAY: Duration = Duration::from_millis(30);

/// Event channel capacity; senders back-pressure when the consumer
/// falls this far behind
const EVENT_BUFFER: usize = 64;

/// Sending half of a turn's event channel
///
/// Send failures mean the consumer dropped the stream; events are
/// discarded silently in that case and the driving future finishes on
/// its own.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<StreamEvent>,
}

impl EventSender {
    fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self { tx }
    }

    /// Emit one event
    pub async fn send(&self, event: StreamEvent) {
        let _ = self.tx.send(event).await;
    }
}

/// Ordered stream of events for one in-flight turn
///
/// Yields each event as `Ok`; a fatal turn error is yielded once as
/// the final `Err` item after buffered events drain.
pub struct TurnStream<'a> {
    future: Option<Pin<Box<dyn Future<Output = AgentResult<()>> + Send + 'a>>>,
    receiver: mpsc::Receiver<StreamEvent>,
    pending_error: Option<AgentError>,
}

impl<'a> TurnStream<'a> {
    fn new(
        future: Pin<Box<dyn Future<Output = AgentResult<()>> + Send + 'a>>,
        receiver: mpsc::Receiver<StreamEvent>,
    ) -> Self {
        Self {
            future: Some(future),
            receiver,
            pending_error: None,
        }
    }
}

/// Emit text word by word with the simulated-streaming delay
async fn emit_words<F>(content: &str, sender: &EventSender, make: F)
where
    F: Fn(String) -> StreamEvent,
{
    let words: Vec<&str> = content.split_whitespace().collect();
    for (i, word) in words.iter().enumerate() {
        let chunk = if i + 1 == words.len() {
            (*word).to_string()
        } else {
            format!("{} ", word)
        };
        sender.send(make(chunk)).await;
        tokio::time::sleep(SIMULATED_WORD_DELAY).await;
    }
}

impl Stream for TurnStream<'_> {
    type Item = AgentResult<StreamEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        // Drive the turn; dropping the finished future drops its
        // sender, which closes the channel once buffered events drain
        if let Some(future) = this.future.as_mut() {
            match future.as_mut().poll(cx) {
                Poll::Ready(Ok(())) => this.future = None,
                Poll::Ready(Err(e)) => {
                    this.future = None;
                    this.pending_error = Some(e);
                }
                Poll::Pending => {}
            }
        }

        match this.receiver.poll_recv(cx) {
            Poll::Ready(Some(event)) => Poll::Ready(Some(Ok(event))),
            Poll::Ready(None) => match this.pending_error.take() {
                Some(e) => Poll::Ready(Some(Err(e))),
                None => Poll::Ready(None),
            },
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Agent {
    /// Stream a single model invocation
    ///
    /// Content arrives word by word (natively when the backend streams,
    /// simulated otherwise), followed by one metadata event.
    pub fn chat_stream(
        &mut self,
        message: impl Into<String>,
        options: ChatOptions,
    ) -> TurnStream<'_> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let sender = EventSender::new(tx);
        let message = message.into();
        let future = Box::pin(async move {
            let response = self.stream_initial(&message, &options, &sender).await?;
            for tool_call in &response.tool_calls {
                sender
                    .send(StreamEvent::ToolCall {
                        tool_call: tool_call.clone(),
                    })
                    .await;
            }
            sender
                .send(StreamEvent::Metadata {
                    filtered_tools_count: response.filtered_tools_count,
                    filtered_tools: response.filtered_tools,
                    used_filtering: response.used_filtering,
                    tool_calls: response.tool_calls,
                })
                .await;
            Ok(())
        });
        TurnStream::new(future, rx)
    }

    /// Stream a full turn: initial response, tool execution, final
    /// response
    ///
    /// Phase events bracket each stage; exactly one `Done` event ends
    /// the stream, carrying the complete structured turn.
    pub fn chat_with_tools_stream(
        &mut self,
        message: impl Into<String>,
        options: ChatOptions,
    ) -> TurnStream<'_> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let sender = EventSender::new(tx);
        let message = message.into();
        let future = Box::pin(async move {
            self.run_turn_stream(message, options, sender).await
        });
        TurnStream::new(future, rx)
    }

    async fn run_turn_stream(
        &mut self,
        message: String,
        options: ChatOptions,
        sender: EventSender,
    ) -> AgentResult<()> {
        sender
            .send(StreamEvent::Phase {
                phase: TurnPhase::InitialResponse,
            })
            .await;

        let initial = self.stream_initial(&message, &options, &sender).await?;

        for tool_call in &initial.tool_calls {
            sender
                .send(StreamEvent::ToolCall {
                    tool_call: tool_call.clone(),
                })
                .await;
        }

        if initial.tool_calls.is_empty() {
            sender
                .send(StreamEvent::Done {
                    final_response: ChatTurn::without_tools(initial),
                })
                .await;
            return Ok(());
        }

        sender
            .send(StreamEvent::Phase {
                phase: TurnPhase::ToolExecution,
            })
            .await;

        let mut tool_results: Vec<ToolResult> = Vec::new();
        for call in &initial.tool_calls {
            if call.name.is_empty() {
                self.logger.warn("[Agent] Skipping tool call with empty name");
                continue;
            }
            let result = self.execute_tool(call).await;
            let event = if result.is_error() {
                StreamEvent::ToolError {
                    tool_name: result.tool.clone(),
                    error: result.output().to_string(),
                }
            } else {
                StreamEvent::ToolResult {
                    tool_name: result.tool.clone(),
                    result: result.output().to_string(),
                }
            };
            sender.send(event).await;
            tool_results.push(result);
        }

        self.messages
            .push(Message::user(synthesize_results_message(&tool_results)));

        sender
            .send(StreamEvent::Phase {
                phase: TurnPhase::FinalResponse,
            })
            .await;

        let final_response = if self.backend.supports_streaming() {
            self.stream_native(None, &options, &sender, |content| {
                StreamEvent::FinalContent { content }
            })
            .await?
        } else {
            let response = self.invoke_backend(None, &options).await?;
            emit_words(&response.content, &sender, |content| {
                StreamEvent::FinalContent { content }
            })
            .await;
            response
        };
        self.messages
            .push(Message::assistant(final_response.content.clone()));

        sender
            .send(StreamEvent::Done {
                final_response: ChatTurn {
                    content: final_response.content,
                    initial_response: Some(initial.content),
                    tool_calls: initial.tool_calls,
                    tool_results,
                    filtered_tools_count: initial.filtered_tools_count,
                    filtered_tools: initial.filtered_tools,
                    used_filtering: initial.used_filtering,
                },
            })
            .await;
        Ok(())
    }

    /// Run the initial invocation, emitting its content incrementally
    async fn stream_initial(
        &mut self,
        message: &str,
        options: &ChatOptions,
        sender: &EventSender,
    ) -> AgentResult<ChatResponse> {
        self.messages.push(Message::user(message.to_string()));
        let selection = self.select_tools(message, options);

        let response = if self.backend.supports_streaming() {
            self.stream_native(selection.tools.clone(), options, sender, |content| {
                StreamEvent::Content { content }
            })
            .await?
        } else {
            let response = self.invoke_backend(selection.tools.clone(), options).await?;
            emit_words(&response.content, sender, |content| StreamEvent::Content {
                content,
            })
            .await;
            response
        };

        self.messages.push(Message::assistant(response.content.clone()));

        Ok(ChatResponse {
            content: response.content,
            tool_calls: response.tool_calls,
            filtered_tools_count: selection.filtered_tools.len(),
            filtered_tools: selection.filtered_tools,
            used_filtering: selection.used_filtering,
        })
    }

    /// Consume a native backend stream, forwarding content as it lands
    async fn stream_native<F>(
        &self,
        tools: Option<Vec<ToolDef>>,
        options: &ChatOptions,
        sender: &EventSender,
        make: F,
    ) -> AgentResult<GenerateResponse>
    where
        F: Fn(String) -> StreamEvent,
    {
        let request = GenerateRequest::new(self.messages.clone())
            .with_tools(tools)
            .with_sampling(options.max_tokens, options.temperature);

        let mut stream = self.backend.generate_stream(request).await?;
        let mut content = String::new();
        let mut tool_calls = Vec::new();

        while let Some(chunk) = stream.next().await {
            match chunk? {
                BackendChunk::Content { text } => {
                    content.push_str(&text);
                    sender.send(make(text)).await;
                }
                BackendChunk::ToolCall { tool_call } => tool_calls.push(tool_call),
                BackendChunk::Done => break,
            }
        }

        Ok(GenerateResponse {
            content,
            tool_calls,
        })
    }
}
