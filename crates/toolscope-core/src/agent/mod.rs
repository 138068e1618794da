//! Conversation agent
//!
//! Owns the conversation history and orchestrates a turn: filter the
//! tool catalog against the user message, invoke the model, execute
//! any requested tools sequentially, and invoke the model once more
//! for the final answer.

mod stream;

pub use stream::{EventSender, TurnStream};

use std::sync::Arc;

use serde_json::Value;

use crate::backend::{GenerateRequest, GenerateResponse, ModelBackend};
use crate::config::{AgentConfig, ChatOptions, FilterType};
use crate::error::AgentResult;
use crate::filter::Bm25ToolFilter;
use crate::host::{HostError, ToolHost};
use crate::logging::Logger;
use crate::types::{ChatResponse, ChatTurn, Message, ToolCall, ToolDef, ToolResult};

/// Opening line of the synthesized tool-results message
const RESULTS_HEADER: &str = "Here are the results from the tools:";
/// Closing line of the synthesized tool-results message
const RESULTS_FOOTER: &str = "Please provide a final response based on these results.";

/// Selected toolset plus the metadata describing the selection
struct ToolSelection {
    tools: Option<Vec<ToolDef>>,
    filtered_tools: Vec<String>,
    used_filtering: bool,
}

/// A tool-using conversation agent
pub struct Agent {
    backend: Box<dyn ModelBackend>,
    host: Arc<dyn ToolHost>,
    config: AgentConfig,
    filter: Option<Bm25ToolFilter>,
    all_tools: Vec<ToolDef>,
    messages: Vec<Message>,
    logger: Arc<dyn Logger>,
}

impl Agent {
    /// Create an agent; call `initialize` before chatting
    pub fn new(
        backend: Box<dyn ModelBackend>,
        host: Arc<dyn ToolHost>,
        config: AgentConfig,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let filter = config.enable_filtering.then(|| match config.filter_type {
            FilterType::Bm25 => {
                Bm25ToolFilter::new(config.use_cache, config.sync_tools, logger.clone())
            }
        });

        let mut messages = Vec::new();
        if let Some(prompt) = &config.system_prompt {
            messages.push(Message::system(prompt.clone()));
        }

        Self {
            backend,
            host,
            config,
            filter,
            all_tools: Vec::new(),
            messages,
            logger,
        }
    }

    /// Connect to the tool host and ingest its catalog
    ///
    /// Host failures propagate; an agent that cannot reach its tools
    /// should fail loudly rather than degrade silently.
    pub async fn initialize(&mut self) -> AgentResult<()> {
        self.host.connect().await?;
        let tools = self.host.list_tools().await?;

        self.logger.info(&format!(
            "[Agent] Connected to {}, {} tools discovered",
            self.config.server_name,
            tools.len()
        ));

        if let Some(filter) = &mut self.filter {
            filter.add_tools(&tools);
        }
        self.all_tools = tools;
        Ok(())
    }

    /// Conversation history so far, oldest first
    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    /// Every tool the host advertises, unfiltered
    pub fn all_tools(&self) -> &[ToolDef] {
        &self.all_tools
    }

    /// Drop the conversation history, keeping the system prompt
    pub fn reset_conversation(&mut self) {
        self.messages.clear();
        if let Some(prompt) = &self.config.system_prompt {
            self.messages.push(Message::system(prompt.clone()));
        }
    }

    /// Close the host connection
    pub async fn close(&self) -> AgentResult<()> {
        self.host.close().await?;
        Ok(())
    }

    /// One model invocation: filter tools against the message, call
    /// the backend, record both sides in the history
    pub async fn chat(
        &mut self,
        message: impl Into<String>,
        options: &ChatOptions,
    ) -> AgentResult<ChatResponse> {
        let message = message.into();
        self.messages.push(Message::user(message.clone()));

        let selection = self.select_tools(&message, options);
        let response = self.invoke_backend(selection.tools.clone(), options).await?;
        self.messages.push(Message::assistant(response.content.clone()));

        Ok(ChatResponse {
            content: response.content,
            tool_calls: response.tool_calls,
            filtered_tools_count: selection.filtered_tools.len(),
            filtered_tools: selection.filtered_tools,
            used_filtering: selection.used_filtering,
        })
    }

    /// A full turn: initial invocation, sequential tool execution,
    /// final invocation over the tool results
    ///
    /// Individual tool failures do not abort the turn; their errors
    /// are fed back to the model like any other result.
    pub async fn chat_with_tools(
        &mut self,
        message: impl Into<String>,
        options: &ChatOptions,
    ) -> AgentResult<ChatTurn> {
        let initial = self.chat(message, options).await?;
        if initial.tool_calls.is_empty() {
            return Ok(ChatTurn::without_tools(initial));
        }

        let mut tool_results = Vec::new();
        for call in &initial.tool_calls {
            if call.name.is_empty() {
                self.logger.warn("[Agent] Skipping tool call with empty name");
                continue;
            }
            tool_results.push(self.execute_tool(call).await);
        }

        self.messages
            .push(Message::user(synthesize_results_message(&tool_results)));

        let final_response = self.invoke_backend(None, options).await?;
        self.messages
            .push(Message::assistant(final_response.content.clone()));

        Ok(ChatTurn {
            content: final_response.content,
            initial_response: Some(initial.content),
            tool_calls: initial.tool_calls,
            tool_results,
            filtered_tools_count: initial.filtered_tools_count,
            filtered_tools: initial.filtered_tools,
            used_filtering: initial.used_filtering,
        })
    }

    /// Execute one tool call against the host
    pub async fn execute_tool(&self, call: &ToolCall) -> ToolResult {
        self.logger
            .debug(&format!("[Agent] Executing tool: {}", call.name));

        match self.host.call_tool(&call.name, call.input.clone()).await {
            Ok(value) => ToolResult::success(&call.name, serialize_tool_result(&value)),
            Err(e) => {
                self.logger
                    .warn(&format!("[Agent] Tool {} failed: {}", call.name, e));
                // The model sees the bare execution message, not the
                // error type's framing
                let message = match e {
                    HostError::Execution(m) => m,
                    other => other.to_string(),
                };
                ToolResult::error(&call.name, message)
            }
        }
    }

    async fn invoke_backend(
        &self,
        tools: Option<Vec<ToolDef>>,
        options: &ChatOptions,
    ) -> AgentResult<GenerateResponse> {
        let request = GenerateRequest::new(self.messages.clone())
            .with_tools(tools)
            .with_sampling(options.max_tokens, options.temperature);
        Ok(self.backend.generate(request).await?)
    }

    /// Pick which tools the model sees for this message
    fn select_tools(&self, message: &str, options: &ChatOptions) -> ToolSelection {
        let Some(filter) = &self.filter else {
            let names: Vec<String> = self.all_tools.iter().map(|t| t.name.clone()).collect();
            return ToolSelection {
                tools: (!self.all_tools.is_empty()).then(|| self.all_tools.clone()),
                filtered_tools: names,
                used_filtering: false,
            };
        };

        let ranked = filter.filter_tools(
            message,
            options.max_tools,
            options.min_score,
            options.context.as_ref(),
        );
        let names: Vec<String> = ranked.iter().map(|t| t.name().to_string()).collect();

        self.logger.info(&format!(
            "[Agent] Filtered {} of {} tools",
            names.len(),
            self.all_tools.len()
        ));

        let tools: Vec<ToolDef> = names
            .iter()
            .filter_map(|name| self.all_tools.iter().find(|t| &t.name == name).cloned())
            .collect();

        ToolSelection {
            tools: (!tools.is_empty()).then_some(tools),
            filtered_tools: names,
            used_filtering: true,
        }
    }
}

/// Serialize a tool's JSON result for the model
///
/// Strings pass through untouched; structures pretty-print; scalars
/// stringify.
fn serialize_tool_result(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Object(_) | Value::Array(_) => serde_json::to_string_pretty(value)
            .unwrap_or_else(|_| format!("[Object: {}]", value)),
    }
}

/// Build the user message carrying tool results back to the model
fn synthesize_results_message(results: &[ToolResult]) -> String {
    let blocks: Vec<String> = results
        .iter()
        .map(|r| format!("Tool: {}\nResult: {}", r.tool, r.output()))
        .collect();

    format!(
        "{}\n\n{}\n\n{}",
        RESULTS_HEADER,
        blocks.join("\n\n"),
        RESULTS_FOOTER
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::config::HostConnection;
    use crate::host::StaticToolHost;
    use crate::logging::NoOpLogger;
    use crate::types::MessageRole;
    use serde_json::json;

    fn test_logger() -> Arc<dyn Logger> {
        Arc::new(NoOpLogger::new())
    }

    fn test_config() -> AgentConfig {
        AgentConfig::new(
            "test-host",
            HostConnection {
                url: "http://localhost:0/mcp".to_string(),
                auth_token: None,
            },
        )
    }

    fn test_host() -> Arc<StaticToolHost> {
        Arc::new(
            StaticToolHost::new(vec![
                ToolDef::new("files__read", "Read a file from disk"),
                ToolDef::new("files__write", "Write contents to a file"),
                ToolDef::new("mail__send", "Send an email message"),
            ])
            .with_result("files__read", json!({"text": "hello"}))
            .with_error("mail__send", "timeout"),
        )
    }

    #[tokio::test]
    async fn test_chat_filters_tools_and_records_history() {
        let backend = MockBackend::fixed("Sure.", test_logger());
        let host = test_host();
        let mut agent = Agent::new(Box::new(backend), host, test_config(), test_logger());
        agent.initialize().await.unwrap();

        let response = agent
            .chat("read the file please", &ChatOptions::default().with_min_score(0.1))
            .await
            .unwrap();

        assert!(response.used_filtering);
        assert!(response.filtered_tools_count > 0);
        assert!(response
            .filtered_tools
            .iter()
            .any(|n| n == "files__read"));

        let history = agent.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, MessageRole::User);
        assert_eq!(history[1].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn test_chat_without_filtering_offers_all_tools() {
        let backend = MockBackend::fixed("Sure.", test_logger());
        let host = test_host();
        let config = test_config().with_filtering(false);
        let mut agent = Agent::new(Box::new(backend), host, config, test_logger());
        agent.initialize().await.unwrap();

        let response = agent.chat("anything", &ChatOptions::default()).await.unwrap();
        assert!(!response.used_filtering);
        assert_eq!(response.filtered_tools_count, 3);
    }

    #[tokio::test]
    async fn test_turn_with_partial_tool_failure() {
        let backend = MockBackend::scripted(
            vec![
                GenerateResponse::with_tool_calls(
                    "Checking.",
                    vec![
                        ToolCall::new("mail__send", json!({})),
                        ToolCall::new("files__read", json!({"path": "a.txt"})),
                    ],
                ),
                GenerateResponse::text("All done."),
            ],
            test_logger(),
        );
        let host = test_host();
        let mut agent = Agent::new(Box::new(backend), host.clone(), test_config(), test_logger());
        agent.initialize().await.unwrap();

        let turn = agent
            .chat_with_tools("send mail then read the file", &ChatOptions::default().with_min_score(0.1))
            .await
            .unwrap();

        // The failing first tool did not stop the second one
        assert_eq!(host.call_log(), vec!["mail__send", "files__read"]);
        assert_eq!(turn.tool_results.len(), 2);
        assert!(turn.tool_results[0].is_error());
        assert!(!turn.tool_results[1].is_error());

        assert_eq!(turn.content, "All done.");
        assert_eq!(turn.initial_response.as_deref(), Some("Checking."));

        // The bare error text was fed back to the model, without the
        // error type's framing
        let results_msg = &agent.history()[2];
        assert_eq!(results_msg.role, MessageRole::User);
        assert!(results_msg.content.starts_with(RESULTS_HEADER));
        assert!(results_msg
            .content
            .contains("Tool: mail__send\nResult: timeout"));
        assert!(results_msg.content.ends_with(RESULTS_FOOTER));
        assert_eq!(turn.tool_results[0].output(), "timeout");
    }

    #[tokio::test]
    async fn test_turn_without_tool_calls_skips_second_invocation() {
        let backend = MockBackend::scripted(
            vec![GenerateResponse::text("Plain answer.")],
            test_logger(),
        );
        let mut agent = Agent::new(Box::new(backend), test_host(), test_config(), test_logger());
        agent.initialize().await.unwrap();

        let turn = agent
            .chat_with_tools("read something", &ChatOptions::default())
            .await
            .unwrap();

        assert_eq!(turn.content, "Plain answer.");
        assert!(turn.initial_response.is_none());
        assert!(turn.tool_results.is_empty());
        // user + assistant only: no results message, no second response
        assert_eq!(agent.history().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_tool_names_are_skipped() {
        let backend = MockBackend::scripted(
            vec![
                GenerateResponse::with_tool_calls(
                    "",
                    vec![
                        ToolCall::new("", json!({})),
                        ToolCall::new("files__read", json!({})),
                    ],
                ),
                GenerateResponse::text("Done."),
            ],
            test_logger(),
        );
        let host = test_host();
        let mut agent = Agent::new(Box::new(backend), host.clone(), test_config(), test_logger());
        agent.initialize().await.unwrap();

        let turn = agent
            .chat_with_tools("read the file", &ChatOptions::default().with_min_score(0.1))
            .await
            .unwrap();

        assert_eq!(host.call_log(), vec!["files__read"]);
        assert_eq!(turn.tool_results.len(), 1);
    }

    #[tokio::test]
    async fn test_filter_type_selects_the_ranker() {
        // An unrecognized strategy name falls back to BM25 and still
        // yields a filtering agent
        let logger = test_logger();
        let filter_type = FilterType::parse_or_default("semantic", logger.as_ref());
        let config = test_config().with_filter_type(filter_type);

        let backend = MockBackend::fixed("Sure.", test_logger());
        let mut agent = Agent::new(Box::new(backend), test_host(), config, test_logger());
        agent.initialize().await.unwrap();

        let response = agent
            .chat("read the file", &ChatOptions::default().with_min_score(0.1))
            .await
            .unwrap();
        assert!(response.used_filtering);
        assert!(response.filtered_tools.iter().any(|n| n == "files__read"));
    }

    #[tokio::test]
    async fn test_reset_keeps_system_prompt() {
        let backend = MockBackend::echo(test_logger());
        let config = test_config().with_system_prompt("Be terse.");
        let mut agent = Agent::new(Box::new(backend), test_host(), config, test_logger());
        agent.initialize().await.unwrap();

        agent.chat("hello", &ChatOptions::default()).await.unwrap();
        assert_eq!(agent.history().len(), 3);

        agent.reset_conversation();
        assert_eq!(agent.history().len(), 1);
        assert_eq!(agent.history()[0].role, MessageRole::System);
    }

    #[test]
    fn test_serialize_tool_result_shapes() {
        assert_eq!(serialize_tool_result(&Value::Null), "null");
        assert_eq!(serialize_tool_result(&json!("plain")), "plain");
        assert_eq!(serialize_tool_result(&json!(42)), "42");
        assert_eq!(serialize_tool_result(&json!(true)), "true");

        let obj = serialize_tool_result(&json!({"a": 1}));
        assert!(obj.contains("\"a\": 1"));
    }

    #[test]
    fn test_results_message_shape() {
        let results = vec![
            ToolResult::success("files__read", "hello"),
            ToolResult::error("mail__send", "timeout"),
        ];
        let msg = synthesize_results_message(&results);

        assert!(msg.starts_with(RESULTS_HEADER));
        assert!(msg.contains("Tool: files__read\nResult: hello"));
        assert!(msg.contains("Tool: mail__send\nResult: timeout"));
        assert!(msg.ends_with(RESULTS_FOOTER));
    }
}
