//! MCP tool host using the official rmcp SDK
//!
//! Connects to an MCP server over streamable HTTP, with optional
//! API-key authentication.

use std::sync::Arc;

use async_trait::async_trait;
use rmcp::{
    model::{
        CallToolRequestParams, CallToolResult, ClientCapabilities, ClientInfo, Implementation,
        RawContent, Tool,
    },
    service::RunningService,
    transport::{
        streamable_http_client::StreamableHttpClientTransportConfig, StreamableHttpClientTransport,
    },
    RoleClient, ServiceExt,
};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use tokio::sync::Mutex;

use super::{HostError, HostResult, ToolHost};
use crate::config::HostConnection;
use crate::logging::Logger;
use crate::types::ToolDef;

/// Header carrying the API key on authenticated connections
const API_KEY_HEADER: &str = "X-API-Key";

/// MCP tool host over streamable HTTP
pub struct McpToolHost {
    connection: HostConnection,
    client: Mutex<Option<RunningService<RoleClient, ClientInfo>>>,
    logger: Arc<dyn Logger>,
}

impl McpToolHost {
    /// Create a host for the given connection; no network activity
    /// happens until `connect`
    pub fn new(connection: HostConnection, logger: Arc<dyn Logger>) -> Self {
        Self {
            connection,
            client: Mutex::new(None),
            logger,
        }
    }

    fn client_info() -> ClientInfo {
        ClientInfo {
            meta: None,
            protocol_version: Default::default(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: "toolscope-core".to_string(),
                title: Some("Toolscope Core".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                website_url: None,
                icons: None,
            },
        }
    }

    fn build_transport(&self) -> HostResult<StreamableHttpClientTransport<reqwest::Client>> {
        let config = StreamableHttpClientTransportConfig::with_uri(self.connection.url.clone());

        match &self.connection.auth_token {
            Some(token) => {
                let mut value = HeaderValue::from_str(token)
                    .map_err(|e| HostError::Connection(format!("invalid auth token: {}", e)))?;
                value.set_sensitive(true);
                let mut headers = HeaderMap::new();
                headers.insert(API_KEY_HEADER, value);

                let client = reqwest::Client::builder()
                    .default_headers(headers)
                    .build()
                    .map_err(|e| HostError::Connection(e.to_string()))?;

                Ok(StreamableHttpClientTransport::with_client(client, config))
            }
            None => Ok(StreamableHttpClientTransport::with_client(
                reqwest::Client::default(),
                config,
            )),
        }
    }
}

#[async_trait]
impl ToolHost for McpToolHost {
    async fn connect(&self) -> HostResult<()> {
        let mut guard = self.client.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        self.logger.info(&format!(
            "[McpToolHost] Connecting to {}",
            self.connection.url
        ));

        let transport = self.build_transport()?;
        let client = Self::client_info()
            .serve(transport)
            .await
            .map_err(|e| HostError::Initialization(e.to_string()))?;

        self.logger.info("[McpToolHost] Connected and initialized");
        *guard = Some(client);
        Ok(())
    }

    async fn list_tools(&self) -> HostResult<Vec<ToolDef>> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(HostError::NotConnected)?;

        let result = client
            .list_tools(Default::default())
            .await
            .map_err(|e| HostError::ListTools(e.to_string()))?;

        self.logger
            .info(&format!("[McpToolHost] Listed {} tools", result.tools.len()));

        Ok(result.tools.iter().map(tool_to_def).collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> HostResult<Value> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(HostError::NotConnected)?;

        self.logger
            .info(&format!("[McpToolHost] Calling tool: {}", name));

        let params = CallToolRequestParams {
            meta: None,
            name: name.to_owned().into(),
            arguments: arguments.as_object().cloned(),
            task: None,
        };

        let result = client
            .call_tool(params)
            .await
            .map_err(|e| HostError::Execution(e.to_string()))?;

        collapse_result(result)
    }

    async fn close(&self) -> HostResult<()> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.take() {
            self.logger.info("[McpToolHost] Closing connection");
            client
                .cancel()
                .await
                .map_err(|e| HostError::Protocol(e.to_string()))?;
        }
        Ok(())
    }
}

/// Convert an MCP tool advertisement into our definition type
fn tool_to_def(tool: &Tool) -> ToolDef {
    ToolDef::new(
        tool.name.to_string(),
        tool.description
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_default(),
    )
    .with_schema(Value::Object(tool.input_schema.as_ref().clone()))
}

/// Collapse a call result into a single JSON value
///
/// Text-only content joins into one string; anything else is passed
/// through structurally. Results flagged as errors become `Err`.
fn collapse_result(result: CallToolResult) -> HostResult<Value> {
    let mut texts = Vec::new();
    let mut structured = Vec::new();

    for content in &result.content {
        match &content.raw {
            RawContent::Text(t) => texts.push(t.text.clone()),
            other => {
                let value = serde_json::to_value(other)
                    .map_err(|e| HostError::Protocol(e.to_string()))?;
                structured.push(value);
            }
        }
    }

    if result.is_error.unwrap_or(false) {
        return Err(HostError::Execution(texts.join("\n")));
    }

    if structured.is_empty() {
        Ok(Value::String(texts.join("\n")))
    } else {
        for text in texts {
            structured.push(Value::String(text));
        }
        Ok(Value::Array(structured))
    }
}
