//! Agent configuration
//!
//! Explicit, validated configuration surfaces. Connection resolution
//! is a pure priority chain over explicit parameters and environment
//! values, so it can be tested without touching the process
//! environment.

use thiserror::Error;

use crate::filter::FilterContext;
use crate::logging::Logger;

/// Environment variable carrying a full host URL
pub const ENV_HOST_URL: &str = "TOOLSCOPE_URL";
/// Environment variable carrying an API key
pub const ENV_API_KEY: &str = "TOOLSCOPE_API_KEY";
/// Environment variable carrying a client id
pub const ENV_CLIENT_ID: &str = "TOOLSCOPE_CLIENT_ID";
/// Host URL used when only an API key is supplied
const DEFAULT_HOST_URL: &str = "https://mcp.toolscope.dev/mcp";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No host configuration: set a URL or an API key, or export {ENV_HOST_URL} or {ENV_API_KEY}")]
    MissingHostConfig,

    #[error("An API key requires a client id")]
    MissingClientId,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Ranking strategy for tool filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterType {
    /// BM25 lexical ranking
    #[default]
    Bm25,
}

impl FilterType {
    /// Parse a strategy name, falling back to BM25 with a warning for
    /// anything unrecognized
    pub fn parse_or_default(name: &str, logger: &dyn Logger) -> Self {
        match name.to_lowercase().as_str() {
            "bm25" => FilterType::Bm25,
            other => {
                logger.warn(&format!(
                    "Unknown filter type '{}', falling back to bm25",
                    other
                ));
                FilterType::Bm25
            }
        }
    }
}

/// Resolved connection parameters for a tool host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConnection {
    /// Full host URL, client id already applied
    pub url: String,
    /// API key sent on every request, when required
    pub auth_token: Option<String>,
}

/// Agent construction parameters
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Display name of the host, used in logs
    pub server_name: String,
    /// Resolved host connection
    pub connection: HostConnection,
    /// Whether tool filtering is applied before model invocation
    pub enable_filtering: bool,
    /// Ranking strategy used when filtering is enabled
    pub filter_type: FilterType,
    /// Force index invalidation on the first catalog build
    pub sync_tools: bool,
    /// Reuse the ranking index across identical catalogs
    pub use_cache: bool,
    /// Optional system prompt opening the conversation
    pub system_prompt: Option<String>,
}

impl AgentConfig {
    /// Create a config for a resolved connection with the defaults:
    /// filtering enabled, BM25, cache on, no forced sync
    pub fn new(server_name: impl Into<String>, connection: HostConnection) -> Self {
        Self {
            server_name: server_name.into(),
            connection,
            enable_filtering: true,
            filter_type: FilterType::Bm25,
            sync_tools: false,
            use_cache: true,
            system_prompt: None,
        }
    }

    /// Toggle filtering
    pub fn with_filtering(mut self, enabled: bool) -> Self {
        self.enable_filtering = enabled;
        self
    }

    /// Select the ranking strategy
    pub fn with_filter_type(mut self, filter_type: FilterType) -> Self {
        self.filter_type = filter_type;
        self
    }

    /// Force index invalidation on the first catalog build
    pub fn with_sync_tools(mut self, sync: bool) -> Self {
        self.sync_tools = sync;
        self
    }

    /// Toggle index caching
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Open the conversation with a system prompt
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// Per-request chat options
#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// Upper bound on tools passed to the model
    pub max_tools: usize,
    /// Relevance floor below which tools are dropped
    pub min_score: f64,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Session-derived ranking hints
    pub context: Option<FilterContext>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            max_tools: 20,
            min_score: 8.0,
            max_tokens: 1000,
            temperature: 0.7,
            context: None,
        }
    }
}

impl ChatOptions {
    /// Override the tool count bound
    pub fn with_max_tools(mut self, max_tools: usize) -> Self {
        self.max_tools = max_tools;
        self
    }

    /// Override the relevance floor
    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    /// Attach ranking hints
    pub fn with_context(mut self, context: FilterContext) -> Self {
        self.context = Some(context);
        self
    }
}

/// Explicit connection parameters, each optional
#[derive(Debug, Clone, Default)]
pub struct HostParams<'a> {
    pub url: Option<&'a str>,
    pub api_key: Option<&'a str>,
    pub client_id: Option<&'a str>,
}

/// Resolve a host connection from explicit parameters and the process
/// environment
///
/// Priority: explicit URL, explicit API key, environment URL,
/// environment API key. An API key from either source requires a
/// client id.
pub fn resolve_host_config(params: HostParams<'_>) -> Result<HostConnection, ConfigError> {
    resolve_host_config_from(
        params,
        std::env::var(ENV_HOST_URL).ok().as_deref(),
        std::env::var(ENV_API_KEY).ok().as_deref(),
        std::env::var(ENV_CLIENT_ID).ok().as_deref(),
    )
}

/// Pure resolution core, environment values passed in explicitly
pub fn resolve_host_config_from(
    params: HostParams<'_>,
    env_url: Option<&str>,
    env_api_key: Option<&str>,
    env_client_id: Option<&str>,
) -> Result<HostConnection, ConfigError> {
    let client_id = params.client_id.or(env_client_id);

    if let Some(url) = params.url {
        return Ok(HostConnection {
            url: apply_client_id(url, client_id),
            auth_token: params.api_key.map(str::to_string),
        });
    }

    if let Some(api_key) = params.api_key {
        let client_id = client_id.ok_or(ConfigError::MissingClientId)?;
        return Ok(HostConnection {
            url: apply_client_id(DEFAULT_HOST_URL, Some(client_id)),
            auth_token: Some(api_key.to_string()),
        });
    }

    if let Some(url) = env_url {
        return Ok(HostConnection {
            url: apply_client_id(url, client_id),
            auth_token: env_api_key.map(str::to_string),
        });
    }

    if let Some(api_key) = env_api_key {
        let client_id = client_id.ok_or(ConfigError::MissingClientId)?;
        return Ok(HostConnection {
            url: apply_client_id(DEFAULT_HOST_URL, Some(client_id)),
            auth_token: Some(api_key.to_string()),
        });
    }

    Err(ConfigError::MissingHostConfig)
}

/// Set the `client_id` query parameter on a URL, replacing an existing
/// one and appending otherwise
fn apply_client_id(url: &str, client_id: Option<&str>) -> String {
    let Some(client_id) = client_id else {
        return url.to_string();
    };

    match url.split_once('?') {
        Some((base, query)) => {
            let mut pairs: Vec<String> = query
                .split('&')
                .filter(|p| !p.is_empty() && !p.starts_with("client_id="))
                .map(str::to_string)
                .collect();
            pairs.push(format!("client_id={}", client_id));
            format!("{}?{}", base, pairs.join("&"))
        }
        None => format!("{}?client_id={}", url, client_id),
    }
}
