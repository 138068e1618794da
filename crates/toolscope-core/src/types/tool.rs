//! Tool definition, call and result types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw tool definition as discovered from the tool host
///
/// This is the uniform shape flowing through the whole pipeline: the
/// host produces it, the filter derives searchable metadata from it,
/// and the backend marshals it into its own declaration format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    /// Tool name (unique within a catalog)
    pub name: String,
    /// Description of what the tool does
    pub description: String,
    /// JSON Schema for the input parameters
    #[serde(rename = "inputSchema", skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

impl ToolDef {
    /// Create a new tool definition
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: None,
        }
    }

    /// Set the input schema
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }
}

/// Tool invocation requested by the model backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool being called
    pub name: String,
    /// Input arguments for the tool
    pub input: Value,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(name: impl Into<String>, input: Value) -> Self {
        Self {
            name: name.into(),
            input,
        }
    }

    /// Parse a raw argument string into an input mapping
    ///
    /// Malformed JSON degrades to an empty object rather than failing
    /// the call.
    pub fn parse_arguments(raw: &str) -> Value {
        serde_json::from_str(raw).unwrap_or_else(|_| Value::Object(Default::default()))
    }

    /// Get an input argument by key
    pub fn get_arg(&self, key: &str) -> Option<&Value> {
        self.input.get(key)
    }

    /// Get an input argument as a string
    pub fn get_arg_str(&self, key: &str) -> Option<&str> {
        self.input.get(key).and_then(|v| v.as_str())
    }
}

/// Outcome of one tool execution
///
/// Exactly one of `result`/`error` is set; the constructors are the
/// only way to build a value, so the invariant holds by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Name of the executed tool
    pub tool: String,
    /// Serialized result on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Stringified error on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful tool result
    pub fn success(tool: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            result: Some(result.into()),
            error: None,
        }
    }

    /// Create a failed tool result
    pub fn error(tool: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            result: None,
            error: Some(error.into()),
        }
    }

    /// Whether this result represents a failure
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Result text, falling back to the error, then to `"No result"`
    pub fn output(&self) -> &str {
        self.result
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or("No result")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_def_creation() {
        let tool = ToolDef::new("get_weather", "Get the current weather").with_schema(json!({
            "type": "object",
            "properties": {
                "location": { "type": "string" }
            },
            "required": ["location"]
        }));

        assert_eq!(tool.name, "get_weather");
        assert!(tool.input_schema.is_some());
    }

    #[test]
    fn test_tool_call_args() {
        let call = ToolCall::new(
            "get_weather",
            json!({
                "location": "San Francisco",
                "units": "celsius"
            }),
        );

        assert_eq!(call.get_arg_str("location"), Some("San Francisco"));
        assert_eq!(call.get_arg_str("units"), Some("celsius"));
        assert_eq!(call.get_arg_str("nonexistent"), None);
    }

    #[test]
    fn test_malformed_arguments_degrade_to_empty_map() {
        let parsed = ToolCall::parse_arguments("{not valid json");
        assert_eq!(parsed, json!({}));

        let valid = ToolCall::parse_arguments(r#"{"a": 1}"#);
        assert_eq!(valid, json!({"a": 1}));
    }

    #[test]
    fn test_tool_result_exactly_one_side() {
        let ok = ToolResult::success("search", "3 hits");
        assert!(!ok.is_error());
        assert_eq!(ok.output(), "3 hits");
        assert!(ok.error.is_none());

        let err = ToolResult::error("search", "timeout");
        assert!(err.is_error());
        assert_eq!(err.output(), "timeout");
        assert!(err.result.is_none());
    }

    #[test]
    fn test_tool_result_serialization_omits_absent_side() {
        let ok = ToolResult::success("search", "3 hits");
        let json = serde_json::to_string(&ok).unwrap();
        assert!(json.contains("\"result\""));
        assert!(!json.contains("\"error\""));
    }
}
