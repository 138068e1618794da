//! Structured results of a conversation turn

use serde::{Deserialize, Serialize};

use super::tool::{ToolCall, ToolResult};

/// Result of a single model invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Assistant text content
    pub content: String,
    /// Tool invocations the model requested
    #[serde(rename = "toolCalls")]
    pub tool_calls: Vec<ToolCall>,
    /// How many tools were offered to the model
    #[serde(rename = "filteredToolsCount")]
    pub filtered_tools_count: usize,
    /// Names of the offered tools
    #[serde(rename = "filteredTools")]
    pub filtered_tools: Vec<String>,
    /// Whether relevance filtering selected the toolset
    #[serde(rename = "usedFiltering")]
    pub used_filtering: bool,
}

/// Result of a full turn: initial invocation, tool execution and the
/// final answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Final assistant content
    pub content: String,
    /// Assistant content from the first invocation, when a second one
    /// happened
    #[serde(rename = "initialResponse", skip_serializing_if = "Option::is_none")]
    pub initial_response: Option<String>,
    /// Tool invocations the model requested
    #[serde(rename = "toolCalls")]
    pub tool_calls: Vec<ToolCall>,
    /// Outcomes of the executed tool calls, in execution order
    #[serde(rename = "toolResults")]
    pub tool_results: Vec<ToolResult>,
    #[serde(rename = "filteredToolsCount")]
    pub filtered_tools_count: usize,
    #[serde(rename = "filteredTools")]
    pub filtered_tools: Vec<String>,
    #[serde(rename = "usedFiltering")]
    pub used_filtering: bool,
}

impl ChatTurn {
    /// Build a turn that ended after the first invocation (no tool
    /// calls requested)
    pub fn without_tools(response: ChatResponse) -> Self {
        Self {
            content: response.content,
            initial_response: None,
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            filtered_tools_count: response.filtered_tools_count,
            filtered_tools: response.filtered_tools,
            used_filtering: response.used_filtering,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_serialization_uses_wire_names() {
        let turn = ChatTurn {
            content: "done".to_string(),
            initial_response: None,
            tool_calls: vec![],
            tool_results: vec![],
            filtered_tools_count: 2,
            filtered_tools: vec!["a".to_string(), "b".to_string()],
            used_filtering: true,
        };

        let json = serde_json::to_string(&turn).unwrap();
        assert!(json.contains("\"filteredToolsCount\":2"));
        assert!(json.contains("\"usedFiltering\":true"));
        assert!(!json.contains("initialResponse"));
    }
}
