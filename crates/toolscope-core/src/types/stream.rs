//! Streaming event protocol for conversation turns

use serde::{Deserialize, Serialize};

use super::response::ChatTurn;
use super::tool::ToolCall;

/// Phase marker within a streamed turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    /// Before the first backend invocation
    InitialResponse,
    /// Before any tool call begins (only emitted if there is at least
    /// one tool call)
    ToolExecution,
    /// Before the second backend invocation
    FinalResponse,
}

/// Event emitted while a turn is in flight
///
/// A turn is re-expressed as an ordered sequence of these events;
/// `Done` is always the last event and carries the complete result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental assistant content from the initial invocation
    Content { content: String },
    /// The backend requested a tool invocation
    ToolCall {
        #[serde(rename = "toolCall")]
        tool_call: ToolCall,
    },
    /// A tool finished successfully
    ToolResult {
        #[serde(rename = "toolName")]
        tool_name: String,
        result: String,
    },
    /// A tool failed; the turn continues
    ToolError {
        #[serde(rename = "toolName")]
        tool_name: String,
        error: String,
    },
    /// The turn entered a new phase
    Phase { phase: TurnPhase },
    /// Incremental assistant content from the final invocation
    FinalContent { content: String },
    /// Filtering metadata for the initial invocation
    Metadata {
        #[serde(rename = "filteredToolsCount")]
        filtered_tools_count: usize,
        #[serde(rename = "filteredTools")]
        filtered_tools: Vec<String>,
        #[serde(rename = "usedFiltering")]
        used_filtering: bool,
        #[serde(rename = "toolCalls")]
        tool_calls: Vec<ToolCall>,
    },
    /// Terminal event carrying the complete structured turn
    Done {
        #[serde(rename = "final_response")]
        final_response: ChatTurn,
    },
}

impl StreamEvent {
    /// Get the text if this is a content or final-content event
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StreamEvent::Content { content } | StreamEvent::FinalContent { content } => {
                Some(content)
            }
            _ => None,
        }
    }

    /// Check if this is the terminal event
    pub fn is_done(&self) -> bool {
        matches!(self, StreamEvent::Done { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_serialization_tags() {
        let ev = StreamEvent::Content {
            content: "Hello".to_string(),
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"type\":\"content\""));

        let ev = StreamEvent::Phase {
            phase: TurnPhase::ToolExecution,
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"phase\":\"tool_execution\""));
    }

    #[test]
    fn test_tool_event_wire_names() {
        let ev = StreamEvent::ToolError {
            tool_name: "search".to_string(),
            error: "timeout".to_string(),
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"type\":\"tool_error\""));
        assert!(json.contains("\"toolName\":\"search\""));
    }

    #[test]
    fn test_as_text() {
        let ev = StreamEvent::FinalContent {
            content: "done".to_string(),
        };
        assert_eq!(ev.as_text(), Some("done"));

        let ev = StreamEvent::ToolCall {
            tool_call: ToolCall::new("x", json!({})),
        };
        assert_eq!(ev.as_text(), None);
    }
}
