//! Core data model shared across the crate

mod message;
mod response;
mod stream;
mod tool;

pub use message::{Message, MessageRole};
pub use response::{ChatResponse, ChatTurn};
pub use stream::{StreamEvent, TurnPhase};
pub use tool::{ToolCall, ToolDef, ToolResult};
