//! In-memory tool host
//!
//! Serves a preset catalog with canned outcomes. Used in tests and in
//! embedding contexts that bring their own tool implementations.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{HostError, HostResult, ToolHost};
use crate::types::ToolDef;

/// Canned outcome for one tool
enum Outcome {
    Ok(Value),
    Err(String),
}

/// A tool host backed by preset definitions and outcomes
///
/// Tools without a registered outcome echo their arguments back, which
/// is enough for most agent-loop tests.
#[derive(Default)]
pub struct StaticToolHost {
    tools: Vec<ToolDef>,
    outcomes: HashMap<String, Outcome>,
    calls: Mutex<Vec<String>>,
}

impl StaticToolHost {
    /// Create a host serving the given definitions
    pub fn new(tools: Vec<ToolDef>) -> Self {
        Self {
            tools,
            outcomes: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Register a successful outcome for a tool
    pub fn with_result(mut self, name: impl Into<String>, result: Value) -> Self {
        self.outcomes.insert(name.into(), Outcome::Ok(result));
        self
    }

    /// Register a failing outcome for a tool
    pub fn with_error(mut self, name: impl Into<String>, message: impl Into<String>) -> Self {
        self.outcomes.insert(name.into(), Outcome::Err(message.into()));
        self
    }

    /// Names of executed tools, in call order
    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ToolHost for StaticToolHost {
    async fn connect(&self) -> HostResult<()> {
        Ok(())
    }

    async fn list_tools(&self) -> HostResult<Vec<ToolDef>> {
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> HostResult<Value> {
        if !self.tools.iter().any(|t| t.name == name) {
            return Err(HostError::ToolNotFound(name.to_string()));
        }
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(name.to_string());

        match self.outcomes.get(name) {
            Some(Outcome::Ok(value)) => Ok(value.clone()),
            Some(Outcome::Err(message)) => Err(HostError::Execution(message.clone())),
            None => Ok(arguments),
        }
    }

    async fn close(&self) -> HostResult<()> {
        Ok(())
    }
}
