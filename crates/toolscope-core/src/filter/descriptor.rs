//! Normalized tool descriptors with derived search metadata

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::description_words;
use crate::types::ToolDef;

/// Separator between a tool's namespace prefix and its local name
pub(crate) const NAMESPACE_SEPARATOR: &str = "__";

/// Normalized record describing one remotely invocable tool
///
/// `categories` and `keywords` are derived from the raw definition at
/// construction and only ever grow; they are exposed read-only so no
/// other component can mutate them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    name: String,
    description: String,
    server: String,
    parameters: Value,
    categories: BTreeSet<String>,
    keywords: BTreeSet<String>,
}

impl ToolDescriptor {
    /// Build a descriptor from a raw tool definition, deriving
    /// searchable keywords and categories
    ///
    /// Never fails; missing fields degrade to empty values.
    pub fn from_def(def: &ToolDef) -> Self {
        let mut descriptor = Self {
            name: def.name.clone(),
            description: def.description.clone(),
            server: extract_server(&def.name),
            parameters: def.input_schema.clone().unwrap_or(Value::Object(Default::default())),
            categories: BTreeSet::new(),
            keywords: BTreeSet::new(),
        };
        descriptor.extract_metadata();
        descriptor
    }

    /// Tool name (unique within a catalog, the join key back to the
    /// original definition)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tool description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Originating service namespace, `"default"` when the name
    /// carries no prefix
    pub fn server(&self) -> &str {
        &self.server
    }

    /// JSON-schema-shaped parameter mapping
    pub fn parameters(&self) -> &Value {
        &self.parameters
    }

    /// Derived categories
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(String::as_str)
    }

    /// Derived keywords, in deterministic order
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }

    /// Whether the descriptor carries any category
    pub fn has_categories(&self) -> bool {
        !self.categories.is_empty()
    }

    fn extract_metadata(&mut self) {
        // Every token of the name becomes a keyword
        for part in self
            .name
            .to_lowercase()
            .split(|c: char| !c.is_ascii_alphanumeric())
        {
            if !part.is_empty() {
                self.keywords.insert(part.to_string());
            }
        }

        // A namespace prefix encodes the originating service
        if let Some((service, _)) = self.name.split_once(NAMESPACE_SEPARATOR) {
            self.categories.insert(service.to_lowercase());
        }

        // First ten meaningful description words
        for word in description_words(&self.description).into_iter().take(10) {
            self.keywords.insert(word);
        }

        let parameters = self.parameters.clone();
        self.extract_param_keywords(&parameters);
    }

    /// Walk a parameter schema's properties; described properties
    /// contribute their name and description words as keywords
    fn extract_param_keywords(&mut self, schema: &Value) {
        let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
            return;
        };

        for (prop_name, prop_schema) in properties {
            let Some(description) = prop_schema.get("description").and_then(Value::as_str) else {
                continue;
            };

            self.keywords.insert(prop_name.to_lowercase());
            for word in description_words(description) {
                self.keywords.insert(word);
            }

            self.extract_param_keywords(prop_schema);
        }
    }
}

/// Derive the server namespace from a tool name
pub(crate) fn extract_server(name: &str) -> String {
    match name.split_once(NAMESPACE_SEPARATOR) {
        Some((prefix, _)) => prefix.to_string(),
        None => "default".to_string(),
    }
}
