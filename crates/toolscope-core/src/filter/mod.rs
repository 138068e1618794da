//! Tool relevance filtering
//!
//! Normalizes raw tool definitions into searchable descriptors and
//! ranks them against a query with BM25 scoring plus hand-tuned
//! relevance boosts and a diversity-constrained selection.

mod bm25;
mod descriptor;

pub use bm25::{Bm25ToolFilter, RankedTool, RankingWeights, BM25_B, BM25_K1};
pub use descriptor::ToolDescriptor;

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Session-derived hints that bias ranking without hard-filtering
#[derive(Debug, Clone, Default)]
pub struct FilterContext {
    /// Names of tools used earlier in the session, in order
    pub previous_tools: Vec<String>,
    /// Free-text hints about which tools might be relevant
    pub tool_hints: Vec<String>,
}

impl FilterContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Record previously used tools
    pub fn with_previous_tools(mut self, tools: impl IntoIterator<Item = String>) -> Self {
        self.previous_tools = tools.into_iter().collect();
        self
    }

    /// Record free-text hints
    pub fn with_hints(mut self, hints: impl IntoIterator<Item = String>) -> Self {
        self.tool_hints = hints.into_iter().collect();
        self
    }
}

/// Words too common to carry relevance signal
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "and", "for", "with", "from", "this", "that", "will", "can", "are", "was", "were",
        "been", "have", "has", "had", "does", "did", "not", "but", "what", "when", "where",
        "which", "who", "how", "why", "all", "would", "there", "their", "your", "more", "other",
        "some", "into", "only", "also", "than", "many", "must", "should", "could",
    ]
    .into_iter()
    .collect()
});

/// Lower-cased alphabetic word runs of a text
fn alpha_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Tokenize text for indexing and queries
///
/// Lower-cased alphabetic words only, with stop words and tokens of
/// length <= 2 removed.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    alpha_words(text)
        .into_iter()
        .filter(|t| t.len() > 2 && !STOP_WORDS.contains(t.as_str()))
        .collect()
}

/// Meaningful words of a description: alphabetic, longer than 3
/// characters, not a stop word
pub(crate) fn description_words(text: &str) -> Vec<String> {
    alpha_words(text)
        .into_iter()
        .filter(|w| w.len() > 3 && !STOP_WORDS.contains(w.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_drops_stop_words_and_short_tokens() {
        let tokens = tokenize("Get the transcript for a YouTube video");
        assert!(tokens.contains(&"transcript".to_string()));
        assert!(tokens.contains(&"youtube".to_string()));
        assert!(!tokens.contains(&"the".to_string()));
        assert!(!tokens.contains(&"for".to_string()));
        // "a" is too short
        assert!(!tokens.iter().any(|t| t.len() <= 2));
    }

    #[test]
    fn test_tokenize_empty_for_noise() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("a of 42 !!").is_empty());
        assert!(tokenize("the and for").is_empty());
    }

    #[test]
    fn test_description_words_length_floor() {
        let words = description_words("Read the text of a file fast");
        assert!(words.contains(&"text".to_string()));
        assert!(words.contains(&"file".to_string()));
        assert!(words.contains(&"fast".to_string()));
        // "read" passes the length floor, "of"/"a" do not
        assert!(words.contains(&"read".to_string()));
        assert!(!words.contains(&"of".to_string()));
    }
}
