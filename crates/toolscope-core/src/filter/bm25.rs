//! BM25-backed tool relevance ranking

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::descriptor::ToolDescriptor;
use super::{tokenize, FilterContext};
use crate::logging::Logger;
use crate::types::ToolDef;

/// BM25 length-normalization parameter
pub const BM25_B: f64 = 1.5;
/// BM25 term-frequency saturation parameter
pub const BM25_K1: f64 = 0.75;

/// Minimum number of results kept even below the score floor, when
/// enough candidates scored positively
const MIN_GUARANTEED_RESULTS: usize = 3;

/// Placeholder token keeping the index well-defined when every
/// document tokenizes to nothing
const PLACEHOLDER_TOKEN: &str = "dummy";

/// Calibration constants for relevance scoring
///
/// The magnitudes are empirically chosen carry-overs, not derived
/// optima; they are exposed as configuration so deployments can retune
/// without a code change.
#[derive(Debug, Clone)]
pub struct RankingWeights {
    /// Multiplier bringing raw BM25 scores into the boost range
    pub bm25_scale: f64,
    /// Full query appearing inside the tool name
    pub exact_name_boost: f64,
    /// Any single query token appearing inside the tool name
    pub token_name_boost: f64,
    /// A tool category appearing inside the query
    pub category_boost: f64,
    /// A previously used tool sharing the candidate's namespace
    pub related_tool_boost: f64,
    /// A hint matching the tool name
    pub hint_name_boost: f64,
    /// A hint matching a tool category
    pub hint_category_boost: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            bm25_scale: 10.0,
            exact_name_boost: 50.0,
            token_name_boost: 20.0,
            category_boost: 30.0,
            related_tool_boost: 10.0,
            hint_name_boost: 20.0,
            hint_category_boost: 15.0,
        }
    }
}

/// A descriptor paired with its total relevance score
#[derive(Debug, Clone)]
pub struct RankedTool {
    pub descriptor: ToolDescriptor,
    pub score: f64,
}

impl RankedTool {
    /// Name of the ranked tool
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }
}

/// Inverted statistics for BM25 scoring over the tokenized corpus
struct Bm25Index {
    term_freqs: Vec<HashMap<String, usize>>,
    doc_lens: Vec<usize>,
    doc_freqs: HashMap<String, usize>,
    avg_doc_len: f64,
}

impl Bm25Index {
    fn build(corpus: &[Vec<String>]) -> Self {
        let mut term_freqs = Vec::with_capacity(corpus.len());
        let mut doc_lens = Vec::with_capacity(corpus.len());
        let mut doc_freqs: HashMap<String, usize> = HashMap::new();

        for doc in corpus {
            let mut freqs: HashMap<String, usize> = HashMap::new();
            for token in doc {
                *freqs.entry(token.clone()).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
            doc_lens.push(doc.len());
            term_freqs.push(freqs);
        }

        let total: usize = doc_lens.iter().sum();
        let avg_doc_len = total as f64 / doc_lens.len().max(1) as f64;

        Self {
            term_freqs,
            doc_lens,
            doc_freqs,
            avg_doc_len,
        }
    }

    fn doc_count(&self) -> usize {
        self.doc_lens.len()
    }

    /// BM25 score of one document against a tokenized query
    fn score(&self, doc: usize, query_tokens: &[String]) -> f64 {
        let Some(freqs) = self.term_freqs.get(doc) else {
            return 0.0;
        };
        let n = self.doc_count() as f64;
        let doc_len = self.doc_lens[doc] as f64;
        let avg = self.avg_doc_len.max(f64::EPSILON);

        let mut score = 0.0;
        for token in query_tokens {
            let Some(&tf) = freqs.get(token) else {
                continue;
            };
            let df = *self.doc_freqs.get(token).unwrap_or(&0) as f64;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
            let tf = tf as f64;
            let denom = tf + BM25_K1 * (1.0 - BM25_B + BM25_B * doc_len / avg);
            score += idf * (tf * (BM25_K1 + 1.0)) / denom;
        }
        score
    }
}

/// Serializable cache snapshot; persistence is in-memory for the
/// process lifetime only
#[derive(Serialize)]
struct CacheSnapshot<'a> {
    tool_hash: &'a str,
    corpus: &'a [Vec<String>],
    tool_indices: &'a HashMap<String, usize>,
    categories: &'a BTreeMap<String, Vec<usize>>,
}

/// Lexical tool filter ranking descriptors against a query
///
/// Owns its index and cache exclusively; callers serialize concurrent
/// `add_tools` invocations themselves.
pub struct Bm25ToolFilter {
    tools: Vec<ToolDescriptor>,
    tool_indices: HashMap<String, usize>,
    categories: BTreeMap<String, Vec<usize>>,
    corpus: Vec<Vec<String>>,
    index: Option<Bm25Index>,
    index_hash: Option<String>,
    cache_snapshot: Option<String>,
    use_cache: bool,
    sync_tools: bool,
    weights: RankingWeights,
    logger: Arc<dyn Logger>,
}

impl Bm25ToolFilter {
    /// Create a new filter
    ///
    /// `sync_tools` forces the cached index to be invalidated on the
    /// next build even if the catalog content is unchanged.
    pub fn new(use_cache: bool, sync_tools: bool, logger: Arc<dyn Logger>) -> Self {
        Self {
            tools: Vec::new(),
            tool_indices: HashMap::new(),
            categories: BTreeMap::new(),
            corpus: Vec::new(),
            index: None,
            index_hash: None,
            cache_snapshot: None,
            use_cache,
            sync_tools,
            weights: RankingWeights::default(),
            logger,
        }
    }

    /// Override the scoring calibration
    pub fn with_weights(mut self, weights: RankingWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Ingest tool definitions and (re)build the relevance index
    ///
    /// Registration is keyed by name: the first definition for a name
    /// wins and re-adding it is a no-op. When the resulting catalog
    /// content is unchanged the existing index is reused.
    pub fn add_tools(&mut self, defs: &[ToolDef]) {
        for def in defs {
            if self.tool_indices.contains_key(&def.name) {
                self.logger
                    .debug(&format!("[Bm25ToolFilter] Tool already registered: {}", def.name));
                continue;
            }

            let descriptor = ToolDescriptor::from_def(def);
            let idx = self.tools.len();
            self.tool_indices.insert(def.name.clone(), idx);
            for category in descriptor.categories() {
                self.categories.entry(category.to_string()).or_default().push(idx);
            }
            self.tools.push(descriptor);
        }

        let hash = self.compute_tools_hash();
        if !self.sync_tools && self.index.is_some() && self.index_hash.as_deref() == Some(hash.as_str()) {
            self.logger
                .debug("[Bm25ToolFilter] Catalog unchanged, reusing cached index");
            return;
        }
        if self.sync_tools {
            self.cache_snapshot = None;
            self.logger.debug("[Bm25ToolFilter] Cache invalidated by sync flag");
        }

        let mut corpus: Vec<Vec<String>> = self
            .tools
            .iter()
            .map(|tool| tokenize(&create_tool_document(tool)))
            .collect();

        if !corpus.is_empty() && corpus.iter().all(Vec::is_empty) {
            for doc in &mut corpus {
                doc.push(PLACEHOLDER_TOKEN.to_string());
            }
        }

        self.index = Some(Bm25Index::build(&corpus));
        self.corpus = corpus;
        self.index_hash = Some(hash);
        self.sync_tools = false;
        self.save_cache();
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// All registered descriptors in insertion order
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// All discovered categories
    pub fn categories(&self) -> Vec<String> {
        self.categories.keys().cloned().collect()
    }

    /// Descriptors belonging to one category
    pub fn tools_by_category(&self, category: &str) -> Vec<&ToolDescriptor> {
        self.categories
            .get(&category.to_lowercase())
            .map(|indices| indices.iter().map(|&i| &self.tools[i]).collect())
            .unwrap_or_default()
    }

    /// Rank tools against a query and return the most relevant subset
    ///
    /// Queries that tokenize to nothing produce an empty result. The
    /// `min_score` floor is overridden to keep the top three candidates
    /// when at least three scored positively.
    pub fn filter_tools(
        &self,
        query: &str,
        max_tools: usize,
        min_score: f64,
        context: Option<&FilterContext>,
    ) -> Vec<RankedTool> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }
        let Some(index) = &self.index else {
            return Vec::new();
        };
        self.logger
            .debug(&format!("[Bm25ToolFilter] Query tokens: {:?}", query_tokens));

        let query_lower = query.to_lowercase();
        let mut scored: Vec<(f64, usize)> = Vec::new();

        for (idx, tool) in self.tools.iter().enumerate() {
            let mut total = index.score(idx, &query_tokens) * self.weights.bm25_scale;

            // Exact query-in-name match dominates token matches; the
            // two are mutually exclusive
            let name_lower = tool.name().to_lowercase();
            if !name_lower.is_empty() && name_lower.contains(&query_lower) {
                total += self.weights.exact_name_boost;
            } else if query_tokens.iter().any(|t| name_lower.contains(t.as_str())) {
                total += self.weights.token_name_boost;
            }

            // First category found inside the query wins
            for category in tool.categories() {
                if query_lower.contains(category) {
                    total += self.weights.category_boost;
                    break;
                }
            }

            if let Some(context) = context {
                for previous in &context.previous_tools {
                    if shares_namespace(previous, tool.name()) {
                        total += self.weights.related_tool_boost;
                    }
                }
                for hint in &context.tool_hints {
                    let hint_lower = hint.to_lowercase();
                    if name_lower.contains(&hint_lower) {
                        total += self.weights.hint_name_boost;
                    } else if tool.categories().any(|c| c.contains(&hint_lower)) {
                        total += self.weights.hint_category_boost;
                    }
                }
            }

            if total > 0.0 {
                scored.push((total, idx));
            }
        }

        // Stable sort: ties keep catalog order
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut surviving: Vec<(f64, usize)> =
            scored.iter().copied().filter(|(score, _)| *score >= min_score).collect();

        // Minimum-viable-result guarantee
        if surviving.len() < MIN_GUARANTEED_RESULTS && scored.len() >= MIN_GUARANTEED_RESULTS {
            surviving = scored[..MIN_GUARANTEED_RESULTS].to_vec();
        }

        let selected = if surviving.len() > max_tools {
            self.apply_diversity(&surviving, max_tools)
        } else {
            surviving.truncate(max_tools);
            surviving
        };

        selected
            .into_iter()
            .map(|(score, idx)| RankedTool {
                descriptor: self.tools[idx].clone(),
                score,
            })
            .collect()
    }

    /// Greedy diversity-constrained selection over score-sorted
    /// candidates
    ///
    /// No category may exceed `max(2, max_results / 3)` selections, so
    /// a dominant namespace cannot crowd out relevant tools from
    /// smaller ones.
    fn apply_diversity(&self, scored: &[(f64, usize)], max_results: usize) -> Vec<(f64, usize)> {
        let mut selected = Vec::new();
        let mut category_counts: HashMap<String, usize> = HashMap::new();
        let max_per_category = std::cmp::max(2, max_results / 3);

        for &(score, idx) in scored {
            let tool = &self.tools[idx];
            let tool_categories: Vec<String> = if tool.has_categories() {
                tool.categories().map(str::to_string).collect()
            } else {
                vec!["default".to_string()]
            };

            let can_add = tool_categories
                .iter()
                .all(|c| category_counts.get(c).copied().unwrap_or(0) < max_per_category);

            if can_add {
                selected.push((score, idx));
                for category in tool_categories {
                    *category_counts.entry(category).or_insert(0) += 1;
                }
            }

            if selected.len() >= max_results {
                break;
            }
        }

        selected
    }

    /// Content hash of the catalog for cache validation
    fn compute_tools_hash(&self) -> String {
        let pairs: Vec<(&str, &str)> = self
            .tools
            .iter()
            .map(|t| (t.name(), t.description()))
            .collect();
        let serialized = serde_json::to_string(&pairs).unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(serialized.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Persist the index snapshot; failures are logged and swallowed,
    /// the in-memory index stays authoritative
    fn save_cache(&mut self) {
        if !self.use_cache {
            return;
        }

        let snapshot = CacheSnapshot {
            tool_hash: self.index_hash.as_deref().unwrap_or(""),
            corpus: &self.corpus,
            tool_indices: &self.tool_indices,
            categories: &self.categories,
        };

        match serde_json::to_string(&snapshot) {
            Ok(serialized) => {
                self.cache_snapshot = Some(serialized);
                self.logger.debug("[Bm25ToolFilter] Saved index cache");
            }
            Err(e) => {
                self.logger
                    .debug(&format!("[Bm25ToolFilter] Failed to save cache: {}", e));
            }
        }
    }
}

/// Synthesize the searchable document for one tool
///
/// Parts in order: raw name, name with separators spaced out,
/// description, categories twice (up-weighted), first 20 keywords.
fn create_tool_document(tool: &ToolDescriptor) -> String {
    let name = tool.name();
    let split_name: String = name
        .chars()
        .map(|c| if c == '_' { ' ' } else { c })
        .collect();

    let categories: Vec<&str> = tool.categories().collect();
    let categories_once = categories.join(" ");
    let keywords: Vec<&str> = tool.keywords().take(20).collect();

    let parts = [
        name,
        split_name.as_str(),
        tool.description(),
        categories_once.as_str(),
        categories_once.as_str(),
        keywords.join(" ").as_str(),
    ]
    .iter()
    .filter(|p| !p.is_empty())
    .copied()
    .collect::<Vec<_>>()
    .join(" ");

    parts
}

/// Whether two tool names share the same namespace prefix
fn shares_namespace(first: &str, second: &str) -> bool {
    match (
        first.split_once(super::descriptor::NAMESPACE_SEPARATOR),
        second.split_once(super::descriptor::NAMESPACE_SEPARATOR),
    ) {
        (Some((a, _)), Some((b, _))) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use serde_json::json;

    fn test_filter() -> Bm25ToolFilter {
        Bm25ToolFilter::new(true, false, Arc::new(NoOpLogger::new()))
    }

    fn sample_defs() -> Vec<ToolDef> {
        vec![
            ToolDef::new("youtube__get_transcript", "Fetch transcript for a video"),
            ToolDef::new("files__read", "Read a file"),
            ToolDef::new("files__write", "Write contents to a file"),
            ToolDef::new("mail__send", "Send an email message"),
        ]
    }

    #[test]
    fn test_empty_query_returns_nothing() {
        let mut filter = test_filter();
        filter.add_tools(&sample_defs());

        assert!(filter.filter_tools("", 10, 0.0, None).is_empty());
        assert!(filter.filter_tools("the of a", 10, 0.0, None).is_empty());
    }

    #[test]
    fn test_exact_category_and_name_win() {
        let mut filter = test_filter();
        filter.add_tools(&sample_defs());

        let ranked = filter.filter_tools("get the youtube transcript", 5, 1.0, None);
        assert!(!ranked.is_empty());
        assert_eq!(ranked[0].name(), "youtube__get_transcript");
    }

    #[test]
    fn test_exact_name_match_outranks_token_match() {
        let mut filter = test_filter();
        filter.add_tools(&[
            ToolDef::new("search", "Look things up"),
            ToolDef::new("research_notes", "Keep notes"),
        ]);

        let ranked = filter.filter_tools("search", 5, 0.0, None);
        assert_eq!(ranked[0].name(), "search");
        // Exact boost dominates even though both names contain the token
        if ranked.len() > 1 {
            assert!(ranked[0].score > ranked[1].score);
        }
    }

    #[test]
    fn test_min_score_floor_with_top3_override() {
        let mut filter = test_filter();
        filter.add_tools(&sample_defs());

        // An absurd floor still yields the top three when at least
        // three candidates scored positively
        let ranked = filter.filter_tools("read the file or send mail", 10, 1_000.0, None);
        assert_eq!(ranked.len(), 3);
    }

    #[test]
    fn test_min_score_floor_applies_when_enough_pass() {
        let mut filter = test_filter();
        filter.add_tools(&sample_defs());

        let loose = filter.filter_tools("read the file or send mail", 10, 0.1, None);
        assert!(loose.len() >= 3);
        for tool in &loose {
            assert!(tool.score > 0.0);
        }
    }

    #[test]
    fn test_max_tools_truncates() {
        let mut filter = test_filter();
        filter.add_tools(&sample_defs());

        let ranked = filter.filter_tools("file read write youtube mail", 2, 0.0, None);
        assert!(ranked.len() <= 2);
    }

    #[test]
    fn test_diversity_limits_category_domination() {
        let mut filter = test_filter();
        let mut defs: Vec<ToolDef> = (0..8)
            .map(|i| ToolDef::new(format!("files__op{}", i), "Operate on a file path"))
            .collect();
        defs.push(ToolDef::new("mail__send_file", "Send a file by mail"));
        defs.push(ToolDef::new("web__file_search", "Search the web for a file"));
        filter.add_tools(&defs);

        let ranked = filter.filter_tools("file", 6, 0.0, None);
        let files_count = ranked
            .iter()
            .filter(|t| t.name().starts_with("files__"))
            .count();
        // max(2, 6/3) = 2 per category
        assert!(files_count <= 2, "files category crowded out the rest: {}", files_count);
        assert!(ranked.len() > files_count);
    }

    #[test]
    fn test_context_previous_tools_boost_namespace() {
        let mut filter = test_filter();
        filter.add_tools(&sample_defs());

        let context = FilterContext::new()
            .with_previous_tools(vec!["mail__list_folders".to_string()]);
        let with_context = filter.filter_tools("send a message", 5, 0.0, Some(&context));
        let without = filter.filter_tools("send a message", 5, 0.0, None);

        let score_with = with_context
            .iter()
            .find(|t| t.name() == "mail__send")
            .map(|t| t.score)
            .unwrap_or(0.0);
        let score_without = without
            .iter()
            .find(|t| t.name() == "mail__send")
            .map(|t| t.score)
            .unwrap_or(0.0);
        assert!(score_with > score_without);
    }

    #[test]
    fn test_hint_name_beats_hint_category() {
        let mut filter = test_filter();
        filter.add_tools(&sample_defs());
        let weights = RankingWeights::default();
        assert!(weights.hint_name_boost > weights.hint_category_boost);

        let context = FilterContext::new().with_hints(vec!["transcript".to_string()]);
        let ranked = filter.filter_tools("video", 5, 0.0, Some(&context));
        assert_eq!(ranked[0].name(), "youtube__get_transcript");
    }

    #[test]
    fn test_readding_same_set_is_cache_hit() {
        let mut filter = test_filter();
        filter.add_tools(&sample_defs());
        let hash_before = filter.index_hash.clone();
        let snapshot_before = filter.cache_snapshot.clone();

        filter.add_tools(&sample_defs());
        assert_eq!(filter.len(), 4);
        assert_eq!(filter.index_hash, hash_before);
        // No rebuild happened, so the snapshot object is untouched
        assert_eq!(filter.cache_snapshot, snapshot_before);
    }

    #[test]
    fn test_sync_tools_forces_rebuild() {
        let mut filter = Bm25ToolFilter::new(true, true, Arc::new(NoOpLogger::new()));
        filter.add_tools(&sample_defs());
        assert!(filter.index.is_some());

        // The sync flag is consumed by the first build
        assert!(!filter.sync_tools);
    }

    #[test]
    fn test_all_empty_documents_get_placeholder() {
        let mut filter = test_filter();
        filter.add_tools(&[ToolDef::new("", ""), ToolDef::new("-", "")]);

        assert!(filter.corpus.iter().all(|d| d == &vec![PLACEHOLDER_TOKEN.to_string()]));
        assert!(filter.filter_tools("anything useful", 5, 0.0, None).is_empty());
    }

    #[test]
    fn test_category_introspection() {
        let mut filter = test_filter();
        filter.add_tools(&sample_defs());

        let categories = filter.categories();
        assert!(categories.contains(&"youtube".to_string()));
        assert!(categories.contains(&"files".to_string()));

        let files = filter.tools_by_category("FILES");
        assert_eq!(files.len(), 2);
        assert!(filter.tools_by_category("unknown").is_empty());
    }

    #[test]
    fn test_malformed_descriptor_never_panics() {
        let mut filter = test_filter();
        filter.add_tools(&[ToolDef::new("odd tool", "").with_schema(json!("not an object"))]);

        let ranked = filter.filter_tools("odd tool", 5, 0.0, None);
        assert_eq!(ranked.len(), 1);
    }
}
