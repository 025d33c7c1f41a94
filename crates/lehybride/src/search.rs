// Core search engine implementation
//
// *Le Moteur* (The Engine) - Snapshot-published hybrid index with fused ranking

use crate::config::EngineConfig;
use crate::document::{self, Document, DocumentInput, Metadata};
use crate::embedding::{Embedder, EmbedderChoice, EmbedderKind};
use crate::error::{Error, Result};
use crate::keyword::KeywordIndex;
use crate::ranking::{HybridScorer, Score};
use crate::vector::{is_zero, Normalization, VectorIndex};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Search query
///
/// # Example
///
/// ```
/// use lehybride::{MetadataFilter, SearchQuery};
///
/// let query = SearchQuery::new("return window")
///     .with_top_k(3)
///     .with_semantic_weight(0.5)
///     .with_filter(MetadataFilter::new().with("category", "policy"));
/// assert_eq!(query.top_k, Some(3));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Query text
    pub text: String,

    /// Maximum results to return, engine default when absent
    #[serde(default)]
    pub top_k: Option<usize>,

    /// Semantic weight override, engine default when absent
    #[serde(default)]
    pub semantic_weight: Option<f32>,

    /// Restrict results to documents with matching metadata
    #[serde(default)]
    pub filter: Option<MetadataFilter>,
}

impl SearchQuery {
    /// Create a query with engine defaults
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Set the number of results
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Override the semantic weight
    #[must_use]
    pub fn with_semantic_weight(mut self, semantic_weight: f32) -> Self {
        self.semantic_weight = Some(semantic_weight);
        self
    }

    /// Restrict to documents matching `filter`
    #[must_use]
    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Exact-match metadata filter
///
/// A document passes when every condition key is present in its metadata
/// with an equal JSON value. An empty filter accepts everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataFilter {
    conditions: Metadata,
}

impl MetadataFilter {
    /// Create an empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to equal `value`
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    /// Check document metadata against every condition
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.conditions
            .iter()
            .all(|(key, expected)| metadata.get(key) == Some(expected))
    }

    /// Whether the filter has no conditions
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Search result
///
/// Serializes flat as `{document_id, content, metadata, relevance_score,
/// semantic_score, keyword_score}`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Matched document
    pub document: Document,

    /// Fused score
    pub relevance_score: f32,

    /// Cosine similarity (0.0 if not a semantic candidate)
    pub semantic_score: f32,

    /// Normalized keyword score (0.0 if no token matched)
    pub keyword_score: f32,
}

impl SearchResult {
    fn new(document: Document, score: Score) -> Self {
        Self {
            document,
            relevance_score: score.relevance,
            semantic_score: score.semantic,
            keyword_score: score.keyword,
        }
    }

    /// Id of the matched document
    pub fn id(&self) -> &str {
        &self.document.id
    }

    /// Score components
    pub fn score(&self) -> Score {
        Score {
            relevance: self.relevance_score,
            semantic: self.semantic_score,
            keyword: self.keyword_score,
        }
    }
}

impl Serialize for SearchResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SearchResult", 6)?;
        state.serialize_field("document_id", &self.document.id)?;
        state.serialize_field("content", &self.document.content)?;
        state.serialize_field("metadata", &self.document.metadata)?;
        state.serialize_field("relevance_score", &self.relevance_score)?;
        state.serialize_field("semantic_score", &self.semantic_score)?;
        state.serialize_field("keyword_score", &self.keyword_score)?;
        state.end()
    }
}

/// Summary of the published index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    /// Embedder family
    pub embedder: EmbedderKind,

    /// Indexed documents (0 before the first build)
    pub document_count: usize,

    /// Embedding dimension, once known
    pub dimension: Option<usize>,

    /// Embedder vocabulary size, for vocabulary-based embedders
    pub vocabulary_size: Option<usize>,

    /// Distinct keyword tokens
    pub keyword_vocabulary_size: usize,

    /// Number of successful builds so far
    pub generation: u64,

    /// Default semantic weight
    pub semantic_weight: f32,
}

/// One immutable index generation
///
/// Positions are shared by `documents`, the vector index and the keyword
/// index.
struct IndexSnapshot {
    documents: Vec<Document>,
    positions: HashMap<String, usize>,
    embedder: Box<dyn Embedder>,
    vectors: VectorIndex,
    keywords: KeywordIndex,
    generation: u64,
}

impl IndexSnapshot {
    fn accepts(&self, filter: Option<&MetadataFilter>, position: usize) -> bool {
        filter.map_or(true, |f| f.matches(&self.documents[position].metadata))
    }

    /// Vector candidates; a zero query vector has no direction and yields none
    fn semantic_candidates(
        &self,
        text: &str,
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<(usize, f32)>> {
        let query = self.embedder.encode_one(text)?;
        if is_zero(&query) {
            return Ok(Vec::new());
        }
        self.vectors
            .search_filtered(&query, limit, |position| self.accepts(filter, position))
    }

    fn keyword_candidates(&self, text: &str, filter: Option<&MetadataFilter>) -> BTreeMap<usize, f32> {
        let mut scores = self.keywords.score(text);
        if filter.is_some() {
            scores.retain(|position, _| self.accepts(filter, *position));
        }
        scores
    }

    fn search(
        &self,
        query: &SearchQuery,
        scorer: HybridScorer,
        top_k: usize,
        candidate_multiplier: usize,
    ) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let filter = query.filter.as_ref();
        let semantic = self.semantic_candidates(
            &query.text,
            top_k.saturating_mul(candidate_multiplier),
            filter,
        )?;
        let keyword = self.keyword_candidates(&query.text, filter);

        let semantic_count = semantic.len();
        let keyword_count = keyword.len();
        let ranked = scorer.fuse(semantic, keyword, top_k);

        debug!(
            generation = self.generation,
            semantic_candidates = semantic_count,
            keyword_candidates = keyword_count,
            results = ranked.len(),
            "Hybrid search complete"
        );

        Ok(self.results(ranked))
    }

    fn results(&self, ranked: Vec<(usize, Score)>) -> Vec<SearchResult> {
        ranked
            .into_iter()
            .map(|(position, score)| SearchResult::new(self.documents[position].clone(), score))
            .collect()
    }
}

/// Hybrid search engine combining vector and keyword search
///
/// `add_documents` replaces the whole index: the new generation is built off
/// to the side and published by swapping one `Arc`, so a search sees either
/// the old index or the new one, never a mix. Searches run concurrently
/// with each other and with a rebuild.
pub struct HybridSearchEngine {
    choice: EmbedderChoice,
    config: EngineConfig,
    current: RwLock<Option<Arc<IndexSnapshot>>>,

    /// Serializes builds; holds the last published generation
    writer: Mutex<u64>,
}

impl HybridSearchEngine {
    /// Create an empty engine
    ///
    /// # Errors
    ///
    /// Configuration errors from [`EngineConfig::validate`].
    pub fn new(choice: EmbedderChoice, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            choice,
            config,
            current: RwLock::new(None),
            writer: Mutex::new(0),
        })
    }

    /// Create an engine and index `documents` in one call
    ///
    /// # Example
    ///
    /// ```
    /// use lehybride::{EmbedderChoice, EngineConfig, HybridSearchEngine};
    ///
    /// let engine = HybridSearchEngine::from_documents(
    ///     vec!["Returns are accepted within 30 days".into(), "Shipping is free".into()],
    ///     EmbedderChoice::TfIdf,
    ///     EngineConfig::default(),
    /// )
    /// .unwrap();
    ///
    /// let results = engine.search("returns", 1, None).unwrap();
    /// assert!(results[0].document.content.starts_with("Returns"));
    /// ```
    pub fn from_documents(
        documents: Vec<DocumentInput>,
        choice: EmbedderChoice,
        config: EngineConfig,
    ) -> Result<Self> {
        let engine = Self::new(choice, config)?;
        engine.add_documents(documents)?;
        Ok(engine)
    }

    /// Index a corpus, replacing any previous one
    ///
    /// Returns the document ids in corpus order. On error the previously
    /// published index stays in place.
    ///
    /// # Errors
    ///
    /// - `EmptyCorpus` for no documents
    /// - `DuplicateDocumentId` for repeated ids
    /// - `EmbeddingProviderFailure` when the dense provider fails
    /// - `DimensionMismatch` / `InvalidEmbedding` for inconsistent vectors
    pub fn add_documents(&self, documents: Vec<DocumentInput>) -> Result<Vec<String>> {
        let start = Instant::now();
        let mut generation = self.writer.lock();

        let snapshot = match self.build_snapshot(documents, *generation + 1) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(
                    error = %err,
                    caller_error = err.is_caller_error(),
                    generation = *generation,
                    "Index build failed; previous index stays published"
                );
                return Err(err);
            }
        };
        let ids: Vec<String> = snapshot.documents.iter().map(|d| d.id.clone()).collect();

        info!(
            documents = snapshot.documents.len(),
            embedder = %snapshot.embedder.kind(),
            dimension = ?snapshot.vectors.dimension(),
            vocabulary = snapshot.keywords.vocabulary_size(),
            generation = snapshot.generation,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Published hybrid index"
        );

        *generation = snapshot.generation;
        *self.current.write() = Some(Arc::new(snapshot));

        Ok(ids)
    }

    /// Build the next generation without touching the published one
    fn build_snapshot(
        &self,
        documents: Vec<DocumentInput>,
        generation: u64,
    ) -> Result<IndexSnapshot> {
        let documents = document::resolve(documents)?;
        let contents: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();

        let mut embedder = self.choice.build();
        embedder.fit(&contents)?;
        let embeddings = embedder.encode(&contents)?;

        let mut vectors =
            VectorIndex::new(Normalization::for_embedder_output(embedder.normalizes_output()))
                .with_strategy(self.config.scan.strategy, self.config.scan.parallel_threshold);
        vectors.add_documents(ids.clone(), embeddings)?;

        let keywords = KeywordIndex::build(&contents);

        let positions = ids
            .into_iter()
            .enumerate()
            .map(|(position, id)| (id, position))
            .collect();

        Ok(IndexSnapshot {
            documents,
            positions,
            embedder,
            vectors,
            keywords,
            generation,
        })
    }

    fn snapshot(&self) -> Result<Arc<IndexSnapshot>> {
        self.current.read().clone().ok_or(Error::IndexNotBuilt)
    }

    /// Hybrid search
    ///
    /// `semantic_weight` overrides the configured weight for this call; the
    /// keyword weight is `1 - semantic_weight`.
    ///
    /// # Errors
    ///
    /// - `IndexNotBuilt` before the first successful `add_documents`
    /// - `InvalidWeight` for a weight outside `[0, 1]`
    /// - `EmbeddingProviderFailure` when the dense provider fails
    pub fn search(
        &self,
        query: &str,
        top_k: usize,
        semantic_weight: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        let mut query = SearchQuery::new(query).with_top_k(top_k);
        query.semantic_weight = semantic_weight;
        self.search_with(&query)
    }

    /// Execute a search query
    pub fn search_with(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        let snapshot = self.snapshot()?;
        self.run(&snapshot, query)
    }

    fn run(&self, snapshot: &IndexSnapshot, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        let scorer =
            HybridScorer::new(query.semantic_weight.unwrap_or(self.config.semantic_weight))?;
        let top_k = query.top_k.unwrap_or(self.config.default_top_k);
        snapshot.search(query, scorer, top_k, self.config.candidate_multiplier)
    }

    /// Evaluate many queries against one index generation
    ///
    /// Queries run in parallel; output order matches input order. The first
    /// failing query fails the batch.
    pub fn search_batch(&self, queries: &[SearchQuery]) -> Result<Vec<Vec<SearchResult>>> {
        let snapshot = self.snapshot()?;
        queries
            .par_iter()
            .map(|query| self.run(&snapshot, query))
            .collect()
    }

    /// Vector-only ranking
    ///
    /// `relevance_score` equals `semantic_score`; `keyword_score` is 0.0.
    pub fn semantic_search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let snapshot = self.snapshot()?;
        let ranked = snapshot
            .semantic_candidates(query, top_k, None)?
            .into_iter()
            .map(|(position, similarity)| {
                let score = Score {
                    relevance: similarity,
                    semantic: similarity,
                    keyword: 0.0,
                };
                (position, score)
            })
            .collect();
        Ok(snapshot.results(ranked))
    }

    /// Keyword-only ranking
    ///
    /// `relevance_score` equals `keyword_score`; `semantic_score` is 0.0.
    pub fn keyword_search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let snapshot = self.snapshot()?;
        let ranked = snapshot
            .keywords
            .rank(query, top_k)
            .into_iter()
            .map(|(position, keyword)| {
                let score = Score {
                    relevance: keyword,
                    semantic: 0.0,
                    keyword,
                };
                (position, score)
            })
            .collect();
        Ok(snapshot.results(ranked))
    }

    /// Look up an indexed document by id
    pub fn get_document(&self, id: &str) -> Option<Document> {
        let snapshot = self.current.read().clone()?;
        let position = *snapshot.positions.get(id)?;
        Some(snapshot.documents[position].clone())
    }

    /// Ids of the indexed documents in corpus order
    pub fn document_ids(&self) -> Vec<String> {
        self.current
            .read()
            .as_ref()
            .map(|snapshot| snapshot.documents.iter().map(|d| d.id.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.current
            .read()
            .as_ref()
            .map_or(0, |snapshot| snapshot.documents.len())
    }

    /// Check if nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an index has been published
    pub fn is_indexed(&self) -> bool {
        self.current.read().is_some()
    }

    /// Describe the published index
    pub fn info(&self) -> IndexInfo {
        let snapshot = self.current.read().clone();
        IndexInfo {
            embedder: self.choice.kind(),
            document_count: snapshot.as_ref().map_or(0, |s| s.documents.len()),
            dimension: snapshot.as_ref().and_then(|s| s.vectors.dimension()),
            vocabulary_size: snapshot.as_ref().and_then(|s| s.embedder.vocabulary_size()),
            keyword_vocabulary_size: snapshot
                .as_ref()
                .map_or(0, |s| s.keywords.vocabulary_size()),
            generation: snapshot.as_ref().map_or(0, |s| s.generation),
            semantic_weight: self.config.semantic_weight,
        }
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Embedder family fixed at construction
    pub fn embedder_kind(&self) -> EmbedderKind {
        self.choice.kind()
    }
}

impl Default for HybridSearchEngine {
    fn default() -> Self {
        Self {
            choice: EmbedderChoice::default(),
            config: EngineConfig::default(),
            current: RwLock::new(None),
            writer: Mutex::new(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn corpus() -> Vec<DocumentInput> {
        vec![
            DocumentInput::new("Our return policy allows returns within 30 days")
                .with_id("returns")
                .with_metadata("category", "policy"),
            DocumentInput::new("Shipping takes 5 to 7 business days")
                .with_id("shipping")
                .with_metadata("category", "logistics"),
            DocumentInput::new("The warranty covers defects for 1 year")
                .with_id("warranty")
                .with_metadata("category", "policy"),
        ]
    }

    fn engine() -> HybridSearchEngine {
        HybridSearchEngine::from_documents(corpus(), EmbedderChoice::TfIdf, EngineConfig::default())
            .unwrap()
    }

    #[test]
    fn test_search_before_index() {
        let engine = HybridSearchEngine::default();
        assert!(!engine.is_indexed());
        assert!(matches!(engine.search("anything", 3, None), Err(Error::IndexNotBuilt)));
        assert!(matches!(engine.semantic_search("anything", 3), Err(Error::IndexNotBuilt)));
        assert!(engine.get_document("returns").is_none());
        assert_eq!(engine.info().generation, 0);
    }

    #[test]
    fn test_add_documents_returns_ids() {
        let engine = HybridSearchEngine::default();
        let ids = engine.add_documents(corpus()).unwrap();

        assert_eq!(ids, vec!["returns", "shipping", "warranty"]);
        assert_eq!(engine.document_ids(), ids);
        assert_eq!(engine.len(), 3);
        assert!(engine.is_indexed());
    }

    #[test]
    fn test_empty_corpus_rejected() {
        let engine = HybridSearchEngine::default();
        assert!(matches!(engine.add_documents(Vec::new()), Err(Error::EmptyCorpus)));
        assert!(!engine.is_indexed());
    }

    #[test]
    fn test_search_ranks_relevant_first() {
        let results = engine().search("how many days for returns", 3, None).unwrap();

        assert_eq!(results[0].id(), "returns");
        assert!(results[0].relevance_score >= results[1].relevance_score);
        assert_eq!(results[0].keyword_score, 1.0);
    }

    #[test]
    fn test_search_invalid_weight() {
        let result = engine().search("returns", 3, Some(1.2));
        assert!(matches!(result, Err(Error::InvalidWeight(w)) if w == 1.2));
    }

    #[test]
    fn test_top_k_zero() {
        assert!(engine().search("returns", 0, None).unwrap().is_empty());
    }

    #[test]
    fn test_filter_restricts_results() {
        let query = SearchQuery::new("days")
            .with_top_k(3)
            .with_filter(MetadataFilter::new().with("category", "logistics"));
        let results = engine().search_with(&query).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id(), "shipping");
    }

    #[test]
    fn test_metadata_filter_matches() {
        let metadata: Metadata = [("lang".to_string(), json!("en")), ("year".to_string(), json!(2024))]
            .into_iter()
            .collect();

        assert!(MetadataFilter::new().matches(&metadata));
        assert!(MetadataFilter::new().with("lang", "en").matches(&metadata));
        assert!(MetadataFilter::new().with("year", 2024).matches(&metadata));
        assert!(!MetadataFilter::new().with("year", "2024").matches(&metadata));
        assert!(!MetadataFilter::new().with("missing", "x").matches(&metadata));
    }

    #[test]
    fn test_search_result_serialization() {
        let results = engine().search("warranty", 1, None).unwrap();
        let value = serde_json::to_value(&results[0]).unwrap();

        assert_eq!(value["document_id"], json!("warranty"));
        assert_eq!(value["content"], json!("The warranty covers defects for 1 year"));
        assert_eq!(value["metadata"]["category"], json!("policy"));
        assert!(value["relevance_score"].is_number());
        assert!(value["semantic_score"].is_number());
        assert_eq!(value["keyword_score"], json!(1.0));
    }

    #[test]
    fn test_single_signal_searches() {
        let engine = engine();

        let semantic = engine.semantic_search("warranty defects", 2).unwrap();
        assert_eq!(semantic[0].id(), "warranty");
        assert_eq!(semantic[0].relevance_score, semantic[0].semantic_score);
        assert_eq!(semantic[0].keyword_score, 0.0);

        let keyword = engine.keyword_search("warranty defects", 2).unwrap();
        assert_eq!(keyword.len(), 1);
        assert_eq!(keyword[0].id(), "warranty");
        assert_eq!(keyword[0].semantic_score, 0.0);
    }

    #[test]
    fn test_info() {
        let info = engine().info();

        assert_eq!(info.embedder, EmbedderKind::TfIdf);
        assert_eq!(info.document_count, 3);
        assert_eq!(info.generation, 1);
        assert_eq!(info.dimension, info.vocabulary_size);
        assert_eq!(info.keyword_vocabulary_size, info.vocabulary_size.unwrap());
        assert_eq!(info.semantic_weight, 0.7);
    }

    #[test]
    fn test_get_document() {
        let engine = engine();
        let doc = engine.get_document("shipping").unwrap();
        assert_eq!(doc.content, "Shipping takes 5 to 7 business days");
        assert!(engine.get_document("missing").is_none());
    }

    #[test]
    fn test_failed_build_is_classified_and_keeps_generation() {
        let engine = engine();

        let err = engine
            .add_documents(vec![
                DocumentInput::new("a").with_id("same"),
                DocumentInput::new("b").with_id("same"),
            ])
            .unwrap_err();
        assert!(err.is_caller_error());

        assert_eq!(engine.info().generation, 1);
        assert_eq!(engine.document_ids(), vec!["returns", "shipping", "warranty"]);

        // The next successful build continues the generation count
        engine.add_documents(corpus()).unwrap();
        assert_eq!(engine.info().generation, 2);
    }

    #[test]
    fn test_engine_rejects_invalid_config() {
        let config = EngineConfig {
            semantic_weight: -0.5,
            ..EngineConfig::default()
        };
        assert!(HybridSearchEngine::new(EmbedderChoice::TfIdf, config).is_err());
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HybridSearchEngine>();
    }
}
