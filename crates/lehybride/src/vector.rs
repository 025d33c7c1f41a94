// Vector Search Implementation
//
// *Le Vector* (The Vector) - Exact cosine similarity over unit-length embeddings

use crate::embedding::EmbeddingVector;
use crate::error::{Error, Result};
use crate::ranking::top_k_by_score;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Default corpus size above which `ScanStrategy::Auto` scans in parallel
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 2048;

/// Where vectors get their unit length
///
/// Cosine similarity is the inner product of unit vectors. Normalization
/// happens exactly once: either the embedder already did it, or the index
/// does it on insert (and to each query).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// Vectors arrive unit length (or zero) from the embedder
    Prenormalized,

    /// The index normalizes stored vectors and queries
    OnInsert,
}

impl Normalization {
    /// Pick the rule matching an embedder's output
    pub fn for_embedder_output(already_normalized: bool) -> Self {
        if already_normalized {
            Normalization::Prenormalized
        } else {
            Normalization::OnInsert
        }
    }
}

/// How a search scans the stored vectors
///
/// Every strategy computes the same per-vector scores and applies the same
/// ordering, so rankings are identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStrategy {
    /// Single-threaded brute force
    Sequential,

    /// Rayon parallel brute force
    Parallel,

    /// Parallel once the corpus exceeds the configured threshold
    #[default]
    Auto,
}

/// Vector index for semantic search
///
/// Stores `(doc_id, embedding)` pairs in insertion order. Positions returned
/// by [`VectorIndex::search`] are insertion positions, which are also the
/// tie-breaker between equal similarities.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    /// Document ids by position
    ids: Vec<String>,

    /// Embeddings by position
    embeddings: Vec<EmbeddingVector>,

    /// Document id to position
    positions: HashMap<String, usize>,

    /// Embedding dimension, fixed by the first insert
    dimension: Option<usize>,

    normalization: Normalization,
    strategy: ScanStrategy,
    parallel_threshold: usize,
}

impl VectorIndex {
    /// Create a new vector index
    ///
    /// # Example
    ///
    /// ```
    /// use lehybride::vector::{Normalization, VectorIndex};
    ///
    /// let mut index = VectorIndex::new(Normalization::OnInsert);
    /// index
    ///     .add_documents(
    ///         vec!["a".to_string(), "b".to_string()],
    ///         vec![vec![2.0, 0.0], vec![0.0, 1.0]],
    ///     )
    ///     .unwrap();
    ///
    /// let hits = index.search(&[1.0, 0.0], 1).unwrap();
    /// assert_eq!(hits[0].0, 0);
    /// ```
    pub fn new(normalization: Normalization) -> Self {
        Self {
            ids: Vec::new(),
            embeddings: Vec::new(),
            positions: HashMap::new(),
            dimension: None,
            normalization,
            strategy: ScanStrategy::default(),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    /// Set the scan strategy
    #[must_use]
    pub fn with_strategy(mut self, strategy: ScanStrategy, parallel_threshold: usize) -> Self {
        self.strategy = strategy;
        self.parallel_threshold = parallel_threshold;
        self
    }

    /// Store documents with their embeddings
    ///
    /// The call is all-or-nothing: every vector is validated before any is
    /// stored.
    ///
    /// # Errors
    ///
    /// - `LengthMismatch` if `doc_ids` and `vectors` differ in length
    /// - `DimensionMismatch` if any vector differs from the index dimension
    ///   (or, for a fresh index, from the first vector)
    /// - `InvalidEmbedding` for NaN or infinite components
    /// - `DuplicateDocumentId` if an id is already present
    pub fn add_documents(
        &mut self,
        doc_ids: Vec<String>,
        vectors: Vec<EmbeddingVector>,
    ) -> Result<()> {
        if doc_ids.len() != vectors.len() {
            return Err(Error::LengthMismatch {
                expected: doc_ids.len(),
                got: vectors.len(),
            });
        }

        let expected = match (self.dimension, vectors.first()) {
            (Some(dimension), _) => dimension,
            (None, Some(first)) => first.len(),
            (None, None) => return Ok(()),
        };

        let mut batch_ids = HashSet::new();
        for (doc_id, vector) in doc_ids.iter().zip(&vectors) {
            if vector.len() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    got: vector.len(),
                });
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(Error::InvalidEmbedding(format!(
                    "vector for document {} contains NaN or infinite values",
                    doc_id
                )));
            }
            if self.positions.contains_key(doc_id) || !batch_ids.insert(doc_id.as_str()) {
                return Err(Error::DuplicateDocumentId(doc_id.clone()));
            }
        }

        self.dimension = Some(expected);
        for (doc_id, mut vector) in doc_ids.into_iter().zip(vectors) {
            if self.normalization == Normalization::OnInsert {
                l2_normalize(&mut vector);
            }
            self.positions.insert(doc_id.clone(), self.ids.len());
            self.ids.push(doc_id);
            self.embeddings.push(vector);
        }

        Ok(())
    }

    /// Search for similar vectors
    ///
    /// Returns up to `top_k` `(position, similarity)` pairs, similarity
    /// descending, ties broken by insertion position. `top_k` larger than
    /// the corpus is clamped.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if the query dimension differs from the index.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<(usize, f32)>> {
        self.search_filtered(query, top_k, |_| true)
    }

    /// Search restricted to positions accepted by `accept`
    pub fn search_filtered<F>(
        &self,
        query: &[f32],
        top_k: usize,
        accept: F,
    ) -> Result<Vec<(usize, f32)>>
    where
        F: Fn(usize) -> bool + Sync,
    {
        if let Some(dimension) = self.dimension {
            if query.len() != dimension {
                return Err(Error::DimensionMismatch {
                    expected: dimension,
                    got: query.len(),
                });
            }
        }

        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let mut prepared = query.to_vec();
        if self.normalization == Normalization::OnInsert {
            l2_normalize(&mut prepared);
        }

        let score = |position: usize| -> Option<(usize, f32)> {
            if !accept(position) {
                return None;
            }
            let similarity = dot(&prepared, &self.embeddings[position]).clamp(-1.0, 1.0);
            Some((position, similarity))
        };

        let scored: Vec<(usize, f32)> = if self.scans_in_parallel() {
            (0..self.len()).into_par_iter().filter_map(score).collect()
        } else {
            (0..self.len()).filter_map(score).collect()
        };

        Ok(top_k_by_score(scored, top_k))
    }

    /// Whether the next search will use the parallel scan
    fn scans_in_parallel(&self) -> bool {
        match self.strategy {
            ScanStrategy::Sequential => false,
            ScanStrategy::Parallel => true,
            ScanStrategy::Auto => self.len() >= self.parallel_threshold,
        }
    }

    /// Get the number of vectors in the index
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Get the embedding dimension, once fixed
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Get a stored (possibly normalized) vector by document id
    pub fn get(&self, doc_id: &str) -> Option<&[f32]> {
        self.position_of(doc_id)
            .map(|position| self.embeddings[position].as_slice())
    }

    /// Insertion position of a document id
    pub fn position_of(&self, doc_id: &str) -> Option<usize> {
        self.positions.get(doc_id).copied()
    }

    /// Document id at an insertion position
    pub fn doc_id(&self, position: usize) -> Option<&str> {
        self.ids.get(position).map(String::as_str)
    }
}

/// Scale a vector to unit length in place
///
/// Returns the original norm. A zero vector stays zero.
pub fn l2_normalize(vector: &mut [f32]) -> f32 {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
    norm
}

/// Inner product of two equal-length vectors
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Whether every component is zero
pub fn is_zero(vector: &[f32]) -> bool {
    vector.iter().all(|v| *v == 0.0)
}
