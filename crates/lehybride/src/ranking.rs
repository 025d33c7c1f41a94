// Hybrid scoring algorithm
//
// *Le Classement* (The Ranking) - Weighted fusion of semantic and keyword signals

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Combined score from both signals
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Score {
    /// Weighted fusion of the two components
    pub relevance: f32,

    /// Cosine similarity, 0.0 if the document was not a semantic candidate
    pub semantic: f32,

    /// Normalized keyword score, 0.0 if no query token matched
    pub keyword: f32,
}

/// Hybrid scorer combining semantic and keyword signals
///
/// `keyword_weight` is always `1 - semantic_weight`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridScorer {
    semantic_weight: f32,
    keyword_weight: f32,
}

impl HybridScorer {
    /// Create a scorer from the semantic weight
    ///
    /// # Errors
    ///
    /// `InvalidWeight` unless `semantic_weight` is within `[0, 1]`.
    pub fn new(semantic_weight: f32) -> Result<Self> {
        let semantic_weight = validate_weight(semantic_weight)?;
        Ok(Self {
            semantic_weight,
            keyword_weight: 1.0 - semantic_weight,
        })
    }

    /// Weight of the semantic component
    pub fn semantic_weight(&self) -> f32 {
        self.semantic_weight
    }

    /// Weight of the keyword component
    pub fn keyword_weight(&self) -> f32 {
        self.keyword_weight
    }

    /// Calculate combined score
    pub fn score(&self, semantic: f32, keyword: f32) -> Score {
        Score {
            relevance: self.semantic_weight * semantic + self.keyword_weight * keyword,
            semantic,
            keyword,
        }
    }

    /// Merge both candidate sets and rank them
    ///
    /// Corpus position is both the merge identity and the tie-break: equal
    /// relevance orders by position, never by which set a candidate came
    /// from. A document present in only one set scores 0.0 for the other
    /// component. The result is sorted by relevance descending and
    /// truncated to `top_k`.
    pub fn fuse(
        &self,
        semantic: Vec<(usize, f32)>,
        keyword: BTreeMap<usize, f32>,
        top_k: usize,
    ) -> Vec<(usize, Score)> {
        let mut merged: BTreeMap<usize, (f32, f32)> = keyword
            .into_iter()
            .map(|(position, score)| (position, (0.0, score)))
            .collect();
        for (position, similarity) in semantic {
            merged.entry(position).or_insert((0.0, 0.0)).0 = similarity;
        }

        let scored: Vec<(usize, Score)> = merged
            .into_iter()
            .map(|(position, (semantic, keyword))| (position, self.score(semantic, keyword)))
            .collect();

        rank_by(scored, top_k, |(position, score)| (*position, score.relevance))
    }
}

impl Default for HybridScorer {
    fn default() -> Self {
        Self {
            semantic_weight: 0.7,
            keyword_weight: 0.3,
        }
    }
}

/// Check that a semantic weight lies within `[0, 1]`
pub fn validate_weight(weight: f32) -> Result<f32> {
    if (0.0..=1.0).contains(&weight) {
        Ok(weight)
    } else {
        Err(Error::InvalidWeight(weight))
    }
}

/// Keep the `top_k` best `(position, score)` pairs, score descending,
/// ties by position
pub fn top_k_by_score(scored: Vec<(usize, f32)>, top_k: usize) -> Vec<(usize, f32)> {
    rank_by(scored, top_k, |(position, score)| (*position, *score))
}

/// Descending score, then ascending position
fn compare(a: (usize, f32), b: (usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}

fn rank_by<T, F>(mut items: Vec<T>, top_k: usize, key: F) -> Vec<T>
where
    F: Fn(&T) -> (usize, f32),
{
    if top_k == 0 {
        return Vec::new();
    }
    if items.len() > top_k {
        items.select_nth_unstable_by(top_k - 1, |a, b| compare(key(a), key(b)));
        items.truncate(top_k);
    }
    items.sort_by(|a, b| compare(key(a), key(b)));
    items
}
