// TF-IDF Embedder
//
// *La Fréquence* (The Frequency) - Zero-dependency embedder over a fitted vocabulary

use crate::embedding::{Embedder, EmbedderKind, EmbeddingVector};
use crate::error::Result;
use crate::tokenizer::{tokenize, unique_tokens};
use crate::vector::l2_normalize;
use once_cell::sync::OnceCell;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::warn;

/// Smoothed inverse document frequency
///
/// `ln((N + 1) / (df + 1)) + 1`, always >= 1 for `df <= N`, and finite
/// even for an empty corpus.
pub fn smoothed_idf(document_count: usize, document_frequency: usize) -> f32 {
    let n = (document_count + 1) as f32;
    let df = (document_frequency + 1) as f32;
    (n / df).ln() + 1.0
}

/// Vocabulary entry for a single term
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VocabEntry {
    /// Position of the term in every encoded vector
    pub index: usize,

    /// Smoothed inverse document frequency
    pub idf: f32,
}

/// Term vocabulary fitted on a corpus
///
/// Indices are assigned in first-seen order over the corpus and never change
/// for the lifetime of the vocabulary.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    terms: HashMap<String, VocabEntry>,
    document_count: usize,
}

impl Vocabulary {
    /// Fit a vocabulary on a corpus
    pub fn fit(corpus: &[String]) -> Self {
        let mut order: Vec<String> = Vec::new();
        let mut document_frequency: HashMap<String, usize> = HashMap::new();

        for document in corpus {
            for token in unique_tokens(document) {
                match document_frequency.entry(token) {
                    Entry::Vacant(slot) => {
                        order.push(slot.key().clone());
                        slot.insert(1);
                    }
                    Entry::Occupied(mut slot) => {
                        *slot.get_mut() += 1;
                    }
                }
            }
        }

        let document_count = corpus.len();
        let terms = order
            .into_iter()
            .enumerate()
            .map(|(index, term)| {
                let df = document_frequency[&term];
                let entry = VocabEntry {
                    index,
                    idf: smoothed_idf(document_count, df),
                };
                (term, entry)
            })
            .collect();

        Self {
            terms,
            document_count,
        }
    }

    /// Look up a term
    pub fn get(&self, term: &str) -> Option<&VocabEntry> {
        self.terms.get(term)
    }

    /// Number of terms (the vector dimension)
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Check if the vocabulary has no terms
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Number of documents the vocabulary was fitted on
    pub fn document_count(&self) -> usize {
        self.document_count
    }

    /// Encode one text against this vocabulary
    fn vectorize(&self, text: &str) -> EmbeddingVector {
        let mut vector = vec![0.0; self.len()];
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return vector;
        }

        let total = tokens.len() as f32;
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for token in &tokens {
            *counts.entry(token.as_str()).or_insert(0) += 1;
        }

        for (term, count) in counts {
            if let Some(entry) = self.terms.get(term) {
                vector[entry.index] = (count as f32 / total) * entry.idf;
            }
        }

        l2_normalize(&mut vector);
        vector
    }

    /// Encode a batch in parallel, preserving input order
    fn vectorize_all(&self, texts: &[String]) -> Vec<EmbeddingVector> {
        texts.par_iter().map(|text| self.vectorize(text)).collect()
    }
}

/// Frequency-based embedder
///
/// Vectors have one component per vocabulary term (`tf * idf`) and are
/// L2-normalized; text with no known terms encodes to the zero vector.
///
/// # Lazy fit
///
/// Calling [`Embedder::encode`] before [`Embedder::fit`] fits the vocabulary
/// on the texts of that first call and keeps it, so later calls share one
/// vector space; terms first seen afterwards are not recognized. The search
/// engine always fits first.
#[derive(Debug, Clone, Default)]
pub struct TfIdfEmbedder {
    vocabulary: OnceCell<Vocabulary>,
}

impl TfIdfEmbedder {
    /// Create an unfitted embedder
    pub fn new() -> Self {
        Self::default()
    }

    /// Fitted vocabulary, if any
    pub fn vocabulary(&self) -> Option<&Vocabulary> {
        self.vocabulary.get()
    }

    /// Whether a vocabulary has been fitted, explicitly or lazily
    pub fn is_fitted(&self) -> bool {
        self.vocabulary.get().is_some()
    }
}

impl Embedder for TfIdfEmbedder {
    fn kind(&self) -> EmbedderKind {
        EmbedderKind::TfIdf
    }

    fn fit(&mut self, corpus: &[String]) -> Result<()> {
        self.vocabulary = OnceCell::from(Vocabulary::fit(corpus));
        Ok(())
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        let vocabulary = self.vocabulary.get_or_init(|| {
            warn!(
                texts = texts.len(),
                "TF-IDF embedder used before fit; fitting the vocabulary on the input"
            );
            Vocabulary::fit(texts)
        });
        Ok(vocabulary.vectorize_all(texts))
    }

    fn dimension(&self) -> Option<usize> {
        self.vocabulary.get().map(Vocabulary::len)
    }

    fn normalizes_output(&self) -> bool {
        true
    }

    fn vocabulary_size(&self) -> Option<usize> {
        self.dimension()
    }
}
