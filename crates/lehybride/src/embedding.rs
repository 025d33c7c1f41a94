// Embedding Strategies
//
// *L'Empreinte* (The Imprint) - Text to fixed-length vectors, chosen once per engine

use crate::error::{Error, Result};
use crate::tfidf::TfIdfEmbedder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Dense embedding vector
pub type EmbeddingVector = Vec<f32>;

/// Which embedder family produced a vector space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// Frequency-based TF-IDF vectors over a fitted vocabulary
    TfIdf,

    /// Vectors delegated to an external dense-embedding provider
    Dense,
}

impl fmt::Display for EmbedderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbedderKind::TfIdf => write!(f, "tfidf"),
            EmbedderKind::Dense => write!(f, "dense"),
        }
    }
}

/// Turns text into vectors of one fixed dimension
///
/// Implementations are fitted once per index generation and then only read,
/// so `encode` takes `&self` and may run from many threads at once.
pub trait Embedder: Send + Sync {
    /// Embedder family
    fn kind(&self) -> EmbedderKind;

    /// Build (or overwrite) internal state from a corpus
    fn fit(&mut self, corpus: &[String]) -> Result<()>;

    /// Encode texts, one vector per text, in input order
    fn encode(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>>;

    /// Output dimension, if already known
    fn dimension(&self) -> Option<usize>;

    /// Whether encoded vectors already have unit length
    ///
    /// When `false` the vector index normalizes them on insert.
    fn normalizes_output(&self) -> bool;

    /// Vocabulary size for vocabulary-based embedders
    fn vocabulary_size(&self) -> Option<usize> {
        None
    }

    /// Encode a single text
    fn encode_one(&self, text: &str) -> Result<EmbeddingVector> {
        self.encode(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::provider_message("No embedding generated"))
    }
}

/// External dense-embedding capability
///
/// Any I/O, timeout or cancellation policy belongs to the provider; the
/// engine calls it synchronously and surfaces failures unchanged.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts
    fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    /// Provider-declared vector dimension
    fn dimension(&self) -> usize;
}

/// Embedder adapter over an [`EmbeddingProvider`]
///
/// `fit` is a no-op. `encode` forwards to the provider and returns its
/// vectors unchanged after checking count, dimension and finiteness.
pub struct DenseEmbedder<P: EmbeddingProvider + ?Sized> {
    provider: Arc<P>,
}

impl<P: EmbeddingProvider + ?Sized> DenseEmbedder<P> {
    /// Create a new adapter
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// Check a provider response against the request
    fn validate(&self, texts: &[String], vectors: &[Vec<f32>]) -> Result<()> {
        if vectors.len() != texts.len() {
            return Err(Error::provider_message(format!(
                "provider returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }

        let expected = self.provider.dimension();
        for (i, vector) in vectors.iter().enumerate() {
            if vector.len() != expected {
                return Err(Error::provider_message(format!(
                    "provider returned a {}-dimensional vector for text {}, declared dimension is {}",
                    vector.len(),
                    i,
                    expected
                )));
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(Error::provider_message(format!(
                    "provider returned non-finite values for text {}",
                    i
                )));
            }
        }

        Ok(())
    }
}

impl<P: EmbeddingProvider + ?Sized> Embedder for DenseEmbedder<P> {
    fn kind(&self) -> EmbedderKind {
        EmbedderKind::Dense
    }

    fn fit(&mut self, _corpus: &[String]) -> Result<()> {
        Ok(())
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self
            .provider
            .embed(texts)
            .map_err(Error::provider_failure)?;
        self.validate(texts, &vectors)?;

        Ok(vectors)
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.provider.dimension())
    }

    fn normalizes_output(&self) -> bool {
        false
    }
}

/// Embedding strategy selected when an engine is constructed
///
/// The choice is fixed for the engine's lifetime. Each index generation gets
/// a fresh embedder from [`EmbedderChoice::build`], so vectors from two
/// different spaces never share an index.
#[derive(Clone, Default)]
pub enum EmbedderChoice {
    /// Zero-dependency TF-IDF embedder
    #[default]
    TfIdf,

    /// External dense-embedding provider
    Dense(Arc<dyn EmbeddingProvider>),
}

impl EmbedderChoice {
    /// Wrap a provider as the dense strategy
    pub fn dense<P: EmbeddingProvider + 'static>(provider: P) -> Self {
        EmbedderChoice::Dense(Arc::new(provider))
    }

    /// Embedder family of this choice
    pub fn kind(&self) -> EmbedderKind {
        match self {
            EmbedderChoice::TfIdf => EmbedderKind::TfIdf,
            EmbedderChoice::Dense(_) => EmbedderKind::Dense,
        }
    }

    /// Create an unfitted embedder for a new index generation
    pub fn build(&self) -> Box<dyn Embedder> {
        match self {
            EmbedderChoice::TfIdf => Box::new(TfIdfEmbedder::new()),
            EmbedderChoice::Dense(provider) => Box::new(DenseEmbedder::new(Arc::clone(provider))),
        }
    }
}

impl fmt::Debug for EmbedderChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbedderChoice::TfIdf => write!(f, "EmbedderChoice::TfIdf"),
            EmbedderChoice::Dense(provider) => {
                write!(f, "EmbedderChoice::Dense(dim={})", provider.dimension())
            }
        }
    }
}
