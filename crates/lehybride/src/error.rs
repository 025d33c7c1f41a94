// Error Handling
//
// *La Gestion des Erreurs* (The Error Management) - Error taxonomy for indexing and retrieval

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error types
///
/// None of these are retried internally. Callers decide whether a retry
/// makes sense; see [`Error::is_caller_error`].
#[derive(Debug, Error)]
pub enum Error {
    /// `add_documents` was called with zero documents
    #[error("Cannot index an empty corpus")]
    EmptyCorpus,

    /// Vectors of inconsistent length were handed to the vector index
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Dimension fixed by the first vector (or the index)
        expected: usize,
        /// Offending dimension
        got: usize,
    },

    /// `search` was called before any successful `add_documents`
    #[error("Index not built: call add_documents before searching")]
    IndexNotBuilt,

    /// The dense embedding provider failed or returned malformed vectors
    #[error("Embedding provider failure: {message}")]
    EmbeddingProviderFailure {
        /// Provider error including its context chain
        message: String,
    },

    /// Two documents in one corpus share an id
    #[error("Duplicate document id: {0}")]
    DuplicateDocumentId(String),

    /// Semantic weight outside `[0, 1]`
    #[error("Invalid semantic weight {0}: must be within [0, 1]")]
    InvalidWeight(f32),

    /// Embedding contains NaN or infinite values
    #[error("Invalid embedding: {0}")]
    InvalidEmbedding(String),

    /// Number of vectors does not match the number of documents
    #[error("Length mismatch: expected {expected} vectors, got {got}")]
    LengthMismatch {
        /// Number of documents
        expected: usize,
        /// Number of vectors received
        got: usize,
    },

    /// Invalid engine configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap a provider error, keeping the whole `anyhow` context chain
    pub fn provider_failure(err: anyhow::Error) -> Self {
        Error::EmbeddingProviderFailure {
            message: format!("{:#}", err),
        }
    }

    /// Create a provider failure from a plain message
    pub fn provider_message(message: impl Into<String>) -> Self {
        Error::EmbeddingProviderFailure {
            message: message.into(),
        }
    }

    /// Whether the error stems from how the engine was called rather than
    /// from an external dependency
    pub fn is_caller_error(&self) -> bool {
        !matches!(self, Error::EmbeddingProviderFailure { .. })
    }
}
