// lehybride - Hybrid Retrieval Engine
//
// *La Recherche Hybride* (The Hybrid Search) - Keyword and vector signals fused into one ranking

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

//! Index a corpus once, then answer queries with a ranking that blends
//! cosine similarity over document embeddings with smoothed-IDF keyword
//! scores.
//!
//! ```
//! use lehybride::{DocumentInput, EmbedderChoice, EngineConfig, HybridSearchEngine};
//!
//! let engine = HybridSearchEngine::new(EmbedderChoice::TfIdf, EngineConfig::default()).unwrap();
//! engine
//!     .add_documents(vec![
//!         DocumentInput::new("Our return policy allows returns within 30 days"),
//!         DocumentInput::new("Shipping takes 5 to 7 business days"),
//!     ])
//!     .unwrap();
//!
//! let results = engine.search("how many days for returns", 2, None).unwrap();
//! assert!(results[0].document.content.contains("return policy"));
//! ```

pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod keyword;
pub mod ranking;
pub mod search;
pub mod tfidf;
pub mod tokenizer;
pub mod vector;

pub use config::{EngineConfig, ScanConfig};
pub use document::{Document, DocumentInput, Metadata};
pub use embedding::{
    DenseEmbedder, Embedder, EmbedderChoice, EmbedderKind, EmbeddingProvider, EmbeddingVector,
};
pub use error::{Error, Result};
pub use keyword::KeywordIndex;
pub use ranking::{HybridScorer, Score};
pub use search::{HybridSearchEngine, IndexInfo, MetadataFilter, SearchQuery, SearchResult};
pub use tfidf::{TfIdfEmbedder, Vocabulary};
pub use vector::{Normalization, ScanStrategy, VectorIndex};
