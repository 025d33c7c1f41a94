// Document Model
//
// *Le Document* (The Document) - Indexed text with stable identity and metadata

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Arbitrary document metadata
pub type Metadata = BTreeMap<String, Value>;

/// An indexed document
///
/// Immutable once indexed. `id` is unique within one corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique document identifier
    pub id: String,

    /// Text content
    pub content: String,

    /// Caller-supplied metadata
    #[serde(default)]
    pub metadata: Metadata,
}

/// A document as handed to `add_documents`
///
/// # Example
///
/// ```
/// use lehybride::DocumentInput;
///
/// let doc = DocumentInput::new("Returns are accepted within 30 days")
///     .with_id("policy-returns")
///     .with_metadata("category", "policy");
/// assert_eq!(doc.id.as_deref(), Some("policy-returns"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentInput {
    /// Explicit id; assigned from position and content when absent
    #[serde(default)]
    pub id: Option<String>,

    /// Text content
    pub content: String,

    /// Caller-supplied metadata
    #[serde(default)]
    pub metadata: Metadata,
}

impl DocumentInput {
    /// Create an input with content only
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: None,
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    /// Set an explicit id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add one metadata entry
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Replace all metadata
    #[must_use]
    pub fn with_metadata_map(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl From<&str> for DocumentInput {
    fn from(content: &str) -> Self {
        DocumentInput::new(content)
    }
}

impl From<String> for DocumentInput {
    fn from(content: String) -> Self {
        DocumentInput::new(content)
    }
}

/// Derive the id of a document without an explicit one
///
/// `doc-` followed by 16 hex characters of a BLAKE3 digest over the corpus
/// position and the content, so indexing the same corpus twice yields the
/// same ids.
pub fn assign_id(position: usize, content: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(position as u64).to_le_bytes());
    hasher.update(content.as_bytes());
    let hex = hasher.finalize().to_hex();
    format!("doc-{}", &hex.as_str()[..16])
}

/// Turn inputs into documents, assigning missing ids
///
/// # Errors
///
/// - `EmptyCorpus` for an empty input
/// - `DuplicateDocumentId` if two documents end up with the same id
pub fn resolve(inputs: Vec<DocumentInput>) -> Result<Vec<Document>> {
    if inputs.is_empty() {
        return Err(Error::EmptyCorpus);
    }

    let mut seen = HashSet::with_capacity(inputs.len());
    inputs
        .into_iter()
        .enumerate()
        .map(|(position, input)| {
            let id = input
                .id
                .unwrap_or_else(|| assign_id(position, &input.content));
            if !seen.insert(id.clone()) {
                return Err(Error::DuplicateDocumentId(id));
            }
            Ok(Document {
                id,
                content: input.content,
                metadata: input.metadata,
            })
        })
        .collect()
}
