//! Documents fetched from a content source and the chunks derived from them.

use serde::{Deserialize, Serialize};

/// A page or file pulled from a content source.
///
/// Documents are never persisted directly; only their chunks are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier of the document within its source (page id, relative path).
    pub source_id: String,

    /// Human readable title.
    pub title: String,

    /// Link back to the original document. May be empty.
    pub url: String,

    /// Last edit timestamp as reported by the source, if any.
    #[serde(default)]
    pub last_edited: Option<String>,

    /// Plain text content.
    pub text: String,
}

impl Document {
    /// Create a new document.
    pub fn new(
        source_id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            title: title.into(),
            url: url.into(),
            last_edited: None,
            text: text.into(),
        }
    }

    /// Set the last edit timestamp.
    pub fn with_last_edited(mut self, last_edited: impl Into<String>) -> Self {
        self.last_edited = Some(last_edited.into());
        self
    }

    /// Build the chunk at `chunk_index` carrying this document's metadata.
    pub fn chunk(&self, chunk_index: usize, text: impl Into<String>) -> Chunk {
        Chunk {
            source_id: self.source_id.clone(),
            title: self.title.clone(),
            url: self.url.clone(),
            last_edited: self.last_edited.clone(),
            chunk_index,
            text: text.into(),
        }
    }
}

/// A window of document text, the unit of embedding and retrieval.
///
/// `(source_id, chunk_index)` is unique within one index build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub source_id: String,
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edited: Option<String>,
    /// 0-based position of the chunk within its document.
    pub chunk_index: usize,
    pub text: String,
}

impl Chunk {
    /// The document this chunk was cut from.
    pub fn source_ref(&self) -> SourceRef {
        SourceRef {
            source_id: self.source_id.clone(),
            title: self.title.clone(),
            url: self.url.clone(),
            last_edited: self.last_edited.clone(),
        }
    }
}

/// A reference to an indexed document, used for listings and citations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub source_id: String,
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edited: Option<String>,
}

/// Collect the distinct sources behind `chunks`, keeping first-seen order.
pub fn distinct_sources<'a>(chunks: impl IntoIterator<Item = &'a Chunk>) -> Vec<SourceRef> {
    let mut seen = std::collections::HashSet::new();
    chunks
        .into_iter()
        .filter(|chunk| seen.insert(chunk.source_id.as_str()))
        .map(Chunk::source_ref)
        .collect()
}
