//! The content source capability.

use futures::StreamExt;
use futures::stream::{self, BoxStream};

use crate::document::Document;
use crate::error::SourceError;

/// A lazy sequence of documents. Any item may be a failure.
pub type DocumentStream<'a> = BoxStream<'a, Result<Document, SourceError>>;

/// Something that can produce the full document corpus.
///
/// Implementations must not retry internally; failures are reported to the
/// caller as they happen.
pub trait ContentSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Stream every document the source knows about.
    fn fetch_all(&self) -> DocumentStream<'_>;
}

/// A source backed by documents held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    documents: Vec<Document>,
}

impl StaticSource {
    /// Create a source from a list of documents.
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Append a document.
    pub fn push(&mut self, document: Document) {
        self.documents.push(document);
    }
}

impl ContentSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch_all(&self) -> DocumentStream<'_> {
        stream::iter(self.documents.iter().cloned().map(Ok)).boxed()
    }
}
