//! Fixed-size window chunking.
//!
//! Text is cut into windows of `size` characters, each window starting
//! `size - overlap` characters after the previous one. Boundaries depend only
//! on character offsets, never on content, so identical input always yields
//! identical chunks.

use serde::{Deserialize, Serialize};

use crate::document::{Chunk, Document};
use crate::error::ChunkError;

/// Configuration for the chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Window size in characters.
    pub size: usize,

    /// Characters shared by consecutive windows.
    pub overlap: usize,
}

impl ChunkerConfig {
    /// Create a new configuration.
    pub fn new(size: usize, overlap: usize) -> Self {
        Self { size, overlap }
    }

    /// Check that `size > 0` and `overlap < size`.
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.size == 0 {
            return Err(ChunkError::ZeroSize);
        }
        if self.overlap >= self.size {
            return Err(ChunkError::OverlapTooLarge {
                size: self.size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            size: 500,
            overlap: 50,
        }
    }
}

/// Splits document text into overlapping fixed-size windows.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a chunker, rejecting invalid parameters.
    pub fn new(config: ChunkerConfig) -> Result<Self, ChunkError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The active configuration.
    pub fn config(&self) -> ChunkerConfig {
        self.config
    }

    /// Split `text` into windows. Empty input yields no windows.
    pub fn split(&self, text: &str) -> Vec<String> {
        split_windows(text, self.config.size, self.config.size - self.config.overlap)
    }

    /// Split a document into chunks numbered from zero.
    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        self.split(&document.text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| document.chunk(index, text))
            .collect()
    }
}

/// Split `text` into windows of `size` characters overlapping by `overlap`.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Result<Vec<String>, ChunkError> {
    Ok(Chunker::new(ChunkerConfig::new(size, overlap))?.split(text))
}

fn split_windows(text: &str, size: usize, step: usize) -> Vec<String> {
    // Byte offset of every character start, plus the end of the text.
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = offsets.len() - 1;

    let mut windows = Vec::new();
    if char_count == 0 {
        return windows;
    }

    let mut start = 0;
    loop {
        let end = (start + size).min(char_count);
        windows.push(text[offsets[start]..offsets[end]].to_string());
        if end == char_count {
            break;
        }
        start += step;
    }
    windows
}
