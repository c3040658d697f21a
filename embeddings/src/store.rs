//! Persistent embedding store.
//!
//! The store is a directory holding immutable generations plus a `CURRENT`
//! pointer naming the live one:
//!
//! ```text
//! <root>/
//!   CURRENT                      name of the live generation
//!   generations/<name>/
//!     vectors.bin                header + N x D little-endian f32, row-major
//!     metadata.json              dimension, count and N chunks, same order
//! ```
//!
//! A rebuild writes a complete new generation and then atomically replaces
//! `CURRENT`, so readers observe either the old index or the new one.
//! Row `i` of `vectors.bin` always belongs to chunk `i` of `metadata.json`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use selfnotes_documents::{Chunk, SourceRef, distinct_sources};

use crate::Embedding;
use crate::error::{Result, StoreError};
use crate::similarity::rank_top_k;

const CURRENT_FILE: &str = "CURRENT";
const CURRENT_TMP_FILE: &str = "CURRENT.tmp";
const GENERATIONS_DIR: &str = "generations";
const VECTORS_FILE: &str = "vectors.bin";
const METADATA_FILE: &str = "metadata.json";

const VECTORS_MAGIC: &[u8; 8] = b"SNVEC001";
const HEADER_LEN: usize = VECTORS_MAGIC.len() + 4 + 8;
const FORMAT_VERSION: u32 = 1;

/// An embedding vector together with the chunk it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub vector: Embedding,
    pub chunk: Chunk,
}

impl EmbeddingRecord {
    /// Create a new record.
    pub fn new(vector: Embedding, chunk: Chunk) -> Self {
        Self { vector, chunk }
    }
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    /// Cosine similarity to the query.
    pub score: f32,
}

/// An in-memory snapshot of the index.
///
/// Vectors are kept in one flat row-major buffer; `vectors.len()` is always
/// `chunks.len() * dimension`.
#[derive(Debug, Clone)]
pub struct LoadedIndex {
    dimension: usize,
    vectors: Vec<f32>,
    chunks: Vec<Chunk>,
    created_at: Option<DateTime<Utc>>,
}

impl LoadedIndex {
    /// Build a snapshot from records, checking that all vectors share one
    /// dimension.
    pub fn from_records(records: Vec<EmbeddingRecord>) -> Result<Self> {
        let dimension = records.first().map_or(0, |r| r.vector.len());
        if dimension == 0 && !records.is_empty() {
            return Err(StoreError::Corrupt(
                "embedding vectors must not be empty".to_string(),
            ));
        }

        let mut vectors = Vec::with_capacity(records.len() * dimension);
        let mut chunks = Vec::with_capacity(records.len());
        for record in records {
            if record.vector.len() != dimension {
                return Err(StoreError::DimensionMismatch {
                    expected: dimension,
                    actual: record.vector.len(),
                });
            }
            vectors.extend_from_slice(&record.vector);
            chunks.push(record.chunk);
        }

        Ok(Self {
            dimension,
            vectors,
            chunks,
            created_at: None,
        })
    }

    /// Vector dimensionality. Zero for an empty index.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the index holds no records.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// When the generation was committed, for snapshots read from disk.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Chunk metadata in store order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// The vector at `index`.
    pub fn vector(&self, index: usize) -> Option<&[f32]> {
        if index >= self.len() {
            return None;
        }
        let start = index.checked_mul(self.dimension)?;
        let end = start.checked_add(self.dimension)?;
        self.vectors.get(start..end)
    }

    /// Vectors in store order.
    pub fn vectors(&self) -> impl Iterator<Item = &[f32]> {
        self.vectors.chunks_exact(self.dimension.max(1))
    }

    /// Consume the snapshot, returning records in store order.
    pub fn into_records(self) -> Vec<EmbeddingRecord> {
        let dimension = self.dimension.max(1);
        self.vectors
            .chunks_exact(dimension)
            .map(<[f32]>::to_vec)
            .zip(self.chunks)
            .map(|(vector, chunk)| EmbeddingRecord { vector, chunk })
            .collect()
    }

    /// Distinct documents in the index, in first-seen order.
    pub fn sources(&self) -> Vec<SourceRef> {
        distinct_sources(&self.chunks)
    }

    /// Exact cosine search returning the `k` best chunks.
    ///
    /// Equal scores are ordered by store position. Fewer than `k` records
    /// returns them all.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if self.is_empty() {
            return Err(StoreError::EmptyIndex);
        }
        if query.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let hits = rank_top_k(query, self.vectors(), k)
            .into_iter()
            .map(|(index, score)| SearchHit {
                chunk: self.chunks[index].clone(),
                score,
            })
            .collect();
        Ok(hits)
    }
}

#[derive(Serialize)]
struct MetadataOut<'a> {
    version: u32,
    dimension: usize,
    count: usize,
    created_at: DateTime<Utc>,
    chunks: &'a [Chunk],
}

#[derive(Deserialize)]
struct MetadataIn {
    version: u32,
    dimension: usize,
    count: usize,
    created_at: DateTime<Utc>,
    chunks: Vec<Chunk>,
}

/// Handle to an embedding store directory.
///
/// `rebuild` is the only mutator. Any number of readers may `load`
/// concurrently with a rebuild.
#[derive(Debug, Clone)]
pub struct EmbeddingStore {
    root: PathBuf,
}

impl EmbeddingStore {
    /// Create a handle for the store rooted at `root`. Nothing is touched on
    /// disk until the first rebuild.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generations_dir(&self) -> PathBuf {
        self.root.join(GENERATIONS_DIR)
    }

    /// Whether an index has been committed.
    pub async fn exists(&self) -> bool {
        fs::try_exists(self.root.join(CURRENT_FILE))
            .await
            .unwrap_or(false)
    }

    /// Replace the whole index with `records`.
    ///
    /// On failure the previously committed index is left untouched.
    pub async fn rebuild(&self, records: Vec<EmbeddingRecord>) -> Result<()> {
        let index = LoadedIndex::from_records(records)?;
        self.commit(&index).await
    }

    /// Persist `index` as a new generation and make it current.
    pub async fn commit(&self, index: &LoadedIndex) -> Result<()> {
        let generations = self.generations_dir();
        fs::create_dir_all(&generations)
            .await
            .map_err(|e| write_failed(&generations, e))?;

        let name = format!(
            "{}-{}",
            Utc::now().format("%Y%m%dT%H%M%S"),
            uuid::Uuid::new_v4().simple()
        );
        let staging = generations.join(&name);
        let previous = self.read_current().await.ok();

        if let Err(err) = self.write_generation(&staging, &name, index).await {
            if let Err(cleanup) = fs::remove_dir_all(&staging).await {
                warn!(
                    "Failed to remove staging generation {}: {cleanup}",
                    staging.display()
                );
            }
            return Err(err);
        }

        info!(
            "Committed {} records ({} dimensions) to {}",
            index.len(),
            index.dimension(),
            self.root.display()
        );

        self.prune_generations(&name, previous.as_deref()).await;
        Ok(())
    }

    async fn write_generation(&self, dir: &Path, name: &str, index: &LoadedIndex) -> Result<()> {
        fs::create_dir(dir).await.map_err(|e| write_failed(dir, e))?;

        let dimension = u32::try_from(index.dimension)
            .map_err(|_| StoreError::WriteFailed("dimension too large".to_string()))?;
        let mut vectors = Vec::with_capacity(HEADER_LEN + index.vectors.len() * 4);
        vectors.extend_from_slice(VECTORS_MAGIC);
        vectors.extend_from_slice(&dimension.to_le_bytes());
        vectors.extend_from_slice(&(index.len() as u64).to_le_bytes());
        for value in &index.vectors {
            vectors.extend_from_slice(&value.to_le_bytes());
        }
        write_synced(&dir.join(VECTORS_FILE), &vectors).await?;

        let metadata = serde_json::to_vec(&MetadataOut {
            version: FORMAT_VERSION,
            dimension: index.dimension,
            count: index.len(),
            created_at: Utc::now(),
            chunks: &index.chunks,
        })
        .map_err(|e| StoreError::WriteFailed(format!("metadata: {e}")))?;
        write_synced(&dir.join(METADATA_FILE), &metadata).await?;

        // Swap the pointer last; until the rename lands readers see the old generation.
        let tmp = self.root.join(CURRENT_TMP_FILE);
        write_synced(&tmp, name.as_bytes()).await?;
        let current = self.root.join(CURRENT_FILE);
        fs::rename(&tmp, &current)
            .await
            .map_err(|e| write_failed(&current, e))?;

        debug!("Switched {} to generation {name}", current.display());
        Ok(())
    }

    /// Remove generations other than the live one and the one it replaced.
    async fn prune_generations(&self, current: &str, previous: Option<&str>) {
        let keep: HashSet<&str> = [Some(current), previous].into_iter().flatten().collect();
        let generations = self.generations_dir();

        let mut entries = match fs::read_dir(&generations).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to list {}: {e}", generations.display());
                return;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            if keep.contains(name.to_string_lossy().as_ref()) {
                continue;
            }
            match fs::remove_dir_all(entry.path()).await {
                Ok(()) => debug!("Pruned generation {}", entry.path().display()),
                Err(e) => warn!("Failed to prune {}: {e}", entry.path().display()),
            }
        }
    }

    async fn read_current(&self) -> Result<String> {
        let path = self.root.join(CURRENT_FILE);
        let name = match fs::read_to_string(&path).await {
            Ok(name) => name.trim().to_string(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(self.root.clone()));
            }
            Err(e) => {
                return Err(StoreError::Corrupt(format!("{}: {e}", path.display())));
            }
        };

        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(StoreError::Corrupt(format!(
                "invalid generation name in {}: {name:?}",
                path.display()
            )));
        }
        Ok(name)
    }

    /// Read the current index into memory.
    pub async fn load(&self) -> Result<LoadedIndex> {
        let name = self.read_current().await?;
        let dir = self.generations_dir().join(&name);

        let metadata_path = dir.join(METADATA_FILE);
        let metadata_bytes = fs::read(&metadata_path)
            .await
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", metadata_path.display())))?;
        let metadata: MetadataIn = serde_json::from_slice(&metadata_bytes)
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", metadata_path.display())))?;
        if metadata.version != FORMAT_VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported format version {}",
                metadata.version
            )));
        }

        let vectors_path = dir.join(VECTORS_FILE);
        let bytes = fs::read(&vectors_path)
            .await
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", vectors_path.display())))?;
        let vectors = decode_vectors(&bytes, &metadata)?;

        debug!(
            "Loaded generation {name}: {} records, {} dimensions",
            metadata.count, metadata.dimension
        );

        Ok(LoadedIndex {
            dimension: metadata.dimension,
            vectors,
            chunks: metadata.chunks,
            created_at: Some(metadata.created_at),
        })
    }

    /// Load the current index and search it.
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.load().await?.search(query, k)
    }
}

fn decode_vectors(bytes: &[u8], metadata: &MetadataIn) -> Result<Vec<f32>> {
    let Some((header, body)) = bytes.split_at_checked(HEADER_LEN) else {
        return Err(StoreError::Corrupt("vector file is truncated".to_string()));
    };
    let (magic, rest) = header.split_at(VECTORS_MAGIC.len());
    if magic != VECTORS_MAGIC {
        return Err(StoreError::Corrupt("bad vector file header".to_string()));
    }
    let (dimension, count) = rest.split_at(4);
    let dimension = u32::from_le_bytes([dimension[0], dimension[1], dimension[2], dimension[3]]);
    let count = u64::from_le_bytes([
        count[0], count[1], count[2], count[3], count[4], count[5], count[6], count[7],
    ]);

    if dimension as usize != metadata.dimension {
        return Err(StoreError::Corrupt(format!(
            "vector dimension {dimension} does not match metadata dimension {}",
            metadata.dimension
        )));
    }
    if count as usize != metadata.count || metadata.count != metadata.chunks.len() {
        return Err(StoreError::Corrupt(format!(
            "{count} vectors but {} metadata entries",
            metadata.chunks.len()
        )));
    }
    if metadata.count > 0 && metadata.dimension == 0 {
        return Err(StoreError::Corrupt("zero-dimensional vectors".to_string()));
    }
    let expected_len = metadata.count * metadata.dimension * 4;
    if body.len() != expected_len {
        return Err(StoreError::Corrupt(format!(
            "vector data is {} bytes, expected {expected_len}",
            body.len()
        )));
    }

    Ok(body
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

async fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path)
        .await
        .map_err(|e| write_failed(path, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| write_failed(path, e))?;
    file.sync_all().await.map_err(|e| write_failed(path, e))?;
    Ok(())
}

fn write_failed(path: &Path, err: std::io::Error) -> StoreError {
    StoreError::WriteFailed(format!("{}: {err}", path.display()))
}
