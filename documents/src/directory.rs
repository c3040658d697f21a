//! Local directory content source.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use url::Url;
use walkdir::{DirEntry, WalkDir};

use crate::document::Document;
use crate::error::SourceError;
use crate::source::{ContentSource, DocumentStream};

/// Indexes markdown and text files below a root directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    extensions: Vec<String>,
}

impl DirectorySource {
    /// Create a source rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: vec!["md".to_string(), "txt".to_string()],
        }
    }

    /// Replace the list of file extensions to index.
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// Files to index, in sorted path order.
    fn collect_files(&self) -> Result<Vec<PathBuf>, SourceError> {
        if !self.root.is_dir() {
            return Err(SourceError::NotConfigured(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));
        for entry in walker {
            let entry = entry.map_err(|e| SourceError::Io(e.into()))?;
            if entry.file_type().is_file() && self.matches_extension(entry.path()) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn document_for(&self, path: &Path, url: String, text: String) -> Document {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let source_id = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| source_id.clone());
        Document::new(source_id, title, url, text)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

impl ContentSource for DirectorySource {
    fn name(&self) -> &str {
        "directory"
    }

    fn fetch_all(&self) -> DocumentStream<'_> {
        Box::pin(async_stream::stream! {
            // The walk is synchronous; keep it off the async workers.
            let walker = self.clone();
            let files = match tokio::task::spawn_blocking(move || walker.collect_files()).await {
                Ok(Ok(files)) => files,
                Ok(Err(err)) => {
                    yield Err(err);
                    return;
                }
                Err(err) => {
                    yield Err(SourceError::Io(std::io::Error::other(err)));
                    return;
                }
            };
            debug!("Found {} files under {}", files.len(), self.root.display());

            for path in files {
                match tokio::fs::read(&path).await {
                    Ok(bytes) => {
                        let text = String::from_utf8_lossy(&bytes).into_owned();
                        if text.trim().is_empty() {
                            continue;
                        }
                        let url = tokio::fs::canonicalize(&path)
                            .await
                            .ok()
                            .and_then(|p| Url::from_file_path(p).ok())
                            .map(String::from)
                            .unwrap_or_default();
                        yield Ok(self.document_for(&path, url, text));
                    }
                    Err(err) => {
                        warn!("Failed to read {}: {err}", path.display());
                        yield Err(SourceError::Io(err));
                        return;
                    }
                }
            }
        })
    }
}
