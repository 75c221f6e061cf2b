use crate::config::{DEFAULT_MIN_CHUNK_LEN, DEFAULT_TOP_K};
use crate::embed::Embedder;
use crate::error::{Result, StoreError};
use crate::extract;
use crate::registry::CategoryRegistry;
use crate::sanitize::sanitize;
use crate::vector_store::SearchResult;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of ingesting several files into one category.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Entries stored per successfully processed file.
    pub ingested: Vec<(PathBuf, usize)>,
    pub failures: Vec<(PathBuf, StoreError)>,
}

impl IngestReport {
    pub fn stored(&self) -> usize {
        self.ingested.iter().map(|(_, n)| n).sum()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Extraction, sanitizing, embedding and storage for one registry.
pub struct Pipeline<E: Embedder> {
    registry: CategoryRegistry,
    embedder: E,
    min_chunk_len: usize,
    top_k: usize,
}

impl<E: Embedder> Pipeline<E> {
    pub fn new(registry: CategoryRegistry, embedder: E) -> Self {
        Self {
            registry,
            embedder,
            min_chunk_len: DEFAULT_MIN_CHUNK_LEN,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Chunks shorter than this many characters after sanitizing are dropped.
    pub fn with_min_chunk_len(mut self, min_chunk_len: usize) -> Self {
        self.min_chunk_len = min_chunk_len;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    /// Stores `text` as a single chunk. Returns how many entries were stored (0 or 1).
    pub fn ingest_text(&mut self, text: &str, category: &str) -> Result<usize> {
        self.store_chunks(std::iter::once(text), category)
    }

    /// Extracts `path`, splits it into paragraphs and stores each one that is long
    /// enough. The first embedding or storage failure aborts the rest of the file.
    pub fn ingest_file(&mut self, path: &Path, category: &str) -> Result<usize> {
        let paragraphs = extract::extract_paragraphs(path)?;
        let stored = self.store_chunks(paragraphs.iter().map(String::as_str), category)?;
        info!(path = %path.display(), category, stored, "file ingested");
        Ok(stored)
    }

    /// Ingests each path in turn. A failing file is recorded and skipped.
    pub fn ingest_paths<P: AsRef<Path>>(&mut self, paths: &[P], category: &str) -> IngestReport {
        let mut report = IngestReport::default();
        for path in paths {
            let path = path.as_ref();
            match self.ingest_file(path, category) {
                Ok(stored) => report.ingested.push((path.to_path_buf(), stored)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping file");
                    report.failures.push((path.to_path_buf(), e));
                }
            }
        }
        report
    }

    /// Embeds `query` and returns the category's `top_k` closest entries.
    pub fn retrieve_similar(&self, query: &str, category: &str) -> Result<Vec<SearchResult>> {
        if self.registry.get(category).is_none() {
            return Err(StoreError::UnknownCategory(category.to_string()));
        }
        let query_vector = self.embedder.embed(&sanitize(query))?;
        self.registry.retrieve(category, &query_vector, self.top_k)
    }

    pub fn shutdown(self) -> Result<()> {
        self.registry.shutdown()
    }

    fn store_chunks<'a>(&mut self, chunks: impl IntoIterator<Item = &'a str>, category: &str) -> Result<usize> {
        let mut stored = 0;
        for raw in chunks {
            let chunk = sanitize(raw);
            if chunk.chars().count() < self.min_chunk_len {
                debug!(chunk = %chunk, "chunk too short, skipped");
                continue;
            }
            let vector = self.embedder.embed(&chunk)?;
            self.registry.append(category, vector, chunk)?;
            stored += 1;
        }
        Ok(stored)
    }
}
