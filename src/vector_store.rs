use crate::config::Number;
use crate::error::Result;
use crate::vector_entry::{Payload, VectorEntry};
use crate::vector_ops::cosine_similarity;
use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub similarity: Number,
    pub data: Payload,
}

/// In-memory entries of one category, searched by exact linear scan.
#[derive(Debug, Default, Clone)]
pub struct VectorStore {
    entries: Vec<VectorEntry>,
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry. Vector length is not checked against existing entries;
    /// a mismatch surfaces at retrieval time.
    pub fn store(&mut self, vector: Vec<Number>, data: impl Into<Payload>) {
        self.entries.push(VectorEntry::new(vector, data));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[VectorEntry] {
        &self.entries
    }

    /// Dimensionality of the first stored vector, if any.
    pub fn dimensions(&self) -> Option<usize> {
        self.entries.first().map(|entry| entry.vector.len())
    }

    /// Returns the `top_n` entries most similar to `query_vector`, highest first.
    ///
    /// Every entry is scored; equal similarities keep insertion order. Fails on
    /// the first entry whose vector cannot be compared with the query.
    pub fn retrieve(&self, query_vector: &[Number], top_n: usize) -> Result<Vec<SearchResult>> {
        let start = Instant::now();

        let mut results = self
            .entries
            .par_iter()
            .map(|entry| {
                cosine_similarity(query_vector, &entry.vector).map(|similarity| SearchResult {
                    similarity,
                    data: entry.data.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // Stable: ties stay in insertion order.
        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_n);

        debug!(
            scanned = self.entries.len(),
            returned = results.len(),
            elapsed = ?start.elapsed(),
            "exact search finished"
        );
        Ok(results)
    }
}
