//! Storage abstraction for documents and chunk embeddings.
//!
//! The [`VectorStore`] trait is the seam between callers and the index.
//! [`memory::InMemoryVectorStore`] is an exact brute-force implementation;
//! an approximate index can be swapped in behind the same contract without
//! changing callers.
//!
//! Implementations must be `Send + Sync` so one store can be shared across
//! request handlers.

pub mod memory;

use serde::Serialize;

use crate::error::StoreError;
use crate::models::{Chunk, Document, SearchResult};

/// Minimum cosine score a chunk must reach to be returned from search.
pub const DEFAULT_MIN_SCORE: f64 = 0.1;

/// Ranked results of a vector search.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchOutcome {
    /// Matches ordered by descending score, at most `limit` long.
    pub results: Vec<SearchResult>,
    /// Chunks skipped because their embedding length differs from the query.
    pub skipped: usize,
}

impl SearchOutcome {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Counts describing the store contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total_documents: usize,
    pub total_chunks: usize,
    pub processed_documents: usize,
    pub embedded_chunks: usize,
}

/// Abstract document and vector index.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`store`](VectorStore::store) | Insert or replace a fully-populated document |
/// | [`get_document`](VectorStore::get_document) | Retrieve a document by ID |
/// | [`get_chunk`](VectorStore::get_chunk) | Retrieve a single chunk by ID |
/// | [`list_documents`](VectorStore::list_documents) | All stored documents |
/// | [`delete_document`](VectorStore::delete_document) | Remove a document and its chunks |
/// | [`search`](VectorStore::search) | Ranked cosine similarity search |
/// | [`stats`](VectorStore::stats) | Document and chunk counts |
pub trait VectorStore: Send + Sync {
    /// Insert or replace a document and index all of its chunks.
    ///
    /// The document and its chunks become visible to readers together.
    fn store(&self, document: Document) -> Result<(), StoreError>;

    fn get_document(&self, id: &str) -> Option<Document>;

    fn get_chunk(&self, id: &str) -> Option<Chunk>;

    /// All stored documents, in the order they were first stored.
    fn list_documents(&self) -> Vec<Document>;

    /// Remove a document and every one of its chunks.
    ///
    /// Returns `true` iff the document existed.
    fn delete_document(&self, id: &str) -> bool;

    /// Rank embedded chunks by cosine similarity to `query`.
    ///
    /// An empty query or a non-positive `limit` yields an empty outcome.
    fn search(&self, query: &[f32], limit: i64) -> SearchOutcome;

    fn stats(&self) -> StoreStats;
}
