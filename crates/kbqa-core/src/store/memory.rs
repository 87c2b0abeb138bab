//! In-memory [`VectorStore`] implementation.
//!
//! Documents and the chunk lookup table live in a single index behind one
//! `std::sync::RwLock`, so a writer publishes a document and all of its
//! chunks at once and readers never see a half-indexed document.
//!
//! Vector search is brute-force cosine similarity over every embedded chunk:
//! O(N·D) per query, exact, and with no auxiliary index structure.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use crate::embedding::cosine_similarity;
use crate::error::{InvalidDocument, StoreError};
use crate::models::{Chunk, Document, SearchResult};

use super::{SearchOutcome, StoreStats, VectorStore, DEFAULT_MIN_SCORE};

struct StoredDoc {
    doc: Document,
    /// Position in first-stored order, kept across overwrites.
    seq: u64,
}

/// Where a chunk lives: its owner and its position in the owner's `chunks`.
struct ChunkSlot {
    document_id: String,
    position: usize,
    /// Insertion order, used to break score ties.
    seq: u64,
}

#[derive(Default)]
struct Index {
    documents: HashMap<String, StoredDoc>,
    chunks: HashMap<String, ChunkSlot>,
    next_seq: u64,
}

impl Index {
    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn chunk(&self, slot: &ChunkSlot) -> Option<&Chunk> {
        self.documents
            .get(&slot.document_id)
            .and_then(|s| s.doc.chunks.get(slot.position))
    }

    fn unindex_chunks(&mut self, doc: &Document) {
        for c in &doc.chunks {
            self.chunks.remove(&c.id);
        }
    }
}

/// Exact-search vector store held entirely in process memory.
pub struct InMemoryVectorStore {
    index: RwLock<Index>,
    min_score: f64,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::with_min_score(DEFAULT_MIN_SCORE)
    }

    /// Create a store whose searches drop matches scoring below `min_score`.
    pub fn with_min_score(min_score: f64) -> Self {
        Self {
            index: RwLock::new(Index::default()),
            min_score,
        }
    }

    pub fn min_score(&self) -> f64 {
        self.min_score
    }

    fn read(&self) -> RwLockReadGuard<'_, Index> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Index> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Check the ownership invariant that does not depend on store contents.
fn validate(document: &Document) -> Result<(), InvalidDocument> {
    if document.chunks.is_empty() {
        return Err(InvalidDocument::NoChunks(document.id.clone()));
    }
    let mut seen = HashSet::with_capacity(document.chunks.len());
    for c in &document.chunks {
        if c.document_id != document.id {
            return Err(InvalidDocument::ForeignChunk {
                chunk_id: c.id.clone(),
                expected: document.id.clone(),
                found: c.document_id.clone(),
            });
        }
        if !seen.insert(c.id.as_str()) {
            return Err(InvalidDocument::DuplicateChunk(c.id.clone()));
        }
    }
    Ok(())
}

impl VectorStore for InMemoryVectorStore {
    fn store(&self, document: Document) -> Result<(), StoreError> {
        validate(&document)?;

        let mut index = self.write();

        for c in &document.chunks {
            if let Some(slot) = index.chunks.get(&c.id) {
                if slot.document_id != document.id {
                    return Err(InvalidDocument::ChunkOwnedElsewhere {
                        chunk_id: c.id.clone(),
                        owner: slot.document_id.clone(),
                    }
                    .into());
                }
            }
        }

        let doc_seq = match index.documents.remove(&document.id) {
            Some(previous) => {
                index.unindex_chunks(&previous.doc);
                previous.seq
            }
            None => index.next_seq(),
        };

        for (position, c) in document.chunks.iter().enumerate() {
            let seq = index.next_seq();
            index.chunks.insert(
                c.id.clone(),
                ChunkSlot {
                    document_id: document.id.clone(),
                    position,
                    seq,
                },
            );
        }

        info!(
            document_id = %document.id,
            filename = %document.filename,
            chunks = document.chunks.len(),
            "stored document"
        );

        index.documents.insert(
            document.id.clone(),
            StoredDoc {
                doc: document,
                seq: doc_seq,
            },
        );
        Ok(())
    }

    fn get_document(&self, id: &str) -> Option<Document> {
        self.read().documents.get(id).map(|s| s.doc.clone())
    }

    fn get_chunk(&self, id: &str) -> Option<Chunk> {
        let index = self.read();
        let slot = index.chunks.get(id)?;
        index.chunk(slot).cloned()
    }

    fn list_documents(&self) -> Vec<Document> {
        let index = self.read();
        let mut stored: Vec<&StoredDoc> = index.documents.values().collect();
        stored.sort_by_key(|s| s.seq);
        stored.into_iter().map(|s| s.doc.clone()).collect()
    }

    fn delete_document(&self, id: &str) -> bool {
        let mut index = self.write();
        match index.documents.remove(id) {
            Some(stored) => {
                index.unindex_chunks(&stored.doc);
                info!(document_id = %id, chunks = stored.doc.chunks.len(), "deleted document");
                true
            }
            None => false,
        }
    }

    fn search(&self, query: &[f32], limit: i64) -> SearchOutcome {
        if query.is_empty() || limit <= 0 {
            return SearchOutcome::default();
        }

        let index = self.read();
        let mut skipped = 0usize;

        let mut scored: Vec<(u64, f64, &Chunk, &str)> = index
            .chunks
            .values()
            .filter_map(|slot| {
                let stored = index.documents.get(&slot.document_id)?;
                let chunk = stored.doc.chunks.get(slot.position)?;
                if !chunk.is_embedded() {
                    return None;
                }
                match cosine_similarity(query, &chunk.embedding) {
                    Some(score) => Some((slot.seq, score, chunk, stored.doc.filename.as_str())),
                    None => {
                        skipped += 1;
                        None
                    }
                }
            })
            .filter(|(_, score, _, _)| *score >= self.min_score)
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(limit as usize);

        if skipped > 0 {
            warn!(
                skipped,
                query_dims = query.len(),
                "skipped chunks with mismatched embedding dimensions"
            );
        }
        debug!(matches = scored.len(), limit, "vector search complete");

        SearchOutcome {
            results: scored
                .into_iter()
                .map(|(_, score, chunk, filename)| SearchResult {
                    chunk: chunk.clone(),
                    score,
                    document_filename: filename.to_string(),
                })
                .collect(),
            skipped,
        }
    }

    fn stats(&self) -> StoreStats {
        let index = self.read();
        StoreStats {
            total_documents: index.documents.len(),
            total_chunks: index.chunks.len(),
            processed_documents: index.documents.values().filter(|s| s.doc.processed).count(),
            embedded_chunks: index
                .chunks
                .values()
                .filter_map(|slot| index.chunk(slot))
                .filter(|c| c.is_embedded())
                .count(),
        }
    }
}
