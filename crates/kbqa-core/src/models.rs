//! Core data models for the retrieval layer.
//!
//! A [`Document`] is created once, fully populated with its [`Chunk`]s, and
//! never mutated afterwards. Chunks carry their embedding vector; an empty
//! vector means the chunk was never embedded and is ignored by search.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A span of a document's text together with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub text: String,
    /// Ordinal position within the owning document, starting at 0.
    pub chunk_index: i64,
    #[serde(default)]
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

impl Chunk {
    /// Whether this chunk has an embedding and can take part in search.
    pub fn is_embedded(&self) -> bool {
        !self.embedding.is_empty()
    }
}

/// An ingested document and its ordered chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub content: String,
    #[serde(default)]
    pub chunks: Vec<Chunk>,
    #[serde(default)]
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Generate a fresh document identifier.
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Assemble a document from `(chunk text, embedding)` pairs.
    ///
    /// Chunks receive fresh UUIDs, contiguous indices, and the document's
    /// creation timestamp. The document is marked processed iff at least one
    /// pair was supplied.
    ///
    /// # Example
    ///
    /// ```rust
    /// use kbqa_core::models::Document;
    ///
    /// let doc = Document::from_embedded_chunks(
    ///     "doc-1",
    ///     "notes.txt",
    ///     "alpha beta",
    ///     vec![("alpha".to_string(), vec![1.0, 0.0]), ("beta".to_string(), vec![0.0, 1.0])],
    /// );
    /// assert!(doc.processed);
    /// assert_eq!(doc.chunks[1].chunk_index, 1);
    /// assert_eq!(doc.chunks[1].document_id, "doc-1");
    /// ```
    pub fn from_embedded_chunks(
        id: impl Into<String>,
        filename: impl Into<String>,
        content: impl Into<String>,
        pairs: Vec<(String, Vec<f32>)>,
    ) -> Self {
        let id = id.into();
        let created_at = Utc::now();
        let chunks: Vec<Chunk> = pairs
            .into_iter()
            .enumerate()
            .map(|(i, (text, embedding))| Chunk {
                id: Uuid::new_v4().to_string(),
                document_id: id.clone(),
                text,
                chunk_index: i as i64,
                embedding,
                created_at,
            })
            .collect();

        Self {
            processed: !chunks.is_empty(),
            id,
            filename: filename.into(),
            content: content.into(),
            chunks,
            created_at,
        }
    }
}

/// A ranked match returned from vector search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: Chunk,
    /// Cosine similarity in `[-1.0, 1.0]`; results below the store's floor
    /// are never returned.
    pub score: f64,
    pub document_filename: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_embedded_chunks_assigns_ownership() {
        let doc = Document::from_embedded_chunks(
            "d1",
            "a.txt",
            "one two three",
            vec![
                ("one".to_string(), vec![1.0]),
                ("two".to_string(), vec![2.0]),
                ("three".to_string(), Vec::new()),
            ],
        );
        assert!(doc.processed);
        assert_eq!(doc.chunks.len(), 3);
        for (i, c) in doc.chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
            assert_eq!(c.document_id, "d1");
            assert_eq!(c.created_at, doc.created_at);
        }
        assert!(!doc.chunks[2].is_embedded());
    }

    #[test]
    fn test_from_embedded_chunks_empty_is_unprocessed() {
        let doc = Document::from_embedded_chunks("d1", "a.txt", "", Vec::new());
        assert!(!doc.processed);
        assert!(doc.chunks.is_empty());
    }

    #[test]
    fn test_chunk_ids_unique() {
        let doc = Document::from_embedded_chunks(
            Document::new_id(),
            "a.txt",
            "",
            vec![("x".to_string(), vec![1.0]), ("y".to_string(), vec![1.0])],
        );
        assert_ne!(doc.chunks[0].id, doc.chunks[1].id);
    }
}
