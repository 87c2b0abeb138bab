//! JSON corpus loading.
//!
//! Chunking and embedding happen upstream; a corpus file carries the result:
//! documents whose chunks already have embeddings.
//!
//! ```json
//! [
//!   {
//!     "id": "runbook-deploy",
//!     "filename": "deploy.md",
//!     "chunks": [
//!       { "text": "Pull latest from main.", "embedding": [0.12, 0.80, 0.05] },
//!       { "text": "Restart the service.", "embedding": [0.70, 0.10, 0.30] }
//!     ]
//!   }
//! ]
//! ```
//!
//! `id` defaults to a fresh UUID and `content` to the chunk texts joined by
//! blank lines.

use std::path::Path;

use anyhow::{Context, Result};
use kbqa_core::models::Document;
use kbqa_core::store::VectorStore;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct CorpusDocument {
    #[serde(default)]
    id: Option<String>,
    filename: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    chunks: Vec<CorpusChunk>,
}

#[derive(Debug, Deserialize)]
struct CorpusChunk {
    text: String,
    #[serde(default)]
    embedding: Vec<f32>,
}

impl CorpusDocument {
    fn into_document(self) -> Document {
        let content = self.content.unwrap_or_else(|| {
            self.chunks
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n")
        });
        let pairs = self
            .chunks
            .into_iter()
            .map(|c| (c.text, c.embedding))
            .collect();
        Document::from_embedded_chunks(
            self.id.unwrap_or_else(Document::new_id),
            self.filename,
            content,
            pairs,
        )
    }
}

pub fn parse_corpus(json: &str) -> Result<Vec<Document>> {
    let docs: Vec<CorpusDocument> =
        serde_json::from_str(json).with_context(|| "Failed to parse corpus JSON")?;
    Ok(docs.into_iter().map(CorpusDocument::into_document).collect())
}

pub fn load_corpus(path: &Path) -> Result<Vec<Document>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus file: {}", path.display()))?;
    parse_corpus(&content)
}

/// Outcome of storing a batch of documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub stored: usize,
    /// `(document id, reason)` for each document the store refused.
    pub rejected: Vec<(String, String)>,
}

/// Store every document, collecting rejections instead of stopping at the first.
pub fn ingest_documents<S: VectorStore + ?Sized>(store: &S, docs: Vec<Document>) -> IngestReport {
    let mut report = IngestReport::default();
    for doc in docs {
        let id = doc.id.clone();
        match store.store(doc) {
            Ok(()) => report.stored += 1,
            Err(e) => {
                warn!(document_id = %id, error = %e, "document rejected");
                report.rejected.push((id, e.to_string()));
            }
        }
    }
    report
}

/// Parse a comma-separated query vector such as `"0.1, 0.2, -0.3"`.
///
/// An empty string yields an empty vector.
pub fn parse_vector(s: &str) -> Result<Vec<f32>> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<f32>()
                .with_context(|| format!("invalid vector component: '{}'", part))
        })
        .collect()
}
