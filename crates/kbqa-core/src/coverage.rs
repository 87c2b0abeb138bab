//! Knowledge-base coverage analysis.
//!
//! Inspects the documents in a [`VectorStore`] for breadth and volume:
//! file-type counts, mentions of common technical topics, content length,
//! missing kinds of material (definitions, procedures, ...), and a rough
//! `0.0..=1.0` completeness score. Matching is plain lowercase substring
//! search; no embeddings or model calls are involved.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::models::Document;
use crate::store::VectorStore;

/// Technical terms counted as topics, in reporting order for ties.
pub const TOPIC_TERMS: &[&str] = &[
    "ai",
    "artificial intelligence",
    "machine learning",
    "deep learning",
    "cloud",
    "computing",
    "database",
    "api",
    "software",
    "system",
    "algorithm",
    "data",
    "model",
    "training",
    "neural network",
];

/// Kinds of material a knowledge base should contain, with their cue phrases.
const FUNDAMENTAL_TOPICS: &[(&str, &[&str])] = &[
    ("definitions", &["definition", "what is", "meaning"]),
    ("procedures", &["how to", "steps", "process", "procedure"]),
    ("examples", &["example", "instance", "case study", "sample"]),
    ("troubleshooting", &["error", "problem", "issue", "fix", "solve"]),
];

const MAX_TOPICS: usize = 10;
const MAX_GAPS: usize = 3;
const FEW_DOCUMENTS: usize = 5;
const NARROW_TOPICS: usize = 3;
const LOW_CONTENT_CHARS: usize = 5_000;

const GENERIC_QUESTIONS: &[&str] = &[
    "What are the main concepts covered in the knowledge base?",
    "How do the different topics relate to each other?",
    "What are some practical applications of these concepts?",
    "What are common challenges or problems in this domain?",
    "What are the latest developments or trends?",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageStatus {
    Empty,
    Analyzed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub status: CoverageStatus,
    pub total_documents: usize,
    pub total_chunks: usize,
    /// Sum of document content lengths in characters.
    pub total_content_length: usize,
    pub avg_content_per_doc: usize,
    /// Lowercased file extension (or `unknown`) → document count.
    pub file_types: BTreeMap<String, usize>,
    /// Up to ten `(term, documents mentioning it)`, most frequent first.
    pub topic_coverage: Vec<(String, usize)>,
    pub suggestions: Vec<String>,
    pub completeness_score: f64,
}

impl CoverageReport {
    fn empty() -> Self {
        Self {
            status: CoverageStatus::Empty,
            total_documents: 0,
            total_chunks: 0,
            total_content_length: 0,
            avg_content_per_doc: 0,
            file_types: BTreeMap::new(),
            topic_coverage: Vec::new(),
            suggestions: vec!["Upload documents to begin analysis".to_string()],
            completeness_score: 0.0,
        }
    }
}

/// Analyze the coverage of everything currently in `store`.
///
/// Totals are taken from a single `list_documents` snapshot so they agree
/// with the per-document analysis.
pub fn analyze_coverage<S: VectorStore + ?Sized>(store: &S) -> CoverageReport {
    analyze_documents(&store.list_documents())
}

pub fn analyze_documents(documents: &[Document]) -> CoverageReport {
    if documents.is_empty() {
        return CoverageReport::empty();
    }

    let mut file_types = BTreeMap::new();
    let mut total_content_length = 0usize;
    // term → (mentions, first-seen order)
    let mut topics: HashMap<&str, (usize, usize)> = HashMap::new();

    for doc in documents {
        *file_types.entry(extension(&doc.filename)).or_insert(0) += 1;
        total_content_length += doc.content.chars().count();

        let content = doc.content.to_lowercase();
        for &term in TOPIC_TERMS {
            if content.contains(term) {
                let order = topics.len();
                topics.entry(term).or_insert((0, order)).0 += 1;
            }
        }
    }

    let mut topic_coverage: Vec<(&str, usize, usize)> = topics
        .into_iter()
        .map(|(term, (count, order))| (term, count, order))
        .collect();
    topic_coverage.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    let distinct_topics = topic_coverage.len();

    let total_documents = documents.len();
    let mut suggestions = Vec::new();
    if total_documents < FEW_DOCUMENTS {
        suggestions.push("Consider adding more documents for better coverage".to_string());
    }
    if distinct_topics < NARROW_TOPICS {
        suggestions.push("Knowledge base seems narrow - consider adding diverse topics".to_string());
    }
    if total_content_length < LOW_CONTENT_CHARS {
        suggestions.push("Content volume is low - add more detailed documents".to_string());
    }
    suggestions.extend(content_gaps(documents));

    CoverageReport {
        status: CoverageStatus::Analyzed,
        total_documents,
        total_chunks: documents.iter().map(|d| d.chunks.len()).sum(),
        total_content_length,
        avg_content_per_doc: total_content_length / total_documents,
        file_types,
        topic_coverage: topic_coverage
            .into_iter()
            .take(MAX_TOPICS)
            .map(|(term, count, _)| (term.to_string(), count))
            .collect(),
        suggestions,
        completeness_score: completeness_score(total_documents, total_content_length, distinct_topics),
    }
}

/// Suggest up to `limit` questions that might reveal knowledge gaps.
pub fn suggest_questions<S: VectorStore + ?Sized>(store: &S, limit: usize) -> Vec<String> {
    if store.stats().total_documents == 0 {
        return vec!["What topics should be covered in this knowledge base?".to_string()];
    }
    GENERIC_QUESTIONS
        .iter()
        .take(limit)
        .map(|q| q.to_string())
        .collect()
}

fn extension(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => "unknown".to_string(),
    }
}

fn content_gaps(documents: &[Document]) -> Vec<String> {
    let all_content = documents
        .iter()
        .map(|d| d.content.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    FUNDAMENTAL_TOPICS
        .iter()
        .filter(|(_, cues)| !cues.iter().any(|cue| all_content.contains(cue)))
        .take(MAX_GAPS)
        .map(|(kind, cues)| {
            format!(
                "Missing {} - consider adding content with {}",
                kind,
                cues[..2].join(", ")
            )
        })
        .collect()
}

/// Document count contributes up to 0.3, content volume up to 0.3, and topic
/// diversity up to 0.4. Rounded to two decimals.
fn completeness_score(documents: usize, content_chars: usize, topics: usize) -> f64 {
    let score = (documents as f64 / 10.0).min(0.3)
        + (content_chars as f64 / 20_000.0).min(0.3)
        + (topics as f64 / 10.0).min(0.4);
    (score * 100.0).round() / 100.0
}
