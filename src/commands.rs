//! CLI command implementations.
//!
//! Each command builds a fresh [`Services`] set from config, does its work,
//! and prints a human-readable report to stdout.

use std::path::Path;

use anyhow::Result;
use kbqa_core::coverage::{analyze_coverage, suggest_questions};
use kbqa_core::store::{SearchOutcome, VectorStore};
use kbqa_core::{CacheStats, CoverageReport, CoverageStatus};

use crate::config::Config;
use crate::corpus::{ingest_documents, load_corpus, parse_vector};
use crate::services::{ServiceStats, Services};

/// Print the resolved configuration.
pub fn run_check(config_path: &Path, config: &Config) -> Result<()> {
    println!("Config: {}", config_path.display());
    if !config_path.exists() {
        println!("  (file not found, using defaults)");
    }
    println!();
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Load a corpus into a fresh store, returning the populated services.
fn load_services(config: &Config, corpus: &Path) -> Result<Services> {
    let services = Services::from_config(config);
    let docs = load_corpus(corpus)?;
    let report = ingest_documents(services.store.as_ref(), docs);
    println!(
        "Loaded {} document{} from {}",
        report.stored,
        if report.stored == 1 { "" } else { "s" },
        corpus.display()
    );
    for (id, reason) in &report.rejected {
        println!("  rejected {}: {}", id, reason);
    }
    Ok(services)
}

pub fn run_search(config: &Config, corpus: &Path, vector: &str, limit: i64) -> Result<()> {
    let services = load_services(config, corpus)?;
    let query = parse_vector(vector)?;
    let outcome = services.store.search(&query, limit);
    println!();
    print_outcome(&outcome);
    Ok(())
}

pub fn run_stats(config: &Config, corpus: Option<&Path>) -> Result<()> {
    let services = match corpus {
        Some(path) => load_services(config, path)?,
        None => Services::from_config(config),
    };
    println!();
    print_stats(&services.stats());
    Ok(())
}

pub fn run_coverage(config: &Config, corpus: &Path, questions: usize) -> Result<()> {
    let services = load_services(config, corpus)?;
    let report = analyze_coverage(services.store.as_ref());
    println!();
    print_coverage(&report);
    if questions > 0 {
        println!("  Questions to try:");
        for q in suggest_questions(services.store.as_ref(), questions) {
            println!("    - {}", q);
        }
        println!();
    }
    Ok(())
}

fn print_coverage(report: &CoverageReport) {
    println!("Knowledge base coverage");
    println!("=======================");
    println!();
    if report.status == CoverageStatus::Empty {
        println!("  No documents in knowledge base.");
    } else {
        println!("  Documents:   {}", report.total_documents);
        println!("  Chunks:      {}", report.total_chunks);
        println!(
            "  Content:     {} chars ({} per document)",
            report.total_content_length, report.avg_content_per_doc
        );
        println!("  Score:       {:.2}", report.completeness_score);
        println!();
        println!("  File types:");
        for (ext, count) in &report.file_types {
            println!("    {:<12} {}", ext, count);
        }
        if !report.topic_coverage.is_empty() {
            println!();
            println!("  Topics:");
            for (term, count) in &report.topic_coverage {
                println!("    {:<24} {}", term, count);
            }
        }
    }
    println!();
    println!("  Suggestions:");
    for s in &report.suggestions {
        println!("    - {}", s);
    }
    println!();
}

fn print_outcome(outcome: &SearchOutcome) {
    if outcome.skipped > 0 {
        println!(
            "Skipped {} chunk{} with mismatched dimensions.",
            outcome.skipped,
            if outcome.skipped == 1 { "" } else { "s" }
        );
    }
    if outcome.results.is_empty() {
        println!("No results.");
        return;
    }
    for (i, result) in outcome.results.iter().enumerate() {
        println!(
            "{}. [{:.4}] {} (chunk {})",
            i + 1,
            result.score,
            result.document_filename,
            result.chunk.chunk_index
        );
        println!("    {}", snippet(&result.chunk.text, 120));
        println!("    id: {}", result.chunk.id);
        println!();
    }
}

fn snippet(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}…", cut.trim_end())
    }
}

fn print_cache(name: &str, stats: &CacheStats) {
    println!(
        "  {:<16} {:>8} {:>8} {:>8}   {}",
        name,
        stats.total_entries,
        stats.total_hits,
        stats.expired_entries,
        format_bytes(stats.memory_estimate)
    );
}

fn print_stats(stats: &ServiceStats) {
    println!("kbqa service stats");
    println!("====================");
    println!();
    println!("  Documents:   {}", stats.store.total_documents);
    println!("  Processed:   {}", stats.store.processed_documents);
    println!("  Chunks:      {}", stats.store.total_chunks);
    println!(
        "  Embedded:    {} / {} ({}%)",
        stats.store.embedded_chunks,
        stats.store.total_chunks,
        if stats.store.total_chunks > 0 {
            (stats.store.embedded_chunks * 100) / stats.store.total_chunks
        } else {
            0
        }
    );
    println!();
    println!("  Caches:");
    println!(
        "  {:<16} {:>8} {:>8} {:>8}   {}",
        "NAME", "ENTRIES", "HITS", "EXPIRED", "MEMORY"
    );
    println!("  {}", "-".repeat(60));
    print_cache("general", &stats.cache);
    print_cache("embeddings", &stats.embedding_cache);
    print_cache("search", &stats.search_cache);
    println!();
    println!("  Rate limits:");
    for (name, tier) in [
        ("upload", &stats.upload_limiter),
        ("general", &stats.general_limiter),
    ] {
        println!(
            "  {:<16} {} req / {}s, {} active client{}, {} recent",
            name,
            tier.limit,
            tier.window_secs,
            tier.active_clients,
            if tier.active_clients == 1 { "" } else { "s" },
            tier.total_recent_requests
        );
    }
    println!();
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: usize) -> String {
    let bytes = bytes as f64;
    if bytes < 1024.0 {
        format!("{} B", bytes)
    } else if bytes < 1024.0 * 1024.0 {
        format!("{:.1} KB", bytes / 1024.0)
    } else {
        format!("{:.1} MB", bytes / (1024.0 * 1024.0))
    }
}
