use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn kbqa_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_kbqa"))
}

fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_path = root.join("kbqa.toml");
    fs::write(
        &config_path,
        r#"[store]
min_score = 0.1

[cache]
search_ttl_secs = 120

[rate_limit.upload]
requests_per_window = 5
window_secs = 60
"#,
    )
    .unwrap();

    let corpus_path = root.join("corpus.json");
    fs::write(
        &corpus_path,
        r#"[
  {"id": "alpha", "filename": "alpha.md", "chunks": [
    {"text": "Rust programming with cargo and crates.", "embedding": [1.0, 0.0, 0.0]},
    {"text": "Ownership rules.", "embedding": [0.8, 0.2, 0.0]}
  ]},
  {"id": "beta", "filename": "beta.md", "chunks": [
    {"text": "Kubernetes and Docker deployment notes.", "embedding": [0.0, 0.0, 1.0]}
  ]},
  {"id": "broken", "filename": "broken.md", "chunks": []}
]"#,
    )
    .unwrap();

    (tmp, config_path, corpus_path)
}

fn run_kbqa(config: &Path, args: &[&str]) -> Output {
    Command::new(kbqa_binary())
        .arg("--config")
        .arg(config)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run kbqa binary")
}

#[test]
fn test_check_prints_resolved_config() {
    let (_tmp, config, _) = setup_test_env();
    let output = run_kbqa(&config, &["check"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("search_ttl_secs = 120"));
    assert!(stdout.contains("embedding_ttl_secs = 86400"));
    assert!(stdout.contains("requests_per_window = 5"));
}

#[test]
fn test_check_rejects_invalid_config() {
    let (tmp, _, _) = setup_test_env();
    let bad = tmp.path().join("bad.toml");
    fs::write(&bad, "[store]\nmin_score = 3.0\n").unwrap();
    let output = run_kbqa(&bad, &["check"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("min_score"));
}

#[test]
fn test_search_ranks_corpus() {
    let (_tmp, config, corpus) = setup_test_env();
    let output = run_kbqa(
        &config,
        &[
            "search",
            "--corpus",
            corpus.to_str().unwrap(),
            "--vector",
            "1.0,0.0,0.0",
            "--limit",
            "5",
        ],
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Loaded 2 documents"));
    assert!(stdout.contains("rejected broken"));
    let first = stdout.find("1. [1.0000] alpha.md (chunk 0)").unwrap();
    let second = stdout.find("2. [").unwrap();
    assert!(first < second);
    assert!(!stdout.contains("beta.md"));
}

#[test]
fn test_search_reports_dimension_skips() {
    let (_tmp, config, corpus) = setup_test_env();
    let output = run_kbqa(
        &config,
        &["search", "--corpus", corpus.to_str().unwrap(), "--vector", "1.0,0.0"],
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Skipped 3 chunks with mismatched dimensions."));
    assert!(stdout.contains("No results."));
}

#[test]
fn test_stats_with_corpus() {
    let (_tmp, config, corpus) = setup_test_env();
    let output = run_kbqa(&config, &["stats", "--corpus", corpus.to_str().unwrap()]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Documents:   2"));
    assert!(stdout.contains("Chunks:      3"));
    assert!(stdout.contains("Embedded:    3 / 3 (100%)"));
    assert!(stdout.contains("upload"));
}

#[test]
fn test_coverage_reports_gaps_and_questions() {
    let (_tmp, config, corpus) = setup_test_env();
    let output = run_kbqa(
        &config,
        &["coverage", "--corpus", corpus.to_str().unwrap(), "--questions", "2"],
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Documents:   2"));
    assert!(stdout.contains("md           2"));
    assert!(stdout.contains("Consider adding more documents for better coverage"));
    assert!(stdout.contains("Missing definitions - consider adding content with definition, what is"));
    assert!(stdout.contains("What are the main concepts covered in the knowledge base?"));
    assert!(!stdout.contains("What are some practical applications"));
}
