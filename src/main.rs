//! # kbqa CLI
//!
//! Inspect and exercise the retrieval layer from the command line.
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kbqa check` | Validate the config and print resolved settings |
//! | `kbqa search --corpus docs.json --vector "0.1,0.2"` | Rank chunks of a pre-embedded corpus |
//! | `kbqa stats [--corpus docs.json]` | Store, cache, and rate-limit statistics |
//! | `kbqa coverage --corpus docs.json` | Topic coverage, gaps, and completeness score |

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kbqa::{commands, config, logging};

/// kbqa: in-process retrieval and resource control for document Q&A.
#[derive(Parser)]
#[command(name = "kbqa", version, about)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "./config/kbqa.toml")]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and print the resolved values.
    Check,

    /// Load a pre-embedded JSON corpus and run a similarity search.
    Search {
        /// JSON corpus file of documents with embedded chunks.
        #[arg(long)]
        corpus: PathBuf,

        /// Query vector as comma-separated floats.
        #[arg(long, allow_hyphen_values = true)]
        vector: String,

        /// Maximum results to return.
        #[arg(long, default_value_t = 5)]
        limit: i64,
    },

    /// Print store, cache, and rate-limit statistics.
    Stats {
        /// Optional corpus to load before reporting.
        #[arg(long)]
        corpus: Option<PathBuf>,
    },

    /// Analyze a corpus for topic coverage and knowledge gaps.
    Coverage {
        /// JSON corpus file of documents with embedded chunks.
        #[arg(long)]
        corpus: PathBuf,

        /// Number of follow-up questions to suggest.
        #[arg(long, default_value_t = 5)]
        questions: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Check => commands::run_check(&cli.config, &cfg)?,
        Commands::Search {
            corpus,
            vector,
            limit,
        } => commands::run_search(&cfg, &corpus, &vector, limit)?,
        Commands::Stats { corpus } => commands::run_stats(&cfg, corpus.as_deref())?,
        Commands::Coverage { corpus, questions } => {
            commands::run_coverage(&cfg, &corpus, questions)?
        }
    }

    Ok(())
}
