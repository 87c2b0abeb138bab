//! # kbqa
//!
//! Application layer around [`kbqa_core`]: configuration, logging,
//! component wiring, periodic maintenance, and the `kbqa` CLI.
//!
//! ## Architecture
//!
//! ```text
//!  collaborators (HTTP, chunker, embedder, LLM)
//!                 │
//!        ┌────────┴────────┐
//!        ▼                 ▼
//!  ┌───────────┐    ┌─────────────┐
//!  │ RateLimit │──▶ │  Retriever  │──▶ TtlCache (embeddings, searches)
//!  └───────────┘    └──────┬──────┘
//!                          ▼
//!                 ┌─────────────────┐
//!                 │ InMemoryVector- │
//!                 │      Store      │
//!                 └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing-subscriber` setup |
//! | [`services`] | Builds every core component from config |
//! | [`maintenance`] | Periodic cache and limiter sweeps |
//! | [`corpus`] | JSON corpus loading and batch ingestion |
//! | [`commands`] | CLI command implementations |

pub mod commands;
pub mod config;
pub mod corpus;
pub mod logging;
pub mod maintenance;
pub mod services;

pub use kbqa_core::{models, retriever, store};
pub use services::Services;
