//! Gmail Cleanup
//!
//! Finds old, unread, non-critical Gmail messages, reports how much space they
//! take and who sent them, and moves them to Trash once the user types
//! `PROCEED`.
//!
//! # Overview
//!
//! The pipeline runs four stages in order:
//! - **Authentication**: OAuth2 with a persisted, refreshable credential
//! - **Search**: one messages.list call with a filter that skips protected labels
//! - **Analysis**: metadata fetched in chunks of up to 100, aggregated by size,
//!   category and sender
//! - **Confirm and trash**: the report is printed, and each candidate is
//!   trashed on confirmation, tolerating per-message failures
//!
//! # Example Usage
//!
//! ```no_run
//! use gmail_cleanup::{auth, client::ProductionGmailClient, config::Config};
//! use gmail_cleanup::classifier::CategoryTable;
//! use gmail_cleanup::{analyzer::BatchAnalyzer, query::SearchFilter, report::Report};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("gmail-cleanup.toml".as_ref()).await?;
//!
//!     let hub = auth::authenticate("credentials.json".as_ref(), "token.json".as_ref()).await?;
//!     let client = ProductionGmailClient::new(hub, config.analysis.max_concurrent_requests);
//!
//!     let filter = SearchFilter::from_config(&config.search);
//!     let search = gmail_cleanup::scanner::search_candidates(&client, &filter, 500).await?;
//!
//!     let categories = CategoryTable::new(config.categories.clone());
//!     let analysis = BatchAnalyzer::from_config(&client, &categories, &config.analysis)
//!         .analyze(&search.candidates)
//!         .await;
//!     println!("{}", Report::from_analysis(&analysis, 20, 10).render());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - OAuth2 credential storage, refresh and login
//! - [`query`] - Search filter construction
//! - [`scanner`] - Candidate search
//! - [`analyzer`] - Batched metadata analysis
//! - [`classifier`] - Label to category mapping
//! - [`report`] - Size formatting and report rendering
//! - [`trash`] - Confirmation gate and trash execution
//! - [`client`] - Gmail API client trait and production client
//! - [`rate_limiter`] - Quota pacing
//! - [`cli`] - Command-line interface and pipeline orchestration
//! - [`config`] - Configuration management
//! - [`error`] - Error types and result aliases
//! - [`models`] - Core data structures

pub mod analyzer;
pub mod auth;
pub mod classifier;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod query;
pub mod rate_limiter;
pub mod report;
pub mod scanner;
pub mod trash;

// Re-export commonly used types for convenience
pub use error::{GmailError, Result};

pub use models::{AnalysisResult, MailCategory, MessageMetadata, MessageRef, MessageSummary};

pub use config::{AnalysisConfig, CategoryRule, Config, SearchConfig};

pub use client::{GmailClient, ProductionGmailClient};

pub use analyzer::BatchAnalyzer;
pub use query::SearchFilter;
pub use report::{format_size, Report};
pub use trash::{is_confirmed, TrashExecutor, TrashSummary};

pub use cli::{Cli, Commands, ProgressReporter, RunOutcome, RunSummary};
