//! Command-line interface

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::analyzer::BatchAnalyzer;
use crate::auth;
use crate::classifier::CategoryTable;
use crate::client::{GmailClient, ProductionGmailClient, ProgressCallback};
use crate::config::Config;
use crate::error::Result;
use crate::query::SearchFilter;
use crate::report::{format_size, Report};
use crate::scanner::search_candidates;
use crate::trash::{read_confirmation, TrashExecutor, TrashSummary, CONFIRMATION_TOKEN};

#[derive(Parser, Debug)]
#[command(name = "gmail-cleanup")]
#[command(version = "0.1.0")]
#[command(about = "Find old unread Gmail messages, report what they cost, and move them to Trash", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "gmail-cleanup.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 client secret file
    #[arg(long, default_value = "credentials.json")]
    pub credentials: PathBuf,

    /// Path to token cache file
    #[arg(long, default_value = "token.json")]
    pub token_cache: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate with Gmail API
    Auth {
        /// Force re-authentication even if token exists
        #[arg(long)]
        force: bool,
    },

    /// Search, analyze and, after confirmation, trash the matching messages
    Run {
        /// Print the report only; never prompt and never trash
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "gmail-cleanup.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

/// Progress reporter using indicatif
pub struct ProgressReporter {
    multi: MultiProgress,
    spinner_style: ProgressStyle,
    bar_style: ProgressStyle,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::with_multi_progress(MultiProgress::new())
    }

    /// Share the MultiProgress the log writer prints through
    pub fn with_multi_progress(multi: MultiProgress) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed:>6}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        let bar_style = ProgressStyle::default_bar()
            .template("[{elapsed:>6}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");

        Self {
            multi,
            spinner_style,
            bar_style,
        }
    }

    pub fn multi_progress(&self) -> &MultiProgress {
        &self.multi
    }

    pub fn add_spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(self.spinner_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    pub fn add_progress_bar(&self, len: u64, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new(len));
        pb.set_style(self.bar_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Finish a spinner and clear it from the multi-progress display
    pub fn finish_spinner(&self, pb: &ProgressBar, msg: &str) {
        pb.finish_and_clear();
        self.say(format!("  ✓ {}", msg));
    }

    /// Print to stdout without tearing active bars
    pub fn say(&self, text: impl AsRef<str>) {
        self.multi.suspend(|| println!("{}", text.as_ref()));
    }

    /// Print a prompt and flush, leaving the cursor on the same line
    fn prompt(&self, text: &str) {
        self.multi.suspend(|| {
            print!("{}", text);
            let _ = std::io::stdout().flush();
        });
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    NoCandidates,
    DryRun,
    Cancelled,
    Trashed(TrashSummary),
}

/// Summary of one pipeline run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub candidates: usize,
    pub analyzed: usize,
    pub analysis_failures: usize,
    pub total_size: u64,
    pub outcome: RunOutcome,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    pub dry_run: bool,
}

/// Run the complete cleanup pipeline against Gmail
///
/// # Arguments
/// * `cli` - CLI arguments holding the file paths
/// * `dry_run` - If true, stop after the report
/// * `multi` - Progress display shared with the log writer
///
/// # Returns
/// * `Ok(RunSummary)` - What happened, including trash results
/// * `Err(GmailError)` - Configuration, authentication or search failure
pub async fn run_pipeline(cli: &Cli, dry_run: bool, multi: MultiProgress) -> Result<RunSummary> {
    let reporter = ProgressReporter::with_multi_progress(multi);

    // Step 1: Load configuration
    let config_spinner = reporter.add_spinner("Loading configuration...");
    let config = Config::load(&cli.config).await?;
    reporter.finish_spinner(&config_spinner, "Configuration loaded");

    // Step 2: Authenticate
    let auth_spinner = reporter.add_spinner("Authenticating with Gmail API...");
    let hub = match auth::authenticate(&cli.credentials, &cli.token_cache).await {
        Ok(hub) => hub,
        Err(e) => {
            auth_spinner.finish_and_clear();
            return Err(e);
        }
    };
    reporter.finish_spinner(&auth_spinner, "Gmail API authenticated successfully");

    let client = ProductionGmailClient::new(hub, config.analysis.max_concurrent_requests);

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let summary =
        execute_pipeline(&client, &config, PipelineOptions { dry_run }, &reporter, &mut input).await;

    let quota = client.quota_stats().await;
    info!(
        "Gmail API usage: {} calls, {} quota units",
        quota.total_operations, quota.total_consumed
    );
    summary
}

/// Search, analyze, report and, once confirmed, trash
///
/// `input` supplies the confirmation line. Every message trashed comes
/// from the single search made at the start of this call.
pub async fn execute_pipeline<C, R>(
    client: &C,
    config: &Config,
    options: PipelineOptions,
    reporter: &ProgressReporter,
    input: &mut R,
) -> Result<RunSummary>
where
    C: GmailClient + ?Sized,
    R: BufRead,
{
    let started_at = Utc::now();
    let run_id = uuid::Uuid::new_v4().to_string();
    info!("Starting cleanup run: {}", run_id);

    let mut summary = RunSummary {
        run_id,
        started_at,
        duration_seconds: 0,
        candidates: 0,
        analyzed: 0,
        analysis_failures: 0,
        total_size: 0,
        outcome: RunOutcome::NoCandidates,
    };

    // Step 3: Search
    let filter = SearchFilter::from_config(&config.search);
    reporter.say(format!("Searching for emails with query: {}", filter));

    let search_spinner = reporter.add_spinner("Searching mailbox...");
    let search = match search_candidates(client, &filter, config.search.max_results).await {
        Ok(search) => search,
        Err(e) => {
            search_spinner.finish_and_clear();
            return Err(e);
        }
    };
    let candidates = search.candidates;
    summary.candidates = candidates.len();

    if candidates.is_empty() {
        search_spinner.finish_and_clear();
        reporter.say("No matching emails found.");
        return Ok(finish(summary, RunOutcome::NoCandidates));
    }
    reporter.finish_spinner(&search_spinner, &format!("Found {} candidates", candidates.len()));
    if search.capped {
        reporter.say(format!(
            "Only the first {} matches are handled in this run.",
            config.search.max_results
        ));
    }

    // Step 4: Analyze
    let fetch_bar = reporter.add_progress_bar(candidates.len() as u64, "Analyzing candidates...");
    let fetch_bar_clone = fetch_bar.clone();
    let progress_callback: ProgressCallback = Arc::new(move || {
        fetch_bar_clone.inc(1);
    });

    let categories = CategoryTable::new(config.categories.clone());
    let analysis = BatchAnalyzer::from_config(client, &categories, &config.analysis)
        .with_progress(progress_callback)
        .analyze(&candidates)
        .await;
    fetch_bar.finish_and_clear();

    summary.analyzed = analysis.analyzed();
    summary.analysis_failures = analysis.failed_ids.len();
    summary.total_size = analysis.total_size;

    // Step 5: Report
    let report = Report::from_analysis(
        &analysis,
        config.analysis.sample_count,
        config.analysis.top_senders,
    );
    reporter.say(format!("\n{}", report.render()));

    if options.dry_run {
        reporter.say("Dry run: no messages were moved to Trash.");
        return Ok(finish(summary, RunOutcome::DryRun));
    }

    // Step 6: Confirmation gate
    reporter.say(format!(
        "\n{}",
        format!(
            "{} messages ({}) will be moved to Trash.",
            candidates.len(),
            format_size(analysis.total_size)
        )
        .yellow()
        .bold()
    ));
    reporter.prompt(&format!(
        "Type {} to move these emails to Trash, or anything else to cancel: ",
        CONFIRMATION_TOKEN
    ));

    if !read_confirmation(input)? {
        reporter.say("Action cancelled.");
        return Ok(finish(summary, RunOutcome::Cancelled));
    }

    // Step 7: Trash the full candidate set
    let trash_bar = reporter.add_progress_bar(candidates.len() as u64, "Moving emails to Trash...");
    let result = TrashExecutor::new(client)
        .trash_all(&candidates, |done, _total| trash_bar.set_position(done as u64))
        .await;
    trash_bar.finish_and_clear();

    for (id, error) in &result.failures {
        reporter.say(format!("Error trashing email {}: {}", id, error).red().to_string());
    }
    reporter.say(format!(
        "Successfully moved {} emails to Trash.",
        result.succeeded
    ));
    if result.failed() > 0 {
        reporter.say(format!("{} emails could not be moved.", result.failed()));
    }

    Ok(finish(summary, RunOutcome::Trashed(result)))
}

fn finish(mut summary: RunSummary, outcome: RunOutcome) -> RunSummary {
    summary.duration_seconds = (Utc::now() - summary.started_at).num_seconds();
    summary.outcome = outcome;
    info!("Run {} finished: {:?}", summary.run_id, summary.outcome);
    summary
}
