use anyhow::Result;
use clap::Parser;
use gmail_cleanup::auth;
use gmail_cleanup::cli::{self, Cli, Commands, RunOutcome};
use gmail_cleanup::client::ProductionGmailClient;
use gmail_cleanup::config::Config;
use gmail_cleanup::error::GmailError;
use gmail_cleanup::report::format_size;
use indicatif::MultiProgress;
use std::io::Write;
use std::process;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// A writer that prints through MultiProgress to avoid progress bar conflicts
#[derive(Clone)]
struct MultiProgressWriter {
    multi: Arc<MultiProgress>,
    buffer: Arc<std::sync::Mutex<Vec<u8>>>,
}

impl MultiProgressWriter {
    fn new(multi: Arc<MultiProgress>) -> Self {
        Self {
            multi,
            buffer: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }
}

impl Write for MultiProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut buffer = self.buffer.lock().unwrap_or_else(|p| p.into_inner());
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut buffer = self.buffer.lock().unwrap_or_else(|p| p.into_inner());
        if !buffer.is_empty() {
            let msg = String::from_utf8_lossy(&buffer);
            let msg = msg.trim_end_matches('\n');
            if !msg.is_empty() {
                // Logs belong on stderr whether or not bars are drawn
                self.multi.suspend(|| eprintln!("{}", msg));
            }
            buffer.clear();
        }
        Ok(())
    }
}

impl Drop for MultiProgressWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// MakeWriter implementation for tracing
#[derive(Clone)]
struct MultiProgressMakeWriter {
    multi: Arc<MultiProgress>,
}

impl MultiProgressMakeWriter {
    fn new(multi: Arc<MultiProgress>) -> Self {
        Self { multi }
    }
}

impl<'a> MakeWriter<'a> for MultiProgressMakeWriter {
    type Writer = MultiProgressWriter;

    fn make_writer(&'a self) -> Self::Writer {
        MultiProgressWriter::new(Arc::clone(&self.multi))
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        display_error(&e);
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // On non-Windows platforms, use aws-lc-rs; on Windows, use ring
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_cleanup=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_cleanup=info,warn"))
    };

    // Logs print above progress bars through the shared MultiProgress
    let multi_progress = Arc::new(MultiProgress::new());
    let make_writer = MultiProgressMakeWriter::new(Arc::clone(&multi_progress));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(make_writer)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    match cli.command {
        Commands::Auth { force } => {
            tracing::info!("Authenticating with Gmail API...");

            if force && auth::forget_credential(&cli.token_cache).await? {
                tracing::info!("Removed existing token cache");
            }

            let hub = match auth::authenticate(&cli.credentials, &cli.token_cache).await {
                Ok(hub) => hub,
                Err(e) if e.is_auth_failure() => {
                    report_auth_failure(&e);
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };

            println!("Successfully authenticated with Gmail API");
            println!("Token cached at: {:?}", cli.token_cache);

            let client = ProductionGmailClient::new(hub, 1);
            println!("Connected to account: {}", client.account_email().await?);

            Ok(())
        }

        Commands::Run { dry_run } => {
            tracing::info!("Starting cleanup run");
            if dry_run {
                println!("Running in DRY RUN mode - no changes will be made");
            }

            let summary =
                match cli::run_pipeline(&cli, dry_run, (*multi_progress).clone()).await {
                    Ok(summary) => summary,
                    Err(e) if e.is_auth_failure() => {
                        report_auth_failure(&e);
                        return Ok(());
                    }
                    Err(e) => return Err(e.into()),
                };

            if summary.outcome == RunOutcome::NoCandidates {
                return Ok(());
            }

            println!("\n========================================");
            println!("Cleanup Run Summary");
            println!("========================================");
            println!("Run ID: {}", summary.run_id);
            println!("Duration: {} seconds", summary.duration_seconds);
            println!("Candidates found: {}", summary.candidates);
            println!(
                "Messages analyzed: {} ({} failed)",
                summary.analyzed, summary.analysis_failures
            );
            println!("Reclaimable size: {}", format_size(summary.total_size));
            match &summary.outcome {
                RunOutcome::Trashed(result) => {
                    println!("Moved to Trash: {}/{}", result.succeeded, result.attempted);
                }
                RunOutcome::Cancelled => println!("Moved to Trash: 0 (cancelled)"),
                RunOutcome::DryRun => println!("Moved to Trash: 0 (dry run)"),
                RunOutcome::NoCandidates => {}
            }
            println!("========================================");

            Ok(())
        }

        Commands::InitConfig { output, force } => {
            tracing::info!("Generating example configuration file");

            if output.exists() && !force {
                return Err(GmailError::ConfigError(format!(
                    "Configuration file already exists at {:?}. Use --force to overwrite.",
                    output
                ))
                .into());
            }

            Config::create_example(&output).await?;

            println!("Created example configuration file at: {:?}", output);
            println!("\nPlease edit this file to customize your settings.");
            println!("Key settings to review:");
            println!("  - search.protected_labels: Labels whose messages are never touched");
            println!("  - search.base_query: Which messages count as clutter");
            println!("  - analysis.max_concurrent_requests: Parallel metadata fetches");

            Ok(())
        }
    }
}

/// Authentication problems end the run quietly with a pointer to the fix
fn report_auth_failure(error: &GmailError) {
    eprintln!("Error: {}", error);
    if let GmailError::MissingClientConfig(path) = error {
        eprintln!(
            "Please provide OAuth 2.0 credentials from Google Cloud Console at {}.",
            path.display()
        );
    } else {
        eprintln!("Try running: gmail-cleanup auth --force");
    }
}

/// Display error with context
fn display_error(error: &anyhow::Error) {
    eprintln!("Error: {}", error);

    let mut cause = error.source();
    while let Some(e) = cause {
        eprintln!("  Caused by: {}", e);
        cause = e.source();
    }

    if let Some(gmail_err) = error.downcast_ref::<GmailError>() {
        match gmail_err {
            GmailError::ApiError(_) | GmailError::ServerError { .. } | GmailError::NetworkError(_) => {
                eprintln!("\nHint: This may be a temporary API error.");
                eprintln!("      Try running the command again.");
            }
            GmailError::RateLimitExceeded { .. } | GmailError::Forbidden(_) => {
                eprintln!("\nHint: You may have hit Gmail API rate limits.");
                eprintln!("      Wait a few seconds and try again.");
                eprintln!("      Consider reducing analysis.max_concurrent_requests in config.");
            }
            GmailError::BadRequest(_) => {
                eprintln!("\nHint: Gmail rejected the search query.");
                eprintln!("      Check search.base_query and search.protected_labels.");
            }
            GmailError::ConfigError(_) => {
                eprintln!("\nHint: Check your configuration file for errors.");
                eprintln!("      Run: gmail-cleanup init-config --force");
            }
            _ => {}
        }
    }

    eprintln!("\nFor help, run: gmail-cleanup --help");
}
