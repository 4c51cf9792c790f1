//! Subseek - Concurrent Subtitle Search
//!
//! Command line entry point: resolves configuration, sets up logging and
//! dispatches to the fetch/search/hash/providers commands.

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use subseek::cli::{Args, Commands};
use subseek::config::Config;
use subseek::hash::{movie_hash_file, subdb_hash_file};
use subseek::select::best_index;
use subseek::workflow::{FileOutcome, Workflow};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    // Load configuration
    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if std::path::Path::new("subseek.toml").exists() {
                info!("Found subseek.toml in current directory, loading...");
                Config::from_file("subseek.toml")?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Fetch { paths, language, json } => {
            let language = language.unwrap_or_else(|| config.search.language.clone());
            let workflow = Workflow::new(config)?;

            let files = Workflow::collect_video_files(&paths);
            if files.is_empty() {
                warn!("No video files found in the given paths");
                return Ok(());
            }

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling outstanding searches");
                    on_interrupt.cancel();
                }
            });

            let reports = workflow.get_all_with_cancel(&files, &language, &cancel).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for report in &reports {
                    match &report.outcome {
                        FileOutcome::Downloaded { subtitle, provider } => {
                            println!("[ok]      {} -> {} ({})", report.path.display(), subtitle.display(), provider)
                        }
                        FileOutcome::NotFound => {
                            println!("[missing] {}", report.path.display())
                        }
                        FileOutcome::Failed { error } => {
                            println!("[failed]  {}: {}", report.path.display(), error)
                        }
                    }
                }
            }

            let downloaded = reports
                .iter()
                .filter(|r| matches!(r.outcome, FileOutcome::Downloaded { .. }))
                .count();
            info!("Downloaded {} of {} subtitles", downloaded, reports.len());
        }
        Commands::Search { file, language } => {
            let language = language.unwrap_or_else(|| config.search.language.clone());
            let workflow = Workflow::new(config)?;

            let candidates = workflow.search_all(&file, &language).await;
            if candidates.is_empty() {
                println!("No subtitles found.");
                return Ok(());
            }

            let best = best_index(&candidates);
            println!("{:<3} {:<20} {:<8} {:<10} {:<50}", "", "Provider", "Format", "Downloads", "Name");
            println!("{}", "-".repeat(95));
            for (index, candidate) in candidates.iter().enumerate() {
                let marker = if Some(index) == best { "*" } else { "" };
                let downloads = candidate
                    .download_count()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "?".to_string());
                println!(
                    "{:<3} {:<20} {:<8} {:<10} {:<50}",
                    marker,
                    candidate.provider_name(),
                    candidate.subtitle.format,
                    downloads,
                    candidate.subtitle.file_name
                );
            }
        }
        Commands::Hash { file } => {
            let movie = movie_hash_file(&file)?;
            let subdb = subdb_hash_file(&file)?;
            println!("File:       {}", file.display());
            println!("Size:       {} bytes", movie.size);
            println!("Movie hash: {}", movie.digest);
            println!("SubDB hash: {}", subdb);
        }
        Commands::Providers => {
            let workflow = Workflow::new(config)?;
            println!("Configured providers (query order):");
            for (index, provider) in workflow.registry().providers().iter().enumerate() {
                println!("  {}. {}", index + 1, provider.name());
            }
        }
    }

    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = std::env::current_dir()?.join(".subseek").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "subseek.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Console output goes to stderr so stdout stays clean for reports
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    subscriber.try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("subseek.log").display());

    Ok(())
}
