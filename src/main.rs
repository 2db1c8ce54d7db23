//! SiteGraph main entry point
//!
//! This is the command-line interface for the SiteGraph internal-link cartographer.

use clap::Parser;
use sitegraph::analysis::analyze_session;
use sitegraph::config::{load_config_with_hash, Config};
use sitegraph::crawler::{Coordinator, StopFlag};
use sitegraph::normalize_url;
use sitegraph::output::{load_statistics, print_statistics};
use sitegraph::storage::{lock_storage, open_storage, SessionRecord, SqliteStorage, Storage};
use sitegraph::SessionStatus;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// SiteGraph: an internal-link cartographer
///
/// SiteGraph crawls a single website in resumable batches, builds its
/// internal link graph, scores page equity and health, and suggests new
/// internal links between related pages.
#[derive(Parser, Debug)]
#[command(name = "sitegraph")]
#[command(version)]
#[command(about = "An internal-link cartographer", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start a fresh session instead of resuming the latest unfinished one
    #[arg(long)]
    fresh: bool,

    /// Run at most N batches, then exit leaving the session resumable
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    batches: Option<u32>,

    /// Ask a running crawl of this start URL to stop after its current batch
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "analyze", "fresh", "batches"])]
    stop: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "analyze"])]
    dry_run: bool,

    /// Show statistics of the latest session and exit
    #[arg(long, conflicts_with_all = ["dry_run", "analyze"])]
    stats: bool,

    /// Re-run equity and relevance analysis over the latest session and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    analyze: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.analyze {
        handle_analyze(&config)?;
    } else if cli.stop {
        handle_stop(&config)?;
    } else {
        handle_crawl(config, &config_hash, cli.fresh, cli.batches).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitegraph=info,warn"),
            1 => EnvFilter::new("sitegraph=debug,info"),
            2 => EnvFilter::new("sitegraph=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Opens the configured database
fn open_database(config: &Config) -> Result<SqliteStorage, Box<dyn std::error::Error>> {
    Ok(open_storage(Path::new(&config.output.database_path))?)
}

/// Finds the latest session for the configured start URL
fn latest_session(
    storage: &SqliteStorage,
    config: &Config,
) -> Result<SessionRecord, Box<dyn std::error::Error>> {
    let start_url = normalize_url(&config.crawl.start_url)?;
    storage
        .latest_session(start_url.as_str())?
        .ok_or_else(|| format!("No session found for {}", start_url).into())
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== SiteGraph Dry Run ===\n");

    println!("Crawl Configuration:");
    println!("  Start URL: {}", normalize_url(&config.crawl.start_url)?);
    println!("  Max pages: {}", config.crawl.max_pages);
    println!("  Max depth: {}", config.crawl.max_depth);
    println!("  Batch size: {}", config.crawl.batch_size);
    println!("  Concurrency: {}", config.crawl.concurrency);
    println!("  Request timeout: {}s", config.crawl.request_timeout_secs);
    println!("  Lease timeout: {}s", config.crawl.lease_timeout_secs);
    println!("  Respect robots.txt: {}", config.crawl.respect_robots);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nAnalysis:");
    println!(
        "  Similarity threshold: {}",
        config.analysis.similarity_threshold
    );
    println!(
        "  Paragraph threshold: {}",
        config.analysis.paragraph_threshold
    );
    println!(
        "  Min paragraph length: {} chars",
        config.analysis.min_paragraph_chars
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nExtra Seeds ({}):", config.crawl.seeds.len());
    for seed in &config.crawl.seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_database(config)?;
    let session = latest_session(&storage, config)?;
    let stats = load_statistics(&storage, session.id)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --analyze mode: recomputes scores and opportunities
fn handle_analyze(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut storage = open_database(config)?;
    let session = latest_session(&storage, config)?;

    tracing::info!("Analyzing session {} ({})", session.id, session.status);
    let report = analyze_session(&mut storage, session.id, &config.analysis)?;

    println!("Session {}:", session.id);
    println!("  Pages scored: {}", report.pages_scored);
    println!("  Orphan pages: {}", report.orphans.len());
    for orphan in report.orphans.iter().take(20) {
        println!("    - {} ({})", orphan.url, orphan.kind);
    }
    println!("  Link opportunities: {}", report.opportunities);

    Ok(())
}

/// Handles the --stop mode: flags the unfinished session for stopping
fn handle_stop(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut storage = open_database(config)?;
    let start_url = normalize_url(&config.crawl.start_url)?;

    match storage.find_resumable_session(start_url.as_str())? {
        Some(session) => {
            storage.request_stop(session.id)?;
            println!("Stop requested for session {}", session.id);
        }
        None => println!("No unfinished session for {}", start_url),
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: &str,
    fresh: bool,
    batches: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    if fresh {
        tracing::info!("Starting fresh session (ignoring previous state)");
    } else {
        tracing::info!("Starting crawl (will resume an unfinished session)");
    }

    let storage = open_database(&config)?;

    let interrupt = StopFlag::new();
    {
        let interrupt = interrupt.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping after the current batch");
                interrupt.trigger();
            }
        });
    }

    let mut coordinator = Coordinator::new(config, storage, config_hash, fresh)?
        .with_stop_signal(Arc::new(interrupt));

    let progress = match batches {
        Some(n) => coordinator.run_batches(n as usize).await?,
        None => coordinator.run().await?,
    };

    println!(
        "Session {}: {} ({} / {} pages, {} pending)",
        progress.session_id,
        progress.status,
        progress.pages_crawled,
        progress.max_pages,
        progress.queue.pending
    );

    if progress.status == SessionStatus::Failed {
        let storage = coordinator.storage();
        let reason = lock_storage(&storage)?
            .get_session(progress.session_id)?
            .error_message
            .unwrap_or_default();
        tracing::error!("Crawl failed: {}", reason);
        return Err(format!("session {} failed: {}", progress.session_id, reason).into());
    }

    Ok(())
}
