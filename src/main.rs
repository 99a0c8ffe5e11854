//! Orb-Weaver main entry point
//!
//! Command-line interface for running a single crawl operation against a
//! URL, sitemap, or link-collection file.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use orb_weaver::config::{load_config_with_hash, Config};
use orb_weaver::crawler::{classify_by_url, Coordinator};
use orb_weaver::output::{print_summary, summarize};
use orb_weaver::state::{CrawlTarget, OperationState, TargetKind};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Orb-Weaver: a concurrent crawl-orchestration engine
///
/// Classifies the target (single page, sitemap, link collection, or
/// recursive site walk), fetches with bounded parallelism, deduplicates
/// discovered URLs across levels, and reports progress until completion.
#[derive(Parser, Debug)]
#[command(name = "orb-weaver")]
#[command(version = "1.0.0")]
#[command(about = "A concurrent crawl-orchestration engine", long_about = None)]
struct Cli {
    /// URL to crawl
    #[arg(value_name = "URL")]
    url: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Maximum crawl depth for recursive traversal
    #[arg(long, value_name = "N")]
    depth: Option<u32>,

    /// Maximum URLs fetched per depth level
    #[arg(long, value_name = "N")]
    max_urls_per_level: Option<usize>,

    /// URL substring pattern to exclude (repeatable)
    #[arg(long = "exclude", value_name = "PATTERN")]
    exclude_patterns: Vec<String>,

    /// Force a traversal kind instead of auto-classifying
    #[arg(long, value_enum)]
    kind: Option<KindArg>,

    /// Validate configuration and show the classification without crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    SinglePage,
    Sitemap,
    LinkCollection,
    RecursiveSite,
}

impl From<KindArg> for TargetKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::SinglePage => TargetKind::SinglePage,
            KindArg::Sitemap => TargetKind::Sitemap,
            KindArg::LinkCollection => TargetKind::LinkCollection,
            KindArg::RecursiveSite => TargetKind::RecursiveSite,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    // Load configuration, falling back to built-in defaults
    let config = match &cli.config {
        Some(path) => {
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("loading config from {}", path.display()))?;
            tracing::info!(config = %path.display(), hash, "configuration loaded");
            config
        }
        None => Config::default(),
    };

    let target = build_target(&cli, &config);

    if cli.dry_run {
        handle_dry_run(&config, &target)?;
        return Ok(());
    }

    handle_crawl(config, target).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("orb_weaver=info,warn"),
            1 => EnvFilter::new("orb_weaver=debug,info"),
            2 => EnvFilter::new("orb_weaver=trace,debug"),
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

fn build_target(cli: &Cli, config: &Config) -> CrawlTarget {
    let mut target = CrawlTarget::new(cli.url.clone())
        .with_max_depth(cli.depth.unwrap_or(config.crawler.max_depth))
        .with_max_urls_per_level(
            cli.max_urls_per_level
                .unwrap_or(config.crawler.max_urls_per_level),
        )
        .with_exclude_patterns(cli.exclude_patterns.clone());

    if let Some(kind) = cli.kind {
        target = target.with_kind(kind.into());
    }

    target
}

/// Handles --dry-run: validates the setup and shows what would happen
fn handle_dry_run(config: &Config, target: &CrawlTarget) -> anyhow::Result<()> {
    println!("=== Orb-Weaver Dry Run ===\n");

    println!("Target:");
    println!("  URL: {}", target.raw_url);
    println!("  Max depth: {}", target.max_depth);
    println!("  Max URLs per level: {}", target.max_urls_per_level);
    if !target.exclude_patterns.is_empty() {
        println!("  Exclude patterns: {:?}", target.exclude_patterns);
    }

    println!("\nBudget:");
    println!("  Max operations: {}", config.budget.max_operations);
    println!(
        "  Max pages per operation: {}",
        config.budget.max_pages_per_operation
    );
    println!("  Max CPU workers: {} (0 = core count)", config.budget.max_cpu_workers);
    println!(
        "  Memory threshold: {}%",
        config.budget.memory_threshold_percent
    );

    let seed = Url::parse(&target.raw_url).context("target URL does not parse")?;
    match target.kind {
        Some(kind) => println!("\nClassification: {} (forced)", kind),
        None => match classify_by_url(&seed, target.max_depth) {
            Some(kind) => println!("\nClassification: {}", kind),
            None => println!("\nClassification: requires a content fetch (link density)"),
        },
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Runs one crawl operation to completion, streaming records to the log
async fn handle_crawl(config: Config, target: CrawlTarget) -> anyhow::Result<()> {
    let coordinator = Coordinator::new(config).context("building coordinator")?;
    let (id, mut records) = coordinator.start(target);

    let mut cancel_requested = false;
    loop {
        tokio::select! {
            record = records.recv() => {
                match record {
                    Some(record) => {
                        if record.page.success {
                            tracing::info!(
                                level = record.level,
                                url = %record.page.url,
                                title = %record.page.title,
                                "fetched"
                            );
                        } else {
                            tracing::warn!(
                                level = record.level,
                                url = %record.page.url,
                                error = record.page.error.as_deref().unwrap_or("unknown"),
                                "failed"
                            );
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c(), if !cancel_requested => {
                tracing::info!("interrupt received, cancelling operation");
                coordinator.cancel(id)?;
                cancel_requested = true;
            }
        }
    }

    let operation = coordinator.wait(id).await?;
    let summary = summarize(&operation);
    print_summary(&summary);

    match operation.state {
        OperationState::Failed => anyhow::bail!(
            "crawl failed: {}",
            operation.error.unwrap_or_else(|| "unknown error".to_string())
        ),
        _ => Ok(()),
    }
}
