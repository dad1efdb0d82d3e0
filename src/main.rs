//! serp-harvest main entry point
//!
//! This is the command-line interface for the serp-harvest result harvester.

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use serp_harvest::config::{parse_config, validate, Config};
use serp_harvest::output::{print_summary, FileSink, SharedSink};
use serp_harvest::Harvester;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// serp-harvest: collect search result URLs into a file
///
/// Pages through the search API for each query, drops results on the
/// denylist, and appends the rest to the output file one URL per line.
#[derive(Parser, Debug)]
#[command(name = "serp-harvest")]
#[command(version)]
#[command(about = "Collect search result URLs into a file", long_about = None)]
struct Cli {
    /// Search query
    #[arg(short = 'q', long, conflicts_with = "wordlist")]
    query: Option<String>,

    /// File with one search query per line
    #[arg(short, long, value_name = "FILE")]
    wordlist: Option<PathBuf>,

    /// Output file (appended to, never truncated)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// API key, overrides the configuration file
    #[arg(long, env = "SERP_HARVEST_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Search engine identifier, overrides the configuration file
    #[arg(long, env = "SERP_HARVEST_CX")]
    cx: Option<String>,

    /// Maximum URLs written per query
    #[arg(long)]
    cap: Option<u32>,

    /// Number of queries fetched at once from a wordlist
    #[arg(short = 'j', long, default_value_t = 1)]
    concurrency: usize,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate configuration and print what would run without sending requests
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    if cli.query.is_none() && cli.wordlist.is_none() && !cli.dry_run {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "one of --query or --wordlist is required",
            )
            .exit();
    }

    let config = build_config(&cli)?;

    if cli.dry_run {
        handle_dry_run(&cli, &config);
        return Ok(ExitCode::SUCCESS);
    }

    let output_path = PathBuf::from(&config.output.path);
    let sink = FileSink::open(&output_path)
        .with_context(|| format!("Failed to open output file {}", output_path.display()))?;
    let harvester = Harvester::from_config(&config)?.with_concurrency(cli.concurrency);

    let succeeded = if let Some(wordlist) = &cli.wordlist {
        handle_wordlist(&harvester, wordlist, sink, cli.quiet).await?
    } else if let Some(query) = &cli.query {
        handle_query(&harvester, query, sink).await
    } else {
        true
    };

    if let Some(message) = completion_message(&output_path, succeeded, cli.quiet) {
        println!("{}", message);
    }

    if succeeded {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("serp_harvest=info,warn"),
            1 => EnvFilter::new("serp_harvest=debug,info"),
            2 => EnvFilter::new("serp_harvest=trace,debug"),
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

/// Loads the configuration file (if any), applies CLI overrides, and validates
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            parse_config(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?
        }
        None => Config::with_credentials("", ""),
    };

    if let Some(key) = &cli.api_key {
        config.api.key = key.clone();
    }
    if let Some(cx) = &cli.cx {
        config.api.cx = cx.clone();
    }
    if let Some(cap) = cli.cap {
        config.limits.result_cap = cap;
    }
    if let Some(output) = &cli.output {
        config.output.path = output.display().to_string();
    }

    validate(&config).context("Invalid configuration")?;
    Ok(config)
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(cli: &Cli, config: &Config) {
    println!("=== serp-harvest Dry Run ===\n");

    println!("API:");
    println!("  Endpoint: {}", config.api.endpoint);
    println!("  Key: {}", redact(&config.api.key));
    println!("  CX: {}", config.api.cx);
    println!("  Page size: {}", config.api.page_size);

    println!("\nLimits:");
    println!("  Strategy: {:?}", config.limits.strategy);
    println!("  Requests per minute: {}", config.limits.requests_per_minute);
    println!("  Result cap per query: {}", config.limits.result_cap);
    println!("  Concurrency: {}", cli.concurrency.max(1));

    println!("\nRetry:");
    println!("  Malformed retries: {}", config.retry.max_malformed_retries);
    println!(
        "  Backoff: {:?} doubling to {:?} (+ up to {:?} jitter)",
        config.retry.backoff_floor(),
        config.retry.backoff_ceiling(),
        config.retry.max_jitter()
    );

    println!("\nOutput: {}", config.output.path);
    println!("\nDenylist ({}):", config.denylist.len());
    for entry in &config.denylist {
        println!("  - {}", entry.domain);
    }

    if let Some(query) = &cli.query {
        println!("\nWould run query: {}", query);
    } else if let Some(wordlist) = &cli.wordlist {
        println!("\nWould run queries from: {}", wordlist.display());
    }

    println!("\n✓ Configuration is valid");
}

/// Handles a single query; any error fails the process
async fn handle_query(harvester: &Harvester, query: &str, mut sink: FileSink) -> bool {
    match harvester.run_query(query, &mut sink).await {
        Ok(report) => {
            tracing::info!(
                "Query '{}' finished ({}): {} URLs written",
                report.query,
                report.outcome,
                report.accepted
            );
            true
        }
        Err(e) => {
            tracing::error!("Error processing query '{}': {}", query, e);
            false
        }
    }
}

/// Handles a wordlist; per-query errors are logged, only a run-stopping error fails
async fn handle_wordlist(
    harvester: &Harvester,
    wordlist: &Path,
    sink: FileSink,
    quiet: bool,
) -> anyhow::Result<bool> {
    let queries = read_wordlist(wordlist)
        .with_context(|| format!("Error opening wordlist file {}", wordlist.display()))?;

    let summary = harvester
        .run_queries(queries, SharedSink::new(sink))
        .await;

    if !quiet {
        print_summary(&summary);
    }

    Ok(!summary.is_failure())
}

/// Reads one query per line
///
/// Invalid UTF-8 is replaced rather than rejected, so one bad line costs
/// only its own query.
fn read_wordlist(path: &Path) -> std::io::Result<Vec<String>> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .map(str::to_string)
        .collect())
}

/// Final line printed after a successful run
fn completion_message(output: &Path, succeeded: bool, quiet: bool) -> Option<String> {
    if quiet || !succeeded {
        return None;
    }
    Some(format!("Search results saved to {}", output.display()))
}

/// Masks a secret, keeping only its length
fn redact(secret: &str) -> String {
    if secret.is_empty() {
        return "(unset)".to_string();
    }
    format!("<redacted, {} chars>", secret.chars().count())
}
