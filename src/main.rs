use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use futures::future::join_all;
use release_resolver::config::{self, ResolverConfig};
use release_resolver::resolver::{Orchestrator, PackageDescriptor, Platform, ResolveOptions};
use release_resolver::version::cache::{DiscoveryCache, SystemClock};
use release_resolver::version::sources::{
    GitHubClient, RetryPolicy, TokioSleeper, credential_from_env,
};
use release_resolver::version::types::RepoId;
use tracing::{Level, error};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

#[derive(Parser)]
#[command(name = "release-resolver")]
#[command(
    version,
    about = "Discover GitHub release versions and resolve platform-specific downloads"
)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Also append logs to the log file in the data directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List versions of a package, newest first
    Discover {
        /// Package descriptor file (JSON) or owner/repo
        package: String,

        /// Maximum number of versions, 0 for all
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
    },
    /// Resolve the download for a version on one or more platforms
    Resolve {
        /// Package descriptor file (JSON) or owner/repo
        package: String,

        /// Version, tag, or "latest"
        #[arg(default_value = "latest")]
        version: String,

        /// Target platform as os-arch; repeatable, defaults to the current platform
        #[arg(short, long)]
        platform: Vec<String>,

        /// Fail instead of resolving without a checksum when rate limited
        #[arg(long)]
        strict_checksum: bool,

        /// Give up on each platform after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Show the API rate limit for the configured credential
    RateLimit,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(&cli)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli))
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn setup_logging(cli: &Cli) -> anyhow::Result<Option<WorkerGuard>> {
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("release_resolver={level}")));

    let (layers, guard) = log_layers(cli)?;
    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()?;

    Ok(guard)
}

/// Stderr layer (plain or JSON) plus the optional file sink.
fn log_layers(cli: &Cli) -> anyhow::Result<(Vec<BoxedLayer>, Option<WorkerGuard>)> {
    let stderr = fmt::layer().with_writer(std::io::stderr).with_target(false);
    let mut layers: Vec<BoxedLayer> = vec![if cli.json_logs {
        stderr.json().boxed()
    } else {
        stderr.boxed()
    }];

    if !cli.log_file {
        return Ok((layers, None));
    }

    let path = config::log_path();
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(config::data_dir);
    let file_name = path.file_name().context("log path has no file name")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, file_name));
    layers.push(fmt::layer().with_writer(writer).with_ansi(false).boxed());

    Ok((layers, Some(guard)))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => ResolverConfig::load(path)?,
        None => ResolverConfig::default(),
    };

    let credential = credential_from_env(&config.github.token_env_vars);
    let client = Arc::new(
        GitHubClient::new(&config.github, credential)?
            .with_retry(RetryPolicy::from(&config.retry), Arc::new(TokioSleeper)),
    );

    match cli.command {
        Command::Discover { package, limit } => {
            let package = load_package(&package)?;
            let orchestrator = orchestrator(&config, client);
            let versions = orchestrator.discover(&package, limit).await?;
            println!("{}", serde_json::to_string_pretty(&versions)?);
        }
        Command::Resolve {
            package,
            version,
            platform,
            strict_checksum,
            timeout,
        } => {
            let package = load_package(&package)?;
            let platforms = if platform.is_empty() {
                vec![Platform::current()]
            } else {
                platform
                    .iter()
                    .map(|p| p.parse::<Platform>())
                    .collect::<Result<Vec<_>, _>>()?
            };
            let options = ResolveOptions {
                strict_checksum: strict_checksum || config.strict_checksum,
                deadline: timeout.map(Duration::from_secs),
            };

            let orchestrator = orchestrator(&config, client);
            let results = join_all(
                platforms
                    .iter()
                    .map(|p| orchestrator.resolve(&package, &version, p, &options)),
            )
            .await;

            let mut resolutions = Vec::new();
            let mut failures = 0;
            for (platform, result) in platforms.iter().zip(results) {
                match result {
                    Ok(resolution) => resolutions.push(resolution),
                    Err(e) => {
                        error!("{} on {}: {}", package.name, platform, e);
                        failures += 1;
                    }
                }
            }

            println!("{}", serde_json::to_string_pretty(&resolutions)?);
            if failures > 0 {
                bail!("{failures} of {} platform(s) failed to resolve", platforms.len());
            }
        }
        Command::RateLimit => {
            let status = client.rate_limit_status().await?;
            let source = client
                .credential()
                .map(|c| c.source.as_str())
                .unwrap_or("anonymous");
            println!(
                "{}/{} remaining ({}){}",
                status.remaining,
                status.total,
                source,
                status
                    .reset_at
                    .map(|reset| format!(", resets in {}s", (reset - Utc::now()).num_seconds().max(0)))
                    .unwrap_or_default()
            );
        }
    }

    Ok(())
}

fn orchestrator(config: &ResolverConfig, client: Arc<GitHubClient>) -> Orchestrator {
    let cache = Arc::new(DiscoveryCache::new(
        Duration::from_secs(config.cache.ttl_secs),
        Arc::new(SystemClock),
    ));
    Orchestrator::github(client, cache)
}

/// Read a descriptor file, or treat the argument as `owner/repo`.
fn load_package(value: &str) -> anyhow::Result<PackageDescriptor> {
    let path = Path::new(value);
    if path.is_file() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        return serde_json::from_str(&content)
            .with_context(|| format!("invalid package descriptor {}", path.display()));
    }

    let repo: RepoId = value.parse()?;
    Ok(PackageDescriptor::new(repo.name.clone(), repo.to_string()))
}
