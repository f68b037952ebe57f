use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use pollharvest_core::dedup::{DedupConfig, DedupSession};
use pollharvest_core::models::{HarvestRequest, SourceDescriptor};
use pollharvest_core::normalize::{Normalizer, NormalizerConfig};
use pollharvest_core::progress::TracingObserver;
use pollharvest_core::registry::SourceRegistry;
use pollharvest_core::scheduler::{HarvestScheduler, SchedulerConfig};
use pollharvest_core::traits::NullSuggester;
use pollharvest_runner::ProcessRunner;

#[derive(Parser)]
#[command(name = "pollharvest", version, about = "Concurrent survey-question harvester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest questions from configured sources
    Run {
        /// Path to the source config file (JSON: {"sources": [...]})
        #[arg(short, long, env = "POLLHARVEST_SOURCES")]
        sources: PathBuf,

        /// Search query fanned out to every source
        #[arg(short, long)]
        query: String,

        /// Per-source result cap
        #[arg(long, default_value_t = 15)]
        cap: usize,

        /// Maximum concurrently running jobs
        #[arg(short = 'w', long, env = "POLLHARVEST_CONCURRENCY", default_value_t = 3)]
        concurrency: usize,

        /// Stagger interval between job submissions, in milliseconds
        #[arg(long, default_value_t = 500)]
        stagger_ms: u64,

        /// Fuzzy-dedup similarity threshold in [0,1]
        #[arg(long, default_value_t = 0.85)]
        similarity_threshold: f32,

        /// Number of harvest rounds against the same dedup session
        #[arg(long, default_value_t = 1)]
        rounds: u32,

        /// Harvest only these source ids (comma-separated)
        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,
    },

    /// List the sources in a config file
    Sources {
        /// Path to the source config file
        #[arg(short, long, env = "POLLHARVEST_SOURCES")]
        sources: PathBuf,
    },
}

#[derive(Debug, Deserialize)]
struct SourceFile {
    sources: Vec<SourceDescriptor>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pollharvest=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            sources,
            query,
            cap,
            concurrency,
            stagger_ms,
            similarity_threshold,
            rounds,
            select,
        } => {
            let registry = load_registry(&sources)?;
            cmd_run(
                &registry,
                &query,
                cap,
                concurrency,
                stagger_ms,
                similarity_threshold,
                rounds,
                &select,
            )
            .await?;
        }
        Commands::Sources { sources } => {
            let registry = load_registry(&sources)?;
            for source in registry.descriptors() {
                println!(
                    "{:<20} {:<30} timeout={}s {}",
                    source.id,
                    source.display_name,
                    source.timeout_secs,
                    source.worker.program,
                );
            }
        }
    }

    Ok(())
}

fn load_registry(path: &Path) -> Result<SourceRegistry> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read source config {}", path.display()))?;
    let file: SourceFile = serde_json::from_str(&raw)
        .with_context(|| format!("invalid source config {}", path.display()))?;

    let mut registry = SourceRegistry::new();
    for source in file.sources {
        registry.register(source)?;
    }
    Ok(registry)
}

#[allow(clippy::too_many_arguments)]
async fn cmd_run(
    registry: &SourceRegistry,
    query: &str,
    cap: usize,
    concurrency: usize,
    stagger_ms: u64,
    similarity_threshold: f32,
    rounds: u32,
    select: &[String],
) -> Result<()> {
    let sources: Vec<SourceDescriptor> = if select.is_empty() {
        registry.descriptors().to_vec()
    } else {
        registry.select(select)?
    };

    let request = HarvestRequest {
        query: query.to_string(),
        sources,
        per_source_cap: cap,
    };

    let scheduler = HarvestScheduler::new(
        ProcessRunner::new(),
        Normalizer::new(NormalizerConfig::default(), NullSuggester),
        SchedulerConfig {
            max_concurrency: concurrency,
            stagger_interval: Duration::from_millis(stagger_ms),
        },
    );

    let dedup_config = DedupConfig {
        similarity_threshold,
        ..DedupConfig::default()
    };
    let mut session = DedupSession::new(dedup_config, rounds);

    for _ in 0..rounds {
        let round = session.begin_round()?;
        tracing::info!(%round, "Starting harvest round");
        let report = scheduler
            .harvest(&request, &mut session, &TracingObserver)
            .await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
