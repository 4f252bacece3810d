//! Jobrank command-line entrypoint.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use jobrank::cache::EmbeddingCache;
use jobrank::config::Config;
use jobrank::embedding::{MiniLmConfig, MiniLmEncoder, TextEncoder};
use jobrank::model::UserId;
use jobrank::pipeline::{
    BatchRunner, CancellationFlag, MatchPipeline, PipelineConfig, UserOutcome,
};
use jobrank::provider::{Catalog, JobProvider};
use jobrank::storage::{FileMatchStore, MatchQuery, MatchRepository};
use jobrank::vectordb::{IndexConfig, IndexEntry, SimilarityIndex, VectorIndex};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "jobrank", version, about = "Rank job postings against candidate profiles")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Recompute and store matches for one user
    Run {
        #[arg(long)]
        user: UserId,
    },
    /// Recompute matches for every user in the catalog
    RunAll {
        /// Concurrent runs (defaults to JOBRANK_WORKERS)
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Print a user's stored matches as JSON
    Matches {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        min_score: Option<f32>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Re-encode every active job and rebuild the vector index from scratch
    Reindex,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    config.validate()?;
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating {}", config.data_dir.display()))?;

    match cli.command {
        Command::Matches {
            user,
            min_score,
            limit,
            offset,
        } => {
            let store = FileMatchStore::new(config.matches_dir());
            let query = MatchQuery {
                min_score,
                limit,
                offset,
            };
            let records = store.get_matches(user, query).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::Reindex => {
            let encoder = load_encoder(&config)?;
            let catalog = Catalog::load_dir(&config.catalog_dir())?;
            reindex(&config, encoder, &catalog).await?;
        }
        Command::Run { user } => {
            let pipeline = build_pipeline(&config)?;
            let outcome = pipeline.run_user(user).await?;
            println!("{}", serde_json::to_string_pretty(&outcome.records)?);
        }
        Command::RunAll { workers } => {
            let pipeline = Arc::new(build_pipeline(&config)?);
            let cancel = CancellationFlag::new();
            let runner = BatchRunner::new(pipeline, workers.unwrap_or(config.workers))
                .with_cancellation(cancel.clone());

            tokio::spawn(async move {
                if signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, finishing in-flight users");
                    cancel.cancel();
                }
            });

            let report = runner.run_all().await?;
            for (user_id, outcome) in &report.outcomes {
                match outcome {
                    UserOutcome::Completed { matches } => {
                        println!("{user_id}\tok\t{matches}");
                    }
                    UserOutcome::Failed(error) => println!("{user_id}\tfailed\t{error}"),
                    UserOutcome::Skipped => println!("{user_id}\tskipped"),
                }
            }
            if report.failed() > 0 {
                anyhow::bail!("{} of {} users failed", report.failed(), report.outcomes.len());
            }
        }
    }

    Ok(())
}

fn load_encoder(config: &Config) -> anyhow::Result<Arc<dyn TextEncoder>> {
    let mut encoder_config = if let Some(path) = &config.model_path {
        MiniLmConfig::new(path.clone())
    } else {
        tracing::warn!("No JOBRANK_MODEL_PATH configured, running encoder in stub mode");
        MiniLmConfig::stub()
    };
    encoder_config.prefer_gpu = config.use_gpu;
    Ok(Arc::new(MiniLmEncoder::load(encoder_config)?))
}

/// Opens the persisted index. A corrupted or stale artifact is reported and the
/// pipeline runs without it until `reindex` is run.
fn open_index(path: &Path, encoder: &dyn TextEncoder) -> Option<Arc<dyn SimilarityIndex>> {
    match VectorIndex::open(
        path,
        IndexConfig::with_dim(encoder.dimension()),
        encoder.model_version(),
    ) {
        Ok(index) => Some(Arc::new(index)),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Vector index unavailable, scoring all active jobs (run `jobrank reindex`)"
            );
            None
        }
    }
}

fn build_pipeline(config: &Config) -> anyhow::Result<MatchPipeline> {
    let matching = config.load_matching_config()?;
    let encoder = load_encoder(config)?;
    let catalog = Arc::new(Catalog::load_dir(&config.catalog_dir())?);
    let index = open_index(&config.index_path(), encoder.as_ref());

    let pipeline = MatchPipeline::builder()
        .profiles(catalog.clone())
        .jobs(catalog)
        .encoder(encoder)
        .index(index)
        .repository(Arc::new(FileMatchStore::new(config.matches_dir())))
        .cache(EmbeddingCache::with_capacity(config.embedding_cache_capacity))
        .config(PipelineConfig {
            matching,
            ..Default::default()
        })
        .build()?;
    Ok(pipeline)
}

async fn reindex(
    config: &Config,
    encoder: Arc<dyn TextEncoder>,
    catalog: &Catalog,
) -> anyhow::Result<()> {
    let jobs = catalog.active_jobs().await?;
    let index = VectorIndex::create(
        config.index_path(),
        IndexConfig::with_dim(encoder.dimension()),
        encoder.model_version(),
    )?;

    let entries = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<IndexEntry>> {
        let texts: Vec<String> = jobs.iter().map(|j| j.embedding_text()).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let vectors = encoder.encode_batch(&refs)?;
        Ok(jobs
            .iter()
            .zip(vectors)
            .map(|(job, vector)| IndexEntry::new(job.id, job.content_hash(), vector))
            .collect())
    })
    .await??;

    index.rebuild(&entries)?;
    tracing::info!(
        entries = entries.len(),
        path = %config.index_path().display(),
        "Index rebuilt"
    );
    Ok(())
}
