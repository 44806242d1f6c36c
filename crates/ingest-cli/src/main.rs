//! ingest - document ingestion pipeline CLI
//!
//! Usage:
//!   ingest add [--input-dir PATH] [--artifact-dir PATH]   Ingest all documents under input-dir
//!   ingest remove [--input-dir PATH]                      Remove documents under input-dir from the index
//!   ingest remove-all                                     Wipe the vector store and artifact store
//!   ingest validate                                       Probe every configured collaborator

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use ingest_core::{
    ArtifactStoreImpl, DirectoryInputSource, EmbeddingsProvider, EmbeddingsProviderImpl,
    ExtractorImpl, InputSourceImpl, LocalArtifactStore, MediaDescriberImpl, NoopDescriber,
    SqliteVectorStore, VectorStoreImpl,
};
use ingest_pipeline::{config, Action, CancelHandle, DocumentPipeline, PipelineRunner, PipelineStatus};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ingest")]
#[command(about = "Document ingestion pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a config.toml overriding the default config location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory to read source documents from (overrides config)
    #[arg(long, global = true)]
    input_dir: Option<PathBuf>,

    /// Directory to write per-document artifacts to (overrides config)
    #[arg(long, global = true)]
    artifact_dir: Option<PathBuf>,

    /// Path to the vector store database (overrides config)
    #[arg(long, global = true)]
    vector_store: Option<PathBuf>,

    /// Use the deterministic, zero-download embedder instead of the local candle model
    #[arg(long, global = true)]
    deterministic_embeddings: bool,

    /// Output the final status as JSON instead of a colored summary
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest every document under input-dir
    Add,
    /// Remove every document under input-dir from the vector and artifact stores
    Remove,
    /// Wipe the vector store and artifact store entirely
    RemoveAll,
    /// Probe every configured collaborator without making destructive calls
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config::default_config_path()?,
    };
    let mut cfg = config::load_config(&config_path)?;

    if let Some(dir) = &cli.input_dir {
        cfg.document.get_or_insert_with(Default::default).input_dir = Some(dir.clone());
    }
    if let Some(dir) = &cli.artifact_dir {
        cfg.document.get_or_insert_with(Default::default).artifact_dir = Some(dir.clone());
    }
    if let Some(path) = &cli.vector_store {
        cfg.providers.get_or_insert_with(Default::default).vector_store_path = Some(path.clone());
    }
    if cli.deterministic_embeddings {
        cfg.providers.get_or_insert_with(Default::default).use_deterministic_embeddings = Some(true);
    }

    let (runner, cancel_handle) = build_runner(&cfg)?;
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling not-yet-started documents");
            cancel_handle.cancel();
        }
    });

    let status = match cli.command {
        Commands::Add => runner.run(Action::Add).await?,
        Commands::Remove => runner.run(Action::Remove).await?,
        Commands::RemoveAll => runner.run(Action::RemoveAll).await?,
        Commands::Validate => {
            let results = runner.validate().await;
            print_validation(&results, cli.json);
            return Ok(());
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }

    if status.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

type Runner = PipelineRunner<
    InputSourceImpl,
    ExtractorImpl,
    ArtifactStoreImpl,
    MediaDescriberImpl,
    EmbeddingsProviderImpl,
    VectorStoreImpl,
>;

fn build_runner(cfg: &config::Config) -> Result<(Runner, CancelHandle)> {
    let document = cfg.document.clone().unwrap_or_default();
    let input_dir = document
        .input_dir
        .context("no input directory configured (pass --input-dir or set document.input_dir)")?;
    let artifact_dir = document.artifact_dir.unwrap_or_else(|| PathBuf::from("./artifacts"));

    let providers = cfg.providers.clone().unwrap_or_default();
    let vector_store_path = providers
        .vector_store_path
        .unwrap_or_else(|| artifact_dir.join("vectors.sqlite3"));
    let use_deterministic = providers.use_deterministic_embeddings.unwrap_or(false);

    let limits = cfg.concurrency.clone().unwrap_or_default().resolve();
    let chunker_config = cfg.chunker.clone().unwrap_or_default().into_chunker_config();
    let offline_fallback = cfg.pipeline.clone().unwrap_or_default().offline_fallback();

    let input_source = Arc::new(InputSourceImpl::Directory(DirectoryInputSource::new(&input_dir)));
    let artifact_store = Arc::new(ArtifactStoreImpl::Local(LocalArtifactStore::new(&artifact_dir)));

    let embeddings = if use_deterministic {
        EmbeddingsProviderImpl::Deterministic(ingest_core::DeterministicEmbeddings::new(768, 512))
    } else {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg}")
                .unwrap()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        spinner.set_message("Loading embedding model...");
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        let loaded = ingest_core::CandleEmbeddings::load()
            .context("failed to load local embedding model")?;
        spinner.finish_with_message("Embedding model loaded");
        EmbeddingsProviderImpl::Candle(loaded)
    };
    let embeddings = Arc::new(embeddings);

    let vector_store = Arc::new(VectorStoreImpl::Sqlite(
        SqliteVectorStore::open(&vector_store_path, embeddings.dimensions())
            .context("failed to open vector store")?,
    ));
    let media_describer = Arc::new(MediaDescriberImpl::Noop(NoopDescriber));
    let extractor = Arc::new(ExtractorImpl::Auto);

    let pipeline = Arc::new(DocumentPipeline {
        extractor: extractor.clone(),
        offline_extractor: None,
        artifact_store: artifact_store.clone(),
        media_describer,
        embeddings,
        vector_store: vector_store.clone(),
        chunker_config,
        limits,
        clean_artifacts: true,
        offline_fallback,
        extractor_semaphore: Arc::new(tokio::sync::Semaphore::new(limits.extractor_requests)),
        embedding_semaphore: Arc::new(tokio::sync::Semaphore::new(limits.embedding_requests)),
    });

    let (cancel_handle, cancel) = CancelHandle::new();
    Ok((
        PipelineRunner { input_source, artifact_store, vector_store, pipeline, limits, cancel },
        cancel_handle,
    ))
}

fn print_status(status: &PipelineStatus) {
    println!();
    if status.failed == 0 {
        println!("{}", "Ingestion complete!".green().bold());
    } else {
        println!("{}", "Ingestion finished with errors".yellow().bold());
    }
    println!("  Action:     {}", status.action.cyan());
    println!("  Documents:  {}", status.results.len().to_string().cyan());
    println!("  Succeeded:  {}", status.succeeded.to_string().green());
    if status.failed > 0 {
        println!("  Failed:     {}", status.failed.to_string().red());
    }
    let total_chunks: usize = status.results.iter().map(|r| r.chunks_indexed).sum();
    println!("  Chunks:     {}", total_chunks.to_string().cyan());

    for result in &status.results {
        if result.success {
            println!(
                "  {} {} ({} chunks, {:.1}s)",
                "✓".green(),
                result.sourcefile,
                result.chunks_indexed,
                result.seconds
            );
        } else {
            println!(
                "  {} {} — {}",
                "✗".red(),
                result.sourcefile,
                result.error.as_deref().unwrap_or("unknown error").red()
            );
        }
    }
}

fn print_validation(results: &[ingest_pipeline::ValidationResult], json: bool) {
    if json {
        if let Ok(s) = serde_json::to_string_pretty(results) {
            println!("{s}");
        }
        return;
    }
    println!("{}", "Validation".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for result in results {
        let mark = if result.ok { "✓".green() } else { "✗".red() };
        print!("  {} {}", mark, result.collaborator);
        if let Some(message) = &result.message {
            print!(" — {}", message.dimmed());
        }
        println!();
    }
}
