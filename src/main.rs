use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use trendspotter::analysis::trend::DEFAULT_TREND_RESULTS;
use trendspotter::analysis::validation::DEFAULT_VALIDATION_RESULTS;
use trendspotter::analysis::{Analysis, Analyst};
use trendspotter::config::Config;
use trendspotter::corpus;
use trendspotter::embeddings::{download, SentenceEmbedder, EMBEDDING_DIM};
use trendspotter::index::EmbeddingIndex;
use trendspotter::output::terminal;
use trendspotter::store::{self, VectorStore};

/// Fixed query run after indexing to check the index answers end to end.
const SMOKE_QUERY: &str = "innovation in technology";

/// Trendspotter: trend analysis and idea validation for talk transcripts.
///
/// Cleans and chunks a transcript corpus, indexes it by sentence embedding,
/// and answers "what's trending near this topic" and "has this idea been
/// done" against the index.
#[derive(Parser)]
#[command(name = "trendspotter", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the vector store and create the collection
    Init,

    /// Download the all-MiniLM-L6-v2 embedding model (~90 MB)
    DownloadModel,

    /// Clean, analyze and chunk a JSONL transcript corpus
    Process {
        /// Corpus file: one {talk_id?, title, speaker, transcript?} object per line
        corpus: PathBuf,

        /// Where to write the chunk export
        #[arg(long, default_value = "chunks.jsonl")]
        out: PathBuf,

        /// Also write the processed talks here
        #[arg(long)]
        talks_out: Option<PathBuf>,
    },

    /// Embed and store a chunk export
    Index {
        /// Chunk export written by `process`
        chunks: PathBuf,

        /// Chunks per embedding call and store transaction (default: TRENDSPOTTER_BATCH_SIZE)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Don't run the smoke query after indexing
        #[arg(long)]
        skip_smoke: bool,
    },

    /// Show trending topics and coverage gaps near a query
    Trends {
        query: String,

        /// Number of passages to retrieve
        #[arg(short, long, default_value_t = DEFAULT_TREND_RESULTS)]
        n: usize,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check how original a talk idea is
    Validate {
        idea: String,

        /// Number of candidate passages to compare against
        #[arg(short, long, default_value_t = DEFAULT_VALIDATION_RESULTS)]
        n: usize,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show store, collection and model status
    Status,

    /// Run a fixed test query against the index
    Smoke,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("trendspotter=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Init => {
            info!("Initializing trendspotter store...");
            let store = init_store(&config).await?;
            store
                .ensure_collection(&config.collection, EMBEDDING_DIM)
                .await?;
            let table_count = store.table_count().await?;
            println!("Store initialized at: {}", config.store_display());
            println!("Tables created: {table_count}");
            println!("Collection: {} ({EMBEDDING_DIM}-dim)", config.collection);
            if !download::embedding_files_present(&config.model_dir) {
                println!("\nNext step: trendspotter download-model");
            }
        }

        Commands::DownloadModel => {
            println!("Downloading embedding model to {}", config.model_dir.display());
            download::download_model(&config.model_dir).await?;
            println!("\n{}", "Model ready.".green().bold());
        }

        Commands::Process {
            corpus: corpus_path,
            out,
            talks_out,
        } => {
            let rows = corpus::read_rows(&corpus_path)?;
            println!("Read {} rows from {}", rows.len(), corpus_path.display());

            let processed = corpus::process_rows(&rows, &config.chunking_options())?;
            corpus::write_chunks(&out, &processed.chunks)?;
            println!(
                "  {} {} talks -> {} chunks written to {}",
                "✓".green(),
                processed.talks.len(),
                processed.chunks.len(),
                out.display()
            );

            if let Some(path) = talks_out {
                corpus::write_talks(&path, &processed.talks)?;
                println!("  {} talks written to {}", "✓".green(), path.display());
            }
        }

        Commands::Index {
            chunks,
            batch_size,
            skip_smoke,
        } => {
            let chunks = corpus::read_chunks(&chunks)?;
            let index = build_index(&config, true).await?;

            let batch_size = batch_size.unwrap_or(config.batch_size);
            println!(
                "Indexing {} chunks into {} (batches of {batch_size})...",
                chunks.len(),
                config.collection
            );
            let report = index.index_batch(&chunks, batch_size).await?;
            println!(
                "  {} {} records written in {} batches",
                "✓".green(),
                report.records_written,
                report.batches
            );

            if !skip_smoke {
                run_smoke(&index).await?;
            }
        }

        Commands::Trends { query, n, json } => {
            let index = build_index(&config, false).await?;
            let analyst = Analyst::new(index).with_result_counts(n, DEFAULT_VALIDATION_RESULTS);
            let report = analyst.process(Analysis::Trends, &query).await?;
            print_report(&report, json)?;
        }

        Commands::Validate { idea, n, json } => {
            let index = build_index(&config, false).await?;
            let analyst = Analyst::new(index).with_result_counts(DEFAULT_TREND_RESULTS, n);
            let report = analyst.process(Analysis::Validation, &idea).await?;
            print_report(&report, json)?;
        }

        Commands::Status => {
            let store = open_store(&config).await?;
            trendspotter::status::show(store.as_ref(), &config).await?;
        }

        Commands::Smoke => {
            let index = build_index(&config, false).await?;
            run_smoke(&index).await?;
        }
    }

    Ok(())
}

fn print_report(report: &trendspotter::analysis::AnalysisReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        terminal::display_report(report);
    }
    Ok(())
}

/// Query the index with a fixed text and print what came back.
async fn run_smoke(index: &EmbeddingIndex) -> Result<()> {
    let stats = index.stats().await;
    println!("\nSmoke query: \"{SMOKE_QUERY}\"");
    let result = index.query(SMOKE_QUERY, 5).await?;
    println!(
        "  {} {} hits ({} records in {})",
        if result.is_empty() { "!".yellow() } else { "✓".green() },
        result.len(),
        stats.record_count,
        index.collection()
    );
    for hit in result.iter() {
        println!(
            "    {:.3}  {} {}",
            hit.distance,
            hit.metadata.title,
            format!("by {}", hit.metadata.speaker).dimmed()
        );
    }
    Ok(())
}

/// Load the embedding model and open the configured store.
async fn build_index(config: &Config, show_progress: bool) -> Result<Arc<EmbeddingIndex>> {
    config.require_model()?;
    let embedder = SentenceEmbedder::load(&config.embedding_model_dir())?;
    let store = open_store(config).await?;
    Ok(Arc::new(EmbeddingIndex::new(
        Arc::new(embedder),
        store,
        config.index_options(show_progress),
    )))
}

/// Select the store backend based on configuration.
///
/// When DATABASE_URL is set and points to PostgreSQL, uses the Postgres backend
/// (requires the `postgres` feature). Otherwise, falls back to SQLite.
async fn open_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    if let Some(ref url) = config.database_url {
        if store::is_postgres_url(url) {
            #[cfg(feature = "postgres")]
            {
                info!("Using PostgreSQL backend");
                return store::connect_postgres(url).await;
            }
            #[cfg(not(feature = "postgres"))]
            anyhow::bail!(
                "DATABASE_URL points to PostgreSQL but the 'postgres' feature is not compiled in.\n\
                 Rebuild with: cargo build --features postgres"
            );
        }
    }
    open_sqlite(config)
}

/// Initialize the store (create if needed).
async fn init_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    if config.uses_postgres() {
        return open_store(config).await;
    }
    initialize_sqlite(config)
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &Config) -> Result<Arc<dyn VectorStore>> {
    store::open_sqlite(&config.db_path)
}

#[cfg(feature = "sqlite")]
fn initialize_sqlite(config: &Config) -> Result<Arc<dyn VectorStore>> {
    store::initialize_sqlite(&config.db_path)
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_config: &Config) -> Result<Arc<dyn VectorStore>> {
    anyhow::bail!(
        "No DATABASE_URL set and the 'sqlite' feature is not compiled in.\n\
         Set DATABASE_URL=postgres://... or rebuild with the default features."
    )
}

#[cfg(not(feature = "sqlite"))]
fn initialize_sqlite(config: &Config) -> Result<Arc<dyn VectorStore>> {
    open_sqlite(config)
}
