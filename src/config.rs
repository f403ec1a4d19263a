use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::corpus::ChunkingOptions;
use crate::embeddings::download;
use crate::index::IndexOptions;

/// Central configuration loaded from environment variables.
///
/// Every setting has a default, so an empty environment is valid. The .env
/// file is loaded automatically at startup via dotenvy.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    /// PostgreSQL connection URL (when set and starts with postgres://, uses Postgres backend)
    pub database_url: Option<String>,
    /// Name of the vector collection holding the talk chunks
    pub collection: String,
    /// Base directory for downloaded models
    pub model_dir: PathBuf,
    /// Chunks per embedding call and per store transaction
    pub batch_size: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub topics_per_talk: usize,
    pub embed_concurrency: usize,
    pub embed_timeout: Duration,
    pub store_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup. A variable that is set but doesn't
    /// parse is an error rather than a silent fallback to the default.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let number = |key: &str, default: u64| -> Result<u64> { parse_or(&get, key, default) };

        let model_dir = get("TRENDSPOTTER_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(download::default_model_dir);

        let config = Self {
            db_path: get("TRENDSPOTTER_DB_PATH").unwrap_or_else(|| "./trendspotter.db".to_string()),
            database_url: get("DATABASE_URL").filter(|u| !u.is_empty()),
            collection: get("TRENDSPOTTER_COLLECTION").unwrap_or_else(|| "tedx_talks".to_string()),
            model_dir,
            batch_size: number("TRENDSPOTTER_BATCH_SIZE", 100)? as usize,
            chunk_size: number("TRENDSPOTTER_CHUNK_SIZE", 500)? as usize,
            chunk_overlap: number("TRENDSPOTTER_CHUNK_OVERLAP", 0)? as usize,
            topics_per_talk: number("TRENDSPOTTER_TOPICS_PER_TALK", 10)? as usize,
            embed_concurrency: number("TRENDSPOTTER_EMBED_CONCURRENCY", 2)? as usize,
            embed_timeout: Duration::from_secs(number("TRENDSPOTTER_EMBED_TIMEOUT_SECS", 120)?),
            store_timeout: Duration::from_secs(number("TRENDSPOTTER_STORE_TIMEOUT_SECS", 30)?),
        };

        if config.batch_size == 0 {
            anyhow::bail!("TRENDSPOTTER_BATCH_SIZE must be at least 1");
        }
        if config.chunk_size == 0 {
            anyhow::bail!("TRENDSPOTTER_CHUNK_SIZE must be at least 1");
        }

        Ok(config)
    }

    pub fn chunking_options(&self) -> ChunkingOptions {
        ChunkingOptions {
            max_chars: self.chunk_size,
            overlap: self.chunk_overlap,
            topics_per_talk: self.topics_per_talk,
        }
    }

    pub fn index_options(&self, show_progress: bool) -> IndexOptions {
        IndexOptions {
            collection: self.collection.clone(),
            embed_concurrency: self.embed_concurrency.max(1),
            embed_timeout: self.embed_timeout,
            store_timeout: self.store_timeout,
            show_progress,
        }
    }

    /// Directory holding model.onnx and tokenizer.json.
    pub fn embedding_model_dir(&self) -> PathBuf {
        download::embedding_model_dir(&self.model_dir)
    }

    /// Check that the embedding model has been downloaded.
    /// Call this before any operation that embeds text.
    pub fn require_model(&self) -> Result<()> {
        if !download::embedding_files_present(&self.model_dir) {
            anyhow::bail!(
                "Embedding model files not found in {}\n\
                 Run `trendspotter download-model` to download them.",
                self.embedding_model_dir().display()
            );
        }
        Ok(())
    }

    /// True when DATABASE_URL selects the PostgreSQL backend.
    pub fn uses_postgres(&self) -> bool {
        self.database_url
            .as_deref()
            .is_some_and(crate::store::is_postgres_url)
    }

    /// Where the index lives, with credentials redacted.
    pub fn store_display(&self) -> String {
        match self.database_url.as_deref() {
            Some(url) if self.uses_postgres() => crate::store::redact_url(url),
            _ => self.db_path.clone(),
        }
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a number, got {raw:?}")),
        _ => Ok(default),
    }
}
