// EmbeddingIndex: batched indexing and nearest-neighbor query over one
// collection.
//
// The index owns nothing global: the embedder and the store are built once
// by the caller and passed in as trait objects. Every embedder and store
// call runs under a timeout. Failures cross this boundary as `CoreError`:
// `Indexing` on the write path, `BackingService` on the read path.
//
// Writes: chunks are cut into batches, each batch is embedded with one call
// and committed with one store transaction. Embedding of later batches may
// run ahead (bounded by `embed_concurrency`) while commits happen strictly in
// batch order under an index-wide lock, so a failure leaves every earlier
// batch committed and nothing of the failing one.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::corpus::Chunk;
use crate::embeddings::Embedder;
use crate::error::{CoreError, CoreResult};
use crate::store::{CollectionInfo, EmbeddingRecord, QueryResult, VectorStore};

/// Runtime knobs for an index. `Config` supplies these from the environment.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub collection: String,
    /// Batches whose embeddings may be computed ahead of the commit
    pub embed_concurrency: usize,
    pub embed_timeout: Duration,
    pub store_timeout: Duration,
    /// Draw a progress bar while indexing
    pub show_progress: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            collection: "tedx_talks".to_string(),
            embed_concurrency: 2,
            embed_timeout: Duration::from_secs(120),
            store_timeout: Duration::from_secs(30),
            show_progress: false,
        }
    }
}

/// Outcome of a successful `index_batch` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub batches: usize,
    pub records_written: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub record_count: usize,
}

pub struct EmbeddingIndex {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    options: IndexOptions,
    write_lock: Mutex<()>,
}

impl EmbeddingIndex {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        options: IndexOptions,
    ) -> Self {
        Self {
            embedder,
            store,
            options,
            write_lock: Mutex::new(()),
        }
    }

    pub fn collection(&self) -> &str {
        &self.options.collection
    }

    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Create the collection if absent, or open it and check its dimension.
    pub async fn ensure_collection(&self) -> CoreResult<()> {
        self.store_call(
            "ensure collection",
            self.store
                .ensure_collection(&self.options.collection, self.embedder.dimension()),
        )
        .await
        .map_err(CoreError::backing)
    }

    /// Embed and upsert `chunks`, `batch_size` at a time.
    ///
    /// Every chunk is checked before anything is written: a blank talk id,
    /// title, speaker or text fails the whole call. Batch numbers in errors
    /// count from 0.
    pub async fn index_batch(&self, chunks: &[Chunk], batch_size: usize) -> CoreResult<IndexReport> {
        if batch_size == 0 {
            return Err(CoreError::invalid("batch_size must be at least 1"));
        }

        for (i, chunk) in chunks.iter().enumerate() {
            if let Some(field) = missing_field(chunk) {
                return Err(CoreError::indexing(
                    i / batch_size,
                    format!("chunk {} is missing {field}", chunk.record_id()),
                ));
            }
        }

        if chunks.is_empty() {
            return Ok(IndexReport::default());
        }

        let _guard = self.write_lock.lock().await;

        self.store_call(
            "ensure collection",
            self.store
                .ensure_collection(&self.options.collection, self.embedder.dimension()),
        )
        .await
        .map_err(|e| CoreError::indexing(0, format!("{e:#}")))?;

        let total = chunks.len().div_ceil(batch_size);

        info!(
            chunks = chunks.len(),
            batches = total,
            batch_size,
            collection = %self.options.collection,
            "Indexing chunks"
        );

        let pb = self.progress_bar(total);

        // Stream items are plain batch numbers so the future stays Send
        let embedded = stream::iter(0..total)
            .map(move |batch_no| {
                let start = batch_no * batch_size;
                let batch = &chunks[start..(start + batch_size).min(chunks.len())];
                async move { (batch_no, self.embed_records(batch).await) }
            })
            .buffered(self.options.embed_concurrency.max(1));
        let mut embedded = std::pin::pin!(embedded);

        let mut report = IndexReport::default();
        while let Some((batch_no, records)) = embedded.next().await {
            let records = records.map_err(|e| {
                pb.abandon();
                CoreError::indexing(batch_no, format!("{e:#}"))
            })?;

            let written = self
                .store_call(
                    "upsert batch",
                    self.store.upsert_batch(&self.options.collection, &records),
                )
                .await
                .map_err(|e| {
                    pb.abandon();
                    CoreError::indexing(batch_no, format!("{e:#}"))
                })?;

            if written != records.len() {
                pb.abandon();
                return Err(CoreError::indexing(
                    batch_no,
                    format!("store wrote {written} rows for {} chunks", records.len()),
                ));
            }

            debug!(batch = batch_no, records = written, "Committed batch");
            report.batches += 1;
            report.records_written += written;
            pb.inc(1);
        }
        pb.finish_and_clear();

        info!(
            batches = report.batches,
            records = report.records_written,
            "Indexing complete"
        );

        Ok(report)
    }

    /// The `n_results` records nearest to `text`.
    ///
    /// An empty or not-yet-created collection gives an empty result.
    pub async fn query(&self, text: &str, n_results: usize) -> CoreResult<QueryResult> {
        if n_results == 0 {
            return Err(CoreError::invalid("n_results must be at least 1"));
        }

        let vector = self.embed_one(text).await?;
        self.query_with_embedding(&vector, n_results).await
    }

    /// Nearest-neighbor lookup for a vector that was already computed.
    pub async fn query_with_embedding(
        &self,
        vector: &[f64],
        n_results: usize,
    ) -> CoreResult<QueryResult> {
        if n_results == 0 {
            return Err(CoreError::invalid("n_results must be at least 1"));
        }
        if vector.len() != self.embedder.dimension() {
            return Err(CoreError::invalid(format!(
                "query vector has {} dimensions, index uses {}",
                vector.len(),
                self.embedder.dimension()
            )));
        }

        let hits = self
            .store_call(
                "query",
                self.store
                    .query(&self.options.collection, vector, n_results),
            )
            .await
            .map_err(CoreError::backing)?;

        debug!(hits = hits.len(), n_results, "Query complete");
        Ok(QueryResult { hits })
    }

    /// Embed texts on the query path, one vector per text in order.
    pub async fn embed_texts(&self, texts: &[String]) -> CoreResult<Vec<Vec<f64>>> {
        let vectors = self
            .embed_call(self.embedder.embed_batch(texts))
            .await
            .map_err(CoreError::backing)?;

        check_vectors(&vectors, texts.len(), self.embedder.dimension())
            .map_err(CoreError::backing)?;
        Ok(vectors)
    }

    /// Embed a single query text.
    pub async fn embed_one(&self, text: &str) -> CoreResult<Vec<f64>> {
        let mut vectors = self.embed_texts(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| CoreError::BackingService("embedder returned no vector".to_string()))
    }

    /// Record count. Never fails: a store error is logged and reported as 0.
    pub async fn stats(&self) -> IndexStats {
        match self.try_stats().await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, collection = %self.options.collection, "Failed to read index stats");
                IndexStats::default()
            }
        }
    }

    /// Record count, surfacing store failures.
    pub async fn try_stats(&self) -> CoreResult<IndexStats> {
        let record_count = self
            .store_call("count", self.store.count(&self.options.collection))
            .await
            .map_err(CoreError::backing)?;
        Ok(IndexStats { record_count })
    }

    pub async fn collection_info(&self) -> CoreResult<Option<CollectionInfo>> {
        self.store_call(
            "collection info",
            self.store.collection_info(&self.options.collection),
        )
        .await
        .map_err(CoreError::backing)
    }

    pub async fn table_count(&self) -> CoreResult<i64> {
        self.store_call("table count", self.store.table_count())
            .await
            .map_err(CoreError::backing)
    }

    /// One embedding call for a batch, checked and turned into records.
    async fn embed_records(&self, batch: &[Chunk]) -> Result<Vec<EmbeddingRecord>> {
        let texts: Vec<String> = batch.iter().map(|c| c.chunk_text.clone()).collect();
        let vectors = self.embed_call(self.embedder.embed_batch(&texts)).await?;
        check_vectors(&vectors, batch.len(), self.embedder.dimension())?;

        Ok(batch
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddingRecord::from_chunk(chunk, vector))
            .collect())
    }

    async fn embed_call<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        with_timeout(self.options.embed_timeout, "embedding", fut).await
    }

    async fn store_call<T>(&self, what: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        with_timeout(self.options.store_timeout, what, fut).await
    }

    fn progress_bar(&self, batches: usize) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(batches as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  Indexing [{bar:30}] {pos}/{len} batches ({eta})")
                .expect("valid template"),
        );
        pb
    }
}

async fn with_timeout<T>(
    limit: Duration,
    what: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => anyhow::bail!("{what} timed out after {limit:?}"),
    }
}

/// One vector per input, each of the index's dimension.
fn check_vectors(vectors: &[Vec<f64>], expected: usize, dimension: usize) -> Result<()> {
    if vectors.len() != expected {
        anyhow::bail!(
            "embedding returned {} vectors for {expected} texts",
            vectors.len()
        );
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        anyhow::bail!(
            "embedding returned a {}-dimensional vector, expected {dimension}",
            bad.len()
        );
    }
    Ok(())
}

fn missing_field(chunk: &Chunk) -> Option<&'static str> {
    [
        ("talk_id", &chunk.talk_id),
        ("title", &chunk.title),
        ("speaker", &chunk.speaker),
        ("chunk_text", &chunk.chunk_text),
    ]
    .into_iter()
    .find(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(talk_id: &str, title: &str, text: &str) -> Chunk {
        Chunk {
            talk_id: talk_id.to_string(),
            chunk_id: 0,
            title: title.to_string(),
            speaker: "Speaker".to_string(),
            chunk_text: text.to_string(),
            topic_keywords: vec![],
        }
    }

    #[test]
    fn test_missing_field_detects_blank_values() {
        assert_eq!(missing_field(&chunk("1", "T", "text")), None);
        assert_eq!(missing_field(&chunk("1", "  ", "text")), Some("title"));
        assert_eq!(missing_field(&chunk("", "T", "text")), Some("talk_id"));
        assert_eq!(missing_field(&chunk("1", "T", "")), Some("chunk_text"));
    }

    #[test]
    fn test_check_vectors_count_and_dimension() {
        assert!(check_vectors(&[vec![0.0; 3]], 1, 3).is_ok());
        let err = check_vectors(&[vec![0.0; 3]], 2, 3).unwrap_err();
        assert!(err.to_string().contains("1 vectors for 2 texts"));
        let err = check_vectors(&[vec![0.0; 2]], 1, 3).unwrap_err();
        assert!(err.to_string().contains("2-dimensional"));
    }

    #[tokio::test]
    async fn test_with_timeout_reports_operation() {
        let err = with_timeout(Duration::from_millis(10), "query", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, anyhow::Error>(())
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("query timed out"));
    }
}
