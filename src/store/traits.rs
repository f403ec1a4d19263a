// VectorStore trait: backend-agnostic async interface to a vector collection.
//
// Implementors: SqliteVectorStore (wraps rusqlite), PgVectorStore (sqlx +
// pgvector). All methods are async so both the sync rusqlite backend (behind
// a Mutex) and the native async sqlx backend fit behind one interface.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{CollectionInfo, EmbeddingRecord, QueryHit};

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name for status output ("sqlite", "postgres").
    fn backend_name(&self) -> &'static str;

    /// Count the user tables in the database.
    async fn table_count(&self) -> Result<i64>;

    /// Create the collection if absent; otherwise open it and check that its
    /// dimension matches.
    async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<()>;

    /// Insert or overwrite records by id, all in one transaction. Returns the
    /// number of rows written; on any error nothing from the batch is kept.
    async fn upsert_batch(&self, collection: &str, records: &[EmbeddingRecord]) -> Result<usize>;

    /// The `n_results` nearest records by cosine distance, ascending, ties by
    /// id. A collection that doesn't exist yields no hits.
    async fn query(&self, collection: &str, vector: &[f64], n_results: usize)
        -> Result<Vec<QueryHit>>;

    /// Number of records in the collection (0 if it doesn't exist).
    async fn count(&self, collection: &str) -> Result<usize>;

    async fn collection_info(&self, collection: &str) -> Result<Option<CollectionInfo>>;
}
