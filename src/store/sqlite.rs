// SqliteVectorStore: rusqlite backend implementing the VectorStore trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work via the free
// functions in queries.rs, and return without holding the lock across an
// .await.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{CollectionInfo, EmbeddingRecord, QueryHit};
use super::traits::VectorStore;
use super::{queries, schema};

pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Wrap an already-opened connection whose tables exist.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Fresh in-memory store with the schema created. Used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::create_tables(&conn)?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        schema::table_count(&conn)
    }

    async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::ensure_collection(&conn, name, dimension)
    }

    async fn upsert_batch(&self, collection: &str, records: &[EmbeddingRecord]) -> Result<usize> {
        let mut conn = self.conn.lock().await;
        queries::upsert_records(&mut conn, collection, records)
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f64],
        n_results: usize,
    ) -> Result<Vec<QueryHit>> {
        let conn = self.conn.lock().await;
        queries::query_nearest(&conn, collection, vector, n_results)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let conn = self.conn.lock().await;
        queries::count_records(&conn, collection)
    }

    async fn collection_info(&self, collection: &str) -> Result<Option<CollectionInfo>> {
        let conn = self.conn.lock().await;
        queries::collection_info(&conn, collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::RecordMetadata;

    fn record(id: &str, vector: Vec<f64>) -> EmbeddingRecord {
        EmbeddingRecord {
            id: id.to_string(),
            vector,
            document: "text".to_string(),
            metadata: RecordMetadata {
                talk_id: "1".to_string(),
                chunk_id: 0,
                title: "T".to_string(),
                speaker: "S".to_string(),
                topic_keywords: vec![],
            },
        }
    }

    #[tokio::test]
    async fn test_trait_roundtrip() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        store.ensure_collection("talks", 2).await.unwrap();
        assert_eq!(store.count("talks").await.unwrap(), 0);

        let written = store
            .upsert_batch("talks", &[record("x", vec![0.5, 0.5])])
            .await
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(store.count("talks").await.unwrap(), 1);

        let hits = store.query("talks", &[0.5, 0.5], 3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "x");
    }

    #[tokio::test]
    async fn test_count_missing_collection_is_zero() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        assert_eq!(store.count("absent").await.unwrap(), 0);
        assert_eq!(store.table_count().await.unwrap(), 3);
    }
}
