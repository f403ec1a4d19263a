// PgVectorStore: PostgreSQL backend implementing the VectorStore trait.
//
// Uses a sqlx PgPool with runtime parameter binding (no compile-time
// macros, so DATABASE_URL isn't needed to build). Vectors live in a
// pgvector column and nearest neighbors come from the `<=>` cosine distance
// operator. Keywords are JSONB.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx_core::pool::Pool;
use sqlx_core::row::Row;
use sqlx_postgres::Postgres;

use super::models::{CollectionInfo, EmbeddingRecord, QueryHit, RecordMetadata};
use super::traits::VectorStore;

/// Type alias for the PostgreSQL connection pool.
pub type PgPool = Pool<Postgres>;

pub struct PgVectorStore {
    pool: PgPool,
}

impl PgVectorStore {
    /// Connect to PostgreSQL and run migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run pending migrations under a session-level advisory lock, so two
    /// processes starting together don't apply the same migration twice.
    ///
    /// The lock and unlock must run on the same physical connection, so a
    /// dedicated connection holds the lock while migrations use the pool.
    /// The unlock always runs, even when a migration fails.
    async fn run_migrations(&self) -> Result<()> {
        // ASCII "TRNDSPOT" as a big-endian i64
        const MIGRATION_LOCK_KEY: i64 = 0x54524E4453504F54_u64 as i64;

        let mut lock_conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection for migration advisory lock")?;

        sqlx_core::query::query("SELECT pg_advisory_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *lock_conn)
            .await
            .context("Failed to acquire migration advisory lock")?;

        let migration_result: Result<()> = async {
            sqlx_core::query::query(
                "CREATE TABLE IF NOT EXISTS schema_version (
                    version INTEGER PRIMARY KEY,
                    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )",
            )
            .execute(&self.pool)
            .await?;

            let migrations = [(
                1,
                include_str!("../../migrations/postgres/0001_initial.sql"),
            )];

            for (version, sql) in migrations {
                let applied: bool = sqlx_core::query::query(
                    "SELECT COUNT(*) > 0 FROM schema_version WHERE version = $1",
                )
                .bind(version)
                .fetch_one(&self.pool)
                .await
                .map(|row| row.get::<bool, _>(0))
                .unwrap_or(false);

                if !applied {
                    // CREATE EXTENSION can't run inside a transaction; the
                    // DDL is idempotent instead.
                    sqlx_core::raw_sql::raw_sql(sql)
                        .execute(&self.pool)
                        .await
                        .with_context(|| format!("Migration v{version} failed"))?;
                }
            }

            Ok(())
        }
        .await;

        let unlock_result = sqlx_core::query::query("SELECT pg_advisory_unlock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *lock_conn)
            .await
            .context("Failed to release migration advisory lock");

        migration_result?;
        unlock_result?;

        Ok(())
    }

    async fn collection_dimension(&self, name: &str) -> Result<Option<usize>> {
        let row = sqlx_core::query::query("SELECT dimension FROM collections WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<i32, _>(0) as usize))
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn table_count(&self) -> Result<i64> {
        let row = sqlx_core::query::query(
            "SELECT COUNT(*)::bigint FROM information_schema.tables
             WHERE table_schema = 'public' AND table_type = 'BASE TABLE'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>(0))
    }

    async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<()> {
        let dim = i32::try_from(dimension).context("dimension exceeds i32 range")?;
        sqlx_core::query::query(
            "INSERT INTO collections (name, dimension) VALUES ($1, $2)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(name)
        .bind(dim)
        .execute(&self.pool)
        .await?;

        match self.collection_dimension(name).await? {
            Some(existing) if existing == dimension => Ok(()),
            Some(existing) => anyhow::bail!(
                "Collection {name} holds {existing}-dimensional vectors but the embedder produces {dimension}"
            ),
            None => anyhow::bail!("Collection {name} vanished after creation"),
        }
    }

    async fn upsert_batch(&self, collection: &str, records: &[EmbeddingRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        // Row lock keeps the dimension stable for the rest of the batch
        let dimension = sqlx_core::query::query(
            "SELECT dimension FROM collections WHERE name = $1 FOR UPDATE",
        )
        .bind(collection)
        .fetch_optional(&mut *tx)
        .await?
        .map(|r| r.get::<i32, _>(0) as usize)
        .with_context(|| format!("Collection {collection} does not exist"))?;

        let mut written: u64 = 0;
        for record in records {
            if record.vector.len() != dimension {
                anyhow::bail!(
                    "Record {} has a {}-dimensional vector, collection {collection} expects {dimension}",
                    record.id,
                    record.vector.len()
                );
            }

            // pgvector stores 32-bit floats
            let floats: Vec<f32> = record.vector.iter().map(|&v| v as f32).collect();
            let keywords = serde_json::to_value(&record.metadata.topic_keywords)?;

            let result = sqlx_core::query::query(
                "INSERT INTO embeddings
                    (collection, id, talk_id, chunk_id, title, speaker, document,
                     topic_keywords, vector, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
                 ON CONFLICT(collection, id) DO UPDATE SET
                    talk_id = $3,
                    chunk_id = $4,
                    title = $5,
                    speaker = $6,
                    document = $7,
                    topic_keywords = $8,
                    vector = $9,
                    updated_at = NOW()",
            )
            .bind(collection)
            .bind(&record.id)
            .bind(&record.metadata.talk_id)
            .bind(i32::try_from(record.metadata.chunk_id).context("chunk_id exceeds i32 range")?)
            .bind(&record.metadata.title)
            .bind(&record.metadata.speaker)
            .bind(&record.document)
            .bind(&keywords)
            .bind(pgvector::Vector::from(floats))
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected();
        }

        // Dropping `tx` on any early return rolls the batch back
        if written as usize != records.len() {
            anyhow::bail!(
                "Upsert wrote {written} rows for {} records",
                records.len()
            );
        }

        sqlx_core::query::query("UPDATE collections SET last_indexed_at = NOW() WHERE name = $1")
            .bind(collection)
            .execute(&mut *tx)
            .await?;
        tx.commit().await.context("Failed to commit batch")?;

        Ok(written as usize)
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f64],
        n_results: usize,
    ) -> Result<Vec<QueryHit>> {
        match self.collection_dimension(collection).await? {
            None => return Ok(Vec::new()),
            Some(dimension) if dimension != vector.len() => anyhow::bail!(
                "Query vector has {} dimensions, collection {collection} expects {dimension}",
                vector.len()
            ),
            Some(_) => {}
        }

        let floats: Vec<f32> = vector.iter().map(|&v| v as f32).collect();
        let limit = i64::try_from(n_results).unwrap_or(i64::MAX);

        let rows = sqlx_core::query::query(
            "SELECT id, document, talk_id, chunk_id, title, speaker, topic_keywords,
                    (vector <=> $2)::float8 AS distance
             FROM embeddings
             WHERE collection = $1
             ORDER BY distance ASC, id ASC
             LIMIT $3",
        )
        .bind(collection)
        .bind(pgvector::Vector::from(floats))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get(0);
            let keywords_json: serde_json::Value = row.get(6);
            let topic_keywords: Vec<String> = serde_json::from_value(keywords_json)
                .with_context(|| format!("Corrupt topic_keywords for record {id}"))?;

            hits.push(QueryHit {
                document: row.get(1),
                metadata: RecordMetadata {
                    talk_id: row.get(2),
                    chunk_id: row.get::<i32, _>(3) as u32,
                    title: row.get(4),
                    speaker: row.get(5),
                    topic_keywords,
                },
                distance: row.get(7),
                id,
            });
        }
        Ok(hits)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let row = sqlx_core::query::query(
            "SELECT COUNT(*)::bigint FROM embeddings WHERE collection = $1",
        )
        .bind(collection)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>(0) as usize)
    }

    async fn collection_info(&self, collection: &str) -> Result<Option<CollectionInfo>> {
        let row = sqlx_core::query::query(
            "SELECT dimension,
                    to_char(created_at, 'YYYY-MM-DD HH24:MI:SS') AS created_at,
                    to_char(last_indexed_at, 'YYYY-MM-DD HH24:MI:SS') AS last_indexed_at
             FROM collections WHERE name = $1",
        )
        .bind(collection)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(CollectionInfo {
            name: collection.to_string(),
            dimension: row.get::<i32, _>(0) as usize,
            record_count: self.count(collection).await?,
            created_at: row.get(1),
            last_indexed_at: row.get(2),
        }))
    }
}
