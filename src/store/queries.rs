// SQLite queries for collections and embedding records.
//
// Every SQL statement for the SQLite backend lives here. Vectors are stored
// as JSON arrays and nearest neighbors are found by a full scan of the
// collection, scoring each row by cosine distance.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{rank_hits, CollectionInfo, EmbeddingRecord, QueryHit, RecordMetadata};
use crate::embeddings::cosine_similarity;

// --- Collections ---

/// Create the collection if it doesn't exist; otherwise check that it holds
/// vectors of the expected dimension.
pub fn ensure_collection(conn: &Connection, name: &str, dimension: usize) -> Result<()> {
    match collection_dimension(conn, name)? {
        Some(existing) if existing == dimension => Ok(()),
        Some(existing) => anyhow::bail!(
            "Collection {name} holds {existing}-dimensional vectors but the embedder produces {dimension}"
        ),
        None => {
            conn.execute(
                "INSERT INTO collections (name, dimension) VALUES (?1, ?2)",
                params![name, dimension as i64],
            )?;
            Ok(())
        }
    }
}

/// Vector dimension of a collection, or None if it doesn't exist.
pub fn collection_dimension(conn: &Connection, name: &str) -> Result<Option<usize>> {
    let dimension: Option<i64> = conn
        .query_row(
            "SELECT dimension FROM collections WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(dimension.map(|d| d as usize))
}

pub fn collection_info(conn: &Connection, name: &str) -> Result<Option<CollectionInfo>> {
    let row = conn
        .query_row(
            "SELECT dimension, created_at, last_indexed_at FROM collections WHERE name = ?1",
            params![name],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            },
        )
        .optional()?;

    let Some((dimension, created_at, last_indexed_at)) = row else {
        return Ok(None);
    };

    Ok(Some(CollectionInfo {
        name: name.to_string(),
        dimension: dimension as usize,
        record_count: count_records(conn, name)?,
        created_at,
        last_indexed_at,
    }))
}

// --- Records ---

/// Upsert a batch of records in one transaction.
///
/// Any failure (unknown collection, wrong vector length, SQL error, or a
/// rows-written count that doesn't match the batch) rolls the whole batch
/// back. Returns the number of rows written.
pub fn upsert_records(
    conn: &mut Connection,
    collection: &str,
    records: &[EmbeddingRecord],
) -> Result<usize> {
    let tx = conn.transaction()?;

    let dimension = collection_dimension(&tx, collection)?
        .with_context(|| format!("Collection {collection} does not exist"))?;

    let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let mut written = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO embeddings
                (collection, id, talk_id, chunk_id, title, speaker, document,
                 topic_keywords, vector, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(collection, id) DO UPDATE SET
                talk_id = ?3,
                chunk_id = ?4,
                title = ?5,
                speaker = ?6,
                document = ?7,
                topic_keywords = ?8,
                vector = ?9,
                updated_at = ?10",
        )?;

        for record in records {
            if record.vector.len() != dimension {
                anyhow::bail!(
                    "Record {} has a {}-dimensional vector, collection {collection} expects {dimension}",
                    record.id,
                    record.vector.len()
                );
            }

            let keywords = serde_json::to_string(&record.metadata.topic_keywords)?;
            let vector = serde_json::to_string(&record.vector)?;
            written += stmt.execute(params![
                collection,
                record.id,
                record.metadata.talk_id,
                record.metadata.chunk_id,
                record.metadata.title,
                record.metadata.speaker,
                record.document,
                keywords,
                vector,
                now,
            ])?;
        }
    }

    if written != records.len() {
        anyhow::bail!(
            "Upsert wrote {written} rows for {} records",
            records.len()
        );
    }

    tx.execute(
        "UPDATE collections SET last_indexed_at = ?2 WHERE name = ?1",
        params![collection, now],
    )?;
    tx.commit().context("Failed to commit batch")?;

    Ok(written)
}

pub fn count_records(conn: &Connection, collection: &str) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM embeddings WHERE collection = ?1",
        params![collection],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Row as stored, before the JSON columns are parsed.
struct StoredRow {
    id: String,
    document: String,
    talk_id: String,
    chunk_id: u32,
    title: String,
    speaker: String,
    topic_keywords: String,
    vector: String,
}

/// The `n_results` records nearest to `vector` by cosine distance.
/// A missing collection yields no hits; a vector whose length differs from
/// the collection's dimension is an error.
pub fn query_nearest(
    conn: &Connection,
    collection: &str,
    vector: &[f64],
    n_results: usize,
) -> Result<Vec<QueryHit>> {
    match collection_dimension(conn, collection)? {
        None => return Ok(Vec::new()),
        Some(dimension) if dimension != vector.len() => anyhow::bail!(
            "Query vector has {} dimensions, collection {collection} expects {dimension}",
            vector.len()
        ),
        Some(_) => {}
    }

    let mut stmt = conn.prepare(
        "SELECT id, document, talk_id, chunk_id, title, speaker, topic_keywords, vector
         FROM embeddings WHERE collection = ?1",
    )?;
    let rows = stmt.query_map(params![collection], |row| {
        Ok(StoredRow {
            id: row.get(0)?,
            document: row.get(1)?,
            talk_id: row.get(2)?,
            chunk_id: row.get(3)?,
            title: row.get(4)?,
            speaker: row.get(5)?,
            topic_keywords: row.get(6)?,
            vector: row.get(7)?,
        })
    })?;

    let mut hits = Vec::new();
    for row in rows {
        let row = row?;
        let stored: Vec<f64> = serde_json::from_str(&row.vector)
            .with_context(|| format!("Corrupt vector for record {}", row.id))?;
        let topic_keywords: Vec<String> = serde_json::from_str(&row.topic_keywords)
            .with_context(|| format!("Corrupt topic_keywords for record {}", row.id))?;

        hits.push(QueryHit {
            distance: 1.0 - cosine_similarity(vector, &stored),
            id: row.id,
            document: row.document,
            metadata: RecordMetadata {
                talk_id: row.talk_id,
                chunk_id: row.chunk_id,
                title: row.title,
                speaker: row.speaker,
                topic_keywords,
            },
        });
    }

    rank_hits(&mut hits);
    hits.truncate(n_results);
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        ensure_collection(&conn, "talks", 2).unwrap();
        conn
    }

    fn record(id: &str, vector: Vec<f64>) -> EmbeddingRecord {
        EmbeddingRecord {
            id: id.to_string(),
            vector,
            document: format!("doc {id}"),
            metadata: RecordMetadata {
                talk_id: id.to_string(),
                chunk_id: 0,
                title: "Title".to_string(),
                speaker: "Speaker".to_string(),
                topic_keywords: vec!["alpha".to_string(), "beta".to_string()],
            },
        }
    }

    #[test]
    fn test_ensure_collection_rejects_dimension_change() {
        let conn = setup();
        ensure_collection(&conn, "talks", 2).unwrap();
        let err = ensure_collection(&conn, "talks", 3).unwrap_err();
        assert!(err.to_string().contains("2-dimensional"));
    }

    #[test]
    fn test_upsert_then_query_orders_by_distance() {
        let mut conn = setup();
        let written = upsert_records(
            &mut conn,
            "talks",
            &[record("a", vec![1.0, 0.0]), record("b", vec![0.0, 1.0])],
        )
        .unwrap();
        assert_eq!(written, 2);

        let hits = query_nearest(&conn, "talks", &[1.0, 0.1], 10).unwrap();
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[1].id, "b");
        assert!(hits[0].distance < hits[1].distance);
        assert_eq!(hits[0].metadata.topic_keywords, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_upsert_overwrites_same_id() {
        let mut conn = setup();
        upsert_records(&mut conn, "talks", &[record("a", vec![1.0, 0.0])]).unwrap();
        let mut updated = record("a", vec![0.0, 1.0]);
        updated.document = "new text".to_string();
        upsert_records(&mut conn, "talks", &[updated]).unwrap();

        assert_eq!(count_records(&conn, "talks").unwrap(), 1);
        let hits = query_nearest(&conn, "talks", &[0.0, 1.0], 1).unwrap();
        assert_eq!(hits[0].document, "new text");
        assert!(hits[0].distance.abs() < 1e-9);
    }

    #[test]
    fn test_wrong_dimension_rolls_back_whole_batch() {
        let mut conn = setup();
        let batch = [record("a", vec![1.0, 0.0]), record("b", vec![1.0, 0.0, 0.0])];
        assert!(upsert_records(&mut conn, "talks", &batch).is_err());
        assert_eq!(count_records(&conn, "talks").unwrap(), 0);

        let info = collection_info(&conn, "talks").unwrap().unwrap();
        assert!(info.last_indexed_at.is_none());
    }

    #[test]
    fn test_query_with_wrong_dimension_is_error() {
        let mut conn = setup();
        upsert_records(&mut conn, "talks", &[record("a", vec![1.0, 0.0])]).unwrap();
        let err = query_nearest(&conn, "talks", &[1.0, 0.0, 0.0, 0.0], 5).unwrap_err();
        assert!(err.to_string().contains("expects 2"), "got: {err}");
    }

    #[test]
    fn test_query_missing_collection_is_empty() {
        let conn = setup();
        assert!(query_nearest(&conn, "nope", &[1.0, 0.0], 5).unwrap().is_empty());
        assert!(collection_info(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn test_collection_info_reports_counts() {
        let mut conn = setup();
        upsert_records(&mut conn, "talks", &[record("a", vec![1.0, 0.0])]).unwrap();
        let info = collection_info(&conn, "talks").unwrap().unwrap();
        assert_eq!(info.dimension, 2);
        assert_eq!(info.record_count, 1);
        assert!(info.last_indexed_at.is_some());
    }
}
