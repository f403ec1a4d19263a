// SQLite schema: table creation.
//
// Mirrors migrations/postgres/0001_initial.sql. `schema_version` records the
// layout version so a later change can be applied as a migration.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet. Safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One row per named collection; every vector in it has `dimension` entries
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            dimension INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            last_indexed_at TEXT               -- set on every committed batch
        );

        CREATE TABLE IF NOT EXISTS embeddings (
            collection TEXT NOT NULL REFERENCES collections(name),
            id TEXT NOT NULL,                  -- talk_{talk_id}_chunk_{chunk_id}
            talk_id TEXT NOT NULL,
            chunk_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            speaker TEXT NOT NULL,
            document TEXT NOT NULL,
            topic_keywords TEXT NOT NULL,      -- JSON array of strings
            vector TEXT NOT NULL,              -- JSON array of floats
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (collection, id)
        );

        CREATE INDEX IF NOT EXISTS idx_embeddings_talk
            ON embeddings(collection, talk_id);
        ",
    )
    .context("Failed to create database tables")?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    Ok(())
}

/// Count the user tables in the database (for `trendspotter init`).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}
