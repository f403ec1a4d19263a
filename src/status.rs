// System status display: backend, collection size, model availability.

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::config::Config;
use crate::store::VectorStore;

/// Display index status to the terminal. Doesn't need the embedding model
/// to be loaded.
pub async fn show(store: &dyn VectorStore, config: &Config) -> Result<()> {
    let location = config.store_display();
    if config.uses_postgres() {
        println!("Store: {} ({})", location, store.backend_name());
    } else {
        let file_size = std::fs::metadata(Path::new(&config.db_path))
            .map(|m| format_bytes(m.len()))
            .unwrap_or_else(|_| "unknown".to_string());
        println!("Store: {} ({}, {})", location, store.backend_name(), file_size);
    }

    match store.collection_info(&config.collection).await? {
        Some(info) => {
            println!(
                "Collection: {} ({}-dim, created {})",
                info.name, info.dimension, info.created_at
            );
            println!("Records: {}", info.record_count);
            match info.last_indexed_at {
                Some(at) => println!("Last indexed: {at}"),
                None => {
                    println!("Last indexed: never");
                    println!("  Run `trendspotter index <chunks.jsonl>` to add talks");
                }
            }
        }
        None => {
            println!("Collection: {} (not created yet)", config.collection);
            println!("  Run `trendspotter init` to create it");
        }
    }

    if crate::embeddings::download::embedding_files_present(&config.model_dir) {
        println!("Model: {} {}", "ready".green(), config.embedding_model_dir().display());
    } else {
        println!("Model: {}", "not downloaded".yellow());
        println!("  Run `trendspotter download-model` to fetch it");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
