// Model download helper for the sentence embedding model.
//
// Fetches all-MiniLM-L6-v2 (ONNX export plus tokenizer) from HuggingFace
// into a platform data directory (~/.local/share/trendspotter/models/ on
// Linux) so it persists across runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// HuggingFace repo for the sentence embedding model.
const EMBEDDING_HF_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main";

/// (remote path, local file name, approximate size shown while downloading)
const MODEL_FILES: [(&str, &str, Option<&str>); 2] = [
    ("tokenizer.json", "tokenizer.json", None),
    ("onnx/model.onnx", "model.onnx", Some("~90 MB")),
];

/// Returns the default directory for storing model files.
pub fn default_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("trendspotter")
        .join("models")
}

/// Subdirectory within the model dir holding all-MiniLM-L6-v2.
pub fn embedding_model_dir(base: &Path) -> PathBuf {
    base.join("all-MiniLM-L6-v2")
}

/// Check whether both embedding model files exist.
pub fn embedding_files_present(base: &Path) -> bool {
    let dir = embedding_model_dir(base);
    MODEL_FILES
        .iter()
        .all(|(_, local, _)| dir.join(local).exists())
}

/// Download the embedding model into `base`. Files that already exist are
/// skipped, so this is safe to re-run after an interrupted download.
pub async fn download_model(base: &Path) -> Result<()> {
    let dir = embedding_model_dir(base);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create model directory: {}", dir.display()))?;

    println!("\nSentence embedding model (all-MiniLM-L6-v2):");

    for (remote, local, size) in MODEL_FILES {
        let dest = dir.join(local);
        if dest.exists() {
            info!(file = local, "Model file already exists, skipping");
            println!("  {local} (already exists)");
            continue;
        }

        match size {
            Some(size) => println!("  Downloading {local} ({size})..."),
            None => println!("  Downloading {local}..."),
        }
        download_file(
            &format!("{EMBEDDING_HF_URL}/{remote}"),
            &dest,
            size.is_some(),
        )
        .await?;
    }

    Ok(())
}

/// Download a single file. A partial download never lands at `dest`: the
/// body is written to a temporary name and renamed once complete.
async fn download_file(url: &str, dest: &Path, show_progress: bool) -> Result<()> {
    let response = reqwest::Client::new()
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to download {}", url))?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status {}: {}", response.status(), url);
    }

    let pb = show_progress.then(|| progress_bar(response.content_length()));

    let bytes = response
        .bytes()
        .await
        .context("Failed to read response body")?;

    if let Some(ref pb) = pb {
        pb.set_position(bytes.len() as u64);
    }

    let partial = dest.with_extension("part");
    std::fs::write(&partial, &bytes)
        .with_context(|| format!("Failed to write {}", partial.display()))?;
    std::fs::rename(&partial, dest)
        .with_context(|| format!("Failed to move download into {}", dest.display()))?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    info!(url, dest = %dest.display(), "Downloaded model file");
    Ok(())
}

fn progress_bar(total_size: Option<u64>) -> ProgressBar {
    match total_size {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("    [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                    .expect("valid template")
                    .progress_chars("=> "),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("    {spinner} {bytes}")
                    .expect("valid template"),
            );
            pb
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_dir_is_under_trendspotter() {
        let path = default_model_dir();
        let path_str = path.to_string_lossy();
        assert!(
            path_str.contains("trendspotter") && path_str.contains("models"),
            "Expected path containing trendspotter/models, got: {path_str}"
        );
    }

    #[test]
    fn test_embedding_model_dir_is_subdirectory() {
        let base = PathBuf::from("/tmp/test-models");
        assert_eq!(embedding_model_dir(&base), base.join("all-MiniLM-L6-v2"));
    }

    #[test]
    fn test_embedding_files_present_false_when_missing() {
        let dir = std::env::temp_dir().join("trendspotter-test-nonexistent");
        assert!(!embedding_files_present(&dir));
    }

    #[test]
    fn test_embedding_files_present_true_when_files_exist() {
        let dir = std::env::temp_dir().join("trendspotter-embed-test");
        let embed_dir = embedding_model_dir(&dir);
        std::fs::create_dir_all(&embed_dir).unwrap();
        std::fs::write(embed_dir.join("model.onnx"), b"fake").unwrap();
        std::fs::write(embed_dir.join("tokenizer.json"), b"fake").unwrap();

        assert!(embedding_files_present(&dir));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
