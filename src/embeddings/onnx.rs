// Local sentence embeddings with all-MiniLM-L6-v2 via ONNX Runtime.
//
// Transcript chunks, trend queries and candidate ideas all go through the
// same model so their vectors are comparable. Token embeddings are
// mean-pooled (weighted by the attention mask) and L2-normalized, matching
// how the model was trained for cosine similarity.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::debug;

use super::traits::Embedder;

/// Embedding dimension for all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;

/// Longest input the model was trained on, in word pieces.
const MAX_TOKENS: usize = 256;

/// Sentence embedder using a local ONNX model.
///
/// The session sits behind `Arc<Mutex<_>>` and the tokenizer behind `Arc` so
/// both can move into `spawn_blocking` for each batch.
pub struct SentenceEmbedder {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
}

impl SentenceEmbedder {
    /// Load the model and tokenizer from the given directory.
    ///
    /// Expects `model.onnx` and `tokenizer.json` in the directory.
    /// Run `trendspotter download-model` first if they don't exist.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            anyhow::bail!(
                "Embedding model not found: {}\nRun `trendspotter download-model` to download it.",
                model_path.display()
            );
        }
        if !tokenizer_path.exists() {
            anyhow::bail!(
                "Embedding tokenizer not found: {}\nRun `trendspotter download-model` to download it.",
                tokenizer_path.display()
            );
        }

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(&model_path)
            .with_context(|| {
                format!(
                    "Failed to load embedding model from {}",
                    model_path.display()
                )
            })?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load embedding tokenizer: {}", e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Failed to configure tokenizer truncation: {}", e))?;

        debug!(model_dir = %model_dir.display(), "Loaded sentence embedding model");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
        })
    }
}

#[async_trait]
impl Embedder for SentenceEmbedder {
    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    /// Tokenization and inference are CPU-bound, so they run on
    /// spawn_blocking to keep the async runtime responsive.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || embed_sync(&session, &tokenizer, &texts))
            .await
            .context("spawn_blocking panicked")?
    }
}

fn embed_sync(
    session: &Arc<Mutex<Session>>,
    tokenizer: &Arc<Tokenizer>,
    texts: &[String],
) -> Result<Vec<Vec<f64>>> {
    let encodings = texts
        .iter()
        .map(|t| {
            tokenizer
                .encode(t.as_str(), true)
                .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))
        })
        .collect::<Result<Vec<_>>>()?;

    let batch_size = encodings.len();
    let max_len = encodings
        .iter()
        .map(|e| e.get_ids().len())
        .max()
        .unwrap_or(0);

    if max_len == 0 {
        return Ok(vec![vec![0.0; EMBEDDING_DIM]; batch_size]);
    }

    // BERT inputs, padded to the longest sequence with token id 0 and mask 0
    let mut input_ids: Vec<i64> = Vec::with_capacity(batch_size * max_len);
    let mut attention_mask: Vec<i64> = Vec::with_capacity(batch_size * max_len);
    let token_type_ids: Vec<i64> = vec![0; batch_size * max_len];

    for enc in &encodings {
        let ids = enc.get_ids();
        let pad_len = max_len - ids.len();

        input_ids.extend(ids.iter().map(|&id| id as i64));
        input_ids.extend(std::iter::repeat_n(0i64, pad_len));
        attention_mask.extend(enc.get_attention_mask().iter().map(|&m| m as i64));
        attention_mask.extend(std::iter::repeat_n(0i64, pad_len));
    }

    let shape = [batch_size as i64, max_len as i64];
    let input_ids_tensor =
        Tensor::from_array((shape, input_ids)).context("Failed to create input_ids tensor")?;
    let attention_mask_tensor = Tensor::from_array((shape, attention_mask.clone()))
        .context("Failed to create attention_mask tensor")?;
    let token_type_ids_tensor = Tensor::from_array((shape, token_type_ids))
        .context("Failed to create token_type_ids tensor")?;

    // last_hidden_state: [batch, seq_len, 384]
    let hidden_states = {
        let mut session = session
            .lock()
            .map_err(|e| anyhow::anyhow!("Session lock poisoned: {}", e))?;

        let outputs = session
            .run(ort::inputs! {
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor
            })
            .context("Embedding ONNX inference failed")?;

        let (_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract embedding output tensor")?;

        data.to_vec()
    };

    let embeddings: Vec<Vec<f64>> = (0..batch_size)
        .map(|i| {
            let mask = &attention_mask[i * max_len..(i + 1) * max_len];
            let tokens = &hidden_states[i * max_len * EMBEDDING_DIM..(i + 1) * max_len * EMBEDDING_DIM];
            normalize(mean_pool(tokens, mask))
        })
        .collect();

    debug!(batch_size, dim = EMBEDDING_DIM, "Computed sentence embeddings");

    Ok(embeddings)
}

/// Average the token vectors of one sequence, skipping padding.
fn mean_pool(tokens: &[f32], mask: &[i64]) -> Vec<f64> {
    let mut sum = vec![0.0_f64; EMBEDDING_DIM];
    let mut mask_sum = 0.0_f64;

    for (j, &m) in mask.iter().enumerate() {
        if m == 0 {
            continue;
        }
        mask_sum += m as f64;
        let token = &tokens[j * EMBEDDING_DIM..(j + 1) * EMBEDDING_DIM];
        for (acc, &val) in sum.iter_mut().zip(token) {
            *acc += val as f64 * m as f64;
        }
    }

    if mask_sum > 0.0 {
        for val in &mut sum {
            *val /= mask_sum;
        }
    }
    sum
}

/// Scale a vector to unit length. Zero vectors are returned unchanged.
fn normalize(mut v: Vec<f64>) -> Vec<f64> {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > f64::EPSILON {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// Cosine similarity between two vectors, in [-1, 1].
///
/// Mismatched lengths, empty vectors and zero vectors give 0.0. Cosine
/// distance throughout the crate is `1 - cosine_similarity`.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    let denom = mag_a * mag_b;
    if denom < f64::EPSILON {
        0.0
    } else {
        (dot / denom).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_of_normalized_vectors_is_dot_product() {
        let a = normalize(vec![1.0, 2.0, 2.0]);
        let b = normalize(vec![2.0, 0.0, 1.0]);
        let dot: f64 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        assert!((cosine_similarity(&a, &b) - dot).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_distance_stays_in_range() {
        let pairs: [(&[f64], &[f64]); 4] = [
            (&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]),
            (&[1.0, 0.0], &[-1.0, 0.0]),
            (&[0.3, 0.3, 0.3], &[0.1, 0.1, 0.1]),
            (&[1e-8, 1.0], &[1.0, 1e-8]),
        ];
        for (a, b) in pairs {
            let distance = 1.0 - cosine_similarity(a, b);
            assert!((0.0..=2.0).contains(&distance), "distance {distance}");
        }
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_degenerate_inputs_are_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn test_mean_pool_skips_padding() {
        let mut tokens = vec![0.0_f32; EMBEDDING_DIM * 3];
        tokens[0] = 2.0;
        tokens[EMBEDDING_DIM] = 4.0;
        // Padding token carries garbage that must not leak into the mean
        tokens[2 * EMBEDDING_DIM] = 100.0;

        let pooled = mean_pool(&tokens, &[1, 1, 0]);
        assert_eq!(pooled.len(), EMBEDDING_DIM);
        assert!((pooled[0] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_normalize_unit_length() {
        let v = normalize(vec![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-10);
        assert!((v[1] - 0.8).abs() < 1e-10);
        assert_eq!(normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_load_missing_model_mentions_download() {
        let dir = std::env::temp_dir().join("trendspotter-no-model-here");
        let err = SentenceEmbedder::load(&dir).err().expect("load should fail");
        assert!(err.to_string().contains("download-model"));
    }
}
