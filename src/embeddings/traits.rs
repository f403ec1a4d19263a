// Embedder trait, the swap-ready abstraction over the embedding model.
//
// The index, the trend analyzer and the validator only ever see this trait,
// so the local ONNX model can be replaced (or stubbed in tests) without
// touching them.

use anyhow::Result;
use async_trait::async_trait;

/// A fixed, pre-trained function from text to a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder returns.
    fn dimension(&self) -> usize;

    /// Embed several texts, returning one vector per text in the same order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>>;

    /// Embed a single text. Default implementation goes through
    /// `embed_batch` with a one-element batch.
    async fn embed_one(&self, text: &str) -> Result<Vec<f64>> {
        let vectors = self.embed_batch(&[text.to_string()]).await?;
        let [vector]: [Vec<f64>; 1] = vectors.try_into().map_err(|v: Vec<Vec<f64>>| {
            anyhow::anyhow!("Embedder returned {} vectors for 1 text", v.len())
        })?;
        Ok(vector)
    }
}
