// Sentence embeddings: the text-to-vector function behind the index.
//
// The Embedder trait is the seam. SentenceEmbedder runs all-MiniLM-L6-v2
// locally through ONNX Runtime; tests plug in deterministic stubs.

pub mod download;
pub mod onnx;
pub mod traits;

pub use onnx::{cosine_similarity, SentenceEmbedder, EMBEDDING_DIM};
pub use traits::Embedder;
