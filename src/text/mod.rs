// Text processing: transcript cleanup, topic keywords, and chunking.

pub mod chunker;
pub mod normalizer;
