// Trendspotter: trend analysis and idea validation over talk transcripts.
//
// This is the library root. Text flows through the modules in order:
// text (clean + chunk) -> corpus (talks and chunks) -> index (embed + store)
// -> analysis (trends and idea validation).

pub mod analysis;
pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod output;
pub mod status;
pub mod store;
pub mod text;

pub use error::{CoreError, CoreResult};
