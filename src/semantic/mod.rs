//! Semantic search over the course catalog.
//!
//! # Architecture
//!
//! - `embeddings`: `TextEncoder` trait and the fastembed-backed model
//! - `index`: embedding matrix aligned with the corpus, cosine ranking

pub mod embeddings;
mod index;

pub use embeddings::{EmbeddingError, EmbeddingModel, TextEncoder};
pub use index::{IndexError, SearchError, SearchIndex};

#[cfg(test)]
pub use index::{search, EmbeddingMatrix};
