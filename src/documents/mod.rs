//! Semantic document index
//!
//! Embeds free-text CSV columns and answers nearest-neighbour queries.
//! Independent of the SQL pipeline.

pub mod embedder;
pub mod ingest;
pub mod vector_store;

pub use embedder::{Embedder, Embedding, OpenAiEmbedder};
pub use ingest::{DocumentIndex, BATCH_SIZE, DEFAULT_INGEST_LIMIT, DEFAULT_SEARCH_RESULTS};
pub use vector_store::{Document, SearchResult, VectorStore};
