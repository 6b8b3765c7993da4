//! Vector index, hybrid ranking and ingestion for RepoLens.
//!
//! Storage backends implement [`VectorStore`]; [`VectorIndex`] adds batched
//! embedding on top. [`HybridRanker`] reads the index for queries and
//! [`IngestionPipeline`] feeds it from the chunker.

pub mod in_memory;
pub mod index;
pub mod pipeline;
pub mod ranker;
pub mod rerank;
pub mod store;
pub mod vector;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(test)]
pub(crate) mod test_support;

pub use in_memory::InMemoryStore;
pub use index::VectorIndex;
pub use pipeline::{IngestReport, IngestionPipeline, OrphanPolicy};
pub use ranker::{HybridRanker, locality_boost};
pub use rerank::LlmReranker;
pub use store::{EmbeddedChunk, VectorStore};
pub use vector::cosine_similarity;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
