//! Repository ingestion for RepoLens.
//!
//! - [`FsSource`] walks a directory tree, applying ignore patterns, the
//!   extension allow-list and the size cap.
//! - [`Chunker`] turns each file into content-addressed [`Chunk`]s: top-level
//!   Python functions and classes via tree-sitter, fixed-size overlapping line
//!   windows for everything else.
//!
//! The output is a lazy iterator of `Result<Chunk, IngestError>`; a bad file
//! produces an error record and the walk continues.
//!
//! [`Chunk`]: repolens_core::Chunk

pub mod chunker;
pub mod language;
mod python;
pub mod source;
pub mod window;

pub use chunker::{ChunkStream, Chunker};
pub use source::{FsSource, IgnoreMatcher, SourceFile};
