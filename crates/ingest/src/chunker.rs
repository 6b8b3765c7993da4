//! The chunker: files in, content-addressed chunks out.

use crate::language::{has_structural_parser, language_for};
use crate::python;
use crate::source::{FsSource, IgnoreMatcher, SourceFile};
use crate::window::window_chunks;
use repolens_config::IngestConfig;
use repolens_core::Chunk;
use repolens_core::error::IngestError;
use std::collections::VecDeque;
use std::path::Path;
use tracing::{debug, warn};

/// Chunks of one file, plus the parse failure that forced windowing, if any.
#[derive(Debug, Default)]
pub struct FileChunks {
    pub chunks: Vec<Chunk>,
    pub parse_error: Option<IngestError>,
}

/// Stateless across calls: every [`Chunker::ingest_repository`] starts a
/// fresh walk.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: IngestConfig,
}

impl Chunker {
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Walk `root` and lazily chunk every eligible file.
    ///
    /// `ignore_patterns` replaces the configured patterns when given. Only an
    /// invalid pattern fails up front; per-file problems become error records
    /// in the returned stream.
    pub fn ingest_repository(
        &self,
        root: &Path,
        ignore_patterns: Option<&[String]>,
    ) -> Result<ChunkStream<FsSource>, IngestError> {
        let patterns = ignore_patterns.unwrap_or(&self.config.ignore_patterns);
        let ignore = IgnoreMatcher::new(patterns)?;
        let source = FsSource::new(
            root,
            ignore,
            &self.config.extensions,
            self.config.max_file_size,
        );
        Ok(self.chunks(source))
    }

    /// Chunk any source of files.
    pub fn chunks<S>(&self, source: S) -> ChunkStream<S>
    where
        S: Iterator<Item = Result<SourceFile, IngestError>>,
    {
        ChunkStream {
            source,
            chunker: self.clone(),
            pending: VecDeque::new(),
        }
    }

    /// Chunk one file's text.
    pub fn chunk_file(&self, file_path: &str, content: &str) -> FileChunks {
        let language = language_for(file_path);
        if !has_structural_parser(&language) {
            return FileChunks {
                chunks: self.windows(file_path, content, &language),
                parse_error: None,
            };
        }

        match python::extract_constructs(content) {
            Ok(constructs) if !constructs.is_empty() => FileChunks {
                chunks: constructs
                    .into_iter()
                    .flat_map(|c| self.construct_chunks(file_path, &language, c))
                    .collect(),
                parse_error: None,
            },
            Ok(_) => {
                debug!(file = %file_path, "No top-level constructs, windowing file");
                FileChunks {
                    chunks: self.windows(file_path, content, &language),
                    parse_error: None,
                }
            }
            Err(reason) => {
                warn!(file = %file_path, %reason, "Structural parse failed, windowing file");
                FileChunks {
                    chunks: self.windows(file_path, content, &language),
                    parse_error: Some(IngestError::Parse {
                        file_path: file_path.to_string(),
                        reason,
                    }),
                }
            }
        }
    }

    fn windows(&self, file_path: &str, content: &str, language: &str) -> Vec<Chunk> {
        window_chunks(
            file_path,
            content,
            language,
            self.config.window_lines,
            self.config.window_overlap,
            0,
        )
    }

    fn construct_chunks(
        &self,
        file_path: &str,
        language: &str,
        construct: python::Construct,
    ) -> Vec<Chunk> {
        if construct.text.chars().count() > self.config.max_construct_chars {
            debug!(
                file = %file_path,
                name = %construct.name,
                "Construct exceeds size threshold, sub-chunking"
            );
            return window_chunks(
                file_path,
                &construct.text,
                language,
                self.config.construct_window_lines,
                self.config.window_overlap,
                construct.line_start - 1,
            );
        }

        vec![Chunk::construct(
            file_path,
            construct.text,
            construct.kind,
            &construct.name,
            construct.docstring.as_deref(),
            construct.line_start,
            construct.line_end,
            language,
        )]
    }
}

/// Lazy sequence of chunks and per-file error records.
///
/// Dropping it mid-walk is fine; resuming means calling
/// [`Chunker::ingest_repository`] again.
pub struct ChunkStream<S> {
    source: S,
    chunker: Chunker,
    pending: VecDeque<Result<Chunk, IngestError>>,
}

impl<S> Iterator for ChunkStream<S>
where
    S: Iterator<Item = Result<SourceFile, IngestError>>,
{
    type Item = Result<Chunk, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            let file = match self.source.next()? {
                Ok(file) => file,
                Err(e) => return Some(Err(e)),
            };
            let text = String::from_utf8_lossy(&file.content);
            let FileChunks {
                chunks,
                parse_error,
            } = self.chunker.chunk_file(&file.path, &text);
            if let Some(err) = parse_error {
                self.pending.push_back(Err(err));
            }
            self.pending.extend(chunks.into_iter().map(Ok));
        }
    }
}
