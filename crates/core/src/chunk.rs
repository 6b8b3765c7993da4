//! Chunk records produced by the chunker and stored in the vector index.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The structural kind of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstructKind {
    #[serde(rename = "function")]
    Function,
    #[serde(rename = "class")]
    Class,
    /// A fixed-size line window, used when no structural parse applies
    #[serde(rename = "chunk")]
    GenericWindow,
}

impl ConstructKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::GenericWindow => "chunk",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "function" => Some(Self::Function),
            "class" => Some(Self::Class),
            "chunk" => Some(Self::GenericWindow),
            _ => None,
        }
    }

    fn header_label(&self) -> &'static str {
        match self {
            Self::Function => "Function",
            Self::Class => "Class",
            Self::GenericWindow => "Chunk",
        }
    }
}

/// A content-addressed unit of repository text.
///
/// `id` is derived from `(file_path, content_hash)`, so re-ingesting unchanged
/// content produces the same id and the upsert replaces instead of duplicating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub file_path: String,
    pub content: String,
    /// Content plus a structural header; only ever sent to the embedder.
    pub embedding_text: String,
    pub construct_kind: ConstructKind,
    #[serde(default)]
    pub name: String,
    /// 1-based, inclusive
    pub line_start: usize,
    /// 1-based, inclusive
    pub line_end: usize,
    pub language: String,
    pub content_hash: String,
}

impl Chunk {
    /// A function or class extracted by a structural parse.
    #[allow(clippy::too_many_arguments)]
    pub fn construct(
        file_path: &str,
        content: String,
        kind: ConstructKind,
        name: &str,
        docstring: Option<&str>,
        line_start: usize,
        line_end: usize,
        language: &str,
    ) -> Self {
        let mut embedding_text = format!("File: {file_path}\n{}: {name}\n", kind.header_label());
        if let Some(doc) = docstring.filter(|d| !d.trim().is_empty()) {
            embedding_text.push_str(&format!("Docstring: {}\n", doc.trim()));
        }
        embedding_text.push_str("Code:\n");
        embedding_text.push_str(&content);

        Self::assemble(file_path, content, embedding_text, kind, name, line_start, line_end, language)
    }

    /// A fixed-size line window.
    pub fn window(
        file_path: &str,
        content: String,
        line_start: usize,
        line_end: usize,
        language: &str,
    ) -> Self {
        let embedding_text = format!("File: {file_path}\nLines {line_start}-{line_end}:\n{content}");
        Self::assemble(
            file_path,
            content,
            embedding_text,
            ConstructKind::GenericWindow,
            "",
            line_start,
            line_end,
            language,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        file_path: &str,
        content: String,
        embedding_text: String,
        construct_kind: ConstructKind,
        name: &str,
        line_start: usize,
        line_end: usize,
        language: &str,
    ) -> Self {
        let content_hash = content_hash(&content);
        Self {
            id: chunk_id(file_path, &content_hash),
            file_path: file_path.to_string(),
            content,
            embedding_text,
            construct_kind,
            name: name.to_string(),
            line_start,
            line_end,
            language: language.to_string(),
            content_hash,
        }
    }
}

/// SHA-256 hex digest of chunk content.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

pub fn chunk_id(file_path: &str, content_hash: &str) -> String {
    format!("{file_path}:{content_hash}")
}
