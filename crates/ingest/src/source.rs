//! Filesystem source: the repository walk.

use globset::{Glob, GlobSet, GlobSetBuilder};
use repolens_core::error::IngestError;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// One eligible file from the walk.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the walk root, `/`-separated
    pub path: String,
    /// Lowercase extension without the dot
    pub extension: String,
    pub content: Vec<u8>,
}

/// Matches ignore patterns against every component of a relative path.
///
/// Plain names (`node_modules`, `.git`) match a component exactly; patterns
/// with glob metacharacters (`*.min.js`) are compiled with `globset`.
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    names: HashSet<String>,
    globs: GlobSet,
}

impl IgnoreMatcher {
    pub fn new(patterns: &[String]) -> Result<Self, IngestError> {
        let mut names = HashSet::new();
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            if pattern.contains(['*', '?', '[', '{']) {
                let glob = Glob::new(pattern).map_err(|e| IngestError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
                builder.add(glob);
            } else {
                names.insert(pattern.trim_matches('/').to_string());
            }
        }
        let globs = builder.build().map_err(|e| IngestError::InvalidPattern {
            pattern: patterns.join(","),
            reason: e.to_string(),
        })?;
        Ok(Self { names, globs })
    }

    pub fn is_ignored(&self, relative: &Path) -> bool {
        if self.globs.is_match(relative) {
            return true;
        }
        relative.components().any(|c| match c {
            Component::Normal(part) => {
                let part = part.to_string_lossy();
                self.names.contains(part.as_ref()) || self.globs.is_match(part.as_ref())
            }
            _ => false,
        })
    }
}

type Walk = Box<dyn Iterator<Item = walkdir::Result<DirEntry>> + Send>;

/// Lazy walk of a repository, yielding eligible files or per-entry errors.
///
/// Ignored directories are pruned without being descended into. Entries are
/// visited in file-name order so two walks of the same tree agree.
pub struct FsSource {
    root: PathBuf,
    walk: Walk,
    extensions: HashSet<String>,
    max_file_size: u64,
}

impl FsSource {
    pub fn new(
        root: &Path,
        ignore: IgnoreMatcher,
        extensions: &[String],
        max_file_size: u64,
    ) -> Self {
        let ignore = Arc::new(ignore);
        let prune_root = root.to_path_buf();
        let walk = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                entry.depth() == 0
                    || entry
                        .path()
                        .strip_prefix(&prune_root)
                        .map(|rel| !ignore.is_ignored(rel))
                        .unwrap_or(true)
            });

        Self {
            root: root.to_path_buf(),
            walk: Box::new(walk),
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            max_file_size,
        }
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    fn load(&self, entry: &DirEntry) -> Option<Result<SourceFile, IngestError>> {
        let path = self.relative(entry.path());
        let extension = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())?;
        if !self.extensions.contains(&extension) {
            return None;
        }

        match entry.metadata() {
            Ok(meta) if meta.len() > self.max_file_size => {
                debug!(file = %path, size = meta.len(), "Skipping oversized file");
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                return Some(Err(IngestError::Read {
                    file_path: path,
                    reason: e.to_string(),
                }));
            }
        }

        Some(
            std::fs::read(entry.path())
                .map(|content| SourceFile {
                    path: path.clone(),
                    extension,
                    content,
                })
                .map_err(|e| IngestError::Read {
                    file_path: path,
                    reason: e.to_string(),
                }),
        )
    }
}

impl Iterator for FsSource {
    type Item = Result<SourceFile, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walk.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let file_path = e
                        .path()
                        .map(|p| self.relative(p))
                        .unwrap_or_else(|| self.root.display().to_string());
                    return Some(Err(IngestError::Walk {
                        file_path,
                        reason: e.to_string(),
                    }));
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(item) = self.load(&entry) {
                return Some(item);
            }
        }
    }
}
