//! Path sandboxing: every file the executor touches must resolve inside the
//! repository root.

use repolens_core::error::ToolError;
use std::path::{Component, Path, PathBuf};

/// Resolve `requested` against `root`.
///
/// Relative paths are joined to the root. Absolute paths are accepted only
/// when they already sit under the root. Any `..` component is rejected
/// outright, before touching the filesystem. When the target (or its parent)
/// exists, the canonical form is checked too so symlinks cannot escape.
pub fn resolve_within(root: &Path, requested: &str) -> Result<PathBuf, ToolError> {
    let trimmed = requested.trim();
    if trimmed.is_empty() || trimmed == "unknown" {
        return Err(ToolError::InvalidArguments(format!(
            "no usable file path in '{requested}'"
        )));
    }

    let normalized = trimmed.replace('\\', "/");
    let candidate = Path::new(&normalized);
    if candidate
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(ToolError::SandboxViolation(format!(
            "path traversal in '{requested}'"
        )));
    }

    let root = root
        .canonicalize()
        .map_err(|e| ToolError::SandboxViolation(format!("repository root unavailable: {e}")))?;

    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };
    if !joined.starts_with(&root) {
        return Err(ToolError::SandboxViolation(format!(
            "'{requested}' is outside the repository"
        )));
    }

    if let Some(existing) = nearest_existing(&joined) {
        let canonical = existing.canonicalize().map_err(|e| {
            ToolError::SandboxViolation(format!("cannot resolve '{requested}': {e}"))
        })?;
        if !canonical.starts_with(&root) {
            return Err(ToolError::SandboxViolation(format!(
                "'{requested}' resolves outside the repository"
            )));
        }
    }

    Ok(joined)
}

fn nearest_existing(path: &Path) -> Option<&Path> {
    path.ancestors().find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_join_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_within(dir.path(), "src/auth.py").unwrap();
        assert!(resolved.ends_with("src/auth.py"));
        assert!(resolved.starts_with(dir.path().canonicalize().unwrap()));
    }

    #[test]
    fn traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for bad in ["../etc/passwd", "src/../../x", "..\\windows\\system32"] {
            let err = resolve_within(dir.path(), bad).unwrap_err();
            assert!(matches!(err, ToolError::SandboxViolation(_)), "{bad}");
        }
    }

    #[test]
    fn absolute_paths_outside_root_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_within(dir.path(), "/etc/shadow").unwrap_err();
        assert!(matches!(err, ToolError::SandboxViolation(_)));
    }

    #[test]
    fn absolute_paths_inside_root_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let inside = root.join("a.py");
        assert_eq!(
            resolve_within(dir.path(), inside.to_str().unwrap()).unwrap(),
            inside
        );
    }

    #[test]
    fn placeholder_target_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            resolve_within(dir.path(), "unknown"),
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        let err = resolve_within(dir.path(), "link/file.txt").unwrap_err();
        assert!(matches!(err, ToolError::SandboxViolation(_)));
    }
}
