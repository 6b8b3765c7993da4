//! Language detection from file extensions.

use std::path::Path;

/// Language label used when a file has no extension.
pub const UNKNOWN_LANGUAGE: &str = "text";

/// The language of a path: its lowercase extension without the dot.
pub fn language_for(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string())
}

/// Languages with a grammar-aware pass. Everything else is windowed.
pub fn has_structural_parser(language: &str) -> bool {
    language == "py"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_is_lowercase_extension() {
        assert_eq!(language_for("src/App.TSX"), "tsx");
        assert_eq!(language_for("pkg/main.go"), "go");
        assert_eq!(language_for("Makefile"), UNKNOWN_LANGUAGE);
    }

    #[test]
    fn only_python_is_structural() {
        assert!(has_structural_parser("py"));
        assert!(!has_structural_parser("rs"));
    }
}
