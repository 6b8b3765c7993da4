//! Structural pass for Python via tree-sitter.

use repolens_core::ConstructKind;
use tree_sitter::{Node, Parser};

/// A top-level function or class.
#[derive(Debug, Clone)]
pub(crate) struct Construct {
    pub kind: ConstructKind,
    pub name: String,
    pub docstring: Option<String>,
    pub text: String,
    /// 1-based, inclusive
    pub line_start: usize,
    pub line_end: usize,
}

/// Extract top-level constructs, or a reason the file could not be parsed.
pub(crate) fn extract_constructs(source: &str) -> Result<Vec<Construct>, String> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| format!("failed to load python grammar: {e}"))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| "parser returned no tree".to_string())?;
    let root = tree.root_node();
    if root.has_error() {
        return Err("source contains syntax errors".into());
    }

    let bytes = source.as_bytes();
    let mut constructs = Vec::new();
    let mut cursor = root.walk();
    for node in root.named_children(&mut cursor) {
        let definition = match node.kind() {
            "function_definition" | "class_definition" => node,
            "decorated_definition" => match node.child_by_field_name("definition") {
                Some(def) => def,
                None => continue,
            },
            _ => continue,
        };
        let kind = if definition.kind() == "class_definition" {
            ConstructKind::Class
        } else {
            ConstructKind::Function
        };
        let name = definition
            .child_by_field_name("name")
            .and_then(|n| n.utf8_text(bytes).ok())
            .unwrap_or_default()
            .to_string();
        let docstring =
            body_docstring(definition, bytes).or_else(|| leading_comments(node, bytes));

        constructs.push(Construct {
            kind,
            name,
            docstring,
            text: source[node.start_byte()..node.end_byte()].to_string(),
            line_start: node.start_position().row + 1,
            line_end: node.end_position().row + 1,
        });
    }
    Ok(constructs)
}

/// The string literal opening a function or class body.
fn body_docstring(definition: Node, bytes: &[u8]) -> Option<String> {
    let body = definition.child_by_field_name("body")?;
    let mut cursor = body.walk();
    let first = body
        .named_children(&mut cursor)
        .find(|c| c.kind() != "comment")?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let literal = first.named_child(0).filter(|n| n.kind() == "string")?;
    let raw = literal.utf8_text(bytes).ok()?;
    let text = strip_string_literal(raw);
    (!text.is_empty()).then_some(text)
}

/// `#` comment lines directly above a definition, with no blank line between.
fn leading_comments(node: Node, bytes: &[u8]) -> Option<String> {
    let mut lines = Vec::new();
    let mut expected_row = node.start_position().row;
    let mut prev = node.prev_named_sibling();
    while let Some(sibling) = prev {
        if sibling.kind() != "comment" || sibling.end_position().row + 1 != expected_row {
            break;
        }
        if let Ok(text) = sibling.utf8_text(bytes) {
            lines.push(text.trim_start_matches('#').trim().to_string());
        }
        expected_row = sibling.start_position().row;
        prev = sibling.prev_named_sibling();
    }
    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    Some(lines.join("\n"))
}

fn strip_string_literal(raw: &str) -> String {
    let unprefixed = raw.trim_start_matches(|c: char| "rRbBuUfF".contains(c));
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if let Some(inner) = unprefixed
            .strip_prefix(quote)
            .and_then(|s| s.strip_suffix(quote))
        {
            return inner.trim().to_string();
        }
    }
    unprefixed.trim().to_string()
}
