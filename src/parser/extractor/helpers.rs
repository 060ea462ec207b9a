//
//  helpers.rs
//  typegraph
//

use tree_sitter::Node;

/// Get the full text of a node.
pub fn node_text<'s>(node: &Node, source: &'s [u8]) -> &'s str {
    node.utf8_text(source).unwrap_or("")
}

/// Comment lines with `//`, `/*`, `*/` and leading `*` markers stripped.
pub fn comment_lines(text: &str) -> Vec<String> {
    if let Some(line) = text.strip_prefix("//") {
        return vec![line.trim().to_string()];
    }
    let body = text
        .strip_prefix("/*")
        .and_then(|t| t.strip_suffix("*/"))
        .unwrap_or(text);
    body.lines()
        .map(|line| {
            let line = line.trim();
            line.strip_prefix('*').unwrap_or(line).trim().to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// Contents of a Go string literal (raw or interpreted), quotes removed.
pub fn unquote(text: &str) -> &str {
    let text = text.trim();
    text.strip_prefix('`')
        .and_then(|t| t.strip_suffix('`'))
        .or_else(|| text.strip_prefix('"').and_then(|t| t.strip_suffix('"')))
        .unwrap_or(text)
}

/// `// Code generated <tool>; DO NOT EDIT.`
pub fn is_generated_marker(line: &str) -> bool {
    line.starts_with("// Code generated ") && line.ends_with(" DO NOT EDIT.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_lines() {
        assert_eq!(comment_lines("//typegraph:ignore"), vec!["typegraph:ignore"]);
        assert_eq!(comment_lines("// User is a user."), vec!["User is a user."]);
        assert_eq!(
            comment_lines("/*\n * first\n * second\n */"),
            vec!["first", "second"]
        );
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"net/http\""), "net/http");
        assert_eq!(unquote("`json:\"id\"`"), "json:\"id\"");
    }

    #[test]
    fn test_generated_marker() {
        assert!(is_generated_marker("// Code generated by stringer; DO NOT EDIT."));
        assert!(!is_generated_marker("// Code generated by hand."));
    }
}
