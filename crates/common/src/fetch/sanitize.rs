//! HTML to plain text

use regex_lite::Regex;
use scraper::{Html, Node};
use std::sync::OnceLock;

/// Elements whose text never reaches the extractor
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

fn whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// Strip markup from an HTML document and return its visible text on one line.
///
/// Text nodes are joined with a single space; newlines, tabs and runs of
/// spaces collapse to one space.
pub fn sanitize_html(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut raw = String::with_capacity(html.len() / 2);
    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }

        raw.push_str(text);
        raw.push(' ');
    }

    collapse_whitespace(&raw)
}

/// Collapse every whitespace run to one space and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    whitespace_run().replace_all(text.trim(), " ").into_owned()
}

/// Longest prefix of `text` holding at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_script_and_style() {
        let html = r#"<html><head><title>Paris</title>
            <style>body { color: red; }</style>
            <script>var tracking = 1;</script></head>
            <body><h1>Paris</h1><p>Paris is the
            capital	of France.</p><noscript>enable js</noscript></body></html>"#;

        let text = sanitize_html(html);
        assert_eq!(text, "Paris Paris Paris is the capital of France.");
        assert!(!text.contains("tracking"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn test_adjacent_elements_are_separated() {
        let text = sanitize_html("<ul><li>one</li><li>two</li></ul>");
        assert_eq!(text, "one two");
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(sanitize_html("<html><body>  \n </body></html>"), "");
    }

    #[test]
    fn test_entities_are_decoded() {
        assert_eq!(sanitize_html("<p>Fish &amp; chips</p>"), "Fish & chips");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
