//! Paragraph repair after markdown.
//!
//! Markdown wraps anything that does not start an HTML block in `<p>`, which
//! puts block components inside paragraphs. These passes take them back out.

use std::ops::Range;
use std::sync::LazyLock;

use memchr::memmem;
use regex::Regex;

use crate::classifier::{TagClassifier, is_void};
use crate::tag::{TagKind, find_expression_end, find_matching_close, parse_tag};

static EMPTY_PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<p>\s*</p>\n?").unwrap());

/// A `<p>...</p>` found in the output.
struct Paragraph {
    /// Whole paragraph including both tags.
    outer: Range<usize>,
    /// Content between the tags.
    inner: Range<usize>,
}

/// Find every `<p>` paragraph, in document order.
fn paragraphs(html: &str) -> Vec<Paragraph> {
    let mut found = Vec::new();
    let mut pos = 0;
    while let Some(offset) = memmem::find(&html.as_bytes()[pos..], b"<p>") {
        let start = pos + offset;
        let content_start = start + 3;
        match find_matching_close(html, "p", content_start) {
            Some(close) => {
                found.push(Paragraph {
                    outer: start..close.end,
                    inner: content_start..close.start,
                });
                pos = close.end;
            }
            None => pos = content_start,
        }
    }
    found
}

/// Rebuild `html` with each paragraph replaced by `rewrite(content)` when it returns `Some`.
fn rewrite_paragraphs(html: &str, mut rewrite: impl FnMut(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for paragraph in paragraphs(html) {
        if let Some(replacement) = rewrite(&html[paragraph.inner]) {
            out.push_str(&html[last..paragraph.outer.start]);
            out.push_str(&replacement);
            last = paragraph.outer.end;
        }
    }
    out.push_str(&html[last..]);
    out
}

/// Length of the element starting at `content[0]`, or `None` if it is not one.
///
/// Covers the opening tag through its matching closing tag, or just the tag for
/// void and self-closing elements.
fn element_len(content: &str) -> Option<(usize, &str)> {
    let tag = parse_tag(content)?;
    match tag.kind {
        TagKind::Close => None,
        TagKind::SelfClosing => Some((tag.len, tag.name)),
        TagKind::Open if is_void(tag.name) => Some((tag.len, tag.name)),
        TagKind::Open => {
            let close = find_matching_close(content, tag.name, tag.len)?;
            Some((close.end, tag.name))
        }
    }
}

/// Remove a paragraph that wraps exactly one element that cannot be in a paragraph.
#[must_use]
pub fn unwrap_single_blocks(html: &str, classifier: &TagClassifier) -> String {
    rewrite_paragraphs(html, |content| {
        let trimmed = content.trim();
        let (len, name) = element_len(trimmed)?;
        (len == trimmed.len() && !classifier.classify(name).can_be_in_paragraph)
            .then(|| trimmed.to_owned())
    })
}

enum Piece<'a> {
    Phrasing(&'a str),
    Block(&'a str),
}

/// Split a paragraph's content at elements that cannot be in a paragraph.
fn split_content<'a>(content: &'a str, classifier: &TagClassifier) -> Option<Vec<Piece<'a>>> {
    let bytes = content.as_bytes();
    let mut pieces = Vec::new();
    let mut run_start = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b'{' => pos += find_expression_end(&bytes[pos..]).unwrap_or(1),
            b'<' => {
                let Some(tag) = parse_tag(&content[pos..]) else {
                    pos += 1;
                    continue;
                };
                let extent = match tag.kind {
                    TagKind::Close => tag.len,
                    _ => element_len(&content[pos..]).map_or(tag.len, |(len, _)| len),
                };
                if classifier.classify(tag.name).can_be_in_paragraph {
                    pos += extent;
                    continue;
                }
                pieces.push(Piece::Phrasing(&content[run_start..pos]));
                pieces.push(Piece::Block(&content[pos..pos + extent]));
                pos += extent;
                run_start = pos;
            }
            _ => pos += 1,
        }
    }

    if pieces.is_empty() {
        return None;
    }
    pieces.push(Piece::Phrasing(&content[run_start..]));
    Some(pieces)
}

/// Split paragraphs around elements that cannot be in a paragraph, once.
///
/// Phrasing runs with visible content stay wrapped in `<p>`; block elements and
/// unbalanced block tags are emitted bare.
#[must_use]
pub fn split_paragraphs(html: &str, classifier: &TagClassifier) -> String {
    rewrite_paragraphs(html, |content| {
        let pieces = split_content(content, classifier)?;
        let parts: Vec<String> = pieces
            .into_iter()
            .filter_map(|piece| match piece {
                Piece::Phrasing(text) => {
                    let text = text.trim();
                    (!text.is_empty()).then(|| format!("<p>{text}</p>"))
                }
                Piece::Block(block) => Some(block.to_owned()),
            })
            .collect();
        Some(parts.join("\n"))
    })
}

/// Remove paragraphs that hold only whitespace.
#[must_use]
pub fn remove_empty_paragraphs(html: &str) -> String {
    EMPTY_PARAGRAPH_RE.replace_all(html, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TagPolicy;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unwrap_block_component() {
        let classifier = TagClassifier::new();
        assert_eq!(
            unwrap_single_blocks("<p><Foo>text</Foo></p>\n", &classifier),
            "<Foo>text</Foo>\n"
        );
    }

    #[test]
    fn test_unwrap_keeps_phrasing() {
        let classifier = TagClassifier::new();
        let html = "<p><em>text</em></p>";
        assert_eq!(unwrap_single_blocks(html, &classifier), html);
    }

    #[test]
    fn test_unwrap_requires_single_element() {
        let classifier = TagClassifier::new();
        let html = "<p>see <Foo>x</Foo></p>";
        assert_eq!(unwrap_single_blocks(html, &classifier), html);
    }

    #[test]
    fn test_unwrap_self_closing_component() {
        let classifier = TagClassifier::new();
        assert_eq!(unwrap_single_blocks("<p><Chart /></p>", &classifier), "<Chart />");
    }

    #[test]
    fn test_unwrap_respects_registered_inline_component() {
        let classifier = TagClassifier::new().with_component("Badge", TagPolicy::PHRASING);
        let html = "<p><Badge>new</Badge></p>";
        assert_eq!(unwrap_single_blocks(html, &classifier), html);
    }

    #[test]
    fn test_split_around_block() {
        let classifier = TagClassifier::new();
        assert_eq!(
            split_paragraphs("<p>before <div>x</div> after</p>", &classifier),
            "<p>before</p>\n<div>x</div>\n<p>after</p>"
        );
    }

    #[test]
    fn test_split_at_unbalanced_tags() {
        let classifier = TagClassifier::new();
        assert_eq!(
            split_paragraphs("<p><Foo>\ntext</p>", &classifier),
            "<Foo>\n<p>text</p>"
        );
        assert_eq!(
            split_paragraphs("<p>text\n</Foo></p>", &classifier),
            "<p>text</p>\n</Foo>"
        );
    }

    #[test]
    fn test_split_leaves_phrasing_paragraphs() {
        let classifier = TagClassifier::new();
        let html = "<p>a <strong>b</strong> {x < y} c</p>";
        assert_eq!(split_paragraphs(html, &classifier), html);
    }

    #[test]
    fn test_remove_empty_paragraphs() {
        assert_eq!(remove_empty_paragraphs("<p> \n</p>\n<p>x</p>"), "<p>x</p>");
    }
}
