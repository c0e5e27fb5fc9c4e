//! Block spacing around tags, before and after markdown.
//!
//! [`Normalizer::prepare`] rewrites host text so the markdown engine sees every
//! tag the same way and gets the blank lines it needs to treat tag content as
//! paragraphs (or not). [`Normalizer::cleanup`] undoes the bookkeeping and
//! repairs the paragraphs markdown wrapped around block elements.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::LazyLock;

use memchr::memchr;
use regex::Regex;

use crate::classifier::{TagClassifier, is_void};
use crate::paragraph::{remove_empty_paragraphs, split_paragraphs, unwrap_single_blocks};
use crate::sanitize::{protect_literal_forms, sanitize};
use crate::tag::{TagKind, find_expression_end, parse_tag};
use crate::token::Escapes;

/// Suffix appended to tag names for the duration of the markdown pass.
pub const MARKER: &str = "-tsrmark";

/// Prefix of tokens that hide expressions inside tag attributes.
pub const ATTRIBUTE_ESCAPE_PREFIX: &str = "tsresc";

/// Prefix of the single-use tokens that shield literal forms from the sanitizer.
const LITERAL_ESCAPE_PREFIX: &str = "tsrlit";

/// Upper bound on paragraph-splitting passes.
const MAX_SPLIT_PASSES: usize = 4;

static MARKED_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(</?[A-Za-z][A-Za-z0-9-]*?){}([\s/>])",
        regex::escape(MARKER)
    ))
    .unwrap()
});

/// Host text ready for the markdown engine.
#[derive(Debug)]
pub struct Prepared {
    /// Rewritten text.
    pub text: String,
    /// Attribute expressions hidden by [`Normalizer::prepare`], restored by [`Normalizer::cleanup`].
    pub escapes: Escapes,
}

/// Whether the marker can be appended without the markdown engine rejecting the tag.
fn is_markable(name: &str) -> bool {
    name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

/// Normalizes whitespace around tags before markdown and repairs paragraphs after it.
#[derive(Clone, Debug, Default)]
pub struct Normalizer {
    classifier: TagClassifier,
}

impl Normalizer {
    /// Create a normalizer using `classifier` for tag policies.
    #[must_use]
    pub fn new(classifier: TagClassifier) -> Self {
        Self { classifier }
    }

    /// Tag policies in use.
    #[must_use]
    pub fn classifier(&self) -> &TagClassifier {
        &self.classifier
    }

    /// Rewrite host text before the markdown pass.
    ///
    /// 1. Brace expressions inside tag attributes are replaced by tokens.
    /// 2. Every tag name gets [`MARKER`] appended.
    /// 3. For each opening/closing pair, the whitespace after the opening tag
    ///    and before the closing tag is normalized: two or more newlines become
    ///    exactly two; a single newline disappears for inline tags and becomes
    ///    two for block tags; whitespace without newlines is left alone.
    #[must_use]
    pub fn prepare(&self, text: &str) -> Prepared {
        let (text, escapes) = escape_attribute_expressions(text);
        let edits = self.spacing_edits(&text);
        Prepared {
            text: apply_edits(&text, edits),
            escapes,
        }
    }

    /// Repair markdown output.
    ///
    /// Strips markers, unwraps and splits paragraphs around block elements,
    /// sanitizes, drops empty paragraphs and restores attribute expressions.
    #[must_use]
    pub fn cleanup(&self, html: &str, escapes: &Escapes) -> String {
        let html = strip_markers(html);
        let html = unwrap_single_blocks(&html, &self.classifier);

        let mut html = html;
        for _ in 0..MAX_SPLIT_PASSES {
            let next = split_paragraphs(&html, &self.classifier);
            if next == html {
                break;
            }
            html = next;
        }

        let (protected, literals) = protect_literal_forms(&html, LITERAL_ESCAPE_PREFIX);
        let html = literals.restore(&sanitize(&protected));

        let html = remove_empty_paragraphs(&html);
        escapes.restore(&html)
    }

    /// Marker insertions and whitespace replacements for `text`.
    fn spacing_edits(&self, text: &str) -> Vec<(Range<usize>, &'static str)> {
        let bytes = text.as_bytes();
        let mut edits = Vec::new();
        let mut open: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut pos = 0;

        while let Some(offset) = memchr(b'<', &bytes[pos..]) {
            let at = pos + offset;
            let Some(tag) = parse_tag(&text[at..]) else {
                pos = at + 1;
                continue;
            };
            pos = at + tag.len;

            if is_markable(tag.name) {
                let name_end = at + tag.name_end;
                edits.push((name_end..name_end, MARKER));
            }

            match tag.kind {
                TagKind::Open if !is_void(tag.name) => {
                    open.entry(tag.name).or_default().push(pos);
                }
                TagKind::Close => {
                    let Some(open_end) = open.get_mut(tag.name).and_then(Vec::pop) else {
                        continue;
                    };
                    let inline = self.classifier.classify(tag.name).prefers_inline;
                    let after_open = open_end..skip_whitespace(bytes, open_end);
                    let before_close = rskip_whitespace(bytes, at, open_end)..at;
                    for run in [after_open, before_close] {
                        if let Some(replacement) = spacing(&text[run.clone()], inline) {
                            edits.push((run, replacement));
                        }
                    }
                }
                _ => {}
            }
        }
        edits
    }
}

/// Replacement for a whitespace run next to a tag, or `None` to keep it.
fn spacing(run: &str, inline: bool) -> Option<&'static str> {
    match run.matches('\n').count() {
        0 => None,
        1 if inline => Some(""),
        _ => Some("\n\n"),
    }
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

fn rskip_whitespace(bytes: &[u8], mut pos: usize, floor: usize) -> usize {
    while pos > floor && bytes[pos - 1].is_ascii_whitespace() {
        pos -= 1;
    }
    pos
}

/// Apply non-overlapping edits. Edits with identical ranges keep the longest replacement.
fn apply_edits(text: &str, mut edits: Vec<(Range<usize>, &str)>) -> String {
    edits.sort_by(|(a, ra), (b, rb)| {
        (a.start, a.end)
            .cmp(&(b.start, b.end))
            .then(rb.len().cmp(&ra.len()))
    });
    edits.dedup_by(|later, earlier| later.0 == earlier.0);

    let mut out = String::with_capacity(text.len() + edits.len() * MARKER.len());
    let mut last = 0;
    for (range, replacement) in edits {
        out.push_str(&text[last..range.start]);
        out.push_str(replacement);
        last = range.end;
    }
    out.push_str(&text[last..]);
    out
}

/// Hide `{...}` expressions inside tag attributes behind tokens.
fn escape_attribute_expressions(text: &str) -> (String, Escapes) {
    let mut escapes = Escapes::new(ATTRIBUTE_ESCAPE_PREFIX);
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;

    while let Some(offset) = memchr(b'<', &bytes[pos..]) {
        let at = pos + offset;
        let tag = match parse_tag(&text[at..]) {
            Some(tag) if tag.kind != TagKind::Close => tag,
            _ => {
                out.push_str(&text[pos..=at]);
                pos = at + 1;
                continue;
            }
        };
        out.push_str(&text[pos..at + tag.name_end]);

        let end = at + tag.len;
        let mut cursor = at + tag.name_end;
        while let Some(brace) = memchr(b'{', &bytes[cursor..end]) {
            let start = cursor + brace;
            let Some(len) = find_expression_end(&bytes[start..end]) else {
                break;
            };
            out.push_str(&text[cursor..start]);
            out.push_str(&escapes.escape(&text[start..start + len], text));
            cursor = start + len;
        }
        out.push_str(&text[cursor..end]);
        pos = end;
    }
    out.push_str(&text[pos..]);
    (out, escapes)
}

/// Remove [`MARKER`] from tag names.
#[must_use]
pub fn strip_markers(html: &str) -> String {
    MARKED_TAG_RE.replace_all(html, "$1$2").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TagPolicy;
    use pretty_assertions::assert_eq;

    fn normalizer() -> Normalizer {
        Normalizer::new(TagClassifier::new())
    }

    #[test]
    fn test_marks_tag_names() {
        let prepared = normalizer().prepare("<Foo a=1>x</Foo> <br> <https://x.y>");
        assert_eq!(
            prepared.text,
            "<Foo-tsrmark a=1>x</Foo-tsrmark> <br-tsrmark> <https://x.y>"
        );
    }

    #[test]
    fn test_block_single_newline_widens() {
        let prepared = normalizer().prepare("<Foo>\ntext\n</Foo>");
        assert_eq!(prepared.text, "<Foo-tsrmark>\n\ntext\n\n</Foo-tsrmark>");
    }

    #[test]
    fn test_inline_single_newline_collapses() {
        let prepared = normalizer().prepare("<span>\n  text\n</span>");
        assert_eq!(prepared.text, "<span-tsrmark>text</span-tsrmark>");
    }

    #[test]
    fn test_many_newlines_become_two() {
        let prepared = normalizer().prepare("<span>\n\n\n\ntext\r\n\r\n\r\n</span>");
        assert_eq!(prepared.text, "<span-tsrmark>\n\ntext\n\n</span-tsrmark>");
    }

    #[test]
    fn test_crlf_counts_as_one_newline() {
        let prepared = normalizer().prepare("<span>\r\ntext</span>");
        assert_eq!(prepared.text, "<span-tsrmark>text</span-tsrmark>");
    }

    #[test]
    fn test_spaces_without_newline_unchanged() {
        let prepared = normalizer().prepare("<Foo>  text  </Foo>");
        assert_eq!(prepared.text, "<Foo-tsrmark>  text  </Foo-tsrmark>");
    }

    #[test]
    fn test_nested_pairs_use_their_own_policy() {
        let normalizer = Normalizer::new(
            TagClassifier::new().with_component("Badge", TagPolicy::PHRASING),
        );
        let prepared = normalizer.prepare("<Foo>\n<Badge>\nnew\n</Badge>\n</Foo>");
        assert_eq!(
            prepared.text,
            "<Foo-tsrmark>\n\n<Badge-tsrmark>new</Badge-tsrmark>\n\n</Foo-tsrmark>"
        );
    }

    #[test]
    fn test_empty_content_run_edited_once() {
        let prepared = normalizer().prepare("<Foo>\n</Foo>");
        assert_eq!(prepared.text, "<Foo-tsrmark>\n\n</Foo-tsrmark>");
    }

    #[test]
    fn test_attribute_expressions_escaped_and_restored() {
        let n = normalizer();
        let source = r#"<Foo title="a {b}" on:click={() => go({x: 1})}>x</Foo>"#;
        let prepared = n.prepare(source);

        assert!(!prepared.text.contains('{'));
        assert_eq!(prepared.escapes.len(), 2);

        let html = n.cleanup(&prepared.text, &prepared.escapes);
        assert_eq!(html, source);
    }

    #[test]
    fn test_cleanup_block_component_not_in_paragraph() {
        let n = normalizer();
        let html = n.cleanup(
            "<p><Foo-tsrmark>text</Foo-tsrmark></p>\n",
            &Escapes::new(ATTRIBUTE_ESCAPE_PREFIX),
        );
        assert_eq!(html, "<Foo>text</Foo>\n");
    }

    #[test]
    fn test_cleanup_keeps_self_closing_and_empty_attributes() {
        let n = normalizer();
        let html = n.cleanup(
            "<p>See <Icon-tsrmark name=\"\" /> here</p>\n",
            &Escapes::new(ATTRIBUTE_ESCAPE_PREFIX),
        );
        assert_eq!(html, "<p>See</p>\n<Icon name=\"\" />\n<p>here</p>\n");
    }

    #[test]
    fn test_strip_markers_only_in_tags() {
        assert_eq!(
            strip_markers("<a-tsrmark href=x>a-tsrmark</a-tsrmark><br-tsrmark/>"),
            "<a href=x>a-tsrmark</a><br/>"
        );
    }
}
