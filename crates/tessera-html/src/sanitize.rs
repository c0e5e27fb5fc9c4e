//! Conservative HTML repair.
//!
//! The sanitizer walks the markup once, keeping a stack of open elements. It
//! drops closing tags that close nothing, closes paragraphs left open, and
//! writes every kept tag in a canonical form. Everything it does not recognize
//! as a tag is copied unchanged, as are comments, brace expressions in text and
//! the content of raw-text elements.

use memchr::{memchr, memchr2};

use crate::classifier::is_void;
use crate::tag::{Tag, TagKind, find_expression_end, parse_tag};
use crate::token::Escapes;

/// Elements whose content is text, not markup.
const RAW_TEXT_TAGS: &[&str] = &["script", "style", "textarea", "title"];

fn is_raw_text(name: &str) -> bool {
    RAW_TEXT_TAGS.iter().any(|t| t.eq_ignore_ascii_case(name))
}

fn is_paragraph(name: &str) -> bool {
    name.eq_ignore_ascii_case("p")
}

/// Repair tag balance and serialize tags canonically.
///
/// Attributes are written separated by single spaces with their original
/// quote characters. Unquoted values stay unquoted, empty values become bare
/// attributes, and the `/` of self-closing tags is dropped. Callers that need
/// `<Foo />` or `a=""` to survive should hide them first with
/// [`protect_literal_forms`].
#[must_use]
pub fn sanitize(html: &str) -> String {
    let bytes = html.as_bytes();
    let mut out = String::with_capacity(html.len());
    let mut stack: Vec<&str> = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let Some(offset) = memchr2(b'<', b'{', &bytes[pos..]) else {
            out.push_str(&html[pos..]);
            break;
        };
        let at = pos + offset;
        out.push_str(&html[pos..at]);
        let rest = &html[at..];

        if bytes[at] == b'{' {
            let end = find_expression_end(&bytes[at..]).unwrap_or(1);
            out.push_str(&rest[..end]);
            pos = at + end;
            continue;
        }

        if let Some(len) = markup_declaration_len(rest) {
            out.push_str(&rest[..len]);
            pos = at + len;
            continue;
        }

        let Some(tag) = parse_tag(rest) else {
            out.push('<');
            pos = at + 1;
            continue;
        };
        pos = at + tag.len;

        match tag.kind {
            TagKind::Close => {
                if let Some(index) = stack.iter().rposition(|open| *open == tag.name) {
                    for open in stack.drain(index + 1..).rev() {
                        if is_paragraph(open) {
                            out.push_str("</p>");
                        }
                    }
                    stack.pop();
                    out.push_str("</");
                    out.push_str(tag.name);
                    out.push('>');
                } else {
                    tracing::debug!(tag = tag.name, "Dropping stray closing tag");
                }
            }
            TagKind::Open | TagKind::SelfClosing => {
                if is_paragraph(tag.name) && stack.last().is_some_and(|open| is_paragraph(open)) {
                    out.push_str("</p>");
                    stack.pop();
                }
                write_open_tag(&mut out, &tag);
                if is_raw_text(tag.name) {
                    let end = raw_text_end(html, pos, tag.name);
                    out.push_str(&html[pos..end]);
                    pos = end;
                } else if !is_void(tag.name) {
                    stack.push(tag.name);
                }
            }
        }
    }

    for open in stack.iter().rev() {
        if is_paragraph(open) {
            out.push_str("</p>");
        }
    }
    out
}

fn write_open_tag(out: &mut String, tag: &Tag<'_>) {
    out.push('<');
    out.push_str(tag.name);
    for attr in &tag.attributes {
        out.push(' ');
        out.push_str(attr.name);
        let Some(value) = attr.value else {
            continue;
        };
        if value.text.is_empty() {
            continue;
        }
        out.push('=');
        match value.quote {
            Some(quote) => {
                out.push(quote);
                out.push_str(value.text);
                out.push(quote);
            }
            None => out.push_str(value.text),
        }
    }
    out.push('>');
}

/// Length of a comment, doctype or processing instruction at the start of `rest`.
fn markup_declaration_len(rest: &str) -> Option<usize> {
    if let Some(body) = rest.strip_prefix("<!--") {
        let end = body.find("-->").map_or(rest.len(), |i| 4 + i + 3);
        return Some(end);
    }
    if rest.starts_with("<!") || rest.starts_with("<?") {
        let end = memchr(b'>', rest.as_bytes()).map_or(rest.len(), |i| i + 1);
        return Some(end);
    }
    None
}

/// Offset just past the closing tag of a raw-text element whose content starts at `from`.
fn raw_text_end(html: &str, from: usize, name: &str) -> usize {
    let bytes = html.as_bytes();
    let mut pos = from;
    while let Some(offset) = memchr(b'<', &bytes[pos..]) {
        let at = pos + offset;
        if let Some(tag) = parse_tag(&html[at..])
            && tag.kind == TagKind::Close
            && tag.name.eq_ignore_ascii_case(name)
        {
            return at + tag.len;
        }
        pos = at + 1;
    }
    html.len()
}

/// Hide self-closing tags and empty-valued attributes behind single-use tokens.
///
/// [`sanitize`] would otherwise rewrite `<Foo />` as `<Foo>` and `a=""` as `a`,
/// both of which change meaning in a template. Restore with [`Escapes::restore`].
#[must_use]
pub fn protect_literal_forms(html: &str, prefix: &str) -> (String, Escapes) {
    let mut escapes = Escapes::new(prefix);
    let bytes = html.as_bytes();
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;

    while let Some(offset) = memchr(b'<', &bytes[pos..]) {
        let at = pos + offset;
        out.push_str(&html[pos..at]);
        let rest = &html[at..];

        if let Some(len) = markup_declaration_len(rest) {
            out.push_str(&rest[..len]);
            pos = at + len;
            continue;
        }
        let Some(tag) = parse_tag(rest) else {
            out.push('<');
            pos = at + 1;
            continue;
        };
        let text = &rest[..tag.len];
        pos = at + tag.len;

        match tag.kind {
            TagKind::SelfClosing => {
                let token = escapes.escape(text, html);
                out.push_str(&token);
            }
            TagKind::Open => {
                let mut last = 0;
                for attr in &tag.attributes {
                    if attr.value.is_some_and(|v| v.text.is_empty() && v.quote.is_some()) {
                        let token = escapes.escape(&text[attr.range.clone()], html);
                        out.push_str(&text[last..attr.range.start]);
                        out.push_str(&token);
                        last = attr.range.end;
                    }
                }
                out.push_str(&text[last..]);
                if is_raw_text(tag.name) {
                    let end = raw_text_end(html, pos, tag.name);
                    out.push_str(&html[pos..end]);
                    pos = end;
                }
            }
            TagKind::Close => out.push_str(text),
        }
    }
    out.push_str(&html[pos..]);
    (out, escapes)
}
