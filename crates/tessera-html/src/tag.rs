//! Byte-level tag and expression scanning.
//!
//! These scanners never build a DOM. They recognize one construct at the start
//! of a slice and report where it ends, so callers can walk a document left to
//! right and copy everything they do not understand.

use std::ops::Range;

/// Deepest brace nesting accepted inside an expression.
pub const MAX_EXPRESSION_DEPTH: u32 = 12;

/// Opening, closing or self-closing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagKind {
    /// `<name ...>`
    Open,
    /// `</name>`
    Close,
    /// `<name ... />`
    SelfClosing,
}

/// Attribute value as written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttrValue<'a> {
    /// Value text without its quotes. Expression values keep their braces.
    pub text: &'a str,
    /// Quote character, if the value was quoted.
    pub quote: Option<char>,
}

/// One attribute of an opening tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute<'a> {
    /// Attribute name. For `{expr}` shorthand and spread attributes this is the whole expression.
    pub name: &'a str,
    /// Value, if the attribute has `=`.
    pub value: Option<AttrValue<'a>>,
    /// Byte range of the whole attribute within the tag.
    pub range: Range<usize>,
}

/// A tag recognized at the start of a slice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag<'a> {
    /// Tag name as written.
    pub name: &'a str,
    /// Tag kind.
    pub kind: TagKind,
    /// Byte offset just past the name.
    pub name_end: usize,
    /// Attributes in source order (always empty for closing tags).
    pub attributes: Vec<Attribute<'a>>,
    /// Byte length of the tag including `<` and `>`.
    pub len: usize,
}

impl Tag<'_> {
    /// Value of the first attribute named `name`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute<'_>> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':')
}

fn is_attr_name_byte(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'=' | b'>' | b'/' | b'"' | b'\'' | b'<' | b'{')
}

/// Parse a tag at the start of `input`.
///
/// Returns `None` when `input` does not start with a well-formed tag: a name
/// must start with an ASCII letter and be followed by whitespace, `/` or `>`,
/// so autolinks such as `<https://example.com>` and comparisons such as `a < b`
/// are rejected.
#[must_use]
pub fn parse_tag(input: &str) -> Option<Tag<'_>> {
    let bytes = input.as_bytes();
    let len = bytes.len();
    if len < 3 || bytes[0] != b'<' {
        return None;
    }

    let mut pos = 1;
    let closing = bytes[pos] == b'/';
    if closing {
        pos += 1;
    }

    if pos >= len || !bytes[pos].is_ascii_alphabetic() {
        return None;
    }
    let name_start = pos;
    while pos < len && is_name_byte(bytes[pos]) {
        pos += 1;
    }
    let name_end = pos;
    if pos >= len || !(bytes[pos].is_ascii_whitespace() || matches!(bytes[pos], b'/' | b'>')) {
        return None;
    }
    let name = &input[name_start..name_end];

    if closing {
        pos = skip_whitespace(bytes, pos);
        return (pos < len && bytes[pos] == b'>').then(|| Tag {
            name,
            kind: TagKind::Close,
            name_end,
            attributes: Vec::new(),
            len: pos + 1,
        });
    }

    let mut attributes = Vec::new();
    loop {
        pos = skip_whitespace(bytes, pos);
        if pos >= len {
            return None;
        }
        match bytes[pos] {
            b'>' => {
                return Some(Tag {
                    name,
                    kind: TagKind::Open,
                    name_end,
                    attributes,
                    len: pos + 1,
                });
            }
            b'/' if bytes.get(pos + 1) == Some(&b'>') => {
                return Some(Tag {
                    name,
                    kind: TagKind::SelfClosing,
                    name_end,
                    attributes,
                    len: pos + 2,
                });
            }
            b'{' => {
                let end = pos + find_expression_end(&bytes[pos..])?;
                attributes.push(Attribute {
                    name: &input[pos..end],
                    value: None,
                    range: pos..end,
                });
                pos = end;
            }
            b if is_attr_name_byte(b) => {
                let start = pos;
                while pos < len && is_attr_name_byte(bytes[pos]) {
                    pos += 1;
                }
                let attr_name = &input[start..pos];
                let after_name = skip_whitespace(bytes, pos);
                if bytes.get(after_name) != Some(&b'=') {
                    attributes.push(Attribute {
                        name: attr_name,
                        value: None,
                        range: start..pos,
                    });
                    continue;
                }
                pos = skip_whitespace(bytes, after_name + 1);
                if pos >= len {
                    return None;
                }
                let value = match bytes[pos] {
                    quote @ (b'"' | b'\'') => {
                        let close = pos + 1 + memchr::memchr(quote, &bytes[pos + 1..])?;
                        let text = &input[pos + 1..close];
                        pos = close + 1;
                        AttrValue {
                            text,
                            quote: Some(char::from(quote)),
                        }
                    }
                    b'{' => {
                        let end = pos + find_expression_end(&bytes[pos..])?;
                        let text = &input[pos..end];
                        pos = end;
                        AttrValue { text, quote: None }
                    }
                    _ => {
                        let value_start = pos;
                        while pos < len
                            && !bytes[pos].is_ascii_whitespace()
                            && bytes[pos] != b'>'
                            && !(bytes[pos] == b'/' && bytes.get(pos + 1) == Some(&b'>'))
                        {
                            pos += 1;
                        }
                        AttrValue {
                            text: &input[value_start..pos],
                            quote: None,
                        }
                    }
                };
                attributes.push(Attribute {
                    name: attr_name,
                    value: Some(value),
                    range: start..pos,
                });
            }
            _ => return None,
        }
    }
}

/// Find the end of a brace expression starting at `{`.
///
/// Returns the offset just past the matching `}`, or `None` when the
/// expression is unterminated or nests deeper than [`MAX_EXPRESSION_DEPTH`].
/// Braces inside single, double and backtick quotes do not count.
#[must_use]
pub fn find_expression_end(bytes: &[u8]) -> Option<usize> {
    if bytes.first() != Some(&b'{') {
        return None;
    }
    let len = bytes.len();
    let mut depth: u32 = 1;
    let mut pos = 1;

    while pos < len {
        match bytes[pos] {
            b'{' => {
                depth += 1;
                if depth > MAX_EXPRESSION_DEPTH {
                    return None;
                }
                pos += 1;
            }
            b'}' => {
                depth -= 1;
                pos += 1;
                if depth == 0 {
                    return Some(pos);
                }
            }
            quote @ (b'"' | b'\'' | b'`') => pos = skip_quoted(bytes, pos, quote)?,
            _ => pos += 1,
        }
    }
    None
}

/// Skip a quoted string starting at `start`. Backslash escapes the next byte.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> Option<usize> {
    let mut pos = start + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b if b == quote => return Some(pos + 1),
            _ => pos += 1,
        }
    }
    None
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// Offset of the closing tag that balances an element opened just before `from`.
///
/// Counts nested same-name openings so `<div><div></div></div>` pairs correctly.
/// Returns the range of the closing tag.
#[must_use]
pub fn find_matching_close(input: &str, name: &str, from: usize) -> Option<Range<usize>> {
    let bytes = input.as_bytes();
    let mut depth = 1usize;
    let mut pos = from;
    while let Some(offset) = memchr::memchr(b'<', &bytes[pos..]) {
        let at = pos + offset;
        match parse_tag(&input[at..]) {
            Some(tag) if tag.name == name => {
                match tag.kind {
                    TagKind::Open => depth += 1,
                    TagKind::Close => {
                        depth -= 1;
                        if depth == 0 {
                            return Some(at..at + tag.len);
                        }
                    }
                    TagKind::SelfClosing => {}
                }
                pos = at + tag.len;
            }
            Some(tag) => pos = at + tag.len,
            None => pos = at + 1,
        }
    }
    None
}
