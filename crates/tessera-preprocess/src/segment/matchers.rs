//! Individual snippet matchers.
//!
//! Each matcher looks at one position and reports whether its construct starts
//! there. Matchers never look behind the position except to check line starts
//! and word boundaries, and never scan past a match they report.

use std::ops::Range;

use memchr::memmem;
use tessera_html::tag::{Tag, TagKind, find_expression_end, find_matching_close, parse_tag};

use super::fence::{Fence, container_prefix, strip_indent, strip_quotes};
use super::{SegmenterOptions, VerbatimEnvironment};
use crate::snippet::{
    CodeOptions, FrontmatterFormat, MathMode, SnippetOptions, StructuralKind, VerbatimOptions,
};

/// A construct recognized at a position.
#[derive(Debug)]
pub(crate) struct Found {
    /// Byte length of the whole construct.
    pub(crate) len: usize,
    /// Text for the processor.
    pub(crate) inner: String,
    /// Kind-specific metadata.
    pub(crate) options: SnippetOptions,
    /// Strip a wrapping paragraph on substitution.
    pub(crate) remove_paragraph: bool,
}

/// Outcome of one matcher at one position.
#[derive(Debug)]
pub(crate) enum Attempt {
    /// Nothing starts here.
    Nothing,
    /// A snippet starts here.
    Found(Found),
    /// Literal text; skip this many bytes without looking inside.
    Skip(usize),
    /// Directive: skip its name and never treat `braces` as an expression.
    Shield { skip: usize, braces: Range<usize> },
    /// An opener of `len` bytes without a closer.
    Unclosed { len: usize, message: String },
}

pub(crate) struct Matchers<'a> {
    pub(crate) text: &'a str,
    pub(crate) options: &'a SegmenterOptions,
    pub(crate) environments: &'a [(String, usize)],
}

fn found(
    len: usize,
    inner: impl Into<String>,
    options: SnippetOptions,
    remove_paragraph: bool,
) -> Attempt {
    Attempt::Found(Found {
        len,
        inner: inner.into(),
        options,
        remove_paragraph,
    })
}

fn unclosed(len: usize, message: impl Into<String>) -> Attempt {
    Attempt::Unclosed {
        len,
        message: message.into(),
    }
}

/// End of the line containing `pos` (index of `\n`, or text length).
fn line_end(bytes: &[u8], pos: usize) -> usize {
    memchr::memchr(b'\n', &bytes[pos..]).map_or(bytes.len(), |i| pos + i)
}

/// Whether the `\n` at `newline` is followed by a line holding only whitespace.
fn starts_blank_line(bytes: &[u8], newline: usize) -> bool {
    let next = newline + 1;
    let end = line_end(bytes, next);
    end < bytes.len() && bytes[next..end].iter().all(u8::is_ascii_whitespace)
}

fn is_escaped(bytes: &[u8], pos: usize) -> bool {
    let backslashes = bytes[..pos].iter().rev().take_while(|&&b| b == b'\\').count();
    backslashes % 2 == 1
}

impl Matchers<'_> {
    fn bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    /// Frontmatter at the very start of the document.
    pub(crate) fn frontmatter(&self, pos: usize) -> Attempt {
        if pos != 0 {
            return Attempt::Nothing;
        }
        let bytes = self.bytes();
        let first_end = line_end(bytes, 0);
        let (format, closer) = match self.text[..first_end].trim_end() {
            "---" | "---yaml" => (FrontmatterFormat::Yaml, "---"),
            "---toml" => (FrontmatterFormat::Toml, "---"),
            "---json" => (FrontmatterFormat::Json, "---"),
            "+++" => (FrontmatterFormat::Toml, "+++"),
            _ => return Attempt::Nothing,
        };

        let mut lines = Vec::new();
        let mut start = first_end + 1;
        while start <= bytes.len() {
            let end = line_end(bytes, start.min(bytes.len()));
            let line = self.text.get(start..end).unwrap_or("");
            if line.trim_end() == closer {
                return found(
                    end,
                    lines.join("\n"),
                    SnippetOptions::Frontmatter(format),
                    true,
                );
            }
            lines.push(line.strip_suffix('\r').unwrap_or(line));
            if end >= bytes.len() {
                break;
            }
            start = end + 1;
        }
        unclosed(first_end, "frontmatter block is never closed")
    }

    /// `$$...$$` and `\[...\]`.
    pub(crate) fn display_math(&self, pos: usize) -> Attempt {
        let rest = &self.text[pos..];
        let (closer, enabled) = if rest.starts_with("$$") {
            ("$$", self.options.math_dollars)
        } else if rest.starts_with("\\[") {
            ("\\]", self.options.math_brackets)
        } else {
            return Attempt::Nothing;
        };
        if !enabled {
            return Attempt::Nothing;
        }

        let bytes = self.bytes();
        let content_start = pos + 2;
        let mut search = content_start;
        while let Some(i) = memmem::find(&bytes[search..], closer.as_bytes()) {
            let at = search + i;
            if closer == "$$" && is_escaped(bytes, at) {
                search = at + 1;
                continue;
            }
            let inner = &self.text[content_start..at];
            if inner.trim().is_empty() {
                return Attempt::Nothing;
            }
            return found(
                at + 2 - pos,
                inner,
                SnippetOptions::Math(MathMode::Display),
                true,
            );
        }
        unclosed(2, format!("display math `{}` is never closed", &rest[..2]))
    }

    /// `$...$` and `\(...\)`.
    pub(crate) fn inline_math(&self, pos: usize) -> Attempt {
        let bytes = self.bytes();
        if bytes[pos] == b'$' && self.options.math_dollars {
            return self.dollar_math(pos);
        }
        if self.text[pos..].starts_with("\\(") && self.options.math_brackets {
            let content_start = pos + 2;
            let mut i = content_start;
            while i + 1 < bytes.len() {
                match bytes[i] {
                    b'\n' if starts_blank_line(bytes, i) => break,
                    b'\\' if bytes[i + 1] == b')' => {
                        return found(
                            i + 2 - pos,
                            &self.text[content_start..i],
                            SnippetOptions::Math(MathMode::Inline),
                            false,
                        );
                    }
                    _ => {}
                }
                i += 1;
            }
            return unclosed(2, "inline math `\\(` is never closed");
        }
        Attempt::Nothing
    }

    /// `$x$`: the opening `$` is followed by non-whitespace, the closing `$` is
    /// preceded by non-whitespace and not followed by a digit.
    fn dollar_math(&self, pos: usize) -> Attempt {
        let bytes = self.bytes();
        match bytes.get(pos + 1) {
            Some(b) if !b.is_ascii_whitespace() && *b != b'$' => {}
            _ => return Attempt::Nothing,
        }
        let mut i = pos + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b'\n' if starts_blank_line(bytes, i) => return Attempt::Nothing,
                b'$' => {
                    let closes = !bytes[i - 1].is_ascii_whitespace()
                        && !bytes.get(i + 1).is_some_and(u8::is_ascii_digit);
                    if closes {
                        return found(
                            i + 1 - pos,
                            &self.text[pos + 1..i],
                            SnippetOptions::Math(MathMode::Inline),
                            false,
                        );
                    }
                    i += 1;
                }
                _ => i += 1,
            }
        }
        Attempt::Nothing
    }

    /// Fenced code block starting its line, possibly inside block quotes or list items.
    pub(crate) fn fenced_code(&self, pos: usize) -> Attempt {
        let bytes = self.bytes();
        let line_start = bytes[..pos]
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |i| i + 1);
        let Some(container) = container_prefix(&self.text[line_start..pos]) else {
            return Attempt::Nothing;
        };
        let indent = pos - line_start - container.quote_width;
        let open_end = line_end(bytes, pos);
        let Some(fence) = Fence::open(self.text[pos..open_end].trim_end_matches('\r')) else {
            return Attempt::Nothing;
        };
        let (language, info_string) = fence.language_and_info();
        let code = |len: usize, lines: Vec<&str>| {
            found(
                len,
                lines.join("\n"),
                SnippetOptions::Code(CodeOptions {
                    language: language.clone(),
                    info_string: info_string.clone(),
                    inline: false,
                }),
                true,
            )
        };

        let mut lines = Vec::new();
        let mut start = open_end + 1;
        while start < bytes.len() {
            let end = line_end(bytes, start);
            let line = self.text[start..end].trim_end_matches('\r');
            let Some(content) = strip_quotes(line, container.quotes) else {
                // Leaving the block quote closes the fence.
                return code(start - 1 - pos, lines);
            };
            if fence.is_closed_by(content) {
                return code(start + line.len() - pos, lines);
            }
            lines.push(strip_indent(content, indent));
            start = end + 1;
        }
        unclosed(fence.len, "code fence is never closed")
    }

    /// Backtick span, or tilde span when enabled.
    pub(crate) fn inline_code(&self, pos: usize) -> Attempt {
        let bytes = self.bytes();
        let ch = bytes[pos];
        if ch == b'~' && !self.options.tilde_spans {
            return Attempt::Nothing;
        }
        let run = bytes[pos..].iter().take_while(|&&b| b == ch).count();
        let content_start = pos + run;

        let mut i = content_start;
        while i < bytes.len() {
            match bytes[i] {
                b'\n' if starts_blank_line(bytes, i) => break,
                b if b == ch => {
                    let close_run = bytes[i..].iter().take_while(|&&b| b == ch).count();
                    if close_run == run {
                        let inner = code_span_content(&self.text[content_start..i]);
                        return found(
                            i + run - pos,
                            inner,
                            SnippetOptions::Code(CodeOptions {
                                inline: true,
                                ..CodeOptions::default()
                            }),
                            false,
                        );
                    }
                    i += close_run;
                }
                _ => i += 1,
            }
        }
        Attempt::Skip(run)
    }

    /// Opening tag of a verbatim environment, through its balancing closing tag.
    pub(crate) fn verbatim(&self, pos: usize) -> Attempt {
        let Some(tag) = parse_tag(&self.text[pos..]) else {
            return Attempt::Nothing;
        };
        let Some(env) = self.environment(tag.name) else {
            return Attempt::Nothing;
        };
        let options = SnippetOptions::Verbatim(VerbatimOptions {
            environment: env.name.clone(),
            tag: tag.name.to_owned(),
            attributes: tag
                .attributes
                .iter()
                .map(|a| {
                    let value = a.value.map_or("", |v| v.text);
                    (a.name.to_owned(), value.to_owned())
                })
                .collect(),
        });

        match tag.kind {
            TagKind::Close => Attempt::Nothing,
            TagKind::SelfClosing => found(tag.len, "", options, env.remove_paragraph),
            TagKind::Open => {
                let content_start = pos + tag.len;
                match find_matching_close(self.text, tag.name, content_start) {
                    Some(close) => found(
                        close.end - pos,
                        &self.text[content_start..close.start],
                        options,
                        env.remove_paragraph,
                    ),
                    None => unclosed(tag.len, format!("<{}> is never closed", tag.name)),
                }
            }
        }
    }

    fn environment(&self, tag: &str) -> Option<&VerbatimEnvironment> {
        self.environments
            .iter()
            .find(|(name, _)| name == tag)
            .map(|(_, index)| &self.options.verbatim[*index])
    }

    /// `:name[content]{attributes}`. Only the attribute braces are shielded.
    pub(crate) fn directive(&self, pos: usize) -> Attempt {
        if !self.options.directives {
            return Attempt::Nothing;
        }
        let bytes = self.bytes();
        if pos > 0 && bytes[pos - 1].is_ascii_alphanumeric() {
            return Attempt::Nothing;
        }
        let colons = bytes[pos..].iter().take_while(|&&b| b == b':').count();
        if colons > 3 {
            return Attempt::Nothing;
        }
        let name_start = pos + colons;
        if !bytes.get(name_start).is_some_and(u8::is_ascii_alphabetic) {
            return Attempt::Nothing;
        }
        let name_end = name_start
            + bytes[name_start..]
                .iter()
                .take_while(|&&b| b.is_ascii_alphanumeric() || b == b'-')
                .count();

        let mut cursor = name_end;
        if bytes.get(cursor) == Some(&b'[') {
            let Some(close) = closing_bracket(bytes, cursor) else {
                return Attempt::Nothing;
            };
            cursor = close + 1;
        }
        if bytes.get(cursor) != Some(&b'{') {
            return Attempt::Nothing;
        }
        match find_expression_end(&bytes[cursor..]) {
            Some(len) => Attempt::Shield {
                skip: name_end - pos,
                braces: cursor..cursor + len,
            },
            None => Attempt::Nothing,
        }
    }

    /// Scripts, styles, head blocks, special elements, comments and control-flow tags.
    pub(crate) fn structural(&self, pos: usize) -> Attempt {
        let rest = &self.text[pos..];
        if rest.starts_with('{') {
            return self.block_tag(pos);
        }
        if let Some(body) = rest.strip_prefix("<!--") {
            return match body.find("-->") {
                Some(i) => found(
                    4 + i + 3,
                    &body[..i],
                    SnippetOptions::Structural(StructuralKind::Comment),
                    true,
                ),
                None => unclosed(4, "comment is never closed"),
            };
        }

        let Some(tag) = parse_tag(rest) else {
            return Attempt::Nothing;
        };
        let kind = match tag.name {
            "script" => StructuralKind::Script {
                module: is_module_script(&tag),
            },
            "style" => StructuralKind::Style,
            "svelte:head" => StructuralKind::Head,
            name if name.starts_with("svelte:") => {
                return found(
                    tag.len,
                    "",
                    SnippetOptions::Structural(StructuralKind::Special),
                    true,
                );
            }
            _ => return Attempt::Nothing,
        };

        match tag.kind {
            TagKind::Close => Attempt::Nothing,
            TagKind::SelfClosing => {
                found(tag.len, "", SnippetOptions::Structural(kind), true)
            }
            TagKind::Open => {
                let content_start = pos + tag.len;
                let close = if kind == StructuralKind::Head {
                    find_matching_close(self.text, tag.name, content_start)
                } else {
                    find_raw_text_close(self.text, tag.name, content_start)
                };
                match close {
                    Some(close) => found(
                        close.end - pos,
                        &self.text[content_start..close.start],
                        SnippetOptions::Structural(kind),
                        true,
                    ),
                    None => unclosed(tag.len, format!("<{}> is never closed", tag.name)),
                }
            }
        }
    }

    /// `{#...}`, `{:...}`, `{/...}`, `{@...}`.
    fn block_tag(&self, pos: usize) -> Attempt {
        let bytes = self.bytes();
        if !matches!(bytes.get(pos + 1), Some(b'#' | b':' | b'/' | b'@')) {
            return Attempt::Nothing;
        }
        match find_expression_end(&bytes[pos..]) {
            Some(len) => found(
                len,
                &self.text[pos + 1..pos + len - 1],
                SnippetOptions::Structural(StructuralKind::Block),
                true,
            ),
            None => unclosed(2, format!("`{}` block tag is never closed", &self.text[pos..pos + 2])),
        }
    }

    /// `{expression}`.
    pub(crate) fn mustache(&self, pos: usize) -> Attempt {
        match find_expression_end(&self.bytes()[pos..]) {
            Some(len) => found(
                len,
                &self.text[pos + 1..pos + len - 1],
                SnippetOptions::Mustache,
                false,
            ),
            None => unclosed(1, "`{` expression is never closed"),
        }
    }
}

/// Whether a `<script>` tag declares module context.
fn is_module_script(tag: &Tag<'_>) -> bool {
    tag.attributes.iter().any(|a| match a.name {
        "module" => true,
        "context" => a.value.is_some_and(|v| v.text == "module"),
        _ => false,
    })
}

/// First closing tag named `name` at or after `from`, without depth counting.
fn find_raw_text_close(text: &str, name: &str, from: usize) -> Option<Range<usize>> {
    let finder = memmem::Finder::new("</");
    let bytes = text.as_bytes();
    let mut pos = from;
    while let Some(i) = finder.find(&bytes[pos..]) {
        let at = pos + i;
        if let Some(tag) = parse_tag(&text[at..])
            && tag.kind == TagKind::Close
            && tag.name == name
        {
            return Some(at..at + tag.len);
        }
        pos = at + 2;
    }
    None
}

/// Index of the `]` balancing the `[` at `open`, within one paragraph.
fn closing_bracket(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            b'\n' if starts_blank_line(bytes, i) => return None,
            _ => {}
        }
        i += 1;
    }
    None
}

/// Code span content: line endings become spaces, and one surrounding space is
/// stripped when both ends have one and the content is not all spaces.
fn code_span_content(raw: &str) -> String {
    let content = raw.replace("\r\n", " ").replace('\n', " ");
    let stripped = content
        .strip_prefix(' ')
        .and_then(|s| s.strip_suffix(' '))
        .filter(|_| !content.bytes().all(|b| b == b' '));
    stripped.map_or_else(|| content.clone(), str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_span_content() {
        assert_eq!(code_span_content(" `a` "), "`a`");
        assert_eq!(code_span_content("a\nb"), "a b");
        assert_eq!(code_span_content("  "), "  ");
        assert_eq!(code_span_content(" a"), " a");
    }

    #[test]
    fn test_is_escaped() {
        assert!(is_escaped(br"a\$", 2));
        assert!(!is_escaped(br"a\\$", 3));
        assert!(!is_escaped(b"$", 0));
    }

    #[test]
    fn test_closing_bracket() {
        assert_eq!(closing_bracket(b"[a [b] c]{x}", 0), Some(8));
        assert_eq!(closing_bracket(b"[a\n\nb]", 0), None);
    }
}
