//! Segmentation of a document into host text and snippets.
//!
//! A single left-to-right scanner tries, at each position, every matcher that
//! can start with the byte found there. The longest match wins; matchers
//! earlier in priority order break ties. The scanner then jumps past the match,
//! so snippets are outermost and never overlap.
//!
//! Priority order: frontmatter, display math, inline math, fenced code, inline
//! code, verbatim environments, directives, structural constructs, mustache
//! expressions.

mod fence;
mod matchers;

use std::cmp::Reverse;
use std::ops::Range;

use tessera_html::tag::{TagKind, parse_tag};

use crate::snippet::{Diagnostic, Severity, Snippet, UnescapeOptions};
use crate::table::PlaceholderTable;
use matchers::{Attempt, Found, Matchers};


/// A user-declared verbatim environment as the segmenter sees it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerbatimEnvironment {
    /// Canonical tag name.
    pub name: String,
    /// Other tag names for the same environment.
    pub aliases: Vec<String>,
    /// Strip the paragraph markdown wraps around the output.
    pub remove_paragraph: bool,
}

impl VerbatimEnvironment {
    /// Environment without aliases whose wrapping paragraph is removed.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            remove_paragraph: true,
        }
    }

    /// Add an alias.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }
}

/// Which constructs the segmenter recognizes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmenterOptions {
    /// Verbatim environments.
    pub verbatim: Vec<VerbatimEnvironment>,
    /// `$...$` and `$$...$$`.
    pub math_dollars: bool,
    /// `\(...\)` and `\[...\]`.
    pub math_brackets: bool,
    /// `~code~` spans.
    pub tilde_spans: bool,
    /// `:name[...]{...}` directives.
    pub directives: bool,
}

impl Default for SegmenterOptions {
    fn default() -> Self {
        Self {
            verbatim: Vec::new(),
            math_dollars: true,
            math_brackets: true,
            tilde_spans: false,
            directives: false,
        }
    }
}

/// Result of segmenting one document.
#[derive(Debug)]
pub struct Segmented {
    /// Document with every snippet replaced by its token.
    pub host: String,
    /// Snippets in document order.
    pub table: PlaceholderTable,
    /// Unclosed constructs left in the host text.
    pub diagnostics: Vec<Diagnostic>,
}

/// Splits documents into host text and snippets.
#[derive(Clone, Debug, Default)]
pub struct Segmenter {
    options: SegmenterOptions,
    /// Every recognized verbatim tag name with the index of its environment.
    environments: Vec<(String, usize)>,
}

/// Tracks line numbers for monotonically increasing offsets.
struct LineCounter<'a> {
    bytes: &'a [u8],
    offset: usize,
    line: usize,
}

impl LineCounter<'_> {
    fn line_at(&mut self, offset: usize) -> usize {
        self.line += memchr::memchr_iter(b'\n', &self.bytes[self.offset..offset]).count();
        self.offset = offset;
        self.line
    }
}

fn is_candidate(b: u8) -> bool {
    matches!(b, b'-' | b'+' | b'$' | b'\\' | b'`' | b'~' | b'<' | b':' | b'{')
}

impl Segmenter {
    /// Create a segmenter for the given options.
    #[must_use]
    pub fn new(options: SegmenterOptions) -> Self {
        let environments = options
            .verbatim
            .iter()
            .enumerate()
            .flat_map(|(index, env)| {
                std::iter::once(&env.name)
                    .chain(&env.aliases)
                    .map(move |tag| (tag.clone(), index))
            })
            .collect();
        Self {
            options,
            environments,
        }
    }

    /// Options in use.
    #[must_use]
    pub fn options(&self) -> &SegmenterOptions {
        &self.options
    }

    /// Segment `text`.
    #[must_use]
    pub fn segment(&self, text: &str) -> Segmented {
        let matchers = Matchers {
            text,
            options: &self.options,
            environments: &self.environments,
        };
        let bytes = text.as_bytes();
        let mut lines = LineCounter {
            bytes,
            offset: 0,
            line: 1,
        };

        let mut host = String::with_capacity(text.len());
        let mut table = PlaceholderTable::new();
        let mut diagnostics = Vec::new();
        let mut shielded: Vec<Range<usize>> = Vec::new();
        let mut copied = 0;
        let mut tag_end = 0;
        let mut pos = 0;

        while pos < bytes.len() {
            let b = bytes[pos];
            if !is_candidate(b) {
                pos += 1;
                continue;
            }
            if let Some(shield) = shielded.iter().find(|r| r.start == pos) {
                pos = shield.end;
                continue;
            }
            if b == b'\\' && !self.starts_bracket_math(bytes, pos) {
                let escaped = bytes.get(pos + 1).is_some_and(u8::is_ascii_punctuation);
                pos += if escaped { 2 } else { 1 };
                continue;
            }

            let in_tag = pos < tag_end;
            let attempts = self.attempts(&matchers, pos, in_tag);

            let best = attempts
                .iter()
                .enumerate()
                .filter_map(|(priority, attempt)| match attempt {
                    Attempt::Found(found) => Some((priority, found)),
                    _ => None,
                })
                .max_by_key(|(priority, found)| (found.len, Reverse(*priority)));

            if let Some((_, found)) = best {
                let range = pos..pos + found.len;
                host.push_str(&text[copied..pos]);
                let snippet = build_snippet(text, range.clone(), found, lines.line_at(pos));
                let token = table.insert(snippet, text);
                host.push_str(&token);
                copied = range.end;
                pos = range.end;
                continue;
            }

            let mut advance = 1;
            let mut reported = false;
            for attempt in attempts {
                match attempt {
                    Attempt::Shield { skip, braces } => {
                        advance = advance.max(skip);
                        shielded.push(braces);
                    }
                    Attempt::Skip(len) => advance = advance.max(len),
                    Attempt::Unclosed { len, message } => {
                        advance = advance.max(len);
                        if !reported {
                            reported = true;
                            let line = lines.line_at(pos);
                            tracing::warn!(line, %message, "Unclosed construct left as text");
                            diagnostics.push(Diagnostic {
                                severity: Severity::Warning,
                                message,
                                offset: pos,
                                line,
                            });
                        }
                    }
                    Attempt::Nothing | Attempt::Found(_) => {}
                }
            }

            if b == b'<'
                && !in_tag
                && let Some(tag) = parse_tag(&text[pos..])
                && tag.kind != TagKind::Close
            {
                tag_end = pos + tag.len;
            }
            pos += advance;
        }

        host.push_str(&text[copied..]);
        tracing::debug!(snippets = table.len(), diagnostics = diagnostics.len(), "Segmented document");
        Segmented {
            host,
            table,
            diagnostics,
        }
    }

    fn starts_bracket_math(&self, bytes: &[u8], pos: usize) -> bool {
        self.options.math_brackets && matches!(bytes.get(pos + 1), Some(b'[' | b'('))
    }

    /// Run every matcher that can start with the byte at `pos`, in priority order.
    ///
    /// Inside a tag only expressions are recognized.
    fn attempts(&self, m: &Matchers<'_>, pos: usize, in_tag: bool) -> Vec<Attempt> {
        let b = m.text.as_bytes()[pos];
        if in_tag {
            return match b {
                b'{' => vec![m.structural(pos), m.mustache(pos)],
                _ => Vec::new(),
            };
        }
        match b {
            b'-' | b'+' => vec![m.frontmatter(pos)],
            b'$' => vec![m.display_math(pos), m.inline_math(pos)],
            b'\\' => vec![m.display_math(pos), m.inline_math(pos)],
            b'`' | b'~' => vec![m.fenced_code(pos), m.inline_code(pos)],
            b'<' => vec![m.verbatim(pos), m.structural(pos)],
            b':' => vec![m.directive(pos)],
            b'{' => vec![m.structural(pos), m.mustache(pos)],
            _ => Vec::new(),
        }
    }
}

fn build_snippet(text: &str, range: Range<usize>, found: &Found, line: usize) -> Snippet {
    Snippet {
        raw_outer: text[range.clone()].to_owned(),
        raw_inner: found.inner.clone(),
        options: found.options.clone(),
        unescape: UnescapeOptions {
            remove_paragraph: found.remove_paragraph,
        },
        range,
        line,
    }
}
