//! Snippets: spans of a document that markdown must not see.

use std::fmt;
use std::ops::Range;

/// What a snippet is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SnippetKind {
    /// Fenced block or inline code span.
    Code,
    /// Inline or display math.
    Math,
    /// Content of a user-declared verbatim environment.
    Verbatim,
    /// Metadata block at the start of the document.
    Frontmatter,
    /// Template construct that passes through unchanged (scripts, styles, control flow).
    Structural,
    /// `{expression}` in text or attributes.
    Mustache,
}

impl SnippetKind {
    /// Lowercase name used in messages and cache namespaces.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Math => "math",
            Self::Verbatim => "verbatim",
            Self::Frontmatter => "frontmatter",
            Self::Structural => "structural",
            Self::Mustache => "mustache",
        }
    }
}

impl fmt::Display for SnippetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options handed to the code capability.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodeOptions {
    /// First word of the info string.
    pub language: Option<String>,
    /// Rest of the info string after the language, trimmed.
    pub info_string: Option<String>,
    /// Inline span rather than fenced block.
    pub inline: bool,
}

/// Inline or display math.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MathMode {
    /// `$...$` or `\(...\)`.
    Inline,
    /// `$$...$$` or `\[...\]`.
    Display,
}

/// Attributes of a tag in source order. Bare attributes have an empty value.
pub type Attributes = Vec<(String, String)>;

/// How a verbatim region was written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerbatimOptions {
    /// Canonical environment name.
    pub environment: String,
    /// Tag name as written (the environment name or one of its aliases).
    pub tag: String,
    /// Attributes of the opening tag.
    pub attributes: Attributes,
}

/// Serialization of a frontmatter block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrontmatterFormat {
    /// `---` or `---yaml`.
    Yaml,
    /// `+++` or `---toml`.
    Toml,
    /// `---json`.
    Json,
}

/// Template constructs that pass through untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StructuralKind {
    /// `<script>` block, instance or module.
    Script {
        /// `context="module"` or a bare `module` attribute.
        module: bool,
    },
    /// `<style>` block.
    Style,
    /// `<svelte:head>` block.
    Head,
    /// Any other `<svelte:*>` tag.
    Special,
    /// `<!-- ... -->`.
    Comment,
    /// `{#...}`, `{:...}`, `{/...}` or `{@...}`.
    Block,
}

/// Kind-specific snippet metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SnippetOptions {
    /// Code snippet.
    Code(CodeOptions),
    /// Math snippet.
    Math(MathMode),
    /// Verbatim environment.
    Verbatim(VerbatimOptions),
    /// Frontmatter block.
    Frontmatter(FrontmatterFormat),
    /// Structural construct.
    Structural(StructuralKind),
    /// Mustache expression.
    Mustache,
}

/// What to undo after substituting processed output back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UnescapeOptions {
    /// Strip a `<p>` that markdown wrapped around the placeholder.
    pub remove_paragraph: bool,
}

/// A span of the document handled outside the markdown pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snippet {
    /// Byte range in the original document.
    pub range: Range<usize>,
    /// Matched text including delimiters.
    pub raw_outer: String,
    /// Text handed to the processor.
    pub raw_inner: String,
    /// Kind-specific metadata.
    pub options: SnippetOptions,
    /// Paragraph handling on substitution.
    pub unescape: UnescapeOptions,
    /// One-based line of the snippet start.
    pub line: usize,
}

impl Snippet {
    /// Kind derived from the options.
    #[must_use]
    pub fn kind(&self) -> SnippetKind {
        match self.options {
            SnippetOptions::Code(_) => SnippetKind::Code,
            SnippetOptions::Math(_) => SnippetKind::Math,
            SnippetOptions::Verbatim(_) => SnippetKind::Verbatim,
            SnippetOptions::Frontmatter(_) => SnippetKind::Frontmatter,
            SnippetOptions::Structural(_) => SnippetKind::Structural,
            SnippetOptions::Mustache => SnippetKind::Mustache,
        }
    }
}

/// Severity of a [`Diagnostic`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Content was left as-is; output may still be usable.
    Warning,
    /// Content was dropped or misread.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// A problem found while preprocessing that did not stop it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Byte offset in the document.
    pub offset: usize,
    /// One-based line.
    pub line: usize,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at line {}: {}", self.severity, self.line, self.message)
    }
}

/// One-based line number of a byte offset.
#[must_use]
pub fn line_at(text: &str, offset: usize) -> usize {
    let end = offset.min(text.len());
    memchr::memchr_iter(b'\n', &text.as_bytes()[..end]).count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_at() {
        let text = "a\nb\r\nc";
        assert_eq!(line_at(text, 0), 1);
        assert_eq!(line_at(text, 2), 2);
        assert_eq!(line_at(text, 5), 3);
        assert_eq!(line_at(text, 99), 3);
    }

    #[test]
    fn test_kind_follows_options() {
        let snippet = Snippet {
            range: 0..3,
            raw_outer: "{x}".to_owned(),
            raw_inner: "x".to_owned(),
            options: SnippetOptions::Mustache,
            unescape: UnescapeOptions::default(),
            line: 1,
        };
        assert_eq!(snippet.kind(), SnippetKind::Mustache);
        assert_eq!(snippet.kind().to_string(), "mustache");
    }

    #[test]
    fn test_diagnostic_display() {
        let diagnostic = Diagnostic {
            severity: Severity::Warning,
            message: "unclosed `$$`".to_owned(),
            offset: 4,
            line: 2,
        };
        assert_eq!(diagnostic.to_string(), "warning at line 2: unclosed `$$`");
    }
}
