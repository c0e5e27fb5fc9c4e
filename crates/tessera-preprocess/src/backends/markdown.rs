use pulldown_cmark::{Options, Parser, html};

use crate::capability::MarkdownEngine;
use crate::error::CapabilityError;

/// Markdown engine selection.
pub enum MarkdownBackend {
    /// pulldown-cmark, optionally with GitHub Flavored Markdown extensions.
    PulldownCmark {
        /// Enable tables, strikethrough, task lists and GFM blockquote alerts.
        gfm: bool,
    },
    /// Return host text unchanged.
    Passthrough,
    /// User-supplied engine.
    Custom(Box<dyn MarkdownEngine>),
}

impl MarkdownBackend {
    fn parser_options(gfm: bool) -> Options {
        if gfm {
            Options::ENABLE_TABLES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS
                | Options::ENABLE_GFM
        } else {
            Options::empty()
        }
    }
}

impl Default for MarkdownBackend {
    fn default() -> Self {
        Self::PulldownCmark { gfm: true }
    }
}

impl MarkdownEngine for MarkdownBackend {
    fn process(&self, text: &str) -> Result<String, CapabilityError> {
        match self {
            Self::PulldownCmark { gfm } => {
                let parser = Parser::new_ext(text, Self::parser_options(*gfm));
                let mut out = String::with_capacity(text.len() + text.len() / 4);
                html::push_html(&mut out, parser);
                Ok(out)
            }
            Self::Passthrough => Ok(text.to_owned()),
            Self::Custom(engine) => engine.process(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pulldown_paragraphs() {
        let html = MarkdownBackend::default().process("# T\n\nSome *text*").unwrap();
        assert_eq!(html, "<h1>T</h1>\n<p>Some <em>text</em></p>\n");
    }

    #[test]
    fn test_tokens_are_opaque() {
        let token = "tsrsnip0123456789abcdef0123456789abcdef";
        let html = MarkdownBackend::default().process(token).unwrap();
        assert_eq!(html, format!("<p>{token}</p>\n"));
    }

    #[test]
    fn test_gfm_toggle() {
        let text = "~~x~~";
        let with = MarkdownBackend::PulldownCmark { gfm: true }.process(text).unwrap();
        let without = MarkdownBackend::PulldownCmark { gfm: false }.process(text).unwrap();
        assert!(with.contains("<del>"));
        assert!(!without.contains("<del>"));
    }

    #[test]
    fn test_passthrough() {
        assert_eq!(MarkdownBackend::Passthrough.process("*a*").unwrap(), "*a*");
    }

    #[test]
    fn test_custom() {
        struct Upper;
        impl MarkdownEngine for Upper {
            fn process(&self, text: &str) -> Result<String, CapabilityError> {
                Ok(text.to_uppercase())
            }
        }
        let backend = MarkdownBackend::Custom(Box::new(Upper));
        assert_eq!(backend.process("abc").unwrap(), "ABC");
    }
}
