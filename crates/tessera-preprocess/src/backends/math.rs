use tessera_html::{escape_html, escape_html_and_braces};

use crate::capability::MathProcessor;
use crate::error::CapabilityError;
use crate::snippet::MathMode;

/// Math backend selection.
pub enum MathBackend {
    /// Markup for client-side MathJax typesetting.
    MathJax {
        /// MathJax bundle loaded in the head when the document has math.
        script_src: String,
    },
    /// User-supplied processor.
    Custom(Box<dyn MathProcessor>),
}

impl MathProcessor for MathBackend {
    fn process(&self, inner: &str, mode: MathMode) -> Result<String, CapabilityError> {
        match self {
            Self::MathJax { .. } => {
                let tex = escape_html_and_braces(inner.trim());
                Ok(match mode {
                    MathMode::Inline => format!(r#"<span class="math math-inline">\({tex}\)</span>"#),
                    MathMode::Display => format!(r#"<div class="math math-display">\[{tex}\]</div>"#),
                })
            }
            Self::Custom(processor) => processor.process(inner, mode),
        }
    }

    fn head_lines(&self) -> Vec<String> {
        match self {
            Self::MathJax { script_src } => vec![format!(
                r#"<script id="MathJax-script" async src="{}"></script>"#,
                escape_html(script_src)
            )],
            Self::Custom(processor) => processor.head_lines(),
        }
    }

    fn script_lines(&self) -> Vec<String> {
        match self {
            Self::MathJax { .. } => Vec::new(),
            Self::Custom(processor) => processor.script_lines(),
        }
    }

    fn update_stylesheet(&self) -> Result<(), CapabilityError> {
        match self {
            Self::MathJax { .. } => Ok(()),
            Self::Custom(processor) => processor.update_stylesheet(),
        }
    }
}
