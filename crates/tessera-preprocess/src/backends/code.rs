use tessera_html::{escape_html, escape_html_and_braces};

use crate::capability::CodeProcessor;
use crate::error::CapabilityError;
use crate::snippet::CodeOptions;

/// Code backend selection.
pub enum CodeBackend {
    /// Escape code into `<pre><code>` blocks and `<code>` spans without highlighting.
    Escape {
        /// Stylesheet linked in the head when the document has code.
        stylesheet: Option<String>,
    },
    /// User-supplied processor.
    Custom(Box<dyn CodeProcessor>),
}

impl Default for CodeBackend {
    fn default() -> Self {
        Self::Escape { stylesheet: None }
    }
}

fn render_escaped(inner: &str, options: &CodeOptions) -> String {
    let code = escape_html_and_braces(inner);
    if options.inline {
        return format!("<code>{code}</code>");
    }
    let mut attrs = String::new();
    if let Some(lang) = &options.language {
        attrs.push_str(&format!(r#" class="language-{}""#, escape_html(lang)));
    }
    if let Some(info) = &options.info_string {
        attrs.push_str(&format!(r#" data-info="{}""#, escape_html_and_braces(info)));
    }
    format!("<pre><code{attrs}>{code}</code></pre>")
}

impl CodeProcessor for CodeBackend {
    fn process(&self, inner: &str, options: &CodeOptions) -> Result<String, CapabilityError> {
        match self {
            Self::Escape { .. } => Ok(render_escaped(inner, options)),
            Self::Custom(processor) => processor.process(inner, options),
        }
    }

    fn head_lines(&self) -> Vec<String> {
        match self {
            Self::Escape { stylesheet } => stylesheet
                .iter()
                .map(|href| format!(r#"<link rel="stylesheet" href="{}">"#, escape_html(href)))
                .collect(),
            Self::Custom(processor) => processor.head_lines(),
        }
    }

    fn script_lines(&self) -> Vec<String> {
        match self {
            Self::Escape { .. } => Vec::new(),
            Self::Custom(processor) => processor.script_lines(),
        }
    }
}
