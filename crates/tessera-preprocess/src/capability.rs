//! Capabilities the pipeline delegates to.
//!
//! Every capability is `Send + Sync` and takes `&self`: snippets of one
//! document are processed concurrently on the rayon pool.

use std::path::PathBuf;

use crate::context::SideChannel;
use crate::error::CapabilityError;
use crate::snippet::{CodeOptions, MathMode};

/// Converts host text to HTML.
pub trait MarkdownEngine: Send + Sync {
    /// Render markdown. Placeholder tokens must come through as plain text.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the input.
    fn process(&self, text: &str) -> Result<String, CapabilityError>;
}

/// Renders code snippets.
pub trait CodeProcessor: Send + Sync {
    /// Render one code block or span.
    ///
    /// # Errors
    ///
    /// Returns an error if the code cannot be rendered.
    fn process(&self, inner: &str, options: &CodeOptions) -> Result<String, CapabilityError>;

    /// Lines for the document head, added once when the document has code.
    fn head_lines(&self) -> Vec<String> {
        Vec::new()
    }

    /// Lines for the instance script, added once when the document has code.
    fn script_lines(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Renders math snippets.
pub trait MathProcessor: Send + Sync {
    /// Render one math expression.
    ///
    /// # Errors
    ///
    /// Returns an error if the expression cannot be rendered.
    fn process(&self, inner: &str, mode: MathMode) -> Result<String, CapabilityError>;

    /// Lines for the document head, added once when the document has math.
    fn head_lines(&self) -> Vec<String> {
        Vec::new()
    }

    /// Lines for the instance script, added once when the document has math.
    fn script_lines(&self) -> Vec<String> {
        Vec::new()
    }

    /// Refresh any stylesheet the head lines point to.
    ///
    /// Called at most once per document; must be safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns an error if the stylesheet cannot be written.
    fn update_stylesheet(&self) -> Result<(), CapabilityError> {
        Ok(())
    }
}

/// Input to a verbatim backend.
pub struct VerbatimRequest<'a> {
    /// Text between the tags, untouched.
    pub inner: &'a str,
    /// Canonical environment name.
    pub environment: &'a str,
    /// Tag name as written.
    pub tag: &'a str,
    /// Attributes of the opening tag.
    pub attributes: &'a [(String, String)],
    /// Document identifier.
    pub filename: Option<&'a str>,
    /// Side channel of the document being processed.
    pub side_channel: &'a SideChannel,
    /// Code capability of the pipeline.
    pub code: &'a dyn CodeProcessor,
}

impl VerbatimRequest<'_> {
    /// Value of an attribute of the opening tag.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Output of a verbatim backend.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VerbatimOutput {
    /// Rendered HTML.
    pub html: String,
    /// Files the output was built from.
    pub dependencies: Vec<PathBuf>,
}

impl VerbatimOutput {
    /// Output without file dependencies.
    #[must_use]
    pub fn html(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            dependencies: Vec::new(),
        }
    }
}

/// Renders the content of a verbatim environment.
pub trait VerbatimProcessor: Send + Sync {
    /// Render one region.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be rendered.
    fn process(&self, request: &VerbatimRequest<'_>) -> Result<VerbatimOutput, CapabilityError>;
}
