//! The markdown pass over host text, with user transforms around it.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::backends::MarkdownBackend;
use crate::capability::MarkdownEngine;
use crate::error::PreprocessError;

/// Rewrites host text before markdown. Receives the text and the frontmatter record.
pub type PreTransform = Arc<dyn Fn(&str, &Map<String, Value>) -> String + Send + Sync>;

/// Rewrites markdown output.
pub type PostTransform = Arc<dyn Fn(&PostTransformInput<'_>) -> String + Send + Sync>;

/// What a [`PostTransform`] sees.
#[derive(Debug)]
pub struct PostTransformInput<'a> {
    /// Markdown output.
    pub html: &'a str,
    /// Text the markdown engine received.
    pub markdown: &'a str,
    /// Original document.
    pub document: &'a str,
}

/// Markdown engine plus optional transforms.
pub struct HostMarkdownPass {
    engine: MarkdownBackend,
    pre: Option<PreTransform>,
    post: Option<PostTransform>,
}

impl HostMarkdownPass {
    pub(crate) fn new(
        engine: MarkdownBackend,
        pre: Option<PreTransform>,
        post: Option<PostTransform>,
    ) -> Self {
        Self { engine, pre, post }
    }

    /// Apply the pre-transform.
    pub(crate) fn pre_transform(&self, host: &str, frontmatter: &Map<String, Value>) -> String {
        match &self.pre {
            Some(pre) => pre(host, frontmatter),
            None => host.to_owned(),
        }
    }

    /// Run the engine and the post-transform over already pre-transformed text.
    pub(crate) fn render(&self, markdown: &str, document: &str) -> Result<String, PreprocessError> {
        let html = self.engine.process(markdown).map_err(PreprocessError::Markdown)?;
        Ok(match &self.post {
            Some(post) => post(&PostTransformInput {
                html: &html,
                markdown,
                document,
            }),
            None => html,
        })
    }
}
