//! Routes snippets to their capabilities in parallel.
//!
//! All snippets of a document run as one rayon fan-out. Each task's failure
//! stays attached to its snippet; after the join the document fails with the
//! first failure in document order.

use std::collections::HashMap;

use rayon::prelude::*;
use serde_json::{Map, Value};

use crate::backends::VerbatimBackend;
use crate::capability::{CodeProcessor, MathProcessor, VerbatimProcessor, VerbatimRequest};
use crate::context::SideChannel;
use crate::error::{CapabilityError, PreprocessError};
use crate::frontmatter;
use crate::snippet::{Diagnostic, Severity, Snippet, SnippetOptions};
use crate::table::PlaceholderTable;

/// Capabilities available to the dispatcher.
pub(crate) struct Capabilities<'a> {
    pub(crate) code: &'a dyn CodeProcessor,
    pub(crate) math: &'a dyn MathProcessor,
    /// Backends keyed by canonical environment name.
    pub(crate) verbatim: &'a HashMap<String, VerbatimBackend>,
}

/// What a single snippet produced besides its output.
#[derive(Default)]
struct Outcome {
    html: String,
    diagnostic: Option<Diagnostic>,
    record: Option<Map<String, Value>>,
}

impl Outcome {
    fn html(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..Self::default()
        }
    }
}

/// Results of dispatch that the rest of the pipeline needs.
#[derive(Debug, Default)]
pub(crate) struct Dispatched {
    /// Frontmatter parse failures.
    pub(crate) diagnostics: Vec<Diagnostic>,
    /// Parsed frontmatter record.
    pub(crate) frontmatter: Option<Map<String, Value>>,
}

/// Process every snippet of `table` and store the outputs in it.
pub(crate) fn dispatch(
    table: &mut PlaceholderTable,
    capabilities: &Capabilities<'_>,
    side_channel: &SideChannel,
    filename: Option<&str>,
) -> Result<Dispatched, PreprocessError> {
    let snippets: Vec<&Snippet> = table.snippets().collect();
    let results: Vec<Result<Outcome, CapabilityError>> = snippets
        .par_iter()
        .map(|snippet| process_one(snippet, capabilities, side_channel, filename))
        .collect();

    let mut outputs = Vec::with_capacity(results.len());
    let mut dispatched = Dispatched::default();
    for (snippet, result) in snippets.iter().zip(results) {
        let outcome = result.map_err(|source| PreprocessError::Snippet {
            kind: snippet.kind(),
            line: snippet.line,
            source,
        })?;
        if let Some(diagnostic) = outcome.diagnostic {
            dispatched.diagnostics.push(diagnostic);
        }
        if let Some(record) = outcome.record {
            let lines = frontmatter::interpret(&record);
            side_channel.push_head(lines.head_lines);
            side_channel.push_script(lines.script_lines);
            side_channel.push_module(lines.script_module_lines);
            dispatched.frontmatter = Some(record);
        }
        outputs.push(outcome.html);
    }

    // Capability lines go after the join so their order does not depend on scheduling.
    if side_channel.has_code() {
        side_channel.push_head(capabilities.code.head_lines());
        side_channel.push_script(capabilities.code.script_lines());
    }
    if side_channel.has_math() {
        side_channel.push_head(capabilities.math.head_lines());
        side_channel.push_script(capabilities.math.script_lines());
    }

    tracing::debug!(snippets = outputs.len(), "Dispatched snippets");
    table.resolve(outputs);
    Ok(dispatched)
}

fn process_one(
    snippet: &Snippet,
    capabilities: &Capabilities<'_>,
    side_channel: &SideChannel,
    filename: Option<&str>,
) -> Result<Outcome, CapabilityError> {
    match &snippet.options {
        SnippetOptions::Code(options) => {
            side_channel.mark_code();
            Ok(Outcome::html(capabilities.code.process(&snippet.raw_inner, options)?))
        }
        SnippetOptions::Math(mode) => {
            if side_channel.mark_math() {
                capabilities.math.update_stylesheet()?;
            }
            Ok(Outcome::html(capabilities.math.process(&snippet.raw_inner, *mode)?))
        }
        SnippetOptions::Verbatim(options) => {
            let backend = capabilities.verbatim.get(&options.environment).ok_or_else(|| {
                CapabilityError::message(format!(
                    "no backend for verbatim environment {:?}",
                    options.environment
                ))
            })?;
            let request = VerbatimRequest {
                inner: &snippet.raw_inner,
                environment: &options.environment,
                tag: &options.tag,
                attributes: &options.attributes,
                filename,
                side_channel,
                code: capabilities.code,
            };
            let output = backend.process(&request)?;
            side_channel.push_dependencies(output.dependencies);
            Ok(Outcome::html(output.html))
        }
        SnippetOptions::Frontmatter(format) => {
            match frontmatter::parse(&snippet.raw_inner, *format) {
                Ok(record) => Ok(Outcome {
                    record: Some(record),
                    ..Outcome::default()
                }),
                Err(message) => {
                    tracing::warn!(line = snippet.line, %message, ?filename, "Ignoring malformed frontmatter");
                    Ok(Outcome {
                        diagnostic: Some(Diagnostic {
                            severity: Severity::Error,
                            message: format!("invalid frontmatter: {message}"),
                            offset: snippet.range.start,
                            line: snippet.line,
                        }),
                        ..Outcome::default()
                    })
                }
            }
        }
        SnippetOptions::Structural(kind) => {
            side_channel.note_structural(*kind);
            Ok(Outcome::html(snippet.raw_outer.as_str()))
        }
        SnippetOptions::Mustache => Ok(Outcome::html(snippet.raw_outer.as_str())),
    }
}
