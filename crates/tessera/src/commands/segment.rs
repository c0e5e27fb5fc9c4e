//! `tessera segment` command implementation.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use tessera_cache::NullCache;
use tessera_config::Config;
use tessera_preprocess::{Diagnostic, Pipeline, Segmented};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the segment command.
#[derive(Args)]
pub(crate) struct SegmentArgs {
    /// Document to segment.
    file: PathBuf,

    /// Print a JSON report instead of the host text.
    #[arg(long)]
    json: bool,

    /// Path to configuration file (default: auto-discover tessera.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

/// One snippet in the JSON report.
#[derive(Debug, Serialize)]
struct SnippetReport<'a> {
    token: &'a str,
    kind: &'static str,
    line: usize,
    start: usize,
    end: usize,
    text: &'a str,
}

/// JSON report for one document.
#[derive(Debug, Serialize)]
struct SegmentReport<'a> {
    host: &'a str,
    snippets: Vec<SnippetReport<'a>>,
    diagnostics: Vec<String>,
}

impl SegmentArgs {
    /// Execute the segment command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the document cannot be read.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let config = Config::load(self.config.as_deref(), None)?;
        // Segmentation never reaches a verbatim backend, so no cache is needed.
        let pipeline = Pipeline::from_config(&config, &NullCache)?;

        let text = std::fs::read_to_string(&self.file)?;
        let segmented = pipeline.segment(&text);
        tracing::info!(snippets = segmented.table.len(), "Segmented document");

        if self.json {
            output.document(&serde_json::to_string_pretty(&report(&segmented))?)?;
            return Ok(());
        }

        let filename = self.file.display().to_string();
        for diagnostic in &segmented.diagnostics {
            output.diagnostic(&filename, diagnostic);
        }
        for entry in segmented.table.iter() {
            output.detail(&format!(
                "{:>4}  {:<11} {}",
                entry.snippet.line,
                entry.snippet.kind().as_str(),
                entry.token
            ));
        }
        output.document(&segmented.host)?;
        Ok(())
    }
}

fn report(segmented: &Segmented) -> SegmentReport<'_> {
    SegmentReport {
        host: &segmented.host,
        snippets: segmented
            .table
            .iter()
            .map(|entry| SnippetReport {
                token: &entry.token,
                kind: entry.snippet.kind().as_str(),
                line: entry.snippet.line,
                start: entry.snippet.range.start,
                end: entry.snippet.range.end,
                text: &entry.snippet.raw_outer,
            })
            .collect(),
        diagnostics: segmented.diagnostics.iter().map(Diagnostic::to_string).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_report() {
        let pipeline = Pipeline::from_config(&Config::default(), &NullCache).unwrap();
        let segmented = pipeline.segment("a `b`\n\n{#if c}");
        let report = report(&segmented);

        assert_eq!(report.snippets.len(), 2);
        assert_eq!(report.snippets[0].kind, "code");
        assert_eq!(report.snippets[0].text, "`b`");
        assert_eq!((report.snippets[0].start, report.snippets[0].end), (2, 5));
        assert_eq!(report.snippets[1].kind, "structural");
        assert_eq!(report.snippets[1].line, 3);
        assert!(report.host.starts_with("a tsrsnip"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["snippets"][1]["text"], "{#if c}");
    }
}
