//! Colored terminal output utilities.

use std::io::Write;

use console::{Style, Term};
use tessera_preprocess::{Diagnostic, Severity};

/// Terminal output formatter.
///
/// Messages go to stderr; [`Output::document`] writes results to stdout.
pub(crate) struct Output {
    term: Term,
    yellow: Style,
    red: Style,
    dim: Style,
}

impl Output {
    /// Create a new output formatter.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            dim: Style::new().dim(),
        }
    }

    /// Print an info message.
    pub(crate) fn info(&self, msg: &str) {
        let _ = self.term.write_line(msg);
    }

    /// Print a secondary message (dim).
    pub(crate) fn detail(&self, msg: &str) {
        let _ = self.term.write_line(&self.dim.apply_to(msg).to_string());
    }

    /// Print a warning message (yellow).
    pub(crate) fn warning(&self, msg: &str) {
        let _ = self.term.write_line(&self.yellow.apply_to(msg).to_string());
    }

    /// Print an error message (red).
    pub(crate) fn error(&self, msg: &str) {
        let _ = self.term.write_line(&self.red.apply_to(msg).to_string());
    }

    /// Print a diagnostic, prefixed with the file it came from.
    pub(crate) fn diagnostic(&self, file: &str, diagnostic: &Diagnostic) {
        let msg = format!("{file}: {diagnostic}");
        match diagnostic.severity {
            Severity::Warning => self.warning(&msg),
            Severity::Error => self.error(&msg),
        }
    }

    /// Write a result to stdout.
    pub(crate) fn document(&self, text: &str) -> std::io::Result<()> {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            stdout.write_all(b"\n")?;
        }
        stdout.flush()
    }
}
