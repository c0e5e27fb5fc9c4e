//! Error types for preprocessing.

use tessera_config::ConfigError;

use crate::snippet::SnippetKind;

/// Error returned by a capability (markdown engine, code, math or verbatim processor).
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    /// Processor rejected its input.
    #[error("{0}")]
    Message(String),

    /// I/O error.
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// Error from a user-supplied backend.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl CapabilityError {
    /// Error with a plain message.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

/// Error that fails a whole document.
#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    /// A snippet processor failed.
    #[error("failed to process {kind} snippet at line {line}")]
    Snippet {
        /// Kind of the failing snippet.
        kind: SnippetKind,
        /// One-based line of the snippet start.
        line: usize,
        /// Underlying failure.
        #[source]
        source: CapabilityError,
    },

    /// The markdown engine failed.
    #[error("markdown engine failed")]
    Markdown(#[source] CapabilityError),
}

/// Error while building a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// Configuration could not be loaded or is invalid.
    #[error("configuration error")]
    Config(#[from] ConfigError),

    /// Verbatim environment or alias is not a valid tag name.
    #[error("invalid tag name for verbatim environment: {0:?}")]
    InvalidTagName(String),

    /// Two environments claim the same tag name.
    #[error("tag name {0:?} is used by more than one verbatim environment")]
    DuplicateEnvironment(String),

    /// Environment uses a tag name the template language reserves.
    #[error("tag name {0:?} is reserved")]
    ReservedTagName(String),
}
