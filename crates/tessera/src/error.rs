//! CLI error types.

use tessera_config::ConfigError;
use tessera_preprocess::{PreprocessError, SetupError};

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Setup(#[from] SetupError),

    #[error("{0}")]
    Preprocess(#[from] PreprocessError),

    #[error("{0}")]
    Json(#[from] serde_json::Error),
}
