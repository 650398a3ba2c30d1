//! CLI error types.

use hubro_config::ConfigError;
use hubro_session::SessionError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Session(#[from] SessionError),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Timed out {0}")]
    Timeout(String),
}
