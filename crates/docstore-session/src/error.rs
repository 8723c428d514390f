//! Error types for session store operations.

use crate::client::ClientError;

/// Error type for session store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error reported by the document store, surfaced unchanged.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A session could not be encoded to or decoded from a document.
    #[error("Session codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Store configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The sweep task needs a tokio runtime and none is running.
    #[error("No tokio runtime available to run the expiry sweep")]
    NoRuntime,
}

/// Errors that can occur while loading store configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, Error>;
