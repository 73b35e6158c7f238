//! Error types for the shipyard engine

use thiserror::Error;

/// Main error type for source resolution, command synthesis and sync
///
/// Messages only ever carry non-sensitive identifiers (deployment id, host,
/// application id). Tokens and key material never reach a variant.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Missing or invalid credential/identity, raised before any remote call
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Ref-planning combination that has no defined checkout strategy
    #[error("Unsupported provider: {0}")]
    UnsupportedProviderError(String),

    /// The remote fetch returned no content; stored configuration is untouched
    #[error("Source fetch error: {0}")]
    SourceFetchError(String),

    /// Failure reported by the remote command runner, passed through as-is
    #[error("Transport error on {host}: {message}")]
    TransportError { host: String, message: String },

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Compose parse error: {0}")]
    ComposeParseError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Whether the caller may retry with its prior configuration intact
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::SourceFetchError(_))
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Internal(err.to_string())
    }
}
