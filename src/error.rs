//! Error types for stave

use thiserror::Error;

/// Result type for stave operations
pub type Result<T> = std::result::Result<T, StaveError>;

/// Stave error types
#[derive(Error, Debug)]
pub enum StaveError {
    /// Input text is not valid YAML or JSON.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Input shape does not match the descriptor schema.
    #[error("schema error: {0}")]
    Schema(String),

    /// Valid shape but an invariant is violated (duplicate names, cycles,
    /// out-of-range values).
    #[error("semantic error: {0}")]
    Semantic(String),

    /// A pipeline processor failed; carries its name and position.
    #[error("processor '{name}' (index {index}) failed: {source}")]
    Processor {
        name: &'static str,
        index: usize,
        #[source]
        source: Box<StaveError>,
    },

    /// Channel received a non-retryable response.
    #[error("client error from {endpoint}: HTTP {status}: {message}")]
    Client {
        status: u16,
        endpoint: String,
        message: String,
    },

    /// Network failure or server error; eligible for retry.
    #[error("transient error from {endpoint}: {message}")]
    Transient { endpoint: String, message: String },

    /// Command aborted by the caller.
    #[error("cancelled after {completed} of {total} applications")]
    Cancelled { completed: usize, total: usize },

    /// Invariant violation in engine code.
    #[error("internal error: {0}")]
    Internal(String),

    /// Invalid engine, channel, or command configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// IO error (descriptor files, channel config, certificates).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StaveError {
    /// True when a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StaveError::Transient { .. })
    }

    /// Process exit code for CLI wrappers.
    ///
    /// 64 syntax/schema, 65 semantic (including processor failures),
    /// 69 channel/transport, 70 internal, 130 cancelled.
    pub fn exit_code(&self) -> u8 {
        match self {
            StaveError::Syntax(_) | StaveError::Schema(_) => 64,
            StaveError::Semantic(_) | StaveError::Processor { .. } => 65,
            StaveError::Client { .. } | StaveError::Transient { .. } => 69,
            StaveError::Cancelled { .. } => 130,
            StaveError::Internal(_) | StaveError::Config(_) | StaveError::Io(_) => 70,
        }
    }
}
