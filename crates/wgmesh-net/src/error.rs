//! Data plane errors

use thiserror::Error;

/// Data plane errors
#[derive(Debug, Error)]
pub enum NetError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Interface operation attempted before create()
    #[error("Interface not created")]
    NotCreated,

    /// Interface already exists
    #[error("Interface already created: {0}")]
    AlreadyCreated(String),

    /// External tool failed
    #[error("Command `{command}` failed: {output}")]
    Command { command: String, output: String },

    /// Malformed peer configuration
    #[error("Invalid peer config: {0}")]
    InvalidPeer(String),

    /// Platform not supported
    #[error("Platform not supported for this operation")]
    PlatformNotSupported,
}

/// Result type for data plane operations
pub type NetResult<T> = Result<T, NetError>;
