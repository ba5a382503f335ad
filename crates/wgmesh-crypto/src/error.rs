//! Key handling errors

use thiserror::Error;

/// Key handling errors
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Base64 decode failure
    #[error("Invalid key encoding: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    /// Decoded key has the wrong length
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}

/// Result type for key operations
pub type CryptoResult<T> = Result<T, CryptoError>;
