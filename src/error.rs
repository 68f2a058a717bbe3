//! Error types for the Replicant transport.

use thiserror::Error;

use crate::monolith::{GrammarError, Validity};

/// Result type alias for Replicant operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while establishing or using a Replicant connection.
#[derive(Error, Debug)]
pub enum Error {
    /// Cryptographic operation failed
    #[error("cryptographic error: {0}")]
    Crypto(String),

    /// Key agreement failed (malformed peer key, bad key material)
    #[error("key exchange failed: {0}")]
    KeyExchange(String),

    /// A received toneburst step did not validate against its pattern
    #[error("toneburst validation failed: {0}")]
    Validation(Validity),

    /// Grammar evaluation error surfaced to the caller
    #[error("grammar error: {0}")]
    Grammar(#[from] GrammarError),

    /// Invalid message format
    #[error("invalid message format: {0}")]
    InvalidMessage(String),

    /// Operation timed out
    #[error("connection timeout after {0}ms")]
    Timeout(u64),

    /// Network I/O error
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration could not be encoded or decoded
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Persisted configuration was written by an incompatible version
    #[error("format version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u16, actual: u16 },

    /// Buffer overflow/underflow
    #[error("buffer error: expected {expected} bytes, got {actual}")]
    Buffer { expected: usize, actual: usize },
}

impl Error {
    /// Create a new cryptographic error
    pub fn crypto(msg: impl Into<String>) -> Self {
        Error::Crypto(msg.into())
    }

    /// Create a new key exchange error
    pub fn key_exchange(msg: impl Into<String>) -> Self {
        Error::KeyExchange(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new encoding error
    pub fn encoding(msg: impl Into<String>) -> Self {
        Error::Encoding(msg.into())
    }

    /// Check if this error happened while establishing the connection.
    ///
    /// Such a connection is discarded; it is never partially reused.
    pub fn is_handshake_failure(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::KeyExchange(_)
        )
    }

    /// Check if this error came from the deadline on the raw stream.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}
