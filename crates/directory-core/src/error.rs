//! Error types for the directory core

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Directory core error types
#[derive(Debug, Error)]
pub enum Error {
    /// Key file could not be read
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Key material could not be parsed as a private key
    #[error("key format error: {0}")]
    KeyFormat(String),

    /// Invalid public key
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid signature
    #[error("invalid signature")]
    InvalidSignature,

    /// Address does not match the hash of the presented public key
    #[error("address mismatch: computed {computed} != claimed {claimed}")]
    AddressMismatch { computed: String, claimed: String },
}
