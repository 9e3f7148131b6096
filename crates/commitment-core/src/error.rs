//! Error types for the commitment core.

use thiserror::Error;

use crate::types::Cpid;

/// Core errors raised by key handling and signature primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key for {0}")]
    InvalidPublicKey(String),

    #[error("invalid secret key for {0}")]
    InvalidSecretKey(String),

    #[error("unknown signature scheme: {0}")]
    UnknownScheme(String),

    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Validation errors for packet structure and signatures.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("packet field `{0}` is not set")]
    MissingField(&'static str),

    #[error("packet field `{0}` is empty")]
    EmptyField(&'static str),

    #[error("packet is not signed")]
    Unsigned,

    #[error("signature verification failed")]
    SignatureFailed,

    #[error("predecessor mismatch: packet links to {expected:?}, got {got:?}")]
    PredecessorMismatch {
        expected: Option<Cpid>,
        got: Option<Cpid>,
    },

    #[error("identifier mismatch: stored {stored}, computed {computed}")]
    IdMismatch { stored: Cpid, computed: Cpid },

    #[error("malformed packet: {0}")]
    Malformed(String),
}

impl From<CoreError> for ValidationError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidSignature => ValidationError::SignatureFailed,
            CoreError::InvalidPublicKey(msg)
            | CoreError::InvalidSecretKey(msg)
            | CoreError::UnknownScheme(msg)
            | CoreError::UnknownNetwork(msg)
            | CoreError::DecodingError(msg) => ValidationError::Malformed(msg),
        }
    }
}
