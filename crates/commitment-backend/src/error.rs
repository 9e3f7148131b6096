//! Error types for ownership-transaction backends.

use thiserror::Error;

/// Errors raised by a backend or its chain collaborators.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The chain client lost its connection. The only retryable error.
    #[error("backend disconnected: {0}")]
    Disconnected(String),

    /// Funding or gas for a new anchor could not be secured.
    #[error("minting failed: {0}")]
    MintFailed(String),

    /// The anchor was already consumed.
    #[error("anchor already spent: {0}")]
    AlreadySpent(String),

    /// The signer does not control the anchor.
    #[error("signer does not control anchor {0}")]
    WrongSigner(String),

    /// The chain has no record of this anchor.
    #[error("unknown anchor: {0}")]
    UnknownAnchor(String),

    /// The chain has no record of this transaction.
    #[error("unknown transaction: {0}")]
    UnknownTransaction(String),

    /// The transaction neither created nor spent an anchor.
    #[error("transaction {0} carries no anchor event")]
    NoAnchorEvent(String),

    /// The anchor reference could not be decoded.
    #[error("malformed anchor reference: {0}")]
    MalformedAnchor(String),

    /// Key material could not be decoded.
    #[error("invalid chain key: {0}")]
    InvalidKey(String),

    /// The chain rejected the request for another reason.
    #[error("rejected by chain: {0}")]
    Rejected(String),
}

impl BackendError {
    /// Check if a reconnect may fix this error.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, BackendError::Disconnected(_))
    }
}

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;
