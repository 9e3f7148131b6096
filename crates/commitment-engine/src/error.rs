//! Error types for the engine.
//!
//! Protocol failures fall into four categories (see [`ErrorCategory`]):
//! rejected requests, backend failures, protocol violations and integrity
//! problems. Requests and protocol violations are always detected before any
//! backend call, so they never leave chain or ledger state behind.

use commitment_backend::BackendError;
use commitment_core::{Cpid, Network, ValidationError};
use commitment_store::StoreError;
use thiserror::Error;

/// A request the engine refuses to act on.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("unknown actor: {0}")]
    UnknownActor(String),

    #[error("network {0} is not enabled")]
    UnknownNetwork(Network),

    #[error("actor {actor} holds no anchor key for {network}")]
    NoAnchorKey { actor: String, network: Network },

    #[error("unknown packet: {0}")]
    UnknownCpid(Cpid),

    #[error("token {0} is not registered")]
    TokenNotRegistered(String),

    #[error("token {0} is already assigned")]
    TokenUnavailable(String),

    #[error("{asset_id}/{data} already has a live commitment on {network}")]
    NotUnique {
        asset_id: String,
        data: String,
        network: Network,
    },

    #[error("malformed packet: {0}")]
    MalformedPacket(#[from] ValidationError),
}

/// A request that breaks the ownership rules.
#[derive(Debug, Error)]
pub enum ProtocolViolation {
    #[error("{actor} cannot receive {cpid}")]
    NotTransferable { cpid: Cpid, actor: String },

    #[error("{actor} is not authorized to complete {cpid}")]
    NotAuthorized { cpid: Cpid, actor: String },

    #[error("{0} was already transferred")]
    AlreadyTransferred(Cpid),

    #[error("signature on {0} does not verify")]
    SignatureInvalid(Cpid),

    #[error("anchor {0} is already spent on chain")]
    AnchorSpent(String),
}

/// Token registry failures.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("unknown token: {0}")]
    UnknownToken(String),

    #[error("token {0} is already assigned")]
    AlreadyAssigned(String),

    #[error("{actor} does not hold token {token_id}")]
    NotHeld { actor: String, token_id: String },

    #[error("registry i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Backend,
    Protocol,
    Integrity,
    /// Storage, registry or configuration failures.
    Internal,
}

/// Errors returned by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    Validation(#[from] RequestError),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// The backend stayed disconnected after one reconnect and retry.
    #[error("backend for {network} unavailable: {source}")]
    BackendUnavailable {
        network: Network,
        #[source]
        source: BackendError,
    },

    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("token registry error: {0}")]
    Registry(#[from] TokenError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// The category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::Validation(_) => ErrorCategory::Validation,
            EngineError::Backend(_) | EngineError::BackendUnavailable { .. } => {
                ErrorCategory::Backend
            }
            EngineError::Protocol(_) => ErrorCategory::Protocol,
            EngineError::Integrity(_) | EngineError::Store(StoreError::IdMismatch { .. }) => {
                ErrorCategory::Integrity
            }
            EngineError::Store(_) | EngineError::Registry(_) | EngineError::Config(_) => {
                ErrorCategory::Internal
            }
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let e: EngineError = RequestError::UnknownActor("mallory".into()).into();
        assert_eq!(e.category(), ErrorCategory::Validation);

        let e: EngineError = ProtocolViolation::AlreadyTransferred(Cpid::from_bytes([1; 32])).into();
        assert_eq!(e.category(), ErrorCategory::Protocol);

        let e = EngineError::BackendUnavailable {
            network: Network::Eth,
            source: BackendError::Disconnected("contract".into()),
        };
        assert_eq!(e.category(), ErrorCategory::Backend);

        let e: EngineError = StoreError::IdMismatch {
            stored: Cpid::from_bytes([1; 32]),
            computed: Cpid::from_bytes([2; 32]),
        }
        .into();
        assert_eq!(e.category(), ErrorCategory::Integrity);

        let e = EngineError::Config("bad".into());
        assert_eq!(e.category(), ErrorCategory::Internal);
    }
}
