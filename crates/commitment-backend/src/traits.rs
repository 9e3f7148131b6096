//! Ownership-transaction backend: the capability interface the engine uses to
//! mint, spend and inspect uniqueness anchors.
//!
//! Both implementations satisfy the same contract: an anchor can be spent at
//! most once, spending without the controlling key fails, and the reference
//! embedded by a spend can be read back byte-for-byte.

use async_trait::async_trait;
use commitment_core::{Cpid, Network};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::keys::ChainKey;

/// A freshly minted anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipTx {
    /// Value stored as the packet's `blockchain_outpoint`.
    pub anchor: String,
    /// The creating transaction (raw hex on a UTXO chain, a hash elsewhere).
    pub tx_ref: String,
}

/// What a transaction did to an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnchorEvent {
    Created,
    Spent,
}

/// Backend trait for one network.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OwnershipBackend: Send + Sync {
    /// The network tag this backend anchors on.
    fn network(&self) -> Network;

    /// Mint a fresh anchor locked to `beneficiary`.
    ///
    /// Fails with `MintFailed` if funding or gas cannot be secured.
    async fn create_ownership(&self, beneficiary: &ChainKey) -> Result<OwnershipTx>;

    /// Consume `anchor`, embedding `cpid` in the spending transaction.
    ///
    /// Returns the spending transaction reference. Fails with `AlreadySpent`
    /// or `WrongSigner` rather than succeeding twice.
    async fn spend_ownership(&self, anchor: &str, cpid: &Cpid, owner: &ChainKey) -> Result<String>;

    /// Check if `anchor` has been consumed.
    async fn tx_spent_status(&self, anchor: &str) -> Result<bool>;

    /// Recover which anchor a transaction created or spent.
    async fn get_event_and_utxo(&self, tx_ref: &str) -> Result<(AnchorEvent, String)>;

    /// Read back the identifier embedded by a spending transaction.
    async fn embedded_cpid(&self, tx_ref: &str) -> Result<Option<Cpid>>;

    /// Check if the chain client is connected.
    async fn is_connected(&self) -> bool {
        true
    }

    /// Re-establish the chain client connection.
    async fn reconnect(&self) -> Result<()> {
        Ok(())
    }
}
