//! Account-chain backend.
//!
//! Anchors are UTXO-like entries held by an ownership contract. The
//! packet's `blockchain_outpoint` is the hash of the creating transaction;
//! the contract's own entry id is recovered from that transaction's events.

use std::sync::Arc;

use async_trait::async_trait;
use commitment_core::{Cpid, Network};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::{BackendError, Result};
use crate::keys::ChainKey;
use crate::traits::{AnchorEvent, OwnershipBackend, OwnershipTx};

/// An event emitted by the ownership contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractEvent {
    UtxoCreated { utxo_id: u64 },
    UtxoSpent { utxo_id: u64, cpid: Cpid },
}

/// External collaborator: a client for the ownership contract.
#[async_trait]
pub trait OwnershipContract: Send + Sync {
    /// Create an entry controlled by `owner`. Returns the transaction hash.
    async fn create_utxo(&self, owner: &ChainKey) -> Result<String>;

    /// Spend entry `utxo_id`, recording `cpid`. Returns the transaction hash.
    async fn spend_utxo(&self, utxo_id: u64, cpid: &Cpid, owner: &ChainKey) -> Result<String>;

    async fn is_utxo_spent(&self, utxo_id: u64) -> Result<bool>;

    /// The identifier recorded when `utxo_id` was spent.
    async fn get_cpid(&self, utxo_id: u64) -> Result<Option<Cpid>>;

    /// Events in the receipt of `tx_hash`.
    async fn receipt_events(&self, tx_hash: &str) -> Result<Vec<ContractEvent>>;

    async fn is_connected(&self) -> bool {
        true
    }

    async fn reconnect(&self) -> Result<()> {
        Ok(())
    }
}

/// Backend for the account chain.
pub struct AccountBackend {
    contract: Arc<dyn OwnershipContract>,
}

impl AccountBackend {
    pub fn new(contract: Arc<dyn OwnershipContract>) -> Self {
        Self { contract }
    }

    /// Resolve the contract entry created by the transaction `anchor`.
    async fn utxo_id(&self, anchor: &str) -> Result<u64> {
        let events = self.contract.receipt_events(anchor).await?;
        events
            .iter()
            .find_map(|e| match e {
                ContractEvent::UtxoCreated { utxo_id } => Some(*utxo_id),
                ContractEvent::UtxoSpent { .. } => None,
            })
            .ok_or_else(|| BackendError::NoAnchorEvent(anchor.to_string()))
    }
}

#[async_trait]
impl OwnershipBackend for AccountBackend {
    fn network(&self) -> Network {
        Network::Eth
    }

    #[instrument(skip_all, fields(beneficiary = ?beneficiary))]
    async fn create_ownership(&self, beneficiary: &ChainKey) -> Result<OwnershipTx> {
        let tx_hash = self.contract.create_utxo(beneficiary).await?;
        info!(anchor = %tx_hash, "created contract anchor");
        Ok(OwnershipTx {
            anchor: tx_hash.clone(),
            tx_ref: tx_hash,
        })
    }

    #[instrument(skip(self, owner), fields(cpid = %cpid))]
    async fn spend_ownership(&self, anchor: &str, cpid: &Cpid, owner: &ChainKey) -> Result<String> {
        let utxo_id = self.utxo_id(anchor).await?;
        let tx_hash = self.contract.spend_utxo(utxo_id, cpid, owner).await?;
        info!(utxo_id, tx = %tx_hash, "spent contract anchor");
        Ok(tx_hash)
    }

    async fn tx_spent_status(&self, anchor: &str) -> Result<bool> {
        let utxo_id = self.utxo_id(anchor).await?;
        self.contract.is_utxo_spent(utxo_id).await
    }

    async fn get_event_and_utxo(&self, tx_ref: &str) -> Result<(AnchorEvent, String)> {
        let events = self.contract.receipt_events(tx_ref).await?;
        match events.first() {
            Some(ContractEvent::UtxoCreated { utxo_id }) => {
                Ok((AnchorEvent::Created, utxo_id.to_string()))
            }
            Some(ContractEvent::UtxoSpent { utxo_id, .. }) => {
                Ok((AnchorEvent::Spent, utxo_id.to_string()))
            }
            None => Err(BackendError::NoAnchorEvent(tx_ref.to_string())),
        }
    }

    async fn embedded_cpid(&self, tx_ref: &str) -> Result<Option<Cpid>> {
        let (event, utxo_id) = self.get_event_and_utxo(tx_ref).await?;
        if event != AnchorEvent::Spent {
            return Ok(None);
        }
        let utxo_id = utxo_id
            .parse()
            .map_err(|_| BackendError::MalformedAnchor(utxo_id.clone()))?;
        self.contract.get_cpid(utxo_id).await
    }

    async fn is_connected(&self) -> bool {
        self.contract.is_connected().await
    }

    async fn reconnect(&self) -> Result<()> {
        self.contract.reconnect().await
    }
}
