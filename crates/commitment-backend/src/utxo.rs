//! UTXO-chain backend.
//!
//! Anchors are spendable outputs funded by an external funding service and
//! locked to the beneficiary's chain key. A spend consumes the output and
//! carries the new packet identifier in an `OP_0 OP_RETURN <cpid>` output.
//! Raw transaction construction and broadcast belong to the node client.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use commitment_core::{Cpid, Network};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{BackendError, Result};
use crate::keys::{ChainKey, SpendAuthorization};
use crate::traits::{AnchorEvent, OwnershipBackend, OwnershipTx};

/// Satoshis locked into each anchor.
pub const ANCHOR_VALUE: u64 = 100;

/// A reference to one transaction output, encoded `txid:vout`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Outpoint {
    pub txid: String,
    pub vout: u32,
}

impl Outpoint {
    pub fn new(txid: impl Into<String>, vout: u32) -> Self {
        Self {
            txid: txid.into(),
            vout,
        }
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

impl FromStr for Outpoint {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self> {
        let (txid, vout) = s
            .split_once(':')
            .ok_or_else(|| BackendError::MalformedAnchor(s.to_string()))?;
        if txid.is_empty() {
            return Err(BackendError::MalformedAnchor(s.to_string()));
        }
        let vout = vout
            .parse()
            .map_err(|_| BackendError::MalformedAnchor(s.to_string()))?;
        Ok(Self::new(txid, vout))
    }
}

/// One funded output as reported by the funding service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundedOutpoint {
    pub hash: String,
    pub index: u32,
}

impl From<&FundedOutpoint> for Outpoint {
    fn from(o: &FundedOutpoint) -> Self {
        Outpoint::new(o.hash.clone(), o.index)
    }
}

/// Funding service reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingResponse {
    pub status: String,
    pub outpoints: Vec<FundedOutpoint>,
    /// Raw funding transaction, hex.
    pub tx: String,
}

impl FundingResponse {
    pub const SUCCESS: &'static str = "Success";

    pub fn is_success(&self) -> bool {
        self.status == Self::SUCCESS
    }
}

/// External collaborator that funds new anchors.
#[async_trait]
pub trait FundingService: Send + Sync {
    /// Request one output worth `fee_estimate` locked by `locking_script`.
    async fn request_funds(&self, fee_estimate: u64, locking_script: &str)
        -> Result<FundingResponse>;
}

/// An output of a transaction known to the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutput {
    /// Spendable output locked by a script.
    Locking { script: String, value: u64 },
    /// Unspendable data carrier.
    Data(Bytes),
}

/// Node view of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoTransaction {
    pub txid: String,
    pub inputs: Vec<Outpoint>,
    pub outputs: Vec<TxOutput>,
}

/// External collaborator that talks to a UTXO-chain node.
#[async_trait]
pub trait UtxoNode: Send + Sync {
    /// Build, sign and broadcast a transaction spending `outpoint` into a
    /// single data output. Returns the spending txid.
    async fn spend_with_data(
        &self,
        outpoint: &Outpoint,
        payload: Bytes,
        authorization: SpendAuthorization,
    ) -> Result<String>;

    /// Check if `outpoint` has been spent.
    async fn is_spent(&self, outpoint: &Outpoint) -> Result<bool>;

    /// Fetch a transaction by txid.
    async fn get_transaction(&self, txid: &str) -> Result<Option<UtxoTransaction>>;

    async fn is_connected(&self) -> bool {
        true
    }

    async fn reconnect(&self) -> Result<()> {
        Ok(())
    }
}

/// `OP_0 OP_RETURN push32 <cpid>`.
pub fn data_payload(cpid: &Cpid) -> Bytes {
    let mut script = Vec::with_capacity(35);
    script.extend_from_slice(&[0x00, 0x6a, 0x20]);
    script.extend_from_slice(cpid.as_bytes());
    Bytes::from(script)
}

/// Recover the identifier from a data payload written by [`data_payload`].
pub fn parse_data_payload(payload: &[u8]) -> Option<Cpid> {
    match payload {
        [0x00, 0x6a, 0x20, rest @ ..] => Cpid::try_from(rest).ok(),
        _ => None,
    }
}

/// Outpoint for output `vout`, if the index fits the wire's `u32`.
fn anchor_at(txid: &str, vout: usize) -> Option<Outpoint> {
    u32::try_from(vout).ok().map(|vout| Outpoint::new(txid, vout))
}

/// Backend for the UTXO chain.
pub struct UtxoBackend {
    funder: Arc<dyn FundingService>,
    node: Arc<dyn UtxoNode>,
    anchor_value: u64,
}

impl UtxoBackend {
    pub fn new(funder: Arc<dyn FundingService>, node: Arc<dyn UtxoNode>) -> Self {
        Self {
            funder,
            node,
            anchor_value: ANCHOR_VALUE,
        }
    }

    /// Override the value locked into each anchor.
    pub fn with_anchor_value(mut self, value: u64) -> Self {
        self.anchor_value = value;
        self
    }
}

#[async_trait]
impl OwnershipBackend for UtxoBackend {
    fn network(&self) -> Network {
        Network::Bsv
    }

    #[instrument(skip_all, fields(beneficiary = ?beneficiary))]
    async fn create_ownership(&self, beneficiary: &ChainKey) -> Result<OwnershipTx> {
        let response = self
            .funder
            .request_funds(self.anchor_value, &beneficiary.locking_script())
            .await?;
        if !response.is_success() {
            return Err(BackendError::MintFailed(format!(
                "funding service returned status {}",
                response.status
            )));
        }
        let first = response
            .outpoints
            .first()
            .ok_or_else(|| BackendError::MintFailed("funding returned no outpoints".into()))?;
        let anchor = Outpoint::from(first).to_string();
        info!(%anchor, "minted utxo anchor");
        Ok(OwnershipTx {
            anchor,
            tx_ref: response.tx,
        })
    }

    #[instrument(skip(self, owner), fields(cpid = %cpid))]
    async fn spend_ownership(&self, anchor: &str, cpid: &Cpid, owner: &ChainKey) -> Result<String> {
        let outpoint: Outpoint = anchor.parse()?;
        let payload = data_payload(cpid);
        let authorization = owner.authorize(anchor, &payload);
        let txid = self
            .node
            .spend_with_data(&outpoint, payload, authorization)
            .await?;
        info!(%txid, "spent utxo anchor");
        Ok(txid)
    }

    async fn tx_spent_status(&self, anchor: &str) -> Result<bool> {
        let outpoint: Outpoint = anchor.parse()?;
        self.node.is_spent(&outpoint).await
    }

    async fn get_event_and_utxo(&self, tx_ref: &str) -> Result<(AnchorEvent, String)> {
        let tx = self
            .node
            .get_transaction(tx_ref)
            .await?
            .ok_or_else(|| BackendError::UnknownTransaction(tx_ref.to_string()))?;

        let carries_data = tx.outputs.iter().any(|o| matches!(o, TxOutput::Data(_)));
        if carries_data {
            if let Some(input) = tx.inputs.first() {
                return Ok((AnchorEvent::Spent, input.to_string()));
            }
        }

        tx.outputs
            .iter()
            .position(|o| matches!(o, TxOutput::Locking { .. }))
            .and_then(|vout| anchor_at(&tx.txid, vout))
            .map(|anchor| (AnchorEvent::Created, anchor.to_string()))
            .ok_or_else(|| BackendError::NoAnchorEvent(tx_ref.to_string()))
    }

    async fn embedded_cpid(&self, tx_ref: &str) -> Result<Option<Cpid>> {
        let tx = self
            .node
            .get_transaction(tx_ref)
            .await?
            .ok_or_else(|| BackendError::UnknownTransaction(tx_ref.to_string()))?;
        let found = tx.outputs.iter().find_map(|o| match o {
            TxOutput::Data(payload) => parse_data_payload(payload),
            TxOutput::Locking { .. } => None,
        });
        debug!(tx = tx_ref, found = found.is_some(), "read embedded reference");
        Ok(found)
    }

    async fn is_connected(&self) -> bool {
        self.node.is_connected().await
    }

    async fn reconnect(&self) -> Result<()> {
        self.node.reconnect().await
    }
}
