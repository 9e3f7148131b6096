//! In-memory chain collaborators for tests and local runs.
//!
//! [`MemoryUtxoChain`] plays both the funding service and the node for a
//! [`UtxoBackend`](crate::UtxoBackend); [`MemoryOwnershipContract`] plays the
//! contract client for an [`AccountBackend`](crate::AccountBackend). Both
//! enforce spend-once and key control, and can be switched offline to
//! exercise reconnect handling.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use commitment_core::Cpid;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::account::{ContractEvent, OwnershipContract};
use crate::error::{BackendError, Result};
use crate::keys::{ChainKey, SpendAuthorization};
use crate::utxo::{
    FundedOutpoint, FundingResponse, FundingService, Outpoint, TxOutput, UtxoNode,
    UtxoTransaction,
};

/// Connection toggles shared by both simulators.
#[derive(Debug)]
struct Link {
    connected: AtomicBool,
    refuse_reconnect: AtomicBool,
}

impl Link {
    fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            refuse_reconnect: AtomicBool::new(false),
        }
    }

    fn check(&self, what: &str) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::Disconnected(what.to_string()))
        }
    }

    fn reconnect(&self, what: &str) -> Result<()> {
        if self.refuse_reconnect.load(Ordering::SeqCst) {
            return Err(BackendError::Disconnected(format!("{what} refused reconnect")));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    m.lock()
        .map_err(|e| BackendError::Rejected(format!("state lock poisoned: {e}")))
}

fn tx_hash(tag: &str, n: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tag.as_bytes());
    hasher.update(n.to_be_bytes());
    hex::encode(hasher.finalize())
}

// ============================================================================
// UTXO chain
// ============================================================================

#[derive(Default)]
struct UtxoState {
    transactions: HashMap<String, UtxoTransaction>,
    spent: HashSet<Outpoint>,
}

/// Simulated UTXO chain with a built-in faucet.
pub struct MemoryUtxoChain {
    state: Mutex<UtxoState>,
    link: Link,
    funding_available: AtomicBool,
    funding_requests: AtomicUsize,
    spends: AtomicUsize,
    counter: AtomicU64,
}

impl MemoryUtxoChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(UtxoState::default()),
            link: Link::new(),
            funding_available: AtomicBool::new(true),
            funding_requests: AtomicUsize::new(0),
            spends: AtomicUsize::new(0),
            counter: AtomicU64::new(0),
        })
    }

    /// Drop the connection until the next successful reconnect.
    pub fn disconnect(&self) {
        self.link.connected.store(false, Ordering::SeqCst);
    }

    pub fn refuse_reconnect(&self, refuse: bool) {
        self.link.refuse_reconnect.store(refuse, Ordering::SeqCst);
    }

    /// When false the faucet answers with a failure status.
    pub fn set_funding_available(&self, available: bool) {
        self.funding_available.store(available, Ordering::SeqCst);
    }

    /// Funding requests received, successful or not.
    pub fn funding_requests(&self) -> usize {
        self.funding_requests.load(Ordering::SeqCst)
    }

    /// Spending transactions accepted.
    pub fn spends(&self) -> usize {
        self.spends.load(Ordering::SeqCst)
    }

    fn next_txid(&self) -> String {
        tx_hash("utxo", self.counter.fetch_add(1, Ordering::SeqCst))
    }

    fn locking_output(state: &UtxoState, outpoint: &Outpoint) -> Result<String> {
        let tx = state
            .transactions
            .get(&outpoint.txid)
            .ok_or_else(|| BackendError::UnknownAnchor(outpoint.to_string()))?;
        match tx.outputs.get(outpoint.vout as usize) {
            Some(TxOutput::Locking { script, .. }) => Ok(script.clone()),
            _ => Err(BackendError::UnknownAnchor(outpoint.to_string())),
        }
    }
}

#[async_trait]
impl FundingService for MemoryUtxoChain {
    async fn request_funds(&self, fee_estimate: u64, locking_script: &str) -> Result<FundingResponse> {
        self.link.check("funding service")?;
        self.funding_requests.fetch_add(1, Ordering::SeqCst);

        if !self.funding_available.load(Ordering::SeqCst) {
            return Ok(FundingResponse {
                status: "Failure".to_string(),
                outpoints: Vec::new(),
                tx: String::new(),
            });
        }

        let txid = self.next_txid();
        let tx = UtxoTransaction {
            txid: txid.clone(),
            inputs: Vec::new(),
            outputs: vec![TxOutput::Locking {
                script: locking_script.to_string(),
                value: fee_estimate,
            }],
        };
        lock(&self.state)?.transactions.insert(txid.clone(), tx);
        debug!(%txid, "funded output");

        Ok(FundingResponse {
            status: FundingResponse::SUCCESS.to_string(),
            outpoints: vec![FundedOutpoint {
                hash: txid.clone(),
                index: 0,
            }],
            tx: txid,
        })
    }
}

#[async_trait]
impl UtxoNode for MemoryUtxoChain {
    async fn spend_with_data(
        &self,
        outpoint: &Outpoint,
        payload: Bytes,
        authorization: SpendAuthorization,
    ) -> Result<String> {
        self.link.check("node")?;
        let mut state = lock(&self.state)?;

        let script = Self::locking_output(&state, outpoint)?;
        if state.spent.contains(outpoint) {
            return Err(BackendError::AlreadySpent(outpoint.to_string()));
        }
        if authorization.locking_script() != script
            || !authorization.verify(&outpoint.to_string(), &payload)
        {
            return Err(BackendError::WrongSigner(outpoint.to_string()));
        }

        let txid = self.next_txid();
        state.spent.insert(outpoint.clone());
        state.transactions.insert(
            txid.clone(),
            UtxoTransaction {
                txid: txid.clone(),
                inputs: vec![outpoint.clone()],
                outputs: vec![TxOutput::Data(payload)],
            },
        );
        self.spends.fetch_add(1, Ordering::SeqCst);
        Ok(txid)
    }

    async fn is_spent(&self, outpoint: &Outpoint) -> Result<bool> {
        self.link.check("node")?;
        let state = lock(&self.state)?;
        Self::locking_output(&state, outpoint)?;
        Ok(state.spent.contains(outpoint))
    }

    async fn get_transaction(&self, txid: &str) -> Result<Option<UtxoTransaction>> {
        self.link.check("node")?;
        Ok(lock(&self.state)?.transactions.get(txid).cloned())
    }

    async fn is_connected(&self) -> bool {
        self.link.connected.load(Ordering::SeqCst)
    }

    async fn reconnect(&self) -> Result<()> {
        self.link.reconnect("node")
    }
}

// ============================================================================
// Ownership contract
// ============================================================================

struct ContractEntry {
    owner: Vec<u8>,
    cpid: Option<Cpid>,
}

#[derive(Default)]
struct ContractState {
    entries: HashMap<u64, ContractEntry>,
    receipts: HashMap<String, Vec<ContractEvent>>,
    next_id: u64,
}

/// Simulated ownership contract on an account chain.
pub struct MemoryOwnershipContract {
    state: Mutex<ContractState>,
    link: Link,
    spends: AtomicUsize,
    counter: AtomicU64,
}

impl MemoryOwnershipContract {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ContractState::default()),
            link: Link::new(),
            spends: AtomicUsize::new(0),
            counter: AtomicU64::new(0),
        })
    }

    pub fn disconnect(&self) {
        self.link.connected.store(false, Ordering::SeqCst);
    }

    pub fn refuse_reconnect(&self, refuse: bool) {
        self.link.refuse_reconnect.store(refuse, Ordering::SeqCst);
    }

    /// Spend transactions accepted.
    pub fn spends(&self) -> usize {
        self.spends.load(Ordering::SeqCst)
    }

    fn next_hash(&self) -> String {
        format!(
            "0x{}",
            tx_hash("account", self.counter.fetch_add(1, Ordering::SeqCst))
        )
    }
}

#[async_trait]
impl OwnershipContract for MemoryOwnershipContract {
    async fn create_utxo(&self, owner: &ChainKey) -> Result<String> {
        self.link.check("contract")?;
        let mut state = lock(&self.state)?;
        let utxo_id = state.next_id;
        state.next_id += 1;
        state.entries.insert(
            utxo_id,
            ContractEntry {
                owner: owner.public_key(),
                cpid: None,
            },
        );
        let hash = self.next_hash();
        state
            .receipts
            .insert(hash.clone(), vec![ContractEvent::UtxoCreated { utxo_id }]);
        Ok(hash)
    }

    async fn spend_utxo(&self, utxo_id: u64, cpid: &Cpid, owner: &ChainKey) -> Result<String> {
        self.link.check("contract")?;
        let mut state = lock(&self.state)?;
        let entry = state
            .entries
            .get_mut(&utxo_id)
            .ok_or_else(|| BackendError::UnknownAnchor(utxo_id.to_string()))?;
        if entry.cpid.is_some() {
            return Err(BackendError::AlreadySpent(utxo_id.to_string()));
        }
        if entry.owner != owner.public_key() {
            return Err(BackendError::WrongSigner(utxo_id.to_string()));
        }
        entry.cpid = Some(*cpid);

        let hash = self.next_hash();
        state.receipts.insert(
            hash.clone(),
            vec![ContractEvent::UtxoSpent {
                utxo_id,
                cpid: *cpid,
            }],
        );
        self.spends.fetch_add(1, Ordering::SeqCst);
        Ok(hash)
    }

    async fn is_utxo_spent(&self, utxo_id: u64) -> Result<bool> {
        self.link.check("contract")?;
        lock(&self.state)?
            .entries
            .get(&utxo_id)
            .map(|e| e.cpid.is_some())
            .ok_or_else(|| BackendError::UnknownAnchor(utxo_id.to_string()))
    }

    async fn get_cpid(&self, utxo_id: u64) -> Result<Option<Cpid>> {
        self.link.check("contract")?;
        lock(&self.state)?
            .entries
            .get(&utxo_id)
            .map(|e| e.cpid)
            .ok_or_else(|| BackendError::UnknownAnchor(utxo_id.to_string()))
    }

    async fn receipt_events(&self, tx_hash: &str) -> Result<Vec<ContractEvent>> {
        self.link.check("contract")?;
        lock(&self.state)?
            .receipts
            .get(tx_hash)
            .cloned()
            .ok_or_else(|| BackendError::UnknownTransaction(tx_hash.to_string()))
    }

    async fn is_connected(&self) -> bool {
        self.link.connected.load(Ordering::SeqCst)
    }

    async fn reconnect(&self) -> Result<()> {
        self.link.reconnect("contract")
    }
}
