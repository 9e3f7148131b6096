//! In-memory implementation of the Ledger trait.
//!
//! This is primarily for testing. It has the same semantics as the persistent
//! ledgers but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use commitment_core::{CommitmentPacketMetadata, Cpid};

use crate::error::{Result, StoreError};
use crate::traits::Ledger;

/// Ordered records plus an identifier index.
///
/// Shared by the in-memory and snapshot ledgers.
#[derive(Debug, Clone, Default)]
pub(crate) struct LedgerState {
    /// Records in append order.
    records: Vec<CommitmentPacketMetadata>,

    /// Identifier -> position in `records`.
    index: HashMap<Cpid, usize>,
}

impl LedgerState {
    /// Rebuild from loaded records, recomputing every identifier.
    pub(crate) fn from_records(records: Vec<CommitmentPacketMetadata>) -> Result<Self> {
        let mut state = Self::default();
        for record in records {
            state.append(record)?;
        }
        Ok(state)
    }

    pub(crate) fn append(&mut self, record: CommitmentPacketMetadata) -> Result<()> {
        check_id(&record)?;
        let id = record.cpid();
        if self.index.contains_key(&id) {
            return Err(StoreError::Duplicate(id));
        }
        self.index.insert(id, self.records.len());
        self.records.push(record);
        Ok(())
    }

    pub(crate) fn replace(&mut self, record: CommitmentPacketMetadata) -> Result<()> {
        check_id(&record)?;
        let id = record.cpid();
        let position = *self.index.get(&id).ok_or(StoreError::NotFound(id))?;
        self.records[position] = record;
        Ok(())
    }

    pub(crate) fn get(&self, id: &Cpid) -> Option<&CommitmentPacketMetadata> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    pub(crate) fn records(&self) -> &[CommitmentPacketMetadata] {
        &self.records
    }
}

/// Reject a record whose stored identifier does not match its packet.
pub(crate) fn check_id(record: &CommitmentPacketMetadata) -> Result<()> {
    let computed = record.commitment_packet.identifier();
    if computed != record.commitment_packet_id {
        return Err(StoreError::IdMismatch {
            stored: record.commitment_packet_id,
            computed,
        });
    }
    Ok(())
}

pub(crate) fn poisoned<T>(e: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Poisoned(e.to_string())
}

/// In-memory ledger implementation.
///
/// All data is lost when the ledger is dropped. Thread-safe via RwLock.
pub struct MemoryLedger {
    inner: RwLock<LedgerState>,
}

impl MemoryLedger {
    /// Create a new empty in-memory ledger.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LedgerState::default()),
        }
    }

    /// Create a ledger pre-populated with records.
    pub fn with_records(records: Vec<CommitmentPacketMetadata>) -> Result<Self> {
        Ok(Self {
            inner: RwLock::new(LedgerState::from_records(records)?),
        })
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn append(&self, record: &CommitmentPacketMetadata) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.append(record.clone())
    }

    async fn replace(&self, record: &CommitmentPacketMetadata) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.replace(record.clone())
    }

    async fn by_cpid(&self, id: &Cpid) -> Result<Option<CommitmentPacketMetadata>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.get(id).cloned())
    }

    async fn records(&self) -> Result<Vec<CommitmentPacketMetadata>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.records().to_vec())
    }

    async fn len(&self) -> Result<usize> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.records().len())
    }
}
