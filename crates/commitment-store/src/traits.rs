//! Ledger trait: the abstract interface for commitment record persistence.
//!
//! Implementations provide the two mutators and the primitive reads. Every
//! protocol query is derived from those in [`LedgerExt`], so all backends
//! answer them identically.

use std::collections::HashSet;

use async_trait::async_trait;
use commitment_core::{
    CommitmentPacket, CommitmentPacketMetadata, CommitmentState, Cpid, Network,
};
use tracing::warn;

use crate::error::Result;

/// The Ledger trait: async interface for commitment records.
///
/// # Design Notes
///
/// - **Append plus single update**: records are never deleted. `append` adds a
///   new record, `replace` swaps an existing one with the same identifier.
/// - **Single writer**: each mutation is persisted before it returns and
///   mutations are mutually excluded, so readers see either the old or the new
///   record, never a torn one.
/// - **Recomputed identifiers**: a stored identifier that does not match its
///   packet is rejected on write and on load.
#[async_trait]
pub trait Ledger: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Mutators
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a new record.
    ///
    /// Fails with `Duplicate` if a record with the same identifier exists.
    async fn append(&self, record: &CommitmentPacketMetadata) -> Result<()>;

    /// Replace an existing record in place.
    ///
    /// Fails with `NotFound` if no record has this identifier.
    async fn replace(&self, record: &CommitmentPacketMetadata) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Primitive Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a record by its identifier.
    async fn by_cpid(&self, id: &Cpid) -> Result<Option<CommitmentPacketMetadata>>;

    /// All records, in append order.
    async fn records(&self) -> Result<Vec<CommitmentPacketMetadata>>;

    /// Number of records.
    async fn len(&self) -> Result<usize> {
        Ok(self.records().await?.len())
    }

    /// Check if the ledger holds no records.
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

/// Why a chain walk stopped before reaching a root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainBreak {
    /// A linked identifier has no record.
    Missing(Cpid),
    /// A linked identifier was already visited in this walk.
    Cycle(Cpid),
}

impl ChainBreak {
    pub fn cpid(&self) -> Cpid {
        match self {
            ChainBreak::Missing(id) | ChainBreak::Cycle(id) => *id,
        }
    }
}

/// Lazy cursor over a packet chain, newest first.
///
/// Yields `(Cpid, CommitmentPacket)` pairs following `previous_packet` links
/// until the root. A missing link ends the walk and is kept in
/// [`broken`](Self::broken) rather than raised.
pub struct ChainWalk<'a, L: Ledger + ?Sized> {
    ledger: &'a L,
    start: Cpid,
    next: Option<Cpid>,
    visited: HashSet<Cpid>,
    broken: Option<ChainBreak>,
}

impl<'a, L: Ledger + ?Sized> ChainWalk<'a, L> {
    /// Start a walk at `start`.
    pub fn new(ledger: &'a L, start: Cpid) -> Self {
        Self {
            ledger,
            start,
            next: Some(start),
            visited: HashSet::new(),
            broken: None,
        }
    }

    /// Advance to the next link.
    pub async fn next(&mut self) -> Result<Option<(Cpid, CommitmentPacket)>> {
        let Some(id) = self.next.take() else {
            return Ok(None);
        };

        if !self.visited.insert(id) {
            warn!(cpid = %id, "packet chain revisits a link");
            self.broken = Some(ChainBreak::Cycle(id));
            return Ok(None);
        }

        match self.ledger.by_cpid(&id).await? {
            Some(record) => {
                self.next = record.previous();
                Ok(Some((id, record.commitment_packet)))
            }
            None => {
                warn!(cpid = %id, start = %self.start, "packet chain has a missing link");
                self.broken = Some(ChainBreak::Missing(id));
                Ok(None)
            }
        }
    }

    /// The reason the walk stopped early, if it did.
    pub fn broken(&self) -> Option<ChainBreak> {
        self.broken
    }

    /// Rewind to the starting identifier.
    pub fn restart(&mut self) {
        self.next = Some(self.start);
        self.visited.clear();
        self.broken = None;
    }

    /// Drain the remaining links.
    pub async fn collect(mut self) -> Result<ChainHistory> {
        let mut links = Vec::new();
        while let Some(link) = self.next().await? {
            links.push(link);
        }
        Ok(ChainHistory {
            links,
            broken: self.broken,
        })
    }
}

/// A materialized chain, newest first.
#[derive(Debug, Clone)]
pub struct ChainHistory {
    pub links: Vec<(Cpid, CommitmentPacket)>,
    pub broken: Option<ChainBreak>,
}

impl ChainHistory {
    /// Check if the walk reached a root without a break.
    pub fn is_complete(&self) -> bool {
        self.broken.is_none() && !self.links.is_empty()
    }

    /// Chain root, if the walk reached it.
    pub fn root(&self) -> Option<&(Cpid, CommitmentPacket)> {
        self.links
            .last()
            .filter(|(_, packet)| self.broken.is_none() && packet.is_issuance())
    }
}

/// Extension trait: the protocol queries, derived from the primitive reads.
pub trait LedgerExt: Ledger {
    /// Records owned by `actor`.
    fn by_actor(
        &self,
        actor: &str,
    ) -> impl std::future::Future<Output = Result<Vec<CommitmentPacketMetadata>>> + Send;

    /// Records owned by `actor` whose own anchor has not been spent.
    fn by_actor_unspent(
        &self,
        actor: &str,
    ) -> impl std::future::Future<Output = Result<Vec<CommitmentPacketMetadata>>> + Send;

    /// Transfer templates awaiting `actor`'s authorization.
    ///
    /// Transfer-typed, still `Created`, still unsigned, owned by someone else,
    /// and superseding a packet that `actor` owns.
    fn pending_transfers_into(
        &self,
        actor: &str,
    ) -> impl std::future::Future<Output = Result<Vec<CommitmentPacketMetadata>>> + Send;

    /// True iff no `Created` record matches the asset instance on `network`.
    fn is_unique(
        &self,
        asset_id: &str,
        data: &str,
        network: Network,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Check if a record with this identifier exists.
    fn is_known(&self, id: &Cpid) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Transfer eligibility.
    ///
    /// False if the record is missing or `Transferred`. Otherwise true iff
    /// `actor` owning the record matches `as_owner`: with `as_owner = false`
    /// this asks whether `actor` may receive it, with `as_owner = true`
    /// whether `actor` may authorize it.
    fn can_transfer(
        &self,
        id: &Cpid,
        actor: &str,
        as_owner: bool,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Completion eligibility: the template exists, is not `Transferred`, is
    /// not owned by `actor`, and `actor` may authorize its predecessor.
    fn can_complete(
        &self,
        id: &Cpid,
        actor: &str,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Start a lazy walk from `id` back to the root.
    fn chain_from(&self, id: Cpid) -> ChainWalk<'_, Self>;

    /// Walk from `id` to the root and collect every link.
    fn history(&self, id: Cpid) -> impl std::future::Future<Output = Result<ChainHistory>> + Send;
}

impl<L: Ledger + ?Sized> LedgerExt for L {
    async fn by_actor(&self, actor: &str) -> Result<Vec<CommitmentPacketMetadata>> {
        let records = self.records().await?;
        Ok(records.into_iter().filter(|r| r.owner == actor).collect())
    }

    async fn by_actor_unspent(&self, actor: &str) -> Result<Vec<CommitmentPacketMetadata>> {
        let records = self.records().await?;
        Ok(records
            .into_iter()
            .filter(|r| r.owner == actor && !r.is_spent())
            .collect())
    }

    async fn pending_transfers_into(&self, actor: &str) -> Result<Vec<CommitmentPacketMetadata>> {
        let records = self.records().await?;
        let mut pending = Vec::new();
        for record in records {
            if record.owner == actor || !record.is_pending_transfer() {
                continue;
            }
            let Some(prev) = record.previous() else {
                continue;
            };
            match self.by_cpid(&prev).await? {
                Some(predecessor) if predecessor.owner == actor => pending.push(record),
                Some(_) => {}
                None => warn!(cpid = %record.cpid(), prev = %prev, "template predecessor missing"),
            }
        }
        Ok(pending)
    }

    async fn is_unique(&self, asset_id: &str, data: &str, network: Network) -> Result<bool> {
        let records = self.records().await?;
        Ok(!records
            .iter()
            .any(|r| r.is_match(asset_id, data, network, CommitmentState::Created)))
    }

    async fn is_known(&self, id: &Cpid) -> Result<bool> {
        Ok(self.by_cpid(id).await?.is_some())
    }

    async fn can_transfer(&self, id: &Cpid, actor: &str, as_owner: bool) -> Result<bool> {
        let Some(record) = self.by_cpid(id).await? else {
            return Ok(false);
        };
        if !record.is_created() {
            return Ok(false);
        }
        Ok((record.owner == actor) == as_owner)
    }

    async fn can_complete(&self, id: &Cpid, actor: &str) -> Result<bool> {
        let Some(record) = self.by_cpid(id).await? else {
            return Ok(false);
        };
        if !record.is_created() || record.owner == actor {
            return Ok(false);
        }
        match record.previous() {
            Some(prev) => self.can_transfer(&prev, actor, true).await,
            None => Ok(false),
        }
    }

    fn chain_from(&self, id: Cpid) -> ChainWalk<'_, Self> {
        ChainWalk::new(self, id)
    }

    async fn history(&self, id: Cpid) -> Result<ChainHistory> {
        ChainWalk::new(self, id).collect().await
    }
}
