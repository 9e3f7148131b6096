//! The Engine: issuance, transfer and verification of packet chains.
//!
//! The engine coordinates the signature chain, the backends and the ledger.
//! Every check that can reject a request runs before the first backend call,
//! so a rejected operation never touches chain state or the ledger.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use commitment_core::{
    check_packet_signature, validate_packet_structure, CommitmentPacket,
    CommitmentPacketMetadata, CommitmentState, CommitmentType, Cpid, Network, PacketBuilder,
    SignatureCheck, ValidationError,
};
use commitment_store::{ChainBreak, ChainHistory, Ledger, LedgerExt};
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, instrument, warn};

use crate::actors::ActorRegistry;
use crate::backends::Backends;
use crate::config::{EngineConfig, EngineSettings};
use crate::error::{EngineError, ProtocolViolation, RequestError, Result};
use crate::tokens::{MemoryTokenRegistry, TokenRegistry};

type LineageKey = (String, String);
type LineageLocks = Mutex<HashMap<LineageKey, Arc<tokio::sync::Mutex<()>>>>;

/// Holds one lineage's lock. On release the lock's entry is removed unless
/// another operation is already waiting on it.
struct LineageGuard<'a> {
    lineages: &'a LineageLocks,
    key: LineageKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for LineageGuard<'_> {
    fn drop(&mut self) {
        // The guard holds a clone of the Arc; release it before counting.
        drop(self.guard.take());
        let mut lineages = self.lineages.lock().unwrap_or_else(PoisonError::into_inner);
        if lineages
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            lineages.remove(&self.key);
        }
    }
}

/// Signature state of every hop from a packet back to its root.
#[derive(Debug, Clone)]
pub struct ProvenanceReport {
    /// Newest first.
    pub hops: Vec<(Cpid, SignatureCheck)>,
    /// Set when the walk stopped before a root.
    pub broken: Option<ChainBreak>,
}

impl ProvenanceReport {
    /// True iff the chain reaches its root and every hop verifies.
    pub fn is_verified(&self) -> bool {
        self.broken.is_none()
            && !self.hops.is_empty()
            && self.hops.iter().all(|(_, check)| check.is_valid())
    }
}

/// One hop of a [`StatusReport`].
#[derive(Debug, Clone, Serialize)]
pub struct HopStatus {
    pub cpid: Cpid,
    pub owner: String,
    #[serde(rename = "type")]
    pub kind: CommitmentType,
    pub state: CommitmentState,
    pub asset_id: String,
    pub data: String,
    pub network: Network,
    pub blockchain_outpoint: String,
    pub previous_packet: Option<Cpid>,
    /// Actor whose token key is the packet's beneficiary key.
    pub public_key_owner: Option<String>,
    pub signature: SignatureCheck,
}

/// Per-hop view of a chain, newest first.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub hops: Vec<HopStatus>,
    pub broken: Option<ChainBreak>,
}

/// Engine-wide status.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub actors: Vec<String>,
    /// Enabled networks and whether their backend is connected.
    pub networks: Vec<(Network, bool)>,
    pub records: usize,
}

/// The commitment protocol engine.
///
/// Operations on one lineage (an `(asset_id, data)` pair) are serialized by
/// an async lock held across backend calls. Distinct lineages run in
/// parallel. An operation that has issued a backend call runs to its end
/// before the lineage is released; callers should not drop its future.
pub struct Engine<L: Ledger + ?Sized = dyn Ledger, T: TokenRegistry + ?Sized = dyn TokenRegistry> {
    settings: EngineSettings,
    actors: ActorRegistry,
    ledger: Arc<L>,
    backends: Backends,
    tokens: Arc<T>,
    networks: BTreeSet<Network>,
    lineages: LineageLocks,
}

impl Engine {
    /// Build an engine from a configuration file and the chain backends.
    ///
    /// Every enabled network needs a backend; backends for networks that are
    /// not enabled are dropped.
    pub fn from_config(config: &EngineConfig, backends: Backends) -> Result<Self> {
        let backends = backends.only(&config.networks);
        for network in &config.networks {
            if backends.get(*network).is_none() {
                return Err(EngineError::Config(format!("no backend for {network}")));
            }
        }
        let actors = ActorRegistry::from_config(&config.actors)?;
        let ledger = config.ledger.open()?;
        let tokens: Arc<dyn TokenRegistry> = Arc::new(MemoryTokenRegistry::open(
            &config.tokens,
            config.token_store.path.clone(),
        )?);
        Ok(Self::new(
            config.engine.clone(),
            actors,
            ledger,
            backends,
            tokens,
        ))
    }
}

impl<L: Ledger + ?Sized, T: TokenRegistry + ?Sized> Engine<L, T> {
    /// Create a new engine. Enabled networks are those with a backend.
    pub fn new(
        settings: EngineSettings,
        actors: ActorRegistry,
        ledger: Arc<L>,
        backends: Backends,
        tokens: Arc<T>,
    ) -> Self {
        let networks = backends.networks().into_iter().collect();
        Self {
            settings,
            actors,
            ledger,
            backends,
            tokens,
            networks,
            lineages: Mutex::new(HashMap::new()),
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn tokens(&self) -> &T {
        &self.tokens
    }

    pub fn actors(&self) -> &ActorRegistry {
        &self.actors
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn is_known_actor(&self, name: &str) -> bool {
        self.actors.contains(name)
    }

    pub fn is_known_network(&self, network: Network) -> bool {
        self.networks.contains(&network)
    }

    fn require_network(&self, network: Network) -> Result<()> {
        if self.is_known_network(network) {
            Ok(())
        } else {
            Err(RequestError::UnknownNetwork(network).into())
        }
    }

    async fn require_record(&self, id: &Cpid) -> Result<CommitmentPacketMetadata> {
        self.ledger
            .by_cpid(id)
            .await?
            .ok_or_else(|| RequestError::UnknownCpid(*id).into())
    }

    async fn lock_lineage(&self, asset_id: &str, data: &str) -> LineageGuard<'_> {
        let key = (asset_id.to_string(), data.to_string());
        let lock = {
            let mut lineages = self.lineages.lock().unwrap_or_else(PoisonError::into_inner);
            lineages.entry(key.clone()).or_default().clone()
        };
        LineageGuard {
            lineages: &self.lineages,
            key,
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Signature state of a record's packet against its stored predecessor.
    async fn signature_of(&self, record: &CommitmentPacketMetadata) -> Result<SignatureCheck> {
        let predecessor = match record.previous() {
            Some(prev) => match self.ledger.by_cpid(&prev).await? {
                Some(p) => Some(p.commitment_packet),
                None => {
                    warn!(cpid = %record.cpid(), prev = %prev, "predecessor missing, cannot verify");
                    None
                }
            },
            None => None,
        };
        Ok(check_packet_signature(
            &record.commitment_packet,
            predecessor.as_ref(),
        ))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Protocol Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Issue a new lineage root owned by `actor`.
    ///
    /// The token must be registered and available, and no live record may
    /// exist for the same asset instance on `network`. The root packet is
    /// self-attested with the issuer's token key.
    #[instrument(skip(self), fields(actor = %actor, network = %network))]
    pub async fn issue(
        &self,
        actor: &str,
        asset_id: &str,
        data: &str,
        network: Network,
    ) -> Result<(Cpid, CommitmentPacket)> {
        // 1. Validate the request
        let issuer = self.actors.require(actor)?;
        self.require_network(network)?;
        let chain_key = issuer.require_chain_key(network)?;
        check_fields(asset_id, data)?;

        let _lineage = self.lock_lineage(asset_id, data).await;

        if !self.tokens.is_registered(data).await? {
            return Err(RequestError::TokenNotRegistered(data.to_string()).into());
        }
        if !self.ledger.is_unique(asset_id, data, network).await? {
            return Err(RequestError::NotUnique {
                asset_id: asset_id.to_string(),
                data: data.to_string(),
                network,
            }
            .into());
        }
        if !self.tokens.is_available(data).await? {
            return Err(RequestError::TokenUnavailable(data.to_string()).into());
        }

        // 2. Mint the anchor
        let minted = self
            .backends
            .call(network, |b| async move { b.create_ownership(chain_key).await })
            .await?;

        // 3. Build and self-sign the root
        let packet = PacketBuilder::new(asset_id, data)
            .network(network)
            .outpoint(minted.anchor)
            .beneficiary(issuer.public_key(), issuer.scheme())
            .sign(issuer.token_key())
            .map_err(RequestError::from)?;
        validate_packet_structure(&packet).map_err(RequestError::from)?;

        // 4. Record
        let record = CommitmentPacketMetadata::new(
            issuer.name(),
            CommitmentType::Issuance,
            Some(minted.tx_ref),
            packet.clone(),
        );
        let cpid = record.cpid();
        self.ledger.append(&record).await?;

        if let Err(e) = self.tokens.assign(issuer.name(), data, cpid).await {
            warn!(%cpid, token = data, error = %e, "token registry disagrees after issuance");
        }

        info!(%cpid, asset_id, data, "issued commitment");
        Ok((cpid, packet))
    }

    /// Propose transferring `source` to `recipient` on `network`.
    ///
    /// Appends an unsigned transfer template owned by `recipient`. Ownership
    /// stays provisional until the current owner completes the transfer.
    #[instrument(skip(self), fields(cpid = %source, recipient = %recipient, network = %network))]
    pub async fn propose_transfer(
        &self,
        source: Cpid,
        recipient: &str,
        network: Network,
    ) -> Result<(Cpid, CommitmentPacket)> {
        // 1. Validate the request
        let receiver = self.actors.require(recipient)?;
        self.require_network(network)?;
        let chain_key = receiver.require_chain_key(network)?;

        let first_read = self.require_record(&source).await?;
        let asset_id = first_read.commitment_packet.asset_id.clone();
        let data = first_read.commitment_packet.data.clone();
        let _lineage = self.lock_lineage(&asset_id, &data).await;
        let original = self.require_record(&source).await?;

        // 2. Protocol checks
        if original.state.is_terminal() {
            return Err(ProtocolViolation::AlreadyTransferred(source).into());
        }
        if !self.ledger.can_transfer(&source, recipient, false).await? {
            return Err(ProtocolViolation::NotTransferable {
                cpid: source,
                actor: recipient.to_string(),
            }
            .into());
        }
        if !self.signature_of(&original).await?.is_valid() {
            return Err(ProtocolViolation::SignatureInvalid(source).into());
        }
        let source_network = original.commitment_packet.blockchain_id;
        if self.settings.check_anchor_status {
            let anchor = original.commitment_packet.blockchain_outpoint.as_str();
            let spent = self
                .backends
                .call(source_network, |b| async move { b.tx_spent_status(anchor).await })
                .await?;
            if spent {
                return Err(ProtocolViolation::AnchorSpent(anchor.to_string()).into());
            }
        }
        if !self.tokens.owned_by(&original.owner, &data).await? {
            warn!(owner = %original.owner, token = %data, "token registry disagrees with source owner");
        }

        // 3. Mint the recipient's anchor
        let minted = self
            .backends
            .call(network, |b| async move { b.create_ownership(chain_key).await })
            .await?;

        // 4. Build the unsigned template
        let packet = PacketBuilder::new(asset_id, data)
            .network(network)
            .outpoint(minted.anchor)
            .beneficiary(receiver.public_key(), receiver.scheme())
            .previous(source)
            .build()
            .map_err(RequestError::from)?;

        let record = CommitmentPacketMetadata::new(
            receiver.name(),
            CommitmentType::Transfer,
            Some(minted.tx_ref),
            packet.clone(),
        );
        let cpid = record.cpid();
        self.ledger.append(&record).await?;

        info!(template = %cpid, "proposed transfer");
        Ok((cpid, packet))
    }

    /// Complete the transfer template `template` as its predecessor's owner.
    ///
    /// Spends the predecessor's anchor embedding the template's identifier,
    /// then signs the template with the authorizer's token key, then marks
    /// the predecessor `Transferred`, then moves the token.
    #[instrument(skip(self), fields(cpid = %template, authorizer = %authorizer))]
    pub async fn complete_transfer(
        &self,
        template: Cpid,
        authorizer: &str,
    ) -> Result<(Cpid, CommitmentPacket)> {
        // 1. Validate the request
        let owner = self.actors.require(authorizer)?;

        let first_read = self.require_record(&template).await?;
        let _lineage = self
            .lock_lineage(
                &first_read.commitment_packet.asset_id,
                &first_read.commitment_packet.data,
            )
            .await;
        let mut transfer = self.require_record(&template).await?;

        // 2. Protocol checks
        let Some(prev_id) = transfer.previous() else {
            return Err(ProtocolViolation::NotAuthorized {
                cpid: template,
                actor: authorizer.to_string(),
            }
            .into());
        };
        let mut predecessor = self.ledger.by_cpid(&prev_id).await?.ok_or_else(|| {
            EngineError::Integrity(format!("template {template} links to missing {prev_id}"))
        })?;
        if predecessor.state.is_terminal() {
            return Err(ProtocolViolation::AlreadyTransferred(prev_id).into());
        }
        if !self.ledger.can_complete(&template, authorizer).await? {
            return Err(ProtocolViolation::NotAuthorized {
                cpid: template,
                actor: authorizer.to_string(),
            }
            .into());
        }

        let network = predecessor.commitment_packet.blockchain_id;
        let chain_key = owner.require_chain_key(network)?;

        // The outgoing owner signs the incoming owner's packet.
        transfer.commitment_packet.sign_with(owner.token_key());
        let check = check_packet_signature(
            &transfer.commitment_packet,
            Some(&predecessor.commitment_packet),
        );
        if !check.is_valid() {
            return Err(ProtocolViolation::SignatureInvalid(template).into());
        }

        // 3. Finalize on chain
        let anchor = predecessor.commitment_packet.blockchain_outpoint.clone();
        let anchor_ref = anchor.as_str();
        let spending_tx = self
            .backends
            .call(network, |b| async move {
                b.spend_ownership(anchor_ref, &template, chain_key).await
            })
            .await?;
        debug!(%anchor, %spending_tx, "spent predecessor anchor");

        // 4. Persist: template, then predecessor
        if let Err(e) = self.ledger.replace(&transfer).await {
            error!(%spending_tx, error = %e, "anchor spent but template not recorded");
            return Err(e.into());
        }
        predecessor.state = CommitmentState::Transferred;
        predecessor.spending_tx = Some(spending_tx.clone());
        if let Err(e) = self.ledger.replace(&predecessor).await {
            error!(%spending_tx, error = %e, "anchor spent but predecessor not updated");
            return Err(e.into());
        }

        // 5. Move the token
        let data = &transfer.commitment_packet.data;
        if let Err(e) = self
            .tokens
            .reassign(&predecessor.owner, &transfer.owner, data, template)
            .await
        {
            warn!(
                from = %predecessor.owner,
                to = %transfer.owner,
                token = %data,
                error = %e,
                "token registry disagrees after transfer"
            );
        }

        info!(%spending_tx, new_owner = %transfer.owner, "completed transfer");
        Ok((template, transfer.commitment_packet))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Verification
    // ─────────────────────────────────────────────────────────────────────────

    /// Check one packet's signature against its issuing key.
    pub async fn verify_signature(&self, id: Cpid) -> Result<SignatureCheck> {
        let record = self.require_record(&id).await?;
        self.signature_of(&record).await
    }

    /// Verify every hop from `id` back to the root.
    pub async fn verify_provenance(&self, id: Cpid) -> Result<ProvenanceReport> {
        if !self.ledger.is_known(&id).await? {
            return Err(RequestError::UnknownCpid(id).into());
        }
        let history = self.ledger.history(id).await?;
        let hops = history
            .links
            .iter()
            .enumerate()
            .map(|(i, (cpid, packet))| {
                let predecessor = history.links.get(i + 1).map(|(_, p)| p);
                (*cpid, check_packet_signature(packet, predecessor))
            })
            .collect();
        Ok(ProvenanceReport {
            hops,
            broken: history.broken,
        })
    }

    /// Per-hop status from `id` back to the root.
    pub async fn commitment_status(&self, id: Cpid) -> Result<StatusReport> {
        if !self.ledger.is_known(&id).await? {
            return Err(RequestError::UnknownCpid(id).into());
        }
        let history = self.ledger.history(id).await?;
        let mut hops = Vec::with_capacity(history.links.len());
        for (i, (cpid, packet)) in history.links.iter().enumerate() {
            let Some(record) = self.ledger.by_cpid(cpid).await? else {
                break;
            };
            let predecessor = history.links.get(i + 1).map(|(_, p)| p);
            hops.push(HopStatus {
                cpid: *cpid,
                owner: record.owner,
                kind: record.kind,
                state: record.state,
                asset_id: packet.asset_id.clone(),
                data: packet.data.clone(),
                network: packet.blockchain_id,
                blockchain_outpoint: packet.blockchain_outpoint.clone(),
                previous_packet: packet.previous_packet,
                public_key_owner: self
                    .actors
                    .owner_of_public_key(&packet.public_key)
                    .map(str::to_string),
                signature: check_packet_signature(packet, predecessor),
            });
        }
        Ok(StatusReport {
            hops,
            broken: history.broken,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn record(&self, id: &Cpid) -> Result<Option<CommitmentPacketMetadata>> {
        Ok(self.ledger.by_cpid(id).await?)
    }

    pub async fn history(&self, id: Cpid) -> Result<ChainHistory> {
        Ok(self.ledger.history(id).await?)
    }

    pub async fn commitments_of(&self, actor: &str) -> Result<Vec<CommitmentPacketMetadata>> {
        self.actors.require(actor)?;
        Ok(self.ledger.by_actor(actor).await?)
    }

    pub async fn pending_transfers_into(
        &self,
        actor: &str,
    ) -> Result<Vec<CommitmentPacketMetadata>> {
        self.actors.require(actor)?;
        Ok(self.ledger.pending_transfers_into(actor).await?)
    }

    pub async fn is_unique(&self, asset_id: &str, data: &str, network: Network) -> Result<bool> {
        Ok(self.ledger.is_unique(asset_id, data, network).await?)
    }

    /// Ledger eligibility plus a verifying signature on the packet.
    pub async fn can_transfer(&self, id: &Cpid, actor: &str, as_owner: bool) -> Result<bool> {
        if !self.ledger.can_transfer(id, actor, as_owner).await? {
            return Ok(false);
        }
        let record = self.require_record(id).await?;
        Ok(self.signature_of(&record).await?.is_valid())
    }

    pub async fn can_complete(&self, id: &Cpid, actor: &str) -> Result<bool> {
        Ok(self.ledger.can_complete(id, actor).await?)
    }

    /// Unspent packets owned by `actor` that the token registry also
    /// assigns to them.
    pub async fn owned_packets(&self, actor: &str) -> Result<Vec<(Cpid, CommitmentPacket)>> {
        self.actors.require(actor)?;
        let records = self.ledger.by_actor_unspent(actor).await?;
        let held = self.tokens.tokens_of(actor).await?;
        Ok(records
            .into_iter()
            .filter(|r| held.iter().any(|t| t.cpid == Some(r.cpid())))
            .map(|r| (r.cpid(), r.commitment_packet))
            .collect())
    }

    /// The spending transaction that finalized `id`.
    ///
    /// For a transfer this is the spend of its predecessor's anchor. For a
    /// root it is the spend of its own anchor, if any.
    pub async fn finalizing_tx(&self, id: Cpid) -> Result<Option<String>> {
        let record = self.require_record(&id).await?;
        let spent = match record.previous() {
            None => record,
            Some(prev) => match self.ledger.by_cpid(&prev).await? {
                Some(p) => p,
                None => return Ok(None),
            },
        };
        Ok(spent.spending_tx)
    }

    /// Actors, enabled networks and backend connectivity.
    pub async fn status(&self) -> Result<EngineStatus> {
        Ok(EngineStatus {
            actors: self.actors.names(),
            networks: self.backends.connectivity().await,
            records: self.ledger.len().await?,
        })
    }
}

fn check_fields(asset_id: &str, data: &str) -> Result<()> {
    if asset_id.is_empty() {
        return Err(RequestError::MalformedPacket(ValidationError::EmptyField("asset_id")).into());
    }
    if data.is_empty() {
        return Err(RequestError::MalformedPacket(ValidationError::EmptyField("data")).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::Actor;
    use commitment_backend::{
        AccountBackend, ChainKey, MemoryOwnershipContract, MemoryUtxoChain, UtxoBackend,
    };
    use commitment_core::{SignatureScheme, TokenKeypair};
    use commitment_store::MemoryLedger;

    struct Harness {
        engine: Engine<MemoryLedger, MemoryTokenRegistry>,
        chain: Arc<MemoryUtxoChain>,
        contract: Arc<MemoryOwnershipContract>,
    }

    fn actor(name: &str, seed: u8) -> Actor {
        let token = TokenKeypair::from_secret(SignatureScheme::NistP256, &[seed; 32]).unwrap();
        Actor::new(name, token)
            .with_chain_key(Network::Bsv, ChainKey::from_secret(&[seed + 0x10; 32]).unwrap())
            .with_chain_key(Network::Eth, ChainKey::from_secret(&[seed + 0x20; 32]).unwrap())
    }

    fn harness(settings: EngineSettings) -> Harness {
        let chain = MemoryUtxoChain::new();
        let contract = MemoryOwnershipContract::new();
        let backends = Backends::new()
            .with(Arc::new(UtxoBackend::new(chain.clone(), chain.clone())))
            .with(Arc::new(AccountBackend::new(contract.clone())));

        let mut actors = ActorRegistry::new();
        actors.insert(actor("alice", 1)).unwrap();
        actors.insert(actor("bob", 2)).unwrap();

        let engine = Engine::new(
            settings,
            actors,
            Arc::new(MemoryLedger::new()),
            backends,
            Arc::new(MemoryTokenRegistry::new(["tok-1", "tok-2"])),
        );
        Harness {
            engine,
            chain,
            contract,
        }
    }

    fn category(result: Result<impl Sized>) -> crate::error::ErrorCategory {
        match result {
            Ok(_) => panic!("expected an error"),
            Err(e) => e.category(),
        }
    }

    #[tokio::test]
    async fn test_issue_rejections_touch_nothing() {
        use crate::error::ErrorCategory::Validation;
        let h = harness(EngineSettings::default());
        let e = &h.engine;

        assert_eq!(category(e.issue("mallory", "art", "tok-1", Network::Bsv).await), Validation);
        assert_eq!(category(e.issue("alice", "art", "tok-9", Network::Bsv).await), Validation);
        assert_eq!(category(e.issue("alice", "", "tok-1", Network::Bsv).await), Validation);

        assert_eq!(h.chain.funding_requests(), 0);
        assert!(e.ledger().is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_double_issuance() {
        let h = harness(EngineSettings::default());
        let e = &h.engine;
        e.issue("alice", "art", "tok-1", Network::Bsv).await.unwrap();

        let err = e.issue("bob", "art", "tok-1", Network::Bsv).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(RequestError::NotUnique { .. })
        ));

        // Unique on the other network, but the token is already held.
        let err = e.issue("bob", "art", "tok-1", Network::Eth).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(RequestError::TokenUnavailable(_))
        ));
        assert_eq!(h.chain.funding_requests(), 1);
    }

    #[tokio::test]
    async fn test_failed_mint_leaves_no_record() {
        let h = harness(EngineSettings::default());
        h.chain.set_funding_available(false);
        let err = h
            .engine
            .issue("alice", "art", "tok-1", Network::Bsv)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Backend(_)));
        assert!(h.engine.ledger().is_empty().await.unwrap());
        assert!(h.engine.tokens().is_available("tok-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_transfer_on_account_chain() {
        let h = harness(EngineSettings::default());
        let e = &h.engine;
        let (root, _) = e.issue("alice", "art", "tok-1", Network::Eth).await.unwrap();
        let (template, _) = e.propose_transfer(root, "bob", Network::Eth).await.unwrap();
        e.complete_transfer(template, "alice").await.unwrap();

        assert_eq!(h.contract.spends(), 1);
        let spent = e.record(&root).await.unwrap().unwrap();
        assert_eq!(spent.state, CommitmentState::Transferred);
        assert_eq!(e.finalizing_tx(template).await.unwrap(), spent.spending_tx);
        assert!(e.verify_provenance(template).await.unwrap().is_verified());
        assert!(e.tokens().owned_by("bob", "tok-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_complete_requires_predecessor_owner() {
        let h = harness(EngineSettings::default());
        let e = &h.engine;
        let (root, _) = e.issue("alice", "art", "tok-1", Network::Bsv).await.unwrap();
        let (template, _) = e.propose_transfer(root, "bob", Network::Bsv).await.unwrap();

        let err = e.complete_transfer(template, "bob").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Protocol(ProtocolViolation::NotAuthorized { .. })
        ));
        // A root has nothing to complete.
        let err = e.complete_transfer(root, "alice").await.unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Protocol);
        assert_eq!(h.chain.spends(), 0);
    }

    #[tokio::test]
    async fn test_anchor_status_check() {
        let settings = EngineSettings {
            check_anchor_status: true,
            ..EngineSettings::default()
        };
        let h = harness(settings);
        let e = &h.engine;
        let (root, packet) = e.issue("alice", "art", "tok-1", Network::Bsv).await.unwrap();

        // Spend the anchor behind the engine's back.
        let alice_chain = ChainKey::from_secret(&[0x11; 32]).unwrap();
        let backend = UtxoBackend::new(h.chain.clone(), h.chain.clone());
        commitment_backend::OwnershipBackend::spend_ownership(
            &backend,
            &packet.blockchain_outpoint,
            &Cpid::from_bytes([9; 32]),
            &alice_chain,
        )
        .await
        .unwrap();

        let err = e.propose_transfer(root, "bob", Network::Bsv).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Protocol(ProtocolViolation::AnchorSpent(_))
        ));
    }

    #[tokio::test]
    async fn test_owned_packets_follow_registry() {
        let h = harness(EngineSettings::default());
        let e = &h.engine;
        let (root, _) = e.issue("alice", "art", "tok-1", Network::Bsv).await.unwrap();
        assert_eq!(e.owned_packets("alice").await.unwrap().len(), 1);

        let (template, _) = e.propose_transfer(root, "bob", Network::Bsv).await.unwrap();
        // The pending template is not yet bob's in the registry.
        assert!(e.owned_packets("bob").await.unwrap().is_empty());

        e.complete_transfer(template, "alice").await.unwrap();
        assert!(e.owned_packets("alice").await.unwrap().is_empty());
        let bobs = e.owned_packets("bob").await.unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].0, template);
    }

    #[tokio::test]
    async fn test_status_view() {
        let h = harness(EngineSettings::default());
        let e = &h.engine;
        let (root, _) = e.issue("alice", "art", "tok-1", Network::Bsv).await.unwrap();
        let (template, _) = e.propose_transfer(root, "bob", Network::Bsv).await.unwrap();

        let report = e.commitment_status(template).await.unwrap();
        assert!(report.broken.is_none());
        assert_eq!(report.hops.len(), 2);
        assert_eq!(report.hops[0].public_key_owner.as_deref(), Some("bob"));
        assert_eq!(report.hops[0].signature, SignatureCheck::Unsigned);
        assert_eq!(report.hops[1].signature, SignatureCheck::Valid);
        assert_eq!(report.hops[1].kind, CommitmentType::Issuance);

        h.contract.disconnect();
        let status = e.status().await.unwrap();
        assert_eq!(status.actors, vec!["alice".to_string(), "bob".to_string()]);
        assert_eq!(status.networks, vec![(Network::Bsv, true), (Network::Eth, false)]);
        assert_eq!(status.records, 2);
    }

    #[tokio::test]
    async fn test_parallel_lineages() {
        let h = Arc::new(harness(EngineSettings::default()));
        let a = {
            let h = h.clone();
            tokio::spawn(async move { h.engine.issue("alice", "art", "tok-1", Network::Bsv).await })
        };
        let b = {
            let h = h.clone();
            tokio::spawn(async move { h.engine.issue("bob", "art", "tok-2", Network::Bsv).await })
        };
        assert!(a.await.unwrap().is_ok());
        assert!(b.await.unwrap().is_ok());
        assert_eq!(h.engine.ledger().len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_lineage_locks_released() {
        let h = harness(EngineSettings::default());
        let (root, _) = h.engine.issue("alice", "art", "tok-1", Network::Bsv).await.unwrap();
        let (template, _) = h
            .engine
            .propose_transfer(root, "bob", Network::Bsv)
            .await
            .unwrap();
        h.engine.complete_transfer(template, "alice").await.unwrap();
        assert!(h.engine.lineages.lock().unwrap().is_empty());

        // A waiter keeps the entry alive until it is done.
        let held = h.engine.lock_lineage("art", "tok-2").await;
        let waiter = h.engine.lock_lineage("art", "tok-2");
        tokio::pin!(waiter);
        let pending = tokio::time::timeout(std::time::Duration::ZERO, waiter.as_mut()).await;
        assert!(pending.is_err());
        drop(held);
        assert_eq!(h.engine.lineages.lock().unwrap().len(), 1);
        drop(waiter.await);
        assert!(h.engine.lineages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_racing_issuance_single_winner() {
        let h = Arc::new(harness(EngineSettings::default()));
        let mut tasks = Vec::new();
        for who in ["alice", "bob", "alice", "bob"] {
            let h = h.clone();
            tasks.push(tokio::spawn(async move {
                h.engine.issue(who, "art", "tok-1", Network::Bsv).await
            }));
        }
        let mut wins = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(h.chain.funding_requests(), 1);
    }
}
