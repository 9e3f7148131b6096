//! Test fixtures and helpers.
//!
//! An engine over a memory ledger, a simulated UTXO chain and a simulated
//! ownership contract, with three actors holding keys on both networks.

use std::sync::Arc;

use commitment_backend::{
    AccountBackend, ChainKey, MemoryOwnershipContract, MemoryUtxoChain, UtxoBackend,
};
use commitment_core::{
    CommitmentPacketMetadata, CommitmentState, Cpid, Network, SignatureScheme, TokenKeypair,
};
use commitment_engine::{
    Actor, ActorRegistry, Backends, Engine, EngineSettings, MemoryTokenRegistry, Result,
};
use commitment_store::MemoryLedger;

pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";
pub const TED: &str = "ted";

/// Tokens registered with every fixture.
pub const TOKENS: [&str; 3] = ["tok-1", "tok-2", "tok-3"];

/// Engine concretely typed over the in-memory stores.
pub type TestEngine = Engine<MemoryLedger, MemoryTokenRegistry>;

/// A ready-to-use engine with its simulated chains exposed for fault
/// injection.
pub struct TestNetwork {
    pub engine: TestEngine,
    pub utxo_chain: Arc<MemoryUtxoChain>,
    pub contract: Arc<MemoryOwnershipContract>,
}

impl TestNetwork {
    /// Create with default settings.
    pub fn new() -> Self {
        Self::with_settings(EngineSettings::default())
    }

    /// Create with the given engine settings.
    pub fn with_settings(settings: EngineSettings) -> Self {
        let utxo_chain = MemoryUtxoChain::new();
        let contract = MemoryOwnershipContract::new();
        let backends = Backends::new()
            .with(Arc::new(UtxoBackend::new(utxo_chain.clone(), utxo_chain.clone())))
            .with(Arc::new(AccountBackend::new(contract.clone())));

        let engine = Engine::new(
            settings,
            test_actors(),
            Arc::new(MemoryLedger::new()),
            backends,
            Arc::new(MemoryTokenRegistry::new(TOKENS)),
        );

        Self {
            engine,
            utxo_chain,
            contract,
        }
    }

    /// The token keypair of a fixture actor.
    pub fn token_key(&self, actor: &str) -> Option<&TokenKeypair> {
        self.engine.actors().get(actor).map(Actor::token_key)
    }

    /// Propose and complete a transfer of `source` from `from` to `to`.
    ///
    /// Returns the identifier of the completed packet.
    pub async fn transfer(
        &self,
        source: Cpid,
        from: &str,
        to: &str,
        network: Network,
    ) -> Result<Cpid> {
        let (template, _) = self.engine.propose_transfer(source, to, network).await?;
        let (done, _) = self.engine.complete_transfer(template, from).await?;
        Ok(done)
    }

    /// Records that are `Created` and signed, per asset instance.
    ///
    /// A pending template shares its instance with the record it supersedes
    /// but is unsigned, so it is not counted.
    pub async fn live_records(
        &self,
        asset_id: &str,
        data: &str,
        network: Network,
    ) -> Result<Vec<CommitmentPacketMetadata>> {
        let records = commitment_store::Ledger::records(self.engine.ledger()).await?;
        Ok(records
            .into_iter()
            .filter(|r| r.state == CommitmentState::Created)
            .filter(|r| r.commitment_packet.is_signed())
            .filter(|r| r.commitment_packet.is_match(asset_id, data, network))
            .collect())
    }
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// Alice and Bob sign with P-256, Ted with Ed25519.
pub fn test_actors() -> ActorRegistry {
    let mut actors = ActorRegistry::new();
    for (name, seed, scheme) in [
        (ALICE, 0xa1, SignatureScheme::NistP256),
        (BOB, 0xb0, SignatureScheme::NistP256),
        (TED, 0x7e, SignatureScheme::Ed25519),
    ] {
        actors
            .insert(test_actor(name, seed, scheme))
            .expect("fixture actor names are distinct");
    }
    actors
}

/// An actor with deterministic keys derived from `seed`.
pub fn test_actor(name: &str, seed: u8, scheme: SignatureScheme) -> Actor {
    let token = TokenKeypair::from_secret(scheme, &[seed; 32]).expect("valid fixture secret");
    let utxo_key = ChainKey::from_secret(&[seed ^ 0x11; 32]).expect("valid fixture secret");
    let account_key = ChainKey::from_secret(&[seed ^ 0x22; 32]).expect("valid fixture secret");
    Actor::new(name, token)
        .with_chain_key(Network::Bsv, utxo_key)
        .with_chain_key(Network::Eth, account_key)
}
