//! Actors and their keys.
//!
//! Every actor has exactly one token key, which signs packets, and an
//! optional chain key per network, which locks and spends anchors. Key
//! material never leaves its actor.

use std::collections::BTreeMap;

use commitment_backend::ChainKey;
use commitment_core::{Network, SignatureScheme, TokenKeypair, TokenPublicKey};

use crate::config::ActorConfig;
use crate::error::{EngineError, RequestError, Result};

/// A named identity.
#[derive(Debug, Clone)]
pub struct Actor {
    name: String,
    token_key: TokenKeypair,
    utxo_key: Option<ChainKey>,
    account_key: Option<ChainKey>,
}

impl Actor {
    pub fn new(name: impl Into<String>, token_key: TokenKeypair) -> Self {
        Self {
            name: name.into(),
            token_key,
            utxo_key: None,
            account_key: None,
        }
    }

    /// Attach the chain key used on `network`.
    pub fn with_chain_key(mut self, network: Network, key: ChainKey) -> Self {
        match network {
            Network::Bsv => self.utxo_key = Some(key),
            Network::Eth => self.account_key = Some(key),
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn token_key(&self) -> &TokenKeypair {
        &self.token_key
    }

    pub fn public_key(&self) -> TokenPublicKey {
        self.token_key.public_key()
    }

    pub fn scheme(&self) -> SignatureScheme {
        self.token_key.scheme()
    }

    /// The key controlling this actor's anchors on `network`.
    pub fn chain_key(&self, network: Network) -> Option<&ChainKey> {
        match network {
            Network::Bsv => self.utxo_key.as_ref(),
            Network::Eth => self.account_key.as_ref(),
        }
    }

    /// Like [`chain_key`](Self::chain_key), failing with a request error.
    pub fn require_chain_key(&self, network: Network) -> Result<&ChainKey> {
        self.chain_key(network).ok_or_else(|| {
            RequestError::NoAnchorKey {
                actor: self.name.clone(),
                network,
            }
            .into()
        })
    }

    /// Networks this actor can hold anchors on.
    pub fn networks(&self) -> Vec<Network> {
        Network::ALL
            .into_iter()
            .filter(|n| self.chain_key(*n).is_some())
            .collect()
    }
}

impl TryFrom<&ActorConfig> for Actor {
    type Error = EngineError;

    fn try_from(config: &ActorConfig) -> Result<Self> {
        let bad = |what: &str, e: &dyn std::fmt::Display| {
            EngineError::Config(format!("actor {}: {what}: {e}", config.name))
        };

        if config.name.is_empty() {
            return Err(EngineError::Config("actor name is empty".into()));
        }
        let token_key = TokenKeypair::from_secret_hex(config.token_key_curve, &config.token_key)
            .map_err(|e| bad("token_key", &e))?;
        let mut actor = Actor::new(&config.name, token_key);

        if let Some(secret) = &config.utxo_key {
            let key = ChainKey::from_secret_hex(secret).map_err(|e| bad("utxo_key", &e))?;
            actor = actor.with_chain_key(Network::Bsv, key);
        }
        if let Some(secret) = &config.account_key {
            let key = ChainKey::from_secret_hex(secret).map_err(|e| bad("account_key", &e))?;
            actor = actor.with_chain_key(Network::Eth, key);
        }
        if actor.networks().is_empty() {
            return Err(EngineError::Config(format!(
                "actor {} has no utxo_key or account_key",
                config.name
            )));
        }
        Ok(actor)
    }
}

/// The fixed set of actors known to an engine.
#[derive(Debug, Clone, Default)]
pub struct ActorRegistry {
    actors: BTreeMap<String, Actor>,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `[[actor]]` tables, rejecting duplicates.
    pub fn from_config(configs: &[ActorConfig]) -> Result<Self> {
        let mut registry = Self::new();
        for config in configs {
            registry.insert(Actor::try_from(config)?)?;
        }
        Ok(registry)
    }

    /// Add an actor. Names are unique.
    pub fn insert(&mut self, actor: Actor) -> Result<()> {
        if self.actors.contains_key(actor.name()) {
            return Err(EngineError::Config(format!(
                "duplicate actor {}",
                actor.name()
            )));
        }
        self.actors.insert(actor.name.clone(), actor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Actor> {
        self.actors.get(name)
    }

    /// Look up an actor, failing with `UnknownActor`.
    pub fn require(&self, name: &str) -> Result<&Actor> {
        self.get(name)
            .ok_or_else(|| RequestError::UnknownActor(name.to_string()).into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actors.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.actors.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// The actor whose token key is `public_key`.
    pub fn owner_of_public_key(&self, public_key: &TokenPublicKey) -> Option<&str> {
        self.actors
            .values()
            .find(|a| &a.public_key() == public_key)
            .map(Actor::name)
    }
}
