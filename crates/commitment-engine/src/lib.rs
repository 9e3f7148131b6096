//! # Commitment Engine
//!
//! Issues, transfers and verifies ownership of named assets through chains
//! of signed commitment packets, each anchored to a single-use transaction
//! on a UTXO chain or an account chain.
//!
//! ## Overview
//!
//! - **Issue**: mint an anchor for the issuer, build a root packet, self-sign
//!   it and record it
//! - **Propose transfer**: mint an anchor for the recipient and record an
//!   unsigned template superseding the current packet
//! - **Complete transfer**: the current owner spends their anchor, embedding
//!   the template's identifier, and signs the template
//! - **Verify**: check any packet, or every hop back to the root, against
//!   the key that issued it
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use commitment_engine::backend::MemoryUtxoChain;
//! use commitment_engine::{Backends, Engine, EngineConfig, Network};
//!
//! async fn example() {
//!     let config = EngineConfig::from_file("commitment.toml").unwrap();
//!     commitment_engine::telemetry::init_logging(&config.logging).unwrap();
//!
//!     let chain = MemoryUtxoChain::new();
//!     let utxo = config.engine.utxo_backend(chain.clone(), chain);
//!     let backends = Backends::new().with(Arc::new(utxo));
//!     let engine = Engine::from_config(&config, backends).unwrap();
//!
//!     let (cpid, _) = engine.issue("alice", "art", "tok-1", Network::Bsv).await.unwrap();
//!     let (template, _) = engine.propose_transfer(cpid, "bob", Network::Bsv).await.unwrap();
//!     engine.complete_transfer(template, "alice").await.unwrap();
//!     assert!(engine.verify_provenance(template).await.unwrap().is_verified());
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `commitment_engine::core` - Packets, identifiers, keys and signatures
//! - `commitment_engine::store` - The ledger and its queries
//! - `commitment_engine::backend` - Ownership-transaction backends

pub mod actors;
pub mod backends;
pub mod config;
pub mod engine;
pub mod error;
pub mod telemetry;
pub mod tokens;

// Re-export component crates
pub use commitment_backend as backend;
pub use commitment_core as core;
pub use commitment_store as store;

pub use actors::{Actor, ActorRegistry};
pub use backends::Backends;
pub use config::{
    ActorConfig, EngineConfig, EngineSettings, LedgerConfig, LedgerKind, LoggingConfig,
    TokenConfig, TokenStoreConfig,
};
pub use engine::{Engine, EngineStatus, HopStatus, ProvenanceReport, StatusReport};
pub use error::{
    EngineError, ErrorCategory, ProtocolViolation, RequestError, Result, TokenError,
};
pub use tokens::{MemoryTokenRegistry, TokenRecord, TokenRegistry};

pub use commitment_core::{
    CommitmentPacket, CommitmentPacketMetadata, CommitmentState, CommitmentType, Cpid, Network,
    SignatureCheck, SignatureScheme, TokenKeypair,
};
