//! # Commitment Backend
//!
//! Ownership-transaction backends. Each network anchors packets on a
//! single-use on-chain object: a spendable output on the UTXO chain, a
//! contract entry on the account chain. Spending the anchor records the next
//! packet's identifier and is what makes a transfer final.
//!
//! ## Key Types
//!
//! - [`OwnershipBackend`] - The capability trait the engine dispatches to
//! - [`UtxoBackend`] - Anchors as funded outputs, spends carry an `OP_RETURN`
//! - [`AccountBackend`] - Anchors as ownership-contract entries
//! - [`ChainKey`] - secp256k1 key controlling anchors
//! - [`CachingFunder`] - Per-script pool of pre-funded outputs
//!
//! The chain clients themselves ([`FundingService`], [`UtxoNode`],
//! [`OwnershipContract`]) are traits. [`memory`] provides simulated chains.

pub mod account;
pub mod error;
pub mod funding;
pub mod keys;
pub mod memory;
pub mod traits;
pub mod utxo;

pub use account::{AccountBackend, ContractEvent, OwnershipContract};
pub use error::{BackendError, Result};
pub use funding::CachingFunder;
pub use keys::{locking_script_for, ChainKey, SpendAuthorization};
pub use memory::{MemoryOwnershipContract, MemoryUtxoChain};
pub use traits::{AnchorEvent, OwnershipBackend, OwnershipTx};
pub use utxo::{
    data_payload, parse_data_payload, FundedOutpoint, FundingResponse, FundingService, Outpoint,
    TxOutput, UtxoBackend, UtxoNode, UtxoTransaction, ANCHOR_VALUE,
};
