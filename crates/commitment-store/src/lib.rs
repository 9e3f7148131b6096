//! # Commitment Store
//!
//! The ledger of commitment records. Provides a trait-based interface with
//! in-memory, JSON snapshot and SQLite implementations.
//!
//! ## Overview
//!
//! The ledger abstracts record storage behind the [`Ledger`] trait, allowing
//! the engine to be storage-agnostic. Protocol queries (ownership, pending
//! transfers, uniqueness, transfer predicates, chain walks) live in
//! [`LedgerExt`] and are derived from the trait's primitive reads.
//!
//! ## Key Types
//!
//! - [`Ledger`] - The async trait for record persistence
//! - [`LedgerExt`] - Protocol queries available on every ledger
//! - [`ChainWalk`] - Lazy, restartable walk from a packet back to its root
//! - [`FileLedger`] - Full JSON snapshot on disk
//! - [`SqliteLedger`] - SQLite-based persistent storage
//! - [`MemoryLedger`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use commitment_store::{FileLedger, Ledger, LedgerExt};
//!
//! async fn example() {
//!     let ledger = FileLedger::open("data/commitments.json").unwrap();
//!     let mine = ledger.by_actor("alice").await.unwrap();
//!     println!("{} records", mine.len());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Append plus single update**: records are never deleted
//! - **Recomputed identifiers**: stored identifiers are checked against the
//!   packet on every write and load
//! - **Partial chains**: a missing predecessor ends a walk and is reported,
//!   it is not an error

pub mod error;
pub mod memory;
pub mod migration;
pub mod snapshot;
pub mod sqlite;
pub mod traits;

#[cfg(test)]
mod testutil;

pub use error::{Result, StoreError};
pub use memory::MemoryLedger;
pub use snapshot::FileLedger;
pub use sqlite::SqliteLedger;
pub use traits::{ChainBreak, ChainHistory, ChainWalk, Ledger, LedgerExt};
