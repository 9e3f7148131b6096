//! # Commitment Testkit
//!
//! Testing utilities for the commitment protocol.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: fixed packets with their expected identifiers and
//!   digests, pinning the byte layouts across implementations
//! - **Generators**: proptest strategies for keys, identifiers and packets
//! - **Fixtures**: an engine wired to simulated chains with three actors
//!
//! ## Golden Vectors
//!
//! ```rust
//! use commitment_testkit::vectors::{all_vectors, packet_from_vector};
//!
//! for vector in all_vectors() {
//!     let packet = packet_from_vector(&vector).unwrap();
//!     assert_eq!(packet.identifier().to_hex(), vector.expected_cpid);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use commitment_testkit::generators::{packet_from_params, PacketParams};
//!
//! proptest! {
//!     #[test]
//!     fn identifier_is_deterministic(params: PacketParams) {
//!         let a = packet_from_params(&params);
//!         let b = packet_from_params(&params);
//!         prop_assert_eq!(a.identifier(), b.identifier());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use commitment_testkit::fixtures::{TestNetwork, ALICE};
//! use commitment_engine::Network;
//!
//! async fn example() {
//!     let net = TestNetwork::new();
//!     let (cpid, _) = net.engine.issue(ALICE, "art", "tok-1", Network::Bsv).await.unwrap();
//!     assert!(net.engine.verify_signature(cpid).await.unwrap().is_valid());
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{TestNetwork, ALICE, BOB, TED, TOKENS};
pub use generators::{packet_from_params, PacketParams};
pub use vectors::{all_vectors, packet_from_vector, verify_all_vectors, GoldenVector};
