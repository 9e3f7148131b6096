//! # Commitment Core
//!
//! Pure primitives for the commitment protocol: packets, their content
//! addresses, and the signature chain that links consecutive packets.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`CommitmentPacket`] - The provenance unit of an asset lineage
//! - [`Cpid`] - Content-addressed identifier (SHA-256 over the packet fields)
//! - [`CommitmentPacketMetadata`] - Ledger record wrapping a packet
//! - [`TokenKeypair`] - Multi-curve signing key selected per actor
//!
//! ## Signing Rule
//!
//! A root packet is signed by its own key. A transfer packet is signed by the
//! key of the packet it supersedes. See [`validation::verify_packet_signature`].

pub mod crypto;
pub mod error;
pub mod metadata;
pub mod packet;
pub mod types;
pub mod validation;

pub use crypto::{PacketSignature, SignatureScheme, TokenKeypair, TokenPublicKey};
pub use error::{CoreError, ValidationError};
pub use metadata::CommitmentPacketMetadata;
pub use packet::{CommitmentPacket, PacketBuilder};
pub use types::{CommitmentState, CommitmentType, Cpid, Network};
pub use validation::{
    check_packet_signature, issuing_key, validate_packet_structure, verify_packet_signature,
    SignatureCheck,
};
