//! Commitment packet: the provenance unit of an asset lineage.
//!
//! A packet names an asset, the content item it concerns, the anchor that
//! proves its uniqueness on one network, and the key that controls the next
//! transfer. Packets are linked by `previous_packet` into a hash chain.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::crypto::{PacketSignature, SignatureScheme, TokenKeypair, TokenPublicKey};
use crate::error::ValidationError;
use crate::types::{Cpid, Network};

/// A commitment packet.
///
/// Every field except `signature` is covered by both [`digest`](Self::digest)
/// and [`identifier`](Self::identifier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentPacket {
    /// Free-form descriptor of the asset class.
    pub asset_id: String,

    /// Identifier of the content item (a token registry entry).
    pub data: String,

    /// The packet this one supersedes. `None` only for an issuance.
    pub previous_packet: Option<Cpid>,

    /// The network anchoring this packet.
    pub blockchain_id: Network,

    /// Network-specific encoding of the uniqueness anchor.
    pub blockchain_outpoint: String,

    /// Key of the beneficiary, which authorizes the next transfer.
    pub public_key: TokenPublicKey,

    /// Curve of `public_key`.
    pub signature_scheme: SignatureScheme,

    /// Signature by the issuing key. `None` while a transfer is proposed.
    pub signature: Option<PacketSignature>,
}

impl CommitmentPacket {
    /// Canonical bytes for signing.
    ///
    /// `asset_id ∥ data ∥ previous_packet? ∥ public_key ∥ outpoint ∥ network`,
    /// every part as UTF-8 text (identifiers and keys in lowercase hex).
    pub fn digest(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        out.extend_from_slice(self.asset_id.as_bytes());
        out.extend_from_slice(self.data.as_bytes());
        if let Some(prev) = &self.previous_packet {
            out.extend_from_slice(prev.to_hex().as_bytes());
        }
        out.extend_from_slice(self.public_key.to_hex().as_bytes());
        out.extend_from_slice(self.blockchain_outpoint.as_bytes());
        out.extend_from_slice(self.blockchain_id.as_str().as_bytes());
        out
    }

    /// Compute the content address of this packet.
    ///
    /// SHA-256 over `asset_id ∥ data ∥ network ∥ scheme ∥ public_key ∥
    /// previous_packet? ∥ outpoint`. The signature is excluded.
    pub fn identifier(&self) -> Cpid {
        let mut hasher = Sha256::new();
        hasher.update(self.asset_id.as_bytes());
        hasher.update(self.data.as_bytes());
        hasher.update(self.blockchain_id.as_str().as_bytes());
        hasher.update(self.signature_scheme.as_str().as_bytes());
        hasher.update(self.public_key.to_hex().as_bytes());
        if let Some(prev) = &self.previous_packet {
            hasher.update(prev.to_hex().as_bytes());
        }
        hasher.update(self.blockchain_outpoint.as_bytes());
        Cpid(hasher.finalize().into())
    }

    /// Check if this is a chain root.
    pub fn is_issuance(&self) -> bool {
        self.previous_packet.is_none()
    }

    /// Check if this packet carries a signature.
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Check if this packet describes the given asset instance on a network.
    pub fn is_match(&self, asset_id: &str, data: &str, network: Network) -> bool {
        self.asset_id == asset_id && self.data == data && self.blockchain_id == network
    }

    /// The transaction that created the anchor.
    ///
    /// On a UTXO network the outpoint is `txid:vout` and this returns the txid;
    /// elsewhere the outpoint already is a transaction reference.
    pub fn anchor_txid(&self) -> &str {
        if self.blockchain_id.is_utxo() {
            self.blockchain_outpoint
                .split_once(':')
                .map_or(self.blockchain_outpoint.as_str(), |(txid, _)| txid)
        } else {
            &self.blockchain_outpoint
        }
    }

    /// Sign the digest with `keypair`, replacing any previous signature.
    pub fn sign_with(&mut self, keypair: &TokenKeypair) {
        self.signature = Some(keypair.sign(&self.digest()));
    }
}

/// Builder for creating packets.
///
/// The beneficiary key, the anchor and the network must all be set before
/// [`build`](Self::build) succeeds, so a packet is never observable with
/// those fields missing.
pub struct PacketBuilder {
    asset_id: String,
    data: String,
    previous_packet: Option<Cpid>,
    blockchain_id: Option<Network>,
    blockchain_outpoint: Option<String>,
    public_key: Option<TokenPublicKey>,
    signature_scheme: Option<SignatureScheme>,
}

impl PacketBuilder {
    /// Start building a packet for an asset instance.
    pub fn new(asset_id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            data: data.into(),
            previous_packet: None,
            blockchain_id: None,
            blockchain_outpoint: None,
            public_key: None,
            signature_scheme: None,
        }
    }

    /// Set the network.
    pub fn network(mut self, network: Network) -> Self {
        self.blockchain_id = Some(network);
        self
    }

    /// Set the anchor reference.
    pub fn outpoint(mut self, outpoint: impl Into<String>) -> Self {
        self.blockchain_outpoint = Some(outpoint.into());
        self
    }

    /// Set the beneficiary key and its curve.
    pub fn beneficiary(mut self, public_key: TokenPublicKey, scheme: SignatureScheme) -> Self {
        self.public_key = Some(public_key);
        self.signature_scheme = Some(scheme);
        self
    }

    /// Set the superseded packet.
    pub fn previous(mut self, prev: Cpid) -> Self {
        self.previous_packet = Some(prev);
        self
    }

    /// Build the unsigned packet.
    pub fn build(self) -> Result<CommitmentPacket, ValidationError> {
        Ok(CommitmentPacket {
            asset_id: self.asset_id,
            data: self.data,
            previous_packet: self.previous_packet,
            blockchain_id: self.blockchain_id.ok_or(ValidationError::MissingField("blockchain_id"))?,
            blockchain_outpoint: self
                .blockchain_outpoint
                .ok_or(ValidationError::MissingField("blockchain_outpoint"))?,
            public_key: self.public_key.ok_or(ValidationError::MissingField("public_key"))?,
            signature_scheme: self
                .signature_scheme
                .ok_or(ValidationError::MissingField("signature_scheme"))?,
            signature: None,
        })
    }

    /// Build the packet and sign it with `keypair`.
    pub fn sign(self, keypair: &TokenKeypair) -> Result<CommitmentPacket, ValidationError> {
        let mut packet = self.build()?;
        packet.sign_with(keypair);
        Ok(packet)
    }
}
