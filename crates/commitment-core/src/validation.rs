//! Packet validation: structural checks and signature-chain verification.

use serde::{Deserialize, Serialize};

use crate::crypto::{SignatureScheme, TokenPublicKey};
use crate::error::ValidationError;
use crate::packet::CommitmentPacket;

/// Outcome of checking one packet's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureCheck {
    Valid,
    /// The packet has no signature yet (a transfer template).
    Unsigned,
    Invalid,
}

impl SignatureCheck {
    pub fn is_valid(self) -> bool {
        self == SignatureCheck::Valid
    }
}

/// Validate a packet's structure without verifying its signature.
///
/// This performs:
/// - Non-empty asset, content and anchor fields
/// - Public key decodes on the declared curve
pub fn validate_packet_structure(packet: &CommitmentPacket) -> Result<(), ValidationError> {
    if packet.asset_id.is_empty() {
        return Err(ValidationError::EmptyField("asset_id"));
    }
    if packet.data.is_empty() {
        return Err(ValidationError::EmptyField("data"));
    }
    if packet.blockchain_outpoint.is_empty() {
        return Err(ValidationError::EmptyField("blockchain_outpoint"));
    }
    packet.public_key.check(packet.signature_scheme)?;
    Ok(())
}

/// Resolve the key that must have signed `packet`.
///
/// A root packet is self-attested: its own key and curve. A transfer packet is
/// signed by the outgoing owner, whose key and curve are the predecessor's.
/// `predecessor` must be the packet named by `previous_packet`.
pub fn issuing_key<'a>(
    packet: &'a CommitmentPacket,
    predecessor: Option<&'a CommitmentPacket>,
) -> Result<(&'a TokenPublicKey, SignatureScheme), ValidationError> {
    match (packet.previous_packet, predecessor) {
        (None, _) => Ok((&packet.public_key, packet.signature_scheme)),
        (Some(expected), Some(prev)) => {
            let got = prev.identifier();
            if got != expected {
                return Err(ValidationError::PredecessorMismatch {
                    expected: Some(expected),
                    got: Some(got),
                });
            }
            Ok((&prev.public_key, prev.signature_scheme))
        }
        (Some(expected), None) => Err(ValidationError::PredecessorMismatch {
            expected: Some(expected),
            got: None,
        }),
    }
}

/// Verify a packet's signature against its issuing key.
pub fn verify_packet_signature(
    packet: &CommitmentPacket,
    predecessor: Option<&CommitmentPacket>,
) -> Result<(), ValidationError> {
    // 1. Must be signed
    let signature = packet.signature.as_ref().ok_or(ValidationError::Unsigned)?;

    // 2. Resolve the issuing key
    let (key, scheme) = issuing_key(packet, predecessor)?;

    // 3. Verify over the digest
    key.verify(scheme, &packet.digest(), signature)
        .map_err(|_| ValidationError::SignatureFailed)
}

/// Classify a packet's signature without raising.
pub fn check_packet_signature(
    packet: &CommitmentPacket,
    predecessor: Option<&CommitmentPacket>,
) -> SignatureCheck {
    match verify_packet_signature(packet, predecessor) {
        Ok(()) => SignatureCheck::Valid,
        Err(ValidationError::Unsigned) => SignatureCheck::Unsigned,
        Err(_) => SignatureCheck::Invalid,
    }
}
