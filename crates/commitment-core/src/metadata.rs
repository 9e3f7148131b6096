//! Ledger record wrapping a packet with bookkeeping that is not signed.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::packet::CommitmentPacket;
use crate::types::{CommitmentState, CommitmentType, Cpid, Network};

/// A ledger record.
///
/// Created once by issuance or by a transfer proposal, updated once when the
/// transfer completes, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentPacketMetadata {
    /// The actor currently entitled to this packet.
    pub owner: String,

    /// How the record was created.
    #[serde(rename = "type")]
    pub kind: CommitmentType,

    pub state: CommitmentState,

    /// Transaction that created this packet's own anchor.
    pub ownership_tx: Option<String>,

    /// Transaction that consumed this packet's anchor. Set only once the next
    /// transfer completes.
    pub spending_tx: Option<String>,

    /// This record's identifier. Recomputed on load, never trusted.
    pub commitment_packet_id: Cpid,

    pub commitment_packet: CommitmentPacket,
}

impl CommitmentPacketMetadata {
    /// Wrap a fresh packet in a `Created` record, computing its identifier.
    pub fn new(
        owner: impl Into<String>,
        kind: CommitmentType,
        ownership_tx: Option<String>,
        packet: CommitmentPacket,
    ) -> Self {
        Self {
            owner: owner.into(),
            kind,
            state: CommitmentState::Created,
            ownership_tx,
            spending_tx: None,
            commitment_packet_id: packet.identifier(),
            commitment_packet: packet,
        }
    }

    /// The record's identifier.
    pub fn cpid(&self) -> Cpid {
        self.commitment_packet_id
    }

    /// The packet this record's packet supersedes.
    pub fn previous(&self) -> Option<Cpid> {
        self.commitment_packet.previous_packet
    }

    /// Check that the stored identifier matches the packet contents.
    pub fn verify_id(&self) -> Result<(), ValidationError> {
        let computed = self.commitment_packet.identifier();
        if computed != self.commitment_packet_id {
            return Err(ValidationError::IdMismatch {
                stored: self.commitment_packet_id,
                computed,
            });
        }
        Ok(())
    }

    /// Overwrite the stored identifier with the recomputed one.
    pub fn refresh_id(&mut self) {
        self.commitment_packet_id = self.commitment_packet.identifier();
    }

    /// Check if this record is still in the `Created` state.
    pub fn is_created(&self) -> bool {
        self.state == CommitmentState::Created
    }

    /// Check if this record's anchor has been consumed.
    pub fn is_spent(&self) -> bool {
        self.spending_tx.is_some()
    }

    /// A transfer template: transfer-typed, still `Created`, still unsigned.
    pub fn is_pending_transfer(&self) -> bool {
        self.kind == CommitmentType::Transfer
            && self.state == CommitmentState::Created
            && !self.commitment_packet.is_signed()
    }

    /// Check if this record describes the asset instance in the given state.
    pub fn is_match(
        &self,
        asset_id: &str,
        data: &str,
        network: Network,
        state: CommitmentState,
    ) -> bool {
        self.commitment_packet.is_match(asset_id, data, network) && self.state == state
    }
}
