//! Strong type definitions for the commitment protocol.
//!
//! Identifiers and tags are newtypes or closed enums so they cannot be mixed up
//! at compile time.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A 32-byte commitment packet identifier, computed as SHA-256 over the
/// packet's fields (everything except the signature).
///
/// This is the content-address of a packet and the value embedded on-chain
/// when a transfer is finalized. It serializes as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cpid(pub [u8; 32]);

impl Cpid {
    /// Create a new Cpid from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Cpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cpid({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Cpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Cpid {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl AsRef<[u8]> for Cpid {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Cpid {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Cpid {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}

impl Serialize for Cpid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Cpid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// The closed set of networks a packet can be anchored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Network {
    /// The UTXO-model chain.
    #[serde(rename = "BSV")]
    Bsv,
    /// The account/contract-model chain.
    #[serde(rename = "ETH")]
    Eth,
}

impl Network {
    /// Every supported network, in tag order.
    pub const ALL: [Network; 2] = [Network::Bsv, Network::Eth];

    /// The wire tag, as hashed into identifiers.
    pub fn as_str(self) -> &'static str {
        match self {
            Network::Bsv => "BSV",
            Network::Eth => "ETH",
        }
    }

    /// Whether anchors on this network are spendable outputs.
    pub fn is_utxo(self) -> bool {
        matches!(self, Network::Bsv)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BSV" => Ok(Network::Bsv),
            "ETH" => Ok(Network::Eth),
            other => Err(CoreError::UnknownNetwork(other.to_string())),
        }
    }
}

/// How a ledger record came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommitmentType {
    /// Root of a lineage.
    Issuance,
    /// Successor of an existing packet.
    Transfer,
}

/// Lifecycle state of a ledger record.
///
/// `Transferred` is terminal: once a record's anchor has been spent it never
/// reverts to `Created`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommitmentState {
    Created,
    Transferred,
}

impl CommitmentState {
    /// Check if this is the terminal state.
    pub fn is_terminal(self) -> bool {
        self == CommitmentState::Transferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpid_hex_roundtrip() {
        let id = Cpid::from_bytes([0x42; 32]);
        let hex = id.to_hex();
        let recovered = Cpid::from_hex(&hex).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_cpid_rejects_short_hex() {
        assert!(Cpid::from_hex("abcd").is_err());
        assert!(Cpid::from_hex("zz").is_err());
    }

    #[test]
    fn test_cpid_display_is_full_hex() {
        let id = Cpid::from_bytes([0xab; 32]);
        assert_eq!(format!("{}", id).len(), 64);
        assert!(format!("{:?}", id).starts_with("Cpid(abababab"));
    }

    #[test]
    fn test_cpid_serializes_as_hex_string() {
        let id = Cpid::from_bytes([0x01; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(32)));
        let back: Cpid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_network_tags() {
        assert_eq!(Network::Bsv.to_string(), "BSV");
        assert_eq!("ETH".parse::<Network>().unwrap(), Network::Eth);
        assert!("LTC".parse::<Network>().is_err());
        assert_eq!(serde_json::to_string(&Network::Eth).unwrap(), "\"ETH\"");
    }

    #[test]
    fn test_state_terminal() {
        assert!(CommitmentState::Transferred.is_terminal());
        assert!(!CommitmentState::Created.is_terminal());
    }
}
