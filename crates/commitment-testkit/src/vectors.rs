//! Golden test vectors for deterministic verification.
//!
//! Each vector fixes every signed field of a packet and pins both the
//! identifier and the SHA-256 of the signing digest. Any change to either
//! byte layout breaks them.

use commitment_core::{CommitmentPacket, Cpid, Network, SignatureScheme, TokenPublicKey};
use sha2::{Digest, Sha256};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub asset_id: &'static str,
    pub data: &'static str,
    pub network: Network,
    pub scheme: SignatureScheme,
    /// Encoded public key (hex).
    pub public_key: &'static str,
    /// Superseded packet (hex), if any.
    pub previous: Option<&'static str>,
    pub outpoint: &'static str,
    /// Expected identifier (hex).
    pub expected_cpid: &'static str,
    /// Expected SHA-256 of the signing digest (hex).
    pub expected_digest_sha256: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "P-256 issuance on BSV",
            asset_id: "art",
            data: "tok-1",
            network: Network::Bsv,
            scheme: SignatureScheme::NistP256,
            public_key: "024242424242424242424242424242424242424242424242424242424242424242",
            previous: None,
            outpoint: "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa:0",
            expected_cpid: "4385e12aa182e7ea29beabe14a2de6253e1a2109fa7d255f3013440544a302f5",
            expected_digest_sha256:
                "8f8fbda2e647a7a62c45d028b93d2f410f91e22d79cb3b80bb143496a44b6fd6",
        },
        GoldenVector {
            name: "P-256 transfer of the BSV issuance",
            asset_id: "art",
            data: "tok-1",
            network: Network::Bsv,
            scheme: SignatureScheme::NistP256,
            public_key: "031717171717171717171717171717171717171717171717171717171717171717",
            previous: Some("4385e12aa182e7ea29beabe14a2de6253e1a2109fa7d255f3013440544a302f5"),
            outpoint: "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb:0",
            expected_cpid: "ae4ebcf5b75201a01d42037951ab8364a2eca514916da81003035c526596afa8",
            expected_digest_sha256:
                "a49e80eb33590b6b7deeb6784abbba130e727724dbe672dfb54c9cafb44aa833",
        },
        GoldenVector {
            name: "secp256k1 issuance on ETH",
            asset_id: "music",
            data: "tok-2",
            network: Network::Eth,
            scheme: SignatureScheme::Secp256k1,
            public_key: "02a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5",
            previous: None,
            outpoint: "0xcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcd",
            expected_cpid: "58bc8b0fce2cdfc3d1f95f1e0ae2c7148ac48b9af84b02b9b591ee9baf7a67ae",
            expected_digest_sha256:
                "0e00dfd58cf4dfe24ef74db866ad0f5b1ca052d2b3a99e6bc8ea0b3a5bd6c0a1",
        },
        GoldenVector {
            name: "Ed25519 issuance on BSV",
            asset_id: "art",
            data: "tok-3",
            network: Network::Bsv,
            scheme: SignatureScheme::Ed25519,
            public_key: "5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e",
            previous: None,
            outpoint: "eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee:1",
            expected_cpid: "6f4734016de2fbbcf771daccbf2e829c106aaf66b21edaf3ec8407938a629d89",
            expected_digest_sha256:
                "4ab56adb8ebd825a21c1387b80e7adfb7ea9f205ec0f0287b73eca4eb11a359e",
        },
        GoldenVector {
            name: "Non-ASCII asset descriptor",
            asset_id: "картина",
            data: "tok-4",
            network: Network::Eth,
            scheme: SignatureScheme::NistP256,
            public_key: "024242424242424242424242424242424242424242424242424242424242424242",
            previous: None,
            outpoint: "0x0101010101010101010101010101010101010101010101010101010101010101",
            expected_cpid: "5942b46596ea022b70a9abcb7936c3ec1d9f1c05fdbce85c4545be779589c4d9",
            expected_digest_sha256:
                "0aa4510cfe822a6fea7ca3c2bd29a9ba2a86e84a552232c45733d1b19985429e",
        },
    ]
}

/// Build the unsigned packet a vector describes.
pub fn packet_from_vector(vector: &GoldenVector) -> Result<CommitmentPacket, hex::FromHexError> {
    Ok(CommitmentPacket {
        asset_id: vector.asset_id.to_string(),
        data: vector.data.to_string(),
        previous_packet: vector.previous.map(Cpid::from_hex).transpose()?,
        blockchain_id: vector.network,
        blockchain_outpoint: vector.outpoint.to_string(),
        public_key: TokenPublicKey::from_hex(vector.public_key)?,
        signature_scheme: vector.scheme,
        signature: None,
    })
}

/// Check every vector, returning the names of those that do not match.
pub fn verify_all_vectors() -> Result<(), Vec<&'static str>> {
    let failed: Vec<_> = all_vectors()
        .into_iter()
        .filter(|v| !vector_matches(v))
        .map(|v| v.name)
        .collect();
    if failed.is_empty() {
        Ok(())
    } else {
        Err(failed)
    }
}

fn vector_matches(vector: &GoldenVector) -> bool {
    let Ok(packet) = packet_from_vector(vector) else {
        return false;
    };
    let digest = hex::encode(Sha256::digest(packet.digest()));
    packet.identifier().to_hex() == vector.expected_cpid
        && digest == vector.expected_digest_sha256
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_match() {
        assert_eq!(verify_all_vectors(), Ok(()));
    }

    #[test]
    fn test_transfer_vector_links_issuance() {
        let vectors = all_vectors();
        let root = packet_from_vector(&vectors[0]).unwrap();
        let next = packet_from_vector(&vectors[1]).unwrap();
        assert_eq!(next.previous_packet, Some(root.identifier()));
        assert!(root.is_issuance());
    }

    #[test]
    fn test_digest_is_readable_text() {
        let vector = &all_vectors()[2];
        let packet = packet_from_vector(vector).unwrap();
        let expected = format!("musictok-2{}{}ETH", vector.public_key, vector.outpoint);
        assert_eq!(packet.digest(), expected.into_bytes());
    }

    #[test]
    fn test_identifiers_are_lowercase_hex() {
        for vector in all_vectors() {
            let id = packet_from_vector(&vector).unwrap().identifier().to_hex();
            assert_eq!(id.len(), 64);
            assert!(id.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')), "{}", vector.name);
        }
    }
}
