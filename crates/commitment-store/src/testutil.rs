//! Record builders shared by the ledger tests.

use commitment_core::{
    CommitmentPacketMetadata, CommitmentType, Network, PacketBuilder, SignatureScheme,
    TokenKeypair,
};

pub(crate) fn keypair_for(actor: &str) -> TokenKeypair {
    // `[0xff; 32]` exceeds the P-256 group order.
    let seed = actor.bytes().fold(0u8, |acc, b| acc.wrapping_add(b)) % 0x7f + 1;
    TokenKeypair::from_secret(SignatureScheme::NistP256, &[seed; 32]).unwrap()
}

pub(crate) fn issuance(owner: &str, data: &str, network: Network) -> CommitmentPacketMetadata {
    let kp = keypair_for(owner);
    let outpoint = match network {
        Network::Bsv => format!("{data}-mint:1"),
        Network::Eth => format!("0x{data}"),
    };
    let packet = PacketBuilder::new("art", data)
        .network(network)
        .outpoint(outpoint.clone())
        .beneficiary(kp.public_key(), kp.scheme())
        .sign(&kp)
        .unwrap();
    CommitmentPacketMetadata::new(owner, CommitmentType::Issuance, Some(outpoint), packet)
}

pub(crate) fn transfer_template(
    prev: &CommitmentPacketMetadata,
    owner: &str,
    outpoint: &str,
) -> CommitmentPacketMetadata {
    let kp = keypair_for(owner);
    let source = &prev.commitment_packet;
    let packet = PacketBuilder::new(source.asset_id.clone(), source.data.clone())
        .network(source.blockchain_id)
        .outpoint(outpoint)
        .beneficiary(kp.public_key(), kp.scheme())
        .previous(prev.cpid())
        .build()
        .unwrap();
    CommitmentPacketMetadata::new(owner, CommitmentType::Transfer, Some(outpoint.into()), packet)
}

mod tests {
    use super::*;

    #[test]
    fn test_every_actor_name_yields_a_key() {
        for name in ["alice", "bob", "ted", "", "\u{ff}\u{ff}"] {
            keypair_for(name);
        }
        let keys: Vec<_> = ["alice", "bob", "ted"]
            .iter()
            .map(|name| keypair_for(name).public_key())
            .collect();
        assert_ne!(keys[0], keys[1]);
        assert_ne!(keys[1], keys[2]);
        assert_ne!(keys[0], keys[2]);
    }
}
