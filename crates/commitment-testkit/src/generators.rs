//! Proptest generators for property-based testing.

use proptest::prelude::*;

use commitment_core::{
    CommitmentPacket, Cpid, Network, SignatureScheme, TokenKeypair, TokenPublicKey,
};

/// Generate a signature scheme.
pub fn scheme() -> impl Strategy<Value = SignatureScheme> {
    prop_oneof![
        Just(SignatureScheme::NistP256),
        Just(SignatureScheme::Secp256k1),
        Just(SignatureScheme::Ed25519),
    ]
}

/// Generate a keypair on a random curve.
///
/// Secrets outside the curve order are skipped.
pub fn token_keypair() -> impl Strategy<Value = TokenKeypair> {
    (scheme(), any::<[u8; 32]>()).prop_filter_map("secret out of range", |(scheme, secret)| {
        TokenKeypair::from_secret(scheme, &secret).ok()
    })
}

/// Generate an encoded public key.
pub fn public_key() -> impl Strategy<Value = TokenPublicKey> {
    token_keypair().prop_map(|kp| kp.public_key())
}

/// Generate a random Cpid.
pub fn cpid() -> impl Strategy<Value = Cpid> {
    any::<[u8; 32]>().prop_map(Cpid::from_bytes)
}

/// Generate a network tag.
pub fn network() -> impl Strategy<Value = Network> {
    prop_oneof![Just(Network::Bsv), Just(Network::Eth)]
}

/// Generate an asset descriptor.
pub fn asset_id() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}".prop_map(String::from)
}

/// Generate a token identifier.
pub fn token_id() -> impl Strategy<Value = String> {
    "tok-[0-9]{1,4}".prop_map(String::from)
}

/// Generate an anchor in the encoding used by `network`.
pub fn outpoint(network: Network) -> BoxedStrategy<String> {
    match network {
        Network::Bsv => "[0-9a-f]{64}:[0-9]{1,2}".prop_map(String::from).boxed(),
        Network::Eth => "0x[0-9a-f]{64}".prop_map(String::from).boxed(),
    }
}

/// Parameters for generating a packet.
#[derive(Debug, Clone)]
pub struct PacketParams {
    pub keypair: TokenKeypair,
    pub asset_id: String,
    pub data: String,
    pub network: Network,
    pub outpoint: String,
    pub previous: Option<Cpid>,
}

impl Arbitrary for PacketParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        network()
            .prop_flat_map(|network| {
                (
                    token_keypair(),
                    asset_id(),
                    token_id(),
                    Just(network),
                    outpoint(network),
                    proptest::option::of(cpid()),
                )
            })
            .prop_map(|(keypair, asset_id, data, network, outpoint, previous)| PacketParams {
                keypair,
                asset_id,
                data,
                network,
                outpoint,
                previous,
            })
            .boxed()
    }
}

/// Build a packet from parameters, signed with its own key.
pub fn packet_from_params(params: &PacketParams) -> CommitmentPacket {
    let mut packet = CommitmentPacket {
        asset_id: params.asset_id.clone(),
        data: params.data.clone(),
        previous_packet: params.previous,
        blockchain_id: params.network,
        blockchain_outpoint: params.outpoint.clone(),
        public_key: params.keypair.public_key(),
        signature_scheme: params.keypair.scheme(),
        signature: None,
    };
    packet.sign_with(&params.keypair);
    packet
}

/// Build an unsigned successor of `prev` for `beneficiary`, signed by
/// `outgoing`.
pub fn successor(
    prev: &CommitmentPacket,
    beneficiary: &TokenKeypair,
    outgoing: &TokenKeypair,
    outpoint: &str,
) -> CommitmentPacket {
    let mut packet = CommitmentPacket {
        asset_id: prev.asset_id.clone(),
        data: prev.data.clone(),
        previous_packet: Some(prev.identifier()),
        blockchain_id: prev.blockchain_id,
        blockchain_outpoint: outpoint.to_string(),
        public_key: beneficiary.public_key(),
        signature_scheme: beneficiary.scheme(),
        signature: None,
    };
    packet.sign_with(outgoing);
    packet
}
