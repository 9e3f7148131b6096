//! Chain keys: the secp256k1 keys that lock and spend anchors.
//!
//! These are separate from the token keys that sign packets. An actor holds
//! one chain key per network it can receive anchors on.

use std::fmt;

use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;

use crate::error::{BackendError, Result};

/// A secp256k1 key controlling anchors on one network.
#[derive(Clone)]
pub struct ChainKey {
    signing_key: SigningKey,
}

impl ChainKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            signing_key: SigningKey::random(&mut rng),
        }
    }

    /// Load from a 32-byte secret scalar.
    pub fn from_secret(secret: &[u8]) -> Result<Self> {
        let signing_key = SigningKey::from_slice(secret)
            .map_err(|_| BackendError::InvalidKey("secret is not a valid scalar".into()))?;
        Ok(Self { signing_key })
    }

    /// Load from a hex-encoded secret.
    pub fn from_secret_hex(secret: &str) -> Result<Self> {
        let bytes = hex::decode(secret.trim())
            .map_err(|e| BackendError::InvalidKey(e.to_string()))?;
        Self::from_secret(&bytes)
    }

    /// SEC1 compressed public key.
    pub fn public_key(&self) -> Vec<u8> {
        self.signing_key
            .verifying_key()
            .as_affine()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    /// Hex of the compressed public key.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key())
    }

    /// Pay-to-public-key locking script (`<pubkey> OP_CHECKSIG`), hex-encoded.
    pub fn locking_script(&self) -> String {
        locking_script_for(&self.public_key())
    }

    /// Sign a spend authorization for `anchor` carrying `payload`.
    pub fn authorize(&self, anchor: &str, payload: &[u8]) -> SpendAuthorization {
        let signature: Signature = self.signing_key.sign(&authorization_message(anchor, payload));
        SpendAuthorization {
            public_key: self.public_key(),
            signature: signature.to_bytes().to_vec(),
        }
    }
}

impl fmt::Debug for ChainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainKey({})", &self.public_key_hex()[..16])
    }
}

/// Locking script for a compressed public key.
pub fn locking_script_for(public_key: &[u8]) -> String {
    // push(33) <pubkey> OP_CHECKSIG
    let mut script = Vec::with_capacity(public_key.len() + 2);
    script.push(public_key.len() as u8);
    script.extend_from_slice(public_key);
    script.push(0xac);
    hex::encode(script)
}

fn authorization_message(anchor: &str, payload: &[u8]) -> Vec<u8> {
    let mut message = anchor.as_bytes().to_vec();
    message.extend_from_slice(payload);
    message
}

/// Proof that the holder of a chain key approved a spend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendAuthorization {
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
}

impl SpendAuthorization {
    /// Check the signature over `anchor ∥ payload`.
    pub fn verify(&self, anchor: &str, payload: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_sec1_bytes(&self.public_key) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&self.signature) else {
            return false;
        };
        key.verify(&authorization_message(anchor, payload), &signature)
            .is_ok()
    }

    /// Locking script this authorization can unlock.
    pub fn locking_script(&self) -> String {
        locking_script_for(&self.public_key)
    }
}
