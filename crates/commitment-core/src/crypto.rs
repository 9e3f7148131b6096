//! Cryptographic primitives for the commitment protocol.
//!
//! Wraps the three supported curves behind one scheme tag so the curve travels
//! with the packet instead of being assumed globally. ECDSA curves sign the
//! SHA-256 prehash of the message and produce fixed-size `r || s` signatures.

use ed25519_dalek::{Signer as _, Verifier as _};
use k256::ecdsa::signature::{Signer as _, Verifier as _};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Elliptic-curve signature scheme carried by every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureScheme {
    /// ECDSA over NIST P-256 with a SHA-256 prehash.
    #[serde(rename = "NIST256p")]
    NistP256,
    /// ECDSA over secp256k1 with a SHA-256 prehash.
    #[serde(rename = "SECP256k1")]
    Secp256k1,
    /// Ed25519 (pure, no prehash).
    #[serde(rename = "Ed25519")]
    Ed25519,
}

impl SignatureScheme {
    /// Every supported scheme.
    pub const ALL: [SignatureScheme; 3] = [
        SignatureScheme::NistP256,
        SignatureScheme::Secp256k1,
        SignatureScheme::Ed25519,
    ];

    /// The curve name, as hashed into identifiers.
    pub fn as_str(self) -> &'static str {
        match self {
            SignatureScheme::NistP256 => "NIST256p",
            SignatureScheme::Secp256k1 => "SECP256k1",
            SignatureScheme::Ed25519 => "Ed25519",
        }
    }

    /// Length of an encoded public key under this scheme.
    pub fn public_key_len(self) -> usize {
        match self {
            SignatureScheme::NistP256 | SignatureScheme::Secp256k1 => 33,
            SignatureScheme::Ed25519 => 32,
        }
    }
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureScheme {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NIST256p" => Ok(SignatureScheme::NistP256),
            "SECP256k1" => Ok(SignatureScheme::Secp256k1),
            "Ed25519" => Ok(SignatureScheme::Ed25519),
            other => Err(CoreError::UnknownScheme(other.to_string())),
        }
    }
}

/// An encoded public key: SEC1 compressed point for the ECDSA curves, the raw
/// 32 bytes for Ed25519. Serialized as lowercase hex.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenPublicKey(#[serde(with = "hex::serde")] pub Vec<u8>);

impl TokenPublicKey {
    /// Create from encoded bytes. No curve check is made here.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Get the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        Ok(Self(hex::decode(s)?))
    }

    /// Check that the bytes decode to a point on the given curve.
    pub fn check(&self, scheme: SignatureScheme) -> Result<(), CoreError> {
        match scheme {
            SignatureScheme::NistP256 => {
                p256::ecdsa::VerifyingKey::from_sec1_bytes(&self.0)
                    .map(|_| ())
                    .map_err(|_| CoreError::InvalidPublicKey(scheme.to_string()))
            }
            SignatureScheme::Secp256k1 => {
                k256::ecdsa::VerifyingKey::from_sec1_bytes(&self.0)
                    .map(|_| ())
                    .map_err(|_| CoreError::InvalidPublicKey(scheme.to_string()))
            }
            SignatureScheme::Ed25519 => ed25519_key(&self.0).map(|_| ()),
        }
    }

    /// Verify a signature over a message under the given scheme.
    pub fn verify(
        &self,
        scheme: SignatureScheme,
        message: &[u8],
        signature: &PacketSignature,
    ) -> Result<(), CoreError> {
        match scheme {
            SignatureScheme::NistP256 => {
                let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(&self.0)
                    .map_err(|_| CoreError::InvalidPublicKey(scheme.to_string()))?;
                let sig = p256::ecdsa::Signature::from_slice(&signature.0)
                    .map_err(|_| CoreError::InvalidSignature)?;
                key.verify(message, &sig)
                    .map_err(|_| CoreError::InvalidSignature)
            }
            SignatureScheme::Secp256k1 => {
                let key = k256::ecdsa::VerifyingKey::from_sec1_bytes(&self.0)
                    .map_err(|_| CoreError::InvalidPublicKey(scheme.to_string()))?;
                let sig = k256::ecdsa::Signature::from_slice(&signature.0)
                    .map_err(|_| CoreError::InvalidSignature)?;
                key.verify(message, &sig)
                    .map_err(|_| CoreError::InvalidSignature)
            }
            SignatureScheme::Ed25519 => {
                let key = ed25519_key(&self.0)?;
                let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
                key.verify(message, &sig)
                    .map_err(|_| CoreError::InvalidSignature)
            }
        }
    }
}

fn ed25519_key(bytes: &[u8]) -> Result<ed25519_dalek::VerifyingKey, CoreError> {
    let invalid = || CoreError::InvalidPublicKey(SignatureScheme::Ed25519.to_string());
    let arr: [u8; 32] = bytes.try_into().map_err(|_| invalid())?;
    ed25519_dalek::VerifyingKey::from_bytes(&arr).map_err(|_| invalid())
}

impl fmt::Debug for TokenPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "TokenPub({})", &hex[..hex.len().min(16)])
    }
}

impl fmt::Display for TokenPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for TokenPublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 64-byte packet signature (`r || s` for ECDSA, the native encoding for
/// Ed25519). Serialized as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketSignature(pub [u8; 64]);

impl PacketSignature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes).ok_or(hex::FromHexError::InvalidStringLength)
    }

    fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 64] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl fmt::Debug for PacketSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PacketSig({}...)", &self.to_hex()[..16])
    }
}

impl Serialize for PacketSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PacketSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A signing key on one of the supported curves.
///
/// Each actor holds exactly one of these for signing packets. The secret never
/// appears in `Debug` output.
#[derive(Clone)]
pub enum TokenKeypair {
    NistP256(p256::ecdsa::SigningKey),
    Secp256k1(k256::ecdsa::SigningKey),
    Ed25519(ed25519_dalek::SigningKey),
}

impl TokenKeypair {
    /// Generate a new random keypair on the given curve.
    pub fn generate(scheme: SignatureScheme) -> Self {
        let mut rng = rand::thread_rng();
        match scheme {
            SignatureScheme::NistP256 => Self::NistP256(p256::ecdsa::SigningKey::random(&mut rng)),
            SignatureScheme::Secp256k1 => {
                Self::Secp256k1(k256::ecdsa::SigningKey::random(&mut rng))
            }
            SignatureScheme::Ed25519 => {
                Self::Ed25519(ed25519_dalek::SigningKey::generate(&mut rng))
            }
        }
    }

    /// Load from a 32-byte secret scalar (ECDSA) or seed (Ed25519).
    pub fn from_secret(scheme: SignatureScheme, secret: &[u8]) -> Result<Self, CoreError> {
        let invalid = || CoreError::InvalidSecretKey(scheme.to_string());
        match scheme {
            SignatureScheme::NistP256 => p256::ecdsa::SigningKey::from_slice(secret)
                .map(Self::NistP256)
                .map_err(|_| invalid()),
            SignatureScheme::Secp256k1 => k256::ecdsa::SigningKey::from_slice(secret)
                .map(Self::Secp256k1)
                .map_err(|_| invalid()),
            SignatureScheme::Ed25519 => {
                let seed: [u8; 32] = secret.try_into().map_err(|_| invalid())?;
                Ok(Self::Ed25519(ed25519_dalek::SigningKey::from_bytes(&seed)))
            }
        }
    }

    /// Load from a hex-encoded secret.
    pub fn from_secret_hex(scheme: SignatureScheme, secret: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(secret.trim())
            .map_err(|_| CoreError::InvalidSecretKey(scheme.to_string()))?;
        Self::from_secret(scheme, &bytes)
    }

    /// The curve this key lives on.
    pub fn scheme(&self) -> SignatureScheme {
        match self {
            Self::NistP256(_) => SignatureScheme::NistP256,
            Self::Secp256k1(_) => SignatureScheme::Secp256k1,
            Self::Ed25519(_) => SignatureScheme::Ed25519,
        }
    }

    /// Get the encoded public key.
    pub fn public_key(&self) -> TokenPublicKey {
        match self {
            Self::NistP256(key) => TokenPublicKey(
                key.verifying_key()
                    .as_affine()
                    .to_encoded_point(true)
                    .as_bytes()
                    .to_vec(),
            ),
            Self::Secp256k1(key) => TokenPublicKey(
                key.verifying_key()
                    .as_affine()
                    .to_encoded_point(true)
                    .as_bytes()
                    .to_vec(),
            ),
            Self::Ed25519(key) => TokenPublicKey(key.verifying_key().to_bytes().to_vec()),
        }
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> PacketSignature {
        let mut out = [0u8; 64];
        match self {
            Self::NistP256(key) => {
                let sig: p256::ecdsa::Signature = key.sign(message);
                out.copy_from_slice(&sig.to_bytes());
            }
            Self::Secp256k1(key) => {
                let sig: k256::ecdsa::Signature = key.sign(message);
                out.copy_from_slice(&sig.to_bytes());
            }
            Self::Ed25519(key) => {
                out = key.sign(message).to_bytes();
            }
        }
        PacketSignature(out)
    }

    /// Get the raw secret bytes.
    pub fn secret_bytes(&self) -> Vec<u8> {
        match self {
            Self::NistP256(key) => key.to_bytes().to_vec(),
            Self::Secp256k1(key) => key.to_bytes().to_vec(),
            Self::Ed25519(key) => key.to_bytes().to_vec(),
        }
    }
}

impl fmt::Debug for TokenKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenKeypair({}, {:?})", self.scheme(), self.public_key())
    }
}

/// Sign `digest` with a raw secret on the named curve.
pub fn sign(
    scheme: SignatureScheme,
    secret: &[u8],
    digest: &[u8],
) -> Result<PacketSignature, CoreError> {
    Ok(TokenKeypair::from_secret(scheme, secret)?.sign(digest))
}

/// Verify `signature` over `digest` on the named curve.
///
/// Every failure, including an undecodable key, reports `false`. Callers that
/// need the reason use [`TokenPublicKey::verify`].
pub fn verify(
    scheme: SignatureScheme,
    public_key: &TokenPublicKey,
    signature: &PacketSignature,
    digest: &[u8],
) -> bool {
    public_key.verify(scheme, digest, signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_every_scheme() {
        for scheme in SignatureScheme::ALL {
            let keypair = TokenKeypair::generate(scheme);
            let message = b"hello world";
            let signature = keypair.sign(message);

            keypair
                .public_key()
                .verify(scheme, message, &signature)
                .expect("valid signature should verify");

            assert!(!verify(scheme, &keypair.public_key(), &signature, b"hello worlD"));
        }
    }

    #[test]
    fn test_public_key_lengths() {
        for scheme in SignatureScheme::ALL {
            let keypair = TokenKeypair::generate(scheme);
            assert_eq!(keypair.public_key().as_bytes().len(), scheme.public_key_len());
            keypair.public_key().check(scheme).unwrap();
        }
    }

    #[test]
    fn test_keypair_deterministic_from_secret() {
        for scheme in SignatureScheme::ALL {
            let kp1 = TokenKeypair::from_secret(scheme, &[0x42; 32]).unwrap();
            let kp2 = TokenKeypair::from_secret(scheme, &kp1.secret_bytes()).unwrap();
            assert_eq!(kp1.public_key(), kp2.public_key());
            assert_eq!(kp1.scheme(), scheme);
        }
    }

    #[test]
    fn test_ecdsa_signature_is_deterministic() {
        // RFC 6979 nonces: same key and message give the same signature.
        let kp = TokenKeypair::from_secret(SignatureScheme::NistP256, &[0x07; 32]).unwrap();
        assert_eq!(kp.sign(b"digest"), kp.sign(b"digest"));
    }

    #[test]
    fn test_wrong_curve_does_not_verify() {
        let kp = TokenKeypair::from_secret(SignatureScheme::NistP256, &[0x11; 32]).unwrap();
        let sig = kp.sign(b"digest");
        assert!(verify(SignatureScheme::NistP256, &kp.public_key(), &sig, b"digest"));
        assert!(!verify(SignatureScheme::Secp256k1, &kp.public_key(), &sig, b"digest"));
    }

    #[test]
    fn test_free_sign_matches_keypair() {
        let secret = [0x33u8; 32];
        let sig = sign(SignatureScheme::Secp256k1, &secret, b"m").unwrap();
        let kp = TokenKeypair::from_secret(SignatureScheme::Secp256k1, &secret).unwrap();
        assert!(verify(SignatureScheme::Secp256k1, &kp.public_key(), &sig, b"m"));
    }

    #[test]
    fn test_rejects_zero_secret() {
        assert!(TokenKeypair::from_secret(SignatureScheme::Secp256k1, &[0u8; 32]).is_err());
        assert!(TokenKeypair::from_secret(SignatureScheme::Ed25519, &[0u8; 31]).is_err());
    }

    #[test]
    fn test_scheme_names() {
        for scheme in SignatureScheme::ALL {
            assert_eq!(scheme.as_str().parse::<SignatureScheme>().unwrap(), scheme);
        }
        assert_eq!(
            serde_json::to_string(&SignatureScheme::NistP256).unwrap(),
            "\"NIST256p\""
        );
        assert!("P-384".parse::<SignatureScheme>().is_err());
    }

    #[test]
    fn test_signature_hex_roundtrip() {
        let sig = PacketSignature::from_bytes([0x5a; 64]);
        assert_eq!(PacketSignature::from_hex(&sig.to_hex()).unwrap(), sig);
        assert!(PacketSignature::from_hex("00ff").is_err());
    }
}
