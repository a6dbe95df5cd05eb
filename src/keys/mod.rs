//! Asymmetric key objects for circle signing.
//!
//! Circles are endorsed by two kinds of Ed25519 keys: a *user* key
//! (shared across a person's devices, typically derived from a
//! credential) and per-device keys. Both are represented by the same
//! pair of types here: [`KeyPair`] for the signing half and
//! [`PublicKey`] for the verifying half.
//!
//! Signing operates over a 32-byte digest produced by the canonical
//! hasher; the digest bytes are signed directly, with no additional
//! padding or framing.
//!
//! # Security
//!
//! - Secret key material is zeroized on drop.
//! - `Debug` output never contains secret bytes.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

/// Errors from key construction and signing primitives.
#[derive(Error, Debug)]
pub enum KeyError {
    /// Byte slice has the wrong length for the expected key or signature.
    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Required length in bytes.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// Bytes do not form a valid public key.
    #[error("Invalid public key: {0}")]
    InvalidKey(String),

    /// The signing primitive failed.
    #[error("Signing failed: {0}")]
    Signing(String),
}

/// Result type alias for key operations.
pub type Result<T> = std::result::Result<T, KeyError>;

/// Stable string identifier derived from a public key.
///
/// The identifier is the hex-encoded SHA-256 digest of the public key
/// bytes. It keys the circle's signature map and is safe to log: it
/// reveals nothing beyond the (already public) key it names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyId(String);

impl KeyId {
    /// Derives the identifier for a public key.
    #[must_use]
    pub fn from_public_key(key: &PublicKey) -> Self {
        Self(hex::encode(key.digest()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reconstructs an identifier from its string form.
    ///
    /// Used by the codec when decoding a signature map; the value is
    /// not re-derived because the matching public key may not be known
    /// to the local device.
    #[must_use]
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A 64-byte Ed25519 signature.
///
/// Equality is constant-time to keep signature comparisons free of
/// timing side channels.
#[derive(Clone, Copy)]
pub struct SignatureBytes([u8; 64]);

impl SignatureBytes {
    /// Wraps a 64-byte array.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Builds a signature from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidLength`] if the slice is not exactly
    /// 64 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 64] = bytes.try_into().map_err(|_| KeyError::InvalidLength {
            expected: 64,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Returns the raw signature bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl PartialEq for SignatureBytes {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for SignatureBytes {}

impl std::fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Abbreviate: full blobs drown log lines without adding meaning
        write!(f, "SignatureBytes({}..)", hex::encode(&self.0[..8]))
    }
}

/// The verifying half of an Ed25519 key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Reconstructs a public key from its 32-byte encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid curve point.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        VerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))
    }

    /// Builds a public key from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidLength`] for a slice that is not 32
    /// bytes, or [`KeyError::InvalidKey`] for an invalid curve point.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| KeyError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        Self::from_bytes(&arr)
    }

    /// Returns the 32-byte key encoding.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// SHA-256 digest of the public key bytes.
    ///
    /// This digest is the canonical-ordering tie-break and the per-peer
    /// contribution to the circle digest, so its definition is part of
    /// the signed bytes and must not change.
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        hasher.finalize().into()
    }

    /// Derives the stable string identifier for this key.
    #[must_use]
    pub fn key_id(&self) -> KeyId {
        KeyId::from_public_key(self)
    }

    /// Verifies `signature` over a 32-byte digest.
    ///
    /// Returns `false` for any verification failure, malformed input
    /// included.
    #[must_use]
    pub fn verify(&self, digest: &[u8; 32], signature: &SignatureBytes) -> bool {
        let sig = Signature::from_bytes(signature.as_bytes());
        self.0.verify(digest, &sig).is_ok()
    }
}

/// An Ed25519 signing key with its public counterpart.
///
/// The secret half is wiped from memory when the value is dropped.
///
/// # Example
///
/// ```
/// use accord_core::keys::KeyPair;
///
/// let key = KeyPair::generate();
/// let digest = [0x42u8; 32];
/// let signature = key.sign(&digest).unwrap();
/// assert!(key.public().verify(&digest, &signature));
/// ```
pub struct KeyPair(SigningKey);

impl KeyPair {
    /// Generates a new random keypair.
    ///
    /// Uses the operating system's secure random number generator.
    #[must_use]
    pub fn generate() -> Self {
        Self(SigningKey::generate(&mut OsRng))
    }

    /// Deterministically derives a keypair from a 32-byte seed.
    ///
    /// The seed must come from a secure source (or a KDF over a user
    /// credential); every 32-byte value is a valid Ed25519 seed. The
    /// local copy of the seed is wiped once the key is constructed.
    #[must_use]
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let seed = Zeroizing::new(seed);
        Self(SigningKey::from_bytes(&seed))
    }

    /// Returns the verifying half of this keypair.
    #[must_use]
    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    /// Derives the stable string identifier for this keypair.
    #[must_use]
    pub fn key_id(&self) -> KeyId {
        self.public().key_id()
    }

    /// Signs a 32-byte digest, producing a 64-byte signature.
    ///
    /// The digest bytes are signed directly; no padding or framing is
    /// added.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Signing`] if the signing primitive fails.
    pub fn sign(&self, digest: &[u8; 32]) -> Result<SignatureBytes> {
        let sig = self
            .0
            .try_sign(digest)
            .map_err(|e| KeyError::Signing(e.to_string()))?;
        Ok(SignatureBytes(sig.to_bytes()))
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the secret key
        f.debug_struct("KeyPair")
            .field("key_id", &self.key_id())
            .finish()
    }
}
