//! Per-key signature store over the circle digest.
//!
//! Every committed circle carries one signature per endorsing key,
//! keyed by the key's derived identifier. Entries are only ever
//! populated by signing the current canonical digest; any mutation of
//! the signed content clears the store before re-signing, so stale
//! endorsements never survive a membership change.

use std::collections::BTreeMap;

use crate::keys::{KeyId, KeyPair, PublicKey, SignatureBytes};

use super::error::{CircleError, Result};
use super::hash::CircleDigest;

/// Map of key identifier to signature over a circle digest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureStore {
    entries: BTreeMap<KeyId, SignatureBytes>,
}

impl SignatureStore {
    /// Creates an empty store.
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Signs the digest with `key` and records the signature under the
    /// key's identifier, replacing any previous entry for that key.
    ///
    /// # Errors
    ///
    /// Returns [`CircleError::BadSignature`] if the signing primitive
    /// fails.
    pub(crate) fn sign(&mut self, digest: &CircleDigest, key: &KeyPair) -> Result<()> {
        let signature = key.sign(digest.as_bytes())?;
        self.entries.insert(key.key_id(), signature);
        Ok(())
    }

    /// Verifies the stored signature for `key` against the digest.
    ///
    /// # Errors
    ///
    /// Returns [`CircleError::NoSignature`] if no entry exists for the
    /// key. A present but invalid signature is `Ok(false)`, not an
    /// error.
    pub(crate) fn verify(&self, digest: &CircleDigest, key: &PublicKey) -> Result<bool> {
        let key_id = key.key_id();
        let signature = self
            .entries
            .get(&key_id)
            .ok_or(CircleError::NoSignature(key_id))?;
        Ok(key.verify(digest.as_bytes(), signature))
    }

    /// Removes every entry.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Records a raw signature entry, replacing any previous one.
    ///
    /// Used by the codec when rebuilding a circle from the wire; the
    /// entry is not validated here.
    pub(crate) fn insert(&mut self, key_id: KeyId, signature: SignatureBytes) {
        self.entries.insert(key_id, signature);
    }

    /// Returns the signature recorded for a key identifier, if any.
    #[must_use]
    pub fn get(&self, key_id: &KeyId) -> Option<&SignatureBytes> {
        self.entries.get(key_id)
    }

    /// Returns whether a signature is recorded for the key identifier.
    #[must_use]
    pub fn contains(&self, key_id: &KeyId) -> bool {
        self.entries.contains_key(key_id)
    }

    /// Number of recorded signatures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the store holds no signatures.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in key-identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&KeyId, &SignatureBytes)> {
        self.entries.iter()
    }
}
