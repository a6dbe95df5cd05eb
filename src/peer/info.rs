//! The peer identity record and its codec.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::keys::{KeyError, KeyPair, PublicKey, SignatureBytes};
use crate::wire::{Encoder, Reader, WireError};

/// Domain-separation prefix for application digests.
///
/// Part of the signed bytes; changing it invalidates every stored
/// application signature.
const APPLICATION_CONTEXT: &[u8] = b"accord-circle-application-v1";

/// Wire flag bit marking a cloud-identity pseudo-peer.
const FLAG_CLOUD_IDENTITY: u8 = 0b01;
/// Wire flag bit marking a retirement ticket.
const FLAG_RETIREMENT_TICKET: u8 = 0b10;
/// All flag bits a decoder of this version understands.
const KNOWN_FLAGS: u64 = (FLAG_CLOUD_IDENTITY | FLAG_RETIREMENT_TICKET) as u64;

/// Stable peer identifier: hex-encoded SHA-256 of the device public key.
///
/// Derived, never transported: decoders recompute it from the key, so
/// a blob cannot claim an id that does not match its key material.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    /// Derives the identifier for a device public key.
    #[must_use]
    pub fn from_public_key(key: &PublicKey) -> Self {
        Self(hex::encode(key.digest()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One device's membership record.
///
/// Two pseudo-peer variants share the type: a *cloud identity* stands
/// in for a non-interactive relay and is exempt from co-signing, and a
/// *retirement ticket* records a device that has voluntarily left and
/// is pruned at the next generation-sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    id: PeerId,
    device_key: PublicKey,
    label: String,
    cloud_identity: bool,
    retirement_ticket: bool,
    application: Option<SignatureBytes>,
}

impl PeerInfo {
    /// Creates an ordinary device peer record with no application.
    #[must_use]
    pub fn new(device_key: PublicKey, label: impl Into<String>) -> Self {
        Self {
            id: PeerId::from_public_key(&device_key),
            device_key,
            label: label.into(),
            cloud_identity: false,
            retirement_ticket: false,
            application: None,
        }
    }

    /// Creates a cloud-identity pseudo-peer record.
    #[must_use]
    pub fn new_cloud_identity(device_key: PublicKey, label: impl Into<String>) -> Self {
        Self {
            cloud_identity: true,
            ..Self::new(device_key, label)
        }
    }

    /// Returns a retirement-ticket copy of this record.
    ///
    /// The ticket keeps the id and key so other devices can correlate
    /// the departure, but drops the application signature; a ticket
    /// never re-enters membership.
    #[must_use]
    pub fn retired(&self) -> Self {
        Self {
            retirement_ticket: true,
            application: None,
            ..self.clone()
        }
    }

    /// Returns the stable peer identifier.
    #[must_use]
    pub const fn id(&self) -> &PeerId {
        &self.id
    }

    /// Returns the device public key.
    #[must_use]
    pub const fn public_key(&self) -> &PublicKey {
        &self.device_key
    }

    /// Returns the human-readable device label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Replaces the device label.
    ///
    /// Labels are local metadata: they are transported but excluded
    /// from both the application digest and the canonical circle
    /// digest, so renaming a device invalidates nothing.
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// Returns whether this record is a cloud-identity pseudo-peer.
    #[must_use]
    pub const fn is_cloud_identity(&self) -> bool {
        self.cloud_identity
    }

    /// Returns whether this record is a retirement ticket.
    #[must_use]
    pub const fn is_retirement_ticket(&self) -> bool {
        self.retirement_ticket
    }

    /// Returns whether this peer participates in trust decisions.
    ///
    /// Retirement tickets are membership bookkeeping, not voters.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.retirement_ticket
    }

    /// Returns whether an application signature is attached.
    #[must_use]
    pub const fn has_application(&self) -> bool {
        self.application.is_some()
    }

    /// SHA-256 digest of the device public key bytes.
    ///
    /// The canonical hasher folds exactly these digests, in canonical
    /// order, into the circle digest.
    #[must_use]
    pub fn public_key_digest(&self) -> [u8; 32] {
        self.device_key.digest()
    }

    /// Canonical ordering for digest input: peer id first, public-key
    /// digest as the tie-break.
    ///
    /// This is a named comparator rather than an `Ord` impl because
    /// records that compare equal here may still differ in label or
    /// application, and `Ord` must agree with `Eq`.
    #[must_use]
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.id
            .cmp(&other.id)
            .then_with(|| self.public_key_digest().cmp(&other.public_key_digest()))
    }

    const fn flag_bits(&self) -> u8 {
        let mut flags = 0;
        if self.cloud_identity {
            flags |= FLAG_CLOUD_IDENTITY;
        }
        if self.retirement_ticket {
            flags |= FLAG_RETIREMENT_TICKET;
        }
        flags
    }

    fn flags(&self) -> u64 {
        u64::from(self.flag_bits())
    }

    /// Digest the user key signs when this peer applies for membership.
    ///
    /// Covers a context tag, the device public key, and the flag byte.
    /// The label is excluded: identity is the key, and a renamed
    /// device must not need to re-apply.
    #[must_use]
    pub fn application_digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(APPLICATION_CONTEXT);
        hasher.update(self.device_key.to_bytes());
        hasher.update([self.flag_bits()]);
        hasher.finalize().into()
    }

    /// Returns a copy of this record carrying a fresh application
    /// signature made with `user_key`.
    ///
    /// # Errors
    ///
    /// Returns a [`KeyError`] if the signing primitive fails.
    pub fn with_application(&self, user_key: &KeyPair) -> Result<Self, KeyError> {
        let mut updated = self.clone();
        updated.application = Some(user_key.sign(&updated.application_digest())?);
        Ok(updated)
    }

    /// Verifies the application signature against the user public key.
    ///
    /// Returns `false` when no application is attached or the signature
    /// does not verify.
    #[must_use]
    pub fn verify_application(&self, user_key: &PublicKey) -> bool {
        self.application
            .as_ref()
            .is_some_and(|sig| user_key.verify(&self.application_digest(), sig))
    }

    /// Appends this record's wire encoding to `enc`.
    pub fn encode_to(&self, enc: &mut Encoder) {
        enc.sequence(|e| {
            e.octets(&self.device_key.to_bytes());
            e.uint(self.flags());
            e.string(&self.label);
            match &self.application {
                Some(sig) => e.octets(sig.as_bytes()),
                None => e.octets(&[]),
            };
        });
    }

    /// Reads one record from `reader`.
    ///
    /// # Errors
    ///
    /// Returns a [`WireError`] on any malformed element, an invalid
    /// device key, unknown flag bits, or an application blob that is
    /// neither empty nor a 64-byte signature.
    pub fn decode_from(reader: &mut Reader<'_>) -> Result<Self, WireError> {
        let mut seq = reader.sequence()?;

        let key_bytes = seq.octets()?;
        let device_key = PublicKey::from_slice(key_bytes)
            .map_err(|e| WireError::BadContents(format!("device key: {e}")))?;

        let flags = seq.uint()?;
        if flags & !KNOWN_FLAGS != 0 {
            return Err(WireError::BadContents(format!(
                "unknown peer flags {flags:#x}"
            )));
        }

        let label = seq.string()?;

        let application_bytes = seq.octets()?;
        let application = if application_bytes.is_empty() {
            None
        } else {
            Some(SignatureBytes::from_slice(application_bytes).map_err(|e| {
                WireError::BadContents(format!("application signature: {e}"))
            })?)
        };

        seq.finish()?;

        Ok(Self {
            id: PeerId::from_public_key(&device_key),
            device_key,
            label,
            cloud_identity: flags & u64::from(FLAG_CLOUD_IDENTITY) != 0,
            retirement_ticket: flags & u64::from(FLAG_RETIREMENT_TICKET) != 0,
            application,
        })
    }

    /// Encodes this record as a standalone blob.
    ///
    /// # Errors
    ///
    /// Returns a [`WireError`] if the record exceeds wire limits.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut enc = Encoder::new();
        self.encode_to(&mut enc);
        enc.finish()
    }

    /// Decodes a standalone blob produced by [`PeerInfo::encode`].
    ///
    /// # Errors
    ///
    /// Returns a [`WireError`] on malformed input or trailing bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(bytes);
        let info = Self::decode_from(&mut reader)?;
        reader.finish()?;
        Ok(info)
    }
}
