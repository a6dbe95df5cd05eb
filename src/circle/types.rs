//! Core types for circle membership.
//!
//! This module defines the circle itself: the versioned group-state
//! object that devices mutate through admission operations and adopt
//! from each other through concordance evaluation.
//!
//! # Trust Model
//!
//! A circle carries no authority of its own. Its member list is only
//! as trustworthy as the signatures over its canonical digest, so
//! every accessor here is a plain read and every mutation lives in the
//! admission and signing operations, which re-establish the signature
//! invariants before a change is considered committed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::keys::{KeyPair, PublicKey};
use crate::peer::{PeerId, PeerInfo};

use super::error::Result;
use super::hash::{content_digest, CircleDigest};
use super::signatures::SignatureStore;

/// A versioned group-membership object representing a trusted device
/// group.
///
/// The three membership sets are disjoint by peer id. `peers` holds at
/// most one cloud-identity pseudo-peer; retirement tickets may appear
/// in `peers` until the next generation-signing prunes them.
#[derive(Clone, PartialEq, Eq)]
pub struct Circle {
    /// Stable identifier, set at creation and never mutated.
    pub(crate) name: String,
    /// Monotonic version counter, incremented on every committed
    /// membership change.
    pub(crate) generation: u64,
    /// Current members, keyed by peer id.
    pub(crate) peers: BTreeMap<PeerId, PeerInfo>,
    /// Devices requesting membership, disjoint from `peers`.
    pub(crate) applicants: BTreeMap<PeerId, PeerInfo>,
    /// Applicants turned away, disjoint from the other two sets.
    pub(crate) rejected_applicants: BTreeMap<PeerId, PeerInfo>,
    /// Signatures over the canonical digest of `(generation, peers)`.
    pub(crate) signatures: SignatureStore,
}

impl Circle {
    /// Creates an empty circle at generation zero.
    ///
    /// A fresh circle is unsigned and has no members; it becomes
    /// usable once a device performs the offering flow, which admits
    /// the device and commits generation one.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generation: 0,
            peers: BTreeMap::new(),
            applicants: BTreeMap::new(),
            rejected_applicants: BTreeMap::new(),
            signatures: SignatureStore::new(),
        }
    }

    /// Returns the circle name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current generation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Computes the canonical digest of the circle's signed content.
    #[must_use]
    pub fn digest(&self) -> CircleDigest {
        content_digest(self.generation, &self.peers)
    }

    /// Signs the circle's current digest with `key`, recording the
    /// signature in the store.
    ///
    /// Used by a device countersigning a circle it has decided to
    /// adopt. Committing a membership change goes through
    /// generation-signing instead, which clears the store first.
    ///
    /// # Errors
    ///
    /// Returns [`super::CircleError::BadSignature`] if signing fails.
    pub fn sign(&mut self, key: &KeyPair) -> Result<()> {
        let digest = self.digest();
        self.signatures.sign(&digest, key)
    }

    /// Verifies the stored signature for `key` against the circle's
    /// current digest.
    ///
    /// # Errors
    ///
    /// Returns [`super::CircleError::NoSignature`] if the store has no
    /// entry for the key.
    pub fn verify_signature(&self, key: &PublicKey) -> Result<bool> {
        self.signatures.verify(&self.digest(), key)
    }

    /// Returns the signature store.
    #[must_use]
    pub const fn signatures(&self) -> &SignatureStore {
        &self.signatures
    }

    /// Looks up a member by id.
    #[must_use]
    pub fn peer(&self, id: &PeerId) -> Option<&PeerInfo> {
        self.peers.get(id)
    }

    /// Looks up an applicant by id.
    #[must_use]
    pub fn applicant(&self, id: &PeerId) -> Option<&PeerInfo> {
        self.applicants.get(id)
    }

    /// Returns whether the id belongs to a current member.
    #[must_use]
    pub fn is_peer(&self, id: &PeerId) -> bool {
        self.peers.contains_key(id)
    }

    /// Returns whether the id belongs to a pending applicant.
    #[must_use]
    pub fn is_applicant(&self, id: &PeerId) -> bool {
        self.applicants.contains_key(id)
    }

    /// Returns whether the id belongs to a rejected applicant.
    #[must_use]
    pub fn is_rejected(&self, id: &PeerId) -> bool {
        self.rejected_applicants.contains_key(id)
    }

    /// Iterates current members in id order.
    pub fn peers(&self) -> impl Iterator<Item = &PeerInfo> {
        self.peers.values()
    }

    /// Iterates pending applicants in id order.
    pub fn applicants(&self) -> impl Iterator<Item = &PeerInfo> {
        self.applicants.values()
    }

    /// Iterates rejected applicants in id order.
    pub fn rejected_applicants(&self) -> impl Iterator<Item = &PeerInfo> {
        self.rejected_applicants.values()
    }

    /// Iterates members that are not retirement tickets.
    pub fn active_peers(&self) -> impl Iterator<Item = &PeerInfo> {
        self.peers.values().filter(|p| p.is_active())
    }

    /// Number of current members, tickets included.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Number of members that are not retirement tickets.
    #[must_use]
    pub fn active_peer_count(&self) -> usize {
        self.active_peers().count()
    }

    /// Number of pending applicants.
    #[must_use]
    pub fn applicant_count(&self) -> usize {
        self.applicants.len()
    }

    /// Returns whether the circle has any pending applicants.
    #[must_use]
    pub fn has_applicants(&self) -> bool {
        !self.applicants.is_empty()
    }

    /// Returns whether the circle has no members at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Returns the cloud-identity pseudo-peer, if one is enrolled.
    #[must_use]
    pub fn cloud_identity(&self) -> Option<&PeerInfo> {
        self.peers.values().find(|p| p.is_cloud_identity())
    }

    /// Produces a serializable snapshot for diagnostics and logging.
    ///
    /// The summary carries ids, labels, and flags only; no key or
    /// signature material.
    #[must_use]
    pub fn summary(&self) -> CircleSummary {
        CircleSummary {
            name: self.name.clone(),
            generation: self.generation,
            peer_count: self.peers.len(),
            applicant_count: self.applicants.len(),
            rejected_count: self.rejected_applicants.len(),
            peers: self.peers.values().map(PeerSummary::from).collect(),
            signer_ids: self
                .signatures
                .iter()
                .map(|(id, _)| id.as_str().to_string())
                .collect(),
        }
    }

    /// Inserts a member, displacing any previously enrolled cloud
    /// identity when the incoming record is itself a cloud identity.
    pub(crate) fn admit_peer(&mut self, peer: PeerInfo) -> Option<PeerInfo> {
        let displaced = if peer.is_cloud_identity() {
            let old_id = self.cloud_identity().map(|p| p.id().clone());
            old_id.and_then(|id| self.peers.remove(&id))
        } else {
            None
        };
        self.peers.insert(peer.id().clone(), peer);
        displaced
    }

    /// Removes retirement tickets from `peers`, sparing `keep`.
    ///
    /// Returns how many tickets were pruned.
    pub(crate) fn prune_retired(&mut self, keep: Option<&PeerId>) -> usize {
        let before = self.peers.len();
        self.peers
            .retain(|id, peer| peer.is_active() || keep == Some(id));
        before - self.peers.len()
    }
}

impl std::fmt::Debug for Circle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Circle")
            .field("name", &self.name)
            .field("generation", &self.generation)
            .field("peers", &self.peers.len())
            .field("applicants", &self.applicants.len())
            .field("rejected_applicants", &self.rejected_applicants.len())
            .field("signatures", &self.signatures.len())
            .finish()
    }
}

/// Snapshot of one member for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerSummary {
    /// Stable peer id (hex).
    pub id: String,
    /// Device label.
    pub label: String,
    /// Whether the record is the cloud-identity pseudo-peer.
    pub cloud_identity: bool,
    /// Whether the record is a retirement ticket.
    pub retirement_ticket: bool,
}

impl From<&PeerInfo> for PeerSummary {
    fn from(peer: &PeerInfo) -> Self {
        Self {
            id: peer.id().as_str().to_string(),
            label: peer.label().to_string(),
            cloud_identity: peer.is_cloud_identity(),
            retirement_ticket: peer.is_retirement_ticket(),
        }
    }
}

/// Serializable snapshot of a circle for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircleSummary {
    /// Circle name.
    pub name: String,
    /// Current generation.
    pub generation: u64,
    /// Number of members, tickets included.
    pub peer_count: usize,
    /// Number of pending applicants.
    pub applicant_count: usize,
    /// Number of rejected applicants.
    pub rejected_count: usize,
    /// Member snapshots in id order.
    pub peers: Vec<PeerSummary>,
    /// Identifiers of keys with a recorded signature.
    pub signer_ids: Vec<String>,
}

impl CircleSummary {
    /// Creates a `CircleSummary` from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or missing required fields.
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Converts this `CircleSummary` to a JSON string.
    ///
    /// Note: key and signature material is never part of a summary.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (extremely rare).
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
