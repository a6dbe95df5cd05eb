//! Canonical digest over a circle's signed content.
//!
//! Signatures never cover the encoded bytes of a circle directly; they
//! cover a fixed-length digest of its generation and member set. The
//! digest is canonical: peers are folded in a total order that does not
//! depend on insertion history, so every device that holds the same
//! membership computes the same bytes to sign.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::peer::{PeerId, PeerInfo};

/// Fixed-length digest of a circle's signed content.
#[derive(Clone, Copy, Eq)]
pub struct CircleDigest([u8; 32]);

impl CircleDigest {
    /// Returns the raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl PartialEq for CircleDigest {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl std::fmt::Debug for CircleDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CircleDigest({}..)", hex::encode(&self.0[..4]))
    }
}

/// Computes the canonical digest of `(generation, peers)`.
///
/// Peers are sorted by [`PeerInfo::canonical_cmp`] (peer id, then
/// public-key digest) before hashing. Each peer contributes its
/// public-key digest to a running hash whose output becomes the
/// member-set digest; the final digest chains the big-endian generation
/// with that member-set digest.
#[must_use]
pub fn content_digest(generation: u64, peers: &BTreeMap<PeerId, PeerInfo>) -> CircleDigest {
    let mut sorted: Vec<&PeerInfo> = peers.values().collect();
    sorted.sort_by(|a, b| a.canonical_cmp(b));

    let mut peers_hasher = Sha256::new();
    for peer in sorted {
        peers_hasher.update(peer.public_key_digest());
    }
    let peers_digest = peers_hasher.finalize();

    let mut hasher = Sha256::new();
    hasher.update(generation.to_be_bytes());
    hasher.update(peers_digest);
    CircleDigest(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;

    fn peer(seed: u8) -> PeerInfo {
        PeerInfo::new(KeyPair::from_seed([seed; 32]).public(), format!("dev-{seed}"))
    }

    fn map_of(peers: &[PeerInfo]) -> BTreeMap<PeerId, PeerInfo> {
        peers
            .iter()
            .map(|p| (p.id().clone(), p.clone()))
            .collect()
    }

    #[test]
    fn digest_is_deterministic() {
        let peers = map_of(&[peer(1), peer(2), peer(3)]);
        assert_eq!(content_digest(4, &peers), content_digest(4, &peers));
    }

    #[test]
    fn digest_ignores_insertion_order() {
        let a = peer(1);
        let b = peer(2);
        let c = peer(3);

        let forward = map_of(&[a.clone(), b.clone(), c.clone()]);
        let mut backward = BTreeMap::new();
        for p in [c, b, a] {
            backward.insert(p.id().clone(), p);
        }

        assert_eq!(content_digest(7, &forward), content_digest(7, &backward));
    }

    #[test]
    fn digest_changes_with_generation() {
        let peers = map_of(&[peer(1), peer(2)]);
        assert_ne!(content_digest(1, &peers), content_digest(2, &peers));
    }

    #[test]
    fn digest_changes_with_membership() {
        let two = map_of(&[peer(1), peer(2)]);
        let three = map_of(&[peer(1), peer(2), peer(3)]);
        assert_ne!(content_digest(1, &two), content_digest(1, &three));
    }

    #[test]
    fn digest_ignores_labels() {
        let mut relabeled = peer(1);
        relabeled.set_label("renamed");

        let original = map_of(&[peer(1)]);
        let renamed = map_of(&[relabeled]);
        assert_eq!(content_digest(1, &original), content_digest(1, &renamed));
    }

    #[test]
    fn empty_peer_set_still_hashes() {
        let empty = BTreeMap::new();
        assert_ne!(content_digest(0, &empty), content_digest(1, &empty));
    }

    #[test]
    fn debug_abbreviates() {
        let digest = content_digest(1, &map_of(&[peer(1)]));
        let debug = format!("{digest:?}");
        assert!(debug.starts_with("CircleDigest("));
        assert!(debug.len() < 30);
    }
}
