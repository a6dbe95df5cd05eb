//! Concordance evaluation: deciding whether a candidate circle should
//! be trusted over the locally-known one.
//!
//! The surrounding sync engine receives candidate circles from other
//! devices and asks this evaluator whether to adopt one. The answer is
//! always a status, never an error; a malformed or hostile candidate
//! simply fails to earn `Trusted`. The one intentional side effect is
//! the best-effort refresh of stale local peer records when the known
//! circle's own signature no longer verifies.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::keys::PublicKey;
use crate::peer::{PeerId, PeerInfo};

use super::hash::CircleDigest;
use super::types::Circle;

/// Outcome of a concordance evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcordanceStatus {
    /// The proposed circle carries a valid endorsement from a trusted
    /// peer and may be adopted.
    Trusted,
    /// No trusted peer was available to endorse the proposal.
    NoPeer,
    /// A trusted peer was expected to endorse the proposal but no
    /// signature of theirs is present.
    NoPeerSig,
    /// A trusted peer's signature is present but does not verify.
    BadPeerSig,
    /// No user public key was supplied, so nothing can be evaluated.
    NoUserKey,
    /// The proposal carries no user-key signature.
    NoUserSig,
    /// The proposal's user-key signature does not verify.
    BadUserSig,
    /// The proposal would move the generation counter backwards.
    GenOld,
}

impl ConcordanceStatus {
    /// Returns whether the proposal may be adopted.
    #[must_use]
    pub const fn is_trusted(self) -> bool {
        matches!(self, Self::Trusted)
    }

    /// String form for logs and diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trusted => "trusted",
            Self::NoPeer => "no_peer",
            Self::NoPeerSig => "no_peer_sig",
            Self::BadPeerSig => "bad_peer_sig",
            Self::NoUserKey => "no_user_key",
            Self::NoUserSig => "no_user_sig",
            Self::BadUserSig => "bad_user_sig",
            Self::GenOld => "gen_old",
        }
    }

    /// Merges two per-peer statuses into one overall verdict.
    ///
    /// One valid endorsement is enough, so `Trusted` dominates
    /// everything. Otherwise a definitely-wrong signature outweighs a
    /// missing one, which outweighs having found no peer to ask at
    /// all; any other pairing keeps the first operand.
    #[must_use]
    pub const fn combine(self, other: Self) -> Self {
        match (self, other) {
            (Self::Trusted, _) | (_, Self::Trusted) => Self::Trusted,
            (Self::NoPeer | Self::NoPeerSig, Self::BadPeerSig)
            | (Self::BadPeerSig, Self::NoPeer | Self::NoPeerSig) => Self::BadPeerSig,
            (Self::NoPeer, Self::NoPeerSig) | (Self::NoPeerSig, Self::NoPeer) => Self::NoPeerSig,
            (first, _) => first,
        }
    }
}

impl std::fmt::Display for ConcordanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Circle {
    /// Evaluates whether `proposed` should be trusted over this circle.
    ///
    /// `known_device_key` is this device's own public key, used to
    /// check whether the locally-known circle still carries a valid
    /// self-endorsement; `user_key` is the shared user public key that
    /// validates memberships and the proposal's user signature;
    /// `excluded` names a peer that is not required to co-sign (for
    /// example the peer whose departure produced the proposal).
    ///
    /// Never fails: an untrustworthy proposal yields a non-`Trusted`
    /// status. The known circle is only touched when its own signature
    /// no longer verifies, in which case peer records shared with the
    /// proposal are refreshed before evaluation continues.
    pub fn concordance_trust(
        &mut self,
        proposed: &Self,
        known_device_key: Option<&PublicKey>,
        user_key: Option<&PublicKey>,
        excluded: Option<&PeerId>,
    ) -> ConcordanceStatus {
        let Some(user_key) = user_key else {
            return ConcordanceStatus::NoUserKey;
        };

        // An empty circle asserts nothing and needs no endorsement
        if proposed.is_empty() {
            return ConcordanceStatus::Trusted;
        }

        let proposed_digest = proposed.digest();
        match proposed.signatures.verify(&proposed_digest, user_key) {
            Ok(true) => {}
            Ok(false) => return ConcordanceStatus::BadUserSig,
            Err(_) => return ConcordanceStatus::NoUserSig,
        }

        // A fresh start or a single-device offering is judged by the
        // proposal's own members; the generation counter does not
        // constrain a new lineage.
        let offering = proposed.validated_active_peer_count(user_key) == 1;
        if self.is_empty() || offering {
            return fold_endorsements(
                proposed.validated_active_peers(user_key),
                proposed,
                &proposed_digest,
                excluded,
            );
        }

        if proposed.generation < self.generation {
            return ConcordanceStatus::GenOld;
        }

        // If our own copy no longer verifies under our device key (or
        // the user key), our peer records may be stale; refresh the
        // ones the proposal also carries before judging it.
        if !self.own_signature_intact(known_device_key, user_key) {
            let refreshed = self.upgrade_peers_from(proposed);
            debug!(circle = %self.name, refreshed, "refreshed stale peer records before evaluation");
        }

        fold_endorsements(
            self.validated_active_peers(user_key),
            proposed,
            &proposed_digest,
            excluded,
        )
    }

    /// Replaces every local peer record that also appears in `source`
    /// with the `source` version. Returns how many were replaced.
    ///
    /// Intentional mutation used by concordance evaluation; callers
    /// must hold exclusive access as for any other write.
    pub(crate) fn upgrade_peers_from(&mut self, source: &Self) -> usize {
        let ids: Vec<PeerId> = self.peers.keys().cloned().collect();
        let mut refreshed = 0;
        for id in ids {
            if let Some(newer) = source.peers.get(&id) {
                self.peers.insert(id, newer.clone());
                refreshed += 1;
            }
        }
        refreshed
    }

    fn validated_active_peers<'a>(
        &'a self,
        user_key: &'a PublicKey,
    ) -> impl Iterator<Item = &'a PeerInfo> {
        self.peers
            .values()
            .filter(move |peer| peer.is_active() && peer.verify_application(user_key))
    }

    fn validated_active_peer_count(&self, user_key: &PublicKey) -> usize {
        self.validated_active_peers(user_key).count()
    }

    fn own_signature_intact(&self, device_key: Option<&PublicKey>, user_key: &PublicKey) -> bool {
        let digest = self.digest();
        let by_device =
            device_key.is_some_and(|key| matches!(self.signatures.verify(&digest, key), Ok(true)));
        by_device || matches!(self.signatures.verify(&digest, user_key), Ok(true))
    }
}

/// Checks each candidate endorser's signature on the proposal and
/// folds the individual verdicts.
///
/// A missing signature from the excluded peer or from a cloud identity
/// downgrades to `NoPeer`: such peers are not required to co-sign. A
/// wrong signature is never excused.
fn fold_endorsements<'a>(
    endorsers: impl Iterator<Item = &'a PeerInfo>,
    proposed: &Circle,
    proposed_digest: &CircleDigest,
    excluded: Option<&PeerId>,
) -> ConcordanceStatus {
    endorsers.fold(ConcordanceStatus::NoPeer, |acc, peer| {
        let status = match proposed
            .signatures()
            .verify(proposed_digest, peer.public_key())
        {
            Ok(true) => ConcordanceStatus::Trusted,
            Ok(false) => ConcordanceStatus::BadPeerSig,
            Err(_) => {
                if peer.is_cloud_identity() || excluded == Some(peer.id()) {
                    ConcordanceStatus::NoPeer
                } else {
                    ConcordanceStatus::NoPeerSig
                }
            }
        };
        acc.combine(status)
    })
}
