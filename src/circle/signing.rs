//! Generation-signing: the single place where a membership mutation
//! becomes cryptographically committed.
//!
//! Committing bumps the generation, rebuilds the signature store from
//! scratch with the user key and the committing device's key, and
//! settles bookkeeping that rides along with a commit: retirement
//! tickets are pruned, stale rejections dropped, and applicants whose
//! attestation no longer verifies are demoted to rejected. The whole
//! sequence is fail-closed; a circle that failed to sign must never be
//! published, and on failure the caller's circle is left untouched.

use tracing::{info, warn};

use crate::keys::KeyPair;
use crate::peer::{FullPeerInfo, PeerId};

use super::error::{CircleError, Result};
use super::types::Circle;

impl Circle {
    /// Commits the current membership as a new signed generation.
    ///
    /// Retirement tickets still in the member set are pruned first;
    /// they have already served their purpose of announcing a
    /// departure. Rejected applicants are cleared, every remaining
    /// applicant is re-validated under the user key (failures are
    /// demoted to rejected rather than dropped silently), the
    /// generation is incremented, and the signature store is rebuilt
    /// with the user key and `device`'s key.
    ///
    /// # Errors
    ///
    /// Returns [`CircleError::BadSignature`] if either signing step
    /// fails; the circle is unchanged in that case.
    pub fn generation_sign(&mut self, user_key: &KeyPair, device: &FullPeerInfo) -> Result<()> {
        let mut working = self.clone();
        let pruned = working.prune_retired(None);
        working.commit_and_sign(user_key, device)?;

        *self = working;
        info!(
            circle = %self.name,
            generation = self.generation,
            pruned,
            "generation signed"
        );
        Ok(())
    }

    /// Republishes the device's own peer record and commits.
    ///
    /// The stored record for `identity` is replaced with a freshly
    /// attested copy, picking up label or flag changes, and the
    /// result is generation-signed. Applicants invalidated by a user
    /// key change surface in the rejected set after the commit.
    ///
    /// # Errors
    ///
    /// Returns [`CircleError::NotPeer`] if the identity is not a
    /// member, or any signing error. The circle is unchanged on
    /// failure.
    pub fn update_peer_info(&mut self, user_key: &KeyPair, identity: &FullPeerInfo) -> Result<()> {
        if !self.is_peer(identity.id()) {
            return Err(CircleError::NotPeer(identity.id().clone()));
        }

        let mut working = self.clone();
        let updated = identity.application(user_key)?;
        working.peers.insert(updated.id().clone(), updated);
        working.prune_retired(None);
        working.commit_and_sign(user_key, identity)?;

        *self = working;
        info!(circle = %self.name, peer = %identity.id(), generation = self.generation, "peer record updated");
        Ok(())
    }

    /// Announces the device's departure and commits.
    ///
    /// The identity's member record is replaced by a retirement
    /// ticket, which survives this commit so other devices learn of
    /// the departure; any later generation-signing prunes it. Tickets
    /// left over from earlier departures are pruned here.
    ///
    /// # Errors
    ///
    /// Returns [`CircleError::NotPeer`] if the identity is not a
    /// member, or any signing error. The circle is unchanged on
    /// failure.
    pub fn retire_peer(&mut self, user_key: &KeyPair, identity: &FullPeerInfo) -> Result<()> {
        let mut working = self.clone();
        let record = working
            .peers
            .remove(identity.id())
            .ok_or_else(|| CircleError::NotPeer(identity.id().clone()))?;
        let ticket = record.retired();
        working.peers.insert(ticket.id().clone(), ticket);
        working.prune_retired(Some(identity.id()));
        working.commit_and_sign(user_key, identity)?;

        *self = working;
        info!(circle = %self.name, peer = %identity.id(), generation = self.generation, "peer retired");
        Ok(())
    }

    /// Commit pipeline shared by every signing flow. Operates on a
    /// working copy owned by the caller; does not prune tickets.
    fn commit_and_sign(&mut self, user_key: &KeyPair, device: &FullPeerInfo) -> Result<()> {
        self.rejected_applicants.clear();

        let user_public = user_key.public();
        let failing: Vec<PeerId> = self
            .applicants
            .iter()
            .filter(|(_, record)| !record.verify_application(&user_public))
            .map(|(id, _)| id.clone())
            .collect();
        for id in failing {
            if let Some(record) = self.applicants.remove(&id) {
                warn!(circle = %self.name, peer = %id, "applicant attestation no longer verifies, demoting to rejected");
                self.rejected_applicants.insert(id, record);
            }
        }

        self.generation += 1;
        self.signatures.clear();
        let digest = self.digest();
        self.signatures.sign(&digest, user_key)?;
        self.signatures.sign(&digest, device.device_key())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_key() -> KeyPair {
        KeyPair::from_seed([100; 32])
    }

    fn identity(seed: u8) -> FullPeerInfo {
        FullPeerInfo::new(KeyPair::from_seed([seed; 32]), format!("dev-{seed}"))
    }

    fn two_peer_circle(alice: &FullPeerInfo, bob: &FullPeerInfo) -> Circle {
        let mut circle = Circle::new("test");
        circle.reset_to_offering(&user_key(), alice).unwrap();
        circle.request_admission(&user_key(), bob).unwrap();
        circle.accept_request(&user_key(), alice, bob.id()).unwrap();
        circle
    }

    #[test]
    fn generation_sign_increments_and_rebuilds_signatures() {
        let alice = identity(1);
        let bob = identity(2);
        let mut circle = two_peer_circle(&alice, &bob);
        assert_eq!(circle.generation(), 2);

        circle.generation_sign(&user_key(), &bob).unwrap();

        assert_eq!(circle.generation(), 3);
        assert_eq!(circle.signatures().len(), 2);
        assert!(circle.verify_signature(&user_key().public()).unwrap());
        assert!(circle.verify_signature(&bob.public_key()).unwrap());
        // Alice's previous endorsement did not survive the rebuild
        assert!(circle.verify_signature(&alice.public_key()).is_err());
    }

    #[test]
    fn generation_sign_prunes_retirement_tickets() {
        let alice = identity(1);
        let bob = identity(2);
        let mut circle = two_peer_circle(&alice, &bob);
        circle.retire_peer(&user_key(), &bob).unwrap();
        assert!(circle.is_peer(bob.id()));

        circle.generation_sign(&user_key(), &alice).unwrap();

        assert!(!circle.is_peer(bob.id()));
        assert_eq!(circle.peer_count(), 1);
    }

    #[test]
    fn generation_sign_clears_rejections_and_demotes_bad_applicants() {
        let alice = identity(1);
        let bob = identity(2);
        let carol = identity(3);
        let wrong_user = KeyPair::from_seed([101; 32]);
        let mut circle = Circle::new("test");
        circle.reset_to_offering(&user_key(), &alice).unwrap();
        circle.request_admission(&user_key(), &bob).unwrap();
        circle.reject_request(alice.id(), bob.id()).unwrap();
        circle.request_admission(&wrong_user, &carol).unwrap();

        circle.generation_sign(&user_key(), &alice).unwrap();

        assert!(!circle.is_rejected(bob.id()));
        assert!(circle.is_rejected(carol.id()));
        assert!(!circle.is_applicant(carol.id()));
    }

    #[test]
    fn valid_applicants_survive_generation_sign() {
        let alice = identity(1);
        let bob = identity(2);
        let mut circle = Circle::new("test");
        circle.reset_to_offering(&user_key(), &alice).unwrap();
        circle.request_admission(&user_key(), &bob).unwrap();

        circle.generation_sign(&user_key(), &alice).unwrap();

        assert!(circle.is_applicant(bob.id()));
    }

    #[test]
    fn retire_peer_leaves_a_ticket_for_one_commit() {
        let alice = identity(1);
        let bob = identity(2);
        let mut circle = two_peer_circle(&alice, &bob);
        let generation = circle.generation();

        circle.retire_peer(&user_key(), &bob).unwrap();

        let ticket = circle.peer(bob.id()).unwrap();
        assert!(ticket.is_retirement_ticket());
        assert!(!ticket.is_active());
        assert_eq!(circle.generation(), generation + 1);
        assert_eq!(circle.active_peer_count(), 1);
        assert!(circle.verify_signature(&bob.public_key()).unwrap());
    }

    #[test]
    fn retire_peer_prunes_earlier_tickets() {
        let alice = identity(1);
        let bob = identity(2);
        let carol = identity(3);
        let mut circle = two_peer_circle(&alice, &bob);
        circle.request_admission(&user_key(), &carol).unwrap();
        circle
            .accept_request(&user_key(), &alice, carol.id())
            .unwrap();

        circle.retire_peer(&user_key(), &bob).unwrap();
        circle.retire_peer(&user_key(), &carol).unwrap();

        assert!(!circle.is_peer(bob.id()));
        assert!(circle.peer(carol.id()).unwrap().is_retirement_ticket());
    }

    #[test]
    fn retire_peer_requires_membership() {
        let alice = identity(1);
        let bob = identity(2);
        let mut circle = Circle::new("test");
        circle.reset_to_offering(&user_key(), &alice).unwrap();

        let before = circle.clone();
        let err = circle.retire_peer(&user_key(), &bob).unwrap_err();

        assert!(matches!(err, CircleError::NotPeer(_)));
        assert_eq!(circle, before);
    }

    #[test]
    fn update_peer_info_republishes_the_record() {
        let alice = identity(1);
        let bob = identity(2);
        let mut circle = two_peer_circle(&alice, &bob);
        let generation = circle.generation();

        let mut renamed = identity(2);
        renamed.set_label("travel phone");
        circle.update_peer_info(&user_key(), &renamed).unwrap();

        let record = circle.peer(bob.id()).unwrap();
        assert_eq!(record.label(), "travel phone");
        assert!(record.verify_application(&user_key().public()));
        assert_eq!(circle.generation(), generation + 1);
        assert!(circle.verify_signature(&user_key().public()).unwrap());
    }

    #[test]
    fn update_peer_info_requires_membership() {
        let alice = identity(1);
        let bob = identity(2);
        let mut circle = Circle::new("test");
        circle.reset_to_offering(&user_key(), &alice).unwrap();

        let err = circle.update_peer_info(&user_key(), &bob).unwrap_err();
        assert!(matches!(err, CircleError::NotPeer(_)));
    }
}
