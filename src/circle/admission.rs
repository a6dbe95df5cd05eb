//! Admission state machine: how a device moves between the applicant,
//! member, and rejected sets.
//!
//! A peer's states form `NotPresent -> Applicant -> (Peer | Rejected)`,
//! with withdrawal returning an applicant to `NotPresent` and removal
//! returning a member to `NotPresent`. Operations that change the
//! member set are committed through generation-signing; on any failure
//! the circle passed in is left untouched.

use tracing::{debug, info};

use crate::keys::KeyPair;
use crate::peer::{FullPeerInfo, PeerId};

use super::error::{CircleError, Result};
use super::types::Circle;

impl Circle {
    /// Files (or refreshes) an admission request for `requestor`.
    ///
    /// The requestor's record is re-attested under the user key and
    /// placed in the applicant set, replacing any earlier application
    /// or rejection for the same id. The member set is untouched, so
    /// no generation-signing happens here.
    ///
    /// # Errors
    ///
    /// Returns [`CircleError::AlreadyPeer`] if the requestor is a
    /// current member (a retirement ticket still counts as a member
    /// until it is pruned), or a signing error if the attestation
    /// cannot be produced.
    pub fn request_admission(
        &mut self,
        user_key: &KeyPair,
        requestor: &FullPeerInfo,
    ) -> Result<()> {
        if self.is_peer(requestor.id()) {
            return Err(CircleError::AlreadyPeer(requestor.id().clone()));
        }

        let applied = requestor.application(user_key)?;
        let id = applied.id().clone();
        self.applicants.remove(&id);
        self.rejected_applicants.remove(&id);
        self.applicants.insert(id.clone(), applied);

        debug!(circle = %self.name, peer = %id, "admission requested");
        Ok(())
    }

    /// Admits one applicant and commits the new generation.
    ///
    /// The applicant's attestation is checked against the user key
    /// before anything changes. Admitting a cloud identity displaces
    /// any cloud identity already enrolled.
    ///
    /// # Errors
    ///
    /// Returns [`CircleError::NotApplicant`] if the id is not in the
    /// applicant set, [`CircleError::BadSignature`] if the attestation
    /// does not verify, or any generation-signing error. The circle is
    /// unchanged on failure.
    pub fn accept_request(
        &mut self,
        user_key: &KeyPair,
        approver: &FullPeerInfo,
        applicant: &PeerId,
    ) -> Result<()> {
        let applied = self
            .applicants
            .get(applicant)
            .ok_or_else(|| CircleError::NotApplicant(applicant.clone()))?;
        if !applied.verify_application(&user_key.public()) {
            return Err(CircleError::BadSignature(format!(
                "application for {applicant} does not verify under the user key"
            )));
        }

        let mut working = self.clone();
        if let Some(record) = working.applicants.remove(applicant) {
            working.admit_peer(record);
        }
        working.generation_sign(user_key, approver)?;

        *self = working;
        info!(circle = %self.name, peer = %applicant, generation = self.generation, "applicant admitted");
        Ok(())
    }

    /// Turns an applicant away, recording the rejection.
    ///
    /// A rejection filed by the applicant itself is a withdrawal: the
    /// request simply disappears instead of being recorded. Rejections
    /// are advisory and ride along unsigned until the next
    /// generation-signing clears them.
    ///
    /// # Errors
    ///
    /// Returns [`CircleError::NotApplicant`] if the id is not in the
    /// applicant set.
    pub fn reject_request(&mut self, rejector: &PeerId, applicant: &PeerId) -> Result<()> {
        if rejector == applicant {
            self.withdraw_request(applicant);
            return Ok(());
        }

        let record = self
            .applicants
            .remove(applicant)
            .ok_or_else(|| CircleError::NotApplicant(applicant.clone()))?;
        self.rejected_applicants.insert(applicant.clone(), record);

        debug!(circle = %self.name, peer = %applicant, "applicant rejected");
        Ok(())
    }

    /// Withdraws a pending admission request.
    ///
    /// Returns whether a request was actually removed; withdrawing an
    /// absent request is not an error.
    pub fn withdraw_request(&mut self, applicant: &PeerId) -> bool {
        let removed = self.applicants.remove(applicant).is_some();
        if removed {
            debug!(circle = %self.name, peer = %applicant, "admission request withdrawn");
        }
        removed
    }

    /// Admits the chosen applicants in one committed generation.
    ///
    /// All-or-nothing: every chosen id must be a verifying applicant,
    /// otherwise nothing changes. Returns whether anything was
    /// admitted (an empty choice is a successful no-op).
    ///
    /// # Errors
    ///
    /// Returns [`CircleError::NotApplicant`] for a chosen id that is
    /// not applying, [`CircleError::BadSignature`] for one whose
    /// attestation fails, or any generation-signing error.
    pub fn accept_applicants(
        &mut self,
        user_key: &KeyPair,
        approver: &FullPeerInfo,
        chosen: &[PeerId],
    ) -> Result<bool> {
        let mut working = self.clone();
        let mut admitted = 0usize;

        for id in chosen {
            let record = working
                .applicants
                .remove(id)
                .ok_or_else(|| CircleError::NotApplicant(id.clone()))?;
            if !record.verify_application(&user_key.public()) {
                return Err(CircleError::BadSignature(format!(
                    "application for {id} does not verify under the user key"
                )));
            }
            working.admit_peer(record);
            admitted += 1;
        }

        if admitted == 0 {
            return Ok(false);
        }

        working.generation_sign(user_key, approver)?;
        *self = working;
        info!(circle = %self.name, admitted, generation = self.generation, "applicants admitted");
        Ok(true)
    }

    /// Admits every applicant whose attestation verifies.
    ///
    /// Non-verifying applicants are left pending here and moved to the
    /// rejected set by the generation-signing that commits the batch.
    /// Returns whether anything was admitted; if nothing verifies the
    /// circle is left untouched.
    ///
    /// # Errors
    ///
    /// Returns a generation-signing error if committing fails.
    pub fn accept_all_pending(
        &mut self,
        user_key: &KeyPair,
        approver: &FullPeerInfo,
    ) -> Result<bool> {
        let user_public = user_key.public();
        let verifying: Vec<PeerId> = self
            .applicants
            .iter()
            .filter(|(_, record)| record.verify_application(&user_public))
            .map(|(id, _)| id.clone())
            .collect();

        self.accept_applicants(user_key, approver, &verifying)
    }

    /// Removes a member and commits the new generation.
    ///
    /// A target that is still only applying is rejected instead,
    /// with `requestor` as the rejector.
    ///
    /// # Errors
    ///
    /// Returns [`CircleError::NotPeer`] if the target is neither a
    /// member nor an applicant, or any generation-signing error. The
    /// circle is unchanged on failure.
    pub fn remove_peer(
        &mut self,
        user_key: &KeyPair,
        requestor: &FullPeerInfo,
        target: &PeerId,
    ) -> Result<()> {
        if self.is_applicant(target) {
            return self.reject_request(requestor.id(), target);
        }
        if !self.is_peer(target) {
            return Err(CircleError::NotPeer(target.clone()));
        }

        let mut working = self.clone();
        working.peers.remove(target);
        working.generation_sign(user_key, requestor)?;

        *self = working;
        info!(circle = %self.name, peer = %target, generation = self.generation, "peer removed");
        Ok(())
    }

    /// Clears the circle back to its pristine state.
    ///
    /// Members, applicants, rejected applicants, and signatures are
    /// all dropped and the generation returns to zero, so the next
    /// committed mutation starts a fresh lineage at generation one.
    pub fn reset_to_empty(&mut self) {
        self.peers.clear();
        self.applicants.clear();
        self.rejected_applicants.clear();
        self.signatures.clear();
        self.generation = 0;
        info!(circle = %self.name, "circle reset to empty");
    }

    /// Resets the circle and re-founds it around a single device.
    ///
    /// Equivalent to [`Self::reset_to_empty`] followed by the identity
    /// applying for and being granted admission, yielding a
    /// generation-one circle containing only `identity`, signed by the
    /// user key and the identity's device key.
    ///
    /// # Errors
    ///
    /// Returns any admission or signing error; the circle is unchanged
    /// on failure.
    pub fn reset_to_offering(&mut self, user_key: &KeyPair, identity: &FullPeerInfo) -> Result<()> {
        let mut working = self.clone();
        working.reset_to_empty();
        working.request_admission(user_key, identity)?;
        working.accept_request(user_key, identity, identity.id())?;

        *self = working;
        info!(circle = %self.name, peer = %identity.id(), "circle reset to offering");
        Ok(())
    }
}
