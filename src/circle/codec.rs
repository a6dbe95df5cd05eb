//! Binary encoding of circles for transport and storage.
//!
//! A circle travels between devices as one tagged sequence holding, in
//! fixed order: format version, name, generation, the three membership
//! sets, and the signature map. The version field is checked before
//! anything else is interpreted, so devices speaking different
//! protocol revisions fail cleanly with a version error instead of
//! tripping over an unparseable body. Encoding is deterministic:
//! membership sets and signatures are stored in ordered maps, so the
//! same circle value always yields the same bytes.

use std::collections::BTreeMap;

use base64::Engine;

use crate::keys::{KeyId, SignatureBytes};
use crate::peer::{PeerId, PeerInfo};
use crate::wire::{Encoder, Reader};

use super::error::{CircleError, Result};
use super::types::Circle;

/// The one format version this revision can parse.
pub const COMPATIBLE_VERSION: u64 = 1;

/// Version value that no revision will ever accept.
///
/// Written by [`encode_incompatible_marker`] so that newer peers can
/// hand older ones a blob that decodes to a clean version error.
pub const INCOMPATIBLE_VERSION_SENTINEL: u64 = u64::MAX;

impl Circle {
    /// Serializes the circle to its canonical byte form.
    ///
    /// # Errors
    ///
    /// Returns [`CircleError::BadFormat`] if the encoding exceeds wire
    /// limits.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut enc = Encoder::new();
        enc.sequence(|enc| {
            enc.uint(COMPATIBLE_VERSION);
            enc.string(&self.name);
            enc.uint(self.generation);
            encode_peer_set(enc, &self.peers);
            encode_peer_set(enc, &self.applicants);
            encode_peer_set(enc, &self.rejected_applicants);
            enc.sequence(|enc| {
                for (key_id, signature) in self.signatures.iter() {
                    enc.sequence(|enc| {
                        enc.string(key_id.as_str());
                        enc.octets(signature.as_bytes());
                    });
                }
            });
        });
        Ok(enc.finish()?)
    }

    /// Rebuilds a circle from its canonical byte form.
    ///
    /// # Errors
    ///
    /// Returns [`CircleError::IncompatibleVersion`] if the version
    /// field holds anything but [`COMPATIBLE_VERSION`]; no further
    /// bytes are interpreted in that case. Returns
    /// [`CircleError::BadFormat`] for truncated or trailing bytes,
    /// duplicate or overlapping membership entries, more than one
    /// cloud identity, or malformed signature entries.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut outer = Reader::new(bytes);
        let mut seq = outer.sequence()?;

        let version = seq.uint()?;
        if version != COMPATIBLE_VERSION {
            return Err(CircleError::IncompatibleVersion(version));
        }

        let name = seq.string()?;
        let generation = seq.uint()?;
        let peers = decode_peer_set(&mut seq)?;
        let applicants = decode_peer_set(&mut seq)?;
        let rejected_applicants = decode_peer_set(&mut seq)?;
        let signatures = decode_signatures(&mut seq)?;
        seq.finish()?;
        outer.finish()?;

        ensure_disjoint(&peers, &applicants, &rejected_applicants)?;
        if peers.values().filter(|p| p.is_cloud_identity()).count() > 1 {
            return Err(CircleError::BadFormat(
                "more than one cloud identity".to_string(),
            ));
        }

        let mut circle = Self::new(name);
        circle.generation = generation;
        circle.peers = peers;
        circle.applicants = applicants;
        circle.rejected_applicants = rejected_applicants;
        for (key_id, signature) in signatures {
            circle.signatures.insert(key_id, signature);
        }
        Ok(circle)
    }

    /// Serializes the circle as standard base64 text, for transport
    /// channels that only carry strings.
    ///
    /// # Errors
    ///
    /// Same as [`Self::encode`].
    pub fn encode_base64(&self) -> Result<String> {
        Ok(base64::engine::general_purpose::STANDARD.encode(self.encode()?))
    }

    /// Rebuilds a circle from base64 text produced by
    /// [`Self::encode_base64`].
    ///
    /// # Errors
    ///
    /// Returns [`CircleError::BadFormat`] for invalid base64, plus the
    /// errors of [`Self::decode`].
    pub fn decode_base64(encoded: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|err| CircleError::BadFormat(format!("invalid base64: {err}")))?;
        Self::decode(&bytes)
    }
}

/// Emits a blob that every revision of the decoder rejects as a
/// version mismatch.
///
/// A device speaking a newer protocol publishes this so older peers
/// report [`CircleError::IncompatibleVersion`] instead of stumbling
/// into a parse error partway through an unknown layout.
///
/// # Errors
///
/// Infallible in practice; kept fallible to match the encoder surface.
pub fn encode_incompatible_marker() -> Result<Vec<u8>> {
    let mut enc = Encoder::new();
    enc.sequence(|enc| {
        enc.uint(INCOMPATIBLE_VERSION_SENTINEL);
    });
    Ok(enc.finish()?)
}

fn encode_peer_set(enc: &mut Encoder, set: &BTreeMap<PeerId, PeerInfo>) {
    enc.sequence(|enc| {
        for peer in set.values() {
            peer.encode_to(enc);
        }
    });
}

fn decode_peer_set(reader: &mut Reader<'_>) -> Result<BTreeMap<PeerId, PeerInfo>> {
    let mut seq = reader.sequence()?;
    let mut set = BTreeMap::new();
    while !seq.is_at_end() {
        let peer = PeerInfo::decode_from(&mut seq)?;
        let id = peer.id().clone();
        if set.insert(id.clone(), peer).is_some() {
            return Err(CircleError::BadFormat(format!("duplicate peer id: {id}")));
        }
    }
    Ok(set)
}

fn decode_signatures(reader: &mut Reader<'_>) -> Result<Vec<(KeyId, SignatureBytes)>> {
    let mut seq = reader.sequence()?;
    let mut entries = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    while !seq.is_at_end() {
        let mut entry = seq.sequence()?;
        let key_id = entry.string()?;
        let signature = SignatureBytes::from_slice(entry.octets()?)
            .map_err(|err| CircleError::BadFormat(err.to_string()))?;
        entry.finish()?;

        if seen.contains(&key_id) {
            return Err(CircleError::BadFormat(format!(
                "duplicate signature entry: {key_id}"
            )));
        }
        seen.push(key_id.clone());
        entries.push((KeyId::from_string(key_id), signature));
    }
    Ok(entries)
}

fn ensure_disjoint(
    peers: &BTreeMap<PeerId, PeerInfo>,
    applicants: &BTreeMap<PeerId, PeerInfo>,
    rejected: &BTreeMap<PeerId, PeerInfo>,
) -> Result<()> {
    for id in applicants.keys() {
        if peers.contains_key(id) {
            return Err(CircleError::BadFormat(format!(
                "peer id in both peers and applicants: {id}"
            )));
        }
    }
    for id in rejected.keys() {
        if peers.contains_key(id) || applicants.contains_key(id) {
            return Err(CircleError::BadFormat(format!(
                "peer id in rejected and another set: {id}"
            )));
        }
    }
    Ok(())
}
