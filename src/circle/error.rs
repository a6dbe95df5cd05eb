//! Error types for circle membership operations.
//!
//! This module defines errors that can occur during circle operations,
//! including decoding errors, membership state conflicts, and signature
//! failures.

use thiserror::Error;

use crate::keys::{KeyError, KeyId};
use crate::peer::PeerId;
use crate::wire::WireError;

/// Error type for circle operations.
#[derive(Error, Debug)]
pub enum CircleError {
    /// Serialized circle bytes are malformed.
    #[error("Malformed circle encoding: {0}")]
    BadFormat(String),

    /// Serialized circle was produced by an unsupported format version.
    #[error("Incompatible circle version: {0}")]
    IncompatibleVersion(u64),

    /// The peer is already a full member of the circle.
    #[error("Peer is already in the circle: {0}")]
    AlreadyPeer(PeerId),

    /// The operation expected the peer among the applicants.
    #[error("Peer is not an applicant: {0}")]
    NotApplicant(PeerId),

    /// The operation expected the peer among the members.
    #[error("Peer is not in the circle: {0}")]
    NotPeer(PeerId),

    /// A public key was malformed or rejected by the backend.
    #[error("Invalid key: {0}")]
    BadKey(String),

    /// Signing failed or a signature was structurally invalid.
    #[error("Signature failure: {0}")]
    BadSignature(String),

    /// No signature is recorded for the given key.
    #[error("No signature recorded for key: {0}")]
    NoSignature(KeyId),

    /// A proposed circle would move the generation counter backwards.
    #[error("Stale generation: known {known}, proposed {proposed}")]
    Replay {
        /// Generation of the circle already held.
        known: u64,
        /// Generation of the circle being offered.
        proposed: u64,
    },

    /// The operation needed a public key the caller did not supply.
    #[error("Required public key not available")]
    PublicKeyAbsent,
}

/// Result type alias for circle operations.
pub type Result<T> = std::result::Result<T, CircleError>;

impl From<WireError> for CircleError {
    fn from(err: WireError) -> Self {
        Self::BadFormat(err.to_string())
    }
}

impl From<KeyError> for CircleError {
    fn from(err: KeyError) -> Self {
        match err {
            KeyError::Signing(msg) => Self::BadSignature(msg),
            other => Self::BadKey(other.to_string()),
        }
    }
}
