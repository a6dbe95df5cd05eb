//! Accord Core Library
//!
//! Core functionality for Accord - multi-device circle-of-trust
//! membership. This crate provides the circle data model, the
//! admission state machine, generation-signing, concordance trust
//! evaluation, and the canonical wire codec that moves circles
//! between devices.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![deny(unsafe_code)]

pub mod circle;
pub mod keys;
pub mod peer;
pub mod wire;

pub use circle::{
    encode_incompatible_marker, Circle, CircleDigest, CircleError, CircleSummary,
    ConcordanceStatus, PeerSummary, SignatureStore, COMPATIBLE_VERSION,
    INCOMPATIBLE_VERSION_SENTINEL,
};
pub use keys::{KeyError, KeyId, KeyPair, PublicKey, SignatureBytes};
pub use peer::{FullPeerInfo, PeerId, PeerInfo};
