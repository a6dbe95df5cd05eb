//! Peer identity records for circle membership.
//!
//! A [`PeerInfo`] describes one device to the rest of the circle: a
//! stable id derived from the device's public key, the key itself, a
//! human-readable label, and the flags that mark the two pseudo-peer
//! variants (cloud identities and retirement tickets). When a device
//! applies for membership, its record carries an *application*: a
//! signature made with the shared user key that binds the device key
//! to the user credential.
//!
//! [`FullPeerInfo`] is the local device's own view: the same record
//! plus the private signing key, which admission and generation-signing
//! operations consume.
//!
//! `PeerInfo` ships with its own binary codec so circle blobs can embed
//! peer records without the circle codec knowing their layout.

mod full;
mod info;

pub use full::FullPeerInfo;
pub use info::{PeerId, PeerInfo};
