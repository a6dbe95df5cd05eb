//! Circle-of-trust membership.
//!
//! This module provides the core functionality for managing a "circle"
//! of trusted devices: a versioned membership object that reaches the
//! same state on every device through quorum signatures instead of a
//! central authority.
//!
//! # Architecture
//!
//! ```text
//! Circle (data entity + invariants)
//!     ├── admission   (request / accept / reject / withdraw / remove)
//!     ├── signing     (generation-signing, retirement, record updates)
//!     ├── concordance (trust evaluation between two candidate circles)
//!     ├── hash        (canonical digest used as the signing input)
//!     ├── signatures  (per-key signature store)
//!     └── codec       (deterministic wire encoding, version checks)
//! ```
//!
//! # Trust Flow
//!
//! A device mutates its circle through the admission operations, each
//! of which commits by generation-signing: the generation counter is
//! bumped and the signature store rebuilt with the user key and the
//! committing device's key. When a candidate circle arrives from
//! another device, [`Circle::concordance_trust`] decides whether it
//! earns adoption; the codec moves circles between devices as opaque,
//! version-checked byte blobs.
//!
//! # Types
//!
//! - [`Circle`]: the versioned group-membership object
//! - [`ConcordanceStatus`]: verdict on a candidate circle
//! - [`SignatureStore`]: per-key signatures over the circle digest
//! - [`CircleSummary`]: serializable diagnostic snapshot

mod admission;
mod codec;
mod concordance;
mod error;
mod hash;
mod signatures;
mod signing;
mod types;

pub use codec::{encode_incompatible_marker, COMPATIBLE_VERSION, INCOMPATIBLE_VERSION_SENTINEL};
pub use concordance::ConcordanceStatus;
pub use error::{CircleError, Result};
pub use hash::CircleDigest;
pub use signatures::SignatureStore;
pub use types::{Circle, CircleSummary, PeerSummary};
