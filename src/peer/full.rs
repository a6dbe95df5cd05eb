//! The local device's own identity: peer record plus signing key.

use crate::keys::{KeyError, KeyPair, PublicKey};

use super::info::{PeerId, PeerInfo};

/// A peer record paired with the device's private signing key.
///
/// This is what the local device holds for itself; everything it
/// publishes about itself derives from here. The public half of
/// `device_key` and the key inside `peer` are the same by
/// construction and stay that way; the record is only ever rebuilt
/// from the keypair.
///
/// # Example
///
/// ```
/// use accord_core::keys::KeyPair;
/// use accord_core::peer::FullPeerInfo;
///
/// let me = FullPeerInfo::new(KeyPair::generate(), "kitchen laptop");
/// assert_eq!(me.peer().label(), "kitchen laptop");
/// ```
pub struct FullPeerInfo {
    peer: PeerInfo,
    device_key: KeyPair,
}

impl FullPeerInfo {
    /// Creates a device identity from a signing key and label.
    #[must_use]
    pub fn new(device_key: KeyPair, label: impl Into<String>) -> Self {
        Self {
            peer: PeerInfo::new(device_key.public(), label),
            device_key,
        }
    }

    /// Returns the shareable peer record.
    #[must_use]
    pub const fn peer(&self) -> &PeerInfo {
        &self.peer
    }

    /// Returns the device's signing key.
    #[must_use]
    pub const fn device_key(&self) -> &KeyPair {
        &self.device_key
    }

    /// Returns the device's public key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.device_key.public()
    }

    /// Returns the stable peer identifier.
    #[must_use]
    pub const fn id(&self) -> &PeerId {
        self.peer.id()
    }

    /// Replaces the device label on the local record.
    ///
    /// Other devices learn the new label via the peer-update operation,
    /// which republishes this record into the circle.
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.peer.set_label(label);
    }

    /// Produces an application-signed copy of the peer record.
    ///
    /// # Errors
    ///
    /// Returns a [`KeyError`] if the user key cannot sign.
    pub fn application(&self, user_key: &KeyPair) -> Result<PeerInfo, KeyError> {
        self.peer.with_application(user_key)
    }
}

impl std::fmt::Debug for FullPeerInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The keypair's own Debug already redacts the secret half
        f.debug_struct("FullPeerInfo")
            .field("id", self.peer.id())
            .field("label", &self.peer.label())
            .finish()
    }
}
