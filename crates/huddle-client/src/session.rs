//! Viewer session.
//!
//! The session object owns the signed-in viewer's profile for the lifetime
//! of a sign-in. It is constructed once at sign-in, passed by reference to
//! the components that need the viewer identity, and dropped at sign-out.

use huddle_core::{UserId, UserProfile};

/// The signed-in viewer.
#[derive(Debug, Clone)]
pub struct Session {
    viewer: UserProfile,
}

impl Session {
    /// Start a session for the authenticated viewer.
    pub fn new(viewer: UserProfile) -> Self {
        Self { viewer }
    }

    /// Compatibility shim for callers that still hand over the viewer as a
    /// collection.
    ///
    /// Only the first element is the viewer; anything after it is ignored.
    /// Returns `None` for an empty collection. New code should construct
    /// [`Session::new`] directly.
    pub fn from_profiles(profiles: impl IntoIterator<Item = UserProfile>) -> Option<Self> {
        let mut iter = profiles.into_iter();
        let viewer = iter.next()?;
        if iter.next().is_some() {
            tracing::warn!("viewer supplied as a collection; using the first element only");
        }
        Some(Self::new(viewer))
    }

    /// The viewer's profile.
    pub fn viewer(&self) -> &UserProfile {
        &self.viewer
    }

    /// The viewer's identifier.
    pub fn viewer_id(&self) -> &UserId {
        &self.viewer.id
    }
}
