//! Live session record and the read handle caches observe it through.

use std::sync::{Arc, PoisonError, RwLock};

use clickpanel_core::{AccessToken, WorkspaceId};
use time::OffsetDateTime;

/// An established sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    token: AccessToken,
    workspace_id: WorkspaceId,
    established_at: OffsetDateTime,
}

impl AuthSession {
    pub(crate) const fn new(
        token: AccessToken,
        workspace_id: WorkspaceId,
        established_at: OffsetDateTime,
    ) -> Self {
        Self {
            token,
            workspace_id,
            established_at,
        }
    }

    /// Access token used to sign requests.
    #[must_use]
    pub const fn token(&self) -> &AccessToken {
        &self.token
    }

    /// Workspace resolved at sign-in.
    #[must_use]
    pub const fn workspace_id(&self) -> &WorkspaceId {
        &self.workspace_id
    }

    /// When the session was established.
    #[must_use]
    pub const fn established_at(&self) -> OffsetDateTime {
        self.established_at
    }
}

#[derive(Debug, Default)]
struct SlotState {
    epoch: u64,
    token: Option<AccessToken>,
}

/// Shared read handle on the live token.
///
/// The epoch advances every time a session is established or cleared; caches
/// compare it against the epoch they last saw to know when to drop entries.
#[derive(Debug, Clone, Default)]
pub struct SessionSlot {
    inner: Arc<RwLock<SlotState>>,
}

impl SessionSlot {
    /// Current epoch and token.
    #[must_use]
    pub fn snapshot(&self) -> (u64, Option<AccessToken>) {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        (state.epoch, state.token.clone())
    }

    /// Current epoch.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .epoch
    }

    /// Returns true while a token is published.
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.snapshot().1.is_some()
    }

    pub(crate) fn publish(&self, token: Option<AccessToken>) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.epoch = state.epoch.wrapping_add(1);
        state.token = token;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]
    use super::*;

    #[test]
    fn publishing_advances_epoch_for_every_clone() {
        let slot = SessionSlot::default();
        let reader = slot.clone();
        assert_eq!(reader.snapshot(), (0, None));

        slot.publish(Some(AccessToken::new("tok1").expect("valid token")));
        assert_eq!(reader.epoch(), 1);
        assert!(reader.is_signed_in());

        slot.publish(None);
        assert_eq!(reader.snapshot(), (2, None));
    }
}
