//! Domain types for clickpanel: identifiers, the browsable hierarchy, tasks,
//! custom fields and the raw payload shapes they are normalized from.

/// Typed custom field values.
pub mod custom_field;
/// Epoch-millisecond date handling.
pub mod date;
/// Identifier types.
pub mod id;
/// Hierarchy nodes and workspaces.
pub mod node;
/// Status catalog entries.
pub mod status;
/// Task detail and listing rows.
pub mod task;
/// Raw backend payloads.
pub mod wire;

use std::fmt;

pub use custom_field::{CustomField, CustomFieldKind, CustomFieldValue};
pub use id::{IdError, ListId, NodeKey, NodeKind, TaskId, WorkspaceId};
pub use node::{HierarchyNode, Team};
pub use status::StatusOption;
pub use task::{NO_STATUS, Tag, Task, TaskStatus, TaskSummary, User, group_by_status};

/// Opaque OAuth access token.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a token string.
    ///
    /// # Errors
    /// Returns [`IdError::Empty`] for a blank token.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(IdError::Empty);
        }
        Ok(Self(raw))
    }

    /// Expose the secret for request signing and persistence.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_debug_is_redacted() {
        let token = AccessToken::new("pk_secret").unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(format!("{token:?}"), "AccessToken(<redacted>)");
        assert_eq!(token.secret(), "pk_secret");
        assert!(AccessToken::new("").is_err());
    }
}
