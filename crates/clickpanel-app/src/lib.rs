//! Application layer for clickpanel.
//!
//! Holds the sign-in state machine, the memoized resource hierarchy, the
//! status catalog and the task detail loader, plus the [`Panel`] that wires
//! them together for the CLI.

pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod memo;
pub mod panel;
pub mod session;
pub mod session_store;
pub mod status_catalog;
pub mod task_loader;
pub mod tree_cache;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use auth::{AuthSessionManager, AuthState, RedirectOutcome};
pub use backend::{OAuthBackend, ResourceBackend};
pub use config::{PanelConfig, default_config_path};
pub use error::{AuthError, FetchError, StoreError};
pub use memo::{CacheEntry, FetchResult, MemoTable, PendingFetch};
pub use panel::{Panel, Selection};
pub use session::{AuthSession, SessionSlot};
pub use session_store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use status_catalog::StatusCatalog;
pub use task_loader::TaskDetailLoader;
pub use tree_cache::{NodeEntry, ResourceTreeCache};
