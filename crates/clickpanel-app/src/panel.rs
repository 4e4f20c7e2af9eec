//! Panel façade wiring sign-in, hierarchy, statuses and task detail.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use clickpanel_core::{
    HierarchyNode, ListId, NodeKey, NodeKind, StatusOption, Task, TaskId, TaskSummary,
};
use tracing::warn;

use crate::auth::{AuthSessionManager, AuthState, RedirectOutcome};
use crate::backend::{OAuthBackend, ResourceBackend};
use crate::error::{AuthError, FetchError};
use crate::memo::FetchResult;
use crate::session::AuthSession;
use crate::session_store::SessionStore;
use crate::status_catalog::StatusCatalog;
use crate::task_loader::TaskDetailLoader;
use crate::tree_cache::ResourceTreeCache;

/// Current navigation position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Selected space.
    pub space: Option<NodeKey>,
    /// Selected folder.
    pub folder: Option<NodeKey>,
    /// Selected list.
    pub list: Option<ListId>,
    /// Selected task.
    pub task: Option<TaskId>,
}

/// Entry point for presentation code.
///
/// Hierarchy and status failures degrade to empty results; sign-in and task
/// failures are returned. An authorization failure from any backend call
/// signs the user out.
pub struct Panel<O, B> {
    auth: AuthSessionManager<O>,
    tree: ResourceTreeCache<B>,
    statuses: StatusCatalog<B>,
    tasks: TaskDetailLoader<B>,
    selection: Mutex<Selection>,
}

impl<O: OAuthBackend, B: ResourceBackend> Panel<O, B> {
    /// Wire the components around shared backends and stores.
    pub fn new(
        oauth: O,
        resources: Arc<B>,
        durable: Arc<dyn SessionStore>,
        scoped: Arc<dyn SessionStore>,
    ) -> Self {
        let auth = AuthSessionManager::new(oauth, durable, scoped);
        let slot = auth.slot();
        Self {
            tree: ResourceTreeCache::new(Arc::clone(&resources), slot.clone()),
            statuses: StatusCatalog::new(Arc::clone(&resources), slot),
            tasks: TaskDetailLoader::new(resources),
            auth,
            selection: Mutex::new(Selection::default()),
        }
    }

    fn guard(&self) -> MutexGuard<'_, Selection> {
        self.selection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Session manager.
    #[must_use]
    pub const fn auth(&self) -> &AuthSessionManager<O> {
        &self.auth
    }

    /// Hierarchy cache.
    #[must_use]
    pub const fn tree(&self) -> &ResourceTreeCache<B> {
        &self.tree
    }

    /// Status catalog.
    #[must_use]
    pub const fn status_catalog(&self) -> &StatusCatalog<B> {
        &self.statuses
    }

    /// Task detail loader.
    #[must_use]
    pub const fn task_loader(&self) -> &TaskDetailLoader<B> {
        &self.tasks
    }

    /// Restore a persisted session.
    pub fn restore(&self) -> Option<AuthSession> {
        self.auth.restore()
    }

    /// Current sign-in state.
    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        self.auth.state()
    }

    /// Exchange an authorization code.
    ///
    /// # Errors
    /// Returns the sign-in failure.
    pub async fn sign_in(&self, code: &str) -> Result<AuthSession, AuthError> {
        self.auth.exchange(code).await
    }

    /// Handle an OAuth redirect URL.
    ///
    /// # Errors
    /// Returns the sign-in failure.
    pub async fn accept_redirect(&self, url: &str) -> Result<Option<RedirectOutcome>, AuthError> {
        self.auth.accept_redirect(url).await
    }

    /// Sign out and forget the navigation position.
    ///
    /// # Errors
    /// Returns an error when persisted credentials cannot be removed.
    pub fn sign_out(&self) -> Result<(), AuthError> {
        self.tasks.clear();
        *self.guard() = Selection::default();
        self.auth.clear()
    }

    /// Sign out when the backend rejected the live token. Without a session
    /// the error was raised locally and nothing is reported.
    fn note_failure(&self, err: &FetchError) {
        if err.is_unauthorized() && self.auth.session().is_some() {
            self.tasks.clear();
            self.auth.report_unauthorized();
        }
    }

    fn degrade(&self, what: &str, outcome: FetchResult<HierarchyNode>) -> Arc<Vec<HierarchyNode>> {
        outcome.unwrap_or_else(|err| {
            self.note_failure(&err);
            warn!(error = %err, "{what} unavailable");
            Arc::default()
        })
    }

    fn require_session(&self) -> Result<AuthSession, FetchError> {
        self.auth.session().ok_or(FetchError::Unauthorized)
    }

    /// Spaces of the signed-in workspace.
    pub async fn spaces(&self) -> Arc<Vec<HierarchyNode>> {
        let Some(session) = self.auth.session() else {
            return Arc::default();
        };
        let outcome = self.tree.spaces(session.workspace_id()).await;
        self.degrade("spaces", outcome)
    }

    /// Folders of `space`.
    pub async fn folders(&self, space: &NodeKey) -> Arc<Vec<HierarchyNode>> {
        let outcome = self.tree.folders(space).await;
        self.degrade("folders", outcome)
    }

    /// Lists under a space or folder.
    pub async fn lists(&self, node: &NodeKey) -> Arc<Vec<HierarchyNode>> {
        let outcome = self.tree.children(node).await;
        self.degrade("lists", outcome)
    }

    /// Toggle `node` and return its lists when it ends up expanded.
    ///
    /// Returns `None` for a collapsed node, including one collapsed while its
    /// lists were loading.
    pub async fn toggle(&self, node: &NodeKey) -> Option<Arc<Vec<HierarchyNode>>> {
        if !self.tree.toggle(node) {
            return None;
        }
        let outcome = self.tree.children_if_expanded(node).await?;
        Some(self.degrade("lists", outcome))
    }

    /// Statuses of `list`, falling back to the last known set.
    pub async fn statuses(&self, list: &ListId) -> Arc<Vec<StatusOption>> {
        match self.statuses.refresh(list).await {
            Ok(options) => options,
            Err(err) => {
                self.note_failure(&err);
                self.statuses.fallback(list, &err)
            }
        }
    }

    /// Task listing of `list`.
    ///
    /// # Errors
    /// Returns the fetch error.
    pub async fn tasks(&self, list: &ListId) -> Result<Vec<TaskSummary>, FetchError> {
        let session = self.require_session()?;
        let outcome = self.tasks.list_tasks(list, &session).await;
        if let Err(err) = &outcome {
            self.note_failure(err);
        }
        outcome
    }

    /// Select and load `task`.
    ///
    /// # Errors
    /// Returns the fetch error, or [`FetchError::Stale`] if another task was
    /// opened meanwhile.
    pub async fn open_task(&self, task: &TaskId) -> Result<Arc<Task>, FetchError> {
        let session = self.require_session()?;
        self.guard().task = Some(task.clone());
        let outcome = self.tasks.load_task(task, &session).await;
        if let Err(err) = &outcome {
            self.note_failure(err);
        }
        outcome
    }

    /// Task currently shown.
    #[must_use]
    pub fn current_task(&self) -> Option<Arc<Task>> {
        self.tasks.current()
    }

    /// Navigation position.
    #[must_use]
    pub fn selection(&self) -> Selection {
        self.guard().clone()
    }

    /// Select a space, resetting everything below it.
    pub fn select_space(&self, space: NodeKey) {
        self.tasks.clear();
        *self.guard() = Selection {
            space: Some(space),
            ..Selection::default()
        };
    }

    /// Select a folder inside the current space.
    pub fn select_folder(&self, folder: NodeKey) {
        self.tasks.clear();
        let mut selection = self.guard();
        selection.folder = Some(folder);
        selection.list = None;
        selection.task = None;
    }

    /// Select a list node.
    pub fn select_list(&self, list: &HierarchyNode) {
        if list.kind() != NodeKind::List {
            return;
        }
        let Ok(id) = ListId::new(list.id()) else {
            return;
        };
        self.tasks.clear();
        let mut selection = self.guard();
        selection.list = Some(id);
        selection.task = None;
    }

    /// Step one level up the breadcrumb trail.
    pub fn back(&self) -> Selection {
        let mut selection = self.guard();
        if selection.task.take().is_some() {
            drop(selection);
            self.tasks.clear();
            return self.selection();
        }
        if selection.list.take().is_none() && selection.folder.take().is_none() {
            selection.space = None;
        }
        selection.clone()
    }
}
