//! Single selected task detail, with late responses discarded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use clickpanel_core::{ListId, Task, TaskId, TaskSummary};
use tracing::debug;

use crate::backend::ResourceBackend;
use crate::error::FetchError;
use crate::session::AuthSession;

#[derive(Default)]
struct Selection {
    ticket: u64,
    selected: Option<TaskId>,
    current: Option<Arc<Task>>,
}

/// Loads the detail of the selected task.
///
/// Only the most recent [`TaskDetailLoader::load_task`] call may update the
/// current task.
pub struct TaskDetailLoader<B> {
    backend: Arc<B>,
    selection: Mutex<Selection>,
}

impl<B: ResourceBackend> TaskDetailLoader<B> {
    /// Create a loader with nothing selected.
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            selection: Mutex::new(Selection::default()),
        }
    }

    fn guard(&self) -> MutexGuard<'_, Selection> {
        self.selection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Select `task` and fetch its detail.
    ///
    /// # Errors
    /// Returns [`FetchError::Stale`] when another load started meanwhile, or
    /// the fetch error of this load.
    pub async fn load_task(
        &self,
        task: &TaskId,
        session: &AuthSession,
    ) -> Result<Arc<Task>, FetchError> {
        let ticket = {
            let mut selection = self.guard();
            selection.ticket = selection.ticket.wrapping_add(1);
            selection.selected = Some(task.clone());
            selection.ticket
        };

        let outcome = self.backend.task(session.token(), task).await;

        let mut selection = self.guard();
        if selection.ticket != ticket {
            debug!(%task, "discarding superseded task response");
            return Err(FetchError::Stale { task: task.clone() });
        }
        match outcome {
            Ok(detail) => {
                let detail = Arc::new(detail);
                selection.current = Some(Arc::clone(&detail));
                drop(selection);
                Ok(detail)
            }
            Err(err) => {
                if selection
                    .current
                    .as_ref()
                    .is_some_and(|current| current.id != *task)
                {
                    selection.current = None;
                }
                drop(selection);
                Err(err)
            }
        }
    }

    /// Most recently loaded task.
    #[must_use]
    pub fn current(&self) -> Option<Arc<Task>> {
        self.guard().current.clone()
    }

    /// Task most recently requested.
    #[must_use]
    pub fn selected(&self) -> Option<TaskId> {
        self.guard().selected.clone()
    }

    /// Deselect. Loads still in flight become stale.
    pub fn clear(&self) {
        let mut selection = self.guard();
        selection.ticket = selection.ticket.wrapping_add(1);
        selection.selected = None;
        selection.current = None;
    }

    /// Task listing of `list`. Not cached.
    ///
    /// # Errors
    /// Returns the fetch error of the backend call.
    pub async fn list_tasks(
        &self,
        list: &ListId,
        session: &AuthSession,
    ) -> Result<Vec<TaskSummary>, FetchError> {
        self.backend.tasks(session.token(), list).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]
    use super::*;
    use clickpanel_core::wire::RawTask;
    use clickpanel_core::{AccessToken, HierarchyNode, NodeKey, StatusOption, WorkspaceId};
    use std::collections::HashMap;
    use time::OffsetDateTime;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct GatedTasks {
        gates: Mutex<HashMap<String, Arc<Notify>>>,
        failing: Mutex<Vec<String>>,
    }

    impl GatedTasks {
        fn gate(&self, id: &str) -> Arc<Notify> {
            Arc::clone(
                self.gates
                    .lock()
                    .unwrap()
                    .entry(id.to_owned())
                    .or_default(),
            )
        }

        fn fail(&self, id: &str) {
            self.failing.lock().unwrap().push(id.to_owned());
        }
    }

    fn task(id: &str) -> Task {
        let raw: RawTask =
            serde_json::from_value(serde_json::json!({ "id": id, "name": format!("Task {id}") }))
                .unwrap();
        Task::from_wire(raw).unwrap()
    }

    impl ResourceBackend for GatedTasks {
        async fn spaces(
            &self,
            _: &AccessToken,
            _: &WorkspaceId,
        ) -> Result<Vec<HierarchyNode>, FetchError> {
            Ok(Vec::new())
        }

        async fn folders(
            &self,
            _: &AccessToken,
            _: &NodeKey,
        ) -> Result<Vec<HierarchyNode>, FetchError> {
            Ok(Vec::new())
        }

        async fn folder_lists(
            &self,
            _: &AccessToken,
            _: &NodeKey,
        ) -> Result<Vec<HierarchyNode>, FetchError> {
            Ok(Vec::new())
        }

        async fn folderless_lists(
            &self,
            _: &AccessToken,
            _: &NodeKey,
        ) -> Result<Vec<HierarchyNode>, FetchError> {
            Ok(Vec::new())
        }

        async fn tasks(&self, _: &AccessToken, _: &ListId) -> Result<Vec<TaskSummary>, FetchError> {
            Ok(Vec::new())
        }

        async fn task(&self, _: &AccessToken, id: &TaskId) -> Result<Task, FetchError> {
            self.gate(id.as_str()).notified().await;
            if self.failing.lock().unwrap().iter().any(|f| f == id.as_str()) {
                return Err(FetchError::Network("boom".into()));
            }
            Ok(task(id.as_str()))
        }

        async fn list_statuses(
            &self,
            _: &AccessToken,
            _: &ListId,
        ) -> Result<Vec<StatusOption>, FetchError> {
            Ok(Vec::new())
        }
    }

    fn session() -> AuthSession {
        AuthSession::new(
            AccessToken::new("tok1").unwrap(),
            WorkspaceId::new("w1").unwrap(),
            OffsetDateTime::UNIX_EPOCH,
        )
    }

    fn id(raw: &str) -> TaskId {
        TaskId::new(raw).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn late_response_for_previous_task_is_discarded() {
        let backend = Arc::new(GatedTasks::default());
        let loader = Arc::new(TaskDetailLoader::new(Arc::clone(&backend)));
        let session = session();

        let first = {
            let loader = Arc::clone(&loader);
            let session = session.clone();
            tokio::spawn(async move { loader.load_task(&id("A"), &session).await })
        };
        while loader.selected() != Some(id("A")) {
            tokio::task::yield_now().await;
        }

        backend.gate("B").notify_one();
        let second = loader.load_task(&id("B"), &session).await.unwrap();
        assert_eq!(second.id, id("B"));

        backend.gate("A").notify_one();
        let first = first.await.unwrap();
        assert_eq!(first, Err(FetchError::Stale { task: id("A") }));
        assert_eq!(loader.current().map(|t| t.id.clone()), Some(id("B")));
        assert_eq!(loader.selected(), Some(id("B")));
    }

    #[tokio::test]
    async fn failure_for_other_task_clears_current() {
        let backend = Arc::new(GatedTasks::default());
        let loader = TaskDetailLoader::new(Arc::clone(&backend));
        let session = session();

        backend.gate("A").notify_one();
        loader.load_task(&id("A"), &session).await.unwrap();

        backend.fail("A");
        backend.gate("A").notify_one();
        assert!(loader.load_task(&id("A"), &session).await.is_err());
        assert_eq!(loader.current().map(|t| t.id.clone()), Some(id("A")));

        backend.fail("C");
        backend.gate("C").notify_one();
        assert!(loader.load_task(&id("C"), &session).await.is_err());
        assert!(loader.current().is_none());
    }

    #[tokio::test]
    async fn clear_makes_inflight_load_stale() {
        let backend = Arc::new(GatedTasks::default());
        let loader = Arc::new(TaskDetailLoader::new(Arc::clone(&backend)));
        let session = session();

        let pending = {
            let loader = Arc::clone(&loader);
            tokio::spawn(async move { loader.load_task(&id("A"), &session).await })
        };
        while loader.selected().is_none() {
            tokio::task::yield_now().await;
        }
        loader.clear();
        backend.gate("A").notify_one();

        assert!(matches!(
            pending.await.unwrap(),
            Err(FetchError::Stale { .. })
        ));
        assert!(loader.current().is_none());
        assert!(loader.selected().is_none());
    }
}
