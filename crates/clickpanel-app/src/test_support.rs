#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use clickpanel_core::{
    AccessToken, HierarchyNode, ListId, NodeKey, NodeKind, StatusOption, Task, TaskId, TaskSummary,
    WorkspaceId,
};
use tokio::sync::Notify;

use crate::backend::ResourceBackend;
use crate::error::FetchError;
use crate::session::SessionSlot;

pub fn key(kind: NodeKind, id: &str) -> NodeKey {
    NodeKey::new(kind, id).expect("valid key")
}

pub fn signed_in_slot() -> SessionSlot {
    let slot = SessionSlot::default();
    slot.publish(Some(AccessToken::new("tok1").expect("valid token")));
    slot
}

fn list(id: &str, parent: &NodeKey) -> HierarchyNode {
    HierarchyNode::new(
        key(NodeKind::List, id),
        Some(parent.clone()),
        format!("List {id}"),
        None,
    )
}

/// Resource backend serving a fixed hierarchy and counting calls.
#[derive(Default)]
pub struct MockResources {
    spaces: Vec<HierarchyNode>,
    folders: HashMap<String, Vec<HierarchyNode>>,
    folder_lists: HashMap<String, Vec<HierarchyNode>>,
    loose_lists: HashMap<String, Vec<HierarchyNode>>,
    statuses: Mutex<Option<Vec<StatusOption>>>,
    gate: Notify,
    gated: AtomicBool,
    pub space_calls: AtomicUsize,
    pub folder_calls: AtomicUsize,
    pub folder_list_calls: AtomicUsize,
    pub loose_list_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
}

impl MockResources {
    /// Space `s1` with folders `f1` [l1, l2] and `f2` [l3], plus folder-less
    /// lists [l4, l2].
    pub fn sample() -> Self {
        let space = key(NodeKind::Space, "s1");
        let f1 = key(NodeKind::Folder, "f1");
        let f2 = key(NodeKind::Folder, "f2");
        let folder = |k: &NodeKey| {
            HierarchyNode::new(k.clone(), Some(space.clone()), k.id().to_uppercase(), None)
        };
        Self {
            spaces: vec![HierarchyNode::new(space.clone(), None, "Space".into(), None)],
            folders: HashMap::from([("s1".to_owned(), vec![folder(&f1), folder(&f2)])]),
            folder_lists: HashMap::from([
                ("f1".to_owned(), vec![list("l1", &f1), list("l2", &f1)]),
                ("f2".to_owned(), vec![list("l3", &f2)]),
            ]),
            loose_lists: HashMap::from([(
                "s1".to_owned(),
                vec![list("l4", &space), list("l2", &space)],
            )]),
            ..Self::default()
        }
    }

    /// Hold every call until [`Self::release`].
    pub fn gated(self) -> Self {
        self.gated.store(true, Ordering::SeqCst);
        self
    }

    pub fn release(&self) {
        self.gated.store(false, Ordering::SeqCst);
        self.gate.notify_waiters();
    }

    pub fn set_statuses(&self, statuses: Option<Vec<StatusOption>>) {
        *self.statuses.lock().unwrap_or_else(PoisonError::into_inner) = statuses;
    }

    pub fn total_calls(&self) -> usize {
        [
            &self.space_calls,
            &self.folder_calls,
            &self.folder_list_calls,
            &self.loose_list_calls,
            &self.status_calls,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }

    async fn pass_gate(&self) {
        let opened = self.gate.notified();
        if self.gated.load(Ordering::SeqCst) {
            opened.await;
        }
    }
}

impl ResourceBackend for MockResources {
    async fn spaces(
        &self,
        _token: &AccessToken,
        _workspace: &WorkspaceId,
    ) -> Result<Vec<HierarchyNode>, FetchError> {
        self.space_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        Ok(self.spaces.clone())
    }

    async fn folders(
        &self,
        _token: &AccessToken,
        space: &NodeKey,
    ) -> Result<Vec<HierarchyNode>, FetchError> {
        self.folder_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        Ok(self.folders.get(space.id()).cloned().unwrap_or_default())
    }

    async fn folder_lists(
        &self,
        _token: &AccessToken,
        folder: &NodeKey,
    ) -> Result<Vec<HierarchyNode>, FetchError> {
        self.folder_list_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        Ok(self.folder_lists.get(folder.id()).cloned().unwrap_or_default())
    }

    async fn folderless_lists(
        &self,
        _token: &AccessToken,
        space: &NodeKey,
    ) -> Result<Vec<HierarchyNode>, FetchError> {
        self.loose_list_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        Ok(self.loose_lists.get(space.id()).cloned().unwrap_or_default())
    }

    async fn tasks(
        &self,
        _token: &AccessToken,
        _list: &ListId,
    ) -> Result<Vec<TaskSummary>, FetchError> {
        Ok(Vec::new())
    }

    async fn task(&self, _token: &AccessToken, task: &TaskId) -> Result<Task, FetchError> {
        Err(FetchError::Malformed(format!("no fixture for {task}")))
    }

    async fn list_statuses(
        &self,
        _token: &AccessToken,
        list: &ListId,
    ) -> Result<Vec<StatusOption>, FetchError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| FetchError::Network(format!("statuses for {list} unavailable")))
    }
}
