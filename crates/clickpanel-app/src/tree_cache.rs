//! Lazily fetched, memoized resource hierarchy.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use clickpanel_core::{AccessToken, HierarchyNode, NodeKey, NodeKind, WorkspaceId};
use futures::future::{BoxFuture, FutureExt, try_join_all};
use tracing::{debug, info};

use crate::backend::ResourceBackend;
use crate::error::FetchError;
use crate::memo::{CacheEntry, FetchResult, MemoTable};
use crate::session::SessionSlot;

/// Entry of the hierarchy cache.
pub type NodeEntry = CacheEntry<HierarchyNode>;

/// Token together with the session epoch it was read under.
#[derive(Clone)]
struct Scope {
    epoch: u64,
    token: AccessToken,
}

struct Inner<B> {
    backend: Arc<B>,
    slot: SessionSlot,
    seen_epoch: AtomicU64,
    spaces: Arc<MemoTable<WorkspaceId, HierarchyNode>>,
    folders: Arc<MemoTable<NodeKey, HierarchyNode>>,
    lists: Arc<MemoTable<NodeKey, HierarchyNode>>,
    expanded: Mutex<HashSet<NodeKey>>,
}

/// Memoized hierarchy: workspace → spaces, space → folders, and
/// space or folder → lists.
///
/// Concurrent requests for one key share a single fetch. Entries live until
/// invalidated or until the session changes.
pub struct ResourceTreeCache<B> {
    inner: Arc<Inner<B>>,
}

impl<B> Clone for ResourceTreeCache<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: ResourceBackend> ResourceTreeCache<B> {
    /// Create an empty cache reading the token from `slot`.
    pub fn new(backend: Arc<B>, slot: SessionSlot) -> Self {
        let seen_epoch = AtomicU64::new(slot.epoch());
        Self {
            inner: Arc::new(Inner {
                backend,
                slot,
                seen_epoch,
                spaces: Arc::default(),
                folders: Arc::default(),
                lists: Arc::default(),
                expanded: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Lists under `node`, starting a fetch when nothing usable is cached.
    ///
    /// A space yields every folder's lists followed by its folder-less lists.
    /// A list is a leaf and settles empty without a network call.
    #[must_use]
    pub fn request(&self, node: &NodeKey) -> NodeEntry {
        match self.inner.scope() {
            Ok(scope) => Inner::lists_of(&self.inner, &scope, node),
            Err(err) => CacheEntry::Failed(err),
        }
    }

    /// Await the children of `node`.
    ///
    /// # Errors
    /// Returns the fetch error when the backend call failed.
    pub async fn children(&self, node: &NodeKey) -> FetchResult<HierarchyNode> {
        self.request(node).resolve().await
    }

    /// Await the children of `node` and return them only if the node is still
    /// expanded once they arrive.
    pub async fn children_if_expanded(
        &self,
        node: &NodeKey,
    ) -> Option<FetchResult<HierarchyNode>> {
        let outcome = self.children(node).await;
        if self.is_expanded(node) {
            Some(outcome)
        } else {
            debug!(%node, "node collapsed while loading; result kept in cache only");
            None
        }
    }

    /// Spaces of `workspace`, starting a fetch when nothing usable is cached.
    #[must_use]
    pub fn request_spaces(&self, workspace: &WorkspaceId) -> NodeEntry {
        let scope = match self.inner.scope() {
            Ok(scope) => scope,
            Err(err) => return CacheEntry::Failed(err),
        };
        let inner = Arc::clone(&self.inner);
        let key = workspace.clone();
        let token = scope.token.clone();
        self.inner
            .spaces
            .request_while(
                workspace,
                || self.inner.is_current(scope.epoch),
                move || async move { inner.backend.spaces(&token, &key).await }.boxed(),
            )
            .unwrap_or(CacheEntry::Failed(FetchError::SessionChanged))
    }

    /// Await the spaces of `workspace`.
    ///
    /// # Errors
    /// Returns the fetch error when the backend call failed.
    pub async fn spaces(&self, workspace: &WorkspaceId) -> FetchResult<HierarchyNode> {
        self.request_spaces(workspace).resolve().await
    }

    /// Folders of `space`, starting a fetch when nothing usable is cached.
    #[must_use]
    pub fn request_folders(&self, space: &NodeKey) -> NodeEntry {
        match self.inner.scope() {
            Ok(scope) => Inner::folders_of(&self.inner, &scope, space),
            Err(err) => CacheEntry::Failed(err),
        }
    }

    /// Await the folders of `space`.
    ///
    /// # Errors
    /// Returns the fetch error when the backend call failed.
    pub async fn folders(&self, space: &NodeKey) -> FetchResult<HierarchyNode> {
        self.request_folders(space).resolve().await
    }

    /// Observe the children entry of `node` without fetching.
    #[must_use]
    pub fn peek(&self, node: &NodeKey) -> NodeEntry {
        self.inner.sync_epoch();
        self.inner.lists.peek(node)
    }

    /// Observe the folders entry of `space` without fetching.
    #[must_use]
    pub fn peek_folders(&self, space: &NodeKey) -> NodeEntry {
        self.inner.sync_epoch();
        self.inner.folders.peek(space)
    }

    /// Flip the expansion state of `node` and return the new state.
    pub fn toggle(&self, node: &NodeKey) -> bool {
        let mut expanded = self.inner.expanded();
        if expanded.remove(node) {
            false
        } else {
            expanded.insert(node.clone());
            true
        }
    }

    /// Returns true when `node` is expanded.
    #[must_use]
    pub fn is_expanded(&self, node: &NodeKey) -> bool {
        self.inner.expanded().contains(node)
    }

    /// Drop everything cached for `node`.
    pub fn invalidate(&self, node: &NodeKey) {
        let folders = self.inner.folders.invalidate(node);
        let lists = self.inner.lists.invalidate(node);
        debug!(%node, folders, lists, "invalidated node");
    }

    /// Drop the cached spaces of `workspace`.
    pub fn invalidate_spaces(&self, workspace: &WorkspaceId) {
        self.inner.spaces.invalidate(workspace);
    }

    /// Drop every cached entry and expansion.
    pub fn invalidate_all(&self) {
        self.inner.clear();
    }
}

impl<B: ResourceBackend> Inner<B> {
    fn expanded(&self) -> MutexGuard<'_, HashSet<NodeKey>> {
        self.expanded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clear(&self) {
        self.spaces.clear();
        self.folders.clear();
        self.lists.clear();
        self.expanded().clear();
    }

    /// Drop all entries when the session moved since the last operation.
    fn sync_epoch(&self) -> (u64, Option<AccessToken>) {
        let (epoch, token) = self.slot.snapshot();
        if self.seen_epoch.swap(epoch, Ordering::AcqRel) != epoch {
            info!(epoch, "session changed; clearing resource cache");
            self.clear();
        }
        (epoch, token)
    }

    fn scope(&self) -> Result<Scope, FetchError> {
        match self.sync_epoch() {
            (epoch, Some(token)) => Ok(Scope { epoch, token }),
            (_, None) => Err(FetchError::Unauthorized),
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.slot.epoch() == epoch
    }

    fn folders_of(this: &Arc<Self>, scope: &Scope, space: &NodeKey) -> NodeEntry {
        let inner = Arc::clone(this);
        let token = scope.token.clone();
        let key = space.clone();
        this.folders
            .request_while(
                space,
                || this.is_current(scope.epoch),
                move || async move { inner.backend.folders(&token, &key).await }.boxed(),
            )
            .unwrap_or(CacheEntry::Failed(FetchError::SessionChanged))
    }

    fn lists_of(this: &Arc<Self>, scope: &Scope, node: &NodeKey) -> NodeEntry {
        if node.kind() == NodeKind::List {
            return this.lists.ready(node, Vec::new());
        }
        let inner = Arc::clone(this);
        let owned = scope.clone();
        let key = node.clone();
        this.lists
            .request_while(
                node,
                || this.is_current(scope.epoch),
                move || Self::fetch_lists(inner, owned, key),
            )
            .unwrap_or(CacheEntry::Failed(FetchError::SessionChanged))
    }

    fn fetch_lists(
        this: Arc<Self>,
        scope: Scope,
        node: NodeKey,
    ) -> BoxFuture<'static, Result<Vec<HierarchyNode>, FetchError>> {
        async move {
            let token = &scope.token;
            match node.kind() {
                NodeKind::Folder => this.backend.folder_lists(token, &node).await,
                NodeKind::Space => {
                    // Folder lists go through the tables; a session change
                    // since this fetch started refuses them.
                    let folders = Self::folders_of(&this, &scope, &node).resolve().await?;
                    let per_folder = try_join_all(
                        folders
                            .iter()
                            .map(|folder| Self::lists_of(&this, &scope, folder.key()).resolve()),
                    )
                    .await?;
                    let loose = this.backend.folderless_lists(token, &node).await?;
                    Ok(merge_lists(
                        per_folder
                            .iter()
                            .flat_map(|lists| lists.iter().cloned())
                            .chain(loose),
                    ))
                }
                NodeKind::List => Ok(Vec::new()),
            }
        }
        .boxed()
    }
}

/// Keep the first occurrence of every list id, preserving order.
fn merge_lists(lists: impl Iterator<Item = HierarchyNode>) -> Vec<HierarchyNode> {
    let mut seen = HashSet::new();
    lists
        .filter(|list| seen.insert(list.id().to_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]
    use super::*;
    use crate::test_support::{MockResources, key, signed_in_slot};
    use std::sync::atomic::Ordering;

    fn ids(nodes: &[HierarchyNode]) -> Vec<&str> {
        nodes.iter().map(HierarchyNode::id).collect()
    }

    #[tokio::test]
    async fn space_children_merge_folder_lists_then_loose_lists() {
        let backend = Arc::new(MockResources::sample());
        let cache = ResourceTreeCache::new(Arc::clone(&backend), signed_in_slot());

        let lists = cache
            .children(&key(NodeKind::Space, "s1"))
            .await
            .expect("space lists");
        assert_eq!(ids(&lists), vec!["l1", "l2", "l3", "l4"]);

        // Folder lists were fetched through the cache and are reused.
        let folder = cache
            .children(&key(NodeKind::Folder, "f1"))
            .await
            .expect("folder lists");
        assert_eq!(ids(&folder), vec!["l1", "l2"]);
        assert_eq!(backend.folder_list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn list_nodes_are_leaves() {
        let backend = Arc::new(MockResources::sample());
        let cache = ResourceTreeCache::new(Arc::clone(&backend), signed_in_slot());

        let entry = cache.request(&key(NodeKind::List, "l1"));
        assert!(entry.is_ready());
        assert!(entry.resolve().await.expect("leaf").is_empty());
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn toggle_flips_without_fetching() {
        let backend = Arc::new(MockResources::sample());
        let cache = ResourceTreeCache::new(Arc::clone(&backend), signed_in_slot());
        let folder = key(NodeKind::Folder, "f1");

        assert!(cache.toggle(&folder));
        assert!(cache.is_expanded(&folder));
        assert!(!cache.toggle(&folder));
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn collapsed_node_discards_result_but_keeps_cache() {
        let backend = Arc::new(MockResources::sample().gated());
        let cache = ResourceTreeCache::new(Arc::clone(&backend), signed_in_slot());
        let folder = key(NodeKind::Folder, "f1");

        cache.toggle(&folder);
        let waiting = {
            let cache = cache.clone();
            let folder = folder.clone();
            tokio::spawn(async move { cache.children_if_expanded(&folder).await })
        };
        tokio::task::yield_now().await;
        cache.toggle(&folder);
        backend.release();

        assert!(waiting.await.expect("join").is_none());
        assert!(cache.peek(&folder).is_ready());
    }

    #[tokio::test]
    async fn requests_without_session_fail_unauthorized() {
        let backend = Arc::new(MockResources::sample());
        let cache = ResourceTreeCache::new(Arc::clone(&backend), SessionSlot::default());
        let err = cache
            .children(&key(NodeKind::Folder, "f1"))
            .await
            .expect_err("no token");
        assert_eq!(err, FetchError::Unauthorized);
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn session_change_clears_entries() {
        let backend = Arc::new(MockResources::sample());
        let slot = signed_in_slot();
        let cache = ResourceTreeCache::new(Arc::clone(&backend), slot.clone());
        let folder = key(NodeKind::Folder, "f1");

        cache.children(&folder).await.expect("first fetch");
        cache.toggle(&folder);
        slot.publish(Some(AccessToken::new("tok2").expect("token")));

        assert!(matches!(cache.peek(&folder), CacheEntry::Empty));
        assert!(!cache.is_expanded(&folder));
        cache.children(&folder).await.expect("refetch");
        assert_eq!(backend.folder_list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn space_fetch_from_previous_session_does_not_refill_cache() {
        let backend = Arc::new(MockResources::sample().gated());
        let slot = signed_in_slot();
        let cache = ResourceTreeCache::new(Arc::clone(&backend), slot.clone());
        let space = key(NodeKind::Space, "s1");
        let folder = key(NodeKind::Folder, "f1");

        let pending = cache.request(&space);
        while backend.folder_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        slot.publish(Some(AccessToken::new("tok-other-account").expect("token")));
        assert!(matches!(cache.peek(&folder), CacheEntry::Empty));
        backend.release();

        let err = pending.resolve().await.expect_err("fetch from old session");
        assert_eq!(err, FetchError::SessionChanged);
        assert!(matches!(cache.peek(&folder), CacheEntry::Empty));
        assert!(matches!(cache.peek(&space), CacheEntry::Empty));
        assert!(matches!(cache.peek_folders(&space), CacheEntry::Empty));
        assert_eq!(backend.folder_list_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn merge_keeps_first_occurrence() {
        let parent = key(NodeKind::Space, "s");
        let node = |id: &str| HierarchyNode::new(key(NodeKind::List, id), Some(parent.clone()), id.to_owned(), None);
        let merged = merge_lists([node("a"), node("b"), node("a"), node("c")].into_iter());
        assert_eq!(ids(&merged), vec!["a", "b", "c"]);
    }
}
