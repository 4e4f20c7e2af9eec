//! Per-list status catalog with last-known-good fallback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use clickpanel_core::{ListId, StatusOption};
use tracing::{debug, warn};

use crate::backend::ResourceBackend;
use crate::error::FetchError;
use crate::session::SessionSlot;

type Catalog = Arc<Vec<StatusOption>>;

/// Status options of each list, refreshed on every lookup.
pub struct StatusCatalog<B> {
    backend: Arc<B>,
    slot: SessionSlot,
    seen_epoch: AtomicU64,
    entries: Mutex<HashMap<ListId, Catalog>>,
}

impl<B: ResourceBackend> StatusCatalog<B> {
    /// Create an empty catalog reading the token from `slot`.
    pub fn new(backend: Arc<B>, slot: SessionSlot) -> Self {
        let seen_epoch = AtomicU64::new(slot.epoch());
        Self {
            backend,
            slot,
            seen_epoch,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<ListId, Catalog>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sync_epoch(&self) -> u64 {
        let epoch = self.slot.epoch();
        if self.seen_epoch.swap(epoch, Ordering::AcqRel) != epoch {
            debug!(epoch, "session changed; clearing status catalog");
            self.guard().clear();
        }
        epoch
    }

    /// Fetch the statuses of `list` and replace the cached set.
    ///
    /// # Errors
    /// Returns the fetch error; the cached set is left untouched.
    pub async fn refresh(&self, list: &ListId) -> Result<Catalog, FetchError> {
        self.sync_epoch();
        let (epoch, token) = self.slot.snapshot();
        let token = token.ok_or(FetchError::Unauthorized)?;
        let options = Arc::new(self.backend.list_statuses(&token, list).await?);
        if self.slot.epoch() == epoch {
            self.guard().insert(list.clone(), Arc::clone(&options));
        }
        Ok(options)
    }

    /// Last known statuses of `list`, or an empty set, after a failed refresh.
    pub fn fallback(&self, list: &ListId, err: &FetchError) -> Catalog {
        warn!(%list, error = %err, "status refresh failed; serving last known catalog");
        self.cached(list).unwrap_or_default()
    }

    /// Statuses of `list`. Failures fall back to the last known set.
    pub async fn statuses_for(&self, list: &ListId) -> Catalog {
        match self.refresh(list).await {
            Ok(options) => options,
            Err(err) => self.fallback(list, &err),
        }
    }

    /// Last known statuses of `list` without a network call.
    #[must_use]
    pub fn cached(&self, list: &ListId) -> Option<Catalog> {
        self.sync_epoch();
        self.guard().get(list).cloned()
    }

    /// Colour of `label` in the cached catalog of `list`. Labels compare
    /// case-insensitively.
    #[must_use]
    pub fn color_for(&self, list: &ListId, label: &str) -> Option<String> {
        self.cached(list)?
            .iter()
            .find(|option| option.label.eq_ignore_ascii_case(label))
            .map(|option| option.color.clone())
            .filter(|color| !color.is_empty())
    }
}
