//! Keyed memo table with single-flight fetches.
//!
//! Each key holds one [`CacheEntry`]. Requesting an empty or failed key spawns
//! exactly one fetch on the runtime; every caller that arrives while it runs
//! receives a clone of the same shared future. The spawned task settles the
//! entry whether or not anyone is still waiting.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use time::OffsetDateTime;
use tracing::debug;

use crate::error::FetchError;

/// Outcome shared between every waiter of one fetch.
pub type FetchResult<T> = Result<Arc<Vec<T>>, FetchError>;

/// Fetch in flight, cloneable to any number of waiters.
pub type PendingFetch<T> = Shared<BoxFuture<'static, FetchResult<T>>>;

/// State of a single memoized key.
pub enum CacheEntry<T> {
    /// Never requested, or invalidated.
    Empty,
    /// A fetch is running.
    Loading(PendingFetch<T>),
    /// Children are available.
    Ready {
        /// Fetched children in remote order.
        children: Arc<Vec<T>>,
        /// When the fetch settled.
        fetched_at: OffsetDateTime,
    },
    /// The last fetch failed; the next request retries.
    Failed(FetchError),
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Empty => Self::Empty,
            Self::Loading(pending) => Self::Loading(pending.clone()),
            Self::Ready {
                children,
                fetched_at,
            } => Self::Ready {
                children: Arc::clone(children),
                fetched_at: *fetched_at,
            },
            Self::Failed(err) => Self::Failed(err.clone()),
        }
    }
}

impl<T> fmt::Debug for CacheEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Loading(_) => f.write_str("Loading"),
            Self::Ready {
                children,
                fetched_at,
            } => f
                .debug_struct("Ready")
                .field("children", &children.len())
                .field("fetched_at", fetched_at)
                .finish(),
            Self::Failed(err) => f.debug_tuple("Failed").field(err).finish(),
        }
    }
}

impl<T> CacheEntry<T> {
    /// Returns true while a fetch is running.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading(_))
    }

    /// Returns true once children are available.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Children, when ready.
    #[must_use]
    pub const fn children(&self) -> Option<&Arc<Vec<T>>> {
        match self {
            Self::Ready { children, .. } => Some(children),
            _ => None,
        }
    }

    /// Wait for the entry to settle.
    ///
    /// An `Empty` entry resolves to no children.
    ///
    /// # Errors
    /// Returns the fetch error of a failed entry.
    pub async fn resolve(self) -> FetchResult<T> {
        match self {
            Self::Empty => Ok(Arc::new(Vec::new())),
            Self::Loading(pending) => pending.await,
            Self::Ready { children, .. } => Ok(children),
            Self::Failed(err) => Err(err),
        }
    }
}

struct Slot<T> {
    generation: u64,
    entry: CacheEntry<T>,
}

/// One memoized level of the hierarchy.
pub struct MemoTable<K, T> {
    slots: Mutex<HashMap<K, Slot<T>>>,
    next_generation: AtomicU64,
}

impl<K, T> Default for MemoTable<K, T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }
}

impl<K, T> MemoTable<K, T>
where
    K: Eq + Hash + Clone + fmt::Display + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    fn guard(&self) -> MutexGuard<'_, HashMap<K, Slot<T>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the entry for `key`, starting a fetch if none is usable.
    ///
    /// `fetch` is only invoked when a new fetch is started. Must be called
    /// from within a tokio runtime.
    pub fn request<F>(self: &Arc<Self>, key: &K, fetch: F) -> CacheEntry<T>
    where
        F: FnOnce() -> BoxFuture<'static, Result<Vec<T>, FetchError>>,
    {
        self.request_while(key, || true, fetch)
            .unwrap_or(CacheEntry::Empty)
    }

    /// Like [`Self::request`], but only while `current` holds.
    ///
    /// `current` is evaluated under the table lock, before any entry is read
    /// or inserted. Returns `None` without touching the table when it fails.
    pub fn request_while<V, F>(
        self: &Arc<Self>,
        key: &K,
        current: V,
        fetch: F,
    ) -> Option<CacheEntry<T>>
    where
        V: FnOnce() -> bool,
        F: FnOnce() -> BoxFuture<'static, Result<Vec<T>, FetchError>>,
    {
        let mut slots = self.guard();
        if !current() {
            debug!(%key, "request no longer current; not cached");
            return None;
        }
        if let Some(slot) = slots.get(key) {
            match &slot.entry {
                CacheEntry::Loading(_) | CacheEntry::Ready { .. } => {
                    return Some(slot.entry.clone());
                }
                CacheEntry::Empty | CacheEntry::Failed(_) => {}
            }
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        debug!(%key, generation, "starting fetch");
        let table = Arc::clone(self);
        let settle_key = key.clone();
        let fetching = fetch();
        // The table lock is still held, so settle cannot run before the slot exists.
        let handle = tokio::spawn(async move {
            let outcome = fetching.await.map(Arc::new);
            table.settle(&settle_key, generation, &outcome);
            outcome
        });
        let pending = async move {
            handle
                .await
                .unwrap_or_else(|err| Err(FetchError::Network(format!("fetch aborted: {err}"))))
        }
        .boxed()
        .shared();

        let entry = CacheEntry::Loading(pending);
        slots.insert(
            key.clone(),
            Slot {
                generation,
                entry: entry.clone(),
            },
        );
        Some(entry)
    }

    /// Settle `key` as ready with `children` without fetching, unless it
    /// already holds children.
    pub fn ready(&self, key: &K, children: Vec<T>) -> CacheEntry<T> {
        let mut slots = self.guard();
        if let Some(slot) = slots.get(key)
            && slot.entry.is_ready()
        {
            return slot.entry.clone();
        }
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let entry = CacheEntry::Ready {
            children: Arc::new(children),
            fetched_at: OffsetDateTime::now_utc(),
        };
        slots.insert(
            key.clone(),
            Slot {
                generation,
                entry: entry.clone(),
            },
        );
        entry
    }

    fn settle(&self, key: &K, generation: u64, outcome: &FetchResult<T>) {
        let mut slots = self.guard();
        let Some(slot) = slots.get_mut(key) else {
            debug!(%key, generation, "dropping result for invalidated entry");
            return;
        };
        if slot.generation != generation {
            debug!(%key, generation, "dropping result for superseded fetch");
            return;
        }
        slot.entry = match outcome {
            Ok(children) => CacheEntry::Ready {
                children: Arc::clone(children),
                fetched_at: OffsetDateTime::now_utc(),
            },
            Err(err) => {
                debug!(%key, error = %err, "fetch failed");
                CacheEntry::Failed(err.clone())
            }
        };
    }

    /// Observe the entry for `key` without starting a fetch.
    #[must_use]
    pub fn peek(&self, key: &K) -> CacheEntry<T> {
        self.guard()
            .get(key)
            .map_or(CacheEntry::Empty, |slot| slot.entry.clone())
    }

    /// Reset `key` to empty. A fetch still running for it will not settle.
    pub fn invalidate(&self, key: &K) -> bool {
        self.guard().remove(key).is_some()
    }

    /// Reset every key.
    pub fn clear(&self) {
        self.guard().clear();
    }

    /// Number of keys with a non-empty entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    /// Returns true when no key holds an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}
