//! Shared handle to one store instance.
//!
//! All queries of one execution context share a single handle. The store
//! lock is never held across an await point.

use crate::error::CacheResult;
use crate::snapshot::CacheSnapshot;
use crate::store::{MergeOutcome, NormalizedStore, StoreChange};
use incridea_types::{EntityKey, NormalizedRecord};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

/// Hydration progress of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationState {
    /// No snapshot is expected; the store is authoritative as-is.
    NotExpected,
    /// A snapshot is on its way; reads must wait.
    Awaiting,
    /// A snapshot has been applied.
    Hydrated,
    /// The snapshot was rejected; the store kept its prior content.
    Failed,
}

struct StoreInner {
    id: Uuid,
    store: RwLock<NormalizedStore>,
    hydration: watch::Sender<HydrationState>,
}

/// Cheaply clonable handle to a [`NormalizedStore`].
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<StoreInner>,
}

impl StoreHandle {
    /// Creates a handle around a new, empty store.
    pub fn new() -> Self {
        let (hydration, _) = watch::channel(HydrationState::NotExpected);
        Self {
            inner: Arc::new(StoreInner {
                id: Uuid::now_v7(),
                store: RwLock::new(NormalizedStore::new()),
                hydration,
            }),
        }
    }

    /// Identity of the underlying store instance.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Returns true if both handles point at the same store.
    pub fn same_store(&self, other: &StoreHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Runs `f` with shared access to the store.
    pub fn read<R>(&self, f: impl FnOnce(&NormalizedStore) -> R) -> R {
        let guard = self.inner.store.read().unwrap_or_else(PoisonError::into_inner);
        f(&*guard)
    }

    /// Runs `f` with exclusive access to the store.
    pub fn write<R>(&self, f: impl FnOnce(&mut NormalizedStore) -> R) -> R {
        let mut guard = self.inner.store.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }

    /// Returns a copy of the record for a key.
    pub fn get(&self, key: &EntityKey) -> Option<NormalizedRecord> {
        self.read(|s| s.get(key).cloned())
    }

    /// Merges a partial record into one key.
    pub fn merge(&self, key: EntityKey, partial: NormalizedRecord) -> CacheResult<MergeOutcome> {
        self.write(|s| s.merge(key, partial))
    }

    /// Merges a batch atomically with respect to other readers and writers.
    pub fn merge_batch(
        &self,
        batch: Vec<(EntityKey, NormalizedRecord)>,
    ) -> CacheResult<MergeOutcome> {
        self.write(|s| s.merge_batch(batch))
    }

    /// Merges a batch just returned by the network.
    pub fn merge_fetched(
        &self,
        batch: Vec<(EntityKey, NormalizedRecord)>,
    ) -> CacheResult<MergeOutcome> {
        self.write(|s| s.merge_fetched(batch))
    }

    /// Serializable copy of the store.
    pub fn extract(&self) -> CacheSnapshot {
        self.read(NormalizedStore::extract)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.read(NormalizedStore::len)
    }

    /// Returns true if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.read(NormalizedStore::is_empty)
    }

    /// Clears the store.
    pub fn reset(&self) {
        self.write(NormalizedStore::reset);
    }

    /// Subscribes to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.read(NormalizedStore::subscribe)
    }

    /// Current hydration state.
    pub fn hydration_state(&self) -> HydrationState {
        *self.inner.hydration.borrow()
    }

    /// Returns true once a snapshot has been applied.
    pub fn is_hydrated(&self) -> bool {
        self.hydration_state() == HydrationState::Hydrated
    }

    pub(crate) fn set_hydration_state(&self, state: HydrationState) {
        self.inner.hydration.send_replace(state);
    }

    /// Resolves once the store may be treated as authoritative, i.e. no
    /// hydration is pending.
    pub async fn authoritative(&self) {
        let mut rx = self.inner.hydration.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|s| *s != HydrationState::Awaiting).await;
    }
}

impl Default for StoreHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("id", &self.inner.id)
            .field("records", &self.len())
            .field("hydration", &self.hydration_state())
            .finish()
    }
}
