//! Store instance management per execution context.
//!
//! Server contexts get a fresh, empty store on every call so concurrent
//! requests never see each other's data. The client context keeps one store
//! for the lifetime of the page session and hands out the same handle.

use crate::error::CacheResult;
use crate::handle::{HydrationState, StoreHandle};
use crate::snapshot::CacheSnapshot;
use incridea_types::EntityKey;
use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Where code is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    /// Build time or a per-request server render.
    Server,
    /// The long-lived client page session.
    Client,
}

/// Result of applying a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HydrationReport {
    /// Records in the snapshot.
    pub records: usize,
    /// Keys whose content changed.
    pub changed_keys: BTreeSet<EntityKey>,
}

/// Produces the store for an execution context and hydrates it.
#[derive(Debug, Default)]
pub struct CacheInstanceManager {
    client: Mutex<Option<StoreHandle>>,
}

impl CacheInstanceManager {
    /// Creates a manager with no client store yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the store for `context`.
    pub fn resolve(&self, context: ExecutionContext) -> StoreHandle {
        match context {
            ExecutionContext::Server => {
                let store = StoreHandle::new();
                debug!("Created server store {}", store.id());
                store
            }
            ExecutionContext::Client => {
                let mut client = self.client.lock().unwrap_or_else(PoisonError::into_inner);
                client
                    .get_or_insert_with(|| {
                        let store = StoreHandle::new();
                        debug!("Created client store {}", store.id());
                        store
                    })
                    .clone()
            }
        }
    }

    /// Marks a store as waiting for a snapshot. Queries that need an
    /// authoritative store wait until [`hydrate`](Self::hydrate) finishes.
    pub fn expect_hydration(&self, store: &StoreHandle) {
        if !store.is_hydrated() {
            store.set_hydration_state(HydrationState::Awaiting);
        }
    }

    /// Applies every record of `snapshot` as one batch and marks the store
    /// hydrated. Replaying an applied snapshot changes nothing.
    pub fn hydrate(
        &self,
        store: &StoreHandle,
        snapshot: &CacheSnapshot,
    ) -> CacheResult<HydrationReport> {
        let records = snapshot.len();
        match store.merge_batch(snapshot.clone().into_batch()) {
            Ok(outcome) => {
                store.set_hydration_state(HydrationState::Hydrated);
                info!(
                    "Hydrated store {} with {} records ({} changed)",
                    store.id(),
                    records,
                    outcome.changed.len()
                );
                Ok(HydrationReport {
                    records,
                    changed_keys: outcome.changed,
                })
            }
            Err(e) => {
                warn!("Hydration of store {} failed: {}", store.id(), e);
                if store.hydration_state() == HydrationState::Awaiting {
                    store.set_hydration_state(HydrationState::Failed);
                }
                Err(e)
            }
        }
    }

    /// Resolves the store for `context` and applies `snapshot` if given.
    pub fn initialize(
        &self,
        context: ExecutionContext,
        snapshot: Option<&CacheSnapshot>,
    ) -> CacheResult<StoreHandle> {
        let store = self.resolve(context);
        if let Some(snapshot) = snapshot {
            self.hydrate(&store, snapshot)?;
        }
        Ok(store)
    }

    /// Drops the held client store; the next client resolve starts empty.
    pub fn end_client_session(&self) {
        let mut client = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(store) = client.take() {
            debug!("Released client store {}", store.id());
        }
    }
}
