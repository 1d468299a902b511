//! Serves queries from the store or the network according to their policy.
//!
//! Network results are normalized and merged as one batch. A failed fetch
//! leaves the store untouched and reports `error` together with whatever
//! consistent (possibly stale) data the store already had.

use crate::descriptor::{FetchPolicy, QueryDescriptor, QueryId, Revalidate};
use crate::error::QueryError;
use crate::scope::ViewScope;
use crate::transport::{QueryRequest, QueryTransport};
use incridea_cache::{normalize, HydrationState, StoreHandle};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// How long cached records count as unexpired for cache-first reads.
    /// `None` keeps them valid forever.
    pub cache_ttl: Option<Duration>,
    /// Timeout for a single network fetch.
    pub request_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            cache_ttl: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Observable status of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Loading,
    Success,
    Error,
}

/// Data plus status, as seen by the view.
#[derive(Debug, Clone)]
pub struct QueryState {
    pub status: QueryStatus,
    pub data: Option<Value>,
    pub error: Option<Arc<QueryError>>,
}

impl QueryState {
    /// Waiting for the network.
    pub fn loading() -> Self {
        Self {
            status: QueryStatus::Loading,
            data: None,
            error: None,
        }
    }

    /// Completed with data.
    pub fn success(data: Value) -> Self {
        Self {
            status: QueryStatus::Success,
            data: Some(data),
            error: None,
        }
    }

    /// Failed; `stale` is previously cached data, if any.
    pub fn failed(error: QueryError, stale: Option<Value>) -> Self {
        Self {
            status: QueryStatus::Error,
            data: stale,
            error: Some(Arc::new(error)),
        }
    }

    /// Returns true while loading.
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    /// Returns true on success.
    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    /// Returns true on error.
    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}

/// Executes queries against a store according to their fetch policy.
pub struct QueryExecutor {
    transport: Arc<dyn QueryTransport>,
    config: ExecutorConfig,
    /// When each prefetched query last obtained its data.
    fetched_at: Mutex<HashMap<QueryId, Instant>>,
}

impl QueryExecutor {
    /// Creates an executor with the default configuration.
    pub fn new(transport: Arc<dyn QueryTransport>) -> Self {
        Self::with_config(transport, ExecutorConfig::default())
    }

    /// Creates an executor with a custom configuration.
    pub fn with_config(transport: Arc<dyn QueryTransport>, config: ExecutorConfig) -> Self {
        Self {
            transport,
            config,
            fetched_at: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Synchronous cache lookup honoring `cache_ttl`.
    pub fn read_cached(&self, descriptor: &QueryDescriptor, store: &StoreHandle) -> Option<Value> {
        self.read_with_max_age(descriptor, store, self.config.cache_ttl)
    }

    fn read_with_max_age(
        &self,
        descriptor: &QueryDescriptor,
        store: &StoreHandle,
        max_age: Option<Duration>,
    ) -> Option<Value> {
        store.read(|s| normalize::read(s, &descriptor.selection, &descriptor.variables, max_age))
    }

    /// Runs a query to completion.
    pub async fn execute(
        &self,
        descriptor: &QueryDescriptor,
        store: &StoreHandle,
        scope: &ViewScope,
    ) -> QueryState {
        match descriptor.policy {
            FetchPolicy::CacheFirst => {
                store.authoritative().await;
                if let Some(data) = self.read_cached(descriptor, store) {
                    debug!("Cache hit for {}", descriptor.operation_name);
                    return QueryState::success(data);
                }
                self.fetch_and_merge(descriptor, store, scope).await
            }
            FetchPolicy::NetworkOnly => self.fetch_and_merge(descriptor, store, scope).await,
            FetchPolicy::PrefetchAtBuild { revalidate } => {
                store.authoritative().await;
                if !self.revalidation_due(&descriptor.id(), revalidate) {
                    if let Some(data) = self.read_with_max_age(descriptor, store, None) {
                        debug!("Serving prefetched {}", descriptor.operation_name);
                        return QueryState::success(data);
                    }
                }
                self.fetch_and_merge(descriptor, store, scope).await
            }
        }
    }

    /// Forces a network round-trip regardless of policy.
    pub async fn refetch(
        &self,
        descriptor: &QueryDescriptor,
        store: &StoreHandle,
        scope: &ViewScope,
    ) -> QueryState {
        self.fetch_and_merge(descriptor, store, scope).await
    }

    /// Starts a query in the background and returns a receiver observing
    /// its state. A complete cache-first hit is visible immediately.
    pub fn watch(
        self: &Arc<Self>,
        descriptor: QueryDescriptor,
        store: StoreHandle,
        scope: ViewScope,
    ) -> watch::Receiver<QueryState> {
        let immediate = match descriptor.policy {
            FetchPolicy::CacheFirst if store.hydration_state() != HydrationState::Awaiting => {
                self.read_cached(&descriptor, &store)
            }
            _ => None,
        };
        if let Some(data) = immediate {
            let (_, rx) = watch::channel(QueryState::success(data));
            return rx;
        }

        let (tx, rx) = watch::channel(QueryState::loading());
        let executor = Arc::clone(self);
        tokio::spawn(async move {
            let state = executor.execute(&descriptor, &store, &scope).await;
            tx.send_replace(state);
        });
        rx
    }

    /// Returns true if a prefetched query must be fetched again. The first
    /// time a query is seen its cached data becomes the baseline.
    fn revalidation_due(&self, id: &QueryId, revalidate: Revalidate) -> bool {
        if revalidate.is_always() {
            return true;
        }
        let now = Instant::now();
        let mut fetched_at = self.fetched_at.lock().unwrap_or_else(PoisonError::into_inner);
        match fetched_at.get(id) {
            Some(last) => revalidate.is_due(*last, now),
            None => {
                fetched_at.insert(id.clone(), now);
                false
            }
        }
    }

    async fn fetch_and_merge(
        &self,
        descriptor: &QueryDescriptor,
        store: &StoreHandle,
        scope: &ViewScope,
    ) -> QueryState {
        let request = QueryRequest::from(descriptor);
        debug!(
            "Fetching {} via {} transport",
            descriptor.operation_name,
            self.transport.name()
        );

        let timeout = self.config.request_timeout;
        let outcome = tokio::select! {
            biased;
            _ = scope.torn_down() => {
                debug!("View torn down, abandoning {}", descriptor.operation_name);
                return QueryState::failed(QueryError::Cancelled, None);
            }
            result = tokio::time::timeout(timeout, self.transport.fetch(&request)) => result,
        };

        let data = match outcome {
            Ok(Ok(data)) => data,
            Ok(Err(e)) => return self.fail(descriptor, store, e),
            Err(_) => return self.fail(descriptor, store, QueryError::Timeout(timeout)),
        };

        // Pending hydration must land before this result does.
        tokio::select! {
            biased;
            _ = scope.torn_down() => {
                debug!("View torn down, discarding {}", descriptor.operation_name);
                return QueryState::failed(QueryError::Cancelled, None);
            }
            _ = store.authoritative() => {}
        }

        let merged = normalize::normalize(&data, &descriptor.selection, &descriptor.variables)
            .and_then(|batch| store.merge_fetched(batch));
        match merged {
            Ok(outcome) => {
                info!(
                    "Fetched {} ({} records, {} changed)",
                    descriptor.operation_name,
                    outcome.written,
                    outcome.changed.len()
                );
            }
            Err(e) => return self.fail(descriptor, store, e.into()),
        }

        if matches!(descriptor.policy, FetchPolicy::PrefetchAtBuild { .. }) {
            self.fetched_at
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(descriptor.id(), Instant::now());
        }

        let data = self
            .read_with_max_age(descriptor, store, None)
            .unwrap_or(data);
        QueryState::success(data)
    }

    fn fail(&self, descriptor: &QueryDescriptor, store: &StoreHandle, error: QueryError) -> QueryState {
        warn!("Query {} failed: {}", descriptor.operation_name, error);
        let stale = self.read_with_max_age(descriptor, store, None);
        QueryState::failed(error, stale)
    }
}
