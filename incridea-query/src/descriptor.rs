//! Query descriptors and fetch policies.

use incridea_cache::{Selection, Variables};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// When a prefetched query is fetched again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Revalidate {
    /// Never automatically revalidate.
    #[default]
    Never,
    /// Revalidate once this much time has passed; zero means on every request.
    Every(Duration),
}

impl Revalidate {
    /// Builds from an optional interval in seconds; `None` means never.
    pub fn from_secs(secs: Option<u64>) -> Self {
        match secs {
            Some(s) => Revalidate::Every(Duration::from_secs(s)),
            None => Revalidate::Never,
        }
    }

    /// Returns true if data obtained at `last` must be refreshed at `now`.
    pub fn is_due(&self, last: Instant, now: Instant) -> bool {
        match self {
            Revalidate::Never => false,
            Revalidate::Every(interval) => now.saturating_duration_since(last) >= *interval,
        }
    }

    /// Returns true if every request revalidates.
    pub fn is_always(&self) -> bool {
        matches!(self, Revalidate::Every(d) if d.is_zero())
    }
}

/// Rule for reading cache, network or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPolicy {
    /// Serve from the store when complete and unexpired, else fetch.
    #[default]
    CacheFirst,
    /// Always fetch.
    NetworkOnly,
    /// Fetched at build time and shipped via hydration; refetched per `revalidate`.
    PrefetchAtBuild { revalidate: Revalidate },
}

/// Identity of a query: operation name plus variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryId(String);

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named data requirement plus the policy to satisfy it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    pub operation_name: String,
    /// GraphQL document text sent over the wire.
    pub document: String,
    pub variables: Variables,
    /// Shape of the expected result.
    pub selection: Selection,
    pub policy: FetchPolicy,
}

impl QueryDescriptor {
    /// Creates a cache-first descriptor without variables.
    pub fn new(
        operation_name: impl Into<String>,
        document: impl Into<String>,
        selection: Selection,
    ) -> Self {
        Self {
            operation_name: operation_name.into(),
            document: document.into(),
            variables: Variables::new(),
            selection,
            policy: FetchPolicy::CacheFirst,
        }
    }

    /// Sets one variable.
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Sets the fetch policy.
    pub fn with_policy(mut self, policy: FetchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Identity used for revalidation bookkeeping.
    pub fn id(&self) -> QueryId {
        if self.variables.is_empty() {
            QueryId(self.operation_name.clone())
        } else {
            let vars: serde_json::Map<String, Value> = self
                .variables
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            QueryId(format!("{}({})", self.operation_name, Value::Object(vars)))
        }
    }
}
