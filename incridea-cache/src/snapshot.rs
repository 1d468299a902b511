//! Snapshots: the transport form of a store.
//!
//! A snapshot is a JSON object keyed by entity key text. Key order carries
//! no meaning. Applying a snapshot to an empty store reproduces the store it
//! was extracted from.

use crate::error::CacheResult;
use chrono::{DateTime, Utc};
use incridea_types::{EntityKey, NormalizedRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serializable mapping from entity key to record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheSnapshot {
    records: BTreeMap<EntityKey, NormalizedRecord>,
}

impl CacheSnapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record.
    pub fn insert(&mut self, key: EntityKey, record: NormalizedRecord) {
        self.records.insert(key, record);
    }

    /// Returns a record.
    pub fn get(&self, key: &EntityKey) -> Option<&NormalizedRecord> {
        self.records.get(key)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the snapshot holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &EntityKey> {
        self.records.keys()
    }

    /// Turns the snapshot into a merge batch.
    pub fn into_batch(self) -> Vec<(EntityKey, NormalizedRecord)> {
        self.records.into_iter().collect()
    }

    /// Serializes to a JSON string.
    pub fn to_json(&self) -> CacheResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a JSON string.
    pub fn from_json(json: &str) -> CacheResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl FromIterator<(EntityKey, NormalizedRecord)> for CacheSnapshot {
    fn from_iter<I: IntoIterator<Item = (EntityKey, NormalizedRecord)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// Initial page payload carrying a snapshot to the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagePayload {
    pub props: PageProps,
    /// When the embedded snapshot was last (re)built, for statically served pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revalidated_at: Option<DateTime<Utc>>,
}

/// Page props embedded in the payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageProps {
    #[serde(rename = "initialApolloState", default)]
    pub initial_cache_state: CacheSnapshot,
}

impl PagePayload {
    /// Wraps a snapshot.
    pub fn new(snapshot: CacheSnapshot) -> Self {
        Self {
            props: PageProps {
                initial_cache_state: snapshot,
            },
            revalidated_at: None,
        }
    }

    /// Sets the revalidation time.
    pub fn with_revalidated_at(mut self, at: DateTime<Utc>) -> Self {
        self.revalidated_at = Some(at);
        self
    }

    /// The embedded snapshot.
    pub fn snapshot(&self) -> &CacheSnapshot {
        &self.props.initial_cache_state
    }

    /// Serializes to a JSON string.
    pub fn to_json(&self) -> CacheResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a JSON string.
    pub fn from_json(json: &str) -> CacheResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
