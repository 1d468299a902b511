//! In-memory normalized store.
//!
//! One flat record per [`EntityKey`]. Writes are field-wise and additive:
//! incoming fields overwrite (last write wins per field), fields absent from
//! the incoming record are kept. A batch is validated as a whole before any
//! record is touched, so a rejected batch leaves the store exactly as it was.
//!
//! A record's age only resets when its content changes, or when the batch
//! comes straight from the network ([`NormalizedStore::merge_fetched`]).
//! Replaying a snapshot therefore never revives expired records.

use crate::error::{CacheError, CacheResult};
use crate::snapshot::CacheSnapshot;
use incridea_types::{EntityKey, NormalizedRecord};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Capacity of the change notification channel.
pub const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Change notification emitted once per affected key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    /// At least one field of the record was created or changed.
    Updated(EntityKey),
    /// The record was removed by a reset.
    Removed(EntityKey),
}

/// What a merge batch did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Keys whose content changed.
    pub changed: BTreeSet<EntityKey>,
    /// Number of records written (including unchanged ones).
    pub written: usize,
}

impl MergeOutcome {
    /// Returns true if no record changed.
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty()
    }
}

#[derive(Debug, Clone)]
struct StoredRecord {
    record: NormalizedRecord,
    written_at: Instant,
}

/// Keyed table of normalized records.
#[derive(Debug)]
pub struct NormalizedStore {
    records: HashMap<EntityKey, StoredRecord>,
    changes: broadcast::Sender<StoreChange>,
}

impl NormalizedStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            records: HashMap::new(),
            changes,
        }
    }

    /// Returns the record for a key.
    pub fn get(&self, key: &EntityKey) -> Option<&NormalizedRecord> {
        self.records.get(key).map(|s| &s.record)
    }

    /// Returns true if a record exists for the key.
    pub fn contains(&self, key: &EntityKey) -> bool {
        self.records.contains_key(key)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates all keys (arbitrary order).
    pub fn keys(&self) -> impl Iterator<Item = &EntityKey> {
        self.records.keys()
    }

    /// Returns true if the record exists and was written within `max_age`.
    /// With no `max_age` any present record is fresh.
    pub fn is_fresh(&self, key: &EntityKey, max_age: Option<Duration>) -> bool {
        match (self.records.get(key), max_age) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(stored), Some(max_age)) => stored.written_at.elapsed() <= max_age,
        }
    }

    /// Subscribes to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    /// Merges a partial record into one key.
    pub fn merge(&mut self, key: EntityKey, partial: NormalizedRecord) -> CacheResult<MergeOutcome> {
        self.merge_batch(vec![(key, partial)])
    }

    /// Merges a batch of partial records.
    ///
    /// The same key may appear more than once; entries apply in order.
    /// Nothing is written if any entry is rejected.
    pub fn merge_batch(
        &mut self,
        batch: Vec<(EntityKey, NormalizedRecord)>,
    ) -> CacheResult<MergeOutcome> {
        self.apply_batch(batch, false)
    }

    /// Merges a batch just returned by the network. Every written record
    /// counts as freshly fetched, even when its content is unchanged.
    pub fn merge_fetched(
        &mut self,
        batch: Vec<(EntityKey, NormalizedRecord)>,
    ) -> CacheResult<MergeOutcome> {
        self.apply_batch(batch, true)
    }

    fn apply_batch(
        &mut self,
        batch: Vec<(EntityKey, NormalizedRecord)>,
        fetched: bool,
    ) -> CacheResult<MergeOutcome> {
        if let Err(e) = self.validate(&batch) {
            warn!("Rejected merge batch of {} records: {}", batch.len(), e);
            return Err(e);
        }

        let now = Instant::now();
        let mut outcome = MergeOutcome::default();

        for (key, incoming) in batch {
            let mut key_changed = false;
            let stored = self.records.entry(key.clone()).or_insert_with(|| {
                key_changed = true;
                StoredRecord {
                    record: NormalizedRecord::new(),
                    written_at: now,
                }
            });

            for (field, value) in incoming {
                if stored.record.get(&field) != Some(&value) {
                    stored.record.insert(field, value);
                    key_changed = true;
                }
            }
            if key_changed || fetched {
                stored.written_at = now;
            }

            outcome.written += 1;
            if key_changed {
                outcome.changed.insert(key);
            }
        }

        for key in &outcome.changed {
            // No subscribers is fine.
            let _ = self.changes.send(StoreChange::Updated(key.clone()));
        }

        debug!(
            "Merged {} records ({} changed)",
            outcome.written,
            outcome.changed.len()
        );
        Ok(outcome)
    }

    /// Removes every record.
    pub fn reset(&mut self) {
        let removed: Vec<EntityKey> = self.records.drain().map(|(k, _)| k).collect();
        for key in removed {
            let _ = self.changes.send(StoreChange::Removed(key));
        }
    }

    /// Serializable copy of every record.
    pub fn extract(&self) -> CacheSnapshot {
        self.records
            .iter()
            .map(|(k, s)| (k.clone(), s.record.clone()))
            .collect()
    }

    fn validate(&self, batch: &[(EntityKey, NormalizedRecord)]) -> CacheResult<()> {
        let mut batch_tags: HashMap<&EntityKey, Option<&str>> = HashMap::new();

        for (key, record) in batch {
            let declared = record.typename();
            if let Some(declared) = declared {
                if !key.is_root() && declared != key.typename() {
                    return Err(CacheError::Conflict {
                        id: key.id().to_string(),
                        recorded: key.typename().to_string(),
                        proposed: declared.to_string(),
                    });
                }
            }
            let entry = batch_tags.entry(key).or_insert(None);
            if declared.is_some() {
                *entry = declared;
            }
        }

        for (key, record) in batch {
            for target in record.references() {
                let in_batch = batch_tags.get(target);
                let stored = self.records.get(target);
                if in_batch.is_none() && stored.is_none() {
                    return Err(CacheError::DanglingReference {
                        from: key.clone(),
                        to: target.clone(),
                    });
                }

                let declared = in_batch
                    .copied()
                    .flatten()
                    .or_else(|| stored.and_then(|s| s.record.typename()));
                if let Some(declared) = declared {
                    if !target.is_root() && declared != target.typename() {
                        return Err(CacheError::Conflict {
                            id: target.id().to_string(),
                            recorded: declared.to_string(),
                            proposed: target.typename().to_string(),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

impl Default for NormalizedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for NormalizedStore {
    fn eq(&self, other: &Self) -> bool {
        self.records.len() == other.records.len()
            && self
                .records
                .iter()
                .all(|(k, s)| other.get(k) == Some(&s.record))
    }
}
