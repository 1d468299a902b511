//! Normalization of query results and reads back out of the store.
//!
//! An object carrying `__typename` and `id` (or `_id`) becomes its own
//! record and is replaced by a reference. Objects without identity are kept
//! inline. Top-level fields land on the `ROOT_QUERY` record.

use crate::error::{CacheError, CacheResult};
use crate::selection::{Selection, Variables};
use crate::store::NormalizedStore;
use incridea_types::{EntityKey, FieldValue, NormalizedRecord, TYPENAME_FIELD};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Flattens a query result into merge-ready records.
///
/// The `ROOT_QUERY` record comes first, followed by one record per distinct
/// entity. Repeated occurrences of an entity are merged field-wise.
pub fn normalize(
    result: &Value,
    selection: &Selection,
    variables: &Variables,
) -> CacheResult<Vec<(EntityKey, NormalizedRecord)>> {
    let obj = result
        .as_object()
        .ok_or_else(|| CacheError::Normalization("query result must be an object".into()))?;

    let mut entities: BTreeMap<EntityKey, NormalizedRecord> = BTreeMap::new();
    let root = normalize_fields(obj, Some(selection), variables, &mut entities)?;

    let mut batch = Vec::with_capacity(entities.len() + 1);
    batch.push((EntityKey::root_query(), root));
    batch.extend(entities);
    Ok(batch)
}

fn normalize_fields(
    obj: &Map<String, Value>,
    selection: Option<&Selection>,
    variables: &Variables,
    entities: &mut BTreeMap<EntityKey, NormalizedRecord>,
) -> CacheResult<NormalizedRecord> {
    let mut record = NormalizedRecord::new();
    for (response_key, value) in obj {
        let field = selection.and_then(|s| s.find(response_key));
        let storage_key = field
            .map(|f| f.storage_key(variables))
            .unwrap_or_else(|| response_key.clone());
        let sub = field.and_then(|f| f.selection.as_ref());
        record.insert(storage_key, normalize_value(value, sub, variables, entities)?);
    }
    Ok(record)
}

fn normalize_value(
    value: &Value,
    selection: Option<&Selection>,
    variables: &Variables,
    entities: &mut BTreeMap<EntityKey, NormalizedRecord>,
) -> CacheResult<FieldValue> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| normalize_value(item, selection, variables, entities))
            .collect::<CacheResult<Vec<_>>>()
            .map(FieldValue::List),
        Value::Object(map) => {
            let fields = normalize_fields(map, selection, variables, entities)?;
            match identify(map)? {
                Some(key) => {
                    let entry = entities.entry(key.clone()).or_default();
                    for (name, v) in fields {
                        entry.insert(name, v);
                    }
                    Ok(FieldValue::Reference(key))
                }
                None => Ok(FieldValue::Object(fields.into_iter().collect())),
            }
        }
        scalar => Ok(FieldValue::Scalar(scalar.clone())),
    }
}

/// Derives the entity key of a result object, if it has one.
pub fn identify(obj: &Map<String, Value>) -> CacheResult<Option<EntityKey>> {
    let Some(typename) = obj.get(TYPENAME_FIELD).and_then(Value::as_str) else {
        return Ok(None);
    };
    let id = match obj.get("id").or_else(|| obj.get("_id")) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Ok(None),
    };
    Ok(Some(EntityKey::try_new(typename, id)?))
}

/// Field access shared by records and inline objects.
trait FieldSource {
    fn field(&self, name: &str) -> Option<&FieldValue>;
}

impl FieldSource for NormalizedRecord {
    fn field(&self, name: &str) -> Option<&FieldValue> {
        self.get(name)
    }
}

impl FieldSource for BTreeMap<String, FieldValue> {
    fn field(&self, name: &str) -> Option<&FieldValue> {
        self.get(name)
    }
}

/// Reconstructs a query result from the store.
///
/// Returns `None` if any selected field is missing or any record touched
/// was written longer ago than `max_age`.
pub fn read(
    store: &NormalizedStore,
    selection: &Selection,
    variables: &Variables,
    max_age: Option<Duration>,
) -> Option<Value> {
    let reader = Reader {
        store,
        variables,
        max_age,
    };
    reader.record(&EntityKey::root_query(), selection)
}

struct Reader<'a> {
    store: &'a NormalizedStore,
    variables: &'a Variables,
    max_age: Option<Duration>,
}

impl Reader<'_> {
    fn record(&self, key: &EntityKey, selection: &Selection) -> Option<Value> {
        if !self.store.is_fresh(key, self.max_age) {
            return None;
        }
        let record = self.store.get(key)?;
        self.fields(record, selection).map(Value::Object)
    }

    fn fields(&self, source: &impl FieldSource, selection: &Selection) -> Option<Map<String, Value>> {
        let mut out = Map::new();
        for field in selection.fields() {
            let stored = source.field(&field.storage_key(self.variables))?;
            let value = self.value(stored, field.selection.as_ref())?;
            out.insert(field.response_key().to_string(), value);
        }
        Some(out)
    }

    fn value(&self, stored: &FieldValue, selection: Option<&Selection>) -> Option<Value> {
        match (stored, selection) {
            (FieldValue::Reference(key), Some(sel)) => self.record(key, sel),
            (FieldValue::Object(fields), Some(sel)) => self.fields(fields, sel).map(Value::Object),
            (FieldValue::List(items), sel) => items
                .iter()
                .map(|item| self.value(item, sel))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            (other, _) => Some(other.to_json()),
        }
    }
}
