//! The client-side cache.
//!
//! Root fields (`settings`, `networkStatus`, `todos`, ...) are stored under their own name and
//! overwritten wholesale. Any object carrying a `__typename` and an id is normalized into an
//! entity record keyed `Type:id`, so fragments on that key see writes made through queries and
//! the other way around.

use crate::{
    output_params::{OutputParam, OutputParams},
    utils::{merge_deep, TYPENAME},
    Error, Result
};
use fnv::FnvHashMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};

const REF: &str = "__ref";

/// The cache boundary used by the exchanges and the state link.
pub trait Cache: Send + Sync + 'static {
    /// Projects the stored root fields through `selection`. Any missing field is a miss.
    fn read_query(&self, selection: &OutputParams) -> Option<Value>;
    /// Overwrites the root fields present in `data`.
    fn write_query(&self, data: &Value) -> Result<()>;
    /// Projects the entity stored under `entity_key` through `selection`.
    fn read_fragment(&self, entity_key: &str, selection: &OutputParams) -> Option<Value>;
    /// Deep-merges `patch` into the entity stored under `entity_key`, creating it if needed.
    fn write_fragment(&self, entity_key: &str, patch: &Value) -> Result<()>;

    /// Reads a whole operation result.
    fn read_result(&self, key: u64) -> Option<Value>;
    fn write_result(&self, key: u64, data: Value);
    /// Drops every cached operation result. Entities and roots are kept.
    fn invalidate_results(&self);

    /// Clears everything.
    fn reset(&self);
}

pub fn is_root(typename: &str) -> bool {
    typename == "Query" || typename == "Mutation" || typename == "Subscription"
}

/// `Type:id`
pub fn entity_key(typename: &str, id: &Value) -> Option<String> {
    let id = match id {
        Value::String(id) => id.clone(),
        Value::Number(id) => id.to_string(),
        _ => return None
    };
    let mut key = String::with_capacity(typename.len() + id.len() + 1);
    key.push_str(typename);
    key.push(':');
    key.push_str(&id);
    Some(key)
}

/// The cache key of an entity, if it has one. Root types are keyed by their name.
pub fn key_of_entity(
    typename: &str,
    entity: &Map<String, Value>,
    custom_keys: &FnvHashMap<String, String>
) -> Option<String> {
    if is_root(typename) {
        return Some(typename.to_string());
    }

    let id = if let Some(custom_key) = custom_keys.get(typename) {
        entity.get(custom_key)
    } else {
        entity.get("id").or_else(|| entity.get("_id"))
    };

    id.and_then(|id| entity_key(typename, id))
}

#[derive(Default)]
struct Store {
    roots: FnvHashMap<String, Value>,
    entities: FnvHashMap<String, Map<String, Value>>,
    results: FnvHashMap<u64, Value>
}

/// The default [`Cache`](trait.Cache.html).
#[derive(Default)]
pub struct InMemoryCache {
    store: RwLock<Store>,
    custom_keys: FnvHashMap<String, String>
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a field other than `id` as the key of some types.
    pub fn with_custom_keys(custom_keys: FnvHashMap<String, String>) -> Self {
        InMemoryCache {
            store: RwLock::new(Store::default()),
            custom_keys
        }
    }

    /// The raw, normalized record for an entity. Mostly useful in tests.
    pub fn entity(&self, entity_key: &str) -> Option<Map<String, Value>> {
        self.store.read().entities.get(entity_key).cloned()
    }

    fn normalize(&self, store: &mut Store, value: &Value) -> Value {
        match value {
            Value::Object(object) => {
                let normalized: Map<String, Value> = object
                    .iter()
                    .map(|(field, child)| (field.clone(), self.normalize(store, child)))
                    .collect();
                let key = object
                    .get(TYPENAME)
                    .and_then(Value::as_str)
                    .filter(|typename| !is_root(typename))
                    .and_then(|typename| key_of_entity(typename, object, &self.custom_keys));
                match key {
                    Some(key) => {
                        // Merged rather than replaced so client-only fields written into
                        // the entity survive a refetch.
                        let record = store.entities.entry(key.clone()).or_default();
                        for (field, child) in normalized {
                            match record.get_mut(&field) {
                                Some(existing) => merge_deep(existing, child),
                                None => {
                                    record.insert(field, child);
                                }
                            }
                        }
                        reference(key)
                    }
                    None => Value::Object(normalized)
                }
            }
            Value::Array(items) => Value::Array(items.iter().map(|item| self.normalize(store, item)).collect()),
            other => other.clone()
        }
    }
}

fn reference(key: String) -> Value {
    let mut object = Map::new();
    object.insert(REF.to_string(), Value::String(key));
    Value::Object(object)
}

fn as_reference(value: &Value) -> Option<&str> {
    match value {
        Value::Object(object) if object.len() == 1 => object.get(REF).and_then(Value::as_str),
        _ => None
    }
}

fn resolve_all(store: &Store, value: &Value) -> Option<Value> {
    if let Some(key) = as_reference(value) {
        let record = store.entities.get(key)?;
        return resolve_all(store, &Value::Object(record.clone()));
    }
    match value {
        Value::Object(object) => object
            .iter()
            .map(|(field, child)| resolve_all(store, child).map(|child| (field.clone(), child)))
            .collect::<Option<Map<_, _>>>()
            .map(Value::Object),
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_all(store, item))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        other => Some(other.clone())
    }
}

fn project_object(store: &Store, object: &Map<String, Value>, selection: &OutputParams) -> Option<Value> {
    let mut projected = Map::new();
    for param in selection.iter() {
        let value = object.get(param.name())?;
        let value = match param.children() {
            Some(children) => project(store, value, children)?,
            None => resolve_all(store, value)?
        };
        projected.insert(param.name().to_string(), value);
    }
    Some(Value::Object(projected))
}

fn project(store: &Store, value: &Value, selection: &OutputParams) -> Option<Value> {
    if let Some(key) = as_reference(value) {
        let record = store.entities.get(key)?;
        return project_object(store, record, selection);
    }
    match value {
        Value::Object(object) => project_object(store, object, selection),
        Value::Array(items) => items
            .iter()
            .map(|item| project(store, item, selection))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        // A null object field is a valid answer, not a miss.
        Value::Null => Some(Value::Null),
        _ => None
    }
}

impl Cache for InMemoryCache {
    fn read_query(&self, selection: &OutputParams) -> Option<Value> {
        let store = self.store.read();
        let mut data = Map::new();
        for param in selection.iter() {
            let root = store.roots.get(param.name())?;
            let value = match param {
                OutputParam::Field(_) => resolve_all(&store, root)?,
                _ => match param.children() {
                    Some(children) => project(&store, root, children)?,
                    None => resolve_all(&store, root)?
                }
            };
            data.insert(param.name().to_string(), value);
        }
        Some(Value::Object(data))
    }

    fn write_query(&self, data: &Value) -> Result<()> {
        let fields = data
            .as_object()
            .ok_or_else(|| Error::InvalidCacheWrite(data.to_string()))?;
        let mut store = self.store.write();
        for (field, value) in fields {
            let normalized = self.normalize(&mut store, value);
            store.roots.insert(field.clone(), normalized);
        }
        Ok(())
    }

    fn read_fragment(&self, entity_key: &str, selection: &OutputParams) -> Option<Value> {
        let store = self.store.read();
        let record = store.entities.get(entity_key)?;
        project_object(&store, record, selection)
    }

    fn write_fragment(&self, entity_key: &str, patch: &Value) -> Result<()> {
        if !patch.is_object() {
            return Err(Error::InvalidCacheWrite(patch.to_string()));
        }
        let mut store = self.store.write();
        let normalized = match self.normalize(&mut store, patch) {
            // The patch itself was recognised as an entity. Its fields are already stored.
            reference if as_reference(&reference) == Some(entity_key) => return Ok(()),
            Value::Object(fields) => fields,
            _ => Map::new()
        };
        let record = store
            .entities
            .entry(entity_key.to_string())
            .or_default();
        let mut merged = Value::Object(std::mem::take(record));
        merge_deep(&mut merged, Value::Object(normalized));
        if let Value::Object(merged) = merged {
            *record = merged;
        }
        Ok(())
    }

    fn read_result(&self, key: u64) -> Option<Value> {
        self.store.read().results.get(&key).cloned()
    }

    fn write_result(&self, key: u64, data: Value) {
        self.store.write().results.insert(key, data);
    }

    fn invalidate_results(&self) {
        self.store.write().results.clear();
    }

    fn reset(&self) {
        *self.store.write() = Store::default();
    }
}
