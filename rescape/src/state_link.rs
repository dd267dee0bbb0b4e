//! Client-only state.
//!
//! Fields marked `@client` never reach the server. They are written straight into the
//! [`Cache`](../cache/trait.Cache.html), either as root fields or merged into a normalized
//! entity, and read back when a server response needs them. Writes are synchronous, so a read
//! issued right after a write sees it.
//!
//! Local mutations are answered by resolvers, installed in the exchange chain with
//! [`StateLinkExchange`](struct.StateLinkExchange.html).

use crate::{
    cache::{entity_key, Cache},
    exchange::{Exchange, ExchangeFactory, ExchangeResult, Operation, OperationResult, OperationType},
    output_params::{OutputParam, OutputParams},
    utils::{req_path, TYPENAME},
    DebugInfo, Error, Response, Result, ResultSource
};
use fnv::FnvHashMap;
use serde_json::{json, Map, Value};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc
};

/// Where client-only data lives.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheTarget {
    /// A root field, overwritten as a whole
    Root(String),
    /// A normalized entity, read-modify-written as a fragment
    Entity { typename: String, id: Value }
}

impl CacheTarget {
    pub fn root<S: Into<String>>(field: S) -> Self {
        CacheTarget::Root(field.into())
    }

    pub fn entity<S: Into<String>>(typename: S, id: Value) -> Self {
        CacheTarget::Entity {
            typename: typename.into(),
            id
        }
    }

    /// The target for an object that carries its own `__typename` and `id`.
    pub fn of(object: &Value) -> Result<Self> {
        let typename = req_path(TYPENAME, object)?
            .as_str()
            .ok_or_else(|| Error::MissingRequiredPath(TYPENAME.to_string()))?;
        Ok(CacheTarget::entity(typename, req_path("id", object)?.clone()))
    }

    fn entity_key(typename: &str, id: &Value) -> Result<String> {
        entity_key(typename, id).ok_or_else(|| Error::MissingRequiredPath("id".to_string()))
    }
}

pub fn write_client_only_fields(cache: &dyn Cache, target: &CacheTarget, data: &Value) -> Result<()> {
    match target {
        CacheTarget::Root(field) => {
            let mut root = Map::new();
            root.insert(field.clone(), data.clone());
            cache.write_query(&Value::Object(root))
        }
        CacheTarget::Entity { typename, id } => {
            cache.write_fragment(&CacheTarget::entity_key(typename, id)?, data)
        }
    }
}

/// Reads back what was written for `target`, projected through `selection`. An empty
/// selection reads a root field as is.
pub fn read_client_only_fields(
    cache: &dyn Cache,
    target: &CacheTarget,
    selection: &OutputParams
) -> Option<Value> {
    match target {
        CacheTarget::Root(field) => {
            let param = if selection.is_empty() {
                OutputParam::Field(field.clone())
            } else {
                OutputParam::Object(field.clone(), selection.clone())
            };
            cache
                .read_query(&OutputParams(vec![param]))
                .and_then(|mut data| data.as_object_mut().and_then(|data| data.remove(field)))
        }
        CacheTarget::Entity { typename, id } => {
            let key = entity_key(typename, id)?;
            cache.read_fragment(&key, selection)
        }
    }
}

/// Merges cached `@client` fields into a server response.
///
/// Walks `data` along `selection`. Wherever the selection asks for client fields, they are
/// read from the nearest enclosing entity (`__typename` plus `id`), following the path from
/// that entity down to the current object. Fields missing from the cache are left out.
pub fn reconcile_client_fields(cache: &dyn Cache, selection: &OutputParams, data: &mut Value) {
    reconcile(cache, selection, data, None);
}

/// The entity a nested object belongs to and the fields leading from it to the object.
#[derive(Clone)]
struct Owner {
    key: String,
    path: Vec<String>
}

impl Owner {
    fn child(&self, field: &str) -> Owner {
        let mut path = self.path.clone();
        path.push(field.to_string());
        Owner {
            key: self.key.clone(),
            path
        }
    }

    fn read(&self, cache: &dyn Cache, param: &OutputParam) -> Option<Value> {
        let selection = self
            .path
            .iter()
            .rev()
            .fold(OutputParams(vec![param.clone()]), |inner, field| {
                OutputParams(vec![OutputParam::Object(field.clone(), inner)])
            });
        let mut value = cache.read_fragment(&self.key, &selection)?;
        for field in self.path.iter().map(String::as_str).chain(std::iter::once(param.name())) {
            value = value.as_object_mut()?.remove(field)?;
        }
        Some(value)
    }
}

fn reconcile(cache: &dyn Cache, selection: &OutputParams, data: &mut Value, owner: Option<&Owner>) {
    match data {
        Value::Array(items) => {
            for item in items {
                // Items without their own key can't be addressed inside the parent entity
                reconcile(cache, selection, item, None);
            }
        }
        Value::Object(object) => {
            let current = object
                .get(TYPENAME)
                .and_then(Value::as_str)
                .zip(object.get("id"))
                .and_then(|(typename, id)| entity_key(typename, id))
                .map(|key| Owner { key, path: Vec::new() })
                .or_else(|| owner.cloned());

            if let Some(ref current) = current {
                for param in selection.client_fields().iter() {
                    if let Some(cached) = current.read(cache, param) {
                        object.insert(param.name().to_string(), cached);
                    }
                }
            }
            for param in selection.iter().filter(|param| !param.is_client()) {
                if let (Some(children), Some(child)) = (param.children(), object.get_mut(param.name())) {
                    let child_owner = current.as_ref().map(|current| current.child(param.name()));
                    reconcile(cache, children, child, child_owner.as_ref());
                }
            }
        }
        _ => {}
    }
}

/// A local mutation: receives the cache and the mutation's variables.
pub type StateLinkResolver = Arc<dyn Fn(&dyn Cache, &Map<String, Value>) -> Result<Value> + Send + Sync>;
pub type StateLinkResolvers = FnvHashMap<String, StateLinkResolver>;

static NEXT_TODO_ID: AtomicU64 = AtomicU64::new(1);

/// Overwrites the `networkStatus` root.
pub fn update_network_status(cache: &dyn Cache, variables: &Map<String, Value>) -> Result<Value> {
    let is_connected = variables
        .get("isConnected")
        .cloned()
        .ok_or_else(|| Error::MissingRequiredPath("isConnected".to_string()))?;
    write_client_only_fields(
        cache,
        &CacheTarget::root("networkStatus"),
        &json!({
            TYPENAME: "NetworkStatus",
            "isConnected": is_connected
        })
    )?;
    Ok(Value::Null)
}

fn todo_selection() -> OutputParams {
    OutputParams(
        ["id", "text", "completed", TYPENAME]
            .iter()
            .map(|name| OutputParam::Field(name.to_string()))
            .collect()
    )
}

/// Appends a todo to the `todos` root. Ids come from a process-wide counter.
pub fn add_todo(cache: &dyn Cache, variables: &Map<String, Value>) -> Result<Value> {
    let text = variables
        .get("text")
        .cloned()
        .ok_or_else(|| Error::MissingRequiredPath("text".to_string()))?;
    let mut todos = match read_client_only_fields(cache, &CacheTarget::root("todos"), &todo_selection()) {
        Some(Value::Array(todos)) => todos,
        _ => Vec::new()
    };
    let todo = json!({
        "id": NEXT_TODO_ID.fetch_add(1, Ordering::SeqCst),
        "text": text,
        "completed": false,
        TYPENAME: "TodoItem"
    });
    todos.push(todo.clone());
    write_client_only_fields(cache, &CacheTarget::root("todos"), &Value::Array(todos))?;
    Ok(todo)
}

/// Flips `completed` on one `TodoItem`.
pub fn toggle_todo(cache: &dyn Cache, variables: &Map<String, Value>) -> Result<Value> {
    let id = variables
        .get("id")
        .cloned()
        .ok_or_else(|| Error::MissingRequiredPath("id".to_string()))?;
    let target = CacheTarget::entity("TodoItem", id);
    let selection = OutputParams(vec![OutputParam::Field("completed".to_string())]);
    let todo = read_client_only_fields(cache, &target, &selection).unwrap_or(Value::Null);
    let completed = req_path("completed", &todo)?.as_bool().unwrap_or(false);

    write_client_only_fields(cache, &target, &json!({ "completed": !completed }))?;
    Ok(Value::Null)
}

pub fn default_state_link_resolvers() -> StateLinkResolvers {
    let mut resolvers = StateLinkResolvers::default();
    resolvers.insert("updateNetworkStatus".to_string(), Arc::new(update_network_status));
    resolvers.insert("addTodo".to_string(), Arc::new(add_todo));
    resolvers.insert("toggleTodo".to_string(), Arc::new(toggle_todo));
    resolvers
}

fn tag_with_keys(value: &mut Value) {
    if let Value::Object(object) = value {
        for (key, child) in object.iter_mut() {
            if let Value::Object(child_object) = child {
                if !child_object.contains_key(TYPENAME) {
                    child_object.insert(TYPENAME.to_string(), Value::String(key.clone()));
                }
            }
            tag_with_keys(child);
        }
    }
}

/// The initial client-side state for an application config.
///
/// Every nested object without a `__typename` is tagged with its own key, and the
/// `networkStatus` and `todos` roots are added.
pub fn create_state_link_defaults(config: &Value) -> Value {
    let mut defaults = match config {
        Value::Object(config) => config.clone(),
        _ => Map::new()
    };
    defaults.insert(
        "networkStatus".to_string(),
        json!({TYPENAME: "NetworkStatus", "isConnected": false})
    );
    defaults.insert("todos".to_string(), json!([]));

    let mut defaults = Value::Object(defaults);
    tag_with_keys(&mut defaults);
    defaults
}

/// Answers mutations that have a local resolver. Everything else is forwarded.
pub struct StateLinkExchange {
    cache: Arc<dyn Cache>,
    resolvers: StateLinkResolvers
}

impl StateLinkExchange {
    pub fn new(cache: Arc<dyn Cache>, resolvers: StateLinkResolvers) -> Self {
        StateLinkExchange { cache, resolvers }
    }
}

pub struct StateLinkExchangeImpl<TNext: Exchange> {
    cache: Arc<dyn Cache>,
    resolvers: StateLinkResolvers,
    next: TNext
}

impl<TNext: Exchange> ExchangeFactory<TNext> for StateLinkExchange {
    type Output = StateLinkExchangeImpl<TNext>;

    fn build(self, next: TNext) -> Self::Output {
        StateLinkExchangeImpl {
            cache: self.cache,
            resolvers: self.resolvers,
            next
        }
    }
}

#[async_trait]
impl<TNext: Exchange> Exchange for StateLinkExchangeImpl<TNext> {
    async fn run(&self, operation: Operation) -> ExchangeResult {
        let resolver = match operation.meta.operation_type {
            OperationType::Mutation => self.resolvers.get(&*operation.meta.operation_name),
            OperationType::Query => None
        };
        let resolver = match resolver {
            Some(resolver) => resolver.clone(),
            None => return self.next.run(operation).await
        };

        let result = resolver(self.cache.as_ref(), &operation.query.variables)?;
        let mut data = Map::new();
        data.insert(operation.meta.operation_name.to_string(), result);
        // Local writes make any cached operation result stale
        self.cache.invalidate_results();

        Ok(OperationResult {
            key: operation.key,
            meta: operation.meta,
            response: Response {
                debug_info: Some(DebugInfo {
                    source: ResultSource::Cache,
                    did_dedup: false
                }),
                data: Some(Value::Object(data)),
                ..Response::default()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::InMemoryCache,
        output_params::{client, field, object}
    };

    fn vars(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn todo_ids_increase() {
        let cache = InMemoryCache::new();
        let first = add_todo(&cache, &vars(json!({"text": "Buy gas"}))).unwrap();
        let second = add_todo(&cache, &vars(json!({"text": "Plant trees"}))).unwrap();

        let first_id = first["id"].as_u64().unwrap();
        let second_id = second["id"].as_u64().unwrap();
        assert!(first_id >= 1);
        assert!(second_id > first_id);

        let todos = read_client_only_fields(&cache, &CacheTarget::root("todos"), &todo_selection()).unwrap();
        assert_eq!(todos.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn toggle_todo_flips_completed() {
        let cache = InMemoryCache::new();
        let todo = add_todo(&cache, &vars(json!({"text": "Walk"}))).unwrap();
        let id = todo["id"].clone();

        toggle_todo(&cache, &vars(json!({ "id": id.clone() }))).unwrap();
        let completed = OutputParams(vec![field("completed")]);
        assert_eq!(
            read_client_only_fields(&cache, &CacheTarget::entity("TodoItem", id), &completed),
            Some(json!({"completed": true}))
        );

        assert_eq!(
            toggle_todo(&cache, &vars(json!({"id": 0}))),
            Err(Error::MissingRequiredPath("completed".to_string()))
        );
    }

    #[test]
    fn network_status_is_a_root_overwrite() {
        let cache = InMemoryCache::new();
        update_network_status(&cache, &vars(json!({"isConnected": true}))).unwrap();
        update_network_status(&cache, &vars(json!({"isConnected": false}))).unwrap();

        assert_eq!(
            read_client_only_fields(
                &cache,
                &CacheTarget::root("networkStatus"),
                &OutputParams(vec![field("isConnected")])
            ),
            Some(json!({"isConnected": false}))
        );
    }

    #[test]
    fn defaults_are_tagged() {
        let defaults = create_state_link_defaults(&json!({
            "settings": {"mapbox": {"viewport": {"zoom": 3}}}
        }));

        assert_eq!(
            defaults,
            json!({
                "settings": {
                    "mapbox": {"viewport": {"zoom": 3, TYPENAME: "viewport"}, TYPENAME: "mapbox"},
                    TYPENAME: "settings"
                },
                "networkStatus": {TYPENAME: "NetworkStatus", "isConnected": false},
                "todos": []
            })
        );
    }

    #[test]
    fn reconciles_entity_fields_into_responses() {
        let cache = InMemoryCache::new();
        write_client_only_fields(
            &cache,
            &CacheTarget::entity("SettingsType", json!(1)),
            &json!({"testAuthorization": {"username": "test", "password": "testpass"}})
        )
        .unwrap();

        let selection = OutputParams(vec![object(
            "settings",
            vec![
                field("id"),
                field("key"),
                client("testAuthorization", vec![field("username")])
            ]
        )]);
        let mut data = json!({
            "settings": [
                {"id": 1, "key": "default", TYPENAME: "SettingsType"},
                {"id": 2, "key": "other", TYPENAME: "SettingsType"}
            ]
        });
        reconcile_client_fields(&cache, &selection, &mut data);

        assert_eq!(
            data,
            json!({
                "settings": [
                    {"id": 1, "key": "default", TYPENAME: "SettingsType", "testAuthorization": {"username": "test"}},
                    {"id": 2, "key": "other", TYPENAME: "SettingsType"}
                ]
            })
        );
    }
}
