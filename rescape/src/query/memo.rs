use super::{render, Document, InputTypeMapper, QueryMode};
use crate::{output_params::OutputParams, Result};
use fnv::FnvHashMap;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::VecDeque;

/// Decides how many documents to drop once the cache has grown.
pub trait EvictionPolicy: Send + Sync + 'static {
    /// Called after every insert with the new number of entries. Returns how many of the
    /// oldest entries should be evicted.
    fn overflow(&self, len: usize) -> usize;
}

/// Never evicts anything. Query shapes in an application are finite, so this is the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl EvictionPolicy for Unbounded {
    fn overflow(&self, _len: usize) -> usize {
        0
    }
}

/// Keeps at most `n` documents, evicting the oldest first.
#[derive(Debug, Clone, Copy)]
pub struct MaxEntries(pub usize);

impl EvictionPolicy for MaxEntries {
    fn overflow(&self, len: usize) -> usize {
        len.saturating_sub(self.0)
    }
}

#[derive(Default)]
struct Entries {
    documents: FnvHashMap<Vec<u8>, Document>,
    order: VecDeque<Vec<u8>>
}

/// Memoizes synthesized documents by the structural identity of their inputs.
///
/// Two calls with deep-equal inputs get back the same `Arc<str>` source, which keeps
/// downstream caches keyed by document pointer happy.
pub struct DocumentCache {
    entries: Mutex<Entries>,
    policy: Box<dyn EvictionPolicy>
}

impl Default for DocumentCache {
    fn default() -> Self {
        DocumentCache::with_policy(Unbounded)
    }
}

lazy_static! {
    static ref DOCUMENTS: DocumentCache = DocumentCache::default();
}

/// The process-wide cache used by [`synthesize`](../fn.synthesize.html).
pub fn document_cache() -> &'static DocumentCache {
    &DOCUMENTS
}

#[derive(Serialize)]
struct CacheKey<'a> {
    mode: QueryMode,
    name: &'a str,
    mapper: &'a InputTypeMapper,
    output_params: &'a OutputParams,
    arguments: &'a Map<String, Value>
}

impl DocumentCache {
    pub fn with_policy<P: EvictionPolicy>(policy: P) -> Self {
        DocumentCache {
            entries: Mutex::new(Entries::default()),
            policy: Box::new(policy)
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every memoized document.
    pub fn reset(&self) {
        let mut entries = self.entries.lock();
        entries.documents.clear();
        entries.order.clear();
    }

    /// Returns the memoized document for these inputs, rendering it on a miss.
    pub fn synthesize(
        &self,
        mode: QueryMode,
        name: &str,
        mapper: &InputTypeMapper,
        output_params: &OutputParams,
        arguments: &Map<String, Value>
    ) -> Result<Document> {
        // The JSON encoding keeps `0`, `0.0`, `""` and `[]` apart
        let key = serde_json::to_vec(&CacheKey {
            mode,
            name,
            mapper,
            output_params,
            arguments
        });
        let key = match key {
            Ok(key) => key,
            // Unkeyable inputs are still valid, they just don't get memoized
            Err(_) => return render(mode, name, mapper, output_params, arguments)
        };

        self.get_or_try_insert_with(key, || render(mode, name, mapper, output_params, arguments))
    }

    fn get_or_try_insert_with<F>(&self, key: Vec<u8>, render: F) -> Result<Document>
    where
        F: FnOnce() -> Result<Document>
    {
        if let Some(document) = self.entries.lock().documents.get(&key) {
            tracing::trace!(operation = %document.operation_name(), "document cache hit");
            return Ok(document.clone());
        }

        let document = render()?;

        let mut entries = self.entries.lock();
        // Somebody else may have rendered the same document while we weren't holding the lock.
        if let Some(existing) = entries.documents.get(&key) {
            return Ok(existing.clone());
        }
        entries.documents.insert(key.clone(), document.clone());
        entries.order.push_back(key);

        let overflow = self.policy.overflow(entries.documents.len());
        for _ in 0..overflow {
            if let Some(oldest) = entries.order.pop_front() {
                entries.documents.remove(&oldest);
            }
        }

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output_params::field;
    use serde_json::json;
    use std::sync::Arc;

    fn arguments(key: &str) -> Map<String, Value> {
        json!({ "key": key }).as_object().cloned().unwrap()
    }

    #[test]
    fn deep_equal_inputs_share_the_source() {
        let cache = DocumentCache::default();
        let params = OutputParams(vec![field("id"), field("key")]);

        let first = cache
            .synthesize(QueryMode::Query, "regions", &InputTypeMapper::new(), &params, &arguments("earth"))
            .unwrap();
        let second = cache
            .synthesize(
                QueryMode::Query,
                "regions",
                &InputTypeMapper::new(),
                &params.clone(),
                &arguments("earth")
            )
            .unwrap();

        assert!(Arc::ptr_eq(&first.source, &second.source));
        assert_eq!(cache.len(), 1);

        let other = cache
            .synthesize(QueryMode::Query, "regions", &InputTypeMapper::new(), &params, &arguments("mars"))
            .unwrap();
        assert!(!Arc::ptr_eq(&first.source, &other.source));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn max_entries_evicts_oldest() {
        let cache = DocumentCache::with_policy(MaxEntries(2));
        let params = OutputParams(vec![field("id")]);
        let mapper = InputTypeMapper::new();

        let earth = cache
            .synthesize(QueryMode::Query, "regions", &mapper, &params, &arguments("earth"))
            .unwrap();
        cache
            .synthesize(QueryMode::Query, "regions", &mapper, &params, &arguments("mars"))
            .unwrap();
        cache
            .synthesize(QueryMode::Query, "regions", &mapper, &params, &arguments("venus"))
            .unwrap();
        assert_eq!(cache.len(), 2);

        let earth_again = cache
            .synthesize(QueryMode::Query, "regions", &mapper, &params, &arguments("earth"))
            .unwrap();
        assert_eq!(earth.source, earth_again.source);
        assert!(!Arc::ptr_eq(&earth.source, &earth_again.source));
    }

    #[test]
    fn reset_clears_entries_and_errors_are_not_cached() {
        let cache = DocumentCache::default();
        let mapper = InputTypeMapper::new();

        assert!(cache
            .synthesize(QueryMode::Query, "regions", &mapper, &OutputParams::default(), &arguments("earth"))
            .is_err());
        assert!(cache.is_empty());

        cache
            .synthesize(QueryMode::Query, "regions", &mapper, &OutputParams(vec![field("id")]), &Map::new())
            .unwrap();
        assert_eq!(cache.len(), 1);
        cache.reset();
        assert!(cache.is_empty());
    }

    #[test]
    fn values_of_different_types_get_their_own_documents() {
        let cache = DocumentCache::default();
        let mapper = InputTypeMapper::new();
        let params = OutputParams(vec![field("id")]);
        let name = |value: Value| json!({ "name": value }).as_object().cloned().unwrap();

        let int = cache
            .synthesize(QueryMode::Query, "regions", &mapper, &params, &name(json!(0)))
            .unwrap();
        assert!(int.source().starts_with("query regions($name: Int!)"));

        let string = cache
            .synthesize(QueryMode::Query, "regions", &mapper, &params, &name(json!("")))
            .unwrap();
        assert!(string.source().starts_with("query regions($name: String!)"));

        let float = cache
            .synthesize(QueryMode::Query, "regions", &mapper, &params, &name(json!(0.0)))
            .unwrap();
        assert!(float.source().starts_with("query regions($name: Float!)"));

        assert_eq!(
            cache.synthesize(QueryMode::Query, "regions", &mapper, &params, &name(json!([]))),
            Err(crate::Error::UnresolvedInputType("name".to_string()))
        );
        assert_eq!(cache.len(), 3);
    }
}
