use crate::{
    cache::Cache,
    exchange::{
        Exchange, ExchangeFactory, ExchangeResult, Operation, OperationResult, OperationType
    },
    DebugInfo, RequestPolicy, Response, ResultSource
};
use serde_json::Value;
use std::sync::Arc;

/// The default cache exchange.
///
/// Query results are cached by operation key and all of them are dropped as soon as any
/// mutation goes through. `@client` queries and `CacheOnly` requests are answered from the
/// [`Cache`](../cache/trait.Cache.html) and never forwarded.
pub struct CacheExchange {
    cache: Arc<dyn Cache>
}

impl CacheExchange {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        CacheExchange { cache }
    }
}

impl<TNext: Exchange> ExchangeFactory<TNext> for CacheExchange {
    type Output = CacheExchangeImpl<TNext>;

    fn build(self, next: TNext) -> Self::Output {
        CacheExchangeImpl {
            cache: self.cache,
            next
        }
    }
}

pub struct CacheExchangeImpl<TNext: Exchange> {
    cache: Arc<dyn Cache>,
    next: TNext
}

fn cached_result(operation: Operation, data: Option<Value>) -> OperationResult {
    OperationResult {
        key: operation.key,
        meta: operation.meta,
        response: Response {
            debug_info: Some(DebugInfo {
                source: ResultSource::Cache,
                did_dedup: false
            }),
            data,
            ..Response::default()
        }
    }
}

impl<TNext: Exchange> CacheExchangeImpl<TNext> {
    /// Roots are stored by field name only, so they can only answer operations without
    /// variables.
    fn read_cached(&self, operation: &Operation) -> Option<Value> {
        self.cache.read_result(operation.key).or_else(|| {
            if operation.query.variables.is_empty() {
                self.cache.read_query(&operation.meta.selection)
            } else {
                None
            }
        })
    }

    fn after_query(&self, operation_result: OperationResult) -> OperationResult {
        if operation_result.response.has_errors() {
            return operation_result;
        }
        if let Some(ref data) = operation_result.response.data {
            self.cache.write_result(operation_result.key, data.clone());
            if let Err(e) = self.cache.write_query(data) {
                tracing::warn!(error = %e, "failed to normalize query result");
            }
        }
        operation_result
    }

    fn after_mutation(&self, operation_result: OperationResult) -> OperationResult {
        if operation_result.response.data.is_some() {
            tracing::debug!(
                mutation = %operation_result.meta.operation_name,
                "invalidating cached query results"
            );
            self.cache.invalidate_results();
        }
        operation_result
    }
}

#[async_trait]
impl<TNext: Exchange> Exchange for CacheExchangeImpl<TNext> {
    async fn run(&self, operation: Operation) -> ExchangeResult {
        if operation.meta.client_only {
            let data = self.cache.read_query(&operation.meta.selection.plain());
            return Ok(cached_result(operation, data));
        }

        match (operation.meta.operation_type, operation.options.request_policy) {
            (OperationType::Mutation, _) => {
                let res = self.next.run(operation).await?;
                Ok(self.after_mutation(res))
            }
            (OperationType::Query, RequestPolicy::NetworkOnly) => {
                let res = self.next.run(operation).await?;
                Ok(self.after_query(res))
            }
            (OperationType::Query, RequestPolicy::CacheOnly) => {
                let data = self.read_cached(&operation);
                Ok(cached_result(operation, data))
            }
            (OperationType::Query, _) => {
                if let Some(data) = self.read_cached(&operation) {
                    tracing::trace!(key = operation.key, "cache hit");
                    return Ok(cached_result(operation, Some(data)));
                }
                let res = self.next.run(operation).await?;
                Ok(self.after_query(res))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::InMemoryCache,
        output_params::{field, object, OutputParams},
        query::{make_client_query, make_mutation, make_query, InputTypeMapper},
        ClientBuilder
    };
    use serde_json::{json, Map};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetch {
        calls: Arc<AtomicUsize>
    }

    impl<TNext: Exchange> ExchangeFactory<TNext> for CountingFetch {
        type Output = CountingFetch;

        fn build(self, _next: TNext) -> CountingFetch {
            self
        }
    }

    #[async_trait]
    impl Exchange for CountingFetch {
        async fn run(&self, operation: Operation) -> ExchangeResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let data = match operation.meta.operation_type {
                OperationType::Query => json!({"regions": [{"id": 1, "__typename": "RegionType", "key": "earth"}]}),
                OperationType::Mutation => json!({"createRegion": {"region": {"id": 2}}})
            };
            Ok(OperationResult {
                key: operation.key,
                meta: operation.meta,
                response: Response {
                    data: Some(data),
                    ..Response::default()
                }
            })
        }
    }

    fn regions_params() -> OutputParams {
        OutputParams(vec![field("id"), field("__typename"), field("key")])
    }

    #[tokio::test]
    async fn caches_queries_until_a_mutation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());
        let client = ClientBuilder::new("http://localhost:8008/graphql/")
            .with_cache(cache.clone())
            .with_exchange(CountingFetch { calls: calls.clone() })
            .with_exchange(CacheExchange::new(cache))
            .build();

        let regions = make_query("regions", &InputTypeMapper::new(), &regions_params(), &Map::new()).unwrap();
        let first = client.query(&regions, Map::new()).await.unwrap();
        let second = client.query(&regions, Map::new()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.data, second.data);
        assert_eq!(second.debug_info.map(|info| info.source), Some(ResultSource::Cache));

        let mut mapper = InputTypeMapper::new();
        mapper.insert("data".to_string(), "CreateRegionInputType".to_string());
        let create = make_mutation(
            "createRegion",
            &mapper,
            &OutputParams(vec![object("region", vec![field("id")])]),
            json!({"data": {"key": "mars"}}).as_object().unwrap()
        )
        .unwrap();
        client
            .query(&create, json!({"data": {"key": "mars"}}).as_object().cloned().unwrap())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // The result was invalidated, but the roots still answer a query without variables
        let third = client.query(&regions, Map::new()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(third.data, first.data);
    }

    #[tokio::test]
    async fn client_queries_never_leave_the_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());
        cache
            .write_query(&json!({"networkStatus": {"__typename": "NetworkStatus", "isConnected": false}}))
            .unwrap();
        let client = ClientBuilder::new("http://localhost:8008/graphql/")
            .with_cache(cache.clone())
            .with_exchange(CountingFetch { calls: calls.clone() })
            .with_exchange(CacheExchange::new(cache))
            .build();

        let network_status = make_client_query(
            "networkStatus",
            &InputTypeMapper::new(),
            &OutputParams(vec![field("isConnected")]),
            &Map::new()
        )
        .unwrap();
        let response = client.query(&network_status, Map::new()).await.unwrap();

        assert_eq!(response.data, Some(json!({"networkStatus": {"isConnected": false}})));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
