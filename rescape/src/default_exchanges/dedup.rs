use crate::{
    exchange::{Exchange, ExchangeFactory, ExchangeResult, Operation, OperationType},
    QueryError
};
use fnv::FnvHashMap;
use futures::channel::{oneshot, oneshot::Sender};
use parking_lot::Mutex;
use thiserror::Error;

type InFlightCache = Mutex<FnvHashMap<u64, Vec<Sender<ExchangeResult>>>>;

/// The default deduplication exchange.
///
/// This will keep track of in-flight queries and catch any identical queries before they execute,
/// instead waiting for the result from the in-flight query
pub struct DedupExchange;
pub struct DedupExchangeImpl<TNext: Exchange> {
    next: TNext,
    in_flight_operations: InFlightCache
}

impl<TNext: Exchange> ExchangeFactory<TNext> for DedupExchange {
    type Output = DedupExchangeImpl<TNext>;

    fn build(self, next: TNext) -> Self::Output {
        DedupExchangeImpl {
            next,
            in_flight_operations: InFlightCache::default()
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("the in-flight operation this request was waiting on was dropped")]
pub struct DedupError;

fn should_skip(operation: &Operation) -> bool {
    operation.meta.operation_type != OperationType::Query || operation.meta.client_only
}

fn make_deduped_result(res: &ExchangeResult) -> ExchangeResult {
    match res {
        Ok(res) => {
            let mut res = res.clone();
            if let Some(ref mut debug_info) = res.response.debug_info {
                debug_info.did_dedup = true;
            }
            Ok(res)
        }
        Err(e) => Err(e.clone())
    }
}

impl<TNext: Exchange> DedupExchangeImpl<TNext> {
    fn notify_listeners(&self, key: u64, res: &ExchangeResult) {
        let to_be_notified = self.in_flight_operations.lock().remove(&key);
        for sender in to_be_notified.into_iter().flatten() {
            // The listener may have been dropped, in which case nobody cares about the result
            let _ = sender.send(make_deduped_result(res));
        }
    }
}

#[async_trait]
impl<TNext: Exchange> Exchange for DedupExchangeImpl<TNext> {
    async fn run(&self, operation: Operation) -> ExchangeResult {
        if should_skip(&operation) {
            return self.next.run(operation).await;
        }

        let key = operation.key;
        let rcv = {
            let mut cache = self.in_flight_operations.lock();
            if let Some(listeners) = cache.get_mut(&key) {
                let (sender, receiver) = oneshot::channel();
                listeners.push(sender);
                Some(receiver)
            } else {
                cache.insert(key, Vec::new());
                None
            }
        };

        if let Some(rcv) = rcv {
            tracing::trace!(key, "waiting on in-flight operation");
            rcv.await.map_err(|_| QueryError::from(DedupError))?
        } else {
            let res = self.next.run(operation).await;
            self.notify_listeners(key, &res);
            res
        }
    }
}

#[cfg(test)]
mod test {
    use super::DedupExchangeImpl;
    use crate::{
        default_exchanges::DedupExchange,
        exchange::{Exchange, ExchangeFactory, ExchangeResult, Operation, OperationResult},
        output_params::{field, OutputParams},
        query::{make_query, InputTypeMapper},
        ClientBuilder, DebugInfo, QueryOptions, Response, ResultSource
    };
    use lazy_static::lazy_static;
    use serde_json::{json, Map};
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration
    };
    use tokio::time::sleep;

    lazy_static! {
        static ref EXCHANGE: DedupExchangeImpl<FakeFetchExchange> =
            DedupExchange.build(FakeFetchExchange::default());
    }

    #[derive(Default)]
    struct FakeFetchExchange {
        calls: AtomicUsize
    }

    #[async_trait]
    impl Exchange for FakeFetchExchange {
        async fn run(&self, operation: Operation) -> ExchangeResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            sleep(Duration::from_millis(10)).await;
            Ok(OperationResult {
                key: operation.key,
                meta: operation.meta,
                response: Response {
                    debug_info: Some(DebugInfo {
                        source: ResultSource::Network,
                        did_dedup: false
                    }),
                    data: Some(json!({"regions": []})),
                    ..Response::default()
                }
            })
        }
    }

    fn make_operation() -> Operation {
        let document = make_query(
            "regions",
            &InputTypeMapper::new(),
            &OutputParams(vec![field("id")]),
            json!({"key": "earth"}).as_object().unwrap()
        )
        .unwrap();
        let client = ClientBuilder::new("http://localhost:8008/graphql/").build();
        let variables: Map<_, _> = json!({"key": "earth"}).as_object().cloned().unwrap();
        client
            .0
            .create_request_operation(&document, variables, QueryOptions::default())
    }

    #[tokio::test]
    async fn test_dedup() {
        let fut1 = EXCHANGE.run(make_operation());
        let fut2 = EXCHANGE.run(make_operation());
        let join = tokio::spawn(async { fut1.await.unwrap() });
        let res2 = fut2.await.unwrap();
        let res1 = join.await.unwrap();

        // The order can vary depending on the executor state, so XOR them
        let did_1_dedup = res1.response.debug_info.unwrap().did_dedup;
        let did_2_dedup = res2.response.debug_info.unwrap().did_dedup;
        let did_one_dedup = did_1_dedup ^ did_2_dedup;

        assert_eq!(did_one_dedup, true);
        assert_eq!(EXCHANGE.next.calls.load(Ordering::SeqCst), 1);
    }
}
