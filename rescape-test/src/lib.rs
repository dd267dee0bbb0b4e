//! Test support for `rescape` and `rescape-stores`.
//!
//! [`MockExchange`](struct.MockExchange.html) stands in for the network. It is a terminal
//! exchange answering every operation from a scripted handler, so the rest of the chain
//! (dedup, cache, state link) runs for real.

mod samples;

pub use samples::*;

use parking_lot::Mutex;
use rescape::{
    exchange::{Exchange, ExchangeFactory, ExchangeResult, Operation, OperationResult},
    Client, ClientBuilder, DebugInfo, Response, ResultSource
};
use serde_json::{json, Value};
use std::sync::Arc;

pub const URL: &str = "http://localhost:8008/graphql/";

pub type SyncCounter = Arc<Mutex<Counter>>;

#[derive(Debug, Default)]
pub struct Counter {
    n: u32
}

impl Counter {
    pub fn new() -> Self {
        Counter { n: 0 }
    }

    pub fn sync() -> SyncCounter {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn inc(&mut self) {
        self.n += 1;
    }

    pub fn inc_sync(counter: &SyncCounter) {
        counter.lock().inc();
    }

    pub fn get_sync(counter: &SyncCounter) -> u32 {
        counter.lock().n
    }
}

impl PartialEq<u32> for Counter {
    fn eq(&self, other: &u32) -> bool {
        &self.n == other
    }
}

/// Produces the full response body (`{"data": ..., "errors": ...}`) for an operation.
pub type MockHandler = Arc<dyn Fn(&Operation) -> Value + Send + Sync>;

/// A scripted server.
#[derive(Clone)]
pub struct MockExchange {
    handler: MockHandler,
    counter: SyncCounter,
    operations: Arc<Mutex<Vec<Operation>>>
}

impl MockExchange {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Operation) -> Value + Send + Sync + 'static
    {
        MockExchange {
            handler: Arc::new(handler),
            counter: Counter::sync(),
            operations: Arc::new(Mutex::new(Vec::new()))
        }
    }

    /// Answers each operation with `{"data": {<operation name>: <value>}}`. Unknown operations
    /// get a GraphQL error.
    pub fn with_responses<S: Into<String>>(responses: Vec<(S, Value)>) -> Self {
        let responses: Vec<(String, Value)> = responses
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .collect();
        MockExchange::new(move |operation| {
            let name = &*operation.meta.operation_name;
            match responses.iter().find(|(candidate, _)| candidate == name) {
                Some((_, value)) => json!({ "data": { name: value } }),
                None => json!({
                    "data": null,
                    "errors": [{"message": format!("no mock for {}", name)}]
                })
            }
        })
    }

    /// How many operations reached the mock.
    pub fn counter(&self) -> SyncCounter {
        self.counter.clone()
    }

    pub fn calls(&self) -> u32 {
        Counter::get_sync(&self.counter)
    }

    /// Every operation that reached the mock, in order.
    pub fn operations(&self) -> Vec<Operation> {
        self.operations.lock().clone()
    }

    pub fn operation_names(&self) -> Vec<String> {
        self.operations
            .lock()
            .iter()
            .map(|operation| operation.meta.operation_name.to_string())
            .collect()
    }
}

pub struct MockExchangeImpl {
    exchange: MockExchange
}

impl<TNext: Exchange> ExchangeFactory<TNext> for MockExchange {
    type Output = MockExchangeImpl;

    fn build(self, _next: TNext) -> Self::Output {
        MockExchangeImpl { exchange: self }
    }
}

#[async_trait::async_trait]
impl Exchange for MockExchangeImpl {
    async fn run(&self, operation: Operation) -> ExchangeResult {
        Counter::inc_sync(&self.exchange.counter);
        self.exchange.operations.lock().push(operation.clone());

        let body = (self.exchange.handler)(&operation);
        let mut response: Response = serde_json::from_value(body)?;
        response.debug_info = Some(DebugInfo {
            source: ResultSource::Network,
            did_dedup: false
        });

        Ok(OperationResult {
            key: operation.key,
            meta: operation.meta,
            response
        })
    }
}

/// A client whose only exchange is the mock.
pub fn mock_client(exchange: MockExchange) -> Client<MockExchangeImpl> {
    ClientBuilder::new(URL).with_exchange(exchange).build()
}
