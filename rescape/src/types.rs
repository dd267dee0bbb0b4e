use crate::{output_params::OutputParams, QueryBody, QueryError, Response};
use std::{fmt, sync::Arc};

pub type ExchangeResult = Result<OperationResult, QueryError>;

#[async_trait]
pub trait Exchange: Send + Sync + 'static {
    async fn run(&self, operation: Operation) -> ExchangeResult;
}

pub trait ExchangeFactory<TNext: Exchange> {
    type Output: Exchange;

    fn build(self, next: TNext) -> Self::Output;
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize)]
pub enum OperationType {
    Query,
    Mutation
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationType::Query => write!(f, "Query"),
            OperationType::Mutation => write!(f, "Mutation")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPolicy {
    CacheFirst,
    CacheOnly,
    NetworkOnly,
    CacheAndNetwork
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderPair(pub String, pub String);

#[derive(Clone, Debug)]
pub struct OperationMeta {
    /// Hash of the document source, combined with the variables to form the operation key
    pub query_key: u32,
    pub operation_type: OperationType,
    pub operation_name: Arc<str>,
    /// Set for documents carrying a root `@client` directive. These never leave the cache.
    pub client_only: bool,
    /// The root selection, used by cache exchanges to project data out of the store
    pub selection: Arc<OutputParams>
}

#[derive(Clone)]
pub struct OperationOptions {
    pub url: String,
    pub extra_headers: Option<Arc<dyn Fn() -> Vec<HeaderPair> + Send + Sync>>,
    pub request_policy: RequestPolicy
}

#[derive(Clone)]
pub struct Operation {
    pub key: u64,
    pub meta: OperationMeta,
    pub query: QueryBody,
    pub options: OperationOptions
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum ResultSource {
    Cache,
    Network
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DebugInfo {
    pub source: ResultSource,
    pub did_dedup: bool
}

#[derive(Clone, Debug)]
pub struct OperationResult {
    pub key: u64,
    pub meta: OperationMeta,
    pub response: Response
}

#[derive(Default, Clone)]
pub struct QueryOptions {
    pub url: Option<String>,
    pub extra_headers: Option<Arc<dyn Fn() -> Vec<HeaderPair> + Send + Sync>>,
    pub request_policy: Option<RequestPolicy>
}

impl QueryOptions {
    pub fn with_request_policy(request_policy: RequestPolicy) -> Self {
        QueryOptions {
            request_policy: Some(request_policy),
            ..QueryOptions::default()
        }
    }
}
