use crate::{
    cache::Cache,
    exchange::{Exchange, Operation, OperationMeta, OperationOptions},
    query::Document,
    utils::progressive_hash,
    HeaderPair, QueryBody, QueryError, QueryOptions, RequestPolicy, Response
};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;

pub type ResetHook = Arc<dyn Fn(&dyn Cache) + Send + Sync>;

pub struct ClientImpl<M: Exchange> {
    pub(crate) url: String,
    pub(crate) exchange: M,
    pub(crate) extra_headers: Option<Arc<dyn Fn() -> Vec<HeaderPair> + Send + Sync>>,
    pub(crate) request_policy: RequestPolicy,
    pub(crate) cache: Arc<dyn Cache>,
    pub(crate) authorization: Option<String>,
    pub(crate) reset_hooks: Mutex<Vec<ResetHook>>
}

impl<M: Exchange> ClientImpl<M> {
    pub(crate) async fn execute_request_operation(
        &self,
        operation: Operation
    ) -> Result<Response, QueryError> {
        self.exchange
            .run(operation)
            .await
            .map(|operation_result| operation_result.response)
    }

    pub async fn query(
        &self,
        document: &Document,
        variables: Map<String, Value>
    ) -> Result<Response, QueryError> {
        self.query_with_options(document, variables, QueryOptions::default())
            .await
    }

    pub async fn query_with_options(
        &self,
        document: &Document,
        variables: Map<String, Value>,
        options: QueryOptions
    ) -> Result<Response, QueryError> {
        let operation = self.create_request_operation(document, variables, options);
        self.execute_request_operation(operation).await
    }

    pub(crate) fn create_request_operation(
        &self,
        document: &Document,
        variables: Map<String, Value>,
        options: QueryOptions
    ) -> Operation {
        let extra_headers = if let Some(extra_headers) = options.extra_headers {
            Some(extra_headers)
        } else if let Some(ref extra_headers) = self.extra_headers {
            Some(extra_headers.clone())
        } else {
            None
        };

        let meta = OperationMeta {
            query_key: document.query_key(),
            operation_type: document.operation_type(),
            operation_name: document.shared_operation_name(),
            client_only: document.is_client_only(),
            selection: document.selection().clone()
        };

        Operation {
            key: progressive_hash(document.query_key(), &variables),
            meta,
            query: QueryBody {
                variables,
                query: document.shared_source(),
                operation_name: document.shared_operation_name()
            },
            options: OperationOptions {
                url: options.url.unwrap_or_else(|| self.url.clone()),
                extra_headers,
                request_policy: options.request_policy.unwrap_or(self.request_policy)
            }
        }
    }

    pub(crate) fn on_reset_store(&self, hook: ResetHook) {
        self.reset_hooks.lock().push(hook);
    }

    pub(crate) fn reset_store(&self) {
        self.cache.reset();
        // Clone the hooks out so a hook can register another one without deadlocking
        let hooks: Vec<ResetHook> = self.reset_hooks.lock().clone();
        for hook in hooks {
            hook(self.cache.as_ref());
        }
    }
}
