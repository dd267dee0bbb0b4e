use std::sync::Arc;

mod builder;
mod r#impl;

use crate::{
    cache::Cache, default_exchanges::TerminatorExchange, exchange::Exchange, query::Document,
    QueryError, QueryOptions, Response
};
pub use builder::{authorization_header, ClientBuilder};
#[cfg(feature = "default-exchanges")]
pub use builder::DefaultExchanges;
pub use r#impl::{ClientImpl, ResetHook};
use serde_json::{Map, Value};

/// A GraphQL client. Cloning only clones the `Arc`, all clones share the exchange chain and
/// the cache.
#[repr(transparent)]
pub struct Client<M: Exchange = TerminatorExchange>(pub Arc<ClientImpl<M>>);

impl<M: Exchange> Clone for Client<M> {
    fn clone(&self) -> Self {
        Client(self.0.clone())
    }
}

impl Client {
    pub fn builder<U: Into<String>>(url: U) -> ClientBuilder {
        ClientBuilder::new(url)
    }
}

impl<M: Exchange> Client<M> {
    pub async fn query(
        &self,
        document: &Document,
        variables: Map<String, Value>
    ) -> Result<Response, QueryError> {
        self.0.query(document, variables).await
    }

    pub async fn query_with_options(
        &self,
        document: &Document,
        variables: Map<String, Value>,
        options: QueryOptions
    ) -> Result<Response, QueryError> {
        self.0.query_with_options(document, variables, options).await
    }

    pub fn url(&self) -> &str {
        &self.0.url
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.0.cache
    }

    /// The value sent in the `authorization` header, if the client was built with a token.
    pub fn authorization(&self) -> Option<&str> {
        self.0.authorization.as_deref()
    }

    /// Registers a hook that runs every time the store is reset.
    pub fn on_reset_store<F: Fn(&dyn Cache) + Send + Sync + 'static>(&self, hook: F) {
        self.0.on_reset_store(Arc::new(hook));
    }

    /// Clears the cache and runs the reset hooks, which usually write the defaults back.
    pub fn reset_store(&self) {
        self.0.reset_store();
    }
}
