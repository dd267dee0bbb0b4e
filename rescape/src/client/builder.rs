use crate::{
    cache::{Cache, InMemoryCache},
    client::{Client, ClientImpl},
    default_exchanges::TerminatorExchange,
    exchange::{Exchange, ExchangeFactory},
    HeaderPair, RequestPolicy
};
#[cfg(feature = "default-exchanges")]
use crate::default_exchanges::{
    CacheExchange, CacheExchangeImpl, DedupExchange, DedupExchangeImpl, FetchExchange,
    FetchExchangeImpl
};
use parking_lot::Mutex;
use std::sync::Arc;

/// The exchange chain built by `with_default_exchanges`.
#[cfg(feature = "default-exchanges")]
pub type DefaultExchanges = DedupExchangeImpl<CacheExchangeImpl<FetchExchangeImpl>>;

pub struct ClientBuilder<M: Exchange = TerminatorExchange> {
    exchange: M,
    url: String,
    extra_headers: Option<Arc<dyn Fn() -> Vec<HeaderPair> + Send + Sync>>,
    request_policy: RequestPolicy,
    cache: Arc<dyn Cache>,
    authorization: Option<String>
}

impl ClientBuilder<TerminatorExchange> {
    pub fn new<U: Into<String>>(url: U) -> Self {
        ClientBuilder {
            exchange: TerminatorExchange,
            url: url.into(),
            extra_headers: None,
            request_policy: RequestPolicy::CacheFirst,
            cache: Arc::new(InMemoryCache::new()),
            authorization: None
        }
    }

    /// Replaces the cache. Call this before adding exchanges that use it.
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = cache;
        self
    }
}

impl<M: Exchange> ClientBuilder<M> {
    /// Add the default exchanges to the chain. Keep in mind that exchanges are executed bottom to top, so the first one added will be the last one executed.
    #[cfg(feature = "default-exchanges")]
    pub fn with_default_exchanges(self) -> ClientBuilder<DefaultExchanges> {
        let cache = self.cache.clone();
        self.with_exchange(FetchExchange)
            .with_exchange(CacheExchange::new(cache))
            .with_exchange(DedupExchange)
    }

    /// Add an exchange to the chain. Keep in mind that exchanges are executed bottom to top, so the first one added will be the last one executed.
    pub fn with_exchange<F>(self, exchange_factory: F) -> ClientBuilder<F::Output>
    where
        F: ExchangeFactory<M>
    {
        let exchange = exchange_factory.build(self.exchange);
        ClientBuilder {
            exchange,
            url: self.url,
            extra_headers: self.extra_headers,
            request_policy: self.request_policy,
            cache: self.cache,
            authorization: self.authorization
        }
    }

    pub fn with_extra_headers<F: Fn() -> Vec<HeaderPair> + Send + Sync + 'static>(
        mut self,
        header_fn: F
    ) -> Self {
        self.extra_headers = Some(Arc::new(header_fn));
        self
    }

    /// Sends `authorization: JWT <token>` with every request, or an empty value without a token.
    pub fn with_auth_token(mut self, token: Option<&str>) -> Self {
        self.authorization = Some(authorization_header(token));
        self
    }

    pub fn with_request_policy(mut self, request_policy: RequestPolicy) -> Self {
        self.request_policy = request_policy;
        self
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    pub fn build(self) -> Client<M> {
        let extra_headers = match (self.authorization.clone(), self.extra_headers) {
            (Some(authorization), extra_headers) => {
                let with_authorization: Arc<dyn Fn() -> Vec<HeaderPair> + Send + Sync> =
                    Arc::new(move || {
                        let mut headers = vec![HeaderPair(
                            "authorization".to_string(),
                            authorization.clone()
                        )];
                        if let Some(ref extra_headers) = extra_headers {
                            headers.extend(extra_headers());
                        }
                        headers
                    });
                Some(with_authorization)
            }
            (None, extra_headers) => extra_headers
        };

        let client = ClientImpl {
            url: self.url,
            exchange: self.exchange,
            extra_headers,
            request_policy: self.request_policy,
            cache: self.cache,
            authorization: self.authorization,
            reset_hooks: Mutex::new(Vec::new())
        };

        Client(Arc::new(client))
    }
}

/// The `authorization` header value for a token.
pub fn authorization_header(token: Option<&str>) -> String {
    token.map(|token| format!("JWT {}", token)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{query::make_query, output_params::{field, OutputParams}, QueryOptions};
    use serde_json::Map;

    #[test]
    fn auth_header_is_prepended() {
        let client = ClientBuilder::new("http://localhost:8008/graphql/")
            .with_extra_headers(|| vec![HeaderPair("x-app".to_string(), "rescape".to_string())])
            .with_auth_token(Some("abc"))
            .build();
        assert_eq!(client.authorization(), Some("JWT abc"));

        let document = make_query(
            "regions",
            &Default::default(),
            &OutputParams(vec![field("id")]),
            &Map::new()
        )
        .unwrap();
        let operation = client
            .0
            .create_request_operation(&document, Map::new(), QueryOptions::default());
        let headers = operation.options.extra_headers.map(|headers| headers()).unwrap();

        assert_eq!(
            headers,
            vec![
                HeaderPair("authorization".to_string(), "JWT abc".to_string()),
                HeaderPair("x-app".to_string(), "rescape".to_string())
            ]
        );
        assert_eq!(operation.options.url, "http://localhost:8008/graphql/");
        assert_eq!(operation.options.request_policy, RequestPolicy::CacheFirst);
    }

    #[test]
    fn no_token_sends_empty_authorization() {
        assert_eq!(authorization_header(None), "");
        let client = ClientBuilder::new("http://localhost:8008/graphql/")
            .with_auth_token(None)
            .build();
        assert_eq!(client.authorization(), Some(""));
    }

    #[test]
    fn operation_keys_tell_variable_types_apart() {
        let client = ClientBuilder::new("http://localhost:8008/graphql/").build();
        let mut mapper = crate::query::InputTypeMapper::new();
        mapper.insert("data".to_string(), "RegionDataInputType".to_string());
        let data = |key: serde_json::Value| {
            serde_json::json!({"data": {"key": key}}).as_object().cloned().unwrap()
        };
        let document = make_query("regions", &mapper, &OutputParams(vec![field("id")]), &data(0.into())).unwrap();

        let int = client
            .0
            .create_request_operation(&document, data(0.into()), QueryOptions::default());
        let string = client
            .0
            .create_request_operation(&document, data("".into()), QueryOptions::default());
        assert_ne!(int.key, string.key);
    }
}
