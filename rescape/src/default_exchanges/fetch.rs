use crate::{
    exchange::{Exchange, ExchangeFactory, ExchangeResult, Operation, OperationOptions, OperationResult},
    DebugInfo, HeaderPair, QueryBody, Response, ResultSource
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch error: {0}")]
    NetworkError(#[source] reqwest::Error),
    #[error("decoding error: {0}")]
    DecodeError(#[source] reqwest::Error)
}

/// The default fetch exchange
///
/// POSTs the query as JSON with `reqwest`. This never forwards, so it should be the first
/// exchange added.
pub struct FetchExchange;

pub struct FetchExchangeImpl {
    client: reqwest::Client
}

impl<TNext: Exchange> ExchangeFactory<TNext> for FetchExchange {
    type Output = FetchExchangeImpl;

    fn build(self, _next: TNext) -> Self::Output {
        FetchExchangeImpl {
            client: reqwest::Client::new()
        }
    }
}

impl FetchExchangeImpl {
    async fn fetch(
        &self,
        extra_headers: Vec<HeaderPair>,
        options: &OperationOptions,
        query: &QueryBody
    ) -> Result<Response, FetchError> {
        let mut request = self
            .client
            .post(&options.url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(query);

        for HeaderPair(key, value) in extra_headers {
            request = request.header(key.as_str(), value.as_str());
        }

        request
            .send()
            .await
            .map_err(FetchError::NetworkError)?
            .json()
            .await
            .map_err(FetchError::DecodeError)
    }
}

#[async_trait]
impl Exchange for FetchExchangeImpl {
    async fn run(&self, operation: Operation) -> ExchangeResult {
        let extra_headers = if let Some(ref extra_headers) = operation.options.extra_headers {
            extra_headers()
        } else {
            Vec::new()
        };

        tracing::trace!(
            operation = %operation.meta.operation_name,
            url = %operation.options.url,
            "fetching"
        );
        let mut response = self
            .fetch(extra_headers, &operation.options, &operation.query)
            .await?;

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
