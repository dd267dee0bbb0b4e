//! This module contains the default exchanges.
//! Note that all but the terminator require the `default-exchanges` feature.

use crate::exchange::{Exchange, ExchangeResult, Operation};
use thiserror::Error;

#[cfg(feature = "default-exchanges")]
mod cache;
#[cfg(feature = "default-exchanges")]
mod dedup;
#[cfg(feature = "default-exchanges")]
mod fetch;

#[cfg(feature = "default-exchanges")]
pub use cache::{CacheExchange, CacheExchangeImpl};
#[cfg(feature = "default-exchanges")]
pub use dedup::{DedupExchange, DedupExchangeImpl};
#[cfg(feature = "default-exchanges")]
pub use fetch::{FetchError, FetchExchange, FetchExchangeImpl};

#[derive(Debug, Error)]
enum MiddlewareError {
    #[error("unexpected end of middleware chain")]
    UnexpectedEndOfChain
}

/// The terminating exchange.
/// This will always be the last exchange in the chain and will simply return an error if called.
pub struct TerminatorExchange;

#[async_trait]
impl Exchange for TerminatorExchange {
    async fn run(&self, _operation: Operation) -> ExchangeResult {
        Err(MiddlewareError::UnexpectedEndOfChain.into())
    }
}
