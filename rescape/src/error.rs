use std::{error::Error as StdError, fmt, sync::Arc};
use thiserror::Error;

/// A transport level failure.
///
/// These are only ever delivered through the `Result` of a dispatched request, never raised
/// while a request is being built. The error is cheap to clone so deduplicated listeners can
/// all receive it.
#[derive(Clone, Debug)]
pub struct QueryError {
    inner: Arc<Box<dyn StdError + Send + Sync>>
}

#[derive(Debug)]
pub struct QueryErrorCompat(QueryError);

impl StdError for QueryErrorCompat {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

impl fmt::Display for QueryErrorCompat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl QueryError {
    pub fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source()
    }

    pub fn compat(self) -> QueryErrorCompat {
        QueryErrorCompat(self)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl<T: StdError + Send + Sync + 'static> From<T> for QueryError {
    fn from(e: T) -> Self {
        QueryError {
            inner: Arc::new(Box::new(e))
        }
    }
}

/// Caller contract violations. These fail fast, before any request is dispatched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("required path `{0}` is missing")]
    MissingRequiredPath(String),
    #[error("no output params were given for `{0}`")]
    EmptyOutputParams(String),
    #[error("argument `{0}` needs an input type mapping")]
    UnresolvedInputType(String),
    #[error("invalid output params: {0}")]
    InvalidOutputParams(String),
    #[error("cannot write {0} to the cache, expected an object")]
    InvalidCacheWrite(String),
    #[error("the request needs a client to run")]
    MissingClient
}

pub type Result<T> = std::result::Result<T, Error>;
