//! GraphQL client helpers built around declarative output params.
//!
//! Instead of hand-writing query documents, callers describe which fields they want as an
//! [`OutputParams`](./output_params/struct.OutputParams.html) tree and let the crate
//! synthesize the document, bind variables and dispatch it through a [`Client`].
//!
//! # Getting Started
//!
//! ```
//! # tokio_test::block_on(async {
//! use rescape::{
//!     output_params::OutputParams,
//!     query::{make_query, InputTypeMapper}
//! };
//! use serde_json::json;
//!
//! let output_params = OutputParams::from_value(&json!(["id", "key"])).unwrap();
//! let arguments = json!({"key": "earth"}).as_object().cloned().unwrap();
//! let document = make_query("regions", &InputTypeMapper::new(), &output_params, &arguments).unwrap();
//!
//! assert!(document.source().starts_with("query regions($key: String!)"));
//! # });
//! ```
//!
//! Documents are memoized by the structural identity of their inputs, so building the same
//! query many times a second is cheap and always yields the same `Arc<str>`.
//!
//! # Exchanges
//!
//! Exchanges are like a bi-directional middleware.
//! They act on both the incoming and outgoing queries,
//! passing them on if they can't return a result themselves.
//!
//! There are three default exchanges, called in this order:
//!
//! ## DedupExchange
//!
//! Keeps track of in-flight queries and, instead of firing off another identical query,
//! waits for the result of the one already running.
//!
//! ## CacheExchange
//!
//! A very basic result cache which eagerly invalidates on every mutation. It also answers
//! `@client` queries and `CacheOnly` requests directly from the client-side [`Cache`](./cache/trait.Cache.html)
//! without ever touching the network.
//!
//! ## FetchExchange
//!
//! Serializes the query, sends it over the network and deserializes the response.
//! This should be your last exchange in the chain, as it never forwards a query.
//!
//! # Requests
//!
//! The [`request`](./request/index.html) module wraps the client for application code:
//! it winnows props down to the declared variables, honors `skip`, and merges fields that only
//! exist client-side back into server responses.
//!
//! # Features
//!
//! * `default-exchanges` **(default)** - Include default exchanges and the related builder method

#[macro_use]
extern crate serde;
#[macro_use]
extern crate async_trait;
#[macro_use]
extern crate lazy_static;

use serde_json::Value;
use std::{collections::HashMap, fmt, fmt::Display};

pub mod cache;
pub mod client;
pub mod config;
pub mod default_exchanges;
mod error;
pub mod output_params;
pub mod query;
pub mod request;
pub mod state_link;
pub(crate) mod types;
pub mod utils;

pub use client::{Client, ClientBuilder};
pub use error::{Error, QueryError, Result};
pub use types::{DebugInfo, HeaderPair, QueryOptions, RequestPolicy, ResultSource};

/// Types used by custom exchanges. Regular users probably don't need these.
pub mod exchange {
    pub use crate::types::{
        Exchange, ExchangeFactory, ExchangeResult, Operation, OperationMeta, OperationOptions,
        OperationResult, OperationType
    };
}

/// The form in which queries are sent over HTTP in most implementations.
#[derive(Debug, Serialize, Clone)]
pub struct QueryBody {
    /// The values for the variables. They must match those declared in the document.
    pub variables: serde_json::Map<String, Value>,
    /// The GraphQL document, as a string.
    pub query: std::sync::Arc<str>,
    /// The GraphQL operation name, as a string.
    #[serde(rename = "operationName")]
    pub operation_name: std::sync::Arc<str>
}

/// The generic shape taken by the responses of GraphQL APIs.
///
/// [Spec](https://github.com/facebook/graphql/blob/master/spec/Section%207%20--%20Response.md)
///
/// ```
/// # use serde_json::json;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use rescape::Response;
///
/// let body: Response = serde_json::from_value(json!({
///     "data": {
///         "regions": [{"id": 13, "key": "earth"}]
///     },
///     "errors": [],
/// }))?;
///
/// assert_eq!(body.data_at("regions.0.key"), Some(&json!("earth")));
/// assert!(!body.skip);
///
/// #     Ok(())
/// # }
/// ```
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct Response {
    /// Where the result came from, if an exchange recorded it
    #[serde(skip_deserializing, rename = "debugInfo", skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<DebugInfo>,
    /// The absent, partial or complete response data.
    pub data: Option<Value>,
    /// The top-level errors returned by the server.
    pub errors: Option<Vec<GraphQLError>>,
    /// Set when the request was skipped before reaching the transport.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip: bool
}

impl Response {
    /// The response handed back for skipped requests. It has the same shape as a real one.
    pub fn skipped() -> Self {
        Response {
            skip: true,
            ..Response::default()
        }
    }

    /// True if the server returned at least one error.
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().map_or(false, |errors| !errors.is_empty())
    }

    /// Look up a dot separated path (`regions.0.key`) inside `data`.
    pub fn data_at(&self, path: &str) -> Option<&Value> {
        self.data
            .as_ref()
            .and_then(|data| utils::path(path, data))
    }
}

/// An element in the top-level `errors` array of a response body.
///
/// [Spec](https://github.com/facebook/graphql/blob/master/spec/Section%207%20--%20Response.md)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphQLError {
    /// The human-readable error message. This is the only required field.
    pub message: String,
    /// Which locations in the query the error applies to.
    pub locations: Option<Vec<Location>>,
    /// Which path in the query the error applies to, e.g. `["users", 0, "email"]`.
    pub path: Option<Vec<PathFragment>>,
    /// Additional errors. Their exact format is defined by the server.
    pub extensions: Option<HashMap<String, Value>>
}

impl GraphQLError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        GraphQLError {
            message: message.into(),
            locations: None,
            path: None,
            extensions: None
        }
    }
}

impl Display for GraphQLError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Use `/` as a separator like JSON Pointer.
        let path = self
            .path
            .as_ref()
            .map(|fragments| {
                fragments
                    .iter()
                    .fold(String::new(), |mut acc, item| {
                        acc.push_str(&format!("{}/", item));
                        acc
                    })
                    .trim_end_matches('/')
                    .to_string()
            })
            .unwrap_or_else(|| "<query>".to_string());

        // Get the location of the error. We'll use just the first location for this.
        let loc = self
            .locations
            .as_ref()
            .and_then(|locations| locations.iter().next())
            .cloned()
            .unwrap_or_else(Location::default);

        write!(f, "{}:{}:{}: {}", path, loc.line, loc.column, self.message)
    }
}

/// Part of a path in a query. It can be an object key or an array index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PathFragment {
    /// A key inside an object
    Key(String),
    /// An index inside an array
    Index(i32)
}

/// Represents a location inside a query string. Used in errors.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Location {
    /// The line number in the query string where the error originated (starting from 1).
    pub line: i32,
    /// The column number in the query string where the error originated (starting from 1).
    pub column: i32
}

impl Display for PathFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PathFragment::Key(ref key) => write!(f, "{}", key),
            PathFragment::Index(ref idx) => write!(f, "{}", idx)
        }
    }
}
