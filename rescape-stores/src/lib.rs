//! Application stores built on `rescape`.
//!
//! Each store pairs default output params with container builders for one kind of object:
//! regions, projects, users and their state, settings and auth tokens. The
//! [`mapbox`](mapbox/index.html) store resolves a viewport by layering every scope's mapbox
//! settings on top of each other.
//!
//! Builders follow the `rescape` request convention: they take an
//! [`ApolloConfig`](../rescape/request/struct.ApolloConfig.html), the output params and the
//! props, fail synchronously on contract violations, and otherwise hand back a
//! [`Container`](../rescape/request/enum.Container.html).

#[macro_use]
extern crate serde;
#[macro_use]
extern crate lazy_static;

pub mod authentication;
mod error;
pub mod mapbox;
pub mod project;
pub mod region;
pub mod settings;
pub mod token_auth;
pub mod user;

pub use error::StoreError;

use rescape::{QueryError, Response};

/// Awaits a request and treats GraphQL errors in the body as failures.
pub(crate) async fn expect_data<F>(task: F) -> Result<Response, StoreError>
where
    F: std::future::Future<Output = Result<Response, QueryError>>
{
    let response = task.await?;
    match response.errors {
        Some(ref errors) if !errors.is_empty() => Err(StoreError::GraphQL(errors.clone())),
        _ => Ok(response)
    }
}
