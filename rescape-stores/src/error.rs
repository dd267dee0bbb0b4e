use rescape::{GraphQLError, QueryError};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error(transparent)]
    Request(#[from] rescape::Error),
    #[error("transport error: {0}")]
    Query(QueryError),
    #[error("the server returned {} error(s), the first being: {}", .0.len(), first_message(.0))]
    GraphQL(Vec<GraphQLError>)
}

impl From<QueryError> for StoreError {
    fn from(e: QueryError) -> Self {
        StoreError::Query(e)
    }
}

fn first_message(errors: &[GraphQLError]) -> &str {
    errors.first().map_or("", |error| error.message.as_str())
}
