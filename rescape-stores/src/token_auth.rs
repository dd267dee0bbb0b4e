//! JWT mutations. The server issues and verifies tokens; these only call its mutations.
//!
//! All of them are flattened: the props are sent as top-level variables, e.g.
//! `mutation tokenAuth($username: String!, $password: String!) { tokenAuth(username: $username, password: $password) { token payload } }`.

use rescape::{
    exchange::Exchange,
    output_params::{field, OutputParams},
    request::{mutation_request_container, ApolloConfig, Container, MutationContainer},
    Result
};
use serde_json::{Map, Value};

/// `token` and its decoded `payload` (`username`, `exp`, `origIat`).
pub fn token_auth_output_params() -> OutputParams {
    OutputParams(vec![field("token"), field("payload")])
}

fn flattened<M: Exchange>(
    config: &ApolloConfig<M>,
    mutation_name: &str,
    output_params: OutputParams,
    props: &Map<String, Value>
) -> Result<Container> {
    mutation_request_container(config, &MutationContainer::flattened(mutation_name, output_params), props)
}

/// Logs in with `username` and `password`.
pub fn token_auth_mutation_container<M: Exchange>(
    config: &ApolloConfig<M>,
    output_params: Option<OutputParams>,
    props: &Map<String, Value>
) -> Result<Container> {
    flattened(
        config,
        "tokenAuth",
        output_params.unwrap_or_else(token_auth_output_params),
        props
    )
}

/// Checks `token` and returns its payload.
pub fn verify_token_mutation_container<M: Exchange>(
    config: &ApolloConfig<M>,
    output_params: Option<OutputParams>,
    props: &Map<String, Value>
) -> Result<Container> {
    flattened(
        config,
        "verifyToken",
        output_params.unwrap_or_else(|| OutputParams(vec![field("payload")])),
        props
    )
}

/// Exchanges `token` for a fresh one.
pub fn refresh_token_mutation_container<M: Exchange>(
    config: &ApolloConfig<M>,
    output_params: Option<OutputParams>,
    props: &Map<String, Value>
) -> Result<Container> {
    flattened(
        config,
        "refreshToken",
        output_params.unwrap_or_else(|| OutputParams(vec![field("payload")])),
        props
    )
}

pub fn delete_token_cookie_mutation_container<M: Exchange>(
    config: &ApolloConfig<M>,
    output_params: Option<OutputParams>,
    props: &Map<String, Value>
) -> Result<Container> {
    flattened(
        config,
        "deleteTokenCookie",
        output_params.unwrap_or_else(|| OutputParams(vec![field("deleted")])),
        props
    )
}

pub fn delete_refresh_token_cookie_mutation_container<M: Exchange>(
    config: &ApolloConfig<M>,
    output_params: Option<OutputParams>,
    props: &Map<String, Value>
) -> Result<Container> {
    flattened(
        config,
        "deleteRefreshTokenCookie",
        output_params.unwrap_or_else(|| OutputParams(vec![field("deleted")])),
        props
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rescape::{request::DeferredRequest, RequestPolicy};
    use serde_json::json;

    fn deferred(container: Container) -> DeferredRequest {
        match container {
            Container::Deferred(request) => request,
            Container::Task(_) => panic!("expected a deferred request")
        }
    }

    #[test]
    fn token_auth_is_flattened() {
        let config: ApolloConfig = ApolloConfig::deferred();
        let props = json!({"username": "test", "password": "testpass"}).as_object().cloned().unwrap();
        let request = deferred(token_auth_mutation_container(&config, None, &props).unwrap());

        assert_eq!(
            request.document.source(),
            "mutation tokenAuth($username: String!, $password: String!) { tokenAuth(username: $username, password: $password) { token payload } }"
        );
        assert_eq!(request.variables, props);
        assert_eq!(request.request_policy, Some(RequestPolicy::NetworkOnly));
    }

    #[test]
    fn cookie_mutations_take_no_arguments() {
        let config: ApolloConfig = ApolloConfig::deferred();
        let request = deferred(delete_refresh_token_cookie_mutation_container(&config, None, &Map::new()).unwrap());

        assert_eq!(
            request.document.source(),
            "mutation deleteRefreshTokenCookie { deleteRefreshTokenCookie { deleted } }"
        );
    }

    #[test]
    fn verify_and_refresh_send_the_token() {
        let config: ApolloConfig = ApolloConfig::deferred();
        let props = json!({"token": "abc"}).as_object().cloned().unwrap();

        let verify = deferred(verify_token_mutation_container(&config, None, &props).unwrap());
        assert_eq!(
            verify.document.source(),
            "mutation verifyToken($token: String!) { verifyToken(token: $token) { payload } }"
        );
        let refresh = deferred(refresh_token_mutation_container(&config, None, &props).unwrap());
        assert!(refresh.document.source().starts_with("mutation refreshToken($token: String!)"));
    }
}
