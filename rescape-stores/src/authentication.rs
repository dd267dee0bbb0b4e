//! Getting an authenticated (or anonymous) client.
//!
//! Clients come from a [`ClientRegistry`](../../rescape/config/struct.ClientRegistry.html),
//! so asking twice for the same uri and token yields the same client and the same cache. A
//! freshly created client gets its defaults written and re-written on every store reset.

use crate::{expect_data, token_auth::token_auth_mutation_container, user::current_user_query_container, StoreError};
use rescape::{
    client::Client,
    config::{install_write_defaults, ClientConfig, ClientRegistry},
    exchange::Exchange,
    output_params::OutputParams,
    request::ApolloConfig,
    utils::req_path,
    Error
};
use serde_json::{json, Value};

/// A client, the token it was built with and, when authenticated, the current user.
pub struct AuthenticatedClient<M: Exchange> {
    pub token: Option<String>,
    pub client: Client<M>,
    pub user: Option<Value>
}

impl<M: Exchange> AuthenticatedClient<M> {
    /// An [`ApolloConfig`](../../rescape/request/struct.ApolloConfig.html) over this client.
    pub fn config(&self) -> ApolloConfig<M> {
        ApolloConfig::new(self.client.clone())
    }
}

fn client_for<M: Exchange>(
    registry: &ClientRegistry<M>,
    config: &ClientConfig,
    token: Option<&str>
) -> Result<Client<M>, StoreError> {
    let (client, created) = registry.get_or_create(config, token);
    if created {
        if let Err(e) = install_write_defaults(&client, config) {
            // Forget the client so the next call builds it again and retries the defaults
            registry.remove(&config.uri, token);
            return Err(e.into());
        }
    }
    Ok(client)
}

/// The client for the token in a `tokenAuth` response, along with the current user.
///
/// `token_auth` is the response data, `{"tokenAuth": {"token": ...}}`.
pub async fn get_or_create_auth_client_with_token<M: Exchange>(
    registry: &ClientRegistry<M>,
    config: &ClientConfig,
    user_output_params: OutputParams,
    token_auth: &Value
) -> Result<AuthenticatedClient<M>, StoreError> {
    let token = req_path("tokenAuth.token", token_auth)?
        .as_str()
        .ok_or_else(|| Error::MissingRequiredPath("tokenAuth.token".to_string()))?
        .to_string();
    let client = client_for(registry, config, Some(&token))?;

    let task = current_user_query_container(&ApolloConfig::new(client.clone()), user_output_params)?.into_task()?;
    let user = expect_data(task)
        .await?
        .data_at("currentUser")
        .filter(|user| !user.is_null())
        .cloned();
    tracing::debug!(uri = %config.uri, has_user = user.is_some(), "authenticated client ready");

    Ok(AuthenticatedClient {
        token: Some(token),
        client,
        user
    })
}

/// The anonymous client for `config.uri`.
pub fn get_or_create_no_auth_client<M: Exchange>(
    registry: &ClientRegistry<M>,
    config: &ClientConfig
) -> Result<AuthenticatedClient<M>, StoreError> {
    Ok(AuthenticatedClient {
        token: None,
        client: client_for(registry, config, None)?,
        user: None
    })
}

/// Logs in through the anonymous client, then switches to the authenticated one.
pub async fn login<M: Exchange>(
    registry: &ClientRegistry<M>,
    config: &ClientConfig,
    user_output_params: OutputParams,
    username: &str,
    password: &str
) -> Result<AuthenticatedClient<M>, StoreError> {
    let anonymous = get_or_create_no_auth_client(registry, config)?;
    let credentials = json!({"username": username, "password": password});
    let props = credentials.as_object().cloned().unwrap_or_default();
    let task = token_auth_mutation_container(&anonymous.config(), None, &props)?.into_task()?;
    let token_auth = expect_data(task).await?.data.unwrap_or(Value::Null);

    get_or_create_auth_client_with_token(registry, config, user_output_params, &token_auth).await
}
