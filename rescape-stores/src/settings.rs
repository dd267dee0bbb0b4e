//! Application settings.
//!
//! Settings are stored on the server except for the paths listed in
//! [`SettingsConfig::cache_only_objs`](../../rescape/config/struct.SettingsConfig.html), such
//! as test credentials or API tokens. Those are stripped from every mutation and written into
//! the settings entity in the client-side cache instead, where `@client` queries find them.

use crate::{expect_data, StoreError};
use futures::future::{BoxFuture, FutureExt};
use rescape::{
    cache::Cache,
    config::SettingsConfig,
    exchange::Exchange,
    output_params::OutputParams,
    query::InputTypeMapper,
    request::{mutation_request_container, query_container, ApolloConfig, Container, MutationContainer, QueryContainer},
    state_link::{create_state_link_defaults, write_client_only_fields, CacheTarget},
    utils::{merge_deep, omit_deep_paths, pick_deep_paths},
    Error, Result
};
use serde_json::{Map, Value};

pub fn settings_query(output_params: OutputParams) -> QueryContainer {
    QueryContainer::new("settings", output_params).with_input_type_mapper(InputTypeMapper::new())
}

/// `settings(<props>) { ... }`. `@client` fields in the output params come from the cache.
pub fn settings_query_container<M: Exchange>(
    config: &ApolloConfig<M>,
    output_params: OutputParams,
    props: &Map<String, Value>
) -> Result<Container> {
    query_container(config, &settings_query(output_params), props)
}

/// Creates or updates settings on the server. Cache-only paths are never sent.
pub fn settings_mutation_container<M: Exchange>(
    config: &ApolloConfig<M>,
    settings_config: &SettingsConfig,
    output_params: OutputParams,
    props: &Map<String, Value>
) -> Result<Container> {
    let server_props = match omit_deep_paths(&settings_config.cache_only_paths(), &Value::Object(props.clone())) {
        Value::Object(server_props) => server_props,
        _ => Map::new()
    };
    mutation_request_container(
        config,
        &MutationContainer::new("settings", output_params.without_client_fields()),
        &server_props
    )
}

/// Writes the cache-only parts of `settings` into its cache entity.
///
/// `settings` must carry the id paths (`id`, `__typename`) so the entity can be found,
/// usually by merging the props with the server's response. Returns what was written.
pub fn write_settings_client_fields(
    cache: &dyn Cache,
    settings_config: &SettingsConfig,
    settings: &Value
) -> Result<Value> {
    let client_fields = pick_deep_paths(&settings_config.client_write_paths(), settings);
    let target = CacheTarget::of(&client_fields)?;
    write_client_only_fields(cache, &target, &client_fields)?;
    tracing::debug!(entity = ?target, "wrote cache-only settings");
    Ok(client_fields)
}

/// Saves settings on the server, then writes their cache-only parts locally.
///
/// Resolves to the saved settings with the cache-only values merged back in.
pub fn save_settings<M: Exchange>(
    config: &ApolloConfig<M>,
    settings_config: &SettingsConfig,
    output_params: OutputParams,
    props: &Map<String, Value>
) -> Result<BoxFuture<'static, std::result::Result<Value, StoreError>>> {
    let client = config.client.clone().ok_or(Error::MissingClient)?;
    let verb = match props.get("id") {
        Some(Value::Null) | None => "create",
        Some(_) => "update"
    };
    let task = settings_mutation_container(config, settings_config, output_params, props)?.into_task()?;
    let settings_config = settings_config.clone();
    let props = props.clone();

    Ok(async move {
        let response = expect_data(task).await?;
        let saved = response
            .data_at(&format!("{}Settings.settings", verb))
            .cloned()
            .ok_or_else(|| Error::MissingRequiredPath(format!("{}Settings.settings", verb)))?;

        let mut settings = Value::Object(props);
        merge_deep(&mut settings, saved);
        write_settings_client_fields(client.cache().as_ref(), &settings_config, &settings)?;
        Ok::<_, StoreError>(settings)
    }
    .boxed())
}

/// A `write_defaults` hook writing the state link defaults built from `defaults`.
pub fn settings_write_defaults(defaults: Value) -> impl Fn(&dyn Cache, &SettingsConfig) -> Result<()> + Send + Sync {
    move |cache, _settings_config| cache.write_query(&create_state_link_defaults(&defaults))
}
