//! Application level configuration.
//!
//! The serializable part of a [`ClientConfig`](struct.ClientConfig.html) usually comes from a
//! settings file. Hooks that can't be serialized (default writers, local resolvers) are
//! attached in code.

use crate::{
    cache::Cache,
    client::Client,
    exchange::Exchange,
    output_params::OutputParams,
    state_link::{default_state_link_resolvers, StateLinkResolvers},
    Result
};
use fnv::FnvHashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// Which parts of the settings object only live in the client-side cache.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsConfig {
    /// Dot paths never stored on the server, e.g. `data.testAuthorization`
    pub cache_only_objs: Vec<String>,
    /// Dot paths needed to locate the settings entity in the cache, e.g. `id`, `__typename`
    pub cache_id_props: Vec<String>,
    /// The output params used to query settings, in their JSON form
    pub settings_output_params: Value
}

impl SettingsConfig {
    pub fn output_params(&self) -> Result<OutputParams> {
        OutputParams::from_value(&self.settings_output_params)
    }

    pub fn cache_only_paths(&self) -> Vec<&str> {
        self.cache_only_objs.iter().map(String::as_str).collect()
    }

    /// The cache-only paths plus the id paths, which is everything a client-side write needs.
    pub fn client_write_paths(&self) -> Vec<&str> {
        self.cache_only_objs
            .iter()
            .chain(self.cache_id_props.iter())
            .map(String::as_str)
            .collect()
    }
}

/// Writes the initial client-side state. Runs once when a client is set up and again after
/// every store reset.
pub type WriteDefaults = Arc<dyn Fn(&dyn Cache, &SettingsConfig) -> Result<()> + Send + Sync>;

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub uri: String,
    #[serde(default)]
    pub settings_config: SettingsConfig,
    /// Types keyed by something other than `id` in the cache
    #[serde(default)]
    pub custom_keys: FnvHashMap<String, String>,
    #[serde(skip)]
    pub write_defaults: Option<WriteDefaults>,
    #[serde(skip)]
    pub state_link_resolvers: Option<StateLinkResolvers>
}

impl ClientConfig {
    pub fn new<S: Into<String>>(uri: S) -> Self {
        ClientConfig {
            uri: uri.into(),
            settings_config: SettingsConfig::default(),
            custom_keys: FnvHashMap::default(),
            write_defaults: None,
            state_link_resolvers: None
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn with_settings_config(mut self, settings_config: SettingsConfig) -> Self {
        self.settings_config = settings_config;
        self
    }

    pub fn with_write_defaults<F>(mut self, write_defaults: F) -> Self
    where
        F: Fn(&dyn Cache, &SettingsConfig) -> Result<()> + Send + Sync + 'static
    {
        self.write_defaults = Some(Arc::new(write_defaults));
        self
    }

    pub fn with_state_link_resolvers(mut self, resolvers: StateLinkResolvers) -> Self {
        self.state_link_resolvers = Some(resolvers);
        self
    }

    pub fn resolvers(&self) -> StateLinkResolvers {
        self.state_link_resolvers
            .clone()
            .unwrap_or_else(default_state_link_resolvers)
    }
}

/// Writes the defaults now and, if that worked, registers them to be written again after every
/// store reset.
pub fn install_write_defaults<M: Exchange>(client: &Client<M>, config: &ClientConfig) -> Result<()> {
    let write_defaults = match config.write_defaults {
        Some(ref write_defaults) => write_defaults.clone(),
        None => return Ok(())
    };

    write_defaults(client.cache().as_ref(), &config.settings_config)?;

    let settings_config = config.settings_config.clone();
    client.on_reset_store(move |cache| {
        if let Err(e) = write_defaults(cache, &settings_config) {
            tracing::warn!(error = %e, "failed to write defaults after a store reset");
        }
    });
    Ok(())
}

/// Builds the client for a config and an optional token.
pub type ClientFactory<M> = Arc<dyn Fn(&ClientConfig, Option<&str>) -> Client<M> + Send + Sync>;

/// Memoizes one client per `(uri, token)`.
pub struct ClientRegistry<M: Exchange> {
    factory: ClientFactory<M>,
    clients: Mutex<FnvHashMap<(String, Option<String>), Client<M>>>
}

impl<M: Exchange> ClientRegistry<M> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&ClientConfig, Option<&str>) -> Client<M> + Send + Sync + 'static
    {
        ClientRegistry {
            factory: Arc::new(factory),
            clients: Mutex::new(FnvHashMap::default())
        }
    }

    /// Returns the client for this uri and token, and whether it was just created.
    pub fn get_or_create(&self, config: &ClientConfig, token: Option<&str>) -> (Client<M>, bool) {
        let key = (config.uri.clone(), token.map(str::to_string));
        let mut clients = self.clients.lock();
        if let Some(client) = clients.get(&key) {
            return (client.clone(), false);
        }

        tracing::debug!(uri = %config.uri, authenticated = token.is_some(), "creating client");
        let client = (self.factory)(config, token);
        clients.insert(key, client.clone());
        (client, true)
    }

    /// Forgets the client for this uri and token. The next `get_or_create` builds a new one.
    pub fn remove(&self, uri: &str, token: Option<&str>) -> Option<Client<M>> {
        self.clients
            .lock()
            .remove(&(uri.to_string(), token.map(str::to_string)))
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.clients.lock().clear();
    }
}

#[cfg(feature = "default-exchanges")]
pub use configured::*;

#[cfg(feature = "default-exchanges")]
mod configured {
    use super::{ClientConfig, ClientRegistry};
    use crate::{
        cache::{Cache, InMemoryCache},
        client::{Client, ClientBuilder, DefaultExchanges},
        state_link::{StateLinkExchange, StateLinkExchangeImpl}
    };
    use std::sync::Arc;

    /// The exchange chain of a client built from a [`ClientConfig`](struct.ClientConfig.html):
    /// the default exchanges with local resolvers in front.
    pub type ConfiguredExchanges = StateLinkExchangeImpl<DefaultExchanges>;
    pub type ConfiguredClient = Client<ConfiguredExchanges>;

    lazy_static! {
        static ref CLIENTS: ClientRegistry<ConfiguredExchanges> = ClientRegistry::new(build_client);
    }

    /// The process-wide registry.
    pub fn client_registry() -> &'static ClientRegistry<ConfiguredExchanges> {
        &CLIENTS
    }

    /// The memoized client for `config.uri` and `token`, from the process-wide registry.
    pub fn get_or_create_client(config: &ClientConfig, token: Option<&str>) -> ConfiguredClient {
        client_registry().get_or_create(config, token).0
    }

    pub fn build_client(config: &ClientConfig, token: Option<&str>) -> ConfiguredClient {
        let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::with_custom_keys(config.custom_keys.clone()));
        ClientBuilder::new(config.uri.clone())
            .with_cache(cache.clone())
            .with_auth_token(token)
            .with_default_exchanges()
            .with_exchange(StateLinkExchange::new(cache, config.resolvers()))
            .build()
    }
}
