use rescape::{
    cache::Cache,
    config::{ClientConfig, SettingsConfig},
    output_params::OutputParams,
    state_link::create_state_link_defaults,
    Result
};
use serde_json::{json, Value};

use crate::URL;

pub fn region_output_params() -> OutputParams {
    params(json!(["id", "key", "name", {"data": ["locations"]}]))
}

pub fn project_output_params() -> OutputParams {
    params(json!(["id", "key", "name", {"region": ["id", "key"]}]))
}

/// The settings selection. `omit_cache_only` leaves out the `@client` parts, which is what a
/// cache lookup before the client-side write needs.
pub fn settings_output_params(omit_cache_only: bool) -> Value {
    let mut data = vec![
        json!("domain"),
        json!({"api": ["protocol", "host", "port", "path"]}),
        json!({"overpass": ["cellSize", "sleepBetweenCalls"]})
    ];
    if !omit_cache_only {
        data.push(json!({"testAuthorization @client": ["username", "password"]}));
    }
    json!(["id", "key", {"data": data}])
}

pub fn settings_config() -> SettingsConfig {
    SettingsConfig {
        cache_only_objs: vec![
            "data.testAuthorization".to_string(),
            "data.mapbox.mapboxApiAccessToken".to_string()
        ],
        cache_id_props: vec![
            "id".to_string(),
            "__typename".to_string(),
            "data.__typename".to_string()
        ],
        settings_output_params: settings_output_params(false)
    }
}

/// A settings record as the server sends it back, plus its cache-only parts.
pub fn sample_settings() -> Value {
    json!({
        "id": 1,
        "key": "default",
        "__typename": "SettingsType",
        "data": {
            "__typename": "SettingsDataType",
            "domain": "localhost",
            "api": {"protocol": "http", "host": "localhost", "port": "8008", "path": "/graphql/"},
            "overpass": {"cellSize": 100, "sleepBetweenCalls": 1000},
            "testAuthorization": {"username": "test", "password": "testpass"},
            "mapbox": {"mapboxApiAccessToken": "pk.sample", "viewport": {"latitude": 0, "longitude": 0, "zoom": 1}}
        }
    })
}

/// A config whose defaults are the state link defaults for the sample settings.
pub fn client_config() -> ClientConfig {
    ClientConfig::new(URL)
        .with_settings_config(settings_config())
        .with_write_defaults(write_sample_defaults)
}

pub fn write_sample_defaults(cache: &dyn Cache, _settings_config: &SettingsConfig) -> Result<()> {
    cache.write_query(&create_state_link_defaults(&json!({})))
}

pub fn params(value: Value) -> OutputParams {
    OutputParams::from_value(&value).expect("sample output params are valid")
}
