use rescape::{output_params::OutputParams, request::ApolloConfig, state_link::{read_client_only_fields, CacheTarget}};
use rescape_stores::{
    settings::save_settings,
    user::{user_scope_objs, ScopeKind},
    StoreError
};
use rescape_test::{
    mock_client, params, region_output_params, sample_settings, settings_config, settings_output_params,
    MockExchange
};
use serde_json::{json, Map, Value};

fn props(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn user_regions_resolve_to_full_regions() {
    let mock = MockExchange::with_responses(vec![
        (
            "userStates",
            json!([{
                "id": 5,
                "data": {"userRegions": [{"region": {"id": 2}}, {"region": {"id": 1}}, {"region": {"id": 8}}]}
            }])
        ),
        (
            "regions",
            json!([
                {"id": 1, "key": "belgium", "name": "Belgium", "data": {"locations": {}}},
                {"id": 2, "key": "norway", "name": "Norway", "data": {"locations": {}}}
            ])
        ),
    ]);
    let config = ApolloConfig::new(mock_client(mock.clone()));

    let user_regions = user_scope_objs(
        &config,
        ScopeKind::Region,
        region_output_params(),
        &props(json!({"user": {"id": 9}})),
        &props(json!({"deleted": false}))
    )
    .unwrap()
    .await
    .unwrap();

    // Region 8 no longer exists on the server
    assert_eq!(
        user_regions
            .iter()
            .map(|user_region| user_region["region"]["key"].clone())
            .collect::<Vec<_>>(),
        vec![json!("norway"), json!("belgium")]
    );
    assert_eq!(mock.operation_names(), vec!["userStates", "regions"]);
    assert_eq!(
        mock.operations()[1].query.variables,
        props(json!({"deleted": false, "idIn": [2, 1, 8]}))
    );
}

#[tokio::test]
async fn no_user_regions_skips_the_region_query() {
    let mock = MockExchange::with_responses(vec![("userStates", json!([{"id": 5, "data": {}}]))]);
    let config = ApolloConfig::new(mock_client(mock.clone()));

    let user_regions = user_scope_objs(
        &config,
        ScopeKind::Region,
        region_output_params(),
        &props(json!({"user": {"id": 9}})),
        &Map::new()
    )
    .unwrap()
    .await
    .unwrap();

    assert!(user_regions.is_empty());
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn saved_settings_keep_their_cache_only_parts_locally() {
    let saved = json!({
        "id": 1,
        "key": "default",
        "__typename": "SettingsType",
        "data": {"__typename": "SettingsDataType", "domain": "localhost"}
    });
    let mock = MockExchange::with_responses(vec![("updateSettings", json!({ "settings": saved }))]);
    let client = mock_client(mock.clone());
    let config = ApolloConfig::new(client.clone());

    let settings = save_settings(
        &config,
        &settings_config(),
        params(settings_output_params(false)),
        &props(sample_settings())
    )
    .unwrap()
    .await
    .unwrap();

    assert_eq!(settings["data"]["testAuthorization"]["password"], json!("testpass"));
    let sent = &mock.operations()[0].query;
    assert!(!sent.query.contains("testAuthorization"));
    assert_eq!(sent.variables["data"]["data"].get("testAuthorization"), None);

    let selection: OutputParams = params(json!([{"data": [{"testAuthorization": ["username"]}]}]));
    assert_eq!(
        read_client_only_fields(
            client.cache().as_ref(),
            &CacheTarget::entity("SettingsType", json!(1)),
            &selection
        ),
        Some(json!({"data": {"testAuthorization": {"username": "test"}}}))
    );
}

#[tokio::test]
async fn failed_saves_write_nothing() {
    let mock = MockExchange::with_responses(Vec::<(&str, Value)>::new());
    let client = mock_client(mock);
    let config = ApolloConfig::new(client.clone());

    let result = save_settings(
        &config,
        &settings_config(),
        params(settings_output_params(false)),
        &props(sample_settings())
    )
    .unwrap()
    .await;

    assert!(matches!(result, Err(StoreError::GraphQL(_))));
    assert_eq!(client.cache().read_query(&params(json!([{"settings": ["id"]}]))), None);
}
