use rescape::request::ApolloConfig;
use rescape_stores::mapbox::{
    mapbox_output_params, resolve_mapbox_state, Scope, ScopeInputs, ScopeState, UserScopeInput
};
use rescape_test::{mock_client, MockExchange};
use serde_json::{json, Map, Value};

fn props(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

/// Every scope answers with its own mapbox settings. Projects can be made to fail.
fn scopes_mock(projects_fail: bool) -> MockExchange {
    MockExchange::new(move |operation| match &*operation.meta.operation_name {
        "settings" => json!({"data": {"settings": [{
            "id": 1,
            "mapbox": {"viewport": {"latitude": 0, "longitude": 0, "zoom": 1}, "style": "light"}
        }]}}),
        "projects" if projects_fail => json!({
            "data": null,
            "errors": [{"message": "Project matching query does not exist."}]
        }),
        "projects" => json!({"data": {"projects": [{
            "id": 3,
            "mapbox": {"viewport": {"zoom": 4}}
        }]}}),
        "regions" => json!({"data": {"regions": [{
            "id": 1,
            "mapbox": {"viewport": {"latitude": 49.25, "longitude": -123.1, "zoom": 7}, "style": "streets"}
        }]}}),
        "userStates" => json!({"data": {"userStates": [{
            "id": 5,
            "data": {
                "userGlobal": {"mapbox": {"viewport": {"zoom": 2}}},
                "userRegions": [
                    {"region": {"id": 2}, "mapbox": {"viewport": {"zoom": 3}}},
                    {"region": {"id": 1}, "mapbox": {"viewport": {"zoom": 11}}}
                ]
            }
        }]}}),
        other => json!({"data": null, "errors": [{"message": format!("unexpected {}", other)}]})
    })
}

#[tokio::test]
async fn a_single_scope_is_the_whole_state() {
    let mock = scopes_mock(false);
    let config = ApolloConfig::new(mock_client(mock.clone()));
    let inputs = ScopeInputs {
        region: Some(props(json!({"id": 1}))),
        ..ScopeInputs::default()
    };

    let state = resolve_mapbox_state(&config, &mapbox_output_params(), &inputs).await.unwrap();

    assert_eq!(mock.calls(), 1);
    assert_eq!(
        state.mapbox,
        json!({"viewport": {"latitude": 49.25, "longitude": -123.1, "zoom": 7}, "style": "streets"})
    );
    assert_eq!(state.scope(Scope::Region), Some(&ScopeState::Resolved(state.mapbox.clone())));
    assert_eq!(state.scope(Scope::Global), Some(&ScopeState::Skipped));
    assert_eq!(state.scopes.len(), 6);
}

#[tokio::test]
async fn user_region_overrides_region() {
    let mock = scopes_mock(false);
    let config = ApolloConfig::new(mock_client(mock.clone()));
    let inputs = ScopeInputs {
        region: Some(props(json!({"id": 1}))),
        user_region: Some(UserScopeInput {
            user: props(json!({"user": {"id": 9, "username": "test"}})),
            scope_id: json!(1)
        }),
        ..ScopeInputs::default()
    };

    let state = resolve_mapbox_state(&config, &mapbox_output_params(), &inputs).await.unwrap();

    assert_eq!(mock.calls(), 2);
    assert_eq!(
        state.mapbox,
        json!({"viewport": {"latitude": 49.25, "longitude": -123.1, "zoom": 11}, "style": "streets"})
    );

    let user_state_request = mock
        .operations()
        .into_iter()
        .find(|operation| &*operation.meta.operation_name == "userStates")
        .unwrap();
    assert_eq!(user_state_request.query.variables, props(json!({"user": {"id": 9}})));
}

#[tokio::test]
async fn a_failing_scope_is_left_out() {
    let mock = scopes_mock(true);
    let config = ApolloConfig::new(mock_client(mock.clone()));
    let inputs = ScopeInputs {
        global: Some(Map::new()),
        project: Some(props(json!({"id": 3}))),
        region: Some(props(json!({"id": 1}))),
        ..ScopeInputs::default()
    };

    let state = resolve_mapbox_state(&config, &mapbox_output_params(), &inputs).await.unwrap();

    assert_eq!(mock.calls(), 3);
    assert_eq!(
        state.mapbox,
        json!({"viewport": {"latitude": 49.25, "longitude": -123.1, "zoom": 7}, "style": "streets"})
    );
    assert!(matches!(state.scope(Scope::Project), Some(ScopeState::Failed(_))));
    assert!(matches!(state.scope(Scope::Global), Some(ScopeState::Resolved(_))));
}

#[tokio::test]
async fn every_scope_in_fold_order() {
    let mock = scopes_mock(false);
    let config = ApolloConfig::new(mock_client(mock.clone()));
    let user = props(json!({"user": {"id": 9}}));
    let inputs = ScopeInputs {
        global: Some(Map::new()),
        project: Some(props(json!({"id": 3}))),
        region: Some(props(json!({"id": 1}))),
        user_global: Some(user.clone()),
        user_region: Some(UserScopeInput {
            user: user.clone(),
            scope_id: json!(2)
        }),
        // The user state has no project entries
        user_project: Some(UserScopeInput {
            user,
            scope_id: json!(3)
        })
    };

    let state = resolve_mapbox_state(&config, &mapbox_output_params(), &inputs).await.unwrap();

    assert_eq!(mock.calls(), 6);
    assert_eq!(
        state.mapbox,
        json!({"viewport": {"latitude": 49.25, "longitude": -123.1, "zoom": 3}, "style": "streets"})
    );
    assert!(matches!(state.scope(Scope::UserProject), Some(ScopeState::Failed(_))));
    assert_eq!(
        state.scopes.iter().map(|(scope, _)| *scope).collect::<Vec<_>>(),
        Scope::FOLD_ORDER.to_vec()
    );
}

#[tokio::test]
async fn deferred_configs_are_rejected_up_front() {
    let config: ApolloConfig = ApolloConfig::deferred();
    let inputs = ScopeInputs {
        region: Some(props(json!({"id": 1}))),
        ..ScopeInputs::default()
    };

    assert_eq!(
        resolve_mapbox_state(&config, &mapbox_output_params(), &inputs).await,
        Err(rescape::Error::MissingClient)
    );
}
