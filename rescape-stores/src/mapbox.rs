//! Mapbox state resolved across scopes.
//!
//! Every scope can store its own `mapbox` settings: the global settings, a region, a
//! project, and the user's state (globally and per region or project). The effective state is
//! each present scope layered over the previous ones in a fixed order, from the most general
//! to the most specific:
//!
//! `Global`, `Project`, `Region`, `UserGlobal`, `UserRegion`, `UserProject`
//!
//! Object-valued keys (such as `viewport`) merge their fields one level down, anything else is
//! replaced. Scope queries run concurrently. A scope that fails is logged and left out.

use crate::{
    expect_data, project::projects_query, region::regions_query, settings::settings_query,
    user::user_states_query, StoreError
};
use futures::future::{join_all, FutureExt};
use rescape::{
    exchange::Exchange,
    output_params::{field, object, OutputParam, OutputParams},
    request::{query_container, ApolloConfig, QueryContainer, RequestOptions},
    utils::{path, req_path},
    Error, Response, Result
};
use serde_json::{Map, Value};
use std::fmt;

lazy_static! {
    static ref MAPBOX_OUTPUT_PARAMS: OutputParams = OutputParams(vec![object(
        "mapbox",
        vec![object("viewport", vec![field("latitude"), field("longitude"), field("zoom")])]
    )]);
}

/// `mapbox { viewport { latitude longitude zoom } }`
pub fn mapbox_output_params() -> OutputParams {
    MAPBOX_OUTPUT_PARAMS.clone()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Scope {
    Global,
    Project,
    Region,
    UserGlobal,
    UserRegion,
    UserProject
}

impl Scope {
    /// Least to most specific. Later scopes override earlier ones.
    pub const FOLD_ORDER: [Scope; 6] = [
        Scope::Global,
        Scope::Project,
        Scope::Region,
        Scope::UserGlobal,
        Scope::UserRegion,
        Scope::UserProject
    ];
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A user state query narrowed to one of the user's regions or projects.
#[derive(Debug, Clone, PartialEq)]
pub struct UserScopeInput {
    /// Props for the user state query, e.g. `{user: {id: 7}}`
    pub user: Map<String, Value>,
    /// The id of the region or project entry to read
    pub scope_id: Value
}

/// The props for each scope. Scopes without props are skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeInputs {
    /// Props for the settings query, e.g. `{key: "default"}`
    pub global: Option<Map<String, Value>>,
    pub project: Option<Map<String, Value>>,
    pub region: Option<Map<String, Value>>,
    /// Props for the user state query, e.g. `{user: {id: 7}}`
    pub user_global: Option<Map<String, Value>>,
    pub user_region: Option<UserScopeInput>,
    pub user_project: Option<UserScopeInput>
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ScopeState {
    /// No props were given, or the request was skipped
    Skipped,
    /// The scope's mapbox settings
    Resolved(Value),
    /// The query failed or its response lacked the mapbox settings
    Failed(String)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapboxState {
    /// The merged settings
    pub mapbox: Value,
    /// The outcome of every scope, in fold order
    pub scopes: Vec<(Scope, ScopeState)>
}

impl MapboxState {
    pub fn scope(&self, scope: Scope) -> Option<&ScopeState> {
        self.scopes
            .iter()
            .find(|(candidate, _)| *candidate == scope)
            .map(|(_, state)| state)
    }
}

/// The selection each scope's query needs around the mapbox fragment.
pub fn scope_output_params(scope: Scope, mapbox_output_params: &OutputParams) -> OutputParams {
    let with_id = |extra: Vec<OutputParam>| {
        let mut params = vec![OutputParam::Field("id".to_string())];
        params.extend(extra);
        OutputParams(params)
    };
    let fragment = mapbox_output_params.0.clone();
    match scope {
        Scope::Global | Scope::Project | Scope::Region => with_id(fragment),
        Scope::UserGlobal => with_id(vec![object("data", vec![object("userGlobal", fragment)])]),
        Scope::UserRegion | Scope::UserProject => {
            let (field, scope_name) = user_scope_names(scope);
            let mut entry = vec![object(scope_name, vec![OutputParam::Field("id".to_string())])];
            entry.extend(fragment);
            with_id(vec![object("data", vec![object(field, entry)])])
        }
    }
}

fn user_scope_names(scope: Scope) -> (&'static str, &'static str) {
    match scope {
        Scope::UserProject => ("userProjects", "project"),
        _ => ("userRegions", "region")
    }
}

fn scope_query(scope: Scope, output_params: OutputParams) -> QueryContainer {
    match scope {
        Scope::Global => settings_query(output_params),
        Scope::Project => projects_query(output_params),
        Scope::Region => regions_query(output_params),
        Scope::UserGlobal | Scope::UserRegion | Scope::UserProject => user_states_query(output_params)
    }
}

fn scope_props(scope: Scope, inputs: &ScopeInputs) -> Option<&Map<String, Value>> {
    match scope {
        Scope::Global => inputs.global.as_ref(),
        Scope::Project => inputs.project.as_ref(),
        Scope::Region => inputs.region.as_ref(),
        Scope::UserGlobal => inputs.user_global.as_ref(),
        Scope::UserRegion => inputs.user_region.as_ref().map(|input| &input.user),
        Scope::UserProject => inputs.user_project.as_ref().map(|input| &input.user)
    }
}

/// Pulls the scope's `mapbox` out of its response data.
fn extract(scope: Scope, data: &Value, inputs: &ScopeInputs) -> Result<Value> {
    let mapbox_path = match scope {
        Scope::Global => "settings.0.mapbox",
        Scope::Project => "projects.0.mapbox",
        Scope::Region => "regions.0.mapbox",
        Scope::UserGlobal => "userStates.0.data.userGlobal.mapbox",
        Scope::UserRegion | Scope::UserProject => {
            let (field, scope_name) = user_scope_names(scope);
            let scope_id = match scope {
                Scope::UserRegion => inputs.user_region.as_ref(),
                _ => inputs.user_project.as_ref()
            }
            .map(|input| &input.scope_id);
            let entries_path = format!("userStates.0.data.{}", field);
            let entry = req_path(&entries_path, data)?
                .as_array()
                .and_then(|entries| {
                    entries
                        .iter()
                        .find(|entry| scope_id.is_some() && path(&format!("{}.id", scope_name), entry) == scope_id)
                })
                .ok_or_else(|| Error::MissingRequiredPath(format!("{}.{}.id", entries_path, scope_name)))?;
            return req_path("mapbox", entry).map(Value::clone);
        }
    };
    req_path(mapbox_path, data).map(Value::clone)
}

fn settle(scope: Scope, inputs: &ScopeInputs, result: std::result::Result<Response, StoreError>) -> ScopeState {
    let outcome = result.and_then(|response| {
        if response.skip {
            return Ok(None);
        }
        let data = response.data.unwrap_or(Value::Null);
        Ok(Some(extract(scope, &data, inputs)?))
    });
    match outcome {
        Ok(None) => ScopeState::Skipped,
        Ok(Some(mapbox)) => ScopeState::Resolved(mapbox),
        Err(e) => {
            tracing::warn!(scope = %scope, error = %e, "mapbox scope failed, leaving it out");
            ScopeState::Failed(e.to_string())
        }
    }
}

/// Layers `layer` over `merged`. Object values merge one level down, others replace.
pub fn merge_mapbox_layer(merged: &mut Map<String, Value>, layer: &Value) {
    let layer = match layer {
        Value::Object(layer) => layer,
        _ => return
    };
    for (key, value) in layer {
        match (merged.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(fields)) => {
                for (field, field_value) in fields {
                    existing.insert(field.clone(), field_value.clone());
                }
            }
            _ => {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Folds resolved scopes in fold order.
pub fn fold_scopes(scopes: &[(Scope, ScopeState)]) -> Value {
    let mut merged = Map::new();
    for scope in Scope::FOLD_ORDER.iter() {
        let resolved = scopes.iter().find_map(|(candidate, state)| match state {
            ScopeState::Resolved(mapbox) if candidate == scope => Some(mapbox),
            _ => None
        });
        if let Some(mapbox) = resolved {
            merge_mapbox_layer(&mut merged, mapbox);
        }
    }
    Value::Object(merged)
}

/// Queries every scope that has props and merges their mapbox settings.
///
/// Building the queries can fail (no client, bad props). Once they are running, failures are
/// per scope and never fail the call.
pub async fn resolve_mapbox_state<M: Exchange>(
    config: &ApolloConfig<M>,
    mapbox_output_params: &OutputParams,
    inputs: &ScopeInputs
) -> Result<MapboxState> {
    if mapbox_output_params.is_empty() {
        return Err(Error::EmptyOutputParams("mapbox".to_string()));
    }
    let scope_config = ApolloConfig {
        client: config.client.clone(),
        options: RequestOptions {
            variables: None,
            ..config.options.clone()
        }
    };

    let mut tasks = Vec::new();
    for scope in Scope::FOLD_ORDER.iter().copied() {
        if let Some(props) = scope_props(scope, inputs) {
            let query = scope_query(scope, scope_output_params(scope, mapbox_output_params));
            let task = query_container(&scope_config, &query, props)?.into_task()?;
            tasks.push(expect_data(task).map(move |result| (scope, result)));
        }
    }
    tracing::debug!(scopes = tasks.len(), "resolving mapbox state");

    let mut settled: Vec<(Scope, ScopeState)> = join_all(tasks)
        .await
        .into_iter()
        .map(|(scope, result)| (scope, settle(scope, inputs, result)))
        .collect();
    for scope in Scope::FOLD_ORDER.iter().copied() {
        if settled.iter().all(|(candidate, _)| *candidate != scope) {
            settled.push((scope, ScopeState::Skipped));
        }
    }
    settled.sort_by_key(|(scope, _)| Scope::FOLD_ORDER.iter().position(|candidate| candidate == scope));

    Ok(MapboxState {
        mapbox: fold_scopes(&settled),
        scopes: settled
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mapbox_selection_renders() {
        assert_eq!(
            mapbox_output_params().to_string(),
            "mapbox { viewport { latitude longitude zoom } }"
        );
    }

    #[test]
    fn later_scopes_override_per_viewport_field() {
        let mut merged = Map::new();
        merge_mapbox_layer(
            &mut merged,
            &json!({"viewport": {"latitude": 10, "longitude": 20, "zoom": 3}, "style": "streets"})
        );
        merge_mapbox_layer(&mut merged, &json!({"viewport": {"zoom": 9}, "style": "dark"}));

        assert_eq!(
            Value::Object(merged),
            json!({"viewport": {"latitude": 10, "longitude": 20, "zoom": 9}, "style": "dark"})
        );
    }

    #[test]
    fn fold_order_is_fixed() {
        // Listed out of order on purpose
        let scopes = vec![
            (Scope::UserRegion, ScopeState::Resolved(json!({"viewport": {"zoom": 12}}))),
            (Scope::Region, ScopeState::Resolved(json!({"viewport": {"zoom": 6, "latitude": 1}}))),
            (Scope::Project, ScopeState::Resolved(json!({"viewport": {"zoom": 4, "longitude": 2}}))),
            (Scope::Global, ScopeState::Resolved(json!({"viewport": {"zoom": 1}}))),
            (Scope::UserGlobal, ScopeState::Failed("gone".to_string()))
        ];

        assert_eq!(
            fold_scopes(&scopes),
            json!({"viewport": {"zoom": 12, "latitude": 1, "longitude": 2}})
        );
    }

    #[test]
    fn user_scopes_select_their_entry() {
        let params = scope_output_params(Scope::UserRegion, &mapbox_output_params());
        assert_eq!(
            params.to_string(),
            "id data { userRegions { region { id } mapbox { viewport { latitude longitude zoom } } } }"
        );

        let inputs = ScopeInputs {
            user_region: Some(UserScopeInput {
                user: Map::new(),
                scope_id: json!(2)
            }),
            ..ScopeInputs::default()
        };
        let data = json!({"userStates": [{"id": 1, "data": {"userRegions": [
            {"region": {"id": 1}, "mapbox": {"viewport": {"zoom": 1}}},
            {"region": {"id": 2}, "mapbox": {"viewport": {"zoom": 2}}}
        ]}}]});

        assert_eq!(
            extract(Scope::UserRegion, &data, &inputs),
            Ok(json!({"viewport": {"zoom": 2}}))
        );
        assert!(extract(Scope::UserProject, &data, &inputs).is_err());
    }
}
