//! Users and user state.
//!
//! A user's state keeps per-scope settings: `data.userRegions` and `data.userProjects` each
//! hold `{region: {id}, ...}` or `{project: {id}, ...}` entries next to whatever the user
//! stored for that scope (mapbox viewport, selections).

use crate::{expect_data, project::projects_query, region::regions_query, StoreError};
use futures::future::{BoxFuture, FutureExt};
use rescape::{
    exchange::Exchange,
    output_params::{field, object, OutputParams},
    query::InputTypeMapper,
    request::{
        default_read_input_type_mapper, mutation_request_container, query_container, ApolloConfig,
        Container, MutationContainer, QueryContainer, RequestOptions
    },
    utils::path,
    Result
};
use serde_json::{json, Map, Value};

lazy_static! {
    static ref USER_OUTPUT_PARAMS: OutputParams = OutputParams(
        ["id", "username", "email", "firstName", "lastName", "isActive", "dateJoined"]
            .iter()
            .map(|name| field(*name))
            .collect()
    );
}

pub fn user_output_params() -> OutputParams {
    USER_OUTPUT_PARAMS.clone()
}

/// The user the client's token belongs to. Takes no arguments.
pub fn current_user_query_container<M: Exchange>(
    config: &ApolloConfig<M>,
    output_params: OutputParams
) -> Result<Container> {
    let config = ApolloConfig {
        client: config.client.clone(),
        options: RequestOptions {
            variables: None,
            ..config.options.clone()
        }
    };
    query_container(&config, &QueryContainer::new("currentUser", output_params), &Map::new())
}

pub fn user_state_read_input_type_mapper() -> InputTypeMapper {
    let mut mapper = default_read_input_type_mapper("userStates");
    mapper.insert("user".to_string(), "UserTypeofUserStateTypeRelatedReadInputType".to_string());
    mapper
}

/// Only the user's id is ever sent when querying user states.
pub fn user_states_query(output_params: OutputParams) -> QueryContainer {
    QueryContainer::new("userStates", output_params)
        .with_input_type_mapper(user_state_read_input_type_mapper())
        .with_normalize_props(|props| {
            props
                .iter()
                .map(|(key, value)| match (key.as_str(), value.get("id")) {
                    ("user", Some(id)) => (key.clone(), json!({ "id": id })),
                    _ => (key.clone(), value.clone())
                })
                .collect()
        })
}

pub fn user_states_query_container<M: Exchange>(
    config: &ApolloConfig<M>,
    output_params: OutputParams,
    props: &Map<String, Value>
) -> Result<Container> {
    query_container(config, &user_states_query(output_params), props)
}

pub fn user_state_mutation_container<M: Exchange>(
    config: &ApolloConfig<M>,
    output_params: OutputParams,
    props: &Map<String, Value>
) -> Result<Container> {
    mutation_request_container(config, &MutationContainer::new("userState", output_params), props)
}

/// The scopes a user state keeps entries for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScopeKind {
    Region,
    Project
}

impl ScopeKind {
    /// `region`
    pub fn name(self) -> &'static str {
        match self {
            ScopeKind::Region => "region",
            ScopeKind::Project => "project"
        }
    }

    /// The user state field holding this scope's entries, `userRegions`
    pub fn user_scope_field(self) -> &'static str {
        match self {
            ScopeKind::Region => "userRegions",
            ScopeKind::Project => "userProjects"
        }
    }

    fn query(self, output_params: OutputParams) -> QueryContainer {
        match self {
            ScopeKind::Region => regions_query(output_params),
            ScopeKind::Project => projects_query(output_params)
        }
    }
}

/// `[id, {data: [{userRegions: [{region: [id]}]}]}]`
pub fn user_scope_ids_output_params(kind: ScopeKind) -> OutputParams {
    OutputParams(vec![
        field("id"),
        object(
            "data",
            vec![object(kind.user_scope_field(), vec![object(kind.name(), vec![field("id")])])]
        )
    ])
}

fn scope_ids(kind: ScopeKind, user_state: &Value) -> Vec<Value> {
    path(&format!("userStates.0.data.{}", kind.user_scope_field()), user_state)
        .and_then(Value::as_array)
        .map(|user_scopes| {
            user_scopes
                .iter()
                .filter_map(|user_scope| path(&format!("{}.id", kind.name()), user_scope).cloned())
                .collect()
        })
        .unwrap_or_default()
}

/// The user's scope entries with each scope object resolved in full.
///
/// Queries the user state for the ids of the user's regions (or projects), then queries
/// those scope objects with `scope_props` narrowed to the ids. Resolves to one
/// `{<scope>: <scope object>}` per matching entry, in the user state's order.
pub fn user_scope_objs<M: Exchange>(
    config: &ApolloConfig<M>,
    kind: ScopeKind,
    scope_output_params: OutputParams,
    user_state_props: &Map<String, Value>,
    scope_props: &Map<String, Value>
) -> Result<BoxFuture<'static, std::result::Result<Vec<Value>, StoreError>>> {
    let plain = ApolloConfig {
        client: config.client.clone(),
        options: RequestOptions::default()
    };
    let user_state_task =
        user_states_query_container(&plain, user_scope_ids_output_params(kind), user_state_props)?.into_task()?;
    let scope_props = scope_props.clone();

    Ok(async move {
        let user_state = expect_data(user_state_task).await?.data.unwrap_or(Value::Null);
        let ids = scope_ids(kind, &user_state);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut props = scope_props;
        props.insert("idIn".to_string(), Value::Array(ids.clone()));
        let scope_task = query_container(&plain, &kind.query(scope_output_params), &props)?.into_task()?;
        let response = expect_data(scope_task).await?;
        let objs = response
            .data
            .as_ref()
            .and_then(|data| data.get(format!("{}s", kind.name())))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        tracing::debug!(scope = kind.name(), found = objs.len(), requested = ids.len(), "resolved user scope objects");
        Ok::<_, StoreError>(ids
            .iter()
            .filter_map(|id| objs.iter().find(|obj| obj.get("id") == Some(id)))
            .map(|obj| {
                let mut user_scope = Map::new();
                user_scope.insert(kind.name().to_string(), obj.clone());
                Value::Object(user_scope)
            })
            .collect())
    }
    .boxed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_selections_render() {
        assert_eq!(
            user_output_params().to_string(),
            "id username email firstName lastName isActive dateJoined"
        );
        assert_eq!(
            user_scope_ids_output_params(ScopeKind::Project).to_string(),
            "id data { userProjects { project { id } } }"
        );
    }

    #[test]
    fn user_states_only_send_the_user_id() {
        let config: ApolloConfig = ApolloConfig::deferred();
        let props = json!({"user": {"id": 7, "username": "test"}}).as_object().cloned().unwrap();
        let request = match user_states_query_container(&config, user_scope_ids_output_params(ScopeKind::Region), &props)
            .unwrap()
        {
            Container::Deferred(request) => request,
            Container::Task(_) => panic!("expected a deferred request")
        };

        assert_eq!(request.variables["user"], json!({"id": 7}));
        assert_eq!(
            request.document.source(),
            "query userStates($user: UserTypeofUserStateTypeRelatedReadInputType!) { userStates(user: $user) { id data { userRegions { region { id } } } } }"
        );
    }

    #[test]
    fn reads_scope_ids_from_user_state() {
        let user_state = json!({
            "userStates": [{
                "id": 1,
                "data": {"userProjects": [{"project": {"id": 4}}, {"project": {"id": 9}}, {"mapbox": {}}]}
            }]
        });

        assert_eq!(scope_ids(ScopeKind::Project, &user_state), vec![json!(4), json!(9)]);
        assert!(scope_ids(ScopeKind::Region, &user_state).is_empty());
    }

    #[test]
    fn deferred_configs_cannot_chain_requests() {
        let config: ApolloConfig = ApolloConfig::deferred();
        assert_eq!(
            user_scope_objs(&config, ScopeKind::Region, crate::region::region_output_params(), &Map::new(), &Map::new())
                .err(),
            Some(rescape::Error::MissingClient)
        );
    }
}
