//! Projects. A project belongs to a region and to the user that created it.

use rescape::{
    exchange::Exchange,
    output_params::{field, object, OutputParams},
    query::InputTypeMapper,
    request::{
        default_read_input_type_mapper, mutation_request_container, query_container, ApolloConfig,
        Container, MutationContainer, QueryContainer
    },
    Result
};
use serde_json::{Map, Value};

lazy_static! {
    static ref PROJECT_OUTPUT_PARAMS: OutputParams = OutputParams(vec![
        field("id"),
        field("key"),
        field("name"),
        object("region", vec![field("id"), field("key")]),
        object("user", vec![field("id")]),
        object("data", vec![object("locations", vec![field("params")])])
    ]);
}

pub fn project_output_params() -> OutputParams {
    PROJECT_OUTPUT_PARAMS.clone()
}

pub fn project_read_input_type_mapper() -> InputTypeMapper {
    let mut mapper = default_read_input_type_mapper("projects");
    mapper.insert("region".to_string(), "RegionTypeofProjectTypeRelatedReadInputType".to_string());
    mapper.insert("user".to_string(), "UserTypeofProjectTypeRelatedReadInputType".to_string());
    mapper
}

pub fn projects_query(output_params: OutputParams) -> QueryContainer {
    QueryContainer::new("projects", output_params).with_input_type_mapper(project_read_input_type_mapper())
}

pub fn projects_query_container<M: Exchange>(
    config: &ApolloConfig<M>,
    output_params: OutputParams,
    props: &Map<String, Value>
) -> Result<Container> {
    query_container(config, &projects_query(output_params), props)
}

pub fn project_mutation_container<M: Exchange>(
    config: &ApolloConfig<M>,
    output_params: OutputParams,
    props: &Map<String, Value>
) -> Result<Container> {
    mutation_request_container(config, &MutationContainer::new("project", output_params), props)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn project_selection_renders() {
        assert_eq!(
            project_output_params().to_string(),
            "id key name region { id key } user { id } data { locations { params } }"
        );
    }
    use rescape::{request::DeferredRequest, Error};

    #[test]
    fn structured_arguments_use_the_mapper() {
        let config: ApolloConfig = ApolloConfig::deferred();
        let props = json!({"region": {"id": 1, "__typename": "RegionType"}})
            .as_object()
            .cloned()
            .unwrap();

        let request = match projects_query_container(&config, project_output_params(), &props).unwrap() {
            Container::Deferred(request) => request,
            Container::Task(_) => panic!("expected a deferred request")
        };
        let DeferredRequest { document, variables, .. } = request;

        assert!(document
            .source()
            .starts_with("query projects($region: RegionTypeofProjectTypeRelatedReadInputType!) { projects(region: $region) {"));
        assert_eq!(variables["region"], json!({"id": 1}));
    }

    #[test]
    fn unmapped_structures_are_rejected() {
        let config: ApolloConfig = ApolloConfig::deferred();
        let props = json!({"location": {"id": 1}}).as_object().cloned().unwrap();

        assert_eq!(
            projects_query_container(&config, project_output_params(), &props).err(),
            Some(Error::UnresolvedInputType("location".to_string()))
        );
    }
}
