//! Regions: the geographic scope objects.

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
    static ref REGION_OUTPUT_PARAMS: OutputParams = OutputParams(vec![
        field("id"),
        field("key"),
        field("name"),
        object("geojson", vec![object("features", vec![field("type")])]),
        object("data", vec![object("locations", vec![field("params")])])
    ]);
}

/// The fields most screens need.
pub fn region_output_params() -> OutputParams {
    REGION_OUTPUT_PARAMS.clone()
}

/// `geojson` is a feature collection and needs its own input type.
pub fn region_read_input_type_mapper() -> InputTypeMapper {
    let mut mapper = default_read_input_type_mapper("regions");
    mapper.insert(
        "geojson".to_string(),
        "FeatureCollectionDataTypeofRegionTypeRelatedReadInputType".to_string()
    );
    mapper
}

pub fn regions_query(output_params: OutputParams) -> QueryContainer {
    QueryContainer::new("regions", output_params).with_input_type_mapper(region_read_input_type_mapper())
}

/// `regions(<props>) { <output_params> }`
pub fn regions_query_container<M: Exchange>(
    config: &ApolloConfig<M>,
    output_params: OutputParams,
    props: &Map<String, Value>
) -> Result<Container> {
    query_container(config, &regions_query(output_params), props)
}

/// `createRegion` or, when `props` has an `id`, `updateRegion`.
pub fn region_mutation_container<M: Exchange>(
    config: &ApolloConfig<M>,
    output_params: OutputParams,
    props: &Map<String, Value>
) -> Result<Container> {
    mutation_request_container(config, &MutationContainer::new("region", output_params), props)
}
