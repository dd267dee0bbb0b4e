//! Request containers.
//!
//! A container turns a query or mutation description plus the caller's props into either a
//! running task (when the config carries a [`Client`](../struct.Client.html)) or a
//! [`DeferredRequest`](struct.DeferredRequest.html) the caller runs later. All contract checks
//! happen while the container is built, so a returned task can only fail with a transport error.

use crate::{
    client::Client,
    default_exchanges::TerminatorExchange,
    exchange::Exchange,
    output_params::{OutputParam, OutputParams},
    query::{make_client_query, make_mutation, make_query, Document, InputTypeMapper},
    state_link::reconcile_client_fields,
    utils::{capitalize, name_title, omit_typename},
    Error, QueryError, QueryOptions, RequestPolicy, Response, Result
};
use futures::future::{join_all, BoxFuture, FutureExt};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Maps props to props. Used to winnow props down to a query's variables and to normalize them.
pub type PropsFn = Arc<dyn Fn(&Map<String, Value>) -> Map<String, Value> + Send + Sync>;

pub type ResponseFuture = BoxFuture<'static, std::result::Result<Response, QueryError>>;

#[derive(Clone, Default)]
pub struct RequestOptions {
    /// Resolve to a skipped response without contacting the server.
    pub skip: bool,
    /// Picks the query's variables out of the props.
    pub variables: Option<PropsFn>,
    pub request_policy: Option<RequestPolicy>
}

impl RequestOptions {
    pub fn with_variables<F>(variables: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Map<String, Value> + Send + Sync + 'static
    {
        RequestOptions {
            variables: Some(Arc::new(variables)),
            ..RequestOptions::default()
        }
    }

    /// Runs `f` on the output of the existing `variables` function, or on the props if there is none.
    pub fn compose_variables<F>(mut self, f: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Map<String, Value> + Send + Sync + 'static
    {
        let composed: PropsFn = match self.variables.take() {
            Some(existing) => Arc::new(move |props: &Map<String, Value>| f(&existing(props))),
            None => Arc::new(f)
        };
        self.variables = Some(composed);
        self
    }

    /// Skips if either the existing options or `skip` say so.
    pub fn or_skip(mut self, skip: bool) -> Self {
        self.skip = self.skip || skip;
        self
    }

    pub fn winnow(&self, props: &Map<String, Value>) -> Map<String, Value> {
        match self.variables {
            Some(ref variables) => variables(props),
            None => props.clone()
        }
    }
}

/// A client, if there is one, and the options for a single request.
pub struct ApolloConfig<M: Exchange = TerminatorExchange> {
    pub client: Option<Client<M>>,
    pub options: RequestOptions
}

impl<M: Exchange> Clone for ApolloConfig<M> {
    fn clone(&self) -> Self {
        ApolloConfig {
            client: self.client.clone(),
            options: self.options.clone()
        }
    }
}

impl<M: Exchange> ApolloConfig<M> {
    pub fn new(client: Client<M>) -> Self {
        ApolloConfig {
            client: Some(client),
            options: RequestOptions::default()
        }
    }

    /// A config without a client. Containers built from it are deferred.
    pub fn deferred() -> Self {
        ApolloConfig {
            client: None,
            options: RequestOptions::default()
        }
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }
}

/// Describes a query.
#[derive(Clone)]
pub struct QueryContainer {
    /// The query name, which is also the root field, e.g. `regions`
    pub name: String,
    /// Defaults to `{data: "<Name>DataTypeof<Name>TypeRelatedReadInputType"}`
    pub input_type_mapper: Option<InputTypeMapper>,
    pub output_params: OutputParams,
    /// Runs after the props were winnowed
    pub normalize_props: Option<PropsFn>
}

impl QueryContainer {
    pub fn new<S: Into<String>>(name: S, output_params: OutputParams) -> Self {
        QueryContainer {
            name: name.into(),
            input_type_mapper: None,
            output_params,
            normalize_props: None
        }
    }

    pub fn with_input_type_mapper(mut self, input_type_mapper: InputTypeMapper) -> Self {
        self.input_type_mapper = Some(input_type_mapper);
        self
    }

    pub fn with_normalize_props<F>(mut self, normalize_props: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Map<String, Value> + Send + Sync + 'static
    {
        self.normalize_props = Some(Arc::new(normalize_props));
        self
    }

    fn input_type_mapper(&self) -> InputTypeMapper {
        self.input_type_mapper
            .clone()
            .unwrap_or_else(|| default_read_input_type_mapper(&self.name))
    }
}

pub fn default_read_input_type_mapper(name: &str) -> InputTypeMapper {
    let title = name_title(name);
    let mut mapper = InputTypeMapper::new();
    mapper.insert(
        "data".to_string(),
        format!("{}DataTypeof{}TypeRelatedReadInputType", title, title)
    );
    mapper
}

/// A request that has been fully built but not sent.
#[derive(Debug, Clone)]
pub struct DeferredRequest {
    pub document: Document,
    pub variables: Map<String, Value>,
    pub request_policy: Option<RequestPolicy>,
    pub skip: bool,
    /// The full selection, `@client` fields included, when the server only sees part of it
    pub client_selection: Option<OutputParams>
}

impl DeferredRequest {
    pub fn run<M: Exchange>(self, client: &Client<M>) -> ResponseFuture {
        let client = client.clone();
        async move {
            if self.skip {
                tracing::debug!(operation = %self.document.operation_name(), "skipped");
                return Ok(Response::skipped());
            }

            let options = QueryOptions {
                request_policy: self.request_policy,
                ..QueryOptions::default()
            };
            let mut response = client
                .query_with_options(&self.document, self.variables, options)
                .await?;

            if let (Some(selection), Some(data)) = (&self.client_selection, response.data.as_mut()) {
                reconcile_client_fields(client.cache().as_ref(), selection, data);
            }

            tracing::debug!(
                operation = %self.document.operation_name(),
                has_data = response.data.is_some(),
                errors = response.errors.as_ref().map_or(0, Vec::len),
                "responded"
            );
            Ok::<_, QueryError>(response)
        }
        .boxed()
    }
}

/// What a container builder hands back.
pub enum Container {
    /// Already dispatched
    Task(ResponseFuture),
    /// Waiting for a client
    Deferred(DeferredRequest)
}

impl Container {
    /// The running task. Deferred requests have no client to run on.
    pub fn into_task(self) -> Result<ResponseFuture> {
        match self {
            Container::Task(task) => Ok(task),
            Container::Deferred(_) => Err(Error::MissingClient)
        }
    }

    pub fn run_with<M: Exchange>(self, client: &Client<M>) -> ResponseFuture {
        match self {
            Container::Task(task) => task,
            Container::Deferred(request) => request.run(client)
        }
    }
}

fn dispatch<M: Exchange>(config: &ApolloConfig<M>, request: DeferredRequest) -> Container {
    tracing::debug!(
        document = %request.document,
        arguments = %serde_json::Value::Object(request.variables.clone()),
        skip = request.skip,
        "created request"
    );
    match config.client {
        Some(ref client) => Container::Task(request.run(client)),
        None => Container::Deferred(request)
    }
}

/// Winnows, then normalizes. Skipped requests get no variables at all.
fn request_variables(
    options: &RequestOptions,
    normalize_props: Option<&PropsFn>,
    props: &Map<String, Value>
) -> Map<String, Value> {
    if options.skip {
        return Map::new();
    }
    let winnowed = options.winnow(props);
    let normalized = match normalize_props {
        Some(normalize_props) => normalize_props(&winnowed),
        None => winnowed
    };
    omit_typename(&normalized)
}

/// Builds a query against the server.
///
/// `@client` fields in the output params are stripped from the document the server sees and
/// merged back into the response from the client's cache.
pub fn query_container<M: Exchange>(
    config: &ApolloConfig<M>,
    query: &QueryContainer,
    props: &Map<String, Value>
) -> Result<Container> {
    let variables = request_variables(&config.options, query.normalize_props.as_ref(), props);
    let has_client_fields = query.output_params.has_client_fields();
    let server_params = if has_client_fields {
        query.output_params.without_client_fields()
    } else {
        query.output_params.clone()
    };
    let document = make_query(&query.name, &query.input_type_mapper(), &server_params, &variables)?;
    let client_selection = if has_client_fields {
        Some(OutputParams(vec![OutputParam::Object(
            query.name.clone(),
            query.output_params.clone()
        )]))
    } else {
        None
    };

    Ok(dispatch(
        config,
        DeferredRequest {
            document,
            variables,
            request_policy: config.options.request_policy,
            skip: config.options.skip,
            client_selection
        }
    ))
}

/// Builds a query answered entirely by the client-side cache.
pub fn query_with_client_directive_container<M: Exchange>(
    config: &ApolloConfig<M>,
    query: &QueryContainer,
    props: &Map<String, Value>
) -> Result<Container> {
    let variables = request_variables(&config.options, query.normalize_props.as_ref(), props);
    let document = make_client_query(&query.name, &query.input_type_mapper(), &query.output_params, &variables)?;

    Ok(dispatch(
        config,
        DeferredRequest {
            document,
            variables,
            request_policy: Some(RequestPolicy::CacheOnly),
            skip: config.options.skip,
            client_selection: None
        }
    ))
}

/// Builds a regular query that is only looked up in the cache, never sent.
pub fn query_from_cache_container<M: Exchange>(
    config: &ApolloConfig<M>,
    query: &QueryContainer,
    props: &Map<String, Value>
) -> Result<Container> {
    let variables = request_variables(&config.options, query.normalize_props.as_ref(), props);
    let document = make_query(&query.name, &query.input_type_mapper(), &query.output_params, &variables)?;

    Ok(dispatch(
        config,
        DeferredRequest {
            document,
            variables,
            request_policy: Some(RequestPolicy::CacheOnly),
            skip: config.options.skip,
            client_selection: None
        }
    ))
}

/// Describes a mutation.
#[derive(Clone, Default)]
pub struct MutationContainer {
    /// The singular object name, e.g. `region`. Unused when `mutation_name_override` is set
    /// together with `flatten_variables`.
    pub name: String,
    pub output_params: OutputParams,
    /// Defaults to `{data: "<Create|Update><Name>InputType"}`, or nothing when flattened
    pub input_type_mapper: Option<InputTypeMapper>,
    /// Send the props as top-level variables instead of wrapping them in `data`, and select
    /// the output params directly instead of under `name`
    pub flatten_variables: bool,
    pub mutation_name_override: Option<String>
}

impl MutationContainer {
    pub fn new<S: Into<String>>(name: S, output_params: OutputParams) -> Self {
        MutationContainer {
            name: name.into(),
            output_params,
            ..MutationContainer::default()
        }
    }

    /// A mutation like `tokenAuth(username: $username, password: $password) { token }`.
    pub fn flattened<S: Into<String>>(mutation_name: S, output_params: OutputParams) -> Self {
        MutationContainer {
            output_params,
            flatten_variables: true,
            mutation_name_override: Some(mutation_name.into()),
            ..MutationContainer::default()
        }
    }
}

/// Builds `create<Name>` (or `update<Name>` when the props carry an `id`).
pub fn mutation_request_container<M: Exchange>(
    config: &ApolloConfig<M>,
    mutation: &MutationContainer,
    props: &Map<String, Value>
) -> Result<Container> {
    let props = request_variables(&config.options, None, props);
    let verb = match props.get("id") {
        Some(Value::Null) | None => "Create",
        Some(_) => "Update"
    };
    let title = capitalize(&mutation.name);
    let mutation_name = mutation
        .mutation_name_override
        .clone()
        .unwrap_or_else(|| format!("{}{}", verb.to_lowercase(), title));

    let (variables, mapper, output_params) = if mutation.flatten_variables {
        (
            props,
            mutation.input_type_mapper.clone().unwrap_or_default(),
            mutation.output_params.clone()
        )
    } else {
        let mut variables = Map::new();
        variables.insert("data".to_string(), Value::Object(props));
        let mapper = mutation.input_type_mapper.clone().unwrap_or_else(|| {
            let mut mapper = InputTypeMapper::new();
            mapper.insert("data".to_string(), format!("{}{}InputType", verb, title));
            mapper
        });
        let output_params = OutputParams(vec![OutputParam::Object(
            mutation.name.clone(),
            mutation.output_params.clone()
        )]);
        (variables, mapper, output_params)
    };

    let document = make_mutation(&mutation_name, &mapper, &output_params, &variables)?;
    Ok(dispatch(
        config,
        DeferredRequest {
            document,
            variables,
            request_policy: Some(RequestPolicy::NetworkOnly),
            skip: config.options.skip,
            client_selection: None
        }
    ))
}

/// Runs several queries against the same props concurrently.
///
/// Resolves to the props with each response added under its name. Every container is built
/// before anything runs, so a contract violation in any of them fails the whole call up front.
pub fn query_responses<M: Exchange>(
    config: &ApolloConfig<M>,
    queries: &[(&str, &QueryContainer)],
    props: &Map<String, Value>
) -> Result<BoxFuture<'static, std::result::Result<Map<String, Value>, QueryError>>> {
    let tasks = queries
        .iter()
        .map(|(name, query)| {
            let task = query_container(config, query, props)?.into_task()?;
            let name = name.to_string();
            Ok(task.map(move |response| (name, response)))
        })
        .collect::<Result<Vec<_>>>()?;
    let props = props.clone();

    Ok(async move {
        let mut merged = props;
        for (name, response) in join_all(tasks).await {
            merged.insert(name, serde_json::to_value(response?)?);
        }
        Ok::<_, QueryError>(merged)
    }
    .boxed())
}
