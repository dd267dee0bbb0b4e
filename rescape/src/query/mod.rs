//! Turns output params and arguments into GraphQL documents.
//!
//! ```
//! # use serde_json::json;
//! use rescape::{
//!     output_params::OutputParams,
//!     query::{make_query, InputTypeMapper}
//! };
//!
//! let params = OutputParams::from_value(&json!(["id", "key"])).unwrap();
//! let arguments = json!({"key": "earth", "__typename": "RegionType"});
//! let document = make_query(
//!     "regions",
//!     &InputTypeMapper::new(),
//!     &params,
//!     arguments.as_object().unwrap()
//! ).unwrap();
//!
//! assert_eq!(
//!     document.source(),
//!     "query regions($key: String!) { regions(key: $key) { id key } }"
//! );
//! ```

use crate::{
    output_params::{OutputParam, OutputParams},
    types::OperationType,
    utils::{djb2, omit_typename, TYPENAME},
    Error, Result
};
use serde_json::{Map, Value};
use std::{collections::BTreeMap, fmt, sync::Arc};

pub mod memo;

pub use memo::{document_cache, DocumentCache, EvictionPolicy, MaxEntries, Unbounded};

/// Maps argument keys to named GraphQL input types. Only consulted for values whose type can't
/// be inferred, i.e. objects and arrays of objects.
pub type InputTypeMapper = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum QueryMode {
    Query,
    /// A query answered entirely from the client-side cache
    ClientQuery,
    /// A fragment on the `__typename` given in the arguments
    Fragment,
    Mutation
}

/// A synthesized GraphQL document. Cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    source: Arc<str>,
    mode: QueryMode,
    operation_name: Arc<str>,
    selection: Arc<OutputParams>,
    query_key: u32
}

impl Document {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn shared_source(&self) -> Arc<str> {
        self.source.clone()
    }

    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    pub(crate) fn shared_operation_name(&self) -> Arc<str> {
        self.operation_name.clone()
    }

    /// The root selection: the output params wrapped in the operation's field, or the bare
    /// output params for fragments.
    pub fn selection(&self) -> &Arc<OutputParams> {
        &self.selection
    }

    /// Hash of the source. Combined with the variables to form an operation key.
    pub fn query_key(&self) -> u32 {
        self.query_key
    }

    pub fn operation_type(&self) -> OperationType {
        match self.mode {
            QueryMode::Mutation => OperationType::Mutation,
            _ => OperationType::Query
        }
    }

    pub fn is_client_only(&self) -> bool {
        self.mode == QueryMode::ClientQuery
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Builds (or fetches from the process-wide memo) the document for the given inputs.
pub fn synthesize(
    mode: QueryMode,
    name: &str,
    mapper: &InputTypeMapper,
    output_params: &OutputParams,
    arguments: &Map<String, Value>
) -> Result<Document> {
    document_cache().synthesize(mode, name, mapper, output_params, arguments)
}

pub fn make_query(
    name: &str,
    mapper: &InputTypeMapper,
    output_params: &OutputParams,
    arguments: &Map<String, Value>
) -> Result<Document> {
    synthesize(QueryMode::Query, name, mapper, output_params, arguments)
}

/// Like [`make_query`](fn.make_query.html) but adds `@client` to the root field.
pub fn make_client_query(
    name: &str,
    mapper: &InputTypeMapper,
    output_params: &OutputParams,
    arguments: &Map<String, Value>
) -> Result<Document> {
    synthesize(QueryMode::ClientQuery, name, mapper, output_params, arguments)
}

/// Builds `fragment <name>Fragment on <__typename> { ... }`. Only `__typename` is read from
/// `arguments`, and it is required.
pub fn make_fragment_query(
    name: &str,
    mapper: &InputTypeMapper,
    output_params: &OutputParams,
    arguments: &Map<String, Value>
) -> Result<Document> {
    synthesize(QueryMode::Fragment, name, mapper, output_params, arguments)
}

pub fn make_mutation(
    name: &str,
    mapper: &InputTypeMapper,
    output_params: &OutputParams,
    arguments: &Map<String, Value>
) -> Result<Document> {
    synthesize(QueryMode::Mutation, name, mapper, output_params, arguments)
}

fn primitive_type(value: &Value) -> Option<&'static str> {
    match value {
        Value::String(_) => Some("String"),
        Value::Bool(_) => Some("Boolean"),
        Value::Number(number) if number.is_f64() => Some("Float"),
        Value::Number(_) => Some("Int"),
        _ => None
    }
}

/// The GraphQL type of an argument, without the trailing `!`.
///
/// Mapped keys always win. Otherwise the type is inferred from primitives and arrays of
/// primitives. Objects and nulls need a mapping.
pub fn resolve_graphql_type(mapper: &InputTypeMapper, key: &str, value: &Value) -> Result<String> {
    if let Some(mapped) = mapper.get(key) {
        return Ok(mapped.clone());
    }
    match value {
        Value::Array(items) => items
            .first()
            .and_then(primitive_type)
            .map(|inner| format!("[{}]", inner))
            .ok_or_else(|| Error::UnresolvedInputType(key.to_string())),
        other => primitive_type(other)
            .map(str::to_string)
            .ok_or_else(|| Error::UnresolvedInputType(key.to_string()))
    }
}

pub(crate) fn render(
    mode: QueryMode,
    name: &str,
    mapper: &InputTypeMapper,
    output_params: &OutputParams,
    arguments: &Map<String, Value>
) -> Result<Document> {
    if output_params.is_empty() {
        return Err(Error::EmptyOutputParams(name.to_string()));
    }

    let (source, selection) = if mode == QueryMode::Fragment {
        let typename = arguments
            .get(TYPENAME)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MissingRequiredPath(TYPENAME.to_string()))?;
        let source = format!("fragment {}Fragment on {} {{ {} }}", name, typename, output_params);
        (source, output_params.clone())
    } else {
        let arguments = omit_typename(arguments);
        let declarations = arguments
            .iter()
            .map(|(key, value)| Ok(format!("${}: {}!", key, resolve_graphql_type(mapper, key, value)?)))
            .collect::<Result<Vec<_>>>()?;
        let call_arguments: Vec<_> = arguments
            .keys()
            .map(|key| format!("{}: ${}", key, key))
            .collect();

        let keyword = if mode == QueryMode::Mutation { "mutation" } else { "query" };
        let directive = if mode == QueryMode::ClientQuery { " @client" } else { "" };
        let source = format!(
            "{} {}{} {{ {}{}{} {{ {} }} }}",
            keyword,
            name,
            paren_wrap(&declarations),
            name,
            paren_wrap(&call_arguments),
            directive,
            output_params
        );
        let selection = OutputParams(vec![OutputParam::Object(name.to_string(), output_params.clone())]);
        (source, selection)
    };

    Ok(Document {
        query_key: djb2(&source),
        source: source.into(),
        mode,
        operation_name: name.into(),
        selection: Arc::new(selection)
    })
}

fn paren_wrap(parts: &[String]) -> String {
    if parts.is_empty() {
        String::new()
    } else {
        format!("({})", parts.join(", "))
    }
}
