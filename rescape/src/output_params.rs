//! Declarative selection sets.
//!
//! An [`OutputParams`](struct.OutputParams.html) tree says which fields a query or mutation
//! requests. It renders straight into the body of a GraphQL document and also drives the cache
//! when projecting stored entities back into response shape.

use crate::{utils::TYPENAME, Error, Result};
use serde_json::Value;
use std::fmt;

/// Directives that can be attached to a selected field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Directive {
    /// The field only exists in the client-side cache and is never sent to the server.
    Client
}

impl Directive {
    pub fn as_str(&self) -> &'static str {
        match self {
            Directive::Client => "@client"
        }
    }

    fn parse(token: &str) -> Option<Directive> {
        match token {
            "@client" => Some(Directive::Client),
            _ => None
        }
    }
}

/// A single node of a selection set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum OutputParam {
    /// A scalar field
    Field(String),
    /// An object field with its own selection
    Object(String, OutputParams),
    /// A field carrying a directive. The selection is empty for scalars.
    Directive(String, Directive, OutputParams)
}

impl OutputParam {
    /// The plain field name, without any directive.
    pub fn name(&self) -> &str {
        match self {
            OutputParam::Field(name)
            | OutputParam::Object(name, _)
            | OutputParam::Directive(name, _, _) => name
        }
    }

    /// The child selection. Scalars have none.
    pub fn children(&self) -> Option<&OutputParams> {
        match self {
            OutputParam::Field(_) => None,
            OutputParam::Object(_, children) => Some(children),
            OutputParam::Directive(_, _, children) if children.is_empty() => None,
            OutputParam::Directive(_, _, children) => Some(children)
        }
    }

    pub fn is_client(&self) -> bool {
        matches!(self, OutputParam::Directive(_, Directive::Client, _))
    }

    /// The same node with any directive dropped.
    pub fn without_directive(&self) -> OutputParam {
        match self {
            OutputParam::Directive(name, _, children) if children.is_empty() => {
                OutputParam::Field(name.clone())
            }
            OutputParam::Directive(name, _, children) => {
                OutputParam::Object(name.clone(), children.clone())
            }
            other => other.clone()
        }
    }

    fn parse_key(key: &str, children: OutputParams) -> Result<OutputParam> {
        let mut tokens = key.split_whitespace();
        let name = tokens
            .next()
            .ok_or_else(|| Error::InvalidOutputParams("empty field name".to_string()))?
            .to_string();
        match tokens.next() {
            None if children.is_empty() => Ok(OutputParam::Field(name)),
            None => Ok(OutputParam::Object(name, children)),
            Some(token) => {
                let directive = Directive::parse(token)
                    .ok_or_else(|| Error::InvalidOutputParams(format!("unknown directive `{}`", token)))?;
                Ok(OutputParam::Directive(name, directive, children))
            }
        }
    }
}

impl fmt::Display for OutputParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputParam::Field(name) => write!(f, "{}", name),
            OutputParam::Object(name, children) => write!(f, "{} {{ {} }}", name, children),
            OutputParam::Directive(name, directive, children) if children.is_empty() => {
                write!(f, "{} {}", name, directive.as_str())
            }
            OutputParam::Directive(name, directive, children) => {
                write!(f, "{} {} {{ {} }}", name, directive.as_str(), children)
            }
        }
    }
}

/// An ordered selection set.
///
/// ```
/// # use serde_json::json;
/// use rescape::output_params::OutputParams;
///
/// let params = OutputParams::from_value(&json!([
///     "id",
///     {"data": ["domain", {"mapbox": {"viewport": ["latitude", "longitude", "zoom"]}}]},
///     "testAuthorization @client"
/// ])).unwrap();
///
/// assert_eq!(
///     params.to_string(),
///     "id data { domain mapbox { viewport { latitude longitude zoom } } } testAuthorization @client"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Default)]
pub struct OutputParams(pub Vec<OutputParam>);

impl OutputParams {
    pub fn new(params: Vec<OutputParam>) -> Self {
        OutputParams(params)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OutputParam> {
        self.0.iter()
    }

    /// Parses the JSON forms output params are usually written in: arrays of field names and
    /// `{field: selection}` objects, or objects of `{field: 1 | selection}`.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Array(items) => {
                let mut params = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(key) => params.push(OutputParam::parse_key(key, OutputParams::default())?),
                        Value::Object(_) => params.extend(OutputParams::from_value(item)?.0),
                        other => {
                            return Err(Error::InvalidOutputParams(format!(
                                "expected a field name or object, found {}",
                                other
                            )))
                        }
                    }
                }
                Ok(OutputParams(params))
            }
            Value::Object(map) => {
                let mut params = Vec::with_capacity(map.len());
                for (key, child) in map {
                    let children = match child {
                        Value::Bool(true) | Value::Number(_) => OutputParams::default(),
                        Value::Array(_) | Value::Object(_) => OutputParams::from_value(child)?,
                        other => {
                            return Err(Error::InvalidOutputParams(format!(
                                "invalid selection for `{}`: {}",
                                key, other
                            )))
                        }
                    };
                    params.push(OutputParam::parse_key(key, children)?);
                }
                Ok(OutputParams(params))
            }
            other => Err(Error::InvalidOutputParams(format!(
                "expected an array or object, found {}",
                other
            )))
        }
    }

    /// Looks up a direct child by field name.
    pub fn get(&self, name: &str) -> Option<&OutputParam> {
        self.0.iter().find(|param| param.name() == name)
    }

    /// True if any field at any depth carries `@client`.
    pub fn has_client_fields(&self) -> bool {
        self.0.iter().any(|param| {
            param.is_client() || param.children().map_or(false, OutputParams::has_client_fields)
        })
    }

    /// The selection the server gets to see.
    ///
    /// `@client` fields are removed. Every object on the way to one gains a `__typename` so
    /// the response can later be matched with its cached entity.
    pub fn without_client_fields(&self) -> OutputParams {
        let mut params: Vec<OutputParam> = self
            .0
            .iter()
            .filter_map(|param| match param {
                OutputParam::Directive(_, Directive::Client, _) => None,
                OutputParam::Object(name, children) => {
                    Some(OutputParam::Object(name.clone(), children.without_client_fields()))
                }
                other => Some(other.clone())
            })
            .collect();
        if self.has_client_fields() && self.get(TYPENAME).is_none() {
            params.push(OutputParam::Field(TYPENAME.to_string()));
        }
        OutputParams(params)
    }

    /// Only the `@client` fields at this level, as plain fields.
    pub fn client_fields(&self) -> OutputParams {
        OutputParams(
            self.0
                .iter()
                .filter(|param| param.is_client())
                .map(OutputParam::without_directive)
                .collect()
        )
    }

    /// The same selection with every directive dropped, used to project cached data.
    pub fn plain(&self) -> OutputParams {
        OutputParams(
            self.0
                .iter()
                .map(|param| match param.without_directive() {
                    OutputParam::Object(name, children) => OutputParam::Object(name, children.plain()),
                    field => field
                })
                .collect()
        )
    }
}

impl fmt::Display for OutputParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, param) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", param)?;
        }
        Ok(())
    }
}

impl From<Vec<OutputParam>> for OutputParams {
    fn from(params: Vec<OutputParam>) -> Self {
        OutputParams(params)
    }
}

/// Shorthand for a scalar field.
pub fn field<S: Into<String>>(name: S) -> OutputParam {
    OutputParam::Field(name.into())
}

/// Shorthand for an object field.
pub fn object<S: Into<String>>(name: S, children: Vec<OutputParam>) -> OutputParam {
    OutputParam::Object(name.into(), OutputParams(children))
}

/// Shorthand for a client-only field.
pub fn client<S: Into<String>>(name: S, children: Vec<OutputParam>) -> OutputParam {
    OutputParam::Directive(name.into(), Directive::Client, OutputParams(children))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_object_form() {
        let params = OutputParams::from_value(&json!({
            "id": 1,
            "data": {"mapbox": {"viewport": {"zoom": 1}}}
        }))
        .unwrap();

        assert_eq!(
            params,
            OutputParams(vec![
                field("id"),
                object("data", vec![object("mapbox", vec![object("viewport", vec![field("zoom")])])])
            ])
        );
    }

    #[test]
    fn rejects_unknown_directive_and_bad_values() {
        assert_eq!(
            OutputParams::from_value(&json!(["id @server"])),
            Err(Error::InvalidOutputParams("unknown directive `@server`".to_string()))
        );
        assert!(OutputParams::from_value(&json!("id")).is_err());
        assert!(OutputParams::from_value(&json!([42])).is_err());
    }

    #[test]
    fn strips_client_fields_and_tags_parents() {
        let params = OutputParams(vec![
            field("id"),
            object(
                "data",
                vec![field("domain"), client("testAuthorization", vec![field("username")])]
            )
        ]);

        assert!(params.has_client_fields());
        let stripped = params.without_client_fields();
        assert!(!stripped.has_client_fields());
        assert_eq!(stripped.to_string(), "id data { domain __typename } __typename");
    }

    #[test]
    fn directive_fields_render_with_selection() {
        let params = OutputParams(vec![client("todos", vec![field("id"), field("completed")])]);
        assert_eq!(params.to_string(), "todos @client { id completed }");
        assert_eq!(params.get("todos").map(OutputParam::name), Some("todos"));
        assert_eq!(params.client_fields().to_string(), "todos { id completed }");
        assert_eq!(params.plain().to_string(), "todos { id completed }");
    }
}
