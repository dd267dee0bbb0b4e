use crate::{Error, Result};
use inflector::Inflector;
use serde::Serialize;
use serde_json::{Map, Value};
use std::num::Wrapping;

/// The meta field GraphQL uses to tag object types. Responses echo it back, so it has to be
/// dropped before values are reused as arguments.
pub const TYPENAME: &str = "__typename";

/// When we have separate values it's useful to run a progressive
/// version of djb2 where we pretend that we're still looping over
/// the same value.
///
/// Values are hashed through their JSON encoding, which keeps `0`, `0.0`, `""` and `[]` apart.
pub fn progressive_hash<V: Serialize>(h: u32, x: &V) -> u64 {
    let x = serde_json::to_vec(x).unwrap_or_default();

    let mut h = Wrapping(h as u64);

    for byte in x {
        h = (h << 5) + h + Wrapping(byte as u64)
    }

    h.0
}

/// Plain djb2 over a string, used to key documents.
pub fn djb2(source: &str) -> u32 {
    source.bytes().fold(Wrapping(5381u32), |h, byte| {
        (h << 5) + h + Wrapping(byte as u32)
    }).0
}

/// `regions` becomes `Region`, `userStates` becomes `UserState`.
pub fn name_title(name: &str) -> String {
    name.to_singular().to_pascal_case()
}

/// Upper-cases the first letter only: `settings` becomes `Settings`.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new()
    }
}

fn segment<'a>(key: &str, value: &'a Value) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None
    }
}

/// Look up a dot separated path. Numeric segments index into arrays.
pub fn path<'a>(path: &str, value: &'a Value) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.')
        .try_fold(value, |current, key| segment(key, current))
}

/// Like [`path`](fn.path.html) but a missing or `null` value is a contract violation.
pub fn req_path<'a>(path_str: &str, value: &'a Value) -> Result<&'a Value> {
    match path(path_str, value) {
        Some(Value::Null) | None => Err(Error::MissingRequiredPath(path_str.to_string())),
        Some(found) => Ok(found)
    }
}

/// The value at `path`, or `default` if it is missing.
pub fn path_or<'a>(default: &'a Value, path_str: &str, value: &'a Value) -> &'a Value {
    path(path_str, value).unwrap_or(default)
}

/// Recursively drops every key in `keys` from objects nested anywhere in `value`.
pub fn omit_deep(keys: &[&str], value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !keys.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), omit_deep(keys, value)))
                .collect()
        ),
        Value::Array(items) => Value::Array(items.iter().map(|item| omit_deep(keys, item)).collect()),
        other => other.clone()
    }
}

/// Strips `__typename` from a set of arguments, at every depth.
pub fn omit_typename(arguments: &Map<String, Value>) -> Map<String, Value> {
    arguments
        .iter()
        .filter(|(key, _)| key.as_str() != TYPENAME)
        .map(|(key, value)| (key.clone(), omit_deep(&[TYPENAME], value)))
        .collect()
}

fn pick_path(segments: &[&str], value: &Value) -> Option<Value> {
    let (head, rest) = match segments.split_first() {
        Some(split) => split,
        None => return Some(value.clone())
    };
    match value {
        Value::Object(map) => map.get(*head).and_then(|child| pick_path(rest, child)).map(|picked| {
            let mut object = Map::new();
            object.insert(head.to_string(), picked);
            Value::Object(object)
        }),
        Value::Array(items) => Some(Value::Array(
            items.iter().filter_map(|item| pick_path(segments, item)).collect()
        )),
        _ => None
    }
}

/// Keeps only the given dot separated paths. Arrays are traversed element-wise.
pub fn pick_deep_paths(paths: &[&str], value: &Value) -> Value {
    paths
        .iter()
        .filter_map(|path| pick_path(&path.split('.').collect::<Vec<_>>(), value))
        .fold(Value::Object(Map::new()), |mut acc, picked| {
            merge_deep(&mut acc, picked);
            acc
        })
}

fn omit_path(segments: &[&str], value: &mut Value) {
    match (segments.split_first(), value) {
        (Some((head, [])), Value::Object(map)) => {
            map.remove(*head);
        }
        (Some((head, rest)), Value::Object(map)) => {
            if let Some(child) = map.get_mut(*head) {
                omit_path(rest, child);
            }
        }
        (Some(_), Value::Array(items)) => {
            for item in items {
                omit_path(segments, item);
            }
        }
        _ => {}
    }
}

/// Removes the given dot separated paths. Arrays are traversed element-wise.
pub fn omit_deep_paths(paths: &[&str], value: &Value) -> Value {
    let mut value = value.clone();
    for path in paths {
        omit_path(&path.split('.').collect::<Vec<_>>(), &mut value);
    }
    value
}

/// Merges `patch` into `target`. Objects merge key by key, everything else is replaced.
pub fn merge_deep(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(existing) => merge_deep(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch
    }
}
