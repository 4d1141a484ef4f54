//! Typed accessors over the generic YAML tree manifests parse into.
//!
//! Manifest loaders work against `serde_yaml::Value` rather than rigid
//! derive structs: the documents are user-authored, keys are optional in
//! irregular combinations, and error messages need document context.

use crate::error::{Error, Result};
use serde_yaml::{Mapping, Value};

/// Parse a YAML document.
pub fn parse_str(s: &str, context: &str) -> Result<Value> {
    serde_yaml::from_str(s).map_err(|e| Error::bad_manifest(context, e.to_string()))
}

/// View a value as a mapping.
pub fn as_mapping<'a>(value: &'a Value, context: &str) -> Result<&'a Mapping> {
    value
        .as_mapping()
        .ok_or_else(|| Error::bad_manifest(context, "expected a mapping"))
}

/// Fetch a key from a mapping.
#[must_use]
pub fn field<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    map.get(key)
}

/// Render a scalar as the string form the rest of the tool works with.
///
/// Booleans become `1`/`0` to match syscfg semantics; numbers render in
/// their YAML spelling.
#[must_use]
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(true) => Some("1".to_string()),
        Value::Bool(false) => Some("0".to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

/// Fetch an optional scalar field as a string.
pub fn str_field(map: &Mapping, key: &str, context: &str) -> Result<Option<String>> {
    match field(map, key) {
        None => Ok(None),
        Some(v) => scalar_to_string(v).map(Some).ok_or_else(|| {
            Error::bad_manifest(context, format!("field \"{key}\" is not a scalar"))
        }),
    }
}

/// Fetch a required scalar field as a string.
pub fn require_str(map: &Mapping, key: &str, context: &str) -> Result<String> {
    str_field(map, key, context)?.ok_or_else(|| Error::missing_field(key, context))
}

/// Interpret a value as a list of strings. A lone scalar counts as a
/// one-element list, which is how hand-written manifests usually spell it.
pub fn string_list(value: &Value, context: &str) -> Result<Vec<String>> {
    match value {
        Value::Sequence(seq) => seq
            .iter()
            .map(|v| {
                scalar_to_string(v)
                    .ok_or_else(|| Error::bad_manifest(context, "non-scalar list entry"))
            })
            .collect(),
        other => scalar_to_string(other)
            .map(|s| vec![s])
            .ok_or_else(|| Error::bad_manifest(context, "expected a string or list")),
    }
}

/// Fetch an optional list-of-strings field.
pub fn string_list_field(map: &Mapping, key: &str, context: &str) -> Result<Vec<String>> {
    match field(map, key) {
        None => Ok(Vec::new()),
        Some(v) => string_list(v, &format!("{context}.{key}")),
    }
}
