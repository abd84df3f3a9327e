//! Lenient field deserializers.
//!
//! Real-world API descriptions routinely put the wrong JSON kind in a
//! keyword (`"nullable": "true"`, `"required": true` on a property, a bare
//! string where an `enum` array belongs). Failing the whole document on such
//! a value would make the engine useless on exactly the inputs it exists to
//! repair, so every field that is commonly malformed is read through one of
//! these helpers, which coerce what they can and drop what they cannot.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Number, Value};

use crate::schema::{AdditionalProperties, Schema, SchemaType};

/// `true`/`false`, also accepting the strings `"true"` and `"false"`.
pub(crate) fn boolean<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(coerce_bool(&Value::deserialize(d)?).unwrap_or(false))
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Strings pass through; numbers and booleans are stringified.
pub(crate) fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

pub(crate) fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(opt_string(d)?.unwrap_or_default())
}

pub(crate) fn opt_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

pub(crate) fn opt_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Number>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => Some(n),
        Value::String(s) => parse_number(s.trim()),
        _ => None,
    })
}

fn parse_number(s: &str) -> Option<Number> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    s.parse::<f64>().ok().and_then(Number::from_f64)
}

/// A list of strings; non-string entries are dropped, a lone string becomes a
/// one-element list, anything else (e.g. draft-03 `"required": true`) is empty.
pub(crate) fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Value::String(s) => vec![s],
        _ => Vec::new(),
    })
}

/// `enum` values; a scalar is wrapped into a one-element list.
pub(crate) fn opt_values<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<Value>>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => None,
        Value::Array(items) => Some(items),
        other => Some(vec![other]),
    })
}

/// The `type` keyword. OpenAPI 3.1 style arrays (`["string", "null"]`) keep
/// their first non-null member; unknown tokens such as Swagger's `"file"` are
/// treated as absent.
pub(crate) fn opt_schema_type<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<SchemaType>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => SchemaType::from_token(&s),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .find_map(SchemaType::from_token),
        _ => None,
    })
}

/// A single sub-schema. Boolean `true` means "anything"; a tuple-style array
/// keeps its first entry.
pub(crate) fn opt_boxed_schema<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<Box<Schema>>, D::Error> {
    Ok(match Value::deserialize(d)? {
        value @ Value::Object(_) => Some(Box::new(schema_from_value(value))),
        Value::Array(items) => items
            .into_iter()
            .find(Value::is_object)
            .map(|v| Box::new(schema_from_value(v))),
        Value::Bool(true) => Some(Box::default()),
        _ => None,
    })
}

pub(crate) fn opt_schema<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Schema>, D::Error> {
    Ok(opt_boxed_schema(d)?.map(|b| *b))
}

/// `additionalProperties`: a boolean (also as a string) or a schema.
pub(crate) fn opt_additional_properties<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<AdditionalProperties>, D::Error> {
    let value = Value::deserialize(d)?;
    if let Some(b) = coerce_bool(&value) {
        return Ok(Some(AdditionalProperties::Bool(b)));
    }
    Ok(match value {
        value @ Value::Object(_) => Some(AdditionalProperties::Schema(Box::new(
            schema_from_value(value),
        ))),
        _ => None,
    })
}

/// A list of sub-schemas (`allOf`/`oneOf`/`anyOf`); non-object members are
/// dropped.
pub(crate) fn schema_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Schema>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items
            .into_iter()
            .filter(Value::is_object)
            .map(schema_from_value)
            .collect(),
        value @ Value::Object(_) => vec![schema_from_value(value)],
        _ => Vec::new(),
    })
}

/// An ordered map whose entries are read independently; entries that do not
/// deserialize are dropped with a warning instead of failing the document.
pub(crate) fn map<'de, D, T>(d: D) -> Result<IndexMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Object(entries) = Value::deserialize(d)? else {
        return Ok(IndexMap::new());
    };
    let mut out = IndexMap::with_capacity(entries.len());
    for (key, value) in entries {
        match serde_json::from_value::<T>(value) {
            Ok(item) => {
                out.insert(key, item);
            }
            Err(e) => tracing::warn!(key = %key, error = %e, "dropping malformed map entry"),
        }
    }
    Ok(out)
}

/// A list whose entries are read independently, like [`map`].
pub(crate) fn list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(d)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<T>(value) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(index, error = %e, "dropping malformed list entry");
                None
            }
        })
        .collect())
}

pub(crate) fn opt_list<'de, D, T>(d: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(d)?;
    if value.is_null() {
        return Ok(None);
    }
    list(value).map(Some).map_err(serde::de::Error::custom)
}

/// Every field of [`Schema`] is lenient, so this only falls back to an empty
/// schema for values that are not objects at all.
fn schema_from_value(value: Value) -> Schema {
    serde_json::from_value(value).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "replacing malformed schema with an unconstrained one");
        Schema::default()
    })
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Lenient {
        #[serde(default, deserialize_with = "boolean")]
        flag: bool,
        #[serde(default, deserialize_with = "opt_u64")]
        count: Option<u64>,
        #[serde(default, deserialize_with = "opt_number")]
        bound: Option<Number>,
        #[serde(default, deserialize_with = "string_list")]
        names: Vec<String>,
        #[serde(default, deserialize_with = "opt_schema_type")]
        kind: Option<SchemaType>,
    }

    fn lenient(value: Value) -> Lenient {
        serde_json::from_value(value).expect("fields deserialize")
    }

    #[test]
    fn string_booleans_are_coerced() {
        assert!(lenient(json!({"flag": "true"})).flag);
        assert!(!lenient(json!({"flag": "nope"})).flag);
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let p = lenient(json!({"count": "12", "bound": "1.5"}));
        assert_eq!(p.count, Some(12));
        assert_eq!(p.bound.and_then(|n| n.as_f64()), Some(1.5));
    }

    #[test]
    fn boolean_required_becomes_empty_list() {
        assert!(lenient(json!({"names": true})).names.is_empty());
        assert_eq!(lenient(json!({"names": ["a", 1, "b"]})).names, ["a", "b"]);
    }

    #[test]
    fn type_arrays_keep_first_non_null_member() {
        assert_eq!(
            lenient(json!({"kind": ["null", "integer"]})).kind,
            Some(SchemaType::Integer)
        );
        assert_eq!(lenient(json!({"kind": "file"})).kind, None);
    }

    #[test]
    fn malformed_map_entries_are_dropped() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(deserialize_with = "map")]
            entries: IndexMap<String, u32>,
        }
        let holder: Holder =
            serde_json::from_value(json!({"entries": {"a": 1, "b": "x", "c": 3}}))
                .expect("holder deserializes");
        assert_eq!(
            holder.entries.keys().map(String::as_str).collect::<Vec<_>>(),
            ["a", "c"]
        );
    }
}
