use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use super::{Pass, PassContext};
use crate::diagnostics::RepairStats;
use crate::model::Document;
use crate::options::Canceled;
use crate::schema::{Schema, SchemaType};
use crate::traverse::{for_each_media_type_mut, walk_document_mut};

/// Enumerations, defaults and examples.
pub struct Metadata;

impl Pass for Metadata {
    fn name(&self) -> &'static str {
        "metadata"
    }

    #[tracing::instrument(skip_all, name = "metadata")]
    fn run(&self, doc: &mut Document, cx: &mut PassContext<'_>) -> Result<(), Canceled> {
        let max = cx.options.max_example_length;
        let stats = &mut *cx.stats;
        walk_document_mut(doc, cx.cancel, &mut |schema, pointer| {
            sanitize_schema(schema, pointer, max, stats);
        })?;
        for_each_media_type_mut(doc, cx.cancel, |media, pointer| {
            if media.example.as_ref().is_some_and(|e| is_oversized(e, max)) {
                tracing::warn!(pointer, "dropped oversized example");
                media.example = None;
                stats.examples_dropped += 1;
            }
        })
    }
}

pub(super) fn sanitize_schema(
    schema: &mut Schema,
    pointer: &str,
    max_example: usize,
    stats: &mut RepairStats,
) {
    if schema.is_reference() {
        return;
    }
    if clean_enum(schema) {
        tracing::warn!(pointer, "cleaned enum");
        stats.enums_cleaned += 1;
    }
    if fix_default(schema) {
        tracing::warn!(pointer, "fixed default");
        stats.defaults_fixed += 1;
    }
    if fix_example(schema, max_example) {
        tracing::warn!(pointer, "fixed example");
        stats.examples_dropped += 1;
    }
}

fn is_oversized(example: &Value, max: usize) -> bool {
    example.as_str().is_some_and(|s| s.chars().count() > max)
}

/// Drop null, empty and duplicate entries and entries of the wrong kind.
/// Returns `true` if the enum changed.
fn clean_enum(schema: &mut Schema) -> bool {
    let Some(values) = schema.enum_values.take() else {
        return false;
    };
    let original = values.clone();
    let mut kept: Vec<Value> = Vec::with_capacity(values.len());
    for value in values {
        let blank = value.is_null() || value.as_str().is_some_and(str::is_empty);
        if !blank && !kept.contains(&value) {
            kept.push(value);
        }
    }
    if let Some(t) = schema.schema_type
        && matches!(t, SchemaType::Integer | SchemaType::Number | SchemaType::Boolean)
    {
        let typed: Vec<Value> = kept.iter().filter(|v| t.accepts(v)).cloned().collect();
        kept = if typed.is_empty() {
            kept.into_iter().filter(Value::is_string).collect()
        } else {
            typed
        };
    } else {
        kept.retain(Value::is_string);
    }
    if kept.is_empty() {
        return true;
    }
    let changed = kept != original;
    if kept.iter().all(Value::is_string) && schema.schema_type != Some(SchemaType::String) {
        schema.schema_type = Some(SchemaType::String);
        schema.enum_values = Some(kept);
        return true;
    }
    schema.enum_values = Some(kept);
    changed
}

fn is_date_format(schema: &Schema) -> bool {
    matches!(schema.format.as_deref(), Some("date" | "date-time"))
}

fn parses_as_date(format: Option<&str>, value: &str) -> bool {
    match format {
        Some("date") => NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
        Some("date-time") => {
            DateTime::parse_from_rfc3339(value).is_ok()
                || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        }
        _ => true,
    }
}

/// Make the default agree with the type and the enum. Returns `true` if
/// the default changed.
fn fix_default(schema: &mut Schema) -> bool {
    let Some(default) = schema.default.take() else {
        return false;
    };
    if default.is_null() {
        if schema.nullable {
            schema.default = Some(default);
            return false;
        }
        return true;
    }
    if is_date_format(schema)
        && !default
            .as_str()
            .is_some_and(|s| parses_as_date(schema.format.as_deref(), s))
    {
        return true;
    }
    let mut fixed = match schema.schema_type {
        Some(t) if !t.accepts(&default) => t.empty_value(),
        _ => default.clone(),
    };
    if let Some(values) = schema.enum_values.as_ref()
        && let Some(first) = values.first()
        && !values.contains(&fixed)
    {
        let folded = fixed.as_str().map(str::to_lowercase);
        fixed = values
            .iter()
            .find(|v| {
                v.as_str()
                    .zip(folded.as_deref())
                    .is_some_and(|(candidate, wanted)| candidate.to_lowercase() == wanted)
            })
            .unwrap_or(first)
            .clone();
    }
    let changed = fixed != default;
    schema.default = Some(fixed);
    changed
}

/// Collapse array examples on non-array schemas and drop oversized string
/// examples. Returns `true` if the example changed.
fn fix_example(schema: &mut Schema, max: usize) -> bool {
    let Some(example) = schema.example.take() else {
        return false;
    };
    let example = match (schema.schema_type, example) {
        (Some(t), Value::Array(items)) if t != SchemaType::Array => {
            match items.into_iter().next() {
                Some(first) if t.accepts(&first) && !is_oversized(&first, max) => {
                    schema.example = Some(first);
                }
                _ => {}
            }
            return true;
        }
        (_, example) => example,
    };
    if is_oversized(&example, max) {
        return true;
    }
    schema.example = Some(example);
    false
}
