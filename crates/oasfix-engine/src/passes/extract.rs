use indexmap::IndexMap;

use super::{Pass, PassContext};
use crate::model::{Document, MediaType, RefOr};
use crate::naming::{next_free, pascal_case, sanitize_identifier};
use crate::options::Canceled;
use crate::schema::{AdditionalProperties, Schema, SchemaType};

/// Hoist inline request and response body schemas into named components.
pub struct Extract;

impl Pass for Extract {
    fn name(&self) -> &'static str {
        "extract"
    }

    #[tracing::instrument(skip_all, name = "extract")]
    fn run(&self, doc: &mut Document, cx: &mut PassContext<'_>) -> Result<(), Canceled> {
        if !cx.options.extract_inline_schemas {
            return Ok(());
        }
        let Document {
            paths, components, ..
        } = doc;
        let schemas = &mut components.schemas;
        for item in paths.values_mut() {
            cx.cancel.checkpoint()?;
            for (_, operation) in item.operations_mut() {
                let Some(operation_id) = operation.operation_id.clone() else {
                    continue;
                };
                if let Some(RefOr::Item(body)) = operation.request_body.as_mut() {
                    let base = format!("{operation_id}_Request");
                    cx.stats.schemas_extracted +=
                        extract_content(schemas, &mut body.content, &base, "_RequestBody");
                }
                for (status, response) in &mut operation.responses {
                    if let RefOr::Item(response) = response {
                        let base = format!("{operation_id}_{status}");
                        cx.stats.schemas_extracted +=
                            extract_content(schemas, &mut response.content, &base, "_Response");
                    }
                }
            }
        }
        Ok(())
    }
}

/// Extract every non-trivial inline schema of a content map. Returns the
/// number extracted.
fn extract_content(
    schemas: &mut IndexMap<String, Schema>,
    content: &mut IndexMap<String, MediaType>,
    base: &str,
    collision_suffix: &str,
) -> usize {
    let mut extracted = 0;
    for (media_type, media) in content {
        let Some(schema) = media.schema.as_mut() else {
            continue;
        };
        if schema.is_reference() || is_trivial_envelope(schema) {
            continue;
        }
        let wanted = sanitize_identifier(&format!("{base}{}", media_suffix(media_type)));
        let name = allocate_name(schemas, &wanted, collision_suffix, schema);
        let inline = core::mem::replace(schema, Schema::reference_to(&name));
        tracing::warn!(schema = %name, media_type = %media_type, "extracted inline body schema");
        if !schemas.contains_key(&name) {
            schemas.insert(name, inline);
            extracted += 1;
        }
    }
    extracted
}

/// `_{Subtype}` for media types that are not JSON, empty for JSON.
fn media_suffix(media_type: &str) -> String {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let subtype = essence.split_once('/').map_or(essence.as_str(), |(_, s)| s);
    if subtype == "json" || subtype.ends_with("+json") || essence == "*/*" {
        String::new()
    } else {
        format!("_{}", pascal_case(subtype))
    }
}

/// A free name for `schema`: the wanted name, else with the collision
/// suffix, else with a counter. An existing component identical to
/// `schema` under the wanted name is reused.
fn allocate_name(
    schemas: &IndexMap<String, Schema>,
    wanted: &str,
    collision_suffix: &str,
    schema: &Schema,
) -> String {
    match schemas.get(wanted) {
        None => wanted.to_string(),
        Some(existing) if existing == schema => wanted.to_string(),
        Some(_) => next_free(&format!("{wanted}{collision_suffix}"), |candidate| {
            schemas.contains_key(candidate)
        }),
    }
}

fn is_primitive(schema: &Schema) -> bool {
    schema.schema_type.is_some_and(SchemaType::is_primitive)
        && schema.properties.is_empty()
        && !schema.has_composition()
}

/// Schemas not worth a name of their own: primitives, single-property
/// wrappers around a reference, arrays of references or primitives, and
/// free-form objects.
fn is_trivial_envelope(schema: &Schema) -> bool {
    if schema.has_composition() || schema.not.is_some() {
        return false;
    }
    if is_primitive(schema) {
        return true;
    }
    if let Some(items) = schema.items.as_deref() {
        return schema.properties.is_empty() && (items.is_reference() || is_primitive(items));
    }
    if schema.properties.len() == 1 {
        return schema.properties.values().all(Schema::is_reference);
    }
    let free_form = matches!(
        schema.additional_properties,
        None | Some(AdditionalProperties::Bool(_))
    );
    schema.properties.is_empty()
        && free_form
        && schema.schema_type.is_none_or(|t| t == SchemaType::Object)
}
