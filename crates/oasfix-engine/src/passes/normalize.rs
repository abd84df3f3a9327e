use super::{Pass, PassContext};
use crate::diagnostics::RepairStats;
use crate::model::{ComponentKind, Document};
use crate::options::{Canceled, FixOptions};
use crate::schema::{Composition, Discriminator, Schema, SchemaType};
use crate::traverse::walk_document_mut;

/// Per-node schema cleanup: format aliases, reference siblings, composition
/// collapse, type inference and tagged-union discriminators.
pub struct Normalize;

impl Pass for Normalize {
    fn name(&self) -> &'static str {
        "normalize"
    }

    #[tracing::instrument(skip_all, name = "normalize")]
    fn run(&self, doc: &mut Document, cx: &mut PassContext<'_>) -> Result<(), Canceled> {
        let options = cx.options;
        let stats = &mut *cx.stats;
        walk_document_mut(doc, cx.cancel, &mut |schema, pointer| {
            normalize_schema(schema, pointer, options, stats);
        })
    }
}

/// Canonical spelling of a loosely written `format`.
fn canonical_format(format: &str) -> Option<&'static str> {
    let folded = format.trim().to_ascii_lowercase().replace(['_', ' '], "-");
    match folded.as_str() {
        "datetime" | "date-time" if format != "date-time" => Some("date-time"),
        "guid" | "uuid4" | "uuid" if format != "uuid" => Some("uuid"),
        "int" | "int32" if format != "int32" => Some("int32"),
        "long" | "int64" if format != "int64" => Some("int64"),
        "single" => Some("float"),
        _ => None,
    }
}

/// Normalize one node in place. Children are left to the caller's walk.
pub fn normalize_schema(
    schema: &mut Schema,
    pointer: &str,
    options: &FixOptions,
    stats: &mut RepairStats,
) {
    prune_empty_members(schema, pointer, stats);
    while collapse_single_member(schema, pointer) {
        stats.schemas_normalized += 1;
    }
    if schema.is_reference() {
        if schema.strip_reference_siblings() {
            tracing::warn!(pointer, "dropped keywords beside $ref");
            stats.schemas_normalized += 1;
        }
        return;
    }
    if let Some(format) = schema.format.as_deref()
        && let Some(canonical) = canonical_format(format)
    {
        tracing::warn!(pointer, from = format, to = canonical, "canonicalized format");
        schema.format = Some(canonical.to_string());
        stats.schemas_normalized += 1;
    }
    if infer_type(schema, pointer) {
        stats.schemas_normalized += 1;
    }
    if synthesize_discriminator(schema, pointer, &options.discriminator_property) {
        stats.discriminators_synthesized += 1;
    } else if retract_discriminator(schema, pointer) {
        stats.schemas_normalized += 1;
    }
}

/// Drop inline composition members that carry no constraint.
fn prune_empty_members(schema: &mut Schema, pointer: &str, stats: &mut RepairStats) {
    for which in Composition::ALL {
        let members = schema.composition_mut(which);
        let before = members.len();
        members.retain(|member| !member.is_structurally_empty());
        let removed = before - members.len();
        if removed > 0 {
            tracing::warn!(
                pointer,
                keyword = which.keyword(),
                removed,
                "removed empty composition members"
            );
            stats.empty_entries_removed += removed;
        }
    }
}

/// Collapse one single-member composition list. Returns `true` if the node
/// changed.
fn collapse_single_member(schema: &mut Schema, pointer: &str) -> bool {
    if schema.is_reference() {
        return false;
    }
    for which in Composition::ALL {
        let members = schema.composition(which);
        if members.len() != 1 {
            continue;
        }
        if members[0].is_reference() {
            // A lone reference replaces a parent that adds nothing to it.
            let other_lists = Composition::ALL
                .into_iter()
                .any(|w| w != which && !schema.composition(w).is_empty());
            if schema.has_own_structure() || other_lists {
                continue;
            }
            let member = schema.composition_mut(which).remove(0);
            tracing::warn!(
                pointer,
                keyword = which.keyword(),
                "replaced single-reference composition"
            );
            *schema = member;
            return true;
        }
        let member = schema.composition_mut(which).remove(0);
        tracing::warn!(
            pointer,
            keyword = which.keyword(),
            "absorbed single-member composition"
        );
        absorb(schema, member);
        return true;
    }
    false
}

/// Merge an inline composition member into its parent. Keywords the parent
/// already sets win, except an `object` type the parent has no object
/// keywords for, which yields to the member's type.
fn absorb(parent: &mut Schema, mut member: Schema) {
    let bare_object = parent.schema_type == Some(SchemaType::Object)
        && parent.properties.is_empty()
        && parent.additional_properties.is_none()
        && !parent.has_composition();
    parent.schema_type = match (parent.schema_type, member.schema_type) {
        (_, Some(member_type)) if bare_object => Some(member_type),
        (own, member_type) => own.or(member_type),
    };
    if parent.format.is_none() {
        parent.format = member.format.take();
    }
    if parent.description.is_none() {
        parent.description = member.description.take();
    }
    parent.nullable |= member.nullable;
    for (name, property) in core::mem::take(&mut member.properties) {
        parent.properties.entry(name).or_insert(property);
    }
    for name in member.required.drain(..) {
        if !parent.required.contains(&name) {
            parent.required.push(name);
        }
    }
    if parent.items.is_none() {
        parent.items = member.items.take();
    }
    if parent.additional_properties.is_none() {
        parent.additional_properties = member.additional_properties.take();
    }
    if parent.enum_values.is_none() {
        parent.enum_values = member.enum_values.take();
    }
    if parent.discriminator.is_none() {
        parent.discriminator = member.discriminator.take();
    }
    for which in Composition::ALL {
        let nested = core::mem::take(member.composition_mut(which));
        parent.composition_mut(which).extend(nested);
    }
}

/// Give typeless nodes the type their keywords imply. Returns `true` if a
/// type was set.
fn infer_type(schema: &mut Schema, pointer: &str) -> bool {
    if schema.schema_type.is_some() {
        return false;
    }
    let inferred = if schema.has_composition()
        || !schema.properties.is_empty()
        || schema.additional_properties.is_some()
    {
        SchemaType::Object
    } else if schema.items.is_some() {
        SchemaType::Array
    } else if schema.nullable {
        // Lossy: a nullable node with no other hint could be anything.
        SchemaType::Object
    } else {
        return false;
    };
    tracing::warn!(pointer, schema_type = %inferred, "inferred missing type");
    schema.schema_type = Some(inferred);
    true
}

/// Component names of a tagged union's branches, if every `oneOf` (or else
/// `anyOf`) member is a schema reference.
fn union_branches(schema: &Schema) -> Option<Vec<String>> {
    [Composition::OneOf, Composition::AnyOf]
        .into_iter()
        .map(|which| schema.composition(which))
        .find(|members| !members.is_empty())
        .and_then(|members| {
            members
                .iter()
                .map(|m| m.referenced_name().map(str::to_string))
                .collect()
        })
}

/// Turn a `oneOf`/`anyOf` of references into a discriminated object. An
/// existing discriminator keeps its property name and gains any missing
/// mapping entries. Returns `true` if a discriminator was created.
fn synthesize_discriminator(schema: &mut Schema, pointer: &str, property: &str) -> bool {
    let Some(branches) = union_branches(schema) else {
        return false;
    };
    schema.schema_type = Some(SchemaType::Object);
    let created = schema.discriminator.is_none();
    let discriminator = schema.discriminator.get_or_insert_with(|| Discriminator {
        property_name: property.to_string(),
        ..Discriminator::default()
    });
    if discriminator.property_name.trim().is_empty() {
        discriminator.property_name = property.to_string();
    }
    for name in &branches {
        if !discriminator.mapping.values().any(|target| {
            ComponentKind::parse_reference(target) == Some((ComponentKind::Schema, name.as_str()))
        }) {
            discriminator
                .mapping
                .entry(name.clone())
                .or_insert_with(|| ComponentKind::Schema.reference(name));
        }
    }
    let property_name = discriminator.property_name.clone();
    if created {
        schema
            .properties
            .insert(property_name.clone(), Schema::of_type(SchemaType::String));
    } else {
        schema
            .properties
            .entry(property_name.clone())
            .or_insert_with(|| Schema::of_type(SchemaType::String));
    }
    if !schema.required.contains(&property_name) {
        schema.required.push(property_name);
    }
    if created {
        tracing::warn!(
            pointer,
            branches = branches.len(),
            "synthesized discriminator for tagged union"
        );
    }
    created
}

/// Drop the discriminator of a union that has inline branches, along with
/// the plain string property it names. Returns `true` if the node changed.
fn retract_discriminator(schema: &mut Schema, pointer: &str) -> bool {
    let mixed = [Composition::OneOf, Composition::AnyOf]
        .into_iter()
        .map(|which| schema.composition(which))
        .find(|members| !members.is_empty())
        .is_some_and(|members| members.iter().any(|m| !m.is_reference()));
    if !mixed {
        return false;
    }
    let Some(discriminator) = schema.discriminator.take() else {
        return false;
    };
    let property = discriminator.property_name;
    if schema.properties.get(&property) == Some(&Schema::of_type(SchemaType::String)) {
        schema.properties.shift_remove(&property);
        schema.required.retain(|name| *name != property);
    }
    tracing::warn!(
        pointer,
        property = %property,
        "dropped discriminator of union with inline branches"
    );
    true
}
