//! Schema tree walking.
//!
//! Owned children (properties, items, additionalProperties, `not`,
//! composition members) are visited exactly once each by a plain tree walk:
//! a child's identity is its position under its parent. Reference edges are
//! never followed as ownership. Code that needs a referenced schema resolves
//! it through [`resolve_schema`], which tracks visited component names.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::model::{Components, Document, Header, MediaType, Parameter, RefOr, escape_pointer};
use crate::options::{CancelToken, Canceled};
use crate::schema::{AdditionalProperties, Composition, Schema};

/// Append an escaped segment to a JSON pointer fragment.
pub fn child_pointer(pointer: &str, segment: &str) -> String {
    format!("{pointer}/{}", escape_pointer(segment))
}

/// Visit `schema` and every owned descendant, pre-order.
///
/// The visitor may rewrite the node it is given; the walk then descends into
/// the node's children as they are after the rewrite.
pub fn walk_schema_mut<F>(schema: &mut Schema, pointer: &str, visit: &mut F)
where
    F: FnMut(&mut Schema, &str),
{
    visit(schema, pointer);
    for (name, property) in &mut schema.properties {
        let p = format!("{pointer}/properties/{}", escape_pointer(name));
        walk_schema_mut(property, &p, visit);
    }
    if let Some(items) = schema.items.as_deref_mut() {
        walk_schema_mut(items, &format!("{pointer}/items"), visit);
    }
    if let Some(AdditionalProperties::Schema(extra)) = schema.additional_properties.as_mut() {
        walk_schema_mut(extra, &format!("{pointer}/additionalProperties"), visit);
    }
    if let Some(not) = schema.not.as_deref_mut() {
        walk_schema_mut(not, &format!("{pointer}/not"), visit);
    }
    for which in Composition::ALL {
        for (i, member) in schema.composition_mut(which).iter_mut().enumerate() {
            let p = format!("{pointer}/{}/{i}", which.keyword());
            walk_schema_mut(member, &p, visit);
        }
    }
}

/// Visit every node of every schema tree in the document.
///
/// # Errors
///
/// Returns [`Canceled`] if `cancel` trips between two roots.
pub fn walk_document_mut<F>(
    doc: &mut Document,
    cancel: &CancelToken,
    visit: &mut F,
) -> Result<(), Canceled>
where
    F: FnMut(&mut Schema, &str),
{
    for_each_schema_root_mut(doc, cancel, |root, pointer| {
        walk_schema_mut(root, pointer, visit);
    })
}

/// Call `visit` on the root of every schema tree: component schemas,
/// parameter and header schemas, and every media type schema.
///
/// # Errors
///
/// Returns [`Canceled`] if `cancel` trips between two paths or components.
pub fn for_each_schema_root_mut<F>(
    doc: &mut Document,
    cancel: &CancelToken,
    mut visit: F,
) -> Result<(), Canceled>
where
    F: FnMut(&mut Schema, &str),
{
    visit_roots(doc, cancel, &mut visit, &mut |_: &mut MediaType, _: &str| {})
}

/// Call `visit` on every media type object (request body, response,
/// parameter and header `content` entries). Media type schemas are not
/// descended into.
///
/// # Errors
///
/// Returns [`Canceled`] if `cancel` trips between two paths or components.
pub fn for_each_media_type_mut<F>(
    doc: &mut Document,
    cancel: &CancelToken,
    mut visit: F,
) -> Result<(), Canceled>
where
    F: FnMut(&mut MediaType, &str),
{
    visit_roots(doc, cancel, &mut |_: &mut Schema, _: &str| {}, &mut visit)
}

struct Roots<'v> {
    schema: &'v mut dyn FnMut(&mut Schema, &str),
    media: &'v mut dyn FnMut(&mut MediaType, &str),
}

impl Roots<'_> {
    fn content(&mut self, content: &mut IndexMap<String, MediaType>, pointer: &str) {
        for (media_type, media) in content {
            let p = format!("{pointer}/content/{}", escape_pointer(media_type));
            (self.media)(media, &p);
            if let Some(schema) = media.schema.as_mut() {
                (self.schema)(schema, &format!("{p}/schema"));
            }
        }
    }

    fn parameter(&mut self, parameter: &mut Parameter, pointer: &str) {
        if let Some(schema) = parameter.schema.as_mut() {
            (self.schema)(schema, &format!("{pointer}/schema"));
        }
        self.content(&mut parameter.content, pointer);
    }

    fn parameters(&mut self, parameters: &mut [RefOr<Parameter>], pointer: &str) {
        for (i, parameter) in parameters.iter_mut().enumerate() {
            if let RefOr::Item(parameter) = parameter {
                self.parameter(parameter, &format!("{pointer}/parameters/{i}"));
            }
        }
    }

    fn header(&mut self, header: &mut Header, pointer: &str) {
        if let Some(schema) = header.schema.as_mut() {
            (self.schema)(schema, &format!("{pointer}/schema"));
        }
        self.content(&mut header.content, pointer);
    }

    fn headers(&mut self, headers: &mut IndexMap<String, RefOr<Header>>, pointer: &str) {
        for (name, header) in headers {
            if let RefOr::Item(header) = header {
                self.header(header, &format!("{pointer}/headers/{}", escape_pointer(name)));
            }
        }
    }
}

fn visit_roots(
    doc: &mut Document,
    cancel: &CancelToken,
    schema: &mut dyn FnMut(&mut Schema, &str),
    media: &mut dyn FnMut(&mut MediaType, &str),
) -> Result<(), Canceled> {
    let mut roots = Roots { schema, media };

    for (path, item) in &mut doc.paths {
        cancel.checkpoint()?;
        let base = child_pointer("#/paths", path);
        roots.parameters(&mut item.parameters, &base);
        for (method, operation) in item.operations_mut() {
            let op = format!("{base}/{method}");
            roots.parameters(&mut operation.parameters, &op);
            if let Some(RefOr::Item(body)) = operation.request_body.as_mut() {
                roots.content(&mut body.content, &format!("{op}/requestBody"));
            }
            for (status, response) in &mut operation.responses {
                if let RefOr::Item(response) = response {
                    let p = format!("{op}/responses/{}", escape_pointer(status));
                    roots.headers(&mut response.headers, &p);
                    roots.content(&mut response.content, &p);
                }
            }
        }
    }

    let components = &mut doc.components;
    for (name, schema) in &mut components.schemas {
        cancel.checkpoint()?;
        (roots.schema)(schema, &child_pointer("#/components/schemas", name));
    }
    for (name, parameter) in &mut components.parameters {
        cancel.checkpoint()?;
        if let RefOr::Item(parameter) = parameter {
            roots.parameter(parameter, &child_pointer("#/components/parameters", name));
        }
    }
    for (name, body) in &mut components.request_bodies {
        cancel.checkpoint()?;
        if let RefOr::Item(body) = body {
            roots.content(&mut body.content, &child_pointer("#/components/requestBodies", name));
        }
    }
    for (name, response) in &mut components.responses {
        cancel.checkpoint()?;
        if let RefOr::Item(response) = response {
            let p = child_pointer("#/components/responses", name);
            roots.headers(&mut response.headers, &p);
            roots.content(&mut response.content, &p);
        }
    }
    for (name, header) in &mut components.headers {
        cancel.checkpoint()?;
        if let RefOr::Item(header) = header {
            roots.header(header, &child_pointer("#/components/headers", name));
        }
    }
    Ok(())
}

/// Outcome of following a chain of schema references.
#[derive(Debug, PartialEq)]
pub enum Resolved<'a> {
    /// The first node in the chain that is not itself a reference.
    Schema(&'a Schema),
    /// A reference in the chain names no component.
    Dangling(String),
    /// The chain revisits a component it already passed through.
    Cycle(String),
}

/// Follow `schema` through component references until a non-reference node.
///
/// `visited` carries component names across calls so callers walking a
/// larger structure can share it; pass an empty set for a standalone lookup.
pub fn resolve_schema<'a>(
    components: &'a Components,
    schema: &'a Schema,
    visited: &mut HashSet<String>,
) -> Resolved<'a> {
    let mut current = schema;
    while let Some(reference) = current.reference.as_deref() {
        let Some(name) = current.referenced_name() else {
            return Resolved::Dangling(reference.to_string());
        };
        if !visited.insert(name.to_string()) {
            return Resolved::Cycle(name.to_string());
        }
        let Some(target) = components.schemas.get(name) else {
            return Resolved::Dangling(reference.to_string());
        };
        current = target;
    }
    Resolved::Schema(current)
}
