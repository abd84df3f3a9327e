//! Reference enumeration and rewriting.
//!
//! Every `$ref` in the document, plus discriminator mapping targets, is
//! reachable through [`for_each_reference_mut`]. Renames go through
//! [`rewrite_references`] so that no pointer is left behind.

use std::collections::HashMap;
use indexmap::IndexMap;

use crate::loader::strip_angle_brackets;
use crate::model::{ComponentKind, Document, Header, Parameter, RefOr, Response, escape_pointer};
use crate::options::{CancelToken, Canceled};
use crate::traverse::{child_pointer, walk_document_mut};

/// Canonical form of a reference string, or `None` if it is already
/// canonical.
///
/// Strips stray angle brackets (raw or as `<`/`>` escape text) and
/// whitespace, rewrites legacy `#/definitions/X` to the schema table, and
/// expands a bare component name (no `#`, `/` or `.`) into a local reference
/// of the expected `kind`.
pub fn clean_reference(kind: ComponentKind, reference: &str) -> Option<String> {
    let stripped: String = strip_angle_brackets(reference)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let canonical = if let Some(name) = stripped.strip_prefix("#/definitions/") {
        format!("#/components/schemas/{name}")
    } else if !stripped.is_empty() && !stripped.contains(['#', '/', '.']) {
        kind.reference(&stripped)
    } else {
        stripped
    };
    (canonical != reference).then_some(canonical)
}

/// Call `f` with every reference string in the document, the component kind
/// its position expects, and a pointer to it.
///
/// # Errors
///
/// Returns [`Canceled`] if `cancel` trips between two paths or components.
pub fn for_each_reference_mut<F>(
    doc: &mut Document,
    cancel: &CancelToken,
    mut f: F,
) -> Result<(), Canceled>
where
    F: FnMut(ComponentKind, &mut String, &str),
{
    walk_document_mut(doc, cancel, &mut |schema, pointer| {
        if let Some(reference) = schema.reference.as_mut() {
            f(ComponentKind::Schema, reference, pointer);
        }
        if let Some(discriminator) = schema.discriminator.as_mut() {
            for (value, target) in &mut discriminator.mapping {
                let p = format!("{pointer}/discriminator/mapping/{}", escape_pointer(value));
                f(ComponentKind::Schema, target, &p);
            }
        }
    })?;

    let f = &mut f;
    for (path, item) in &mut doc.paths {
        cancel.checkpoint()?;
        let base = child_pointer("#/paths", path);
        parameter_refs(&mut item.parameters, &base, f);
        for (method, operation) in item.operations_mut() {
            let op = format!("{base}/{method}");
            parameter_refs(&mut operation.parameters, &op, f);
            if let Some(RefOr::Ref(r)) = operation.request_body.as_mut() {
                f(ComponentKind::RequestBody, &mut r.reference, &format!("{op}/requestBody"));
            }
            for (status, response) in &mut operation.responses {
                response_refs(response, &child_pointer(&format!("{op}/responses"), status), f);
            }
        }
    }

    let components = &mut doc.components;
    cancel.checkpoint()?;
    for (name, parameter) in &mut components.parameters {
        if let RefOr::Ref(r) = parameter {
            let p = child_pointer("#/components/parameters", name);
            f(ComponentKind::Parameter, &mut r.reference, &p);
        }
    }
    for (name, body) in &mut components.request_bodies {
        if let RefOr::Ref(r) = body {
            let p = child_pointer("#/components/requestBodies", name);
            f(ComponentKind::RequestBody, &mut r.reference, &p);
        }
    }
    for (name, response) in &mut components.responses {
        response_refs(response, &child_pointer("#/components/responses", name), f);
    }
    header_refs(&mut components.headers, "#/components", f);
    for (name, scheme) in &mut components.security_schemes {
        if let RefOr::Ref(r) = scheme {
            let p = child_pointer("#/components/securitySchemes", name);
            f(ComponentKind::SecurityScheme, &mut r.reference, &p);
        }
    }
    Ok(())
}

fn parameter_refs<F>(parameters: &mut [RefOr<Parameter>], pointer: &str, f: &mut F)
where
    F: FnMut(ComponentKind, &mut String, &str),
{
    for (i, parameter) in parameters.iter_mut().enumerate() {
        if let RefOr::Ref(r) = parameter {
            f(ComponentKind::Parameter, &mut r.reference, &format!("{pointer}/parameters/{i}"));
        }
    }
}

fn header_refs<F>(headers: &mut IndexMap<String, RefOr<Header>>, pointer: &str, f: &mut F)
where
    F: FnMut(ComponentKind, &mut String, &str),
{
    for (name, header) in headers {
        if let RefOr::Ref(r) = header {
            let p = format!("{pointer}/headers/{}", escape_pointer(name));
            f(ComponentKind::Header, &mut r.reference, &p);
        }
    }
}

fn response_refs<F>(response: &mut RefOr<Response>, pointer: &str, f: &mut F)
where
    F: FnMut(ComponentKind, &mut String, &str),
{
    match response {
        RefOr::Ref(r) => f(ComponentKind::Response, &mut r.reference, pointer),
        RefOr::Item(response) => header_refs(&mut response.headers, pointer, f),
    }
}

/// Point every reference to a renamed component of `kind` at its new name.
/// Security requirement keys are renamed along with security schemes.
///
/// Returns the number of references rewritten.
///
/// # Errors
///
/// Returns [`Canceled`] if `cancel` trips mid-way.
pub fn rewrite_references(
    doc: &mut Document,
    cancel: &CancelToken,
    kind: ComponentKind,
    renames: &HashMap<String, String>,
) -> Result<usize, Canceled> {
    if renames.is_empty() {
        return Ok(0);
    }
    let mut rewritten = 0;
    for_each_reference_mut(doc, cancel, |_, reference, _| {
        if let Some((found, name)) = ComponentKind::parse_reference(reference)
            && found == kind
            && let Some(to) = renames.get(name)
        {
            *reference = kind.reference(to);
            rewritten += 1;
        }
    })?;

    if kind == ComponentKind::SecurityScheme {
        let mut lists: Vec<_> = doc.security.iter_mut().collect();
        for item in doc.paths.values_mut() {
            for (_, operation) in item.operations_mut() {
                lists.extend(operation.security.as_mut());
            }
        }
        for requirement in lists.into_iter().flatten() {
            for (from, to) in renames {
                if let Some(index) = requirement.get_index_of(from)
                    && !requirement.contains_key(to)
                    && let Some(scopes) = requirement.shift_remove(from)
                {
                    requirement.shift_insert(index, to.clone(), scopes);
                    rewritten += 1;
                }
            }
        }
    }
    Ok(rewritten)
}
