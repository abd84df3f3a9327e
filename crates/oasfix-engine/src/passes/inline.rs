use std::collections::HashMap;

use super::{Pass, PassContext};
use crate::model::{ComponentKind, Document};
use crate::options::Canceled;
use crate::schema::Schema;
use crate::traverse::walk_document_mut;

/// Replace references to bare primitive component schemas with inline
/// copies, then delete the components.
pub struct Inline;

impl Pass for Inline {
    fn name(&self) -> &'static str {
        "inline"
    }

    #[tracing::instrument(skip_all, name = "inline")]
    fn run(&self, doc: &mut Document, cx: &mut PassContext<'_>) -> Result<(), Canceled> {
        if !cx.options.inline_primitives {
            return Ok(());
        }
        // Inlining an alias of a primitive turns it into a primitive, so
        // repeat until nothing is left to inline.
        loop {
            cx.cancel.checkpoint()?;
            let candidates = primitive_components(doc);
            if candidates.is_empty() {
                return Ok(());
            }
            inline_references(doc, cx, &candidates)?;
            for name in candidates.keys() {
                tracing::warn!(schema = %name, "inlined primitive component");
                doc.components.schemas.shift_remove(name);
            }
            cx.stats.primitives_inlined += candidates.len();
        }
    }
}

/// Bare primitive component schemas, keyed by name, with their titles
/// removed.
fn primitive_components(doc: &Document) -> HashMap<String, Schema> {
    doc.components
        .schemas
        .iter()
        .filter(|(_, schema)| schema.is_bare_primitive())
        .map(|(name, schema)| {
            let mut copy = schema.clone();
            copy.title = None;
            (name.clone(), copy)
        })
        .collect()
}

fn inline_references(
    doc: &mut Document,
    cx: &mut PassContext<'_>,
    candidates: &HashMap<String, Schema>,
) -> Result<(), Canceled> {
    walk_document_mut(doc, cx.cancel, &mut |schema, pointer| {
        if let Some(replacement) = schema.referenced_name().and_then(|name| candidates.get(name)) {
            tracing::debug!(pointer, "inlining primitive reference");
            *schema = replacement.clone();
        }
        if let Some(discriminator) = schema.discriminator.as_mut() {
            discriminator.mapping.retain(|_, target| {
                !matches!(
                    ComponentKind::parse_reference(target),
                    Some((ComponentKind::Schema, name)) if candidates.contains_key(name)
                )
            });
        }
    })
}
