//! The full normalization run: load, repair, serialize, re-validate.

use crate::diagnostics::{FixError, RepairStats, Residual};
use crate::loader::{self, Format};
use crate::model::Document;
use crate::options::{CancelToken, FixOptions};
use crate::passes::{
    Emptiness, Extract, Inline, Integrity, Metadata, Normalize, Pass, PassContext, Structural,
};
use crate::patches::apply_patches;
use crate::serialize;
use crate::validate::validate;

/// Outcome of a successful run.
#[derive(Debug)]
pub struct FixReport {
    /// The repaired document, in `format`.
    pub output: String,
    pub format: Format,
    /// Defects the round-trip validator still found in `output`.
    pub residuals: Vec<Residual>,
    pub stats: RepairStats,
}

impl FixReport {
    pub fn is_clean(&self) -> bool {
        self.residuals.is_empty()
    }
}

/// Passes in run order. Integrity and normalization run a second time so
/// that references and shapes introduced by inlining and extraction are
/// held to the same invariants. Enum cleaning and member pruning can leave
/// new bare primitives behind, so the tail inlines once more and cleans up
/// the nodes that received copies.
fn passes() -> [&'static dyn Pass; 11] {
    [
        &Structural,
        &Integrity,
        &Normalize,
        &Inline,
        &Extract,
        &Integrity,
        &Normalize,
        &Metadata,
        &Emptiness,
        &Inline,
        &Emptiness,
    ]
}

/// Run every pass and every enabled patch over `doc`.
///
/// # Errors
///
/// Returns [`FixError::Canceled`] if `cancel` trips; `doc` is then partially
/// rewritten.
pub fn repair(
    doc: &mut Document,
    options: &FixOptions,
    cancel: &CancelToken,
) -> Result<RepairStats, FixError> {
    let mut stats = RepairStats::default();
    let mut cx = PassContext {
        options,
        cancel,
        stats: &mut stats,
    };
    for pass in passes() {
        cancel.checkpoint()?;
        tracing::debug!(pass = pass.name(), "running pass");
        pass.run(doc, &mut cx)?;
    }
    cancel.checkpoint()?;
    apply_patches(doc, options, cancel, cx.stats)?;
    Ok(stats)
}

/// Normalize `content` and return the repaired text.
///
/// `format` defaults to the one detected from `file_name` and the content.
///
/// # Errors
///
/// Returns [`FixError::Parse`] or [`FixError::Structure`] when the input
/// cannot be read as a document, [`FixError::Serialize`] when the result
/// cannot be written, and [`FixError::Canceled`] when `cancel` trips.
#[tracing::instrument(skip_all, fields(file = file_name))]
pub fn fix(
    content: &str,
    file_name: &str,
    format: Option<Format>,
    options: &FixOptions,
    cancel: &CancelToken,
) -> Result<FixReport, FixError> {
    let format =
        format.unwrap_or_else(|| Format::detect(Some(std::path::Path::new(file_name)), content));
    let loaded = loader::load(content, file_name, format)?;
    let mut doc = loaded.document;

    let mut stats = repair(&mut doc, options, cancel)?;
    stats.references_cleaned += loaded.references_repaired;

    cancel.checkpoint()?;
    let output = serialize::to_string(&doc, format)?;
    let residuals = validate(&output, file_name, format, cancel)?;
    for residual in &residuals {
        tracing::warn!(
            kind = %residual.kind,
            pointer = %residual.pointer,
            "{}",
            residual.message
        );
    }
    tracing::debug!(
        repairs = stats.total(),
        residuals = residuals.len(),
        "normalization finished"
    );
    Ok(FixReport {
        output,
        format,
        residuals,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canceled_token_stops_before_any_output() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = fix(
            r#"{"openapi": "3.0.3", "paths": {}}"#,
            "api.json",
            None,
            &FixOptions::default(),
            &cancel,
        )
        .expect_err("canceled");
        assert!(err.is_canceled());
    }

    #[test]
    fn format_follows_the_file_name() -> anyhow::Result<()> {
        let report = fix(
            "openapi: 3.0.3\npaths: {}\n",
            "api.yaml",
            None,
            &FixOptions::default(),
            &CancelToken::new(),
        )?;
        assert_eq!(report.format, Format::Yaml);
        assert!(report.output.starts_with("openapi: 3.0.3\n"));
        assert!(report.is_clean());
        Ok(())
    }
}
