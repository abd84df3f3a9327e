use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::options::Canceled;

/// Failure of a normalization run.
///
/// Recoverable defects never surface here; they are repaired and logged.
#[derive(Debug, Error, Diagnostic)]
pub enum FixError {
    /// The input is not valid JSON/YAML even after lexical repair.
    #[error("{message}")]
    #[diagnostic(code(oasfix::parse))]
    Parse {
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
        message: String,
    },

    /// The input parsed but is not shaped like an API description at all
    /// (for example a top-level array).
    #[error("{name}: {message}")]
    #[diagnostic(
        code(oasfix::structure),
        help("the document root must be an object with `openapi`, `paths` and `components`")
    )]
    Structure {
        name: String,
        pointer: String,
        message: String,
    },

    #[error("failed to serialize the repaired document: {message}")]
    #[diagnostic(code(oasfix::serialize))]
    Serialize { message: String },

    /// Canceled by the caller. No output is produced.
    #[error("normalization canceled")]
    #[diagnostic(code(oasfix::canceled))]
    Canceled,
}

impl From<Canceled> for FixError {
    fn from(_: Canceled) -> Self {
        FixError::Canceled
    }
}

impl FixError {
    pub fn is_canceled(&self) -> bool {
        matches!(self, FixError::Canceled)
    }
}

/// What a residual diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResidualKind {
    Parse,
    DanglingReference,
    DuplicateOperationId,
    MissingOperationId,
    InvalidComponentName,
    MissingPathParameter,
    MissingType,
    EmptyCompositionMember,
    DefaultNotInEnum,
}

impl ResidualKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::DanglingReference => "dangling-reference",
            Self::DuplicateOperationId => "duplicate-operation-id",
            Self::MissingOperationId => "missing-operation-id",
            Self::InvalidComponentName => "invalid-component-name",
            Self::MissingPathParameter => "missing-path-parameter",
            Self::MissingType => "missing-type",
            Self::EmptyCompositionMember => "empty-composition-member",
            Self::DefaultNotInEnum => "default-not-in-enum",
        }
    }
}

impl core::fmt::Display for ResidualKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A defect the round-trip validator found in the emitted document.
///
/// Any residual means the pipeline left the document non-conformant; it is
/// reported to the caller, never silently corrected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("{pointer}: {message}")]
#[diagnostic(code(oasfix::residual), severity(Warning))]
pub struct Residual {
    pub kind: ResidualKind,
    /// JSON pointer (as a URI fragment) to the offending node.
    pub pointer: String,
    pub message: String,
}

impl Residual {
    pub fn new(kind: ResidualKind, pointer: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            pointer: pointer.into(),
            message: message.into(),
        }
    }
}

/// Counts of repairs made during a run, one field per kind of rewrite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairStats {
    pub references_cleaned: usize,
    pub operation_ids_fixed: usize,
    pub components_renamed: usize,
    pub path_parameters_added: usize,
    pub paths_merged: usize,
    pub references_nulled: usize,
    pub schemas_normalized: usize,
    pub discriminators_synthesized: usize,
    pub primitives_inlined: usize,
    pub schemas_extracted: usize,
    pub enums_cleaned: usize,
    pub defaults_fixed: usize,
    pub examples_dropped: usize,
    pub empty_entries_removed: usize,
    pub fallbacks_added: usize,
    pub patches_applied: usize,
}

impl RepairStats {
    /// Total number of individual repairs.
    pub fn total(&self) -> usize {
        self.rows().iter().map(|(_, n)| n).sum()
    }

    /// Labelled counters, for reporting.
    pub fn rows(&self) -> [(&'static str, usize); 16] {
        [
            ("references cleaned", self.references_cleaned),
            ("operation ids fixed", self.operation_ids_fixed),
            ("components renamed", self.components_renamed),
            ("path parameters added", self.path_parameters_added),
            ("paths merged", self.paths_merged),
            ("references nulled", self.references_nulled),
            ("schemas normalized", self.schemas_normalized),
            ("discriminators synthesized", self.discriminators_synthesized),
            ("primitives inlined", self.primitives_inlined),
            ("schemas extracted", self.schemas_extracted),
            ("enums cleaned", self.enums_cleaned),
            ("defaults fixed", self.defaults_fixed),
            ("examples dropped", self.examples_dropped),
            ("empty entries removed", self.empty_entries_removed),
            ("fallbacks added", self.fallbacks_added),
            ("patches applied", self.patches_applied),
        ]
    }
}

/// Convert a 1-based line/column into a byte offset into `content`.
pub(crate) fn line_col_to_offset(content: &str, line: usize, col: usize) -> usize {
    let mut offset = 0;
    for (i, l) in content.split('\n').enumerate() {
        if i + 1 == line {
            return (offset + col.saturating_sub(1)).min(content.len());
        }
        offset += l.len() + 1;
    }
    content.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_from_line_col() {
        let content = "{\n  \"a\": 1,\n  oops\n}";
        assert_eq!(line_col_to_offset(content, 1, 1), 0);
        assert_eq!(line_col_to_offset(content, 3, 3), 14);
        assert_eq!(line_col_to_offset(content, 99, 1), content.len());
    }

    #[test]
    fn stats_total_sums_rows() {
        let stats = RepairStats {
            operation_ids_fixed: 2,
            schemas_extracted: 3,
            ..RepairStats::default()
        };
        assert_eq!(stats.total(), 5);
    }

    #[test]
    fn residual_displays_pointer() {
        let r = Residual::new(
            ResidualKind::DanglingReference,
            "#/paths/~1pets/get",
            "reference does not resolve",
        );
        assert_eq!(r.to_string(), "#/paths/~1pets/get: reference does not resolve");
    }
}
