//! The rewrite passes, in the order the pipeline runs them.
//!
//! Each pass has exclusive access to the document for its duration and
//! leaves it satisfying the invariants it owns. Later passes may rely on
//! earlier ones; none may break an invariant an earlier pass established.

mod emptiness;
mod extract;
mod inline;
mod integrity;
mod metadata;
mod normalize;
mod structural;

pub use emptiness::Emptiness;
pub use extract::Extract;
pub use inline::Inline;
pub use integrity::Integrity;
pub use metadata::Metadata;
pub use normalize::{Normalize, normalize_schema};
pub use structural::{Structural, merge_path_item, path_placeholders};

use crate::diagnostics::RepairStats;
use crate::model::Document;
use crate::options::{CancelToken, Canceled, FixOptions};

/// State shared by every pass of one run.
pub struct PassContext<'a> {
    pub options: &'a FixOptions,
    pub cancel: &'a CancelToken,
    pub stats: &'a mut RepairStats,
}

/// One rewrite over the whole document.
pub trait Pass {
    /// Short name, used in logs.
    fn name(&self) -> &'static str;

    /// # Errors
    ///
    /// Returns [`Canceled`] if the run's token trips at a checkpoint. The
    /// document may then be partially rewritten and must be discarded.
    fn run(&self, doc: &mut Document, cx: &mut PassContext<'_>) -> Result<(), Canceled>;
}
