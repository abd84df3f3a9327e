use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

/// Examples longer than this many characters are dropped.
pub const DEFAULT_MAX_EXAMPLE_LENGTH: usize = 5_000;

/// Property synthesized on tagged unions.
pub const DEFAULT_DISCRIMINATOR_PROPERTY: &str = "type";

/// Knobs for a normalization run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixOptions {
    /// Replace references to bare primitive component schemas with inline
    /// copies and delete the component.
    pub inline_primitives: bool,
    /// Hoist inline operation body schemas into named components.
    pub extract_inline_schemas: bool,
    pub max_example_length: usize,
    /// Property name used when synthesizing discriminators. Overwrites any
    /// existing property of the same name on the union schema.
    pub discriminator_property: String,
    /// Names of vendor patches to skip (see [`crate::patches::PATCHES`]).
    pub disabled_patches: Vec<String>,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            inline_primitives: true,
            extract_inline_schemas: true,
            max_example_length: DEFAULT_MAX_EXAMPLE_LENGTH,
            discriminator_property: DEFAULT_DISCRIMINATOR_PROPERTY.to_string(),
            disabled_patches: Vec::new(),
        }
    }
}

impl FixOptions {
    pub fn patch_enabled(&self, name: &str) -> bool {
        !self.disabled_patches.iter().any(|p| p == name)
    }
}

/// Returned by cancellation checkpoints once the run has been canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("normalization canceled")]
pub struct Canceled;

/// Cooperative cancellation flag shared between the caller and a run.
///
/// Passes check it between top-level steps and between iterations over
/// paths, operations and components, never in the middle of rewriting a
/// single schema subtree.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// # Errors
    ///
    /// Returns [`Canceled`] once [`cancel`](Self::cancel) has been called on
    /// any clone of this token.
    pub fn checkpoint(&self) -> Result<(), Canceled> {
        if self.is_canceled() {
            Err(Canceled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let handle = token.clone();
        assert!(token.checkpoint().is_ok());
        handle.cancel();
        assert_eq!(token.checkpoint(), Err(Canceled));
    }

    #[test]
    fn patches_can_be_disabled_by_name() {
        let options = FixOptions {
            disabled_patches: vec!["siprec-parameter".to_string()],
            ..FixOptions::default()
        };
        assert!(!options.patch_enabled("siprec-parameter"));
        assert!(options.patch_enabled("duplicate-path-placeholder"));
    }
}
