#![doc = include_str!("../README.md")]
#![allow(unused_assignments)] // thiserror/miette derive macros trigger false positives

extern crate alloc;

mod de;

pub mod diagnostics;
pub mod loader;
pub mod model;
pub mod naming;
pub mod options;
pub mod passes;
pub mod patches;
pub mod pipeline;
pub mod refs;
pub mod schema;
pub mod serialize;
pub mod traverse;
pub mod validate;

pub use diagnostics::{FixError, RepairStats, Residual, ResidualKind};
pub use loader::{Format, Loaded, load};
pub use model::Document;
pub use options::{CancelToken, Canceled, FixOptions};
pub use pipeline::{FixReport, fix, repair};
