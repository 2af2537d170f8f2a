//! Diff module: reconcile two frame sequences into an edit script.
//!
//! This module contains:
//! - [`DiffEngine`]: the lock-step walk over old and new frames
//! - [`KeyMatcher`]: keyed and slot-based sibling matching
//! - [`EditScript`], [`Edit`] and [`NodePath`]: the ordered output
//! - [`EditSink`]: the seam renderers implement to consume scripts
//!
//! ```text
//!   old Frames ──┐
//!                ├──► DiffEngine ──► EditScript ──► EditSink (renderer)
//!   new Frames ──┘        │
//!                     KeyMatcher
//! ```

mod edit;
mod engine;
mod keys;

pub use edit::{ComponentBinding, DiffStats, Diagnostics, Edit, EditScript, EditSink, NodePath};
pub use engine::{diff, diff_with_config, DiffConfig, DiffEngine};
pub use keys::{Candidate, Identity, KeyMatcher, MatchReport};
