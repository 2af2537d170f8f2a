//! Message types for actor communication.
//!
//! These enums define the protocol between the render root and the
//! renderer thread.

use crate::diff::EditScript;
use crate::error::ApplyError;
use std::time::Duration;

/// Commands sent to the renderer thread.
#[derive(Debug)]
pub enum RenderCommand {
    /// Apply one edit script as a single batch.
    Apply {
        /// Edits against the tree of the previous batch.
        script: EditScript,
        /// Top-level live nodes of the tree the script produces.
        roots: usize,
    },

    /// Replace everything the sink shows, in one batch.
    ///
    /// The renderer removes its current top-level nodes, then applies
    /// `script`, which builds the new tree from nothing.
    Resync {
        /// Edits that build the tree from empty.
        script: EditScript,
        /// Top-level live nodes of that tree.
        roots: usize,
    },

    /// Stop the renderer once every earlier command has been handled.
    Shutdown,
}

/// Outcomes reported by the renderer thread.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    /// A batch was applied and committed.
    Applied {
        /// Batch number, counting from 1.
        batch: u64,
        /// Number of edits in the batch.
        edits: usize,
        /// Time spent applying the batch.
        elapsed: Duration,
    },

    /// A batch was rejected and rolled back. Later batches are skipped
    /// until a resync arrives.
    Failed {
        /// Batch number, counting from 1.
        batch: u64,
        /// Why the sink rejected it.
        error: ApplyError,
    },

    /// A batch was not applied because an earlier one failed.
    Skipped {
        /// Batch number, counting from 1.
        batch: u64,
    },
}

impl RenderEvent {
    /// Batch number this event refers to.
    pub const fn batch(&self) -> u64 {
        match self {
            Self::Applied { batch, .. } | Self::Failed { batch, .. } | Self::Skipped { batch } => *batch,
        }
    }

    /// Whether the batch was applied.
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}
