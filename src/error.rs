//! Error types for building, diffing and applying frame trees.

use crate::diff::NodePath;
use crate::frame::FrameKind;
use thiserror::Error;

/// Structural error while building a frame buffer.
///
/// Fatal to the render pass: the partial buffer is discarded and the
/// previous tree stays in place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A close call with no open container.
    #[error("close_{kind} called with no open container")]
    UnmatchedClose {
        /// Kind the caller tried to close.
        kind: FrameKind,
    },

    /// A close call for a different kind than the innermost open container.
    #[error("close_{expected} called but the innermost open container is a {found}")]
    MismatchedClose {
        /// Kind the caller tried to close.
        expected: FrameKind,
        /// Kind actually open.
        found: FrameKind,
    },

    /// Finalizing while containers are still open.
    #[error("{count} container(s) still open at finish, innermost is a {innermost}")]
    UnclosedContainers {
        /// Number of open containers.
        count: usize,
        /// Kind of the innermost open container.
        innermost: FrameKind,
    },

    /// Attribute appended outside an element or component attribute run.
    #[error("attribute `{name}` must directly follow its element or component")]
    AttributeOutOfPlace {
        /// Attribute name.
        name: String,
    },

    /// An operation that targets the innermost open container found none.
    #[error("no open container")]
    NoOpenContainer,

    /// `set_key` on a region.
    #[error("regions cannot carry a key")]
    KeyOnRegion,

    /// Content frame appended directly inside a component.
    #[error("{kind} frames cannot be children of a component")]
    ContentInsideComponent {
        /// Kind of the rejected frame.
        kind: FrameKind,
    },

    /// Element reference capture outside an element.
    #[error("element reference capture must be inside an element")]
    CaptureOutsideElement,

    /// Component reference capture outside a component.
    #[error("component reference capture must be inside a component")]
    CaptureOutsideComponent,
}

/// Error raised while diffing two frame sequences.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
    /// Tree nesting exceeded the configured depth bound.
    #[error("tree depth exceeds the configured limit of {limit}")]
    DepthLimitExceeded {
        /// Configured maximum depth.
        limit: usize,
    },
}

/// Error raised by an [`EditSink`](crate::diff::EditSink) while applying edits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// No live node at the path.
    #[error("no live node at {0}")]
    NoSuchNode(NodePath),

    /// The node exists but cannot hold children.
    #[error("node at {0} cannot hold children")]
    NotAContainer(NodePath),

    /// The node kind does not support the edit.
    #[error("node at {path} is not a {expected}")]
    WrongNodeKind {
        /// Target node.
        path: NodePath,
        /// Kind the edit needs.
        expected: FrameKind,
    },

    /// Child index past the end of the parent's children.
    #[error("index {index} out of bounds for {parent} with {len} children")]
    IndexOutOfBounds {
        /// Parent node.
        parent: NodePath,
        /// Requested index.
        index: u32,
        /// Child count at the time of the edit.
        len: usize,
    },

    /// The inserted frames do not describe exactly one node.
    #[error("inserted frames do not form a single node")]
    MalformedSubtree,

    /// Backend-specific failure.
    #[error("renderer backend error: {0}")]
    Backend(String),
}

/// Error binding registry state to a component frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// Index past the end of the buffer.
    #[error("frame index {index} out of bounds for buffer of {len} frames")]
    OutOfBounds {
        /// Requested index.
        index: usize,
        /// Buffer length.
        len: usize,
    },

    /// The frame is not a component.
    #[error("frame {index} is a {kind}, not a component")]
    NotAComponent {
        /// Requested index.
        index: usize,
        /// Actual kind.
        kind: FrameKind,
    },
}

/// Failure of a whole render pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// Building the buffer failed.
    #[error("build failed: {0}")]
    Build(#[from] BuildError),

    /// Diffing failed.
    #[error("diff failed: {0}")]
    Diff(#[from] DiffError),

    /// Carrying a component binding forward failed.
    #[error("component binding failed: {0}")]
    Bind(#[from] BindError),

    /// The renderer thread is gone.
    #[error("renderer thread disconnected")]
    Disconnected,
}
