//! # Framewheel
//!
//! A flat frame-tree encoding and keyed reconciliation engine for retained
//! UI surfaces.
//!
//! Render logic describes its output by appending frames to a
//! [`FrameBuffer`]. Each pass is diffed against the previous one and the
//! result, an ordered [`EditScript`], is applied to whatever holds the live
//! tree through the [`EditSink`] seam.
//!
//! ## Core Concepts
//!
//! - **Flat pre-order frames**: containers carry their subtree length, so
//!   whole subtrees are skipped in one step
//! - **Sequence numbers and keys**: siblings keep their identity across
//!   passes by source position, or by an explicit key in dynamic lists
//! - **Ordered edit scripts**: paths are valid at the moment each edit is
//!   applied, so a renderer walks the script once
//! - **Actor model**: an optional renderer thread applies whole scripts only
//!
//! ## Example
//!
//! ```rust
//! use framewheel::{LiveTree, RenderRoot};
//!
//! let mut root = RenderRoot::new();
//! let mut tree = LiveTree::new();
//!
//! for label in ["draft", "final"] {
//!     let script = root
//!         .render(|b| {
//!             b.open_element(0, "p")?;
//!             b.add_text(1, label)?;
//!             b.close_element()
//!         })
//!         .unwrap();
//!     script.apply_to(&mut tree).unwrap();
//! }
//!
//! assert_eq!(tree.to_string(), "<p>\n  \"final\"\n");
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod actor;
pub mod diff;
pub mod error;
pub mod frame;
pub mod live;
pub mod root;

// Re-exports for convenience
pub use actor::{Engine, EngineConfig, PassSummary, RenderCommand, RenderEvent, RendererActor};
pub use diff::{diff, DiffConfig, DiffEngine, Edit, EditScript, EditSink, NodePath};
pub use error::{ApplyError, BindError, BuildError, DiffError, RenderError};
pub use frame::{
    AttributeValue, Callback, ComponentId, ComponentType, EventHandlerId, Frame, FrameBuffer, FrameData, FrameKind,
    Frames, Key, StateRef,
};
pub use live::{LiveNode, LiveTree};
pub use root::{RenderRoot, RootConfig};
