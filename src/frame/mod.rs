//! Frame module: the flat tree encoding.
//!
//! This module contains:
//! - [`Frame`]: one tagged node, with a [`FrameData`] payload per [`FrameKind`]
//! - [`FrameBuffer`]: the append-only builder used by render logic
//! - [`Frames`]: a finalized, immutable sequence ready for diffing

#[allow(clippy::module_inception)]
mod frame;
mod buffer;
mod frames;

pub use frame::{
    AttributeValue, Callback, ComponentId, ComponentType, EventHandlerId, Frame, FrameData, FrameKind, Key,
    StateRef,
};
pub use buffer::FrameBuffer;
pub use frames::{Frames, Siblings};
