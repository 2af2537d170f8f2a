//! Live module: a retained-mode reference renderer.
//!
//! [`LiveTree`] materializes frames into nodes and keeps them current by
//! applying edit scripts. It is what a real renderer looks like from the
//! diff's side of the [`EditSink`](crate::diff::EditSink) seam, and it backs
//! headless hosting and the crate's own tests.

mod node;
mod tree;

pub use node::{Attributes, LiveAttribute, LiveNode};
pub use tree::LiveTree;
