//! Edit script: the ordered output of a diff.
//!
//! Edits address live nodes by [`NodePath`], the chain of child indices from
//! the live root. A path is always interpreted against the live tree as it
//! stands when that edit is applied, so a renderer can walk the script once,
//! front to back, without any bookkeeping of its own.

use crate::error::ApplyError;
use crate::frame::{AttributeValue, ComponentId, EventHandlerId, Frame, StateRef};
use bitflags::bitflags;
use std::fmt;
use std::sync::Arc;

/// Path of child indices from the live root to a node.
///
/// The empty path is the root itself, which only ever appears as a parent.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct NodePath(Vec<u32>);

impl NodePath {
    /// The live root.
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Whether this is the root path.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Child indices from the root.
    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.0
    }

    /// Path of the `index`-th child of this node.
    #[must_use]
    pub fn child(&self, index: u32) -> Self {
        let mut indices = Vec::with_capacity(self.0.len() + 1);
        indices.extend_from_slice(&self.0);
        indices.push(index);
        Self(indices)
    }

    /// Split into parent path and own index; `None` for the root.
    pub fn split_last(&self) -> Option<(Self, u32)> {
        let (&last, parent) = self.0.split_last()?;
        Some((Self(parent.to_vec()), last))
    }
}

impl From<Vec<u32>> for NodePath {
    fn from(indices: Vec<u32>) -> Self {
        Self(indices)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for index in &self.0 {
            write!(f, "/{index}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodePath({self})")
    }
}

/// One structural edit.
#[derive(Clone, PartialEq, Debug)]
pub enum Edit {
    /// Materialize `frames` as a new child of `parent` at position `index`.
    ///
    /// `frames` holds exactly one node-producing frame and its subtree.
    /// `origin` is the index of `frames[0]` in the new buffer, for
    /// resolving buffer-relative indices inside the subtree.
    InsertSubtree {
        /// Parent node.
        parent: NodePath,
        /// Position the new child takes.
        index: u32,
        /// Index of the first frame in the new buffer.
        origin: usize,
        /// The subtree.
        frames: Vec<Frame>,
    },
    /// Tear down a node and everything under it.
    RemoveSubtree {
        /// Node to remove.
        node: NodePath,
    },
    /// Move a child of `parent` from `from` to `to`, where `to` counts
    /// positions after the child has been taken out.
    MoveSubtree {
        /// Parent node.
        parent: NodePath,
        /// Current position.
        from: u32,
        /// Position after the move.
        to: u32,
    },
    /// Replace a text node's content.
    SetText {
        /// Text node.
        node: NodePath,
        /// New content.
        text: Arc<str>,
    },
    /// Add or replace an attribute.
    SetAttribute {
        /// Element or component node.
        node: NodePath,
        /// Attribute name.
        name: Arc<str>,
        /// New value.
        value: AttributeValue,
        /// New event handler id.
        handler: Option<EventHandlerId>,
    },
    /// Remove an attribute.
    RemoveAttribute {
        /// Element or component node.
        node: NodePath,
        /// Attribute name.
        name: Arc<str>,
    },
    /// Replace a markup node's content.
    UpdateMarkup {
        /// Markup node.
        node: NodePath,
        /// New markup.
        markup: Arc<str>,
    },
}

impl Edit {
    /// Whether the edit changes the shape of the live tree.
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::InsertSubtree { .. } | Self::RemoveSubtree { .. } | Self::MoveSubtree { .. }
        )
    }
}

bitflags! {
    /// Authoring problems noticed while diffing. None of them abort the diff.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Diagnostics: u8 {
        /// Two siblings shared a key; the later one won.
        const DUPLICATE_KEY = 0b0000_0001;
        /// An element or component repeated an attribute name; the later one won.
        const DUPLICATE_ATTRIBUTE = 0b0000_0010;
        /// A key matched a sibling of a different kind, name or type.
        const KEY_IDENTITY_CONFLICT = 0b0000_0100;
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        bitflags::parser::to_writer(self, f)
    }
}

/// Counters collected during a diff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffStats {
    /// Sibling pairs matched by the sequence-number fast path.
    pub fast_path_matches: usize,
    /// Sibling pairs matched by key.
    pub keyed_matches: usize,
    /// Unkeyed sibling pairs matched by source slot.
    pub slot_matches: usize,
    /// Insert edits emitted.
    pub inserts: usize,
    /// Remove edits emitted.
    pub removes: usize,
    /// Move edits emitted.
    pub moves: usize,
    /// Content and attribute edits emitted.
    pub updates: usize,
}

/// A component that kept its identity across the diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentBinding {
    /// Index of the component frame in the new buffer.
    pub index: usize,
    /// Registry id carried over from the old frame.
    pub id: ComponentId,
    /// Registry state handle carried over from the old frame.
    pub state: Option<StateRef>,
}

/// Ordered result of reconciling two frame sequences.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditScript {
    /// Edits in application order.
    pub edits: Vec<Edit>,
    /// Components torn down by removals, in removal order.
    pub disposed_components: Vec<ComponentId>,
    /// Components that survived, keyed by their new frame index.
    pub retained_components: Vec<ComponentBinding>,
    /// Authoring problems noticed along the way.
    pub diagnostics: Diagnostics,
    /// Counters.
    pub stats: DiffStats,
}

impl EditScript {
    /// Whether the script contains no edits.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Number of edits.
    #[inline]
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Iterate over the edits.
    pub fn iter(&self) -> std::slice::Iter<'_, Edit> {
        self.edits.iter()
    }

    /// Apply every edit to `sink` as one batch.
    ///
    /// On failure the sink is rolled back and the error returned.
    pub fn apply_to<S: EditSink + ?Sized>(&self, sink: &mut S) -> Result<(), ApplyError> {
        sink.begin()?;
        for edit in &self.edits {
            if let Err(err) = sink.apply(edit) {
                tracing::warn!(%err, "edit rejected, rolling back batch");
                sink.rollback();
                return Err(err);
            }
        }
        sink.commit()
    }
}

impl<'a> IntoIterator for &'a EditScript {
    type Item = &'a Edit;
    type IntoIter = std::slice::Iter<'a, Edit>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Consumer of edit scripts, implemented by renderers.
///
/// A batch is bracketed by [`begin`](Self::begin) and
/// [`commit`](Self::commit); nothing applied in between may become visible
/// before the commit. [`rollback`](Self::rollback) discards a failed batch.
pub trait EditSink {
    /// Start a batch.
    fn begin(&mut self) -> Result<(), ApplyError> {
        Ok(())
    }

    /// Apply one edit.
    fn apply(&mut self, edit: &Edit) -> Result<(), ApplyError>;

    /// Make the batch visible.
    fn commit(&mut self) -> Result<(), ApplyError> {
        Ok(())
    }

    /// Discard the batch.
    fn rollback(&mut self) {}
}

impl<S: EditSink + ?Sized> EditSink for Box<S> {
    fn begin(&mut self) -> Result<(), ApplyError> {
        (**self).begin()
    }

    fn apply(&mut self, edit: &Edit) -> Result<(), ApplyError> {
        (**self).apply(edit)
    }

    fn commit(&mut self) -> Result<(), ApplyError> {
        (**self).commit()
    }

    fn rollback(&mut self) {
        (**self).rollback();
    }
}
