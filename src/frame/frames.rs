//! Frames: a finalized, immutable frame sequence.
//!
//! Storage is an `Arc<Vec<Frame>>` so a finished render can be shared with
//! a renderer thread while also being retained as the next diff's "old"
//! side. Once every other holder has let go, the storage can be taken back
//! with [`Frames::into_storage`] and reused by the next build.

use super::frame::{ComponentId, Frame, FrameData, FrameKind, StateRef};
use crate::error::BindError;
use std::ops::{Index, Range};
use std::sync::Arc;

/// Finalized frame sequence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frames {
    frames: Arc<Vec<Frame>>,
}

impl Frames {
    /// An empty sequence.
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_vec(frames: Vec<Frame>) -> Self {
        Self {
            frames: Arc::new(frames),
        }
    }

    /// Number of frames.
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the sequence is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    /// All frames in pre-order.
    #[inline]
    pub fn as_slice(&self) -> &[Frame] {
        &self.frames
    }

    /// Iterate over all frames in pre-order.
    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    /// Indices of the top-level frames.
    pub fn top_level(&self) -> Siblings<'_> {
        Siblings {
            frames: &self.frames,
            next: 0,
            end: self.frames.len(),
        }
    }

    /// Indices of the direct children of the container at `index`,
    /// attributes included. Leaves have no children.
    pub fn children(&self, index: usize) -> Siblings<'_> {
        let range = self.descendants(index);
        Siblings {
            frames: &self.frames,
            next: range.start,
            end: range.end,
        }
    }

    /// Index range of the descendants of the frame at `index`.
    pub fn descendants(&self, index: usize) -> Range<usize> {
        self.frames.get(index).map_or(index..index, |frame| {
            let start = index + 1;
            start..(start + frame.subtree_len() as usize).min(self.frames.len())
        })
    }

    /// Number of top-level live nodes, looking through regions.
    pub fn live_roots(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![0..self.frames.len()];
        while let Some(range) = pending.pop() {
            let mut index = range.start;
            while index < range.end {
                let frame = &self.frames[index];
                let end = (index + frame.span()).min(range.end);
                if frame.kind() == FrameKind::Region {
                    pending.push(index + 1..end);
                } else if frame.kind().is_node() {
                    count += 1;
                }
                index = end;
            }
        }
        count
    }

    /// The attribute run of the element or component at `index`.
    pub fn attributes(&self, index: usize) -> &[Frame] {
        let range = self.descendants(index);
        let run = self.frames[range.clone()]
            .iter()
            .take_while(|frame| frame.kind() == FrameKind::Attribute)
            .count();
        &self.frames[range.start..range.start + run]
    }

    /// Whether this handle and `other` share the same storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.frames, &other.frames)
    }

    /// Bind registry state to the component frame at `index`.
    ///
    /// Produces a new sequence; storage shared with other handles is copied
    /// first, so no other holder observes the change.
    pub fn with_component_binding(
        mut self,
        index: usize,
        id: ComponentId,
        state: Option<StateRef>,
    ) -> Result<Self, BindError> {
        self.bind_component(index, id, state)?;
        Ok(self)
    }

    /// In-place form of [`with_component_binding`](Self::with_component_binding).
    /// Leaves the sequence untouched on error.
    pub fn bind_component(&mut self, index: usize, id: ComponentId, state: Option<StateRef>) -> Result<(), BindError> {
        let len = self.frames.len();
        let frame = self
            .frames
            .get(index)
            .ok_or(BindError::OutOfBounds { index, len })?;
        if frame.kind() != FrameKind::Component {
            return Err(BindError::NotAComponent {
                index,
                kind: frame.kind(),
            });
        }
        let frames = Arc::make_mut(&mut self.frames);
        let bound = frames[index].clone().with_component_binding(id, state);
        frames[index] = bound;
        Ok(())
    }

    /// Component id bound to the frame at `index`, if any.
    pub fn component_id(&self, index: usize) -> Option<ComponentId> {
        match self.frames.get(index)?.data() {
            FrameData::Component { component_id, .. } => *component_id,
            _ => None,
        }
    }

    /// Take back the storage for reuse, if no other handle holds it.
    pub fn into_storage(self) -> Option<Vec<Frame>> {
        Arc::try_unwrap(self.frames).ok()
    }

    /// Check the container invariants: every subtree stays inside its
    /// parent and the top-level spans add up to the buffer length.
    ///
    /// Walks with an explicit stack of open container ends, so nesting depth
    /// is bounded only by memory.
    pub fn is_well_formed(&self) -> bool {
        let len = self.frames.len();
        let mut open: Vec<usize> = Vec::new();
        let mut index = 0;
        while index < len {
            while open.last() == Some(&index) {
                open.pop();
            }
            let frame = &self.frames[index];
            let end = index + frame.span();
            if end > open.last().copied().unwrap_or(len) {
                return false;
            }
            if frame.kind().is_container() {
                open.push(end);
                index += 1;
            } else {
                index = end;
            }
        }
        index == len
    }
}

impl Index<usize> for Frames {
    type Output = Frame;

    #[inline]
    fn index(&self, index: usize) -> &Frame {
        &self.frames[index]
    }
}

impl<'a> IntoIterator for &'a Frames {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over sibling frame indices, skipping nested subtrees.
#[derive(Clone, Debug)]
pub struct Siblings<'a> {
    frames: &'a [Frame],
    next: usize,
    end: usize,
}

impl Iterator for Siblings<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next += self.frames[index].span();
        Some(index)
    }
}
