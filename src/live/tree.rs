//! Live tree: an in-memory renderer that consumes edit scripts.

use super::node::{Attributes, LiveAttribute, LiveNode};
use crate::diff::{Edit, EditSink, NodePath};
use crate::error::ApplyError;
use crate::frame::{Frame, FrameData, FrameKind, Frames};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Retained node tree built from frames and kept current by edit scripts.
///
/// Batches are staged: [`begin`](EditSink::begin) snapshots the roots, edits
/// land on the snapshot, and only [`commit`](EditSink::commit) makes them
/// visible. A rolled back batch leaves the tree exactly as it was.
#[derive(Debug, Clone, Default)]
pub struct LiveTree {
    roots: Vec<LiveNode>,
    staged: Option<Vec<LiveNode>>,
    batches: u64,
}

impl LiveTree {
    /// An empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialize the tree a frame sequence describes.
    pub fn from_frames(frames: &Frames) -> Self {
        let mut roots = Vec::new();
        materialize(frames.as_slice(), 0..frames.len(), &mut roots);
        Self {
            roots,
            staged: None,
            batches: 0,
        }
    }

    /// Top-level nodes.
    pub fn roots(&self) -> &[LiveNode] {
        &self.roots
    }

    /// Node at `path`, if any. The root path has no node.
    pub fn get(&self, path: &NodePath) -> Option<&LiveNode> {
        let (first, rest) = path.indices().split_first()?;
        let mut node = self.roots.get(*first as usize)?;
        for &index in rest {
            node = node.children().get(index as usize)?;
        }
        Some(node)
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.roots.iter().map(LiveNode::node_count).sum()
    }

    /// Number of committed batches.
    pub const fn batches(&self) -> u64 {
        self.batches
    }

    /// Whether a batch is in progress.
    pub const fn in_batch(&self) -> bool {
        self.staged.is_some()
    }

    /// The tree edits are applied to: the staged copy inside a batch,
    /// the roots otherwise.
    fn working(&mut self) -> &mut Vec<LiveNode> {
        match &mut self.staged {
            Some(staged) => staged,
            None => &mut self.roots,
        }
    }
}

impl PartialEq for LiveTree {
    fn eq(&self, other: &Self) -> bool {
        self.roots == other.roots
    }
}

impl fmt::Display for LiveTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for root in &self.roots {
            root.write_outline(f, 0)?;
        }
        Ok(())
    }
}

impl EditSink for LiveTree {
    fn begin(&mut self) -> Result<(), ApplyError> {
        self.staged = Some(self.roots.clone());
        Ok(())
    }

    fn apply(&mut self, edit: &Edit) -> Result<(), ApplyError> {
        let roots = self.working();
        match edit {
            Edit::InsertSubtree {
                parent, index, frames, ..
            } => {
                let node = materialize_one(frames)?;
                let children = children_mut(roots, parent)?;
                let at = *index as usize;
                if at > children.len() {
                    return Err(out_of_bounds(parent, *index, children.len()));
                }
                children.insert(at, node);
            }
            Edit::RemoveSubtree { node } => {
                let (parent, index) = node.split_last().ok_or_else(|| ApplyError::NoSuchNode(node.clone()))?;
                let children = children_mut(roots, &parent)?;
                if index as usize >= children.len() {
                    return Err(ApplyError::NoSuchNode(node.clone()));
                }
                children.remove(index as usize);
            }
            Edit::MoveSubtree { parent, from, to } => {
                let children = children_mut(roots, parent)?;
                if *from as usize >= children.len() {
                    return Err(out_of_bounds(parent, *from, children.len()));
                }
                if *to as usize >= children.len() {
                    return Err(out_of_bounds(parent, *to, children.len()));
                }
                let moved = children.remove(*from as usize);
                children.insert(*to as usize, moved);
            }
            Edit::SetText { node, text } => match node_mut(roots, node)? {
                LiveNode::Text(current) => *current = text.clone(),
                _ => return Err(wrong_kind(node, FrameKind::Text)),
            },
            Edit::UpdateMarkup { node, markup } => match node_mut(roots, node)? {
                LiveNode::Markup(current) => *current = markup.clone(),
                _ => return Err(wrong_kind(node, FrameKind::Markup)),
            },
            Edit::SetAttribute {
                node,
                name,
                value,
                handler,
            } => {
                attributes_mut(roots, node)?.insert(
                    name.clone(),
                    LiveAttribute {
                        value: value.clone(),
                        handler: *handler,
                    },
                );
            }
            Edit::RemoveAttribute { node, name } => {
                attributes_mut(roots, node)?.remove(name);
            }
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), ApplyError> {
        if let Some(staged) = self.staged.take() {
            self.roots = staged;
        }
        self.batches += 1;
        Ok(())
    }

    fn rollback(&mut self) {
        self.staged = None;
    }
}

fn children_mut<'t>(roots: &'t mut Vec<LiveNode>, path: &NodePath) -> Result<&'t mut Vec<LiveNode>, ApplyError> {
    let mut children = roots;
    for (depth, &index) in path.indices().iter().enumerate() {
        children = match children.get_mut(index as usize) {
            Some(LiveNode::Element { children, .. }) => children,
            Some(_) => return Err(ApplyError::NotAContainer(path.clone())),
            None => {
                let missing = NodePath::from(path.indices()[..=depth].to_vec());
                return Err(ApplyError::NoSuchNode(missing));
            }
        };
    }
    Ok(children)
}

fn node_mut<'t>(roots: &'t mut Vec<LiveNode>, path: &NodePath) -> Result<&'t mut LiveNode, ApplyError> {
    let (parent, index) = path.split_last().ok_or_else(|| ApplyError::NoSuchNode(path.clone()))?;
    children_mut(roots, &parent)?
        .get_mut(index as usize)
        .ok_or_else(|| ApplyError::NoSuchNode(path.clone()))
}

fn attributes_mut<'t>(roots: &'t mut Vec<LiveNode>, path: &NodePath) -> Result<&'t mut Attributes, ApplyError> {
    match node_mut(roots, path)? {
        LiveNode::Element { attributes, .. } | LiveNode::Component { attributes, .. } => Ok(attributes),
        _ => Err(wrong_kind(path, FrameKind::Element)),
    }
}

fn wrong_kind(path: &NodePath, expected: FrameKind) -> ApplyError {
    ApplyError::WrongNodeKind {
        path: path.clone(),
        expected,
    }
}

fn out_of_bounds(parent: &NodePath, index: u32, len: usize) -> ApplyError {
    ApplyError::IndexOutOfBounds {
        parent: parent.clone(),
        index,
        len,
    }
}

/// An element whose descendants are still being materialized.
struct Open {
    end: usize,
    name: Arc<str>,
    attributes: Attributes,
    children: Vec<LiveNode>,
}

/// Build the nodes of a sibling range, flattening regions.
fn materialize(frames: &[Frame], range: Range<usize>, out: &mut Vec<LiveNode>) {
    let mut open: Vec<Open> = Vec::new();
    let mut index = range.start;
    while index < range.end {
        close_finished(&mut open, out, index);
        let frame = &frames[index];
        let end = (index + frame.span()).min(frames.len());
        let node = match frame.data() {
            FrameData::Element { name, .. } => {
                open.push(Open {
                    end,
                    name: name.clone(),
                    attributes: collect_attributes(&frames[index + 1..end]),
                    children: Vec::new(),
                });
                index += 1;
                continue;
            }
            FrameData::Region { .. } => {
                index += 1;
                continue;
            }
            FrameData::Component { component_type, .. } => LiveNode::Component {
                component_type: component_type.clone(),
                attributes: collect_attributes(&frames[index + 1..end]),
            },
            FrameData::Text { text } => LiveNode::Text(text.clone()),
            FrameData::Markup { markup } => LiveNode::Markup(markup.clone()),
            FrameData::Attribute { .. }
            | FrameData::ElementReferenceCapture { .. }
            | FrameData::ComponentReferenceCapture { .. } => {
                index = end;
                continue;
            }
        };
        match open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => out.push(node),
        }
        index = end;
    }
    close_finished(&mut open, out, usize::MAX);
}

/// Turn every open element that ends at or before `index` into a node.
fn close_finished(open: &mut Vec<Open>, out: &mut Vec<LiveNode>, index: usize) {
    while open.last().is_some_and(|element| element.end <= index) {
        let Some(done) = open.pop() else {
            break;
        };
        let node = LiveNode::Element {
            name: done.name,
            attributes: done.attributes,
            children: done.children,
        };
        match open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => out.push(node),
        }
    }
}

/// Build the single node an inserted subtree describes.
fn materialize_one(frames: &[Frame]) -> Result<LiveNode, ApplyError> {
    match frames.first() {
        Some(first) if first.kind().is_node() && first.span() == frames.len() => {}
        _ => return Err(ApplyError::MalformedSubtree),
    }
    let mut nodes = Vec::with_capacity(1);
    materialize(frames, 0..frames.len(), &mut nodes);
    nodes.pop().ok_or(ApplyError::MalformedSubtree)
}

/// Attribute run at the start of a container's descendants; last one wins.
fn collect_attributes(descendants: &[Frame]) -> Attributes {
    descendants
        .iter()
        .map_while(|frame| match frame.data() {
            FrameData::Attribute { name, value, handler } => Some((
                name.clone(),
                LiveAttribute {
                    value: value.clone(),
                    handler: *handler,
                },
            )),
            _ => None,
        })
        .collect()
}
