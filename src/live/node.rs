//! Retained nodes of the live tree.
//!
//! Clone, equality, drop and outline printing walk the tree with explicit
//! stacks, so a node tree as deep as the frames it came from never runs out
//! of thread stack.

use crate::frame::{AttributeValue, ComponentType, EventHandlerId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// An attribute as the live tree holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveAttribute {
    /// Current value.
    pub value: AttributeValue,
    /// Event handler id, if the attribute is a handler.
    pub handler: Option<EventHandlerId>,
}

/// Attributes of a node, by name.
pub type Attributes = BTreeMap<Arc<str>, LiveAttribute>;

/// One retained node.
#[derive(Debug)]
pub enum LiveNode {
    /// An element with attributes and children.
    Element {
        /// Tag name.
        name: Arc<str>,
        /// Attributes by name.
        attributes: Attributes,
        /// Child nodes in order.
        children: Vec<LiveNode>,
    },
    /// A text node.
    Text(Arc<str>),
    /// An opaque markup node.
    Markup(Arc<str>),
    /// A child component placeholder. Its own output lives elsewhere.
    Component {
        /// Component type.
        component_type: ComponentType,
        /// Parameters by name.
        attributes: Attributes,
    },
}

impl LiveNode {
    /// Element name, if this is an element.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Text content, if this is a text node.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Child nodes. Only elements have any.
    pub fn children(&self) -> &[LiveNode] {
        match self {
            Self::Element { children, .. } => children,
            _ => &[],
        }
    }

    /// Attribute by name, for elements and components.
    pub fn attribute(&self, name: &str) -> Option<&LiveAttribute> {
        match self {
            Self::Element { attributes, .. } | Self::Component { attributes, .. } => attributes.get(name),
            _ => None,
        }
    }

    /// Number of nodes in this subtree, this one included.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            pending.extend(node.children());
        }
        count
    }

    pub(crate) fn write_outline(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let mut pending = vec![(self, depth)];
        while let Some((node, depth)) = pending.pop() {
            let indent = depth * 2;
            match node {
                Self::Element {
                    name,
                    attributes,
                    children,
                } => {
                    write!(f, "{:indent$}<{name}", "")?;
                    write_attributes(f, attributes)?;
                    writeln!(f, ">")?;
                    pending.extend(children.iter().rev().map(|child| (child, depth + 1)));
                }
                Self::Text(text) => writeln!(f, "{:indent$}{text:?}", "")?,
                Self::Markup(markup) => writeln!(f, "{:indent$}{markup}", "")?,
                Self::Component {
                    component_type,
                    attributes,
                } => {
                    write!(f, "{:indent$}[{}", "", component_type.name())?;
                    write_attributes(f, attributes)?;
                    writeln!(f, "]")?;
                }
            }
        }
        Ok(())
    }

    /// This node without its children.
    fn shell(&self) -> Self {
        match self {
            Self::Element { name, attributes, .. } => Self::Element {
                name: name.clone(),
                attributes: attributes.clone(),
                children: Vec::new(),
            },
            Self::Text(text) => Self::Text(text.clone()),
            Self::Markup(markup) => Self::Markup(markup.clone()),
            Self::Component {
                component_type,
                attributes,
            } => Self::Component {
                component_type: component_type.clone(),
                attributes: attributes.clone(),
            },
        }
    }

    /// Whether the two nodes agree on everything but their children.
    fn same_shell(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Element { name, attributes, .. },
                Self::Element {
                    name: other_name,
                    attributes: other_attributes,
                    ..
                },
            ) => name == other_name && attributes == other_attributes,
            (Self::Text(text), Self::Text(other)) | (Self::Markup(text), Self::Markup(other)) => text == other,
            (
                Self::Component {
                    component_type,
                    attributes,
                },
                Self::Component {
                    component_type: other_type,
                    attributes: other_attributes,
                },
            ) => component_type == other_type && attributes == other_attributes,
            _ => false,
        }
    }
}

/// An element being copied: its shell, the children still to copy and the
/// copies made so far.
struct Copying<'a> {
    shell: LiveNode,
    rest: std::slice::Iter<'a, LiveNode>,
    done: Vec<LiveNode>,
}

impl Copying<'_> {
    fn finish(self) -> LiveNode {
        let mut node = self.shell;
        if let LiveNode::Element { children, .. } = &mut node {
            *children = self.done;
        }
        node
    }
}

fn clone_children(nodes: &[LiveNode]) -> Vec<LiveNode> {
    let mut out = Vec::with_capacity(nodes.len());
    let mut top_level = nodes.iter();
    let mut stack: Vec<Copying<'_>> = Vec::new();
    loop {
        let next = match stack.last_mut() {
            Some(copying) => copying.rest.next(),
            None => top_level.next(),
        };
        let node = match next {
            Some(node) => match node {
                LiveNode::Element { children, .. } if !children.is_empty() => {
                    stack.push(Copying {
                        shell: node.shell(),
                        rest: children.iter(),
                        done: Vec::with_capacity(children.len()),
                    });
                    continue;
                }
                _ => node.shell(),
            },
            None => match stack.pop() {
                Some(copying) => copying.finish(),
                None => return out,
            },
        };
        match stack.last_mut() {
            Some(copying) => copying.done.push(node),
            None => out.push(node),
        }
    }
}

impl Clone for LiveNode {
    fn clone(&self) -> Self {
        let mut node = self.shell();
        if let (Self::Element { children, .. }, Self::Element { children: copies, .. }) = (self, &mut node) {
            *copies = clone_children(children);
        }
        node
    }
}

impl PartialEq for LiveNode {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some((left, right)) = pending.pop() {
            if !left.same_shell(right) || left.children().len() != right.children().len() {
                return false;
            }
            pending.extend(left.children().iter().zip(right.children()));
        }
        true
    }
}

impl Drop for LiveNode {
    fn drop(&mut self) {
        let Self::Element { children, .. } = self else {
            return;
        };
        if children.iter().all(|child| child.children().is_empty()) {
            return;
        }
        let mut pending = std::mem::take(children);
        while let Some(mut node) = pending.pop() {
            if let Self::Element { children, .. } = &mut node {
                pending.append(children);
            }
        }
    }
}

fn write_attributes(f: &mut fmt::Formatter<'_>, attributes: &Attributes) -> fmt::Result {
    for (name, attribute) in attributes {
        match &attribute.value {
            AttributeValue::Text(value) => write!(f, " {name}={value:?}")?,
            AttributeValue::Bool(true) => write!(f, " {name}")?,
            AttributeValue::Bool(false) => {}
            AttributeValue::Callback(_) => write!(f, " {name}=<callback>")?,
        }
    }
    Ok(())
}
