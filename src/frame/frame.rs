//! Frame: one node of the flattened pre-order tree.
//!
//! # Layout
//!
//! A frame is a sequence number plus exactly one payload. Container kinds
//! (element, component, region) carry the number of descendant frames that
//! follow them, so a whole subtree can be skipped with one addition:
//!
//! ```text
//! index  seq  frame
//! ─────  ───  ─────────────────────────────────
//!   0     0   Element "ul"        subtree_len 4
//!   1     1   Attribute class="todo"
//!   2     2   Element "li" key=7  subtree_len 1
//!   3     3   Text "milk"
//!   4     4   Markup "<hr>"
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Explicit identity hint for a sibling frame.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Key(pub i64);

impl From<i64> for Key {
    #[inline]
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<i32> for Key {
    #[inline]
    fn from(value: i32) -> Self {
        Self(i64::from(value))
    }
}

impl From<u32> for Key {
    #[inline]
    fn from(value: u32) -> Self {
        Self(i64::from(value))
    }
}

/// Identifier the event dispatcher uses to route a native event to a handler.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct EventHandlerId(pub u64);

/// Identifier of a live child component, assigned by the component registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ComponentId(pub u32);

/// Non-owning handle to component state held by the component registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct StateRef(pub u64);

/// Type identity of a child component.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ComponentType(Arc<str>);

impl ComponentType {
    /// Component type identified by an explicit name.
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// Component type identified by a Rust type.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(Arc::from(std::any::type_name::<T>()))
    }

    /// The type name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentType({})", self.0)
    }
}

/// A shared callback carried by attribute and reference-capture frames.
///
/// Equality is identity: two callbacks compare equal only when they share
/// the same allocation, which is what the diff needs to decide whether a
/// handler was replaced.
#[derive(Clone)]
pub struct Callback(Arc<dyn Fn(&dyn Any) + Send + Sync>);

impl Callback {
    /// Wrap a closure.
    pub fn new(f: impl Fn(&dyn Any) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Invoke the callback with an argument chosen by the caller.
    #[inline]
    pub fn invoke(&self, arg: &dyn Any) {
        (self.0)(arg);
    }

    /// Whether both callbacks are the same allocation.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Arc::as_ptr(&self.0).cast::<()>())
    }
}

/// Value of an attribute frame.
#[derive(Clone, PartialEq, Debug)]
pub enum AttributeValue {
    /// A string value.
    Text(Arc<str>),
    /// A boolean value (presence-style attributes).
    Bool(bool),
    /// A callback, typically an event handler.
    Callback(Callback),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(Arc::from(value))
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(Arc::from(value))
    }
}

impl From<Arc<str>> for AttributeValue {
    fn from(value: Arc<str>) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Callback> for AttributeValue {
    fn from(value: Callback) -> Self {
        Self::Callback(value)
    }
}

/// Discriminant of a frame.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum FrameKind {
    /// A UI element with a name, attributes and children.
    Element,
    /// A text node.
    Text,
    /// Literal markup, treated as an opaque blob.
    Markup,
    /// An attribute of the preceding element or component.
    Attribute,
    /// A child component placeholder.
    Component,
    /// A grouping of frames with no UI node of its own.
    Region,
    /// Hands a live element reference back to render logic.
    ElementReferenceCapture,
    /// Hands a live component reference back to render logic.
    ComponentReferenceCapture,
}

impl FrameKind {
    /// Whether frames of this kind own a subtree.
    #[inline]
    pub const fn is_container(self) -> bool {
        matches!(self, Self::Element | Self::Component | Self::Region)
    }

    /// Whether frames of this kind become a node of the live tree.
    #[inline]
    pub const fn is_node(self) -> bool {
        matches!(
            self,
            Self::Element | Self::Text | Self::Markup | Self::Component
        )
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Element => "element",
            Self::Text => "text",
            Self::Markup => "markup",
            Self::Attribute => "attribute",
            Self::Component => "component",
            Self::Region => "region",
            Self::ElementReferenceCapture => "element reference capture",
            Self::ComponentReferenceCapture => "component reference capture",
        };
        f.write_str(name)
    }
}

/// Payload of a frame, one variant per [`FrameKind`].
#[derive(Clone, PartialEq, Debug)]
pub enum FrameData {
    /// UI element.
    Element {
        /// Number of descendant frames.
        subtree_len: u32,
        /// Element name.
        name: Arc<str>,
        /// Optional sibling key.
        key: Option<Key>,
    },
    /// Text node.
    Text {
        /// Text content.
        text: Arc<str>,
    },
    /// Literal markup.
    Markup {
        /// Markup content.
        markup: Arc<str>,
    },
    /// Attribute of the owning element or component.
    Attribute {
        /// Attribute name.
        name: Arc<str>,
        /// Attribute value.
        value: AttributeValue,
        /// Event handler id, if the attribute is an event handler.
        handler: Option<EventHandlerId>,
    },
    /// Child component placeholder.
    Component {
        /// Number of descendant frames (attributes and captures only).
        subtree_len: u32,
        /// Component type identity.
        component_type: ComponentType,
        /// Optional sibling key.
        key: Option<Key>,
        /// Registry id, once the registry has bound the component.
        component_id: Option<ComponentId>,
        /// Registry state handle, once bound.
        state: Option<StateRef>,
    },
    /// Grouping with no node of its own.
    Region {
        /// Number of descendant frames.
        subtree_len: u32,
    },
    /// Element reference capture.
    ElementReferenceCapture {
        /// Optional capture id handed to the renderer.
        capture_id: Option<Arc<str>>,
        /// Receives the element reference.
        callback: Callback,
    },
    /// Component reference capture.
    ///
    /// `parent` is an index into the buffer this frame was built in and means
    /// nothing once that buffer has been recycled.
    ComponentReferenceCapture {
        /// Index of the owning component frame.
        parent: u32,
        /// Receives the component reference.
        callback: Callback,
    },
}

/// One node of the flattened tree.
#[derive(Clone, PartialEq, Debug)]
pub struct Frame {
    seq: u32,
    data: FrameData,
}

impl Frame {
    /// Create a frame from a sequence number and payload.
    #[inline]
    pub const fn new(seq: u32, data: FrameData) -> Self {
        Self { seq, data }
    }

    /// Source position that produced this frame.
    #[inline]
    pub const fn seq(&self) -> u32 {
        self.seq
    }

    /// The payload.
    #[inline]
    pub const fn data(&self) -> &FrameData {
        &self.data
    }

    /// The discriminant.
    pub fn kind(&self) -> FrameKind {
        match self.data {
            FrameData::Element { .. } => FrameKind::Element,
            FrameData::Text { .. } => FrameKind::Text,
            FrameData::Markup { .. } => FrameKind::Markup,
            FrameData::Attribute { .. } => FrameKind::Attribute,
            FrameData::Component { .. } => FrameKind::Component,
            FrameData::Region { .. } => FrameKind::Region,
            FrameData::ElementReferenceCapture { .. } => FrameKind::ElementReferenceCapture,
            FrameData::ComponentReferenceCapture { .. } => FrameKind::ComponentReferenceCapture,
        }
    }

    /// Number of descendant frames; zero for leaves.
    #[inline]
    pub fn subtree_len(&self) -> u32 {
        match self.data {
            FrameData::Element { subtree_len, .. }
            | FrameData::Component { subtree_len, .. }
            | FrameData::Region { subtree_len } => subtree_len,
            _ => 0,
        }
    }

    /// Number of frames occupied by this frame and its descendants.
    #[inline]
    pub fn span(&self) -> usize {
        self.subtree_len() as usize + 1
    }

    /// Sibling key of an element or component.
    #[inline]
    pub fn key(&self) -> Option<Key> {
        match self.data {
            FrameData::Element { key, .. } | FrameData::Component { key, .. } => key,
            _ => None,
        }
    }

    /// Copy of this frame with a new subtree length.
    ///
    /// Leaves are returned unchanged.
    #[must_use]
    pub fn with_subtree_len(mut self, len: u32) -> Self {
        match &mut self.data {
            FrameData::Element { subtree_len, .. }
            | FrameData::Component { subtree_len, .. }
            | FrameData::Region { subtree_len } => *subtree_len = len,
            _ => {}
        }
        self
    }

    /// Copy of this frame with a key. Kinds that cannot be keyed are
    /// returned unchanged.
    #[must_use]
    pub fn with_key(mut self, new_key: Key) -> Self {
        if let FrameData::Element { key, .. } | FrameData::Component { key, .. } = &mut self.data {
            *key = Some(new_key);
        }
        self
    }

    /// Copy of a component frame bound to registry state. Other kinds are
    /// returned unchanged.
    #[must_use]
    pub fn with_component_binding(mut self, id: ComponentId, state_ref: Option<StateRef>) -> Self {
        if let FrameData::Component {
            component_id,
            state,
            ..
        } = &mut self.data
        {
            *component_id = Some(id);
            *state = state_ref;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_payload() {
        let frame = Frame::new(
            3,
            FrameData::Text {
                text: Arc::from("hi"),
            },
        );
        assert_eq!(frame.kind(), FrameKind::Text);
        assert_eq!(frame.seq(), 3);
        assert_eq!(frame.span(), 1);
    }

    #[test]
    fn test_with_subtree_len_leaves_leaf_untouched() {
        let text = Frame::new(0, FrameData::Markup { markup: Arc::from("<b>") });
        assert_eq!(text.clone().with_subtree_len(9), text);

        let region = Frame::new(0, FrameData::Region { subtree_len: 0 });
        assert_eq!(region.with_subtree_len(4).subtree_len(), 4);
    }

    #[test]
    fn test_key_only_on_keyable_kinds() {
        let region = Frame::new(0, FrameData::Region { subtree_len: 0 });
        assert_eq!(region.clone().with_key(Key(1)), region);

        let element = Frame::new(
            0,
            FrameData::Element {
                subtree_len: 0,
                name: Arc::from("li"),
                key: None,
            },
        );
        assert_eq!(element.with_key(Key(5)).key(), Some(Key(5)));
    }

    #[test]
    fn test_callback_identity() {
        let a = Callback::new(|_| {});
        let b = Callback::new(|_| {});
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_ne!(AttributeValue::Callback(a), AttributeValue::Callback(b));
    }

    #[test]
    fn test_callback_invoke() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let callback = Callback::new(move |arg| {
            if let Some(n) = arg.downcast_ref::<u32>() {
                counter.fetch_add(*n, Ordering::Relaxed);
            }
        });
        callback.invoke(&5u32);
        callback.invoke(&"ignored");
        assert_eq!(hits.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_component_type_identity() {
        struct Counter;
        assert_eq!(ComponentType::of::<Counter>(), ComponentType::of::<Counter>());
        assert_ne!(ComponentType::named("a"), ComponentType::named("b"));
        assert!(ComponentType::of::<Counter>().name().ends_with("Counter"));
    }

    #[test]
    fn test_frame_kind_classification() {
        assert!(FrameKind::Region.is_container());
        assert!(!FrameKind::Region.is_node());
        assert!(FrameKind::Component.is_node());
        assert!(!FrameKind::Attribute.is_node());
    }
}
