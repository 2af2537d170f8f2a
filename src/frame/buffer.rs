//! FrameBuffer: append-only builder for one render pass.
//!
//! Containers are opened and closed in well-nested order. Each open pushes
//! the container's index on a stack; each close pops it and back-fills the
//! container's subtree length. Nothing is recursive, so arbitrarily deep
//! trees can be built without growing the call stack.

use super::frame::{AttributeValue, Callback, ComponentType, EventHandlerId, Frame, FrameData, FrameKind, Key};
use super::frames::Frames;
use crate::error::BuildError;
use std::sync::Arc;

/// Append-only frame builder.
///
/// # Example
///
/// ```
/// use framewheel::FrameBuffer;
///
/// let mut buffer = FrameBuffer::new();
/// buffer.open_element(0, "p")?;
/// buffer.add_attribute(1, "class", "lead")?;
/// buffer.add_text(2, "hello")?;
/// buffer.close_element()?;
/// let frames = buffer.finish()?;
/// assert_eq!(frames.len(), 3);
/// # Ok::<(), framewheel::BuildError>(())
/// ```
#[derive(Debug, Default)]
pub struct FrameBuffer {
    /// Frames appended so far.
    frames: Vec<Frame>,
    /// Indices of containers not yet closed, innermost last.
    open: Vec<usize>,
}

impl FrameBuffer {
    /// Create an empty buffer.
    pub const fn new() -> Self {
        Self {
            frames: Vec::new(),
            open: Vec::new(),
        }
    }

    /// Create an empty buffer with room for `capacity` frames.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            frames: Vec::with_capacity(capacity),
            open: Vec::new(),
        }
    }

    /// Create an empty buffer reusing storage from a retired one.
    pub fn recycled(mut storage: Vec<Frame>) -> Self {
        storage.clear();
        Self {
            frames: storage,
            open: Vec::new(),
        }
    }

    /// Number of frames appended so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether nothing has been appended.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames appended so far. Open containers still report length 0.
    #[inline]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Number of containers currently open.
    #[inline]
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Open an element.
    pub fn open_element(&mut self, seq: u32, name: impl Into<Arc<str>>) -> Result<(), BuildError> {
        self.ensure_content_allowed(FrameKind::Element)?;
        self.push_open(Frame::new(
            seq,
            FrameData::Element {
                subtree_len: 0,
                name: name.into(),
                key: None,
            },
        ));
        Ok(())
    }

    /// Close the innermost open element.
    pub fn close_element(&mut self) -> Result<(), BuildError> {
        self.close(FrameKind::Element)
    }

    /// Open a child component placeholder.
    pub fn open_component(&mut self, seq: u32, component_type: ComponentType) -> Result<(), BuildError> {
        self.ensure_content_allowed(FrameKind::Component)?;
        self.push_open(Frame::new(
            seq,
            FrameData::Component {
                subtree_len: 0,
                component_type,
                key: None,
                component_id: None,
                state: None,
            },
        ));
        Ok(())
    }

    /// Close the innermost open component.
    pub fn close_component(&mut self) -> Result<(), BuildError> {
        self.close(FrameKind::Component)
    }

    /// Open a region.
    pub fn open_region(&mut self, seq: u32) -> Result<(), BuildError> {
        self.ensure_content_allowed(FrameKind::Region)?;
        self.push_open(Frame::new(seq, FrameData::Region { subtree_len: 0 }));
        Ok(())
    }

    /// Close the innermost open region.
    pub fn close_region(&mut self) -> Result<(), BuildError> {
        self.close(FrameKind::Region)
    }

    /// Append a text node.
    pub fn add_text(&mut self, seq: u32, text: impl Into<Arc<str>>) -> Result<(), BuildError> {
        self.ensure_content_allowed(FrameKind::Text)?;
        self.frames
            .push(Frame::new(seq, FrameData::Text { text: text.into() }));
        Ok(())
    }

    /// Append literal markup.
    pub fn add_markup(&mut self, seq: u32, markup: impl Into<Arc<str>>) -> Result<(), BuildError> {
        self.ensure_content_allowed(FrameKind::Markup)?;
        self.frames.push(Frame::new(
            seq,
            FrameData::Markup {
                markup: markup.into(),
            },
        ));
        Ok(())
    }

    /// Append an attribute to the innermost open element or component.
    pub fn add_attribute(
        &mut self,
        seq: u32,
        name: impl Into<Arc<str>>,
        value: impl Into<AttributeValue>,
    ) -> Result<(), BuildError> {
        self.push_attribute(seq, name.into(), value.into(), None)
    }

    /// Append an event-handler attribute.
    pub fn add_attribute_with_handler(
        &mut self,
        seq: u32,
        name: impl Into<Arc<str>>,
        value: impl Into<AttributeValue>,
        handler: EventHandlerId,
    ) -> Result<(), BuildError> {
        self.push_attribute(seq, name.into(), value.into(), Some(handler))
    }

    /// Key the innermost open element or component.
    pub fn set_key(&mut self, key: impl Into<Key>) -> Result<(), BuildError> {
        let &index = self.open.last().ok_or(BuildError::NoOpenContainer)?;
        if self.frames[index].kind() == FrameKind::Region {
            return Err(BuildError::KeyOnRegion);
        }
        let key = key.into();
        self.rewrite(index, |frame| frame.with_key(key));
        Ok(())
    }

    /// Append an element reference capture inside the innermost open element.
    pub fn add_element_reference_capture(
        &mut self,
        seq: u32,
        capture_id: Option<&str>,
        callback: Callback,
    ) -> Result<(), BuildError> {
        if self.innermost_kind() != Some(FrameKind::Element) {
            return Err(BuildError::CaptureOutsideElement);
        }
        self.frames.push(Frame::new(
            seq,
            FrameData::ElementReferenceCapture {
                capture_id: capture_id.map(Arc::from),
                callback,
            },
        ));
        Ok(())
    }

    /// Append a component reference capture inside the innermost open component.
    pub fn add_component_reference_capture(&mut self, seq: u32, callback: Callback) -> Result<(), BuildError> {
        let parent = match self.open.last() {
            Some(&index) if self.frames[index].kind() == FrameKind::Component => index,
            _ => return Err(BuildError::CaptureOutsideComponent),
        };
        self.frames.push(Frame::new(
            seq,
            FrameData::ComponentReferenceCapture {
                parent: index_u32(parent),
                callback,
            },
        ));
        Ok(())
    }

    /// Finalize the buffer.
    pub fn finish(self) -> Result<Frames, BuildError> {
        if let Some(&index) = self.open.last() {
            return Err(BuildError::UnclosedContainers {
                count: self.open.len(),
                innermost: self.frames[index].kind(),
            });
        }
        tracing::debug!(frames = self.frames.len(), "finalized frame buffer");
        Ok(Frames::from_vec(self.frames))
    }

    /// Drop everything appended so far, keeping the allocation.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.open.clear();
    }

    fn innermost_kind(&self) -> Option<FrameKind> {
        self.open.last().map(|&index| self.frames[index].kind())
    }

    fn push_open(&mut self, frame: Frame) {
        self.open.push(self.frames.len());
        self.frames.push(frame);
    }

    fn close(&mut self, kind: FrameKind) -> Result<(), BuildError> {
        let &index = self
            .open
            .last()
            .ok_or(BuildError::UnmatchedClose { kind })?;
        let found = self.frames[index].kind();
        if found != kind {
            return Err(BuildError::MismatchedClose {
                expected: kind,
                found,
            });
        }
        self.open.pop();
        let len = index_u32(self.frames.len() - index - 1);
        self.rewrite(index, |frame| frame.with_subtree_len(len));
        Ok(())
    }

    /// Replace the open container at `index` with a rewritten copy.
    fn rewrite(&mut self, index: usize, f: impl FnOnce(Frame) -> Frame) {
        let placeholder = Frame::new(0, FrameData::Region { subtree_len: 0 });
        let frame = std::mem::replace(&mut self.frames[index], placeholder);
        self.frames[index] = f(frame);
    }

    fn ensure_content_allowed(&self, kind: FrameKind) -> Result<(), BuildError> {
        if self.innermost_kind() == Some(FrameKind::Component) {
            return Err(BuildError::ContentInsideComponent { kind });
        }
        Ok(())
    }

    fn push_attribute(
        &mut self,
        seq: u32,
        name: Arc<str>,
        value: AttributeValue,
        handler: Option<EventHandlerId>,
    ) -> Result<(), BuildError> {
        let in_run = match (self.open.last(), self.frames.last()) {
            (Some(&owner), Some(last)) => {
                let owner_kind = self.frames[owner].kind();
                matches!(owner_kind, FrameKind::Element | FrameKind::Component)
                    && (self.frames.len() - 1 == owner || last.kind() == FrameKind::Attribute)
            }
            _ => false,
        };
        if !in_run {
            return Err(BuildError::AttributeOutOfPlace {
                name: name.to_string(),
            });
        }
        self.frames.push(Frame::new(
            seq,
            FrameData::Attribute {
                name,
                value,
                handler,
            },
        ));
        Ok(())
    }
}

/// Frame indices are stored as `u32`; buffers never approach that size.
#[inline]
#[allow(clippy::cast_possible_truncation)]
const fn index_u32(index: usize) -> u32 {
    index as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn text_of(frame: &Frame) -> Option<&str> {
        match frame.data() {
            FrameData::Text { text } => Some(text),
            _ => None,
        }
    }

    #[test]
    fn test_close_backfills_subtree_len() {
        let mut buffer = FrameBuffer::new();
        buffer.open_element(0, "ul").unwrap();
        buffer.open_element(1, "li").unwrap();
        buffer.add_text(2, "a").unwrap();
        buffer.close_element().unwrap();
        buffer.open_element(1, "li").unwrap();
        buffer.close_element().unwrap();
        buffer.close_element().unwrap();

        let frames = buffer.finish().unwrap();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0].subtree_len(), 3);
        assert_eq!(frames[1].subtree_len(), 1);
        assert_eq!(frames[3].subtree_len(), 0);
    }

    #[test]
    fn test_open_frames_report_zero_until_closed() {
        let mut buffer = FrameBuffer::new();
        buffer.open_region(0).unwrap();
        buffer.add_text(1, "x").unwrap();
        assert_eq!(buffer.frames()[0].subtree_len(), 0);
        assert_eq!(buffer.depth(), 1);
        buffer.close_region().unwrap();
        assert_eq!(buffer.frames()[0].subtree_len(), 1);
        assert_eq!(buffer.depth(), 0);
    }

    #[test]
    fn test_round_trip_payloads() {
        let handler = Callback::new(|_| {});
        let mut buffer = FrameBuffer::new();
        buffer.open_element(0, "button").unwrap();
        buffer.set_key(42).unwrap();
        buffer
            .add_attribute_with_handler(1, "onclick", handler.clone(), EventHandlerId(9))
            .unwrap();
        buffer.add_attribute(2, "disabled", false).unwrap();
        buffer.add_text(3, "go").unwrap();
        buffer.close_element().unwrap();
        buffer.add_markup(4, "<hr/>").unwrap();
        let frames = buffer.finish().unwrap();

        assert_eq!(
            frames[0].data(),
            &FrameData::Element {
                subtree_len: 3,
                name: Arc::from("button"),
                key: Some(Key(42)),
            }
        );
        assert_eq!(
            frames[1].data(),
            &FrameData::Attribute {
                name: Arc::from("onclick"),
                value: AttributeValue::Callback(handler),
                handler: Some(EventHandlerId(9)),
            }
        );
        assert_eq!(
            frames[2].data(),
            &FrameData::Attribute {
                name: Arc::from("disabled"),
                value: AttributeValue::Bool(false),
                handler: None,
            }
        );
        assert_eq!(text_of(&frames[3]), Some("go"));
        assert_eq!(frames[3].seq(), 3);
        assert_eq!(
            frames[4].data(),
            &FrameData::Markup {
                markup: Arc::from("<hr/>")
            }
        );
    }

    #[test]
    fn test_component_frames() {
        let mut buffer = FrameBuffer::new();
        buffer.open_component(0, ComponentType::named("Counter")).unwrap();
        buffer.set_key(1).unwrap();
        buffer.add_attribute(1, "start", "3").unwrap();
        buffer
            .add_component_reference_capture(2, Callback::new(|_| {}))
            .unwrap();
        buffer.close_component().unwrap();
        let frames = buffer.finish().unwrap();

        assert_eq!(frames[0].subtree_len(), 2);
        assert_eq!(frames[0].key(), Some(Key(1)));
        match frames[2].data() {
            FrameData::ComponentReferenceCapture { parent, .. } => assert_eq!(*parent, 0),
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn test_element_reference_capture() {
        let mut buffer = FrameBuffer::new();
        buffer.open_element(0, "input").unwrap();
        buffer.add_attribute(1, "type", "text").unwrap();
        buffer
            .add_element_reference_capture(2, Some("field"), Callback::new(|_| {}))
            .unwrap();
        buffer.close_element().unwrap();
        let frames = buffer.finish().unwrap();
        match frames[2].data() {
            FrameData::ElementReferenceCapture { capture_id, .. } => {
                assert_eq!(capture_id.as_deref(), Some("field"));
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test_case(FrameKind::Element ; "element")]
    #[test_case(FrameKind::Component ; "component")]
    #[test_case(FrameKind::Region ; "region")]
    fn test_close_without_open(kind: FrameKind) {
        let mut buffer = FrameBuffer::new();
        let result = match kind {
            FrameKind::Element => buffer.close_element(),
            FrameKind::Component => buffer.close_component(),
            _ => buffer.close_region(),
        };
        assert_eq!(result, Err(BuildError::UnmatchedClose { kind }));
    }

    #[test]
    fn test_mismatched_close() {
        let mut buffer = FrameBuffer::new();
        buffer.open_region(0).unwrap();
        assert_eq!(
            buffer.close_element(),
            Err(BuildError::MismatchedClose {
                expected: FrameKind::Element,
                found: FrameKind::Region,
            })
        );
    }

    #[test]
    fn test_finish_with_open_containers() {
        let mut buffer = FrameBuffer::new();
        buffer.open_element(0, "div").unwrap();
        buffer.open_region(1).unwrap();
        assert_eq!(
            buffer.finish().unwrap_err(),
            BuildError::UnclosedContainers {
                count: 2,
                innermost: FrameKind::Region,
            }
        );
    }

    #[test]
    fn test_attribute_after_child_is_rejected() {
        let mut buffer = FrameBuffer::new();
        buffer.open_element(0, "div").unwrap();
        buffer.add_text(1, "child").unwrap();
        assert_eq!(
            buffer.add_attribute(2, "class", "late"),
            Err(BuildError::AttributeOutOfPlace {
                name: "class".to_string()
            })
        );
    }

    #[test]
    fn test_attribute_outside_container_is_rejected() {
        let mut buffer = FrameBuffer::new();
        assert!(buffer.add_attribute(0, "id", "x").is_err());

        buffer.open_region(0).unwrap();
        assert!(buffer.add_attribute(1, "id", "x").is_err());
    }

    #[test]
    fn test_attribute_after_closed_sibling_is_rejected() {
        let mut buffer = FrameBuffer::new();
        buffer.open_element(0, "div").unwrap();
        buffer.open_element(1, "span").unwrap();
        buffer.close_element().unwrap();
        assert!(buffer.add_attribute(2, "id", "x").is_err());
    }

    #[test_case(FrameKind::Element ; "element")]
    #[test_case(FrameKind::Text ; "text")]
    #[test_case(FrameKind::Markup ; "markup")]
    #[test_case(FrameKind::Region ; "region")]
    fn test_content_inside_component_is_rejected(kind: FrameKind) {
        let mut buffer = FrameBuffer::new();
        buffer.open_component(0, ComponentType::named("Card")).unwrap();
        let result = match kind {
            FrameKind::Element => buffer.open_element(1, "div"),
            FrameKind::Text => buffer.add_text(1, "x"),
            FrameKind::Markup => buffer.add_markup(1, "<i>"),
            _ => buffer.open_region(1),
        };
        assert_eq!(result, Err(BuildError::ContentInsideComponent { kind }));
    }

    #[test]
    fn test_key_errors() {
        let mut buffer = FrameBuffer::new();
        assert_eq!(buffer.set_key(1), Err(BuildError::NoOpenContainer));
        buffer.open_region(0).unwrap();
        assert_eq!(buffer.set_key(1), Err(BuildError::KeyOnRegion));
    }

    #[test]
    fn test_capture_placement() {
        let mut buffer = FrameBuffer::new();
        assert_eq!(
            buffer.add_element_reference_capture(0, None, Callback::new(|_| {})),
            Err(BuildError::CaptureOutsideElement)
        );
        buffer.open_element(0, "div").unwrap();
        assert_eq!(
            buffer.add_component_reference_capture(1, Callback::new(|_| {})),
            Err(BuildError::CaptureOutsideComponent)
        );
    }

    #[test]
    fn test_recycled_storage_is_cleared() {
        let mut storage = Vec::with_capacity(64);
        storage.push(Frame::new(0, FrameData::Region { subtree_len: 0 }));
        let buffer = FrameBuffer::recycled(storage);
        assert!(buffer.is_empty());
        assert!(buffer.frames.capacity() >= 64);
    }
}
