//! Render root: owns the previous tree and runs build → diff → retain.
//!
//! ```text
//!          begin()                 commit()
//!   spare ─────────► FrameBuffer ───────────► Frames ──┐
//!     ▲                                                 │ diff(previous, next)
//!     │ into_storage()                                  ▼
//!     └──────────────────────── previous ◄──────── EditScript + bindings
//! ```
//!
//! The old buffer's storage is only recycled when nothing else still holds
//! it; a caller that kept a clone of [`RenderRoot::previous`] just costs a
//! fresh allocation on the next pass.

use crate::diff::{DiffConfig, DiffEngine, EditScript};
use crate::error::{BindError, BuildError, RenderError};
use crate::frame::{ComponentId, Frame, FrameBuffer, Frames, StateRef};
use std::mem;

/// Configuration for a [`RenderRoot`].
#[derive(Debug, Clone)]
pub struct RootConfig {
    /// Diff engine configuration.
    pub diff: DiffConfig,
    /// Frame capacity of a freshly allocated buffer.
    pub initial_capacity: usize,
    /// Whether to reuse the previous buffer's storage for the next build.
    pub recycle_buffers: bool,
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            diff: DiffConfig::default(),
            initial_capacity: 256,
            recycle_buffers: true,
        }
    }
}

/// The top of a frame tree: retains the last rendered buffer between passes.
#[derive(Debug)]
pub struct RenderRoot {
    engine: DiffEngine,
    previous: Frames,
    spare: Option<Vec<Frame>>,
    initial_capacity: usize,
    recycle_buffers: bool,
    renders: u64,
}

impl Default for RenderRoot {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderRoot {
    /// Create a root with default configuration.
    pub fn new() -> Self {
        Self::with_config(RootConfig::default())
    }

    /// Create a root with custom configuration.
    pub fn with_config(config: RootConfig) -> Self {
        Self {
            engine: DiffEngine::new(config.diff),
            previous: Frames::empty(),
            spare: None,
            initial_capacity: config.initial_capacity,
            recycle_buffers: config.recycle_buffers,
            renders: 0,
        }
    }

    /// A buffer for the next pass, reusing recycled storage when there is some.
    pub fn begin(&mut self) -> FrameBuffer {
        match self.spare.take() {
            Some(storage) => FrameBuffer::recycled(storage),
            None => FrameBuffer::with_capacity(self.initial_capacity),
        }
    }

    /// Run one full pass: build with `build`, then [`commit`](Self::commit).
    ///
    /// # Errors
    ///
    /// A build error aborts the pass and leaves the previous tree in place.
    pub fn render<F>(&mut self, build: F) -> Result<EditScript, RenderError>
    where
        F: FnOnce(&mut FrameBuffer) -> Result<(), BuildError>,
    {
        let mut buffer = self.begin();
        if let Err(err) = build(&mut buffer) {
            tracing::warn!(%err, pass = self.renders + 1, "render pass aborted");
            return Err(err.into());
        }
        self.commit(buffer)
    }

    /// Finalize `buffer`, diff it against the previous tree and retain it.
    ///
    /// Components that kept their identity are re-bound in the new tree
    /// before it is retained.
    ///
    /// # Errors
    ///
    /// Fails if the buffer has open containers or the diff exceeds its
    /// depth bound; the previous tree stays in place either way.
    pub fn commit(&mut self, buffer: FrameBuffer) -> Result<EditScript, RenderError> {
        let mut next = buffer.finish()?;
        let script = self.engine.diff(&self.previous, &next)?;

        for binding in &script.retained_components {
            next.bind_component(binding.index, binding.id, binding.state)?;
        }

        let old = mem::replace(&mut self.previous, next);
        if self.recycle_buffers {
            self.spare = old.into_storage();
        }
        self.renders += 1;

        tracing::debug!(
            pass = self.renders,
            edits = script.len(),
            disposed = script.disposed_components.len(),
            retained = script.retained_components.len(),
            recycled = self.spare.is_some(),
            "render pass committed"
        );
        Ok(script)
    }

    /// The tree committed by the last pass.
    pub const fn previous(&self) -> &Frames {
        &self.previous
    }

    /// Bind a freshly instantiated component to its frame in the current tree.
    ///
    /// # Errors
    ///
    /// Fails if `index` is out of range or not a component frame.
    pub fn bind_component(&mut self, index: usize, id: ComponentId, state: Option<StateRef>) -> Result<(), BindError> {
        self.previous.bind_component(index, id, state)
    }

    /// Number of committed passes.
    pub const fn renders(&self) -> u64 {
        self.renders
    }

    /// Diff engine configuration.
    pub const fn diff_config(&self) -> &DiffConfig {
        self.engine.config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::Edit;
    use crate::frame::ComponentType;

    fn counter(b: &mut FrameBuffer, count: u32) -> Result<(), BuildError> {
        b.open_element(0, "div")?;
        b.add_text(1, format!("count: {count}"))?;
        b.open_component(2, ComponentType::named("Button"))?;
        b.add_attribute(3, "label", "+1")?;
        b.close_component()?;
        b.close_element()
    }

    #[test]
    fn test_first_pass_inserts() {
        let mut root = RenderRoot::new();
        let script = root.render(|b| counter(b, 0)).unwrap();
        assert_eq!(script.len(), 1);
        assert!(matches!(&script.edits[0], Edit::InsertSubtree { .. }));
        assert_eq!(root.previous().len(), 4);
        assert_eq!(root.renders(), 1);
    }

    #[test]
    fn test_second_pass_updates_text_only() {
        let mut root = RenderRoot::new();
        root.render(|b| counter(b, 0)).unwrap();
        let script = root.render(|b| counter(b, 1)).unwrap();
        assert_eq!(script.len(), 1);
        assert!(matches!(&script.edits[0], Edit::SetText { text, .. } if &**text == "count: 1"));
    }

    #[test]
    fn test_bindings_carry_forward() {
        let mut root = RenderRoot::new();
        root.render(|b| counter(b, 0)).unwrap();
        root.bind_component(2, ComponentId(11), Some(StateRef(5))).unwrap();

        let script = root.render(|b| counter(b, 1)).unwrap();
        assert_eq!(script.retained_components.len(), 1);
        assert_eq!(root.previous().component_id(2), Some(ComponentId(11)));
    }

    fn rows(b: &mut FrameBuffer, keys: &[i64]) -> Result<(), BuildError> {
        b.open_element(0, "ul")?;
        for &key in keys {
            b.open_component(1, ComponentType::named("Row"))?;
            b.set_key(key)?;
            b.add_attribute(2, "label", key.to_string())?;
            b.close_component()?;
        }
        b.close_element()
    }

    #[test]
    fn test_keyed_component_binding_follows_move() {
        let mut root = RenderRoot::new();
        root.render(|b| rows(b, &[1, 2, 3])).unwrap();
        // Frames: ul, then a component and its attribute per row.
        root.bind_component(5, ComponentId(30), Some(StateRef(3))).unwrap();
        root.bind_component(1, ComponentId(10), None).unwrap();

        let script = root.render(|b| rows(b, &[3, 1, 2])).unwrap();
        assert!(script.iter().any(|edit| matches!(edit, Edit::MoveSubtree { .. })));
        assert!(script.disposed_components.is_empty());

        let previous = root.previous();
        assert_eq!(previous.component_id(1), Some(ComponentId(30)));
        assert_eq!(previous.component_id(3), Some(ComponentId(10)));
        assert_eq!(previous.component_id(5), None);
        assert!(matches!(
            previous[1].data(),
            crate::frame::FrameData::Component {
                state: Some(StateRef(3)),
                ..
            }
        ));
    }

    #[test]
    fn test_bind_errors_leave_tree_intact() {
        let mut root = RenderRoot::new();
        root.render(|b| counter(b, 0)).unwrap();
        let before = root.previous().clone();
        assert!(root.bind_component(0, ComponentId(1), None).is_err());
        assert!(root.bind_component(50, ComponentId(1), None).is_err());
        assert_eq!(root.previous(), &before);
    }

    #[test]
    fn test_build_error_keeps_previous() {
        let mut root = RenderRoot::new();
        root.render(|b| counter(b, 0)).unwrap();
        let err = root.render(|b| b.close_element()).unwrap_err();
        assert!(matches!(err, RenderError::Build(BuildError::UnmatchedClose { .. })));
        assert_eq!(root.renders(), 1);
        assert_eq!(root.previous().len(), 4);
    }

    #[test]
    fn test_unclosed_buffer_is_rejected() {
        let mut root = RenderRoot::new();
        let mut buffer = root.begin();
        buffer.open_element(0, "div").unwrap();
        assert!(matches!(
            root.commit(buffer),
            Err(RenderError::Build(BuildError::UnclosedContainers { count: 1, .. }))
        ));
        assert!(root.previous().is_empty());
    }

    #[test]
    fn test_storage_is_recycled_when_unshared() {
        let mut root = RenderRoot::new();
        root.render(|b| counter(b, 0)).unwrap();
        root.render(|b| counter(b, 1)).unwrap();
        assert!(root.spare.is_some());

        let held = root.previous().clone();
        root.render(|b| counter(b, 2)).unwrap();
        assert!(root.spare.is_none());
        drop(held);
    }

    #[test]
    fn test_recycling_can_be_disabled() {
        let mut root = RenderRoot::with_config(RootConfig {
            recycle_buffers: false,
            ..RootConfig::default()
        });
        root.render(|b| counter(b, 0)).unwrap();
        root.render(|b| counter(b, 1)).unwrap();
        assert!(root.spare.is_none());
    }
}
