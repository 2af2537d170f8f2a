//! Engine: Main coordinator that ties the render root to the renderer thread.
//!
//! The Engine is the entry point for hosts that want rendering off the
//! calling thread. Render passes run on the caller; the resulting scripts
//! are applied by a [`RendererActor`] that owns the sink.
//!
//! A script only makes sense against the tree the sink already shows. When
//! the renderer reports a rejected batch, the next pass sends a resync that
//! rebuilds the sink from scratch instead of an incremental script.

use super::messages::{RenderCommand, RenderEvent};
use super::RendererActor;
use crate::diff::{DiffEngine, DiffStats, Diagnostics, EditSink};
use crate::error::{BindError, BuildError, RenderError};
use crate::frame::{ComponentId, FrameBuffer, Frames, StateRef};
use crate::root::{RenderRoot, RootConfig};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use std::io;
use std::time::Duration;

/// Configuration for the Engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Render root configuration.
    pub root: RootConfig,
    /// Capacity of the command channel; a full channel blocks the caller.
    pub command_capacity: usize,
    /// Capacity of the event channel; outcomes past it are dropped.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root: RootConfig::default(),
            command_capacity: 16,
            event_capacity: 64,
        }
    }
}

/// What a render pass produced, as seen from the calling thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Number of edits handed to the renderer.
    pub edits: usize,
    /// Components torn down by this pass.
    pub disposed_components: Vec<ComponentId>,
    /// Authoring problems noticed while diffing.
    pub diagnostics: Diagnostics,
    /// Diff counters.
    pub stats: DiffStats,
    /// Whether this pass rebuilt the sink after a rejected batch.
    pub resync: bool,
}

/// The main framewheel engine.
///
/// This couples a [`RenderRoot`] with a renderer thread, providing a
/// simple build-and-forget interface for applications.
pub struct Engine<S: EditSink + Send + 'static> {
    /// Render root (previous tree, diff engine).
    root: RenderRoot,
    /// Render command sender.
    commands: Sender<RenderCommand>,
    /// Batch outcome receiver.
    events: Receiver<RenderEvent>,
    /// Renderer actor handle.
    actor: Option<RendererActor<S>>,
    /// Diffs full rebuilds for resyncs.
    rebuild: DiffEngine,
    /// Renderer failures already answered with a resync.
    resynced_failures: u64,
}

impl<S: EditSink + Send + 'static> Engine<S> {
    /// Create a new engine with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the renderer thread cannot be spawned.
    pub fn new(sink: S) -> io::Result<Self> {
        Self::with_config(sink, EngineConfig::default())
    }

    /// Create a new engine with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the renderer thread cannot be spawned.
    pub fn with_config(sink: S, config: EngineConfig) -> io::Result<Self> {
        let (commands, command_rx) = bounded::<RenderCommand>(config.command_capacity);
        let (event_tx, events) = bounded::<RenderEvent>(config.event_capacity);

        let actor = RendererActor::spawn(sink, command_rx, event_tx)?;

        Ok(Self {
            rebuild: DiffEngine::new(config.root.diff.clone()),
            root: RenderRoot::with_config(config.root),
            commands,
            events,
            actor: Some(actor),
            resynced_failures: 0,
        })
    }

    /// Run a render pass and hand the resulting script to the renderer.
    ///
    /// Empty scripts are not sent. If the renderer has rejected a batch
    /// since the last resync, the pass sends a full rebuild of the new tree
    /// instead, so the sink catches up whatever it missed.
    ///
    /// # Errors
    ///
    /// Build and diff errors abort the pass with the previous tree intact.
    /// [`RenderError::Disconnected`] means the renderer thread is gone.
    pub fn render<F>(&mut self, build: F) -> Result<PassSummary, RenderError>
    where
        F: FnOnce(&mut FrameBuffer) -> Result<(), BuildError>,
    {
        let failures = self.actor.as_ref().map_or(0, RendererActor::failures);
        let mut script = self.root.render(build)?;
        let mut summary = PassSummary {
            edits: script.len(),
            disposed_components: std::mem::take(&mut script.disposed_components),
            diagnostics: script.diagnostics,
            stats: script.stats.clone(),
            resync: false,
        };
        let roots = self.root.previous().live_roots();

        if failures > self.resynced_failures {
            let script = self.rebuild.diff(&Frames::empty(), self.root.previous())?;
            tracing::info!(failures, roots, "renderer out of step, resyncing");
            summary.edits = script.len();
            summary.resync = true;
            self.commands
                .send(RenderCommand::Resync { script, roots })
                .map_err(|_| RenderError::Disconnected)?;
            self.resynced_failures = failures;
        } else if !script.is_empty() {
            self.commands
                .send(RenderCommand::Apply { script, roots })
                .map_err(|_| RenderError::Disconnected)?;
        }
        Ok(summary)
    }

    /// Get a reference to the render root.
    pub const fn root(&self) -> &RenderRoot {
        &self.root
    }

    /// Bind a component instance to its frame in the current tree.
    ///
    /// # Errors
    ///
    /// Fails if `index` is out of range or not a component frame.
    pub fn bind_component(&mut self, index: usize, id: ComponentId, state: Option<StateRef>) -> Result<(), BindError> {
        self.root.bind_component(index, id, state)
    }

    /// Get the event receiver for event-driven loops.
    pub const fn event_receiver(&self) -> &Receiver<RenderEvent> {
        &self.events
    }

    /// Poll for the next batch outcome (non-blocking).
    pub fn poll_event(&self) -> Option<RenderEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Wait for the next batch outcome (blocking with timeout).
    pub fn wait_event(&self, timeout: Duration) -> Option<RenderEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    /// Drain all pending batch outcomes.
    pub fn drain_events(&self) -> Vec<RenderEvent> {
        self.events.try_iter().collect()
    }

    /// Stop the renderer after it has applied everything sent so far and
    /// take the sink back.
    ///
    /// Returns `None` if the renderer thread panicked.
    pub fn shutdown(mut self) -> Option<S> {
        let _ = self.commands.send(RenderCommand::Shutdown);
        self.actor.take().and_then(RendererActor::join)
    }
}

impl<S: EditSink + Send + 'static> Drop for Engine<S> {
    fn drop(&mut self) {
        if let Some(actor) = self.actor.take() {
            let _ = self.commands.send(RenderCommand::Shutdown);
            actor.join();
        }
    }
}
