//! Renderer Actor: Dedicated thread that applies edit scripts.
//!
//! This actor owns the [`EditSink`]. It receives whole scripts from the
//! render root and applies each one as a single batch, so the sink never
//! shows a half-applied pass.
//!
//! Scripts are computed against the tree of the previous batch, so once a
//! batch fails the sink no longer matches what later scripts expect. The
//! actor then skips every `Apply` until a `Resync` rebuilds the sink from
//! scratch. The failure count is shared so the sender knows when to resync.

use super::messages::{RenderCommand, RenderEvent};
use crate::diff::{Edit, EditScript, EditSink, NodePath};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long the loop waits for a command before checking the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Renderer actor that applies edit scripts on its own thread.
pub struct RendererActor<S> {
    /// Handle to the render thread. Yields the sink back on exit.
    handle: Option<JoinHandle<S>>,
    /// Flag to signal shutdown.
    shutdown: Arc<AtomicBool>,
    /// Number of batches the sink has rejected.
    failures: Arc<AtomicU64>,
}

/// What the render thread knows about the sink.
struct SinkState {
    /// Batches received so far.
    batch: u64,
    /// Top-level nodes the sink currently shows.
    roots: usize,
    /// Whether a failed batch left the sink behind the sender.
    out_of_step: bool,
}

impl<S: EditSink + Send + 'static> RendererActor<S> {
    /// Spawn the renderer actor thread.
    ///
    /// # Arguments
    ///
    /// * `sink` - The renderer the scripts are applied to.
    /// * `receiver` - Channel to receive render commands from.
    /// * `events` - Channel to report batch outcomes on.
    ///
    /// The sink is expected to start out empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(sink: S, receiver: Receiver<RenderCommand>, events: Sender<RenderEvent>) -> io::Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let failures = Arc::new(AtomicU64::new(0));
        let failures_clone = failures.clone();

        let handle = thread::Builder::new()
            .name("framewheel-render".to_string())
            .spawn(move || Self::run_loop(sink, &receiver, &events, &shutdown_clone, &failures_clone))?;

        Ok(Self {
            handle: Some(handle),
            shutdown,
            failures,
        })
    }

    /// Number of batches the sink has rejected so far.
    ///
    /// Counted before the matching [`RenderEvent::Failed`] is sent.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Acquire)
    }

    /// Signal the render thread to stop without draining queued commands.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Wait for the render thread to finish and take the sink back.
    ///
    /// Returns `None` if the thread panicked.
    pub fn join(mut self) -> Option<S> {
        self.handle.take().and_then(|handle| handle.join().ok())
    }

    /// Main render loop.
    fn run_loop(
        mut sink: S,
        receiver: &Receiver<RenderCommand>,
        events: &Sender<RenderEvent>,
        shutdown: &Arc<AtomicBool>,
        failures: &Arc<AtomicU64>,
    ) -> S {
        tracing::info!("renderer started");
        let mut state = SinkState {
            batch: 0,
            roots: 0,
            out_of_step: false,
        };

        loop {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }

            let event = match receiver.recv_timeout(POLL_INTERVAL) {
                Ok(RenderCommand::Apply { script, roots }) => {
                    state.batch += 1;
                    if state.out_of_step {
                        tracing::debug!(batch = state.batch, "sink out of step, batch skipped");
                        RenderEvent::Skipped { batch: state.batch }
                    } else {
                        Self::apply(&mut sink, &mut state, &script, roots, failures)
                    }
                }
                Ok(RenderCommand::Resync { script, roots }) => {
                    state.batch += 1;
                    let script = replace_roots(state.roots, script);
                    let event = Self::apply(&mut sink, &mut state, &script, roots, failures);
                    if event.is_applied() {
                        tracing::info!(batch = state.batch, roots, "sink resynced");
                    }
                    event
                }
                Ok(RenderCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => continue,
            };

            let batch = event.batch();
            match events.try_send(event) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(batch, "event queue full, dropping outcome");
                }
            }
        }

        tracing::info!(batches = state.batch, "renderer stopped");
        sink
    }

    /// Apply one batch and update what is known about the sink.
    fn apply(
        sink: &mut S,
        state: &mut SinkState,
        script: &EditScript,
        roots: usize,
        failures: &AtomicU64,
    ) -> RenderEvent {
        let batch = state.batch;
        let start = Instant::now();
        match script.apply_to(sink) {
            Ok(()) => {
                state.roots = roots;
                state.out_of_step = false;
                RenderEvent::Applied {
                    batch,
                    edits: script.len(),
                    elapsed: start.elapsed(),
                }
            }
            Err(error) => {
                tracing::warn!(batch, %error, "batch rolled back");
                state.out_of_step = true;
                failures.fetch_add(1, Ordering::Release);
                RenderEvent::Failed { batch, error }
            }
        }
    }
}

/// Prefix `script` with the removal of `roots` top-level nodes, last first.
fn replace_roots(roots: usize, mut script: EditScript) -> EditScript {
    let mut edits = Vec::with_capacity(roots + script.edits.len());
    for index in (0..roots).rev() {
        let index = u32::try_from(index).unwrap_or(u32::MAX);
        edits.push(Edit::RemoveSubtree {
            node: NodePath::root().child(index),
        });
    }
    edits.append(&mut script.edits);
    script.edits = edits;
    script
}

impl<S> Drop for RendererActor<S> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApplyError;
    use crossbeam_channel::bounded;

    #[derive(Default)]
    struct Counting {
        applied: usize,
        commits: usize,
        /// Reject the batch that starts with this many edits.
        reject_len: Option<usize>,
        pending: usize,
    }

    impl EditSink for Counting {
        fn begin(&mut self) -> Result<(), ApplyError> {
            self.pending = 0;
            Ok(())
        }

        fn apply(&mut self, _edit: &Edit) -> Result<(), ApplyError> {
            self.pending += 1;
            Ok(())
        }

        fn commit(&mut self) -> Result<(), ApplyError> {
            if self.reject_len == Some(self.pending) {
                self.reject_len = None;
                return Err(ApplyError::Backend("rejected".to_string()));
            }
            self.applied += self.pending;
            self.commits += 1;
            Ok(())
        }
    }

    fn script(len: usize) -> EditScript {
        EditScript {
            edits: vec![
                Edit::RemoveSubtree {
                    node: NodePath::from(vec![0]),
                };
                len
            ],
            ..EditScript::default()
        }
    }

    fn apply(len: usize) -> RenderCommand {
        RenderCommand::Apply {
            script: script(len),
            roots: 1,
        }
    }

    #[test]
    fn test_applies_in_order_and_returns_sink() {
        let (tx, rx) = bounded(4);
        let (events_tx, events_rx) = bounded(4);
        let actor = RendererActor::spawn(Counting::default(), rx, events_tx).unwrap();

        tx.send(apply(2)).unwrap();
        tx.send(apply(3)).unwrap();
        tx.send(RenderCommand::Shutdown).unwrap();

        let sink = actor.join().unwrap();
        assert_eq!(sink.applied, 5);
        assert_eq!(sink.commits, 2);

        let events: Vec<_> = events_rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].batch(), 1);
        assert!(matches!(events[1], RenderEvent::Applied { batch: 2, edits: 3, .. }));
    }

    #[test]
    fn test_failure_skips_until_resync() {
        let (tx, rx) = bounded(8);
        let (events_tx, events_rx) = bounded(8);
        let sink = Counting {
            reject_len: Some(2),
            ..Counting::default()
        };
        let actor = RendererActor::spawn(sink, rx, events_tx).unwrap();

        tx.send(RenderCommand::Apply {
            script: script(1),
            roots: 3,
        })
        .unwrap();
        tx.send(apply(2)).unwrap();
        tx.send(apply(4)).unwrap();
        tx.send(RenderCommand::Resync {
            script: script(1),
            roots: 1,
        })
        .unwrap();
        tx.send(apply(5)).unwrap();

        let events: Vec<_> = (0..5).map(|_| events_rx.recv().unwrap()).collect();
        assert!(events[0].is_applied());
        assert!(matches!(events[1], RenderEvent::Failed { batch: 2, .. }));
        assert_eq!(events[2], RenderEvent::Skipped { batch: 3 });
        // Three old roots removed, then the one-edit rebuild.
        assert!(matches!(events[3], RenderEvent::Applied { batch: 4, edits: 4, .. }));
        assert!(matches!(events[4], RenderEvent::Applied { batch: 5, edits: 5, .. }));
        assert_eq!(actor.failures(), 1);

        tx.send(RenderCommand::Shutdown).unwrap();
        let sink = actor.join().unwrap();
        assert_eq!(sink.commits, 3);
        assert_eq!(sink.applied, 1 + 4 + 5);
    }

    #[test]
    fn test_replace_roots_removes_last_first() {
        let replaced = replace_roots(2, script(1));
        assert_eq!(
            replaced.edits[..2],
            [
                Edit::RemoveSubtree {
                    node: NodePath::from(vec![1]),
                },
                Edit::RemoveSubtree {
                    node: NodePath::from(vec![0]),
                },
            ]
        );
        assert_eq!(replaced.len(), 3);
    }

    #[test]
    fn test_stops_when_commands_disconnect() {
        let (tx, rx) = bounded::<RenderCommand>(1);
        let (events_tx, _events_rx) = bounded(1);
        let actor = RendererActor::spawn(Counting::default(), rx, events_tx).unwrap();
        drop(tx);
        assert_eq!(actor.join().map(|sink| sink.applied), Some(0));
    }

    #[test]
    fn test_shutdown_flag() {
        let (_tx, rx) = bounded::<RenderCommand>(1);
        let (events_tx, _events_rx) = bounded(1);
        let actor = RendererActor::spawn(Counting::default(), rx, events_tx).unwrap();
        actor.shutdown();
        assert!(actor.join().is_some());
    }
}
