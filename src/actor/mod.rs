//! Actor Model: Message-passing between the render root and the renderer.
//!
//! This module implements a small actor system using crossbeam channels:
//! - **Main Loop**: runs render passes and diffs, sends whole edit scripts
//! - **Render Actor**: owns the [`EditSink`](crate::diff::EditSink) and
//!   applies each script as one batch
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    RenderCommand    ┌──────────────┐
//! │              │ ──────────────────▶ │              │
//! │  Main Loop   │                     │Render Thread │ ──▶ EditSink
//! │ (RenderRoot) │ ◀────────────────── │              │
//! └──────────────┘     RenderEvent     └──────────────┘
//! ```

mod engine;
mod messages;
mod renderer;

pub use engine::{Engine, EngineConfig, PassSummary};
pub use messages::{RenderCommand, RenderEvent};
pub use renderer::RendererActor;
