//! Node-graph video compositing engine.
//!
//! A [`Project`](model::Project) is a set of time-bounded compositions, each
//! owning a graph of typed nodes. A background render thread re-evaluates
//! the graph on demand: export nodes pull their inputs lazily through the
//! graph, draw into double-buffered framebuffers, and hand finished layers
//! to the compositor, which folds them into the primary framebuffer. Every
//! surface the interactive thread can observe is double-buffered, so readers
//! only ever see completed frames.
//!
//! [`RenderServer`](rendering::RenderServer) is the front door: give it a
//! GPU backend and a project, then seek, play, or force frames.

pub mod buffering;
pub mod cache;
pub mod compositing;
pub mod error;
pub mod evaluation;
pub mod gpu;
pub mod loader;
pub mod model;
pub mod nodes;
pub mod rendering;
pub mod util;

pub use error::{EngineError, EngineResult};
pub use gpu::{GpuBackend, SharedGpu};
pub use model::{Composition, DynValue, Node, Project};
pub use rendering::{RenderConfig, RenderServer};
