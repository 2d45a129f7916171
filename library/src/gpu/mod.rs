//! GPU abstraction consumed by the engine.
//!
//! Everything above this module talks to the graphics API through the
//! [`GpuBackend`] trait: texture/framebuffer lifecycle, pipeline binding,
//! draws, blits and per-thread context management. [`HeadlessGpu`] is a
//! deterministic software implementation used by tests and the demo binary.

pub mod backend;
pub mod headless;
pub mod pipelines;
pub mod types;
pub mod upload;

pub use backend::{GpuBackend, SharedGpu};
pub use headless::{GpuEvent, HeadlessGpu};
pub use pipelines::PipelineCache;
pub use types::{ContextHandle, Framebuffer, Pipeline, Texture, TexturePrecision, UniformValue};
pub use upload::{AsyncUploader, UploadId};
