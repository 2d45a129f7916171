//! Pull-based node graph evaluation.
//!
//! Execution chains run node by node along flow connections; attribute
//! connections are resolved lazily by pulling on the upstream node the
//! moment a behavior asks for the value. Everything a pass produces is
//! published through double-buffered channels so the interactive thread
//! only ever reads completed frames.

pub mod context;
pub mod diagnostics;
pub mod engine;
pub mod pin_cache;

pub use context::{EvalContext, RenderPass};
pub use diagnostics::{Diagnostic, DiagnosticsChannel, FrameDiagnostics};
pub use pin_cache::PinValueCache;
