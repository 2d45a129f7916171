//! Final-frame assembly: blend-mode table, per-layer targets and the
//! compositor that folds exported renderables into the primary framebuffer.

pub mod blending;
pub mod compositor;
pub mod shaders;
pub mod target;

pub use blending::{Blending, BlendingMode};
pub use compositor::Compositor;
pub use target::{CompositorTarget, RenderableBundle};
