//! Double-buffering primitives.
//!
//! Everything the interactive thread may observe while the render thread is
//! writing exists twice. One global index decides which slot is the render
//! thread's current write target; readers take the other. Framebuffer
//! ping-pong inside a single node uses a local counter instead, so iterating
//! an effect never disturbs the global phase.

pub mod framebuffer;
pub mod index;
pub mod managed;
pub mod value;

pub use framebuffer::{generate_compatible_framebuffer, DoubleBufferedFramebuffer};
pub use index::{BufferingIndex, SharedBufferingIndex};
pub use managed::ManagedFramebuffer;
pub use value::DoubleBuffered;
