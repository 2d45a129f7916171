use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub type SharedBufferingIndex = Arc<BufferingIndex>;

/// The process-wide flip-flop selecting which double-buffer slot is being
/// written this frame.
///
/// Only the render loop flips it, exactly once per completed pass, after
/// composition. Everyone else just reads.
pub struct BufferingIndex {
    index: AtomicUsize,
}

impl BufferingIndex {
    pub fn new() -> Self {
        Self {
            index: AtomicUsize::new(0),
        }
    }

    pub fn shared() -> SharedBufferingIndex {
        Arc::new(Self::new())
    }

    /// Slot the render thread writes this frame.
    pub fn current(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    /// Slot holding the last completed frame.
    pub fn front(&self) -> usize {
        1 - self.current()
    }

    pub fn flip(&self) {
        self.index.fetch_xor(1, Ordering::SeqCst);
    }
}

impl Default for BufferingIndex {
    fn default() -> Self {
        Self::new()
    }
}
