use std::sync::{Mutex, MutexGuard};

use crate::buffering::index::SharedBufferingIndex;

/// Two copies of a value phased by the global buffering index: the render
/// thread mutates `current()` while other threads read `front()`.
///
/// The per-slot mutexes only guard against torn access during the flip
/// itself; in steady state the two threads touch different slots.
pub struct DoubleBuffered<T> {
    index: SharedBufferingIndex,
    slots: [Mutex<T>; 2],
}

impl<T> DoubleBuffered<T> {
    pub fn new(index: SharedBufferingIndex, initial: T) -> Self
    where
        T: Clone,
    {
        Self {
            index,
            slots: [Mutex::new(initial.clone()), Mutex::new(initial)],
        }
    }

    /// The slot being produced this frame. Render thread only.
    pub fn current(&self) -> MutexGuard<'_, T> {
        self.slots[self.index.current()].lock().unwrap()
    }

    /// The last completed slot, safe to read from any thread.
    pub fn front(&self) -> MutexGuard<'_, T> {
        self.slots[self.index.front()].lock().unwrap()
    }

    /// Overwrites both phases, for state that must not survive a reset.
    pub fn set_both(&self, value: T)
    where
        T: Clone,
    {
        *self.slots[0].lock().unwrap() = value.clone();
        *self.slots[1].lock().unwrap() = value;
    }
}
