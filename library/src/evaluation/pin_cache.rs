use std::collections::HashMap;

use crate::buffering::index::SharedBufferingIndex;
use crate::buffering::value::DoubleBuffered;
use crate::model::pin::PinId;
use crate::model::value::{DynValue, PinMap};

/// Frame-scoped map from output pin to the value it last produced.
///
/// Double-buffered: the render thread fills the current phase while
/// editors and monitors read coherent values from the previous completed
/// pass through [`front_value`].
///
/// [`front_value`]: PinValueCache::front_value
pub struct PinValueCache {
    values: DoubleBuffered<HashMap<PinId, DynValue>>,
}

impl PinValueCache {
    pub fn new(index: SharedBufferingIndex) -> Self {
        Self {
            values: DoubleBuffered::new(index, HashMap::new()),
        }
    }

    pub fn write(&self, pin_id: PinId, value: DynValue) {
        self.values.current().insert(pin_id, value);
    }

    pub fn write_all(&self, outputs: &PinMap) {
        if outputs.is_empty() {
            return;
        }
        let mut current = self.values.current();
        for (pin_id, value) in outputs {
            current.insert(*pin_id, value.clone());
        }
    }

    /// Value from the pass being rendered right now. Render thread only.
    pub fn current_value(&self, pin_id: PinId) -> Option<DynValue> {
        self.values.current().get(&pin_id).cloned()
    }

    /// Value from the last completed pass, safe from any thread.
    pub fn front_value(&self, pin_id: PinId) -> Option<DynValue> {
        self.values.front().get(&pin_id).cloned()
    }

    /// Drops everything in the write phase; called at the start of a pass
    /// batch so stale values never bleed into the new frame.
    pub fn clear_current(&self) {
        self.values.current().clear();
    }

    /// Drops both phases at once, for project replacement.
    pub fn set_both(&self, values: HashMap<PinId, DynValue>) {
        self.values.set_both(values);
    }

    pub fn current_len(&self) -> usize {
        self.values.current().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffering::index::BufferingIndex;

    #[test]
    fn test_values_surface_after_a_flip() {
        let index = BufferingIndex::shared();
        let cache = PinValueCache::new(index.clone());

        cache.write(10, DynValue::Float(0.5));
        assert_eq!(cache.front_value(10), None);
        assert_eq!(cache.current_value(10), Some(DynValue::Float(0.5)));

        index.flip();
        assert_eq!(cache.front_value(10), Some(DynValue::Float(0.5)));
        assert_eq!(cache.current_value(10), None);
    }

    #[test]
    fn test_clear_current_only_touches_the_write_phase() {
        let index = BufferingIndex::shared();
        let cache = PinValueCache::new(index.clone());
        cache.write(1, DynValue::Int(1));
        index.flip();
        cache.write(2, DynValue::Int(2));

        cache.clear_current();
        assert_eq!(cache.current_len(), 0);
        assert_eq!(cache.front_value(1), Some(DynValue::Int(1)));
    }
}
