use std::sync::atomic::{AtomicI32, Ordering};

use serde::{Deserialize, Serialize};

pub type PinId = i32;

/// `connected_pin_id` value meaning "not wired to anything".
pub const UNCONNECTED: PinId = 0;

static NEXT_ID: AtomicI32 = AtomicI32::new(1);

/// Hands out process-unique IDs shared by pins, nodes, compositions and
/// attributes.
pub fn allocate_id() -> i32 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Bumps the allocator past IDs that arrived from a deserialized project,
/// so freshly allocated ones never collide.
pub fn ensure_ids_above(id: i32) {
    NEXT_ID.fetch_max(id.saturating_add(1), Ordering::Relaxed);
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PinDirection {
    Input,
    Output,
}

/// One endpoint on a node.
///
/// Connections are weak: `connected_pin_id` names an upstream output pin by
/// ID and is resolved through the project's pin index at evaluation time.
/// Data pins expose the attribute named by `linked_attribute`; flow pins
/// carry execution order instead of data.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Pin {
    pub pin_id: PinId,
    /// Visual link identity for editors; unused by evaluation.
    pub link_id: i32,
    pub connected_pin_id: PinId,
    pub linked_attribute: String,
    pub direction: PinDirection,
    pub flow: bool,
}

impl Pin {
    fn new(linked_attribute: &str, direction: PinDirection, flow: bool) -> Self {
        Self {
            pin_id: allocate_id(),
            link_id: allocate_id(),
            connected_pin_id: UNCONNECTED,
            linked_attribute: linked_attribute.to_string(),
            direction,
            flow,
        }
    }

    pub fn input(linked_attribute: &str) -> Self {
        Self::new(linked_attribute, PinDirection::Input, false)
    }

    pub fn output(linked_attribute: &str) -> Self {
        Self::new(linked_attribute, PinDirection::Output, false)
    }

    pub fn flow_input() -> Self {
        Self::new("", PinDirection::Input, true)
    }

    pub fn flow_output() -> Self {
        Self::new("", PinDirection::Output, true)
    }

    pub fn is_connected(&self) -> bool {
        self.connected_pin_id != UNCONNECTED
    }

    pub fn connect(&mut self, source_pin_id: PinId) {
        self.connected_pin_id = source_pin_id;
    }

    pub fn disconnect(&mut self) {
        self.connected_pin_id = UNCONNECTED;
    }
}
