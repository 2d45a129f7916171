use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::pin::{allocate_id, Pin, PinId};
use crate::model::value::DynValue;

fn default_enabled() -> bool {
    true
}

/// One processing step in a composition's graph.
///
/// The struct is pure data; behavior comes from the registry entry selected
/// by `type_name`. Input pins are matched to attributes by name via
/// `linked_attribute`, never by position, so editors may reorder pins
/// freely.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Node {
    pub node_id: i32,
    pub type_name: String,
    #[serde(default)]
    pub flow_input_pin: Option<Pin>,
    #[serde(default)]
    pub flow_output_pin: Option<Pin>,
    #[serde(default)]
    pub input_pins: Vec<Pin>,
    #[serde(default)]
    pub output_pins: Vec<Pin>,
    /// Static defaults used when an attribute has no connection.
    #[serde(default)]
    pub attributes: HashMap<String, DynValue>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub bypassed: bool,
}

impl Node {
    pub fn new(type_name: &str) -> Self {
        Self {
            node_id: allocate_id(),
            type_name: type_name.to_string(),
            flow_input_pin: None,
            flow_output_pin: None,
            input_pins: Vec::new(),
            output_pins: Vec::new(),
            attributes: HashMap::new(),
            enabled: true,
            bypassed: false,
        }
    }

    /// Adds the flow-input/flow-output pin pair that lets the node take
    /// part in an execution chain.
    pub fn generate_flow_pins(&mut self) {
        self.flow_input_pin = Some(Pin::flow_input());
        self.flow_output_pin = Some(Pin::flow_output());
    }

    pub fn add_input_pin(&mut self, linked_attribute: &str) {
        self.input_pins.push(Pin::input(linked_attribute));
    }

    pub fn add_output_pin(&mut self, linked_attribute: &str) {
        self.output_pins.push(Pin::output(linked_attribute));
    }

    /// Registers the static default for an attribute.
    pub fn setup_attribute(&mut self, name: &str, value: DynValue) {
        self.attributes.insert(name.to_string(), value);
    }

    /// Input pin exposing the given attribute, located by name.
    pub fn attribute_pin(&self, name: &str) -> Option<&Pin> {
        self.input_pins
            .iter()
            .find(|pin| pin.linked_attribute == name)
    }

    pub fn attribute_pin_mut(&mut self, name: &str) -> Option<&mut Pin> {
        self.input_pins
            .iter_mut()
            .find(|pin| pin.linked_attribute == name)
    }

    pub fn output_pin(&self, name: &str) -> Option<&Pin> {
        self.output_pins
            .iter()
            .find(|pin| pin.linked_attribute == name)
    }

    pub fn output_pin_id(&self, name: &str) -> Option<PinId> {
        self.output_pin(name).map(|pin| pin.pin_id)
    }

    /// Wires this node's `attribute` input to an upstream output pin.
    pub fn connect_attribute(&mut self, attribute: &str, source_pin_id: PinId) -> bool {
        match self.attribute_pin_mut(attribute) {
            Some(pin) => {
                pin.connect(source_pin_id);
                true
            }
            None => false,
        }
    }

    /// All pins the node owns, flow pins included.
    pub fn pins(&self) -> impl Iterator<Item = &Pin> {
        self.input_pins
            .iter()
            .chain(self.output_pins.iter())
            .chain(self.flow_input_pin.iter())
            .chain(self.flow_output_pin.iter())
    }

    pub fn max_owned_id(&self) -> i32 {
        self.pins()
            .flat_map(|pin| [pin.pin_id, pin.link_id])
            .chain(std::iter::once(self.node_id))
            .max()
            .unwrap_or(self.node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_node() -> Node {
        let mut node = Node::new("math.add");
        node.add_input_pin("A");
        node.add_input_pin("B");
        node.add_output_pin("Value");
        node.setup_attribute("A", DynValue::Float(1.0));
        node.setup_attribute("B", DynValue::Float(2.0));
        node
    }

    #[test]
    fn test_attribute_pins_match_by_name_not_position() {
        let mut node = setup_node();
        node.input_pins.reverse();
        assert_eq!(node.attribute_pin("A").unwrap().linked_attribute, "A");
        assert_eq!(node.attribute_pin("B").unwrap().linked_attribute, "B");
    }

    #[test]
    fn test_connect_attribute_targets_the_right_pin() {
        let mut node = setup_node();
        assert!(node.connect_attribute("B", 123));
        assert!(!node.attribute_pin("A").unwrap().is_connected());
        assert_eq!(node.attribute_pin("B").unwrap().connected_pin_id, 123);
        assert!(!node.connect_attribute("Missing", 5));
    }

    #[test]
    fn test_pins_iterates_flow_pins_too() {
        let mut node = setup_node();
        assert_eq!(node.pins().count(), 3);
        node.generate_flow_pins();
        assert_eq!(node.pins().count(), 5);
        assert!(node.pins().any(|pin| pin.flow));
    }

    #[test]
    fn test_serde_round_trip_keeps_connections() {
        let mut node = setup_node();
        node.connect_attribute("A", 99);
        let json = serde_json::to_string(&node).unwrap();
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }
}
