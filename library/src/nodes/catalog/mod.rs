//! The built-in node catalog, grouped by category.
//!
//! Most node types are pull-only: they have no flow pins and execute when a
//! downstream attribute connection asks for one of their outputs. Flow pins
//! belong to the nodes that start execution chains, the exporters.

pub mod audio;
pub mod math;
pub mod rendering;
pub mod resources;
pub mod utilities;
pub mod values;

use crate::model::node::Node;
use crate::model::value::{DynValue, PinMap};
use crate::nodes::registry::NodeRegistry;

/// Registers every built-in node type.
pub fn register_all(registry: &mut NodeRegistry) {
    values::register(registry);
    math::register(registry);
    utilities::register(registry);
    rendering::register(registry);
    resources::register(registry);
    audio::register(registry);
}

/// Files `value` under the node's named output pin, when the node has one.
pub(crate) fn try_append(outputs: &mut PinMap, node: &Node, pin_name: &str, value: DynValue) {
    if let Some(pin_id) = node.output_pin_id(pin_name) {
        outputs.insert(pin_id, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_builtin_type_has_matching_descriptor_and_behavior() {
        let registry = NodeRegistry::with_builtin_nodes();
        assert_eq!(registry.len(), 19);
        for type_name in registry.type_names() {
            assert!(registry.behavior(type_name).is_some(), "{}", type_name);
            assert!(registry.instantiate(type_name).is_some(), "{}", type_name);
        }
    }

    #[test]
    fn test_try_append_requires_a_matching_output_pin() {
        let mut node = Node::new("test.node");
        node.add_output_pin("Value");

        let mut outputs = PinMap::new();
        try_append(&mut outputs, &node, "Missing", DynValue::Float(1.0));
        assert!(outputs.is_empty());

        try_append(&mut outputs, &node, "Value", DynValue::Float(1.0));
        let pin_id = node.output_pin_id("Value").unwrap();
        assert_eq!(outputs.get(&pin_id), Some(&DynValue::Float(1.0)));
    }
}
