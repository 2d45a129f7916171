use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::attribute::Attribute;
use crate::model::mask::CompositionMask;
use crate::model::node::Node;
use crate::model::pin::allocate_id;
use crate::model::value::DynValue;
use crate::nodes::registry::NodeRegistry;

fn default_enabled() -> bool {
    true
}

fn default_opacity() -> f32 {
    1.0
}

/// A time-bounded layer owning one node graph.
///
/// Nodes are keyed by ID in a `BTreeMap` so traversal order is
/// deterministic. Blend mode, opacity and masks describe how the
/// composition's rendered output participates in final composition.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Composition {
    pub id: i32,
    pub name: String,
    pub begin_frame: f64,
    pub end_frame: f64,
    /// Blending catalog codename; empty means plain alpha-over.
    #[serde(default)]
    pub blend_mode: String,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    /// When set, opacity is driven by this animatable attribute.
    #[serde(default)]
    pub opacity_attribute_id: Option<i32>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_enabled")]
    pub audio_enabled: bool,
    #[serde(default)]
    pub masks: Vec<CompositionMask>,
    #[serde(default)]
    pub nodes: BTreeMap<i32, Node>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Composition {
    pub fn new(name: &str, begin_frame: f64, end_frame: f64) -> Self {
        Self {
            id: allocate_id(),
            name: name.to_string(),
            begin_frame,
            end_frame,
            blend_mode: String::new(),
            opacity: 1.0,
            opacity_attribute_id: None,
            enabled: true,
            audio_enabled: true,
            masks: Vec::new(),
            nodes: BTreeMap::new(),
            attributes: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: Node) -> i32 {
        let node_id = node.node_id;
        self.nodes.insert(node_id, node);
        node_id
    }

    pub fn node(&self, node_id: i32) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub fn node_mut(&mut self, node_id: i32) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    pub fn add_attribute(&mut self, attribute: Attribute) -> i32 {
        let id = attribute.id;
        self.attributes.push(attribute);
        id
    }

    pub fn attribute_by_id(&self, id: i32) -> Option<&Attribute> {
        self.attributes.iter().find(|attribute| attribute.id == id)
    }

    pub fn attribute_by_id_mut(&mut self, id: i32) -> Option<&mut Attribute> {
        self.attributes
            .iter_mut()
            .find(|attribute| attribute.id == id)
    }

    /// Wires `to_node`'s `to_attribute` input to `from_node`'s
    /// `from_attribute` output. Both nodes must live in this composition.
    pub fn connect(
        &mut self,
        from_node: i32,
        from_attribute: &str,
        to_node: i32,
        to_attribute: &str,
    ) -> bool {
        let Some(source_pin_id) = self
            .nodes
            .get(&from_node)
            .and_then(|node| node.output_pin_id(from_attribute))
        else {
            return false;
        };
        match self.nodes.get_mut(&to_node) {
            Some(node) => node.connect_attribute(to_attribute, source_pin_id),
            None => false,
        }
    }

    /// Chains `from_node`'s flow output into `to_node`'s flow input.
    pub fn connect_flow(&mut self, from_node: i32, to_node: i32) -> bool {
        let Some(target_pin_id) = self
            .nodes
            .get(&to_node)
            .and_then(|node| node.flow_input_pin.as_ref())
            .map(|pin| pin.pin_id)
        else {
            return false;
        };
        let Some(source_pin_id) = self
            .nodes
            .get(&from_node)
            .and_then(|node| node.flow_output_pin.as_ref())
            .map(|pin| pin.pin_id)
        else {
            return false;
        };

        if let Some(pin) = self
            .nodes
            .get_mut(&from_node)
            .and_then(|node| node.flow_output_pin.as_mut())
        {
            pin.connect(target_pin_id);
        }
        if let Some(pin) = self
            .nodes
            .get_mut(&to_node)
            .and_then(|node| node.flow_input_pin.as_mut())
        {
            pin.connect(source_pin_id);
        }
        true
    }

    /// Widened by one frame on each side so boundary frames still render.
    pub fn contains_frame(&self, frame: f64) -> bool {
        frame > self.begin_frame - 1.0 && frame < self.end_frame + 1.0
    }

    /// Opacity at composition-local time: the driving attribute when one is
    /// set and resolves to a float, the static value otherwise.
    pub fn opacity_at(&self, local_frame: f64) -> f32 {
        self.opacity_attribute_id
            .and_then(|id| self.attribute_by_id(id))
            .and_then(|attribute| attribute.value_at(local_frame))
            .and_then(|value| value.get_as::<f32>())
            .unwrap_or(self.opacity)
    }

    /// Whether any live node would contribute to the rendering pass.
    pub fn does_rendering(&self, registry: &NodeRegistry) -> bool {
        self.nodes.values().any(|node| {
            node.enabled
                && !node.bypassed
                && registry
                    .descriptor(&node.type_name)
                    .is_some_and(|descriptor| descriptor.does_rendering)
        })
    }

    /// Whether any live node would contribute to the audio pass.
    pub fn does_audio_mixing(&self, registry: &NodeRegistry) -> bool {
        self.nodes.values().any(|node| {
            node.enabled
                && !node.bypassed
                && registry
                    .descriptor(&node.type_name)
                    .is_some_and(|descriptor| descriptor.does_audio_mixing)
        })
    }

    pub fn length_in_frames(&self) -> f64 {
        (self.end_frame - self.begin_frame).max(0.0)
    }

    pub fn max_owned_id(&self) -> i32 {
        self.nodes
            .values()
            .map(|node| node.max_owned_id())
            .chain(self.attributes.iter().map(|attribute| attribute.max_owned_id()))
            .chain(std::iter::once(self.id))
            .max()
            .unwrap_or(self.id)
    }

    /// Convenience for building graphs: sets a static attribute on a node.
    pub fn set_node_attribute(&mut self, node_id: i32, name: &str, value: DynValue) -> bool {
        match self.nodes.get_mut(&node_id) {
            Some(node) => {
                node.setup_attribute(name, value);
                true
            }
            None => false,
        }
    }
}
