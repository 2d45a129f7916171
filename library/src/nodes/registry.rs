//! Node type registry: descriptors (pin layout, defaults, flags) plus the
//! behavior objects the evaluation engine dispatches to.

use std::collections::HashMap;
use std::sync::Arc;

use crate::evaluation::context::EvalContext;
use crate::model::node::Node;
use crate::model::value::{DynValue, PinMap};

/// Category of a node type, for grouping in catalogs and editors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    /// Constant value sources (float, vec2, color, string)
    Values,
    /// Arithmetic over dynamic values
    Math,
    /// Plumbing (transport, swizzle)
    Utilities,
    /// Nodes that draw into framebuffers
    Rendering,
    /// External resources (images)
    Resources,
    /// Audio-pass nodes
    Audio,
}

impl std::fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeCategory::Values => "Values",
            NodeCategory::Math => "Math",
            NodeCategory::Utilities => "Utilities",
            NodeCategory::Rendering => "Rendering",
            NodeCategory::Resources => "Resources",
            NodeCategory::Audio => "Audio",
        };
        write!(f, "{}", s)
    }
}

/// Static description of a node type: what pins an instance gets, which
/// attributes exist by default, and which render pass wants it.
#[derive(Debug, Clone)]
pub struct NodeDescriptor {
    /// Unique type identifier (e.g. "math.add", "rendering.draw_layer")
    pub type_name: String,
    /// Human-readable name
    pub display_name: String,
    pub category: NodeCategory,
    /// Attribute names exposed as input pins
    pub inputs: Vec<String>,
    /// Attribute names exposed as output pins
    pub outputs: Vec<String>,
    /// Static attribute defaults for new instances
    pub defaults: Vec<(String, DynValue)>,
    /// Whether instances get a flow pin pair
    pub flow: bool,
    pub does_rendering: bool,
    pub does_audio_mixing: bool,
}

impl NodeDescriptor {
    pub fn new(type_name: &str, display_name: &str, category: NodeCategory) -> Self {
        Self {
            type_name: type_name.to_string(),
            display_name: display_name.to_string(),
            category,
            inputs: Vec::new(),
            outputs: Vec::new(),
            defaults: Vec::new(),
            flow: false,
            does_rendering: false,
            does_audio_mixing: false,
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<&str>) -> Self {
        self.inputs = inputs.into_iter().map(str::to_string).collect();
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<&str>) -> Self {
        self.outputs = outputs.into_iter().map(str::to_string).collect();
        self
    }

    pub fn with_defaults(mut self, defaults: Vec<(&str, DynValue)>) -> Self {
        self.defaults = defaults
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        self
    }

    pub fn with_flow_pins(mut self) -> Self {
        self.flow = true;
        self
    }

    pub fn rendering(mut self) -> Self {
        self.does_rendering = true;
        self
    }

    pub fn audio_mixing(mut self) -> Self {
        self.does_audio_mixing = true;
        self
    }
}

/// The polymorphic part of a node type.
///
/// Behaviors never return errors: a node that cannot resolve what it needs
/// contributes nothing this frame. Genuine infrastructure failures go
/// through [`EvalContext::record_fatal`].
pub trait NodeBehavior: Send + Sync {
    fn execute(&self, node: &Node, ctx: &mut EvalContext<'_>, accumulated: &PinMap) -> PinMap;
}

struct RegistryEntry {
    descriptor: NodeDescriptor,
    behavior: Arc<dyn NodeBehavior>,
}

/// Maps `type_name` to descriptor and behavior.
pub struct NodeRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registry preloaded with the built-in catalog.
    pub fn with_builtin_nodes() -> Self {
        let mut registry = Self::new();
        crate::nodes::catalog::register_all(&mut registry);
        registry
    }

    pub fn register(&mut self, descriptor: NodeDescriptor, behavior: impl NodeBehavior + 'static) {
        self.entries.insert(
            descriptor.type_name.clone(),
            RegistryEntry {
                descriptor,
                behavior: Arc::new(behavior),
            },
        );
    }

    pub fn descriptor(&self, type_name: &str) -> Option<&NodeDescriptor> {
        self.entries.get(type_name).map(|entry| &entry.descriptor)
    }

    pub fn behavior(&self, type_name: &str) -> Option<Arc<dyn NodeBehavior>> {
        self.entries.get(type_name).map(|entry| entry.behavior.clone())
    }

    /// Builds a fresh node instance laid out per the descriptor.
    pub fn instantiate(&self, type_name: &str) -> Option<Node> {
        let descriptor = self.descriptor(type_name)?;
        let mut node = Node::new(type_name);
        if descriptor.flow {
            node.generate_flow_pins();
        }
        for input in &descriptor.inputs {
            node.add_input_pin(input);
        }
        for output in &descriptor.outputs {
            node.add_output_pin(output);
        }
        for (name, value) in &descriptor.defaults {
            node.setup_attribute(name, value.clone());
        }
        Some(node)
    }

    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
