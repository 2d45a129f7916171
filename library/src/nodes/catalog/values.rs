use super::try_append;
use crate::evaluation::context::EvalContext;
use crate::evaluation::engine;
use crate::model::node::Node;
use crate::model::value::{DynValue, PinMap};
use crate::nodes::registry::{NodeBehavior, NodeCategory, NodeDescriptor, NodeRegistry};

/// Shared behavior of every value source: resolve "Value" (connection or
/// static) and republish it on the output pin of the same name.
struct EmitValue;

impl NodeBehavior for EmitValue {
    fn execute(&self, node: &Node, ctx: &mut EvalContext<'_>, accumulated: &PinMap) -> PinMap {
        let mut outputs = PinMap::new();
        if let Some(value) = engine::dynamic_attribute(ctx, node, "Value", accumulated) {
            try_append(&mut outputs, node, "Value", value);
        }
        outputs
    }
}

pub(super) fn register(registry: &mut NodeRegistry) {
    registry.register(
        NodeDescriptor::new("value.float", "Float Value", NodeCategory::Values)
            .with_inputs(vec!["Value"])
            .with_outputs(vec!["Value"])
            .with_defaults(vec![("Value", DynValue::Float(0.0))]),
        EmitValue,
    );
    registry.register(
        NodeDescriptor::new("value.vec2", "Vec2 Value", NodeCategory::Values)
            .with_inputs(vec!["Value"])
            .with_outputs(vec!["Value"])
            .with_defaults(vec![("Value", DynValue::Vec2([0.0, 0.0]))]),
        EmitValue,
    );
    registry.register(
        NodeDescriptor::new("value.color", "Color Value", NodeCategory::Values)
            .with_inputs(vec!["Value"])
            .with_outputs(vec!["Value"])
            .with_defaults(vec![("Value", DynValue::Vec4([1.0, 1.0, 1.0, 1.0]))]),
        EmitValue,
    );
    registry.register(
        NodeDescriptor::new("value.string", "String Value", NodeCategory::Values)
            .with_inputs(vec!["Value"])
            .with_outputs(vec!["Value"])
            .with_defaults(vec![("Value", DynValue::String(String::new()))]),
        EmitValue,
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::evaluation::context::RenderPass;
    use crate::gpu::headless::HeadlessGpu;
    use crate::model::composition::Composition;
    use crate::model::project::Project;
    use crate::nodes::scratch::ScratchTable;
    use crate::rendering::render_server::RenderConfig;
    use crate::rendering::services::RenderServices;

    fn setup_services() -> RenderServices {
        RenderServices::new(Arc::new(HeadlessGpu::new()), &RenderConfig::default())
    }

    #[test]
    fn test_value_sources_emit_their_static_attribute() {
        let services = setup_services();

        let mut composition = Composition::new("values", 0.0, 10.0);
        let color = composition.add_node(services.registry.instantiate("value.color").unwrap());
        composition.set_node_attribute(color, "Value", DynValue::Vec4([0.2, 0.4, 0.6, 1.0]));

        let mut project = Project::new("test");
        project.add_composition(composition);

        let mut scratch = ScratchTable::new();
        let mut ctx = EvalContext::new(&services, &project, RenderPass::Rendering, 1, &mut scratch);
        let outputs = engine::execute_node(&mut ctx, color, &PinMap::new());

        let pin = project.node_by_id(color).unwrap().output_pin_id("Value").unwrap();
        assert_eq!(outputs.get(&pin), Some(&DynValue::Vec4([0.2, 0.4, 0.6, 1.0])));

        services.uploader.stop().unwrap();
    }

    #[test]
    fn test_value_sources_chain_through_their_input_pin() {
        let services = setup_services();

        let mut composition = Composition::new("values", 0.0, 10.0);
        let source = composition.add_node(services.registry.instantiate("value.float").unwrap());
        let relay = composition.add_node(services.registry.instantiate("value.float").unwrap());
        composition.set_node_attribute(source, "Value", DynValue::Float(3.5));
        assert!(composition.connect(source, "Value", relay, "Value"));

        let mut project = Project::new("test");
        project.add_composition(composition);

        let mut scratch = ScratchTable::new();
        let mut ctx = EvalContext::new(&services, &project, RenderPass::Rendering, 1, &mut scratch);
        let outputs = engine::execute_node(&mut ctx, relay, &PinMap::new());

        let pin = project.node_by_id(relay).unwrap().output_pin_id("Value").unwrap();
        assert_eq!(outputs.get(&pin), Some(&DynValue::Float(3.5)));

        services.uploader.stop().unwrap();
    }
}
