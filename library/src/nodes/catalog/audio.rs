use super::try_append;
use crate::evaluation::context::{EvalContext, RenderPass};
use crate::evaluation::engine;
use crate::model::node::Node;
use crate::model::value::{DynValue, PinMap};
use crate::nodes::registry::{NodeBehavior, NodeCategory, NodeDescriptor, NodeRegistry};

/// Scales a sample buffer by a gain factor. Runs only in the audio pass.
struct AudioGain;

impl NodeBehavior for AudioGain {
    fn execute(&self, node: &Node, ctx: &mut EvalContext<'_>, accumulated: &PinMap) -> PinMap {
        let mut outputs = PinMap::new();
        if ctx.pass != RenderPass::Audio {
            return outputs;
        }

        let samples = engine::attribute::<Vec<f32>>(ctx, node, "Samples", accumulated);
        let gain = engine::attribute::<f32>(ctx, node, "Gain", accumulated).unwrap_or(1.0);
        if let Some(samples) = samples {
            let amplified = samples.iter().map(|sample| sample * gain).collect();
            try_append(&mut outputs, node, "Output", DynValue::AudioSamples(amplified));
        }
        outputs
    }
}

pub(super) fn register(registry: &mut NodeRegistry) {
    registry.register(
        NodeDescriptor::new("audio.gain", "Audio Gain", NodeCategory::Audio)
            .with_inputs(vec!["Samples", "Gain"])
            .with_outputs(vec!["Output"])
            .with_defaults(vec![
                ("Samples", DynValue::AudioSamples(Vec::new())),
                ("Gain", DynValue::Float(1.0)),
            ])
            .with_flow_pins()
            .audio_mixing(),
        AudioGain,
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::gpu::headless::HeadlessGpu;
    use crate::model::composition::Composition;
    use crate::model::project::Project;
    use crate::nodes::scratch::ScratchTable;
    use crate::rendering::render_server::RenderConfig;
    use crate::rendering::services::RenderServices;

    fn setup_gain(samples: Vec<f32>, gain: f32) -> (RenderServices, Project, i32) {
        let services = RenderServices::new(Arc::new(HeadlessGpu::new()), &RenderConfig::default());
        let mut composition = Composition::new("mix", 0.0, 10.0);
        let node = composition.add_node(services.registry.instantiate("audio.gain").unwrap());
        composition.set_node_attribute(node, "Samples", DynValue::AudioSamples(samples));
        composition.set_node_attribute(node, "Gain", DynValue::Float(gain));
        let mut project = Project::new("test");
        project.add_composition(composition);
        (services, project, node)
    }

    fn output_samples(outputs: &PinMap, project: &Project, node_id: i32) -> Option<Vec<f32>> {
        let pin = project
            .node_by_id(node_id)
            .unwrap()
            .output_pin_id("Output")
            .unwrap();
        match outputs.get(&pin) {
            Some(DynValue::AudioSamples(samples)) => Some(samples.clone()),
            _ => None,
        }
    }

    #[test]
    fn test_gain_scales_samples_in_the_audio_pass() {
        let (services, project, node) = setup_gain(vec![0.5, -1.0, 0.25], 2.0);
        let mut scratch = ScratchTable::new();
        let mut ctx = EvalContext::new(&services, &project, RenderPass::Audio, 1, &mut scratch);
        let outputs = engine::execute_node(&mut ctx, node, &PinMap::new());

        assert_eq!(
            output_samples(&outputs, &project, node),
            Some(vec![1.0, -2.0, 0.5])
        );
        services.uploader.stop().unwrap();
    }

    #[test]
    fn test_gain_is_inert_during_the_rendering_pass() {
        let (services, project, node) = setup_gain(vec![0.5], 2.0);
        let mut scratch = ScratchTable::new();
        let mut ctx =
            EvalContext::new(&services, &project, RenderPass::Rendering, 1, &mut scratch);
        let outputs = engine::execute_node(&mut ctx, node, &PinMap::new());

        assert!(outputs.is_empty());
        services.uploader.stop().unwrap();
    }

    #[test]
    fn test_gain_stages_chain_through_the_samples_pin() {
        let (services, mut project, first) = setup_gain(vec![0.25, 0.5], 2.0);
        let composition_id = project.compositions[0].id;
        let second = {
            let composition = project.composition_by_id_mut(composition_id).unwrap();
            let second =
                composition.add_node(services.registry.instantiate("audio.gain").unwrap());
            composition.set_node_attribute(second, "Gain", DynValue::Float(4.0));
            composition.connect(first, "Output", second, "Samples");
            second
        };
        project.rebuild_graph_index();

        let mut scratch = ScratchTable::new();
        let mut ctx = EvalContext::new(&services, &project, RenderPass::Audio, 1, &mut scratch);
        let outputs = engine::execute_node(&mut ctx, second, &PinMap::new());

        assert_eq!(
            output_samples(&outputs, &project, second),
            Some(vec![2.0, 4.0])
        );
        services.uploader.stop().unwrap();
    }
}
