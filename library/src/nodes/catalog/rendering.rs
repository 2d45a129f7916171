use super::try_append;
use crate::compositing::shaders::FULLSCREEN_VERTEX;
use crate::compositing::target::{CompositorTarget, RenderableBundle};
use crate::error::{EngineError, EngineResult};
use crate::evaluation::context::EvalContext;
use crate::evaluation::engine;
use crate::gpu::types::{Framebuffer, Pipeline, Texture, TexturePrecision, UniformValue};
use crate::model::node::Node;
use crate::model::value::{DynValue, PinMap};
use crate::nodes::registry::{NodeBehavior, NodeCategory, NodeDescriptor, NodeRegistry};
use crate::nodes::scratch::NodeScratch;
use crate::rendering::services::RenderServices;

const DRAW_LAYER_FRAGMENT: &str = r#"#version 310 es
precision highp float;

in vec2 vUV;
out vec4 fragColor;

uniform sampler2D uTexture;
uniform vec4 uColor;
uniform int uHasTexture;

void main() {
    vec4 color = uColor;
    if (uHasTexture == 1) {
        color *= texture(uTexture, vUV);
    }
    fragColor = color;
}
"#;

const BOX_BLUR_FRAGMENT: &str = r#"#version 310 es
precision highp float;

in vec2 vUV;
out vec4 fragColor;

uniform sampler2D uTexture;
uniform vec2 uResolution;
uniform vec2 uIntensity;
uniform vec2 uDirection;
uniform float uSamples;
uniform float uOpacity;

void main() {
    vec2 texelStep = (uIntensity * uDirection) / uResolution;
    float taps = max(uSamples, 1.0);
    vec4 accumulated = vec4(0.0);
    for (float i = 0.0; i < taps; i += 1.0) {
        accumulated += texture(uTexture, vUV + texelStep * (i / taps - 0.5));
    }
    fragColor = (accumulated / taps) * uOpacity;
}
"#;

/// Fills a composition-sized layer with a color, optionally modulated by a
/// texture, on top of an optional base layer.
struct DrawLayer;

impl DrawLayer {
    #[allow(clippy::too_many_arguments)]
    fn draw(
        services: &RenderServices,
        scratch: &mut NodeScratch,
        width: u32,
        height: u32,
        precision: TexturePrecision,
        base: Option<&Framebuffer>,
        color: [f32; 4],
        texture: Option<&Texture>,
    ) -> EngineResult<Framebuffer> {
        let pipeline = services.pipelines.get_or_compile(
            "draw_layer/shader",
            FULLSCREEN_VERTEX,
            DRAW_LAYER_FRAGMENT,
        )?;
        let framebuffer = scratch
            .managed
            .get(&services.gpu, width, height, precision, base)?;

        let gpu = &services.gpu;
        gpu.bind_framebuffer(Some(&framebuffer))?;
        gpu.bind_pipeline(&pipeline)?;
        let texture = texture.filter(|texture| !texture.is_null());
        if let Some(texture) = texture {
            gpu.bind_texture(texture, &pipeline, 0, "uTexture")?;
        }
        gpu.set_uniform(&pipeline, "uColor", UniformValue::Vec4(color))?;
        gpu.set_uniform(
            &pipeline,
            "uHasTexture",
            UniformValue::Int(texture.is_some() as i32),
        )?;
        gpu.draw_arrays(3)?;
        Ok(framebuffer)
    }
}

impl NodeBehavior for DrawLayer {
    fn execute(&self, node: &Node, ctx: &mut EvalContext<'_>, accumulated: &PinMap) -> PinMap {
        let mut outputs = PinMap::new();
        let services = ctx.services;
        let (width, height) = ctx.required_resolution();
        let precision = ctx.project.color_precision;

        let base = engine::attribute::<Framebuffer>(ctx, node, "Base", accumulated);
        let texture = engine::attribute::<Texture>(ctx, node, "Texture", accumulated);
        let Some(color) = engine::attribute::<[f32; 4]>(ctx, node, "Color", accumulated) else {
            return outputs;
        };

        let result = Self::draw(
            services,
            ctx.scratch.entry(node.node_id),
            width,
            height,
            precision,
            base.as_ref(),
            color,
            texture.as_ref(),
        );
        match result {
            Ok(framebuffer) => {
                try_append(&mut outputs, node, "Output", DynValue::Framebuffer(framebuffer));
            }
            Err(error) => ctx.record_fatal(error),
        }
        outputs
    }
}

/// Separable box blur: a horizontal tap pass into one scratch slot, then a
/// vertical pass into the other.
struct BoxBlur;

impl BoxBlur {
    #[allow(clippy::too_many_arguments)]
    fn blur_pass(
        services: &RenderServices,
        pipeline: &Pipeline,
        target: &Framebuffer,
        source: &Texture,
        intensity: [f32; 2],
        samples: f32,
        direction: [f32; 2],
        opacity: f32,
    ) -> EngineResult<()> {
        let gpu = &services.gpu;
        gpu.bind_framebuffer(Some(target))?;
        gpu.bind_pipeline(pipeline)?;
        gpu.clear_framebuffer(target, [0.0, 0.0, 0.0, 0.0])?;
        gpu.bind_texture(source, pipeline, 0, "uTexture")?;
        gpu.set_uniform(
            pipeline,
            "uResolution",
            UniformValue::Vec2([target.width as f32, target.height as f32]),
        )?;
        gpu.set_uniform(pipeline, "uIntensity", UniformValue::Vec2(intensity))?;
        gpu.set_uniform(pipeline, "uDirection", UniformValue::Vec2(direction))?;
        gpu.set_uniform(pipeline, "uSamples", UniformValue::Float(samples))?;
        gpu.set_uniform(pipeline, "uOpacity", UniformValue::Float(opacity))?;
        gpu.draw_arrays(3)?;
        Ok(())
    }

    fn draw(
        services: &RenderServices,
        scratch: &mut NodeScratch,
        precision: TexturePrecision,
        base: &Framebuffer,
        intensity: [f32; 2],
        samples: f32,
        opacity: f32,
    ) -> EngineResult<Framebuffer> {
        let pipeline = services.pipelines.get_or_compile(
            "box_blur/shader",
            FULLSCREEN_VERTEX,
            BOX_BLUR_FRAGMENT,
        )?;
        // Blur radius in texels scales with the layer size.
        let intensity = [
            intensity[0] * 0.1 * base.width as f32,
            intensity[1] * 0.1 * base.height as f32,
        ];

        let horizontal = scratch.managed.get_without_blitting(
            &services.gpu,
            base.width,
            base.height,
            precision,
        )?;
        let Some(source) = base.color_attachment() else {
            return Err(EngineError::Render("blur base has no color attachment".into()));
        };
        Self::blur_pass(
            services,
            &pipeline,
            &horizontal,
            source,
            intensity,
            samples,
            [1.0, 0.0],
            1.0,
        )?;

        let Some(intermediate) = horizontal.color_attachment().cloned() else {
            return Err(EngineError::Render("blur scratch has no color attachment".into()));
        };
        let Some(vertical) = scratch.managed.ping_pong(&services.gpu)? else {
            return Err(EngineError::Render("blur scratch was never allocated".into()));
        };
        Self::blur_pass(
            services,
            &pipeline,
            &vertical,
            &intermediate,
            intensity,
            samples,
            [0.0, 1.0],
            opacity,
        )?;
        Ok(vertical)
    }
}

impl NodeBehavior for BoxBlur {
    fn execute(&self, node: &Node, ctx: &mut EvalContext<'_>, accumulated: &PinMap) -> PinMap {
        let mut outputs = PinMap::new();
        let services = ctx.services;
        let precision = ctx.project.color_precision;

        let base = engine::attribute::<Framebuffer>(ctx, node, "Base", accumulated);
        let intensity = engine::attribute::<[f32; 2]>(ctx, node, "Intensity", accumulated);
        let samples = engine::attribute::<i32>(ctx, node, "Samples", accumulated);
        let opacity = engine::attribute::<f32>(ctx, node, "Opacity", accumulated);
        let (Some(base), Some(intensity), Some(samples), Some(opacity)) =
            (base, intensity, samples, opacity)
        else {
            return outputs;
        };
        if base.is_null() || base.attachments.is_empty() {
            return outputs;
        }

        let result = Self::draw(
            services,
            ctx.scratch.entry(node.node_id),
            precision,
            &base,
            intensity,
            samples as f32,
            opacity,
        );
        match result {
            Ok(framebuffer) => {
                try_append(&mut outputs, node, "Output", DynValue::Framebuffer(framebuffer));
            }
            Err(error) => ctx.record_fatal(error),
        }
        outputs
    }
}

/// Composites layer B over layer A off to the side of the main composite,
/// honoring an opacity and an optional blending mode for B.
struct Merge;

impl NodeBehavior for Merge {
    fn execute(&self, node: &Node, ctx: &mut EvalContext<'_>, accumulated: &PinMap) -> PinMap {
        let mut outputs = PinMap::new();
        let services = ctx.services;
        let (width, height) = ctx.required_resolution();
        let precision = ctx.project.color_precision;

        let a = engine::attribute::<Framebuffer>(ctx, node, "A", accumulated);
        let b = engine::attribute::<Framebuffer>(ctx, node, "B", accumulated);
        let opacity = engine::attribute::<f32>(ctx, node, "Opacity", accumulated);
        let blend_mode = engine::attribute::<String>(ctx, node, "BlendingMode", accumulated);
        let (Some(a), Some(b), Some(opacity), Some(blend_mode)) = (a, b, opacity, blend_mode)
        else {
            return outputs;
        };
        // Both layers must carry color and UV for the compositor.
        if a.attachments.len() < 2 || b.attachments.len() < 2 {
            return outputs;
        }

        let targets = [
            CompositorTarget {
                color_attachment: a.attachments[0].clone(),
                uv_attachment: a.attachments[1].clone(),
                opacity: 1.0,
                blend_mode: String::new(),
                composition_id: -1,
                masks: Vec::new(),
            },
            CompositorTarget {
                color_attachment: b.attachments[0].clone(),
                uv_attachment: b.attachments[1].clone(),
                opacity,
                blend_mode,
                composition_id: -1,
                masks: Vec::new(),
            },
        ];

        let scratch = ctx.scratch.entry(node.node_id);
        let result = scratch
            .managed
            .get_without_blitting(&services.gpu, width, height, precision)
            .and_then(|framebuffer| {
                services
                    .compositor
                    .perform_manual_composition(&targets, &framebuffer, [0.0, 0.0, 0.0, 0.0])?;
                Ok(framebuffer)
            });
        match result {
            Ok(framebuffer) => {
                try_append(&mut outputs, node, "Output", DynValue::Framebuffer(framebuffer));
            }
            Err(error) => ctx.record_fatal(error),
        }
        outputs
    }
}

/// Hands the composition's rendered layer to the compositor: records the
/// renderable bundle and appends a compositor target carrying the
/// composition's opacity, blend mode and masks.
struct ExportRenderable;

impl NodeBehavior for ExportRenderable {
    fn execute(&self, node: &Node, ctx: &mut EvalContext<'_>, accumulated: &PinMap) -> PinMap {
        let outputs = PinMap::new();
        let services = ctx.services;

        let renderable = engine::attribute::<Framebuffer>(ctx, node, "Renderable", accumulated);
        let Some(renderable) = renderable else {
            return outputs;
        };
        if renderable.is_null() || renderable.attachments.is_empty() {
            return outputs;
        }
        let Some(composition) = ctx.project.composition_of_node(node.node_id) else {
            return outputs;
        };

        let target = CompositorTarget {
            color_attachment: renderable.attachments[0].clone(),
            uv_attachment: renderable.attachments.get(1).cloned().unwrap_or_default(),
            opacity: composition.opacity_at(ctx.local_frame(composition)),
            blend_mode: composition.blend_mode.clone(),
            composition_id: composition.id,
            masks: composition.masks.clone(),
        };
        services
            .compositor
            .record_bundle(composition.id, RenderableBundle::new(renderable));
        services.compositor.append_target(target);
        outputs
    }
}

pub(super) fn register(registry: &mut NodeRegistry) {
    registry.register(
        NodeDescriptor::new("rendering.draw_layer", "Draw Layer", NodeCategory::Rendering)
            .with_inputs(vec!["Base", "Color", "Texture"])
            .with_outputs(vec!["Output"])
            .with_defaults(vec![
                ("Base", DynValue::Framebuffer(Framebuffer::default())),
                ("Color", DynValue::Vec4([1.0, 1.0, 1.0, 1.0])),
                ("Texture", DynValue::Texture(Texture::default())),
            ])
            .rendering(),
        DrawLayer,
    );
    registry.register(
        NodeDescriptor::new("rendering.box_blur", "Box Blur", NodeCategory::Rendering)
            .with_inputs(vec!["Base"])
            .with_outputs(vec!["Output"])
            .with_defaults(vec![
                ("Base", DynValue::Framebuffer(Framebuffer::default())),
                ("Intensity", DynValue::Vec2([0.5, 0.5])),
                ("Opacity", DynValue::Float(1.0)),
                ("Samples", DynValue::Int(50)),
            ])
            .rendering(),
        BoxBlur,
    );
    registry.register(
        NodeDescriptor::new("rendering.merge", "Merge", NodeCategory::Rendering)
            .with_inputs(vec!["A", "B", "Opacity"])
            .with_outputs(vec!["Output"])
            .with_defaults(vec![
                ("A", DynValue::Framebuffer(Framebuffer::default())),
                ("B", DynValue::Framebuffer(Framebuffer::default())),
                ("Opacity", DynValue::Float(1.0)),
                ("BlendingMode", DynValue::String(String::new())),
            ])
            .rendering(),
        Merge,
    );
    registry.register(
        NodeDescriptor::new(
            "rendering.export_renderable",
            "Export Renderable",
            NodeCategory::Rendering,
        )
        .with_inputs(vec!["Renderable"])
        .with_defaults(vec![(
            "Renderable",
            DynValue::Framebuffer(Framebuffer::default()),
        )])
        .with_flow_pins()
        .rendering(),
        ExportRenderable,
    );
}
