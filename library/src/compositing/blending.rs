use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::compositing::shaders::{BLENDING_FRAGMENT_TEMPLATE, BLENDING_PLACEHOLDER, FULLSCREEN_VERTEX};
use crate::error::{EngineError, EngineResult};
use crate::gpu::backend::SharedGpu;
use crate::gpu::pipelines::PipelineCache;
use crate::gpu::types::{Framebuffer, Texture, UniformValue};

/// One entry of the blend-mode table. `formula` is a GLSL expression over
/// `base` and `blend` (both `vec4`) that yields the blended color.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlendingMode {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "CodeName")]
    pub codename: String,
    #[serde(rename = "Formula")]
    pub formula: String,
}

impl BlendingMode {
    pub fn new(
        name: impl Into<String>,
        codename: impl Into<String>,
        formula: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            codename: codename.into(),
            formula: formula.into(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct BlendingModesDocument {
    #[serde(rename = "BlendingModes")]
    blending_modes: Vec<BlendingMode>,
}

/// Blend-mode table plus the scratch framebuffer the blend pass renders
/// into. The fragment program is generated from the table: one
/// `if (uBlendMode == N)` branch per mode, so mode selection costs a single
/// uniform.
pub struct Blending {
    modes: Vec<BlendingMode>,
    scratch: Mutex<Option<Framebuffer>>,
}

impl Blending {
    pub fn new(modes: Vec<BlendingMode>) -> Self {
        Self {
            modes,
            scratch: Mutex::new(None),
        }
    }

    /// The built-in table: add, multiply, screen and overlay.
    pub fn with_default_modes() -> Self {
        Self::new(vec![
            BlendingMode::new(
                "Add",
                "add",
                "vec4(min(base.rgb + blend.rgb, vec3(1.0)), max(base.a, blend.a))",
            ),
            BlendingMode::new(
                "Multiply",
                "multiply",
                "vec4(base.rgb * blend.rgb, max(base.a, blend.a))",
            ),
            BlendingMode::new(
                "Screen",
                "screen",
                "vec4(vec3(1.0) - (vec3(1.0) - base.rgb) * (vec3(1.0) - blend.rgb), max(base.a, blend.a))",
            ),
            BlendingMode::new(
                "Overlay",
                "overlay",
                "vec4(mix(2.0 * base.rgb * blend.rgb, vec3(1.0) - 2.0 * (vec3(1.0) - base.rgb) * (vec3(1.0) - blend.rgb), step(vec3(0.5), base.rgb)), max(base.a, blend.a))",
            ),
        ])
    }

    /// Loads a mode table from a `{"BlendingModes": [...]}` document.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let document: BlendingModesDocument = serde_json::from_str(json)?;
        Ok(Self::new(document.blending_modes))
    }

    pub fn to_json(&self) -> EngineResult<String> {
        let document = BlendingModesDocument {
            blending_modes: self.modes.clone(),
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    pub fn modes(&self) -> &[BlendingMode] {
        &self.modes
    }

    pub fn mode_by_codename(&self, codename: &str) -> Option<&BlendingMode> {
        self.modes.iter().find(|mode| mode.codename == codename)
    }

    pub fn mode_index_by_codename(&self, codename: &str) -> Option<i32> {
        self.modes
            .iter()
            .position(|mode| mode.codename == codename)
            .map(|index| index as i32)
    }

    /// Fragment program with the generated per-mode dispatch substituted in.
    pub fn fragment_source(&self) -> String {
        let mut generated = String::new();
        for (index, mode) in self.modes.iter().enumerate() {
            generated.push_str(&format!(
                "    if (uBlendMode == {}) return ({});\n",
                index, mode.formula
            ));
        }
        BLENDING_FRAGMENT_TEMPLATE.replace(BLENDING_PLACEHOLDER, &generated)
    }

    /// Renders `blend` over `base` with the given mode into the scratch
    /// framebuffer and returns it. The scratch buffer follows `base`'s
    /// dimensions and precision.
    pub fn perform_blending(
        &self,
        gpu: &SharedGpu,
        pipelines: &PipelineCache,
        mode: &BlendingMode,
        base: &Texture,
        blend: &Texture,
        opacity: f32,
    ) -> EngineResult<Framebuffer> {
        let mode_index = self.mode_index_by_codename(&mode.codename).ok_or_else(|| {
            EngineError::Render(format!("unregistered blending mode '{}'", mode.codename))
        })?;
        let framebuffer = self.ensure_scratch(gpu, base)?;

        let pipeline =
            pipelines.get_or_compile("compositor/blending", FULLSCREEN_VERTEX, &self.fragment_source())?;
        gpu.bind_framebuffer(Some(&framebuffer))?;
        gpu.bind_pipeline(&pipeline)?;
        gpu.clear_framebuffer(&framebuffer, [0.0, 0.0, 0.0, 0.0])?;
        gpu.set_uniform(
            &pipeline,
            "uResolution",
            UniformValue::Vec2([base.width as f32, base.height as f32]),
        )?;
        gpu.set_uniform(&pipeline, "uBlendMode", UniformValue::Int(mode_index))?;
        gpu.set_uniform(&pipeline, "uOpacity", UniformValue::Float(opacity))?;
        gpu.bind_texture(base, &pipeline, 0, "uBase")?;
        gpu.bind_texture(blend, &pipeline, 1, "uBlend")?;
        gpu.draw_arrays(3)?;

        Ok(framebuffer)
    }

    pub fn destroy(&self, gpu: &SharedGpu) -> EngineResult<()> {
        if let Some(scratch) = self.scratch.lock().unwrap().take() {
            gpu.destroy_framebuffer_with_attachments(&scratch)?;
        }
        Ok(())
    }

    /// Scratch framebuffer matching the base texture's shape, reallocated
    /// when the shape changes.
    fn ensure_scratch(&self, gpu: &SharedGpu, base: &Texture) -> EngineResult<Framebuffer> {
        let mut scratch = self.scratch.lock().unwrap();
        let stale = match scratch.as_ref() {
            None => true,
            Some(framebuffer) => {
                framebuffer.width != base.width
                    || framebuffer.height != base.height
                    || framebuffer
                        .color_attachment()
                        .map(|texture| texture.precision != base.precision)
                        .unwrap_or(true)
            }
        };
        if stale {
            if let Some(previous) = scratch.take() {
                gpu.destroy_framebuffer_with_attachments(&previous)?;
            }
            let color = gpu.generate_texture(base.width, base.height, base.precision, false)?;
            *scratch = Some(gpu.generate_framebuffer(base.width, base.height, vec![color])?);
        }
        Ok(scratch.clone().unwrap())
    }
}

impl Default for Blending {
    fn default() -> Self {
        Self::with_default_modes()
    }
}
