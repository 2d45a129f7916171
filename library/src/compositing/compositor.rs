use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;

use crate::buffering::framebuffer::DoubleBufferedFramebuffer;
use crate::buffering::index::SharedBufferingIndex;
use crate::buffering::managed::ManagedFramebuffer;
use crate::buffering::value::DoubleBuffered;
use crate::compositing::blending::Blending;
use crate::compositing::shaders::{COMPOSITOR_FRAGMENT, FULLSCREEN_VERTEX, MASK_COMBINE_FRAGMENT};
use crate::compositing::target::{CompositorTarget, RenderableBundle};
use crate::error::{EngineError, EngineResult};
use crate::gpu::backend::SharedGpu;
use crate::gpu::pipelines::PipelineCache;
use crate::gpu::types::{Framebuffer, Texture, UniformValue};
use crate::model::mask::MaskOperation;
use crate::model::project::Project;

/// Owns the primary framebuffer pair and assembles every exported layer
/// into the final picture once per frame.
///
/// Nodes append [`CompositorTarget`]s and record [`RenderableBundle`]s while
/// a pass runs; `perform_composition` then walks the target list in
/// submission order. The primary pair swaps after each composition so
/// readers always see a finished frame.
pub struct Compositor {
    gpu: SharedGpu,
    pipelines: Arc<PipelineCache>,
    blending: Blending,
    primary: Mutex<Option<DoubleBufferedFramebuffer>>,
    preview_scale: Mutex<f32>,
    targets: Mutex<Vec<CompositorTarget>>,
    bundles: DoubleBuffered<HashMap<i32, RenderableBundle>>,
    mask_scratch: Mutex<ManagedFramebuffer>,
}

impl Compositor {
    pub fn new(gpu: SharedGpu, pipelines: Arc<PipelineCache>, index: SharedBufferingIndex) -> Self {
        Self::with_blending(gpu, pipelines, index, Blending::with_default_modes())
    }

    pub fn with_blending(
        gpu: SharedGpu,
        pipelines: Arc<PipelineCache>,
        index: SharedBufferingIndex,
        blending: Blending,
    ) -> Self {
        Self {
            gpu,
            pipelines,
            blending,
            primary: Mutex::new(None),
            preview_scale: Mutex::new(1.0),
            targets: Mutex::new(Vec::new()),
            bundles: DoubleBuffered::new(index, HashMap::new()),
            mask_scratch: Mutex::new(ManagedFramebuffer::new()),
        }
    }

    pub fn blending(&self) -> &Blending {
        &self.blending
    }

    pub fn preview_scale(&self) -> f32 {
        *self.preview_scale.lock().unwrap()
    }

    /// Scales the working resolution for cheaper previews. Takes effect at
    /// the next `ensure_resolution_constraints`.
    pub fn set_preview_scale(&self, scale: f32) {
        *self.preview_scale.lock().unwrap() = scale;
    }

    /// Output resolution: the project's preferred resolution scaled by the
    /// preview factor, floored.
    pub fn required_resolution(&self, project: &Project) -> (u32, u32) {
        let scale = self.preview_scale();
        let (width, height) = project.preferred_resolution;
        (
            (width as f32 * scale).floor() as u32,
            (height as f32 * scale).floor() as u32,
        )
    }

    /// Reallocates the primary pair when the required resolution or the
    /// project's color precision changed, and resets the target list for
    /// the upcoming pass.
    pub fn ensure_resolution_constraints(&self, project: &Project) -> EngineResult<()> {
        let (width, height) = self.required_resolution(project);
        let precision = project.color_precision;

        let mut primary = self.primary.lock().unwrap();
        let stale = match primary.as_ref() {
            None => true,
            Some(pair) => !pair.matches(width, height, precision),
        };
        if stale {
            if let Some(previous) = primary.take() {
                debug!(
                    "primary framebuffer {}x{} -> {}x{}",
                    previous.width, previous.height, width, height
                );
                previous.destroy(&self.gpu)?;
            }
            *primary = Some(DoubleBufferedFramebuffer::new(&self.gpu, width, height, precision)?);
        }

        self.targets.lock().unwrap().clear();
        Ok(())
    }

    /// Queues a finished layer for this frame's composite.
    pub fn append_target(&self, target: CompositorTarget) {
        self.targets.lock().unwrap().push(target);
    }

    pub fn target_count(&self) -> usize {
        self.targets.lock().unwrap().len()
    }

    /// Publishes a composition's renderable for this frame; masks and other
    /// cross-composition consumers look it up by composition id.
    pub fn record_bundle(&self, composition_id: i32, bundle: RenderableBundle) {
        self.bundles.current().insert(composition_id, bundle);
    }

    /// Drops the bundles being written this frame; called at pass start so
    /// stale renderables never leak into the new frame.
    pub fn clear_bundles(&self) {
        self.bundles.current().clear();
    }

    /// Bundles of the last completed frame.
    pub fn front_bundles(&self) -> HashMap<i32, RenderableBundle> {
        self.bundles.front().clone()
    }

    /// Forgets every queued target and published bundle, both phases.
    /// Called when the project is replaced so readers never see renderables
    /// whose framebuffers were torn down with the old node state.
    pub fn reset(&self) {
        self.targets.lock().unwrap().clear();
        self.bundles.set_both(HashMap::new());
    }

    /// Composites every queued target (optionally restricted to the given
    /// composition ids) into the primary framebuffer and swaps the pair.
    pub fn perform_composition(
        &self,
        project: &Project,
        allowed_composition_ids: Option<&[i32]>,
    ) -> EngineResult<()> {
        let mut primary = self.primary.lock().unwrap();
        let Some(primary) = primary.as_mut() else {
            return Ok(());
        };

        let targets: Vec<CompositorTarget> = {
            let targets = self.targets.lock().unwrap();
            match allowed_composition_ids {
                None => targets.clone(),
                Some(ids) => targets
                    .iter()
                    .filter(|target| ids.contains(&target.composition_id))
                    .cloned()
                    .collect(),
            }
        };

        self.perform_manual_composition(&targets, primary.get(), project.background_color)?;
        primary.swap();
        Ok(())
    }

    /// Composites an explicit target list into an arbitrary framebuffer.
    /// Shared by the per-frame composite and by nodes that merge layers
    /// off to the side.
    pub fn perform_manual_composition(
        &self,
        targets: &[CompositorTarget],
        framebuffer: &Framebuffer,
        background: [f32; 4],
    ) -> EngineResult<()> {
        let pipeline =
            self.pipelines
                .get_or_compile("compositor/shader", FULLSCREEN_VERTEX, COMPOSITOR_FRAGMENT)?;
        self.gpu.bind_framebuffer(Some(framebuffer))?;
        self.gpu.bind_pipeline(&pipeline)?;
        self.gpu.clear_framebuffer(framebuffer, background)?;

        for target in targets {
            // Mask resolution and blending run their own passes, so the
            // primary bindings are re-established before the layer draw.
            let mask = self.resolve_mask(target)?;

            let (color, opacity) = match self.blending.mode_by_codename(&target.blend_mode) {
                Some(mode) => {
                    let Some(base) = framebuffer.color_attachment() else {
                        continue;
                    };
                    let blended = self.blending.perform_blending(
                        &self.gpu,
                        &self.pipelines,
                        mode,
                        base,
                        &target.color_attachment,
                        target.opacity,
                    )?;
                    let Some(color) = blended.color_attachment().cloned() else {
                        continue;
                    };
                    (color, 1.0)
                }
                None => (target.color_attachment.clone(), target.opacity),
            };
            if color.is_null() {
                continue;
            }

            self.gpu.bind_framebuffer(Some(framebuffer))?;
            self.gpu.bind_pipeline(&pipeline)?;
            self.gpu.bind_texture(&color, &pipeline, 0, "uColor")?;
            let has_uv = !target.uv_attachment.is_null();
            if has_uv {
                self.gpu
                    .bind_texture(&target.uv_attachment, &pipeline, 1, "uUV")?;
            }
            if let Some(mask) = &mask {
                self.gpu.bind_texture(mask, &pipeline, 2, "uMask")?;
            }
            self.gpu.set_uniform(
                &pipeline,
                "uResolution",
                UniformValue::Vec2([framebuffer.width as f32, framebuffer.height as f32]),
            )?;
            self.gpu
                .set_uniform(&pipeline, "uOpacity", UniformValue::Float(opacity))?;
            self.gpu
                .set_uniform(&pipeline, "uHasUV", UniformValue::Int(has_uv as i32))?;
            self.gpu.set_uniform(
                &pipeline,
                "uMaskAvailable",
                UniformValue::Int(mask.is_some() as i32),
            )?;
            self.gpu.draw_arrays(3)?;
        }
        Ok(())
    }

    /// Composite of the last completed frame.
    pub fn front_framebuffer(&self) -> Option<Framebuffer> {
        self.primary
            .lock()
            .unwrap()
            .as_ref()
            .map(|pair| pair.front_without_swapping().clone())
    }

    pub fn destroy(&self) -> EngineResult<()> {
        if let Some(primary) = self.primary.lock().unwrap().take() {
            primary.destroy(&self.gpu)?;
        }
        self.mask_scratch.lock().unwrap().destroy(&self.gpu)?;
        self.blending.destroy(&self.gpu)?;
        Ok(())
    }

    /// Folds a target's mask list into a single texture. The first
    /// resolvable mask (and any later one with the normal operation)
    /// replaces the accumulator; the rest combine through the mask pass.
    /// Masks whose composition exported nothing this frame are skipped.
    fn resolve_mask(&self, target: &CompositorTarget) -> EngineResult<Option<Texture>> {
        if target.masks.is_empty() {
            return Ok(None);
        }

        let sources: Vec<(Texture, MaskOperation)> = {
            let bundles = self.bundles.current();
            target
                .masks
                .iter()
                .filter_map(|mask| {
                    let bundle = bundles.get(&mask.composition_id)?;
                    if bundle.primary_framebuffer.is_null() {
                        return None;
                    }
                    let texture = bundle.primary_framebuffer.color_attachment()?.clone();
                    Some((texture, mask.operation))
                })
                .collect()
        };

        let mut accumulated: Option<Texture> = None;
        for (texture, operation) in sources {
            accumulated = match accumulated {
                None => Some(texture),
                Some(_) if operation == MaskOperation::Normal => Some(texture),
                Some(previous) => Some(self.combine_masks(&previous, &texture, operation)?),
            };
        }
        Ok(accumulated)
    }

    fn combine_masks(
        &self,
        a: &Texture,
        b: &Texture,
        operation: MaskOperation,
    ) -> EngineResult<Texture> {
        let framebuffer = self.mask_scratch.lock().unwrap().get_without_blitting(
            &self.gpu,
            a.width,
            a.height,
            a.precision,
        )?;
        let pipeline = self.pipelines.get_or_compile(
            "compositor/mask_combine",
            FULLSCREEN_VERTEX,
            MASK_COMBINE_FRAGMENT,
        )?;
        self.gpu.bind_framebuffer(Some(&framebuffer))?;
        self.gpu.bind_pipeline(&pipeline)?;
        self.gpu.clear_framebuffer(&framebuffer, [0.0, 0.0, 0.0, 0.0])?;
        self.gpu
            .set_uniform(&pipeline, "uMaskOperation", UniformValue::Int(operation.index()))?;
        self.gpu.bind_texture(a, &pipeline, 0, "uA")?;
        self.gpu.bind_texture(b, &pipeline, 1, "uB")?;
        self.gpu.draw_arrays(3)?;

        framebuffer
            .color_attachment()
            .cloned()
            .ok_or_else(|| EngineError::Render("mask scratch has no color attachment".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::buffering::index::BufferingIndex;
    use crate::gpu::headless::HeadlessGpu;
    use crate::gpu::types::TexturePrecision;

    fn setup_compositor() -> (Arc<HeadlessGpu>, Arc<Compositor>) {
        let gpu = Arc::new(HeadlessGpu::new());
        let shared: SharedGpu = gpu.clone();
        let pipelines = Arc::new(PipelineCache::new(shared.clone()));
        let compositor = Arc::new(Compositor::new(
            shared,
            pipelines,
            BufferingIndex::shared(),
        ));
        (gpu, compositor)
    }

    #[test]
    fn test_required_resolution_follows_preview_scale() {
        let (_gpu, compositor) = setup_compositor();
        let mut project = Project::new("scaling");
        project.preferred_resolution = (1919, 1080);

        assert_eq!(compositor.required_resolution(&project), (1919, 1080));
        compositor.set_preview_scale(0.5);
        assert_eq!(compositor.required_resolution(&project), (959, 540));
    }

    #[test]
    fn test_constraints_allocate_once_and_clear_targets() {
        let (gpu, compositor) = setup_compositor();
        let mut project = Project::new("constraints");
        project.preferred_resolution = (64, 32);

        assert!(compositor.front_framebuffer().is_none());
        compositor.ensure_resolution_constraints(&project).unwrap();
        let first = compositor.front_framebuffer().unwrap();

        compositor.append_target(CompositorTarget::new(Texture::default(), 1));
        compositor.ensure_resolution_constraints(&project).unwrap();
        let second = compositor.front_framebuffer().unwrap();

        assert_eq!(first.handle, second.handle);
        assert_eq!(compositor.target_count(), 0);
        // Two slots of two attachments each.
        assert_eq!(gpu.live_framebuffer_count(), 2);
        assert_eq!(gpu.live_texture_count(), 4);
    }

    #[test]
    fn test_precision_change_reallocates_primary() {
        let (_gpu, compositor) = setup_compositor();
        let mut project = Project::new("precision");
        project.preferred_resolution = (16, 16);

        compositor.ensure_resolution_constraints(&project).unwrap();
        let usual = compositor.front_framebuffer().unwrap();

        project.color_precision = TexturePrecision::Full;
        compositor.ensure_resolution_constraints(&project).unwrap();
        let full = compositor.front_framebuffer().unwrap();

        assert_ne!(usual.handle, full.handle);
        assert_eq!(full.attachments[0].precision, TexturePrecision::Full);
    }

    #[test]
    fn test_bundles_flip_with_the_global_index() {
        let gpu = Arc::new(HeadlessGpu::new());
        let shared: SharedGpu = gpu.clone();
        let pipelines = Arc::new(PipelineCache::new(shared.clone()));
        let index = BufferingIndex::shared();
        let compositor = Compositor::new(shared, pipelines, index.clone());

        compositor.record_bundle(7, RenderableBundle::default());
        assert!(compositor.front_bundles().is_empty());

        index.flip();
        assert!(compositor.front_bundles().contains_key(&7));
    }
}
