use std::sync::Arc;

use montage::buffering::framebuffer::generate_compatible_framebuffer;
use montage::buffering::index::BufferingIndex;
use montage::compositing::compositor::Compositor;
use montage::compositing::target::{CompositorTarget, RenderableBundle};
use montage::gpu::backend::SharedGpu;
use montage::gpu::headless::{GpuEvent, HeadlessGpu};
use montage::gpu::pipelines::PipelineCache;
use montage::gpu::types::{Texture, TexturePrecision, UniformValue};
use montage::model::mask::{CompositionMask, MaskOperation};
use montage::model::project::Project;

fn setup_compositor() -> (Arc<HeadlessGpu>, SharedGpu, Compositor) {
    let gpu = Arc::new(HeadlessGpu::new());
    let shared: SharedGpu = gpu.clone();
    let pipelines = Arc::new(PipelineCache::new(shared.clone()));
    let compositor = Compositor::new(shared.clone(), pipelines, BufferingIndex::shared());
    (gpu, shared, compositor)
}

fn setup_project() -> Project {
    let mut project = Project::new("composite");
    project.preferred_resolution = (64, 32);
    project
}

fn layer_texture(gpu: &SharedGpu) -> Texture {
    gpu.generate_texture(64, 32, TexturePrecision::Usual, false)
        .unwrap()
}

fn target(texture: &Texture, composition_id: i32, opacity: f32) -> CompositorTarget {
    let mut target = CompositorTarget::new(texture.clone(), composition_id);
    target.opacity = opacity;
    target
}

fn draws_on(gpu: &HeadlessGpu, handle: u32) -> Vec<GpuEvent> {
    gpu.events_for_framebuffer(handle)
        .into_iter()
        .filter(|event| matches!(event, GpuEvent::Draw { .. }))
        .collect()
}

#[test]
fn test_targets_composite_in_submission_order() {
    let (gpu, shared, compositor) = setup_compositor();
    let project = setup_project();
    compositor.ensure_resolution_constraints(&project).unwrap();

    let bottom = layer_texture(&shared);
    let middle = layer_texture(&shared);
    let top = layer_texture(&shared);
    compositor.append_target(target(&bottom, 1, 0.4));
    compositor.append_target(target(&middle, 2, 0.6));
    compositor.append_target(target(&top, 3, 0.8));
    compositor.perform_composition(&project, None).unwrap();

    let front = compositor.front_framebuffer().unwrap();
    let clears: Vec<[f32; 4]> = gpu
        .events_for_framebuffer(front.handle)
        .into_iter()
        .filter_map(|event| match event {
            GpuEvent::Clear { color, .. } => Some(color),
            _ => None,
        })
        .collect();
    assert_eq!(clears.last(), Some(&project.background_color));

    let draws = draws_on(&gpu, front.handle);
    assert_eq!(draws.len(), 3);
    let expected = [(bottom.handle, 0.4), (middle.handle, 0.6), (top.handle, 0.8)];
    for (draw, (handle, opacity)) in draws.iter().zip(expected) {
        let GpuEvent::Draw { textures, uniforms, .. } = draw else {
            unreachable!();
        };
        assert_eq!(textures[0], ("uColor".to_string(), handle));
        assert_eq!(uniforms.get("uOpacity"), Some(&UniformValue::Float(opacity)));
        assert_eq!(uniforms.get("uHasUV"), Some(&UniformValue::Int(0)));
        assert_eq!(uniforms.get("uMaskAvailable"), Some(&UniformValue::Int(0)));
        assert_eq!(
            uniforms.get("uResolution"),
            Some(&UniformValue::Vec2([64.0, 32.0]))
        );
    }
}

#[test]
fn test_composition_filter_keeps_submission_order() {
    let (gpu, shared, compositor) = setup_compositor();
    let project = setup_project();
    compositor.ensure_resolution_constraints(&project).unwrap();

    let first = layer_texture(&shared);
    let second = layer_texture(&shared);
    let third = layer_texture(&shared);
    compositor.append_target(target(&first, 1, 1.0));
    compositor.append_target(target(&second, 2, 1.0));
    compositor.append_target(target(&third, 3, 1.0));
    compositor
        .perform_composition(&project, Some(&[3, 1][..]))
        .unwrap();

    let front = compositor.front_framebuffer().unwrap();
    let draws = draws_on(&gpu, front.handle);
    assert_eq!(draws.len(), 2);
    let handles: Vec<u32> = draws
        .iter()
        .map(|draw| {
            let GpuEvent::Draw { textures, .. } = draw else {
                unreachable!();
            };
            textures[0].1
        })
        .collect();
    assert_eq!(handles, vec![first.handle, third.handle]);
}

#[test]
fn test_null_layers_are_skipped() {
    let (gpu, shared, compositor) = setup_compositor();
    let project = setup_project();
    compositor.ensure_resolution_constraints(&project).unwrap();

    let visible = layer_texture(&shared);
    compositor.append_target(CompositorTarget::new(Texture::default(), 1));
    compositor.append_target(target(&visible, 2, 1.0));
    compositor.perform_composition(&project, None).unwrap();

    let front = compositor.front_framebuffer().unwrap();
    let draws = draws_on(&gpu, front.handle);
    assert_eq!(draws.len(), 1);
    let GpuEvent::Draw { textures, .. } = &draws[0] else {
        unreachable!();
    };
    assert_eq!(textures[0].1, visible.handle);
}

#[test]
fn test_blended_target_runs_a_blend_pass_first() {
    let (gpu, shared, compositor) = setup_compositor();
    let project = setup_project();
    compositor.ensure_resolution_constraints(&project).unwrap();

    let layer = layer_texture(&shared);
    let mut blended = target(&layer, 1, 0.5);
    blended.blend_mode = "add".to_string();
    compositor.append_target(blended);
    compositor.perform_composition(&project, None).unwrap();

    let front = compositor.front_framebuffer().unwrap();
    let blend_draws: Vec<GpuEvent> = gpu
        .events()
        .into_iter()
        .filter(|event| {
            matches!(event, GpuEvent::Draw { uniforms, .. } if uniforms.contains_key("uBlendMode"))
        })
        .collect();
    assert_eq!(blend_draws.len(), 1);
    let GpuEvent::Draw { textures, uniforms, .. } = &blend_draws[0] else {
        unreachable!();
    };
    assert_eq!(textures[0], ("uBase".to_string(), front.attachments[0].handle));
    assert_eq!(textures[1], ("uBlend".to_string(), layer.handle));
    assert_eq!(uniforms.get("uBlendMode"), Some(&UniformValue::Int(0)));
    assert_eq!(uniforms.get("uOpacity"), Some(&UniformValue::Float(0.5)));

    // The composite then draws the blend result, opacity already applied.
    let draws = draws_on(&gpu, front.handle);
    assert_eq!(draws.len(), 1);
    let GpuEvent::Draw { textures, uniforms, .. } = &draws[0] else {
        unreachable!();
    };
    assert_ne!(textures[0].1, layer.handle);
    assert_eq!(uniforms.get("uOpacity"), Some(&UniformValue::Float(1.0)));
}

#[test]
fn test_unknown_blend_codename_falls_back_to_alpha_over() {
    let (gpu, shared, compositor) = setup_compositor();
    let project = setup_project();
    compositor.ensure_resolution_constraints(&project).unwrap();

    let layer = layer_texture(&shared);
    let mut blended = target(&layer, 1, 0.5);
    blended.blend_mode = "difference".to_string();
    compositor.append_target(blended);
    compositor.perform_composition(&project, None).unwrap();

    assert!(!gpu.events().iter().any(|event| {
        matches!(event, GpuEvent::Draw { uniforms, .. } if uniforms.contains_key("uBlendMode"))
    }));
    let front = compositor.front_framebuffer().unwrap();
    let draws = draws_on(&gpu, front.handle);
    assert_eq!(draws.len(), 1);
    let GpuEvent::Draw { textures, uniforms, .. } = &draws[0] else {
        unreachable!();
    };
    assert_eq!(textures[0].1, layer.handle);
    assert_eq!(uniforms.get("uOpacity"), Some(&UniformValue::Float(0.5)));
}

#[test]
fn test_masked_target_binds_the_mask_bundle() {
    let (gpu, shared, compositor) = setup_compositor();
    let project = setup_project();
    compositor.ensure_resolution_constraints(&project).unwrap();

    let mask_layer =
        generate_compatible_framebuffer(&shared, 64, 32, TexturePrecision::Usual).unwrap();
    compositor.record_bundle(10, RenderableBundle::new(mask_layer.clone()));

    let plain = layer_texture(&shared);
    let masked = layer_texture(&shared);
    compositor.append_target(target(&plain, 1, 1.0));
    let mut gated = target(&masked, 2, 1.0);
    gated.masks.push(CompositionMask::new(10, MaskOperation::Normal));
    compositor.append_target(gated);
    compositor.perform_composition(&project, None).unwrap();

    let front = compositor.front_framebuffer().unwrap();
    let draws = draws_on(&gpu, front.handle);
    assert_eq!(draws.len(), 2);

    let GpuEvent::Draw { textures, uniforms, .. } = &draws[0] else {
        unreachable!();
    };
    assert!(!textures.iter().any(|(name, _)| name == "uMask"));
    assert_eq!(uniforms.get("uMaskAvailable"), Some(&UniformValue::Int(0)));

    let GpuEvent::Draw { textures, uniforms, .. } = &draws[1] else {
        unreachable!();
    };
    assert!(textures.contains(&("uMask".to_string(), mask_layer.attachments[0].handle)));
    assert_eq!(uniforms.get("uMaskAvailable"), Some(&UniformValue::Int(1)));
}

#[test]
fn test_mask_without_a_bundle_is_skipped() {
    let (gpu, shared, compositor) = setup_compositor();
    let project = setup_project();
    compositor.ensure_resolution_constraints(&project).unwrap();

    let layer = layer_texture(&shared);
    let mut gated = target(&layer, 1, 1.0);
    gated.masks.push(CompositionMask::new(99, MaskOperation::Normal));
    compositor.append_target(gated);
    compositor.perform_composition(&project, None).unwrap();

    let front = compositor.front_framebuffer().unwrap();
    let draws = draws_on(&gpu, front.handle);
    assert_eq!(draws.len(), 1);
    let GpuEvent::Draw { textures, uniforms, .. } = &draws[0] else {
        unreachable!();
    };
    assert!(!textures.iter().any(|(name, _)| name == "uMask"));
    assert_eq!(uniforms.get("uMaskAvailable"), Some(&UniformValue::Int(0)));
}

#[test]
fn test_mask_stack_combines_through_the_mask_pass() {
    let (gpu, shared, compositor) = setup_compositor();
    let project = setup_project();
    compositor.ensure_resolution_constraints(&project).unwrap();

    let first_mask =
        generate_compatible_framebuffer(&shared, 64, 32, TexturePrecision::Usual).unwrap();
    let second_mask =
        generate_compatible_framebuffer(&shared, 64, 32, TexturePrecision::Usual).unwrap();
    compositor.record_bundle(10, RenderableBundle::new(first_mask.clone()));
    compositor.record_bundle(11, RenderableBundle::new(second_mask.clone()));

    let layer = layer_texture(&shared);
    let mut gated = target(&layer, 1, 1.0);
    gated.masks.push(CompositionMask::new(10, MaskOperation::Normal));
    gated.masks.push(CompositionMask::new(11, MaskOperation::Multiply));
    compositor.append_target(gated);
    compositor.perform_composition(&project, None).unwrap();

    let combines: Vec<GpuEvent> = gpu
        .events()
        .into_iter()
        .filter(|event| {
            matches!(event, GpuEvent::Draw { uniforms, .. } if uniforms.contains_key("uMaskOperation"))
        })
        .collect();
    assert_eq!(combines.len(), 1);
    let GpuEvent::Draw { textures, uniforms, .. } = &combines[0] else {
        unreachable!();
    };
    assert_eq!(
        textures[0],
        ("uA".to_string(), first_mask.attachments[0].handle)
    );
    assert_eq!(
        textures[1],
        ("uB".to_string(), second_mask.attachments[0].handle)
    );
    assert_eq!(
        uniforms.get("uMaskOperation"),
        Some(&UniformValue::Int(MaskOperation::Multiply.index()))
    );

    // The layer draw samples the combined scratch, not either source mask.
    let front = compositor.front_framebuffer().unwrap();
    let draws = draws_on(&gpu, front.handle);
    assert_eq!(draws.len(), 1);
    let GpuEvent::Draw { textures, uniforms, .. } = &draws[0] else {
        unreachable!();
    };
    let mask_binding = textures
        .iter()
        .find(|(name, _)| name == "uMask")
        .map(|(_, handle)| *handle)
        .unwrap();
    assert_ne!(mask_binding, first_mask.attachments[0].handle);
    assert_ne!(mask_binding, second_mask.attachments[0].handle);
    assert_eq!(uniforms.get("uMaskAvailable"), Some(&UniformValue::Int(1)));
}
