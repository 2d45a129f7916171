//! Headless demo: builds a two-composition project programmatically, runs
//! the render server for a handful of frames and prints what came out.
//!
//! The background composition decodes an image (seeded straight into the
//! cache so the demo needs no files on disk), blurs it and exports it; it
//! also carries an audio gain stage so the audio pass has work to do. The
//! overlay composition drives a merge's opacity through a value/math chain
//! and fades in through a keyframed composition opacity, blended with "add".

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use montage::error::{EngineError, EngineResult};
use montage::gpu::backend::{GpuBackend, SharedGpu};
use montage::gpu::headless::HeadlessGpu;
use montage::gpu::types::{Framebuffer, TexturePrecision};
use montage::loader::image::ImageData;
use montage::model::attribute::Attribute;
use montage::model::composition::Composition;
use montage::model::node::Node;
use montage::model::pin::PinId;
use montage::model::value::DynValue;
use montage::nodes::registry::NodeRegistry;
use montage::rendering::render_server::{RenderConfig, RenderServer};
use montage::util::timeline::{format_frame_to_time, seconds_to_frames};

const IMAGE_PATH: &str = "memory://gradient.png";
const LENGTH_IN_FRAMES: f64 = 96.0;

fn node(registry: &NodeRegistry, type_name: &str) -> EngineResult<Node> {
    registry
        .instantiate(type_name)
        .ok_or_else(|| EngineError::Project(format!("unknown node type '{}'", type_name)))
}

fn gradient_image(width: u32, height: u32) -> ImageData {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let ramp = (x * 255 / width.max(1)) as u8;
            let lift = (y * 255 / height.max(1)) as u8;
            data.extend_from_slice(&[ramp, lift, 160, 255]);
        }
    }
    ImageData {
        width,
        height,
        precision: TexturePrecision::Usual,
        data,
    }
}

fn tone_samples(count: usize) -> Vec<f32> {
    (0..count)
        .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / 48_000.0).sin() * 0.8)
        .collect()
}

/// Image source, blurred and exported, plus an audio bed.
fn build_background(registry: &NodeRegistry) -> EngineResult<(Composition, PinId)> {
    let mut composition = Composition::new("Background", 0.0, LENGTH_IN_FRAMES);

    let reader = composition.add_node(node(registry, "resource.read_image")?);
    composition.set_node_attribute(reader, "Path", DynValue::String(IMAGE_PATH.to_string()));

    let layer = composition.add_node(node(registry, "rendering.draw_layer")?);
    let blur = composition.add_node(node(registry, "rendering.box_blur")?);
    composition.set_node_attribute(blur, "Intensity", DynValue::Vec2([0.3, 0.3]));
    composition.set_node_attribute(blur, "Samples", DynValue::Int(32));
    let export = composition.add_node(node(registry, "rendering.export_renderable")?);

    let tone = composition.add_node(node(registry, "audio.gain")?);
    composition.set_node_attribute(tone, "Samples", DynValue::AudioSamples(tone_samples(512)));
    composition.set_node_attribute(tone, "Gain", DynValue::Float(0.5));

    composition.connect(reader, "Texture", layer, "Texture");
    composition.connect(layer, "Output", blur, "Base");
    composition.connect(blur, "Output", export, "Renderable");

    let texture_pin = composition
        .node(reader)
        .and_then(|node| node.output_pin_id("Texture"))
        .ok_or_else(|| EngineError::Project("reader lost its Texture pin".to_string()))?;
    Ok((composition, texture_pin))
}

/// Two layers merged with an opacity pulled through a value/math chain,
/// fading in via a keyframed composition opacity.
fn build_overlay(registry: &NodeRegistry) -> EngineResult<(Composition, PinId)> {
    let mut composition = Composition::new("Overlay", 0.0, LENGTH_IN_FRAMES);
    composition.blend_mode = "add".to_string();

    let mut fade = Attribute::new("Opacity", DynValue::Float(0.0));
    fade.add_keyframe(LENGTH_IN_FRAMES, DynValue::Float(1.0));
    let fade_id = composition.add_attribute(fade);
    composition.opacity_attribute_id = Some(fade_id);

    let tint = composition.add_node(node(registry, "value.color")?);
    composition.set_node_attribute(tint, "Value", DynValue::Vec4([0.9, 0.45, 0.1, 1.0]));

    let channel = composition.add_node(node(registry, "utility.swizzle_vector")?);
    composition.set_node_attribute(channel, "SwizzleMask", DynValue::String("y".to_string()));

    let wave = composition.add_node(node(registry, "math.sine")?);
    composition.set_node_attribute(wave, "MultiplyBy", DynValue::Float(2.0));

    let level = composition.add_node(node(registry, "math.absolute")?);

    let softened = composition.add_node(node(registry, "math.mix")?);
    composition.set_node_attribute(softened, "A", DynValue::Float(0.3));

    let carried = composition.add_node(node(registry, "utility.transport_value")?);

    let glow = composition.add_node(node(registry, "rendering.draw_layer")?);
    let wash = composition.add_node(node(registry, "rendering.draw_layer")?);
    composition.set_node_attribute(wash, "Color", DynValue::Vec4([0.2, 0.2, 0.25, 1.0]));

    let blend = composition.add_node(node(registry, "rendering.merge")?);
    composition.set_node_attribute(blend, "BlendingMode", DynValue::String("screen".to_string()));

    let export = composition.add_node(node(registry, "rendering.export_renderable")?);

    composition.connect(tint, "Value", channel, "Value");
    composition.connect(channel, "Output", wave, "Input");
    composition.connect(wave, "Value", level, "Input");
    composition.connect(level, "Value", softened, "B");
    composition.connect(softened, "Value", carried, "Input");
    composition.connect(tint, "Value", glow, "Color");
    composition.connect(glow, "Output", blend, "A");
    composition.connect(wash, "Output", blend, "B");
    composition.connect(carried, "Output", blend, "Opacity");
    composition.connect(blend, "Output", export, "Renderable");

    let opacity_pin = composition
        .node(carried)
        .and_then(|node| node.output_pin_id("Output"))
        .ok_or_else(|| EngineError::Project("transport lost its Output pin".to_string()))?;
    Ok((composition, opacity_pin))
}

/// Blocks until the render loop flips the buffering index, i.e. one frame
/// completed after this call.
fn wait_for_frame(server: &RenderServer) -> EngineResult<Framebuffer> {
    let index = &server.services().buffering_index;
    let phase = index.current();
    for _ in 0..500 {
        if index.current() != phase {
            if let Some(framebuffer) = server.front_framebuffer() {
                return Ok(framebuffer);
            }
        }
        thread::sleep(Duration::from_millis(4));
    }
    Err(EngineError::Render("render thread never published a frame".to_string()))
}

fn checksum(bytes: &[u8]) -> u64 {
    // FNV-1a, enough to tell frames apart in a log line.
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn main() -> EngineResult<()> {
    env_logger::init();

    let gpu = Arc::new(HeadlessGpu::new());
    let shared: SharedGpu = gpu.clone();
    let server = RenderServer::new(shared, RenderConfig::default());
    let registry = server.services().registry.clone();

    // No files on disk: the decoded image goes straight into the cache.
    server
        .services()
        .image_cache
        .put(IMAGE_PATH, Arc::new(gradient_image(96, 54)));

    let mut project = server.new_project("Montage demo");
    project.preferred_resolution = (320, 180);
    let (background, texture_pin) = build_background(&registry)?;
    let (overlay, opacity_pin) = build_overlay(&registry)?;
    project.add_composition(background);
    project.add_composition(overlay);
    let framerate = project.framerate;
    server.set_project(project);
    wait_for_frame(&server)?;

    // Re-render until the async image upload has landed in the frame.
    for _ in 0..100 {
        if server.front_pin_value(texture_pin).is_some() {
            break;
        }
        server.force_render_frame();
        wait_for_frame(&server)?;
    }

    for frame in [0.0, 24.0, 48.0, 72.0, 96.0] {
        server.seek(frame);
        let framebuffer = wait_for_frame(&server)?;
        let pixels = gpu.read_pixels(&framebuffer, 0)?;
        let opacity = server
            .front_pin_value(opacity_pin)
            .and_then(|value| value.get_as::<f32>())
            .unwrap_or_default();
        println!(
            "{}  {}x{}  checksum {:016x}  merge opacity {:.3}",
            format_frame_to_time(frame, framerate),
            framebuffer.width,
            framebuffer.height,
            checksum(&pixels),
            opacity,
        );
    }

    // A short burst of free-running playback.
    let burst = Duration::from_millis(250);
    server.play();
    thread::sleep(burst);
    server.pause();
    println!(
        "free-running playback covered about {} frames",
        seconds_to_frames(burst.as_secs_f64(), framerate),
    );

    let diagnostics = server.front_diagnostics();
    println!(
        "{} render passes, {} nodes executed in the last frame, {} warnings",
        server.render_pass_count(),
        diagnostics.executions.len(),
        diagnostics.warnings.len(),
    );
    for warning in &diagnostics.warnings {
        println!("  node {}: {}", warning.node_id, warning.message);
    }

    server.stop()
}
