//! Software GPU backend with deterministic, inspectable state.
//!
//! Allocations hand out plain integer handles, uploads and clears keep real
//! pixel memory, and every clear/blit/draw is appended to a journal so tests
//! can assert ordering and bindings without a graphics device.

use std::collections::HashMap;
use std::sync::Mutex;

use log::trace;

use crate::error::{EngineError, EngineResult};
use crate::gpu::backend::GpuBackend;
use crate::gpu::types::{
    ContextHandle, Framebuffer, Pipeline, Texture, TexturePrecision, UniformValue,
};

/// One recorded GPU operation, in submission order.
#[derive(Clone, Debug, PartialEq)]
pub enum GpuEvent {
    Clear {
        framebuffer: u32,
        color: [f32; 4],
    },
    Blit {
        source: u32,
        destination: u32,
    },
    Draw {
        framebuffer: u32,
        pipeline: u32,
        /// Sampler bindings at draw time, ordered by slot.
        textures: Vec<(String, u32)>,
        uniforms: HashMap<String, UniformValue>,
    },
}

struct TextureRecord {
    texture: Texture,
    pixels: Option<Vec<u8>>,
}

struct PipelineRecord {
    #[allow(dead_code)]
    vertex_source: String,
    fragment_source: String,
    uniforms: HashMap<String, UniformValue>,
}

#[derive(Default)]
struct HeadlessState {
    next_handle: u32,
    textures: HashMap<u32, TextureRecord>,
    framebuffers: HashMap<u32, Framebuffer>,
    pipelines: HashMap<u32, PipelineRecord>,
    contexts: usize,
    bound_framebuffer: Option<u32>,
    bound_pipeline: Option<u32>,
    // Sampler bindings persist across draws, like real API state.
    bound_textures: Vec<(u32, String, u32)>,
    journal: Vec<GpuEvent>,
    flush_count: u64,
}

impl HeadlessState {
    fn allocate_handle(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }
}

#[derive(Default)]
pub struct HeadlessGpu {
    state: Mutex<HeadlessState>,
}

impl HeadlessGpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full journal snapshot.
    pub fn events(&self) -> Vec<GpuEvent> {
        self.state.lock().unwrap().journal.clone()
    }

    /// Journal entries that targeted the given framebuffer handle.
    pub fn events_for_framebuffer(&self, handle: u32) -> Vec<GpuEvent> {
        self.events()
            .into_iter()
            .filter(|event| match event {
                GpuEvent::Clear { framebuffer, .. } => *framebuffer == handle,
                GpuEvent::Blit { destination, .. } => *destination == handle,
                GpuEvent::Draw { framebuffer, .. } => *framebuffer == handle,
            })
            .collect()
    }

    pub fn clear_events(&self) {
        self.state.lock().unwrap().journal.clear();
    }

    pub fn texture_pixels(&self, handle: u32) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .textures
            .get(&handle)
            .and_then(|record| record.pixels.clone())
    }

    pub fn fragment_source(&self, pipeline: &Pipeline) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .pipelines
            .get(&pipeline.handle)
            .map(|record| record.fragment_source.clone())
    }

    pub fn live_texture_count(&self) -> usize {
        self.state.lock().unwrap().textures.len()
    }

    pub fn live_framebuffer_count(&self) -> usize {
        self.state.lock().unwrap().framebuffers.len()
    }

    pub fn flush_count(&self) -> u64 {
        self.state.lock().unwrap().flush_count
    }

    fn encode_clear(precision: TexturePrecision, color: [f32; 4], pixel_count: usize) -> Vec<u8> {
        match precision {
            TexturePrecision::Usual => {
                let texel: Vec<u8> = color
                    .iter()
                    .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
                    .collect();
                texel.repeat(pixel_count)
            }
            TexturePrecision::Full => {
                let texel: Vec<u8> = color.iter().flat_map(|c| c.to_le_bytes()).collect();
                texel.repeat(pixel_count)
            }
            // Half floats are not modeled; the slot still gets defined memory.
            TexturePrecision::Half => vec![0; pixel_count * TexturePrecision::Half.bytes_per_pixel()],
        }
    }
}

impl GpuBackend for HeadlessGpu {
    fn reserve_context(&self) -> EngineResult<ContextHandle> {
        let mut state = self.state.lock().unwrap();
        state.contexts += 1;
        Ok(state.contexts)
    }

    fn make_context_current(&self, context: ContextHandle) -> EngineResult<()> {
        let state = self.state.lock().unwrap();
        if context == 0 || context > state.contexts {
            return Err(EngineError::Gpu(format!("unknown context {}", context)));
        }
        Ok(())
    }

    fn generate_texture(
        &self,
        width: u32,
        height: u32,
        precision: TexturePrecision,
        mipmapped: bool,
    ) -> EngineResult<Texture> {
        if width == 0 || height == 0 {
            return Err(EngineError::Gpu(format!(
                "cannot allocate {}x{} texture",
                width, height
            )));
        }
        let mut state = self.state.lock().unwrap();
        let handle = state.allocate_handle();
        let texture = Texture {
            handle,
            width,
            height,
            precision,
            mipmapped,
        };
        state.textures.insert(
            handle,
            TextureRecord {
                texture: texture.clone(),
                pixels: None,
            },
        );
        trace!("generated texture {} ({}x{})", handle, width, height);
        Ok(texture)
    }

    fn update_texture(&self, texture: &Texture, pixels: &[u8]) -> EngineResult<()> {
        let expected =
            texture.width as usize * texture.height as usize * texture.precision.bytes_per_pixel();
        if pixels.len() != expected {
            return Err(EngineError::Gpu(format!(
                "texture {} upload size mismatch: got {} bytes, expected {}",
                texture.handle,
                pixels.len(),
                expected
            )));
        }
        let mut state = self.state.lock().unwrap();
        let record = state
            .textures
            .get_mut(&texture.handle)
            .ok_or_else(|| EngineError::Gpu(format!("unknown texture {}", texture.handle)))?;
        record.pixels = Some(pixels.to_vec());
        Ok(())
    }

    fn generate_mipmaps(&self, texture: &Texture) -> EngineResult<()> {
        let state = self.state.lock().unwrap();
        if !state.textures.contains_key(&texture.handle) {
            return Err(EngineError::Gpu(format!("unknown texture {}", texture.handle)));
        }
        Ok(())
    }

    fn destroy_texture(&self, texture: &Texture) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        state
            .textures
            .remove(&texture.handle)
            .ok_or_else(|| EngineError::Gpu(format!("unknown texture {}", texture.handle)))?;
        trace!("destroyed texture {}", texture.handle);
        Ok(())
    }

    fn generate_framebuffer(
        &self,
        width: u32,
        height: u32,
        attachments: Vec<Texture>,
    ) -> EngineResult<Framebuffer> {
        for attachment in &attachments {
            if attachment.width != width || attachment.height != height {
                return Err(EngineError::Gpu(format!(
                    "attachment {} is {}x{}, framebuffer is {}x{}",
                    attachment.handle, attachment.width, attachment.height, width, height
                )));
            }
        }
        let mut state = self.state.lock().unwrap();
        let handle = state.allocate_handle();
        let framebuffer = Framebuffer {
            handle,
            width,
            height,
            attachments,
        };
        state.framebuffers.insert(handle, framebuffer.clone());
        trace!("generated framebuffer {} ({}x{})", handle, width, height);
        Ok(framebuffer)
    }

    fn destroy_framebuffer(&self, framebuffer: &Framebuffer) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        state
            .framebuffers
            .remove(&framebuffer.handle)
            .ok_or_else(|| EngineError::Gpu(format!("unknown framebuffer {}", framebuffer.handle)))?;
        if state.bound_framebuffer == Some(framebuffer.handle) {
            state.bound_framebuffer = None;
        }
        Ok(())
    }

    fn destroy_framebuffer_with_attachments(&self, framebuffer: &Framebuffer) -> EngineResult<()> {
        for attachment in &framebuffer.attachments {
            self.destroy_texture(attachment)?;
        }
        self.destroy_framebuffer(framebuffer)
    }

    fn bind_framebuffer(&self, framebuffer: Option<&Framebuffer>) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        match framebuffer {
            Some(fb) => {
                if !state.framebuffers.contains_key(&fb.handle) {
                    return Err(EngineError::Gpu(format!("unknown framebuffer {}", fb.handle)));
                }
                state.bound_framebuffer = Some(fb.handle);
            }
            None => state.bound_framebuffer = None,
        }
        Ok(())
    }

    fn clear_framebuffer(&self, framebuffer: &Framebuffer, color: [f32; 4]) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.framebuffers.contains_key(&framebuffer.handle) {
            return Err(EngineError::Gpu(format!(
                "unknown framebuffer {}",
                framebuffer.handle
            )));
        }
        for attachment in &framebuffer.attachments {
            let pixel_count = attachment.width as usize * attachment.height as usize;
            if let Some(record) = state.textures.get_mut(&attachment.handle) {
                record.pixels = Some(Self::encode_clear(attachment.precision, color, pixel_count));
            }
        }
        state.journal.push(GpuEvent::Clear {
            framebuffer: framebuffer.handle,
            color,
        });
        Ok(())
    }

    fn blit_framebuffer(&self, source: &Framebuffer, destination: &Framebuffer) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        for (from, to) in source.attachments.iter().zip(destination.attachments.iter()) {
            let pixels = state.textures.get(&from.handle).and_then(|r| r.pixels.clone());
            if let (Some(pixels), Some(record)) = (pixels, state.textures.get_mut(&to.handle)) {
                if from.width == to.width && from.height == to.height && from.precision == to.precision
                {
                    record.pixels = Some(pixels);
                }
            }
        }
        state.journal.push(GpuEvent::Blit {
            source: source.handle,
            destination: destination.handle,
        });
        Ok(())
    }

    fn compile_pipeline(&self, vertex_source: &str, fragment_source: &str) -> EngineResult<Pipeline> {
        if vertex_source.is_empty() || fragment_source.is_empty() {
            return Err(EngineError::Gpu("empty shader source".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        let handle = state.allocate_handle();
        state.pipelines.insert(
            handle,
            PipelineRecord {
                vertex_source: vertex_source.to_string(),
                fragment_source: fragment_source.to_string(),
                uniforms: HashMap::new(),
            },
        );
        Ok(Pipeline { handle })
    }

    fn bind_pipeline(&self, pipeline: &Pipeline) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.pipelines.contains_key(&pipeline.handle) {
            return Err(EngineError::Gpu(format!("unknown pipeline {}", pipeline.handle)));
        }
        state.bound_pipeline = Some(pipeline.handle);
        Ok(())
    }

    fn set_uniform(&self, pipeline: &Pipeline, name: &str, value: UniformValue) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        let record = state
            .pipelines
            .get_mut(&pipeline.handle)
            .ok_or_else(|| EngineError::Gpu(format!("unknown pipeline {}", pipeline.handle)))?;
        record.uniforms.insert(name.to_string(), value);
        Ok(())
    }

    fn bind_texture(
        &self,
        texture: &Texture,
        pipeline: &Pipeline,
        slot: u32,
        name: &str,
    ) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.textures.contains_key(&texture.handle) {
            return Err(EngineError::Gpu(format!("unknown texture {}", texture.handle)));
        }
        if !state.pipelines.contains_key(&pipeline.handle) {
            return Err(EngineError::Gpu(format!("unknown pipeline {}", pipeline.handle)));
        }
        state.bound_textures.retain(|(bound_slot, _, _)| *bound_slot != slot);
        state.bound_textures.push((slot, name.to_string(), texture.handle));
        Ok(())
    }

    fn draw_arrays(&self, vertices: u32) -> EngineResult<()> {
        if vertices == 0 {
            return Err(EngineError::Gpu("draw with zero vertices".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        let framebuffer = state
            .bound_framebuffer
            .ok_or_else(|| EngineError::Gpu("draw without a bound framebuffer".to_string()))?;
        let pipeline = state
            .bound_pipeline
            .ok_or_else(|| EngineError::Gpu("draw without a bound pipeline".to_string()))?;
        let mut textures: Vec<(u32, String, u32)> = state.bound_textures.clone();
        textures.sort_by_key(|(slot, _, _)| *slot);
        let textures = textures
            .into_iter()
            .map(|(_, name, handle)| (name, handle))
            .collect();
        let uniforms = state
            .pipelines
            .get(&pipeline)
            .map(|record| record.uniforms.clone())
            .unwrap_or_default();
        state.journal.push(GpuEvent::Draw {
            framebuffer,
            pipeline,
            textures,
            uniforms,
        });
        Ok(())
    }

    fn flush(&self) -> EngineResult<()> {
        self.state.lock().unwrap().flush_count += 1;
        Ok(())
    }

    fn read_pixels(&self, framebuffer: &Framebuffer, attachment: usize) -> EngineResult<Vec<u8>> {
        let texture = framebuffer.attachments.get(attachment).ok_or_else(|| {
            EngineError::Gpu(format!(
                "framebuffer {} has no attachment {}",
                framebuffer.handle, attachment
            ))
        })?;
        let state = self.state.lock().unwrap();
        let record = state
            .textures
            .get(&texture.handle)
            .ok_or_else(|| EngineError::Gpu(format!("unknown texture {}", texture.handle)))?;
        let size =
            texture.width as usize * texture.height as usize * texture.precision.bytes_per_pixel();
        Ok(record.pixels.clone().unwrap_or_else(|| vec![0; size]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_gpu() -> HeadlessGpu {
        HeadlessGpu::new()
    }

    fn setup_framebuffer(gpu: &HeadlessGpu, width: u32, height: u32) -> Framebuffer {
        let color = gpu
            .generate_texture(width, height, TexturePrecision::Usual, false)
            .unwrap();
        gpu.generate_framebuffer(width, height, vec![color]).unwrap()
    }

    #[test]
    fn test_clear_encodes_color() {
        let gpu = setup_gpu();
        let fb = setup_framebuffer(&gpu, 2, 2);
        gpu.clear_framebuffer(&fb, [1.0, 0.0, 0.0, 1.0]).unwrap();
        let pixels = gpu.read_pixels(&fb, 0).unwrap();
        assert_eq!(pixels.len(), 16);
        assert_eq!(&pixels[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_draw_requires_bound_state() {
        let gpu = setup_gpu();
        assert!(gpu.draw_arrays(3).is_err());

        let fb = setup_framebuffer(&gpu, 4, 4);
        gpu.bind_framebuffer(Some(&fb)).unwrap();
        assert!(gpu.draw_arrays(3).is_err());

        let pipeline = gpu.compile_pipeline("vs", "fs").unwrap();
        gpu.bind_pipeline(&pipeline).unwrap();
        gpu.draw_arrays(3).unwrap();

        let events = gpu.events_for_framebuffer(fb.handle);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_journal_preserves_order() {
        let gpu = setup_gpu();
        let a = setup_framebuffer(&gpu, 4, 4);
        let b = setup_framebuffer(&gpu, 4, 4);
        gpu.clear_framebuffer(&a, [0.0; 4]).unwrap();
        gpu.blit_framebuffer(&a, &b).unwrap();
        gpu.clear_framebuffer(&b, [1.0; 4]).unwrap();

        let events = gpu.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], GpuEvent::Clear { framebuffer, .. } if framebuffer == a.handle));
        assert!(matches!(events[1], GpuEvent::Blit { source, destination } if source == a.handle && destination == b.handle));
        assert!(matches!(events[2], GpuEvent::Clear { framebuffer, .. } if framebuffer == b.handle));
    }

    #[test]
    fn test_blit_copies_matching_attachments() {
        let gpu = setup_gpu();
        let a = setup_framebuffer(&gpu, 2, 1);
        let b = setup_framebuffer(&gpu, 2, 1);
        gpu.update_texture(&a.attachments[0], &[9, 8, 7, 6, 5, 4, 3, 2])
            .unwrap();
        gpu.blit_framebuffer(&a, &b).unwrap();
        assert_eq!(
            gpu.texture_pixels(b.attachments[0].handle).unwrap(),
            vec![9, 8, 7, 6, 5, 4, 3, 2]
        );
    }

    #[test]
    fn test_destroy_framebuffer_with_attachments_frees_textures() {
        let gpu = setup_gpu();
        let fb = setup_framebuffer(&gpu, 2, 2);
        assert_eq!(gpu.live_texture_count(), 1);
        gpu.destroy_framebuffer_with_attachments(&fb).unwrap();
        assert_eq!(gpu.live_texture_count(), 0);
        assert_eq!(gpu.live_framebuffer_count(), 0);
        assert!(gpu.destroy_framebuffer(&fb).is_err());
    }

    #[test]
    fn test_upload_size_validation() {
        let gpu = setup_gpu();
        let texture = gpu
            .generate_texture(2, 2, TexturePrecision::Usual, false)
            .unwrap();
        assert!(gpu.update_texture(&texture, &[0; 3]).is_err());
        assert!(gpu.update_texture(&texture, &[0; 16]).is_ok());
    }
}
