use std::sync::Arc;

use crate::error::EngineResult;
use crate::gpu::types::{ContextHandle, Framebuffer, Pipeline, Texture, TexturePrecision, UniformValue};

/// The narrow boundary between the engine and the graphics API.
///
/// Every GPU-capable thread reserves its own context before issuing calls.
/// All operations are fallible; allocation and compile failures are treated
/// as fatal by the render loop.
pub trait GpuBackend: Send + Sync {
    /// Reserve a rendering context for cross-thread use.
    fn reserve_context(&self) -> EngineResult<ContextHandle>;

    /// Make a reserved context current on the calling thread.
    fn make_context_current(&self, context: ContextHandle) -> EngineResult<()>;

    fn generate_texture(
        &self,
        width: u32,
        height: u32,
        precision: TexturePrecision,
        mipmapped: bool,
    ) -> EngineResult<Texture>;

    /// Upload pixel data into an existing texture. `pixels` must hold
    /// `width * height * precision.bytes_per_pixel()` bytes.
    fn update_texture(&self, texture: &Texture, pixels: &[u8]) -> EngineResult<()>;

    fn generate_mipmaps(&self, texture: &Texture) -> EngineResult<()>;

    fn destroy_texture(&self, texture: &Texture) -> EngineResult<()>;

    /// Create a framebuffer from pre-generated color attachments. All
    /// attachments must match the framebuffer dimensions.
    fn generate_framebuffer(
        &self,
        width: u32,
        height: u32,
        attachments: Vec<Texture>,
    ) -> EngineResult<Framebuffer>;

    /// Destroy the framebuffer object only; attachments stay alive.
    fn destroy_framebuffer(&self, framebuffer: &Framebuffer) -> EngineResult<()>;

    fn destroy_framebuffer_with_attachments(&self, framebuffer: &Framebuffer) -> EngineResult<()>;

    /// Bind a framebuffer as the draw target; `None` binds the default one.
    fn bind_framebuffer(&self, framebuffer: Option<&Framebuffer>) -> EngineResult<()>;

    fn clear_framebuffer(&self, framebuffer: &Framebuffer, color: [f32; 4]) -> EngineResult<()>;

    /// Copy every attachment of `source` into the matching attachment of
    /// `destination`.
    fn blit_framebuffer(&self, source: &Framebuffer, destination: &Framebuffer) -> EngineResult<()>;

    fn compile_pipeline(&self, vertex_source: &str, fragment_source: &str) -> EngineResult<Pipeline>;

    fn bind_pipeline(&self, pipeline: &Pipeline) -> EngineResult<()>;

    fn set_uniform(&self, pipeline: &Pipeline, name: &str, value: UniformValue) -> EngineResult<()>;

    /// Bind a texture to a named sampler slot of the bound pipeline.
    fn bind_texture(
        &self,
        texture: &Texture,
        pipeline: &Pipeline,
        slot: u32,
        name: &str,
    ) -> EngineResult<()>;

    fn draw_arrays(&self, vertices: u32) -> EngineResult<()>;

    /// Blocking wait for all submitted GPU work to complete.
    fn flush(&self) -> EngineResult<()>;

    /// Read back one attachment's pixel data.
    fn read_pixels(&self, framebuffer: &Framebuffer, attachment: usize) -> EngineResult<Vec<u8>>;
}

pub type SharedGpu = Arc<dyn GpuBackend>;
