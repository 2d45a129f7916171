use crate::error::EngineResult;
use crate::gpu::backend::SharedGpu;
use crate::gpu::types::{Framebuffer, TexturePrecision};

/// Allocates a framebuffer shaped the way the compositor expects: a color
/// attachment plus a UV attachment for coordinate remapping.
pub fn generate_compatible_framebuffer(
    gpu: &SharedGpu,
    width: u32,
    height: u32,
    precision: TexturePrecision,
) -> EngineResult<Framebuffer> {
    let color = gpu.generate_texture(width, height, precision, false)?;
    let uv = gpu.generate_texture(width, height, precision, false)?;
    gpu.generate_framebuffer(width, height, vec![color, uv])
}

/// A pair of physical framebuffers advanced by a node-local counter.
///
/// `get()` is the slot a node writes this round; `front_without_swapping()`
/// is the other, last fully written one. `front()` hands out the other slot
/// and advances the counter, which is what effects use to ping-pong between
/// the two buffers within a single frame. The counter is deliberately
/// independent of the global buffering index.
pub struct DoubleBufferedFramebuffer {
    slots: [Framebuffer; 2],
    swap_index: usize,
    pub width: u32,
    pub height: u32,
    pub precision: TexturePrecision,
}

impl DoubleBufferedFramebuffer {
    pub fn new(
        gpu: &SharedGpu,
        width: u32,
        height: u32,
        precision: TexturePrecision,
    ) -> EngineResult<Self> {
        let first = generate_compatible_framebuffer(gpu, width, height, precision)?;
        let second = generate_compatible_framebuffer(gpu, width, height, precision)?;
        // Fresh GPU memory is undefined until cleared.
        gpu.clear_framebuffer(&first, [0.0, 0.0, 0.0, 0.0])?;
        gpu.clear_framebuffer(&second, [0.0, 0.0, 0.0, 0.0])?;
        Ok(Self {
            slots: [first, second],
            swap_index: 0,
            width,
            height,
            precision,
        })
    }

    /// Current write slot.
    pub fn get(&self) -> &Framebuffer {
        &self.slots[self.swap_index % 2]
    }

    /// Write slot `offset` swaps ahead of the current one.
    pub fn get_with_offset(&self, offset: usize) -> &Framebuffer {
        &self.slots[(self.swap_index + offset) % 2]
    }

    /// Last fully written slot, without advancing the counter.
    pub fn front_without_swapping(&self) -> &Framebuffer {
        &self.slots[(self.swap_index + 1) % 2]
    }

    pub fn swap(&mut self) {
        self.swap_index = (self.swap_index + 1) % 2;
    }

    /// Last fully written slot, then advance so the next write lands in the
    /// buffer just handed out.
    pub fn front(&mut self) -> Framebuffer {
        let framebuffer = self.front_without_swapping().clone();
        self.swap();
        framebuffer
    }

    pub fn matches(&self, width: u32, height: u32, precision: TexturePrecision) -> bool {
        self.width == width && self.height == height && self.precision == precision
    }

    pub fn destroy(&self, gpu: &SharedGpu) -> EngineResult<()> {
        for slot in &self.slots {
            gpu.destroy_framebuffer_with_attachments(slot)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::gpu::headless::HeadlessGpu;

    fn setup_framebuffer() -> (SharedGpu, DoubleBufferedFramebuffer) {
        let gpu: SharedGpu = Arc::new(HeadlessGpu::new());
        let framebuffer =
            DoubleBufferedFramebuffer::new(&gpu, 8, 4, TexturePrecision::Usual).unwrap();
        (gpu, framebuffer)
    }

    #[test]
    fn test_slots_alternate_locally() {
        let (_gpu, mut framebuffer) = setup_framebuffer();
        let first = framebuffer.get().handle;
        let other = framebuffer.front_without_swapping().handle;
        assert_ne!(first, other);

        let handed_out = framebuffer.front();
        assert_eq!(handed_out.handle, other);
        // After the swap, the handed-out buffer is the write slot.
        assert_eq!(framebuffer.get().handle, other);
        assert_eq!(framebuffer.front_without_swapping().handle, first);
    }

    #[test]
    fn test_offset_addresses_both_slots() {
        let (_gpu, framebuffer) = setup_framebuffer();
        assert_eq!(framebuffer.get_with_offset(0).handle, framebuffer.get().handle);
        assert_eq!(
            framebuffer.get_with_offset(1).handle,
            framebuffer.front_without_swapping().handle
        );
    }

    #[test]
    fn test_destroy_releases_both_slots() {
        let gpu = Arc::new(HeadlessGpu::new());
        let shared: SharedGpu = gpu.clone();
        let framebuffer =
            DoubleBufferedFramebuffer::new(&shared, 4, 4, TexturePrecision::Half).unwrap();
        assert_eq!(gpu.live_framebuffer_count(), 2);

        framebuffer.destroy(&shared).unwrap();
        assert_eq!(gpu.live_framebuffer_count(), 0);
        assert_eq!(gpu.live_texture_count(), 0);
    }
}
