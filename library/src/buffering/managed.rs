use log::debug;

use crate::buffering::framebuffer::DoubleBufferedFramebuffer;
use crate::error::EngineResult;
use crate::gpu::backend::SharedGpu;
use crate::gpu::types::{Framebuffer, TexturePrecision};

/// A node-owned, lazily allocated double-buffered framebuffer that tracks
/// the composition's required resolution and color precision.
///
/// Reallocation happens when the buffer was never instantiated, when the
/// requested dimensions differ, or when the precision differs. A base
/// framebuffer of matching shape overrides the requested dimensions and its
/// attachments are blitted into the slot handed out by [`get`].
///
/// [`get`]: ManagedFramebuffer::get
#[derive(Default)]
pub struct ManagedFramebuffer {
    inner: Option<DoubleBufferedFramebuffer>,
}

impl ManagedFramebuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next scratch slot, cleared to transparent, with `base`'s attachments
    /// blitted in when one of matching shape is supplied.
    pub fn get(
        &mut self,
        gpu: &SharedGpu,
        width: u32,
        height: u32,
        precision: TexturePrecision,
        base: Option<&Framebuffer>,
    ) -> EngineResult<Framebuffer> {
        let (width, height) = match base {
            Some(base) if !base.is_null() => (base.width, base.height),
            _ => (width, height),
        };
        self.ensure(gpu, width, height, precision)?;

        let inner = self.inner.as_mut().unwrap();
        let framebuffer = inner.front();
        gpu.clear_framebuffer(&framebuffer, [0.0, 0.0, 0.0, 0.0])?;
        if let Some(base) = base {
            if !base.is_null() && base.width == width && base.height == height {
                gpu.blit_framebuffer(base, &framebuffer)?;
            }
        }
        Ok(framebuffer)
    }

    /// Next scratch slot without the clear/blit preamble, for callers that
    /// overwrite every pixel anyway.
    pub fn get_without_blitting(
        &mut self,
        gpu: &SharedGpu,
        width: u32,
        height: u32,
        precision: TexturePrecision,
    ) -> EngineResult<Framebuffer> {
        self.ensure(gpu, width, height, precision)?;
        Ok(self.inner.as_mut().unwrap().front())
    }

    /// Advances to the other slot and clears it. Multi-pass effects call
    /// this between iterations to ping-pong source and target.
    pub fn ping_pong(&mut self, gpu: &SharedGpu) -> EngineResult<Option<Framebuffer>> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(None);
        };
        let framebuffer = inner.front();
        gpu.clear_framebuffer(&framebuffer, [0.0, 0.0, 0.0, 0.0])?;
        Ok(Some(framebuffer))
    }

    /// The most recently handed-out slot, if any.
    pub fn ready_framebuffer(&self) -> Option<&Framebuffer> {
        self.inner.as_ref().map(|inner| inner.get())
    }

    pub fn is_instantiated(&self) -> bool {
        self.inner.is_some()
    }

    pub fn destroy(&mut self, gpu: &SharedGpu) -> EngineResult<()> {
        if let Some(inner) = self.inner.take() {
            inner.destroy(gpu)?;
        }
        Ok(())
    }

    fn ensure(
        &mut self,
        gpu: &SharedGpu,
        width: u32,
        height: u32,
        precision: TexturePrecision,
    ) -> EngineResult<()> {
        let stale = match &self.inner {
            None => true,
            Some(inner) => !inner.matches(width, height, precision),
        };
        if !stale {
            return Ok(());
        }

        if let Some(previous) = self.inner.take() {
            debug!(
                "managed framebuffer {}x{} -> {}x{}",
                previous.width, previous.height, width, height
            );
            previous.destroy(gpu)?;
        }
        self.inner = Some(DoubleBufferedFramebuffer::new(gpu, width, height, precision)?);
        Ok(())
    }
}
