use std::collections::HashMap;

use crate::gpu::types::{Framebuffer, Texture};
use crate::model::mask::CompositionMask;

/// Finished output a composition exported for the current frame. The
/// primary framebuffer carries the picture; auxiliary attachments (mask
/// shapes, depth-like data) are published under well-known names so other
/// compositions can reference them.
#[derive(Clone, Debug, Default)]
pub struct RenderableBundle {
    pub primary_framebuffer: Framebuffer,
    pub attachments: HashMap<String, Framebuffer>,
}

impl RenderableBundle {
    pub fn new(primary_framebuffer: Framebuffer) -> Self {
        Self {
            primary_framebuffer,
            attachments: HashMap::new(),
        }
    }
}

/// One layer queued for the final composite, in submission order.
#[derive(Clone, Debug)]
pub struct CompositorTarget {
    pub color_attachment: Texture,
    /// UV/motion attachment; the null texture when the source produced none.
    pub uv_attachment: Texture,
    pub opacity: f32,
    /// Blend mode codename; empty selects plain alpha-over.
    pub blend_mode: String,
    pub composition_id: i32,
    pub masks: Vec<CompositionMask>,
}

impl CompositorTarget {
    pub fn new(color_attachment: Texture, composition_id: i32) -> Self {
        Self {
            color_attachment,
            uv_attachment: Texture::default(),
            opacity: 1.0,
            blend_mode: String::new(),
            composition_id,
            masks: Vec::new(),
        }
    }
}
