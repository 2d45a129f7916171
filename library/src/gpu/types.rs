use serde::{Deserialize, Serialize};

/// Color precision of a texture or framebuffer attachment.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TexturePrecision {
    /// 8 bits per channel.
    #[default]
    Usual,
    /// 16-bit float per channel.
    Half,
    /// 32-bit float per channel.
    Full,
}

impl TexturePrecision {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            TexturePrecision::Usual => 4,
            TexturePrecision::Half => 8,
            TexturePrecision::Full => 16,
        }
    }
}

/// A GPU texture handle plus the metadata the engine needs to reason about it.
///
/// Handle `0` is the null texture.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Texture {
    /// Live GPU handle; never persisted, deserializes to the null texture.
    #[serde(skip)]
    pub handle: u32,
    pub width: u32,
    pub height: u32,
    pub precision: TexturePrecision,
    pub mipmapped: bool,
}

impl Texture {
    pub fn is_null(&self) -> bool {
        self.handle == 0
    }
}

/// A framebuffer object and its color attachments.
///
/// Attachment 0 carries color, attachment 1 (when present) carries UV data
/// used by the compositor for remapping.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Framebuffer {
    /// Live GPU handle; never persisted, deserializes to the null object.
    #[serde(skip)]
    pub handle: u32,
    pub width: u32,
    pub height: u32,
    pub attachments: Vec<Texture>,
}

impl Framebuffer {
    pub fn is_null(&self) -> bool {
        self.handle == 0
    }

    pub fn color_attachment(&self) -> Option<&Texture> {
        self.attachments.first()
    }
}

/// A compiled vertex+fragment program.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Pipeline {
    pub handle: u32,
}

/// Uniform value kinds the engine sets by name.
#[derive(Clone, Debug, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec4([f32; 4]),
}

/// Opaque per-thread rendering context reserved from the shared device.
pub type ContextHandle = usize;
