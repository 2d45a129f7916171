use rayon::prelude::*;

use crate::error::EngineResult;
use crate::gpu::types::TexturePrecision;
use crate::util::timing::measure_debug;

/// A decoded pixel buffer, ready to hand to the upload queue.
///
/// `data` holds tightly packed RGBA rows; the byte layout per channel is
/// dictated by `precision` (u8 for `Usual`, little-endian f32 for `Full`).
#[derive(Clone, Debug, PartialEq)]
pub struct ImageData {
  pub width: u32,
  pub height: u32,
  pub precision: TexturePrecision,
  pub data: Vec<u8>,
}

impl ImageData {
  /// Single-color 8-bit image, mostly useful in tests and the demo.
  pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..width * height {
      data.extend_from_slice(&rgba);
    }
    Self {
      width,
      height,
      precision: TexturePrecision::Usual,
      data,
    }
  }

  /// Wraps an RGBA f32 pixel buffer, converting it to bytes in parallel.
  pub fn from_f32_pixels(width: u32, height: u32, pixels: &[f32]) -> Self {
    let data: Vec<u8> = pixels
      .par_iter()
      .flat_map_iter(|component| component.to_le_bytes())
      .collect();
    Self {
      width,
      height,
      precision: TexturePrecision::Full,
      data,
    }
  }

  pub fn byte_len_matches(&self) -> bool {
    let expected = self.width as usize * self.height as usize * self.precision.bytes_per_pixel();
    self.data.len() == expected
  }
}

/// Decodes an image file to tightly packed RGBA. The source decides the
/// precision: float formats (EXR, Radiance HDR) keep their full range,
/// everything else narrows to 8-bit.
pub fn load_image(path: &str) -> EngineResult<ImageData> {
  measure_debug(format!("decoding {}", path), || {
    let decoded = image::open(path)?;
    match decoded.color() {
      image::ColorType::Rgb32F | image::ColorType::Rgba32F => {
        let rgba_image = decoded.to_rgba32f();
        let (width, height) = (rgba_image.width(), rgba_image.height());
        Ok(ImageData::from_f32_pixels(width, height, &rgba_image.into_raw()))
      }
      _ => {
        let rgba_image = decoded.to_rgba8();
        Ok(ImageData {
          width: rgba_image.width(),
          height: rgba_image.height(),
          precision: TexturePrecision::Usual,
          data: rgba_image.into_raw(),
        })
      }
    }
  })
}
