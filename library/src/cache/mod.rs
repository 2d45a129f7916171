use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use log::debug;

use crate::error::EngineResult;
use crate::loader::image::{self, ImageData};

const DEFAULT_IMAGE_CACHE_SIZE: usize = 64;

pub type SharedImageCache = Arc<ImageCache>;

/// LRU cache of decoded images, keyed by source path.
///
/// Entries are shared `Arc` handles so eviction never invalidates a buffer
/// an upload ticket still references.
pub struct ImageCache {
  images: Mutex<LruCache<String, Arc<ImageData>>>,
}

impl ImageCache {
  pub fn new() -> Self {
    let capacity =
      NonZeroUsize::new(DEFAULT_IMAGE_CACHE_SIZE).expect("DEFAULT_IMAGE_CACHE_SIZE must be > 0");
    Self {
      images: Mutex::new(LruCache::new(capacity)),
    }
  }

  pub fn get(&self, path: &str) -> Option<Arc<ImageData>> {
    self.images.lock().unwrap().get(path).cloned()
  }

  pub fn put(&self, path: &str, image: Arc<ImageData>) {
    self.images.lock().unwrap().put(path.to_string(), image);
  }

  /// Cache hit or decode: the one entry point node behaviors use.
  pub fn load(&self, path: &str) -> EngineResult<Arc<ImageData>> {
    if let Some(image) = self.get(path) {
      return Ok(image);
    }

    let image = Arc::new(image::load_image(path)?);
    debug!(
      "cached {} ({}x{}, {} bytes)",
      path,
      image.width,
      image.height,
      image.data.len()
    );
    self.put(path, image.clone());
    Ok(image)
  }

  pub fn clear(&self) {
    self.images.lock().unwrap().clear();
  }

  pub fn len(&self) -> usize {
    self.images.lock().unwrap().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl Default for ImageCache {
  fn default() -> Self {
    Self::new()
  }
}
