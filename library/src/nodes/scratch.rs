use std::collections::HashMap;

use log::warn;

use crate::buffering::managed::ManagedFramebuffer;
use crate::gpu::backend::SharedGpu;
use crate::gpu::types::Texture;
use crate::gpu::upload::{AsyncUploader, UploadId};

/// Per-node GPU state that must not live in the serializable model:
/// managed framebuffers, pending upload tickets, resolved textures.
///
/// A node detects that its cached work is stale by comparing
/// `last_pass_id` against the context's current pass ID.
#[derive(Default)]
pub struct NodeScratch {
    pub managed: ManagedFramebuffer,
    pub last_pass_id: Option<u64>,
    pub upload: Option<UploadId>,
    pub texture: Option<Texture>,
    pub image_path: Option<String>,
}

/// Render-thread-owned table of [`NodeScratch`] keyed by node ID.
#[derive(Default)]
pub struct ScratchTable {
    entries: HashMap<i32, NodeScratch>,
}

impl ScratchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&mut self, node_id: i32) -> &mut NodeScratch {
        self.entries.entry(node_id).or_default()
    }

    pub fn get(&self, node_id: i32) -> Option<&NodeScratch> {
        self.entries.get(&node_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best-effort release of everything the table accumulated. Textures
    /// and tickets go back through the uploader so destruction happens on
    /// the thread that owns the upload context.
    pub fn destroy(&mut self, gpu: &SharedGpu, uploader: &AsyncUploader) {
        for (node_id, scratch) in self.entries.iter_mut() {
            if let Err(e) = scratch.managed.destroy(gpu) {
                warn!("could not release framebuffers of node {}: {}", node_id, e);
            }
            if let Some(texture) = scratch.texture.take() {
                uploader.delete_texture(texture);
            }
            if let Some(upload) = scratch.upload.take() {
                uploader.destroy_upload(upload);
            }
        }
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::gpu::headless::HeadlessGpu;
    use crate::gpu::types::TexturePrecision;

    #[test]
    fn test_entries_are_created_on_demand() {
        let mut table = ScratchTable::new();
        assert!(table.is_empty());
        table.entry(5).last_pass_id = Some(3);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(5).unwrap().last_pass_id, Some(3));
        assert!(table.get(6).is_none());
    }

    #[test]
    fn test_destroy_releases_framebuffers() {
        let gpu = Arc::new(HeadlessGpu::new());
        let shared: SharedGpu = gpu.clone();
        let uploader = AsyncUploader::new(shared.clone());

        let mut table = ScratchTable::new();
        table
            .entry(1)
            .managed
            .get(&shared, 8, 8, TexturePrecision::Usual, None)
            .unwrap();
        assert_eq!(gpu.live_framebuffer_count(), 2);

        table.destroy(&shared, &uploader);
        assert!(table.is_empty());
        assert_eq!(gpu.live_framebuffer_count(), 0);
        uploader.stop().unwrap();
    }
}
