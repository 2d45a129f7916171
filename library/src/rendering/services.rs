use std::sync::Arc;

use crate::buffering::index::{BufferingIndex, SharedBufferingIndex};
use crate::cache::{ImageCache, SharedImageCache};
use crate::compositing::compositor::Compositor;
use crate::evaluation::diagnostics::DiagnosticsChannel;
use crate::evaluation::pin_cache::PinValueCache;
use crate::gpu::backend::SharedGpu;
use crate::gpu::pipelines::PipelineCache;
use crate::gpu::upload::AsyncUploader;
use crate::nodes::registry::NodeRegistry;
use crate::rendering::render_server::RenderConfig;

/// The engine's shared machinery, wired once and handed to every thread.
/// Everything inside is reference-counted, so the bundle clones freely.
#[derive(Clone)]
pub struct RenderServices {
    pub gpu: SharedGpu,
    pub buffering_index: SharedBufferingIndex,
    pub pipelines: Arc<PipelineCache>,
    pub uploader: Arc<AsyncUploader>,
    pub compositor: Arc<Compositor>,
    pub pin_cache: Arc<PinValueCache>,
    pub diagnostics: Arc<DiagnosticsChannel>,
    pub image_cache: SharedImageCache,
    pub registry: Arc<NodeRegistry>,
}

impl RenderServices {
    pub fn new(gpu: SharedGpu, config: &RenderConfig) -> Self {
        let buffering_index = BufferingIndex::shared();
        let pipelines = Arc::new(PipelineCache::new(gpu.clone()));
        let uploader = Arc::new(AsyncUploader::with_poll_interval(
            gpu.clone(),
            config.upload_poll_interval(),
        ));
        let compositor = Arc::new(Compositor::new(
            gpu.clone(),
            pipelines.clone(),
            buffering_index.clone(),
        ));
        Self {
            gpu,
            pin_cache: Arc::new(PinValueCache::new(buffering_index.clone())),
            diagnostics: Arc::new(DiagnosticsChannel::new(buffering_index.clone())),
            buffering_index,
            pipelines,
            uploader,
            compositor,
            image_cache: Arc::new(ImageCache::new()),
            registry: Arc::new(NodeRegistry::with_builtin_nodes()),
        }
    }
}
