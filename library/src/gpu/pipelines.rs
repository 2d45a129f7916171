use std::collections::HashMap;
use std::sync::Mutex;

use log::debug;

use crate::error::EngineResult;
use crate::gpu::backend::SharedGpu;
use crate::gpu::types::Pipeline;

/// Process-wide cache of compiled pipelines, keyed by a caller-chosen name.
///
/// Node behaviors run on the render thread but the cache is shared through
/// the engine, so compiled programs survive project reloads.
pub struct PipelineCache {
    gpu: SharedGpu,
    pipelines: Mutex<HashMap<String, Pipeline>>,
}

impl PipelineCache {
    pub fn new(gpu: SharedGpu) -> Self {
        Self {
            gpu,
            pipelines: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_or_compile(
        &self,
        key: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> EngineResult<Pipeline> {
        if let Some(pipeline) = self.pipelines.lock().unwrap().get(key) {
            return Ok(*pipeline);
        }
        let pipeline = self.gpu.compile_pipeline(vertex_source, fragment_source)?;
        debug!("compiled pipeline '{}' ({})", key, pipeline.handle);
        self.pipelines
            .lock()
            .unwrap()
            .insert(key.to_string(), pipeline);
        Ok(pipeline)
    }

    pub fn len(&self) -> usize {
        self.pipelines.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::gpu::headless::HeadlessGpu;

    #[test]
    fn test_pipelines_compile_once() {
        let gpu = Arc::new(HeadlessGpu::new());
        let cache = PipelineCache::new(gpu);
        let first = cache.get_or_compile("layer", "vs", "fs").unwrap();
        let second = cache.get_or_compile("layer", "vs", "fs").unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_distinct_keys_compile_distinct_programs() {
        let gpu = Arc::new(HeadlessGpu::new());
        let cache = PipelineCache::new(gpu.clone());
        let layer = cache.get_or_compile("layer", "vs", "fs-layer").unwrap();
        let blur = cache.get_or_compile("blur", "vs", "fs-blur").unwrap();
        assert_ne!(layer, blur);
        assert_eq!(gpu.fragment_source(&blur), Some("fs-blur".to_string()));
        assert_eq!(cache.len(), 2);
    }
}
