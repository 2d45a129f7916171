//! Asynchronous texture uploads.
//!
//! Decoded pixel buffers are turned into GPU textures on a dedicated worker
//! thread with its own context, so neither the interactive thread nor the
//! render thread stalls on texture transfer. Requesters hold an opaque
//! ticket ID and poll readiness; the record itself lives in the shared
//! ticket table until consumed with [`AsyncUploader::destroy_upload`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, trace};

use crate::error::EngineResult;
use crate::gpu::backend::SharedGpu;
use crate::gpu::types::Texture;
use crate::loader::image::ImageData;

pub type UploadId = i32;

// Coarse polling: uploads are latency-tolerant, so an idle worker sleeps
// instead of spinning.
const UPLOAD_WORKER_IDLE_MS: u64 = 20;

#[derive(Clone, Default)]
struct UploadInfo {
    image: Option<Arc<ImageData>>,
    delete_texture: Option<Texture>,
    texture: Option<Texture>,
    ready: bool,
    executed: bool,
    failed: bool,
}

enum UploadWork {
    Upload(Arc<ImageData>),
    Delete(Texture),
}

type SharedInfos = Arc<Mutex<HashMap<UploadId, UploadInfo>>>;

pub struct AsyncUploader {
    infos: SharedInfos,
    running: Arc<AtomicBool>,
    next_id: AtomicI32,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncUploader {
    pub fn new(gpu: SharedGpu) -> Self {
        Self::with_poll_interval(gpu, Duration::from_millis(UPLOAD_WORKER_IDLE_MS))
    }

    pub fn with_poll_interval(gpu: SharedGpu, poll_interval: Duration) -> Self {
        let infos: SharedInfos = Arc::new(Mutex::new(HashMap::new()));
        let running = Arc::new(AtomicBool::new(true));

        let worker_infos = infos.clone();
        let worker_running = running.clone();
        let handle = thread::spawn(move || {
            worker_loop(gpu, worker_infos, worker_running, poll_interval);
        });

        Self {
            infos,
            running,
            next_id: AtomicI32::new(1),
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Queue a decoded image for upload. The returned ticket becomes ready
    /// once the texture is genuinely usable on any context.
    pub fn generate_texture_from_image(&self, image: Arc<ImageData>) -> UploadId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        trace!("queueing upload {} ({}x{})", id, image.width, image.height);
        self.infos.lock().unwrap().insert(
            id,
            UploadInfo {
                image: Some(image),
                ..UploadInfo::default()
            },
        );
        id
    }

    /// Queue a texture for destruction on the upload thread. Deletion
    /// tickets never become ready; the record disappears once processed.
    pub fn delete_texture(&self, texture: Texture) -> UploadId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        trace!("queueing deletion {} for texture {}", id, texture.handle);
        self.infos.lock().unwrap().insert(
            id,
            UploadInfo {
                delete_texture: Some(texture),
                ..UploadInfo::default()
            },
        );
        id
    }

    pub fn upload_exists(&self, id: UploadId) -> bool {
        self.infos.lock().unwrap().contains_key(&id)
    }

    pub fn is_upload_ready(&self, id: UploadId) -> bool {
        self.infos
            .lock()
            .unwrap()
            .get(&id)
            .map(|info| info.ready)
            .unwrap_or(false)
    }

    pub fn upload_failed(&self, id: UploadId) -> bool {
        self.infos
            .lock()
            .unwrap()
            .get(&id)
            .map(|info| info.failed)
            .unwrap_or(false)
    }

    /// Value copy of the finished texture; `None` until ready.
    pub fn get_upload(&self, id: UploadId) -> Option<Texture> {
        self.infos
            .lock()
            .unwrap()
            .get(&id)
            .filter(|info| info.ready)
            .and_then(|info| info.texture.clone())
    }

    /// Consume the ticket. Ownership of a ready texture passes to the
    /// caller; an unprocessed upload is abandoned.
    pub fn destroy_upload(&self, id: UploadId) {
        self.infos.lock().unwrap().remove(&id);
    }

    /// Stop the worker and join it. A ticket in flight completes first.
    pub fn stop(&self) -> EngineResult<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

fn worker_loop(
    gpu: SharedGpu,
    infos: SharedInfos,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    match gpu.reserve_context().and_then(|context| gpu.make_context_current(context)) {
        Ok(()) => trace!("upload worker online"),
        Err(e) => {
            error!("upload worker could not acquire a context: {}", e);
            return;
        }
    }

    while running.load(Ordering::SeqCst) {
        // One short-held lock to pick work; never held across a GPU call.
        let next = {
            let mut table = infos.lock().unwrap();
            let candidate = table
                .iter()
                .find(|(_, info)| !info.executed)
                .map(|(id, _)| *id);
            candidate.and_then(|id| {
                let info = table.get_mut(&id)?;
                info.executed = true;
                if let Some(texture) = info.delete_texture.take() {
                    Some((id, UploadWork::Delete(texture)))
                } else {
                    info.image.clone().map(|image| (id, UploadWork::Upload(image)))
                }
            })
        };

        let Some((id, work)) = next else {
            thread::sleep(poll_interval);
            continue;
        };

        match work {
            UploadWork::Delete(texture) => {
                if let Err(e) = gpu.destroy_texture(&texture) {
                    error!("deletion ticket {} failed: {}", id, e);
                }
                infos.lock().unwrap().remove(&id);
            }
            UploadWork::Upload(image) => {
                let result = upload_image(&gpu, &image);
                let mut table = infos.lock().unwrap();
                match table.get_mut(&id) {
                    Some(info) => match result {
                        Ok(texture) => {
                            trace!("upload {} ready as texture {}", id, texture.handle);
                            info.texture = Some(texture);
                            info.ready = true;
                            info.image = None;
                        }
                        Err(e) => {
                            error!("upload {} failed: {}", id, e);
                            info.failed = true;
                            info.image = None;
                        }
                    },
                    // Ticket was destroyed while uploading; free the orphan.
                    None => {
                        if let Ok(texture) = result {
                            let _ = gpu.destroy_texture(&texture);
                        }
                    }
                }
            }
        }
    }
}

fn upload_image(gpu: &SharedGpu, image: &ImageData) -> EngineResult<Texture> {
    let texture = gpu.generate_texture(image.width, image.height, image.precision, true)?;
    if let Err(e) = gpu.update_texture(&texture, &image.data) {
        let _ = gpu.destroy_texture(&texture);
        return Err(e);
    }
    gpu.generate_mipmaps(&texture)?;
    // Blocking flush: "ready" must mean the texture is truly usable.
    gpu.flush()?;
    Ok(texture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::backend::GpuBackend;
    use crate::gpu::headless::HeadlessGpu;
    use crate::gpu::types::TexturePrecision;

    fn setup_uploader() -> (Arc<HeadlessGpu>, AsyncUploader) {
        let gpu = Arc::new(HeadlessGpu::new());
        let uploader = AsyncUploader::new(gpu.clone());
        (gpu, uploader)
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..1000 {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_upload_ticket_lifecycle() {
        let (gpu, uploader) = setup_uploader();
        let image = Arc::new(ImageData::solid(2, 2, [10, 20, 30, 255]));
        let id = uploader.generate_texture_from_image(image.clone());

        assert!(uploader.upload_exists(id));
        assert!(wait_until(|| uploader.is_upload_ready(id)));

        let texture = uploader.get_upload(id).unwrap();
        assert_eq!((texture.width, texture.height), (2, 2));
        assert_eq!(gpu.texture_pixels(texture.handle).unwrap(), image.data);
        assert!(gpu.flush_count() >= 1);

        uploader.destroy_upload(id);
        assert!(!uploader.upload_exists(id));
        assert!(!uploader.is_upload_ready(id));

        uploader.stop().unwrap();
    }

    #[test]
    fn test_deletion_ticket_short_circuits() {
        let (gpu, uploader) = setup_uploader();
        let texture = gpu
            .generate_texture(4, 4, TexturePrecision::Usual, false)
            .unwrap();
        assert_eq!(gpu.live_texture_count(), 1);

        let id = uploader.delete_texture(texture);
        assert!(wait_until(|| !uploader.upload_exists(id)));
        assert_eq!(gpu.live_texture_count(), 0);
        assert!(!uploader.is_upload_ready(id));

        uploader.stop().unwrap();
    }

    #[test]
    fn test_failed_upload_marks_ticket() {
        let (gpu, uploader) = setup_uploader();
        // Deliberately inconsistent byte length.
        let broken = Arc::new(ImageData {
            width: 4,
            height: 4,
            precision: TexturePrecision::Usual,
            data: vec![0; 3],
        });
        let id = uploader.generate_texture_from_image(broken);

        assert!(wait_until(|| uploader.upload_failed(id)));
        assert!(!uploader.is_upload_ready(id));
        assert!(uploader.upload_exists(id));
        // The half-created texture must not leak.
        assert_eq!(gpu.live_texture_count(), 0);

        uploader.destroy_upload(id);
        uploader.stop().unwrap();
    }

    #[test]
    fn test_stop_joins_worker() {
        let (_gpu, uploader) = setup_uploader();
        uploader.stop().unwrap();
        // Stopping twice is harmless.
        uploader.stop().unwrap();
    }
}
