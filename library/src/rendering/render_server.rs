use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::evaluation::context::{EvalContext, RenderPass};
use crate::evaluation::diagnostics::FrameDiagnostics;
use crate::evaluation::engine;
use crate::gpu::backend::SharedGpu;
use crate::gpu::types::{Framebuffer, TexturePrecision};
use crate::model::pin::PinId;
use crate::model::project::Project;
use crate::model::value::DynValue;
use crate::nodes::scratch::ScratchTable;
use crate::rendering::services::RenderServices;
use crate::util::timing::ScopedTimer;

/// Tunables for the render and upload threads.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Paces frames at this rate instead of the project's framerate.
    pub framerate_override: Option<f64>,
    /// Sleep between wakeups while no project is loaded.
    pub idle_sleep_ms: u64,
    /// Sleep between wakeups while the upload queue is empty.
    pub upload_poll_ms: u64,
    /// Color precision stamped onto projects created through the server.
    pub default_precision: TexturePrecision,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            framerate_override: None,
            idle_sleep_ms: 50,
            upload_poll_ms: 20,
            default_precision: TexturePrecision::Usual,
        }
    }
}

impl RenderConfig {
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    pub fn upload_poll_interval(&self) -> Duration {
        Duration::from_millis(self.upload_poll_ms)
    }
}

enum ControlMessage {
    SetProject(Box<Project>),
    Seek(f64),
    Shutdown,
}

/// Drives the async render loop on its own thread.
///
/// The interactive side talks to the loop through a control channel plus a
/// handful of shared flags; it reads results exclusively from front-phase
/// state (framebuffer, pin cache, diagnostics), so it never observes a
/// half-written frame.
pub struct RenderServer {
    services: RenderServices,
    config: RenderConfig,
    tx: Sender<ControlMessage>,
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    must_render: Arc<AtomicBool>,
    playing: Arc<AtomicBool>,
    pass_counter: Arc<AtomicU64>,
    fatal: Arc<Mutex<Option<EngineError>>>,
}

impl RenderServer {
    pub fn new(gpu: SharedGpu, config: RenderConfig) -> Self {
        let services = RenderServices::new(gpu, &config);
        let (tx, rx) = channel::<ControlMessage>();

        let running = Arc::new(AtomicBool::new(true));
        let must_render = Arc::new(AtomicBool::new(false));
        let playing = Arc::new(AtomicBool::new(false));
        let pass_counter = Arc::new(AtomicU64::new(0));
        let fatal = Arc::new(Mutex::new(None));

        let handle = {
            let services = services.clone();
            let config = config.clone();
            let running = running.clone();
            let must_render = must_render.clone();
            let playing = playing.clone();
            let pass_counter = pass_counter.clone();
            let fatal = fatal.clone();
            thread::spawn(move || {
                render_loop(
                    services,
                    config,
                    rx,
                    running,
                    must_render,
                    playing,
                    pass_counter,
                    fatal,
                );
            })
        };

        Self {
            services,
            config,
            tx,
            handle: Some(handle),
            running,
            must_render,
            playing,
            pass_counter,
            fatal,
        }
    }

    pub fn services(&self) -> &RenderServices {
        &self.services
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Blank project carrying the server's configured defaults.
    pub fn new_project(&self, name: &str) -> Project {
        let mut project = Project::new(name);
        project.color_precision = self.config.default_precision;
        project
    }

    /// Hands a project to the render thread and requests a frame.
    pub fn set_project(&self, project: Project) {
        let _ = self.tx.send(ControlMessage::SetProject(Box::new(project)));
        self.force_render_frame();
    }

    /// Moves the playhead and requests a frame.
    pub fn seek(&self, frame: f64) {
        let _ = self.tx.send(ControlMessage::Seek(frame));
        self.force_render_frame();
    }

    pub fn set_preview_scale(&self, scale: f32) {
        self.services.compositor.set_preview_scale(scale);
        self.force_render_frame();
    }

    pub fn play(&self) {
        self.playing.store(true, Ordering::SeqCst);
        self.force_render_frame();
    }

    pub fn pause(&self) {
        self.playing.store(false, Ordering::SeqCst);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// Forces one pass even while paused.
    pub fn force_render_frame(&self) {
        self.must_render.store(true, Ordering::SeqCst);
    }

    pub fn cancel_render_frame(&self) {
        self.must_render.store(false, Ordering::SeqCst);
    }

    pub fn must_render_frame(&self) -> bool {
        self.must_render.load(Ordering::SeqCst)
    }

    /// Render passes completed since startup. Two per frame: rendering,
    /// then audio.
    pub fn render_pass_count(&self) -> u64 {
        self.pass_counter.load(Ordering::SeqCst)
    }

    /// Composite of the last completed frame.
    pub fn front_framebuffer(&self) -> Option<Framebuffer> {
        self.services.compositor.front_framebuffer()
    }

    /// Pin value produced in the last completed frame.
    pub fn front_pin_value(&self, pin_id: PinId) -> Option<DynValue> {
        self.services.pin_cache.front_value(pin_id)
    }

    pub fn front_diagnostics(&self) -> FrameDiagnostics {
        self.services.diagnostics.front()
    }

    /// Stops the loop and the upload worker, joins both, and surfaces any
    /// stored render-thread failure.
    pub fn stop(mut self) -> EngineResult<()> {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.tx.send(ControlMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| EngineError::Render("render thread panicked".to_string()))?;
        }
        self.services.uploader.stop()?;
        if let Some(error) = self.fatal.lock().unwrap().take() {
            return Err(error);
        }
        Ok(())
    }
}

impl Drop for RenderServer {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.tx.send(ControlMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn render_loop(
    services: RenderServices,
    config: RenderConfig,
    rx: Receiver<ControlMessage>,
    running: Arc<AtomicBool>,
    must_render: Arc<AtomicBool>,
    playing: Arc<AtomicBool>,
    pass_counter: Arc<AtomicU64>,
    fatal: Arc<Mutex<Option<EngineError>>>,
) {
    if let Err(e) = services
        .gpu
        .reserve_context()
        .and_then(|context| services.gpu.make_context_current(context))
    {
        error!("render thread could not acquire a context: {}", e);
        *fatal.lock().unwrap() = Some(e);
        return;
    }
    info!("render thread online");

    let mut project: Option<Project> = None;
    let mut scratch = ScratchTable::new();

    while running.load(Ordering::SeqCst) {
        // Drain accumulated control messages so a burst of edits collapses
        // into a single pass over the latest state.
        while let Ok(message) = rx.try_recv() {
            match message {
                ControlMessage::SetProject(next) => {
                    replace_project(&services, &mut project, &mut scratch, *next);
                }
                ControlMessage::Seek(frame) => {
                    if let Some(project) = project.as_mut() {
                        project.seek(frame);
                    }
                }
                ControlMessage::Shutdown => {
                    running.store(false, Ordering::SeqCst);
                }
            }
        }
        if !running.load(Ordering::SeqCst) {
            break;
        }

        // Idle: nothing to evaluate.
        let Some(active) = project.as_mut() else {
            thread::sleep(config.idle_sleep());
            continue;
        };

        // WaitingForRenderRequest: stay hot but hand the core back.
        if !playing.load(Ordering::SeqCst) && !must_render.load(Ordering::SeqCst) {
            thread::yield_now();
            continue;
        }

        let frame_started = Instant::now();
        // The flag is consumed by the pass that honors it; a request
        // arriving mid-pass schedules the next one.
        must_render.store(false, Ordering::SeqCst);

        // Rendering.
        if let Err(e) = render_passes(&services, active, &mut scratch, &pass_counter) {
            error!("render pass failed: {}", e);
            *fatal.lock().unwrap() = Some(e);
            running.store(false, Ordering::SeqCst);
            break;
        }

        // Composing. The flush guarantees the composite is complete before
        // the flip publishes it.
        if let Err(e) = services
            .compositor
            .perform_composition(active, None)
            .and_then(|_| services.gpu.flush())
        {
            error!("composition failed: {}", e);
            *fatal.lock().unwrap() = Some(e);
            running.store(false, Ordering::SeqCst);
            break;
        }

        // Flip: readers move onto the frame that just finished.
        services.buffering_index.flip();

        if playing.load(Ordering::SeqCst) {
            active.advance_playhead(1.0);
        }

        // Pacing.
        let framerate = config
            .framerate_override
            .unwrap_or(active.framerate)
            .max(1.0);
        let ideal = Duration::from_secs_f64(1.0 / framerate);
        let elapsed = frame_started.elapsed();
        if elapsed < ideal {
            thread::sleep(ideal - elapsed);
        }
    }

    scratch.destroy(&services.gpu, &services.uploader);
    if let Err(e) = services.compositor.destroy() {
        error!("compositor teardown failed: {}", e);
    }
    info!("render thread offline");
}

fn replace_project(
    services: &RenderServices,
    slot: &mut Option<Project>,
    scratch: &mut ScratchTable,
    next: Project,
) {
    scratch.destroy(&services.gpu, &services.uploader);
    services.pin_cache.set_both(HashMap::new());
    services.compositor.reset();
    debug!(
        "project '{}' loaded ({} compositions)",
        next.name,
        next.compositions.len()
    );
    *slot = Some(next);
}

/// One full frame of graph evaluation: the rendering pass, then the audio
/// pass, each under a fresh pass ID.
fn render_passes(
    services: &RenderServices,
    project: &Project,
    scratch: &mut ScratchTable,
    pass_counter: &AtomicU64,
) -> EngineResult<()> {
    services.compositor.ensure_resolution_constraints(project)?;
    services.compositor.clear_bundles();
    services.pin_cache.clear_current();
    services.diagnostics.reset_current();

    for pass in [RenderPass::Rendering, RenderPass::Audio] {
        let pass_id = pass_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let _timer = ScopedTimer::debug_lazy(|| {
            format!("{:?} pass {} (frame {})", pass, pass_id, project.current_frame)
        });

        let mut ctx = EvalContext::new(services, project, pass, pass_id, scratch);
        for composition in &project.compositions {
            engine::evaluate_composition(&mut ctx, composition);
            if let Some(error) = ctx.take_fatal() {
                return Err(error);
            }
        }
    }
    Ok(())
}
