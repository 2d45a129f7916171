use std::collections::HashSet;

use crate::error::EngineError;
use crate::model::composition::Composition;
use crate::model::project::Project;
use crate::nodes::scratch::ScratchTable;
use crate::rendering::services::RenderServices;

/// Which half of the frame a pass is evaluating.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderPass {
    /// Everything except audio nodes.
    Rendering,
    /// Only nodes flagged `does_audio_mixing`.
    Audio,
}

/// Everything a node behavior may touch while executing: the immutable
/// document, the shared engine services, per-node scratch state, and the
/// bookkeeping that makes recursion safe.
pub struct EvalContext<'a> {
    pub services: &'a RenderServices,
    pub project: &'a Project,
    pub pass: RenderPass,
    /// Monotonically increasing per pass; nodes use it to spot stale
    /// cached work.
    pub pass_id: u64,
    /// Project playhead frozen for the duration of the pass.
    pub current_frame: f64,
    pub scratch: &'a mut ScratchTable,
    /// Nodes currently being resolved; a re-entry means the graph has a
    /// cycle and the pull must fail instead of recursing forever.
    in_progress: HashSet<i32>,
    fatal: Option<EngineError>,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        services: &'a RenderServices,
        project: &'a Project,
        pass: RenderPass,
        pass_id: u64,
        scratch: &'a mut ScratchTable,
    ) -> Self {
        Self {
            services,
            project,
            pass,
            pass_id,
            current_frame: project.current_frame,
            scratch,
            in_progress: HashSet::new(),
            fatal: None,
        }
    }

    /// Marks a node as being resolved. Returns `false` when the node is
    /// already on the resolution stack, i.e. the pull is cyclic.
    pub fn enter(&mut self, node_id: i32) -> bool {
        self.in_progress.insert(node_id)
    }

    pub fn leave(&mut self, node_id: i32) {
        self.in_progress.remove(&node_id);
    }

    pub fn warn(&self, node_id: i32, message: impl Into<String>) {
        self.services.diagnostics.warn(node_id, message);
    }

    pub fn count_execution(&self, node_id: i32) {
        self.services.diagnostics.count_execution(node_id);
    }

    /// Records an infrastructure failure. The render loop aborts the frame
    /// once the composition finishes; the first error wins.
    pub fn record_fatal(&mut self, error: EngineError) {
        if self.fatal.is_none() {
            self.fatal = Some(error);
        }
    }

    pub fn take_fatal(&mut self) -> Option<EngineError> {
        self.fatal.take()
    }

    /// Playhead in the composition's local time.
    pub fn local_frame(&self, composition: &Composition) -> f64 {
        self.current_frame - composition.begin_frame
    }

    /// Output resolution every managed framebuffer sizes itself to.
    pub fn required_resolution(&self) -> (u32, u32) {
        self.services.compositor.required_resolution(self.project)
    }
}
