use std::collections::HashMap;

use log::warn;

use crate::buffering::index::SharedBufferingIndex;
use crate::buffering::value::DoubleBuffered;

/// One warning raised while evaluating a node.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub node_id: i32,
    pub message: String,
}

/// Everything observed during one pass batch.
#[derive(Clone, Debug, Default)]
pub struct FrameDiagnostics {
    pub warnings: Vec<Diagnostic>,
    /// How many times each node's behavior ran this frame.
    pub executions: HashMap<i32, u32>,
}

/// Double-buffered evaluation observability: the engine records into the
/// current phase, the interactive thread reads the completed front phase.
/// Purely observational; nothing here changes evaluation results.
pub struct DiagnosticsChannel {
    frames: DoubleBuffered<FrameDiagnostics>,
}

impl DiagnosticsChannel {
    pub fn new(index: SharedBufferingIndex) -> Self {
        Self {
            frames: DoubleBuffered::new(index, FrameDiagnostics::default()),
        }
    }

    pub fn warn(&self, node_id: i32, message: impl Into<String>) {
        let message = message.into();
        warn!("node {}: {}", node_id, message);
        self.frames
            .current()
            .warnings
            .push(Diagnostic { node_id, message });
    }

    pub fn count_execution(&self, node_id: i32) {
        *self.frames.current().executions.entry(node_id).or_insert(0) += 1;
    }

    pub fn reset_current(&self) {
        let mut current = self.frames.current();
        current.warnings.clear();
        current.executions.clear();
    }

    /// Snapshot of the last completed frame's diagnostics.
    pub fn front(&self) -> FrameDiagnostics {
        self.frames.front().clone()
    }

    /// Execution count recorded in the pass currently being written.
    pub fn current_executions(&self, node_id: i32) -> u32 {
        self.frames
            .current()
            .executions
            .get(&node_id)
            .copied()
            .unwrap_or(0)
    }

    /// Warnings recorded in the pass currently being written.
    pub fn current_warnings(&self) -> Vec<Diagnostic> {
        self.frames.current().warnings.clone()
    }
}
