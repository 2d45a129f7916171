use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::gpu::types::TexturePrecision;
use crate::model::composition::Composition;
use crate::model::node::Node;
use crate::model::pin::{ensure_ids_above, PinId, UNCONNECTED};

/// The whole editable document: ordered compositions plus the playhead and
/// output settings the render loop consumes.
///
/// Two derived lookup tables (pin → node, node → composition) back the
/// weak-reference resolution used everywhere during evaluation. They are
/// never persisted; [`Project::from_json`] rebuilds them.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Project {
    pub name: String,
    pub preferred_resolution: (u32, u32),
    pub framerate: f64,
    pub background_color: [f32; 4],
    #[serde(default)]
    pub color_precision: TexturePrecision,
    #[serde(default)]
    pub current_frame: f64,
    pub compositions: Vec<Composition>,
    #[serde(skip)]
    pin_owners: HashMap<PinId, i32>,
    #[serde(skip)]
    node_owners: HashMap<i32, i32>,
}

impl Project {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            preferred_resolution: (1280, 720),
            framerate: 60.0,
            background_color: [0.0, 0.0, 0.0, 1.0],
            color_precision: TexturePrecision::Usual,
            current_frame: 0.0,
            compositions: Vec::new(),
            pin_owners: HashMap::new(),
            node_owners: HashMap::new(),
        }
    }

    pub fn add_composition(&mut self, composition: Composition) -> i32 {
        let id = composition.id;
        self.compositions.push(composition);
        self.rebuild_graph_index();
        id
    }

    pub fn composition_by_id(&self, id: i32) -> Option<&Composition> {
        self.compositions
            .iter()
            .find(|composition| composition.id == id)
    }

    pub fn composition_by_id_mut(&mut self, id: i32) -> Option<&mut Composition> {
        self.compositions
            .iter_mut()
            .find(|composition| composition.id == id)
    }

    pub fn composition_of_node(&self, node_id: i32) -> Option<&Composition> {
        let composition_id = *self.node_owners.get(&node_id)?;
        self.composition_by_id(composition_id)
    }

    pub fn node_by_id(&self, node_id: i32) -> Option<&Node> {
        self.composition_of_node(node_id)
            .and_then(|composition| composition.node(node_id))
    }

    /// Resolves a weak pin reference to the node owning that pin.
    pub fn node_by_pin(&self, pin_id: PinId) -> Option<&Node> {
        if pin_id == UNCONNECTED {
            return None;
        }
        let node_id = *self.pin_owners.get(&pin_id)?;
        self.node_by_id(node_id)
    }

    /// Rebuilds the pin/node ownership tables and bumps the ID allocator
    /// past everything the document already uses. Call after graph edits
    /// done directly on compositions.
    pub fn rebuild_graph_index(&mut self) {
        self.pin_owners.clear();
        self.node_owners.clear();
        let mut max_id = 0;
        for composition in &self.compositions {
            max_id = max_id.max(composition.max_owned_id());
            for node in composition.nodes.values() {
                self.node_owners.insert(node.node_id, composition.id);
                for pin in node.pins() {
                    self.pin_owners.insert(pin.pin_id, node.node_id);
                }
            }
        }
        ensure_ids_above(max_id);
    }

    /// Connections whose target pin no longer exists anywhere.
    pub fn dangling_connections(&self) -> Vec<(i32, PinId)> {
        let mut dangling = Vec::new();
        for composition in &self.compositions {
            for node in composition.nodes.values() {
                for pin in node.pins() {
                    if pin.connected_pin_id != UNCONNECTED
                        && !self.pin_owners.contains_key(&pin.connected_pin_id)
                    {
                        dangling.push((node.node_id, pin.connected_pin_id));
                    }
                }
            }
        }
        dangling
    }

    /// Timeline length: the latest composition end.
    pub fn length_in_frames(&self) -> f64 {
        self.compositions
            .iter()
            .map(|composition| composition.end_frame)
            .fold(0.0, f64::max)
    }

    pub fn seek(&mut self, frame: f64) {
        self.current_frame = frame.clamp(0.0, self.length_in_frames());
    }

    /// Free-running playback: advance and wrap at the timeline end.
    pub fn advance_playhead(&mut self, frames: f64) {
        let length = self.length_in_frames();
        self.current_frame += frames;
        if length > 0.0 && self.current_frame > length {
            self.current_frame = 0.0;
        }
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> EngineResult<Self> {
        let mut project: Project = serde_json::from_str(json)?;
        project.rebuild_graph_index();
        for (node_id, pin_id) in project.dangling_connections() {
            warn!(
                "node {} references missing pin {} in '{}'",
                node_id, pin_id, project.name
            );
        }
        Ok(project)
    }

    pub fn save_file(&self, path: impl AsRef<Path>) -> EngineResult<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::value::DynValue;

    fn setup_project() -> (Project, i32, i32) {
        let mut composition = Composition::new("Main", 0.0, 48.0);
        let mut source = Node::new("value.float");
        source.add_output_pin("Value");
        source.setup_attribute("Value", DynValue::Float(3.0));
        let mut sink = Node::new("math.add");
        sink.add_input_pin("A");
        sink.add_input_pin("B");
        sink.add_output_pin("Value");
        let source_id = composition.add_node(source);
        let sink_id = composition.add_node(sink);
        composition.connect(source_id, "Value", sink_id, "A");

        let mut project = Project::new("test");
        project.add_composition(composition);
        (project, source_id, sink_id)
    }

    #[test]
    fn test_pin_index_resolves_owners() {
        let (project, source_id, sink_id) = setup_project();
        let sink = project.node_by_id(sink_id).unwrap();
        let connected = sink.attribute_pin("A").unwrap().connected_pin_id;

        let owner = project.node_by_pin(connected).unwrap();
        assert_eq!(owner.node_id, source_id);
        assert!(project.node_by_pin(UNCONNECTED).is_none());
        assert!(project.dangling_connections().is_empty());
    }

    #[test]
    fn test_dangling_connection_is_reported() {
        let (mut project, _, sink_id) = setup_project();
        let composition_id = project.compositions[0].id;
        project
            .composition_by_id_mut(composition_id)
            .unwrap()
            .node_mut(sink_id)
            .unwrap()
            .connect_attribute("B", 999_999);
        project.rebuild_graph_index();

        let dangling = project.dangling_connections();
        assert_eq!(dangling, vec![(sink_id, 999_999)]);
    }

    #[test]
    fn test_playhead_wraps_at_timeline_end() {
        let (mut project, _, _) = setup_project();
        project.seek(47.0);
        project.advance_playhead(1.0);
        assert_eq!(project.current_frame, 48.0);
        project.advance_playhead(1.0);
        assert_eq!(project.current_frame, 0.0);

        project.seek(500.0);
        assert_eq!(project.current_frame, 48.0);
    }

    #[test]
    fn test_json_round_trip_preserves_the_graph() {
        let (project, _, sink_id) = setup_project();
        let json = project.to_json().unwrap();
        let restored = Project::from_json(&json).unwrap();

        assert_eq!(restored, project);
        // The rebuilt index still resolves connections.
        let sink = restored.node_by_id(sink_id).unwrap();
        let connected = sink.attribute_pin("A").unwrap().connected_pin_id;
        assert!(restored.node_by_pin(connected).is_some());
    }

    #[test]
    fn test_file_round_trip() {
        let (project, _, _) = setup_project();
        let path = std::env::temp_dir().join(format!(
            "montage_project_{}_{}.json",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));

        project.save_file(&path).unwrap();
        let restored = Project::load_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(restored, project);
        assert!(Project::load_file(&path).is_err());
    }
}
