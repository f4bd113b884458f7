use bevy::prelude::*;
use std::collections::HashSet;
use std::path::PathBuf;

use crate::bridge::types::TypedValue;

/// An editable node in the scene graph. Everything the bridge can address
/// carries one of these; plain Bevy entities (cameras, lights spawned by the
/// host shell) without it are invisible to clients.
#[derive(Component, Clone)]
pub struct SceneNode {
    pub name: String,
    pub type_name: String,
    pub groups: HashSet<String>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            groups: HashSet::new(),
        }
    }
}

/// Dynamically typed named properties attached to a node. Built-in spatial
/// properties (position, rotation, scale, visible, name) live on Transform /
/// Visibility / SceneNode instead and are special-cased by the property
/// handlers.
#[derive(Component, Default, Clone)]
pub struct PropertyBag(pub std::collections::HashMap<String, TypedValue>);

/// Marks a node as belonging to the edited document. Persistence only walks
/// owned nodes, so every node the bridge creates must carry this, including
/// nested structure inside instantiated templates.
#[derive(Component)]
pub struct DocumentOwned;

/// The current editor selection. Entities are re-resolved on every request;
/// stale entries are dropped when read.
#[derive(Resource, Default)]
pub struct Selection(pub Vec<Entity>);

/// Root of the edited scene plus the file it was loaded from, if any.
#[derive(Resource)]
pub struct EditedScene {
    pub entity: Entity,
    pub path: Option<String>,
}

/// Whether the scene is currently "running" (debug/run_scene).
#[derive(Resource, Default)]
pub struct RunState {
    pub running: bool,
    pub started_at: Option<std::time::Instant>,
}

#[derive(Resource)]
pub struct HeadlessMode(pub bool);

#[derive(Resource, Clone)]
pub struct EditorConfig {
    pub project_dir: PathBuf,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("project"),
        }
    }
}

/// Node classes a client may create directly. Anything richer comes in as a
/// template instance.
pub const NODE_TYPES: &[&str] = &[
    "Node",
    "Spatial",
    "MeshNode",
    "LightNode",
    "CameraNode",
    "Marker",
];

pub fn is_known_node_type(type_name: &str) -> bool {
    NODE_TYPES.contains(&type_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_node_types_include_basics() {
        assert!(is_known_node_type("Node"));
        assert!(is_known_node_type("Spatial"));
        assert!(!is_known_node_type("RigidBody"));
    }
}
