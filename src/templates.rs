use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::components::{PropertyBag, SceneNode};
use crate::scene::{self, TransformDoc};

/// A reusable node-tree definition. Instantiating one materializes the whole
/// subtree; placement and `scene/instantiate` both go through here.
#[derive(Serialize, Deserialize, Clone)]
pub struct TemplateDef {
    pub type_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub transform: TransformDoc,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub children: Vec<TemplateDef>,
}

#[derive(Resource)]
pub struct TemplateRegistry {
    templates: HashMap<String, TemplateDef>,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        let mut registry = Self {
            templates: HashMap::new(),
        };
        for (name, def) in builtin_templates() {
            registry.templates.insert(name.to_string(), def);
        }
        registry
    }
}

impl TemplateRegistry {
    pub fn get(&self, name: &str) -> Option<&TemplateDef> {
        self.templates.get(name)
    }

    pub fn insert(&mut self, name: String, def: TemplateDef) {
        self.templates.insert(name, def);
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.templates.keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

/// Materialize a template under `parent`. The instance root gets `name`
/// (made unique among siblings); nested nodes keep their template names.
/// The whole new subtree is marked document-owned.
pub fn instantiate(
    world: &mut World,
    def: &TemplateDef,
    name: &str,
    parent: Entity,
) -> Entity {
    let unique = scene::ensure_unique_name(world, parent, name);
    let root = spawn_def(world, def, &unique, parent);
    scene::propagate_ownership(world, root);
    root
}

fn spawn_def(world: &mut World, def: &TemplateDef, root_name: &str, parent: Entity) -> Entity {
    let mut spawned_root = None;
    let mut stack: Vec<(&TemplateDef, Entity, Option<&str>)> = vec![(def, parent, Some(root_name))];
    while let Some((template, target_parent, forced_name)) = stack.pop() {
        let name = forced_name
            .map(str::to_string)
            .or_else(|| template.name.clone())
            .unwrap_or_else(|| template.type_name.clone());
        let mut node = SceneNode::new(name, template.type_name.clone());
        node.groups = template.groups.iter().cloned().collect();
        let entity = scene::spawn_node(world, target_parent, node, template.transform.to_transform());
        if let Some(mut bag) = world.get_mut::<PropertyBag>(entity) {
            for (key, value) in &template.properties {
                bag.0.insert(
                    key.clone(),
                    crate::bridge::types::TypedValue::from_json(value),
                );
            }
        }
        if spawned_root.is_none() {
            spawned_root = Some(entity);
        }
        for child in template.children.iter().rev() {
            stack.push((child, entity, None));
        }
    }
    spawned_root.unwrap_or(parent)
}

fn builtin_templates() -> Vec<(&'static str, TemplateDef)> {
    let rock = TemplateDef {
        type_name: "MeshNode".into(),
        name: Some("Rock".into()),
        transform: TransformDoc::default(),
        properties: props(&[("mesh", serde_json::json!({ "resource": "meshes/rock.mesh" }))]),
        groups: vec!["props".into()],
        children: Vec::new(),
    };
    let pine = TemplateDef {
        type_name: "Spatial".into(),
        name: Some("PineTree".into()),
        transform: TransformDoc::default(),
        properties: serde_json::Map::new(),
        groups: vec!["flora".into()],
        children: vec![
            TemplateDef {
                type_name: "MeshNode".into(),
                name: Some("Trunk".into()),
                transform: TransformDoc::default(),
                properties: props(&[(
                    "mesh",
                    serde_json::json!({ "resource": "meshes/pine_trunk.mesh" }),
                )]),
                groups: Vec::new(),
                children: Vec::new(),
            },
            TemplateDef {
                type_name: "MeshNode".into(),
                name: Some("Canopy".into()),
                transform: TransformDoc {
                    position: [0.0, 2.4, 0.0],
                    ..Default::default()
                },
                properties: props(&[(
                    "mesh",
                    serde_json::json!({ "resource": "meshes/pine_canopy.mesh" }),
                )]),
                groups: Vec::new(),
                children: Vec::new(),
            },
        ],
    };
    let fence_post = TemplateDef {
        type_name: "MeshNode".into(),
        name: Some("FencePost".into()),
        transform: TransformDoc::default(),
        properties: props(&[(
            "mesh",
            serde_json::json!({ "resource": "meshes/fence_post.mesh" }),
        )]),
        groups: vec!["props".into()],
        children: Vec::new(),
    };
    let supply_crate = TemplateDef {
        type_name: "MeshNode".into(),
        name: Some("SupplyCrate".into()),
        transform: TransformDoc::default(),
        properties: props(&[("mesh", serde_json::json!({ "resource": "meshes/crate.mesh" }))]),
        groups: vec!["props".into()],
        children: Vec::new(),
    };
    vec![
        ("rock", rock),
        ("pine_tree", pine),
        ("fence_post", fence_post),
        ("supply_crate", supply_crate),
    ]
}

fn props(entries: &[(&str, serde_json::Value)]) -> serde_json::Map<String, serde_json::Value> {
    let mut map = serde_json::Map::new();
    for (key, value) in entries {
        map.insert((*key).to_string(), value.clone());
    }
    map
}
