use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::bridge::types::TypedValue;
use crate::components::{DocumentOwned, EditedScene, PropertyBag, SceneNode};

/// Depth cap for tree-to-JSON serialization. Nodes at the cap are emitted
/// with a truncation marker and their subtrees are skipped.
pub const TREE_DEPTH_CAP: usize = 32;

pub const SCENE_VERSION: u32 = 1;

// ── Path resolution ──────────────────────────────────────────────────────

/// Resolve a slash-separated node path against the current scene root.
/// `""`, `"."` and `"/"` all mean the root. A leading root name segment is
/// accepted and skipped, so absolute-style paths from older clients work.
/// Paths are never cached — the scene may have been edited between requests.
pub fn resolve_path(world: &World, path: &str) -> Option<Entity> {
    let root = world.get_resource::<EditedScene>()?.entity;
    let trimmed = path.trim().trim_start_matches('/');
    if trimmed.is_empty() || trimmed == "." {
        return Some(root);
    }
    let mut segments = trimmed.split('/').filter(|s| !s.is_empty()).peekable();
    if let (Some(first), Some(node)) = (segments.peek(), world.get::<SceneNode>(root)) {
        if *first == node.name {
            segments.next();
        }
    }
    let mut current = root;
    for segment in segments {
        current = find_child_by_name(world, current, segment)?;
    }
    Some(current)
}

/// Path of a node relative to the scene root (the root itself is `"."`).
pub fn node_path(world: &World, entity: Entity) -> String {
    let root = match world.get_resource::<EditedScene>() {
        Some(r) => r.entity,
        None => return ".".to_string(),
    };
    if entity == root {
        return ".".to_string();
    }
    let mut segments = Vec::new();
    let mut current = entity;
    while current != root {
        let Some(node) = world.get::<SceneNode>(current) else {
            return ".".to_string();
        };
        segments.push(node.name.clone());
        let Some(parent) = world.get::<Parent>(current) else {
            break;
        };
        current = parent.get();
    }
    segments.reverse();
    segments.join("/")
}

pub fn find_child_by_name(world: &World, parent: Entity, name: &str) -> Option<Entity> {
    for child in children_of(world, parent) {
        if let Some(node) = world.get::<SceneNode>(child) {
            if node.name == name {
                return Some(child);
            }
        }
    }
    None
}

/// Direct scene-node children, in hierarchy order. Host-internal entities
/// (cameras, lights without a SceneNode) are filtered out.
pub fn children_of(world: &World, entity: Entity) -> Vec<Entity> {
    match world.get::<Children>(entity) {
        Some(children) => children
            .iter()
            .copied()
            .filter(|c| world.get::<SceneNode>(*c).is_some())
            .collect(),
        None => Vec::new(),
    }
}

/// World-space position composed down the parent chain. Transform
/// propagation may not have run this frame (or at all, headless), so the
/// chain is folded directly.
pub fn world_transform(world: &World, entity: Entity) -> Transform {
    let mut chain = Vec::new();
    let mut current = Some(entity);
    while let Some(e) = current {
        if let Some(t) = world.get::<Transform>(e) {
            chain.push(*t);
        }
        current = world.get::<Parent>(e).map(|p| p.get());
    }
    let mut acc = Transform::IDENTITY;
    for t in chain.iter().rev() {
        acc = acc.mul_transform(*t);
    }
    acc
}

pub fn world_position(world: &World, entity: Entity) -> Vec3 {
    world_transform(world, entity).translation
}

// ── Node lifecycle ───────────────────────────────────────────────────────

/// Append `_2`, `_3`, … until the name is unique among `parent`'s children.
pub fn ensure_unique_name(world: &World, parent: Entity, base: &str) -> String {
    if find_child_by_name(world, parent, base).is_none() {
        return base.to_string();
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("{base}_{n}");
        if find_child_by_name(world, parent, &candidate).is_none() {
            return candidate;
        }
        n += 1;
    }
}

/// Spawn a bare node under `parent`. Document ownership is NOT set here —
/// callers propagate it over whatever subtree they finish building, so the
/// invariant covers nested template structure too.
pub fn spawn_node(
    world: &mut World,
    parent: Entity,
    node: SceneNode,
    transform: Transform,
) -> Entity {
    let entity = world
        .spawn((node, PropertyBag::default(), transform, Visibility::default()))
        .id();
    world.entity_mut(parent).add_child(entity);
    entity
}

/// Every entity in the subtree rooted at `root`, root first, iteratively.
pub fn collect_subtree(world: &World, root: Entity) -> Vec<Entity> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(entity) = stack.pop() {
        out.push(entity);
        for child in children_of(world, entity) {
            stack.push(child);
        }
    }
    out
}

/// Mark the whole subtree as part of the edited document. Required after
/// any programmatic construction (templates can nest arbitrarily deep).
pub fn propagate_ownership(world: &mut World, root: Entity) {
    for entity in collect_subtree(world, root) {
        world.entity_mut(entity).insert(DocumentOwned);
    }
}

/// Copy a subtree next to the source node. Returns the new root.
pub fn duplicate_subtree(world: &mut World, source: Entity, new_name: Option<&str>) -> Entity {
    let parent = world
        .get::<Parent>(source)
        .map(|p| p.get())
        .unwrap_or(source);
    let base = new_name
        .map(str::to_string)
        .or_else(|| world.get::<SceneNode>(source).map(|n| n.name.clone()))
        .unwrap_or_else(|| "Node".to_string());
    let root_name = ensure_unique_name(world, parent, &base);

    let mut mapping: Option<Entity> = None;
    let mut stack = vec![(source, parent)];
    while let Some((src, dst_parent)) = stack.pop() {
        let Some(mut node) = world.get::<SceneNode>(src).cloned() else {
            continue;
        };
        if src == source {
            node.name = root_name.clone();
        }
        let bag = world.get::<PropertyBag>(src).cloned().unwrap_or_default();
        let transform = world.get::<Transform>(src).copied().unwrap_or_default();
        let copy = world
            .spawn((node, bag, transform, Visibility::default(), DocumentOwned))
            .id();
        world.entity_mut(dst_parent).add_child(copy);
        if src == source {
            mapping = Some(copy);
        }
        let children = children_of(world, src);
        for child in children.into_iter().rev() {
            stack.push((child, copy));
        }
    }
    mapping.unwrap_or(source)
}

pub fn delete_subtree(world: &mut World, entity: Entity) {
    world.entity_mut(entity).despawn_recursive();
}

// ── Serialization to wire JSON ───────────────────────────────────────────

pub fn node_summary(world: &World, entity: Entity) -> serde_json::Value {
    let node = world.get::<SceneNode>(entity);
    let pos = world_position(world, entity);
    let mut groups: Vec<&str> = node
        .map(|n| n.groups.iter().map(String::as_str).collect())
        .unwrap_or_default();
    groups.sort_unstable();
    serde_json::json!({
        "name": node.map(|n| n.name.as_str()).unwrap_or(""),
        "type": node.map(|n| n.type_name.as_str()).unwrap_or(""),
        "path": node_path(world, entity),
        "position": [pos.x, pos.y, pos.z],
        "groups": groups,
        "child_count": children_of(world, entity).len(),
    })
}

/// Nested tree JSON with an explicit work stack and a hard depth cap.
/// Nodes at the cap carry `"truncated": true` and no children array.
pub fn serialize_tree(world: &World, root: Entity, cap: usize) -> serde_json::Value {
    // Pre-order walk recording (entity, parent, depth), then reverse
    // assembly so every node's children are complete before it is attached.
    let mut order: Vec<(Entity, Option<Entity>, usize)> = Vec::new();
    let mut stack: Vec<(Entity, Option<Entity>, usize)> = vec![(root, None, 0)];
    while let Some((entity, parent, depth)) = stack.pop() {
        order.push((entity, parent, depth));
        if depth >= cap {
            continue;
        }
        for child in children_of(world, entity) {
            stack.push((child, Some(entity), depth + 1));
        }
    }

    let mut built: HashMap<Entity, serde_json::Value> = HashMap::new();
    for (entity, _, depth) in order.iter().rev() {
        let mut value = node_summary(world, *entity);
        if *depth >= cap && !children_of(world, *entity).is_empty() {
            value["truncated"] = serde_json::Value::Bool(true);
        } else {
            let children: Vec<serde_json::Value> = children_of(world, *entity)
                .into_iter()
                .filter_map(|c| built.remove(&c))
                .collect();
            value["children"] = serde_json::Value::Array(children);
        }
        built.insert(*entity, value);
    }
    built.remove(&root).unwrap_or(serde_json::Value::Null)
}

/// Flat list of every node with its path and position.
pub fn flat_nodes(world: &World, root: Entity) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(entity) = stack.pop() {
        out.push(node_summary(world, entity));
        let children = children_of(world, entity);
        for child in children.into_iter().rev() {
            stack.push(child);
        }
    }
    out
}

// ── Search ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct SearchCriteria {
    pub type_name: Option<String>,
    pub name_contains: Option<String>,
    pub group: Option<String>,
    pub has_property: Option<String>,
}

pub fn has_property(world: &World, entity: Entity, name: &str) -> bool {
    if matches!(name, "position" | "rotation" | "scale" | "visible" | "name") {
        return world.get::<SceneNode>(entity).is_some();
    }
    world
        .get::<PropertyBag>(entity)
        .map(|bag| bag.0.contains_key(name))
        .unwrap_or(false)
}

/// Iterative filtered walk over the whole scene. Criteria are AND-ed;
/// an empty criteria set matches every node except the root.
pub fn search(world: &World, root: Entity, criteria: &SearchCriteria) -> Vec<Entity> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(entity) = stack.pop() {
        let children = children_of(world, entity);
        for child in children.into_iter().rev() {
            stack.push(child);
        }
        if entity == root {
            continue;
        }
        let Some(node) = world.get::<SceneNode>(entity) else {
            continue;
        };
        if let Some(t) = &criteria.type_name {
            if node.type_name != *t {
                continue;
            }
        }
        if let Some(sub) = &criteria.name_contains {
            if !node.name.to_lowercase().contains(&sub.to_lowercase()) {
                continue;
            }
        }
        if let Some(group) = &criteria.group {
            if !node.groups.contains(group) {
                continue;
            }
        }
        if let Some(prop) = &criteria.has_property {
            if !has_property(world, entity, prop) {
                continue;
            }
        }
        out.push(entity);
    }
    out
}

// ── Scene documents (open / save) ────────────────────────────────────────

#[derive(Serialize, Deserialize, Clone)]
pub struct TransformDoc {
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default)]
    pub rotation: [f32; 3],
    #[serde(default = "unit_scale")]
    pub scale: [f32; 3],
}

fn unit_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

impl Default for TransformDoc {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: unit_scale(),
        }
    }
}

impl TransformDoc {
    pub fn to_transform(&self) -> Transform {
        Transform {
            translation: Vec3::from_array(self.position),
            rotation: Quat::from_euler(
                EulerRot::XYZ,
                self.rotation[0].to_radians(),
                self.rotation[1].to_radians(),
                self.rotation[2].to_radians(),
            ),
            scale: Vec3::from_array(self.scale),
        }
    }

    pub fn from_transform(t: &Transform) -> Self {
        let (rx, ry, rz) = t.rotation.to_euler(EulerRot::XYZ);
        Self {
            position: t.translation.to_array(),
            rotation: [rx.to_degrees(), ry.to_degrees(), rz.to_degrees()],
            scale: t.scale.to_array(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub struct NodeDoc {
    pub name: String,
    pub type_name: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub transform: TransformDoc,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub children: Vec<NodeDoc>,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct SceneDocument {
    pub version: u32,
    pub root: NodeDoc,
}

/// Snapshot the subtree at `root` into a saveable document.
pub fn export_scene(world: &World, root: Entity) -> SceneDocument {
    let mut order: Vec<(Entity, Option<Entity>)> = Vec::new();
    let mut stack: Vec<(Entity, Option<Entity>)> = vec![(root, None)];
    while let Some((entity, parent)) = stack.pop() {
        order.push((entity, parent));
        let children = children_of(world, entity);
        for child in children.into_iter().rev() {
            stack.push((child, Some(entity)));
        }
    }

    let mut built: HashMap<Entity, NodeDoc> = HashMap::new();
    for (entity, _) in order.iter().rev() {
        let node = world.get::<SceneNode>(*entity);
        let mut groups: Vec<String> = node
            .map(|n| n.groups.iter().cloned().collect())
            .unwrap_or_default();
        groups.sort_unstable();
        let mut properties = serde_json::Map::new();
        if let Some(bag) = world.get::<PropertyBag>(*entity) {
            let mut keys: Vec<&String> = bag.0.keys().collect();
            keys.sort_unstable();
            for key in keys {
                properties.insert(key.clone(), bag.0[key].to_json());
            }
        }
        let doc = NodeDoc {
            name: node.map(|n| n.name.clone()).unwrap_or_default(),
            type_name: node.map(|n| n.type_name.clone()).unwrap_or_default(),
            groups,
            transform: TransformDoc::from_transform(
                world.get::<Transform>(*entity).unwrap_or(&Transform::IDENTITY),
            ),
            properties,
            children: children_of(world, *entity)
                .into_iter()
                .filter_map(|c| built.remove(&c))
                .collect(),
        };
        built.insert(*entity, doc);
    }
    SceneDocument {
        version: SCENE_VERSION,
        root: built.remove(&root).unwrap_or(NodeDoc {
            name: "Root".into(),
            type_name: "Node".into(),
            groups: Vec::new(),
            transform: TransformDoc::default(),
            properties: serde_json::Map::new(),
            children: Vec::new(),
        }),
    }
}

/// Spawn a document subtree under `parent`. Returns the spawned root.
pub fn import_scene(world: &mut World, doc: &NodeDoc, parent: Entity) -> Entity {
    let mut spawned_root = None;
    let mut stack: Vec<(&NodeDoc, Entity)> = vec![(doc, parent)];
    while let Some((node_doc, target_parent)) = stack.pop() {
        let mut node = SceneNode::new(node_doc.name.clone(), node_doc.type_name.clone());
        node.groups = node_doc.groups.iter().cloned().collect();
        let entity = spawn_node(world, target_parent, node, node_doc.transform.to_transform());
        if let Some(mut bag) = world.get_mut::<PropertyBag>(entity) {
            for (key, value) in &node_doc.properties {
                bag.0.insert(key.clone(), TypedValue::from_json(value));
            }
        }
        if spawned_root.is_none() {
            spawned_root = Some(entity);
        }
        for child in node_doc.children.iter().rev() {
            stack.push((child, entity));
        }
    }
    let root = spawned_root.unwrap_or(parent);
    propagate_ownership(world, root);
    root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_world() -> (World, Entity) {
        let mut world = World::new();
        let root = world
            .spawn((
                SceneNode::new("Root", "Node"),
                PropertyBag::default(),
                Transform::IDENTITY,
                Visibility::default(),
                DocumentOwned,
            ))
            .id();
        world.insert_resource(EditedScene {
            entity: root,
            path: None,
        });
        (world, root)
    }

    fn add_child(world: &mut World, parent: Entity, name: &str, type_name: &str) -> Entity {
        spawn_node(
            world,
            parent,
            SceneNode::new(name, type_name),
            Transform::IDENTITY,
        )
    }

    #[test]
    fn resolve_path_walks_names() {
        let (mut world, root) = test_world();
        let a = add_child(&mut world, root, "Terrain", "Spatial");
        let b = add_child(&mut world, a, "Rocks", "Node");

        assert_eq!(resolve_path(&world, "."), Some(root));
        assert_eq!(resolve_path(&world, ""), Some(root));
        assert_eq!(resolve_path(&world, "Terrain"), Some(a));
        assert_eq!(resolve_path(&world, "/Terrain/Rocks"), Some(b));
        assert_eq!(resolve_path(&world, "Root/Terrain/Rocks"), Some(b));
        assert_eq!(resolve_path(&world, "Terrain/Missing"), None);
    }

    #[test]
    fn node_path_round_trips() {
        let (mut world, root) = test_world();
        let a = add_child(&mut world, root, "Props", "Node");
        let b = add_child(&mut world, a, "Barrel", "MeshNode");
        let path = node_path(&world, b);
        assert_eq!(path, "Props/Barrel");
        assert_eq!(resolve_path(&world, &path), Some(b));
    }

    #[test]
    fn unique_names_get_suffixes() {
        let (mut world, root) = test_world();
        add_child(&mut world, root, "Rock", "Node");
        assert_eq!(ensure_unique_name(&world, root, "Rock"), "Rock_2");
        add_child(&mut world, root, "Rock_2", "Node");
        assert_eq!(ensure_unique_name(&world, root, "Rock"), "Rock_3");
        assert_eq!(ensure_unique_name(&world, root, "Tree"), "Tree");
    }

    #[test]
    fn duplicate_copies_subtree_with_new_name() {
        let (mut world, root) = test_world();
        let src = add_child(&mut world, root, "House", "Spatial");
        add_child(&mut world, src, "Door", "MeshNode");
        let copy = duplicate_subtree(&mut world, src, None);
        assert_ne!(copy, src);
        assert_eq!(
            world.get::<SceneNode>(copy).unwrap().name,
            "House_2".to_string()
        );
        assert!(find_child_by_name(&world, copy, "Door").is_some());
    }

    #[test]
    fn serialize_tree_truncates_at_cap() {
        let (mut world, root) = test_world();
        let mut parent = root;
        for i in 0..6 {
            parent = add_child(&mut world, parent, &format!("N{i}"), "Node");
        }
        let tree = serialize_tree(&world, root, 3);
        let level3 = &tree["children"][0]["children"][0]["children"][0];
        assert_eq!(level3["name"], "N2");
        assert_eq!(level3["truncated"], true);
        assert!(level3.get("children").is_none());
    }

    #[test]
    fn search_filters_compose() {
        let (mut world, root) = test_world();
        let a = add_child(&mut world, root, "OakTree", "MeshNode");
        let b = add_child(&mut world, root, "PineTree", "MeshNode");
        add_child(&mut world, root, "Rock", "MeshNode");
        world
            .get_mut::<SceneNode>(a)
            .unwrap()
            .groups
            .insert("flora".to_string());
        world
            .get_mut::<SceneNode>(b)
            .unwrap()
            .groups
            .insert("flora".to_string());

        let by_type = search(
            &world,
            root,
            &SearchCriteria {
                type_name: Some("MeshNode".into()),
                ..Default::default()
            },
        );
        assert_eq!(by_type.len(), 3);

        let trees_in_flora = search(
            &world,
            root,
            &SearchCriteria {
                name_contains: Some("tree".into()),
                group: Some("flora".into()),
                ..Default::default()
            },
        );
        assert_eq!(trees_in_flora.len(), 2);
    }

    #[test]
    fn scene_document_round_trip() {
        let (mut world, root) = test_world();
        let a = add_child(&mut world, root, "Hill", "Spatial");
        let b = add_child(&mut world, a, "Flag", "MeshNode");
        world.get_mut::<Transform>(b).unwrap().translation = Vec3::new(1.0, 2.0, 3.0);
        if let Some(mut bag) = world.get_mut::<PropertyBag>(b) {
            bag.0
                .insert("mesh".into(), TypedValue::Resource("flag.mesh".into()));
        }

        let doc = export_scene(&world, root);
        let json = serde_json::to_string(&doc).unwrap();
        let parsed: SceneDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.version, SCENE_VERSION);

        let (mut world2, root2) = test_world();
        // import children of the saved root under the fresh root
        for child in &parsed.root.children {
            import_scene(&mut world2, child, root2);
        }
        let flag = resolve_path(&world2, "Hill/Flag").expect("imported");
        let pos = world.get::<Transform>(b).unwrap().translation;
        assert_eq!(
            world2.get::<Transform>(flag).unwrap().translation,
            pos
        );
        assert_eq!(
            world2.get::<PropertyBag>(flag).unwrap().0.get("mesh"),
            Some(&TypedValue::Resource("flag.mesh".into()))
        );
    }
}
