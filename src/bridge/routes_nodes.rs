use super::*;

pub(super) fn node_create(world: &mut World, body: &Body) -> Result<Value, String> {
    let node_type = req_str(body, "node_type")?;
    let node_name = req_str(body, "node_name")?;
    if !crate::components::is_known_node_type(node_type) {
        return Err(format!("Unknown node type: {node_type}"));
    }
    let parent = routes_scene::resolve_parent(world, opt_str(body, "parent_path"))?;
    let position = opt_vec3(body, "position")?;
    let rotation = opt_vec3(body, "rotation")?;
    let scale = opt_vec3(body, "scale")?;

    let name = scene::ensure_unique_name(world, parent, node_name);
    let entity = scene::spawn_node(
        world,
        parent,
        SceneNode::new(name, node_type),
        Transform::IDENTITY,
    );
    routes_scene::apply_transform_overrides(world, entity, position, rotation, scale);
    scene::propagate_ownership(world, entity);
    Ok(json!({ "node_path": scene::node_path(world, entity) }))
}

/// Batch creation: items that fail validation are skipped, successes are
/// reported. Per-item atomicity, not per-batch.
pub(super) fn node_create_many(world: &mut World, body: &Body) -> Result<Value, String> {
    let items = body
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or("Missing required field: nodes")?;
    let mut created = Vec::new();
    for item in items {
        let Some(item) = item.as_object() else {
            continue;
        };
        if let Ok(result) = node_create(world, item) {
            if let Some(path) = result.get("node_path").and_then(Value::as_str) {
                created.push(path.to_string());
            }
        }
    }
    Ok(json!({ "count": created.len(), "created": created }))
}

pub(super) fn node_delete(world: &mut World, body: &Body) -> Result<Value, String> {
    let node_path = req_str(body, "node_path")?;
    let entity = resolve_node(world, node_path)?;
    if entity == world.resource::<EditedScene>().entity {
        return Err("Cannot delete the scene root".into());
    }
    scene::delete_subtree(world, entity);
    Ok(json!({ "deleted": node_path }))
}

pub(super) fn node_duplicate(world: &mut World, body: &Body) -> Result<Value, String> {
    let node_path = req_str(body, "node_path")?;
    let entity = resolve_node(world, node_path)?;
    if entity == world.resource::<EditedScene>().entity {
        return Err("Cannot duplicate the scene root".into());
    }
    let offset = opt_vec3(body, "offset")?;
    let copy = scene::duplicate_subtree(world, entity, opt_str(body, "new_name"));
    if let Some(offset) = offset {
        if let Some(mut transform) = world.get_mut::<Transform>(copy) {
            transform.translation += Vec3::from_array(offset);
        }
    }
    Ok(json!({ "node_path": scene::node_path(world, copy) }))
}

// ── Properties ───────────────────────────────────────────────────────────

pub(super) fn node_properties(world: &mut World, body: &Body) -> Result<Value, String> {
    let node_path = req_str(body, "node_path")?;
    let entity = resolve_node(world, node_path)?;
    let filter: Option<Vec<String>> = body
        .get("filter")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        });

    let mut properties = serde_json::Map::new();
    let include = |key: &str| filter.as_ref().map_or(true, |f| f.iter().any(|k| k == key));

    let node = world.get::<SceneNode>(entity).ok_or("Node disappeared")?;
    if include("name") {
        properties.insert("name".into(), json!(node.name));
    }
    if include("type") {
        properties.insert("type".into(), json!(node.type_name));
    }
    if include("groups") {
        let mut groups: Vec<&str> = node.groups.iter().map(String::as_str).collect();
        groups.sort_unstable();
        properties.insert("groups".into(), json!(groups));
    }
    if let Some(transform) = world.get::<Transform>(entity) {
        if include("position") {
            properties.insert("position".into(), json!(transform.translation.to_array()));
        }
        if include("rotation") {
            let (rx, ry, rz) = transform.rotation.to_euler(EulerRot::XYZ);
            properties.insert(
                "rotation".into(),
                json!([rx.to_degrees(), ry.to_degrees(), rz.to_degrees()]),
            );
        }
        if include("scale") {
            properties.insert("scale".into(), json!(transform.scale.to_array()));
        }
    }
    if include("visible") {
        if let Some(visibility) = world.get::<Visibility>(entity) {
            properties.insert("visible".into(), json!(*visibility != Visibility::Hidden));
        }
    }
    if let Some(bag) = world.get::<PropertyBag>(entity) {
        let mut keys: Vec<&String> = bag.0.keys().collect();
        keys.sort_unstable();
        for key in keys {
            if include(key) {
                properties.insert(key.clone(), bag.0[key].to_json());
            }
        }
    }
    Ok(json!({ "node_path": node_path, "properties": properties }))
}

pub(super) fn node_set_property(world: &mut World, body: &Body) -> Result<Value, String> {
    let node_path = req_str(body, "node_path")?;
    let property = req_str(body, "property")?;
    let value = body.get("value").ok_or("Missing required field: value")?;
    let entity = resolve_node(world, node_path)?;
    let op = decode_property(property, value)?;
    apply_property(world, entity, op);
    Ok(json!({
        "node_path": scene::node_path(world, entity),
        "property": property,
        "value": value,
    }))
}

/// Multi-property set on one node. All values are decoded up front so a bad
/// one rejects the whole request before anything mutates.
pub(super) fn node_set_properties(world: &mut World, body: &Body) -> Result<Value, String> {
    let node_path = req_str(body, "node_path")?;
    let properties = body
        .get("properties")
        .and_then(Value::as_object)
        .ok_or("Missing required field: properties")?;
    let entity = resolve_node(world, node_path)?;

    let mut ops = Vec::with_capacity(properties.len());
    for (key, value) in properties {
        ops.push(decode_property(key, value)?);
    }
    let count = ops.len();
    for op in ops {
        apply_property(world, entity, op);
    }
    Ok(json!({
        "node_path": scene::node_path(world, entity),
        "set": count,
    }))
}

pub(super) fn node_add_to_group(world: &mut World, body: &Body) -> Result<Value, String> {
    modify_group(world, body, true)
}

pub(super) fn node_remove_from_group(world: &mut World, body: &Body) -> Result<Value, String> {
    modify_group(world, body, false)
}

fn modify_group(world: &mut World, body: &Body, add: bool) -> Result<Value, String> {
    let node_path = req_str(body, "node_path")?;
    let group = req_str(body, "group")?;
    let entity = resolve_node(world, node_path)?;
    let mut node = world
        .get_mut::<SceneNode>(entity)
        .ok_or("Node disappeared")?;
    if add {
        node.groups.insert(group.to_string());
    } else {
        node.groups.remove(group);
    }
    let mut groups: Vec<String> = node.groups.iter().cloned().collect();
    groups.sort_unstable();
    Ok(json!({ "node_path": node_path, "group": group, "groups": groups }))
}

// ── Batch operations (lenient: failed items are skipped) ─────────────────

pub(super) fn batch_set_property(world: &mut World, body: &Body) -> Result<Value, String> {
    let paths = str_list(body, "node_paths")?;
    let property = req_str(body, "property")?;
    let value = body.get("value").ok_or("Missing required field: value")?;
    let op = decode_property(property, value)?;

    let mut updated = Vec::new();
    for path in &paths {
        let Some(entity) = scene::resolve_path(world, path) else {
            continue;
        };
        apply_property(world, entity, op.clone());
        updated.push(path.clone());
    }
    Ok(json!({ "updated": updated.len(), "nodes": updated }))
}

pub(super) fn batch_add_to_group(world: &mut World, body: &Body) -> Result<Value, String> {
    let paths = str_list(body, "node_paths")?;
    let group = req_str(body, "group")?;
    let mut updated = Vec::new();
    for path in &paths {
        let Some(entity) = scene::resolve_path(world, path) else {
            continue;
        };
        let Some(mut node) = world.get_mut::<SceneNode>(entity) else {
            continue;
        };
        node.groups.insert(group.to_string());
        updated.push(path.clone());
    }
    Ok(json!({ "updated": updated.len(), "nodes": updated }))
}

pub(super) fn batch_delete_by_type(world: &mut World, body: &Body) -> Result<Value, String> {
    let type_name = req_str(body, "type")?;
    let root = world.resource::<EditedScene>().entity;
    let found = scene::search(
        world,
        root,
        &scene::SearchCriteria {
            type_name: Some(type_name.to_string()),
            ..Default::default()
        },
    );
    Ok(json!({ "deleted": delete_all(world, found) }))
}

pub(super) fn batch_delete_by_group(world: &mut World, body: &Body) -> Result<Value, String> {
    let group = req_str(body, "group")?;
    let root = world.resource::<EditedScene>().entity;
    let found = scene::search(
        world,
        root,
        &scene::SearchCriteria {
            group: Some(group.to_string()),
            ..Default::default()
        },
    );
    Ok(json!({ "deleted": delete_all(world, found) }))
}

fn delete_all(world: &mut World, entities: Vec<Entity>) -> usize {
    let mut deleted = 0usize;
    for entity in entities {
        // subtree deletion may have already taken a nested match with it
        if world.get::<SceneNode>(entity).is_some() {
            scene::delete_subtree(world, entity);
            deleted += 1;
        }
    }
    deleted
}

/// Swap a mesh resource reference everywhere it is used.
pub(super) fn batch_replace_mesh(world: &mut World, body: &Body) -> Result<Value, String> {
    let old = req_str(body, "old_mesh_path")?;
    let new = req_str(body, "new_mesh_path")?;
    let root = world.resource::<EditedScene>().entity;
    let nodes = scene::collect_subtree(world, root);

    let mut replaced = 0usize;
    for entity in nodes {
        let Some(mut bag) = world.get_mut::<PropertyBag>(entity) else {
            continue;
        };
        if bag.0.get("mesh") == Some(&TypedValue::Resource(old.to_string())) {
            bag.0
                .insert("mesh".into(), TypedValue::Resource(new.to_string()));
            replaced += 1;
        }
    }
    Ok(json!({ "replaced": replaced, "old": old, "new": new }))
}

// ── Property plumbing ────────────────────────────────────────────────────

#[derive(Clone)]
pub(super) enum PropertyOp {
    Position(Vec3),
    Rotation(Vec3),
    Scale(Vec3),
    Visible(bool),
    Rename(String),
    Bag(String, TypedValue),
}

/// Decode a property assignment without touching the world, so multi-set
/// handlers can validate everything first.
pub(super) fn decode_property(name: &str, value: &Value) -> Result<PropertyOp, String> {
    match name {
        "position" | "rotation" | "scale" => {
            let nums = value
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_f64)
                        .map(|f| f as f32)
                        .collect::<Vec<f32>>()
                })
                .filter(|nums| nums.len() == 3)
                .ok_or_else(|| format!("Property {name} expects a [x, y, z] array"))?;
            let v = Vec3::new(nums[0], nums[1], nums[2]);
            Ok(match name {
                "position" => PropertyOp::Position(v),
                "rotation" => PropertyOp::Rotation(v),
                _ => PropertyOp::Scale(v),
            })
        }
        "visible" => value
            .as_bool()
            .map(PropertyOp::Visible)
            .ok_or_else(|| "Property visible expects a boolean".to_string()),
        "name" => value
            .as_str()
            .map(|s| PropertyOp::Rename(s.to_string()))
            .ok_or_else(|| "Property name expects a string".to_string()),
        _ => Ok(PropertyOp::Bag(
            name.to_string(),
            TypedValue::from_json(value),
        )),
    }
}

pub(super) fn apply_property(world: &mut World, entity: Entity, op: PropertyOp) {
    match op {
        PropertyOp::Position(v) => {
            if let Some(mut t) = world.get_mut::<Transform>(entity) {
                t.translation = v;
            }
        }
        PropertyOp::Rotation(v) => {
            if let Some(mut t) = world.get_mut::<Transform>(entity) {
                t.rotation = Quat::from_euler(
                    EulerRot::XYZ,
                    v.x.to_radians(),
                    v.y.to_radians(),
                    v.z.to_radians(),
                );
            }
        }
        PropertyOp::Scale(v) => {
            if let Some(mut t) = world.get_mut::<Transform>(entity) {
                t.scale = v;
            }
        }
        PropertyOp::Visible(show) => {
            if let Some(mut visibility) = world.get_mut::<Visibility>(entity) {
                *visibility = if show {
                    Visibility::Inherited
                } else {
                    Visibility::Hidden
                };
            }
        }
        PropertyOp::Rename(name) => {
            let unchanged = world
                .get::<SceneNode>(entity)
                .map_or(false, |n| n.name == name);
            if unchanged {
                return;
            }
            let parent = world.get::<Parent>(entity).map(|p| p.get());
            let unique = match parent {
                Some(parent) => scene::ensure_unique_name(world, parent, &name),
                None => name,
            };
            if let Some(mut node) = world.get_mut::<SceneNode>(entity) {
                node.name = unique;
            }
        }
        PropertyOp::Bag(key, value) => {
            if let Some(mut bag) = world.get_mut::<PropertyBag>(entity) {
                bag.0.insert(key, value);
            }
        }
    }
}

pub(super) fn resolve_node(world: &World, path: &str) -> Result<Entity, String> {
    scene::resolve_path(world, path).ok_or_else(|| format!("Node not found: {path}"))
}
