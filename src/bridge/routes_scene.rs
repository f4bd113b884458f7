use super::*;

pub(super) fn ping(world: &mut World, _body: &Body) -> Result<Value, String> {
    let scene_path = world.resource::<EditedScene>().path.clone();
    Ok(json!({
        "status": "ok",
        "editor": "strata",
        "version": env!("CARGO_PKG_VERSION"),
        "scene": scene_path,
    }))
}

pub(super) fn scene_tree(world: &mut World, _body: &Body) -> Result<Value, String> {
    let root = world.resource::<EditedScene>().entity;
    Ok(scene::serialize_tree(world, root, scene::TREE_DEPTH_CAP))
}

pub(super) fn scene_tree_flat(world: &mut World, _body: &Body) -> Result<Value, String> {
    let root = world.resource::<EditedScene>().entity;
    let nodes = scene::flat_nodes(world, root);
    Ok(json!({ "count": nodes.len(), "nodes": nodes }))
}

pub(super) fn scene_open(world: &mut World, body: &Body) -> Result<Value, String> {
    let scene_path = req_str(body, "scene_path")?;
    let file = scene_file_path(world, scene_path)?;
    let text = std::fs::read_to_string(&file)
        .map_err(|e| format!("Cannot read {}: {e}", file.display()))?;
    let doc: scene::SceneDocument =
        serde_json::from_str(&text).map_err(|e| format!("Invalid scene file: {e}"))?;

    // Replace the edited content wholesale; the root entity itself survives
    // so resources keep a stable handle.
    let root = world.resource::<EditedScene>().entity;
    for child in scene::children_of(world, root) {
        scene::delete_subtree(world, child);
    }
    if let Some(mut node) = world.get_mut::<SceneNode>(root) {
        node.name = doc.root.name.clone();
        node.groups = doc.root.groups.iter().cloned().collect();
    }
    let mut imported = 0usize;
    for child in &doc.root.children {
        scene::import_scene(world, child, root);
        imported += 1;
    }
    world.resource_mut::<EditedScene>().path = Some(scene_path.to_string());
    println!("[Strata] Opened scene {scene_path}");
    Ok(json!({ "opened": scene_path, "top_level_nodes": imported }))
}

pub(super) fn scene_save(world: &mut World, body: &Body) -> Result<Value, String> {
    let scene_path = match opt_str(body, "scene_path") {
        Some(p) => p.to_string(),
        None => world
            .resource::<EditedScene>()
            .path
            .clone()
            .ok_or("No scene path set; pass scene_path")?,
    };
    let file = scene_file_path(world, &scene_path)?;
    let root = world.resource::<EditedScene>().entity;
    let doc = scene::export_scene(world, root);
    let text = serde_json::to_string_pretty(&doc).map_err(|e| e.to_string())?;
    if let Some(parent) = file.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    std::fs::write(&file, text).map_err(|e| format!("Cannot write {}: {e}", file.display()))?;
    world.resource_mut::<EditedScene>().path = Some(scene_path.clone());
    println!("[Strata] Saved scene {scene_path}");
    Ok(json!({ "saved": scene_path }))
}

pub(super) fn scene_instantiate(world: &mut World, body: &Body) -> Result<Value, String> {
    let template_name = template_field(body)?;
    let def = lookup_template(world, template_name)?;
    let parent = resolve_parent(world, opt_str(body, "parent_path"))?;
    let position = opt_vec3(body, "position")?;
    let rotation = opt_vec3(body, "rotation")?;
    let scale = opt_vec3(body, "scale")?;

    let base = opt_str(body, "node_name")
        .map(str::to_string)
        .or_else(|| def.name.clone())
        .unwrap_or_else(|| def.type_name.clone());
    let entity = templates::instantiate(world, &def, &base, parent);
    apply_transform_overrides(world, entity, position, rotation, scale);
    Ok(json!({ "node_path": scene::node_path(world, entity) }))
}

/// Batch instantiation. Items that fail to resolve are skipped silently;
/// only the succeeded subset is reported.
pub(super) fn scene_instantiate_many(world: &mut World, body: &Body) -> Result<Value, String> {
    let template_name = template_field(body)?;
    let def = lookup_template(world, template_name)?;
    let parent = resolve_parent(world, opt_str(body, "parent_path"))?;
    let items = body
        .get("instances")
        .and_then(Value::as_array)
        .ok_or("Missing required field: instances")?;

    let mut created = Vec::new();
    for item in items {
        let Some(item) = item.as_object() else {
            continue;
        };
        let Ok(position) = opt_vec3(item, "position") else {
            continue;
        };
        let Ok(rotation) = opt_vec3(item, "rotation") else {
            continue;
        };
        let Ok(scale) = opt_vec3(item, "scale") else {
            continue;
        };
        let base = opt_str(item, "name")
            .map(str::to_string)
            .or_else(|| def.name.clone())
            .unwrap_or_else(|| def.type_name.clone());
        let entity = templates::instantiate(world, &def, &base, parent);
        apply_transform_overrides(world, entity, position, rotation, scale);
        created.push(scene::node_path(world, entity));
    }
    Ok(json!({ "count": created.len(), "created": created }))
}

// ── Selection ────────────────────────────────────────────────────────────

pub(super) fn editor_selected(world: &mut World, _body: &Body) -> Result<Value, String> {
    let selection = live_selection(world);
    let paths: Vec<String> = selection
        .iter()
        .map(|e| scene::node_path(world, *e))
        .collect();
    world.resource_mut::<Selection>().0 = selection;
    Ok(json!({ "count": paths.len(), "selected": paths }))
}

pub(super) fn editor_select(world: &mut World, body: &Body) -> Result<Value, String> {
    let paths = str_list(body, "node_paths")?;
    let mut resolved = Vec::new();
    for path in &paths {
        if let Some(entity) = scene::resolve_path(world, path) {
            resolved.push(entity);
        }
    }
    select_entities(world, resolved)
}

pub(super) fn editor_select_by_type(world: &mut World, body: &Body) -> Result<Value, String> {
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
    select_entities(world, found)
}

pub(super) fn editor_select_by_group(world: &mut World, body: &Body) -> Result<Value, String> {
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
    select_entities(world, found)
}

fn select_entities(world: &mut World, entities: Vec<Entity>) -> Result<Value, String> {
    let paths: Vec<String> = entities
        .iter()
        .map(|e| scene::node_path(world, *e))
        .collect();
    world.resource_mut::<Selection>().0 = entities;
    Ok(json!({ "count": paths.len(), "selected": paths }))
}

/// Selection entries re-checked against the live world; despawned or
/// de-noded entities are dropped.
pub(super) fn live_selection(world: &World) -> Vec<Entity> {
    world
        .resource::<Selection>()
        .0
        .iter()
        .copied()
        .filter(|e| world.get::<SceneNode>(*e).is_some())
        .collect()
}

// ── Shared helpers ───────────────────────────────────────────────────────

pub(super) fn template_field(body: &Body) -> Result<&str, String> {
    opt_str(body, "template")
        .or_else(|| opt_str(body, "scene_path"))
        .ok_or_else(|| "Missing required field: template".to_string())
}

pub(super) fn lookup_template(
    world: &World,
    name: &str,
) -> Result<crate::templates::TemplateDef, String> {
    world
        .resource::<TemplateRegistry>()
        .get(name)
        .cloned()
        .ok_or_else(|| format!("Unknown template: {name}"))
}

pub(super) fn resolve_parent(world: &World, parent_path: Option<&str>) -> Result<Entity, String> {
    match parent_path {
        None => Ok(world.resource::<EditedScene>().entity),
        Some(path) => scene::resolve_path(world, path)
            .ok_or_else(|| format!("Parent path not found: {path}")),
    }
}

pub(super) fn apply_transform_overrides(
    world: &mut World,
    entity: Entity,
    position: Option<[f32; 3]>,
    rotation: Option<[f32; 3]>,
    scale: Option<[f32; 3]>,
) {
    if let Some(mut transform) = world.get_mut::<Transform>(entity) {
        if let Some(p) = position {
            transform.translation = Vec3::from_array(p);
        }
        if let Some(r) = rotation {
            transform.rotation = Quat::from_euler(
                EulerRot::XYZ,
                r[0].to_radians(),
                r[1].to_radians(),
                r[2].to_radians(),
            );
        }
        if let Some(s) = scale {
            transform.scale = Vec3::from_array(s);
        }
    }
}

/// Scene files live under the project directory; path traversal is refused.
pub(super) fn scene_file_path(
    world: &World,
    scene_path: &str,
) -> Result<std::path::PathBuf, String> {
    if scene_path.contains("..") || scene_path.starts_with('/') {
        return Err(format!("Invalid scene path: {scene_path}"));
    }
    let config = world.resource::<EditorConfig>();
    Ok(config.project_dir.join(scene_path))
}
