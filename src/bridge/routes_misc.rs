use super::*;

// ── Search ───────────────────────────────────────────────────────────────

pub(super) fn search_nodes(world: &mut World, body: &Body) -> Result<Value, String> {
    let criteria = scene::SearchCriteria {
        type_name: opt_str(body, "type").map(str::to_string),
        name_contains: opt_str(body, "name_contains").map(str::to_string),
        group: opt_str(body, "group").map(str::to_string),
        has_property: opt_str(body, "has_property").map(str::to_string),
    };
    run_search(world, criteria)
}

pub(super) fn search_by_type(world: &mut World, body: &Body) -> Result<Value, String> {
    let type_name = req_str(body, "type")?;
    run_search(
        world,
        scene::SearchCriteria {
            type_name: Some(type_name.to_string()),
            ..Default::default()
        },
    )
}

pub(super) fn search_by_group(world: &mut World, body: &Body) -> Result<Value, String> {
    let group = req_str(body, "group")?;
    run_search(
        world,
        scene::SearchCriteria {
            group: Some(group.to_string()),
            ..Default::default()
        },
    )
}

pub(super) fn search_by_name(world: &mut World, body: &Body) -> Result<Value, String> {
    let pattern = req_str(body, "pattern")?;
    run_search(
        world,
        scene::SearchCriteria {
            name_contains: Some(pattern.to_string()),
            ..Default::default()
        },
    )
}

fn run_search(world: &World, criteria: scene::SearchCriteria) -> Result<Value, String> {
    let root = world.resource::<EditedScene>().entity;
    let nodes: Vec<Value> = scene::search(world, root, &criteria)
        .into_iter()
        .map(|e| scene::node_summary(world, e))
        .collect();
    Ok(json!({ "count": nodes.len(), "nodes": nodes }))
}

// ── Project file scans ───────────────────────────────────────────────────

pub(super) fn project_scenes(world: &mut World, _body: &Body) -> Result<Value, String> {
    let index = world.resource::<project::ProjectIndex>();
    Ok(json!({ "count": index.scenes.len(), "scenes": index.scenes }))
}

pub(super) fn project_scripts(world: &mut World, _body: &Body) -> Result<Value, String> {
    let index = world.resource::<project::ProjectIndex>();
    Ok(json!({ "count": index.scripts.len(), "scripts": index.scripts }))
}

// ── Run control ──────────────────────────────────────────────────────────

pub(super) fn debug_run_scene(world: &mut World, _body: &Body) -> Result<Value, String> {
    let mut run = world.resource_mut::<RunState>();
    let already = run.running;
    run.running = true;
    if !already {
        run.started_at = Some(std::time::Instant::now());
        println!("[Strata] Running scene");
    }
    Ok(json!({ "running": true, "was_running": already }))
}

pub(super) fn debug_stop(world: &mut World, _body: &Body) -> Result<Value, String> {
    let mut run = world.resource_mut::<RunState>();
    let was = run.running;
    run.running = false;
    run.started_at = None;
    if was {
        println!("[Strata] Stopped scene");
    }
    Ok(json!({ "running": false, "was_running": was }))
}

// ── Sandboxed evaluation ─────────────────────────────────────────────────
// The evaluator is a capability boundary, not an editor scripting hook: it
// sees a read-only snapshot of scene facts and cannot mutate anything.

pub(super) fn execute(world: &mut World, body: &Body) -> Result<Value, String> {
    let code = req_str(body, "code")?;
    let root = world.resource::<EditedScene>().entity;
    let selection = routes_scene::live_selection(world);
    let selected: Vec<String> = selection
        .iter()
        .map(|e| scene::node_path(world, *e))
        .collect();

    let scope = scripting::SceneScope {
        scene_name: world
            .get::<SceneNode>(root)
            .map(|n| n.name.clone())
            .unwrap_or_default(),
        node_count: scene::collect_subtree(world, root).len() as i64,
        selected,
    };
    let result = scripting::evaluate(code, &scope.to_vars())?;
    Ok(json!({ "result": result }))
}

/// Evaluate once per selected node. Per-node failures are reported inline
/// rather than failing the whole request.
pub(super) fn execute_on_selected(world: &mut World, body: &Body) -> Result<Value, String> {
    let code = req_str(body, "code")?;
    let selection = routes_scene::live_selection(world);
    if selection.is_empty() {
        return Err("Nothing selected".into());
    }

    let mut results = Vec::new();
    for entity in selection {
        let path = scene::node_path(world, entity);
        let node = world.get::<SceneNode>(entity).cloned();
        let position = scene::world_position(world, entity);
        let vars = scripting::node_vars(
            node.as_ref().map(|n| n.name.as_str()).unwrap_or(""),
            &path,
            node.as_ref().map(|n| n.type_name.as_str()).unwrap_or(""),
            position.to_array(),
        );
        match scripting::evaluate(code, &vars) {
            Ok(value) => results.push(json!({ "node": path, "result": value })),
            Err(e) => results.push(json!({ "node": path, "error": e })),
        }
    }
    Ok(json!({ "count": results.len(), "results": results }))
}
