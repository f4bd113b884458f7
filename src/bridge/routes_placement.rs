use super::*;

// ── Terrain queries (spatial misses are results, not errors) ─────────────

pub(super) fn terrain_height(world: &mut World, body: &Body) -> Result<Value, String> {
    let x = req_f32(body, "x")?;
    let z = req_f32(body, "z")?;
    let terrain = world.resource::<Terrain>();
    Ok(column_height(terrain, x, z))
}

pub(super) fn terrain_heights(world: &mut World, body: &Body) -> Result<Value, String> {
    let positions = body
        .get("positions")
        .and_then(Value::as_array)
        .ok_or("Missing required field: positions")?;
    let terrain = world.resource::<Terrain>();

    let mut heights = Vec::new();
    for item in positions {
        let Some(pair) = item.as_array() else {
            continue;
        };
        let (Some(x), Some(z)) = (
            pair.first().and_then(Value::as_f64),
            pair.get(1).and_then(Value::as_f64),
        ) else {
            continue;
        };
        heights.push(column_height(terrain, x as f32, z as f32));
    }
    Ok(json!({ "count": heights.len(), "heights": heights }))
}

pub(super) fn terrain_normal(world: &mut World, body: &Body) -> Result<Value, String> {
    let x = req_f32(body, "x")?;
    let z = req_f32(body, "z")?;
    let terrain = world.resource::<Terrain>();
    Ok(match raycast::cast_column(terrain, x, z) {
        Some(hit) => json!({
            "x": x,
            "z": z,
            "normal": hit.normal.to_array(),
            "slope": placement::slope_degrees(hit.normal),
            "hit": true,
        }),
        None => json!({
            "x": x,
            "z": z,
            "normal": [0.0, 1.0, 0.0],
            "slope": 0.0,
            "hit": false,
        }),
    })
}

pub(super) fn terrain_raycast(world: &mut World, body: &Body) -> Result<Value, String> {
    let from = opt_vec3(body, "from")?.ok_or("Missing required field: from")?;
    let to = opt_vec3(body, "to")?.ok_or("Missing required field: to")?;
    let mask = body
        .get("mask")
        .and_then(Value::as_u64)
        .map(|m| m as u32);
    let terrain = world.resource::<Terrain>();
    Ok(
        match raycast::cast(
            terrain,
            Vec3::from_array(from),
            Vec3::from_array(to),
            mask,
        ) {
            Some(hit) => json!({
                "hit": true,
                "position": hit.position.to_array(),
                "normal": hit.normal.to_array(),
            }),
            None => json!({ "hit": false }),
        },
    )
}

fn column_height(terrain: &Terrain, x: f32, z: f32) -> Value {
    match raycast::cast_column(terrain, x, z) {
        Some(hit) => json!({ "x": x, "z": z, "height": hit.position.y, "hit": true }),
        None => json!({ "x": x, "z": z, "height": 0.0, "hit": false }),
    }
}

// ── Placement endpoints ──────────────────────────────────────────────────

pub(super) fn placement_scatter(world: &mut World, body: &Body) -> Result<Value, String> {
    let request: placement::ScatterRequest = from_body(body)?;
    placement::scatter(world, &request)
}

pub(super) fn placement_along_path(world: &mut World, body: &Body) -> Result<Value, String> {
    let request: placement::PathRequest = from_body(body)?;
    placement::along_path(world, &request)
}

pub(super) fn placement_grid(world: &mut World, body: &Body) -> Result<Value, String> {
    let request: placement::GridRequest = from_body(body)?;
    placement::grid(world, &request)
}
