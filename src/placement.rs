use bevy::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng as _, SeedableRng};
use serde::Deserialize;
use std::f32::consts::TAU;

use crate::components::EditedScene;
use crate::raycast;
use crate::scene;
use crate::templates::{self, TemplateDef, TemplateRegistry};
use crate::terrain::Terrain;

/// Scatter gives up after `count * ATTEMPT_MULTIPLIER` candidate draws, so
/// sparse or steep terrain cannot loop forever. The response reports the
/// attempt count so callers can detect starvation.
pub const ATTEMPT_MULTIPLIER: usize = 10;

struct Rng(SmallRng);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }

    fn float(&mut self) -> f32 {
        self.0.gen()
    }

    fn range_f(&mut self, min: f32, max: f32) -> f32 {
        if max <= min {
            return min;
        }
        min + self.float() * (max - min)
    }
}

fn default_radius() -> f32 {
    10.0
}

fn default_max_slope() -> f32 {
    45.0
}

fn default_scale_range() -> [f32; 2] {
    [1.0, 1.0]
}

fn default_seed() -> u64 {
    42
}

fn default_spacing() -> f32 {
    5.0
}

fn default_grid_size() -> usize {
    5
}

#[derive(Deserialize, Clone)]
pub struct ScatterRequest {
    #[serde(alias = "scene_path")]
    pub template: String,
    pub count: usize,
    #[serde(default)]
    pub center: [f32; 3],
    #[serde(default = "default_radius")]
    pub radius: f32,
    #[serde(default)]
    pub min_distance: f32,
    /// Degrees between surface normal and world up.
    #[serde(default = "default_max_slope")]
    pub max_slope: f32,
    #[serde(default)]
    pub align_to_terrain: bool,
    #[serde(default, alias = "random_rotation")]
    pub random_rotation_y: bool,
    #[serde(default = "default_scale_range")]
    pub scale_range: [f32; 2],
    #[serde(default)]
    pub parent_path: Option<String>,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

#[derive(Deserialize, Clone)]
pub struct PathRequest {
    #[serde(alias = "scene_path")]
    pub template: String,
    pub points: Vec<[f32; 3]>,
    #[serde(default = "default_spacing")]
    pub spacing: f32,
    #[serde(default)]
    pub align_to_path: bool,
    #[serde(default)]
    pub snap_to_terrain: bool,
    #[serde(default)]
    pub parent_path: Option<String>,
}

#[derive(Deserialize, Clone)]
pub struct GridRequest {
    #[serde(alias = "scene_path")]
    pub template: String,
    #[serde(default)]
    pub origin: [f32; 3],
    #[serde(default = "default_grid_size")]
    pub size_x: usize,
    #[serde(default = "default_grid_size")]
    pub size_z: usize,
    #[serde(default = "default_spacing")]
    pub spacing: f32,
    #[serde(default)]
    pub snap_to_terrain: bool,
    #[serde(default)]
    pub parent_path: Option<String>,
}

/// An accepted scatter sample. Lives only for the duration of one placement
/// call; the engine checks new candidates against the samples accepted so
/// far in the same call.
pub struct Sample {
    pub position: Vec3,
    pub normal: Option<Vec3>,
    pub yaw: f32,
    pub scale: f32,
}

// ── Geometry helpers ─────────────────────────────────────────────────────

/// Angle in degrees between a surface normal and world up.
pub fn slope_degrees(normal: Vec3) -> f32 {
    normal
        .normalize_or_zero()
        .dot(Vec3::Y)
        .clamp(-1.0, 1.0)
        .acos()
        .to_degrees()
}

/// Orthonormal basis treating `normal` as up. World forward seeds the
/// tangent unless it is near-parallel to the normal, in which case world
/// right avoids the degenerate cross product.
pub fn terrain_basis(normal: Vec3) -> Quat {
    let up = normal.normalize_or_zero();
    if up == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    let reference = if up.dot(Vec3::NEG_Z).abs() > 0.99 {
        Vec3::X
    } else {
        Vec3::NEG_Z
    };
    let tangent = reference.cross(up).normalize();
    let back = tangent.cross(up);
    Quat::from_mat3(&Mat3::from_cols(tangent, up, back))
}

fn planar_distance(a: Vec3, x: f32, z: f32) -> f32 {
    let dx = a.x - x;
    let dz = a.z - z;
    (dx * dx + dz * dz).sqrt()
}

// ── Scatter ──────────────────────────────────────────────────────────────

/// Rejection-sample terrain positions inside a disk. Pure with respect to
/// the scene graph: only the heightfield and the RNG are consulted.
fn scatter_samples(terrain: &Terrain, req: &ScatterRequest, rng: &mut Rng) -> (Vec<Sample>, usize) {
    let budget = req.count * ATTEMPT_MULTIPLIER;
    let mut samples: Vec<Sample> = Vec::new();
    let mut attempts = 0usize;

    while samples.len() < req.count && attempts < budget {
        attempts += 1;
        let angle = rng.float() * TAU;
        // sqrt weighting: uniform density over the disk's area, not its radius
        let dist = rng.float().sqrt() * req.radius;
        let x = req.center[0] + angle.cos() * dist;
        let z = req.center[2] + angle.sin() * dist;

        if req.min_distance > 0.0
            && samples
                .iter()
                .any(|s| planar_distance(s.position, x, z) < req.min_distance)
        {
            continue;
        }
        let Some(hit) = raycast::cast_column(terrain, x, z) else {
            continue;
        };
        if slope_degrees(hit.normal) > req.max_slope {
            continue;
        }

        let yaw = if req.random_rotation_y {
            rng.float() * TAU
        } else {
            0.0
        };
        let scale = rng.range_f(req.scale_range[0], req.scale_range[1]);
        samples.push(Sample {
            position: hit.position,
            normal: req.align_to_terrain.then_some(hit.normal),
            yaw,
            scale,
        });
    }
    (samples, attempts)
}

fn sample_transform(sample: &Sample) -> Transform {
    let basis = match sample.normal {
        Some(normal) => terrain_basis(normal),
        None => Quat::IDENTITY,
    };
    Transform {
        translation: sample.position,
        rotation: basis * Quat::from_rotation_y(sample.yaw),
        scale: Vec3::splat(sample.scale),
    }
}

pub fn scatter(world: &mut World, req: &ScatterRequest) -> Result<serde_json::Value, String> {
    if req.count == 0 {
        return Err("count must be at least 1".into());
    }
    if req.radius <= 0.0 {
        return Err("radius must be positive".into());
    }
    if req.min_distance < 0.0 {
        return Err("min_distance must not be negative".into());
    }
    if !(0.0..=90.0).contains(&req.max_slope) {
        return Err("max_slope must be between 0 and 90 degrees".into());
    }
    if req.scale_range[0] <= 0.0 || req.scale_range[1] < req.scale_range[0] {
        return Err("scale_range must be [min, max] with 0 < min <= max".into());
    }
    let template = lookup_template(world, &req.template)?;
    let parent = resolve_parent(world, req.parent_path.as_deref())?;

    let terrain = world.resource::<Terrain>().clone();
    let mut rng = Rng::new(req.seed);
    let (samples, attempts) = scatter_samples(&terrain, req, &mut rng);

    let mut created = Vec::new();
    for sample in &samples {
        let path = place_instance(world, &template, parent, sample_transform(sample));
        created.push(path);
    }
    Ok(serde_json::json!({
        "created": created,
        "count": created.len(),
        "requested": req.count,
        "attempts": attempts,
    }))
}

// ── Path placement ───────────────────────────────────────────────────────

pub struct PathPoint {
    pub position: Vec3,
    pub direction: Vec3,
}

/// Walk consecutive waypoint segments placing a point every `spacing` units
/// of arc length. Distance left over past a segment's end carries into the
/// next segment, so spacing stays continuous across joints.
pub fn path_points(points: &[Vec3], spacing: f32) -> Vec<PathPoint> {
    let mut out = Vec::new();
    let mut offset = 0.0f32;
    for pair in points.windows(2) {
        let seg = pair[1] - pair[0];
        let len = seg.length();
        if len <= 1e-5 {
            continue;
        }
        let dir = seg / len;
        let mut d = offset;
        while d <= len {
            out.push(PathPoint {
                position: pair[0] + dir * d,
                direction: dir,
            });
            d += spacing;
        }
        offset = d - len;
    }
    out
}

pub fn along_path(world: &mut World, req: &PathRequest) -> Result<serde_json::Value, String> {
    if req.points.len() < 2 {
        return Err("points must contain at least 2 waypoints".into());
    }
    if req.spacing <= 0.0 {
        return Err("spacing must be positive".into());
    }
    let template = lookup_template(world, &req.template)?;
    let parent = resolve_parent(world, req.parent_path.as_deref())?;

    let terrain = world.resource::<Terrain>().clone();
    let waypoints: Vec<Vec3> = req.points.iter().map(|p| Vec3::from_array(*p)).collect();

    let mut created = Vec::new();
    for point in path_points(&waypoints, req.spacing) {
        let mut transform = Transform::from_translation(point.position);
        if req.snap_to_terrain {
            if let Some(hit) = raycast::cast_column(&terrain, point.position.x, point.position.z) {
                transform.translation.y = hit.position.y;
            }
        }
        if req.align_to_path {
            transform.look_to(point.direction, Vec3::Y);
        }
        created.push(place_instance(world, &template, parent, transform));
    }
    Ok(serde_json::json!({
        "created": created,
        "count": created.len(),
    }))
}

// ── Grid placement ───────────────────────────────────────────────────────

/// Deterministic cell corners, x-major. No rejection: one point per cell.
pub fn grid_points(origin: Vec3, size_x: usize, size_z: usize, spacing: f32) -> Vec<Vec3> {
    let mut out = Vec::with_capacity(size_x * size_z);
    for ix in 0..size_x {
        for iz in 0..size_z {
            out.push(Vec3::new(
                origin.x + ix as f32 * spacing,
                origin.y,
                origin.z + iz as f32 * spacing,
            ));
        }
    }
    out
}

pub fn grid(world: &mut World, req: &GridRequest) -> Result<serde_json::Value, String> {
    if req.spacing <= 0.0 {
        return Err("spacing must be positive".into());
    }
    let template = lookup_template(world, &req.template)?;
    let parent = resolve_parent(world, req.parent_path.as_deref())?;

    let terrain = world.resource::<Terrain>().clone();
    let mut created = Vec::new();
    for point in grid_points(Vec3::from_array(req.origin), req.size_x, req.size_z, req.spacing) {
        let mut transform = Transform::from_translation(point);
        if req.snap_to_terrain {
            if let Some(hit) = raycast::cast_column(&terrain, point.x, point.z) {
                transform.translation.y = hit.position.y;
            }
        }
        created.push(place_instance(world, &template, parent, transform));
    }
    Ok(serde_json::json!({
        "created": created,
        "count": created.len(),
    }))
}

// ── Shared instantiation ─────────────────────────────────────────────────

fn lookup_template(world: &World, name: &str) -> Result<TemplateDef, String> {
    world
        .resource::<TemplateRegistry>()
        .get(name)
        .cloned()
        .ok_or_else(|| format!("Unknown template: {name}"))
}

fn resolve_parent(world: &World, parent_path: Option<&str>) -> Result<Entity, String> {
    match parent_path {
        None => Ok(world.resource::<EditedScene>().entity),
        Some(path) => scene::resolve_path(world, path)
            .ok_or_else(|| format!("Parent path not found: {path}")),
    }
}

/// Instantiate the template under `parent` with the placement transform and
/// report the new node's path. Ownership over the whole created subtree is
/// handled by the template instantiation itself.
fn place_instance(
    world: &mut World,
    template: &TemplateDef,
    parent: Entity,
    transform: Transform,
) -> String {
    let base = template
        .name
        .clone()
        .unwrap_or_else(|| template.type_name.clone());
    let entity = templates::instantiate(world, template, &base, parent);
    if let Some(mut t) = world.get_mut::<Transform>(entity) {
        *t = transform;
    }
    scene::node_path(world, entity)
}
