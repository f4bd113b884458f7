use bevy::prelude::Vec3;

use crate::terrain::Terrain;

/// How far above / below a candidate column placement rays start and end.
/// Large enough to clear any authored terrain, small enough to keep the
/// march cheap.
pub const COLUMN_SPAN: f32 = 1000.0;

const REFINE_STEPS: u32 = 16;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub position: Vec3,
    pub normal: Vec3,
}

/// Nearest intersection of the segment `from -> to` with the terrain
/// surface, or `None`. `mask` filters by collision layer; `None` matches any
/// layer.
///
/// The march steps at half a grid cell and bisects the first span whose
/// endpoint crosses below the surface, so grazing hits on cell boundaries
/// resolve to the entry point rather than the far side.
pub fn cast(terrain: &Terrain, from: Vec3, to: Vec3, mask: Option<u32>) -> Option<RayHit> {
    if let Some(mask) = mask {
        if mask & terrain.layer == 0 {
            return None;
        }
    }
    let delta = to - from;
    let length = delta.length();
    if length <= 1e-5 {
        return None;
    }
    let dir = delta / length;
    let step = (terrain.cell_size * 0.5).max(1e-3);

    let mut prev_t = 0.0f32;
    let mut prev_above = above_surface(terrain, from);
    let mut t = 0.0f32;
    while t < length {
        t = (t + step).min(length);
        let above = above_surface(terrain, from + dir * t);
        match (prev_above, above) {
            (Some(true), Some(false)) => {
                let hit_t = refine(terrain, from, dir, prev_t, t);
                let position = from + dir * hit_t;
                let normal = terrain
                    .normal_at(position.x, position.z)
                    .unwrap_or(Vec3::Y);
                let height = terrain.height_at(position.x, position.z)?;
                return Some(RayHit {
                    position: Vec3::new(position.x, height, position.z),
                    normal,
                });
            }
            // Started below the surface: not a hit, keep marching until the
            // ray leaves the solid region (matches one-sided surfaces).
            _ => {}
        }
        prev_t = t;
        prev_above = above;
        if t >= length {
            break;
        }
    }
    None
}

/// Vertical probe through the column at (x, z), used by every terrain-follow
/// placement. Casts from high above to far below.
pub fn cast_column(terrain: &Terrain, x: f32, z: f32) -> Option<RayHit> {
    cast(
        terrain,
        Vec3::new(x, COLUMN_SPAN, z),
        Vec3::new(x, -COLUMN_SPAN, z),
        None,
    )
}

fn above_surface(terrain: &Terrain, point: Vec3) -> Option<bool> {
    terrain
        .height_at(point.x, point.z)
        .map(|h| point.y >= h)
}

fn refine(terrain: &Terrain, from: Vec3, dir: Vec3, mut lo: f32, mut hi: f32) -> f32 {
    for _ in 0..REFINE_STEPS {
        let mid = (lo + hi) * 0.5;
        match above_surface(terrain, from + dir * mid) {
            Some(true) => lo = mid,
            _ => hi = mid,
        }
    }
    (lo + hi) * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_cast_hits_flat_terrain_at_height() {
        let t = Terrain::flat(17, 17, 2.0, 5.0);
        let hit = cast_column(&t, 3.0, -2.0).expect("should hit");
        assert!((hit.position.y - 5.0).abs() < 1e-2);
        assert!((hit.position.x - 3.0).abs() < 1e-4);
        assert!((hit.normal - Vec3::Y).length() < 1e-3);
    }

    #[test]
    fn column_cast_misses_outside_grid() {
        let t = Terrain::flat(9, 9, 1.0, 0.0);
        assert!(cast_column(&t, 500.0, 0.0).is_none());
    }

    #[test]
    fn cast_respects_collision_mask() {
        let t = Terrain::flat(9, 9, 1.0, 0.0);
        let from = Vec3::new(0.0, 10.0, 0.0);
        let to = Vec3::new(0.0, -10.0, 0.0);
        assert!(cast(&t, from, to, Some(0b10)).is_none());
        assert!(cast(&t, from, to, Some(0b01)).is_some());
        assert!(cast(&t, from, to, None).is_some());
    }

    #[test]
    fn segment_ending_above_surface_misses() {
        let t = Terrain::flat(9, 9, 1.0, 0.0);
        let hit = cast(
            &t,
            Vec3::new(0.0, 10.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            None,
        );
        assert!(hit.is_none());
    }

    #[test]
    fn sloped_cell_reports_tilted_normal() {
        let mut t = Terrain::flat(3, 3, 1.0, 0.0);
        for iz in 0..3 {
            for ix in 0..3 {
                t.heights[iz * 3 + ix] = ix as f32 * 2.0;
            }
        }
        let hit = cast_column(&t, 0.0, 0.0).expect("should hit slope");
        assert!(hit.normal.y > 0.0);
        assert!(hit.normal.x < 0.0, "normal should lean against the rise");
    }
}
