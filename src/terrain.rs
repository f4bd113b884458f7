use bevy::prelude::*;

/// Collision layer bit for terrain geometry. The spatial query mask is
/// AND-ed against this; `None` matches everything.
pub const TERRAIN_LAYER: u32 = 1;

/// A regular-grid heightfield the editor treats as world geometry. The
/// bridge only reads it — terrain authoring is not part of the editor core.
#[derive(Resource, Clone)]
pub struct Terrain {
    /// World-space x/z of the grid's (0, 0) corner.
    pub origin: Vec2,
    pub cell_size: f32,
    /// Number of height samples along x / z.
    pub width: usize,
    pub depth: usize,
    pub heights: Vec<f32>,
    pub layer: u32,
}

impl Terrain {
    pub fn flat(width: usize, depth: usize, cell_size: f32, height: f32) -> Self {
        Self {
            origin: Vec2::new(
                -(width as f32 - 1.0) * cell_size * 0.5,
                -(depth as f32 - 1.0) * cell_size * 0.5,
            ),
            cell_size,
            width,
            depth,
            heights: vec![height; width * depth],
            layer: TERRAIN_LAYER,
        }
    }

    /// Gently rolling demo terrain the host shell starts with.
    pub fn rolling(width: usize, depth: usize, cell_size: f32) -> Self {
        let mut terrain = Self::flat(width, depth, cell_size, 0.0);
        for iz in 0..depth {
            for ix in 0..width {
                let x = ix as f32 * 0.35;
                let z = iz as f32 * 0.35;
                terrain.heights[iz * width + ix] =
                    (x.sin() + (z * 0.7).cos()) * 1.5 + (x * 0.13).sin() * 4.0;
            }
        }
        terrain
    }

    fn sample(&self, ix: usize, iz: usize) -> f32 {
        self.heights[iz.min(self.depth - 1) * self.width + ix.min(self.width - 1)]
    }

    pub fn contains(&self, x: f32, z: f32) -> bool {
        let fx = (x - self.origin.x) / self.cell_size;
        let fz = (z - self.origin.y) / self.cell_size;
        fx >= 0.0 && fz >= 0.0 && fx <= (self.width - 1) as f32 && fz <= (self.depth - 1) as f32
    }

    /// Bilinear height at a world-space column, or `None` outside the grid.
    pub fn height_at(&self, x: f32, z: f32) -> Option<f32> {
        if !self.contains(x, z) {
            return None;
        }
        let fx = (x - self.origin.x) / self.cell_size;
        let fz = (z - self.origin.y) / self.cell_size;
        let ix = (fx.floor() as usize).min(self.width - 1);
        let iz = (fz.floor() as usize).min(self.depth - 1);
        let tx = fx - ix as f32;
        let tz = fz - iz as f32;

        let h00 = self.sample(ix, iz);
        let h10 = self.sample(ix + 1, iz);
        let h01 = self.sample(ix, iz + 1);
        let h11 = self.sample(ix + 1, iz + 1);

        let h0 = h00 + (h10 - h00) * tx;
        let h1 = h01 + (h11 - h01) * tx;
        Some(h0 + (h1 - h0) * tz)
    }

    /// Surface normal from central height differences. Always unit length,
    /// y-positive.
    pub fn normal_at(&self, x: f32, z: f32) -> Option<Vec3> {
        if !self.contains(x, z) {
            return None;
        }
        let e = self.cell_size * 0.5;
        let hl = self.height_at(x - e, z).unwrap_or_else(|| self.height_at(x, z).unwrap_or(0.0));
        let hr = self.height_at(x + e, z).unwrap_or(hl);
        let hd = self.height_at(x, z - e).unwrap_or(hl);
        let hu = self.height_at(x, z + e).unwrap_or(hd);
        Some(Vec3::new(hl - hr, 2.0 * e, hd - hu).normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_terrain_height_everywhere() {
        let t = Terrain::flat(9, 9, 2.0, 3.0);
        assert_eq!(t.height_at(0.0, 0.0), Some(3.0));
        assert_eq!(t.height_at(5.5, -4.25), Some(3.0));
        assert!(t.height_at(1000.0, 0.0).is_none());
    }

    #[test]
    fn flat_terrain_normal_is_up() {
        let t = Terrain::flat(9, 9, 2.0, 0.0);
        let n = t.normal_at(1.0, 1.0).unwrap();
        assert!((n - Vec3::Y).length() < 1e-4);
    }

    #[test]
    fn bilinear_interpolation_between_samples() {
        let mut t = Terrain::flat(2, 2, 1.0, 0.0);
        // corner (1,1) raised to 4; center of the cell should interpolate to 1
        t.heights[3] = 4.0;
        let center = t.height_at(t.origin.x + 0.5, t.origin.y + 0.5).unwrap();
        assert!((center - 1.0).abs() < 1e-4);
    }
}
