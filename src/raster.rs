//! Dense square raster buffers
//!
//! The fundamental storage for per-tile terrain data: a fixed-resolution 2D
//! array indexed as `z * resolution + x`. Heightmaps, material weights and
//! water masks are all rasters of different cell types.

/// A dense square 2D raster with `z * resolution + x` indexing.
#[derive(Clone)]
pub struct Raster<T> {
    pub resolution: usize,
    data: Vec<T>,
}

impl<T: Clone + Default> Raster<T> {
    pub fn new(resolution: usize) -> Self {
        Self {
            resolution,
            data: vec![T::default(); resolution * resolution],
        }
    }
}

impl<T: Clone> Raster<T> {
    pub fn new_with(resolution: usize, value: T) -> Self {
        Self {
            resolution,
            data: vec![value; resolution * resolution],
        }
    }

    /// Build a raster from an existing row-major buffer.
    /// Returns None if the buffer length is not `resolution²`.
    pub fn from_vec(resolution: usize, data: Vec<T>) -> Option<Self> {
        if data.len() != resolution * resolution {
            return None;
        }
        Some(Self { resolution, data })
    }

    fn index(&self, x: usize, z: usize) -> usize {
        debug_assert!(x < self.resolution && z < self.resolution);
        z * self.resolution + x
    }

    pub fn get(&self, x: usize, z: usize) -> &T {
        &self.data[self.index(x, z)]
    }

    pub fn get_mut(&mut self, x: usize, z: usize) -> &mut T {
        let idx = self.index(x, z);
        &mut self.data[idx]
    }

    pub fn set(&mut self, x: usize, z: usize, value: T) {
        let idx = self.index(x, z);
        self.data[idx] = value;
    }

    /// Fill the entire raster with a value.
    pub fn fill(&mut self, value: T) {
        let len = self.data.len();
        self.data = vec![value; len];
    }

    /// Raw row-major slice, for bulk upload to the rendering layer.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Iterate over all cells with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let res = self.resolution;
        self.data.iter().enumerate().map(move |(idx, val)| {
            let x = idx % res;
            let z = idx / res;
            (x, z, val)
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, usize, &mut T)> {
        let res = self.resolution;
        self.data.iter_mut().enumerate().map(move |(idx, val)| {
            let x = idx % res;
            let z = idx / res;
            (x, z, val)
        })
    }

    /// Copy mirrored along the X axis (column 0 swaps with the last column).
    pub fn mirrored_x(&self) -> Self {
        let res = self.resolution;
        let mut out = self.clone();
        for z in 0..res {
            for x in 0..res {
                out.set(x, z, self.get(res - 1 - x, z).clone());
            }
        }
        out
    }

    /// Copy mirrored along the Z axis (row 0 swaps with the last row).
    pub fn mirrored_z(&self) -> Self {
        let res = self.resolution;
        let mut out = self.clone();
        for z in 0..res {
            for x in 0..res {
                out.set(x, z, self.get(x, res - 1 - z).clone());
            }
        }
        out
    }
}

impl Raster<f32> {
    /// Sample at a fractional cell index with bilinear interpolation.
    /// Coordinates are clamped to the valid range.
    pub fn sample_fractional(&self, fx: f32, fz: f32) -> f32 {
        let max = (self.resolution - 1) as f32;
        let fx = fx.clamp(0.0, max);
        let fz = fz.clamp(0.0, max);

        let x0 = fx.floor() as usize;
        let z0 = fz.floor() as usize;
        let x1 = (x0 + 1).min(self.resolution - 1);
        let z1 = (z0 + 1).min(self.resolution - 1);

        let tx = fx - x0 as f32;
        let tz = fz - z0 as f32;

        let h00 = *self.get(x0, z0);
        let h10 = *self.get(x1, z0);
        let h01 = *self.get(x0, z1);
        let h11 = *self.get(x1, z1);

        let top = h00 + (h10 - h00) * tx;
        let bottom = h01 + (h11 - h01) * tx;
        top + (bottom - top) * tz
    }

    /// Sample at a normalized position (0.0-1.0 across the raster).
    pub fn sample_normalized(&self, u: f32, v: f32) -> f32 {
        let max = (self.resolution - 1) as f32;
        self.sample_fractional(u * max, v * max)
    }
}

/// An elevation raster with world-space extent.
///
/// `resolution` vertices span `size` world units per side, so the spacing
/// between adjacent vertices is `size / (resolution - 1)`.
#[derive(Clone)]
pub struct Heightmap {
    pub heights: Raster<f32>,
    /// World-space side length
    pub size: f32,
}

impl Heightmap {
    pub fn new(resolution: usize, size: f32) -> Self {
        Self {
            heights: Raster::new_with(resolution, 0.0),
            size,
        }
    }

    pub fn from_raster(heights: Raster<f32>, size: f32) -> Self {
        Self { heights, size }
    }

    pub fn resolution(&self) -> usize {
        self.heights.resolution
    }

    /// World-space distance between adjacent vertices.
    pub fn cell_size(&self) -> f32 {
        self.size / (self.resolution() - 1) as f32
    }

    pub fn get(&self, x: usize, z: usize) -> f32 {
        *self.heights.get(x, z)
    }

    pub fn set(&mut self, x: usize, z: usize, height: f32) {
        self.heights.set(x, z, height);
    }

    /// Bilinear height at a world-space position. Positions outside the
    /// tile clamp to the border.
    pub fn sample_world(&self, wx: f32, wz: f32) -> f32 {
        let max = (self.resolution() - 1) as f32;
        let fx = wx / self.size * max;
        let fz = wz / self.size * max;
        self.heights.sample_fractional(fx, fz)
    }

    /// Terrain slope at a cell from central finite differences, as
    /// rise-over-run. Border cells fall back to one-sided differences.
    pub fn slope_at(&self, x: usize, z: usize) -> f32 {
        let res = self.resolution();
        let cell = self.cell_size();

        let xm = x.saturating_sub(1);
        let xp = (x + 1).min(res - 1);
        let zm = z.saturating_sub(1);
        let zp = (z + 1).min(res - 1);

        let dx = (self.get(xp, z) - self.get(xm, z)) / ((xp - xm).max(1) as f32 * cell);
        let dz = (self.get(x, zp) - self.get(x, zm)) / ((zp - zm).max(1) as f32 * cell);

        (dx * dx + dz * dz).sqrt()
    }

    /// Mean of the 3x3 neighborhood around a cell (clamped at borders).
    pub fn neighborhood_mean(&self, x: usize, z: usize) -> f32 {
        let res = self.resolution() as i64;
        let mut sum = 0.0;
        let mut count = 0;
        for dz in -1i64..=1 {
            for dx in -1i64..=1 {
                let nx = x as i64 + dx;
                let nz = z as i64 + dz;
                if nx >= 0 && nx < res && nz >= 0 && nz < res {
                    sum += self.get(nx as usize, nz as usize);
                    count += 1;
                }
            }
        }
        sum / count as f32
    }
}
