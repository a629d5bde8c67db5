//! Material blend buffer
//!
//! Four-channel material weights (grass, dirt, rock, sand) per cell, kept
//! normalized so the channels always sum to 1, plus separate single-channel
//! masks for water presence, wetness and roads. The splat resolution is
//! independent of the heightmap resolution.

use crate::raster::Raster;

/// Number of normalized material channels.
pub const CHANNEL_COUNT: usize = 4;

/// Material channels in splat storage order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaterialChannel {
    Grass = 0,
    Dirt = 1,
    Rock = 2,
    Sand = 3,
}

impl MaterialChannel {
    pub const ALL: [MaterialChannel; CHANNEL_COUNT] = [
        MaterialChannel::Grass,
        MaterialChannel::Dirt,
        MaterialChannel::Rock,
        MaterialChannel::Sand,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            MaterialChannel::Grass => "grass",
            MaterialChannel::Dirt => "dirt",
            MaterialChannel::Rock => "rock",
            MaterialChannel::Sand => "sand",
        }
    }
}

/// Default weights: 100% grass.
pub const DEFAULT_WEIGHTS: [f32; CHANNEL_COUNT] = [1.0, 0.0, 0.0, 0.0];

/// Material weights plus water/wetness/road masks at a shared resolution.
#[derive(Clone)]
pub struct SplatBuffer {
    /// Normalized 4-channel weights per cell
    pub weights: Raster<[f32; CHANNEL_COUNT]>,
    /// Water presence (0.0-1.0), not part of the normalized set
    pub water: Raster<f32>,
    /// Wetness (0.0-1.0), darkens shoreline materials
    pub wetness: Raster<f32>,
    /// Road mask (0.0-1.0)
    pub road: Raster<f32>,
}

impl SplatBuffer {
    pub fn new(resolution: usize) -> Self {
        Self {
            weights: Raster::new_with(resolution, DEFAULT_WEIGHTS),
            water: Raster::new_with(resolution, 0.0),
            wetness: Raster::new_with(resolution, 0.0),
            road: Raster::new_with(resolution, 0.0),
        }
    }

    pub fn resolution(&self) -> usize {
        self.weights.resolution
    }

    pub fn get_weights(&self, x: usize, z: usize) -> [f32; CHANNEL_COUNT] {
        *self.weights.get(x, z)
    }

    /// Set a cell's weights, renormalizing so they sum to 1.
    pub fn set_weights(&mut self, x: usize, z: usize, weights: [f32; CHANNEL_COUNT]) {
        self.weights.set(x, z, weights);
        self.normalize_cell(x, z);
    }

    pub fn get_water(&self, x: usize, z: usize) -> f32 {
        *self.water.get(x, z)
    }

    pub fn set_water(&mut self, x: usize, z: usize, value: f32) {
        self.water.set(x, z, value.clamp(0.0, 1.0));
    }

    /// Renormalize one cell's weights to sum to 1.
    /// A degenerate cell (non-finite or ~zero sum) becomes 100% grass.
    pub fn normalize_cell(&mut self, x: usize, z: usize) {
        let w = self.weights.get_mut(x, z);
        let mut sum = 0.0;
        let mut finite = true;
        for c in w.iter() {
            if !c.is_finite() {
                finite = false;
                break;
            }
            sum += c.max(0.0);
        }
        if !finite || sum < 1e-6 {
            *w = DEFAULT_WEIGHTS;
            return;
        }
        for c in w.iter_mut() {
            *c = c.max(0.0) / sum;
        }
    }

    /// Repair every degenerate cell in the buffer (run when snapshotting the
    /// default tile template). Returns the number of repaired cells.
    pub fn repair(&mut self) -> usize {
        let res = self.resolution();
        let mut repaired = 0;
        for z in 0..res {
            for x in 0..res {
                let w = self.weights.get(x, z);
                let sum: f32 = w.iter().sum();
                if !sum.is_finite() || sum < 1e-6 {
                    self.weights.set(x, z, DEFAULT_WEIGHTS);
                    repaired += 1;
                } else if (sum - 1.0).abs() > 1e-4 {
                    self.normalize_cell(x, z);
                }
            }
        }
        if repaired > 0 {
            log::warn!("repaired {} degenerate splat cells to grass", repaired);
        }
        repaired
    }

    /// Bilinear sample of one material channel at a normalized position.
    pub fn sample_channel(&self, channel: MaterialChannel, u: f32, v: f32) -> f32 {
        self.sample(|w| w[channel as usize], u, v)
    }

    /// Bilinear sample of the water mask at a normalized position.
    pub fn sample_water(&self, u: f32, v: f32) -> f32 {
        let max = (self.resolution() - 1) as f32;
        self.water.sample_fractional(u * max, v * max)
    }

    fn sample(&self, pick: impl Fn(&[f32; CHANNEL_COUNT]) -> f32, u: f32, v: f32) -> f32 {
        let res = self.resolution();
        let max = (res - 1) as f32;
        let fx = (u * max).clamp(0.0, max);
        let fz = (v * max).clamp(0.0, max);

        let x0 = fx.floor() as usize;
        let z0 = fz.floor() as usize;
        let x1 = (x0 + 1).min(res - 1);
        let z1 = (z0 + 1).min(res - 1);
        let tx = fx - x0 as f32;
        let tz = fz - z0 as f32;

        let w00 = pick(self.weights.get(x0, z0));
        let w10 = pick(self.weights.get(x1, z0));
        let w01 = pick(self.weights.get(x0, z1));
        let w11 = pick(self.weights.get(x1, z1));

        let top = w00 + (w10 - w00) * tx;
        let bottom = w01 + (w11 - w01) * tx;
        top + (bottom - top) * tz
    }

    /// Copy with weights and all masks mirrored along X.
    pub fn mirrored_x(&self) -> Self {
        Self {
            weights: self.weights.mirrored_x(),
            water: self.water.mirrored_x(),
            wetness: self.wetness.mirrored_x(),
            road: self.road.mirrored_x(),
        }
    }

    /// Copy with weights and all masks mirrored along Z.
    pub fn mirrored_z(&self) -> Self {
        Self {
            weights: self.weights.mirrored_z(),
            water: self.water.mirrored_z(),
            wetness: self.wetness.mirrored_z(),
            road: self.road.mirrored_z(),
        }
    }
}
