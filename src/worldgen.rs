//! Fresh-world bootstrap terrain
//!
//! A new world starts from gently rolling procedural terrain instead of a
//! dead-flat plane, so the first brush stroke has something to react to.
//! Multi-octave Perlin fBm, seeded per subsystem from one master seed.

use noise::{NoiseFn, Perlin, Seedable};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::raster::Heightmap;
use crate::tile::TileData;

/// Parameters for bootstrap terrain.
pub struct BootstrapParams {
    /// Base frequency across the tile (higher = smaller features)
    pub frequency: f64,
    /// Number of noise octaves
    pub octaves: u32,
    /// Amplitude decay per octave
    pub persistence: f64,
    /// Frequency multiplier per octave
    pub lacunarity: f64,
    /// Peak-to-valley height range in world units
    pub amplitude: f32,
}

impl Default for BootstrapParams {
    fn default() -> Self {
        Self {
            frequency: 3.0,
            octaves: 5,
            persistence: 0.5,
            lacunarity: 2.0,
            amplitude: 6.0,
        }
    }
}

/// Generate a fresh tile with fBm terrain and default grass materials.
pub fn bootstrap_tile(
    resolution: usize,
    splat_resolution: usize,
    size: f32,
    seed: u64,
    params: &BootstrapParams,
) -> TileData {
    let mut data = TileData::new(resolution, splat_resolution, size);
    data.heightmap = bootstrap_heightmap(resolution, size, seed, params);
    data
}

/// Generate just the bootstrap heightmap.
pub fn bootstrap_heightmap(
    resolution: usize,
    size: f32,
    seed: u64,
    params: &BootstrapParams,
) -> Heightmap {
    let noise = Perlin::new(1).set_seed(seed as u32);
    let mut heightmap = Heightmap::new(resolution, size);

    for z in 0..resolution {
        for x in 0..resolution {
            let nx = x as f64 / (resolution - 1) as f64 * params.frequency;
            let nz = z as f64 / (resolution - 1) as f64 * params.frequency;
            let value = fbm(&noise, nx, nz, params.octaves, params.persistence, params.lacunarity);
            heightmap.set(x, z, value as f32 * params.amplitude * 0.5);
        }
    }
    heightmap
}

/// Multi-octave fractal Brownian motion, normalized to roughly [-1, 1].
fn fbm(
    noise: &Perlin,
    x: f64,
    y: f64,
    octaves: u32,
    persistence: f64,
    lacunarity: f64,
) -> f64 {
    let mut value = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut max_amplitude = 0.0;

    for _ in 0..octaves {
        value += noise.get([x * frequency, y * frequency]) * amplitude;
        max_amplitude += amplitude;
        amplitude *= persistence;
        frequency *= lacunarity;
    }
    value / max_amplitude
}

/// Derive a sub-seed from a master seed and a subsystem label, so varying
/// one subsystem leaves the others untouched.
pub fn derive_seed(master: u64, label: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    master.hash(&mut hasher);
    label.hash(&mut hasher);
    hasher.finish()
}

/// A random master seed for new worlds.
pub fn random_seed() -> u64 {
    ChaCha8Rng::from_entropy().gen()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_is_deterministic() {
        let params = BootstrapParams::default();
        let a = bootstrap_heightmap(65, 64.0, 42, &params);
        let b = bootstrap_heightmap(65, 64.0, 42, &params);
        for z in 0..65 {
            for x in 0..65 {
                assert_eq!(a.get(x, z), b.get(x, z));
            }
        }
    }

    #[test]
    fn test_seeds_change_terrain() {
        let params = BootstrapParams::default();
        let a = bootstrap_heightmap(65, 64.0, 1, &params);
        let b = bootstrap_heightmap(65, 64.0, 2, &params);
        let differs = (0..65).any(|z| (0..65).any(|x| a.get(x, z) != b.get(x, z)));
        assert!(differs);
    }

    #[test]
    fn test_amplitude_bounds() {
        let params = BootstrapParams::default();
        let hm = bootstrap_heightmap(65, 64.0, 7, &params);
        for z in 0..65 {
            for x in 0..65 {
                assert!(hm.get(x, z).abs() <= params.amplitude);
            }
        }
    }

    #[test]
    fn test_derive_seed_is_stable_per_label() {
        assert_eq!(derive_seed(10, "foliage"), derive_seed(10, "foliage"));
        assert_ne!(derive_seed(10, "foliage"), derive_seed(10, "terrain"));
        assert_ne!(derive_seed(10, "foliage"), derive_seed(11, "foliage"));
    }
}
