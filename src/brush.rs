//! Falloff-based sculpting and painting brushes
//!
//! All brushes share one radial falloff profile; tools differ only in what
//! they do to a cell once its falloff weight is known. Sculpting targets the
//! heightmap, painting targets one channel of the material blend buffer.

use crate::raster::Heightmap;
use crate::splat::{MaterialChannel, SplatBuffer};

/// Sculpting tool applied by a brush stroke.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrushTool {
    /// Add height scaled by falloff
    Raise,
    /// Subtract height scaled by falloff
    Lower,
    /// Pull heights toward the height under the brush center
    Flatten,
    /// Pull heights toward the 3x3 neighborhood mean
    Smooth,
}

/// Brush parameters shared by sculpting and painting.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct BrushSettings {
    /// Brush radius in world units
    pub size: f32,
    /// Stroke intensity
    pub strength: f32,
    /// Falloff hardness (0.0 = hard edge, 1.0 = fully soft)
    pub falloff: f32,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            size: 5.0,
            strength: 0.5,
            falloff: 0.5,
        }
    }
}

/// Radial falloff weight at a normalized distance (0 at center, 1 at the
/// brush rim). Exactly 0 at the rim and beyond, non-increasing in distance.
pub fn falloff_weight(normalized_dist: f32, falloff: f32) -> f32 {
    if normalized_dist >= 1.0 {
        return 0.0;
    }
    let exponent = 2.0 - 2.0 * falloff.clamp(0.0, 1.0);
    (1.0 - normalized_dist).powf(exponent).clamp(0.0, 1.0)
}

/// Apply a sculpting tool at a world-space center for one frame step.
/// Returns whether any cell changed; callers must then mark the tile's
/// heightmap dirty and queue mesh/foliage regeneration.
pub fn apply_brush(
    heightmap: &mut Heightmap,
    tool: BrushTool,
    center_x: f32,
    center_z: f32,
    settings: &BrushSettings,
    dt: f32,
) -> bool {
    let cell_size = heightmap.cell_size();
    let radius = settings.size / cell_size;
    if radius <= 0.0 {
        return false;
    }

    let res = heightmap.resolution();
    let ccx = center_x / cell_size;
    let ccz = center_z / cell_size;

    let min_x = ((ccx - radius).floor().max(0.0)) as usize;
    let max_x = ((ccx + radius).ceil() as usize).min(res - 1);
    let min_z = ((ccz - radius).floor().max(0.0)) as usize;
    let max_z = ((ccz + radius).ceil() as usize).min(res - 1);

    // Flatten pulls toward the height under the brush center
    let center_height = heightmap.sample_world(center_x, center_z);

    let mut changed = false;
    for z in min_z..=max_z {
        for x in min_x..=max_x {
            let dx = x as f32 - ccx;
            let dz = z as f32 - ccz;
            let dist = (dx * dx + dz * dz).sqrt();
            if dist >= radius {
                continue;
            }

            let weight = falloff_weight(dist / radius, settings.falloff);
            let amount = settings.strength * weight * dt * 10.0;
            if amount == 0.0 {
                continue;
            }

            let current = heightmap.get(x, z);
            let next = match tool {
                BrushTool::Raise => current + amount,
                BrushTool::Lower => current - amount,
                BrushTool::Flatten => {
                    current + (center_height - current) * weight * 0.1
                }
                BrushTool::Smooth => {
                    let mean = heightmap.neighborhood_mean(x, z);
                    current + (mean - current) * weight * 0.5
                }
            };
            if next != current {
                heightmap.set(x, z, next);
                changed = true;
            }
        }
    }
    changed
}

/// Paint one material channel at a world-space center, renormalizing every
/// touched cell so the 4 weights keep summing to 1. Returns whether any
/// cell changed. `world_size` is the tile's world extent (splat resolution
/// is independent of heightmap resolution).
pub fn paint_material(
    splat: &mut SplatBuffer,
    channel: MaterialChannel,
    center_x: f32,
    center_z: f32,
    world_size: f32,
    settings: &BrushSettings,
    dt: f32,
) -> bool {
    let res = splat.resolution();
    let cell_size = world_size / (res - 1) as f32;
    let radius = settings.size / cell_size;
    if radius <= 0.0 {
        return false;
    }

    let ccx = center_x / cell_size;
    let ccz = center_z / cell_size;

    let min_x = ((ccx - radius).floor().max(0.0)) as usize;
    let max_x = ((ccx + radius).ceil() as usize).min(res - 1);
    let min_z = ((ccz - radius).floor().max(0.0)) as usize;
    let max_z = ((ccz + radius).ceil() as usize).min(res - 1);

    let mut changed = false;
    for z in min_z..=max_z {
        for x in min_x..=max_x {
            let dx = x as f32 - ccx;
            let dz = z as f32 - ccz;
            let dist = (dx * dx + dz * dz).sqrt();
            if dist >= radius {
                continue;
            }

            let weight = falloff_weight(dist / radius, settings.falloff);
            let amount = settings.strength * weight * dt * 10.0;
            if amount <= 0.0 {
                continue;
            }

            let mut w = splat.get_weights(x, z);
            w[channel as usize] += amount;
            splat.set_weights(x, z, w);
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_falloff_monotonic_and_zero_at_rim() {
        for &f in &[0.0, 0.25, 0.5, 0.75, 1.0] {
            let mut prev = f32::MAX;
            for step in 0..=100 {
                let nd = step as f32 / 100.0;
                let w = falloff_weight(nd, f);
                assert!(w <= prev + 1e-6, "falloff increased at nd={} f={}", nd, f);
                assert!((0.0..=1.0).contains(&w));
                prev = w;
            }
            assert_eq!(falloff_weight(1.0, f), 0.0);
            assert_eq!(falloff_weight(1.5, f), 0.0);
        }
    }

    #[test]
    fn test_raise_scenario_center_and_rim() {
        // 64-unit tile at resolution 512, flat at 0. Raise brush of radius
        // 5, strength 1.0, falloff 0.5, dt = 1, centered on a vertex:
        // the center gains exactly 10, cells at distance >= 5 stay 0.
        let mut hm = Heightmap::new(512, 64.0);
        let cell = hm.cell_size();
        let center_cell = 256;
        let cx = center_cell as f32 * cell;
        let cz = center_cell as f32 * cell;

        let settings = BrushSettings {
            size: 5.0,
            strength: 1.0,
            falloff: 0.5,
        };
        let changed = apply_brush(&mut hm, BrushTool::Raise, cx, cz, &settings, 1.0);
        assert!(changed);

        assert!((hm.get(center_cell, center_cell) - 10.0).abs() < 1e-4);

        let radius_cells = 5.0 / cell;
        for z in 0..512 {
            for x in 0..512 {
                let dx = x as f32 - center_cell as f32;
                let dz = z as f32 - center_cell as f32;
                if (dx * dx + dz * dz).sqrt() >= radius_cells {
                    assert_eq!(hm.get(x, z), 0.0, "cell ({}, {}) outside radius moved", x, z);
                }
            }
        }
    }

    #[test]
    fn test_lower_mirrors_raise() {
        let mut up = Heightmap::new(64, 64.0);
        let mut down = Heightmap::new(64, 64.0);
        let settings = BrushSettings::default();
        apply_brush(&mut up, BrushTool::Raise, 32.0, 32.0, &settings, 1.0);
        apply_brush(&mut down, BrushTool::Lower, 32.0, 32.0, &settings, 1.0);
        for z in 0..64 {
            for x in 0..64 {
                assert!((up.get(x, z) + down.get(x, z)).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_flatten_converges_to_center_height() {
        let mut hm = Heightmap::new(64, 64.0);
        // A bump away from plateau height
        hm.set(30, 30, 50.0);
        let settings = BrushSettings {
            size: 20.0,
            strength: 1.0,
            falloff: 1.0,
        };
        // Center is flat 0; repeated flattening drags the bump down
        for _ in 0..200 {
            apply_brush(&mut hm, BrushTool::Flatten, 32.0, 32.0, &settings, 1.0);
        }
        assert!(hm.get(30, 30).abs() < 1.0);
    }

    #[test]
    fn test_smooth_reduces_spike() {
        let mut hm = Heightmap::new(64, 64.0);
        hm.set(32, 32, 100.0);
        let before = hm.get(32, 32);
        let settings = BrushSettings {
            size: 10.0,
            strength: 1.0,
            falloff: 1.0,
        };
        apply_brush(&mut hm, BrushTool::Smooth, 32.0, 32.0, &settings, 1.0);
        assert!(hm.get(32, 32) < before);
        // Smoothing conserves the general neighborhood, not exact values;
        // the spike's neighbors must not overshoot it
        assert!(hm.get(33, 32) < before);
    }

    #[test]
    fn test_paint_keeps_weights_normalized() {
        let mut splat = SplatBuffer::new(64);
        let settings = BrushSettings {
            size: 8.0,
            strength: 1.0,
            falloff: 0.5,
        };
        let changed = paint_material(
            &mut splat,
            MaterialChannel::Rock,
            32.0,
            32.0,
            64.0,
            &settings,
            0.5,
        );
        assert!(changed);
        for z in 0..64 {
            for x in 0..64 {
                let sum: f32 = splat.get_weights(x, z).iter().sum();
                assert!((sum - 1.0).abs() < 1e-5, "cell ({}, {}) sum {}", x, z, sum);
            }
        }
        // Rock dominates at the brush center
        let w = splat.get_weights(32, 32);
        assert!(w[MaterialChannel::Rock as usize] > 0.5);
    }

    #[test]
    fn test_no_change_outside_radius_reports_false() {
        let mut hm = Heightmap::new(16, 16.0);
        let settings = BrushSettings {
            size: 1.0,
            strength: 1.0,
            falloff: 0.5,
        };
        // Brush centered far outside the tile clamps to an empty cell range
        let changed = apply_brush(&mut hm, BrushTool::Raise, 200.0, 200.0, &settings, 1.0);
        assert!(!changed);
    }
}
