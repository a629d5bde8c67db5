//! Water painting and basin carving
//!
//! Water lives in its own mask, never in the normalized material channels.
//! Carving reshapes the terrain under a painted water body with a three-zone
//! radial profile (deep floor, sloped bank, raised shore) so a lake reads as
//! a basin instead of a puddle on flat ground.

use crate::brush::{falloff_weight, BrushSettings};
use crate::raster::Heightmap;
use crate::splat::{MaterialChannel, SplatBuffer};

/// Fraction of the brush radius the deep zone covers.
const DEEP_ZONE: f32 = 0.6;
/// Outer edge of the shore zone, relative to the brush radius.
const SHORE_ZONE: f32 = 1.4;
/// Per-stroke approach rate toward the carve target.
const CARVE_RATE: f32 = 0.03;

/// Derive a sea level from the terrain height at the first water-paint
/// point. Later carving measures depth against this plane.
pub fn derive_sea_level(heightmap: &Heightmap, center_x: f32, center_z: f32) -> f32 {
    heightmap.sample_world(center_x, center_z)
}

/// Paint water presence into the mask with the shared brush falloff.
/// Returns whether any cell changed.
pub fn paint_water(
    splat: &mut SplatBuffer,
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
            let before = splat.get_water(x, z);
            splat.set_water(x, z, before + amount);
            if splat.get_water(x, z) != before {
                changed = true;
            }
        }
    }
    changed
}

/// Carve a water basin around a painted water body.
///
/// Radial profile over `outer = 1.4 * brush_radius`:
/// - deep (< 0.6): target `sea_level - water_depth`
/// - slope (0.6-1.0): smoothstep from the deep target up to `sea_level`
/// - shore (1.0-1.4): smoothstep raise to `sea_level + shore_height`
///
/// Zones at or below the water line only ever lower terrain, the shore only
/// raises it, and each stroke moves a fraction of the way to the target so
/// repeated strokes approach without overshooting.
pub fn carve_water_basin(
    heightmap: &mut Heightmap,
    center_x: f32,
    center_z: f32,
    brush_radius: f32,
    sea_level: f32,
    water_depth: f32,
    shore_height: f32,
    strength: f32,
) -> bool {
    let cell_size = heightmap.cell_size();
    let radius = brush_radius / cell_size;
    if radius <= 0.0 {
        return false;
    }
    let outer = radius * SHORE_ZONE;

    let res = heightmap.resolution();
    let ccx = center_x / cell_size;
    let ccz = center_z / cell_size;
    let min_x = ((ccx - outer).floor().max(0.0)) as usize;
    let max_x = ((ccx + outer).ceil() as usize).min(res - 1);
    let min_z = ((ccz - outer).floor().max(0.0)) as usize;
    let max_z = ((ccz + outer).ceil() as usize).min(res - 1);

    let deep_target = sea_level - water_depth;

    let mut changed = false;
    for z in min_z..=max_z {
        for x in min_x..=max_x {
            let dx = x as f32 - ccx;
            let dz = z as f32 - ccz;
            let nd = (dx * dx + dz * dz).sqrt() / radius;
            if nd >= SHORE_ZONE {
                continue;
            }

            let current = heightmap.get(x, z);
            let (target, blend, lowering) = if nd < DEEP_ZONE {
                (deep_target, 1.0, true)
            } else if nd < 1.0 {
                let t = smooth_step(DEEP_ZONE, 1.0, nd);
                (deep_target + (sea_level - deep_target) * t, 1.0, true)
            } else {
                // Shore fades out toward the outer rim
                let t = smooth_step(1.0, SHORE_ZONE, nd);
                (sea_level + shore_height, 1.0 - t, false)
            };

            // Inside the water line we only dig, on the shore we only build
            if lowering && target >= current {
                continue;
            }
            if !lowering && target <= current {
                continue;
            }

            let next = current + (target - current) * strength * blend * CARVE_RATE;
            if next != current {
                heightmap.set(x, z, next);
                changed = true;
            }
        }
    }
    changed
}

/// Paint sand into an annulus just outside the water radius, with
/// smoothstep falloff toward the outer edge. Keeps shorelines from showing
/// grass right up to the waterline.
pub fn paint_shore_sand(
    splat: &mut SplatBuffer,
    center_x: f32,
    center_z: f32,
    water_radius: f32,
    world_size: f32,
    strength: f32,
) -> bool {
    let res = splat.resolution();
    let cell_size = world_size / (res - 1) as f32;
    let inner = water_radius / cell_size;
    let outer = inner * SHORE_ZONE;
    if inner <= 0.0 {
        return false;
    }

    let ccx = center_x / cell_size;
    let ccz = center_z / cell_size;
    let min_x = ((ccx - outer).floor().max(0.0)) as usize;
    let max_x = ((ccx + outer).ceil() as usize).min(res - 1);
    let min_z = ((ccz - outer).floor().max(0.0)) as usize;
    let max_z = ((ccz + outer).ceil() as usize).min(res - 1);

    let mut changed = false;
    for z in min_z..=max_z {
        for x in min_x..=max_x {
            let dx = x as f32 - ccx;
            let dz = z as f32 - ccz;
            let dist = (dx * dx + dz * dz).sqrt();
            if dist < inner || dist >= outer {
                continue;
            }
            let fade = 1.0 - smooth_step(inner, outer, dist);
            let amount = strength * fade;
            if amount <= 0.0 {
                continue;
            }
            let mut w = splat.get_weights(x, z);
            w[MaterialChannel::Sand as usize] += amount;
            splat.set_weights(x, z, w);
            changed = true;
        }
    }
    changed
}

/// Hermite smoothstep between two edges.
fn smooth_step(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
