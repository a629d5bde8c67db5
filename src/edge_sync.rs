//! Seamless edge and corner synchronization
//!
//! Makes two adjacent tiles' shared border identical and blends a margin of
//! interior cells, independent of any resolution mismatch between the two
//! tiles. The sync is one-directional: the most recently edited tile is
//! authoritative, its border is resampled onto the neighbor and the
//! neighbor's interior is blended toward it. Symmetric averaging converges
//! to visibly different results, so callers must pass (modified, neighbor)
//! in that order.

use std::collections::HashSet;

use crate::error::TerrainError;
use crate::raster::Raster;
use crate::splat::CHANNEL_COUNT;
use crate::store::TileStore;
use crate::tile::{TileData, TileId};

/// Blend widths for the two raster families. The splat width defaults much
/// wider than the height width: material transitions read better when they
/// are very gradual, while height only needs a narrow margin to avoid a
/// visible crease.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct SyncConfig {
    /// Interior blend margin for heightmaps, in cells
    pub height_blend_width: usize,
    /// Interior blend margin for material weights and the water mask
    pub splat_blend_width: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            height_blend_width: 10,
            splat_blend_width: 30,
        }
    }
}

/// Where the target tile sits relative to the source tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    /// Target shares an edge; the delta is one of the 4 axis directions
    Edge(i32, i32),
    /// Target shares only a corner; the delta is one of the 4 diagonals
    Corner(i32, i32),
}

/// Classify how two tiles touch, if they touch at all.
pub fn relation(source: TileId, target: TileId) -> Option<Relation> {
    let dx = target.gx - source.gx;
    let dy = target.gy - source.gy;
    match (dx.abs(), dy.abs()) {
        (1, 0) | (0, 1) => Some(Relation::Edge(dx, dy)),
        (1, 1) => Some(Relation::Corner(dx, dy)),
        _ => None,
    }
}

/// Linear sample along one tile edge at a fractional index.
fn sample_edge(
    get: impl Fn(usize) -> f32,
    res: usize,
    float_i: f32,
) -> f32 {
    let max = (res - 1) as f32;
    let f = float_i.clamp(0.0, max);
    let i0 = f.floor() as usize;
    let i1 = (i0 + 1).min(res - 1);
    let t = f - i0 as f32;
    let a = get(i0);
    let b = get(i1);
    a + (b - a) * t
}

/// Map an (edge index, interior depth) pair to raster coordinates for a
/// tile whose shared edge faces the direction `(-dx, -dy)` back toward the
/// source.
fn target_cell(res: usize, dx: i32, dy: i32, i: usize, d: usize) -> (usize, usize) {
    match (dx, dy) {
        // Target is to the right: its left edge is shared, depth grows +x
        (1, 0) => (d, i),
        (-1, 0) => (res - 1 - d, i),
        (0, 1) => (i, d),
        (0, -1) => (i, res - 1 - d),
        _ => unreachable!("not an edge direction"),
    }
}

/// Source edge cell at index `i` for an edge in direction `(dx, dy)`.
fn source_cell(res: usize, dx: i32, dy: i32, i: usize) -> (usize, usize) {
    match (dx, dy) {
        (1, 0) => (res - 1, i),
        (-1, 0) => (0, i),
        (0, 1) => (i, res - 1),
        (0, -1) => (i, 0),
        _ => unreachable!("not an edge direction"),
    }
}

/// Synchronize one scalar raster across a shared edge: overwrite the target
/// edge with resampled source values, then blend `1..blend_width` interior
/// cells toward the same sample with linear falloff.
pub fn sync_edge_scalar(
    src: &Raster<f32>,
    dst: &mut Raster<f32>,
    dx: i32,
    dy: i32,
    blend_width: usize,
) {
    let res1 = src.resolution;
    let res2 = dst.resolution;
    if res1 < 2 || res2 < 2 {
        return;
    }

    let max_depth = blend_width.min(res2);
    for i2 in 0..res2 {
        let t = i2 as f32 / (res2 - 1) as f32;
        let float_i1 = t * (res1 - 1) as f32;
        let sample = sample_edge(
            |i| {
                let (x, z) = source_cell(res1, dx, dy, i);
                *src.get(x, z)
            },
            res1,
            float_i1,
        );

        // The shared edge cell is an exact copy
        let (ex, ez) = target_cell(res2, dx, dy, i2, 0);
        dst.set(ex, ez, sample);

        // Interior margin blends toward the edge sample
        for d in 1..max_depth {
            let blend = 1.0 - d as f32 / blend_width as f32;
            let (x, z) = target_cell(res2, dx, dy, i2, d);
            let current = *dst.get(x, z);
            dst.set(x, z, current + (sample - current) * blend);
        }
    }
}

/// Edge sync for the 4-channel weight raster; same scheme per channel, with
/// a renormalization pass over every touched cell.
pub fn sync_edge_weights(
    src: &Raster<[f32; CHANNEL_COUNT]>,
    dst: &mut Raster<[f32; CHANNEL_COUNT]>,
    dx: i32,
    dy: i32,
    blend_width: usize,
) {
    let res1 = src.resolution;
    let res2 = dst.resolution;
    if res1 < 2 || res2 < 2 {
        return;
    }

    let max_depth = blend_width.min(res2);
    for i2 in 0..res2 {
        let t = i2 as f32 / (res2 - 1) as f32;
        let float_i1 = t * (res1 - 1) as f32;

        let mut sample = [0.0f32; CHANNEL_COUNT];
        for (c, out) in sample.iter_mut().enumerate() {
            *out = sample_edge(
                |i| {
                    let (x, z) = source_cell(res1, dx, dy, i);
                    src.get(x, z)[c]
                },
                res1,
                float_i1,
            );
        }

        let (ex, ez) = target_cell(res2, dx, dy, i2, 0);
        dst.set(ex, ez, sample);
        normalize(dst.get_mut(ex, ez));

        for d in 1..max_depth {
            let blend = 1.0 - d as f32 / blend_width as f32;
            let (x, z) = target_cell(res2, dx, dy, i2, d);
            let cell = dst.get_mut(x, z);
            for (c, s) in cell.iter_mut().zip(sample.iter()) {
                *c += (s - *c) * blend;
            }
            normalize(cell);
        }
    }
}

/// Blend a square region of the target around a shared corner toward the
/// source's corner value, weighted by 2D Euclidean distance from the corner.
pub fn sync_corner_scalar(
    src: &Raster<f32>,
    dst: &mut Raster<f32>,
    dx: i32,
    dy: i32,
    blend_width: usize,
) {
    let res1 = src.resolution;
    let res2 = dst.resolution;
    if res1 < 2 || res2 < 2 {
        return;
    }

    let corner = *src.get(
        if dx > 0 { res1 - 1 } else { 0 },
        if dy > 0 { res1 - 1 } else { 0 },
    );

    let bound = blend_width.min(res2);
    for j in 0..bound {
        for i in 0..bound {
            let dist = ((i * i + j * j) as f32).sqrt();
            if dist >= blend_width as f32 {
                continue;
            }
            let blend = 1.0 - dist / blend_width as f32;
            let x = if dx > 0 { i } else { res2 - 1 - i };
            let z = if dy > 0 { j } else { res2 - 1 - j };
            let current = *dst.get(x, z);
            dst.set(x, z, current + (corner - current) * blend);
        }
    }
}

/// Corner blend for the weight raster, per channel with renormalization.
pub fn sync_corner_weights(
    src: &Raster<[f32; CHANNEL_COUNT]>,
    dst: &mut Raster<[f32; CHANNEL_COUNT]>,
    dx: i32,
    dy: i32,
    blend_width: usize,
) {
    let res1 = src.resolution;
    let res2 = dst.resolution;
    if res1 < 2 || res2 < 2 {
        return;
    }

    let corner = *src.get(
        if dx > 0 { res1 - 1 } else { 0 },
        if dy > 0 { res1 - 1 } else { 0 },
    );

    let bound = blend_width.min(res2);
    for j in 0..bound {
        for i in 0..bound {
            let dist = ((i * i + j * j) as f32).sqrt();
            if dist >= blend_width as f32 {
                continue;
            }
            let blend = 1.0 - dist / blend_width as f32;
            let x = if dx > 0 { i } else { res2 - 1 - i };
            let z = if dy > 0 { j } else { res2 - 1 - j };
            let cell = dst.get_mut(x, z);
            for (c, s) in cell.iter_mut().zip(corner.iter()) {
                *c += (s - *c) * blend;
            }
            normalize(cell);
        }
    }
}

fn normalize(w: &mut [f32; CHANNEL_COUNT]) {
    let sum: f32 = w.iter().map(|c| c.max(0.0)).sum();
    if !sum.is_finite() || sum < 1e-6 {
        *w = crate::splat::DEFAULT_WEIGHTS;
        return;
    }
    for c in w.iter_mut() {
        *c = c.max(0.0) / sum;
    }
}

/// Synchronize every raster family of one tile pair: heightmap with the
/// height blend width, material weights and water mask with the splat
/// blend width.
pub fn sync_tile_pair(
    source: &TileData,
    target: &mut TileData,
    rel: Relation,
    config: &SyncConfig,
) {
    match rel {
        Relation::Edge(dx, dy) => {
            sync_edge_scalar(
                &source.heightmap.heights,
                &mut target.heightmap.heights,
                dx,
                dy,
                config.height_blend_width,
            );
            sync_edge_weights(
                &source.splat.weights,
                &mut target.splat.weights,
                dx,
                dy,
                config.splat_blend_width,
            );
            sync_edge_scalar(
                &source.splat.water,
                &mut target.splat.water,
                dx,
                dy,
                config.splat_blend_width,
            );
        }
        Relation::Corner(dx, dy) => {
            sync_corner_scalar(
                &source.heightmap.heights,
                &mut target.heightmap.heights,
                dx,
                dy,
                config.height_blend_width,
            );
            sync_corner_weights(
                &source.splat.weights,
                &mut target.splat.weights,
                dx,
                dy,
                config.splat_blend_width,
            );
            sync_corner_scalar(
                &source.splat.water,
                &mut target.splat.water,
                dx,
                dy,
                config.splat_blend_width,
            );
        }
    }
}

/// Run the full per-stroke synchronization pass.
///
/// For every touched tile this visits its 4 edge neighbors and 4 corner
/// neighbors, deduplicating shared boundaries with a canonical min/max pair
/// key so each is processed exactly once regardless of visit order. Returns
/// the set of tiles whose dependent geometry/foliage must regenerate
/// (touched tiles plus every neighbor written to).
pub fn sync_pass(
    store: &mut TileStore,
    touched: &[TileId],
    config: &SyncConfig,
) -> Result<Vec<TileId>, TerrainError> {
    let mut seen: HashSet<(TileId, TileId)> = HashSet::new();
    let mut regen: HashSet<TileId> = touched.iter().copied().collect();

    for &tile in touched {
        let neighbors = tile
            .edge_neighbors()
            .into_iter()
            .chain(tile.corner_neighbors());
        for neighbor in neighbors {
            let key = (tile.min(neighbor), tile.max(neighbor));
            if !seen.insert(key) {
                continue;
            }
            let Some(rel) = relation(tile, neighbor) else {
                continue;
            };

            // The touched tile is authoritative; its data is read out once
            // and written onto the neighbor in place.
            let source = store.tile_data(tile)?.clone();
            let target = store.tile_data_mut(neighbor)?;
            sync_tile_pair(&source, target, rel, config);
            store.mark_dirty(neighbor, |d| {
                d.mark_heightmap();
                d.mark_splatmap();
            });
            regen.insert(neighbor);
        }
    }

    let mut regen: Vec<TileId> = regen.into_iter().collect();
    regen.sort();
    Ok(regen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splat::MaterialChannel;

    fn flat_tile(res: usize, height: f32) -> TileData {
        let mut data = TileData::new(res, res, 64.0);
        for z in 0..res {
            for x in 0..res {
                data.heightmap.set(x, z, height);
            }
        }
        data
    }

    #[test]
    fn test_edge_copy_and_linear_blend_scenario() {
        // Left tile flat at 10, right tile flat at 0, blend width 10.
        // After sync the shared edge is exactly 10 on the right tile and
        // interior cells 1..9 interpolate linearly toward the original 0.
        let left = flat_tile(64, 10.0);
        let mut right = flat_tile(64, 0.0);

        sync_edge_scalar(&left.heightmap.heights, &mut right.heightmap.heights, 1, 0, 10);

        for z in 0..64 {
            assert_eq!(right.heightmap.get(0, z), 10.0, "edge not copied at z={}", z);
            for d in 1..10 {
                let expected = 10.0 * (1.0 - d as f32 / 10.0);
                let got = right.heightmap.get(d, z);
                assert!(
                    (got - expected).abs() < 1e-5,
                    "depth {} expected {} got {}",
                    d,
                    expected,
                    got
                );
            }
            // Beyond the margin: untouched
            assert_eq!(right.heightmap.get(10, z), 0.0);
            assert_eq!(right.heightmap.get(40, z), 0.0);
        }
        // Source is never written
        assert_eq!(left.heightmap.get(63, 30), 10.0);
    }

    #[test]
    fn test_edge_sync_across_resolutions() {
        // Source at 33 vertices, target at 65: the shared edge must match
        // the source's edge profile under linear resampling.
        let mut src = Raster::new_with(33, 0.0f32);
        for i in 0..33 {
            src.set(32, i, i as f32);
        }
        let mut dst = Raster::new_with(65, 0.0f32);
        sync_edge_scalar(&src, &mut dst, 1, 0, 5);

        for i2 in 0..65 {
            let t = i2 as f32 / 64.0;
            let expected = t * 32.0;
            assert!((dst.get(0, i2) - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn test_edge_sync_directional() {
        // Direction matters: syncing (left -> right) leaves left untouched,
        // and the right tile's far edge stays at its own height.
        let left = flat_tile(32, 7.0);
        let mut right = flat_tile(32, 3.0);
        sync_edge_scalar(&left.heightmap.heights, &mut right.heightmap.heights, 1, 0, 4);
        assert_eq!(right.heightmap.get(0, 16), 7.0);
        assert_eq!(right.heightmap.get(31, 16), 3.0);
    }

    #[test]
    fn test_vertical_edge_sync() {
        let top = flat_tile(32, 5.0);
        let mut bottom = flat_tile(32, 0.0);
        // Target below source: source bottom edge -> target top edge
        sync_edge_scalar(&top.heightmap.heights, &mut bottom.heightmap.heights, 0, 1, 4);
        for x in 0..32 {
            assert_eq!(bottom.heightmap.get(x, 0), 5.0);
            assert!((bottom.heightmap.get(x, 1) - 3.75).abs() < 1e-5);
        }
    }

    #[test]
    fn test_weight_sync_keeps_normalization() {
        let mut src = Raster::new_with(33, [0.0f32, 0.0, 1.0, 0.0]);
        let mut dst = Raster::new_with(33, [1.0f32, 0.0, 0.0, 0.0]);
        // Perturb source so resampling actually interpolates
        src.set(32, 10, [0.5, 0.5, 0.0, 0.0]);

        sync_edge_weights(&src, &mut dst, 1, 0, 8);
        for z in 0..33 {
            for x in 0..33 {
                let sum: f32 = dst.get(x, z).iter().sum();
                assert!((sum - 1.0).abs() < 1e-4, "cell ({}, {}) sum {}", x, z, sum);
            }
        }
        // Edge cell copied from source
        assert!((dst.get(0, 20)[2] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_corner_blend_copies_corner_cell() {
        let src = Raster::new_with(32, 20.0f32);
        let mut dst = Raster::new_with(32, 0.0f32);
        // Target is down-right of source: shared corner is target's (0, 0)
        sync_corner_scalar(&src, &mut dst, 1, 1, 8);

        assert_eq!(*dst.get(0, 0), 20.0);
        // Falls off with Euclidean distance
        let d1 = *dst.get(1, 0);
        let d5 = *dst.get(5, 0);
        assert!(d1 > d5 && d5 > 0.0);
        // Outside the radius: untouched
        assert_eq!(*dst.get(10, 10), 0.0);
        assert_eq!(*dst.get(0, 9), 0.0);
    }

    #[test]
    fn test_sync_pass_dedup_and_regen_set() {
        let mut store = TileStore::new(33, 33, 64.0);
        let settings = crate::brush::BrushSettings {
            size: 10.0,
            strength: 1.0,
            falloff: 0.5,
        };
        // Brush near the right edge of the active tile
        store
            .sculpt(TileId::ACTIVE, crate::brush::BrushTool::Raise, 62.0, 32.0, &settings, 1.0)
            .unwrap();
        let touched = store.end_stroke();
        assert_eq!(touched, vec![TileId::ACTIVE]);

        let regen = sync_pass(&mut store, &touched, &SyncConfig::default()).unwrap();
        // Touched tile plus its 8 neighbors
        assert_eq!(regen.len(), 9);
        assert!(regen.contains(&TileId::ACTIVE));
        assert!(regen.contains(&TileId::new(1, 0)));
        assert!(regen.contains(&TileId::new(-1, -1)));
    }

    #[test]
    fn test_edge_equality_after_pass() {
        let mut store = TileStore::new(33, 33, 64.0);
        let settings = crate::brush::BrushSettings {
            size: 12.0,
            strength: 1.0,
            falloff: 0.5,
        };
        store
            .sculpt(TileId::ACTIVE, crate::brush::BrushTool::Raise, 60.0, 30.0, &settings, 1.0)
            .unwrap();
        let touched = store.end_stroke();
        sync_pass(&mut store, &touched, &SyncConfig::default()).unwrap();

        let active = store.tile_data(TileId::ACTIVE).unwrap().heightmap.clone();
        let right = store.tile_data(TileId::new(1, 0)).unwrap().heightmap.clone();
        for i in 0..33 {
            assert!(
                (active.get(32, i) - right.get(0, i)).abs() < 1e-5,
                "edge mismatch at {}",
                i
            );
        }
    }

    #[test]
    fn test_corner_consistency_after_pass() {
        let mut store = TileStore::new(33, 33, 64.0);
        let settings = crate::brush::BrushSettings {
            size: 14.0,
            strength: 1.0,
            falloff: 0.5,
        };
        // Brush the bottom-right corner region of the active tile
        store
            .sculpt(TileId::ACTIVE, crate::brush::BrushTool::Raise, 62.0, 62.0, &settings, 1.0)
            .unwrap();
        let touched = store.end_stroke();
        sync_pass(&mut store, &touched, &SyncConfig::default()).unwrap();

        // The 4 tiles meeting at the active tile's bottom-right corner must
        // agree on the corner height.
        let h00 = store.tile_data(TileId::ACTIVE).unwrap().heightmap.get(32, 32);
        let h10 = store.tile_data(TileId::new(1, 0)).unwrap().heightmap.get(0, 32);
        let h01 = store.tile_data(TileId::new(0, 1)).unwrap().heightmap.get(32, 0);
        let h11 = store.tile_data(TileId::new(1, 1)).unwrap().heightmap.get(0, 0);
        assert!((h00 - h10).abs() < 1e-5);
        assert!((h00 - h01).abs() < 1e-5);
        assert!((h00 - h11).abs() < 1e-5);
    }

    #[test]
    fn test_water_mask_syncs_with_splat_width() {
        let mut source = flat_tile(64, 0.0);
        for z in 0..64 {
            source.splat.water.set(63, z, 1.0);
        }
        let mut target = flat_tile(64, 0.0);
        sync_tile_pair(
            &source,
            &mut target,
            Relation::Edge(1, 0),
            &SyncConfig::default(),
        );
        assert_eq!(*target.splat.water.get(0, 30), 1.0);
        // Splat width 30: depth 15 still carries half the water value
        assert!((*target.splat.water.get(15, 30) - 0.5).abs() < 1e-5);
        assert_eq!(*target.splat.water.get(30, 30), 0.0);
    }

    #[test]
    fn test_sync_marks_material_channels() {
        let mut store = TileStore::new(33, 33, 64.0);
        store
            .paint_material(
                TileId::ACTIVE,
                MaterialChannel::Rock,
                62.0,
                32.0,
                &crate::brush::BrushSettings {
                    size: 10.0,
                    strength: 1.0,
                    falloff: 0.5,
                },
                1.0,
            )
            .unwrap();
        let touched = store.end_stroke();
        sync_pass(&mut store, &touched, &SyncConfig::default()).unwrap();

        let flags = store.dirty_flags(TileId::new(1, 0));
        assert!(flags.heightmap && flags.splatmap && flags.foliage);
    }
}
