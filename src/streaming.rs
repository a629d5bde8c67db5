//! Cell streaming and LOD coordination
//!
//! Decides which streaming cells are resident and at which LOD tier based
//! on distance from a view anchor, and drives an external collaborator
//! through load/unload/LOD-change callbacks. The coordinator never
//! materializes tiles itself; it only hands out cell coordinates and tiers.
//! Loading is allowed to span multiple update cycles, and cells under
//! active editing are protected from eviction until the stroke ends.

use std::collections::{HashMap, HashSet};

use crate::mapper::CellTileMapper;
use crate::tile::TileId;

/// Discrete detail tier for a resident cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LodTier {
    Near,
    Mid,
    Far,
}

/// Load state of a streaming cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellState {
    /// Load requested; the collaborator has not finished materializing yet
    Loading(LodTier),
    Loaded(LodTier),
}

/// Collaborator interface owning tile/geometry materialization.
///
/// `on_load_cell` receives the initial tier; for the Near tier the
/// collaborator generates foliage chunks immediately, Mid/Far generate
/// lazily on their own LOD updates. `on_update_cell_lod` means rescale
/// density, not regenerate. The coordinator fires and continues; it never
/// blocks on the collaborator.
pub trait CellLifecycle {
    fn on_load_cell(&mut self, cx: i32, cz: i32, lod: LodTier);
    fn on_unload_cell(&mut self, cx: i32, cz: i32);
    fn on_update_cell_lod(&mut self, cx: i32, cz: i32, lod: LodTier);
}

/// Streaming radii in cell units, plus the movement threshold below which
/// an update is skipped entirely (latency optimization, not correctness).
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct StreamingConfig {
    pub near_radius: f32,
    pub mid_radius: f32,
    pub far_radius: f32,
    pub movement_epsilon: f32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            near_radius: 1.5,
            mid_radius: 3.5,
            far_radius: 6.0,
            movement_epsilon: 0.25,
        }
    }
}

/// Per-cell load/LOD state machine over the streaming grid.
pub struct StreamingCoordinator {
    config: StreamingConfig,
    mapper: CellTileMapper,
    cells: HashMap<(i32, i32), CellState>,
    /// Cells under active edit (brushed cell + 8 neighbors)
    protected: HashSet<(i32, i32)>,
    last_anchor: Option<(f32, f32)>,
}

impl StreamingCoordinator {
    pub fn new(config: StreamingConfig, mapper: CellTileMapper) -> Self {
        Self {
            config,
            mapper,
            cells: HashMap::new(),
            protected: HashSet::new(),
            last_anchor: None,
        }
    }

    pub fn mapper(&self) -> &CellTileMapper {
        &self.mapper
    }

    pub fn mapper_mut(&mut self) -> &mut CellTileMapper {
        &mut self.mapper
    }

    pub fn cell_state(&self, cx: i32, cz: i32) -> Option<CellState> {
        self.cells.get(&(cx, cz)).copied()
    }

    pub fn resident_cells(&self) -> impl Iterator<Item = ((i32, i32), CellState)> + '_ {
        self.cells.iter().map(|(k, v)| (*k, *v))
    }

    /// Whether a cell overlaps the permanently resident active tile and is
    /// therefore excluded from streaming entirely.
    fn is_excluded(&self, cx: i32, cz: i32) -> bool {
        self.mapper
            .cell_to_affected_tiles(cx, cz)
            .contains(&TileId::ACTIVE)
    }

    /// Mark the brushed cell and its 8 neighbors as protected from
    /// eviction for the duration of the edit session.
    pub fn protect_around(&mut self, cx: i32, cz: i32) {
        for dz in -1..=1 {
            for dx in -1..=1 {
                self.protected.insert((cx + dx, cz + dz));
            }
        }
    }

    /// End of the edit session (pointer release).
    pub fn clear_protected(&mut self) {
        self.protected.clear();
    }

    pub fn is_protected(&self, cx: i32, cz: i32) -> bool {
        self.protected.contains(&(cx, cz))
    }

    /// The collaborator reports that a pending load completed. Returns
    /// false (and does nothing) if the cell is no longer tracked.
    pub fn finish_loading(&mut self, cx: i32, cz: i32) -> bool {
        if let Some(state) = self.cells.get_mut(&(cx, cz)) {
            if let CellState::Loading(lod) = *state {
                *state = CellState::Loaded(lod);
                return true;
            }
        }
        false
    }

    /// Recompute residency and tiers for a world-space view anchor,
    /// invoking the collaborator for every transition.
    pub fn update(&mut self, anchor_x: f32, anchor_z: f32, lifecycle: &mut impl CellLifecycle) {
        if let Some((lx, lz)) = self.last_anchor {
            let moved = ((anchor_x - lx).powi(2) + (anchor_z - lz).powi(2)).sqrt();
            if moved < self.config.movement_epsilon * self.mapper.cell_size() {
                return;
            }
        }
        self.last_anchor = Some((anchor_x, anchor_z));

        let cell_size = self.mapper.cell_size();
        let ax = anchor_x / cell_size;
        let az = anchor_z / cell_size;

        let reach = self.config.far_radius.ceil() as i32 + 1;
        let center_x = ax.floor() as i32;
        let center_z = az.floor() as i32;

        // Desired resident set with tiers
        let mut desired: HashMap<(i32, i32), LodTier> = HashMap::new();
        for cz in (center_z - reach)..=(center_z + reach) {
            for cx in (center_x - reach)..=(center_x + reach) {
                if self.is_excluded(cx, cz) {
                    continue;
                }
                let dx = cx as f32 + 0.5 - ax;
                let dz = cz as f32 + 0.5 - az;
                let dist = (dx * dx + dz * dz).sqrt();
                if let Some(tier) = self.tier_for(dist) {
                    desired.insert((cx, cz), tier);
                }
            }
        }

        // Load or retier desired cells
        for (&(cx, cz), &tier) in &desired {
            match self.cells.get_mut(&(cx, cz)) {
                None => {
                    self.cells.insert((cx, cz), CellState::Loading(tier));
                    lifecycle.on_load_cell(cx, cz, tier);
                }
                Some(CellState::Loading(current)) => {
                    // Still materializing; remember the newest tier so the
                    // finished load lands at the right detail
                    *current = tier;
                }
                Some(CellState::Loaded(current)) => {
                    if *current != tier {
                        *current = tier;
                        lifecycle.on_update_cell_lod(cx, cz, tier);
                    }
                }
            }
        }

        // Evict cells that left the far radius
        let resident: Vec<(i32, i32)> = self.cells.keys().copied().collect();
        for key in resident {
            if desired.contains_key(&key) {
                continue;
            }
            self.request_unload(key.0, key.1, lifecycle);
        }
    }

    /// Unload one cell if allowed. Protected, mid-load, excluded or
    /// already-absent cells make this a no-op, never an error.
    pub fn request_unload(&mut self, cx: i32, cz: i32, lifecycle: &mut impl CellLifecycle) {
        if self.protected.contains(&(cx, cz)) {
            log::debug!("unload of protected cell ({}, {}) ignored", cx, cz);
            return;
        }
        match self.cells.get(&(cx, cz)) {
            None => {}
            Some(CellState::Loading(_)) => {
                log::debug!("unload of loading cell ({}, {}) deferred", cx, cz);
            }
            Some(CellState::Loaded(_)) => {
                self.cells.remove(&(cx, cz));
                lifecycle.on_unload_cell(cx, cz);
            }
        }
    }

    fn tier_for(&self, dist: f32) -> Option<LodTier> {
        if dist < self.config.near_radius {
            Some(LodTier::Near)
        } else if dist < self.config.mid_radius {
            Some(LodTier::Mid)
        } else if dist < self.config.far_radius {
            Some(LodTier::Far)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        loads: Vec<(i32, i32, LodTier)>,
        unloads: Vec<(i32, i32)>,
        lod_updates: Vec<(i32, i32, LodTier)>,
    }

    impl CellLifecycle for Recorder {
        fn on_load_cell(&mut self, cx: i32, cz: i32, lod: LodTier) {
            self.loads.push((cx, cz, lod));
        }
        fn on_unload_cell(&mut self, cx: i32, cz: i32) {
            self.unloads.push((cx, cz));
        }
        fn on_update_cell_lod(&mut self, cx: i32, cz: i32, lod: LodTier) {
            self.lod_updates.push((cx, cz, lod));
        }
    }

    fn coordinator() -> StreamingCoordinator {
        // 16-unit cells over 64-unit tiles; the active tile covers cells
        // (0..3, 0..3), all excluded from streaming.
        StreamingCoordinator::new(
            StreamingConfig::default(),
            CellTileMapper::new(16.0, 64.0),
        )
    }

    fn finish_all(c: &mut StreamingCoordinator) {
        let keys: Vec<(i32, i32)> = c.resident_cells().map(|(k, _)| k).collect();
        for (cx, cz) in keys {
            c.finish_loading(cx, cz);
        }
    }

    #[test]
    fn test_initial_update_loads_by_distance() {
        let mut c = coordinator();
        let mut rec = Recorder::default();
        // Anchor far from the active tile so exclusion doesn't interfere
        c.update(160.0, 160.0, &mut rec);

        assert!(!rec.loads.is_empty());
        // Anchor sits at cell (10, 10); its own cell loads Near
        assert!(rec.loads.contains(&(10, 10, LodTier::Near)));
        // A cell ~2.5 cells out is Mid
        assert!(rec.loads.iter().any(|&(cx, cz, lod)| {
            (cx, cz) == (12, 10) && lod == LodTier::Mid
        }));
        // A cell ~5 cells out is Far
        assert!(rec.loads.iter().any(|&(cx, cz, lod)| {
            (cx, cz) == (15, 10) && lod == LodTier::Far
        }));
        // Everything starts in Loading
        assert_eq!(
            c.cell_state(10, 10),
            Some(CellState::Loading(LodTier::Near))
        );
    }

    #[test]
    fn test_active_tile_cells_never_stream() {
        let mut c = coordinator();
        let mut rec = Recorder::default();
        // Anchor inside the active tile
        c.update(32.0, 32.0, &mut rec);
        for &(cx, cz, _) in &rec.loads {
            assert!(
                !(0..4).contains(&cx) || !(0..4).contains(&cz),
                "cell ({}, {}) overlaps the active tile",
                cx,
                cz
            );
        }
        assert_eq!(c.cell_state(1, 1), None);
    }

    #[test]
    fn test_movement_epsilon_skips_update() {
        let mut c = coordinator();
        let mut rec = Recorder::default();
        c.update(160.0, 160.0, &mut rec);
        let loads_before = rec.loads.len();

        // Sub-epsilon move: nothing happens, not even retiering
        c.update(160.5, 160.0, &mut rec);
        assert_eq!(rec.loads.len(), loads_before);
    }

    #[test]
    fn test_lod_update_fires_after_load_completes() {
        let mut c = coordinator();
        let mut rec = Recorder::default();
        c.update(160.0, 160.0, &mut rec);
        finish_all(&mut c);
        assert_eq!(c.cell_state(10, 10), Some(CellState::Loaded(LodTier::Near)));

        // Move two cells over: some cells change tier without unloading
        c.update(192.0, 160.0, &mut rec);
        assert!(!rec.lod_updates.is_empty());
        assert!(rec.lod_updates.contains(&(12, 10, LodTier::Near)));
    }

    #[test]
    fn test_loading_cell_retier_is_silent() {
        let mut c = coordinator();
        let mut rec = Recorder::default();
        c.update(160.0, 160.0, &mut rec);
        // No finish_loading: move the anchor, tiers change while loading
        c.update(192.0, 160.0, &mut rec);
        assert!(rec.lod_updates.is_empty());
        // The recorded tier still tracks the newest distance
        assert_eq!(
            c.cell_state(12, 10),
            Some(CellState::Loading(LodTier::Near))
        );
    }

    #[test]
    fn test_eviction_on_leaving_far_radius() {
        let mut c = coordinator();
        let mut rec = Recorder::default();
        c.update(160.0, 160.0, &mut rec);
        finish_all(&mut c);

        // Teleport far away: old cells evict
        c.update(800.0, 800.0, &mut rec);
        assert!(rec.unloads.contains(&(10, 10)));
        assert_eq!(c.cell_state(10, 10), None);
    }

    #[test]
    fn test_protected_cells_survive_eviction() {
        let mut c = coordinator();
        let mut rec = Recorder::default();
        c.update(160.0, 160.0, &mut rec);
        finish_all(&mut c);

        c.protect_around(10, 10);
        c.update(800.0, 800.0, &mut rec);
        // The 3x3 protected block stays resident
        assert!(c.cell_state(10, 10).is_some());
        assert!(c.cell_state(9, 9).is_some());
        assert!(!rec.unloads.contains(&(10, 10)));

        // Stroke end releases protection; the next movement evicts
        c.clear_protected();
        c.update(832.0, 800.0, &mut rec);
        assert_eq!(c.cell_state(10, 10), None);
        assert!(rec.unloads.contains(&(10, 10)));
    }

    #[test]
    fn test_unload_of_loading_cell_is_noop() {
        let mut c = coordinator();
        let mut rec = Recorder::default();
        c.update(160.0, 160.0, &mut rec);
        // Cells are all Loading; teleporting away must not unload them
        c.update(800.0, 800.0, &mut rec);
        assert!(rec.unloads.is_empty());
        assert!(c.cell_state(10, 10).is_some());

        // Once the load completes the next update can evict
        finish_all(&mut c);
        c.update(832.0, 800.0, &mut rec);
        assert!(rec.unloads.contains(&(10, 10)));
    }

    #[test]
    fn test_reentry_cancels_pending_unload() {
        let mut c = coordinator();
        let mut rec = Recorder::default();
        c.update(160.0, 160.0, &mut rec);
        finish_all(&mut c);
        let loads_before = rec.loads.len();

        // Move out and straight back: the cell never actually unloads
        // mid-session if it is desired again by the time of the update
        c.update(176.0, 160.0, &mut rec);
        c.update(160.0, 160.0, &mut rec);
        assert!(c.cell_state(10, 10).is_some());
        // And it was not re-loaded from scratch
        assert!(!rec.loads[loads_before..]
            .iter()
            .any(|&(cx, cz, _)| (cx, cz) == (10, 10)));
    }

    #[test]
    fn test_request_unload_absent_cell_is_noop() {
        let mut c = coordinator();
        let mut rec = Recorder::default();
        c.request_unload(99, 99, &mut rec);
        assert!(rec.unloads.is_empty());
    }
}
