//! Tile store
//!
//! Owns the active tile's live raster buffers plus on-demand copies of every
//! neighbor tile an edit has touched, keyed by grid coordinates. All brush
//! mutation routes through the store so dirty flags and the stroke-touched
//! set stay consistent; everything else receives references scoped to a
//! single operation.

use std::collections::{HashMap, HashSet};

use crate::brush::{self, BrushSettings, BrushTool};
use crate::error::TerrainError;
use crate::splat::MaterialChannel;
use crate::tile::{DirtyFlags, TileData, TileId, TileMode, TileTemplate};
use crate::water;

/// The owning container for all tile raster data.
pub struct TileStore {
    /// Live buffers of the always-resident active tile (0, 0)
    active: Option<TileData>,
    /// Materialized neighbor tile copies
    tiles: HashMap<TileId, TileData>,
    /// Which materialized tiles were synthesized (not explicitly edited or
    /// loaded); these regenerate when the tile mode changes
    synthesized: HashSet<TileId>,
    /// Snapshot of the active tile used to synthesize unedited neighbors
    template: Option<TileTemplate>,
    dirty: HashMap<TileId, DirtyFlags>,
    /// Tiles mutated since the last stroke end
    touched: HashSet<TileId>,
    mode: TileMode,
}

impl TileStore {
    /// Create a store with a fresh flat active tile and template.
    pub fn new(resolution: usize, splat_resolution: usize, size: f32) -> Self {
        Self::from_active(TileData::new(resolution, splat_resolution, size))
    }

    /// Create a store around existing active-tile data (e.g. a loaded tile).
    pub fn from_active(active: TileData) -> Self {
        let template = TileTemplate::snapshot(&active);
        Self {
            active: Some(active),
            tiles: HashMap::new(),
            synthesized: HashSet::new(),
            template: Some(template),
            dirty: HashMap::new(),
            touched: HashSet::new(),
            mode: TileMode::default(),
        }
    }

    /// An empty store; every mutating operation fails with `NoActiveTile`
    /// until `load_active` is called.
    pub fn empty() -> Self {
        Self {
            active: None,
            tiles: HashMap::new(),
            synthesized: HashSet::new(),
            template: None,
            dirty: HashMap::new(),
            touched: HashSet::new(),
            mode: TileMode::default(),
        }
    }

    /// Replace the active tile wholesale (tile load) and re-snapshot the
    /// template. Materialized synthesized neighbors regenerate lazily.
    pub fn load_active(&mut self, data: TileData) {
        self.template = Some(TileTemplate::snapshot(&data));
        self.active = Some(data);
        for id in self.synthesized.drain() {
            self.tiles.remove(&id);
        }
        self.dirty.clear();
        self.touched.clear();
    }

    pub fn active(&self) -> Result<&TileData, TerrainError> {
        self.active.as_ref().ok_or(TerrainError::NoActiveTile)
    }

    pub fn mode(&self) -> TileMode {
        self.mode
    }

    /// Switch tiling mode, regenerating every currently materialized
    /// synthesized neighbor. Explicitly stored tiles are untouched.
    pub fn set_mode(&mut self, mode: TileMode) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        if let Some(template) = &self.template {
            for id in &self.synthesized {
                self.tiles.insert(*id, template.synthesize(*id, mode));
            }
        }
    }

    /// Resolution of the active heightmap, for the rendering layer.
    pub fn resolution(&self) -> Result<usize, TerrainError> {
        Ok(self.active()?.resolution())
    }

    /// World size of the active tile.
    pub fn scale(&self) -> Result<f32, TerrainError> {
        Ok(self.active()?.size())
    }

    // ------------------------------------------------------------------
    // Rendering-layer accessors (active tile)
    // ------------------------------------------------------------------

    pub fn get_height(&self, x: usize, z: usize) -> Result<f32, TerrainError> {
        Ok(self.active()?.heightmap.get(x, z))
    }

    pub fn set_height(&mut self, x: usize, z: usize, height: f32) -> Result<(), TerrainError> {
        let active = self.active.as_mut().ok_or(TerrainError::NoActiveTile)?;
        active.heightmap.set(x, z, height);
        self.mark_touched(TileId::ACTIVE, |d| d.mark_heightmap());
        Ok(())
    }

    pub fn get_weights(&self, x: usize, z: usize) -> Result<[f32; 4], TerrainError> {
        Ok(self.active()?.splat.get_weights(x, z))
    }

    /// Set one cell's material weights; the buffer renormalizes the cell so
    /// direct writes keep the weight-sum invariant.
    pub fn set_weights(&mut self, x: usize, z: usize, weights: [f32; 4]) -> Result<(), TerrainError> {
        let active = self.active.as_mut().ok_or(TerrainError::NoActiveTile)?;
        active.splat.set_weights(x, z, weights);
        self.mark_touched(TileId::ACTIVE, |d| d.mark_splatmap());
        Ok(())
    }

    pub fn get_water_weight(&self, x: usize, z: usize) -> Result<f32, TerrainError> {
        Ok(self.active()?.splat.get_water(x, z))
    }

    /// Flat height buffer of the active tile for bulk mesh upload.
    pub fn height_slice(&self) -> Result<&[f32], TerrainError> {
        Ok(self.active()?.heightmap.heights.as_slice())
    }

    /// Flat per-cell weight buffer of the active tile for bulk texture
    /// upload.
    pub fn weight_slice(&self) -> Result<&[[f32; 4]], TerrainError> {
        Ok(self.active()?.splat.weights.as_slice())
    }

    /// Flat water mask of the active tile.
    pub fn water_slice(&self) -> Result<&[f32], TerrainError> {
        Ok(self.active()?.splat.water.as_slice())
    }

    // ------------------------------------------------------------------
    // Tile materialization
    // ------------------------------------------------------------------

    /// Borrow a tile's data, materializing it on demand. The active id
    /// resolves to the live buffers; unknown ids synthesize from the
    /// template per the current tile mode.
    pub fn tile_data(&mut self, id: TileId) -> Result<&TileData, TerrainError> {
        self.materialize(id)?;
        if id.is_active() {
            return self.active();
        }
        Ok(&self.tiles[&id])
    }

    /// Mutable variant of [`tile_data`](Self::tile_data). Callers must mark
    /// the matching dirty channel themselves.
    pub fn tile_data_mut(&mut self, id: TileId) -> Result<&mut TileData, TerrainError> {
        self.materialize(id)?;
        if id.is_active() {
            return self.active.as_mut().ok_or(TerrainError::NoActiveTile);
        }
        self.tiles.get_mut(&id).ok_or(TerrainError::MissingTile(id))
    }

    fn materialize(&mut self, id: TileId) -> Result<(), TerrainError> {
        if id.is_active() {
            if self.active.is_none() {
                return Err(TerrainError::NoActiveTile);
            }
            return Ok(());
        }
        if self.tiles.contains_key(&id) {
            return Ok(());
        }
        let template = self.template.as_ref().ok_or(TerrainError::MissingTile(id))?;
        self.tiles.insert(id, template.synthesize(id, self.mode));
        self.synthesized.insert(id);
        Ok(())
    }

    /// Install explicitly loaded data for a tile (manual placement). A
    /// previously synthesized preview at that position is replaced.
    pub fn insert_tile(&mut self, id: TileId, data: TileData) {
        self.synthesized.remove(&id);
        self.tiles.insert(id, data);
    }

    /// Install a manual placement, or a synthesized stand-in when the
    /// referenced tile has no stored data.
    pub fn place_tile(&mut self, id: TileId, data: Option<TileData>) -> Result<(), TerrainError> {
        match data {
            Some(data) => self.insert_tile(id, data),
            None => {
                log::warn!("placement references tile {} with no stored data; using a stand-in", id);
                self.materialize(id)?;
            }
        }
        Ok(())
    }

    /// Whether a tile currently has materialized data (live or copied).
    pub fn is_materialized(&self, id: TileId) -> bool {
        id.is_active() && self.active.is_some() || self.tiles.contains_key(&id)
    }

    /// Drop a materialized neighbor copy (streaming eviction). Refuses the
    /// active tile and any tile with unsaved changes; both are no-ops.
    pub fn evict_tile(&mut self, id: TileId) -> bool {
        if id.is_active() {
            return false;
        }
        if self.dirty.get(&id).map(|d| d.any()).unwrap_or(false) {
            log::warn!("refusing to evict dirty tile {}", id);
            return false;
        }
        self.synthesized.remove(&id);
        self.tiles.remove(&id).is_some()
    }

    // ------------------------------------------------------------------
    // Brush mutation
    // ------------------------------------------------------------------

    /// Apply a sculpting brush to a tile at tile-local world coordinates.
    pub fn sculpt(
        &mut self,
        id: TileId,
        tool: BrushTool,
        x: f32,
        z: f32,
        settings: &BrushSettings,
        dt: f32,
    ) -> Result<bool, TerrainError> {
        let data = self.tile_data_mut(id)?;
        let changed = brush::apply_brush(&mut data.heightmap, tool, x, z, settings, dt);
        if changed {
            self.mark_touched(id, |d| d.mark_heightmap());
        }
        Ok(changed)
    }

    /// Paint one material channel on a tile.
    pub fn paint_material(
        &mut self,
        id: TileId,
        channel: MaterialChannel,
        x: f32,
        z: f32,
        settings: &BrushSettings,
        dt: f32,
    ) -> Result<bool, TerrainError> {
        let data = self.tile_data_mut(id)?;
        let size = data.size();
        let changed =
            brush::paint_material(&mut data.splat, channel, x, z, size, settings, dt);
        if changed {
            self.mark_touched(id, |d| d.mark_splatmap());
        }
        Ok(changed)
    }

    /// Paint water on a tile. The first water paint derives the tile's sea
    /// level from the terrain height at the brush point, giving later
    /// carving a reference plane.
    pub fn paint_water(
        &mut self,
        id: TileId,
        x: f32,
        z: f32,
        settings: &BrushSettings,
        dt: f32,
    ) -> Result<bool, TerrainError> {
        let data = self.tile_data_mut(id)?;
        if data.sea_level.is_none() {
            data.sea_level = Some(water::derive_sea_level(&data.heightmap, x, z));
        }
        let size = data.size();
        let changed = water::paint_water(&mut data.splat, x, z, size, settings, dt);
        if changed {
            self.mark_touched(id, |d| d.mark_water());
        }
        Ok(changed)
    }

    /// Carve the water basin under a painted water body. Requires a sea
    /// level, i.e. at least one prior water paint on the tile.
    pub fn carve_basin(
        &mut self,
        id: TileId,
        x: f32,
        z: f32,
        brush_radius: f32,
        shore_height: f32,
        strength: f32,
    ) -> Result<bool, TerrainError> {
        let data = self.tile_data_mut(id)?;
        let Some(sea_level) = data.sea_level else {
            return Ok(false);
        };
        let depth = data.water_depth;
        let changed = water::carve_water_basin(
            &mut data.heightmap,
            x,
            z,
            brush_radius,
            sea_level,
            depth,
            shore_height,
            strength,
        );
        let size = data.size();
        let shore =
            water::paint_shore_sand(&mut data.splat, x, z, brush_radius, size, strength * 0.05);
        if changed || shore {
            self.mark_touched(id, |d| {
                d.mark_heightmap();
                d.mark_splatmap();
            });
        }
        Ok(changed || shore)
    }

    /// Mark dirty channels without entering the stroke-touched set (used by
    /// edge sync, whose writes must not cascade into further sync pairs).
    pub fn mark_dirty(&mut self, id: TileId, mark: impl FnOnce(&mut DirtyFlags)) {
        mark(self.dirty.entry(id).or_default());
        self.synthesized.remove(&id);
    }

    fn mark_touched(&mut self, id: TileId, mark: impl FnOnce(&mut DirtyFlags)) {
        mark(self.dirty.entry(id).or_default());
        self.touched.insert(id);
        // An edited synthesized preview becomes real editable data
        self.synthesized.remove(&id);
    }

    // ------------------------------------------------------------------
    // Dirty tracking and stroke lifecycle
    // ------------------------------------------------------------------

    pub fn dirty_flags(&self, id: TileId) -> DirtyFlags {
        self.dirty.get(&id).copied().unwrap_or_default()
    }

    /// Clear a tile's dirty flags after a successful external save, and
    /// refresh the default template if the saved tile is the active one.
    pub fn mark_saved(&mut self, id: TileId) {
        if let Some(flags) = self.dirty.get_mut(&id) {
            flags.clear();
        }
        if id.is_active() {
            if let Some(active) = &self.active {
                self.template = Some(TileTemplate::snapshot(active));
            }
        }
    }

    /// Tiles mutated during the current stroke.
    pub fn touched_tiles(&self) -> Vec<TileId> {
        let mut ids: Vec<TileId> = self.touched.iter().copied().collect();
        ids.sort();
        ids
    }

    /// Drain the stroke-touched set (pointer release).
    pub fn end_stroke(&mut self) -> Vec<TileId> {
        let mut ids: Vec<TileId> = self.touched.drain().collect();
        ids.sort();
        ids
    }
}
