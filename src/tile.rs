//! Tile identity and per-tile editable data
//!
//! A tile is one authoring unit of terrain addressed by integer grid
//! coordinates. The tile at (0, 0) is the active tile, backed by the live
//! buffers; every other tile is an on-demand copy or is synthesized from the
//! default tile template by checkerboard mirroring.

use chrono::{DateTime, Utc};

use crate::raster::Heightmap;
use crate::splat::SplatBuffer;

/// Integer grid coordinates identifying a tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct TileId {
    pub gx: i32,
    pub gy: i32,
}

impl TileId {
    /// The always-resident active tile.
    pub const ACTIVE: TileId = TileId { gx: 0, gy: 0 };

    pub fn new(gx: i32, gy: i32) -> Self {
        Self { gx, gy }
    }

    pub fn is_active(&self) -> bool {
        *self == Self::ACTIVE
    }

    /// The 4 edge neighbors (left, right, up, down).
    pub fn edge_neighbors(&self) -> [TileId; 4] {
        [
            TileId::new(self.gx - 1, self.gy),
            TileId::new(self.gx + 1, self.gy),
            TileId::new(self.gx, self.gy - 1),
            TileId::new(self.gx, self.gy + 1),
        ]
    }

    /// The 4 diagonal neighbors.
    pub fn corner_neighbors(&self) -> [TileId; 4] {
        [
            TileId::new(self.gx - 1, self.gy - 1),
            TileId::new(self.gx + 1, self.gy - 1),
            TileId::new(self.gx - 1, self.gy + 1),
            TileId::new(self.gx + 1, self.gy + 1),
        ]
    }
}

impl std::fmt::Display for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.gx, self.gy)
    }
}

/// How unedited neighbor tiles are synthesized for infinite extension.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileMode {
    /// Reflect the template across X/Z per checkerboard parity.
    /// Seamless edges by construction, at the cost of mirrored detail.
    #[default]
    Mirror,
    /// Plain repetition. Simpler, visible seams possible.
    Clone,
}

/// Per-channel dirty flags with a last-modified timestamp.
/// Cleared only after a successful external save.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirtyFlags {
    pub heightmap: bool,
    pub splatmap: bool,
    pub foliage: bool,
    pub water: bool,
    pub last_modified: Option<DateTime<Utc>>,
}

impl DirtyFlags {
    pub fn any(&self) -> bool {
        self.heightmap || self.splatmap || self.foliage || self.water
    }

    fn touch(&mut self) {
        self.last_modified = Some(Utc::now());
    }

    pub fn mark_heightmap(&mut self) {
        self.heightmap = true;
        // Terrain changes move foliage anchor points too
        self.foliage = true;
        self.touch();
    }

    pub fn mark_splatmap(&mut self) {
        self.splatmap = true;
        self.foliage = true;
        self.touch();
    }

    pub fn mark_water(&mut self) {
        self.water = true;
        self.touch();
    }

    pub fn clear(&mut self) {
        self.heightmap = false;
        self.splatmap = false;
        self.foliage = false;
        self.water = false;
    }
}

/// One tile's editable raster data: an on-demand copy of heightmap, splat
/// and water buffers at their own resolutions.
#[derive(Clone)]
pub struct TileData {
    pub heightmap: Heightmap,
    pub splat: SplatBuffer,
    pub sea_level: Option<f32>,
    pub water_depth: f32,
}

impl TileData {
    pub fn new(resolution: usize, splat_resolution: usize, size: f32) -> Self {
        Self {
            heightmap: Heightmap::new(resolution, size),
            splat: SplatBuffer::new(splat_resolution),
            sea_level: None,
            water_depth: 4.0,
        }
    }

    pub fn resolution(&self) -> usize {
        self.heightmap.resolution()
    }

    pub fn splat_resolution(&self) -> usize {
        self.splat.resolution()
    }

    pub fn size(&self) -> f32 {
        self.heightmap.size
    }
}

/// Snapshot of the active tile's buffers, used to synthesize unedited
/// neighbor tiles. Captured whenever the active tile is saved/updated.
#[derive(Clone)]
pub struct TileTemplate {
    data: TileData,
}

impl TileTemplate {
    /// Snapshot a tile, repairing any degenerate splat cells first.
    pub fn snapshot(data: &TileData) -> Self {
        let mut data = data.clone();
        data.splat.repair();
        Self { data }
    }

    pub fn data(&self) -> &TileData {
        &self.data
    }

    /// Synthesize the tile at a grid position. Mirror mode reflects on X
    /// when gx is odd and on Z when gy is odd, so every shared border lines
    /// up by construction; Clone mode repeats the template verbatim.
    pub fn synthesize(&self, id: TileId, mode: TileMode) -> TileData {
        match mode {
            TileMode::Clone => self.data.clone(),
            TileMode::Mirror => {
                let mirror_x = id.gx.rem_euclid(2) == 1;
                let mirror_z = id.gy.rem_euclid(2) == 1;
                let mut out = self.data.clone();
                if mirror_x {
                    out.heightmap.heights = out.heightmap.heights.mirrored_x();
                    out.splat = out.splat.mirrored_x();
                }
                if mirror_z {
                    out.heightmap.heights = out.heightmap.heights.mirrored_z();
                    out.splat = out.splat.mirrored_z();
                }
                out
            }
        }
    }
}
