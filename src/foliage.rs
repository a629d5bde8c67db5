//! Foliage chunk generation and LOD
//!
//! Vegetation is generated per fixed-size spatial chunk, independent of
//! both the tile grid and the streaming cell grid (chunks are smaller, for
//! finer culling). Each chunk's instances are produced by a deterministic
//! chunk-seeded generator and then shuffled, so truncating the buffer for
//! the Mid tier yields a spatially uniform subsample instead of a biased
//! prefix.

use std::collections::HashMap;

use crate::splat::MaterialChannel;
use crate::tile::{TileData, TileId};

/// Water weight above which a sample point is considered submerged.
const WATER_REJECT: f32 = 0.1;
/// Power-curve exponent biasing instance sizes toward small values.
const SIZE_BIAS: f32 = 2.5;
/// Every Nth instance joins the impostor billboard batch.
const IMPOSTOR_SAMPLING_RATE: usize = 4;

/// Chunk grid coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    pub cx: i32,
    pub cz: i32,
}

impl ChunkKey {
    pub fn new(cx: i32, cz: i32) -> Self {
        Self { cx, cz }
    }
}

/// Detail tier currently applied to a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FoliageLod {
    /// Full-density 3D instances
    Near,
    /// Half-density 3D instances (buffer truncation, no regeneration)
    Mid,
    /// One camera-facing billboard batch per chunk
    Impostor,
}

/// One vegetation category and its placement rules.
#[derive(Clone, Debug)]
pub struct VegetationType {
    pub name: String,
    /// Material channel whose weight gates and scales placement
    pub channel: MaterialChannel,
    /// Minimum sampled weight for a sample to be considered at all
    pub weight_threshold: f32,
    /// Maximum terrain slope (rise over run) an instance tolerates
    pub slope_limit: f32,
    /// Sample attempts per chunk at full density
    pub samples_per_chunk: usize,
    /// Number of mesh variations registered for this type
    pub variations: usize,
    pub min_scale: f32,
    pub max_scale: f32,
}

impl VegetationType {
    /// Registry key for one mesh variation, `"<type>_v<variationIndex>"`.
    pub fn mesh_key(&self, variation: usize) -> String {
        format!("{}_v{}", self.name, variation)
    }
}

/// A single placed instance transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FoliageInstance {
    pub position: [f32; 3],
    /// Yaw in radians
    pub rotation: f32,
    pub scale: f32,
    pub variation: usize,
}

/// Aggregated camera-facing billboards replacing individual instances.
#[derive(Clone, Debug, Default)]
pub struct ImpostorBatch {
    pub positions: Vec<[f32; 3]>,
    pub scales: Vec<f32>,
}

/// Per-chunk instance data at full density plus the tier currently shown.
pub struct FoliageChunk {
    /// Shuffled full-density instances, one buffer per vegetation type
    instances: Vec<Vec<FoliageInstance>>,
    /// How many leading instances of each buffer are active at the tier
    active_counts: Vec<usize>,
    impostor: Option<ImpostorBatch>,
    lod: FoliageLod,
}

impl FoliageChunk {
    pub fn lod(&self) -> FoliageLod {
        self.lod
    }

    /// Active slice of one type's instance buffer (empty in Impostor).
    pub fn active_instances(&self, type_index: usize) -> &[FoliageInstance] {
        &self.instances[type_index][..self.active_counts[type_index]]
    }

    /// Full-density count for one type.
    pub fn full_count(&self, type_index: usize) -> usize {
        self.instances[type_index].len()
    }

    pub fn impostor(&self) -> Option<&ImpostorBatch> {
        self.impostor.as_ref()
    }
}

/// Terrain data source for chunk generation. Implemented by whatever owns
/// the raster buffers; references are scoped to a single generation call.
pub trait TerrainSampling {
    fn height(&self, wx: f32, wz: f32) -> f32;
    fn material_weight(&self, channel: MaterialChannel, wx: f32, wz: f32) -> f32;
    fn water(&self, wx: f32, wz: f32) -> f32;
}

/// A tile's rasters span only that tile's local 0..size range, so sampling
/// tile (0, 0) can take world coordinates directly.
impl TerrainSampling for TileData {
    fn height(&self, wx: f32, wz: f32) -> f32 {
        self.heightmap.sample_world(wx, wz)
    }

    fn material_weight(&self, channel: MaterialChannel, wx: f32, wz: f32) -> f32 {
        let size = self.size();
        self.splat.sample_channel(channel, wx / size, wz / size)
    }

    fn water(&self, wx: f32, wz: f32) -> f32 {
        let size = self.size();
        self.splat.sample_water(wx / size, wz / size)
    }
}

/// A tile's rasters positioned at the tile's world-grid origin. Chunk
/// bounds are world-space, so generating a chunk over any tile other than
/// (0, 0) must translate into the tile-local raster range first (without
/// this, out-of-range samples clamp to the tile border).
pub struct PlacedTile<'a> {
    data: &'a TileData,
    origin_x: f32,
    origin_z: f32,
}

impl<'a> PlacedTile<'a> {
    pub fn new(data: &'a TileData, tile: TileId) -> Self {
        let size = data.size();
        Self {
            data,
            origin_x: tile.gx as f32 * size,
            origin_z: tile.gy as f32 * size,
        }
    }
}

impl TerrainSampling for PlacedTile<'_> {
    fn height(&self, wx: f32, wz: f32) -> f32 {
        self.data.height(wx - self.origin_x, wz - self.origin_z)
    }

    fn material_weight(&self, channel: MaterialChannel, wx: f32, wz: f32) -> f32 {
        self.data
            .material_weight(channel, wx - self.origin_x, wz - self.origin_z)
    }

    fn water(&self, wx: f32, wz: f32) -> f32 {
        self.data.water(wx - self.origin_x, wz - self.origin_z)
    }
}

/// Chunk-coordinate-seeded linear congruential generator. Cheap, and fully
/// reproducible from the chunk key alone.
struct Lcg {
    state: u32,
}

impl Lcg {
    fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(1664525).wrapping_add(1013904223);
        self.state
    }

    /// Uniform float in [0, 1).
    fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / 16_777_216.0
    }

    fn next_range(&mut self, n: usize) -> usize {
        if n == 0 {
            0
        } else {
            self.next_u32() as usize % n
        }
    }
}

/// Manages generation, LOD and disposal of foliage chunks.
pub struct FoliageChunkManager {
    chunk_size: f32,
    world_seed: u32,
    types: Vec<VegetationType>,
    chunks: HashMap<ChunkKey, FoliageChunk>,
    /// Base mesh registry keyed by `"<type>_v<variationIndex>"`
    meshes: HashMap<String, String>,
}

impl FoliageChunkManager {
    pub fn new(chunk_size: f32, world_seed: u32, types: Vec<VegetationType>) -> Self {
        let mut meshes = HashMap::new();
        for ty in &types {
            for v in 0..ty.variations {
                meshes.insert(ty.mesh_key(v), format!("meshes/{}/{}.glb", ty.name, v));
            }
        }
        Self {
            chunk_size,
            world_seed,
            types,
            chunks: HashMap::new(),
            meshes,
        }
    }

    pub fn chunk_size(&self) -> f32 {
        self.chunk_size
    }

    pub fn types(&self) -> &[VegetationType] {
        &self.types
    }

    /// Base mesh asset path for a `"<type>_v<variationIndex>"` key.
    pub fn get_base_mesh(&self, key: &str) -> Option<&str> {
        self.meshes.get(key).map(String::as_str)
    }

    pub fn chunk(&self, key: ChunkKey) -> Option<&FoliageChunk> {
        self.chunks.get(&key)
    }

    /// Chunk containing a world position.
    pub fn chunk_at(&self, wx: f32, wz: f32) -> ChunkKey {
        ChunkKey::new(
            (wx / self.chunk_size).floor() as i32,
            (wz / self.chunk_size).floor() as i32,
        )
    }

    fn chunk_seed(&self, key: ChunkKey) -> u32 {
        (key.cx as u32)
            .wrapping_mul(73_856_093)
            .wrapping_add((key.cz as u32).wrapping_mul(19_349_663))
            .wrapping_add(self.world_seed)
    }

    /// Generate (or regenerate) one chunk's instance buffers at full
    /// density from the terrain rasters, starting it at the Near tier.
    pub fn generate_chunk(&mut self, key: ChunkKey, terrain: &impl TerrainSampling) {
        let mut rng = Lcg::new(self.chunk_seed(key));
        let origin_x = key.cx as f32 * self.chunk_size;
        let origin_z = key.cz as f32 * self.chunk_size;

        let mut instances = Vec::with_capacity(self.types.len());
        for ty in &self.types {
            let mut buf = Vec::new();
            for _ in 0..ty.samples_per_chunk {
                let wx = origin_x + rng.next_f32() * self.chunk_size;
                let wz = origin_z + rng.next_f32() * self.chunk_size;

                let weight = terrain.material_weight(ty.channel, wx, wz);
                if weight < ty.weight_threshold {
                    continue;
                }
                if terrain.water(wx, wz) > WATER_REJECT {
                    continue;
                }
                if slope_at(terrain, wx, wz) > ty.slope_limit {
                    continue;
                }
                // Soft density: acceptance probability equals the weight
                if rng.next_f32() >= weight {
                    continue;
                }

                let scale = ty.min_scale
                    + (ty.max_scale - ty.min_scale) * rng.next_f32().powf(SIZE_BIAS);
                buf.push(FoliageInstance {
                    position: [wx, terrain.height(wx, wz), wz],
                    rotation: rng.next_f32() * std::f32::consts::TAU,
                    scale,
                    variation: rng.next_range(ty.variations),
                });
            }
            // Shuffle so any prefix is a spatially uniform subsample
            fisher_yates(&mut buf, &mut rng);
            buf.shrink_to_fit();
            instances.push(buf);
        }

        let active_counts = instances.iter().map(Vec::len).collect();
        self.chunks.insert(
            key,
            FoliageChunk {
                instances,
                active_counts,
                impostor: None,
                lod: FoliageLod::Near,
            },
        );
    }

    /// Switch a chunk's tier, disposing the representation it leaves and
    /// creating the one it enters. No regeneration: density changes are
    /// pure buffer truncation.
    pub fn set_chunk_lod(&mut self, key: ChunkKey, lod: FoliageLod) {
        let Some(chunk) = self.chunks.get_mut(&key) else {
            return;
        };
        if chunk.lod == lod {
            return;
        }
        match lod {
            FoliageLod::Near => {
                chunk.impostor = None;
                for (count, buf) in chunk.active_counts.iter_mut().zip(&chunk.instances) {
                    *count = buf.len();
                }
            }
            FoliageLod::Mid => {
                chunk.impostor = None;
                for (count, buf) in chunk.active_counts.iter_mut().zip(&chunk.instances) {
                    *count = buf.len() / 2;
                }
            }
            FoliageLod::Impostor => {
                let mut batch = ImpostorBatch::default();
                for buf in &chunk.instances {
                    for inst in buf.iter().step_by(IMPOSTOR_SAMPLING_RATE) {
                        batch.positions.push(inst.position);
                        batch.scales.push(inst.scale);
                    }
                }
                for count in chunk.active_counts.iter_mut() {
                    *count = 0;
                }
                chunk.impostor = Some(batch);
            }
        }
        chunk.lod = lod;
    }

    /// Dispose a chunk entirely (the Far/unloaded tier).
    pub fn unload_chunk(&mut self, key: ChunkKey) {
        self.chunks.remove(&key);
    }

    /// All chunk keys overlapping a world-space rectangle (e.g. one
    /// streaming cell), for driving per-cell LOD changes.
    pub fn chunks_in_rect(&self, min_x: f32, min_z: f32, max_x: f32, max_z: f32) -> Vec<ChunkKey> {
        let first = self.chunk_at(min_x, min_z);
        let last = ChunkKey::new(
            ((max_x / self.chunk_size).ceil() as i32) - 1,
            ((max_z / self.chunk_size).ceil() as i32) - 1,
        );
        let mut out = Vec::new();
        for cz in first.cz..=last.cz.max(first.cz) {
            for cx in first.cx..=last.cx.max(first.cx) {
                out.push(ChunkKey::new(cx, cz));
            }
        }
        out
    }

    pub fn loaded_chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

/// Finite-difference terrain gradient magnitude at a world position.
fn slope_at(terrain: &impl TerrainSampling, wx: f32, wz: f32) -> f32 {
    const EPS: f32 = 0.5;
    let dx = (terrain.height(wx + EPS, wz) - terrain.height(wx - EPS, wz)) / (2.0 * EPS);
    let dz = (terrain.height(wx, wz + EPS) - terrain.height(wx, wz - EPS)) / (2.0 * EPS);
    (dx * dx + dz * dz).sqrt()
}

/// Seeded Fisher-Yates shuffle driven by the chunk's own LCG stream.
fn fisher_yates(buf: &mut [FoliageInstance], rng: &mut Lcg) {
    for i in (1..buf.len()).rev() {
        let j = rng.next_range(i + 1);
        buf.swap(i, j);
    }
}
