use std::path::{Path, PathBuf};

use clap::Parser;

use tileworld::brush::{BrushSettings, BrushTool};
use tileworld::config::EditorConfig;
use tileworld::edge_sync;
use tileworld::export;
use tileworld::foliage::{FoliageChunkManager, FoliageLod, PlacedTile, VegetationType};
use tileworld::mapper::CellTileMapper;
use tileworld::persist::{self, TileConnections};
use tileworld::splat::MaterialChannel;
use tileworld::store::TileStore;
use tileworld::streaming::{CellLifecycle, CellState, LodTier, StreamingCoordinator};
use tileworld::tile::{TileId, TileMode};
use tileworld::worldgen::{self, BootstrapParams};

#[derive(Parser, Debug)]
#[command(name = "tileworld")]
#[command(about = "Edit and preview tileable procedural terrain worlds")]
struct Args {
    /// Heightmap resolution (vertices per tile side)
    #[arg(short, long, default_value = "129")]
    resolution: usize,

    /// Tile world size per side
    #[arg(long, default_value = "64.0")]
    size: f32,

    /// Random seed (uses a random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Load the active tile from a saved JSON file instead of generating
    #[arg(short, long)]
    load: Option<PathBuf>,

    /// Tiling mode for unedited neighbors: mirror or clone
    #[arg(long, default_value = "mirror")]
    mode: String,

    /// Run the scripted editing demo (sculpt, paint, water, sync)
    #[arg(long)]
    demo: bool,

    /// Export PNG previews to this directory
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Save the active tile to this JSON file when done
    #[arg(long)]
    save: Option<PathBuf>,
}

/// Streaming collaborator for the CLI: materializes tile previews through
/// the store and keeps foliage chunks for Near cells.
struct CliWorld<'a> {
    store: &'a mut TileStore,
    foliage: &'a mut FoliageChunkManager,
    mapper: CellTileMapper,
    loaded: usize,
    unloaded: usize,
}

impl CellLifecycle for CliWorld<'_> {
    fn on_load_cell(&mut self, cx: i32, cz: i32, lod: LodTier) {
        self.loaded += 1;
        for tile in self.mapper.cell_to_affected_tiles(cx, cz) {
            if let Err(e) = self.store.tile_data(tile) {
                log::warn!("could not materialize tile {}: {}", tile, e);
            }
        }
        // Near cells get their foliage immediately; Mid/Far wait for their
        // own LOD updates
        if lod == LodTier::Near {
            self.generate_foliage(cx, cz);
        }
    }

    fn on_unload_cell(&mut self, cx: i32, cz: i32) {
        self.unloaded += 1;
        let cell = self.mapper.cell_size();
        let (min_x, min_z) = (cx as f32 * cell, cz as f32 * cell);
        for key in self
            .foliage
            .chunks_in_rect(min_x, min_z, min_x + cell, min_z + cell)
        {
            self.foliage.unload_chunk(key);
        }
    }

    fn on_update_cell_lod(&mut self, cx: i32, cz: i32, lod: LodTier) {
        // Lazy generation for cells that never were Near, then rescale
        self.generate_foliage(cx, cz);
        self.set_foliage_lod(cx, cz, foliage_tier(lod));
    }
}

fn foliage_tier(lod: LodTier) -> FoliageLod {
    match lod {
        LodTier::Near => FoliageLod::Near,
        LodTier::Mid => FoliageLod::Mid,
        LodTier::Far => FoliageLod::Impostor,
    }
}

impl CliWorld<'_> {
    /// Generate any missing foliage chunks in a streaming cell, sampling
    /// each chunk's owning tile at its world-grid position.
    fn generate_foliage(&mut self, cx: i32, cz: i32) {
        let cell = self.mapper.cell_size();
        let tile_size = self.mapper.tile_size();
        let chunk_size = self.foliage.chunk_size();
        let (min_x, min_z) = (cx as f32 * cell, cz as f32 * cell);
        for key in self
            .foliage
            .chunks_in_rect(min_x, min_z, min_x + cell, min_z + cell)
        {
            if self.foliage.chunk(key).is_some() {
                continue;
            }
            let center_x = (key.cx as f32 + 0.5) * chunk_size;
            let center_z = (key.cz as f32 + 0.5) * chunk_size;
            let tile = TileId::new(
                (center_x / tile_size).floor() as i32,
                (center_z / tile_size).floor() as i32,
            );
            let Ok(data) = self.store.tile_data(tile) else {
                continue;
            };
            let data = data.clone();
            self.foliage.generate_chunk(key, &PlacedTile::new(&data, tile));
        }
    }

    fn set_foliage_lod(&mut self, cx: i32, cz: i32, lod: FoliageLod) {
        let cell = self.mapper.cell_size();
        let (min_x, min_z) = (cx as f32 * cell, cz as f32 * cell);
        for key in self
            .foliage
            .chunks_in_rect(min_x, min_z, min_x + cell, min_z + cell)
        {
            self.foliage.set_chunk_lod(key, lod);
        }
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let seed = args.seed.unwrap_or_else(worldgen::random_seed);
    println!("tileworld editor core");
    println!("  seed: {}", seed);

    let mut config = EditorConfig::default();
    config.resolution = args.resolution;
    config.splat_resolution = args.resolution;
    config.tile_size = args.size;
    config.tile_mode = match args.mode.as_str() {
        "clone" => TileMode::Clone,
        _ => TileMode::Mirror,
    };

    // Active tile: loaded or freshly generated
    let mut loaded_save = None;
    let active = match &args.load {
        Some(path) => match persist::load_tile_file(path) {
            Ok(save) => match persist::save_to_tile(&save) {
                Ok(data) => {
                    println!("  loaded tile from {}", path.display());
                    loaded_save = Some(save);
                    data
                }
                Err(e) => {
                    log::warn!("could not decode {}: {}; generating instead", path.display(), e);
                    bootstrap(&config, seed)
                }
            },
            Err(e) => {
                log::warn!("could not load {}: {}; generating instead", path.display(), e);
                bootstrap(&config, seed)
            }
        },
        None => bootstrap(&config, seed),
    };

    let mut store = TileStore::from_active(active);
    store.set_mode(config.tile_mode);

    // Manual placements referenced by the loaded tile's connections
    if let (Some(save), Some(path)) = (&loaded_save, &args.load) {
        let dir = path.parent().unwrap_or(Path::new("."));
        let sides = [
            (&save.connections.left, TileId::new(-1, 0)),
            (&save.connections.right, TileId::new(1, 0)),
            (&save.connections.top, TileId::new(0, -1)),
            (&save.connections.bottom, TileId::new(0, 1)),
        ];
        for (name, id) in sides {
            let Some(name) = name else { continue };
            let data = persist::load_tile_file(&dir.join(format!("{}.json", name)))
                .and_then(|s| persist::save_to_tile(&s))
                .ok();
            if let Err(e) = store.place_tile(id, data) {
                log::warn!("could not place connection {}: {}", name, e);
            }
        }
    }

    if args.demo {
        run_demo(&mut store, &config, seed);
    }

    if let Some(dir) = &args.export {
        if let Ok(active) = store.active() {
            std::fs::create_dir_all(dir).ok();
            let hm_path = dir.join("heightmap.png");
            let splat_path = dir.join("splat.png");
            let water_path = dir.join("water.png");
            if let Err(e) = export::export_heightmap(&active.heightmap, &hm_path.to_string_lossy()) {
                eprintln!("heightmap export failed: {}", e);
            }
            if let Err(e) = export::export_splat(&active.splat, &splat_path.to_string_lossy()) {
                eprintln!("splat export failed: {}", e);
            }
            if let Err(e) = export::export_water_mask(&active.splat, &water_path.to_string_lossy()) {
                eprintln!("water mask export failed: {}", e);
            }
            println!("  previews written to {}", dir.display());
        }
    }

    if let Some(path) = &args.save {
        if let Ok(active) = store.active() {
            let save = persist::tile_to_save("0,0", "active", active, TileConnections::default());
            match persist::save_tile_file(&save, path) {
                Ok(()) => {
                    store.mark_saved(TileId::ACTIVE);
                    println!("  saved active tile to {}", path.display());
                }
                Err(e) => eprintln!("save failed: {}", e),
            }
        }
    }
}

/// Scripted editing session exercising the whole pipeline: sculpting near
/// a tile border, material paint, a water pond with carving, the edge sync
/// pass, and a streaming walk with foliage.
fn run_demo(store: &mut TileStore, config: &EditorConfig, seed: u64) {
    let size = config.tile_size;
    let settings = BrushSettings {
        size: size * 0.12,
        ..config.brush
    };

    println!("  sculpting...");
    // A ridge crossing the right edge so the sync pass has work to do
    for step in 0..8 {
        let z = size * 0.3 + step as f32 * size * 0.05;
        store
            .sculpt(TileId::ACTIVE, BrushTool::Raise, size * 0.92, z, &settings, 0.5)
            .ok();
    }
    // Rock on the ridge
    for step in 0..8 {
        let z = size * 0.3 + step as f32 * size * 0.05;
        store
            .paint_material(
                TileId::ACTIVE,
                MaterialChannel::Rock,
                size * 0.92,
                z,
                &settings,
                0.5,
            )
            .ok();
    }
    // A pond in the lower-left quadrant
    println!("  carving water...");
    store
        .paint_water(TileId::ACTIVE, size * 0.25, size * 0.7, &settings, 1.0)
        .ok();
    for _ in 0..40 {
        store
            .carve_basin(TileId::ACTIVE, size * 0.25, size * 0.7, settings.size, 1.0, 1.0)
            .ok();
    }

    // Pointer release: reconcile all touched boundaries
    let touched = store.end_stroke();
    println!("  syncing {} touched tile(s)...", touched.len());
    match edge_sync::sync_pass(store, &touched, &config.sync) {
        Ok(regen) => println!("  {} tile(s) need regeneration", regen.len()),
        Err(e) => eprintln!("  sync failed: {}", e),
    }

    // Streaming walk with foliage generation
    println!("  streaming walk...");
    let mapper = CellTileMapper::new(config.cell_size, config.tile_size);
    let mut coordinator = StreamingCoordinator::new(config.streaming, mapper);
    let mut foliage = FoliageChunkManager::new(
        config.chunk_size,
        worldgen::derive_seed(seed, "foliage") as u32,
        default_vegetation(),
    );
    let mut world = CliWorld {
        store,
        foliage: &mut foliage,
        mapper,
        loaded: 0,
        unloaded: 0,
    };
    for step in 0..12 {
        let x = size * 1.5 + step as f32 * config.cell_size;
        coordinator.update(x, size * 1.5, &mut world);
        let pending: Vec<(i32, i32)> = coordinator
            .resident_cells()
            .filter(|(_, s)| matches!(s, CellState::Loading(_)))
            .map(|(k, _)| k)
            .collect();
        for (cx, cz) in pending {
            coordinator.finish_loading(cx, cz);
        }
    }
    println!(
        "  cells loaded: {}, unloaded: {}, foliage chunks: {}",
        world.loaded,
        world.unloaded,
        world.foliage.loaded_chunk_count()
    );
}

fn bootstrap(config: &EditorConfig, seed: u64) -> tileworld::tile::TileData {
    worldgen::bootstrap_tile(
        config.resolution,
        config.splat_resolution,
        config.tile_size,
        worldgen::derive_seed(seed, "terrain"),
        &BootstrapParams::default(),
    )
}

fn default_vegetation() -> Vec<VegetationType> {
    vec![
        VegetationType {
            name: "tree".to_string(),
            channel: MaterialChannel::Grass,
            weight_threshold: 0.4,
            slope_limit: 0.8,
            samples_per_chunk: 48,
            variations: 3,
            min_scale: 0.7,
            max_scale: 1.5,
        },
        VegetationType {
            name: "bush".to_string(),
            channel: MaterialChannel::Grass,
            weight_threshold: 0.3,
            slope_limit: 1.0,
            samples_per_chunk: 96,
            variations: 2,
            min_scale: 0.4,
            max_scale: 1.0,
        },
        VegetationType {
            name: "boulder".to_string(),
            channel: MaterialChannel::Rock,
            weight_threshold: 0.5,
            slope_limit: 1.6,
            samples_per_chunk: 24,
            variations: 2,
            min_scale: 0.5,
            max_scale: 2.0,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tileworld::foliage::ChunkKey;

    #[test]
    fn test_cell_lod_drives_foliage_tiers() {
        let mut store = TileStore::new(65, 65, 64.0);
        let mut foliage = FoliageChunkManager::new(8.0, 7, default_vegetation());
        let mapper = CellTileMapper::new(16.0, 64.0);
        let mut world = CliWorld {
            store: &mut store,
            foliage: &mut foliage,
            mapper,
            loaded: 0,
            unloaded: 0,
        };

        // Cell (1, 1) spans world 16..32 and contains chunk (2, 2)
        world.on_load_cell(1, 1, LodTier::Near);
        let key = ChunkKey::new(2, 2);
        let chunk = world.foliage.chunk(key).unwrap();
        assert_eq!(chunk.lod(), FoliageLod::Near);
        let near_count = chunk.active_instances(0).len();
        assert!(near_count > 0);

        // Dropping to Mid truncates every chunk in the cell to half density
        world.on_update_cell_lod(1, 1, LodTier::Mid);
        let chunk = world.foliage.chunk(key).unwrap();
        assert_eq!(chunk.lod(), FoliageLod::Mid);
        assert_eq!(chunk.active_instances(0).len(), near_count / 2);

        // Far swaps the instances for a billboard batch
        world.on_update_cell_lod(1, 1, LodTier::Far);
        let chunk = world.foliage.chunk(key).unwrap();
        assert_eq!(chunk.lod(), FoliageLod::Impostor);
        assert!(chunk.active_instances(0).is_empty());
        assert!(chunk.impostor().is_some());

        // Returning to Near restores full density without regeneration
        world.on_update_cell_lod(1, 1, LodTier::Near);
        let chunk = world.foliage.chunk(key).unwrap();
        assert_eq!(chunk.lod(), FoliageLod::Near);
        assert_eq!(chunk.active_instances(0).len(), near_count);

        // Unloading the cell disposes its chunks
        world.on_unload_cell(1, 1);
        assert!(world.foliage.chunk(key).is_none());
    }

    #[test]
    fn test_mid_cell_generates_lazily_on_lod_update() {
        let mut store = TileStore::new(65, 65, 64.0);
        let mut foliage = FoliageChunkManager::new(8.0, 7, default_vegetation());
        let mapper = CellTileMapper::new(16.0, 64.0);
        let mut world = CliWorld {
            store: &mut store,
            foliage: &mut foliage,
            mapper,
            loaded: 0,
            unloaded: 0,
        };

        // A cell loaded straight at Mid has no foliage yet
        world.on_load_cell(2, 0, LodTier::Mid);
        let key = ChunkKey::new(4, 0);
        assert!(world.foliage.chunk(key).is_none());

        // Its first LOD update generates and truncates in one step
        world.on_update_cell_lod(2, 0, LodTier::Mid);
        let chunk = world.foliage.chunk(key).unwrap();
        assert_eq!(chunk.lod(), FoliageLod::Mid);
        assert_eq!(chunk.active_instances(0).len(), chunk.full_count(0) / 2);
    }
}
