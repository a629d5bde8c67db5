//! Cell-to-tile coordinate mapping
//!
//! The streaming grid uses fixed-size cells; the authoring grid uses tiles
//! whose size is runtime-configurable (new-terrain creation can change it),
//! so `cells_per_tile` is live configuration, not a constructor constant.
//! Depending on the ratio, one tile covers many cells or one cell covers
//! many tiles, and the mapper supports both regimes.

use crate::tile::TileId;

/// Stateless (aside from its configured sizes) transform between cell and
/// tile coordinates.
#[derive(Clone, Copy, Debug)]
pub struct CellTileMapper {
    cell_size: f32,
    tile_size: f32,
}

impl CellTileMapper {
    pub fn new(cell_size: f32, tile_size: f32) -> Self {
        Self {
            cell_size,
            tile_size,
        }
    }

    /// Tiles-per-cell-side ratio; >= 1 means tiles are at least cell-sized.
    pub fn cells_per_tile(&self) -> f32 {
        self.tile_size / self.cell_size
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    /// Reconfigure the tile size (new-terrain creation).
    pub fn set_tile_size(&mut self, tile_size: f32) {
        self.tile_size = tile_size;
    }

    pub fn set_cell_size(&mut self, cell_size: f32) {
        self.cell_size = cell_size;
    }

    /// The tile containing a cell's origin corner. In the cell-larger-than-
    /// tile regime this is the first contained tile; use
    /// [`cell_to_affected_tiles`](Self::cell_to_affected_tiles) for all of
    /// them.
    pub fn cell_to_tile(&self, cx: i32, cz: i32) -> TileId {
        let cpt = self.cells_per_tile() as f64;
        if cpt >= 1.0 {
            TileId::new(
                (cx as f64 / cpt).floor() as i32,
                (cz as f64 / cpt).floor() as i32,
            )
        } else {
            // Cell origin in world space, divided down to tile coords
            let tiles_x = cx as f64 * self.cell_size as f64 / self.tile_size as f64;
            let tiles_z = cz as f64 * self.cell_size as f64 / self.tile_size as f64;
            TileId::new(tiles_x.floor() as i32, tiles_z.floor() as i32)
        }
    }

    /// All cells covered by a tile (tile-at-least-cell-sized regime). In
    /// the other regime this returns the single cell containing the tile's
    /// origin.
    pub fn tile_to_cells(&self, tile: TileId) -> Vec<(i32, i32)> {
        let cpt = self.cells_per_tile() as f64;
        let xs = axis_range(tile.gx, cpt);
        let zs = axis_range(tile.gy, cpt);
        let mut out = Vec::with_capacity(xs.len() * zs.len());
        for &cz in &zs {
            for &cx in &xs {
                out.push((cx, cz));
            }
        }
        out
    }

    /// All tiles a cell overlaps, including partially-overlapped ones at
    /// unaligned boundaries.
    pub fn cell_to_affected_tiles(&self, cx: i32, cz: i32) -> Vec<TileId> {
        let cell = self.cell_size as f64;
        let tile = self.tile_size as f64;

        let xs = overlap_range(cx, cell, tile);
        let zs = overlap_range(cz, cell, tile);
        let mut out = Vec::with_capacity(xs.len() * zs.len());
        for &tz in &zs {
            for &tx in &xs {
                out.push(TileId::new(tx, tz));
            }
        }
        out
    }
}

/// Integer coordinates `c` with `floor(c / cpt) == t` (for cpt >= 1), or
/// the single containing coordinate otherwise.
fn axis_range(t: i32, cpt: f64) -> Vec<i32> {
    if cpt >= 1.0 {
        let start = (t as f64 * cpt).ceil() as i32;
        let end = ((t + 1) as f64 * cpt).ceil() as i32;
        (start..end).collect()
    } else {
        vec![(t as f64 * cpt).floor() as i32]
    }
}

/// Tile coordinates whose span overlaps cell `c`'s world extent.
fn overlap_range(c: i32, cell: f64, tile: f64) -> Vec<i32> {
    let start = (c as f64 * cell / tile).floor() as i32;
    let end = ((c + 1) as f64 * cell / tile).ceil() as i32;
    (start..end).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_larger_than_cell() {
        // 64-unit tiles, 16-unit cells: 4 cells per tile side
        let m = CellTileMapper::new(16.0, 64.0);
        assert_eq!(m.cells_per_tile(), 4.0);

        assert_eq!(m.cell_to_tile(0, 0), TileId::new(0, 0));
        assert_eq!(m.cell_to_tile(3, 3), TileId::new(0, 0));
        assert_eq!(m.cell_to_tile(4, 0), TileId::new(1, 0));
        assert_eq!(m.cell_to_tile(-1, -1), TileId::new(-1, -1));
        assert_eq!(m.cell_to_tile(-4, 0), TileId::new(-1, 0));
        assert_eq!(m.cell_to_tile(-5, 0), TileId::new(-2, 0));

        let cells = m.tile_to_cells(TileId::new(0, 0));
        assert_eq!(cells.len(), 16);
        assert!(cells.contains(&(0, 0)));
        assert!(cells.contains(&(3, 3)));
        assert!(!cells.contains(&(4, 0)));

        let cells = m.tile_to_cells(TileId::new(-1, 0));
        assert_eq!(cells.len(), 16);
        assert!(cells.contains(&(-4, 0)));
        assert!(cells.contains(&(-1, 3)));
    }

    #[test]
    fn test_mapping_inverse_tile_larger() {
        let m = CellTileMapper::new(16.0, 64.0);
        for cz in -9..9 {
            for cx in -9..9 {
                let tile = m.cell_to_tile(cx, cz);
                assert!(
                    m.tile_to_cells(tile).contains(&(cx, cz)),
                    "cell ({}, {}) missing from its tile's cell set",
                    cx,
                    cz
                );
            }
        }
    }

    #[test]
    fn test_cell_larger_than_tile() {
        // 32-unit tiles, 64-unit cells: one cell covers 2x2 tiles
        let m = CellTileMapper::new(64.0, 32.0);
        assert_eq!(m.cells_per_tile(), 0.5);

        let tiles = m.cell_to_affected_tiles(0, 0);
        assert_eq!(tiles.len(), 4);
        assert!(tiles.contains(&TileId::new(0, 0)));
        assert!(tiles.contains(&TileId::new(1, 1)));

        let tiles = m.cell_to_affected_tiles(-1, 0);
        assert_eq!(tiles.len(), 4);
        assert!(tiles.contains(&TileId::new(-2, 0)));
        assert!(tiles.contains(&TileId::new(-1, 1)));
    }

    #[test]
    fn test_mapping_inverse_cell_larger() {
        let m = CellTileMapper::new(48.0, 20.0);
        for cz in -5..5 {
            for cx in -5..5 {
                let first = m.cell_to_tile(cx, cz);
                let affected = m.cell_to_affected_tiles(cx, cz);
                assert!(
                    affected.contains(&first),
                    "cell ({}, {}): first tile {:?} not in affected set {:?}",
                    cx,
                    cz,
                    first,
                    affected
                );
            }
        }
    }

    #[test]
    fn test_equal_sizes() {
        let m = CellTileMapper::new(64.0, 64.0);
        assert_eq!(m.cell_to_tile(3, -2), TileId::new(3, -2));
        assert_eq!(m.tile_to_cells(TileId::new(3, -2)), vec![(3, -2)]);
    }

    #[test]
    fn test_live_tile_size_reconfiguration() {
        let mut m = CellTileMapper::new(16.0, 64.0);
        assert_eq!(m.cell_to_tile(4, 0), TileId::new(1, 0));
        m.set_tile_size(32.0);
        assert_eq!(m.cells_per_tile(), 2.0);
        assert_eq!(m.cell_to_tile(4, 0), TileId::new(2, 0));
    }
}
