//! Tile persistence
//!
//! Tiles serialize to a JSON shape whose float buffers are base64-encoded
//! raw little-endian bytes; decoding reverses the encoding byte-for-byte.
//! Two legacy layouts are still readable: saves that omit the water mask
//! entirely, and saves whose splat payload carries only the 4 weight
//! channels without the wetness/road masks. The layout version is detected
//! from the total decoded length, and anything malformed degrades to the
//! oldest compatible interpretation or a fresh default tile, never an
//! error surfaced to the user.

use std::fs;
use std::path::Path;

use base64::Engine;

use crate::error::TerrainError;
use crate::raster::{Heightmap, Raster};
use crate::splat::{SplatBuffer, CHANNEL_COUNT};
use crate::tile::TileData;

/// Adjacent tile references for manual placements.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TileConnections {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<String>,
}

/// The persisted shape of one tile. Field names and buffer encodings are
/// stable; external tools depend on reproducing them bit-for-bit.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileSave {
    pub id: String,
    pub name: String,
    /// Heightmap vertices per side
    pub resolution: usize,
    /// World size per side
    pub size: f32,
    /// base64(little-endian f32[resolution²])
    pub heightmap: String,
    /// base64(little-endian f32): 4·n weights, optionally followed by
    /// n wetness + n road (n = splat cells)
    pub splatmap: String,
    /// base64(little-endian f32[n]); absent in the oldest saves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_mask: Option<String>,
    #[serde(default)]
    pub sea_level: Option<f32>,
    #[serde(default = "default_water_depth")]
    pub water_depth: f32,
    #[serde(default)]
    pub connections: TileConnections,
}

fn default_water_depth() -> f32 {
    4.0
}

/// Encode an f32 buffer as base64 of its raw little-endian bytes.
pub fn encode_f32(data: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(data.len() * 4);
    for v in data {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode a base64 string back into f32s, reversing [`encode_f32`]
/// byte-for-byte.
pub fn decode_f32(encoded: &str) -> Result<Vec<f32>, TerrainError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| TerrainError::MalformedTileData(format!("invalid base64: {}", e)))?;
    if bytes.len() % 4 != 0 {
        return Err(TerrainError::MalformedTileData(format!(
            "buffer length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Build the persisted form of a tile.
pub fn tile_to_save(
    id: &str,
    name: &str,
    data: &TileData,
    connections: TileConnections,
) -> TileSave {
    let splat = &data.splat;
    let n = splat.resolution() * splat.resolution();

    // 4·n interleaved weights, then the wetness and road masks
    let mut splat_floats = Vec::with_capacity(n * (CHANNEL_COUNT + 2));
    for w in splat.weights.as_slice() {
        splat_floats.extend_from_slice(w);
    }
    splat_floats.extend_from_slice(splat.wetness.as_slice());
    splat_floats.extend_from_slice(splat.road.as_slice());

    TileSave {
        id: id.to_string(),
        name: name.to_string(),
        resolution: data.resolution(),
        size: data.size(),
        heightmap: encode_f32(data.heightmap.heights.as_slice()),
        splatmap: encode_f32(&splat_floats),
        water_mask: Some(encode_f32(splat.water.as_slice())),
        sea_level: data.sea_level,
        water_depth: data.water_depth,
        connections,
    }
}

/// Reconstruct tile data from its persisted form.
///
/// Malformed buffers degrade: a bad splat payload falls back to default
/// grass, a bad water mask to no water, a bad heightmap to flat terrain.
/// Only the declared resolution being unusable (zero) is an error.
pub fn save_to_tile(save: &TileSave) -> Result<TileData, TerrainError> {
    if save.resolution < 2 {
        return Err(TerrainError::MalformedTileData(format!(
            "unusable resolution {}",
            save.resolution
        )));
    }

    let mut data = decode_heightmap(save);
    data.splat = decode_splat(save);
    data.sea_level = save.sea_level;
    data.water_depth = save.water_depth;
    Ok(data)
}

fn decode_heightmap(save: &TileSave) -> TileData {
    let res = save.resolution;
    let expected = res * res;
    let heights = match decode_f32(&save.heightmap) {
        Ok(floats) if floats.len() == expected => {
            Raster::from_vec(res, floats).unwrap_or_else(|| Raster::new_with(res, 0.0))
        }
        Ok(floats) => {
            log::warn!(
                "tile {}: heightmap has {} floats, expected {}; using flat terrain",
                save.id,
                floats.len(),
                expected
            );
            Raster::new_with(res, 0.0)
        }
        Err(e) => {
            log::warn!("tile {}: {}; using flat terrain", save.id, e);
            Raster::new_with(res, 0.0)
        }
    };

    let mut data = TileData::new(res, res, save.size);
    data.heightmap = Heightmap::from_raster(heights, save.size);
    data
}

fn decode_splat(save: &TileSave) -> SplatBuffer {
    let floats = match decode_f32(&save.splatmap) {
        Ok(f) => f,
        Err(e) => {
            log::warn!("tile {}: {}; using default grass splat", save.id, e);
            return SplatBuffer::new(save.resolution);
        }
    };

    // Layout version by total length: 4·n (weights only) or 6·n
    // (weights + wetness + road). n must be a square number of cells.
    let (n, has_masks) = if floats.len() % (CHANNEL_COUNT + 2) == 0
        && is_square(floats.len() / (CHANNEL_COUNT + 2))
    {
        (floats.len() / (CHANNEL_COUNT + 2), true)
    } else if floats.len() % CHANNEL_COUNT == 0 && is_square(floats.len() / CHANNEL_COUNT) {
        (floats.len() / CHANNEL_COUNT, false)
    } else {
        log::warn!(
            "tile {}: splat payload of {} floats matches no known layout; using default grass",
            save.id,
            floats.len()
        );
        return SplatBuffer::new(save.resolution);
    };

    let res = int_sqrt(n);
    let mut splat = SplatBuffer::new(res);
    for (i, cell) in splat.weights.as_mut_slice().iter_mut().enumerate() {
        let base = i * CHANNEL_COUNT;
        cell.copy_from_slice(&floats[base..base + CHANNEL_COUNT]);
    }
    if has_masks {
        let wet_base = CHANNEL_COUNT * n;
        splat
            .wetness
            .as_mut_slice()
            .copy_from_slice(&floats[wet_base..wet_base + n]);
        splat
            .road
            .as_mut_slice()
            .copy_from_slice(&floats[wet_base + n..wet_base + 2 * n]);
    }

    // Water mask is a separate field; the oldest saves omit it entirely
    if let Some(mask) = &save.water_mask {
        match decode_f32(mask) {
            Ok(water) if water.len() == n => {
                splat.water.as_mut_slice().copy_from_slice(&water);
            }
            Ok(water) => {
                log::warn!(
                    "tile {}: water mask has {} floats, expected {}; ignoring",
                    save.id,
                    water.len(),
                    n
                );
            }
            Err(e) => {
                log::warn!("tile {}: water mask {}; ignoring", save.id, e);
            }
        }
    }

    splat.repair();
    splat
}

fn is_square(n: usize) -> bool {
    n > 0 && int_sqrt(n) * int_sqrt(n) == n
}

fn int_sqrt(n: usize) -> usize {
    (n as f64).sqrt().round() as usize
}

/// Write a tile save as pretty JSON.
pub fn save_tile_file(save: &TileSave, path: &Path) -> Result<(), TerrainError> {
    let json = serde_json::to_string_pretty(save)?;
    fs::write(path, json)?;
    Ok(())
}

/// Read a tile save from disk.
pub fn load_tile_file(path: &Path) -> Result<TileSave, TerrainError> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}
