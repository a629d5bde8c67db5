//! Editor configuration
//!
//! One bundle of the recognized options: streaming geometry, chunking,
//! brush defaults, blend widths and tiling mode. Serializes so a session
//! can persist its settings alongside the world.

use crate::brush::BrushSettings;
use crate::edge_sync::SyncConfig;
use crate::streaming::StreamingConfig;
use crate::tile::TileMode;

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct EditorConfig {
    /// Streaming cell side length in world units
    pub cell_size: f32,
    /// Authoring tile side length in world units (runtime-configurable)
    pub tile_size: f32,
    /// Foliage chunk side length in world units
    pub chunk_size: f32,
    /// Heightmap vertices per tile side
    pub resolution: usize,
    /// Splat cells per tile side
    pub splat_resolution: usize,
    pub streaming: StreamingConfig,
    pub brush: BrushSettings,
    pub sync: SyncConfig,
    pub tile_mode: TileMode,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            cell_size: 16.0,
            tile_size: 64.0,
            chunk_size: 8.0,
            resolution: 129,
            splat_resolution: 129,
            streaming: StreamingConfig::default(),
            brush: BrushSettings::default(),
            sync: SyncConfig::default(),
            tile_mode: TileMode::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.sync.splat_blend_width, 30);
        assert_eq!(config.tile_mode, TileMode::Mirror);
        assert!(config.streaming.near_radius < config.streaming.mid_radius);
        assert!(config.streaming.mid_radius < config.streaming.far_radius);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut config = EditorConfig::default();
        config.tile_mode = TileMode::Clone;
        config.brush.strength = 0.9;
        let json = serde_json::to_string(&config).unwrap();
        let back: EditorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tile_mode, TileMode::Clone);
        assert_eq!(back.brush.strength, 0.9);
        assert_eq!(back.sync.height_blend_width, config.sync.height_blend_width);
    }
}
