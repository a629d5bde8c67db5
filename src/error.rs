//! Error taxonomy for the editing core
//!
//! Everything here is locally recoverable except precondition violations,
//! which abort the offending operation only, never the process.

use crate::tile::TileId;

#[derive(Debug, thiserror::Error)]
pub enum TerrainError {
    /// A mutating operation was invoked with no active tile loaded.
    #[error("no active tile is loaded")]
    NoActiveTile,

    /// A tile id was referenced but no data or template exists for it.
    #[error("tile {0} has no stored data and no template to synthesize from")]
    MissingTile(TileId),

    /// Persisted tile data failed base64/length validation.
    #[error("malformed tile data: {0}")]
    MalformedTileData(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
