//! Tileable terrain world editing core
//!
//! Raster tile data and brushes, seamless edge/corner synchronization,
//! cell streaming with LOD, and density-scaled foliage chunking. Rendering,
//! input and UI live outside this crate and talk to it through the tile
//! store accessors and the streaming collaborator interface.

pub mod brush;
pub mod config;
pub mod edge_sync;
pub mod error;
pub mod export;
pub mod foliage;
pub mod mapper;
pub mod persist;
pub mod raster;
pub mod splat;
pub mod store;
pub mod streaming;
pub mod tile;
pub mod water;
pub mod worldgen;

pub use error::TerrainError;
