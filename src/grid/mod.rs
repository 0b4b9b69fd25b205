//! Tiling geometry.
//!
//! A [`TileGrid`] is the geometric contract of a pyramid: how many levels it
//! has, how each level is cut into tiles, and which geographic area it
//! covers. Tile servers use it to find the tiles covering a requested window
//! at a requested zoom level; pyramid builders use it to know the pixel size
//! of every level.

mod extent;
mod tile_grid;

pub use extent::GeoExtent;
pub use tile_grid::{
    TileGrid, TileRange, TilingOptions, DEFAULT_MAX_TILE_SIZE, DEFAULT_MIN_TILE_SIZE,
};
