//! Tile grid geometry shared by every level of a pyramid.
//!
//! # Level Numbering
//!
//! A tile grid describes a *display* pyramid: zoom level 0 is the coarsest,
//! covered by `num_level_zero_tiles_x × num_level_zero_tiles_y` tiles, and
//! each following zoom level doubles the number of tiles per axis. The
//! finest zoom level is `num_levels - 1`.
//!
//! Dataset levels run the other way round. Dataset level 0 is the source
//! (finest) resolution and every following level is a coarser derivative of
//! it, so dataset level `L` corresponds to zoom level `num_levels - 1 - L`:
//!
//! ```text
//!   zoom level      0        1        2
//!   dataset level   2        1        0
//!   size (global)   360x180  720x360  1440x720
//! ```
//!
//! [`TileGrid::width`], [`TileGrid::height`], [`TileGrid::num_tiles`] and the
//! tile lookup methods take zoom levels. [`TileGrid::dataset_size`] and
//! [`TileGrid::resolution`] take dataset levels.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::GridError;

use super::extent::GeoExtent;

// =============================================================================
// Constants
// =============================================================================

/// Default lower bound for derived tile sizes (pixels).
pub const DEFAULT_MIN_TILE_SIZE: usize = 128;

/// Default upper bound for derived tile sizes (pixels).
pub const DEFAULT_MAX_TILE_SIZE: usize = 512;

// =============================================================================
// Tiling Options
// =============================================================================

/// Parameters controlling how a tile grid is derived from a raster size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilingOptions {
    /// Smallest acceptable tile width/height
    pub min_tile_size: usize,

    /// Largest acceptable tile width/height
    pub max_tile_size: usize,

    /// Upper bound on the number of levels, if any
    pub max_levels: Option<usize>,
}

impl Default for TilingOptions {
    fn default() -> Self {
        Self {
            min_tile_size: DEFAULT_MIN_TILE_SIZE,
            max_tile_size: DEFAULT_MAX_TILE_SIZE,
            max_levels: None,
        }
    }
}

impl TilingOptions {
    /// Check that the bounds are usable.
    pub fn validate(&self) -> Result<(), GridError> {
        positive("min_tile_size", self.min_tile_size)?;
        positive("max_tile_size", self.max_tile_size)?;
        if let Some(max_levels) = self.max_levels {
            positive("max_levels", max_levels)?;
        }
        if self.min_tile_size > self.max_tile_size {
            return Err(GridError::InvalidTileSizeBounds {
                min: self.min_tile_size,
                max: self.max_tile_size,
            });
        }
        Ok(())
    }
}

// =============================================================================
// Tile Range
// =============================================================================

/// Inclusive range of tile indices at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRange {
    pub level: usize,
    pub x_min: usize,
    pub y_min: usize,
    pub x_max: usize,
    pub y_max: usize,
}

impl TileRange {
    /// Number of tiles in the range.
    pub fn len(&self) -> usize {
        (self.x_max - self.x_min + 1) * (self.y_max - self.y_min + 1)
    }

    /// A tile range always covers at least one tile.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterate over `(x, y)` tile indices, row by row.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.y_min..=self.y_max).flat_map(move |y| (self.x_min..=self.x_max).map(move |x| (x, y)))
    }
}

// =============================================================================
// TileGrid
// =============================================================================

/// Immutable geometric descriptor of a pyramid.
///
/// Deserialization goes through [`TileGrid::new`], so a deserialized grid is
/// validated like a constructed one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TileGridFields")]
pub struct TileGrid {
    num_levels: usize,
    num_level_zero_tiles_x: usize,
    num_level_zero_tiles_y: usize,
    tile_width: usize,
    tile_height: usize,
    geo_extent: GeoExtent,
    inv_y: bool,
}

impl TileGrid {
    /// Create a validated tile grid.
    ///
    /// # Arguments
    /// * `num_levels` - Number of levels, at least 1
    /// * `num_level_zero_tiles_x` / `num_level_zero_tiles_y` - Tiles per axis at zoom level 0
    /// * `tile_width` / `tile_height` - Tile size in pixels
    /// * `geo_extent` - Geographic bounds `(west, south, east, north)`
    /// * `inv_y` - `true` if tile row 0 is at the southern edge
    pub fn new(
        num_levels: usize,
        num_level_zero_tiles_x: usize,
        num_level_zero_tiles_y: usize,
        tile_width: usize,
        tile_height: usize,
        geo_extent: (f64, f64, f64, f64),
        inv_y: bool,
    ) -> Result<Self, GridError> {
        positive("num_levels", num_levels)?;
        positive("num_level_zero_tiles_x", num_level_zero_tiles_x)?;
        positive("num_level_zero_tiles_y", num_level_zero_tiles_y)?;
        positive("tile_width", tile_width)?;
        positive("tile_height", tile_height)?;
        let (west, south, east, north) = geo_extent;
        let geo_extent = GeoExtent::new(west, south, east, north)?;

        // pixel size of the finest level must fit in usize
        let finest = |tiles: usize, tile_size: usize| {
            u32::try_from(num_levels - 1)
                .ok()
                .and_then(|shift| 1usize.checked_shl(shift))
                .and_then(|scale| scale.checked_mul(tiles))
                .and_then(|n| n.checked_mul(tile_size))
        };
        if finest(num_level_zero_tiles_x, tile_width).is_none()
            || finest(num_level_zero_tiles_y, tile_height).is_none()
        {
            return Err(GridError::TooManyLevels { num_levels });
        }

        Ok(Self {
            num_levels,
            num_level_zero_tiles_x,
            num_level_zero_tiles_y,
            tile_width,
            tile_height,
            geo_extent,
            inv_y,
        })
    }

    /// Derive a tile grid for a raster of `width × height` pixels at its
    /// finest resolution.
    ///
    /// For each axis a tile size within the configured bounds is chosen that
    /// divides the axis exactly and allows the most halvings (ties go to the
    /// larger tile). The number of levels is one more than the number of
    /// halvings both axes allow. An axis without an admissible divisor becomes
    /// a single tile and the grid has a single level.
    pub fn create(
        width: usize,
        height: usize,
        options: &TilingOptions,
        geo_extent: GeoExtent,
        inv_y: bool,
    ) -> Result<Self, GridError> {
        positive("width", width)?;
        positive("height", height)?;
        options.validate()?;

        let (tile_width, halvings_x) = subdivide(width, options);
        let (tile_height, halvings_y) = subdivide(height, options);

        let mut num_levels = 1 + halvings_x.min(halvings_y);
        if let Some(max_levels) = options.max_levels {
            num_levels = num_levels.min(max_levels);
        }

        let scale = 1usize << (num_levels - 1);
        Ok(Self {
            num_levels,
            num_level_zero_tiles_x: width / (tile_width * scale),
            num_level_zero_tiles_y: height / (tile_height * scale),
            tile_width,
            tile_height,
            geo_extent,
            inv_y,
        })
    }

    /// Number of levels.
    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    /// Number of tiles per axis at zoom level 0.
    pub fn num_level_zero_tiles(&self) -> (usize, usize) {
        (self.num_level_zero_tiles_x, self.num_level_zero_tiles_y)
    }

    /// Tile width in pixels.
    pub fn tile_width(&self) -> usize {
        self.tile_width
    }

    /// Tile height in pixels.
    pub fn tile_height(&self) -> usize {
        self.tile_height
    }

    /// Geographic bounds.
    pub fn geo_extent(&self) -> GeoExtent {
        self.geo_extent
    }

    /// `true` if tile row 0 is at the southern edge.
    pub fn inv_y(&self) -> bool {
        self.inv_y
    }

    /// Number of tiles `(x, y)` at a zoom level.
    ///
    /// Fails if `zoom >= num_levels()`.
    pub fn num_tiles(&self, zoom: usize) -> Result<(usize, usize), GridError> {
        self.check_level(zoom)?;
        Ok((
            self.num_level_zero_tiles_x << zoom,
            self.num_level_zero_tiles_y << zoom,
        ))
    }

    /// Image width in pixels at a zoom level.
    pub fn width(&self, zoom: usize) -> Result<usize, GridError> {
        Ok(self.num_tiles(zoom)?.0 * self.tile_width)
    }

    /// Image height in pixels at a zoom level.
    pub fn height(&self, zoom: usize) -> Result<usize, GridError> {
        Ok(self.num_tiles(zoom)?.1 * self.tile_height)
    }

    /// Map a dataset level onto the zoom level of the same resolution.
    pub fn zoom_for_level(&self, level: usize) -> Result<usize, GridError> {
        self.check_level(level)?;
        Ok(self.num_levels - 1 - level)
    }

    /// Pixel size `(width, height)` of a dataset level.
    ///
    /// Dataset level 0 is the finest resolution.
    pub fn dataset_size(&self, level: usize) -> Result<(usize, usize), GridError> {
        let zoom = self.zoom_for_level(level)?;
        Ok((self.width(zoom)?, self.height(zoom)?))
    }

    /// Pixel spacing `(dx, dy)` in geographic units of a dataset level.
    pub fn resolution(&self, level: usize) -> Result<(f64, f64), GridError> {
        let (w, h) = self.dataset_size(level)?;
        Ok((
            self.geo_extent.width() / w as f64,
            self.geo_extent.height() / h as f64,
        ))
    }

    /// Geographic bounds of a single tile at a zoom level.
    ///
    /// Returns `None` if the zoom level or the tile indices are out of range.
    pub fn tile_extent(&self, zoom: usize, tile_x: usize, tile_y: usize) -> Option<GeoExtent> {
        let (nx, ny) = self.num_tiles(zoom).ok()?;
        if tile_x >= nx || tile_y >= ny {
            return None;
        }

        let tw = self.geo_extent.width() / nx as f64;
        let th = self.geo_extent.height() / ny as f64;
        let west = self.geo_extent.west + tile_x as f64 * tw;
        let south = if self.inv_y {
            self.geo_extent.south + tile_y as f64 * th
        } else {
            self.geo_extent.north - (tile_y + 1) as f64 * th
        };

        Some(GeoExtent {
            west,
            south,
            east: west + tw,
            north: south + th,
        })
    }

    /// Range of tiles at a zoom level that intersect a geographic window.
    ///
    /// Returns `None` if the zoom level is out of range or the window does
    /// not intersect the grid.
    pub fn tiles_covering(&self, zoom: usize, window: &GeoExtent) -> Option<TileRange> {
        if !self.geo_extent.intersects(window) {
            return None;
        }
        let (nx, ny) = self.num_tiles(zoom).ok()?;
        let tw = self.geo_extent.width() / nx as f64;
        let th = self.geo_extent.height() / ny as f64;

        let (x_min, x_max) = {
            let lo = (window.west - self.geo_extent.west) / tw;
            let hi = (window.east - self.geo_extent.west) / tw;
            (clamp_index(lo.floor(), nx), clamp_index(hi.ceil() - 1.0, nx))
        };

        let (y_min, y_max) = if self.inv_y {
            let lo = (window.south - self.geo_extent.south) / th;
            let hi = (window.north - self.geo_extent.south) / th;
            (clamp_index(lo.floor(), ny), clamp_index(hi.ceil() - 1.0, ny))
        } else {
            let lo = (self.geo_extent.north - window.north) / th;
            let hi = (self.geo_extent.north - window.south) / th;
            (clamp_index(lo.floor(), ny), clamp_index(hi.ceil() - 1.0, ny))
        };

        Some(TileRange {
            level: zoom,
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }

    /// Return a copy of this grid limited to its `num_levels` finest levels.
    pub fn with_num_levels(&self, num_levels: usize) -> Result<Self, GridError> {
        positive("num_levels", num_levels)?;
        if num_levels > self.num_levels {
            return Err(GridError::LevelOutOfRange {
                level: num_levels - 1,
                num_levels: self.num_levels,
            });
        }
        let dropped = self.num_levels - num_levels;
        Ok(Self {
            num_levels,
            num_level_zero_tiles_x: self.num_level_zero_tiles_x << dropped,
            num_level_zero_tiles_y: self.num_level_zero_tiles_y << dropped,
            ..*self
        })
    }

    fn check_level(&self, level: usize) -> Result<(), GridError> {
        if level >= self.num_levels {
            return Err(GridError::LevelOutOfRange {
                level,
                num_levels: self.num_levels,
            });
        }
        Ok(())
    }
}

/// Serialized form of a [`TileGrid`], before validation.
#[derive(Deserialize)]
struct TileGridFields {
    num_levels: usize,
    num_level_zero_tiles_x: usize,
    num_level_zero_tiles_y: usize,
    tile_width: usize,
    tile_height: usize,
    geo_extent: GeoExtent,
    inv_y: bool,
}

impl TryFrom<TileGridFields> for TileGrid {
    type Error = GridError;

    fn try_from(f: TileGridFields) -> Result<Self, Self::Error> {
        TileGrid::new(
            f.num_levels,
            f.num_level_zero_tiles_x,
            f.num_level_zero_tiles_y,
            f.tile_width,
            f.tile_height,
            f.geo_extent.into(),
            f.inv_y,
        )
    }
}

impl Eq for TileGrid {}

impl Hash for TileGrid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.num_levels.hash(state);
        self.num_level_zero_tiles_x.hash(state);
        self.num_level_zero_tiles_y.hash(state);
        self.tile_width.hash(state);
        self.tile_height.hash(state);
        self.geo_extent.hash(state);
        self.inv_y.hash(state);
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn positive(field: &'static str, value: usize) -> Result<(), GridError> {
    if value == 0 {
        return Err(GridError::NonPositive { field, value });
    }
    Ok(())
}

fn clamp_index(v: f64, n: usize) -> usize {
    if v <= 0.0 {
        0
    } else {
        (v as usize).min(n - 1)
    }
}

/// Pick `(tile_size, halvings)` for one axis.
fn subdivide(size: usize, options: &TilingOptions) -> (usize, usize) {
    let lo = options.min_tile_size.min(size);
    let hi = options.max_tile_size.min(size);

    let mut best: Option<(usize, usize)> = None;
    for tile in lo..=hi {
        if size % tile != 0 {
            continue;
        }
        let halvings = (size / tile).trailing_zeros() as usize;
        match best {
            Some((_, h)) if h > halvings => {}
            _ => best = Some((tile, halvings)),
        }
    }

    best.unwrap_or((size, 0))
}

// =============================================================================
// Tests
// =============================================================================
