//! Pyramid derived from a single full-resolution dataset.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::PyramidOptions;
use crate::dataset::{footprint, Dataset, DownsampleMethod};
use crate::error::PyramidError;
use crate::grid::TileGrid;

use super::cache::LevelCache;
use super::{close_levels, resolve_ds_id, MultiLevelDataset};

/// Downsampling factor between two consecutive levels.
const LEVEL_FACTOR: usize = 2;

/// A pyramid whose level 0 is a given dataset and whose level `L` is level
/// `L - 1` downsampled by two along both spatial axes.
///
/// The tile grid is derived from the pixel size and coordinates of the base
/// dataset, see [`TileGrid::create`].
///
/// A base whose longitudes cover the globe as 0..360, or lie entirely at or
/// beyond 180, is rolled onto -180..180 once at construction. Level 0 is
/// then that rolled copy rather than the given object.
///
/// # Example
///
/// ```ignore
/// let pyramid = BaseMultiLevelDataset::new(dataset)?;
/// let coarsest = pyramid.get_dataset(pyramid.num_levels() - 1)?;
/// ```
pub struct BaseMultiLevelDataset {
    ds_id: String,
    tile_grid: TileGrid,
    method: DownsampleMethod,
    cache: LevelCache,
}

impl BaseMultiLevelDataset {
    /// Wrap a dataset with default options and a generated identifier.
    pub fn new(base: impl Into<Arc<Dataset>>) -> Result<Self, PyramidError> {
        Self::with_options(base, None, &PyramidOptions::default())
    }

    /// Wrap a dataset.
    ///
    /// # Errors
    ///
    /// Fails with a config-kind error if `ds_id` is empty, the options are
    /// invalid, or the dataset has no usable spatial dimensions and
    /// coordinates.
    pub fn with_options(
        base: impl Into<Arc<Dataset>>,
        ds_id: Option<String>,
        options: &PyramidOptions,
    ) -> Result<Self, PyramidError> {
        let ds_id = resolve_ds_id(ds_id)?;
        options.validate()?;
        let base = normalize_base(&ds_id, base.into())?;

        let tile_grid = derive_tile_grid(&ds_id, &base, options)?;

        let cache = LevelCache::new(ds_id.clone(), tile_grid.num_levels());
        cache.seed(0, base)?;

        let (tiles_x, tiles_y) = tile_grid.num_level_zero_tiles();
        info!(
            ds_id = %ds_id,
            num_levels = tile_grid.num_levels(),
            tile_width = tile_grid.tile_width(),
            tile_height = tile_grid.tile_height(),
            tiles_x,
            tiles_y,
            "Created base multi-level dataset"
        );

        Ok(Self {
            ds_id,
            tile_grid,
            method: options.downsample_method,
            cache,
        })
    }

    /// Downsampling method used for levels above 0.
    pub fn downsample_method(&self) -> DownsampleMethod {
        self.method
    }

    /// Number of levels computed so far, including the base.
    pub fn materialized_levels(&self) -> usize {
        self.cache.materialized_count()
    }
}

/// Longitude dimension names eligible for rolling onto -180..180.
const LONGITUDE_DIMS: [&str; 2] = ["lon", "longitude"];

/// Roll a 0..360 longitude axis onto -180..180 so that level 0 lies inside
/// the extent the tile grid reports.
///
/// Extents that would straddle the antimeridian after rolling are kept as
/// they are, as are datasets on projected `x`/`y` axes.
fn normalize_base(ds_id: &str, base: Arc<Dataset>) -> Result<Arc<Dataset>, PyramidError> {
    let wrap = |source| PyramidError::dataset(ds_id, source);
    let dims = base.spatial_dims().map_err(wrap)?;
    if !LONGITUDE_DIMS.contains(&dims.x.as_str()) {
        return Ok(base);
    }

    let extent = footprint(&base, &dims).map_err(wrap)?.extent;
    if extent.normalize_lon() == extent {
        return Ok(base);
    }

    debug!(ds_id, west = extent.west, east = extent.east, "Rolling longitudes onto -180..180");
    Ok(Arc::new(base.normalize_longitude().map_err(wrap)?))
}

/// Tile grid of a base dataset: pixel size from its spatial dimensions,
/// extent from its coordinates.
fn derive_tile_grid(
    ds_id: &str,
    base: &Dataset,
    options: &PyramidOptions,
) -> Result<TileGrid, PyramidError> {
    let wrap = |source| PyramidError::dataset(ds_id, source);
    let dims = base.spatial_dims().map_err(wrap)?;
    let (width, height) = base.spatial_size().map_err(wrap)?;
    let fp = footprint(base, &dims).map_err(wrap)?;

    Ok(TileGrid::create(
        width,
        height,
        &options.tiling(),
        fp.extent,
        fp.y_ascending,
    )?)
}

impl MultiLevelDataset for BaseMultiLevelDataset {
    fn ds_id(&self) -> &str {
        &self.ds_id
    }

    fn tile_grid(&self) -> &TileGrid {
        &self.tile_grid
    }

    fn get_dataset(&self, level: usize) -> Result<Arc<Dataset>, PyramidError> {
        self.cache.get_or_try_insert_with(level, || {
            // level 0 is seeded at construction and only missing after close
            if level == 0 {
                return Err(PyramidError::Computation {
                    ds_id: self.ds_id.clone(),
                    level,
                    reason: "base dataset has been closed".to_string(),
                });
            }
            let parent = self.get_dataset(level - 1)?;
            let dataset = parent
                .downsample(LEVEL_FACTOR, self.method)
                .map_err(|e| PyramidError::dataset(self.ds_id.clone(), e))?;
            Ok(Arc::new(dataset))
        })
    }

    fn close(&self) {
        close_levels(&self.cache, &self.ds_id);
    }
}
