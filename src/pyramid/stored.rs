//! Pyramid read from an already persisted level store.
//!
//! The store itself is a collaborator behind [`LevelSource`]: it knows how
//! to open one persisted level as a [`Dataset`]. This module adds the level
//! cache, level validation against the tile grid, and lifecycle handling.

use std::sync::Arc;

use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::error::{DatasetError, PyramidError};
use crate::grid::TileGrid;

use super::cache::LevelCache;
use super::{close_levels, resolve_ds_id, MultiLevelDataset};

// =============================================================================
// LevelSource Trait
// =============================================================================

/// Opens persisted pyramid levels.
pub trait LevelSource: Send + Sync {
    /// Open dataset level `level`, where level 0 is the finest.
    fn open_level(&self, level: usize) -> Result<Dataset, DatasetError>;
}

impl<F> LevelSource for F
where
    F: Fn(usize) -> Result<Dataset, DatasetError> + Send + Sync,
{
    fn open_level(&self, level: usize) -> Result<Dataset, DatasetError> {
        self(level)
    }
}

/// In-memory level store.
#[derive(Debug, Clone, Default)]
pub struct VecLevelSource {
    levels: Vec<Dataset>,
}

impl VecLevelSource {
    /// Store the given levels, finest first.
    pub fn new(levels: Vec<Dataset>) -> Self {
        Self { levels }
    }

    /// Materialize every level of a pyramid into a store.
    pub fn from_pyramid(pyramid: &dyn MultiLevelDataset) -> Result<Self, PyramidError> {
        let levels = pyramid
            .datasets()?
            .into_iter()
            .map(|ds| ds.as_ref().clone())
            .collect();
        Ok(Self { levels })
    }

    /// Number of stored levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Whether the store holds no level.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

impl LevelSource for VecLevelSource {
    fn open_level(&self, level: usize) -> Result<Dataset, DatasetError> {
        self.levels
            .get(level)
            .cloned()
            .ok_or(DatasetError::MissingLevel(level))
    }
}

// =============================================================================
// StoredMultiLevelDataset
// =============================================================================

/// A pyramid whose levels are opened from a [`LevelSource`].
///
/// Every opened level must have the pixel size the tile grid prescribes
/// for it.
pub struct StoredMultiLevelDataset<S: LevelSource> {
    ds_id: String,
    tile_grid: TileGrid,
    source: S,
    cache: LevelCache,
}

impl<S: LevelSource> StoredMultiLevelDataset<S> {
    /// Wrap a level store described by `tile_grid`.
    pub fn new(
        source: S,
        tile_grid: TileGrid,
        ds_id: Option<String>,
    ) -> Result<Self, PyramidError> {
        let ds_id = resolve_ds_id(ds_id)?;
        info!(
            ds_id = %ds_id,
            num_levels = tile_grid.num_levels(),
            "Opened stored multi-level dataset"
        );
        Ok(Self {
            cache: LevelCache::new(ds_id.clone(), tile_grid.num_levels()),
            ds_id,
            tile_grid,
            source,
        })
    }

    /// The underlying store.
    pub fn source(&self) -> &S {
        &self.source
    }

    fn open(&self, level: usize) -> Result<Arc<Dataset>, PyramidError> {
        let wrap = |e| PyramidError::dataset(self.ds_id.clone(), e);
        let expected = self.tile_grid.dataset_size(level)?;

        let dataset = self.source.open_level(level).map_err(wrap)?;
        let actual = dataset.spatial_size().map_err(wrap)?;
        if actual != expected {
            return Err(wrap(DatasetError::UnexpectedSize {
                level,
                expected,
                actual,
            }));
        }

        debug!(ds_id = %self.ds_id, level, "Opened stored level");
        Ok(Arc::new(dataset))
    }
}

impl<S: LevelSource> MultiLevelDataset for StoredMultiLevelDataset<S> {
    fn ds_id(&self) -> &str {
        &self.ds_id
    }

    fn tile_grid(&self) -> &TileGrid {
        &self.tile_grid
    }

    fn get_dataset(&self, level: usize) -> Result<Arc<Dataset>, PyramidError> {
        self.cache.get_or_try_insert_with(level, || self.open(level))
    }

    fn close(&self) {
        close_levels(&self.cache, &self.ds_id);
    }
}
