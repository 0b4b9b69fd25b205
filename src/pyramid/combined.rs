//! Pyramid merging the variables of several same-geometry pyramids.

use std::sync::Arc;

use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::error::{DatasetError, PyramidError};
use crate::grid::TileGrid;

use super::cache::LevelCache;
use super::{close_levels, resolve_ds_id, MultiLevelDataset};

/// A pyramid whose level `L` is the variable union of level `L` of its
/// inputs.
///
/// All inputs must share one tile grid. Coordinates must agree between
/// inputs and data variable names must be disjoint; a collision is reported
/// as a conflict error when the level is requested.
pub struct CombinedMultiLevelDataset {
    ds_id: String,
    tile_grid: TileGrid,
    inputs: Vec<Arc<dyn MultiLevelDataset>>,
    cache: LevelCache,
}

impl CombinedMultiLevelDataset {
    /// Combine pyramids.
    ///
    /// Without an explicit `ds_id` the identifier is the input identifiers
    /// joined by `+`.
    ///
    /// # Errors
    ///
    /// Fails with a config-kind error if there are no inputs or their tile
    /// grids differ.
    pub fn new(
        inputs: Vec<Arc<dyn MultiLevelDataset>>,
        ds_id: Option<String>,
    ) -> Result<Self, PyramidError> {
        let ds_id = match ds_id {
            Some(id) => resolve_ds_id(Some(id))?,
            None if inputs.is_empty() => resolve_ds_id(None)?,
            None => inputs
                .iter()
                .map(|input| input.ds_id())
                .collect::<Vec<_>>()
                .join("+"),
        };

        let first = inputs
            .first()
            .ok_or_else(|| PyramidError::NoInputs { ds_id: ds_id.clone() })?;
        let tile_grid = *first.tile_grid();

        if let Some(odd) = inputs.iter().find(|input| input.tile_grid() != &tile_grid) {
            return Err(PyramidError::TileGridMismatch {
                ds_id,
                input_id: odd.ds_id().to_string(),
            });
        }

        info!(
            ds_id = %ds_id,
            inputs = inputs.len(),
            num_levels = tile_grid.num_levels(),
            "Created combined multi-level dataset"
        );

        Ok(Self {
            cache: LevelCache::new(ds_id.clone(), tile_grid.num_levels()),
            ds_id,
            tile_grid,
            inputs,
        })
    }

    /// The combined pyramids, in merge order.
    pub fn inputs(&self) -> &[Arc<dyn MultiLevelDataset>] {
        &self.inputs
    }

    fn combine(&self, level: usize) -> Result<Arc<Dataset>, PyramidError> {
        let mut merged: Option<Dataset> = None;
        for input in &self.inputs {
            let dataset = input.get_dataset(level)?;
            merged = Some(match merged {
                None => dataset.merge(&Dataset::new()),
                Some(acc) => acc.merge(&dataset),
            }
            .map_err(|e| self.merge_error(level, e))?);
        }

        let merged = merged.ok_or_else(|| PyramidError::NoInputs {
            ds_id: self.ds_id.clone(),
        })?;
        debug!(
            ds_id = %self.ds_id,
            level,
            variables = merged.data_vars().len(),
            "Combined level"
        );
        Ok(Arc::new(merged))
    }

    fn merge_error(&self, level: usize, error: DatasetError) -> PyramidError {
        match error {
            DatasetError::VariableConflict(name) => PyramidError::VariableConflict {
                ds_id: self.ds_id.clone(),
                level,
                name,
            },
            other => PyramidError::dataset(self.ds_id.clone(), other),
        }
    }
}

impl MultiLevelDataset for CombinedMultiLevelDataset {
    fn ds_id(&self) -> &str {
        &self.ds_id
    }

    fn tile_grid(&self) -> &TileGrid {
        &self.tile_grid
    }

    fn get_dataset(&self, level: usize) -> Result<Arc<Dataset>, PyramidError> {
        self.cache
            .get_or_try_insert_with(level, || self.combine(level))
    }

    fn close(&self) {
        close_levels(&self.cache, &self.ds_id);
    }
}
