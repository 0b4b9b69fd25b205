//! Multi-level datasets.
//!
//! A multi-level dataset presents one raster dataset at a sequence of
//! decreasing resolutions ("levels"), all sharing a single [`TileGrid`].
//! Levels are produced lazily on first request and cached for the lifetime
//! of the pyramid.
//!
//! # Variants
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 MultiLevelDataset (trait)                    │
//! │   ds_id · tile_grid · num_levels · get_dataset · close       │
//! └──────┬──────────────┬──────────────────┬──────────────┬──────┘
//!        │              │                  │              │
//!        ▼              ▼                  ▼              ▼
//! ┌─────────────┐ ┌─────────────┐ ┌────────────────┐ ┌────────────┐
//! │    Base     │ │   Stored    │ │    Computed    │ │  Combined  │
//! │ (downsample │ │ (open level │ │ (transform of  │ │ (variable  │
//! │  level 0)   │ │  from store)│ │  input levels) │ │   union)   │
//! └─────────────┘ └─────────────┘ └────────────────┘ └────────────┘
//! ```
//!
//! # Level Numbering
//!
//! Dataset level 0 is the source (finest) resolution; each following level
//! halves the pixel size per axis. The tile grid's own zoom numbering runs
//! the other way, see [`crate::grid`] for the mapping.
//!
//! # Ownership
//!
//! A pyramid owns the datasets it materialized and releases them on
//! [`MultiLevelDataset::close`]. Computed and combined pyramids do not own
//! their inputs; closing them leaves the inputs untouched.
//!
//! # Thread Safety
//!
//! All variants are `Send + Sync`. Concurrent requests for the same level of
//! the same pyramid compute that level at most once.

mod base;
mod cache;
mod combined;
mod computed;
mod registry;
mod stored;
mod transform;

use std::sync::Arc;

use uuid::Uuid;

use crate::dataset::Dataset;
use crate::error::PyramidError;
use crate::grid::TileGrid;

pub use base::BaseMultiLevelDataset;
pub use cache::LevelCache;
pub use combined::CombinedMultiLevelDataset;
pub use computed::ComputedMultiLevelDataset;
pub use registry::{DatasetRegistry, DatasetResolver};
pub use stored::{LevelSource, StoredMultiLevelDataset, VecLevelSource};
pub use transform::{
    aggregate_time, Parameters, Transform, TransformFailure, TransformRef, TransformRegistry,
    AGGREGATE_TIME,
};

// =============================================================================
// MultiLevelDataset Trait
// =============================================================================

/// A raster dataset available at several resolutions.
pub trait MultiLevelDataset: Send + Sync {
    /// Stable identifier of this pyramid.
    fn ds_id(&self) -> &str;

    /// Tiling geometry shared by all levels.
    fn tile_grid(&self) -> &TileGrid;

    /// Number of levels; always equal to `tile_grid().num_levels()`.
    fn num_levels(&self) -> usize {
        self.tile_grid().num_levels()
    }

    /// Dataset of a level, computed on first request and cached afterwards.
    ///
    /// Repeated calls for the same level return the same `Arc`.
    ///
    /// # Errors
    ///
    /// Fails with [`PyramidError::LevelOutOfRange`] if `level >= num_levels()`,
    /// or with the variant-specific error of the level computation. A failed
    /// computation is not cached.
    fn get_dataset(&self, level: usize) -> Result<Arc<Dataset>, PyramidError>;

    /// Datasets of all levels, finest first.
    fn datasets(&self) -> Result<Vec<Arc<Dataset>>, PyramidError> {
        (0..self.num_levels())
            .map(|level| self.get_dataset(level))
            .collect()
    }

    /// Release the resources of every materialized level.
    ///
    /// Levels that were never requested are not computed. Calling `close`
    /// more than once is harmless.
    fn close(&self);
}

// =============================================================================
// Helpers
// =============================================================================

/// Use the given identifier or generate a fresh one.
pub(crate) fn resolve_ds_id(ds_id: Option<String>) -> Result<String, PyramidError> {
    match ds_id {
        Some(id) if id.trim().is_empty() => Err(PyramidError::EmptyId),
        Some(id) => Ok(id),
        None => Ok(Uuid::new_v4().to_string()),
    }
}

/// Close and forget every materialized level of a cache.
pub(crate) fn close_levels(cache: &LevelCache, ds_id: &str) {
    let already_closed = cache.mark_closed();
    let levels = cache.drain();
    if levels.is_empty() {
        if already_closed {
            tracing::warn!(ds_id, "close called on an already closed dataset");
        } else {
            tracing::debug!(ds_id, "close: no materialized levels");
        }
        return;
    }
    for (level, dataset) in levels {
        tracing::debug!(ds_id, level, "closing level");
        dataset.close();
    }
}
