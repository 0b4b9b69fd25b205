//! # cube-pyramid
//!
//! Multi-level (pyramid) datasets for geospatial raster data cubes.
//!
//! A pyramid presents one raster dataset at a sequence of decreasing
//! resolutions with a single, consistent tiling geometry. Levels are
//! produced lazily on first request and cached per pyramid instance.
//!
//! ## Features
//!
//! - **Tile grids**: derive tile size, level count and level-0 tiling from a
//!   raster size; find the tiles covering a geographic window
//! - **Base pyramids**: successive 2× downsampling of a full-resolution dataset
//! - **Stored pyramids**: open already persisted levels on demand
//! - **Computed pyramids**: apply a transform level by level to named input
//!   pyramids, with extra parameters
//! - **Combined pyramids**: merge the variables of same-geometry pyramids
//!
//! ## Architecture
//!
//! - [`grid`] - Tile grid geometry and geographic extents
//! - [`dataset`] - Labeled n-dimensional raster datasets
//! - [`pyramid`] - Multi-level datasets, level cache, resolver and transforms
//! - [`config`] - Pyramid options and CLI types
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cube_pyramid::{BaseMultiLevelDataset, Dataset, MultiLevelDataset, Variable};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let lon = (0..1440).map(|i| -180.0 + (i as f64 + 0.5) * 0.25).collect();
//! let lat = (0..720).map(|j| 90.0 - (j as f64 + 0.5) * 0.25).collect();
//! let dataset = Dataset::new()
//!     .with_coord("lon", Variable::from_vec("lon", lon))?
//!     .with_coord("lat", Variable::from_vec("lat", lat))?
//!     .with_data_var("chl", Variable::zeros(&[("time", 14), ("lat", 720), ("lon", 1440)]))?;
//!
//! let pyramid = BaseMultiLevelDataset::new(dataset)?;
//! assert_eq!(pyramid.num_levels(), 3);
//!
//! let coarsest: Arc<Dataset> = pyramid.get_dataset(2)?;
//! assert_eq!(coarsest.spatial_size()?, (360, 180));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod grid;
pub mod pyramid;

// Re-export commonly used types
pub use config::{Cli, Command, OutputFormat, PyramidOptions};
pub use dataset::{Dataset, DatasetResource, DownsampleMethod, SpatialDims, Variable};
pub use error::{DatasetError, ErrorKind, GridError, PyramidError};
pub use grid::{GeoExtent, TileGrid, TileRange, TilingOptions};
pub use pyramid::{
    aggregate_time, BaseMultiLevelDataset, CombinedMultiLevelDataset, ComputedMultiLevelDataset,
    DatasetRegistry, DatasetResolver, LevelCache, LevelSource, MultiLevelDataset, Parameters,
    StoredMultiLevelDataset, Transform, TransformFailure, TransformRef, TransformRegistry,
    VecLevelSource, AGGREGATE_TIME,
};
