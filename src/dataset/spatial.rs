//! Spatial dimension detection and geographic extent of a dataset.

use crate::error::DatasetError;
use crate::grid::GeoExtent;

use super::Dataset;

/// Recognized `(y, x)` dimension name pairs, in order of preference.
const SPATIAL_DIM_NAMES: [(&str, &str); 3] =
    [("lat", "lon"), ("latitude", "longitude"), ("y", "x")];

/// Names of the two horizontal dimensions of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpatialDims {
    pub y: String,
    pub x: String,
}

impl SpatialDims {
    /// Find the spatial dimensions of a dataset.
    pub fn detect(dataset: &Dataset) -> Result<Self, DatasetError> {
        let dims = dataset.dims();
        SPATIAL_DIM_NAMES
            .iter()
            .find(|(y, x)| dims.contains_key(*y) && dims.contains_key(*x))
            .map(|(y, x)| SpatialDims {
                y: y.to_string(),
                x: x.to_string(),
            })
            .ok_or(DatasetError::MissingSpatialDims)
    }

    /// Whether `dim` is one of the two spatial dimensions.
    pub fn contains(&self, dim: &str) -> bool {
        self.y == dim || self.x == dim
    }
}

/// Geographic footprint of a dataset, derived from its coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    /// Outer bounds of all cells
    pub extent: GeoExtent,

    /// `true` if the y coordinate increases with the row index
    pub y_ascending: bool,
}

/// Compute the footprint from the spatial coordinates.
///
/// Cell bounds (`<dim>_bnds`) are used when present, otherwise bounds are
/// inferred from the cell centers assuming regular spacing.
pub fn footprint(dataset: &Dataset, dims: &SpatialDims) -> Result<Footprint, DatasetError> {
    let (west, east) = axis_bounds(dataset, &dims.x)?;
    let (south, north) = axis_bounds(dataset, &dims.y)?;

    let y = centers(dataset, &dims.y)?;
    let y_ascending = y.len() > 1 && y[0] < y[y.len() - 1];

    let extent = GeoExtent::new(west, south, east, north)
        .map_err(|_| DatasetError::MissingCoordinate(format!("{}/{}", dims.y, dims.x)))?;

    Ok(Footprint {
        extent,
        y_ascending,
    })
}

fn centers(dataset: &Dataset, dim: &str) -> Result<Vec<f64>, DatasetError> {
    dataset
        .coord(dim)
        .and_then(|c| c.values_1d())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DatasetError::MissingCoordinate(dim.to_string()))
}

fn axis_bounds(dataset: &Dataset, dim: &str) -> Result<(f64, f64), DatasetError> {
    let bnds_name = format!("{dim}_bnds");
    if let Some(bnds) = dataset.coord(&bnds_name) {
        if bnds.shape().len() == 2 && bnds.shape()[1] == 2 && bnds.shape()[0] > 0 {
            let (lo, hi) = bnds
                .data()
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                });
            return Ok((lo, hi));
        }
    }

    let c = centers(dataset, dim)?;
    let (first, last) = (c[0], c[c.len() - 1]);
    let lo = first.min(last);
    let hi = first.max(last);
    let half = if c.len() > 1 {
        0.5 * (hi - lo) / (c.len() - 1) as f64
    } else {
        0.5
    };
    Ok((lo - half, hi + half))
}
