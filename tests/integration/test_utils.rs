//! Test utilities for integration tests.
//!
//! This module provides synthetic global datasets shaped like a daily
//! 0.25° data cube and a resource that counts how often it was closed.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cube_pyramid::{
    BaseMultiLevelDataset, Dataset, DatasetResource, MultiLevelDataset, PyramidOptions, Variable,
};

// =============================================================================
// Constants
// =============================================================================

/// Width of the global test grid (0.25°).
pub const WIDTH: usize = 1440;

/// Height of the global test grid (0.25°).
pub const HEIGHT: usize = 720;

/// Number of daily time steps.
pub const TIME_STEPS: usize = 14;

/// 2019-01-01T12:00 in days since 1970-01-01.
pub const FIRST_DAY: f64 = 17897.5;

// =============================================================================
// Counting Resource
// =============================================================================

/// A dataset resource that records how often it was closed.
#[derive(Default)]
pub struct CountingResource {
    closed: AtomicUsize,
}

impl CountingResource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl DatasetResource for CountingResource {
    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Datasets
// =============================================================================

/// Cell centers and bounds of a regular axis from `start` to `end`.
fn axis(start: f64, end: f64, n: usize) -> (Vec<f64>, Vec<f64>) {
    let step = (end - start) / n as f64;
    let centers = (0..n).map(|i| start + (i as f64 + 0.5) * step).collect();
    let bounds = (0..n)
        .flat_map(|i| [start + i as f64 * step, start + (i + 1) as f64 * step])
        .collect();
    (centers, bounds)
}

fn bounds_variable(dim: &str, bounds: Vec<f64>) -> Variable {
    let n = bounds.len() / 2;
    let array = ndarray::Array::from_shape_vec((n, 2), bounds)
        .expect("bounds have two columns")
        .into_dyn();
    Variable::new([dim, "bnds"], array).expect("rank matches")
}

/// A global `width × height` dataset with `time_steps` daily steps.
///
/// Latitudes run from north to south. Coordinates carry cell bounds
/// (`lat_bnds`, `lon_bnds`), so level 0 has a `bnds` dimension. Data
/// variables are zero-filled with dimensions `(time, lat, lon)`.
pub fn global_dataset_sized(
    var_names: &[&str],
    width: usize,
    height: usize,
    time_steps: usize,
) -> Dataset {
    global_dataset_from(-180.0, var_names, width, height, time_steps)
}

/// Like [`global_dataset_sized`], with longitudes from `west` to `west + 360`.
pub fn global_dataset_from(
    west: f64,
    var_names: &[&str],
    width: usize,
    height: usize,
    time_steps: usize,
) -> Dataset {
    let (lon, lon_bnds) = axis(west, west + 360.0, width);
    let (lat, lat_bnds) = axis(90.0, -90.0, height);
    let time = (0..time_steps).map(|i| FIRST_DAY + i as f64).collect();

    let mut ds = Dataset::new()
        .with_coord(
            "time",
            Variable::from_vec("time", time).with_attr("units", "days since 1970-01-01"),
        )
        .unwrap()
        .with_coord("lat", Variable::from_vec("lat", lat))
        .unwrap()
        .with_coord("lon", Variable::from_vec("lon", lon))
        .unwrap()
        .with_coord("lat_bnds", bounds_variable("lat", lat_bnds))
        .unwrap()
        .with_coord("lon_bnds", bounds_variable("lon", lon_bnds))
        .unwrap();

    for name in var_names {
        ds.set_data_var(
            *name,
            Variable::zeros(&[("time", time_steps), ("lat", height), ("lon", width)]),
        )
        .unwrap();
    }
    ds
}

/// A global 1440×720 dataset with 14 daily steps.
pub fn global_dataset(var_names: &[&str]) -> Dataset {
    global_dataset_sized(var_names, WIDTH, HEIGHT, TIME_STEPS)
}

/// A base pyramid over [`global_dataset`] with an explicit identifier.
pub fn base_pyramid(ds_id: &str, var_names: &[&str]) -> Arc<BaseMultiLevelDataset> {
    Arc::new(
        BaseMultiLevelDataset::with_options(
            global_dataset(var_names),
            Some(ds_id.to_string()),
            &PyramidOptions::default(),
        )
        .unwrap(),
    )
}

/// [`base_pyramid`] as a trait object, for combinators.
pub fn input_pyramid(ds_id: &str, var_names: &[&str]) -> Arc<dyn MultiLevelDataset> {
    base_pyramid(ds_id, var_names)
}

/// Dimension sizes of a pyramid level.
pub fn dims_of(pyramid: &dyn MultiLevelDataset, level: usize) -> BTreeMap<String, usize> {
    pyramid.get_dataset(level).unwrap().dims()
}

/// Build an expected dimension map.
pub fn dims(pairs: &[(&str, usize)]) -> BTreeMap<String, usize> {
    pairs.iter().map(|(d, n)| (d.to_string(), *n)).collect()
}
