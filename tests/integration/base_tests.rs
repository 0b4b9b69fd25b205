//! Base pyramid integration tests.
//!
//! Tests verify:
//! - Tile grid derivation for a global 0.25° dataset
//! - Level sizes and dimensions, including dropped cell bounds
//! - Level caching and on-demand materialization
//! - Lifecycle: close releases level resources once per level

use std::sync::Arc;

use cube_pyramid::{
    BaseMultiLevelDataset, DownsampleMethod, ErrorKind, MultiLevelDataset, PyramidOptions,
    TileGrid,
};

use super::test_utils::{
    base_pyramid, dims, dims_of, global_dataset, global_dataset_from, global_dataset_sized,
    CountingResource, HEIGHT, WIDTH,
};

// =============================================================================
// Tile Grid
// =============================================================================

#[test]
fn test_global_tile_grid() {
    let pyramid = base_pyramid("chl", &["chl"]);
    let expected =
        TileGrid::new(3, 2, 1, 180, 180, (-180.0, -90.0, 180.0, 90.0), false).unwrap();
    assert_eq!(pyramid.tile_grid(), &expected);
    assert_eq!(pyramid.num_levels(), 3);
}

#[test]
fn test_tile_grid_follows_options() {
    let options = PyramidOptions {
        min_tile_size: 256,
        max_tile_size: 512,
        ..PyramidOptions::default()
    };
    let pyramid = BaseMultiLevelDataset::with_options(
        global_dataset_sized(&["v"], 2048, 1024, 1),
        Some("v".into()),
        &options,
    )
    .unwrap();
    let grid = pyramid.tile_grid();
    assert_eq!(grid.tile_width(), 256);
    assert_eq!(grid.tile_height(), 256);
    assert_eq!(grid.num_levels(), 3);
    assert_eq!(grid.num_level_zero_tiles(), (2, 1));
}

#[test]
fn test_0_360_longitudes_lie_inside_the_grid() {
    let input = global_dataset_from(0.0, &["chl"], WIDTH, HEIGHT, 1);
    let pyramid = BaseMultiLevelDataset::new(input).unwrap();
    let extent = pyramid.tile_grid().geo_extent();
    assert_eq!((extent.west, extent.east), (-180.0, 180.0));

    let level0 = pyramid.get_dataset(0).unwrap();
    let lon: Vec<f64> = level0.coord("lon").unwrap().data().iter().copied().collect();
    assert_eq!(lon[0], -179.875);
    assert!(lon.windows(2).all(|w| w[0] < w[1]));
    assert!(lon.iter().all(|&x| extent.west < x && x < extent.east));
    let bnds = level0.coord("lon_bnds").unwrap();
    assert!(bnds.data().iter().all(|&x| extent.west <= x && x <= extent.east));

    // the western tile at zoom 0 holds exactly the western half of the data
    let tile = pyramid.tile_grid().tile_extent(0, 0, 0).unwrap();
    assert_eq!((tile.west, tile.east), (-180.0, 0.0));
    let inside = lon.iter().filter(|&&x| tile.west < x && x < tile.east).count();
    assert_eq!(inside, WIDTH / 2);
    assert!(lon[..WIDTH / 2].iter().all(|&x| x < 0.0));
}

// =============================================================================
// Levels
// =============================================================================

#[test]
fn test_level_dimensions() {
    let pyramid = base_pyramid("chl", &["chl", "tsm"]);

    assert_eq!(
        dims_of(pyramid.as_ref(), 0),
        dims(&[("time", 14), ("lat", 720), ("lon", 1440), ("bnds", 2)])
    );
    assert_eq!(
        dims_of(pyramid.as_ref(), 1),
        dims(&[("time", 14), ("lat", 360), ("lon", 720)])
    );
    assert_eq!(
        dims_of(pyramid.as_ref(), 2),
        dims(&[("time", 14), ("lat", 180), ("lon", 360)])
    );

    for level in 0..3 {
        let ds = pyramid.get_dataset(level).unwrap();
        assert_eq!(ds.data_var_names(), vec!["chl", "tsm"]);
        assert_eq!(ds.data_var("chl").unwrap().dims(), ["time", "lat", "lon"]);
    }
}

#[test]
fn test_level_sizes_match_grid() {
    let pyramid = base_pyramid("chl", &["chl"]);
    let grid = *pyramid.tile_grid();
    for level in 0..grid.num_levels() {
        let ds = pyramid.get_dataset(level).unwrap();
        assert_eq!(ds.spatial_size().unwrap(), grid.dataset_size(level).unwrap());
    }
}

#[test]
fn test_level_zero_is_the_input() {
    let input = Arc::new(global_dataset(&["chl"]));
    let pyramid = BaseMultiLevelDataset::new(input.clone()).unwrap();
    assert!(Arc::ptr_eq(&pyramid.get_dataset(0).unwrap(), &input));
    assert_eq!(pyramid.downsample_method(), DownsampleMethod::Nearest);
}

#[test]
fn test_coordinates_are_subsampled() {
    let pyramid = base_pyramid("chl", &["chl"]);
    let level1 = pyramid.get_dataset(1).unwrap();
    let lon = level1.coord("lon").unwrap();
    assert_eq!(lon.shape(), [720]);
    let first: Vec<f64> = lon.data().iter().take(2).copied().collect();
    assert_eq!(first, vec![-179.875, -179.375]);
    assert!(level1.coord("lat_bnds").is_none());
    assert!(level1.coord("time").is_some());
}

#[test]
fn test_levels_are_cached() {
    let pyramid = base_pyramid("chl", &["chl"]);
    assert_eq!(pyramid.materialized_levels(), 1);

    let coarse = pyramid.get_dataset(2).unwrap();
    assert_eq!(pyramid.materialized_levels(), 3);
    assert!(Arc::ptr_eq(&coarse, &pyramid.get_dataset(2).unwrap()));

    let all = pyramid.datasets().unwrap();
    assert_eq!(all.len(), 3);
    for (level, ds) in all.iter().enumerate() {
        assert!(Arc::ptr_eq(ds, &pyramid.get_dataset(level).unwrap()));
    }
}

#[test]
fn test_out_of_range() {
    let pyramid = base_pyramid("chl", &["chl"]);
    let err = pyramid.get_dataset(3).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Index);
    assert!(err.to_string().contains("chl"));
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_close_releases_materialized_levels() {
    let resource = CountingResource::new();
    let input = global_dataset(&["chl"]).with_resource(resource.clone());
    let pyramid =
        BaseMultiLevelDataset::with_options(input, Some("chl".into()), &PyramidOptions::default())
            .unwrap();

    pyramid.get_dataset(1).unwrap();
    pyramid.close();
    // level 0 and level 1 both hold the handle
    assert_eq!(resource.close_count(), 2);

    pyramid.close();
    assert_eq!(resource.close_count(), 2);
}

#[test]
fn test_close_without_access() {
    let resource = CountingResource::new();
    let input = global_dataset(&["chl"]).with_resource(resource.clone());
    let pyramid = BaseMultiLevelDataset::new(input).unwrap();
    pyramid.close();
    assert_eq!(resource.close_count(), 1);
}
