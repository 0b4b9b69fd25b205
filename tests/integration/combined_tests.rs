//! Combined pyramid integration tests.
//!
//! Tests verify:
//! - Variable union of three same-geometry pyramids at every level
//! - Conflicts and grid mismatches
//! - Closing a combination leaves its inputs open

use std::sync::Arc;

use cube_pyramid::{
    BaseMultiLevelDataset, CombinedMultiLevelDataset, ErrorKind, MultiLevelDataset,
    PyramidError, PyramidOptions,
};

use super::test_utils::{
    dims, dims_of, global_dataset, global_dataset_sized, input_pyramid, CountingResource,
};

fn three_inputs() -> Vec<Arc<dyn MultiLevelDataset>> {
    vec![
        input_pyramid("ds1", &["chl_1", "tsm_1"]),
        input_pyramid("ds2", &["chl_2", "tsm_2"]),
        input_pyramid("ds3", &["chl_3", "tsm_3"]),
    ]
}

// =============================================================================
// Variable Union
// =============================================================================

#[test]
fn test_combine_three_pyramids() {
    let combined = CombinedMultiLevelDataset::new(three_inputs(), None).unwrap();
    assert_eq!(combined.ds_id(), "ds1+ds2+ds3");
    assert_eq!(combined.num_levels(), 3);

    assert_eq!(
        dims_of(&combined, 0),
        dims(&[("time", 14), ("lat", 720), ("lon", 1440), ("bnds", 2)])
    );
    assert_eq!(
        dims_of(&combined, 1),
        dims(&[("time", 14), ("lat", 360), ("lon", 720)])
    );
    assert_eq!(
        dims_of(&combined, 2),
        dims(&[("time", 14), ("lat", 180), ("lon", 360)])
    );

    for level in 0..3 {
        let ds = combined.get_dataset(level).unwrap();
        assert_eq!(
            ds.data_var_names(),
            vec!["chl_1", "chl_2", "chl_3", "tsm_1", "tsm_2", "tsm_3"]
        );
    }
}

#[test]
fn test_combined_grid_is_the_inputs_grid() {
    let inputs = three_inputs();
    let grid = *inputs[0].tile_grid();
    let combined = CombinedMultiLevelDataset::new(inputs, Some("all".into())).unwrap();
    assert_eq!(combined.ds_id(), "all");
    assert_eq!(combined.tile_grid(), &grid);
}

#[test]
fn test_combined_datasets_are_cached() {
    let combined = CombinedMultiLevelDataset::new(three_inputs(), None).unwrap();
    let all = combined.datasets().unwrap();
    for (level, ds) in all.iter().enumerate() {
        assert!(Arc::ptr_eq(ds, &combined.get_dataset(level).unwrap()));
    }
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_variable_collision() {
    let combined = CombinedMultiLevelDataset::new(
        vec![input_pyramid("a", &["chl"]), input_pyramid("b", &["chl"])],
        None,
    )
    .unwrap();
    let err = combined.get_dataset(0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(matches!(err, PyramidError::VariableConflict { ref name, .. } if name == "chl"));
}

#[test]
fn test_grid_mismatch() {
    let coarse: Arc<dyn MultiLevelDataset> = Arc::new(
        BaseMultiLevelDataset::with_options(
            global_dataset_sized(&["b"], 720, 360, 14),
            Some("coarse".into()),
            &PyramidOptions::default(),
        )
        .unwrap(),
    );
    let err = CombinedMultiLevelDataset::new(vec![input_pyramid("a", &["a"]), coarse], None)
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_out_of_range() {
    let combined = CombinedMultiLevelDataset::new(three_inputs(), None).unwrap();
    assert_eq!(combined.get_dataset(3).unwrap_err().kind(), ErrorKind::Index);
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_close_leaves_inputs_open() {
    let resource = CountingResource::new();
    let input: Arc<dyn MultiLevelDataset> = Arc::new(
        BaseMultiLevelDataset::new(global_dataset(&["chl"]).with_resource(resource.clone()))
            .unwrap(),
    );
    let combined = CombinedMultiLevelDataset::new(vec![input.clone()], Some("c".into())).unwrap();

    combined.datasets().unwrap();
    combined.close();
    combined.close();
    assert_eq!(resource.close_count(), 0);

    // the input still serves its levels
    assert!(input.get_dataset(2).is_ok());
    input.close();
    assert!(resource.close_count() > 0);
}
