//! Computed pyramid integration tests.
//!
//! Tests verify:
//! - Weekly time aggregation through a named transform
//! - Transforms resolved from the builtin registry and from closures
//! - Error kinds for unknown inputs and transforms
//! - Closing a computed pyramid leaves its inputs open

use std::sync::Arc;

use cube_pyramid::{
    ComputedMultiLevelDataset, Dataset, DatasetRegistry, ErrorKind, MultiLevelDataset,
    Parameters, TransformFailure, TransformRef, TransformRegistry, AGGREGATE_TIME,
};

use super::test_utils::{base_pyramid, dims, dims_of, global_dataset, CountingResource};

fn period(value: &str) -> Parameters {
    let mut params = Parameters::new();
    params.insert("period".to_string(), value.into());
    params
}

fn registry_with(ids: &[&str]) -> DatasetRegistry {
    let registry = DatasetRegistry::new();
    for id in ids {
        registry.insert(base_pyramid(id, &["chl", "tsm"]));
    }
    registry
}

// =============================================================================
// Time Aggregation
// =============================================================================

#[test]
fn test_weekly_aggregation() {
    let registry = registry_with(&["ds1"]);
    let computed = ComputedMultiLevelDataset::from_ref(
        &TransformRegistry::with_builtins(),
        &TransformRef::builtin(AGGREGATE_TIME),
        ["ds1"],
        &registry,
        period("1W"),
        Some("ds1_1W".into()),
    )
    .unwrap();

    assert_eq!(computed.ds_id(), "ds1_1W");
    assert_eq!(computed.num_levels(), 3);
    assert_eq!(computed.tile_grid(), registry.get("ds1").unwrap().tile_grid());

    assert_eq!(
        dims_of(&computed, 0),
        dims(&[("time", 3), ("lat", 720), ("lon", 1440), ("bnds", 2)])
    );
    assert_eq!(
        dims_of(&computed, 1),
        dims(&[("time", 3), ("lat", 360), ("lon", 720)])
    );
    assert_eq!(
        dims_of(&computed, 2),
        dims(&[("time", 3), ("lat", 180), ("lon", 360)])
    );

    let all = computed.datasets().unwrap();
    assert_eq!(all.len(), 3);
    for (level, ds) in all.iter().enumerate() {
        assert_eq!(ds.as_ref(), computed.get_dataset(level).unwrap().as_ref());
        assert_eq!(ds.data_var_names(), vec!["chl", "tsm"]);
    }
}

#[test]
fn test_transform_from_registered_location() {
    let registry = registry_with(&["ds1", "ds2"]);
    let mut transforms = TransformRegistry::new();
    transforms.register(
        "transforms.py:first_of".parse().unwrap(),
        Arc::new(
            |inputs: &[Arc<Dataset>], _level: usize, _params: &Parameters| {
                Ok::<_, TransformFailure>(inputs[0].as_ref().clone())
            },
        ),
    );

    let computed = ComputedMultiLevelDataset::from_ref(
        &transforms,
        &"transforms.py:first_of".parse().unwrap(),
        ["ds1", "ds2"],
        &registry,
        Parameters::new(),
        None,
    )
    .unwrap();
    assert_eq!(computed.input_ids(), ["ds1", "ds2"]);
    assert_eq!(
        dims_of(&computed, 1),
        dims(&[("time", 14), ("lat", 360), ("lon", 720)])
    );
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_unknown_input() {
    let registry = registry_with(&["ds1"]);
    let err = ComputedMultiLevelDataset::from_ref(
        &TransformRegistry::with_builtins(),
        &TransformRef::builtin(AGGREGATE_TIME),
        ["ds1", "missing"],
        &registry,
        period("1W"),
        None,
    )
    .err()
    .unwrap();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(err.to_string().contains("missing"));
}

#[test]
fn test_unknown_transform() {
    let registry = registry_with(&["ds1"]);
    let err = ComputedMultiLevelDataset::from_ref(
        &TransformRegistry::with_builtins(),
        &TransformRef::builtin("no_such_function"),
        ["ds1"],
        &registry,
        Parameters::new(),
        None,
    )
    .err()
    .unwrap();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_invalid_parameters_fail_per_level() {
    let registry = registry_with(&["ds1"]);
    let computed = ComputedMultiLevelDataset::from_ref(
        &TransformRegistry::with_builtins(),
        &TransformRef::builtin(AGGREGATE_TIME),
        ["ds1"],
        &registry,
        period("fortnight"),
        None,
    )
    .unwrap();
    let err = computed.get_dataset(2).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Computation);
    assert_eq!(computed.get_dataset(3).unwrap_err().kind(), ErrorKind::Index);
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_close_leaves_inputs_open() {
    let resource = CountingResource::new();
    let registry = DatasetRegistry::new();
    registry.insert(Arc::new(
        cube_pyramid::BaseMultiLevelDataset::with_options(
            global_dataset(&["chl"]).with_resource(resource.clone()),
            Some("ds1".into()),
            &Default::default(),
        )
        .unwrap(),
    ));

    let computed = ComputedMultiLevelDataset::from_ref(
        &TransformRegistry::with_builtins(),
        &TransformRef::builtin(AGGREGATE_TIME),
        ["ds1"],
        &registry,
        period("7D"),
        None,
    )
    .unwrap();

    let level0 = computed.get_dataset(0).unwrap();
    assert_eq!(level0.dim_size("time"), Some(3));
    assert_eq!(level0.resource_count(), 0);

    computed.close();
    computed.close();
    assert_eq!(resource.close_count(), 0);

    registry.close_all();
    assert_eq!(resource.close_count(), 1);
}
