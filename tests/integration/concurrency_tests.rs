//! Concurrent level access tests.
//!
//! Tests verify:
//! - Concurrent requests for one level run its computation once
//! - Every caller receives the same cached dataset
//! - Concurrent requests for different levels of one pyramid
//! - Registry lookups while pyramids are being added

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cube_pyramid::{
    ComputedMultiLevelDataset, Dataset, DatasetRegistry, MultiLevelDataset, Parameters,
    TransformFailure,
};

use super::test_utils::{base_pyramid, global_dataset_sized};

const TASKS: usize = 16;

/// A computed pyramid over `ds1` whose transform counts its calls.
fn counting_pyramid(calls: Arc<AtomicUsize>) -> ComputedMultiLevelDataset {
    let registry = DatasetRegistry::new();
    registry.insert(base_pyramid("ds1", &["chl"]));

    let transform = move |inputs: &[Arc<Dataset>], _level: usize, _params: &Parameters| {
        calls.fetch_add(1, Ordering::SeqCst);
        // widen the window in which concurrent callers overlap
        std::thread::sleep(Duration::from_millis(50));
        Ok::<_, TransformFailure>(inputs[0].as_ref().clone())
    };

    ComputedMultiLevelDataset::new(
        Arc::new(transform),
        ["ds1"],
        &registry,
        Parameters::new(),
        Some("counted".into()),
    )
    .unwrap()
}

// =============================================================================
// Single Computation
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_compute_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let pyramid = Arc::new(counting_pyramid(calls.clone()));

    let handles: Vec<_> = (0..TASKS)
        .map(|_| {
            let pyramid = pyramid.clone();
            tokio::task::spawn_blocking(move || pyramid.get_dataset(1))
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for ds in &results[1..] {
        assert!(Arc::ptr_eq(&results[0], ds));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_for_all_levels() {
    let calls = Arc::new(AtomicUsize::new(0));
    let pyramid = Arc::new(counting_pyramid(calls.clone()));
    let num_levels = pyramid.num_levels();

    let handles: Vec<_> = (0..TASKS)
        .map(|i| {
            let pyramid = pyramid.clone();
            let level = i % num_levels;
            tokio::task::spawn_blocking(move || (level, pyramid.get_dataset(level)))
        })
        .collect();

    for handle in handles {
        let (level, result) = handle.await.unwrap();
        let ds = result.unwrap();
        assert!(Arc::ptr_eq(&ds, &pyramid.get_dataset(level).unwrap()));
    }

    assert_eq!(calls.load(Ordering::SeqCst), num_levels);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_downsampling() {
    let pyramid = Arc::new(
        cube_pyramid::BaseMultiLevelDataset::new(global_dataset_sized(&["chl"], 2880, 1440, 2))
            .unwrap(),
    );
    let num_levels = pyramid.num_levels();

    // coarsest first, so the finer levels are pulled in by other tasks
    let handles: Vec<_> = (0..TASKS)
        .map(|i| {
            let pyramid = pyramid.clone();
            let level = num_levels - 1 - i % num_levels;
            tokio::task::spawn_blocking(move || {
                let ds = pyramid.get_dataset(level).unwrap();
                (level, ds.spatial_size().unwrap())
            })
        })
        .collect();

    for handle in handles {
        let (level, size) = handle.await.unwrap();
        assert_eq!(size, pyramid.tile_grid().dataset_size(level).unwrap());
    }
    assert_eq!(pyramid.materialized_levels(), num_levels);
}

// =============================================================================
// Registry
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_registry_concurrent_insert_and_lookup() {
    let registry = Arc::new(DatasetRegistry::new());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let registry = registry.clone();
            tokio::task::spawn_blocking(move || {
                let id = format!("ds{i}");
                registry.insert(base_pyramid(&id, &["chl"]));
                registry.get(&id).map(|ds| ds.ds_id().to_string())
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), Some(format!("ds{i}")));
    }
    assert_eq!(registry.len(), 8);
    registry.close_all();
}
