//! Named catalog of pyramids.
//!
//! Computed pyramids refer to their inputs by identifier. A
//! [`DatasetResolver`] turns those identifiers into pyramid instances; the
//! [`DatasetRegistry`] is the stock resolver backed by a map.
//!
//! # Example
//!
//! ```ignore
//! let registry = DatasetRegistry::new();
//! registry.insert(Arc::new(BaseMultiLevelDataset::new(dataset)?));
//!
//! let computed = ComputedMultiLevelDataset::new(
//!     transform,
//!     ["ml_ds1"],
//!     &registry,
//!     Parameters::new(),
//!     Some("ml_ds2".into()),
//! )?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use super::MultiLevelDataset;

// =============================================================================
// DatasetResolver Trait
// =============================================================================

/// Looks up pyramids by identifier.
pub trait DatasetResolver: Send + Sync {
    /// The pyramid with identifier `ds_id`, if known.
    fn resolve(&self, ds_id: &str) -> Option<Arc<dyn MultiLevelDataset>>;
}

impl<F> DatasetResolver for F
where
    F: Fn(&str) -> Option<Arc<dyn MultiLevelDataset>> + Send + Sync,
{
    fn resolve(&self, ds_id: &str) -> Option<Arc<dyn MultiLevelDataset>> {
        self(ds_id)
    }
}

// =============================================================================
// DatasetRegistry
// =============================================================================

type DatasetMap = HashMap<String, Arc<dyn MultiLevelDataset>>;

/// Thread-safe map from identifier to pyramid.
#[derive(Default)]
pub struct DatasetRegistry {
    datasets: RwLock<DatasetMap>,
}

impl DatasetRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pyramid under its own identifier.
    ///
    /// Returns the pyramid previously registered under that identifier.
    pub fn insert(
        &self,
        dataset: Arc<dyn MultiLevelDataset>,
    ) -> Option<Arc<dyn MultiLevelDataset>> {
        let ds_id = dataset.ds_id().to_string();
        let previous = self.write().insert(ds_id.clone(), dataset);
        if previous.is_some() {
            warn!(ds_id = %ds_id, "Replaced registered dataset");
        } else {
            debug!(ds_id = %ds_id, "Registered dataset");
        }
        previous
    }

    /// The pyramid registered under `ds_id`.
    pub fn get(&self, ds_id: &str) -> Option<Arc<dyn MultiLevelDataset>> {
        self.read().get(ds_id).cloned()
    }

    /// Unregister a pyramid without closing it.
    pub fn remove(&self, ds_id: &str) -> Option<Arc<dyn MultiLevelDataset>> {
        self.write().remove(ds_id)
    }

    /// Whether a pyramid is registered under `ds_id`.
    pub fn contains(&self, ds_id: &str) -> bool {
        self.read().contains_key(ds_id)
    }

    /// Registered identifiers, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered pyramids.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Close and unregister every pyramid.
    pub fn close_all(&self) {
        let datasets: Vec<_> = self.write().drain().collect();
        for (ds_id, dataset) in datasets {
            debug!(ds_id = %ds_id, "Closing registered dataset");
            dataset.close();
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, DatasetMap> {
        self.datasets.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DatasetMap> {
        self.datasets.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DatasetResolver for DatasetRegistry {
    fn resolve(&self, ds_id: &str) -> Option<Arc<dyn MultiLevelDataset>> {
        self.get(ds_id)
    }
}
