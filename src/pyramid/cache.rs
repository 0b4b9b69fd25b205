//! Per-level dataset cache.
//!
//! Each level has its own slot behind its own mutex. Looking up a level and
//! computing it on a miss happen under that slot's lock, so:
//! - a level is computed at most once per cache, even under concurrent use
//! - different levels compute independently of each other
//! - a failed computation leaves the slot empty and the next call retries

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::dataset::Dataset;
use crate::error::PyramidError;

/// Lazily populated level slots of one multi-level dataset.
pub struct LevelCache {
    ds_id: String,
    slots: Vec<Mutex<Option<Arc<Dataset>>>>,
    closed: AtomicBool,
}

impl LevelCache {
    /// Create a cache with `num_levels` empty slots.
    pub fn new(ds_id: impl Into<String>, num_levels: usize) -> Self {
        Self {
            ds_id: ds_id.into(),
            slots: (0..num_levels).map(|_| Mutex::new(None)).collect(),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of levels.
    pub fn num_levels(&self) -> usize {
        self.slots.len()
    }

    /// Return the cached dataset for `level`, computing it with `compute` on
    /// a miss.
    ///
    /// `compute` runs while the level's slot is locked. It may request other
    /// levels of the same cache as long as it never requests `level` itself.
    pub fn get_or_try_insert_with<F>(
        &self,
        level: usize,
        compute: F,
    ) -> Result<Arc<Dataset>, PyramidError>
    where
        F: FnOnce() -> Result<Arc<Dataset>, PyramidError>,
    {
        let mut slot = self.lock(level)?;

        if let Some(dataset) = slot.as_ref() {
            debug!(ds_id = %self.ds_id, level, "serving cached level");
            return Ok(dataset.clone());
        }

        debug!(ds_id = %self.ds_id, level, "computing level");
        let dataset = compute()?;
        *slot = Some(dataset.clone());
        Ok(dataset)
    }

    /// Put an already available dataset into an empty slot.
    ///
    /// An existing entry is kept and returned instead.
    pub fn seed(&self, level: usize, dataset: Arc<Dataset>) -> Result<Arc<Dataset>, PyramidError> {
        self.get_or_try_insert_with(level, || Ok(dataset))
    }

    /// Cached dataset for `level`, without computing it.
    pub fn get(&self, level: usize) -> Option<Arc<Dataset>> {
        self.lock(level).ok().and_then(|slot| slot.clone())
    }

    /// Whether `level` has been materialized.
    pub fn is_materialized(&self, level: usize) -> bool {
        self.get(level).is_some()
    }

    /// Number of materialized levels.
    pub fn materialized_count(&self) -> usize {
        (0..self.slots.len())
            .filter(|&level| self.is_materialized(level))
            .count()
    }

    /// Empty every slot, returning the datasets that were materialized.
    pub fn drain(&self) -> Vec<(usize, Arc<Dataset>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(level, slot)| {
                let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
                slot.take().map(|dataset| (level, dataset))
            })
            .collect()
    }

    /// Record that the owner was closed, returning whether it already was.
    pub fn mark_closed(&self) -> bool {
        self.closed.swap(true, Ordering::SeqCst)
    }

    fn lock(&self, level: usize) -> Result<MutexGuard<'_, Option<Arc<Dataset>>>, PyramidError> {
        let slot = self.slots.get(level).ok_or_else(|| PyramidError::LevelOutOfRange {
            ds_id: self.ds_id.clone(),
            level,
            num_levels: self.slots.len(),
        })?;
        // a panic inside `compute` never stores a value, so the slot is
        // still consistent after poisoning
        Ok(slot.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
