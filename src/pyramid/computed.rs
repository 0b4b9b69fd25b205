//! Pyramid computed level by level from other pyramids.
//!
//! ```text
//!   input "a" level L ──┐
//!   input "b" level L ──┼──► transform(inputs, L, params) ──► level L
//!   ...                 ┘
//! ```
//!
//! Inputs are resolved once, at construction, so a missing input is
//! reported before any level is computed. The tile grid is the one of the
//! first input; all inputs must have the same number of levels.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dataset::Dataset;
use crate::error::PyramidError;
use crate::grid::TileGrid;

use super::cache::LevelCache;
use super::registry::DatasetResolver;
use super::transform::{Parameters, Transform, TransformRef, TransformRegistry};
use super::{close_levels, resolve_ds_id, MultiLevelDataset};

/// A pyramid whose level `L` is a transform of level `L` of its inputs.
pub struct ComputedMultiLevelDataset {
    ds_id: String,
    tile_grid: TileGrid,
    transform: Arc<dyn Transform>,
    input_ids: Vec<String>,
    inputs: Vec<Arc<dyn MultiLevelDataset>>,
    parameters: Parameters,
    cache: LevelCache,
}

impl ComputedMultiLevelDataset {
    /// Create a computed pyramid.
    ///
    /// # Arguments
    /// * `transform` - Function computing one level from the inputs' levels
    /// * `input_ids` - Identifiers of the input pyramids, in transform order
    /// * `resolver` - Looks up the input pyramids
    /// * `parameters` - Extra named parameters passed to every call
    /// * `ds_id` - Identifier of the new pyramid, generated if `None`
    ///
    /// # Errors
    ///
    /// Fails with a config-kind error if there are no inputs, an input is
    /// unknown to the resolver, or the inputs disagree on their level count.
    pub fn new<I, S>(
        transform: Arc<dyn Transform>,
        input_ids: I,
        resolver: &dyn DatasetResolver,
        parameters: Parameters,
        ds_id: Option<String>,
    ) -> Result<Self, PyramidError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ds_id = resolve_ds_id(ds_id)?;
        let input_ids: Vec<String> = input_ids.into_iter().map(Into::into).collect();
        if input_ids.is_empty() {
            return Err(PyramidError::NoInputs { ds_id });
        }

        let inputs = input_ids
            .iter()
            .map(|input_id| {
                resolver
                    .resolve(input_id)
                    .ok_or_else(|| PyramidError::UnknownDataset {
                        ds_id: ds_id.clone(),
                        input_id: input_id.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let tile_grid = *inputs[0].tile_grid();
        let expected = tile_grid.num_levels();
        for input in &inputs[1..] {
            if input.num_levels() != expected {
                return Err(PyramidError::LevelCountMismatch {
                    ds_id,
                    input_id: input.ds_id().to_string(),
                    expected,
                    actual: input.num_levels(),
                });
            }
            if input.tile_grid() != &tile_grid {
                warn!(
                    ds_id = %ds_id,
                    input_id = %input.ds_id(),
                    "Input tile grid differs from the first input"
                );
            }
        }

        info!(
            ds_id = %ds_id,
            inputs = ?input_ids,
            num_levels = expected,
            "Created computed multi-level dataset"
        );

        Ok(Self {
            cache: LevelCache::new(ds_id.clone(), expected),
            ds_id,
            tile_grid,
            transform,
            input_ids,
            inputs,
            parameters,
        })
    }

    /// Create a computed pyramid from a named transform.
    ///
    /// The reference is resolved against `transforms` before anything else,
    /// so an unknown transform fails construction.
    pub fn from_ref<I, S>(
        transforms: &TransformRegistry,
        reference: &TransformRef,
        input_ids: I,
        resolver: &dyn DatasetResolver,
        parameters: Parameters,
        ds_id: Option<String>,
    ) -> Result<Self, PyramidError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let transform = transforms.resolve(reference)?;
        Self::new(transform, input_ids, resolver, parameters, ds_id)
    }

    /// Identifiers of the inputs, in transform order.
    pub fn input_ids(&self) -> &[String] {
        &self.input_ids
    }

    /// Extra parameters passed to the transform.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    fn compute(&self, level: usize) -> Result<Arc<Dataset>, PyramidError> {
        let datasets = self
            .inputs
            .iter()
            .map(|input| input.get_dataset(level))
            .collect::<Result<Vec<_>, _>>()?;

        let expected = datasets[0]
            .spatial_size()
            .map_err(|e| PyramidError::dataset(self.inputs[0].ds_id(), e))?;

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.transform.apply(&datasets, level, &self.parameters)
        }));

        let mut dataset = match outcome {
            Ok(Ok(dataset)) => dataset,
            Ok(Err(e)) => return Err(self.failure(level, e.to_string())),
            Err(panic) => {
                let reason = format!("transform panicked: {}", panic_message(&*panic));
                return Err(self.failure(level, reason));
            }
        };

        match dataset.spatial_size() {
            Ok(actual) if actual == expected => {}
            Ok((w, h)) => {
                return Err(self.failure(
                    level,
                    format!(
                        "result has spatial size {w}x{h}, inputs have {}x{}",
                        expected.0, expected.1
                    ),
                ))
            }
            Err(e) => return Err(self.failure(level, format!("result is unusable: {e}"))),
        }

        // handles of the inputs stay with the inputs
        dataset.forget_resources_of(&datasets);

        debug!(ds_id = %self.ds_id, level, "Computed level");
        Ok(Arc::new(dataset))
    }

    fn failure(&self, level: usize, reason: String) -> PyramidError {
        PyramidError::Computation {
            ds_id: self.ds_id.clone(),
            level,
            reason,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic payload"
    }
}

impl MultiLevelDataset for ComputedMultiLevelDataset {
    fn ds_id(&self) -> &str {
        &self.ds_id
    }

    fn tile_grid(&self) -> &TileGrid {
        &self.tile_grid
    }

    fn get_dataset(&self, level: usize) -> Result<Arc<Dataset>, PyramidError> {
        self.cache
            .get_or_try_insert_with(level, || self.compute(level))
    }

    fn close(&self) {
        close_levels(&self.cache, &self.ds_id);
    }
}
