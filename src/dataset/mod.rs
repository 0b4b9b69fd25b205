//! Labeled raster datasets.
//!
//! A [`Dataset`] is a collection of named [`Variable`]s sharing one set of
//! dimensions. Coordinate variables (`lat`, `lon`, `time`, and auxiliary
//! arrays such as `lat_bnds`) are kept apart from data variables. This is the
//! unit a pyramid level is made of.
//!
//! # Sharing
//!
//! Array storage is reference counted. Cloning a dataset, selecting every
//! n-th cell with [`Dataset::downsample`] using [`DownsampleMethod::Nearest`],
//! or merging datasets never copies array data.
//!
//! # Resources
//!
//! A dataset produced by an ingestion collaborator may hold handles on
//! external resources (open files, remote sessions). They are attached as
//! [`DatasetResource`]s and released by [`Dataset::close`]. Datasets derived
//! by downsampling share the handles of their parent; merged datasets do not
//! take over the handles of their inputs.

mod ops;
mod spatial;
mod variable;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::DatasetError;

pub use ops::DownsampleMethod;
pub use spatial::{footprint, Footprint, SpatialDims};
pub use variable::{ArrayData, Variable};

// =============================================================================
// Resources
// =============================================================================

/// A handle on an external resource backing a dataset.
///
/// `close` may be called more than once and must tolerate it.
pub trait DatasetResource: Send + Sync {
    /// Release the resource.
    fn close(&self);
}

// =============================================================================
// Dataset
// =============================================================================

/// A labeled collection of named multi-dimensional arrays.
#[derive(Clone, Default)]
pub struct Dataset {
    coords: BTreeMap<String, Variable>,
    data_vars: BTreeMap<String, Variable>,
    attrs: BTreeMap<String, Value>,
    resources: Vec<Arc<dyn DatasetResource>>,
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("dims", &self.dims())
            .field("coords", &self.coords.keys().collect::<Vec<_>>())
            .field("data_vars", &self.data_vars.keys().collect::<Vec<_>>())
            .field("resources", &self.resources.len())
            .finish()
    }
}

impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        self.coords == other.coords
            && self.data_vars == other.data_vars
            && self.attrs == other.attrs
    }
}

impl Dataset {
    /// Create an empty dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Dataset::set_coord`].
    pub fn with_coord(
        mut self,
        name: impl Into<String>,
        var: Variable,
    ) -> Result<Self, DatasetError> {
        self.set_coord(name, var)?;
        Ok(self)
    }

    /// Builder-style [`Dataset::set_data_var`].
    pub fn with_data_var(
        mut self,
        name: impl Into<String>,
        var: Variable,
    ) -> Result<Self, DatasetError> {
        self.set_data_var(name, var)?;
        Ok(self)
    }

    /// Builder-style [`Dataset::set_attr`].
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Attach a resource released by [`Dataset::close`].
    pub fn with_resource(mut self, resource: Arc<dyn DatasetResource>) -> Self {
        self.resources.push(resource);
        self
    }

    /// Insert or replace a coordinate variable.
    pub fn set_coord(
        &mut self,
        name: impl Into<String>,
        var: Variable,
    ) -> Result<(), DatasetError> {
        let name = name.into();
        self.check_dims(&name, &var)?;
        self.coords.insert(name, var);
        Ok(())
    }

    /// Insert or replace a data variable.
    pub fn set_data_var(
        &mut self,
        name: impl Into<String>,
        var: Variable,
    ) -> Result<(), DatasetError> {
        let name = name.into();
        self.check_dims(&name, &var)?;
        self.data_vars.insert(name, var);
        Ok(())
    }

    /// Set a dataset attribute.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attrs.insert(key.into(), value.into());
    }

    /// Size of every dimension used by any variable.
    pub fn dims(&self) -> BTreeMap<String, usize> {
        let mut dims = BTreeMap::new();
        for var in self.coords.values().chain(self.data_vars.values()) {
            for (dim, size) in var.sizes() {
                dims.insert(dim.to_string(), size);
            }
        }
        dims
    }

    /// Size of one dimension.
    pub fn dim_size(&self, dim: &str) -> Option<usize> {
        self.coords
            .values()
            .chain(self.data_vars.values())
            .find_map(|v| v.axis_of(dim).map(|axis| v.shape()[axis.index()]))
    }

    /// A coordinate variable.
    pub fn coord(&self, name: &str) -> Option<&Variable> {
        self.coords.get(name)
    }

    /// A data variable.
    pub fn data_var(&self, name: &str) -> Option<&Variable> {
        self.data_vars.get(name)
    }

    /// All coordinate variables, by name.
    pub fn coords(&self) -> &BTreeMap<String, Variable> {
        &self.coords
    }

    /// All data variables, by name.
    pub fn data_vars(&self) -> &BTreeMap<String, Variable> {
        &self.data_vars
    }

    /// Names of the data variables, sorted.
    pub fn data_var_names(&self) -> Vec<&str> {
        self.data_vars.keys().map(String::as_str).collect()
    }

    /// Dataset attributes.
    pub fn attrs(&self) -> &BTreeMap<String, Value> {
        &self.attrs
    }

    /// Number of attached resources.
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Release all attached resources.
    pub fn close(&self) {
        for resource in &self.resources {
            resource.close();
        }
    }

    /// Variable union of two datasets.
    ///
    /// Coordinates present in both must have the same dimensions and values
    /// (NaN equals NaN); their attributes may differ. Data variable names must
    /// be disjoint. Attributes of `self` take precedence. The result holds no
    /// resources.
    pub fn merge(&self, other: &Dataset) -> Result<Dataset, DatasetError> {
        let mut merged = Dataset {
            coords: self.coords.clone(),
            data_vars: self.data_vars.clone(),
            attrs: self.attrs.clone(),
            resources: Vec::new(),
        };

        for (name, var) in &other.coords {
            match merged.coords.get(name) {
                Some(existing) if !existing.same_values(var) => {
                    return Err(DatasetError::CoordinateMismatch(name.clone()));
                }
                Some(_) => {}
                None => merged.set_coord(name.clone(), var.clone())?,
            }
        }

        for (name, var) in &other.data_vars {
            if merged.data_vars.contains_key(name) {
                return Err(DatasetError::VariableConflict(name.clone()));
            }
            merged.set_data_var(name.clone(), var.clone())?;
        }

        for (key, value) in &other.attrs {
            merged.attrs.entry(key.clone()).or_insert_with(|| value.clone());
        }

        Ok(merged)
    }

    /// Spatial dimensions of this dataset.
    pub fn spatial_dims(&self) -> Result<SpatialDims, DatasetError> {
        SpatialDims::detect(self)
    }

    /// Pixel size `(width, height)` along the spatial dimensions.
    pub fn spatial_size(&self) -> Result<(usize, usize), DatasetError> {
        let dims = self.spatial_dims()?;
        let sizes = self.dims();
        match (sizes.get(&dims.x), sizes.get(&dims.y)) {
            (Some(&w), Some(&h)) => Ok((w, h)),
            _ => Err(DatasetError::MissingSpatialDims),
        }
    }

    /// Reject a variable whose dimension sizes contradict the dataset.
    ///
    /// A variable being replaced does not count against its replacement.
    fn check_dims(&self, name: &str, var: &Variable) -> Result<(), DatasetError> {
        let others = self
            .coords
            .iter()
            .chain(self.data_vars.iter())
            .filter(|(n, _)| n.as_str() != name);
        let mut known = BTreeMap::new();
        for (_, v) in others {
            for (dim, size) in v.sizes() {
                known.insert(dim, size);
            }
        }
        for (dim, size) in var.sizes() {
            if let Some(&existing) = known.get(dim) {
                if existing != size {
                    return Err(DatasetError::DimensionConflict {
                        dim: dim.to_string(),
                        name: name.to_string(),
                        existing,
                        actual: size,
                    });
                }
            }
        }
        Ok(())
    }

    /// Drop the resource handles also held by one of `owners`.
    pub(crate) fn forget_resources_of(&mut self, owners: &[Arc<Dataset>]) {
        self.resources.retain(|held| {
            !owners
                .iter()
                .flat_map(|owner| owner.resources.iter())
                .any(|owned| Arc::ptr_eq(owned, held))
        });
    }
}

// =============================================================================
// Tests
// =============================================================================
