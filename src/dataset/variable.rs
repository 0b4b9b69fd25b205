//! Named-dimension arrays.

use std::collections::BTreeMap;

use ndarray::{ArcArray, ArrayD, Axis, IxDyn};
use serde_json::Value;

use crate::error::DatasetError;

/// Array storage shared between datasets of different levels.
///
/// Cloning is a reference-count increment; slicing with a stride keeps the
/// storage shared.
pub type ArrayData = ArcArray<f64, IxDyn>;

/// An n-dimensional array with named dimensions and free-form attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    dims: Vec<String>,
    data: ArrayData,
    attrs: BTreeMap<String, Value>,
}

impl Variable {
    /// Create a variable from dimension names and an owned array.
    ///
    /// Fails if the number of names does not match the array rank.
    pub fn new<S: Into<String>>(
        dims: impl IntoIterator<Item = S>,
        data: ArrayD<f64>,
    ) -> Result<Self, DatasetError> {
        Self::from_shared(dims, data.into_shared())
    }

    /// Create a variable around already shared storage.
    pub fn from_shared<S: Into<String>>(
        dims: impl IntoIterator<Item = S>,
        data: ArrayData,
    ) -> Result<Self, DatasetError> {
        let dims: Vec<String> = dims.into_iter().map(Into::into).collect();
        if dims.len() != data.ndim() {
            return Err(DatasetError::RankMismatch {
                names: dims.len(),
                rank: data.ndim(),
            });
        }
        Ok(Self {
            dims,
            data,
            attrs: BTreeMap::new(),
        })
    }

    /// A zero-filled variable with the given `(dimension, size)` pairs.
    pub fn zeros(shape: &[(&str, usize)]) -> Self {
        let sizes: Vec<usize> = shape.iter().map(|(_, n)| *n).collect();
        Self {
            dims: shape.iter().map(|(d, _)| d.to_string()).collect(),
            data: ArcArray::zeros(IxDyn(&sizes)),
            attrs: BTreeMap::new(),
        }
    }

    /// A one-dimensional variable.
    pub fn from_vec(dim: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            dims: vec![dim.into()],
            data: ArcArray::from_vec(values).into_dyn(),
            attrs: BTreeMap::new(),
        }
    }

    /// Attach an attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Dimension names, outermost first.
    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    /// Array shape, aligned with [`Variable::dims`].
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// `(dimension, size)` pairs.
    pub fn sizes(&self) -> impl Iterator<Item = (&str, usize)> {
        self.dims
            .iter()
            .map(String::as_str)
            .zip(self.data.shape().iter().copied())
    }

    /// Position of a dimension, if the variable has it.
    pub fn axis_of(&self, dim: &str) -> Option<Axis> {
        self.dims.iter().position(|d| d == dim).map(Axis)
    }

    /// Whether the variable spans a dimension.
    pub fn has_dim(&self, dim: &str) -> bool {
        self.dims.iter().any(|d| d == dim)
    }

    /// The array.
    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Attributes.
    pub fn attrs(&self) -> &BTreeMap<String, Value> {
        &self.attrs
    }

    /// Whether both variables use the same storage with the same layout.
    pub fn shares_data(&self, other: &Variable) -> bool {
        self.data.as_ptr() == other.data.as_ptr() && self.data.strides() == other.data.strides()
    }

    /// Whether both variables have the same dimensions and values.
    ///
    /// Attributes are ignored and NaN equals NaN.
    pub fn same_values(&self, other: &Variable) -> bool {
        self.dims == other.dims
            && self.data.shape() == other.data.shape()
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| a == b || (a.is_nan() && b.is_nan()))
    }

    pub(crate) fn with_data(&self, data: ArrayData) -> Self {
        Self {
            dims: self.dims.clone(),
            data,
            attrs: self.attrs.clone(),
        }
    }

    /// Values of a one-dimensional variable.
    pub(crate) fn values_1d(&self) -> Option<Vec<f64>> {
        (self.data.ndim() == 1).then(|| self.data.iter().copied().collect())
    }
}
