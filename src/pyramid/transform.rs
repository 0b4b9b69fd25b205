//! Level transforms for computed pyramids.
//!
//! A [`Transform`] turns the datasets of one level of every input pyramid
//! into the dataset of the same level of a computed pyramid. Transforms are
//! named by a [`TransformRef`] (a code location plus a function name) and
//! looked up in a [`TransformRegistry`] before the computed pyramid is
//! constructed, so an unknown name is a configuration error and never a
//! per-level failure.

use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use ndarray::{stack, ArrayD, ArrayViewD, Axis, Zip};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dataset::{Dataset, Variable};
use crate::error::PyramidError;

/// Extra named parameters passed through to a transform unmodified.
pub type Parameters = BTreeMap<String, Value>;

/// Error reported by a transform.
pub type TransformFailure = Box<dyn Error + Send + Sync>;

/// Location under which the stock transforms are registered.
pub const BUILTIN_LOCATION: &str = "builtin";

/// Function name of [`aggregate_time`].
pub const AGGREGATE_TIME: &str = "aggregate_time";

// =============================================================================
// Transform
// =============================================================================

/// Computes one level of a pyramid from the same level of its inputs.
///
/// `inputs` are ordered like the input identifiers given to the computed
/// pyramid. The result must keep the horizontal dimension sizes of the
/// inputs; other dimensions may change.
pub trait Transform: Send + Sync {
    fn apply(
        &self,
        inputs: &[Arc<Dataset>],
        level: usize,
        params: &Parameters,
    ) -> Result<Dataset, TransformFailure>;
}

impl<F> Transform for F
where
    F: Fn(&[Arc<Dataset>], usize, &Parameters) -> Result<Dataset, TransformFailure> + Send + Sync,
{
    fn apply(
        &self,
        inputs: &[Arc<Dataset>],
        level: usize,
        params: &Parameters,
    ) -> Result<Dataset, TransformFailure> {
        self(inputs, level, params)
    }
}

// =============================================================================
// Transform References
// =============================================================================

/// Name of a transform: where it lives and what it is called.
///
/// The textual form is `location:function`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransformRef {
    pub location: String,
    pub function: String,
}

impl TransformRef {
    pub fn new(location: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            function: function.into(),
        }
    }

    /// Reference to a stock transform.
    pub fn builtin(function: impl Into<String>) -> Self {
        Self::new(BUILTIN_LOCATION, function)
    }
}

impl fmt::Display for TransformRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.location, self.function)
    }
}

impl FromStr for TransformRef {
    type Err = PyramidError;

    /// Parse `location:function`. The function name is taken after the last
    /// colon so that locations may contain colons themselves.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once(':') {
            Some((location, function)) if !location.is_empty() && !function.is_empty() => {
                Ok(Self::new(location, function))
            }
            _ => Err(PyramidError::UnresolvedTransform {
                location: s.to_string(),
                function: String::new(),
            }),
        }
    }
}

/// Transforms available to computed pyramids, by reference.
#[derive(Default, Clone)]
pub struct TransformRegistry {
    transforms: HashMap<TransformRef, Arc<dyn Transform>>,
}

impl TransformRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the stock transforms.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(TransformRef::builtin(AGGREGATE_TIME), Arc::new(aggregate_time));
        registry
    }

    /// Register a transform, replacing any previous one with the same reference.
    pub fn register(&mut self, reference: TransformRef, transform: Arc<dyn Transform>) {
        self.transforms.insert(reference, transform);
    }

    /// Look up a transform.
    pub fn resolve(&self, reference: &TransformRef) -> Result<Arc<dyn Transform>, PyramidError> {
        self.transforms
            .get(reference)
            .cloned()
            .ok_or_else(|| PyramidError::UnresolvedTransform {
                location: reference.location.clone(),
                function: reference.function.clone(),
            })
    }

    /// Registered references, sorted.
    pub fn references(&self) -> Vec<&TransformRef> {
        let mut refs: Vec<_> = self.transforms.keys().collect();
        refs.sort_by(|a, b| (&a.location, &a.function).cmp(&(&b.location, &b.function)));
        refs
    }
}

// =============================================================================
// Time Aggregation
// =============================================================================

/// Time dimension and coordinate name used by [`aggregate_time`].
const TIME: &str = "time";

/// Weekday offset of the first Monday after the epoch (1970-01-05).
const FIRST_MONDAY: f64 = 4.0;

/// Aggregation period of [`aggregate_time`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Period {
    Days(u32),
    /// Weeks starting on Monday
    Weeks(u32),
}

impl Period {
    fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let unit = s.chars().last()?;
        let count = &s[..s.len() - unit.len_utf8()];
        let count = if count.is_empty() {
            1
        } else {
            count.parse().ok()?
        };
        if count == 0 {
            return None;
        }
        match unit.to_ascii_uppercase() {
            'D' => Some(Period::Days(count)),
            'W' => Some(Period::Weeks(count)),
            _ => None,
        }
    }

    /// Bin index of a time given in days since 1970-01-01.
    fn bin(self, days: f64) -> i64 {
        match self {
            Period::Days(n) => (days / f64::from(n)).floor() as i64,
            Period::Weeks(n) => ((days - FIRST_MONDAY) / (7.0 * f64::from(n))).floor() as i64,
        }
    }
}

/// Average the data variables of the first input over time periods.
///
/// Parameters:
/// * `period` - bin length, a count followed by `D` (days) or `W` (weeks
///   starting on Monday), e.g. `"7D"` or `"1W"`
///
/// The `time` coordinate holds days since 1970-01-01. Each output time step
/// is labeled with the first input time of its bin. NaN steps are skipped
/// when averaging, so a bin is NaN only where all its steps are. Variables
/// without a time dimension are passed through; other coordinates along
/// `time` (such as `time_bnds`) are dropped.
pub fn aggregate_time(
    inputs: &[Arc<Dataset>],
    _level: usize,
    params: &Parameters,
) -> Result<Dataset, TransformFailure> {
    let input = inputs.first().ok_or("aggregate_time requires one input dataset")?;

    let period = params
        .get("period")
        .and_then(Value::as_str)
        .ok_or("missing string parameter 'period'")?;
    let period = Period::parse(period).ok_or_else(|| format!("invalid period '{period}'"))?;

    let time_coord = input.coord(TIME).ok_or("input has no 'time' coordinate")?;
    let times = time_coord
        .values_1d()
        .filter(|t| !t.is_empty())
        .ok_or("'time' coordinate must be one-dimensional and non-empty")?;

    let mut bins: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &t) in times.iter().enumerate() {
        bins.entry(period.bin(t)).or_default().push(i);
    }
    let groups: Vec<Vec<usize>> = bins.into_values().collect();

    let mut out = Dataset::new();
    for (key, value) in input.attrs() {
        out.set_attr(key.clone(), value.clone());
    }

    let labels: Vec<f64> = groups.iter().map(|g| times[g[0]]).collect();
    let mut time = Variable::from_vec(TIME, labels);
    for (key, value) in time_coord.attrs() {
        time = time.with_attr(key.clone(), value.clone());
    }
    out.set_coord(TIME, time)?;

    for (name, coord) in input.coords() {
        if name != TIME && !coord.has_dim(TIME) {
            out.set_coord(name.clone(), coord.clone())?;
        }
    }

    for (name, var) in input.data_vars() {
        let var = match var.axis_of(TIME) {
            Some(axis) => mean_over_groups(var, axis, &groups)?,
            None => var.clone(),
        };
        out.set_data_var(name.clone(), var)?;
    }

    Ok(out)
}

fn mean_over_groups(
    var: &Variable,
    axis: Axis,
    groups: &[Vec<usize>],
) -> Result<Variable, TransformFailure> {
    let data = var.data();
    let mut means: Vec<ArrayD<f64>> = Vec::with_capacity(groups.len());
    for group in groups {
        let shape = data.index_axis(axis, group[0]).raw_dim();
        let mut sum = ArrayD::<f64>::zeros(shape.clone());
        let mut count = ArrayD::<f64>::zeros(shape);
        for &i in group {
            Zip::from(&mut sum)
                .and(&mut count)
                .and(&data.index_axis(axis, i))
                .for_each(|s, n, &v| {
                    if !v.is_nan() {
                        *s += v;
                        *n += 1.0;
                    }
                });
        }
        // cells without any valid step stay NaN
        means.push(Zip::from(&sum).and(&count).map_collect(|&s, &n| {
            if n == 0.0 {
                f64::NAN
            } else {
                s / n
            }
        }));
    }

    let views: Vec<ArrayViewD<'_, f64>> = means.iter().map(|a| a.view()).collect();
    let stacked = stack(axis, &views)?;
    let mut out = Variable::new(var.dims().iter().cloned(), stacked)?;
    for (key, value) in var.attrs() {
        out = out.with_attr(key.clone(), value.clone());
    }
    Ok(out)
}
