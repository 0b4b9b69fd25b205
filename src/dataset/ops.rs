//! Spatial operations producing new datasets.

use ndarray::{concatenate, ArrayD, Axis, Dimension, IxDyn, Slice};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DatasetError;

use super::spatial::SpatialDims;
use super::{Dataset, Variable};

/// How cells are aggregated when a dataset is downsampled.
///
/// Both methods produce `ceil(n / factor)` cells along each spatial axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownsampleMethod {
    /// First cell of every block; keeps exact values and shares storage
    #[default]
    Nearest,
    /// NaN-aware mean of every block; partial edge blocks average the
    /// cells present
    Mean,
}

impl std::str::FromStr for DownsampleMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(DownsampleMethod::Nearest),
            "mean" => Ok(DownsampleMethod::Mean),
            other => Err(format!("unknown downsample method '{other}'")),
        }
    }
}

impl Dataset {
    /// Reduce the spatial resolution by an integer factor.
    ///
    /// Variables not spanning a spatial dimension are kept as they are.
    /// Coordinates that span a spatial dimension together with an auxiliary
    /// dimension no data variable uses (cell bounds such as `lat_bnds`) are
    /// dropped, since they would no longer describe the coarser cells.
    /// Attributes and resources are carried over.
    pub fn downsample(
        &self,
        factor: usize,
        method: DownsampleMethod,
    ) -> Result<Dataset, DatasetError> {
        if factor == 0 {
            return Err(DatasetError::InvalidFactor(factor));
        }
        let spatial = self.spatial_dims()?;

        let data_dims: Vec<&str> = self
            .data_vars
            .values()
            .flat_map(|v| v.dims().iter().map(String::as_str))
            .collect();

        let mut out = Dataset {
            attrs: self.attrs.clone(),
            resources: self.resources.clone(),
            ..Dataset::default()
        };

        for (name, var) in &self.coords {
            let spans_spatial = var.dims().iter().any(|d| spatial.contains(d));
            let auxiliary = var
                .dims()
                .iter()
                .any(|d| !spatial.contains(d) && !data_dims.contains(&d.as_str()));
            if spans_spatial && auxiliary {
                debug!(coord = %name, "dropping boundary coordinate on downsampling");
                continue;
            }
            out.coords
                .insert(name.clone(), downsample_variable(var, &spatial, factor, method));
        }

        for (name, var) in &self.data_vars {
            out.data_vars
                .insert(name.clone(), downsample_variable(var, &spatial, factor, method));
        }

        Ok(out)
    }

    /// Roll a `[0, 360)` longitude axis onto `[-180, 180)`.
    ///
    /// Every variable spanning the longitude dimension is reordered so that
    /// longitudes increase from the western hemisphere; longitude values and
    /// longitude bounds of the cells at or beyond 180 are shifted by -360. Datasets
    /// whose longitudes do not exceed 180 are returned unchanged.
    pub fn normalize_longitude(&self) -> Result<Dataset, DatasetError> {
        let spatial = self.spatial_dims()?;
        let lon_name = spatial.x.clone();
        let lon = self
            .coord(&lon_name)
            .and_then(|c| c.values_1d())
            .ok_or_else(|| DatasetError::MissingCoordinate(lon_name.clone()))?;

        let Some(split) = lon.iter().position(|&v| v >= 180.0) else {
            return Ok(self.clone());
        };
        let shifted_rows = lon.len() - split;
        let bnds_name = format!("{lon_name}_bnds");
        if split == 0 {
            // entirely in the upper half of the 0..360 range
            let mut out = self.clone();
            shift_coord(&mut out, &lon_name, &lon_name, shifted_rows);
            shift_coord(&mut out, &bnds_name, &lon_name, shifted_rows);
            return Ok(out);
        }

        let mut out = Dataset {
            attrs: self.attrs.clone(),
            resources: self.resources.clone(),
            ..Dataset::default()
        };
        for (name, var) in &self.coords {
            out.coords.insert(name.clone(), roll(var, &lon_name, split)?);
        }
        for (name, var) in &self.data_vars {
            out.data_vars.insert(name.clone(), roll(var, &lon_name, split)?);
        }
        shift_coord(&mut out, &lon_name, &lon_name, shifted_rows);
        shift_coord(&mut out, &bnds_name, &lon_name, shifted_rows);
        Ok(out)
    }
}

fn downsample_variable(
    var: &Variable,
    spatial: &SpatialDims,
    factor: usize,
    method: DownsampleMethod,
) -> Variable {
    let axes: Vec<Axis> = [&spatial.y, &spatial.x]
        .iter()
        .filter_map(|d| var.axis_of(d))
        .collect();
    if axes.is_empty() || factor == 1 {
        return var.clone();
    }

    match method {
        DownsampleMethod::Nearest => {
            let mut data = var.data().clone();
            for axis in axes {
                data.slice_axis_inplace(axis, Slice::new(0, None, factor as isize));
            }
            var.with_data(data)
        }
        DownsampleMethod::Mean => var.with_data(block_mean(var, &axes, factor).into_shared()),
    }
}

fn block_mean(var: &Variable, axes: &[Axis], factor: usize) -> ArrayD<f64> {
    let input = var.data();
    let in_shape = input.shape().to_vec();
    let mut out_shape = in_shape.clone();
    for axis in axes {
        out_shape[axis.index()] = in_shape[axis.index()].div_ceil(factor);
    }

    ArrayD::from_shape_fn(IxDyn(&out_shape), |out_idx| {
        let mut idx: Vec<usize> = out_idx.slice().to_vec();
        let mut sum = 0.0;
        let mut count = 0usize;
        visit_block(input, axes, factor, &in_shape, &mut idx, 0, &mut sum, &mut count);
        if count == 0 {
            f64::NAN
        } else {
            sum / count as f64
        }
    })
}

#[allow(clippy::too_many_arguments)]
fn visit_block(
    input: &super::ArrayData,
    axes: &[Axis],
    factor: usize,
    in_shape: &[usize],
    idx: &mut [usize],
    depth: usize,
    sum: &mut f64,
    count: &mut usize,
) {
    if depth == axes.len() {
        let v = input[IxDyn(&*idx)];
        if !v.is_nan() {
            *sum += v;
            *count += 1;
        }
        return;
    }

    let a = axes[depth].index();
    let out_pos = idx[a];
    let start = out_pos * factor;
    let end = (start + factor).min(in_shape[a]);
    for i in start..end {
        idx[a] = i;
        visit_block(input, axes, factor, in_shape, idx, depth + 1, sum, count);
    }
    idx[a] = out_pos;
}

fn roll(var: &Variable, dim: &str, split: usize) -> Result<Variable, DatasetError> {
    let Some(axis) = var.axis_of(dim) else {
        return Ok(var.clone());
    };
    let data = var.data();
    let east = data.slice_axis(axis, Slice::from(split..));
    let west = data.slice_axis(axis, Slice::from(..split));
    let rolled =
        concatenate(axis, &[east, west]).map_err(|e| DatasetError::Shape(e.to_string()))?;
    Ok(var.with_data(rolled.into_shared()))
}

/// Subtract 360 from the first `rows` cells along the longitude dimension.
fn shift_coord(ds: &mut Dataset, name: &str, lon_dim: &str, rows: usize) {
    let Some(var) = ds.coords.get(name) else {
        return;
    };
    let Some(axis) = var.axis_of(lon_dim) else {
        return;
    };
    let mut data = var.data().to_owned();
    for mut lane in data.axis_iter_mut(axis).take(rows) {
        lane.mapv_inplace(|v| v - 360.0);
    }
    let shifted = var.with_data(data.into_shared());
    ds.coords.insert(name.to_string(), shifted);
}
