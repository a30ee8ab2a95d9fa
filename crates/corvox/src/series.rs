//! Dense data containers for operator application.

use corvox_math::Grid;

use crate::error::{MapperError, Result};

/// Sample-major dense data: `samples` consecutive blocks of equal length.
///
/// The block length is the trailing dimension of the data: the combined
/// vertex count for per-vertex data, the voxel count for full volumes,
/// or the active-voxel count for pre-masked volumes. A 4-D time series
/// flattens to one block per time point.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    values: Vec<f64>,
    samples: usize,
}

impl Series {
    /// Wrap values as `samples` equal blocks.
    pub fn new(values: Vec<f64>, samples: usize) -> Result<Self> {
        if samples == 0 || values.len() % samples != 0 {
            return Err(MapperError::InputShape(format!(
                "{} values cannot split into {} equal samples",
                values.len(),
                samples
            )));
        }
        Ok(Self { values, samples })
    }

    /// A single-sample series.
    pub fn from_vec(values: Vec<f64>) -> Self {
        Self { values, samples: 1 }
    }

    pub(crate) fn from_raw(values: Vec<f64>, samples: usize) -> Self {
        debug_assert!(samples > 0 && values.len() % samples == 0);
        Self { values, samples }
    }

    /// Number of samples (time points).
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Length of each sample block (the trailing dimension).
    pub fn block_len(&self) -> usize {
        self.values.len() / self.samples
    }

    /// One sample block.
    pub fn sample(&self, i: usize) -> &[f64] {
        let len = self.block_len();
        &self.values[i * len..(i + 1) * len]
    }

    /// All values, sample-major.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Consume into the underlying values.
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

/// A scalar volume laid out in grid order.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    /// Grid describing the layout of `values`.
    pub grid: Grid,
    /// Row-major (z, y, x) voxel values.
    pub values: Vec<f64>,
}

impl Volume {
    /// Value at one voxel.
    pub fn value_at(&self, z: usize, y: usize, x: usize) -> f64 {
        self.values[self.grid.index(z, y, x)]
    }
}

/// Per-vertex input accepted by backward mapping.
#[derive(Debug, Clone, Copy)]
pub enum VertexInput<'a> {
    /// Float values for every vertex, hemispheres concatenated left-first.
    Values(&'a [f64]),
    /// Float values per hemisphere.
    ValuePair(&'a [f64], &'a [f64]),
    /// Global vertex indices to mark with unit weight.
    Indices(&'a [usize]),
    /// Per-hemisphere vertex indices to mark with unit weight.
    IndexPair(&'a [usize], &'a [usize]),
}
