#![warn(missing_docs)]

//! Compressed-row sparse operators for the corvox mapping kernel.
//!
//! A hemisphere operator is a (vertices × voxels) matrix with a handful of
//! nonzero voxel weights per vertex row. Assembly happens row by row from
//! builder tap lists; application is a plain CSR product, contracting over
//! voxels going forward and over vertices going backward.

use serde::{Deserialize, Serialize};

/// Sparse matrix in compressed-row form.
///
/// Row `i`'s entries live in `data[indptr[i]..indptr[i + 1]]`, with the
/// matching column indices in `indices`. Columns within a row are sorted
/// and unique; explicit zero values are allowed and preserved.
///
/// Deserialization goes through [`CsrMatrix::from_parts`], so a decoded
/// matrix is always structurally consistent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
    indices: Vec<u32>,
    indptr: Vec<usize>,
}

#[derive(Deserialize)]
#[serde(rename = "CsrMatrix")]
struct RawParts {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
    indices: Vec<u32>,
    indptr: Vec<usize>,
}

impl<'de> Deserialize<'de> for CsrMatrix {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawParts::deserialize(deserializer)?;
        CsrMatrix::from_parts(raw.rows, raw.cols, raw.data, raw.indices, raw.indptr)
            .ok_or_else(|| serde::de::Error::custom("inconsistent compressed-row arrays"))
    }
}

impl CsrMatrix {
    /// An all-zero matrix with the given shape.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: Vec::new(),
            indices: Vec::new(),
            indptr: vec![0; rows + 1],
        }
    }

    /// Assemble a matrix from per-row (column, weight) tap lists.
    ///
    /// Taps may repeat a column within a row; repeated taps are summed,
    /// never overwritten, so weight mass clipped onto the same voxel is
    /// preserved.
    pub fn from_rows(cols: usize, row_taps: Vec<Vec<(usize, f64)>>) -> Self {
        let rows = row_taps.len();
        let mut data = Vec::new();
        let mut indices = Vec::new();
        let mut indptr = Vec::with_capacity(rows + 1);
        indptr.push(0);

        for mut taps in row_taps {
            taps.sort_unstable_by_key(|&(col, _)| col);
            let row_start = indices.len();
            for (col, weight) in taps {
                debug_assert!(col < cols, "column {col} out of range for {cols} columns");
                if indices.len() > row_start && *indices.last().unwrap() as usize == col {
                    *data.last_mut().unwrap() += weight;
                } else {
                    indices.push(col as u32);
                    data.push(weight);
                }
            }
            indptr.push(indices.len());
        }

        Self {
            rows,
            cols,
            data,
            indices,
            indptr,
        }
    }

    /// Rebuild a matrix from raw compressed-row parts.
    ///
    /// Returns `None` if the arrays are structurally inconsistent. Cached
    /// artifacts decode through this check.
    pub fn from_parts(
        rows: usize,
        cols: usize,
        data: Vec<f64>,
        indices: Vec<u32>,
        indptr: Vec<usize>,
    ) -> Option<Self> {
        if indptr.len() != rows + 1
            || data.len() != indices.len()
            || indptr.first() != Some(&0)
            || indptr.last() != Some(&data.len())
            || indptr.windows(2).any(|w| w[0] > w[1])
            || indices.iter().any(|&c| c as usize >= cols)
        {
            return None;
        }
        Some(Self {
            rows,
            cols,
            data,
            indices,
            indptr,
        })
    }

    /// Number of rows (vertices).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (voxels).
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of stored entries, explicit zeros included.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Stored values.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Stored column indices.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Row pointer array, length `rows + 1`.
    pub fn indptr(&self) -> &[usize] {
        &self.indptr
    }

    /// Column indices and values of one row.
    pub fn row(&self, i: usize) -> (&[u32], &[f64]) {
        let span = self.indptr[i]..self.indptr[i + 1];
        (&self.indices[span.clone()], &self.data[span])
    }

    /// Sum of one row's stored values.
    pub fn row_sum(&self, i: usize) -> f64 {
        self.data[self.indptr[i]..self.indptr[i + 1]].iter().sum()
    }

    /// Matrix · dense vector, contracting over columns.
    ///
    /// `x` must have one element per column; the result has one per row.
    pub fn mul_dense(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(x.len(), self.cols, "dense operand length != column count");
        let mut out = vec![0.0; self.rows];
        for i in 0..self.rows {
            let mut acc = 0.0;
            for k in self.indptr[i]..self.indptr[i + 1] {
                acc += self.data[k] * x[self.indices[k] as usize];
            }
            out[i] = acc;
        }
        out
    }

    /// Row vector · matrix, contracting over rows.
    ///
    /// `v` must have one element per row; the result has one per column.
    pub fn vecmat(&self, v: &[f64]) -> Vec<f64> {
        assert_eq!(v.len(), self.rows, "row vector length != row count");
        let mut out = vec![0.0; self.cols];
        for i in 0..self.rows {
            let vi = v[i];
            if vi == 0.0 {
                continue;
            }
            for k in self.indptr[i]..self.indptr[i + 1] {
                out[self.indices[k] as usize] += vi * self.data[k];
            }
        }
        out
    }

    /// Which columns carry at least one nonzero value.
    ///
    /// Explicitly stored zeros do not mark a column as occupied.
    pub fn col_occupancy(&self) -> Vec<bool> {
        let mut occupied = vec![false; self.cols];
        for (k, &col) in self.indices.iter().enumerate() {
            if self.data[k] != 0.0 {
                occupied[col as usize] = true;
            }
        }
        occupied
    }
}
