//! Mapper orchestration: cache lookup, build, and operator application.

use std::borrow::Cow;
use std::fmt;

use tracing::{debug, info};

use corvox_geom::{GeometrySource, HalfSpaceClip, HemiPair, MeshBoolean};
use corvox_math::Grid;
use corvox_sparse::CsrMatrix;
use corvox_store::OperatorStore;

use crate::builders;
use crate::error::{MapperError, Result};
use crate::series::{Series, VertexInput, Volume};
use crate::Strategy;

/// Maps functional volume data onto surface vertices and back.
///
/// A mapper is constructed once per (subject, transform, strategy,
/// parameters) and is immutable afterwards; `apply` and `apply_inverse`
/// take `&self` and may run concurrently from multiple threads.
pub struct Mapper {
    subject: String,
    transform: String,
    strategy: Strategy,
    grid: Grid,
    operators: HemiPair<CsrMatrix>,
    nverts: usize,
    hemimasks: HemiPair<Vec<bool>>,
    mask: Vec<bool>,
    active: usize,
    idxmap: Option<HemiPair<Vec<u32>>>,
}

impl Mapper {
    /// Construct a mapper, loading cached operators or building them.
    ///
    /// The polyhedral strategy uses the bundled [`HalfSpaceClip`] mesh
    /// capability; use [`Mapper::with_mesh_boolean`] to bind another.
    pub fn new(
        store: &OperatorStore,
        source: &dyn GeometrySource,
        subject: &str,
        transform: &str,
        strategy: Strategy,
        recache: bool,
    ) -> Result<Self> {
        Self::with_mesh_boolean(
            store,
            source,
            &HalfSpaceClip,
            subject,
            transform,
            strategy,
            recache,
        )
    }

    /// Construct a mapper with an explicit mesh-boolean capability.
    ///
    /// Cached operators are used unless `recache` is set, the artifact is
    /// missing or older than the transform definition, or loading fails
    /// for any reason; every such case rebuilds and republishes the
    /// artifact atomically.
    pub fn with_mesh_boolean(
        store: &OperatorStore,
        source: &dyn GeometrySource,
        csg: &dyn MeshBoolean,
        subject: &str,
        transform: &str,
        strategy: Strategy,
        recache: bool,
    ) -> Result<Self> {
        if !strategy.is_supported() {
            return Err(MapperError::UnsupportedStrategy(strategy.tag().into()));
        }

        let info = source.transform(subject, transform)?;
        let key = strategy.cache_key(subject, transform);

        let cached = if recache {
            None
        } else {
            match store.load(&key, info.modified) {
                Ok(pair)
                    if pair.left.cols() == info.grid.len()
                        && pair.right.cols() == info.grid.len() =>
                {
                    Some(pair)
                }
                Ok(_) => {
                    debug!("cached operators do not match the current grid, rebuilding");
                    None
                }
                Err(e) => {
                    debug!(error = %e, "cache miss, rebuilding operators");
                    None
                }
            }
        };

        let operators = match cached {
            Some(pair) => pair,
            None => {
                info!(
                    subject,
                    transform,
                    strategy = strategy.tag(),
                    "building hemisphere operators"
                );
                let pair = builders::build_pair(source, csg, subject, &strategy, &info)?;
                store.save(&key, &pair)?;
                pair
            }
        };

        let hemimasks = operators.as_ref().map(|m| m.col_occupancy());
        let mask: Vec<bool> = hemimasks
            .left
            .iter()
            .zip(&hemimasks.right)
            .map(|(l, r)| *l || *r)
            .collect();
        let active = mask.iter().filter(|&&m| m).count();
        let nverts = operators.left.rows() + operators.right.rows();

        Ok(Self {
            subject: subject.into(),
            transform: transform.into(),
            strategy,
            grid: info.grid,
            operators,
            nverts,
            hemimasks,
            mask,
            active,
            idxmap: None,
        })
    }

    /// Attach an output-vertex permutation applied to all mapped results.
    pub fn with_idxmap(mut self, idxmap: HemiPair<Vec<u32>>) -> Result<Self> {
        let valid = idxmap
            .left
            .iter()
            .all(|&i| (i as usize) < self.operators.left.rows())
            && idxmap
                .right
                .iter()
                .all(|&i| (i as usize) < self.operators.right.rows());
        if !valid {
            return Err(MapperError::InputShape(
                "idxmap index exceeds hemisphere vertex count".into(),
            ));
        }
        self.idxmap = Some(idxmap);
        Ok(self)
    }

    /// Subject identifier.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Transform name.
    pub fn transform_name(&self) -> &str {
        &self.transform
    }

    /// Strategy this mapper was built with.
    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Voxel grid of the functional volume.
    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// Combined vertex count across both hemispheres.
    pub fn nverts(&self) -> usize {
        self.nverts
    }

    /// The hemisphere operators.
    pub fn operators(&self) -> &HemiPair<CsrMatrix> {
        &self.operators
    }

    /// Voxels any vertex of either hemisphere draws from, in grid order.
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// The same mask per hemisphere, unreduced.
    pub fn hemimasks(&self) -> &HemiPair<Vec<bool>> {
        &self.hemimasks
    }

    /// Number of voxels set in [`Mapper::mask`].
    pub fn active_voxels(&self) -> usize {
        self.active
    }

    /// Map volume data onto both hemispheres' vertices.
    ///
    /// Accepts three block lengths: data already per-vertex (equal to
    /// `nverts`) passes through as a split with no multiplication; a full
    /// volume (grid length) multiplies through each operator; pre-masked
    /// data (active-voxel count) is scattered into a full volume through
    /// the combined mask first. Anything else is an input-shape error.
    pub fn apply(&self, data: &Series) -> Result<(Series, Series)> {
        let block = data.block_len();

        if block == self.nverts {
            let llen = self.operators.left.rows();
            let mut left = Vec::with_capacity(llen * data.samples());
            let mut right = Vec::with_capacity((self.nverts - llen) * data.samples());
            for s in 0..data.samples() {
                let sample = data.sample(s);
                left.extend_from_slice(&sample[..llen]);
                right.extend_from_slice(&sample[llen..]);
            }
            return Ok(self.permuted(
                Series::from_raw(left, data.samples()),
                Series::from_raw(right, data.samples()),
            ));
        }

        let mut left = Vec::with_capacity(self.operators.left.rows() * data.samples());
        let mut right = Vec::with_capacity(self.operators.right.rows() * data.samples());
        for s in 0..data.samples() {
            let sample = data.sample(s);
            let volume: Cow<'_, [f64]> = if block == self.grid.len() {
                Cow::Borrowed(sample)
            } else if block == self.active {
                let mut full = vec![0.0; self.grid.len()];
                let mut values = sample.iter();
                for (i, &m) in self.mask.iter().enumerate() {
                    if m {
                        full[i] = *values.next().unwrap();
                    }
                }
                Cow::Owned(full)
            } else {
                return Err(MapperError::InputShape(format!(
                    "block of {block} matches neither {} vertices, {} voxels, \
                     nor {} active voxels",
                    self.nverts,
                    self.grid.len(),
                    self.active
                )));
            };
            left.extend(self.operators.left.mul_dense(&volume));
            right.extend(self.operators.right.mul_dense(&volume));
        }

        Ok(self.permuted(
            Series::from_raw(left, data.samples()),
            Series::from_raw(right, data.samples()),
        ))
    }

    /// Project vertex data back into volume space, one volume per
    /// hemisphere. The caller composes the two as needed.
    pub fn apply_inverse(&self, input: VertexInput<'_>) -> Result<(Volume, Volume)> {
        let llen = self.operators.left.rows();
        let rlen = self.operators.right.rows();

        let (left, right): (Vec<f64>, Vec<f64>) = match input {
            VertexInput::Values(values) => {
                if values.len() != self.nverts {
                    return Err(MapperError::InputShape(format!(
                        "expected {} vertex values, got {}",
                        self.nverts,
                        values.len()
                    )));
                }
                (values[..llen].to_vec(), values[llen..].to_vec())
            }
            VertexInput::ValuePair(l, r) => {
                if l.len() != llen || r.len() != rlen {
                    return Err(MapperError::InputShape(format!(
                        "expected hemisphere lengths ({llen}, {rlen}), got ({}, {})",
                        l.len(),
                        r.len()
                    )));
                }
                (l.to_vec(), r.to_vec())
            }
            VertexInput::Indices(indices) => {
                let mut l = vec![0.0; llen];
                let mut r = vec![0.0; rlen];
                for &i in indices {
                    if i >= self.nverts {
                        return Err(MapperError::InputShape(format!(
                            "vertex index {i} out of range for {} vertices",
                            self.nverts
                        )));
                    }
                    if i < llen {
                        l[i] = 1.0;
                    } else {
                        r[i - llen] = 1.0;
                    }
                }
                (l, r)
            }
            VertexInput::IndexPair(li, ri) => {
                let mut l = vec![0.0; llen];
                let mut r = vec![0.0; rlen];
                for &i in li {
                    if i >= llen {
                        return Err(MapperError::InputShape(format!(
                            "left vertex index {i} out of range for {llen} vertices"
                        )));
                    }
                    l[i] = 1.0;
                }
                for &i in ri {
                    if i >= rlen {
                        return Err(MapperError::InputShape(format!(
                            "right vertex index {i} out of range for {rlen} vertices"
                        )));
                    }
                    r[i] = 1.0;
                }
                (l, r)
            }
        };

        Ok((
            Volume {
                grid: self.grid,
                values: self.operators.left.vecmat(&left),
            },
            Volume {
                grid: self.grid,
                values: self.operators.right.vecmat(&right),
            },
        ))
    }

    fn permuted(&self, left: Series, right: Series) -> (Series, Series) {
        match &self.idxmap {
            None => (left, right),
            Some(map) => (
                permute_series(left, &map.left),
                permute_series(right, &map.right),
            ),
        }
    }
}

fn permute_series(series: Series, map: &[u32]) -> Series {
    let samples = series.samples();
    let mut out = Vec::with_capacity(map.len() * samples);
    for s in 0..samples {
        let sample = series.sample(s);
        out.extend(map.iter().map(|&i| sample[i as usize]));
    }
    Series::from_raw(out, samples)
}

impl fmt::Display for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} mapper for ({}, {}) with {} vertices>",
            self.strategy.display_name(),
            self.subject,
            self.transform,
            self.nverts
        )
    }
}
