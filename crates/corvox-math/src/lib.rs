#![warn(missing_docs)]

//! Math types for the corvox mapping kernel.
//!
//! Thin wrappers around nalgebra providing the voxel-grid index math and
//! the subject-space to voxel-space affine that every operator builder
//! shares: points, vectors, the functional volume grid, and clamped
//! linear indexing.

use nalgebra::{Matrix4, Vector4};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = nalgebra::Vector3<f64>;

/// Integer dimensions of the functional voxel volume, in (z, y, x) order.
///
/// Axis order matches the row-major layout of the volume data: `z` is the
/// slowest-varying axis. A linear voxel index is the row-major flatten of
/// (z, y, x). Volume headers report dimensions as (x, y, z); use
/// [`Grid::from_volume_dims`] to reverse them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    /// Number of slices (z axis).
    pub depth: usize,
    /// Number of rows per slice (y axis).
    pub height: usize,
    /// Number of columns per row (x axis).
    pub width: usize,
}

impl Grid {
    /// Create a grid from (depth, height, width).
    pub fn new(depth: usize, height: usize, width: usize) -> Self {
        Self {
            depth,
            height,
            width,
        }
    }

    /// Create a grid from the first three volume-header dimensions,
    /// which are in (x, y, z) order.
    pub fn from_volume_dims(dims: [usize; 3]) -> Self {
        Self::new(dims[2], dims[1], dims[0])
    }

    /// Total number of voxels.
    pub fn len(&self) -> usize {
        self.depth * self.height * self.width
    }

    /// Whether the grid contains no voxels.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major linear index of an in-bounds voxel.
    pub fn index(&self, z: usize, y: usize, x: usize) -> usize {
        debug_assert!(z < self.depth && y < self.height && x < self.width);
        (z * self.height + y) * self.width + x
    }

    /// Linear index with each axis clamped into bounds first.
    ///
    /// Out-of-range coordinates land on the nearest boundary voxel, so
    /// kernel taps that fall off the volume edge merge into edge voxels
    /// instead of being dropped.
    pub fn clip_index(&self, z: i64, y: i64, x: i64) -> usize {
        let z = z.clamp(0, self.depth as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        self.index(z, y, x)
    }

    /// Whether an integer coordinate triple lies inside the grid.
    pub fn contains(&self, z: i64, y: i64, x: i64) -> bool {
        (0..self.depth as i64).contains(&z)
            && (0..self.height as i64).contains(&y)
            && (0..self.width as i64).contains(&x)
    }

    /// Inverse of [`Grid::index`]: recover (z, y, x) from a linear index.
    pub fn unravel(&self, index: usize) -> (usize, usize, usize) {
        debug_assert!(index < self.len());
        let x = index % self.width;
        let y = (index / self.width) % self.height;
        let z = index / (self.width * self.height);
        (z, y, x)
    }
}

/// Affine map from subject space to continuous voxel coordinates.
///
/// Voxel coordinates are in (x, y, z) point order; linearization through
/// [`Grid`] swaps to (z, y, x).
#[derive(Debug, Clone, PartialEq)]
pub struct Affine {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Affine {
    /// Wrap an existing 4x4 matrix.
    pub fn new(matrix: Matrix4<f64>) -> Self {
        Self { matrix }
    }

    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Non-uniform scale by `(sx, sy, sz)`.
    pub fn scale(sx: f64, sy: f64, sz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 0)] = sx;
        m[(1, 1)] = sy;
        m[(2, 2)] = sz;
        Self { matrix: m }
    }

    /// Compose: apply `other` first, then `self`.
    pub fn then(&self, other: &Affine) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    pub fn apply(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a slice of points.
    pub fn apply_all(&self, points: &[Point3]) -> Vec<Point3> {
        points.iter().map(|p| self.apply(p)).collect()
    }

    /// Inverse of this transform, if it exists.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_from_volume_dims_reverses() {
        let grid = Grid::from_volume_dims([64, 48, 32]);
        assert_eq!(grid.depth, 32);
        assert_eq!(grid.height, 48);
        assert_eq!(grid.width, 64);
        assert_eq!(grid.len(), 64 * 48 * 32);
    }

    #[test]
    fn test_grid_index_row_major() {
        let grid = Grid::new(10, 10, 10);
        assert_eq!(grid.index(0, 0, 0), 0);
        assert_eq!(grid.index(0, 0, 1), 1);
        assert_eq!(grid.index(0, 1, 0), 10);
        assert_eq!(grid.index(1, 0, 0), 100);
        assert_eq!(grid.index(2, 3, 4), 234);
    }

    #[test]
    fn test_grid_unravel_inverts_index() {
        let grid = Grid::new(4, 5, 6);
        for idx in [0, 1, 29, 57, 119] {
            let (z, y, x) = grid.unravel(idx);
            assert_eq!(grid.index(z, y, x), idx);
        }
    }

    #[test]
    fn test_clip_index_clamps_each_axis() {
        let grid = Grid::new(10, 10, 10);
        // fully inside: same as index
        assert_eq!(grid.clip_index(2, 3, 4), grid.index(2, 3, 4));
        // negative coordinates clamp to zero
        assert_eq!(grid.clip_index(-1, 3, 4), grid.index(0, 3, 4));
        assert_eq!(grid.clip_index(-5, -5, -5), 0);
        // overflow clamps to the far edge
        assert_eq!(grid.clip_index(10, 3, 4), grid.index(9, 3, 4));
        assert_eq!(grid.clip_index(99, 99, 99), grid.index(9, 9, 9));
    }

    #[test]
    fn test_contains() {
        let grid = Grid::new(3, 4, 5);
        assert!(grid.contains(0, 0, 0));
        assert!(grid.contains(2, 3, 4));
        assert!(!grid.contains(3, 0, 0));
        assert!(!grid.contains(0, -1, 0));
        assert!(!grid.contains(0, 0, 5));
    }

    #[test]
    fn test_affine_identity() {
        let t = Affine::identity();
        let p = Point3::new(1.0, 2.0, 3.0);
        assert!((t.apply(&p) - p).norm() < 1e-12);
    }

    #[test]
    fn test_affine_translation_and_scale() {
        let t = Affine::translation(10.0, 20.0, 30.0);
        let p = t.apply(&Point3::new(1.0, 2.0, 3.0));
        assert!((p - Point3::new(11.0, 22.0, 33.0)).norm() < 1e-12);

        let s = Affine::scale(2.0, 3.0, 4.0);
        let q = s.apply(&Point3::new(1.0, 1.0, 1.0));
        assert!((q - Point3::new(2.0, 3.0, 4.0)).norm() < 1e-12);
    }

    #[test]
    fn test_affine_then_applies_right_first() {
        let t = Affine::translation(1.0, 0.0, 0.0);
        let s = Affine::scale(2.0, 2.0, 2.0);
        // s.then(t): translate first, then scale
        let p = s.then(&t).apply(&Point3::origin());
        assert!((p.x - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_affine_inverse_roundtrip() {
        let t = Affine::translation(1.0, 2.0, 3.0).then(&Affine::scale(2.0, 2.0, 2.0));
        let inv = t.inverse().unwrap();
        let p = Point3::new(5.0, 6.0, 7.0);
        let back = inv.apply(&t.apply(&p));
        assert!((back - p).norm() < 1e-12);
    }

    #[test]
    fn test_apply_all_matches_apply() {
        let t = Affine::translation(0.5, -0.5, 1.5);
        let pts = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 2.0, 3.0)];
        let mapped = t.apply_all(&pts);
        for (orig, got) in pts.iter().zip(&mapped) {
            assert!((t.apply(orig) - got).norm() < 1e-12);
        }
    }
}
