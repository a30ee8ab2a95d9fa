#![warn(missing_docs)]

//! Cortical surface geometry model and mesh capabilities for corvox.
//!
//! Defines the data the operator builders consume (per-hemisphere
//! triangle meshes in several representations, the voxel transform info)
//! and the two collaborator contracts the rest of the system is built
//! against:
//!
//! 1. [`GeometrySource`]: retrieval of subject surfaces and transforms
//! 2. [`MeshBoolean`]: closed-mesh volume and mesh/voxel-cube intersection
//!
//! A reference [`MeshBoolean`] binding backed by half-space clipping is
//! included; any mature CSG library can be substituted behind the trait.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use corvox_math::{Affine, Grid, Point3, Vec3};

mod clip;
mod column;

pub use clip::HalfSpaceClip;
pub use column::{column_polyhedron, Incidence};

/// Errors from geometry retrieval and mesh capabilities.
#[derive(Error, Debug)]
pub enum GeometryError {
    /// A requested surface representation is not available.
    #[error("surface unavailable: {0}")]
    SurfaceUnavailable(String),

    /// A requested transform is not available.
    #[error("transform unavailable: {0}")]
    TransformUnavailable(String),

    /// A mesh is unusable for the requested operation.
    #[error("degenerate mesh: {0}")]
    DegenerateMesh(String),

    /// A mesh-boolean capability failed on a particular element.
    #[error("mesh capability failed: {0}")]
    Capability(String),

    /// Underlying I/O failure in a geometry source.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for geometry operations.
pub type Result<T> = std::result::Result<T, GeometryError>;

/// Brain hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hemi {
    /// Left hemisphere.
    Left,
    /// Right hemisphere.
    Right,
}

/// One value per hemisphere, left first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HemiPair<T> {
    /// Left-hemisphere value.
    pub left: T,
    /// Right-hemisphere value.
    pub right: T,
}

impl<T> HemiPair<T> {
    /// Pair two hemisphere values.
    pub fn new(left: T, right: T) -> Self {
        Self { left, right }
    }

    /// Apply `f` to both hemispheres.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> HemiPair<U> {
        HemiPair {
            left: f(self.left),
            right: f(self.right),
        }
    }

    /// Borrow both hemispheres.
    pub fn as_ref(&self) -> HemiPair<&T> {
        HemiPair {
            left: &self.left,
            right: &self.right,
        }
    }

    /// Select one hemisphere.
    pub fn get(&self, hemi: Hemi) -> &T {
        match hemi {
            Hemi::Left => &self.left,
            Hemi::Right => &self.right,
        }
    }
}

/// Surface mesh representation of a hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    /// Mid-cortical fiducial surface (vertex sampling positions).
    Fiducial,
    /// Pial (outer) surface.
    Pial,
    /// White-matter (inner) surface.
    WhiteMatter,
    /// Flattened surface; its triangulation defines the referenced vertices.
    Flat,
}

/// A triangle mesh: point list plus index triples.
///
/// All representations of one hemisphere share vertex order and count, so
/// a face list from one representation indexes the point list of another.
#[derive(Debug, Clone, PartialEq)]
pub struct TriMesh {
    /// Vertex positions.
    pub points: Vec<Point3>,
    /// Triangle vertex indices.
    pub faces: Vec<[u32; 3]>,
    /// Per-vertex normals; empty when the source has none.
    pub normals: Vec<Vec3>,
}

impl TriMesh {
    /// Create a mesh without normals.
    pub fn new(points: Vec<Point3>, faces: Vec<[u32; 3]>) -> Self {
        Self {
            points,
            faces,
            normals: Vec::new(),
        }
    }

    /// Number of vertices.
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Number of triangles.
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Whether the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Mesh with every point mapped through an affine transform.
    ///
    /// Normals are dropped; they are not meaningful under a general affine.
    pub fn transformed(&self, affine: &Affine) -> TriMesh {
        TriMesh::new(affine.apply_all(&self.points), self.faces.clone())
    }

    /// Axis-aligned bounds of the point set, or `None` if empty.
    pub fn aabb(&self) -> Option<(Point3, Point3)> {
        let first = *self.points.first()?;
        let mut min = first;
        let mut max = first;
        for p in &self.points[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }
        Some((min, max))
    }

    /// Whether every directed edge is matched by its reverse.
    ///
    /// True exactly when the triangle soup bounds a watertight volume.
    pub fn is_closed(&self) -> bool {
        use std::collections::HashMap;
        let mut balance: HashMap<(u32, u32), i64> = HashMap::new();
        for face in &self.faces {
            for (a, b) in [
                (face[0], face[1]),
                (face[1], face[2]),
                (face[2], face[0]),
            ] {
                if a <= b {
                    *balance.entry((a, b)).or_default() += 1;
                } else {
                    *balance.entry((b, a)).or_default() -= 1;
                }
            }
        }
        balance.values().all(|&count| count == 0)
    }
}

/// Voxel transform resolved for one (subject, transform) pair.
#[derive(Debug, Clone)]
pub struct TransformInfo {
    /// Subject space → continuous voxel coordinates.
    pub affine: Affine,
    /// Voxel dimensions of the associated functional volume.
    pub grid: Grid,
    /// Modification time of the transform definition; operators cached
    /// before this instant are stale.
    pub modified: SystemTime,
}

/// Retrieval of subject geometry and voxel transforms.
///
/// Implementations wrap whatever file store or database holds the subject
/// data; the mapping kernel only sees this trait.
pub trait GeometrySource {
    /// Both hemispheres of one surface representation.
    ///
    /// Vertex order and count must agree across representations of the
    /// same subject.
    fn surface(&self, subject: &str, kind: SurfaceKind) -> Result<HemiPair<TriMesh>>;

    /// Per-hemisphere mask of vertices referenced by the flat
    /// triangulation. Vertices never drawn on the flat map are excluded
    /// from some mapping strategies.
    fn referenced(&self, subject: &str) -> Result<HemiPair<Vec<bool>>> {
        let flat = self.surface(subject, SurfaceKind::Flat)?;
        Ok(flat.map(|mesh| referenced_mask(mesh.points.len(), &mesh.faces)))
    }

    /// Resolve a named transform to voxel space for a subject.
    fn transform(&self, subject: &str, name: &str) -> Result<TransformInfo>;
}

/// Closed-mesh volume measurement and mesh/voxel-cube intersection.
///
/// The polyhedral mapping strategy is written against this contract; the
/// bundled [`HalfSpaceClip`] satisfies it for locally convex column
/// elements, and a full CSG kernel can be bound instead for arbitrary
/// geometry.
pub trait MeshBoolean: Sync {
    /// Volume enclosed by a closed triangle mesh.
    fn volume(&self, mesh: &TriMesh) -> Result<f64>;

    /// Intersection of a closed mesh with the unit cube centered at
    /// `center`, as a closed mesh (possibly empty).
    fn intersect_unit_cube(&self, mesh: &TriMesh, center: Point3) -> Result<TriMesh>;
}

/// Mark the vertices that appear in a face list.
pub fn referenced_mask(num_points: usize, faces: &[[u32; 3]]) -> Vec<bool> {
    let mut mask = vec![false; num_points];
    for face in faces {
        for &v in face {
            mask[v as usize] = true;
        }
    }
    mask
}
