//! Cortical-column volume elements.
//!
//! For one surface vertex, the column is the closed triangulated solid
//! bounded above by the pial copies of the triangles incident to that
//! vertex, below by the white-matter copies (reversed), and walled along
//! every boundary edge of the incident patch. Walling the full patch
//! boundary closes the element for interior and mesh-boundary vertices
//! alike.

use std::collections::{HashMap, HashSet};

use corvox_math::Point3;

use crate::TriMesh;

/// Vertex → incident-face lookup, built once per hemisphere.
#[derive(Debug, Clone)]
pub struct Incidence {
    by_vertex: Vec<Vec<u32>>,
}

impl Incidence {
    /// Index the faces of a mesh by the vertices they touch.
    pub fn new(num_points: usize, faces: &[[u32; 3]]) -> Self {
        let mut by_vertex = vec![Vec::new(); num_points];
        for (fidx, face) in faces.iter().enumerate() {
            for &v in face {
                by_vertex[v as usize].push(fidx as u32);
            }
        }
        Self { by_vertex }
    }

    /// Faces incident to one vertex.
    pub fn faces_of(&self, vertex: usize) -> &[u32] {
        &self.by_vertex[vertex]
    }
}

/// Build the closed cortical-column polyhedron for one vertex.
///
/// `pial` and `wm` are the pial and white-matter point sets sharing the
/// topology in `faces`. Returns `None` when the vertex has no incident
/// faces (it then contributes an all-zero operator row).
pub fn column_polyhedron(
    vertex: usize,
    incidence: &Incidence,
    faces: &[[u32; 3]],
    pial: &[Point3],
    wm: &[Point3],
) -> Option<TriMesh> {
    let incident = incidence.faces_of(vertex);
    if incident.is_empty() {
        return None;
    }

    // Remap the patch's global vertex ids to a compact local range:
    // locals [0, n) are pial copies, [n, 2n) the matching white-matter ones.
    let mut local: HashMap<u32, u32> = HashMap::new();
    let mut used: Vec<u32> = Vec::new();
    for &fidx in incident {
        for &v in &faces[fidx as usize] {
            local.entry(v).or_insert_with(|| {
                used.push(v);
                used.len() as u32 - 1
            });
        }
    }
    let n = used.len() as u32;

    let mut points = Vec::with_capacity(2 * used.len());
    points.extend(used.iter().map(|&v| pial[v as usize]));
    points.extend(used.iter().map(|&v| wm[v as usize]));

    let mut tris: Vec<[u32; 3]> = Vec::with_capacity(incident.len() * 2);
    let mut directed: HashSet<(u32, u32)> = HashSet::new();
    for &fidx in incident {
        let [a, b, c] = faces[fidx as usize];
        let (la, lb, lc) = (local[&a], local[&b], local[&c]);
        tris.push([la, lb, lc]);
        tris.push([lc + n, lb + n, la + n]);
        directed.insert((la, lb));
        directed.insert((lb, lc));
        directed.insert((lc, la));
    }

    // Wall every patch-boundary edge (a directed edge with no reverse).
    for &(a, b) in &directed {
        if !directed.contains(&(b, a)) {
            tris.push([b, a, a + n]);
            tris.push([b, a + n, b + n]);
        }
    }

    Some(TriMesh::new(points, tris))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unit square split into two triangles, pial copy one unit above the
    /// white-matter copy.
    fn square_surfaces() -> (Vec<Point3>, Vec<Point3>, Vec<[u32; 3]>) {
        let wm = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let pial = wm
            .iter()
            .map(|p| Point3::new(p.x, p.y, p.z + 1.0))
            .collect();
        let faces = vec![[0, 1, 2], [0, 2, 3]];
        (pial, wm, faces)
    }

    #[test]
    fn test_column_is_closed() {
        let (pial, wm, faces) = square_surfaces();
        let incidence = Incidence::new(4, &faces);
        for vertex in 0..4 {
            let column = column_polyhedron(vertex, &incidence, &faces, &pial, &wm)
                .expect("every square corner touches a face");
            assert!(column.is_closed(), "open column for vertex {vertex}");
        }
    }

    #[test]
    fn test_column_of_corner_vertex_spans_full_patch() {
        let (pial, wm, faces) = square_surfaces();
        let incidence = Incidence::new(4, &faces);
        // vertex 0 touches both triangles, so its patch is the whole square
        let column = column_polyhedron(0, &incidence, &faces, &pial, &wm).unwrap();
        let (min, max) = column.aabb().unwrap();
        assert_eq!(min, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(max, Point3::new(1.0, 1.0, 1.0));
        // vertex 1 touches only the first triangle
        let column = column_polyhedron(1, &incidence, &faces, &pial, &wm).unwrap();
        assert_eq!(column.num_points(), 6);
        assert!(column.is_closed());
    }

    #[test]
    fn test_isolated_vertex_has_no_column() {
        let (pial, wm, _) = square_surfaces();
        let faces = vec![[0, 1, 2]];
        let incidence = Incidence::new(4, &faces);
        assert!(column_polyhedron(3, &incidence, &faces, &pial, &wm).is_none());
    }
}
