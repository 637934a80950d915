//! Navigation-mesh instances: convex polygonal faces over shared vertices,
//! with per-edge adjacency and an optional local-to-world transform.

use caldera_math::{Aabb, point_in_polygon_with_tolerance, polygon_normal};
use glam::{Affine3A, Vec3};
use rustc_hash::FxHashMap;

/// Marks an edge with no face on its other side (a boundary edge).
pub const NO_FACE: u32 = u32::MAX;

/// Errors detected while building a navmesh instance.
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    /// A face loop had fewer than three vertices.
    #[error("face {face} has {count} vertices; at least 3 required")]
    FaceTooSmall { face: usize, count: usize },

    /// A face referenced a vertex index past the vertex array.
    #[error("face {face} references vertex {vertex} but only {count} vertices exist")]
    VertexOutOfRange { face: usize, vertex: u32, count: usize },

    /// The same directed edge appeared in two faces, which means either a
    /// non-manifold mesh or inconsistent winding.
    #[error("directed edge ({a}, {b}) appears in more than one face")]
    NonManifoldEdge { a: u32, b: u32 },
}

/// A directed face edge. `opposite_face` is [`NO_FACE`] on the mesh
/// boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    /// Start vertex index.
    pub a: u32,
    /// End vertex index.
    pub b: u32,
    /// Face this edge belongs to.
    pub face: u32,
    /// Face on the other side of this edge, or [`NO_FACE`].
    pub opposite_face: u32,
}

#[derive(Clone, Copy, Debug)]
struct Face {
    first_edge: u32,
    edge_count: u32,
}

/// One navigation mesh: convex faces wound counter-clockwise around their
/// surface normal, edges stored contiguously per face.
#[derive(Debug)]
pub struct NavMeshInstance {
    runtime_index: u32,
    local_to_world: Affine3A,
    vertices: Vec<Vec3>,
    faces: Vec<Face>,
    edges: Vec<Edge>,
}

impl NavMeshInstance {
    /// Build an instance from a vertex array and per-face vertex loops.
    /// Adjacency is derived by matching opposite directed edges.
    pub fn new(vertices: Vec<Vec3>, face_loops: &[Vec<u32>]) -> Result<Self, MeshError> {
        let vertex_count = vertices.len() as u32;
        let mut faces = Vec::with_capacity(face_loops.len());
        let mut edges = Vec::new();

        // Maps a directed edge (a, b) to its slot in `edges`.
        let mut directed: FxHashMap<(u32, u32), u32> = FxHashMap::default();

        for (face_index, of) in face_loops.iter().enumerate() {
            if of.len() < 3 {
                return Err(MeshError::FaceTooSmall {
                    face: face_index,
                    count: of.len(),
                });
            }

            let first_edge = edges.len() as u32;
            for i in 0..of.len() {
                let a = of[i];
                let b = of[(i + 1) % of.len()];
                if a >= vertex_count || b >= vertex_count {
                    return Err(MeshError::VertexOutOfRange {
                        face: face_index,
                        vertex: a.max(b),
                        count: vertices.len(),
                    });
                }
                if directed.insert((a, b), edges.len() as u32).is_some() {
                    return Err(MeshError::NonManifoldEdge { a, b });
                }
                edges.push(Edge {
                    a,
                    b,
                    face: face_index as u32,
                    opposite_face: NO_FACE,
                });
            }

            faces.push(Face {
                first_edge,
                edge_count: of.len() as u32,
            });
        }

        // Adjacency: the reverse directed edge belongs to the neighbor.
        for slot in 0..edges.len() {
            let (a, b) = (edges[slot].a, edges[slot].b);
            if let Some(&reverse_slot) = directed.get(&(b, a)) {
                let neighbor = edges[reverse_slot as usize].face;
                edges[slot].opposite_face = neighbor;
            }
        }

        log::debug!(
            "built navmesh instance: {} vertices, {} faces, {} edges",
            vertices.len(),
            faces.len(),
            edges.len()
        );

        Ok(Self {
            runtime_index: 0,
            local_to_world: Affine3A::IDENTITY,
            vertices,
            faces,
            edges,
        })
    }

    /// Runtime index assigned by the owning [`MeshCollection`] (0 until
    /// added).
    pub fn runtime_index(&self) -> u32 {
        self.runtime_index
    }

    /// The instance's local-to-world transform.
    pub fn local_to_world(&self) -> &Affine3A {
        &self.local_to_world
    }

    /// Set the instance's local-to-world transform.
    pub fn set_local_to_world(&mut self, transform: Affine3A) {
        self.local_to_world = transform;
    }

    /// Number of faces.
    pub fn face_count(&self) -> u32 {
        self.faces.len() as u32
    }

    /// Number of directed edges.
    pub fn edge_count(&self) -> u32 {
        self.edges.len() as u32
    }

    /// The directed edges of a face, in winding order.
    pub fn edges_of_face(&self, face_index: u32) -> &[Edge] {
        let face = &self.faces[face_index as usize];
        let start = face.first_edge as usize;
        &self.edges[start..start + face.edge_count as usize]
    }

    /// Global index of a face's first edge; its edges are contiguous.
    pub fn first_edge_of_face(&self, face_index: u32) -> u32 {
        self.faces[face_index as usize].first_edge
    }

    /// An edge by global index.
    pub fn edge(&self, edge_index: u32) -> &Edge {
        &self.edges[edge_index as usize]
    }

    /// True when the edge has no face on its other side.
    pub fn is_boundary_edge(&self, edge_index: u32) -> bool {
        self.edges[edge_index as usize].opposite_face == NO_FACE
    }

    /// All boundary edges as (global edge index, edge) pairs.
    pub fn boundary_edges(&self) -> impl Iterator<Item = (u32, &Edge)> {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.opposite_face == NO_FACE)
            .map(|(i, e)| (i as u32, e))
    }

    /// Faces sharing an edge with the given face.
    pub fn adjacent_faces(&self, face_index: u32) -> impl Iterator<Item = u32> {
        self.edges_of_face(face_index)
            .iter()
            .map(|e| e.opposite_face)
            .filter(|&f| f != NO_FACE)
    }

    /// A face's vertices in world space, using the instance transform.
    pub fn face_vertices(&self, face_index: u32) -> Vec<Vec3> {
        self.face_vertices_with(face_index, &self.local_to_world)
    }

    /// A face's vertices in world space, using the given transform instead
    /// of the instance's own.
    pub fn face_vertices_with(&self, face_index: u32, transform: &Affine3A) -> Vec<Vec3> {
        self.edges_of_face(face_index)
            .iter()
            .map(|e| transform.transform_point3(self.vertices[e.a as usize]))
            .collect()
    }

    /// World-space endpoints of an edge.
    pub fn edge_endpoints(&self, edge_index: u32) -> (Vec3, Vec3) {
        let edge = &self.edges[edge_index as usize];
        (
            self.local_to_world
                .transform_point3(self.vertices[edge.a as usize]),
            self.local_to_world
                .transform_point3(self.vertices[edge.b as usize]),
        )
    }

    /// World-space bounding box of a face.
    pub fn face_aabb(&self, face_index: u32) -> Aabb {
        Aabb::from_points(&self.face_vertices(face_index))
    }

    /// World-space centroid of a face.
    pub fn face_centroid(&self, face_index: u32) -> Vec3 {
        let verts = self.face_vertices(face_index);
        verts.iter().sum::<Vec3>() / verts.len() as f32
    }

    /// Whether `point`, projected onto the face's plane, lies on the face.
    /// `tolerance` lets the point sit slightly outside any edge.
    pub fn is_point_on_face(&self, face_index: u32, point: Vec3, tolerance: f32) -> bool {
        let verts = self.face_vertices(face_index);
        let normal = polygon_normal(&verts);
        if normal == Vec3::ZERO {
            return false;
        }
        let projected = point - normal * normal.dot(point - verts[0]);
        point_in_polygon_with_tolerance(projected, &verts, normal, tolerance)
    }
}

/// A set of navmesh instances addressable by runtime index. The coherent
/// query layer resolves previous-frame face keys through this.
#[derive(Debug, Default)]
pub struct MeshCollection {
    instances: Vec<NavMeshInstance>,
}

impl MeshCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance, assigning and returning its runtime index.
    pub fn push(&mut self, mut instance: NavMeshInstance) -> u32 {
        let index = self.instances.len() as u32;
        instance.runtime_index = index;
        self.instances.push(instance);
        index
    }

    /// The instance with the given runtime index.
    pub fn instance(&self, runtime_index: u32) -> Option<&NavMeshInstance> {
        self.instances.get(runtime_index as usize)
    }

    /// Mutable access to an instance, for transform updates.
    pub fn instance_mut(&mut self, runtime_index: u32) -> Option<&mut NavMeshInstance> {
        self.instances.get_mut(runtime_index as usize)
    }

    /// All instances in runtime-index order.
    pub fn iter(&self) -> impl Iterator<Item = &NavMeshInstance> {
        self.instances.iter()
    }

    /// Number of instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// True when no instances have been added.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two unit triangles in the XZ plane sharing the diagonal (0,0)-(1,1).
    fn two_triangles() -> NavMeshInstance {
        let vertices = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 0.0),
        ];
        // CCW around +Y.
        NavMeshInstance::new(vertices, &[vec![0, 1, 2], vec![0, 2, 3]]).unwrap()
    }

    #[test]
    fn test_adjacency_across_shared_edge() {
        let mesh = two_triangles();
        assert_eq!(mesh.face_count(), 2);

        let neighbors_of_0: Vec<u32> = mesh.adjacent_faces(0).collect();
        assert_eq!(neighbors_of_0, vec![1]);
        let neighbors_of_1: Vec<u32> = mesh.adjacent_faces(1).collect();
        assert_eq!(neighbors_of_1, vec![0]);
    }

    #[test]
    fn test_boundary_edges_of_quad() {
        let mesh = two_triangles();
        // 6 directed edges total, 2 interior (the shared diagonal both ways),
        // 4 on the square's outline.
        assert_eq!(mesh.edge_count(), 6);
        assert_eq!(mesh.boundary_edges().count(), 4);
        for (index, edge) in mesh.boundary_edges() {
            assert!(mesh.is_boundary_edge(index));
            assert_eq!(edge.opposite_face, NO_FACE);
        }
    }

    #[test]
    fn test_face_geometry_helpers() {
        let mesh = two_triangles();
        let aabb = mesh.face_aabb(0);
        assert_eq!(aabb.min, Vec3::ZERO);
        assert_eq!(aabb.max, Vec3::new(1.0, 0.0, 1.0));

        let centroid = mesh.face_centroid(0);
        assert!((centroid - Vec3::new(1.0 / 3.0, 0.0, 2.0 / 3.0)).length() < 1e-6);
    }

    #[test]
    fn test_is_point_on_face() {
        let mesh = two_triangles();
        // Interior of face 0, tested from above the plane.
        assert!(mesh.is_point_on_face(0, Vec3::new(0.2, 5.0, 0.7), 1e-3));
        // Interior of face 1, not face 0.
        assert!(!mesh.is_point_on_face(0, Vec3::new(0.8, 0.0, 0.2), 1e-3));
        assert!(mesh.is_point_on_face(1, Vec3::new(0.8, 0.0, 0.2), 1e-3));
        // Slightly across the shared diagonal: accepted with a loose
        // tolerance.
        assert!(mesh.is_point_on_face(0, Vec3::new(0.51, 0.0, 0.49), 0.1));
    }

    #[test]
    fn test_transform_applied_to_face_vertices() {
        let mut mesh = two_triangles();
        mesh.set_local_to_world(Affine3A::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        let verts = mesh.face_vertices(0);
        assert!(verts.iter().all(|v| v.x >= 10.0));

        // An explicit transform overrides the instance's own.
        let verts = mesh.face_vertices_with(0, &Affine3A::IDENTITY);
        assert!(verts.iter().any(|v| v.x < 1.0 + 1e-6));
    }

    #[test]
    fn test_collection_assigns_runtime_indices() {
        let mut collection = MeshCollection::new();
        let a = collection.push(two_triangles());
        let b = collection.push(two_triangles());
        assert_eq!((a, b), (0, 1));
        assert_eq!(collection.instance(1).unwrap().runtime_index(), 1);
        assert!(collection.instance(2).is_none());
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn test_face_too_small_rejected() {
        let err = NavMeshInstance::new(vec![Vec3::ZERO, Vec3::X], &[vec![0, 1]]).unwrap_err();
        assert!(matches!(err, MeshError::FaceTooSmall { face: 0, count: 2 }));
    }

    #[test]
    fn test_vertex_out_of_range_rejected() {
        let err =
            NavMeshInstance::new(vec![Vec3::ZERO, Vec3::X, Vec3::Z], &[vec![0, 1, 5]]).unwrap_err();
        assert!(matches!(err, MeshError::VertexOutOfRange { vertex: 5, .. }));
    }

    #[test]
    fn test_duplicate_directed_edge_rejected() {
        // Second face repeats the directed edge (0, 1): inconsistent winding.
        let vertices = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 0.0),
        ];
        let err = NavMeshInstance::new(vertices, &[vec![0, 1, 2], vec![0, 1, 3]]).unwrap_err();
        assert!(matches!(err, MeshError::NonManifoldEdge { a: 0, b: 1 }));
    }
}
