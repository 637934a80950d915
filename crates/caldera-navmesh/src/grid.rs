//! Uniform-grid mediator backend.
//!
//! Faces are binned into XZ cells by their bounding boxes at build time, so
//! queries only touch the faces whose cells overlap the query region.
//! Results are identical to [`LinearMediator`](crate::LinearMediator); only
//! the set of faces inspected shrinks.

use caldera_math::{Aabb, closest_point_on_polygon, closest_point_on_segment,
    intersect_segment_polygon};
use glam::Vec3;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::keys::{EdgeKey, FaceKey};
use crate::mediator::{
    AabbQueryInput, ClosestBoundaryEdgeInput, ClosestEdgeHit, ClosestPointInput, HitDetails,
    QueryInputBase, QueryMediator, RaycastInput, face_vertices_for_query, flatten,
    is_face_enabled, is_instance_enabled,
};
use crate::mesh::{MeshCollection, NO_FACE};

/// Cell size used by [`GridMediator::new`]. Tuned for human-scale navmesh
/// faces; dense meshes with tiny faces want smaller cells.
pub const DEFAULT_CELL_SIZE: f32 = 8.0;

/// Grid-accelerated backend.
///
/// The grid is a snapshot: it indexes the collection as it was when built.
/// After instances are added or transforms change, call
/// [`rebuild`](Self::rebuild).
pub struct GridMediator<'a> {
    collection: &'a MeshCollection,
    cell_size: f32,
    cells: FxHashMap<(i32, i32), Vec<(u32, u32)>>,
}

impl<'a> GridMediator<'a> {
    /// Builds a grid over the collection with [`DEFAULT_CELL_SIZE`].
    pub fn new(collection: &'a MeshCollection) -> Self {
        Self::with_cell_size(collection, DEFAULT_CELL_SIZE)
    }

    /// Builds a grid over the collection with the given cell size.
    pub fn with_cell_size(collection: &'a MeshCollection, cell_size: f32) -> Self {
        debug_assert!(cell_size > 0.0, "cell size must be positive");
        let mut mediator = Self {
            collection,
            cell_size,
            cells: FxHashMap::default(),
        };
        mediator.rebuild();
        mediator
    }

    /// Re-bins every face. Required after the collection's geometry or
    /// transforms change.
    pub fn rebuild(&mut self) {
        self.cells.clear();
        let mut faces_binned = 0usize;
        for instance in self.collection.iter() {
            for face in 0..instance.face_count() {
                let aabb = instance.face_aabb(face);
                for cell in self.cells_overlapping(&aabb) {
                    self.cells
                        .entry(cell)
                        .or_default()
                        .push((instance.runtime_index(), face));
                }
                faces_binned += 1;
            }
        }
        log::debug!(
            "grid rebuilt: {} faces in {} cells (cell size {})",
            faces_binned,
            self.cells.len(),
            self.cell_size
        );
    }

    /// Number of occupied cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn cells_overlapping(&self, aabb: &Aabb) -> impl Iterator<Item = (i32, i32)> + use<> {
        let min_x = (aabb.min.x / self.cell_size).floor() as i32;
        let max_x = (aabb.max.x / self.cell_size).floor() as i32;
        let min_z = (aabb.min.z / self.cell_size).floor() as i32;
        let max_z = (aabb.max.z / self.cell_size).floor() as i32;
        (min_x..=max_x).flat_map(move |x| (min_z..=max_z).map(move |z| (x, z)))
    }

    /// Deduplicated (instance, face) pairs whose cells overlap `region`,
    /// with instance restriction and filtering already applied.
    fn candidates(&self, base: &QueryInputBase<'_>, region: &Aabb) -> Vec<(u32, u32)> {
        let restricted = base.instance.map(|i| i.runtime_index());
        let mut seen = FxHashSet::default();
        let mut enabled_instances: FxHashMap<u32, bool> = FxHashMap::default();
        let mut out = Vec::new();

        for cell in self.cells_overlapping(region) {
            let Some(entries) = self.cells.get(&cell) else {
                continue;
            };
            for &(instance_index, face) in entries {
                if restricted.is_some_and(|r| r != instance_index) {
                    continue;
                }
                if !seen.insert((instance_index, face)) {
                    continue;
                }
                let Some(instance) = self.collection.instance(instance_index) else {
                    continue;
                };
                let enabled = *enabled_instances
                    .entry(instance_index)
                    .or_insert_with(|| is_instance_enabled(base, instance));
                if enabled && is_face_enabled(base, instance, face) {
                    out.push((instance_index, face));
                }
            }
        }
        out
    }
}

impl QueryMediator for GridMediator<'_> {
    fn closest_point(
        &self,
        input: &ClosestPointInput<'_>,
        closest_point_out: &mut Vec3,
    ) -> FaceKey {
        let region = Aabb::from_center_half_extents(
            input.position,
            Vec3::splat(input.query_radius),
        );
        let mut best_key = FaceKey::INVALID;
        let mut best_dist_sqr = input.query_radius * input.query_radius;

        for (instance_index, face) in self.candidates(&input.base, &region) {
            let instance = self
                .collection
                .instance(instance_index)
                .expect("candidate instance exists");
            let verts = face_vertices_for_query(&input.base, instance, face);
            if Aabb::from_points(&verts).distance_squared_to_point(input.position)
                > best_dist_sqr
            {
                continue;
            }
            let candidate = closest_point_on_polygon(input.position, &verts);
            let dist_sqr = input.position.distance_squared(candidate);
            if dist_sqr <= best_dist_sqr {
                best_dist_sqr = dist_sqr;
                best_key = FaceKey::new(instance_index, face);
                *closest_point_out = candidate;
            }
        }
        best_key
    }

    fn closest_boundary_edge(
        &self,
        input: &ClosestBoundaryEdgeInput<'_>,
        hit_out: &mut ClosestEdgeHit,
    ) -> EdgeKey {
        let flat_position = flatten(input.position, input.projection_direction);
        let mut best_key = EdgeKey::INVALID;
        let mut best_dist_sqr = input.query_radius * input.query_radius;

        // Cell pruning is only sound without flattening: projecting out a
        // direction can bring a far-off edge within the radius. In that case
        // every boundary edge is scanned.
        let candidates = if input.projection_direction == Vec3::ZERO {
            let region = Aabb::from_center_half_extents(
                input.position,
                Vec3::splat(input.query_radius),
            );
            Some(self.candidates(&input.base, &region))
        } else {
            None
        };

        let restricted = input.base.instance.map(|i| i.runtime_index());
        let mut consider = |instance_index: u32, edge_index: u32| {
            let instance = match self.collection.instance(instance_index) {
                Some(instance) => instance,
                None => return,
            };
            let (a, b) = instance.edge_endpoints(edge_index);
            let flat_a = flatten(a, input.projection_direction);
            let flat_b = flatten(b, input.projection_direction);
            let flat_closest = closest_point_on_segment(flat_position, flat_a, flat_b);
            let dist_sqr = flat_position.distance_squared(flat_closest);
            if dist_sqr <= best_dist_sqr {
                best_dist_sqr = dist_sqr;
                best_key = EdgeKey::new(instance_index, edge_index);

                let flat_ab = flat_b - flat_a;
                let t = if flat_ab.length_squared() < f32::EPSILON {
                    0.0
                } else {
                    (flat_closest - flat_a).dot(flat_ab) / flat_ab.length_squared()
                };
                hit_out.point = a + (b - a) * t;
                hit_out.distance_sqr = dist_sqr;
            }
        };

        match candidates {
            Some(faces) => {
                for (instance_index, face) in faces {
                    let instance = self
                        .collection
                        .instance(instance_index)
                        .expect("candidate instance exists");
                    let first = instance.first_edge_of_face(face);
                    for (offset, edge) in instance.edges_of_face(face).iter().enumerate() {
                        if edge.opposite_face == NO_FACE {
                            consider(instance_index, first + offset as u32);
                        }
                    }
                }
            }
            None => {
                for instance in self.collection.iter() {
                    if restricted.is_some_and(|r| r != instance.runtime_index()) {
                        continue;
                    }
                    if !is_instance_enabled(&input.base, instance) {
                        continue;
                    }
                    for (edge_index, edge) in instance.boundary_edges() {
                        if is_face_enabled(&input.base, instance, edge.face) {
                            consider(instance.runtime_index(), edge_index);
                        }
                    }
                }
            }
        }
        best_key
    }

    fn cast_ray(&self, input: &RaycastInput<'_>, hit_out: &mut HitDetails) -> bool {
        let region = Aabb::new(input.from, input.to);
        let mut best_fraction = f32::MAX;

        for (instance_index, face) in self.candidates(&input.base, &region) {
            let instance = self
                .collection
                .instance(instance_index)
                .expect("candidate instance exists");
            let verts = face_vertices_for_query(&input.base, instance, face);
            if !Aabb::from_points(&verts).intersects_segment(input.from, input.to) {
                continue;
            }
            if let Some(fraction) = intersect_segment_polygon(input.from, input.to, &verts)
                && fraction < best_fraction
            {
                best_fraction = fraction;
                hit_out.fraction = fraction;
                hit_out.face_key = FaceKey::new(instance_index, face);
            }
        }
        best_fraction != f32::MAX
    }

    fn query_aabb(&self, input: &AabbQueryInput<'_>, hits: &mut Vec<FaceKey>) {
        for (instance_index, face) in self.candidates(&input.base, &input.aabb) {
            let instance = self
                .collection
                .instance(instance_index)
                .expect("candidate instance exists");
            let verts = face_vertices_for_query(&input.base, instance, face);
            if Aabb::from_points(&verts).intersects(&input.aabb) {
                hits.push(FaceKey::new(instance_index, face));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::NavMeshInstance;

    /// A single unit square in the XZ plane at the origin.
    fn square() -> MeshCollection {
        let vertices = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 0.0),
        ];
        let mut collection = MeshCollection::new();
        collection.push(NavMeshInstance::new(vertices, &[vec![0, 1, 2, 3]]).unwrap());
        collection
    }

    #[test]
    fn test_faces_spanning_cells_are_binned_into_each() {
        let collection = square();
        // Cell size 0.25 puts the unit square across a 5x5 cell block
        // (boundaries land on cell edges).
        let mediator = GridMediator::with_cell_size(&collection, 0.25);
        assert_eq!(mediator.cell_count(), 25);
    }

    #[test]
    fn test_closest_point_matches_small_cells() {
        let collection = square();
        let mediator = GridMediator::with_cell_size(&collection, 0.5);

        let mut point = Vec3::ZERO;
        let key = mediator.closest_point_simple(Vec3::new(0.25, 1.0, 0.75), 5.0, &mut point);
        assert_eq!(key, FaceKey::new(0, 0));
        assert!((point - Vec3::new(0.25, 0.0, 0.75)).length() < 1e-6);
    }

    #[test]
    fn test_query_outside_indexed_region_finds_nothing() {
        let collection = square();
        let mediator = GridMediator::new(&collection);

        let mut point = Vec3::ZERO;
        let key = mediator.closest_point_simple(Vec3::new(100.0, 0.0, 100.0), 5.0, &mut point);
        assert_eq!(key, FaceKey::INVALID);
    }

    #[test]
    fn test_cast_ray_through_indexed_face() {
        let collection = square();
        let mediator = GridMediator::with_cell_size(&collection, 0.5);

        let mut hit = HitDetails::default();
        assert!(mediator.cast_ray_simple(
            Vec3::new(0.5, 2.0, 0.5),
            Vec3::new(0.5, -2.0, 0.5),
            &mut hit,
        ));
        assert_eq!(hit.face_key, FaceKey::new(0, 0));
        assert!((hit.fraction - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_query_aabb_dedupes_faces_spanning_cells() {
        let collection = square();
        let mediator = GridMediator::with_cell_size(&collection, 0.25);

        // The box covers many cells, all holding the same face.
        let mut hits = Vec::new();
        mediator.query_aabb_simple(
            Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(2.0, 1.0, 2.0)),
            &mut hits,
        );
        assert_eq!(hits, vec![FaceKey::new(0, 0)]);
    }

    #[test]
    fn test_rebuild_picks_up_moved_instances() {
        let mut collection = square();
        let mut hits = Vec::new();
        {
            let mediator = GridMediator::new(&collection);
            mediator.query_aabb_simple(
                Aabb::new(Vec3::new(9.0, -1.0, -1.0), Vec3::new(12.0, 1.0, 2.0)),
                &mut hits,
            );
            assert!(hits.is_empty());
        }

        collection
            .instance_mut(0)
            .unwrap()
            .set_local_to_world(glam::Affine3A::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        let mediator = GridMediator::new(&collection);
        mediator.query_aabb_simple(
            Aabb::new(Vec3::new(9.0, -1.0, -1.0), Vec3::new(12.0, 1.0, 2.0)),
            &mut hits,
        );
        assert_eq!(hits, vec![FaceKey::new(0, 0)]);
    }

    #[test]
    fn test_boundary_edge_with_flattening_scans_everything() {
        let collection = square();
        let mediator = GridMediator::with_cell_size(&collection, 0.5);

        // Far above the square: only reachable once flattened along Y.
        let input = ClosestBoundaryEdgeInput {
            position: Vec3::new(-0.5, 50.0, 0.5),
            query_radius: 1.0,
            projection_direction: Vec3::Y,
            ..Default::default()
        };
        let mut hit = ClosestEdgeHit::default();
        let key = mediator.closest_boundary_edge(&input, &mut hit);
        assert!(key.is_valid());
        assert!((hit.distance_sqr - 0.25).abs() < 1e-5);
    }
}
