//! Brute-force mediator backend: scans every face of every instance.
//!
//! Slow but exact, which makes it the reference implementation the other
//! backends are checked against.

use caldera_math::{Aabb, closest_point_on_polygon, closest_point_on_segment,
    intersect_segment_polygon};
use glam::Vec3;

use crate::keys::{EdgeKey, FaceKey};
use crate::mediator::{
    AabbQueryInput, ClosestBoundaryEdgeInput, ClosestEdgeHit, ClosestPointInput, HitDetails,
    QueryInputBase, QueryMediator, RaycastInput, face_vertices_for_query, flatten,
    is_face_enabled, is_instance_enabled,
};
use crate::mesh::{MeshCollection, NavMeshInstance};

/// The brute-force backend.
pub struct LinearMediator<'a> {
    collection: &'a MeshCollection,
}

impl<'a> LinearMediator<'a> {
    /// A mediator scanning the given collection.
    pub fn new(collection: &'a MeshCollection) -> Self {
        Self { collection }
    }

    /// Instances this query may touch, honoring a single-instance
    /// restriction and the instance filter.
    fn instances<'q>(
        &self,
        base: &QueryInputBase<'q>,
    ) -> impl Iterator<Item = &'a NavMeshInstance> {
        let restricted = base.instance.map(|i| i.runtime_index());
        let base = *base;
        self.collection
            .iter()
            .filter(move |instance| restricted.is_none_or(|r| r == instance.runtime_index()))
            .filter(move |instance| is_instance_enabled(&base, instance))
    }
}

impl QueryMediator for LinearMediator<'_> {
    fn closest_point(
        &self,
        input: &ClosestPointInput<'_>,
        closest_point_out: &mut Vec3,
    ) -> FaceKey {
        let mut best_key = FaceKey::INVALID;
        let mut best_dist_sqr = input.query_radius * input.query_radius;

        for instance in self.instances(&input.base) {
            for face in 0..instance.face_count() {
                if !is_face_enabled(&input.base, instance, face) {
                    continue;
                }
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
                    best_key = FaceKey::new(instance.runtime_index(), face);
                    *closest_point_out = candidate;
                }
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

        for instance in self.instances(&input.base) {
            for (edge_index, edge) in instance.boundary_edges() {
                if !is_face_enabled(&input.base, instance, edge.face) {
                    continue;
                }
                let (a, b) = instance.edge_endpoints(edge_index);
                let flat_a = flatten(a, input.projection_direction);
                let flat_b = flatten(b, input.projection_direction);
                let flat_closest = closest_point_on_segment(flat_position, flat_a, flat_b);
                let dist_sqr = flat_position.distance_squared(flat_closest);
                if dist_sqr <= best_dist_sqr {
                    best_dist_sqr = dist_sqr;
                    best_key = EdgeKey::new(instance.runtime_index(), edge_index);

                    // Recover the point on the unflattened edge from the
                    // parameter along the flattened one.
                    let flat_ab = flat_b - flat_a;
                    let t = if flat_ab.length_squared() < f32::EPSILON {
                        0.0
                    } else {
                        (flat_closest - flat_a).dot(flat_ab) / flat_ab.length_squared()
                    };
                    hit_out.point = a + (b - a) * t;
                    hit_out.distance_sqr = dist_sqr;
                }
            }
        }
        best_key
    }

    fn cast_ray(&self, input: &RaycastInput<'_>, hit_out: &mut HitDetails) -> bool {
        let mut best_fraction = f32::MAX;

        for instance in self.instances(&input.base) {
            for face in 0..instance.face_count() {
                if !is_face_enabled(&input.base, instance, face) {
                    continue;
                }
                let verts = face_vertices_for_query(&input.base, instance, face);
                if !Aabb::from_points(&verts).intersects_segment(input.from, input.to) {
                    continue;
                }
                if let Some(fraction) = intersect_segment_polygon(input.from, input.to, &verts)
                    && fraction < best_fraction
                {
                    best_fraction = fraction;
                    hit_out.fraction = fraction;
                    hit_out.face_key = FaceKey::new(instance.runtime_index(), face);
                }
            }
        }
        best_fraction != f32::MAX
    }

    fn query_aabb(&self, input: &AabbQueryInput<'_>, hits: &mut Vec<FaceKey>) {
        for instance in self.instances(&input.base) {
            for face in 0..instance.face_count() {
                if !is_face_enabled(&input.base, instance, face) {
                    continue;
                }
                let verts = face_vertices_for_query(&input.base, instance, face);
                if Aabb::from_points(&verts).intersects(&input.aabb) {
                    hits.push(FaceKey::new(instance.runtime_index(), face));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SpatialHitFilter;
    use crate::mesh::NavMeshInstance;

    /// A 2x1 strip of unit squares in the XZ plane: face 0 spans x in
    /// [0, 1], face 1 spans x in [1, 2].
    fn strip() -> MeshCollection {
        let vertices = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 1.0),
            Vec3::new(2.0, 0.0, 0.0),
        ];
        let mesh =
            NavMeshInstance::new(vertices, &[vec![0, 1, 2, 3], vec![3, 2, 4, 5]]).unwrap();
        let mut collection = MeshCollection::new();
        collection.push(mesh);
        collection
    }

    /// Filter that disables one face index everywhere.
    struct BlockFace(u32);

    impl SpatialHitFilter for BlockFace {
        fn is_instance_enabled(&self, _: &NavMeshInstance, _: u32, _: u64) -> bool {
            true
        }
        fn is_face_enabled(&self, _: &NavMeshInstance, face: u32, _: u32, _: u64) -> bool {
            face != self.0
        }
    }

    #[test]
    fn test_closest_point_snaps_to_surface() {
        let collection = strip();
        let mediator = LinearMediator::new(&collection);

        let mut point = Vec3::ZERO;
        let key = mediator.closest_point_simple(Vec3::new(0.5, 2.0, 0.5), 5.0, &mut point);
        assert_eq!(key, FaceKey::new(0, 0));
        assert!((point - Vec3::new(0.5, 0.0, 0.5)).length() < 1e-6);
    }

    #[test]
    fn test_closest_point_respects_radius() {
        let collection = strip();
        let mediator = LinearMediator::new(&collection);

        let mut point = Vec3::ZERO;
        let key = mediator.closest_point_simple(Vec3::new(0.5, 10.0, 0.5), 5.0, &mut point);
        assert_eq!(key, FaceKey::INVALID, "nothing within 5 units");
    }

    #[test]
    fn test_closest_point_picks_nearer_face() {
        let collection = strip();
        let mediator = LinearMediator::new(&collection);

        let mut point = Vec3::ZERO;
        let key = mediator.closest_point_simple(Vec3::new(1.75, 0.5, 0.5), 5.0, &mut point);
        assert_eq!(key, FaceKey::new(0, 1));
    }

    #[test]
    fn test_closest_point_honors_face_filter() {
        let collection = strip();
        let mediator = LinearMediator::new(&collection);
        let filter = BlockFace(1);

        let input = ClosestPointInput {
            base: QueryInputBase {
                filter: Some(&filter),
                ..Default::default()
            },
            position: Vec3::new(1.9, 0.0, 0.5),
            query_radius: 5.0,
        };
        let mut point = Vec3::ZERO;
        let key = mediator.closest_point(&input, &mut point);
        // Face 1 is geometrically closest but disabled.
        assert_eq!(key, FaceKey::new(0, 0));
        assert!((point - Vec3::new(1.0, 0.0, 0.5)).length() < 1e-6);
    }

    #[test]
    fn test_cast_ray_hits_first_face_along_segment() {
        let collection = strip();
        let mediator = LinearMediator::new(&collection);

        let mut hit = HitDetails::default();
        let did_hit = mediator.cast_ray_simple(
            Vec3::new(0.5, 1.0, 0.5),
            Vec3::new(0.5, -1.0, 0.5),
            &mut hit,
        );
        assert!(did_hit);
        assert_eq!(hit.face_key, FaceKey::new(0, 0));
        assert!((hit.fraction - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_cast_ray_miss_returns_false() {
        let collection = strip();
        let mediator = LinearMediator::new(&collection);

        let mut hit = HitDetails::default();
        assert!(!mediator.cast_ray_simple(
            Vec3::new(5.0, 1.0, 0.5),
            Vec3::new(5.0, -1.0, 0.5),
            &mut hit,
        ));
        assert!(!hit.face_key.is_valid());
    }

    #[test]
    fn test_query_aabb_returns_touched_faces() {
        let collection = strip();
        let mediator = LinearMediator::new(&collection);

        let mut hits = Vec::new();
        mediator.query_aabb_simple(
            Aabb::new(Vec3::new(0.9, -0.1, 0.0), Vec3::new(1.1, 0.1, 1.0)),
            &mut hits,
        );
        assert_eq!(hits.len(), 2, "the box straddles both faces");

        hits.clear();
        mediator.query_aabb_simple(
            Aabb::new(Vec3::new(0.2, -0.1, 0.2), Vec3::new(0.4, 0.1, 0.4)),
            &mut hits,
        );
        assert_eq!(hits, vec![FaceKey::new(0, 0)]);

        hits.clear();
        mediator.query_aabb_simple(
            Aabb::new(Vec3::new(10.0, 10.0, 10.0), Vec3::new(11.0, 11.0, 11.0)),
            &mut hits,
        );
        assert!(hits.is_empty());
    }

    #[test]
    fn test_closest_boundary_edge_flattens_along_projection() {
        let collection = strip();
        let mediator = LinearMediator::new(&collection);

        // High above the strip's left outer edge. Without flattening the
        // edge is out of the 3-unit radius; flattened along Y it is at
        // distance 0.5.
        let input = ClosestBoundaryEdgeInput {
            position: Vec3::new(-0.5, 10.0, 0.5),
            query_radius: 3.0,
            projection_direction: Vec3::Y,
            ..Default::default()
        };
        let mut hit = ClosestEdgeHit::default();
        let key = mediator.closest_boundary_edge(&input, &mut hit);
        assert!(key.is_valid());
        assert!((hit.distance_sqr - 0.25).abs() < 1e-5);
        // The reported point is on the unflattened edge (y = 0).
        assert!((hit.point - Vec3::new(0.0, 0.0, 0.5)).length() < 1e-5);

        // The same query without flattening finds nothing in range.
        let unflattened = ClosestBoundaryEdgeInput {
            projection_direction: Vec3::ZERO,
            ..input
        };
        let mut hit = ClosestEdgeHit::default();
        assert!(!mediator.closest_boundary_edge(&unflattened, &mut hit).is_valid());
    }

    #[test]
    fn test_closest_boundary_edge_skips_interior_edges() {
        let collection = strip();
        let mediator = LinearMediator::new(&collection);

        // Right next to the interior edge at x = 1: the closest *boundary*
        // edge is the strip outline, not the shared edge.
        let input = ClosestBoundaryEdgeInput::new(Vec3::new(1.0, 0.0, 0.45), 5.0);
        let mut hit = ClosestEdgeHit::default();
        let key = mediator.closest_boundary_edge(&input, &mut hit);
        assert!(key.is_valid());
        let edge = collection.instance(0).unwrap().edge(key.element_index());
        assert_eq!(edge.opposite_face, crate::mesh::NO_FACE);
        // Closest outline point is on the z = 0 edge.
        assert!(hit.point.z.abs() < 1e-5, "expected the z=0 outline, got {:?}", hit.point);
    }
}
