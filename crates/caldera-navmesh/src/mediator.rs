//! The abstract query mediator: request descriptors, hit results, and the
//! trait concrete backends implement.

use caldera_math::Aabb;
use glam::{Affine3A, Vec3};

use crate::filter::SpatialHitFilter;
use crate::keys::{EdgeKey, FaceKey};
use crate::mesh::NavMeshInstance;

/// Fields shared by every query request.
///
/// All references are borrowed for the duration of the call only; the
/// mediator never retains them.
#[derive(Clone, Copy, Default)]
pub struct QueryInputBase<'a> {
    /// Filtering information passed to the hit filter. For agent-issued
    /// queries this is the agent's filter info.
    pub filter_info: u32,
    /// User-defined data passed through to the hit filter.
    pub user_data: u64,
    /// Optional hit filter. `None` means no filtering: everything enabled.
    pub filter: Option<&'a dyn SpatialHitFilter>,
    /// Optional restriction to a single instance.
    pub instance: Option<&'a NavMeshInstance>,
    /// Optional local-to-world transform override for the restricted
    /// instance.
    pub local_to_world: Option<&'a Affine3A>,
}

impl<'a> QueryInputBase<'a> {
    /// Restrict the query to one instance, using its own transform.
    pub fn with_instance(mut self, instance: &'a NavMeshInstance) -> Self {
        self.instance = Some(instance);
        self.local_to_world = Some(instance.local_to_world());
        self
    }
}

/// Request for [`QueryMediator::closest_point`].
#[derive(Clone, Copy)]
pub struct ClosestPointInput<'a> {
    /// Shared request fields.
    pub base: QueryInputBase<'a>,
    /// Query position.
    pub position: Vec3,
    /// Maximum distance at which hits are considered. Large radii can make
    /// some backends considerably slower.
    pub query_radius: f32,
}

impl Default for ClosestPointInput<'_> {
    fn default() -> Self {
        Self {
            base: QueryInputBase::default(),
            position: Vec3::MAX,
            query_radius: 5.0,
        }
    }
}

impl<'a> ClosestPointInput<'a> {
    /// A request at `position` with the given radius and no filtering.
    pub fn new(position: Vec3, query_radius: f32) -> Self {
        Self {
            base: QueryInputBase::default(),
            position,
            query_radius,
        }
    }

    /// Copies the shared fields from `base`; geometry keeps its defaults.
    pub fn from_base(base: QueryInputBase<'a>) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }
}

/// Request for [`QueryMediator::closest_boundary_edge`].
#[derive(Clone, Copy)]
pub struct ClosestBoundaryEdgeInput<'a> {
    /// Shared request fields.
    pub base: QueryInputBase<'a>,
    /// Query position.
    pub position: Vec3,
    /// Maximum distance at which edges are considered.
    pub query_radius: f32,
    /// Direction along which the boundary and the query point are flattened
    /// before distances are compared. Zero disables flattening.
    pub projection_direction: Vec3,
}

impl Default for ClosestBoundaryEdgeInput<'_> {
    fn default() -> Self {
        Self {
            base: QueryInputBase::default(),
            position: Vec3::MAX,
            query_radius: 5.0,
            projection_direction: Vec3::ZERO,
        }
    }
}

impl<'a> ClosestBoundaryEdgeInput<'a> {
    /// A request at `position` with the given radius and no filtering.
    pub fn new(position: Vec3, query_radius: f32) -> Self {
        Self {
            base: QueryInputBase::default(),
            position,
            query_radius,
            projection_direction: Vec3::ZERO,
        }
    }

    /// Copies the shared fields from `base`; geometry keeps its defaults.
    pub fn from_base(base: QueryInputBase<'a>) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }
}

/// Request for [`QueryMediator::cast_ray`].
#[derive(Clone, Copy, Default)]
pub struct RaycastInput<'a> {
    /// Shared request fields.
    pub base: QueryInputBase<'a>,
    /// Ray start.
    pub from: Vec3,
    /// Ray end.
    pub to: Vec3,
}

impl<'a> RaycastInput<'a> {
    /// A segment cast from `from` to `to` with no filtering.
    pub fn new(from: Vec3, to: Vec3) -> Self {
        Self {
            base: QueryInputBase::default(),
            from,
            to,
        }
    }

    /// Copies the shared fields from `base`; geometry keeps its defaults.
    pub fn from_base(base: QueryInputBase<'a>) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }
}

/// Request for [`QueryMediator::cast_bidirectional_ray`].
#[derive(Clone, Copy, Default)]
pub struct BidirectionalRaycastInput<'a> {
    /// Shared request fields.
    pub base: QueryInputBase<'a>,
    /// Starting point of the rays in both directions.
    pub center: Vec3,
    /// Ray end in the forward direction; the backward ray ends the same
    /// distance from `center` on the opposite side.
    pub forward_to: Vec3,
}

impl<'a> BidirectionalRaycastInput<'a> {
    /// A bidirectional cast from `center` toward `forward_to`, unfiltered.
    pub fn new(center: Vec3, forward_to: Vec3) -> Self {
        Self {
            base: QueryInputBase::default(),
            center,
            forward_to,
        }
    }

    /// Copies the shared fields from `base`; geometry keeps its defaults.
    pub fn from_base(base: QueryInputBase<'a>) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }
}

/// Request for [`QueryMediator::query_aabb`].
#[derive(Clone, Copy)]
pub struct AabbQueryInput<'a> {
    /// Shared request fields.
    pub base: QueryInputBase<'a>,
    /// Box to search.
    pub aabb: Aabb,
}

impl<'a> AabbQueryInput<'a> {
    /// A box query with no filtering.
    pub fn new(aabb: Aabb) -> Self {
        Self {
            base: QueryInputBase::default(),
            aabb,
        }
    }
}

/// Closest hit returned by the ray casts.
///
/// For bidirectional rays, a negative fraction marks a hit along the
/// backward ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitDetails {
    /// Fraction along the ray of the closest hit.
    pub fraction: f32,
    /// The face hit, or [`FaceKey::INVALID`].
    pub face_key: FaceKey,
}

impl Default for HitDetails {
    fn default() -> Self {
        Self {
            fraction: 1.0,
            face_key: FaceKey::INVALID,
        }
    }
}

/// Closest point found by a boundary-edge query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClosestEdgeHit {
    /// Closest point on the edge, unflattened.
    pub point: Vec3,
    /// Squared distance to the query position, measured after flattening
    /// along the request's projection direction.
    pub distance_sqr: f32,
}

impl Default for ClosestEdgeHit {
    fn default() -> Self {
        Self {
            point: Vec3::ZERO,
            distance_sqr: f32::MAX,
        }
    }
}

/// Forwards the request's fields to its hit filter, if any.
pub fn is_instance_enabled(base: &QueryInputBase<'_>, instance: &NavMeshInstance) -> bool {
    base.filter.is_none_or(|filter| {
        filter.is_instance_enabled(instance, base.filter_info, base.user_data)
    })
}

/// Forwards the request's fields to its hit filter, if any.
pub fn is_face_enabled(
    base: &QueryInputBase<'_>,
    instance: &NavMeshInstance,
    face_index: u32,
) -> bool {
    base.filter.is_none_or(|filter| {
        filter.is_face_enabled(instance, face_index, base.filter_info, base.user_data)
    })
}

/// Remove the component of `v` along `direction`. A (near) zero direction
/// leaves `v` unchanged.
pub(crate) fn flatten(v: Vec3, direction: Vec3) -> Vec3 {
    match direction.try_normalize() {
        Some(dir) => v - dir * v.dot(dir),
        None => v,
    }
}

/// World-space vertices of a face, honoring a per-query transform override
/// when the query is restricted to this instance.
pub(crate) fn face_vertices_for_query(
    base: &QueryInputBase<'_>,
    instance: &NavMeshInstance,
    face_index: u32,
) -> Vec<Vec3> {
    match (base.instance, base.local_to_world) {
        (Some(restricted), Some(transform))
            if restricted.runtime_index() == instance.runtime_index() =>
        {
            instance.face_vertices_with(face_index, transform)
        }
        _ => instance.face_vertices(face_index),
    }
}

/// Interface for proximity and ray cast queries against navmesh faces.
///
/// No-result outcomes are signaled with sentinel keys or `false`, never
/// errors. Implementations must honor the request's filter on every returned
/// instance and face.
pub trait QueryMediator {
    /// Closest face point within `query_radius` of the request position.
    /// Writes the point to `closest_point_out` and returns its face key, or
    /// [`FaceKey::INVALID`] when nothing is in range.
    fn closest_point(&self, input: &ClosestPointInput<'_>, closest_point_out: &mut Vec3)
    -> FaceKey;

    /// Closest point on a boundary edge within `query_radius`, with
    /// distances compared after flattening along the request's projection
    /// direction. Returns [`EdgeKey::INVALID`] when nothing is in range.
    fn closest_boundary_edge(
        &self,
        input: &ClosestBoundaryEdgeInput<'_>,
        hit_out: &mut ClosestEdgeHit,
    ) -> EdgeKey;

    /// Closest face along the segment from `from` to `to`. Returns false if
    /// no face is hit.
    fn cast_ray(&self, input: &RaycastInput<'_>, hit_out: &mut HitDetails) -> bool;

    /// Closest face along two opposite rays from a shared center.
    ///
    /// The default implementation issues both casts and keeps the nearer
    /// hit. Backends may override for efficiency but must preserve the
    /// observable contract: forward hits report a fraction in `[0, 1]`,
    /// backward hits in `[-1, 0]`.
    fn cast_bidirectional_ray(
        &self,
        input: &BidirectionalRaycastInput<'_>,
        hit_out: &mut HitDetails,
    ) -> bool {
        let forward = RaycastInput {
            base: input.base,
            from: input.center,
            to: input.forward_to,
        };
        let backward = RaycastInput {
            base: input.base,
            from: input.center,
            to: input.center * 2.0 - input.forward_to,
        };

        let mut forward_hit = HitDetails::default();
        let mut backward_hit = HitDetails::default();
        let hit_forward = self.cast_ray(&forward, &mut forward_hit);
        let hit_backward = self.cast_ray(&backward, &mut backward_hit);

        match (hit_forward, hit_backward) {
            (false, false) => false,
            (true, false) => {
                *hit_out = forward_hit;
                true
            }
            (false, true) => {
                *hit_out = HitDetails {
                    fraction: -backward_hit.fraction,
                    face_key: backward_hit.face_key,
                };
                true
            }
            (true, true) => {
                *hit_out = if forward_hit.fraction <= backward_hit.fraction {
                    forward_hit
                } else {
                    HitDetails {
                        fraction: -backward_hit.fraction,
                        face_key: backward_hit.face_key,
                    }
                };
                true
            }
        }
    }

    /// All faces touched by the box. Appends the face keys to `hits`.
    fn query_aabb(&self, input: &AabbQueryInput<'_>, hits: &mut Vec<FaceKey>);

    /// Unfiltered [`closest_point`](Self::closest_point).
    fn closest_point_simple(
        &self,
        position: Vec3,
        query_radius: f32,
        closest_point_out: &mut Vec3,
    ) -> FaceKey {
        self.closest_point(
            &ClosestPointInput::new(position, query_radius),
            closest_point_out,
        )
    }

    /// Unfiltered [`cast_ray`](Self::cast_ray).
    fn cast_ray_simple(&self, from: Vec3, to: Vec3, hit_out: &mut HitDetails) -> bool {
        self.cast_ray(&RaycastInput::new(from, to), hit_out)
    }

    /// Unfiltered [`query_aabb`](Self::query_aabb).
    fn query_aabb_simple(&self, aabb: Aabb, hits: &mut Vec<FaceKey>) {
        self.query_aabb(&AabbQueryInput::new(aabb), hits)
    }
}
