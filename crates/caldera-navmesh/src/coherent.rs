//! Coherent query layer: frame-to-frame reuse of query results.
//!
//! Agents standing still or moving slowly re-issue nearly identical queries
//! every frame. When the previous result is still valid, these entry points
//! answer from the previous face and its one-ring instead of running the
//! full query. Any doubt falls back to the backend, so the result is always
//! identical to the non-coherent call.
//!
//! Free functions rather than trait methods: the reuse semantics are part of
//! the contract and no backend may override them.

use caldera_math::{point_in_polygon_with_tolerance, polygon_normal,
    project_onto_polygon_plane};
use glam::Vec3;

use crate::keys::FaceKey;
use crate::mediator::{
    BidirectionalRaycastInput, ClosestPointInput, HitDetails, QueryInputBase, QueryMediator,
    RaycastInput, face_vertices_for_query, is_face_enabled, is_instance_enabled,
};
use crate::mesh::{MeshCollection, NavMeshInstance};

/// Previous-frame state carried between coherent calls.
#[derive(Clone, Copy, Debug)]
pub struct CoherentInput {
    /// Result point of the previous query.
    pub previous_point: Vec3,
    /// Direction used to project the new position onto candidate faces.
    pub up: Vec3,
    /// Face the previous result was on.
    pub previous_face: FaceKey,
    /// How far outside a face's edges the projected point may sit and still
    /// count as on the face.
    pub on_face_tolerance: f32,
    /// Maximum distance between the previous point and the new query origin
    /// for the fast path to apply.
    pub coherency_tolerance: f32,
}

impl Default for CoherentInput {
    fn default() -> Self {
        Self {
            previous_point: Vec3::ZERO,
            up: Vec3::Y,
            previous_face: FaceKey::INVALID,
            on_face_tolerance: 1e-3,
            coherency_tolerance: 0.1,
        }
    }
}

impl CoherentInput {
    /// State from a previous result; tolerances keep their defaults.
    pub fn new(previous_point: Vec3, previous_face: FaceKey) -> Self {
        Self {
            previous_point,
            previous_face,
            ..Default::default()
        }
    }
}

/// Closest-point query that tries to reanchor on the previous face or its
/// one-ring before falling back to `mediator`.
pub fn coherent_closest_point<M: QueryMediator + ?Sized>(
    mediator: &M,
    collection: &MeshCollection,
    input: &ClosestPointInput<'_>,
    cinput: &CoherentInput,
    closest_point_out: &mut Vec3,
) -> FaceKey {
    if let Some((key, point)) = try_reanchor(collection, &input.base, input.position, cinput)
        && input.position.distance_squared(point) <= input.query_radius * input.query_radius
    {
        *closest_point_out = point;
        return key;
    }
    log::trace!("coherent closest-point fast path missed; running full query");
    mediator.closest_point(input, closest_point_out)
}

/// Ray cast that tries the previous face and its one-ring before falling
/// back to `mediator`.
pub fn coherent_cast_ray<M: QueryMediator + ?Sized>(
    mediator: &M,
    collection: &MeshCollection,
    input: &RaycastInput<'_>,
    cinput: &CoherentInput,
    hit_out: &mut HitDetails,
) -> bool {
    if origin_is_coherent(input.from, cinput)
        && let Some(hit) = local_cast(collection, &input.base, input.from, input.to, cinput)
    {
        *hit_out = hit;
        return true;
    }
    log::trace!("coherent ray cast fast path missed; running full query");
    mediator.cast_ray(input, hit_out)
}

/// Bidirectional ray cast with the same local fast path as
/// [`coherent_cast_ray`]. Backward hits report a negative fraction.
pub fn coherent_cast_bidirectional_ray<M: QueryMediator + ?Sized>(
    mediator: &M,
    collection: &MeshCollection,
    input: &BidirectionalRaycastInput<'_>,
    cinput: &CoherentInput,
    hit_out: &mut HitDetails,
) -> bool {
    if origin_is_coherent(input.center, cinput) {
        let backward_to = input.center * 2.0 - input.forward_to;
        let forward = local_cast(collection, &input.base, input.center, input.forward_to, cinput);
        let backward = local_cast(collection, &input.base, input.center, backward_to, cinput);
        match (forward, backward) {
            (Some(f), Some(b)) => {
                *hit_out = if f.fraction <= b.fraction {
                    f
                } else {
                    HitDetails {
                        fraction: -b.fraction,
                        face_key: b.face_key,
                    }
                };
                return true;
            }
            (Some(f), None) => {
                *hit_out = f;
                return true;
            }
            (None, Some(b)) => {
                *hit_out = HitDetails {
                    fraction: -b.fraction,
                    face_key: b.face_key,
                };
                return true;
            }
            (None, None) => {}
        }
    }
    log::trace!("coherent bidirectional cast fast path missed; running full query");
    mediator.cast_bidirectional_ray(input, hit_out)
}

fn origin_is_coherent(origin: Vec3, cinput: &CoherentInput) -> bool {
    cinput.previous_face.is_valid()
        && origin.distance_squared(cinput.previous_point)
            <= cinput.coherency_tolerance * cinput.coherency_tolerance
}

/// The previous face's instance, if the key still resolves to a live face
/// that passes the instance filter.
fn resolve_previous<'c>(
    collection: &'c MeshCollection,
    base: &QueryInputBase<'_>,
    cinput: &CoherentInput,
) -> Option<&'c NavMeshInstance> {
    let instance = collection.instance(cinput.previous_face.instance_index())?;
    // Keys can outlive a mesh rebuild; a face index past the end is stale.
    if cinput.previous_face.element_index() >= instance.face_count() {
        return None;
    }
    if !is_instance_enabled(base, instance) {
        return None;
    }
    Some(instance)
}

/// Previous face followed by its one-ring.
fn local_faces(instance: &NavMeshInstance, previous_face: u32) -> impl Iterator<Item = u32> {
    std::iter::once(previous_face).chain(instance.adjacent_faces(previous_face))
}

/// Projects `position` along `up` onto the previous face or one of its
/// neighbors. Returns the face key and the projected point.
fn try_reanchor(
    collection: &MeshCollection,
    base: &QueryInputBase<'_>,
    position: Vec3,
    cinput: &CoherentInput,
) -> Option<(FaceKey, Vec3)> {
    if !origin_is_coherent(position, cinput) {
        return None;
    }
    let instance = resolve_previous(collection, base, cinput)?;

    for face in local_faces(instance, cinput.previous_face.element_index()) {
        if !is_face_enabled(base, instance, face) {
            continue;
        }
        let verts = face_vertices_for_query(base, instance, face);
        let Some(projected) = project_onto_polygon_plane(position, cinput.up, &verts) else {
            continue;
        };
        let normal = polygon_normal(&verts);
        if normal != Vec3::ZERO
            && point_in_polygon_with_tolerance(projected, &verts, normal, cinput.on_face_tolerance)
        {
            return Some((
                FaceKey::new(instance.runtime_index(), face),
                projected,
            ));
        }
    }
    None
}

/// Casts the segment against the previous face and its one-ring, keeping the
/// nearest hit.
fn local_cast(
    collection: &MeshCollection,
    base: &QueryInputBase<'_>,
    from: Vec3,
    to: Vec3,
    cinput: &CoherentInput,
) -> Option<HitDetails> {
    let instance = resolve_previous(collection, base, cinput)?;

    let mut best: Option<HitDetails> = None;
    for face in local_faces(instance, cinput.previous_face.element_index()) {
        if !is_face_enabled(base, instance, face) {
            continue;
        }
        let verts = face_vertices_for_query(base, instance, face);
        if let Some(fraction) = caldera_math::intersect_segment_polygon(from, to, &verts)
            && best.is_none_or(|b| fraction < b.fraction)
        {
            best = Some(HitDetails {
                fraction,
                face_key: FaceKey::new(instance.runtime_index(), face),
            });
        }
    }
    best
}
