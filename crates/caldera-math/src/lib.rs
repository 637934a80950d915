//! Geometric primitives shared by the visibility and navmesh subsystems:
//! f32 AABBs, polygon closest-point and containment tests, and
//! segment-vs-polygon intersection.

mod aabb;
mod polygon;

pub use aabb::Aabb;
pub use polygon::{
    closest_point_on_polygon, closest_point_on_segment, intersect_segment_polygon,
    point_in_polygon_with_tolerance, polygon_normal, project_onto_polygon_plane,
};
