//! Closest-point and intersection tests against planar convex polygons.
//!
//! Navmesh faces are convex polygons wound counter-clockwise around their
//! surface normal. All tests here assume that winding.

use glam::Vec3;

/// Closest point to `p` on the segment from `a` to `b`.
pub fn closest_point_on_segment(p: Vec3, a: Vec3, b: Vec3) -> Vec3 {
    let ab = b - a;
    let len_sqr = ab.length_squared();
    if len_sqr < f32::EPSILON {
        // Degenerate segment.
        return a;
    }
    let t = ((p - a).dot(ab) / len_sqr).clamp(0.0, 1.0);
    a + ab * t
}

/// Polygon normal via Newell's method, normalized.
/// Returns `Vec3::ZERO` for degenerate polygons.
pub fn polygon_normal(verts: &[Vec3]) -> Vec3 {
    let mut n = Vec3::ZERO;
    for i in 0..verts.len() {
        let a = verts[i];
        let b = verts[(i + 1) % verts.len()];
        n.x += (a.y - b.y) * (a.z + b.z);
        n.y += (a.z - b.z) * (a.x + b.x);
        n.z += (a.x - b.x) * (a.y + b.y);
    }
    n.normalize_or_zero()
}

/// Returns true when `p` (assumed to lie in the polygon's plane) is inside
/// the polygon, allowing it to sit up to `tolerance` outside any edge.
///
/// A zero tolerance gives the exact containment test; a negative tolerance
/// shrinks the polygon.
pub fn point_in_polygon_with_tolerance(
    p: Vec3,
    verts: &[Vec3],
    normal: Vec3,
    tolerance: f32,
) -> bool {
    for i in 0..verts.len() {
        let a = verts[i];
        let b = verts[(i + 1) % verts.len()];
        let inward = normal.cross(b - a);
        let len = inward.length();
        if len < f32::EPSILON {
            continue; // degenerate edge contributes no constraint
        }
        let signed_dist = (p - a).dot(inward) / len;
        if signed_dist < -tolerance {
            return false;
        }
    }
    true
}

/// Closest point to `p` on the polygon (interior or boundary).
pub fn closest_point_on_polygon(p: Vec3, verts: &[Vec3]) -> Vec3 {
    let n = polygon_normal(verts);
    if n == Vec3::ZERO {
        // Degenerate polygon: fall back to the closest boundary point.
        return closest_point_on_boundary(p, verts);
    }

    let projected = p - n * (p - verts[0]).dot(n);
    if point_in_polygon_with_tolerance(projected, verts, n, 0.0) {
        return projected;
    }
    closest_point_on_boundary(p, verts)
}

fn closest_point_on_boundary(p: Vec3, verts: &[Vec3]) -> Vec3 {
    let mut best = verts[0];
    let mut best_dist_sqr = f32::MAX;
    for i in 0..verts.len() {
        let a = verts[i];
        let b = verts[(i + 1) % verts.len()];
        let candidate = closest_point_on_segment(p, a, b);
        let d = p.distance_squared(candidate);
        if d < best_dist_sqr {
            best_dist_sqr = d;
            best = candidate;
        }
    }
    best
}

/// Cast `p` along `dir` onto the polygon's plane. Returns `None` when `dir`
/// is (near) parallel to the plane or the polygon is degenerate.
pub fn project_onto_polygon_plane(p: Vec3, dir: Vec3, verts: &[Vec3]) -> Option<Vec3> {
    let n = polygon_normal(verts);
    if n == Vec3::ZERO {
        return None;
    }
    let denom = n.dot(dir);
    if denom.abs() < 1e-6 {
        return None;
    }
    let t = n.dot(verts[0] - p) / denom;
    Some(p + dir * t)
}

/// Intersect the segment from `from` to `to` with the polygon.
/// Returns the hit fraction in `[0, 1]`, or `None` if the segment misses.
pub fn intersect_segment_polygon(from: Vec3, to: Vec3, verts: &[Vec3]) -> Option<f32> {
    let n = polygon_normal(verts);
    if n == Vec3::ZERO {
        return None;
    }
    let dir = to - from;
    let denom = n.dot(dir);
    if denom.abs() < 1e-9 {
        return None; // parallel to the face plane
    }
    let t = n.dot(verts[0] - from) / denom;
    if !(0.0..=1.0).contains(&t) {
        return None;
    }
    let hit = from + dir * t;
    if point_in_polygon_with_tolerance(hit, verts, n, 1e-5) {
        Some(t)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unit square in the XZ plane, CCW around +Y.
    fn square() -> Vec<Vec3> {
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 0.0),
        ]
    }

    #[test]
    fn test_closest_point_on_segment_clamps_to_endpoints() {
        let a = Vec3::ZERO;
        let b = Vec3::new(10.0, 0.0, 0.0);
        assert_eq!(closest_point_on_segment(Vec3::new(-5.0, 1.0, 0.0), a, b), a);
        assert_eq!(closest_point_on_segment(Vec3::new(15.0, 1.0, 0.0), a, b), b);
        let mid = closest_point_on_segment(Vec3::new(5.0, 3.0, 0.0), a, b);
        assert!((mid - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_polygon_normal_of_ccw_square_is_up() {
        let n = polygon_normal(&square());
        assert!((n - Vec3::Y).length() < 1e-6, "expected +Y, got {n:?}");
    }

    #[test]
    fn test_point_in_polygon_inside_outside() {
        let verts = square();
        let n = polygon_normal(&verts);
        assert!(point_in_polygon_with_tolerance(
            Vec3::new(0.5, 0.0, 0.5),
            &verts,
            n,
            0.0
        ));
        assert!(!point_in_polygon_with_tolerance(
            Vec3::new(1.5, 0.0, 0.5),
            &verts,
            n,
            0.0
        ));
        // Just outside, but within tolerance.
        assert!(point_in_polygon_with_tolerance(
            Vec3::new(1.05, 0.0, 0.5),
            &verts,
            n,
            0.1
        ));
    }

    #[test]
    fn test_closest_point_on_polygon_interior_projects_down() {
        let verts = square();
        let closest = closest_point_on_polygon(Vec3::new(0.5, 2.0, 0.5), &verts);
        assert!((closest - Vec3::new(0.5, 0.0, 0.5)).length() < 1e-6);
    }

    #[test]
    fn test_closest_point_on_polygon_exterior_snaps_to_edge() {
        let verts = square();
        let closest = closest_point_on_polygon(Vec3::new(2.0, 0.0, 0.5), &verts);
        assert!((closest - Vec3::new(1.0, 0.0, 0.5)).length() < 1e-6);
    }

    #[test]
    fn test_project_onto_polygon_plane() {
        let verts = square();
        let hit = project_onto_polygon_plane(Vec3::new(0.25, 5.0, 0.75), Vec3::NEG_Y, &verts)
            .expect("vertical projection should hit the plane");
        assert!((hit - Vec3::new(0.25, 0.0, 0.75)).length() < 1e-6);

        // Parallel direction never reaches the plane.
        assert!(project_onto_polygon_plane(Vec3::new(0.5, 5.0, 0.5), Vec3::X, &verts).is_none());
    }

    #[test]
    fn test_segment_polygon_hit_fraction() {
        let verts = square();
        let t = intersect_segment_polygon(
            Vec3::new(0.5, 1.0, 0.5),
            Vec3::new(0.5, -1.0, 0.5),
            &verts,
        )
        .expect("segment crosses the square");
        assert!((t - 0.5).abs() < 1e-6, "expected fraction 0.5, got {t}");
    }

    #[test]
    fn test_segment_polygon_miss() {
        let verts = square();
        // Crosses the plane outside the square.
        assert!(
            intersect_segment_polygon(
                Vec3::new(5.0, 1.0, 5.0),
                Vec3::new(5.0, -1.0, 5.0),
                &verts
            )
            .is_none()
        );
        // Stops short of the plane.
        assert!(
            intersect_segment_polygon(
                Vec3::new(0.5, 2.0, 0.5),
                Vec3::new(0.5, 1.0, 0.5),
                &verts
            )
            .is_none()
        );
    }
}
