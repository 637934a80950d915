//! Query hit filtering.

use crate::mesh::NavMeshInstance;

/// Decides which instances and faces a query may return.
///
/// Filter objects are shared and stateless: every predicate receives the
/// request's filter info and user data, so one filter can serve many agents
/// with different masks. Queries with no filter treat everything as enabled.
pub trait SpatialHitFilter {
    /// Whether the instance participates in the query at all.
    fn is_instance_enabled(
        &self,
        instance: &NavMeshInstance,
        filter_info: u32,
        user_data: u64,
    ) -> bool;

    /// Whether a specific face may be returned as a hit.
    fn is_face_enabled(
        &self,
        instance: &NavMeshInstance,
        face_index: u32,
        filter_info: u32,
        user_data: u64,
    ) -> bool;
}
