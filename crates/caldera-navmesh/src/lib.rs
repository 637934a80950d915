//! Navmesh spatial queries: an abstract mediator over closest-point, ray
//! cast and AABB queries against navigation-mesh faces, with pluggable
//! backends and a coherent fast path that reuses the previous frame's hit.
//!
//! The AI layer calls the [`QueryMediator`] trait (or the coherent wrappers
//! such as [`coherent_closest_point`]) once per agent per frame. Two
//! backends are provided: a
//! brute-force [`LinearMediator`] used as the reference implementation, and
//! a uniform-grid [`GridMediator`] for larger meshes.

mod coherent;
mod filter;
mod grid;
mod keys;
mod linear;
mod mediator;
mod mesh;

pub use coherent::{
    CoherentInput, coherent_cast_bidirectional_ray, coherent_cast_ray, coherent_closest_point,
};
pub use filter::SpatialHitFilter;
pub use grid::{DEFAULT_CELL_SIZE, GridMediator};
pub use keys::{EdgeKey, FaceKey};
pub use linear::LinearMediator;
pub use mediator::{
    AabbQueryInput, BidirectionalRaycastInput, ClosestBoundaryEdgeInput, ClosestEdgeHit,
    ClosestPointInput, HitDetails, QueryInputBase, QueryMediator, RaycastInput, is_face_enabled,
    is_instance_enabled,
};
pub use mesh::{Edge, MeshCollection, MeshError, NO_FACE, NavMeshInstance};
