//! Visibility LOD hysteresis: per-element clip/LOD state that stays stable
//! when the camera distance jitters around a clip plane.
//!
//! The visibility collector calls [`HysteresisStore::is_clipped`] once per
//! visible element per frame. Each element carries a packed state byte
//! (region, LOD level, frame-history bits); the transition function widens
//! the effective near/far planes while an element is inside a region, so an
//! element oscillating around a plane does not flicker between clipped and
//! unclipped.

mod hysteresis;
mod store;

pub use hysteresis::{
    ClipTestKind, HysteresisRegion, HysteresisState, VisibilityData, clip_status, evaluate,
};
pub use store::{ElementClass, HysteresisStore, LodLevelProvider, NearFarOverride, ThresholdTable};
