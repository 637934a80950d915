//! The hysteresis transition function and its packed per-element state.

use caldera_math::Aabb;
use glam::Vec3;

// Bit layout of the packed state byte. Region in the low two bits, LOD level
// in the next four, frame-history flags on top.
const REGION_MASK: u8 = 0x3;
const LOD_LEVEL_SHIFT: u8 = 2;
const LOD_LEVEL_MASK: u8 = 0xf;
const CLIPPED_THIS_FRAME_BIT: u8 = 1 << 6;
const VISIBILITY_CHANGED_BIT: u8 = 1 << 7;

static_assertions::const_assert_eq!(REGION_MASK & (LOD_LEVEL_MASK << LOD_LEVEL_SHIFT), 0);
static_assertions::const_assert_eq!(
    (LOD_LEVEL_MASK << LOD_LEVEL_SHIFT) & (CLIPPED_THIS_FRAME_BIT | VISIBILITY_CHANGED_BIT),
    0
);

/// Which side of the near/far clip planes an element currently sits on.
///
/// New elements start out [`Uninitialized`](HysteresisRegion::Uninitialized)
/// and classify themselves on the first [`evaluate`] call; after that the
/// region is always one of the three real regions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HysteresisRegion {
    /// No evaluation has happened yet for this element.
    Uninitialized = 0,
    /// Closer than the near clip plane.
    BeforeNear = 1,
    /// Between the near and far clip planes.
    InBetween = 2,
    /// Farther than the far clip plane.
    BehindFar = 3,
}

impl HysteresisRegion {
    /// Decode from the low two bits of a packed state byte.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & REGION_MASK {
            0 => HysteresisRegion::Uninitialized,
            1 => HysteresisRegion::BeforeNear,
            2 => HysteresisRegion::InBetween,
            _ => HysteresisRegion::BehindFar,
        }
    }

    /// The two-bit encoding of this region.
    pub const fn to_bits(self) -> u8 {
        self as u8
    }
}

/// Per-element hysteresis state with named fields.
///
/// Packed into a single byte at the storage boundary (see
/// [`to_bits`](HysteresisState::to_bits)); everywhere else the fields are
/// explicit to keep bit-shift arithmetic out of the transition logic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HysteresisState {
    /// Current clip region.
    pub region: HysteresisRegion,
    /// LOD level stored on the last evaluation, always in `0..=15`.
    pub lod_level: u8,
    /// Whether the element was clipped by the most recent evaluation.
    pub clipped_this_frame: bool,
    /// Whether the element was clipped or changed LOD level on the previous
    /// evaluation. Consumed by LOD dissolve effects.
    pub visibility_changed: bool,
}

impl Default for HysteresisRegion {
    fn default() -> Self {
        HysteresisRegion::Uninitialized
    }
}

impl HysteresisState {
    /// Decode a packed state byte.
    pub const fn from_bits(bits: u8) -> Self {
        Self {
            region: HysteresisRegion::from_bits(bits),
            lod_level: (bits >> LOD_LEVEL_SHIFT) & LOD_LEVEL_MASK,
            clipped_this_frame: bits & CLIPPED_THIS_FRAME_BIT != 0,
            visibility_changed: bits & VISIBILITY_CHANGED_BIT != 0,
        }
    }

    /// Pack into a single byte. The LOD level is masked to four bits.
    pub const fn to_bits(&self) -> u8 {
        let mut bits = self.region.to_bits();
        bits |= (self.lod_level & LOD_LEVEL_MASK) << LOD_LEVEL_SHIFT;
        if self.clipped_this_frame {
            bits |= CLIPPED_THIS_FRAME_BIT;
        }
        if self.visibility_changed {
            bits |= VISIBILITY_CHANGED_BIT;
        }
        bits
    }
}

/// How the distance to the camera is measured for an element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipTestKind {
    /// Never distance-clipped.
    None,
    /// Distance from the camera to a reference point.
    Position,
    /// Distance from the camera to the element's bounding box.
    BoundingBox,
}

/// Per-element visibility snapshot supplied by the renderer.
///
/// `near_clip`/`far_clip` of 0.0 disable that side's test.
#[derive(Clone, Copy, Debug)]
pub struct VisibilityData {
    /// Bitmask matched against the collector's filter mask.
    pub visible_bitmask: u32,
    /// Element is excluded from visibility testing.
    pub excluded: bool,
    /// Element is inactive.
    pub inactive: bool,
    /// Distance mode for the clip test.
    pub clip_test: ClipTestKind,
    /// Reference point for [`ClipTestKind::Position`].
    pub clip_reference: Vec3,
    /// Bounds for [`ClipTestKind::BoundingBox`].
    pub bounds: Aabb,
    /// Near clip distance in world units; 0.0 disables near clipping.
    pub near_clip: f32,
    /// Far clip distance in world units; 0.0 disables far clipping.
    pub far_clip: f32,
}

impl VisibilityData {
    /// Visibility data using a point-distance clip test.
    pub fn point(clip_reference: Vec3, near_clip: f32, far_clip: f32) -> Self {
        Self {
            visible_bitmask: u32::MAX,
            excluded: false,
            inactive: false,
            clip_test: ClipTestKind::Position,
            clip_reference,
            bounds: Aabb::new(clip_reference, clip_reference),
            near_clip,
            far_clip,
        }
    }

    /// Visibility data using a bounding-box clip test.
    pub fn bounding_box(bounds: Aabb, near_clip: f32, far_clip: f32) -> Self {
        Self {
            visible_bitmask: u32::MAX,
            excluded: false,
            inactive: false,
            clip_test: ClipTestKind::BoundingBox,
            clip_reference: bounds.center(),
            bounds,
            near_clip,
            far_clip,
        }
    }
}

/// The hysteresis transition function.
///
/// Computes whether the element is clipped for this frame and advances its
/// state. The hysteresis band is asymmetric: entering a farther region
/// requires the squared distance to cross `(plane + threshold)²`, while
/// falling back only requires dropping below `plane²`. While an element is
/// inside a region, the effective planes used for the final clip decision are
/// widened by the threshold, which is what suppresses flicker at the exact
/// plane distance.
///
/// `near_plane`/`far_plane` are passed separately from `vis` so callers can
/// substitute per-element overrides; 0.0 disables that side. A threshold of
/// 0.0 (or less) collapses the band to hard plane tests.
#[allow(clippy::too_many_arguments)]
pub fn evaluate(
    state: &mut HysteresisState,
    lod_level: u8,
    vis: &VisibilityData,
    filter_mask: u32,
    camera_pos: Vec3,
    lod_scale_sqr: f32,
    near_plane: f32,
    far_plane: f32,
    threshold: f32,
) -> bool {
    if (vis.visible_bitmask & filter_mask) == 0 || vis.excluded || vis.inactive {
        return true;
    }

    let dist_sqr = match vis.clip_test {
        ClipTestKind::None => return false,
        ClipTestKind::Position => {
            camera_pos.distance_squared(vis.clip_reference) * lod_scale_sqr
        }
        ClipTestKind::BoundingBox => {
            vis.bounds.distance_squared_to_point(camera_pos) * lod_scale_sqr
        }
    };

    let mut near = near_plane;
    let mut far = far_plane;
    let outer_near = (near_plane + threshold) * (near_plane + threshold);
    let outer_far = (far_plane + threshold) * (far_plane + threshold);

    let mut region = state.region;
    match region {
        // An uninitialized element classifies through the before-near branch,
        // so it never stays uninitialized past its first evaluation.
        HysteresisRegion::Uninitialized | HysteresisRegion::BeforeNear => {
            if dist_sqr > outer_far {
                region = HysteresisRegion::BehindFar;
            } else if dist_sqr > outer_near {
                region = HysteresisRegion::InBetween;
            } else {
                region = HysteresisRegion::BeforeNear;
            }

            if near > 0.0 {
                near += threshold;
            }
            if far > 0.0 {
                far += threshold;
            }
        }

        HysteresisRegion::InBetween => {
            if dist_sqr > outer_far {
                region = HysteresisRegion::BehindFar;
            } else if dist_sqr <= near * near {
                region = HysteresisRegion::BeforeNear;
            }

            if far > 0.0 {
                far += threshold;
            }
        }

        HysteresisRegion::BehindFar => {
            if dist_sqr <= near * near {
                region = HysteresisRegion::BeforeNear;
            } else if dist_sqr <= far * far {
                region = HysteresisRegion::InBetween;
            }
        }
    }

    let clipped = (near > 0.0 && dist_sqr < near * near) || (far > 0.0 && dist_sqr >= far * far);

    // Age the current-frame clip bit into the history bit, then record this
    // frame. A LOD level change also marks the element for dissolve.
    state.visibility_changed = state.clipped_this_frame;
    state.clipped_this_frame = clipped;
    if state.lod_level != (lod_level & LOD_LEVEL_MASK) {
        state.visibility_changed = true;
    }

    state.region = region;
    state.lod_level = lod_level & LOD_LEVEL_MASK;

    clipped
}

/// Plain near/far clip test without hysteresis: returns `+1` when the
/// distance is before the near plane, `-1` when behind the far plane, and
/// `0` when visible. A plane of 0.0 disables that side.
pub fn clip_status(dist_sqr: f32, near_plane: f32, far_plane: f32) -> i8 {
    if near_plane > 0.0 && dist_sqr < near_plane * near_plane {
        1
    } else if far_plane > 0.0 && dist_sqr >= far_plane * far_plane {
        -1
    } else {
        0
    }
}
