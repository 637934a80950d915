//! Per-element state storage and the threshold table.

use glam::Vec3;

use crate::hysteresis::{HysteresisRegion, HysteresisState, VisibilityData, evaluate};

/// Element classes tracked by the hysteresis store. Each class has its own
/// state array and its own threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementClass {
    /// Static world geometry.
    WorldGeometry = 0,
    /// Dynamic entities.
    Entity = 1,
}

impl ElementClass {
    /// Number of element classes.
    pub const COUNT: usize = 2;

    fn index(self) -> usize {
        self as usize
    }
}

/// One hysteresis distance threshold per element class.
///
/// All thresholds start at 0.0 (hysteresis disabled). The flat-slice
/// accessors exist for the scene serializer, which persists the table as a
/// plain float list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ThresholdTable {
    thresholds: [f32; ElementClass::COUNT],
}

impl ThresholdTable {
    /// Create a table with all thresholds disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Threshold in world units for the given class.
    pub fn threshold(&self, class: ElementClass) -> f32 {
        self.thresholds[class.index()]
    }

    /// Set the threshold in world units for the given class.
    pub fn set_threshold(&mut self, class: ElementClass, value: f32) {
        self.thresholds[class.index()] = value;
    }

    /// All thresholds as a flat slice, indexed by class.
    pub fn thresholds(&self) -> &[f32] {
        &self.thresholds
    }

    /// Overwrite thresholds from a flat slice, indexed by class.
    /// Extra entries are ignored; missing entries keep their current value.
    pub fn set_thresholds(&mut self, values: &[f32]) {
        for (slot, &value) in self.thresholds.iter_mut().zip(values) {
            *slot = value;
        }
    }
}

/// Per-element near/far plane override. Zeros mean "no override".
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NearFarOverride {
    /// Near clip distance override; 0.0 = none.
    pub near: f32,
    /// Far clip distance override; 0.0 = none.
    pub far: f32,
}

/// Implemented by engine components that expose a current LOD level, so the
/// visibility collector can match submesh LOD indices against the stored
/// level.
pub trait LodLevelProvider {
    /// The component's current LOD level.
    fn lod_level(&self) -> u8;
}

/// Owns the packed state byte and optional near/far override for every
/// `(class, element id)` pair.
///
/// Storage grows lazily and monotonically: touching element id `n` sizes the
/// backing array to at least `n + 1` slots, zero-initialized
/// (= uninitialized region, LOD 0). Slots are never reclaimed; when the host
/// destroys an element, [`on_element_destroyed`](Self::on_element_destroyed)
/// resets the slot so a later element reusing the id starts fresh.
///
/// [`is_clipped`](Self::is_clipped) is the only entry point that runs the
/// transition function, and it persists the result: calling it twice in one
/// frame with different distances produces two different, both-persisted
/// states. One authoritative caller per element per frame is assumed.
#[derive(Debug, Default)]
pub struct HysteresisStore {
    states: [Vec<u8>; ElementClass::COUNT],
    near_far: [Vec<NearFarOverride>; ElementClass::COUNT],
    thresholds: ThresholdTable,
}

impl HysteresisStore {
    /// Create an empty store with all thresholds disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// The threshold table.
    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    /// Mutable access to the threshold table.
    pub fn thresholds_mut(&mut self) -> &mut ThresholdTable {
        &mut self.thresholds
    }

    /// Set the hysteresis threshold for one element class.
    pub fn set_threshold(&mut self, class: ElementClass, value: f32) {
        self.thresholds.set_threshold(class, value);
    }

    fn ensure_size(&mut self, class: ElementClass, element_id: usize) {
        let states = &mut self.states[class.index()];
        if states.len() <= element_id {
            log::trace!(
                "growing {class:?} hysteresis states from {} to {}",
                states.len(),
                element_id + 1
            );
            states.resize(element_id + 1, 0);
        }
    }

    fn ensure_near_far_size(&mut self, class: ElementClass, element_id: usize) {
        let overrides = &mut self.near_far[class.index()];
        if overrides.len() <= element_id {
            overrides.resize(element_id + 1, NearFarOverride::default());
        }
    }

    /// Decoded state of the given element. Grows the backing storage.
    pub fn state(&mut self, class: ElementClass, element_id: usize) -> HysteresisState {
        HysteresisState::from_bits(self.raw_state(class, element_id))
    }

    /// Packed state byte of the given element. Grows the backing storage.
    pub fn raw_state(&mut self, class: ElementClass, element_id: usize) -> u8 {
        self.ensure_size(class, element_id);
        self.states[class.index()][element_id]
    }

    /// Current hysteresis region of the given element. Grows the backing
    /// storage.
    pub fn region(&mut self, class: ElementClass, element_id: usize) -> HysteresisRegion {
        HysteresisRegion::from_bits(self.raw_state(class, element_id))
    }

    /// Store a state for the given element, optionally with a near/far
    /// override. Grows the backing storage.
    pub fn set_state(
        &mut self,
        class: ElementClass,
        element_id: usize,
        state: HysteresisState,
        near_far: Option<NearFarOverride>,
    ) {
        self.ensure_size(class, element_id);
        self.states[class.index()][element_id] = state.to_bits();

        if let Some(setting) = near_far {
            self.ensure_near_far_size(class, element_id);
            self.near_far[class.index()][element_id] = setting;
        }
    }

    /// LOD level stored for the given element, in `0..=15`. Read-only:
    /// returns 0 for ids beyond the current storage size without growing.
    pub fn lod_level(&self, class: ElementClass, element_id: usize) -> u8 {
        match self.states[class.index()].get(element_id) {
            Some(&bits) => HysteresisState::from_bits(bits).lod_level,
            None => 0,
        }
    }

    /// Near/far override for the given element. Grows the backing storage;
    /// zeros mean no override was set.
    pub fn near_far(&mut self, class: ElementClass, element_id: usize) -> NearFarOverride {
        self.ensure_near_far_size(class, element_id);
        self.near_far[class.index()][element_id]
    }

    /// A submesh is visible when its LOD index matches the element's stored
    /// LOD level.
    pub fn is_submesh_visible(
        &self,
        class: ElementClass,
        element_id: usize,
        submesh_lod: u8,
    ) -> bool {
        submesh_lod == self.lod_level(class, element_id)
    }

    /// Near/far clip test with hysteresis, using the clip distances carried
    /// in `vis`. Runs the transition function and persists the updated state
    /// for the element. Not idempotent.
    pub fn is_clipped(
        &mut self,
        class: ElementClass,
        element_id: usize,
        lod_level: u8,
        vis: &VisibilityData,
        filter_mask: u32,
        camera_pos: Vec3,
        lod_scale_sqr: f32,
    ) -> bool {
        self.is_clipped_with_planes(
            class,
            element_id,
            lod_level,
            vis,
            filter_mask,
            camera_pos,
            lod_scale_sqr,
            vis.near_clip,
            vis.far_clip,
        )
    }

    /// [`is_clipped`](Self::is_clipped) with explicit near/far planes,
    /// bypassing the distances carried in `vis`.
    #[allow(clippy::too_many_arguments)]
    pub fn is_clipped_with_planes(
        &mut self,
        class: ElementClass,
        element_id: usize,
        lod_level: u8,
        vis: &VisibilityData,
        filter_mask: u32,
        camera_pos: Vec3,
        lod_scale_sqr: f32,
        near_plane: f32,
        far_plane: f32,
    ) -> bool {
        self.ensure_size(class, element_id);
        let threshold = self.thresholds.threshold(class);

        let slot = &mut self.states[class.index()][element_id];
        let mut state = HysteresisState::from_bits(*slot);
        let clipped = evaluate(
            &mut state,
            lod_level,
            vis,
            filter_mask,
            camera_pos,
            lod_scale_sqr,
            near_plane,
            far_plane,
            threshold,
        );
        *slot = state.to_bits();
        clipped
    }

    /// Whether the element was clipped or changed LOD level last frame.
    /// Consumed by LOD dissolve effects. Grows the backing storage.
    pub fn became_visible(&mut self, class: ElementClass, element_id: usize) -> bool {
        self.state(class, element_id).visibility_changed
    }

    /// Host lifecycle hook: the element with this id was destroyed. Resets
    /// the slot so a later element reusing the id starts uninitialized.
    /// Storage is not compacted.
    pub fn on_element_destroyed(&mut self, class: ElementClass, element_id: usize) {
        if let Some(slot) = self.states[class.index()].get_mut(element_id) {
            *slot = 0;
        }
        if let Some(setting) = self.near_far[class.index()].get_mut(element_id) {
            *setting = NearFarOverride::default();
        }
    }

    /// Number of slots currently allocated for a class.
    pub fn len(&self, class: ElementClass) -> usize {
        self.states[class.index()].len()
    }

    /// Returns true if no slots have been allocated for the class.
    pub fn is_empty(&self, class: ElementClass) -> bool {
        self.states[class.index()].is_empty()
    }
}
