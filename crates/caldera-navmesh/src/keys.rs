//! Packed face and edge keys.
//!
//! A key bundles the owning instance's runtime index with the face or edge
//! index inside that instance, so query results stay meaningful across a
//! collection of meshes. Keys are opaque to callers; the distinguished
//! `INVALID` value means "no result".

/// Number of low bits holding the element index; the rest hold the instance
/// runtime index.
const ELEMENT_BITS: u32 = 20;
const ELEMENT_MASK: u32 = (1 << ELEMENT_BITS) - 1;

/// The all-ones pattern is the `INVALID` sentinel, so the top instance
/// index is reserved: packing it with the maximum element index would
/// collide with `INVALID`.
const MAX_INSTANCES: u32 = (1 << (32 - ELEMENT_BITS)) - 1;

/// Opaque identifier of a navmesh face within a collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceKey(u32);

/// Opaque identifier of a navmesh edge within a collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey(u32);

macro_rules! impl_packed_key {
    ($name:ident) => {
        impl $name {
            /// The sentinel "no result" key.
            pub const INVALID: $name = $name(u32::MAX);

            /// Pack an instance runtime index and an element index.
            ///
            /// # Panics
            ///
            /// Panics in debug builds when the element index exceeds its
            /// bit budget or the instance index is at or past the reserved
            /// top value.
            pub fn new(instance_index: u32, element_index: u32) -> Self {
                debug_assert!(
                    instance_index < MAX_INSTANCES,
                    "instance index {instance_index} out of range"
                );
                debug_assert!(
                    element_index <= ELEMENT_MASK,
                    "element index {element_index} out of range"
                );
                $name((instance_index << ELEMENT_BITS) | (element_index & ELEMENT_MASK))
            }

            /// Runtime index of the owning instance.
            pub fn instance_index(self) -> u32 {
                self.0 >> ELEMENT_BITS
            }

            /// Index of the face/edge inside its instance.
            pub fn element_index(self) -> u32 {
                self.0 & ELEMENT_MASK
            }

            /// False for the `INVALID` sentinel.
            pub fn is_valid(self) -> bool {
                self.0 != u32::MAX
            }
        }
    };
}

impl_packed_key!(FaceKey);
impl_packed_key!(EdgeKey);
