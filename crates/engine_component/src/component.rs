//! Core [`Component`] trait and associated metadata.
//!
//! Every piece of data stored in the ECS must implement [`Component`]. The trait
//! requires `Send + Sync + 'static` so component columns can be moved between
//! archetype tables and handed out as typed views during query iteration.
//!
//! ## Type Identity
//!
//! [`ComponentTypeId`] is derived from the component's **string name** using
//! the FNV-1a 64-bit hash algorithm. Archetype signatures, query terms and
//! access descriptors are all keyed by this id. The Rust [`TypeId`] is kept
//! alongside in [`ComponentMeta`] to check typed column access.

use std::any::TypeId;

use serde::{Deserialize, Serialize};

/// A unique identifier for a component type, derived from its string name
/// using the FNV-1a 64-bit hash algorithm.
///
/// The ID is deterministic: the same name always hashes to the same
/// `ComponentTypeId`, across runs and across builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    /// FNV-1a 64-bit offset basis.
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    /// FNV-1a 64-bit prime.
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Compute the [`ComponentTypeId`] from a component's string name using
    /// the FNV-1a 64-bit hash algorithm.
    ///
    /// # Algorithm (FNV-1a 64-bit)
    ///
    /// ```text
    /// hash = 0xcbf29ce484222325          (offset basis)
    /// for each byte in name.as_bytes():
    ///     hash = hash XOR byte
    ///     hash = hash * 0x00000100000001b3  (prime)
    /// return hash
    /// ```
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Compute the [`ComponentTypeId`] for a Rust component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        T::component_type_id()
    }
}

/// Metadata about a component type, carried by every column so type-erased
/// storage can report and check what it holds.
#[derive(Debug, Clone, Copy)]
pub struct ComponentMeta {
    /// The hashed type identifier.
    pub type_id: ComponentTypeId,
    /// The Rust type identity, used to validate typed column access.
    pub rust_type: TypeId,
    /// The human-readable name of the component (e.g. `"Position"`).
    pub name: &'static str,
    /// Size and alignment of one component instance.
    pub layout: std::alloc::Layout,
}

impl ComponentMeta {
    /// Builds the metadata for `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        T::meta()
    }
}

/// The core component trait.
///
/// All data stored in the ECS must implement this trait. The only required
/// knowledge is a stable name; the default uses the Rust type path.
///
/// # Examples
///
/// ```rust
/// use engine_component::Component;
///
/// #[derive(Debug, Clone)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {
///     fn type_name() -> &'static str { "Health" }
/// }
/// ```
pub trait Component: Sized + Send + Sync + 'static {
    /// A human-readable name for this component type.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the [`ComponentTypeId`] for this component.
    ///
    /// The default implementation hashes [`Component::type_name()`] with
    /// FNV-1a 64-bit.
    fn component_type_id() -> ComponentTypeId {
        ComponentTypeId::from_name(Self::type_name())
    }

    /// Returns the [`ComponentMeta`] descriptor for this component type.
    fn meta() -> ComponentMeta {
        ComponentMeta {
            type_id: Self::component_type_id(),
            rust_type: TypeId::of::<Self>(),
            name: Self::type_name(),
            layout: std::alloc::Layout::new::<Self>(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Health {
        current: f32,
        max: f32,
    }

    impl Component for Health {
        fn type_name() -> &'static str {
            "Health"
        }
    }

    struct Marker;

    impl Component for Marker {}

    #[test]
    fn test_component_type_id_is_stable() {
        let id1 = Health::component_type_id();
        let id2 = Health::component_type_id();
        assert_eq!(id1, id2);
    }

    #[test]
    fn test_component_type_id_matches_from_name() {
        let from_trait = Health::component_type_id();
        let from_name = ComponentTypeId::from_name("Health");
        assert_eq!(from_trait, from_name);
        assert_eq!(ComponentTypeId::of::<Health>(), from_name);
    }

    #[test]
    fn test_default_type_name_uses_type_path() {
        assert!(Marker::type_name().ends_with("Marker"));
        assert_ne!(Marker::component_type_id(), Health::component_type_id());
    }

    #[test]
    fn test_fnv1a_known_vector() {
        // FNV-1a 64-bit of empty string is the offset basis itself.
        assert_eq!(
            ComponentTypeId::from_name(""),
            ComponentTypeId(0xcbf2_9ce4_8422_2325)
        );
    }

    #[test]
    fn test_component_meta() {
        let meta = Health::meta();
        assert_eq!(meta.name, "Health");
        assert_eq!(meta.layout, std::alloc::Layout::new::<Health>());
        assert_eq!(meta.rust_type, TypeId::of::<Health>());
        assert_eq!(meta.type_id, ComponentTypeId::from_name("Health"));
    }

    #[test]
    fn test_type_id_serialization_roundtrip() {
        let id = ComponentTypeId::from_name("Velocity");
        let json = serde_json::to_string(&id).unwrap();
        let restored: ComponentTypeId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }
}
