//! Generation-tagged entity handles.
//!
//! An [`Entity`] packs a slot index (low 32 bits) and a 16-bit generation
//! (bits 32..48). Despawning bumps the slot's generation before the slot is
//! reused, so a handle kept past its entity's despawn no longer resolves.

use serde::{Deserialize, Serialize};

const INDEX_MASK: u64 = 0xFFFF_FFFF;
const GENERATION_SHIFT: u32 = 32;
const GENERATION_MASK: u64 = 0xFFFF << GENERATION_SHIFT;

/// A handle to an entity: slot index plus generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(pub u64);

impl Entity {
    /// The null handle. Slot 0 is never allocated.
    pub const INVALID: Entity = Entity(0);

    /// Packs a slot index and generation.
    #[must_use]
    pub const fn new(index: u32, generation: u16) -> Self {
        Self(index as u64 | ((generation as u64) << GENERATION_SHIFT))
    }

    /// The slot index.
    #[must_use]
    pub const fn index(self) -> u32 {
        (self.0 & INDEX_MASK) as u32
    }

    /// How many times the slot was recycled before this handle was issued.
    #[must_use]
    pub const fn generation(self) -> u16 {
        ((self.0 & GENERATION_MASK) >> GENERATION_SHIFT) as u16
    }

    /// Returns `false` for [`Entity::INVALID`] and any handle to slot 0.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.index() != 0
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

/// Hands out entity slots, recycling despawned ones with a new generation.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    /// Current generation per slot. Slot 0 is the reserved null slot.
    generations: Vec<u16>,
    /// Despawned slots waiting for reuse.
    free: Vec<u32>,
}

impl EntityAllocator {
    /// Creates an allocator whose first handle is slot 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            generations: vec![0],
            free: Vec::new(),
        }
    }

    /// Allocates a handle, reusing the most recently freed slot first.
    pub fn allocate(&mut self) -> Entity {
        if let Some(index) = self.free.pop() {
            return Entity::new(index, self.generations[index as usize]);
        }
        let index = self.generations.len() as u32;
        self.generations.push(0);
        Entity::new(index, 0)
    }

    /// Returns `true` if `entity` is the current handle of a live slot.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        entity.is_valid()
            && self
                .generations
                .get(entity.index() as usize)
                .is_some_and(|&generation| generation == entity.generation())
            && !self.free.contains(&entity.index())
    }

    /// Releases the slot of `entity`. Returns `false` for stale or unknown
    /// handles.
    pub fn free(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let index = entity.index();
        let generation = &mut self.generations[index as usize];
        *generation = generation.wrapping_add(1);
        self.free.push(index);
        true
    }

    /// Number of live handles.
    #[must_use]
    pub fn alive(&self) -> usize {
        self.generations.len().saturating_sub(1) - self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_index_and_generation() {
        let e = Entity::new(42, 3);
        assert_eq!(e.index(), 42);
        assert_eq!(e.generation(), 3);
        assert!(e.is_valid());
        assert_eq!(e.to_string(), "42v3");
        assert!(!Entity::INVALID.is_valid());
    }

    #[test]
    fn test_fresh_slots_start_at_one() {
        let mut alloc = EntityAllocator::new();
        assert_eq!(alloc.allocate(), Entity::new(1, 0));
        assert_eq!(alloc.allocate(), Entity::new(2, 0));
        assert_eq!(alloc.alive(), 2);
    }

    #[test]
    fn test_freed_slot_comes_back_with_next_generation() {
        let mut alloc = EntityAllocator::new();
        let first = alloc.allocate();
        let _second = alloc.allocate();

        assert!(alloc.free(first));
        assert!(!alloc.is_alive(first));
        assert!(!alloc.free(first));
        assert_eq!(alloc.alive(), 1);

        let reused = alloc.allocate();
        assert_eq!(reused.index(), first.index());
        assert_eq!(reused.generation(), 1);
        assert_ne!(reused, first);
        assert!(alloc.is_alive(reused));
        assert!(!alloc.is_alive(first));
    }

    #[test]
    fn test_generation_wraps() {
        let mut alloc = EntityAllocator::new();
        let mut e = alloc.allocate();
        for _ in 0..=u16::MAX {
            assert!(alloc.free(e));
            e = alloc.allocate();
        }
        assert_eq!(e.generation(), 0);
        assert_eq!(e.index(), 1);
    }

    #[test]
    fn test_unknown_handles_are_not_alive() {
        let alloc = EntityAllocator::new();
        assert!(!alloc.is_alive(Entity::INVALID));
        assert!(!alloc.is_alive(Entity::new(7, 0)));
    }

    #[test]
    fn test_entity_serialization_roundtrip() {
        let entity = Entity::new(999, 4);
        let json = serde_json::to_string(&entity).unwrap();
        let restored: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(entity, restored);
    }
}
