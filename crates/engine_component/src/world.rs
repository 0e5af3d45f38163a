//! World state storage.
//!
//! The [`World`] holds the canonical entity and archetype data: entity
//! allocation, the archetype tables in creation order, each entity's location,
//! and the change tick stamped onto every write.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use crate::archetype::{ArchetypeTable, Column};
use crate::bundle::Bundle;
use crate::component::{Component, ComponentTypeId};
use crate::entity::{Entity, EntityAllocator};
use crate::error::WorldError;
use crate::tick::Tick;

/// Where an entity's components live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLocation {
    /// Index of the archetype table in [`World::archetypes`].
    pub table: usize,
    /// Row inside that table.
    pub row: usize,
}

static NEXT_WORLD_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one [`World`] for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorldId(u64);

/// The canonical world state.
///
/// Tables are never removed, so a table index stays valid for the lifetime
/// of the world and iteration order follows table creation order.
#[derive(Debug)]
pub struct World {
    /// Unique per world instance.
    id: WorldId,
    /// Entity ID allocator.
    allocator: EntityAllocator,
    /// All archetype tables, in creation order. Index 0 is the empty archetype.
    archetypes: Vec<ArchetypeTable>,
    /// Maps each entity to its table and row.
    locations: HashMap<Entity, EntityLocation>,
    /// Maps component type sets to table indices, for fast lookup.
    type_set_to_archetype: HashMap<BTreeSet<ComponentTypeId>, usize>,
    /// Tick stamped onto component writes.
    change_tick: Tick,
    /// Bumped whenever a table is created.
    archetype_generation: u64,
}

impl World {
    /// Create a new world holding only the empty archetype.
    ///
    /// The change tick starts at 1 so every stamp is newer than [`Tick::ZERO`].
    #[must_use]
    pub fn new() -> Self {
        let mut type_set_to_archetype = HashMap::new();
        type_set_to_archetype.insert(BTreeSet::new(), 0);
        Self {
            id: WorldId(NEXT_WORLD_ID.fetch_add(1, Ordering::Relaxed)),
            allocator: EntityAllocator::new(),
            archetypes: vec![ArchetypeTable::new(Vec::new())],
            locations: HashMap::new(),
            type_set_to_archetype,
            change_tick: Tick(1),
            archetype_generation: 1,
        }
    }

    /// Allocate a new entity without any components.
    ///
    /// The entity lives in the empty archetype until components are added.
    pub fn spawn_empty(&mut self) -> Entity {
        let entity = self.allocator.allocate();
        let row = self.archetypes[0].push_entity(entity);
        self.locations.insert(entity, EntityLocation { table: 0, row });
        entity
    }

    /// Allocate a new entity carrying every component of `bundle`.
    ///
    /// Every component is stamped added and changed at the current tick.
    ///
    /// # Panics
    ///
    /// Panics if the bundle names the same component type twice.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Entity {
        let columns = B::empty_columns();
        let types: BTreeSet<ComponentTypeId> = columns.iter().map(Column::component_type_id).collect();
        assert_eq!(
            types.len(),
            columns.len(),
            "a bundle cannot contain the same component twice"
        );

        let table = match self.type_set_to_archetype.get(&types) {
            Some(&index) => index,
            None => self.create_archetype(types, columns),
        };

        let entity = self.allocator.allocate();
        let tick = self.change_tick;
        let archetype = &mut self.archetypes[table];
        let row = archetype.push_entity(entity);
        bundle.write_into(archetype, tick);

        self.locations.insert(entity, EntityLocation { table, row });
        entity
    }

    /// Destroy an entity, removing it from its archetype. Its slot is
    /// reused under a new generation, so `entity` stays dead.
    ///
    /// Returns `true` if the entity existed and was removed.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        let Some(location) = self.locations.remove(&entity) else {
            return false;
        };
        self.allocator.free(entity);
        if let Some(swapped) = self.archetypes[location.table].swap_remove(location.row) {
            self.locations.insert(swapped, location);
        }
        true
    }

    /// Attach `value` to `entity`, or overwrite the existing value.
    ///
    /// A newly attached component is stamped added and changed; an overwrite
    /// only stamps changed. Attaching moves the entity to the archetype that
    /// also stores `T`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::EntityNotFound`] if the entity does not exist.
    pub fn insert<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), WorldError> {
        let location = self
            .location(entity)
            .ok_or(WorldError::EntityNotFound(entity))?;
        let tick = self.change_tick;
        let type_id = T::component_type_id();

        if let Some(column) = self.archetypes[location.table].column_mut(type_id) {
            if let Some(slot) = column.get_mut::<T>(location.row) {
                *slot = value;
            }
            column.set_changed(location.row, tick);
            return Ok(());
        }

        let mut types = self.archetypes[location.table].component_types().clone();
        types.insert(type_id);
        let target = match self.type_set_to_archetype.get(&types) {
            Some(&index) => index,
            None => {
                let mut columns = self.archetypes[location.table].empty_columns();
                columns.push(Column::new::<T>());
                self.create_archetype(types, columns)
            }
        };

        let (src, dst) = pair_mut(&mut self.archetypes, location.table, target);
        let moved = src.move_row_to(location.row, dst);
        if let Some(column) = dst.column_mut(type_id) {
            column.push(value, tick);
        }
        let new_row = dst.len() - 1;

        trace!(
            %entity,
            component = T::type_name(),
            from = location.table,
            to = target,
            "component inserted, entity moved"
        );
        self.relocate(entity, location, target, new_row, moved.swapped_in);
        Ok(())
    }

    /// Overwrite an existing component and stamp it changed.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::EntityNotFound`] or
    /// [`WorldError::ComponentNotFound`] if there is nothing to overwrite.
    pub fn set<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), WorldError> {
        if !self.contains(entity) {
            return Err(WorldError::EntityNotFound(entity));
        }
        let slot = self
            .get_mut::<T>(entity)
            .ok_or_else(|| missing_component::<T>(entity))?;
        *slot = value;
        Ok(())
    }

    /// Detach `T` from `entity` and return it.
    ///
    /// Returns `Ok(None)` if the entity does not carry `T`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::EntityNotFound`] if the entity does not exist.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Result<Option<T>, WorldError> {
        let location = self
            .location(entity)
            .ok_or(WorldError::EntityNotFound(entity))?;
        let type_id = T::component_type_id();
        if !self.archetypes[location.table].has_component(type_id) {
            return Ok(None);
        }

        let mut types = self.archetypes[location.table].component_types().clone();
        types.remove(&type_id);
        let target = match self.type_set_to_archetype.get(&types) {
            Some(&index) => index,
            None => {
                let columns = self.archetypes[location.table]
                    .columns()
                    .iter()
                    .filter(|column| column.component_type_id() != type_id)
                    .map(Column::empty_like)
                    .collect();
                self.create_archetype(types, columns)
            }
        };

        let (src, dst) = pair_mut(&mut self.archetypes, location.table, target);
        let moved = src.move_row_to(location.row, dst);
        let new_row = dst.len() - 1;

        trace!(
            %entity,
            component = T::type_name(),
            from = location.table,
            to = target,
            "component removed, entity moved"
        );
        self.relocate(entity, location, target, new_row, moved.swapped_in);

        Ok(moved
            .leftovers
            .into_iter()
            .find(|(id, _)| *id == type_id)
            .and_then(|(_, value)| value.downcast::<T>().ok())
            .map(|value| *value))
    }

    /// Returns `true` if the entity exists.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.locations.contains_key(&entity)
    }

    /// Returns `true` if the entity carries `T`.
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.location(entity)
            .is_some_and(|loc| self.archetypes[loc.table].has_component(T::component_type_id()))
    }

    /// Read a component.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        let location = self.location(entity)?;
        self.archetypes[location.table]
            .column(T::component_type_id())?
            .get::<T>(location.row)
    }

    /// Write access to a component. Stamps the component changed at the
    /// current tick.
    #[must_use]
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let location = self.location(entity)?;
        let tick = self.change_tick;
        let column = self.archetypes[location.table].column_mut(T::component_type_id())?;
        column.set_changed(location.row, tick);
        column.get_mut::<T>(location.row)
    }

    /// Tick at which `T` was attached to `entity`.
    #[must_use]
    pub fn added_tick<T: Component>(&self, entity: Entity) -> Option<Tick> {
        let location = self.location(entity)?;
        self.archetypes[location.table]
            .column(T::component_type_id())?
            .added_tick(location.row)
    }

    /// Tick of the last write to `T` on `entity`.
    #[must_use]
    pub fn changed_tick<T: Component>(&self, entity: Entity) -> Option<Tick> {
        let location = self.location(entity)?;
        self.archetypes[location.table]
            .column(T::component_type_id())?
            .changed_tick(location.row)
    }

    /// The tick stamped onto writes made now.
    #[must_use]
    pub fn change_tick(&self) -> Tick {
        self.change_tick
    }

    /// Advance the change tick and return the new value.
    ///
    /// A consumer running with `this_run` set to the returned tick sees every
    /// write stamped before the call.
    pub fn increment_change_tick(&mut self) -> Tick {
        self.change_tick = self.change_tick.next();
        self.change_tick
    }

    /// The id of this world. No two worlds share one.
    #[must_use]
    pub fn id(&self) -> WorldId {
        self.id
    }

    /// Counter bumped each time an archetype table is created.
    #[must_use]
    pub fn archetype_generation(&self) -> u64 {
        self.archetype_generation
    }

    /// Returns the table and row of an entity.
    #[must_use]
    pub fn location(&self, entity: Entity) -> Option<EntityLocation> {
        self.locations.get(&entity).copied()
    }

    /// Returns a reference to an archetype table by index.
    #[must_use]
    pub fn archetype(&self, index: usize) -> Option<&ArchetypeTable> {
        self.archetypes.get(index)
    }

    /// All archetype tables, in creation order.
    #[must_use]
    pub fn archetypes(&self) -> &[ArchetypeTable] {
        &self.archetypes
    }

    /// All archetype tables, mutably. Rows cannot be added or removed through
    /// this view.
    pub fn archetypes_mut(&mut self) -> &mut [ArchetypeTable] {
        &mut self.archetypes
    }

    /// Returns the total number of entities in the world.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.locations.len()
    }

    /// Returns the number of archetypes in the world.
    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Find all archetypes that contain ALL of the given required component types.
    #[must_use]
    pub fn matching_archetypes(&self, required: &[ComponentTypeId]) -> Vec<usize> {
        self.archetypes
            .iter()
            .enumerate()
            .filter(|(_, table)| required.iter().all(|ty| table.has_component(*ty)))
            .map(|(index, _)| index)
            .collect()
    }

    fn create_archetype(&mut self, types: BTreeSet<ComponentTypeId>, columns: Vec<Column>) -> usize {
        let table = ArchetypeTable::new(columns);
        let index = self.archetypes.len();
        debug!(
            archetype = index,
            components = types.len(),
            id = table.id.0,
            "created archetype"
        );
        self.archetypes.push(table);
        self.type_set_to_archetype.insert(types, index);
        self.archetype_generation += 1;
        index
    }

    fn relocate(
        &mut self,
        entity: Entity,
        old: EntityLocation,
        table: usize,
        row: usize,
        swapped_in: Option<Entity>,
    ) {
        self.locations.insert(entity, EntityLocation { table, row });
        if let Some(swapped) = swapped_in {
            self.locations.insert(swapped, old);
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

fn missing_component<T: Component>(entity: Entity) -> WorldError {
    WorldError::ComponentNotFound {
        entity,
        component: T::type_name(),
    }
}

/// Borrow two distinct elements of a slice mutably.
fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    assert_ne!(a, b, "source and destination archetype must differ");
    if a < b {
        let (left, right) = items.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position(f32);
    impl Component for Position {
        fn type_name() -> &'static str {
            "Position"
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity(f32);
    impl Component for Velocity {
        fn type_name() -> &'static str {
            "Velocity"
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Name(String);
    impl Component for Name {}

    #[test]
    fn test_spawn_empty() {
        let mut world = World::new();
        let e = world.spawn_empty();
        assert!(e.is_valid());
        assert_eq!(world.entity_count(), 1);
        assert_eq!(world.location(e), Some(EntityLocation { table: 0, row: 0 }));
    }

    #[test]
    fn test_spawn_with_components() {
        let mut world = World::new();
        let e = world.spawn((Position(1.0), Velocity(2.0)));
        assert!(e.is_valid());
        assert_eq!(world.entity_count(), 1);
        assert_eq!(world.archetype_count(), 2);
        assert_eq!(world.get::<Position>(e), Some(&Position(1.0)));
        assert_eq!(world.get::<Velocity>(e), Some(&Velocity(2.0)));
        assert_eq!(world.added_tick::<Position>(e), Some(Tick(1)));
    }

    #[test]
    fn test_same_bundle_shares_archetype() {
        let mut world = World::new();
        world.spawn((Position(1.0), Velocity(2.0)));
        world.spawn((Velocity(3.0), Position(4.0)));
        assert_eq!(world.archetype_count(), 2);
        assert_eq!(world.archetypes()[1].len(), 2);
    }

    #[test]
    #[should_panic(expected = "same component twice")]
    fn test_duplicate_bundle_panics() {
        let mut world = World::new();
        world.spawn((Position(1.0), Position(2.0)));
    }

    #[test]
    fn test_despawn() {
        let mut world = World::new();
        let e = world.spawn((Position(1.0),));
        assert!(world.despawn(e));
        assert!(!world.despawn(e));
        assert_eq!(world.entity_count(), 0);
        assert!(!world.contains(e));
    }

    #[test]
    fn test_stale_handle_after_slot_reuse() {
        let mut world = World::new();
        let old = world.spawn((Position(1.0),));
        assert!(world.despawn(old));
        let new = world.spawn((Position(2.0),));

        assert_eq!(new.index(), old.index());
        assert_ne!(new, old);
        assert!(!world.contains(old));
        assert_eq!(world.get::<Position>(old), None);
        assert!(!world.despawn(old));
        assert_eq!(world.get::<Position>(new), Some(&Position(2.0)));
    }

    #[test]
    fn test_world_ids_are_unique() {
        let a = World::new();
        let b = World::new();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.archetype_generation(), b.archetype_generation());
    }

    #[test]
    fn test_despawn_updates_swapped_location() {
        let mut world = World::new();
        let a = world.spawn((Position(1.0),));
        let b = world.spawn((Position(2.0),));
        let c = world.spawn((Position(3.0),));
        world.despawn(a);
        assert_eq!(world.get::<Position>(c), Some(&Position(3.0)));
        assert_eq!(world.location(c).unwrap().row, 0);
        assert_eq!(world.get::<Position>(b), Some(&Position(2.0)));
    }

    #[test]
    fn test_insert_moves_entity_and_stamps_added() {
        let mut world = World::new();
        let e = world.spawn((Position(1.0),));
        world.increment_change_tick();
        world.insert(e, Velocity(5.0)).unwrap();

        assert!(world.has::<Velocity>(e));
        assert_eq!(world.get::<Position>(e), Some(&Position(1.0)));
        assert_eq!(world.added_tick::<Position>(e), Some(Tick(1)));
        assert_eq!(world.added_tick::<Velocity>(e), Some(Tick(2)));
        assert_eq!(world.changed_tick::<Velocity>(e), Some(Tick(2)));
        assert_eq!(world.archetypes()[1].len(), 0);
    }

    #[test]
    fn test_insert_overwrite_only_stamps_changed() {
        let mut world = World::new();
        let e = world.spawn((Position(1.0),));
        world.increment_change_tick();
        world.insert(e, Position(2.0)).unwrap();
        assert_eq!(world.get::<Position>(e), Some(&Position(2.0)));
        assert_eq!(world.added_tick::<Position>(e), Some(Tick(1)));
        assert_eq!(world.changed_tick::<Position>(e), Some(Tick(2)));
    }

    #[test]
    fn test_insert_unknown_entity() {
        let mut world = World::new();
        let err = world.insert(Entity(99), Position(0.0)).unwrap_err();
        assert_eq!(err, WorldError::EntityNotFound(Entity(99)));
    }

    #[test]
    fn test_remove_returns_value() {
        let mut world = World::new();
        let e = world.spawn((Position(1.0), Name("ship".into())));
        let other = world.spawn((Position(7.0), Name("rock".into())));

        let removed = world.remove::<Name>(e).unwrap();
        assert_eq!(removed, Some(Name("ship".into())));
        assert!(!world.has::<Name>(e));
        assert_eq!(world.get::<Position>(e), Some(&Position(1.0)));
        assert_eq!(world.get::<Name>(other), Some(&Name("rock".into())));
        assert_eq!(world.remove::<Name>(e).unwrap(), None);
    }

    #[test]
    fn test_get_mut_stamps_changed() {
        let mut world = World::new();
        let e = world.spawn((Position(1.0),));
        world.increment_change_tick();
        world.increment_change_tick();
        world.get_mut::<Position>(e).unwrap().0 = 4.0;
        assert_eq!(world.changed_tick::<Position>(e), Some(Tick(3)));
        assert_eq!(world.added_tick::<Position>(e), Some(Tick(1)));
    }

    #[test]
    fn test_set_requires_component() {
        let mut world = World::new();
        let e = world.spawn((Position(1.0),));
        assert!(world.set(e, Position(2.0)).is_ok());
        let err = world.set(e, Velocity(1.0)).unwrap_err();
        assert!(matches!(err, WorldError::ComponentNotFound { component: "Velocity", .. }));
    }

    #[test]
    fn test_archetype_generation_tracks_new_tables() {
        let mut world = World::new();
        let start = world.archetype_generation();
        world.spawn((Position(1.0),));
        assert_eq!(world.archetype_generation(), start + 1);
        world.spawn((Position(2.0),));
        assert_eq!(world.archetype_generation(), start + 1);
    }

    #[test]
    fn test_matching_archetypes() {
        let mut world = World::new();
        world.spawn((Position(1.0), Velocity(1.0)));
        world.spawn((Position(1.0),));

        let matches = world.matching_archetypes(&[Position::component_type_id()]);
        assert_eq!(matches.len(), 2);

        let matches = world.matching_archetypes(&[
            Position::component_type_id(),
            Velocity::component_type_id(),
        ]);
        assert_eq!(matches, vec![1]);
    }
}
