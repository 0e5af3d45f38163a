//! Archetype definitions and storage.
//!
//! An archetype is a unique combination of component types. Entities sharing
//! the same set of components are grouped into the same [`ArchetypeTable`] so
//! queries can walk whole columns at a time.
//!
//! Every [`Column`] stores its typed values next to two tick arrays of the same
//! length: `added_ticks[row]` is stamped once when the component is attached,
//! `changed_ticks[row]` on every write (including the attach).

use std::any::Any;
use std::collections::BTreeSet;
use std::ptr::NonNull;

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentMeta, ComponentTypeId};
use crate::entity::Entity;
use crate::tick::Tick;

/// A unique identifier for an archetype, computed from its sorted set of
/// [`ComponentTypeId`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchetypeId(pub u64);

impl ArchetypeId {
    /// Compute the archetype ID from a set of component type IDs.
    ///
    /// The result is deterministic: the same set of types always produces the
    /// same archetype ID regardless of insertion order.
    #[must_use]
    pub fn from_component_types(types: &BTreeSet<ComponentTypeId>) -> Self {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for ty in types {
            ty.hash(&mut hasher);
        }
        Self(hasher.finish())
    }
}

/// Type-erased backing vector of a [`Column`].
trait ColumnStorage: Send + Sync {
    fn len(&self) -> usize;
    fn swap_remove(&mut self, row: usize);
    fn swap_remove_boxed(&mut self, row: usize) -> Box<dyn Any + Send>;
    fn swap_remove_into(&mut self, row: usize, dst: &mut dyn ColumnStorage);
    fn empty_like(&self) -> Box<dyn ColumnStorage>;
    fn data_ptr(&mut self) -> NonNull<u8>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct TypedStorage<T>(Vec<T>);

impl<T: Component> ColumnStorage for TypedStorage<T> {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn swap_remove(&mut self, row: usize) {
        self.0.swap_remove(row);
    }

    fn swap_remove_boxed(&mut self, row: usize) -> Box<dyn Any + Send> {
        Box::new(self.0.swap_remove(row))
    }

    fn swap_remove_into(&mut self, row: usize, dst: &mut dyn ColumnStorage) {
        let value = self.0.swap_remove(row);
        let Some(dst) = dst.as_any_mut().downcast_mut::<TypedStorage<T>>() else {
            panic!(
                "column type mismatch while moving `{}` between archetypes",
                T::type_name()
            );
        };
        dst.0.push(value);
    }

    fn empty_like(&self) -> Box<dyn ColumnStorage> {
        Box::new(TypedStorage::<T>(Vec::new()))
    }

    fn data_ptr(&mut self) -> NonNull<u8> {
        NonNull::from(self.0.as_mut_slice()).cast::<u8>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Raw view of one column, handed to query cursors.
///
/// The pointers stay valid until the column is next pushed to, removed from,
/// or dropped. `data` points at `len` values of the type described by `meta`.
#[derive(Debug, Clone, Copy)]
pub struct ColumnParts {
    /// Metadata of the stored component type.
    pub meta: ComponentMeta,
    /// First value of the column.
    pub data: NonNull<u8>,
    /// First entry of the added-tick array.
    pub added_ticks: NonNull<Tick>,
    /// First entry of the changed-tick array.
    pub changed_ticks: NonNull<Tick>,
    /// Number of rows.
    pub len: usize,
}

/// A column in an archetype table, storing components of a single type plus
/// their per-row change ticks.
pub struct Column {
    meta: ComponentMeta,
    storage: Box<dyn ColumnStorage>,
    added_ticks: Vec<Tick>,
    changed_ticks: Vec<Tick>,
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("component", &self.meta.name)
            .field("len", &self.len())
            .finish()
    }
}

impl Column {
    /// Create a new empty column for component type `T`.
    #[must_use]
    pub fn new<T: Component>() -> Self {
        Self {
            meta: T::meta(),
            storage: Box::new(TypedStorage::<T>(Vec::new())),
            added_ticks: Vec::new(),
            changed_ticks: Vec::new(),
        }
    }

    /// Create a new empty column storing the same component type as `self`.
    #[must_use]
    pub fn empty_like(&self) -> Self {
        Self {
            meta: self.meta,
            storage: self.storage.empty_like(),
            added_ticks: Vec::new(),
            changed_ticks: Vec::new(),
        }
    }

    /// Returns the metadata of the stored component type.
    #[must_use]
    pub fn meta(&self) -> &ComponentMeta {
        &self.meta
    }

    /// Returns the component type stored in this column.
    #[must_use]
    pub fn component_type_id(&self) -> ComponentTypeId {
        self.meta.type_id
    }

    /// Returns the number of component instances stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Returns `true` if this column contains no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push a component value, stamping both its added and changed tick.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not the component type of this column.
    pub fn push<T: Component>(&mut self, value: T, tick: Tick) {
        let Some(storage) = self.storage.as_any_mut().downcast_mut::<TypedStorage<T>>() else {
            panic!(
                "column type mismatch: column stores `{}`, pushed `{}`",
                self.meta.name,
                T::type_name()
            );
        };
        storage.0.push(value);
        self.added_ticks.push(tick);
        self.changed_ticks.push(tick);
    }

    /// Returns the column as a typed slice, or `None` if `T` does not match.
    #[must_use]
    pub fn as_slice<T: Component>(&self) -> Option<&[T]> {
        self.storage
            .as_any()
            .downcast_ref::<TypedStorage<T>>()
            .map(|s| s.0.as_slice())
    }

    /// Returns the column as a mutable typed slice, or `None` if `T` does not
    /// match. Ticks are not touched.
    #[must_use]
    pub fn as_mut_slice<T: Component>(&mut self) -> Option<&mut [T]> {
        self.storage
            .as_any_mut()
            .downcast_mut::<TypedStorage<T>>()
            .map(|s| s.0.as_mut_slice())
    }

    /// Get a typed reference to the component at `row`.
    #[must_use]
    pub fn get<T: Component>(&self, row: usize) -> Option<&T> {
        self.as_slice::<T>()?.get(row)
    }

    /// Get a typed mutable reference to the component at `row`.
    #[must_use]
    pub fn get_mut<T: Component>(&mut self, row: usize) -> Option<&mut T> {
        self.as_mut_slice::<T>()?.get_mut(row)
    }

    /// Tick at which the component at `row` was attached.
    #[must_use]
    pub fn added_tick(&self, row: usize) -> Option<Tick> {
        self.added_ticks.get(row).copied()
    }

    /// Tick of the most recent write to the component at `row`.
    #[must_use]
    pub fn changed_tick(&self, row: usize) -> Option<Tick> {
        self.changed_ticks.get(row).copied()
    }

    /// All added ticks, one per row.
    #[must_use]
    pub fn added_ticks(&self) -> &[Tick] {
        &self.added_ticks
    }

    /// All changed ticks, one per row.
    #[must_use]
    pub fn changed_ticks(&self) -> &[Tick] {
        &self.changed_ticks
    }

    /// Stamp the changed tick of `row`. Returns `false` if `row` is out of bounds.
    pub fn set_changed(&mut self, row: usize, tick: Tick) -> bool {
        match self.changed_ticks.get_mut(row) {
            Some(slot) => {
                *slot = tick;
                true
            }
            None => false,
        }
    }

    /// Remove and drop the component at `row`, moving the last row into its place.
    pub fn swap_remove(&mut self, row: usize) {
        self.storage.swap_remove(row);
        self.added_ticks.swap_remove(row);
        self.changed_ticks.swap_remove(row);
    }

    /// Remove the component at `row` and return it boxed.
    fn swap_remove_boxed(&mut self, row: usize) -> Box<dyn Any + Send> {
        self.added_ticks.swap_remove(row);
        self.changed_ticks.swap_remove(row);
        self.storage.swap_remove_boxed(row)
    }

    /// Move the component at `row` to the end of `dst`, keeping its ticks.
    fn move_row_to(&mut self, row: usize, dst: &mut Column) {
        debug_assert_eq!(self.meta.type_id, dst.meta.type_id);
        self.storage.swap_remove_into(row, dst.storage.as_mut());
        dst.added_ticks.push(self.added_ticks.swap_remove(row));
        dst.changed_ticks.push(self.changed_ticks.swap_remove(row));
    }

    /// Raw pointers to the values and tick arrays of this column.
    #[must_use]
    pub fn raw_parts(&mut self) -> ColumnParts {
        ColumnParts {
            meta: self.meta,
            data: self.storage.data_ptr(),
            added_ticks: NonNull::from(self.added_ticks.as_mut_slice()).cast::<Tick>(),
            changed_ticks: NonNull::from(self.changed_ticks.as_mut_slice()).cast::<Tick>(),
            len: self.len(),
        }
    }
}

/// The result of moving one row between two archetype tables.
#[derive(Default)]
pub struct MovedRow {
    /// The entity that was swapped into the vacated row of the source table.
    pub swapped_in: Option<Entity>,
    /// Components of the source row that the destination table does not store.
    pub leftovers: Vec<(ComponentTypeId, Box<dyn Any + Send>)>,
}

/// A table of entities sharing the same archetype (set of component types).
///
/// Data is stored in struct-of-arrays (SoA) layout: one [`Column`] per
/// component type, with entity IDs stored in a parallel vector.
#[derive(Debug)]
pub struct ArchetypeTable {
    /// The archetype identifier.
    pub id: ArchetypeId,
    /// Sorted set of component type IDs that define this archetype.
    component_types: BTreeSet<ComponentTypeId>,
    /// Entity IDs in insertion order. `entities[i]` corresponds to row `i`
    /// in every column.
    entities: Vec<Entity>,
    /// One column per component type, in the same order as `component_types`.
    columns: Vec<Column>,
}

impl ArchetypeTable {
    /// Create a new, empty archetype table from a set of empty columns.
    #[must_use]
    pub fn new(mut columns: Vec<Column>) -> Self {
        columns.sort_by_key(Column::component_type_id);
        let component_types: BTreeSet<ComponentTypeId> =
            columns.iter().map(Column::component_type_id).collect();
        debug_assert_eq!(
            component_types.len(),
            columns.len(),
            "an archetype cannot store the same component twice"
        );
        let id = ArchetypeId::from_component_types(&component_types);

        Self {
            id,
            component_types,
            entities: Vec::new(),
            columns,
        }
    }

    /// Returns the number of entities in this archetype table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if this table has no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Sorted component types of this archetype.
    #[must_use]
    pub fn component_types(&self) -> &BTreeSet<ComponentTypeId> {
        &self.component_types
    }

    /// Entity IDs, one per row.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// All columns, sorted by component type.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns `true` if this archetype contains the given component type.
    #[must_use]
    pub fn has_component(&self, type_id: ComponentTypeId) -> bool {
        self.component_types.contains(&type_id)
    }

    /// Returns the column index for the given component type, if present.
    #[must_use]
    pub fn column_index(&self, type_id: ComponentTypeId) -> Option<usize> {
        self.columns
            .binary_search_by_key(&type_id, Column::component_type_id)
            .ok()
    }

    /// Returns the column storing `type_id`.
    #[must_use]
    pub fn column(&self, type_id: ComponentTypeId) -> Option<&Column> {
        self.column_index(type_id).map(|i| &self.columns[i])
    }

    /// Returns the column storing `type_id`, mutably.
    #[must_use]
    pub fn column_mut(&mut self, type_id: ComponentTypeId) -> Option<&mut Column> {
        match self.column_index(type_id) {
            Some(index) => Some(&mut self.columns[index]),
            None => None,
        }
    }

    /// Find the row index for a given entity.
    #[must_use]
    pub fn entity_row(&self, entity: Entity) -> Option<usize> {
        self.entities.iter().position(|&e| e == entity)
    }

    /// Empty copies of every column, for building a neighbouring archetype.
    #[must_use]
    pub fn empty_columns(&self) -> Vec<Column> {
        self.columns.iter().map(Column::empty_like).collect()
    }

    /// Appends an entity row. The caller pushes one value into every column.
    pub fn push_entity(&mut self, entity: Entity) -> usize {
        self.entities.push(entity);
        self.entities.len() - 1
    }

    /// Remove and drop the row at `row`.
    ///
    /// Returns the entity that was moved into `row` from the end of the table.
    pub fn swap_remove(&mut self, row: usize) -> Option<Entity> {
        for column in &mut self.columns {
            column.swap_remove(row);
        }
        self.entities.swap_remove(row);
        self.entities.get(row).copied()
    }

    /// Move the row at `row` to the end of `dst`.
    ///
    /// Columns present in both tables are moved with their ticks. Columns the
    /// destination lacks are returned in [`MovedRow::leftovers`]. Columns of
    /// the destination that the source lacks are left for the caller to push.
    pub fn move_row_to(&mut self, row: usize, dst: &mut ArchetypeTable) -> MovedRow {
        let mut moved = MovedRow::default();
        for column in &mut self.columns {
            match dst.column_index(column.component_type_id()) {
                Some(index) => column.move_row_to(row, &mut dst.columns[index]),
                None => moved
                    .leftovers
                    .push((column.component_type_id(), column.swap_remove_boxed(row))),
            }
        }
        let entity = self.entities.swap_remove(row);
        dst.entities.push(entity);
        moved.swapped_in = self.entities.get(row).copied();
        moved
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

    fn make_types() -> BTreeSet<ComponentTypeId> {
        let mut set = BTreeSet::new();
        set.insert(ComponentTypeId(1));
        set.insert(ComponentTypeId(2));
        set
    }

    #[test]
    fn test_archetype_id_deterministic() {
        let types = make_types();
        let id1 = ArchetypeId::from_component_types(&types);
        let id2 = ArchetypeId::from_component_types(&types);
        assert_eq!(id1, id2);
    }

    #[test]
    fn test_archetype_id_order_independent() {
        let table_a = ArchetypeTable::new(vec![Column::new::<Position>(), Column::new::<Velocity>()]);
        let table_b = ArchetypeTable::new(vec![Column::new::<Velocity>(), Column::new::<Position>()]);
        assert_eq!(table_a.id, table_b.id);
        assert_eq!(table_a.component_types(), table_b.component_types());
    }

    #[test]
    fn test_column_reports_component_type_id() {
        let mut col = Column::new::<Velocity>();
        assert_eq!(col.component_type_id(), Velocity::component_type_id());
        let col_mut: &mut Column = &mut col;
        assert_eq!(col_mut.component_type_id(), Velocity::component_type_id());
    }

    #[test]
    fn test_column_push_stamps_both_ticks() {
        let mut col = Column::new::<Position>();
        col.push(Position(3.0), Tick(7));
        assert_eq!(col.len(), 1);
        assert_eq!(col.get::<Position>(0), Some(&Position(3.0)));
        assert_eq!(col.added_tick(0), Some(Tick(7)));
        assert_eq!(col.changed_tick(0), Some(Tick(7)));
    }

    #[test]
    fn test_column_typed_access_rejects_wrong_type() {
        let mut col = Column::new::<Position>();
        col.push(Position(1.0), Tick(1));
        assert!(col.get::<Velocity>(0).is_none());
        assert!(col.as_slice::<Velocity>().is_none());
    }

    #[test]
    fn test_set_changed_leaves_added_tick() {
        let mut col = Column::new::<Position>();
        col.push(Position(1.0), Tick(1));
        assert!(col.set_changed(0, Tick(4)));
        assert!(!col.set_changed(1, Tick(4)));
        assert_eq!(col.added_tick(0), Some(Tick(1)));
        assert_eq!(col.changed_tick(0), Some(Tick(4)));
    }

    #[test]
    fn test_swap_remove_keeps_rows_aligned() {
        let mut table = ArchetypeTable::new(vec![Column::new::<Position>()]);
        for (i, tick) in [(1, Tick(1)), (2, Tick(2)), (3, Tick(3))] {
            table.push_entity(Entity(i));
            table
                .column_mut(Position::component_type_id())
                .unwrap()
                .push(Position(i as f32), tick);
        }

        let swapped = table.swap_remove(0);
        assert_eq!(swapped, Some(Entity(3)));
        assert_eq!(table.entities(), &[Entity(3), Entity(2)]);
        let col = table.column(Position::component_type_id()).unwrap();
        assert_eq!(col.get::<Position>(0), Some(&Position(3.0)));
        assert_eq!(col.changed_tick(0), Some(Tick(3)));
    }

    #[test]
    fn test_move_row_carries_ticks_and_returns_leftovers() {
        let mut src = ArchetypeTable::new(vec![Column::new::<Position>(), Column::new::<Velocity>()]);
        let mut dst = ArchetypeTable::new(vec![Column::new::<Position>()]);

        src.push_entity(Entity(1));
        src.column_mut(Position::component_type_id())
            .unwrap()
            .push(Position(5.0), Tick(2));
        src.column_mut(Velocity::component_type_id())
            .unwrap()
            .push(Velocity(9.0), Tick(2));

        let moved = src.move_row_to(0, &mut dst);
        assert!(moved.swapped_in.is_none());
        assert!(src.is_empty());
        assert_eq!(dst.entities(), &[Entity(1)]);

        let col = dst.column(Position::component_type_id()).unwrap();
        assert_eq!(col.get::<Position>(0), Some(&Position(5.0)));
        assert_eq!(col.added_tick(0), Some(Tick(2)));

        assert_eq!(moved.leftovers.len(), 1);
        let (type_id, value) = moved.leftovers.into_iter().next().unwrap();
        assert_eq!(type_id, Velocity::component_type_id());
        assert_eq!(*value.downcast::<Velocity>().unwrap(), Velocity(9.0));
    }
}
