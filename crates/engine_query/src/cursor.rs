//! The storage cursor and the per-row handles it hands out.
//!
//! Before each execution a [`Query`](crate::Query) snapshots every matched
//! archetype table into a `TableView`: the entity column plus raw parts of
//! each query slot's column. A [`TableCursor`] walks that list one table at a
//! time. Every term of a query owns its own copy of the cursor; the copies
//! stay on the same table because every term steps on every row.
//!
//! Values and tick arrays are reached through raw pointers that were taken
//! from a `&mut World`. The iterator that owns the cursors borrows that world
//! mutably for `'q`, so no column can grow, shrink, or move while a handle is
//! alive.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use engine_component::{ArchetypeTable, ColumnParts, Component, ComponentTypeId, Entity, Tick};

/// Snapshot of one matched table, with one entry per query slot.
#[derive(Debug)]
pub(crate) struct TableView {
    table: usize,
    entities: NonNull<Entity>,
    len: usize,
    columns: Vec<Option<ColumnParts>>,
}

// SAFETY: the pointers are only dereferenced by a `TableCursor`, which exists
// while the query iterator holds the world mutably.
unsafe impl Send for TableView {}
unsafe impl Sync for TableView {}

impl TableView {
    /// Captures every row of `archetype`, which lives at index `table`.
    pub(crate) fn new(table: usize, archetype: &mut ArchetypeTable, slots: &[ComponentTypeId]) -> Self {
        let entities = NonNull::from(archetype.entities()).cast::<Entity>();
        let len = archetype.len();
        let columns = slots
            .iter()
            .map(|&ty| archetype.column_mut(ty).map(|column| column.raw_parts()))
            .collect();
        Self {
            table,
            entities,
            len,
            columns,
        }
    }

    /// Captures the single row `row` of `archetype`. An out of range row
    /// yields an empty view.
    pub(crate) fn single_row(
        table: usize,
        archetype: &mut ArchetypeTable,
        slots: &[ComponentTypeId],
        row: usize,
    ) -> Self {
        let mut view = Self::new(table, archetype, slots);
        if row >= view.len {
            view.len = 0;
            return view;
        }
        // SAFETY: `row < len`, so every offset stays inside its allocation.
        unsafe {
            view.entities = view.entities.add(row);
            for parts in view.columns.iter_mut().flatten() {
                parts.data = parts.data.add(row * parts.meta.layout.size());
                parts.added_ticks = parts.added_ticks.add(row);
                parts.changed_ticks = parts.changed_ticks.add(row);
                parts.len = 1;
            }
        }
        view.len = 1;
        view
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

/// Where a term currently stands: archetype table index and row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPosition {
    /// Index of the table in [`World::archetypes`](engine_component::World::archetypes).
    pub table: usize,
    /// Row inside that table.
    pub row: usize,
}

/// Walks the matched tables of one query execution, one table at a time.
///
/// Empty tables are skipped. The cursor is `Copy`; each term keeps its own.
#[derive(Debug, Clone, Copy)]
pub struct TableCursor<'q> {
    tables: &'q [TableView],
    slots: &'q [ComponentTypeId],
    current: Option<usize>,
    next: usize,
}

impl<'q> TableCursor<'q> {
    pub(crate) fn new(tables: &'q [TableView], slots: &'q [ComponentTypeId]) -> Self {
        Self {
            tables,
            slots,
            current: None,
            next: 0,
        }
    }

    /// Moves to the next non-empty table. Returns `false` once exhausted.
    pub fn advance(&mut self) -> bool {
        while let Some(view) = self.tables.get(self.next) {
            let index = self.next;
            self.next += 1;
            if view.len() > 0 {
                self.current = Some(index);
                return true;
            }
        }
        self.current = None;
        false
    }

    fn view(&self) -> Option<&'q TableView> {
        let tables: &'q [TableView] = self.tables;
        self.current.and_then(|index| tables.get(index))
    }

    /// Row count of the current table, or 0 before the first table.
    #[must_use]
    pub fn count(&self) -> usize {
        self.view().map_or(0, TableView::len)
    }

    /// Index of the current table in the world, if any.
    #[must_use]
    pub fn table(&self) -> Option<usize> {
        self.view().map(|view| view.table)
    }

    /// Entity identifiers of the current table, one per row.
    #[must_use]
    pub fn entities(&self) -> &'q [Entity] {
        match self.view() {
            // SAFETY: `entities` points at `len` initialised entities that are
            // not written while the world is borrowed by the iterator.
            Some(view) => unsafe { std::slice::from_raw_parts(view.entities.as_ptr(), view.len) },
            None => &[],
        }
    }

    /// The component types occupying each slot of the query.
    #[must_use]
    pub fn slots(&self) -> &'q [ComponentTypeId] {
        self.slots
    }

    /// Slot of `T` in the query, if the query includes it.
    #[must_use]
    pub fn column_index_of<T: Component>(&self) -> Option<usize> {
        let type_id = T::component_type_id();
        self.slots.iter().position(|&ty| ty == type_id)
    }

    fn parts(&self, slot: usize) -> Option<ColumnParts> {
        self.view()?.columns.get(slot).copied().flatten()
    }

    /// Column `T` at `slot` of the current table. Absent when the table does
    /// not store it.
    #[must_use]
    pub fn column<T: Component>(&self, slot: usize) -> ColumnHandle<'q, T> {
        match self.parts(slot) {
            Some(parts) if parts.meta.rust_type == TypeId::of::<T>() => ColumnHandle {
                data: Some(parts.data.cast::<T>()),
                len: parts.len,
                _marker: PhantomData,
            },
            _ => ColumnHandle::absent(),
        }
    }

    /// Added ticks of the column at `slot`. Empty when the table lacks it.
    #[must_use]
    pub fn added_ticks(&self, slot: usize) -> TickSlice<'q> {
        self.parts(slot)
            .map_or_else(TickSlice::empty, |parts| TickSlice::new(parts.added_ticks, parts.len))
    }

    /// Changed ticks of the column at `slot`. Empty when the table lacks it.
    #[must_use]
    pub fn changed_ticks(&self, slot: usize) -> TickSlice<'q> {
        self.parts(slot)
            .map_or_else(TickSlice::empty, |parts| TickSlice::new(parts.changed_ticks, parts.len))
    }
}

/// A per-table view over one typed column.
pub struct ColumnHandle<'q, T> {
    data: Option<NonNull<T>>,
    len: usize,
    _marker: PhantomData<&'q mut [T]>,
}

impl<T> Clone for ColumnHandle<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ColumnHandle<'_, T> {}

impl<T> fmt::Debug for ColumnHandle<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnHandle")
            .field("present", &self.data.is_some())
            .field("len", &self.len)
            .finish()
    }
}

impl<'q, T> ColumnHandle<'q, T> {
    /// A handle for a column the current table does not store.
    #[must_use]
    pub fn absent() -> Self {
        Self {
            data: None,
            len: 0,
            _marker: PhantomData,
        }
    }

    /// Returns `true` if the current table stores this column.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.data.is_some()
    }

    /// Number of rows in the column.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the column has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The handle of row `row`. Absent if the column is absent or `row` is
    /// out of range.
    #[must_use]
    pub fn at(&self, row: usize) -> Ptr<'q, T> {
        match self.data {
            // SAFETY: `row < len` keeps the offset inside the column.
            Some(data) if row < self.len => Ptr::new(unsafe { data.add(row) }),
            _ => Ptr::absent(),
        }
    }
}

/// A per-table view over one column's tick array.
#[derive(Debug, Clone, Copy)]
pub struct TickSlice<'q> {
    ptr: Option<NonNull<Tick>>,
    len: usize,
    _marker: PhantomData<&'q mut [Tick]>,
}

impl<'q> TickSlice<'q> {
    fn new(ptr: NonNull<Tick>, len: usize) -> Self {
        Self {
            ptr: Some(ptr),
            len,
            _marker: PhantomData,
        }
    }

    /// A tick array for a column the table does not store.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            ptr: None,
            len: 0,
            _marker: PhantomData,
        }
    }

    /// Number of ticks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if there are no ticks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Tick of `row`.
    #[must_use]
    pub fn get(&self, row: usize) -> Option<Tick> {
        match self.ptr {
            // SAFETY: in bounds; ticks are plain values read by copy.
            Some(ptr) if row < self.len => Some(unsafe { ptr.add(row).read() }),
            _ => None,
        }
    }

    /// Overwrites the tick of `row`. Returns `false` if out of range.
    pub fn set(&self, row: usize, tick: Tick) -> bool {
        match self.ptr {
            Some(ptr) if row < self.len => {
                // SAFETY: in bounds, and the world is exclusively borrowed for
                // `'q`. No reference into the tick array is ever handed out.
                unsafe { ptr.add(row).write(tick) };
                true
            }
            _ => false,
        }
    }
}

/// The handle to one component of the current row.
///
/// Either valid, pointing into the row's column, or absent when the table
/// does not store the component (an `Optional` slot). Writes through the
/// handle do not stamp change ticks; use `MarkChanged` for that.
pub struct Ptr<'q, T> {
    ptr: Option<NonNull<T>>,
    _marker: PhantomData<&'q mut T>,
}

impl<'q, T> Ptr<'q, T> {
    fn new(ptr: NonNull<T>) -> Self {
        Self {
            ptr: Some(ptr),
            _marker: PhantomData,
        }
    }

    /// An absent handle.
    #[must_use]
    pub fn absent() -> Self {
        Self {
            ptr: None,
            _marker: PhantomData,
        }
    }

    /// Returns `true` if the handle points at a component.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.ptr.is_some()
    }

    /// Shared access to the component, if present.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: a valid pointer targets a live row that no other handle of
        // this execution points at.
        self.ptr.map(|ptr| unsafe { ptr.as_ref() })
    }

    /// Exclusive access to the component, if present.
    #[must_use]
    pub fn get_mut(&mut self) -> Option<&mut T> {
        // SAFETY: see `get`; `&mut self` prevents a second borrow through
        // this handle.
        self.ptr.map(|mut ptr| unsafe { ptr.as_mut() })
    }

    /// Converts the handle into a reference living as long as the execution.
    #[must_use]
    pub fn into_mut(self) -> Option<&'q mut T> {
        // SAFETY: consumes the only handle to this row.
        self.ptr.map(|mut ptr| unsafe { ptr.as_mut() })
    }
}

impl<T> Deref for Ptr<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => panic!("dereferenced an absent component handle; check `is_valid()` first"),
        }
    }
}

impl<T> DerefMut for Ptr<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match self.get_mut() {
            Some(value) => value,
            None => panic!("dereferenced an absent component handle; check `is_valid()` first"),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Ptr<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("Ptr").field(value).finish(),
            None => f.write_str("Ptr(<absent>)"),
        }
    }
}
