//! Single-component terms: structural, temporal, and the typeless [`Empty`].

use std::marker::PhantomData;

use engine_component::{Component, Entity, FilterDescriptor, QueryDescriptor, Tick, TickWindow};

use crate::builder::QueryBuilder;
use crate::cursor::{RowPosition, TableCursor, TickSlice};
use crate::term::{DataIter, FilterIter, QueryData, QueryFilter, RowCursor, Term};

/// Iterator of a filter that accepts every row without stepping.
#[derive(Debug, Clone, Copy, Default)]
pub struct Accept;

impl FilterIter for Accept {
    fn move_next(&mut self) -> bool {
        true
    }

    fn set_ticks(&mut self, _window: TickWindow) {}
}

/// Matches only tables that store `T`.
pub struct With<T>(PhantomData<fn() -> T>);

impl<T: Component> Term for With<T> {
    fn build(builder: &mut QueryBuilder) {
        builder.with::<T>();
    }

    fn access(descriptor: &mut QueryDescriptor) {
        descriptor.add_filter(FilterDescriptor::With(T::component_type_id()));
    }
}

// SAFETY: touches no storage.
unsafe impl<T: Component> QueryFilter for With<T> {
    type Iter<'q> = Accept;

    fn create_iter(_cursor: TableCursor<'_>) -> Accept {
        Accept
    }
}

/// Matches only tables that do not store `T`.
pub struct Without<T>(PhantomData<fn() -> T>);

impl<T: Component> Term for Without<T> {
    fn build(builder: &mut QueryBuilder) {
        builder.without::<T>();
    }

    fn access(descriptor: &mut QueryDescriptor) {
        descriptor.add_filter(FilterDescriptor::Without(T::component_type_id()));
    }
}

// SAFETY: touches no storage.
unsafe impl<T: Component> QueryFilter for Without<T> {
    type Iter<'q> = Accept;

    fn create_iter(_cursor: TableCursor<'_>) -> Accept {
        Accept
    }
}

/// Lets tables lacking `T` match. A data slot for `T` then yields an absent
/// [`Ptr`](crate::Ptr) on those tables.
pub struct Optional<T>(PhantomData<fn() -> T>);

impl<T: Component> Term for Optional<T> {
    fn build(builder: &mut QueryBuilder) {
        builder.optional::<T>();
    }

    fn access(descriptor: &mut QueryDescriptor) {
        descriptor.add_optional(T::component_type_id());
    }
}

// SAFETY: touches no storage.
unsafe impl<T: Component> QueryFilter for Optional<T> {
    type Iter<'q> = Accept;

    fn create_iter(_cursor: TableCursor<'_>) -> Accept {
        Accept
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickKind {
    Added,
    Changed,
}

/// Iterator shared by [`Added`] and [`Changed`]: accepts a row when its tick
/// lies inside the window.
#[derive(Debug, Clone, Copy)]
pub struct TickFilterIter<'q> {
    rows: RowCursor<'q>,
    slot: Option<usize>,
    kind: TickKind,
    ticks: TickSlice<'q>,
    window: TickWindow,
}

impl<'q> TickFilterIter<'q> {
    fn new(cursor: TableCursor<'q>, slot: Option<usize>, kind: TickKind) -> Self {
        Self {
            rows: RowCursor::new(cursor),
            slot,
            kind,
            ticks: TickSlice::empty(),
            window: TickWindow::default(),
        }
    }

    fn resolve_ticks(&self) -> TickSlice<'q> {
        let cursor = self.rows.cursor();
        match (self.slot, self.kind) {
            (Some(slot), TickKind::Added) => cursor.added_ticks(slot),
            (Some(slot), TickKind::Changed) => cursor.changed_ticks(slot),
            (None, _) => TickSlice::empty(),
        }
    }
}

impl FilterIter for TickFilterIter<'_> {
    fn move_next(&mut self) -> bool {
        let Some(step) = self.rows.advance() else {
            return false;
        };
        if step.new_table {
            self.ticks = self.resolve_ticks();
        }
        self.ticks
            .get(step.row)
            .is_some_and(|tick| self.window.contains(tick))
    }

    fn set_ticks(&mut self, window: TickWindow) {
        self.window = window;
    }

    fn position(&self) -> Option<RowPosition> {
        self.rows.position()
    }
}

/// Accepts rows whose `T` was attached inside the tick window.
///
/// Requires `T`. A table lacking `T` has no tick array, so all of its rows
/// are rejected.
pub struct Added<T>(PhantomData<fn() -> T>);

impl<T: Component> Term for Added<T> {
    fn build(builder: &mut QueryBuilder) {
        builder.with::<T>();
    }

    fn access(descriptor: &mut QueryDescriptor) {
        descriptor.add_read(T::component_type_id());
        descriptor.add_filter(FilterDescriptor::Added(T::component_type_id()));
    }
}

// SAFETY: only reads the tick array of its own slot.
unsafe impl<T: Component> QueryFilter for Added<T> {
    type Iter<'q> = TickFilterIter<'q>;

    fn create_iter(cursor: TableCursor<'_>) -> TickFilterIter<'_> {
        let slot = cursor.column_index_of::<T>();
        TickFilterIter::new(cursor, slot, TickKind::Added)
    }
}

/// Accepts rows whose `T` was written inside the tick window. Attaching a
/// component counts as a write.
pub struct Changed<T>(PhantomData<fn() -> T>);

impl<T: Component> Term for Changed<T> {
    fn build(builder: &mut QueryBuilder) {
        builder.with::<T>();
    }

    fn access(descriptor: &mut QueryDescriptor) {
        descriptor.add_read(T::component_type_id());
        descriptor.add_filter(FilterDescriptor::Changed(T::component_type_id()));
    }
}

// SAFETY: only reads the tick array of its own slot.
unsafe impl<T: Component> QueryFilter for Changed<T> {
    type Iter<'q> = TickFilterIter<'q>;

    fn create_iter(cursor: TableCursor<'_>) -> TickFilterIter<'_> {
        let slot = cursor.column_index_of::<T>();
        TickFilterIter::new(cursor, slot, TickKind::Changed)
    }
}

/// Accepts every row and stamps its `T` as changed at `this_run`. Rejects
/// once the tables run out.
///
/// Registers nothing: `T` must already be part of the query through a data
/// slot or another filter. Rows whose table lacks `T` are left alone.
pub struct MarkChanged<T>(PhantomData<fn() -> T>);

impl<T: Component> Term for MarkChanged<T> {
    fn build(_builder: &mut QueryBuilder) {}

    fn access(descriptor: &mut QueryDescriptor) {
        descriptor.add_read(T::component_type_id());
        descriptor.add_write(T::component_type_id());
        descriptor.add_filter(FilterDescriptor::MarkChanged(T::component_type_id()));
    }
}

// SAFETY: only writes the changed-tick cell of the current row.
unsafe impl<T: Component> QueryFilter for MarkChanged<T> {
    type Iter<'q> = MarkChangedIter<'q>;

    fn create_iter(cursor: TableCursor<'_>) -> MarkChangedIter<'_> {
        MarkChangedIter {
            slot: cursor.column_index_of::<T>(),
            rows: RowCursor::new(cursor),
            ticks: TickSlice::empty(),
            this_run: Tick::ZERO,
        }
    }
}

/// Iterator of [`MarkChanged`].
#[derive(Debug, Clone, Copy)]
pub struct MarkChangedIter<'q> {
    rows: RowCursor<'q>,
    slot: Option<usize>,
    ticks: TickSlice<'q>,
    this_run: Tick,
}

impl FilterIter for MarkChangedIter<'_> {
    fn move_next(&mut self) -> bool {
        let Some(step) = self.rows.advance() else {
            return false;
        };
        if step.new_table {
            self.ticks = match self.slot {
                Some(slot) => self.rows.cursor().changed_ticks(slot),
                None => TickSlice::empty(),
            };
        }
        self.ticks.set(step.row, self.this_run);
        true
    }

    fn set_ticks(&mut self, window: TickWindow) {
        self.this_run = window.this_run;
    }

    fn position(&self) -> Option<RowPosition> {
        self.rows.position()
    }
}

/// The typeless term.
///
/// As a filter it accepts everything and is the default filter of a
/// [`Query`](crate::Query). As data it yields one item per matched table:
/// the table's entities and its row count.
#[derive(Debug, Clone, Copy, Default)]
pub struct Empty;

impl Term for Empty {
    fn build(_builder: &mut QueryBuilder) {}

    fn access(_descriptor: &mut QueryDescriptor) {}
}

// SAFETY: touches no storage.
unsafe impl QueryFilter for Empty {
    type Iter<'q> = Accept;

    fn create_iter(_cursor: TableCursor<'_>) -> Accept {
        Accept
    }
}

// SAFETY: hands out the shared entity slice only.
unsafe impl QueryData for Empty {
    type Iter<'q> = EmptyIter<'q>;

    const PER_TABLE: bool = true;

    fn create_iter(cursor: TableCursor<'_>) -> EmptyIter<'_> {
        EmptyIter {
            rows: RowCursor::new(cursor),
        }
    }
}

/// Iterator of [`Empty`] used as data: one step per table.
#[derive(Debug, Clone, Copy)]
pub struct EmptyIter<'q> {
    rows: RowCursor<'q>,
}

impl<'q> DataIter<'q> for EmptyIter<'q> {
    type Item = (&'q [Entity], usize);

    fn move_next(&mut self) -> bool {
        self.rows.advance_table()
    }

    fn current(&mut self) -> Self::Item {
        let cursor = self.rows.cursor();
        (cursor.entities(), cursor.count())
    }

    /// The first entity of the current table.
    fn entity(&self) -> Entity {
        self.rows
            .cursor()
            .entities()
            .first()
            .copied()
            .unwrap_or(Entity::INVALID)
    }

    fn position(&self) -> Option<RowPosition> {
        self.rows.position()
    }
}
