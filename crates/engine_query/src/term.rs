//! The term protocol.
//!
//! A term is one typed unit of a query. At build time it registers its
//! structural requirement with the [`QueryBuilder`] and reports its access to
//! a [`QueryDescriptor`]. At run time it creates an iterator bound to a
//! [`TableCursor`] and is stepped once per row.
//!
//! Every row-stepping term tracks its position with a [`RowCursor`]:
//!
//! ```text
//! Uninitialized -> AwaitingTable -> WithinTable(row, count) -> ... -> Exhausted
//!                        ^                    |
//!                        +-- row == count ----+
//! ```

use engine_component::{Entity, QueryDescriptor, TickWindow};

use crate::builder::QueryBuilder;
use crate::cursor::{RowPosition, TableCursor};

/// Build-time half of every term.
pub trait Term: 'static {
    /// Registers the term's with/without/optional requirement.
    fn build(builder: &mut QueryBuilder);

    /// Records the term's reads, writes and filters.
    fn access(descriptor: &mut QueryDescriptor);
}

/// A term that produces the rows of a query.
///
/// # Safety
///
/// The cursor passed to [`create_iter`](Self::create_iter) reaches every
/// column of the matched tables mutably. An implementation must only touch
/// the current row of the columns it declares in [`Term::access`], and must
/// not hand out a second live reference to any value the query already
/// handed out for the same row.
pub unsafe trait QueryData: Term {
    /// Per-execution iterator state.
    type Iter<'q>: DataIter<'q>;

    /// `true` if the iterator steps once per table instead of once per row.
    const PER_TABLE: bool = false;

    /// Creates the iterator for one execution.
    fn create_iter(cursor: TableCursor<'_>) -> Self::Iter<'_>;
}

/// Per-execution state of a [`QueryData`] term.
pub trait DataIter<'q> {
    /// The row view handed to the caller.
    type Item;

    /// Advances to the next row, pulling a new table when the current one is
    /// used up. Returns `false` once every table has been visited.
    fn move_next(&mut self) -> bool;

    /// The current row.
    ///
    /// Call at most once per successful [`move_next`](Self::move_next): each
    /// call hands out fresh component handles for the same row.
    fn current(&mut self) -> Self::Item;

    /// Entity of the current row.
    fn entity(&self) -> Entity;

    /// Current table and row, used to check that terms move in lockstep.
    fn position(&self) -> Option<RowPosition>;
}

/// A term that accepts or rejects rows.
///
/// # Safety
///
/// Same contract as [`QueryData`]. In addition a filter must not create
/// component handles at all: the data term owns every value of the row, so
/// a filter may only read and write tick arrays.
///
/// Implementing it therefore needs `unsafe impl`:
///
/// ```compile_fail,E0200
/// use engine_component::QueryDescriptor;
/// use engine_query::{Accept, QueryBuilder, QueryFilter, TableCursor, Term};
///
/// struct Lenient;
///
/// impl Term for Lenient {
///     fn build(_builder: &mut QueryBuilder) {}
///     fn access(_descriptor: &mut QueryDescriptor) {}
/// }
///
/// impl QueryFilter for Lenient {
///     type Iter<'q> = Accept;
///
///     fn create_iter(_cursor: TableCursor<'_>) -> Accept {
///         Accept
///     }
/// }
/// ```
pub unsafe trait QueryFilter: Term {
    /// Per-execution iterator state.
    type Iter<'q>: FilterIter;

    /// Creates the iterator for one execution.
    fn create_iter(cursor: TableCursor<'_>) -> Self::Iter<'_>;
}

/// Per-execution state of a [`QueryFilter`] term.
pub trait FilterIter {
    /// Steps to the same row as the data term and reports whether it is
    /// accepted. Must be called once for every row the data term visits.
    fn move_next(&mut self) -> bool;

    /// Sets the tick window used by temporal filters.
    fn set_ticks(&mut self, window: TickWindow);

    /// Current table and row of a row-stepping filter. `None` for filters
    /// that do not step.
    fn position(&self) -> Option<RowPosition> {
        None
    }
}

/// Lifecycle of a row-stepping term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    /// Not stepped yet.
    Uninitialized,
    /// Between tables; the next step pulls a table from the cursor.
    AwaitingTable,
    /// Positioned on `row` of a table holding `count` rows.
    WithinTable {
        /// Current row.
        row: usize,
        /// Row count of the current table.
        count: usize,
    },
    /// The cursor has no further tables.
    Exhausted,
}

/// The result of one successful step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowStep {
    /// Row inside the current table.
    pub row: usize,
    /// `true` when this step entered a new table, so per-table handles must
    /// be resolved again.
    pub new_table: bool,
}

/// Steps a [`TableCursor`] row by row.
#[derive(Debug, Clone, Copy)]
pub struct RowCursor<'q> {
    cursor: TableCursor<'q>,
    state: RowState,
}

impl<'q> RowCursor<'q> {
    /// Wraps a cursor that has not been advanced yet.
    #[must_use]
    pub fn new(cursor: TableCursor<'q>) -> Self {
        Self {
            cursor,
            state: RowState::Uninitialized,
        }
    }

    /// The underlying table cursor.
    #[must_use]
    pub fn cursor(&self) -> &TableCursor<'q> {
        &self.cursor
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> RowState {
        self.state
    }

    /// Current row, or `None` outside a table.
    #[must_use]
    pub fn row(&self) -> Option<usize> {
        match self.state {
            RowState::WithinTable { row, .. } => Some(row),
            _ => None,
        }
    }

    /// Current table and row.
    #[must_use]
    pub fn position(&self) -> Option<RowPosition> {
        let row = self.row()?;
        let table = self.cursor.table()?;
        Some(RowPosition { table, row })
    }

    /// Moves to the next row. Returns `None` once the cursor is exhausted.
    pub fn advance(&mut self) -> Option<RowStep> {
        loop {
            match self.state {
                RowState::Uninitialized => self.state = RowState::AwaitingTable,
                RowState::AwaitingTable => {
                    if !self.cursor.advance() {
                        self.state = RowState::Exhausted;
                        return None;
                    }
                    let count = self.cursor.count();
                    debug_assert!(count > 0, "table cursor yielded an empty table");
                    self.state = RowState::WithinTable { row: 0, count };
                    return Some(RowStep {
                        row: 0,
                        new_table: true,
                    });
                }
                RowState::WithinTable { row, count } => {
                    let next = row + 1;
                    if next < count {
                        self.state = RowState::WithinTable { row: next, count };
                        return Some(RowStep {
                            row: next,
                            new_table: false,
                        });
                    }
                    self.state = RowState::AwaitingTable;
                }
                RowState::Exhausted => return None,
            }
        }
    }

    /// Moves to the next table, treating it as one step.
    ///
    /// The state stays `WithinTable` on row 0 until the following call.
    pub fn advance_table(&mut self) -> bool {
        if self.state == RowState::Exhausted {
            return false;
        }
        if self.cursor.advance() {
            self.state = RowState::WithinTable {
                row: 0,
                count: self.cursor.count(),
            };
            true
        } else {
            self.state = RowState::Exhausted;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use engine_component::{Component, ComponentTypeId, World};

    use super::*;
    use crate::cursor::TableView;

    #[derive(Debug, Clone, Copy)]
    struct Marker(u8);
    impl Component for Marker {
        fn type_name() -> &'static str {
            "Marker"
        }
    }

    #[derive(Debug, Clone, Copy)]
    struct Tag;
    impl Component for Tag {
        fn type_name() -> &'static str {
            "Tag"
        }
    }

    fn views(world: &mut World, slots: &[ComponentTypeId]) -> Vec<TableView> {
        world
            .archetypes_mut()
            .iter_mut()
            .enumerate()
            .skip(1)
            .map(|(index, table)| TableView::new(index, table, slots))
            .collect()
    }

    #[test]
    fn test_row_cursor_walks_tables_in_order() {
        let mut world = World::new();
        world.spawn((Marker(1),));
        world.spawn((Marker(2),));
        world.spawn((Marker(3), Tag));

        let slots = [Marker::component_type_id()];
        let tables = views(&mut world, &slots);
        let mut rows = RowCursor::new(TableCursor::new(&tables, &slots));
        assert_eq!(rows.state(), RowState::Uninitialized);

        let steps: Vec<(usize, bool)> =
            std::iter::from_fn(|| rows.advance().map(|s| (s.row, s.new_table))).collect();
        assert_eq!(steps, vec![(0, true), (1, false), (0, true)]);
        assert_eq!(rows.state(), RowState::Exhausted);
        assert!(rows.advance().is_none());
    }

    #[test]
    fn test_row_cursor_reports_position() {
        let mut world = World::new();
        world.spawn((Marker(1),));
        world.spawn((Marker(2),));

        let slots = [Marker::component_type_id()];
        let tables = views(&mut world, &slots);
        let mut rows = RowCursor::new(TableCursor::new(&tables, &slots));
        assert_eq!(rows.position(), None);
        rows.advance();
        rows.advance();
        assert_eq!(rows.position(), Some(RowPosition { table: 1, row: 1 }));
        assert_eq!(rows.state(), RowState::WithinTable { row: 1, count: 2 });
    }

    #[test]
    fn test_advance_table_steps_once_per_table() {
        let mut world = World::new();
        world.spawn((Marker(1),));
        world.spawn((Marker(2),));
        world.spawn((Marker(3), Tag));

        let slots = [Marker::component_type_id()];
        let tables = views(&mut world, &slots);
        let mut rows = RowCursor::new(TableCursor::new(&tables, &slots));
        assert!(rows.advance_table());
        assert_eq!(rows.cursor().count(), 2);
        assert!(rows.advance_table());
        assert_eq!(rows.cursor().count(), 1);
        assert!(!rows.advance_table());
        assert!(!rows.advance_table());
    }

    #[test]
    fn test_empty_cursor_is_exhausted_immediately() {
        let tables: Vec<TableView> = Vec::new();
        let slots: [ComponentTypeId; 0] = [];
        let mut rows = RowCursor::new(TableCursor::new(&tables, &slots));
        assert!(rows.advance().is_none());
        assert_eq!(rows.state(), RowState::Exhausted);
    }
}
