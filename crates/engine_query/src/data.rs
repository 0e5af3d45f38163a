//! The data combinator: `Data<(A, B, ...)>` fetches one handle per component.
//!
//! One generic row walker, [`DataRows`], drives every arity. The per-arity
//! parts (registration, handle resolution, row fetch) are generated by
//! `impl_data!` for tuples of 1 to 16 components.

use std::fmt;
use std::marker::PhantomData;

use engine_component::{Component, Entity, QueryDescriptor};

use crate::builder::QueryBuilder;
use crate::cursor::{ColumnHandle, Ptr, RowPosition, TableCursor};
use crate::term::{DataIter, QueryData, RowCursor, Term};

/// Fetches the components `T = (A, B, ...)` of every matched row as
/// [`Ptr`] handles. Component `i` of the tuple reads slot `i` of the query.
pub struct Data<T>(PhantomData<fn() -> T>);

/// A tuple of column handles resolved for the current table.
pub trait DataTuple<'q> {
    /// The row view: one [`Ptr`] per column.
    type Item;

    /// Handles for no table.
    fn absent() -> Self;

    /// Resolves every handle against the cursor's current table.
    fn resolve(cursor: &TableCursor<'q>) -> Self;

    /// The handles of `row`.
    fn fetch(&self, row: usize) -> Self::Item;
}

/// Walks rows and re-resolves its column handles on every table change.
pub struct DataRows<'q, C> {
    rows: RowCursor<'q>,
    columns: C,
}

impl<'q, C: DataTuple<'q>> DataRows<'q, C> {
    fn new(cursor: TableCursor<'q>) -> Self {
        Self {
            rows: RowCursor::new(cursor),
            columns: C::absent(),
        }
    }
}

impl<C> fmt::Debug for DataRows<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataRows").field("rows", &self.rows).finish()
    }
}

impl<'q, C: DataTuple<'q>> DataIter<'q> for DataRows<'q, C> {
    type Item = C::Item;

    fn move_next(&mut self) -> bool {
        match self.rows.advance() {
            Some(step) => {
                if step.new_table {
                    self.columns = C::resolve(self.rows.cursor());
                }
                true
            }
            None => false,
        }
    }

    fn current(&mut self) -> C::Item {
        match self.rows.row() {
            Some(row) => self.columns.fetch(row),
            None => C::absent().fetch(0),
        }
    }

    fn entity(&self) -> Entity {
        self.rows
            .row()
            .and_then(|row| self.rows.cursor().entities().get(row).copied())
            .unwrap_or(Entity::INVALID)
    }

    fn position(&self) -> Option<RowPosition> {
        self.rows.position()
    }
}

macro_rules! impl_data {
    ($($ty:ident $slot:tt),+) => {
        impl<$($ty: Component),+> Term for Data<($($ty,)+)> {
            fn build(builder: &mut QueryBuilder) {
                $(builder.fetch::<$ty>();)+
            }

            fn access(descriptor: &mut QueryDescriptor) {
                $(descriptor.add_write(<$ty as Component>::component_type_id());)+
            }
        }

        // SAFETY: the builder rejects repeated components, so every handle
        // of a row points at a distinct column.
        unsafe impl<$($ty: Component),+> QueryData for Data<($($ty,)+)> {
            type Iter<'q> = DataRows<'q, ($(ColumnHandle<'q, $ty>,)+)>;

            fn create_iter(cursor: TableCursor<'_>) -> Self::Iter<'_> {
                DataRows::new(cursor)
            }
        }

        impl<'q, $($ty: Component),+> DataTuple<'q> for ($(ColumnHandle<'q, $ty>,)+) {
            type Item = ($(Ptr<'q, $ty>,)+);

            fn absent() -> Self {
                ($(ColumnHandle::<$ty>::absent(),)+)
            }

            fn resolve(cursor: &TableCursor<'q>) -> Self {
                ($(cursor.column::<$ty>($slot),)+)
            }

            fn fetch(&self, row: usize) -> Self::Item {
                ($(self.$slot.at(row),)+)
            }
        }
    };
}

impl_data!(A 0);
impl_data!(A 0, B 1);
impl_data!(A 0, B 1, C 2);
impl_data!(A 0, B 1, C 2, D 3);
impl_data!(A 0, B 1, C 2, D 3, E 4);
impl_data!(A 0, B 1, C 2, D 3, E 4, F 5);
impl_data!(A 0, B 1, C 2, D 3, E 4, F 5, G 6);
impl_data!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);
impl_data!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8);
impl_data!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9);
impl_data!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10);
impl_data!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10, L 11);
impl_data!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10, L 11, M 12);
impl_data!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10, L 11, M 12, N 13);
impl_data!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10, L 11, M 12, N 13, O 14);
impl_data!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10, L 11, M 12, N 13, O 14, P 15);
