//! # engine_query
//!
//! Typed queries over the archetype tables of an
//! [`engine_component::World`], with added/changed detection against a
//! [`TickWindow`](engine_component::TickWindow).
//!
//! A query is a data term and a filter term:
//!
//! - [`Data<(A, B, ...)>`](Data) yields one [`Ptr`] per component for every
//!   row. [`Empty`] as data yields each matched table's entities instead.
//! - [`Filter<(F0, F1, ...)>`](Filter) combines [`With`], [`Without`],
//!   [`Optional`], [`Added`], [`Changed`] and [`MarkChanged`]. Every
//!   sub-filter steps on every row and the results are AND-ed.
//!
//! Both combinators take tuples of 1 to 16 terms.

pub mod builder;
pub mod cursor;
pub mod data;
pub mod error;
pub mod filter;
pub mod filters;
pub mod query;
pub mod term;

pub use builder::{QueryBuilder, QueryPlan, Registration, TermOp};
pub use cursor::{ColumnHandle, Ptr, RowPosition, TableCursor, TickSlice};
pub use data::{Data, DataRows, DataTuple};
pub use error::QueryError;
pub use filter::Filter;
pub use filters::{Accept, Added, Changed, Empty, EmptyIter, MarkChanged, MarkChangedIter, Optional, TickFilterIter, With, Without};
pub use query::{Query, QueryItem, QueryIter, WithEntity};
pub use term::{DataIter, FilterIter, QueryData, QueryFilter, RowCursor, RowState, RowStep, Term};
