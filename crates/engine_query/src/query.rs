//! The query object and its iterators.
//!
//! A [`Query`] is created once: it runs every term's build step, resolves the
//! slot layout and records the access descriptor. Each execution
//! ([`Query::iter`] and friends) re-matches tables when it runs on another
//! world or the world created new tables, snapshots the matched tables, and hands one cursor copy to every
//! term.

use std::fmt;
use std::marker::PhantomData;

use engine_component::{Entity, FilterDescriptor, QueryDescriptor, TickWindow, World, WorldId};
use tracing::{debug, trace};

use crate::builder::{QueryBuilder, QueryPlan};
use crate::cursor::{TableCursor, TableView};
use crate::error::QueryError;
use crate::filters::Empty;
use crate::term::{DataIter, FilterIter, QueryData, QueryFilter};

/// The row type yielded by a query with data `D`.
pub type QueryItem<'q, D> = <<D as QueryData>::Iter<'q> as DataIter<'q>>::Item;

/// A built query: data `D` filtered by `F`.
///
/// ```rust
/// use engine_component::{Component, TickWindow, World};
/// use engine_query::{Changed, Data, Filter, Query};
///
/// struct Position(f32);
/// impl Component for Position {}
///
/// let mut world = World::new();
/// world.spawn((Position(1.0),));
///
/// let mut query = Query::<Data<(Position,)>, Filter<(Changed<Position>,)>>::new().unwrap();
/// let window = TickWindow::up_to(world.increment_change_tick());
/// for (mut position,) in query.iter(&mut world, window) {
///     position.0 += 1.0;
/// }
/// ```
pub struct Query<D: QueryData, F: QueryFilter = Empty> {
    plan: QueryPlan,
    descriptor: QueryDescriptor,
    matched: Vec<usize>,
    /// World and archetype generation `matched` was computed for.
    matched_for: Option<(WorldId, u64)>,
    views: Vec<TableView>,
    _marker: PhantomData<fn() -> (D, F)>,
}

impl<D: QueryData, F: QueryFilter> fmt::Debug for Query<D, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("data", &std::any::type_name::<D>())
            .field("filter", &std::any::type_name::<F>())
            .field("plan", &self.plan)
            .field("matched", &self.matched)
            .finish()
    }
}

impl<D: QueryData, F: QueryFilter> Query<D, F> {
    /// Builds the query.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::DuplicateComponent`] if `D` fetches a component
    /// twice, [`QueryError::ConflictingTerms`] if a component is both
    /// excluded and included, and [`QueryError::BatchWithRowFilter`] if a
    /// per-table data term is paired with added/changed filters.
    pub fn new() -> Result<Self, QueryError> {
        let mut builder = QueryBuilder::new();
        D::build(&mut builder);
        F::build(&mut builder);
        let plan = builder.finish()?;

        let mut descriptor = QueryDescriptor::new();
        D::access(&mut descriptor);
        F::access(&mut descriptor);

        if D::PER_TABLE
            && descriptor.filters.iter().any(|f| {
                matches!(
                    f,
                    FilterDescriptor::Added(_)
                        | FilterDescriptor::Changed(_)
                        | FilterDescriptor::MarkChanged(_)
                )
            })
        {
            return Err(QueryError::BatchWithRowFilter);
        }

        debug!(
            data = std::any::type_name::<D>(),
            filter = std::any::type_name::<F>(),
            slots = plan.slots().len(),
            excluded = plan.excluded().len(),
            "built query"
        );

        Ok(Self {
            plan,
            descriptor,
            matched: Vec::new(),
            matched_for: None,
            views: Vec::new(),
            _marker: PhantomData,
        })
    }

    /// Reads, writes, optionals and filters of this query.
    #[must_use]
    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    /// The resolved slot layout and matching rules.
    #[must_use]
    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    /// Indices of the tables matched at the last execution.
    #[must_use]
    pub fn matched_tables(&self) -> &[usize] {
        &self.matched
    }

    fn update_matches(&mut self, world: &World) {
        let generation = world.archetype_generation();
        let key = (world.id(), generation);
        if self.matched_for == Some(key) {
            return;
        }
        self.matched = self.plan.matching_tables(world);
        self.matched_for = Some(key);
        debug!(
            data = std::any::type_name::<D>(),
            generation,
            tables = self.matched.len(),
            "matched query tables"
        );
    }


    /// Number of rows in the matched tables. Temporal filters are not
    /// applied.
    pub fn count(&mut self, world: &World) -> usize {
        self.update_matches(world);
        self.matched
            .iter()
            .filter_map(|&index| world.archetype(index))
            .map(|table| table.len())
            .sum()
    }

    /// Runs the query over every matched row whose filters accept it within
    /// `window`.
    pub fn iter<'q>(&'q mut self, world: &'q mut World, window: TickWindow) -> QueryIter<'q, D, F> {
        self.update_matches(world);
        self.views.clear();
        let slots = self.plan.slots();
        let tables = world.archetypes_mut();
        for &index in &self.matched {
            if let Some(table) = tables.get_mut(index) {
                self.views.push(TableView::new(index, table, slots));
            }
        }
        trace!(tables = self.views.len(), "query execution");
        self.start(window)
    }

    /// Runs the query over the row of `entity` only.
    pub fn iter_entity<'q>(
        &'q mut self,
        world: &'q mut World,
        entity: Entity,
        window: TickWindow,
    ) -> QueryIter<'q, D, F> {
        self.update_matches(world);
        self.views.clear();
        if let Some(location) = world.location(entity)
            && self.matched.contains(&location.table)
            && let Some(table) = world.archetypes_mut().get_mut(location.table)
        {
            self.views.push(TableView::single_row(
                location.table,
                table,
                self.plan.slots(),
                location.row,
            ));
        }
        self.start(window)
    }

    /// Returns `true` if the query yields a row for `entity`.
    pub fn contains(&mut self, world: &mut World, entity: Entity, window: TickWindow) -> bool {
        self.iter_entity(world, entity, window).next().is_some()
    }

    /// The row of `entity`, if the query yields one.
    pub fn get<'q>(
        &'q mut self,
        world: &'q mut World,
        entity: Entity,
        window: TickWindow,
    ) -> Option<QueryItem<'q, D>> {
        self.iter_entity(world, entity, window).next()
    }

    /// The only row of the query.
    ///
    /// Stops at the second accepted row, so filters with side effects such
    /// as [`MarkChanged`](crate::MarkChanged) see at most the rows up to it.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NotSingle`] with `matched: 0` if no row matches
    /// and `matched: 2` if more than one does.
    pub fn single<'q>(
        &'q mut self,
        world: &'q mut World,
        window: TickWindow,
    ) -> Result<QueryItem<'q, D>, QueryError> {
        let mut iter = self.iter(world, window);
        let Some(first) = iter.next() else {
            return Err(QueryError::NotSingle { matched: 0 });
        };
        if iter.step() {
            return Err(QueryError::NotSingle { matched: 2 });
        }
        Ok(first)
    }

    fn start(&self, window: TickWindow) -> QueryIter<'_, D, F> {
        let cursor = TableCursor::new(&self.views, self.plan.slots());
        let mut filter = F::create_iter(cursor);
        filter.set_ticks(window);
        QueryIter {
            data: D::create_iter(cursor),
            filter,
        }
    }
}

/// Iterator over the rows of one query execution.
pub struct QueryIter<'q, D: QueryData, F: QueryFilter> {
    data: D::Iter<'q>,
    filter: F::Iter<'q>,
}

impl<'q, D: QueryData, F: QueryFilter> QueryIter<'q, D, F> {
    /// Pairs every row with its entity.
    #[must_use]
    pub fn with_entity(self) -> WithEntity<'q, D, F> {
        WithEntity { inner: self }
    }

    fn step(&mut self) -> bool {
        loop {
            if !self.data.move_next() {
                return false;
            }
            let accepted = self.filter.move_next();
            debug_assert!(
                self.filter
                    .position()
                    .is_none_or(|position| Some(position) == self.data.position()),
                "filter terms fell out of step with the data term"
            );
            if accepted {
                return true;
            }
        }
    }
}

impl<'q, D: QueryData, F: QueryFilter> Iterator for QueryIter<'q, D, F> {
    type Item = QueryItem<'q, D>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.step() {
            Some(self.data.current())
        } else {
            None
        }
    }
}

/// Iterator adapter returned by [`QueryIter::with_entity`].
pub struct WithEntity<'q, D: QueryData, F: QueryFilter> {
    inner: QueryIter<'q, D, F>,
}

impl<'q, D: QueryData, F: QueryFilter> Iterator for WithEntity<'q, D, F> {
    type Item = (Entity, QueryItem<'q, D>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.inner.step() {
            let entity = self.inner.data.entity();
            Some((entity, self.inner.data.current()))
        } else {
            None
        }
    }
}
