//! Query builder and table matching.
//!
//! Terms register their structural intent once, when the query is created.
//! Registrations are keyed by component type: a later registration for the
//! same type replaces the earlier intent but keeps its position. The
//! non-excluded registrations, in order, are the query's slots.

use engine_component::{ArchetypeTable, Component, ComponentTypeId, World};

use crate::error::QueryError;

/// How a component participates in table matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermOp {
    /// The table must store the component.
    With,
    /// The table must not store the component.
    Without,
    /// The table may or may not store the component.
    Optional,
}

/// One component's registered intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    /// The component type.
    pub type_id: ComponentTypeId,
    /// Its name, for error messages.
    pub name: &'static str,
    /// The last registered intent.
    pub op: TermOp,
}

/// Collects term registrations while a query is created.
#[derive(Debug, Default)]
pub struct QueryBuilder {
    registrations: Vec<Registration>,
    fetched: Vec<ComponentTypeId>,
    error: Option<QueryError>,
}

impl QueryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `T`.
    pub fn with<T: Component>(&mut self) -> &mut Self {
        self.register(T::component_type_id(), T::type_name(), TermOp::With)
    }

    /// Excludes tables storing `T`.
    pub fn without<T: Component>(&mut self) -> &mut Self {
        self.register(T::component_type_id(), T::type_name(), TermOp::Without)
    }

    /// Allows `T` to be absent.
    pub fn optional<T: Component>(&mut self) -> &mut Self {
        self.register(T::component_type_id(), T::type_name(), TermOp::Optional)
    }

    /// Requires `T` as a fetched data slot. Fetching a type twice fails the
    /// build with [`QueryError::DuplicateComponent`].
    pub fn fetch<T: Component>(&mut self) -> &mut Self {
        let type_id = T::component_type_id();
        if self.fetched.contains(&type_id) {
            self.fail(QueryError::DuplicateComponent {
                component: T::type_name(),
            });
            return self;
        }
        self.fetched.push(type_id);
        self.with::<T>()
    }

    /// Registers `op` for a component type.
    ///
    /// Mixing `Without` with `With` or `Optional` for the same type fails the
    /// build with [`QueryError::ConflictingTerms`].
    pub fn register(&mut self, type_id: ComponentTypeId, name: &'static str, op: TermOp) -> &mut Self {
        match self.registrations.iter().position(|r| r.type_id == type_id) {
            Some(index) => {
                let was_excluded = self.registrations[index].op == TermOp::Without;
                if was_excluded == (op == TermOp::Without) {
                    self.registrations[index].op = op;
                } else {
                    self.fail(QueryError::ConflictingTerms { component: name });
                }
            }
            None => self.registrations.push(Registration { type_id, name, op }),
        }
        self
    }

    /// Registrations in order.
    #[must_use]
    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    fn fail(&mut self, error: QueryError) {
        self.error.get_or_insert(error);
    }

    /// Resolves the registrations into a plan.
    ///
    /// # Errors
    ///
    /// Returns the first error recorded while terms registered.
    pub fn finish(self) -> Result<QueryPlan, QueryError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut plan = QueryPlan::default();
        for registration in &self.registrations {
            match registration.op {
                TermOp::With => {
                    plan.slots.push(registration.type_id);
                    plan.required.push(registration.type_id);
                }
                TermOp::Optional => plan.slots.push(registration.type_id),
                TermOp::Without => plan.excluded.push(registration.type_id),
            }
        }
        Ok(plan)
    }
}

/// The resolved shape of a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPlan {
    slots: Vec<ComponentTypeId>,
    required: Vec<ComponentTypeId>,
    excluded: Vec<ComponentTypeId>,
}

impl QueryPlan {
    /// Required and optional components, in registration order. Data term
    /// `i` reads slot `i`.
    #[must_use]
    pub fn slots(&self) -> &[ComponentTypeId] {
        &self.slots
    }

    /// Components a table must store.
    #[must_use]
    pub fn required(&self) -> &[ComponentTypeId] {
        &self.required
    }

    /// Components a table must not store.
    #[must_use]
    pub fn excluded(&self) -> &[ComponentTypeId] {
        &self.excluded
    }

    /// Returns `true` if `table` satisfies every requirement.
    #[must_use]
    pub fn matches(&self, table: &ArchetypeTable) -> bool {
        self.required.iter().all(|&ty| table.has_component(ty))
            && !self.excluded.iter().any(|&ty| table.has_component(ty))
    }

    /// Indices of every matching table of `world`, in creation order.
    #[must_use]
    pub fn matching_tables(&self, world: &World) -> Vec<usize> {
        world
            .archetypes()
            .iter()
            .enumerate()
            .filter(|(_, table)| self.matches(table))
            .map(|(index, _)| index)
            .collect()
    }
}
