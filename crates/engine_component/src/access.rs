//! Query access descriptors.
//!
//! A [`QueryDescriptor`] records which component types a query reads and
//! writes and which filters it applies. Query terms fill one in while a query
//! is built; a scheduler uses them to detect conflicts between systems.

use serde::{Deserialize, Serialize};

use crate::component::ComponentTypeId;

/// Describes the data access requirements of a query.
///
/// The descriptor is used to:
///
/// 1. Report what a built query touches (for logging and diagnostics).
/// 2. Detect read/write conflicts between systems for stage scheduling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Component types the query reads immutably.
    pub reads: Vec<ComponentTypeId>,
    /// Component types the query writes (values or change ticks).
    pub writes: Vec<ComponentTypeId>,
    /// Component types that are optional: matching tables may lack them.
    pub optionals: Vec<ComponentTypeId>,
    /// Filters applied to the query (e.g. `With<T>`, `Without<T>`, `Changed<T>`).
    pub filters: Vec<FilterDescriptor>,
}

impl QueryDescriptor {
    /// Create a new empty query descriptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a read-only component requirement.
    #[must_use]
    pub fn read(mut self, type_id: ComponentTypeId) -> Self {
        self.add_read(type_id);
        self
    }

    /// Add a mutable component requirement.
    #[must_use]
    pub fn write(mut self, type_id: ComponentTypeId) -> Self {
        self.add_write(type_id);
        self
    }

    /// Add an optional component.
    #[must_use]
    pub fn optional(mut self, type_id: ComponentTypeId) -> Self {
        self.add_optional(type_id);
        self
    }

    /// Add a query filter.
    #[must_use]
    pub fn filter(mut self, f: FilterDescriptor) -> Self {
        self.add_filter(f);
        self
    }

    /// Records a read, ignoring duplicates.
    pub fn add_read(&mut self, type_id: ComponentTypeId) {
        if !self.reads.contains(&type_id) {
            self.reads.push(type_id);
        }
    }

    /// Records a write, ignoring duplicates.
    pub fn add_write(&mut self, type_id: ComponentTypeId) {
        if !self.writes.contains(&type_id) {
            self.writes.push(type_id);
        }
    }

    /// Records an optional component, ignoring duplicates.
    pub fn add_optional(&mut self, type_id: ComponentTypeId) {
        if !self.optionals.contains(&type_id) {
            self.optionals.push(type_id);
        }
    }

    /// Records a filter.
    pub fn add_filter(&mut self, f: FilterDescriptor) {
        if !self.filters.contains(&f) {
            self.filters.push(f);
        }
    }

    /// Merges another descriptor into this one.
    pub fn merge(&mut self, other: &QueryDescriptor) {
        for &ty in &other.reads {
            self.add_read(ty);
        }
        for &ty in &other.writes {
            self.add_write(ty);
        }
        for &ty in &other.optionals {
            self.add_optional(ty);
        }
        for &f in &other.filters {
            self.add_filter(f);
        }
    }

    /// Checks whether this query conflicts with another.
    ///
    /// Two queries conflict when one writes a component type that the other
    /// reads or writes:
    ///
    /// ```text
    /// A.writes ∩ (B.reads ∪ B.writes) ≠ ∅  OR
    /// B.writes ∩ (A.reads ∪ A.writes) ≠ ∅
    /// ```
    #[must_use]
    pub fn conflicts_with(&self, other: &QueryDescriptor) -> bool {
        for w in &self.writes {
            if other.reads.contains(w) || other.writes.contains(w) {
                return true;
            }
        }
        for w in &other.writes {
            if self.reads.contains(w) || self.writes.contains(w) {
                return true;
            }
        }
        false
    }
}

/// A filter that narrows, or acts on, the set of rows matched by a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterDescriptor {
    /// Only match entities that have this component.
    With(ComponentTypeId),
    /// Only match entities that do NOT have this component.
    Without(ComponentTypeId),
    /// Only match rows whose component was attached inside the tick window.
    Added(ComponentTypeId),
    /// Only match rows whose component was written inside the tick window.
    Changed(ComponentTypeId),
    /// Stamp every visited row's component as changed.
    MarkChanged(ComponentTypeId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_conflict_both_read() {
        let transform = ComponentTypeId(1);

        let q1 = QueryDescriptor::new().read(transform);
        let q2 = QueryDescriptor::new().read(transform);

        assert!(!q1.conflicts_with(&q2));
    }

    #[test]
    fn test_conflict_read_vs_write() {
        let transform = ComponentTypeId(1);

        let q1 = QueryDescriptor::new().read(transform);
        let q2 = QueryDescriptor::new().write(transform);

        assert!(q1.conflicts_with(&q2));
    }

    #[test]
    fn test_conflict_write_vs_write() {
        let velocity = ComponentTypeId(2);

        let q1 = QueryDescriptor::new().write(velocity);
        let q2 = QueryDescriptor::new().write(velocity);

        assert!(q1.conflicts_with(&q2));
    }

    #[test]
    fn test_no_conflict_different_types() {
        let velocity = ComponentTypeId(2);
        let ai_state = ComponentTypeId(3);
        let transform = ComponentTypeId(1);

        let physics = QueryDescriptor::new().read(transform).write(velocity);
        let ai = QueryDescriptor::new().read(transform).write(ai_state);

        assert!(!physics.conflicts_with(&ai));
    }

    #[test]
    fn test_duplicates_are_ignored() {
        let a = ComponentTypeId(1);
        let q = QueryDescriptor::new()
            .read(a)
            .read(a)
            .filter(FilterDescriptor::Changed(a))
            .filter(FilterDescriptor::Changed(a));
        assert_eq!(q.reads, vec![a]);
        assert_eq!(q.filters.len(), 1);
    }

    #[test]
    fn test_merge() {
        let a = ComponentTypeId(1);
        let b = ComponentTypeId(2);
        let mut q = QueryDescriptor::new().read(a);
        q.merge(
            &QueryDescriptor::new()
                .write(b)
                .filter(FilterDescriptor::Without(a)),
        );
        assert_eq!(q.reads, vec![a]);
        assert_eq!(q.writes, vec![b]);
        assert_eq!(q.filters, vec![FilterDescriptor::Without(a)]);
    }

    #[test]
    fn test_descriptor_serialization_roundtrip() {
        let q = QueryDescriptor::new()
            .read(ComponentTypeId(1))
            .filter(FilterDescriptor::Added(ComponentTypeId(1)));
        let json = serde_json::to_string(&q).unwrap();
        let restored: QueryDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(q, restored);
    }
}
