//! Query error types.

/// Errors returned while building or resolving a [`Query`](crate::Query).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// The data side of the query fetches the same component twice.
    #[error("component `{component}` is fetched more than once")]
    DuplicateComponent {
        /// Name of the repeated component type.
        component: &'static str,
    },

    /// A component is both excluded and required (or optional).
    #[error("component `{component}` is both excluded and included")]
    ConflictingTerms {
        /// Name of the component type registered with both intents.
        component: &'static str,
    },

    /// A data term that steps once per table was combined with a filter that
    /// steps once per row.
    #[error("per-table query data cannot be combined with per-row filters")]
    BatchWithRowFilter,

    /// [`Query::single`](crate::Query::single) found zero or several rows.
    #[error("expected exactly one matching row, found {matched}")]
    NotSingle {
        /// Number of rows that matched.
        matched: usize,
    },
}
