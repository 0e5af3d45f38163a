//! World error types.

use crate::entity::Entity;

/// Errors returned by [`World`](crate::World) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// The entity was never spawned or has been despawned.
    #[error("{0} not found")]
    EntityNotFound(Entity),

    /// The entity exists but does not carry the component.
    #[error("component `{component}` not found on {entity}")]
    ComponentNotFound {
        /// The entity that was looked up.
        entity: Entity,
        /// Name of the missing component type.
        component: &'static str,
    },
}
