//! System scheduler: conflict detection and stage computation.
//!
//! The scheduler groups registered systems into **stages** based on their
//! read/write access sets. Systems within a stage have no conflicts with one
//! another. Stages run in order.

use engine_component::QueryDescriptor;

/// A group of systems with no conflicts between them.
#[derive(Debug, Clone, Default)]
pub struct Stage {
    /// Indices into the registry's system list, ascending.
    pub system_indices: Vec<usize>,
    /// Union of the access of every system in the stage.
    pub access: QueryDescriptor,
}

/// Computes execution stages from the access descriptors of the registered
/// systems, given in registration order.
///
/// Each system goes into the first stage after the last stage holding a
/// system it conflicts with, so two conflicting systems always run in
/// registration order. Non-conflicting systems share a stage.
#[must_use]
pub fn compute_stages<'a, I>(accesses: I) -> Vec<Stage>
where
    I: IntoIterator<Item = &'a QueryDescriptor>,
{
    let mut stages: Vec<Stage> = Vec::new();

    for (sys_idx, access) in accesses.into_iter().enumerate() {
        let earliest = stages
            .iter()
            .rposition(|stage| stage.access.conflicts_with(access))
            .map_or(0, |last_conflict| last_conflict + 1);

        match stages.get_mut(earliest) {
            Some(stage) => {
                stage.system_indices.push(sys_idx);
                stage.access.merge(access);
            }
            None => stages.push(Stage {
                system_indices: vec![sys_idx],
                access: access.clone(),
            }),
        }
    }

    stages
}
