//! # engine_component
//!
//! The storage half of the ECS: what a component is, how components are laid
//! out in archetype tables, and the change ticks stamped on every write.
//!
//! This crate provides:
//!
//! - [`Component`] trait: the contract all ECS data must satisfy.
//! - [`Entity`]: generation-tagged entity handles.
//! - [`EntityAllocator`]: slot allocator that recycles despawned ids under a new generation.
//! - [`ArchetypeTable`]: SoA storage grouped by component combination, with
//!   per-row added/changed [`Tick`]s in every [`Column`].
//! - [`World`]: the store that owns tables, entity locations and the change tick.
//! - [`QueryDescriptor`]: declarative data access requirements for systems.

pub mod access;
pub mod archetype;
pub mod bundle;
pub mod component;
pub mod entity;
pub mod error;
pub mod tick;
pub mod world;

pub use access::{FilterDescriptor, QueryDescriptor};
pub use archetype::{ArchetypeId, ArchetypeTable, Column, ColumnParts, MovedRow};
pub use bundle::Bundle;
pub use component::{Component, ComponentMeta, ComponentTypeId};
pub use entity::{Entity, EntityAllocator};
pub use error::WorldError;
pub use tick::{Tick, TickWindow};
pub use world::{EntityLocation, World, WorldId};
