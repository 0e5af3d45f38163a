//! # engine_app
//!
//! Runs systems over an [`engine_component::World`] on a fixed timestep.
//!
//! Systems declare their component access; the [`scheduler`] groups them
//! into conflict-free stages and the [`tick::TickLoop`] runs the stages in
//! order, handing each system the tick window since its previous run.

pub mod config;
pub mod demo;
pub mod registry;
pub mod scheduler;
pub mod system;
pub mod tick;

pub use config::{ConfigError, TickConfig};
pub use registry::{SystemEntry, SystemRegistry};
pub use scheduler::{Stage, compute_stages};
pub use system::{System, SystemContext};
pub use tick::TickLoop;
