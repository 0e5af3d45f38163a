//! Fixed-timestep tick loop.
//!
//! Each tick:
//!
//! 1. Recompute stages if the system set changed.
//! 2. Advance the world's change tick; the new value is `this_run`.
//! 3. Run every stage in order. Each system receives the window
//!    `[last_run, this_run)` and afterwards records `last_run = this_run`.
//!
//! Writes made during a tick are stamped with its `this_run`, which lies
//! outside the current windows and inside every next one. Each system
//! therefore observes each write exactly once, on its first run after it.

use std::time::Instant;

use engine_component::{TickWindow, World};
use tracing::{debug, info, trace, warn};

use crate::config::TickConfig;
use crate::registry::SystemRegistry;
use crate::scheduler::{self, Stage};
use crate::system::{System, SystemContext};

/// The tick loop state.
#[derive(Debug)]
pub struct TickLoop {
    /// Current tick counter.
    tick_id: u64,
    /// Tick configuration.
    config: TickConfig,
    /// The world the systems operate on.
    world: World,
    /// Registered systems.
    registry: SystemRegistry,
    /// Pre-computed stages (recomputed when system set changes).
    stages: Vec<Stage>,
    /// Whether the stage cache is dirty and needs recomputation.
    stages_dirty: bool,
}

impl TickLoop {
    /// Create a new tick loop with an empty world.
    #[must_use]
    pub fn new(config: TickConfig) -> Self {
        Self::with_world(config, World::new())
    }

    /// Create a new tick loop over an existing world.
    #[must_use]
    pub fn with_world(config: TickConfig, world: World) -> Self {
        Self {
            tick_id: 0,
            config,
            world,
            registry: SystemRegistry::new(),
            stages: Vec::new(),
            stages_dirty: true,
        }
    }

    /// Returns the current tick counter.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &TickConfig {
        &self.config
    }

    /// Returns a reference to the world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Returns a mutable reference to the world.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Returns a reference to the system registry.
    #[must_use]
    pub fn registry(&self) -> &SystemRegistry {
        &self.registry
    }

    /// Returns a mutable reference to the system registry.
    pub fn registry_mut(&mut self) -> &mut SystemRegistry {
        self.stages_dirty = true;
        &mut self.registry
    }

    /// Registers a system.
    pub fn add_system(&mut self, system: impl System + 'static) -> usize {
        self.registry_mut().register(Box::new(system))
    }

    /// Recompute execution stages from the current system registry.
    fn recompute_stages(&mut self) {
        self.stages = scheduler::compute_stages(self.registry.iter().map(|entry| &entry.access));
        self.stages_dirty = false;

        info!(
            tick_id = self.tick_id,
            stage_count = self.stages.len(),
            system_count = self.registry.system_count(),
            "recomputed execution stages"
        );
    }

    /// Returns the current execution stages, recomputing if necessary.
    #[must_use]
    pub fn stages(&mut self) -> &[Stage] {
        if self.stages_dirty {
            self.recompute_stages();
        }
        &self.stages
    }

    /// Run one tick: every stage in order, every system with its window.
    pub fn tick(&mut self, dt: f64) {
        self.tick_id += 1;

        if self.stages_dirty {
            self.recompute_stages();
        }

        let this_run = self.world.increment_change_tick();

        debug!(
            tick_id = self.tick_id,
            dt,
            %this_run,
            stages = self.stages.len(),
            "tick start"
        );

        for (stage_idx, stage) in self.stages.iter().enumerate() {
            debug!(
                tick_id = self.tick_id,
                stage = stage_idx,
                systems = stage.system_indices.len(),
                "executing stage"
            );

            for &index in &stage.system_indices {
                let Some(entry) = self.registry.get_mut(index) else {
                    continue;
                };
                let window = TickWindow::new(entry.last_run, this_run);
                let mut ctx = SystemContext::new(&mut self.world, self.tick_id, dt, window);
                entry.system.run(&mut ctx);
                entry.last_run = this_run;

                trace!(
                    system = %entry.name,
                    last_run = %window.last_run,
                    %this_run,
                    "system ran"
                );
            }
        }
    }

    /// Run the tick loop for the configured number of ticks, or indefinitely.
    pub fn run(&mut self) {
        let tick_duration = self.config.tick_duration();
        let mut tick_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );

        loop {
            let start = Instant::now();

            let dt = tick_duration.as_secs_f64();
            self.tick(dt);

            tick_count += 1;
            if self.config.max_ticks > 0 && tick_count >= self.config.max_ticks {
                info!(
                    ticks = tick_count,
                    entities = self.world.entity_count(),
                    archetypes = self.world.archetype_count(),
                    "tick loop complete"
                );
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < tick_duration {
                std::thread::sleep(tick_duration - elapsed);
            } else {
                warn!(
                    tick_id = self.tick_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = tick_duration.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use engine_component::{Component, ComponentTypeId, QueryDescriptor, Tick};
    use engine_query::{Changed, Data, Filter, Query};

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Counter(u32);
    impl Component for Counter {
        fn type_name() -> &'static str {
            "Counter"
        }
    }

    /// Records the window of every run.
    struct Recorder {
        name: &'static str,
        access: QueryDescriptor,
        windows: Arc<Mutex<Vec<TickWindow>>>,
    }

    impl System for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn access(&self) -> QueryDescriptor {
            self.access.clone()
        }

        fn run(&mut self, ctx: &mut SystemContext<'_>) {
            if let Ok(mut windows) = self.windows.lock() {
                windows.push(ctx.window);
            }
        }
    }

    /// Bumps every counter on even ticks.
    struct Bump;

    impl System for Bump {
        fn name(&self) -> &str {
            "bump"
        }

        fn access(&self) -> QueryDescriptor {
            QueryDescriptor::new().write(Counter::component_type_id())
        }

        fn run(&mut self, ctx: &mut SystemContext<'_>) {
            if ctx.tick_id % 2 == 0 {
                let entities: Vec<_> = ctx.world.archetypes().iter().flat_map(|t| t.entities().to_vec()).collect();
                for entity in entities {
                    if let Some(counter) = ctx.world.get_mut::<Counter>(entity) {
                        counter.0 += 1;
                    }
                }
            }
        }
    }

    /// Counts changed counters per run.
    struct Watch {
        query: Query<Data<(Counter,)>, Filter<(Changed<Counter>,)>>,
        seen: Arc<Mutex<Vec<usize>>>,
    }

    impl System for Watch {
        fn name(&self) -> &str {
            "watch"
        }

        fn access(&self) -> QueryDescriptor {
            self.query.descriptor().clone()
        }

        fn run(&mut self, ctx: &mut SystemContext<'_>) {
            let count = self.query.iter(ctx.world, ctx.window).count();
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(count);
            }
        }
    }

    #[test]
    fn test_tick_advances_counter() {
        let mut tick_loop = TickLoop::new(TickConfig::default());
        assert_eq!(tick_loop.tick_id(), 0);
        tick_loop.tick(1.0 / 60.0);
        assert_eq!(tick_loop.tick_id(), 1);
        tick_loop.tick(1.0 / 60.0);
        assert_eq!(tick_loop.tick_id(), 2);
        assert_eq!(tick_loop.world().change_tick(), Tick(3));
    }

    #[test]
    fn test_stages_recomputed_on_registry_change() {
        let mut tick_loop = TickLoop::new(TickConfig::default());
        assert!(tick_loop.stages().is_empty());

        tick_loop.add_system(Recorder {
            name: "physics",
            access: QueryDescriptor::new()
                .read(ComponentTypeId(1))
                .write(ComponentTypeId(2)),
            windows: Arc::default(),
        });
        assert_eq!(tick_loop.stages().len(), 1);
    }

    #[test]
    fn test_windows_chain_between_runs() {
        let windows = Arc::new(Mutex::new(Vec::new()));
        let mut tick_loop = TickLoop::new(TickConfig::default());
        tick_loop.add_system(Recorder {
            name: "recorder",
            access: QueryDescriptor::new(),
            windows: Arc::clone(&windows),
        });

        tick_loop.tick(0.0);
        tick_loop.tick(0.0);
        tick_loop.tick(0.0);

        let windows = windows.lock().unwrap().clone();
        assert_eq!(
            windows,
            vec![
                TickWindow::new(Tick::ZERO, Tick(2)),
                TickWindow::new(Tick(2), Tick(3)),
                TickWindow::new(Tick(3), Tick(4)),
            ]
        );
        assert_eq!(tick_loop.registry().get("recorder").unwrap().last_run, Tick(4));
    }

    #[test]
    fn test_changes_are_observed_once() {
        let mut world = World::new();
        world.spawn((Counter(0),));
        world.spawn((Counter(0),));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut tick_loop = TickLoop::with_world(TickConfig::default(), world);
        tick_loop.add_system(Bump);
        tick_loop.add_system(Watch {
            query: Query::new().unwrap(),
            seen: Arc::clone(&seen),
        });

        for _ in 0..5 {
            tick_loop.tick(0.0);
        }

        // Tick 1 sees the spawns; a bump on an even tick shows up one tick later.
        assert_eq!(*seen.lock().unwrap(), vec![2, 0, 2, 0, 2]);
    }

    #[test]
    fn test_run_limited_ticks() {
        let config = TickConfig {
            tick_rate: 1000.0,
            max_ticks: 5,
            ..TickConfig::default()
        };
        let mut tick_loop = TickLoop::new(config);
        tick_loop.run();
        assert_eq!(tick_loop.tick_id(), 5);
    }
}
