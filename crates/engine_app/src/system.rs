//! Systems and the per-run context handed to them.

use engine_component::{QueryDescriptor, TickWindow, World};

/// Context provided to a system on each run.
///
/// `window` spans from the system's previous run (inclusive) to this run
/// (exclusive); it is what `Added` and `Changed` filters compare against.
#[derive(Debug)]
pub struct SystemContext<'w> {
    /// The world the system reads and writes.
    pub world: &'w mut World,
    /// The current tick ID.
    pub tick_id: u64,
    /// Delta time since the last tick, in seconds.
    pub dt: f64,
    /// Ticks this run treats as new.
    pub window: TickWindow,
}

impl<'w> SystemContext<'w> {
    /// Create a new context for a run.
    #[must_use]
    pub fn new(world: &'w mut World, tick_id: u64, dt: f64, window: TickWindow) -> Self {
        Self {
            world,
            tick_id,
            dt,
            window,
        }
    }
}

/// A unit of logic run once per tick.
pub trait System {
    /// Human-readable system name (e.g. `"movement"`).
    fn name(&self) -> &str;

    /// The data access requirements, used to group systems into stages.
    fn access(&self) -> QueryDescriptor;

    /// Runs the system.
    fn run(&mut self, ctx: &mut SystemContext<'_>);
}

#[cfg(test)]
mod tests {
    use engine_component::Tick;

    use super::*;

    struct Counter {
        runs: u32,
        last_window: Option<TickWindow>,
    }

    impl System for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn access(&self) -> QueryDescriptor {
            QueryDescriptor::new()
        }

        fn run(&mut self, ctx: &mut SystemContext<'_>) {
            self.runs += 1;
            self.last_window = Some(ctx.window);
        }
    }

    #[test]
    fn test_context_creation() {
        let mut world = World::new();
        let ctx = SystemContext::new(&mut world, 1, 0.016, TickWindow::up_to(Tick(2)));
        assert_eq!(ctx.tick_id, 1);
        assert!((ctx.dt - 0.016).abs() < f64::EPSILON);
        assert_eq!(ctx.window.this_run, Tick(2));
    }

    #[test]
    fn test_system_run_receives_window() {
        let mut world = World::new();
        let mut system = Counter {
            runs: 0,
            last_window: None,
        };
        let window = TickWindow::new(Tick(1), Tick(2));
        system.run(&mut SystemContext::new(&mut world, 1, 0.0, window));
        assert_eq!(system.runs, 1);
        assert_eq!(system.last_window, Some(window));
    }
}
