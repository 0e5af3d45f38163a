//! Demo world and systems driven by the binary.
//!
//! Entities move with a constant velocity; every other one carries a
//! [`Sprite`]. Four systems run each tick:
//!
//! | system          | query                                                   |
//! |-----------------|---------------------------------------------------------|
//! | `movement`      | `Data<(Position, Velocity)>`                            |
//! | `touch`         | `Data<(Position,)>`, `Filter<(With<Velocity>, MarkChanged<Position>)>` |
//! | `sprite_report` | `Data<(Position, Sprite)>`, `Filter<(Optional<Sprite>,)>` |
//! | `change_report` | `Changed<Position>` and `Added<Position>`               |

use engine_component::{Component, QueryDescriptor, World};
use engine_query::{Added, Changed, Data, Filter, MarkChanged, Optional, Query, QueryError, With};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::system::{System, SystemContext};
use crate::tick::TickLoop;

/// Position in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Component for Position {
    fn type_name() -> &'static str {
        "Position"
    }
}

/// Units per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub dx: f32,
    pub dy: f32,
}

impl Component for Velocity {
    fn type_name() -> &'static str {
        "Velocity"
    }
}

/// Name of the image drawn at an entity's position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprite(pub String);

impl Component for Sprite {
    fn type_name() -> &'static str {
        "Sprite"
    }
}

/// Spawns `count` moving entities; even ones get a sprite.
pub fn populate(world: &mut World, count: usize) {
    for i in 0..count {
        let position = Position {
            x: i as f32,
            y: 0.0,
        };
        let velocity = Velocity {
            dx: 1.0,
            dy: i as f32 * 0.5,
        };
        if i % 2 == 0 {
            world.spawn((position, velocity, Sprite(format!("sprite_{i}"))));
        } else {
            world.spawn((position, velocity));
        }
    }
    info!(
        entities = world.entity_count(),
        archetypes = world.archetype_count(),
        "populated demo world"
    );
}

/// Registers the demo systems in execution order.
///
/// # Errors
///
/// Returns a [`QueryError`] if one of the system queries fails to build.
pub fn register_systems(tick_loop: &mut TickLoop) -> Result<(), QueryError> {
    tick_loop.add_system(Movement::new()?);
    tick_loop.add_system(Touch::new()?);
    tick_loop.add_system(SpriteReport::new()?);
    tick_loop.add_system(ChangeReport::new()?);
    Ok(())
}

/// Integrates velocity into position.
#[derive(Debug)]
pub struct Movement {
    query: Query<Data<(Position, Velocity)>>,
    /// Rows moved by the last run.
    pub moved: usize,
}

impl Movement {
    /// Builds the system's query.
    ///
    /// # Errors
    ///
    /// Returns a [`QueryError`] if the query fails to build.
    pub fn new() -> Result<Self, QueryError> {
        Ok(Self {
            query: Query::new()?,
            moved: 0,
        })
    }
}

impl System for Movement {
    fn name(&self) -> &str {
        "movement"
    }

    fn access(&self) -> QueryDescriptor {
        self.query.descriptor().clone()
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) {
        let dt = ctx.dt as f32;
        let mut moved = 0;
        for (mut position, velocity) in self.query.iter(ctx.world, ctx.window) {
            position.x += velocity.dx * dt;
            position.y += velocity.dy * dt;
            moved += 1;
        }
        self.moved = moved;
    }
}

/// Marks the position of every moving entity changed.
///
/// Writes through query handles leave the change ticks alone, so this runs
/// after [`Movement`] to publish its updates.
#[derive(Debug)]
pub struct Touch {
    query: Query<Data<(Position,)>, Filter<(With<Velocity>, MarkChanged<Position>)>>,
    /// Rows marked by the last run.
    pub touched: usize,
}

impl Touch {
    /// Builds the system's query.
    ///
    /// # Errors
    ///
    /// Returns a [`QueryError`] if the query fails to build.
    pub fn new() -> Result<Self, QueryError> {
        Ok(Self {
            query: Query::new()?,
            touched: 0,
        })
    }
}

impl System for Touch {
    fn name(&self) -> &str {
        "touch"
    }

    fn access(&self) -> QueryDescriptor {
        self.query.descriptor().clone()
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) {
        self.touched = self.query.iter(ctx.world, ctx.window).count();
    }
}

/// Counts entities with and without a sprite.
#[derive(Debug)]
pub struct SpriteReport {
    query: Query<Data<(Position, Sprite)>, Filter<(Optional<Sprite>,)>>,
    /// Rows with a sprite in the last run.
    pub with_sprite: usize,
    /// Rows without a sprite in the last run.
    pub without_sprite: usize,
}

impl SpriteReport {
    /// Builds the system's query.
    ///
    /// # Errors
    ///
    /// Returns a [`QueryError`] if the query fails to build.
    pub fn new() -> Result<Self, QueryError> {
        Ok(Self {
            query: Query::new()?,
            with_sprite: 0,
            without_sprite: 0,
        })
    }
}

impl System for SpriteReport {
    fn name(&self) -> &str {
        "sprite_report"
    }

    fn access(&self) -> QueryDescriptor {
        self.query.descriptor().clone()
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) {
        let (mut with_sprite, mut without_sprite) = (0, 0);
        for (position, sprite) in self.query.iter(ctx.world, ctx.window) {
            match sprite.get() {
                Some(sprite) => {
                    with_sprite += 1;
                    debug!(sprite = %sprite.0, x = position.x, y = position.y, "draw");
                }
                None => without_sprite += 1,
            }
        }
        self.with_sprite = with_sprite;
        self.without_sprite = without_sprite;
    }
}

/// Reports how many positions were attached and written since its last run.
#[derive(Debug)]
pub struct ChangeReport {
    changed: Query<Data<(Position,)>, Filter<(Changed<Position>,)>>,
    added: Query<Data<(Position,)>, Filter<(Added<Position>,)>>,
    /// Positions written since the previous run.
    pub changed_count: usize,
    /// Positions attached since the previous run.
    pub added_count: usize,
}

impl ChangeReport {
    /// Builds the system's queries.
    ///
    /// # Errors
    ///
    /// Returns a [`QueryError`] if a query fails to build.
    pub fn new() -> Result<Self, QueryError> {
        Ok(Self {
            changed: Query::new()?,
            added: Query::new()?,
            changed_count: 0,
            added_count: 0,
        })
    }
}

impl System for ChangeReport {
    fn name(&self) -> &str {
        "change_report"
    }

    fn access(&self) -> QueryDescriptor {
        let mut access = self.changed.descriptor().clone();
        access.merge(self.added.descriptor());
        access
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) {
        self.changed_count = self.changed.iter(ctx.world, ctx.window).count();
        self.added_count = self.added.iter(ctx.world, ctx.window).count();
        if self.changed_count > 0 || self.added_count > 0 {
            info!(
                tick_id = ctx.tick_id,
                changed = self.changed_count,
                added = self.added_count,
                "positions updated"
            );
        }
    }
}
