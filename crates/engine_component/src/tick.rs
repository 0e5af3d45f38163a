//! Change ticks and tick windows.
//!
//! Every column row carries two [`Tick`] stamps: the tick at which the
//! component was attached (`added`) and the tick of its most recent write
//! (`changed`). A consumer asks "what is new since my last run" with a
//! [`TickWindow`], a half-open range `[last_run, this_run)`.

use serde::{Deserialize, Serialize};

/// A generation counter stamped onto component rows.
///
/// Ticks increase monotonically for the lifetime of a world.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tick(pub u32);

impl Tick {
    /// The tick before anything ran. Every stamp is `>= ZERO`.
    pub const ZERO: Tick = Tick(0);

    /// Creates a tick from a raw counter value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns the tick that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl std::fmt::Display for Tick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tick({})", self.0)
    }
}

/// The half-open range of ticks one execution of a consumer treats as new.
///
/// A stored tick `t` is in the window iff `last_run <= t < this_run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickWindow {
    /// Tick of the consumer's previous execution (inclusive lower bound).
    pub last_run: Tick,
    /// Tick of the current execution (exclusive upper bound).
    pub this_run: Tick,
}

impl TickWindow {
    /// Creates a window from its two bounds.
    #[must_use]
    pub const fn new(last_run: Tick, this_run: Tick) -> Self {
        Self { last_run, this_run }
    }

    /// A window that accepts every stamp written before `this_run`.
    #[must_use]
    pub const fn up_to(this_run: Tick) -> Self {
        Self::new(Tick::ZERO, this_run)
    }

    /// Returns `true` if `tick` falls inside `[last_run, this_run)`.
    #[inline]
    #[must_use]
    pub fn contains(self, tick: Tick) -> bool {
        tick >= self.last_run && tick < self.this_run
    }

    /// Returns `true` if no tick can satisfy the window.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.this_run <= self.last_run
    }
}
