//! Alien population: placement and adaptive respawning
//!
//! Aliens have no identity of their own. The grid markers are the
//! population and the game state keeps a matching alive-count. When the
//! count stops changing for long enough (typically because the survivors
//! are boxed in where no beam reaches them) fresh aliens are dropped in.

use crate::arena::{Cell, Grid, Position, INNER_MAX, INNER_MIN};
use log::{debug, info};
use rand::Rng;

/// Sampling attempts allowed per alien before placement gives up.
const ATTEMPTS_PER_ALIEN: usize = 1024;

/// Number of aliens to add to a stagnant population of `alive`
///
/// Ten percent of the survivors, rounded, but always at least one and
/// never enough to push the population past `cap`.
pub fn respawn_amount(alive: usize, cap: usize) -> usize {
    let increment = ((alive as f64) * 0.1).round() as usize;
    increment.max(1).min(cap.saturating_sub(alive))
}

/// Drops up to `count` aliens onto random empty cells of the inner region.
///
/// Placement is rejection sampling with a bounded attempt budget, so a
/// nearly full region cannot stall the caller. Returns how many aliens
/// were actually placed.
pub fn spawn_aliens<R: Rng>(grid: &mut Grid, rng: &mut R, count: usize) -> usize {
    let mut budget = count.saturating_mul(ATTEMPTS_PER_ALIEN);
    let mut placed = 0;

    while placed < count && budget > 0 {
        budget -= 1;
        let pos = Position::random_inner(rng);
        if grid.is_vacant(pos) {
            grid.set(pos, Cell::Alien);
            placed += 1;
        }
    }

    if placed < count {
        let inner_cells = (INNER_MAX - INNER_MIN + 1).pow(2);
        debug!(
            "Placed {} of {} aliens; inner region has {} cells",
            placed, count, inner_cells
        );
    }
    placed
}

/// Watches the alive-count across simulation ticks and decides when the
/// population has stagnated.
#[derive(Debug, Clone)]
pub struct RespawnTracker {
    last_alive: usize,
    stagnant_ticks: u32,
    threshold: u32,
    cap: usize,
}

impl RespawnTracker {
    pub fn new(alive: usize, threshold: u32, cap: usize) -> Self {
        Self {
            last_alive: alive,
            stagnant_ticks: 0,
            threshold,
            cap,
        }
    }

    pub fn stagnant_ticks(&self) -> u32 {
        self.stagnant_ticks
    }

    /// Records one tick's alive-count and returns how many aliens to spawn.
    ///
    /// Any change in the count resets the counter. Once the count has held
    /// still for `threshold` ticks a respawn is due; the caller reports the
    /// new population back through [`RespawnTracker::respawned`].
    pub fn observe(&mut self, alive: usize) -> usize {
        if alive != self.last_alive {
            self.last_alive = alive;
            self.stagnant_ticks = 0;
            return 0;
        }

        self.stagnant_ticks += 1;
        if self.stagnant_ticks < self.threshold {
            return 0;
        }

        respawn_amount(alive, self.cap)
    }

    /// Resets the counter after a respawn brought the population to `alive`.
    pub fn respawned(&mut self, alive: usize) {
        info!("Respawned aliens, population now {}", alive);
        self.last_alive = alive;
        self.stagnant_ticks = 0;
    }
}
