//! Position updates for players and aliens
//!
//! Players are confined to the zone they spawned in: a step that would take
//! them into another zone, a corner, or the open interior is dropped. Aliens
//! wander the inner square and only ever step onto empty cells.

use crate::arena::{Cell, Grid, Position, Zone, ARENA_MAX, ARENA_MIN};
use crate::session::SessionRegistry;
use log::debug;
use rand::Rng;
use shared::Direction;

/// One step in `direction`, clamped to the arena. UP/DOWN change the row,
/// LEFT/RIGHT change the column.
pub fn next_position(pos: Position, direction: Direction) -> Position {
    match direction {
        Direction::Up => Position::new(pos.row.saturating_sub(1).max(ARENA_MIN), pos.col),
        Direction::Down => Position::new((pos.row + 1).min(ARENA_MAX), pos.col),
        Direction::Left => Position::new(pos.row, pos.col.saturating_sub(1).max(ARENA_MIN)),
        Direction::Right => Position::new(pos.row, (pos.col + 1).min(ARENA_MAX)),
    }
}

/// Moves a player one step if it keeps them inside their zone.
///
/// Returns true when the move was committed. Stunned or unknown players
/// are left untouched.
pub fn move_player(
    grid: &mut Grid,
    registry: &mut SessionRegistry,
    glyph: u8,
    direction: Direction,
) -> bool {
    let player = match registry.get_mut(glyph) {
        Some(player) if player.can_move => player,
        _ => return false,
    };

    let current = player.position;
    let candidate = next_position(current, direction);
    if candidate == current || Zone::classify(candidate) != Zone::classify(current) {
        return false;
    }

    grid.set(current, Cell::Empty);
    grid.set(candidate, Cell::Player(glyph));
    player.position = candidate;
    true
}

fn random_direction<R: Rng>(rng: &mut R) -> Direction {
    Direction::ALL[rng.gen_range(0..Direction::ALL.len())]
}

/// Gives every alien one chance to step in a random direction.
///
/// The alien positions are collected before anything moves, so an alien
/// that steps forward in scan order is not moved a second time. Returns
/// the number of aliens that actually moved.
pub fn move_alien_pass<R: Rng>(grid: &mut Grid, rng: &mut R) -> usize {
    let mut moved = 0;

    for pos in grid.alien_positions() {
        if !pos.in_alien_space() {
            continue;
        }

        let candidate = next_position(pos, random_direction(rng));
        if candidate.in_alien_space() && grid.is_vacant(candidate) {
            grid.set(pos, Cell::Empty);
            grid.set(candidate, Cell::Alien);
            moved += 1;
        }
    }

    debug!("Alien pass moved {} aliens", moved);
    moved
}
