//! Beam attacks
//!
//! A shot sweeps the shooter's whole row or column. Aliens on the line are
//! destroyed and credited to the shooter, the line is painted with a
//! transient beam marker, and every other player standing on the line is
//! stunned. The beam is erased later by [`clear_beam`].

use crate::arena::{Cell, Grid, Orientation};
use crate::session::SessionRegistry;
use log::info;
use std::time::Instant;

/// Everything needed to erase a beam once its lifetime is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Beam {
    pub shot: u64,
    pub orientation: Orientation,
    /// Row for horizontal beams, column for vertical ones.
    pub line: usize,
}

/// Result of one resolved shot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShotReport {
    pub beam: Beam,
    pub shooter: u8,
    pub kills: u32,
    /// Glyphs of the players caught in the beam.
    pub stunned: Vec<u8>,
}

/// Resolves a shot fired by `glyph`.
///
/// Returns None when the player is unknown or still on cooldown. The
/// caller owns the alien alive-count and must subtract `kills` from it.
pub fn fire(
    grid: &mut Grid,
    registry: &mut SessionRegistry,
    glyph: u8,
    shot: u64,
    now: Instant,
) -> Option<ShotReport> {
    let shooter = registry.get(glyph)?;
    if !shooter.can_shoot {
        return None;
    }

    let orientation = shooter.zone.orientation();
    let line = orientation.line_of(shooter.position);
    let beam = Beam {
        shot,
        orientation,
        line,
    };

    let kills = sweep(grid, beam);

    let mut stunned = Vec::new();
    for player in registry.players_mut() {
        if player.glyph != glyph && orientation.line_of(player.position) == line {
            player.stun(now);
            stunned.push(player.glyph);
        }
    }

    let shooter = registry.get_mut(glyph)?;
    shooter.score += kills;
    shooter.shot_time = Some(now);
    shooter.can_shoot = false;

    if kills > 0 || !stunned.is_empty() {
        info!(
            "Player {} fired: {} aliens destroyed, {} players stunned",
            glyph as char,
            kills,
            stunned.len()
        );
    }

    Some(ShotReport {
        beam,
        shooter: glyph,
        kills,
        stunned,
    })
}

/// Paints the beam over every non-player cell on its line and counts the
/// aliens it destroyed. Older beam markers are repainted with this shot.
fn sweep(grid: &mut Grid, beam: Beam) -> u32 {
    let mut kills = 0;
    let marker = Cell::Beam {
        orientation: beam.orientation,
        shot: beam.shot,
    };

    for pos in beam.orientation.positions(beam.line) {
        match grid.get(pos) {
            Cell::Alien => {
                kills += 1;
                grid.set(pos, marker);
            }
            Cell::Empty | Cell::Beam { .. } => grid.set(pos, marker),
            Cell::Player(_) | Cell::Label(_) => {}
        }
    }

    kills
}

/// Erases the markers left by one shot.
///
/// Only cells still tagged with this shot are cleared, so a newer beam drawn
/// across the same line survives. Any alien found on the line is removed
/// too; the return value is the number of such aliens so the caller can
/// keep its alive-count in step.
pub fn clear_beam(grid: &mut Grid, beam: Beam) -> usize {
    let mut removed_aliens = 0;

    for pos in beam.orientation.positions(beam.line) {
        match grid.get(pos) {
            Cell::Beam { shot, .. } if shot == beam.shot => grid.set(pos, Cell::Empty),
            Cell::Alien => {
                removed_aliens += 1;
                grid.set(pos, Cell::Empty);
            }
            _ => {}
        }
    }

    removed_aliens
}
