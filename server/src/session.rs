//! Player sessions, ticket authentication and cooldown bookkeeping
//!
//! This module tracks everyone currently playing in the arena:
//! - Session lifecycle (join, leave) and zone assignment
//! - Per-session tickets used to authenticate every later request
//! - Move/shoot flags and the timers that re-enable them
//! - The zone occupancy table, kept in step with live glyphs
//!
//! The registry never touches the grid. Callers that hold the arena lock
//! are responsible for drawing and erasing player glyphs.

use crate::arena::{Position, Zone};
use log::info;
use rand::distributions::Alphanumeric;
use rand::Rng;
use shared::{ScoreEntry, Ticket, MAX_PLAYERS, TICKET_LEN};
use std::time::{Duration, Instant};

/// Random zone draws attempted before falling back to a linear scan.
const MAX_ZONE_DRAWS: usize = 64;

/// A connected player and their combat state
///
/// The glyph is always the letter of the zone the player was assigned, so
/// it stays unique for as long as the session lives.
#[derive(Debug, Clone)]
pub struct Player {
    pub glyph: u8,
    pub zone: Zone,
    pub ticket: Ticket,
    pub position: Position,
    /// Aliens destroyed; never decreases.
    pub score: u32,
    pub can_move: bool,
    pub can_shoot: bool,
    /// When the player was last caught in someone else's beam
    pub hit_time: Option<Instant>,
    /// When the player last fired
    pub shot_time: Option<Instant>,
}

impl Player {
    /// Creates a fresh player with a zero score and both actions enabled.
    pub fn new(zone: Zone, ticket: Ticket, position: Position) -> Self {
        Self {
            glyph: zone.letter(),
            zone,
            ticket,
            position,
            score: 0,
            can_move: true,
            can_shoot: true,
            hit_time: None,
            shot_time: None,
        }
    }

    /// Disables both actions after being caught in a beam.
    pub fn stun(&mut self, now: Instant) {
        self.can_move = false;
        self.can_shoot = false;
        self.hit_time = Some(now);
    }

    fn elapsed_since(stamp: Option<Instant>, now: Instant) -> Duration {
        stamp.map_or(Duration::MAX, |t| now.saturating_duration_since(t))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined {
        glyph: u8,
        ticket: Ticket,
        position: Position,
    },
    Full,
}

/// Tracks every live session and the zone each one occupies
///
/// Players are kept in join order, which is also the order the scoreboard
/// lists them in and the tie-break order when picking a winner.
pub struct SessionRegistry {
    players: Vec<Player>,
    occupancy: [bool; MAX_PLAYERS],
    hit_cooldown: Duration,
    shot_cooldown: Duration,
}

impl SessionRegistry {
    pub fn new(hit_cooldown: Duration, shot_cooldown: Duration) -> Self {
        Self {
            players: Vec::with_capacity(MAX_PLAYERS),
            occupancy: [false; MAX_PLAYERS],
            hit_cooldown,
            shot_cooldown,
        }
    }

    /// Admits a new player into a random free zone
    ///
    /// Zone choice is rejection sampling over all eight zones. Because there
    /// are exactly as many zones as sessions, a free zone always exists
    /// whenever the registry is not full; the draw count is still bounded,
    /// after which the first free zone is taken.
    pub fn join<R: Rng>(&mut self, rng: &mut R) -> JoinOutcome {
        if self.is_full() {
            return JoinOutcome::Full;
        }

        let zone = match self.choose_free_zone(rng) {
            Some(zone) => zone,
            None => return JoinOutcome::Full,
        };

        let ticket = generate_ticket(rng);
        let position = zone.spawn_position(rng);
        match self.admit(zone, ticket, position) {
            Some(player) => JoinOutcome::Joined {
                glyph: player.glyph,
                ticket,
                position,
            },
            None => JoinOutcome::Full,
        }
    }

    /// Places a player with a known ticket at a known spot in `zone`
    ///
    /// Returns None if the zone is already taken, the position lies outside
    /// the zone, or the registry is full.
    pub fn admit(&mut self, zone: Zone, ticket: Ticket, position: Position) -> Option<&Player> {
        if self.is_full() || self.is_occupied(zone) || !zone.contains(position) {
            return None;
        }

        let player = Player::new(zone, ticket, position);
        self.occupancy[zone.index()] = true;
        info!(
            "Player {} joined in zone {:?} at ({}, {})",
            player.glyph as char, zone, position.row, position.col
        );
        self.players.push(player);
        self.players.last()
    }

    fn choose_free_zone<R: Rng>(&self, rng: &mut R) -> Option<Zone> {
        for _ in 0..MAX_ZONE_DRAWS {
            let zone = Zone::ALL[rng.gen_range(0..Zone::ALL.len())];
            if !self.occupancy[zone.index()] {
                return Some(zone);
            }
        }

        Zone::ALL
            .iter()
            .copied()
            .find(|zone| !self.occupancy[zone.index()])
    }

    /// Removes an authenticated session and frees its zone
    ///
    /// Returns the removed player so the caller can erase its glyph, or
    /// None when the glyph/ticket pair does not name a live session.
    pub fn leave(&mut self, glyph: u8, ticket: &Ticket) -> Option<Player> {
        if !self.validate(glyph, ticket) {
            return None;
        }

        let index = self.players.iter().position(|p| p.glyph == glyph)?;
        let player = self.players.remove(index);
        self.occupancy[player.zone.index()] = false;
        info!("Player {} left with score {}", glyph as char, player.score);

        Some(player)
    }

    /// True iff a live session with this glyph holds this exact ticket.
    pub fn validate(&self, glyph: u8, ticket: &Ticket) -> bool {
        self.get(glyph).is_some_and(|player| player.ticket == *ticket)
    }

    /// Re-enables actions whose cooldowns have expired
    ///
    /// Hit recovery is evaluated first and restores both actions. The shot
    /// cooldown only re-enables shooting for players that can already move,
    /// so a stunned player never regains `can_shoot` before `can_move`.
    pub fn tick_cooldowns(&mut self, now: Instant) {
        for player in &mut self.players {
            if !player.can_move
                && Player::elapsed_since(player.hit_time, now) >= self.hit_cooldown
            {
                player.can_move = true;
                player.can_shoot = true;
            }

            if !player.can_shoot
                && player.can_move
                && Player::elapsed_since(player.shot_time, now) >= self.shot_cooldown
            {
                player.can_shoot = true;
            }
        }
    }

    pub fn get(&self, glyph: u8) -> Option<&Player> {
        self.players.iter().find(|p| p.glyph == glyph)
    }

    pub fn get_mut(&mut self, glyph: u8) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.glyph == glyph)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }

    pub fn is_occupied(&self, zone: Zone) -> bool {
        self.occupancy[zone.index()]
    }

    /// One entry per live session, in join order.
    pub fn scoreboard(&self) -> Vec<ScoreEntry> {
        self.players
            .iter()
            .map(|p| ScoreEntry {
                glyph: p.glyph,
                score: p.score,
            })
            .collect()
    }

    /// Highest score wins; ties go to whoever joined first.
    pub fn leader(&self) -> Option<&Player> {
        self.players
            .iter()
            .fold(None, |best: Option<&Player>, player| match best {
                Some(b) if b.score >= player.score => Some(b),
                _ => Some(player),
            })
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= MAX_PLAYERS
    }
}

/// Six characters drawn from `[A-Za-z0-9]`.
pub fn generate_ticket<R: Rng>(rng: &mut R) -> Ticket {
    let text: String = rng
        .sample_iter(&Alphanumeric)
        .take(TICKET_LEN)
        .map(char::from)
        .collect();
    Ticket::new(&text)
}
