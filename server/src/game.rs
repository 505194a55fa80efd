use crate::aliens::{spawn_aliens, RespawnTracker};
use crate::arena::{Cell, Grid, Position};
use crate::broadcast::Frame;
use crate::combat::{self, Beam};
use crate::config::ServerConfig;
use crate::movement;
use crate::session::{JoinOutcome, SessionRegistry};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{ControlMessage, Direction, MessageType, Packet, Ticket};
use std::time::Instant;

/// Reply to one control request plus any follow-up work it scheduled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOutcome {
    pub reply: Packet,
    /// Set when the request fired a beam that must be erased later.
    pub beam: Option<Beam>,
}

/// What one tick of the alien simulation did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub moved: usize,
    pub spawned: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSummary {
    pub winner: Option<u8>,
    pub score: u32,
}

impl GameSummary {
    pub fn banner(&self) -> String {
        match self.winner {
            Some(glyph) => format!("Player {} wins", glyph as char),
            None => "No winner".to_string(),
        }
    }
}

/// The whole mutable arena: grid, sessions and alien population
///
/// Every actor (request loop, alien simulation, deferred beam clears)
/// mutates this through one lock, so each method here runs as a single
/// critical section.
pub struct GameState {
    grid: Grid,
    registry: SessionRegistry,
    aliens_alive: usize,
    respawn: RespawnTracker,
    rng: StdRng,
    next_shot: u64,
    finished: bool,
}

impl GameState {
    pub fn new(config: &ServerConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut grid = Grid::new();
        let initial = config.initial_aliens.min(config.alien_cap);
        let aliens_alive = spawn_aliens(&mut grid, &mut rng, initial);
        info!("Arena ready with {} aliens", aliens_alive);

        Self {
            grid,
            registry: SessionRegistry::new(config.hit_cooldown, config.shot_cooldown),
            aliens_alive,
            respawn: RespawnTracker::new(
                aliens_alive,
                config.stagnation_threshold,
                config.alien_cap,
            ),
            rng,
            next_shot: 0,
            finished: false,
        }
    }

    /// Runs one control request through validation, dispatch and reply.
    ///
    /// Cooldowns are advanced to `now` first. Requests that fail
    /// authentication or break a rule leave the state untouched and are
    /// answered like any other request.
    pub fn handle_request(&mut self, request: &ControlMessage, now: Instant) -> RequestOutcome {
        self.registry.tick_cooldowns(now);

        let glyph = request.glyph;
        let (score, beam) = match request.msg_type {
            MessageType::Join => {
                return RequestOutcome {
                    reply: Packet::Joined(self.join()),
                    beam: None,
                };
            }
            _ if !self.registry.validate(glyph, &request.ticket) => {
                debug!(
                    "Ignoring {:?} from {} with invalid ticket",
                    request.msg_type, glyph as char
                );
                (0, None)
            }
            MessageType::Move => {
                movement::move_player(
                    &mut self.grid,
                    &mut self.registry,
                    glyph,
                    request.direction,
                );
                (self.score_of(glyph), None)
            }
            MessageType::Fire => {
                let beam = self.fire(glyph, now);
                (self.score_of(glyph), beam)
            }
            MessageType::Leave => match self.registry.leave(glyph, &request.ticket) {
                Some(player) => {
                    self.grid.set(player.position, Cell::Empty);
                    (player.score, None)
                }
                None => (0, None),
            },
        };

        debug!("{:?} from {} done, score {}", request.msg_type, glyph as char, score);
        RequestOutcome {
            reply: score_reply(score),
            beam,
        }
    }

    fn join(&mut self) -> ControlMessage {
        match self.registry.join(&mut self.rng) {
            JoinOutcome::Joined {
                glyph,
                ticket,
                position,
            } => {
                self.grid.set(position, Cell::Player(glyph));
                ControlMessage {
                    msg_type: MessageType::Join,
                    glyph,
                    ticket,
                    direction: Direction::Up,
                }
            }
            JoinOutcome::Full => {
                info!("Join rejected: arena full");
                ControlMessage {
                    ticket: Ticket::full(),
                    ..ControlMessage::join()
                }
            }
        }
    }

    fn fire(&mut self, glyph: u8, now: Instant) -> Option<Beam> {
        let shot = self.next_shot;
        let report = combat::fire(&mut self.grid, &mut self.registry, glyph, shot, now)?;
        self.next_shot += 1;
        self.aliens_alive = self.aliens_alive.saturating_sub(report.kills as usize);
        Some(report.beam)
    }

    fn score_of(&self, glyph: u8) -> u32 {
        self.registry.get(glyph).map_or(0, |player| player.score)
    }

    /// Erases a beam whose lifetime is over.
    pub fn clear_beam(&mut self, beam: Beam) {
        let removed = combat::clear_beam(&mut self.grid, beam);
        if removed > 0 {
            debug!("Beam clear removed {} aliens", removed);
            self.aliens_alive = self.aliens_alive.saturating_sub(removed);
        }
    }

    /// Moves the aliens once and tops up a stagnant population.
    pub fn simulation_tick(&mut self) -> TickReport {
        if self.finished || self.aliens_alive == 0 {
            return TickReport::default();
        }

        let moved = movement::move_alien_pass(&mut self.grid, &mut self.rng);

        let due = self.respawn.observe(self.aliens_alive);
        let mut spawned = 0;
        if due > 0 {
            spawned = spawn_aliens(&mut self.grid, &mut self.rng, due);
            self.aliens_alive += spawned;
            self.respawn.respawned(self.aliens_alive);
        }

        TickReport { moved, spawned }
    }

    /// True once every alien has been destroyed.
    pub fn is_over(&self) -> bool {
        self.aliens_alive == 0
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Ends the round: picks the winner and replaces the arena with the
    /// result banner.
    pub fn finish(&mut self) -> GameSummary {
        let summary = match self.registry.leader() {
            Some(player) => GameSummary {
                winner: Some(player.glyph),
                score: player.score,
            },
            None => GameSummary {
                winner: None,
                score: 0,
            },
        };

        self.finished = true;
        self.grid.clear();
        self.grid.write_text(Position::new(1, 1), &summary.banner());
        info!("Game over: {}", summary.banner());

        summary
    }

    /// Scoreboard and grid as one broadcastable unit.
    pub fn frame(&self) -> Frame {
        Frame {
            scoreboard: self.registry.scoreboard(),
            grid: self.grid.snapshot(),
        }
    }

    pub fn aliens_alive(&self) -> usize {
        self.aliens_alive
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}

fn score_reply(score: u32) -> Packet {
    Packet::Score {
        text: score.to_string(),
    }
}
