//! # Arena Server Library
//!
//! This library provides the authoritative server for the alien arena: a
//! 20x20 grid where up to eight players, each confined to one perimeter
//! zone, fire beams across the field to destroy randomly wandering aliens.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Rules
//! Every rule is decided here. Clients only send requests (join, move,
//! fire, leave) and render the frames they are sent back.
//!
//! ### Session Management
//! Handles the complete lifecycle of a player session:
//! - Zone assignment and ticket issue on join
//! - Ticket authentication of every later request
//! - Hit and shot cooldowns
//! - Zone release on leave
//!
//! ### State Broadcasting
//! After every mutation the scoreboard and grid are published as one frame
//! to all subscribed display clients, in mutation order.
//!
//! ## Architecture Design
//!
//! ### One Lock, Three Actors
//! The request loop, the alien simulation and the deferred beam clears all
//! mutate one [`game::GameState`] behind a single async mutex. Frames are
//! captured while the lock is held, so no half-applied change is ever
//! published.
//!
//! ### UDP-Based Communication
//! Control requests use a request/reply socket handled strictly one request
//! at a time. Frames go out on a separate publish socket.
//!
//! ## Module Organization
//!
//! - `arena`: grid cells, coordinates and the eight zone strips
//! - `session`: player registry, tickets, cooldowns
//! - `movement`: zone-confined player moves and the alien pass
//! - `combat`: beam sweeps, stuns and beam clearing
//! - `aliens`: alien placement and stagnation respawn
//! - `game`: the shared state and per-request handling
//! - `broadcast`: frames and the publisher task
//! - `network`: sockets, task wiring and game-over shutdown
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::new(ServerConfig::default()).await?;
//!
//!     // Runs until the last alien is destroyed
//!     let summary = server.run().await?;
//!     println!("{}", summary.banner());
//!
//!     Ok(())
//! }
//! ```

pub mod aliens;
pub mod arena;
pub mod broadcast;
pub mod combat;
pub mod config;
pub mod error;
pub mod game;
pub mod movement;
pub mod network;
pub mod session;
