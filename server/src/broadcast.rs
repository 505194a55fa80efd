//! Snapshot publication to display clients
//!
//! Every mutation of the arena is followed by a frame: the scoreboard and the
//! grid, sent as two consecutive datagrams. Frames are captured while the
//! state lock is held and pushed through a single unbounded channel, so
//! subscribers see them in exactly the order the mutations happened.

use crate::error::{Result, ServerError};
use crate::game::{GameState, GameSummary};
use bincode::{deserialize, serialize};
use log::{debug, info, warn};
use shared::{Packet, ScoreEntry};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// One logical broadcast: scoreboard plus row-major grid bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub scoreboard: Vec<ScoreEntry>,
    pub grid: Vec<u8>,
}

impl Frame {
    /// The datagrams for this frame, in the order subscribers expect them.
    pub fn packets(&self) -> [Packet; 2] {
        [
            Packet::Scoreboard {
                entries: self.scoreboard.clone(),
            },
            Packet::Grid {
                cells: self.grid.clone(),
            },
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Publication {
    Frame(Frame),
    GameOver(GameSummary),
}

/// Sending half of the publication channel, shared by every actor that
/// mutates the arena.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: mpsc::UnboundedSender<Publication>,
}

impl Broadcaster {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Publication>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queues the current frame. Call with the state lock held.
    pub fn publish(&self, state: &GameState) -> Result<()> {
        self.send(Publication::Frame(state.frame()))
    }

    pub fn game_over(&self, summary: GameSummary) -> Result<()> {
        self.send(Publication::GameOver(summary))
    }

    fn send(&self, publication: Publication) -> Result<()> {
        self.tx
            .send(publication)
            .map_err(|_| ServerError::ChannelClosed("publish"))
    }
}

/// Owns the publish socket and the subscriber list
///
/// Runs until every [`Broadcaster`] is dropped and the queue is drained, so
/// the final frames of a game are always delivered before it returns.
pub struct Publisher {
    socket: UdpSocket,
    rx: mpsc::UnboundedReceiver<Publication>,
    subscribers: Vec<SocketAddr>,
    last_frame: Option<Frame>,
}

impl Publisher {
    pub fn new(socket: UdpSocket, rx: mpsc::UnboundedReceiver<Publication>) -> Self {
        Self {
            socket,
            rx,
            subscribers: Vec::new(),
            last_frame: None,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut buffer = [0u8; 256];

        loop {
            tokio::select! {
                publication = self.rx.recv() => match publication {
                    Some(publication) => self.deliver(publication).await?,
                    None => break,
                },
                received = self.socket.recv_from(&mut buffer) => {
                    let (len, addr) = received?;
                    match deserialize::<Packet>(&buffer[..len]) {
                        Ok(packet) => self.handle_packet(packet, addr).await?,
                        Err(e) => warn!("Failed to deserialize packet from {}: {}", addr, e),
                    }
                }
            }
        }

        debug!("Publisher drained, {} subscribers", self.subscribers.len());
        Ok(())
    }

    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) -> Result<()> {
        match packet {
            Packet::Subscribe => {
                if !self.subscribers.contains(&addr) {
                    info!("Subscriber {} registered", addr);
                    self.subscribers.push(addr);
                }
                // Late subscribers start from the current picture
                if let Some(frame) = &self.last_frame {
                    for packet in frame.packets() {
                        send_packet(&self.socket, &packet, addr).await?;
                    }
                }
            }
            Packet::Unsubscribe => {
                self.subscribers.retain(|subscriber| *subscriber != addr);
                info!("Subscriber {} left", addr);
            }
            other => warn!("Unexpected packet {:?} on publish socket from {}", other, addr),
        }
        Ok(())
    }

    async fn deliver(&mut self, publication: Publication) -> Result<()> {
        let packets: Vec<Packet> = match publication {
            Publication::Frame(frame) => {
                let packets = frame.packets().to_vec();
                self.last_frame = Some(frame);
                packets
            }
            Publication::GameOver(summary) => vec![Packet::GameOver {
                winner: summary.winner,
                score: summary.score,
            }],
        };

        for addr in &self.subscribers {
            for packet in &packets {
                send_packet(&self.socket, packet, *addr).await?;
            }
        }
        Ok(())
    }
}

async fn send_packet(socket: &UdpSocket, packet: &Packet, addr: SocketAddr) -> Result<()> {
    let data = serialize(packet)?;
    socket.send_to(&data, addr).await?;
    Ok(())
}
