//! Server network layer: control requests, alien simulation and shutdown

use crate::broadcast::{Broadcaster, Publisher};
use crate::combat::Beam;
use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::game::{GameState, GameSummary};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{ControlMessage, Packet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};

/// Messages sent from background tasks to the request loop
#[derive(Debug)]
pub enum ServerMessage {
    RequestReceived {
        request: ControlMessage,
        addr: SocketAddr,
    },
    /// A deferred beam clear took the last alien off the grid.
    AliensExhausted,
    TransportFailed(ServerError),
}

/// Authoritative arena server
///
/// Control requests are handled strictly one at a time. The alien
/// simulation and deferred beam clears run as separate tasks and share the
/// game state through one mutex.
pub struct Server {
    config: ServerConfig,
    control: Arc<UdpSocket>,
    publish: UdpSocket,
    state: Arc<Mutex<GameState>>,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let control = Arc::new(UdpSocket::bind(&config.control_addr).await?);
        let publish = UdpSocket::bind(&config.publish_addr).await?;
        info!(
            "Control on {}, publishing on {}",
            control.local_addr()?,
            publish.local_addr()?
        );

        let state = Arc::new(Mutex::new(GameState::new(&config)));
        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            config,
            control,
            publish,
            state,
            server_tx,
            server_rx,
        })
    }

    pub fn control_addr(&self) -> Result<SocketAddr> {
        Ok(self.control.local_addr()?)
    }

    pub fn publish_addr(&self) -> Result<SocketAddr> {
        Ok(self.publish.local_addr()?)
    }

    pub fn state(&self) -> Arc<Mutex<GameState>> {
        Arc::clone(&self.state)
    }

    /// Serves requests until the last alien is destroyed.
    ///
    /// On game over the simulation and any pending beam clears are stopped,
    /// the result frame and notice are published and drained to subscribers,
    /// and the summary is returned. Transport failures end the run with an
    /// error.
    pub async fn run(self) -> Result<GameSummary> {
        let Server {
            config,
            control,
            publish,
            state,
            server_tx,
            mut server_rx,
        } = self;

        let (broadcaster, publications) = Broadcaster::channel();
        let mut publisher = tokio::spawn(Publisher::new(publish, publications).run());
        {
            let state = state.lock().await;
            broadcaster.publish(&state)?;
        }

        let receiver = spawn_control_receiver(Arc::clone(&control), server_tx.clone());
        let simulation =
            spawn_alien_simulation(Arc::clone(&state), broadcaster.clone(), config.alien_tick);
        let mut clears = JoinSet::new();

        info!("Server started successfully");

        let mut requests = RequestLoop {
            control: &control,
            state: &state,
            broadcaster: &broadcaster,
            server_tx: &server_tx,
            beam_duration: config.beam_duration,
            clears: &mut clears,
        };
        let result = requests.serve(&mut server_rx, &mut publisher).await;

        receiver.abort();
        simulation.abort();
        // Wait for cancellation so nothing touches the grid after this point
        let _ = simulation.await;
        clears.shutdown().await;

        if let Err(e) = result {
            error!("Fatal transport error: {}", e);
            publisher.abort();
            return Err(e);
        }

        let summary = {
            let mut state = state.lock().await;
            let summary = state.finish();
            broadcaster.publish(&state)?;
            broadcaster.game_over(summary)?;
            summary
        };
        drop(broadcaster);

        publisher.await??;
        info!("Server shut down");
        Ok(summary)
    }
}

struct RequestLoop<'a> {
    control: &'a UdpSocket,
    state: &'a Arc<Mutex<GameState>>,
    broadcaster: &'a Broadcaster,
    server_tx: &'a mpsc::UnboundedSender<ServerMessage>,
    beam_duration: Duration,
    clears: &'a mut JoinSet<()>,
}

impl RequestLoop<'_> {
    /// Returns Ok once the game is over.
    async fn serve(
        &mut self,
        server_rx: &mut mpsc::UnboundedReceiver<ServerMessage>,
        publisher: &mut JoinHandle<Result<()>>,
    ) -> Result<()> {
        if self.state.lock().await.is_over() {
            return Ok(());
        }

        loop {
            tokio::select! {
                message = server_rx.recv() => match message {
                    Some(ServerMessage::RequestReceived { request, addr }) => {
                        if self.handle_request(request, addr).await? {
                            return Ok(());
                        }
                    }
                    Some(ServerMessage::AliensExhausted) => return Ok(()),
                    Some(ServerMessage::TransportFailed(e)) => return Err(e),
                    None => return Err(ServerError::ChannelClosed("server")),
                },

                Some(_) = self.clears.join_next() => {},

                result = &mut *publisher => {
                    return match result {
                        Ok(Ok(())) => Err(ServerError::ChannelClosed("publish")),
                        Ok(Err(e)) => Err(e),
                        Err(e) => Err(e.into()),
                    };
                }
            }
        }
    }

    /// Applies one request, replies, and schedules its beam clear. Returns
    /// true when the request destroyed the last alien.
    async fn handle_request(&mut self, request: ControlMessage, addr: SocketAddr) -> Result<bool> {
        let now = Instant::now().into_std();
        let (outcome, over) = {
            let mut state = self.state.lock().await;
            let outcome = state.handle_request(&request, now);
            self.broadcaster.publish(&state)?;
            (outcome, state.is_over())
        };

        let data = serialize(&outcome.reply)?;
        self.control.send_to(&data, addr).await?;
        debug!("Replied {:?} to {}", outcome.reply, addr);

        if let Some(beam) = outcome.beam {
            schedule_beam_clear(
                self.clears,
                Arc::clone(self.state),
                self.broadcaster.clone(),
                self.server_tx.clone(),
                beam,
                self.beam_duration,
            );
        }

        Ok(over)
    }
}

/// Spawns task that continuously listens for control requests
fn spawn_control_receiver(
    socket: Arc<UdpSocket>,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buffer = [0u8; 2048];

        loop {
            match socket.recv_from(&mut buffer).await {
                Ok((len, addr)) => match deserialize::<Packet>(&buffer[..len]) {
                    Ok(Packet::Request(request)) => {
                        if server_tx
                            .send(ServerMessage::RequestReceived { request, addr })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Ok(other) => warn!("Unexpected packet {:?} from {}", other, addr),
                    Err(e) => warn!("Failed to deserialize request from {}: {}", addr, e),
                },
                Err(e) => {
                    error!("Error receiving request: {}", e);
                    let _ = server_tx.send(ServerMessage::TransportFailed(e.into()));
                    break;
                }
            }
        }
    })
}

/// Spawns the fixed-cadence alien loop. Each tick moves the aliens, tops up
/// a stagnant population and publishes the result.
fn spawn_alien_simulation(
    state: Arc<Mutex<GameState>>,
    broadcaster: Broadcaster,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Skip the first tick since it fires immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let mut state = state.lock().await;
            if state.is_finished() {
                break;
            }

            let report = state.simulation_tick();
            debug!(
                "Alien tick: {} moved, {} spawned, {} alive",
                report.moved,
                report.spawned,
                state.aliens_alive()
            );

            if let Err(e) = broadcaster.publish(&state) {
                warn!("Alien simulation stopping: {}", e);
                break;
            }
        }
    })
}

/// Erases `beam` after `delay`, under the same lock as every other mutation.
fn schedule_beam_clear(
    clears: &mut JoinSet<()>,
    state: Arc<Mutex<GameState>>,
    broadcaster: Broadcaster,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    beam: Beam,
    delay: Duration,
) {
    clears.spawn(async move {
        sleep(delay).await;

        let mut state = state.lock().await;
        if state.is_finished() {
            return;
        }

        state.clear_beam(beam);
        if let Err(e) = broadcaster.publish(&state) {
            warn!("Dropping beam clear frame: {}", e);
            return;
        }

        if state.is_over() {
            let _ = server_tx.send(ServerMessage::AliensExhausted);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Cell, Orientation, Zone};
    use crate::broadcast::Publication;
    use shared::{Direction, Ticket, HORIZONTAL_BEAM_GLYPH, VERTICAL_BEAM_GLYPH};
    use std::io;
    use tokio::time::timeout;

    fn test_config(initial_aliens: usize) -> ServerConfig {
        ServerConfig {
            control_addr: "127.0.0.1:0".to_string(),
            publish_addr: "127.0.0.1:0".to_string(),
            beam_duration: Duration::from_millis(50),
            alien_tick: Duration::from_secs(3600),
            initial_aliens,
            seed: Some(11),
            ..ServerConfig::default()
        }
    }

    async fn request(socket: &UdpSocket, server: SocketAddr, message: ControlMessage) -> Packet {
        let data = serialize(&Packet::Request(message)).unwrap();
        socket.send_to(&data, server).await.unwrap();

        let mut buffer = [0u8; 2048];
        let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buffer))
            .await
            .expect("timed out waiting for reply")
            .unwrap();
        deserialize(&buffer[..len]).unwrap()
    }

    fn drain_frames(rx: &mut mpsc::UnboundedReceiver<Publication>) -> usize {
        let mut frames = 0;
        while let Ok(publication) = rx.try_recv() {
            if matches!(publication, Publication::Frame(_)) {
                frames += 1;
            }
        }
        frames
    }

    async fn recv_grid(socket: &UdpSocket) -> Vec<u8> {
        let mut buffer = [0u8; 2048];
        loop {
            let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buffer))
                .await
                .expect("timed out waiting for frame")
                .unwrap();
            if let Packet::Grid { cells } = deserialize(&buffer[..len]).unwrap() {
                return cells;
            }
        }
    }

    fn beam_cells(grid: &[u8]) -> usize {
        grid.iter()
            .filter(|&&b| b == HORIZONTAL_BEAM_GLYPH || b == VERTICAL_BEAM_GLYPH)
            .count()
    }

    #[tokio::test]
    async fn test_transport_failure_stops_request_loop() {
        let control = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let state = Arc::new(Mutex::new(GameState::new(&test_config(5))));
        let (broadcaster, _publications) = Broadcaster::channel();
        let (server_tx, mut server_rx) = mpsc::unbounded_channel();
        let mut clears = JoinSet::new();
        let mut publisher: JoinHandle<Result<()>> =
            tokio::spawn(std::future::pending::<Result<()>>());

        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        server_tx
            .send(ServerMessage::TransportFailed(reset.into()))
            .unwrap();

        let mut requests = RequestLoop {
            control: &control,
            state: &state,
            broadcaster: &broadcaster,
            server_tx: &server_tx,
            beam_duration: Duration::from_millis(50),
            clears: &mut clears,
        };
        let result = requests.serve(&mut server_rx, &mut publisher).await;

        assert!(matches!(
            result,
            Err(ServerError::Io(e)) if e.kind() == io::ErrorKind::ConnectionReset
        ));
        assert!(!state.lock().await.is_finished());
        publisher.abort();
    }

    #[tokio::test]
    async fn test_fire_frame_precedes_cleared_frame() {
        let server = Server::new(test_config(20)).await.unwrap();
        let control = server.control_addr().unwrap();
        let publish = server.publish_addr().unwrap();
        let handle = tokio::spawn(server.run());

        let display = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let subscribe = serialize(&Packet::Subscribe).unwrap();
        display.send_to(&subscribe, publish).await.unwrap();
        assert_eq!(beam_cells(&recv_grid(&display).await), 0);

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let joined = match request(&client, control, ControlMessage::join()).await {
            Packet::Joined(reply) => reply,
            other => panic!("Unexpected reply {:?}", other),
        };
        assert_eq!(beam_cells(&recv_grid(&display).await), 0);

        let fired_at = Instant::now();
        let reply = request(
            &client,
            control,
            ControlMessage::fire(joined.glyph, joined.ticket),
        )
        .await;
        assert!(matches!(reply, Packet::Score { .. }));

        // Beam is visible first, then gone once its lifetime is over
        let beam_frame = recv_grid(&display).await;
        assert!(beam_cells(&beam_frame) > 0);
        let cleared_frame = recv_grid(&display).await;
        assert_eq!(beam_cells(&cleared_frame), 0);
        assert!(fired_at.elapsed() >= Duration::from_millis(50));

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_beam_cleared_after_lifetime() {
        let state = Arc::new(Mutex::new(GameState::new(&ServerConfig {
            initial_aliens: 30,
            seed: Some(5),
            ..ServerConfig::default()
        })));
        let (broadcaster, mut rx) = Broadcaster::channel();
        let (server_tx, _server_rx) = mpsc::unbounded_channel();
        let mut clears = JoinSet::new();

        let beam = {
            let mut state = state.lock().await;
            let joined = match state
                .handle_request(&ControlMessage::join(), Instant::now().into_std())
                .reply
            {
                Packet::Joined(reply) => reply,
                other => panic!("Unexpected reply {:?}", other),
            };
            let fire = ControlMessage::fire(joined.glyph, joined.ticket);
            state
                .handle_request(&fire, Instant::now().into_std())
                .beam
                .unwrap()
        };

        schedule_beam_clear(
            &mut clears,
            Arc::clone(&state),
            broadcaster.clone(),
            server_tx,
            beam,
            Duration::from_millis(500),
        );

        sleep(Duration::from_millis(499)).await;
        {
            let state = state.lock().await;
            let marked = beam
                .orientation
                .positions(beam.line)
                .filter(|pos| matches!(state.grid().get(*pos), Cell::Beam { .. }))
                .count();
            assert!(marked > 0);
        }
        assert_eq!(drain_frames(&mut rx), 0);

        clears.join_next().await.unwrap().unwrap();

        let state = state.lock().await;
        assert!(beam
            .orientation
            .positions(beam.line)
            .all(|pos| !matches!(state.grid().get(pos), Cell::Beam { .. })));
        assert_eq!(state.aliens_alive(), state.grid().count_aliens());
        assert_eq!(drain_frames(&mut rx), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_reports_exhausted_aliens() {
        let state = Arc::new(Mutex::new(GameState::new(&ServerConfig {
            initial_aliens: 0,
            ..ServerConfig::default()
        })));
        let (broadcaster, _rx) = Broadcaster::channel();
        let (server_tx, mut server_rx) = mpsc::unbounded_channel();
        let mut clears = JoinSet::new();

        let beam = Beam {
            shot: 0,
            orientation: Orientation::Horizontal,
            line: 8,
        };
        schedule_beam_clear(
            &mut clears,
            state,
            broadcaster,
            server_tx,
            beam,
            Duration::from_millis(500),
        );
        clears.join_next().await.unwrap().unwrap();

        assert!(matches!(
            server_rx.try_recv(),
            Ok(ServerMessage::AliensExhausted)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_alien_simulation_publishes_each_tick() {
        let state = Arc::new(Mutex::new(GameState::new(&ServerConfig {
            initial_aliens: 40,
            seed: Some(6),
            ..ServerConfig::default()
        })));
        let (broadcaster, mut rx) = Broadcaster::channel();

        let simulation =
            spawn_alien_simulation(Arc::clone(&state), broadcaster, Duration::from_secs(1));
        sleep(Duration::from_millis(3500)).await;

        assert_eq!(drain_frames(&mut rx), 3);
        {
            let state = state.lock().await;
            assert_eq!(state.aliens_alive(), 40);
            assert_eq!(state.grid().count_aliens(), 40);
        }

        state.lock().await.finish();
        sleep(Duration::from_secs(2)).await;
        assert!(simulation.is_finished());
        assert_eq!(drain_frames(&mut rx), 0);
    }

    #[tokio::test]
    async fn test_join_move_leave_over_udp() {
        let server = Server::new(test_config(20)).await.unwrap();
        let control = server.control_addr().unwrap();
        let state = server.state();
        let handle = tokio::spawn(server.run());

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let joined = match request(&client, control, ControlMessage::join()).await {
            Packet::Joined(reply) => reply,
            other => panic!("Unexpected reply {:?}", other),
        };
        assert!(!joined.ticket.is_full());

        let reply = request(
            &client,
            control,
            ControlMessage::movement(joined.glyph, joined.ticket, Direction::Down),
        )
        .await;
        assert_eq!(reply, Packet::Score { text: "0".into() });

        let forged = request(
            &client,
            control,
            ControlMessage::leave(joined.glyph, Ticket::new("forged")),
        )
        .await;
        assert_eq!(forged, Packet::Score { text: "0".into() });
        assert!(state.lock().await.registry().get(joined.glyph).is_some());

        request(
            &client,
            control,
            ControlMessage::leave(joined.glyph, joined.ticket),
        )
        .await;
        {
            let state = state.lock().await;
            assert!(state.registry().is_empty());
            assert!(state
                .grid()
                .positions()
                .all(|pos| state.grid().get(pos) != Cell::Player(joined.glyph)));
        }

        handle.abort();
    }

    #[tokio::test]
    async fn test_last_kill_ends_game() {
        let server = Server::new(ServerConfig {
            shot_cooldown: Duration::ZERO,
            ..test_config(1)
        })
        .await
        .unwrap();
        let control = server.control_addr().unwrap();
        let handle = tokio::spawn(server.run());

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let joined = match request(&client, control, ControlMessage::join()).await {
            Packet::Joined(reply) => reply,
            other => panic!("Unexpected reply {:?}", other),
        };
        let (back, forward) = match Zone::from_letter(joined.glyph).unwrap().orientation() {
            Orientation::Horizontal => (Direction::Up, Direction::Down),
            Orientation::Vertical => (Direction::Left, Direction::Right),
        };
        for _ in 0..20 {
            request(
                &client,
                control,
                ControlMessage::movement(joined.glyph, joined.ticket, back),
            )
            .await;
        }

        // Sweep every line of the inner square until the lone alien is hit
        let fire = ControlMessage::fire(joined.glyph, joined.ticket);
        let step = ControlMessage::movement(joined.glyph, joined.ticket, forward);
        let mut killed = false;
        for _ in 0..16 {
            if request(&client, control, fire).await == (Packet::Score { text: "1".into() }) {
                killed = true;
                break;
            }
            request(&client, control, step).await;
        }
        assert!(killed);

        let summary = timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(summary.winner, Some(joined.glyph));
        assert_eq!(summary.score, 1);
    }

    #[tokio::test]
    async fn test_empty_arena_ends_immediately() {
        let server = Server::new(test_config(0)).await.unwrap();
        let state = server.state();

        let summary = timeout(Duration::from_secs(2), server.run())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(summary.winner, None);
        assert!(state.lock().await.is_finished());
    }
}
