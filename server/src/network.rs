//! Server network layer handling UDP sessions and the single-writer game loop

use crate::broadcast::StateBroadcaster;
use crate::client_manager::ClientManager;
use crate::config::GameSettings;
use crate::http::{apply_request, ApiReply, ApiRequest};
use crate::round::{RoundClock, TickOutcome};
use bincode::{deserialize, serialize};
use crowdmaze_shared::{GameSnapshot, Packet, PROTOCOL_VERSION};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: u32,
    },
    /// Request from the HTTP polling surface.
    Api {
        request: ApiRequest,
        reply: oneshot::Sender<ApiReply>,
    },
    Shutdown,
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
    },
}

/// Queues broadcast packets for the network sender task.
#[derive(Debug, Clone)]
pub struct PacketBroadcaster {
    game_tx: mpsc::UnboundedSender<GameMessage>,
}

impl PacketBroadcaster {
    pub fn new(game_tx: mpsc::UnboundedSender<GameMessage>) -> Self {
        Self { game_tx }
    }

    fn queue(&self, packet: Packet) {
        if let Err(e) = self.game_tx.send(GameMessage::BroadcastPacket { packet }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }
}

impl StateBroadcaster for PacketBroadcaster {
    fn broadcast(&self, snapshot: GameSnapshot) {
        self.queue(Packet::GameState { snapshot });
    }

    fn notify_participant_count(&self, count: u32) {
        self.queue(Packet::PlayersUpdate { players: count });
    }
}

/// Transport tunables for [`Server`].
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Length of one clock tick. One second in production.
    pub tick_duration: Duration,
    pub max_clients: usize,
    /// Silence after which a session counts as disconnected.
    pub client_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_secs(1),
            max_clients: 256,
            client_timeout: Duration::from_secs(10),
        }
    }
}

/// Main server coordinating networking and the round clock
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    clock: RoundClock<PacketBroadcaster>,
    tick_duration: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        settings: GameSettings,
        options: ServerOptions,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        let clock = RoundClock::new(settings, PacketBroadcaster::new(game_tx.clone()))?;

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                options.max_clients,
                options.client_timeout,
            ))),
            clock,
            tick_duration: options.tick_duration,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Handle for feeding messages into the game loop from other tasks.
    pub fn message_sender(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    pub fn clock(&self) -> &RoundClock<PacketBroadcaster> {
        &self.clock
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        })
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        // Encode once for every recipient.
                        let data = match serialize(&packet) {
                            Ok(data) => data,
                            Err(e) => {
                                error!("Failed to encode broadcast packet: {}", e);
                                continue;
                            }
                        };

                        for (client_id, addr) in client_addrs {
                            if let Err(e) = socket.send_to(&data, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        })
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) -> JoinHandle<()> {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        })
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    async fn session_for(&self, addr: SocketAddr) -> Option<u32> {
        let clients = self.clients.read().await;
        clients.find_client_by_addr(addr)
    }

    /// Processes incoming packets and updates game state
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    warn!(
                        "Rejecting {}: protocol version {} (expected {})",
                        addr, client_version, PROTOCOL_VERSION
                    );
                    let response = Packet::Disconnected {
                        reason: "Protocol version mismatch".to_string(),
                    };
                    self.send_packet(response, addr);
                    return;
                }

                // Remove existing connection if present
                if let Some(existing_id) = self.session_for(addr).await {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    self.clients.write().await.remove_client(&existing_id);
                    self.clock.participant_left();
                }

                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr)
                };

                match client_id {
                    Some(client_id) => {
                        self.send_packet(Packet::Connected { client_id }, addr);
                        let snapshot = self.clock.participant_joined();
                        self.send_packet(Packet::GameState { snapshot }, addr);
                    }
                    None => {
                        let response = Packet::Disconnected {
                            reason: "Server full".to_string(),
                        };
                        self.send_packet(response, addr);
                    }
                }
            }

            Packet::Vote { direction } => {
                let Some(client_id) = self.session_for(addr).await else {
                    debug!("Ignoring vote from unknown address {}", addr);
                    return;
                };
                self.clients.write().await.touch(client_id);

                if let Err(e) = self.clock.vote(&direction) {
                    debug!("Rejected vote from client {}: {}", client_id, e);
                    let response = Packet::VoteRejected {
                        reason: e.to_string(),
                    };
                    self.send_packet(response, addr);
                }
            }

            Packet::Heartbeat => {
                if let Some(client_id) = self.session_for(addr).await {
                    self.clients.write().await.touch(client_id);
                }
            }

            Packet::Disconnect => {
                if let Some(client_id) = self.session_for(addr).await {
                    self.clients.write().await.remove_client(&client_id);
                    self.clock.participant_left();
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    fn handle_api(&mut self, request: ApiRequest, reply: oneshot::Sender<ApiReply>) {
        let response = apply_request(&mut self.clock, request);
        if reply.send(response).is_err() {
            debug!("HTTP caller went away before the reply was ready");
        }
    }

    /// Main server loop. Packets, timeouts, HTTP requests and clock ticks are
    /// handled strictly one at a time, so the round clock has a single writer.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        let tasks = [
            self.spawn_network_receiver(),
            self.spawn_network_sender(),
            self.spawn_timeout_checker(),
        ];

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Skip the first tick since it fires immediately
        tick_interval.tick().await;

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            info!("Client {} timed out", client_id);
                            self.clock.participant_left();
                        },
                        Some(ServerMessage::Api { request, reply }) => {
                            self.handle_api(request, reply);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    match self.clock.tick() {
                        TickOutcome::Counting => {}
                        outcome => info!("Round {}: {:?}", self.clock.state().round, outcome),
                    }

                    let state = self.clock.state();
                    if state.time_left % 10 == 0 {
                        let sessions = self.clients.read().await.len();
                        debug!(
                            "{:?} {}s left: {} sessions, votes {:?}",
                            state.phase, state.time_left, sessions, state.votes.counts()
                        );
                    }
                },
            }
        }

        for task in tasks {
            task.abort();
        }

        Ok(())
    }
}
