//! Server network layer: UDP transport around the game session
//!
//! Datagrams are decoded on a receiver task and funnelled into one main loop,
//! which is the only place the `GameSession` is touched. Timeouts and the
//! mismatch timer report back through the same channel, so every intent and
//! every deferred step runs as one uninterrupted unit.

use crate::client_manager::ClientManager;
use crate::game::{GameSession, Outcome, PendingMismatch};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, CLIENT_VERSION, MAX_CLIENTS, MAX_PACKET_SIZE, MISMATCH_DELAY_MS};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: u32 },
    MismatchElapsed { ticket: PendingMismatch },
    Shutdown,
}

/// Messages sent from main loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    Broadcast { packet: Packet },
}

/// Main server owning the session and coordinating the network tasks
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    session: GameSession,
    mismatch_delay: Duration,
    mismatch_timer: Option<(PendingMismatch, JoinHandle<()>)>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("socket", &self.socket)
            .field("mismatch_delay", &self.mismatch_delay)
            .finish_non_exhaustive()
    }
}

impl Server {
    pub async fn new(
        addr: &str,
        max_clients: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        if max_clients == 0 || max_clients > MAX_CLIENTS {
            return Err(format!(
                "max_clients must be between 1 and {} (got {})",
                MAX_CLIENTS, max_clients
            )
            .into());
        }

        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            session: GameSession::new(),
            mismatch_delay: Duration::from_millis(MISMATCH_DELAY_MS),
            mismatch_timer: None,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    /// Overrides how long a mismatched pair stays face-up
    pub fn with_mismatch_delay(mut self, delay: Duration) -> Self {
        self.mismatch_delay = delay;
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Sender that can stop a running server with `ServerMessage::Shutdown`
    pub fn control(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that decodes datagrams and forwards them to the main loop
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_PACKET_SIZE];

            loop {
                let (len, addr) = match socket.recv_from(&mut buffer).await {
                    Ok(received) => received,
                    Err(e) => {
                        error!("Error receiving datagram: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        continue;
                    }
                };

                let Some(packet) = decode_datagram(&buffer[..len], addr) else {
                    continue;
                };

                if server_tx
                    .send(ServerMessage::PacketReceived { packet, addr })
                    .is_err()
                {
                    debug!("Main loop gone, stopping receiver");
                    break;
                }
            }
        });
    }

    /// Spawns task that drains the outgoing queue onto the socket
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                deliver(&socket, &clients, message).await;
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
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
                    if server_tx
                        .send(ServerMessage::ClientTimeout { client_id })
                        .is_err()
                    {
                        return;
                    }
                }
            }
        });
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Pushes the full session state to every connected client
    fn broadcast_state(&self) {
        let packet = Packet::State(self.session.snapshot());
        if let Err(e) = self.game_tx.send(GameMessage::Broadcast { packet }) {
            error!("Failed to queue state broadcast: {}", e);
        }
    }

    async fn client_for(&self, addr: SocketAddr) -> Option<u32> {
        let mut clients = self.clients.write().await;
        let client_id = clients.find_client_by_addr(addr)?;
        clients.touch(client_id);
        Some(client_id)
    }

    /// Processes incoming packets and updates the session
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );

                if client_version != CLIENT_VERSION {
                    let reason = "Protocol version mismatch".to_string();
                    self.send_packet(Packet::Disconnected { reason }, addr);
                    return;
                }

                // Remove existing connection if present
                let existing_client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };

                if let Some(existing_id) = existing_client_id {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    self.clients.write().await.remove_client(&existing_id);
                    let outcome = self.session.disconnect(existing_id);
                    self.apply_outcome(outcome, addr);
                }

                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr)
                };

                if let Some(client_id) = client_id {
                    let connected = self.clients.read().await.len();
                    info!("Client {} registered ({} connected)", client_id, connected);
                    self.send_packet(Packet::Connected { client_id }, addr);
                    self.send_packet(Packet::State(self.session.snapshot()), addr);
                } else {
                    let reason = "Server full".to_string();
                    self.send_packet(Packet::Disconnected { reason }, addr);
                }
            }

            Packet::Disconnect => {
                let client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };

                if let Some(client_id) = client_id {
                    self.clients.write().await.remove_client(&client_id);
                    let outcome = self.session.disconnect(client_id);
                    self.apply_outcome(outcome, addr);
                }
            }

            Packet::JoinGame { .. }
            | Packet::FlipCard { .. }
            | Packet::ResetGame
            | Packet::ChangeTheme { .. }
            | Packet::Heartbeat => {
                let Some(client_id) = self.client_for(addr).await else {
                    warn!("Packet from unregistered address {}", addr);
                    return;
                };

                let outcome = match packet {
                    Packet::JoinGame { name, theme_key } => {
                        self.session.join(client_id, &name, theme_key.as_deref())
                    }
                    Packet::FlipCard { index } => self.session.flip(client_id, index),
                    Packet::ResetGame => self.session.reset(client_id, None),
                    Packet::ChangeTheme { theme_key } => {
                        self.session.change_theme(client_id, &theme_key)
                    }
                    _ => Outcome::Ignored,
                };

                self.apply_outcome(outcome, addr);
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Broadcasts applied changes, or tells the requester why nothing happened
    fn apply_outcome(&mut self, outcome: Outcome, addr: SocketAddr) {
        match outcome {
            Outcome::Applied => {
                self.sync_mismatch_timer();
                self.broadcast_state();
            }
            Outcome::Ignored => {}
            Outcome::Rejected(rejection) => {
                debug!("Rejected request from {}: {}", addr, rejection);
                let message = rejection.to_string();
                self.send_packet(Packet::Error { message }, addr);
            }
        }
    }

    /// Keeps exactly one timer running for the session's pending mismatch,
    /// aborting it when a rebuild dropped the pair.
    fn sync_mismatch_timer(&mut self) {
        let pending = self.session.pending_mismatch();

        if let (Some((scheduled, _)), Some(ticket)) = (&self.mismatch_timer, pending) {
            if *scheduled == ticket {
                return;
            }
        }

        if let Some((stale, handle)) = self.mismatch_timer.take() {
            debug!("Cancelling mismatch timer for generation {}", stale.generation);
            handle.abort();
        }

        if let Some(ticket) = pending {
            let handle =
                spawn_mismatch_timer(self.server_tx.clone(), ticket, self.mismatch_delay);
            self.mismatch_timer = Some((ticket, handle));
        }
    }

    fn handle_mismatch_elapsed(&mut self, ticket: PendingMismatch) {
        if matches!(&self.mismatch_timer, Some((scheduled, _)) if *scheduled == ticket) {
            self.mismatch_timer = None;
        }

        if self.session.resolve_mismatch(ticket).is_applied() {
            self.sync_mismatch_timer();
            self.broadcast_state();
        }
    }

    /// Main server loop; returns after a `Shutdown` message
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        info!("Server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            match message {
                ServerMessage::PacketReceived { packet, addr } => {
                    self.handle_packet(packet, addr).await;
                }
                ServerMessage::ClientTimeout { client_id } => {
                    if self.session.disconnect(client_id).is_applied() {
                        self.sync_mismatch_timer();
                        self.broadcast_state();
                    }
                }
                ServerMessage::MismatchElapsed { ticket } => {
                    self.handle_mismatch_elapsed(ticket);
                }
                ServerMessage::Shutdown => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        if let Some((_, handle)) = self.mismatch_timer.take() {
            handle.abort();
        }

        Ok(())
    }
}

fn decode_datagram(bytes: &[u8], addr: SocketAddr) -> Option<Packet> {
    match deserialize::<Packet>(bytes) {
        Ok(packet) => Some(packet),
        Err(e) => {
            warn!("Dropping undecodable datagram from {}: {}", addr, e);
            None
        }
    }
}

/// Writes one queued message to the socket. A broadcast is encoded once and
/// goes to every registered client; with nobody connected it is dropped.
async fn deliver(socket: &UdpSocket, clients: &RwLock<ClientManager>, message: GameMessage) {
    let (packet, targets) = match message {
        GameMessage::SendPacket { packet, addr } => (packet, vec![addr]),
        GameMessage::Broadcast { packet } => {
            let clients = clients.read().await;
            if clients.is_empty() {
                debug!("No clients connected, dropping broadcast");
                return;
            }
            let addrs = clients
                .get_client_addrs()
                .into_iter()
                .map(|(_, addr)| addr)
                .collect();
            (packet, addrs)
        }
    };

    let data = match serialize(&packet) {
        Ok(data) => data,
        Err(e) => {
            error!("Failed to encode {:?}: {}", packet, e);
            return;
        }
    };

    for addr in targets {
        if let Err(e) = socket.send_to(&data, addr).await {
            error!("Failed to send packet to {}: {}", addr, e);
        }
    }
}

/// Reports `ticket` back to the main loop once `delay` has passed
pub fn spawn_mismatch_timer(
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    ticket: PendingMismatch,
    delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if server_tx
            .send(ServerMessage::MismatchElapsed { ticket })
            .is_err()
        {
            debug!("Main loop gone before mismatch timer fired");
        }
    })
}
