//! Host network layer: UDP sessions, join handshake and relay dispatch

use crate::client_manager::{ClientManager, CLIENT_TIMEOUT};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{
    Outbound, Packet, PeerId, Role, SessionConfig, SyncProtocol, Target, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// How often the host logs its peer and replica counts.
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: PeerId,
    },
}

/// Messages sent from the main loop to the sender task
#[derive(Debug)]
pub enum OutboundMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<PeerId>,
    },
}

/// Authoritative host: owns every entity replica and relays peer updates
///
/// All replica mutation happens on the main loop in [`Server::run`]. The
/// receiver, sender and timeout tasks only move packets and ids over
/// channels, so a relay is always queued after its update has been applied.
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    protocol: SyncProtocol,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    out_tx: mpsc::UnboundedSender<OutboundMessage>,
    out_rx: mpsc::UnboundedReceiver<OutboundMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        max_clients: usize,
        config: &SessionConfig,
    ) -> Result<Self, ServerError> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!(
            "Host listening on {} (capacity {})",
            socket.local_addr()?,
            config.capacity()
        );

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            protocol: SyncProtocol::new(Role::Host, config.capacity(), None),
            server_tx,
            server_rx,
            out_tx,
            out_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn capacity(&self) -> usize {
        self.protocol.capacity()
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
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
        });
    }

    /// Spawns task that processes outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut out_rx = std::mem::replace(&mut self.out_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                match message {
                    OutboundMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    OutboundMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }

                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to peer {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors peer timeouts
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts(CLIENT_TIMEOUT)
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), ServerError> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.out_tx.send(OutboundMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, exclude: Option<PeerId>) {
        if let Err(e) = self
            .out_tx
            .send(OutboundMessage::BroadcastPacket { packet, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Queues protocol output for delivery.
    async fn dispatch(&self, outbound: Vec<Outbound>) {
        for Outbound { target, message } in outbound {
            let packet = match Packet::sync(&message) {
                Ok(packet) => packet,
                Err(e) => {
                    error!(
                        "Failed to encode {:?} for entity {}: {}",
                        message.kind(),
                        message.entity_id(),
                        e
                    );
                    continue;
                }
            };

            match target {
                Target::Peer(client_id) => {
                    let addr = {
                        let clients = self.clients.read().await;
                        clients.addr_of(client_id)
                    };
                    match addr {
                        Some(addr) => self.send_packet(packet, addr),
                        None => debug!("Peer {} left before delivery", client_id),
                    }
                }
                Target::AllExcept(client_id) => self.broadcast_packet(packet, Some(client_id)),
                Target::All => self.broadcast_packet(packet, None),
                Target::Host => warn!("Dropping host-addressed message on the host"),
            }
        }
    }

    /// Drops an entity's replica and tells the remaining peers.
    fn entity_left(&mut self, client_id: PeerId) {
        if self.protocol.remove_entity(client_id) {
            self.broadcast_packet(Packet::PeerLeft { client_id }, Some(client_id));
        }
    }

    async fn handle_connect(&mut self, client_version: u32, capacity: u8, addr: SocketAddr) {
        info!(
            "Peer connecting from {} (version: {}, capacity: {})",
            addr, client_version, capacity
        );

        // Remove existing connection if present
        let existing_client_id = {
            let mut clients = self.clients.write().await;
            let existing = clients.find_client_by_addr(addr);
            if let Some(existing_id) = existing {
                clients.remove_client(&existing_id);
            }
            existing
        };

        if let Some(existing_id) = existing_client_id {
            info!("Replaced existing peer {} from {}", existing_id, addr);
            self.entity_left(existing_id);
        }

        if client_version != PROTOCOL_VERSION {
            warn!("Rejecting {}: protocol version {}", addr, client_version);
            self.send_packet(
                Packet::Disconnected {
                    reason: format!("Protocol version mismatch: host speaks {}", PROTOCOL_VERSION),
                },
                addr,
            );
            return;
        }

        if let Err(e) = self.protocol.check_capacity(capacity as usize) {
            warn!("Rejecting {}: {}", addr, e);
            self.send_packet(
                Packet::Disconnected {
                    reason: e.to_string(),
                },
                addr,
            );
            return;
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr)
        };

        match client_id {
            Some(client_id) => {
                self.protocol.add_entity(client_id);
                self.send_packet(
                    Packet::Connected {
                        client_id,
                        capacity,
                    },
                    addr,
                );

                let snapshot = self.protocol.join_snapshot(client_id);
                debug!("Sending {} entity snapshots to peer {}", snapshot.len(), client_id);
                self.dispatch(snapshot).await;
            }
            None => {
                self.send_packet(
                    Packet::Disconnected {
                        reason: "Server full".to_string(),
                    },
                    addr,
                );
            }
        }
    }

    /// Processes incoming packets and updates replicas
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                capacity,
            } => {
                self.handle_connect(client_version, capacity, addr).await;
            }

            Packet::Sync { frame } => {
                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.touch_addr(addr)
                };

                match client_id {
                    Some(client_id) => {
                        let relay = self.protocol.handle(client_id, &frame);
                        self.dispatch(relay).await;
                    }
                    None => warn!("Sync frame from unknown address {}", addr),
                }
            }

            Packet::Heartbeat => {
                let mut clients = self.clients.write().await;
                clients.touch_addr(addr);
            }

            Packet::Disconnect => {
                let client_id = {
                    let mut clients = self.clients.write().await;
                    let client_id = clients.find_client_by_addr(addr);
                    if let Some(client_id) = client_id {
                        clients.remove_client(&client_id);
                    }
                    client_id
                };

                if let Some(client_id) = client_id {
                    self.entity_left(client_id);
                }
            }

            _ => {
                warn!("Unexpected packet type from peer at {}", addr);
            }
        }
    }

    /// Main host loop
    pub async fn run(&mut self) -> Result<(), ServerError> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        let mut status_interval = interval(STATUS_INTERVAL);

        info!("Host started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            info!("Peer {} timed out", client_id);
                            self.entity_left(client_id);
                        },
                        None => {
                            info!("Host shutting down");
                            break;
                        }
                    }
                },

                _ = status_interval.tick() => {
                    let client_count = {
                        let clients = self.clients.read().await;
                        clients.len()
                    };

                    if client_count > 0 {
                        debug!("{} peers, {} replicas",
                               client_count, self.protocol.entity_ids().len());
                    }
                },
            }
        }

        Ok(())
    }
}
