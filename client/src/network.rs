use crate::input::InputSimulator;
use crate::rendering::{LogRenderer, SlotView};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{
    EntityState, Outbound, Packet, PeerId, PersistedState, Role, SessionConfig, SyncProtocol,
    Target, DEFAULT_PERSIST_PREFIX, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep, Instant};

/// Sender id passed to the protocol for frames relayed by the host.
const HOST_SENDER: PeerId = 0;

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    config: SessionConfig,
    client_id: Option<PeerId>,
    connected: bool,
    /// The host rejected or dropped us, or we left. No rejoin.
    closed: bool,

    protocol: Option<SyncProtocol>,
    local: Option<EntityState>,
    input: InputSimulator,
    renderer: LogRenderer,
    save_path: Option<PathBuf>,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        config: SessionConfig,
        input: InputSimulator,
        save_path: Option<PathBuf>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            config,
            client_id: None,
            connected: false,
            closed: false,
            protocol: None,
            local: None,
            input,
            renderer: LogRenderer::new(),
            save_path,
        })
    }

    pub fn client_id(&self) -> Option<PeerId> {
        self.client_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn local_state(&self) -> Option<&EntityState> {
        self.local.as_ref()
    }

    /// This client's copy of another entity's slots.
    pub fn mirror(&self, id: PeerId) -> Option<&EntityState> {
        self.protocol.as_ref().and_then(|p| p.mirror(id))
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!(
            "Connecting to host at {} with capacity {}...",
            self.server_addr, self.config.capacity
        );

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            capacity: self.config.capacity,
        };
        self.send_packet(&packet).await
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn send_outbound(&self, outbound: Vec<Outbound>) {
        for Outbound { target, message } in outbound {
            if target != Target::Host {
                warn!("Peer cannot deliver to {:?}", target);
                continue;
            }

            let result = match Packet::sync(&message) {
                Ok(packet) => self.send_packet(&packet).await,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = result {
                error!("Failed to send {:?} update: {}", message.kind(), e);
            }
        }
    }

    /// Sets up the local entity once the host has assigned an id, then
    /// announces it in full.
    async fn on_connected(&mut self, client_id: PeerId, capacity: u8) {
        if capacity != self.config.capacity {
            warn!(
                "Host confirmed capacity {} but this client runs {}; leaving",
                capacity, self.config.capacity
            );
            let _ = self.send_packet(&Packet::Disconnect).await;
            self.connected = false;
            self.closed = true;
            return;
        }

        info!("Connected! Peer ID: {}", client_id);
        self.client_id = Some(client_id);
        self.connected = true;

        let local = match &self.save_path {
            Some(path) if path.exists() => {
                match load_state(path, client_id, self.config.capacity()) {
                    Ok(state) => {
                        info!("Restored slots from {}", path.display());
                        state
                    }
                    Err(e) => {
                        warn!("Could not load {}: {}", path.display(), e);
                        EntityState::new(client_id, self.config.capacity())
                    }
                }
            }
            _ => EntityState::new(client_id, self.config.capacity()),
        };

        let mut protocol = SyncProtocol::new(Role::Peer, self.config.capacity(), Some(client_id));
        let announce = match protocol.attach_local(&local) {
            Ok(announce) => announce,
            Err(e) => {
                error!("Could not attach local slots: {}", e);
                Vec::new()
            }
        };

        self.protocol = Some(protocol);
        self.local = Some(local);
        self.send_outbound(announce).await;
    }

    async fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected {
                client_id,
                capacity,
            } => {
                self.on_connected(client_id, capacity).await;
            }

            Packet::Sync { frame } => match self.protocol.as_mut() {
                Some(protocol) => {
                    protocol.handle(HOST_SENDER, &frame);
                }
                None => debug!("Sync frame before join, dropped"),
            },

            Packet::PeerLeft { client_id } => {
                if let Some(protocol) = self.protocol.as_mut() {
                    if protocol.remove_entity(client_id) {
                        info!("Peer {} left", client_id);
                    }
                }
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.closed = true;
                self.client_id = None;
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
    }

    /// One input tick: simulated edits, then change detection.
    async fn input_tick(&mut self) {
        let outbound = match (self.local.as_mut(), self.protocol.as_mut()) {
            (Some(local), Some(protocol)) => {
                if let Some(edit) = self.input.update(local) {
                    debug!("Local edit: {:?}", edit);
                }
                protocol.tick(local)
            }
            _ => return,
        };

        self.send_outbound(outbound).await;
    }

    fn render(&mut self) {
        if let (Some(local), Some(protocol)) = (&self.local, &self.protocol) {
            self.renderer.draw(local.owner_id(), local);
            for id in protocol.entity_ids() {
                if let Some(mirror) = protocol.mirror(id) {
                    self.renderer.draw(id, mirror);
                }
            }
        }
    }

    fn save(&self) {
        if let (Some(path), Some(local)) = (&self.save_path, &self.local) {
            match save_state(path, local) {
                Ok(()) => info!("Saved slots to {}", path.display()),
                Err(e) => error!("Failed to save {}: {}", path.display(), e),
            }
        }
    }

    /// Runs until the host drops us, Ctrl+C, or `run_for` elapses.
    pub async fn run(&mut self, run_for: Option<Duration>) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut input_interval = interval(Duration::from_millis(16));
        let mut heartbeat_interval = interval(Duration::from_secs(1));
        let mut render_interval = interval(Duration::from_secs(2));
        let deadline = sleep(run_for.unwrap_or_default());
        tokio::pin!(deadline);
        let started = Instant::now();

        let mut buffer = [0u8; 2048];
        let mut joined = false;

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                                self.handle_packet(packet).await;
                                joined |= self.connected;
                                if self.closed {
                                    break;
                                }
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = input_interval.tick() => {
                    self.input_tick().await;
                },

                _ = heartbeat_interval.tick() => {
                    if self.connected {
                        if let Err(e) = self.send_packet(&Packet::Heartbeat).await {
                            error!("Error sending heartbeat: {}", e);
                        }
                    } else if !joined && started.elapsed() > Duration::from_secs(5) {
                        warn!("No answer from host");
                        break;
                    }
                },

                _ = render_interval.tick() => {
                    self.render();
                },

                _ = &mut deadline, if run_for.is_some() => {
                    info!("Run time elapsed");
                    break;
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, leaving");
                    break;
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }
        self.save();

        Ok(())
    }
}

/// Reads a JSON save file into a state for `owner`.
pub fn load_state(
    path: &Path,
    owner: PeerId,
    capacity: usize,
) -> Result<EntityState, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let persisted: PersistedState = serde_json::from_str(&contents)?;
    Ok(EntityState::from_persisted(
        owner,
        capacity,
        &persisted,
        DEFAULT_PERSIST_PREFIX,
    ))
}

/// Writes `state` as a JSON save file.
pub fn save_state(path: &Path, state: &EntityState) -> Result<(), Box<dyn std::error::Error>> {
    let persisted = state.to_persisted(DEFAULT_PERSIST_PREFIX);
    std::fs::write(path, serde_json::to_string_pretty(&persisted)?)?;
    Ok(())
}
