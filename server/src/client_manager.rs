//! Connected peer roster for the host
//!
//! This module tracks who is connected to the host:
//! - Peer id assignment (one byte, matching the sync frame's entity id)
//! - Address lookup for routing replies and relays
//! - Connection health monitoring and timeout cleanup
//!
//! Slot state is not kept here. The host's replicas live in the
//! `SyncProtocol` owned by the network loop.

use log::info;
use shared::PeerId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Idle time after which a peer is considered gone.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Represents a connected peer
#[derive(Debug)]
pub struct Client {
    /// Peer id assigned by the host, also the id of the peer's entity
    pub id: PeerId,
    /// Network address for sending packets
    pub addr: SocketAddr,
    /// Last time we received any packet from this peer
    pub last_seen: Instant,
}

impl Client {
    pub fn new(id: PeerId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
        }
    }

    /// Marks the peer as active now.
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Returns true if nothing arrived from this peer within `timeout`.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected peers
///
/// Ids start at 1 and the lowest free id is reused, so ids always fit in the
/// one-byte entity field of a sync frame. Id 0 is left for an entity owned by
/// the host itself.
pub struct ClientManager {
    /// Connected peers indexed by their id
    clients: HashMap<PeerId, Client>,
    /// Maximum number of concurrent peers allowed
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients: max_clients.min(PeerId::MAX as usize),
        }
    }

    /// Attempts to add a new peer
    ///
    /// Returns Some(peer_id) if successful, None if the host is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<PeerId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = (1..=PeerId::MAX).find(|id| !self.clients.contains_key(id))?;

        info!("Peer {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));

        Some(client_id)
    }

    /// Removes a peer. Returns false if it was already gone.
    pub fn remove_client(&mut self, client_id: &PeerId) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Peer {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    /// Finds a peer id by network address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<PeerId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn addr_of(&self, client_id: PeerId) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|client| client.addr)
    }

    /// Refreshes the activity timestamp of the peer at `addr` and returns
    /// its id.
    pub fn touch_addr(&mut self, addr: SocketAddr) -> Option<PeerId> {
        let client = self.clients.values_mut().find(|client| client.addr == addr)?;
        client.touch();
        Some(client.id)
    }

    /// Removes and returns every peer idle for longer than `timeout`.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<PeerId> {
        let timed_out: Vec<PeerId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    /// Gets all peer ids and their network addresses
    ///
    /// Used when broadcasting relays and session notices.
    pub fn get_client_addrs(&self) -> Vec<(PeerId, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_client_creation() {
        let addr = test_addr();
        let client = Client::new(1, addr);

        assert_eq!(client.id, 1);
        assert_eq!(client.addr, addr);
        assert!(!client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(1, test_addr());
        client.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(client.is_timed_out(Duration::from_secs(1)));

        client.touch();
        assert!(!client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new(5);
        assert_eq!(manager.max_clients, 5);
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_max_clients_fits_in_a_byte() {
        let manager = ClientManager::new(10_000);
        assert_eq!(manager.max_clients, 255);
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = ClientManager::new(3);

        let client_id1 = manager.add_client(test_addr()).unwrap();
        let client_id2 = manager.add_client(test_addr2()).unwrap();

        assert_eq!(client_id1, 1);
        assert_eq!(client_id2, 2);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);

        assert!(manager.add_client(test_addr()).is_some());
        assert!(manager.add_client(test_addr2()).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_lowest_free_id_is_reused() {
        let mut manager = ClientManager::new(4);
        let first = manager.add_client(test_addr()).unwrap();
        manager.add_client(test_addr2()).unwrap();

        assert!(manager.remove_client(&first));
        let reused = manager
            .add_client("127.0.0.1:9000".parse().unwrap())
            .unwrap();
        assert_eq!(reused, first);
    }

    #[test]
    fn test_remove_nonexistent_client() {
        let mut manager = ClientManager::new(2);
        assert!(!manager.remove_client(&99));
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = ClientManager::new(2);
        let client_id1 = manager.add_client(test_addr()).unwrap();
        let client_id2 = manager.add_client(test_addr2()).unwrap();

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(client_id1));
        assert_eq!(manager.addr_of(client_id2), Some(test_addr2()));

        let unknown_addr: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown_addr), None);
        assert_eq!(manager.touch_addr(unknown_addr), None);
    }

    #[test]
    fn test_check_timeouts_removes_idle_clients() {
        let mut manager = ClientManager::new(3);
        let idle = manager.add_client(test_addr()).unwrap();
        let active = manager.add_client(test_addr2()).unwrap();

        if let Some(client) = manager.clients.get_mut(&idle) {
            client.last_seen = Instant::now() - Duration::from_secs(10);
        }

        let removed = manager.check_timeouts(CLIENT_TIMEOUT);
        assert_eq!(removed, vec![idle]);
        assert_eq!(manager.find_client_by_addr(test_addr2()), Some(active));
        assert_eq!(manager.len(), 1);
    }
}
