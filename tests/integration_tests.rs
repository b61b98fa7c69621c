//! Integration tests for slot replication
//!
//! These tests validate cross-component interactions: the in-memory protocol
//! wired between a host and several peers, and the real UDP host.

use bincode::{deserialize, serialize};
use shared::{
    EntityState, Item, MessageKind, MirrorStatus, Outbound, Packet, PeerId, Role, SlotRole,
    SyncMessage, SyncProtocol, Target, PROTOCOL_VERSION,
};
use std::collections::BTreeMap;
use std::time::Duration;

/// WIRE FORMAT TESTS
mod wire_tests {
    use super::*;

    /// Every session packet survives the bincode transport unchanged
    #[test]
    fn packet_serialization_roundtrip() {
        let mut state = EntityState::new(3, 2);
        state.set_item(1, SlotRole::Tertiary, Item::new(77, 5, 2));
        let frame = SyncMessage::from_state(MessageKind::Full, &state)
            .encode()
            .unwrap();

        let packets = vec![
            Packet::Connect {
                client_version: PROTOCOL_VERSION,
                capacity: 2,
            },
            Packet::Sync { frame },
            Packet::Heartbeat,
            Packet::Disconnect,
            Packet::Connected {
                client_id: 3,
                capacity: 2,
            },
            Packet::PeerLeft { client_id: 3 },
            Packet::Disconnected {
                reason: "Test".to_string(),
            },
        ];

        for packet in packets {
            let bytes = serialize(&packet).unwrap();
            let decoded: Packet = deserialize(&bytes).unwrap();
            assert_eq!(decoded, packet);
        }
    }

    /// A role frame is header plus one item per group, nothing else
    #[test]
    fn role_frame_size() {
        for capacity in 0..=10usize {
            let state = EntityState::new(1, capacity);
            let frame = SyncMessage::from_state(MessageKind::Secondary, &state)
                .encode()
                .unwrap();
            assert_eq!(frame.len(), 2 + capacity * 7);

            let full = SyncMessage::from_state(MessageKind::Full, &state)
                .encode()
                .unwrap();
            assert_eq!(full.len(), 2 + capacity * 3 * 7);
        }
    }
}

/// IN-MEMORY SESSION TESTS
mod session_tests {
    use super::*;

    struct Peer {
        protocol: SyncProtocol,
        state: EntityState,
    }

    /// Host plus peers with outbound messages delivered synchronously.
    struct Session {
        capacity: usize,
        host: SyncProtocol,
        peers: BTreeMap<PeerId, Peer>,
        /// Frames each peer received, in order.
        inbox: BTreeMap<PeerId, Vec<Vec<u8>>>,
    }

    impl Session {
        fn new(capacity: usize) -> Self {
            Self {
                capacity,
                host: SyncProtocol::new(Role::Host, capacity, None),
                peers: BTreeMap::new(),
                inbox: BTreeMap::new(),
            }
        }

        fn join(&mut self, id: PeerId) {
            self.host.add_entity(id);
            let snapshot = self.host.join_snapshot(id);

            let mut protocol = SyncProtocol::new(Role::Peer, self.capacity, Some(id));
            let state = EntityState::new(id, self.capacity);
            let announce = protocol.attach_local(&state).unwrap();
            self.peers.insert(id, Peer { protocol, state });
            self.inbox.insert(id, Vec::new());

            self.deliver_to_peers(snapshot);
            self.deliver_to_host(id, announce);
        }

        fn leave(&mut self, id: PeerId) {
            self.peers.remove(&id);
            self.inbox.remove(&id);
            self.host.remove_entity(id);
            for peer in self.peers.values_mut() {
                peer.protocol.remove_entity(id);
            }
        }

        fn edit(&mut self, id: PeerId, f: impl FnOnce(&mut EntityState)) {
            let outbound = {
                let peer = self.peers.get_mut(&id).unwrap();
                f(&mut peer.state);
                peer.protocol.tick(&peer.state)
            };
            self.deliver_to_host(id, outbound);
        }

        fn deliver_to_host(&mut self, from: PeerId, outbound: Vec<Outbound>) {
            for Outbound { target, message } in outbound {
                assert_eq!(target, Target::Host);
                let relay = self.host.handle(from, &message.encode().unwrap());
                self.deliver_to_peers(relay);
            }
        }

        fn deliver_to_peers(&mut self, outbound: Vec<Outbound>) {
            for Outbound { target, message } in outbound {
                let frame = message.encode().unwrap();
                for (id, peer) in self.peers.iter_mut() {
                    let addressed = match target {
                        Target::Peer(to) => to == *id,
                        Target::AllExcept(skip) => skip != *id,
                        Target::All => true,
                        Target::Host => false,
                    };
                    if addressed {
                        self.inbox.get_mut(id).unwrap().push(frame.clone());
                        peer.protocol.handle(0, &frame);
                    }
                }
            }
        }

        fn mirror(&self, viewer: PeerId, entity: PeerId) -> Option<&EntityState> {
            self.peers[&viewer].protocol.mirror(entity)
        }
    }

    #[test]
    fn update_reaches_everyone_but_sender() {
        let mut session = Session::new(4);
        for id in [1, 2, 3, 4] {
            session.join(id);
        }
        for inbox in session.inbox.values_mut() {
            inbox.clear();
        }

        session.edit(1, |state| {
            state.set_item(2, SlotRole::Primary, Item::new(100, 1, 0));
        });

        assert!(session.inbox[&1].is_empty());
        for viewer in [2, 3, 4] {
            assert_eq!(session.inbox[&viewer].len(), 1);
            let message = SyncMessage::decode(&session.inbox[&viewer][0], 4).unwrap();
            assert_eq!(message.kind(), MessageKind::Primary);
            assert_eq!(message.entity_id(), 1);

            let mirror = session.mirror(viewer, 1).unwrap();
            assert_eq!(mirror.item(2, SlotRole::Primary), Some(&Item::new(100, 1, 0)));
        }
    }

    #[test]
    fn late_joiner_sees_current_slots() {
        let mut session = Session::new(3);
        session.join(1);
        session.join(2);

        session.edit(1, |state| {
            state.set_item(0, SlotRole::Secondary, Item::new(5, 2, 1));
            state.set_item(2, SlotRole::Tertiary, Item::new(9, 1, 0));
        });
        session.edit(2, |state| {
            state.set_item(1, SlotRole::Primary, Item::new(42, 3, 0));
        });

        session.join(3);

        let host_view_1 = session.host.mirror(1).unwrap().clone();
        let host_view_2 = session.host.mirror(2).unwrap().clone();
        assert!(session.mirror(3, 1).unwrap().same_items(&host_view_1));
        assert!(session.mirror(3, 2).unwrap().same_items(&host_view_2));
        assert_eq!(
            session.peers[&3].protocol.mirror_status(1),
            Some(MirrorStatus::Synced)
        );

        // Earlier peers learn about the joiner from its full announcement.
        assert_eq!(
            session.peers[&1].protocol.mirror_status(3),
            Some(MirrorStatus::Synced)
        );
    }

    #[test]
    fn replicas_converge_after_many_edits() {
        let mut session = Session::new(5);
        for id in [1, 2, 3] {
            session.join(id);
        }

        for round in 0..30u32 {
            let id = (round % 3) as PeerId + 1;
            let group = (round as usize * 7) % 5;
            let role = SlotRole::ALL[round as usize % 3];
            let item = if round % 4 == 0 {
                Item::empty()
            } else {
                Item::new(round + 1, 1, 0)
            };
            session.edit(id, |state| {
                state.set_item(group, role, item);
            });
        }

        for owner in [1, 2, 3] {
            let truth = session.peers[&owner].state.clone();
            assert!(session.host.mirror(owner).unwrap().same_items(&truth));
            for viewer in [1, 2, 3] {
                if viewer != owner {
                    assert!(session.mirror(viewer, owner).unwrap().same_items(&truth));
                }
            }
        }
    }

    #[test]
    fn repeated_full_snapshot_changes_nothing() {
        let mut session = Session::new(2);
        session.join(1);
        session.join(2);
        session.edit(1, |state| {
            state.set_item(1, SlotRole::Tertiary, Item::new(8, 8, 8));
        });

        let before = session.mirror(2, 1).unwrap().clone();
        let full = SyncMessage::from_state(MessageKind::Full, &session.peers[&1].state);
        session.deliver_to_host(
            1,
            vec![Outbound {
                target: Target::Host,
                message: full.clone(),
            }],
        );
        session.deliver_to_host(
            1,
            vec![Outbound {
                target: Target::Host,
                message: full,
            }],
        );

        assert_eq!(session.mirror(2, 1).unwrap(), &before);
    }

    #[test]
    fn garbage_frames_are_dropped() {
        let mut session = Session::new(2);
        session.join(1);
        session.join(2);
        let before = session.host.mirror(1).unwrap().clone();

        assert!(session.host.handle(1, &[9, 1]).is_empty());
        assert!(session.host.handle(1, &[1, 1, 0, 0]).is_empty());
        assert!(session.host.handle(1, &[]).is_empty());

        // A peer may only speak for itself.
        let mut forged = EntityState::new(2, 2);
        forged.set_item(0, SlotRole::Primary, Item::new(1, 1, 0));
        let frame = SyncMessage::from_state(MessageKind::Full, &forged)
            .encode()
            .unwrap();
        assert!(session.host.handle(1, &frame).is_empty());

        assert_eq!(session.host.mirror(1).unwrap(), &before);
        assert!(session
            .host
            .mirror(2)
            .unwrap()
            .same_items(&EntityState::new(2, 2)));

        // The session keeps working afterwards.
        session.edit(1, |state| {
            state.set_item(0, SlotRole::Secondary, Item::new(3, 1, 0));
        });
        assert_eq!(
            session.mirror(2, 1).unwrap().item(0, SlotRole::Secondary),
            Some(&Item::new(3, 1, 0))
        );
    }

    #[test]
    fn departed_peer_disappears() {
        let mut session = Session::new(1);
        session.join(1);
        session.join(2);
        session.join(3);

        session.leave(2);

        assert!(session.host.mirror(2).is_none());
        assert!(session.mirror(1, 2).is_none());
        assert!(session.mirror(3, 2).is_none());
        assert!(session.host.join_snapshot(4).iter().all(|o| o.message.entity_id() != 2));
    }
}

/// REAL NETWORK TESTS
mod network_tests {
    use super::*;
    use server::network::Server;
    use shared::SessionConfig;
    use tokio::net::UdpSocket;
    use tokio::time::{sleep, timeout};
    use tokio_test::assert_ok;

    async fn recv(socket: &UdpSocket) -> Option<Packet> {
        let mut buf = [0u8; 2048];
        match timeout(Duration::from_millis(500), socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => deserialize(&buf[..len]).ok(),
            _ => None,
        }
    }

    async fn send(socket: &UdpSocket, addr: &str, packet: &Packet) {
        let bytes = serialize(packet).unwrap();
        assert_ok!(socket.send_to(&bytes, addr).await);
    }

    async fn join(addr: &str, capacity: u8) -> (UdpSocket, Option<Packet>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        send(
            &socket,
            addr,
            &Packet::Connect {
                client_version: PROTOCOL_VERSION,
                capacity,
            },
        )
        .await;
        let reply = recv(&socket).await;
        (socket, reply)
    }

    #[tokio::test]
    async fn host_relays_between_real_peers() {
        let config = SessionConfig::with_capacity(2);
        let mut server = Server::new("127.0.0.1:0", 8, &config)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let (peer_a, reply) = join(&addr, 2).await;
        assert_eq!(
            reply,
            Some(Packet::Connected {
                client_id: 1,
                capacity: 2
            })
        );

        let mut state_a = EntityState::new(1, 2);
        state_a.set_item(0, SlotRole::Primary, Item::new(11, 1, 0));
        let full = SyncMessage::from_state(MessageKind::Full, &state_a);
        send(&peer_a, &addr, &Packet::sync(&full).unwrap()).await;
        sleep(Duration::from_millis(50)).await;

        let (peer_b, reply) = join(&addr, 2).await;
        assert_eq!(
            reply,
            Some(Packet::Connected {
                client_id: 2,
                capacity: 2
            })
        );
        match recv(&peer_b).await {
            Some(Packet::Sync { frame }) => {
                let message = SyncMessage::decode(&frame, 2).unwrap();
                assert_eq!(message, full);
            }
            other => panic!("Expected snapshot of peer 1, got {:?}", other),
        }

        state_a.set_item(1, SlotRole::Primary, Item::new(12, 2, 0));
        let primary = SyncMessage::from_state(MessageKind::Primary, &state_a);
        send(&peer_a, &addr, &Packet::sync(&primary).unwrap()).await;

        match recv(&peer_b).await {
            Some(Packet::Sync { frame }) => {
                assert_eq!(SyncMessage::decode(&frame, 2).unwrap(), primary);
            }
            other => panic!("Expected relayed primary update, got {:?}", other),
        }
        assert_eq!(recv(&peer_a).await, None);

        let (_peer_c, reply) = join(&addr, 3).await;
        match reply {
            Some(Packet::Disconnected { reason }) => assert!(reason.contains("capacity")),
            other => panic!("Expected rejection, got {:?}", other),
        }

        send(&peer_b, &addr, &Packet::Disconnect).await;
        assert_eq!(recv(&peer_a).await, Some(Packet::PeerLeft { client_id: 2 }));
    }
}
