//! Replication state machine shared by the host and its peers.
//!
//! A [`SyncProtocol`] owns every replica a process knows about: the host's
//! authoritative copies, or a peer's mirrors of other entities. It turns
//! local changes into outgoing [`SyncMessage`]s and applies incoming frames.
//! It performs no I/O. Callers deliver the returned [`Outbound`] messages
//! themselves.
//!
//! ## Roles
//!
//! - `Host` applies updates from peers to its authoritative copy, then relays
//!   the same message kind to every other peer. It answers joins with a
//!   full snapshot of every synced entity.
//! - `Peer` sends its own changes to the host and applies whatever the host
//!   forwards to its mirrors. It never relays.
//! - `Standalone` has nobody to talk to. Local changes are tracked but
//!   nothing is emitted.
//!
//! ## Mirror lifecycle
//!
//! A replica starts `Uninitialized` and becomes `Synced` on its first `Full`
//! message. Role messages keep a `Synced` replica synced. Teardown belongs
//! to the session layer through [`SyncProtocol::remove_entity`].

use crate::diff::{changed_roles, ChangeDetector};
use crate::error::ProtocolError;
use crate::message::{MessageKind, SyncMessage};
use crate::state::EntityState;
use crate::PeerId;
use log::{debug, error, warn};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Peer,
    Standalone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorStatus {
    Uninitialized,
    Synced,
}

/// Who an outgoing message is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The session host. Only produced in the `Peer` role.
    Host,
    /// One specific peer.
    Peer(PeerId),
    /// Every connected peer except the given one.
    AllExcept(PeerId),
    /// Every connected peer.
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub target: Target,
    pub message: SyncMessage,
}

#[derive(Debug, Clone)]
struct Replica {
    state: EntityState,
    status: MirrorStatus,
}

pub struct SyncProtocol {
    role: Role,
    capacity: usize,
    local_id: Option<PeerId>,
    replicas: BTreeMap<PeerId, Replica>,
    detector: ChangeDetector,
}

impl SyncProtocol {
    /// `local_id` is the entity this process owns, if any. A dedicated host
    /// passes `None`.
    pub fn new(role: Role, capacity: usize, local_id: Option<PeerId>) -> Self {
        Self {
            role,
            capacity,
            local_id,
            replicas: BTreeMap::new(),
            detector: ChangeDetector::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn local_id(&self) -> Option<PeerId> {
        self.local_id
    }

    /// Fails with `CapacityMismatch` unless `remote` equals the local
    /// capacity. Checked when a peer joins.
    pub fn check_capacity(&self, remote: usize) -> Result<(), ProtocolError> {
        if remote == self.capacity {
            Ok(())
        } else {
            Err(ProtocolError::CapacityMismatch {
                local: self.capacity,
                remote,
            })
        }
    }

    /// Registers an entity with an empty, uninitialized replica. Existing
    /// replicas are left untouched.
    pub fn add_entity(&mut self, id: PeerId) {
        let capacity = self.capacity;
        self.replicas.entry(id).or_insert_with(|| Replica {
            state: EntityState::new(id, capacity),
            status: MirrorStatus::Uninitialized,
        });
    }

    pub fn remove_entity(&mut self, id: PeerId) -> bool {
        self.replicas.remove(&id).is_some()
    }

    pub fn mirror(&self, id: PeerId) -> Option<&EntityState> {
        self.replicas.get(&id).map(|r| &r.state)
    }

    pub fn mirror_status(&self, id: PeerId) -> Option<MirrorStatus> {
        self.replicas.get(&id).map(|r| r.status)
    }

    pub fn entity_ids(&self) -> Vec<PeerId> {
        self.replicas.keys().copied().collect()
    }

    /// Starts tracking the locally owned state and announces it in full.
    ///
    /// A host also keeps the state as its own authoritative replica, so it
    /// is included in later join snapshots.
    pub fn attach_local(&mut self, state: &EntityState) -> Result<Vec<Outbound>, ProtocolError> {
        self.check_capacity(state.capacity())?;
        self.local_id = Some(state.owner_id());
        self.detector.reset(state);

        if self.role == Role::Host {
            self.replicas.insert(
                state.owner_id(),
                Replica {
                    state: state.clone(),
                    status: MirrorStatus::Synced,
                },
            );
        }

        let message = SyncMessage::from_state(MessageKind::Full, state);
        Ok(self.address_local(vec![message]))
    }

    /// Runs change detection on the local state and emits one role message
    /// per changed role.
    ///
    /// Call once per tick, after local mutation for the tick is done.
    pub fn tick(&mut self, current: &EntityState) -> Vec<Outbound> {
        let deltas = self.detector.poll(current);
        if deltas.is_empty() {
            return Vec::new();
        }

        let messages: Vec<SyncMessage> = changed_roles(&deltas)
            .into_iter()
            .map(|role| SyncMessage::from_state(MessageKind::for_role(role), current))
            .collect();

        if self.role == Role::Host {
            if let Some(replica) = self.replicas.get_mut(&current.owner_id()) {
                for message in &messages {
                    message.apply(&mut replica.state);
                }
            }
        }

        debug!(
            "Local entity {}: {} slot changes in {} roles",
            current.owner_id(),
            deltas.len(),
            messages.len()
        );
        self.address_local(messages)
    }

    fn address_local(&self, messages: Vec<SyncMessage>) -> Vec<Outbound> {
        let target = match self.role {
            Role::Host => Target::All,
            Role::Peer => Target::Host,
            Role::Standalone => return Vec::new(),
        };

        messages
            .into_iter()
            .map(|message| Outbound { target, message })
            .collect()
    }

    /// Applies one inbound frame and returns anything that has to be relayed.
    ///
    /// Errors are logged and the frame is dropped. Replicas are left as they
    /// were.
    pub fn handle(&mut self, from: PeerId, frame: &[u8]) -> Vec<Outbound> {
        match self.try_handle(from, frame) {
            Ok(outbound) => outbound,
            Err(e @ (ProtocolError::ForeignEntity { .. } | ProtocolError::UnknownEntity(_))) => {
                warn!("Dropped sync frame from {}: {}", from, e);
                Vec::new()
            }
            Err(e) => {
                error!("Dropped sync frame from {}: {}", from, e);
                Vec::new()
            }
        }
    }

    pub fn try_handle(&mut self, from: PeerId, frame: &[u8]) -> Result<Vec<Outbound>, ProtocolError> {
        let message = SyncMessage::decode(frame, self.capacity)?;
        let entity_id = message.entity_id();

        match self.role {
            Role::Host => {
                if entity_id != from {
                    return Err(ProtocolError::ForeignEntity {
                        entity: entity_id,
                        sender: from,
                    });
                }

                let replica = self
                    .replicas
                    .get_mut(&entity_id)
                    .ok_or(ProtocolError::UnknownEntity(entity_id))?;
                Self::apply_to(replica, &message);

                let relay = SyncMessage::from_state(message.kind(), &replica.state);
                Ok(vec![Outbound {
                    target: Target::AllExcept(from),
                    message: relay,
                }])
            }
            Role::Peer | Role::Standalone => {
                if Some(entity_id) == self.local_id {
                    debug!("Ignoring {:?} update for own entity {}", message.kind(), entity_id);
                    return Ok(Vec::new());
                }

                self.add_entity(entity_id);
                if let Some(replica) = self.replicas.get_mut(&entity_id) {
                    Self::apply_to(replica, &message);
                }
                Ok(Vec::new())
            }
        }
    }

    fn apply_to(replica: &mut Replica, message: &SyncMessage) {
        message.apply(&mut replica.state);
        if message.kind() == MessageKind::Full {
            replica.status = MirrorStatus::Synced;
        }
    }

    /// Full snapshots of every synced replica for a peer that just joined.
    /// Only a host produces these. The joining peer's own replica is skipped.
    pub fn join_snapshot(&self, new_peer: PeerId) -> Vec<Outbound> {
        if self.role != Role::Host {
            return Vec::new();
        }

        self.replicas
            .iter()
            .filter(|(id, replica)| **id != new_peer && replica.status == MirrorStatus::Synced)
            .map(|(_, replica)| Outbound {
                target: Target::Peer(new_peer),
                message: SyncMessage::from_state(MessageKind::Full, &replica.state),
            })
            .collect()
    }
}
