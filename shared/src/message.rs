//! Sync frame codec.
//!
//! A frame is `kind: u8 | entity_id: u8 | payload`. The payload is one
//! bincode-encoded [`Item`] per slot, group by group. A `Full` frame carries
//! primary, secondary and tertiary for each group. A role frame carries only
//! its role. Decoding reads exactly as many groups as the local capacity.

use crate::error::ProtocolError;
use crate::item::Item;
use crate::slot::SlotRole;
use crate::state::EntityState;
use crate::PeerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Full,
    Primary,
    Secondary,
    Tertiary,
}

impl MessageKind {
    pub fn tag(self) -> u8 {
        match self {
            MessageKind::Full => 0,
            MessageKind::Primary => 1,
            MessageKind::Secondary => 2,
            MessageKind::Tertiary => 3,
        }
    }

    pub fn for_role(role: SlotRole) -> Self {
        match role {
            SlotRole::Primary => MessageKind::Primary,
            SlotRole::Secondary => MessageKind::Secondary,
            SlotRole::Tertiary => MessageKind::Tertiary,
        }
    }

    /// The single role a role message replaces. `None` for `Full`.
    pub fn role(self) -> Option<SlotRole> {
        match self {
            MessageKind::Full => None,
            MessageKind::Primary => Some(SlotRole::Primary),
            MessageKind::Secondary => Some(SlotRole::Secondary),
            MessageKind::Tertiary => Some(SlotRole::Tertiary),
        }
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = ProtocolError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(MessageKind::Full),
            1 => Ok(MessageKind::Primary),
            2 => Ok(MessageKind::Secondary),
            3 => Ok(MessageKind::Tertiary),
            other => Err(ProtocolError::UnknownMessageKind(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMessage {
    /// Every role of every group.
    Full {
        entity_id: PeerId,
        groups: Vec<[Item; 3]>,
    },
    /// One role across every group.
    Role {
        entity_id: PeerId,
        role: SlotRole,
        items: Vec<Item>,
    },
}

impl SyncMessage {
    /// Captures the current content of `state` for the given kind.
    pub fn from_state(kind: MessageKind, state: &EntityState) -> Self {
        let entity_id = state.owner_id();
        match kind.role() {
            None => SyncMessage::Full {
                entity_id,
                groups: state.groups().iter().map(|g| g.items()).collect(),
            },
            Some(role) => SyncMessage::Role {
                entity_id,
                role,
                items: state.role_items(role),
            },
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            SyncMessage::Full { .. } => MessageKind::Full,
            SyncMessage::Role { role, .. } => MessageKind::for_role(*role),
        }
    }

    pub fn entity_id(&self) -> PeerId {
        match self {
            SyncMessage::Full { entity_id, .. } | SyncMessage::Role { entity_id, .. } => *entity_id,
        }
    }

    /// Number of groups the message describes.
    pub fn group_count(&self) -> usize {
        match self {
            SyncMessage::Full { groups, .. } => groups.len(),
            SyncMessage::Role { items, .. } => items.len(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut frame = Vec::with_capacity(2 + self.group_count() * 3 * 7);
        frame.push(self.kind().tag());
        frame.push(self.entity_id());

        match self {
            SyncMessage::Full { groups, .. } => {
                for group in groups {
                    for item in group {
                        bincode::serialize_into(&mut frame, item)?;
                    }
                }
            }
            SyncMessage::Role { items, .. } => {
                for item in items {
                    bincode::serialize_into(&mut frame, item)?;
                }
            }
        }

        Ok(frame)
    }

    /// Decodes a frame holding exactly `capacity` groups.
    ///
    /// A short payload, or bytes left over after the last group, is
    /// rejected as malformed. Leftover bytes usually mean the sender runs
    /// with a larger capacity.
    pub fn decode(frame: &[u8], capacity: usize) -> Result<Self, ProtocolError> {
        let (&tag, rest) = frame
            .split_first()
            .ok_or_else(|| ProtocolError::malformed("empty frame"))?;
        let kind = MessageKind::try_from(tag)?;
        let (&entity_id, mut payload) = rest
            .split_first()
            .ok_or_else(|| ProtocolError::malformed("missing entity id"))?;

        let message = match kind.role() {
            None => {
                let mut groups = Vec::with_capacity(capacity);
                for index in 0..capacity {
                    groups.push([
                        read_item(&mut payload, index)?,
                        read_item(&mut payload, index)?,
                        read_item(&mut payload, index)?,
                    ]);
                }
                SyncMessage::Full { entity_id, groups }
            }
            Some(role) => {
                let mut items = Vec::with_capacity(capacity);
                for index in 0..capacity {
                    items.push(read_item(&mut payload, index)?);
                }
                SyncMessage::Role {
                    entity_id,
                    role,
                    items,
                }
            }
        };

        if !payload.is_empty() {
            return Err(ProtocolError::malformed(format!(
                "{} trailing bytes after {} groups",
                payload.len(),
                capacity
            )));
        }

        Ok(message)
    }

    /// Writes the message's items into `state` in group order. Visibility
    /// is left alone.
    pub fn apply(&self, state: &mut EntityState) {
        match self {
            SyncMessage::Full { groups, .. } => {
                for (index, items) in groups.iter().enumerate() {
                    for (role, item) in SlotRole::ALL.iter().zip(items) {
                        state.set_item(index, *role, *item);
                    }
                }
            }
            SyncMessage::Role { role, items, .. } => state.set_role_items(*role, items),
        }
    }
}

fn read_item(payload: &mut &[u8], group: usize) -> Result<Item, ProtocolError> {
    bincode::deserialize_from(payload).map_err(|e| {
        ProtocolError::malformed(format!("group {}: {}", group, e))
    })
}
