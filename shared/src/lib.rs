//! Shared types for slot replication between the host and its peers.
//!
//! Everything both sides need to agree on lives here: the slot data model,
//! change detection, the sync frame codec and the per-session protocol state
//! machine, plus the session-level [`Packet`] that carries sync frames over UDP.

use serde::{Deserialize, Serialize};

pub mod config;
pub mod diff;
pub mod error;
pub mod item;
pub mod message;
pub mod protocol;
pub mod slot;
pub mod state;

pub use config::{clamp_capacity, SessionConfig};
pub use diff::{apply_deltas, changed_roles, diff, ChangeDetector, SlotDelta};
pub use error::ProtocolError;
pub use item::Item;
pub use message::{MessageKind, SyncMessage};
pub use protocol::{MirrorStatus, Outbound, Role, SyncProtocol, Target};
pub use slot::{Slot, SlotGroup, SlotRole};
pub use state::{EntityState, PersistedState, PersistedValue};

/// Identifies an entity on the wire. One byte, as in the sync frame header.
pub type PeerId = u8;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MIN_CAPACITY: u8 = 0;
pub const MAX_CAPACITY: u8 = 10;
pub const DEFAULT_PERSIST_PREFIX: &str = "slotsync";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
        capacity: u8,
    },
    Sync {
        frame: Vec<u8>,
    },
    Heartbeat,
    Disconnect,

    Connected {
        client_id: PeerId,
        capacity: u8,
    },
    PeerLeft {
        client_id: PeerId,
    },
    Disconnected {
        reason: String,
    },
}

impl Packet {
    /// Wraps an encoded sync message for transport.
    pub fn sync(message: &SyncMessage) -> Result<Self, ProtocolError> {
        Ok(Packet::Sync {
            frame: message.encode()?,
        })
    }
}
