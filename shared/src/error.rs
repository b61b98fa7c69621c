use crate::PeerId;
use thiserror::Error;

/// Errors raised while decoding or applying a single sync message.
///
/// None of these end a session. The message is logged and dropped, except
/// for [`ProtocolError::CapacityMismatch`], which rejects a join.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown message kind {0}")]
    UnknownMessageKind(u8),

    #[error("malformed payload: {reason}")]
    MalformedPayload { reason: String },

    #[error("capacity mismatch: local {local}, remote {remote}")]
    CapacityMismatch { local: usize, remote: usize },

    #[error("peer {sender} sent an update for entity {entity}")]
    ForeignEntity { entity: PeerId, sender: PeerId },

    #[error("no replica for entity {0}")]
    UnknownEntity(PeerId),

    #[error("item codec error: {0}")]
    Codec(#[from] bincode::Error),
}

impl ProtocolError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        ProtocolError::MalformedPayload {
            reason: reason.into(),
        }
    }
}
