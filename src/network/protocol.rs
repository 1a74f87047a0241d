//! Protocol Messages
//!
//! JSON wire format on the bus. Every message is a tagged envelope
//! `{"type": <u8>, "data": {...}}`:
//!
//! | type | direction | data |
//! |------|-----------|------|
//! | 0 | both | `{id}` (spawn / player spawned) |
//! | 1 | both | `{id, velocity, rotation}` (move / player moved) |
//! | 2 | server → client | `{entities: [{id, position, velocity, rotation}]}` |
//!
//! One inbound bus message carries one command. One outbound event message
//! carries a whole flush as a JSON array of envelopes.

use serde::{Serialize, Deserialize};

use crate::core::math::{Quat, Vec3};
use crate::game::entity::EntityId;
use crate::game::events::GameEvent;
use crate::game::snapshot::Snapshot;
use crate::game::tick::Command;

// =============================================================================
// MESSAGE TYPES
// =============================================================================

/// Envelope type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Spawn command / PlayerSpawned event
    Spawn = 0,
    /// Move command / PlayerMoved event
    Move = 1,
    /// Full-state snapshot (outbound only)
    Snapshot = 2,
}

impl TryFrom<u8> for MessageType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageType::Spawn),
            1 => Ok(MessageType::Move),
            2 => Ok(MessageType::Snapshot),
            other => Err(ProtocolError::UnknownType(other)),
        }
    }
}

/// Wire decoding/encoding errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Payload is not valid JSON or has no envelope.
    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),

    /// Envelope `type` is not a known tag.
    #[error("Unknown message type {0}")]
    UnknownType(u8),

    /// Known tag that clients may not send.
    #[error("Message type {0:?} is not accepted from clients")]
    NotInbound(MessageType),

    /// `data` does not match the tag.
    #[error("Invalid {kind:?} payload: {source}")]
    InvalidPayload {
        /// Envelope tag
        kind: MessageType,
        /// Underlying decode error
        source: serde_json::Error,
    },
}

// =============================================================================
// CLIENT -> SERVER
// =============================================================================

#[derive(Deserialize)]
struct InboundEnvelope {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct SpawnData {
    id: EntityId,
}

#[derive(Serialize, Deserialize)]
struct MoveData {
    id: EntityId,
    velocity: Vec3,
    rotation: Quat,
}

/// Decode one inbound bus message into a command.
pub fn decode_command(payload: &[u8]) -> Result<Command, ProtocolError> {
    let envelope: InboundEnvelope = serde_json::from_slice(payload)?;
    let kind = MessageType::try_from(envelope.kind)?;

    let invalid = |source| ProtocolError::InvalidPayload { kind, source };

    match kind {
        MessageType::Spawn => {
            let data: SpawnData = serde_json::from_value(envelope.data).map_err(invalid)?;
            Ok(Command::Spawn { id: data.id })
        }
        MessageType::Move => {
            let data: MoveData = serde_json::from_value(envelope.data).map_err(invalid)?;
            Ok(Command::Move {
                id: data.id,
                velocity: data.velocity,
                rotation: data.rotation,
            })
        }
        MessageType::Snapshot => Err(ProtocolError::NotInbound(kind)),
    }
}

// =============================================================================
// SERVER -> CLIENT
// =============================================================================

#[derive(Serialize)]
struct OutboundEnvelope<T: Serialize> {
    #[serde(rename = "type")]
    kind: u8,
    data: T,
}

impl Serialize for GameEvent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            GameEvent::PlayerSpawned { id } => OutboundEnvelope {
                kind: MessageType::Spawn as u8,
                data: SpawnData { id: id.clone() },
            }
            .serialize(serializer),
            GameEvent::PlayerMoved { id, velocity, rotation } => OutboundEnvelope {
                kind: MessageType::Move as u8,
                data: MoveData {
                    id: id.clone(),
                    velocity: *velocity,
                    rotation: *rotation,
                },
            }
            .serialize(serializer),
        }
    }
}

/// Encode one flush as a JSON array of event envelopes.
pub fn encode_events(events: &[GameEvent]) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(events)?)
}

/// Encode a snapshot envelope.
pub fn encode_snapshot(snapshot: &Snapshot) -> Result<Vec<u8>, ProtocolError> {
    let envelope = OutboundEnvelope {
        kind: MessageType::Snapshot as u8,
        data: snapshot,
    };
    Ok(serde_json::to_vec(&envelope)?)
}
