//! Entity Model
//!
//! Plain data records for simulated objects. Behavior is selected from the
//! capability table of an entity's [`EntityKind`], never from its type.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::math::{Quat, Vec3};
use crate::game::physics::BodyHandle;

// =============================================================================
// ENTITY ID
// =============================================================================

/// Stable unique entity identifier, assigned by the spawner and never reused.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Create from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// KIND + CAPABILITIES
// =============================================================================

/// What an entity is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Client-controlled player.
    Player,
    /// Server-controlled enemy.
    Enemy,
}

/// Behaviors an entity participates in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Accepts `Move` commands from clients.
    pub controllable: bool,
    /// Chases the nearest pursuit target every tick.
    pub pursues_players: bool,
    /// Can be chased by pursuers.
    pub pursuit_target: bool,
}

const PLAYER_CAPABILITIES: Capabilities = Capabilities {
    controllable: true,
    pursues_players: false,
    pursuit_target: true,
};

const ENEMY_CAPABILITIES: Capabilities = Capabilities {
    controllable: false,
    pursues_players: true,
    pursuit_target: false,
};

impl EntityKind {
    /// Capability row for this kind.
    #[inline]
    pub const fn capabilities(self) -> Capabilities {
        match self {
            EntityKind::Player => PLAYER_CAPABILITIES,
            EntityKind::Enemy => ENEMY_CAPABILITIES,
        }
    }
}

// =============================================================================
// ENTITY
// =============================================================================

/// A simulated object. Exactly one physics body per entity.
#[derive(Clone, Debug)]
pub struct Entity {
    /// Unique id
    pub id: EntityId,
    /// Kind (selects capabilities)
    pub kind: EntityKind,
    /// Position as of the last physics sync
    pub position: Vec3,
    /// Linear velocity as of the last sync or command
    pub velocity: Vec3,
    /// Unit rotation quaternion
    pub rotation: Quat,
    /// Owning physics body
    pub body: BodyHandle,
}

impl Entity {
    /// Create a resting entity for an existing body.
    pub fn new(id: EntityId, kind: EntityKind, position: Vec3, body: BodyHandle) -> Self {
        Self {
            id,
            kind,
            position,
            velocity: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            body,
        }
    }

    /// Capability row of this entity's kind.
    #[inline]
    pub fn capabilities(&self) -> Capabilities {
        self.kind.capabilities()
    }
}
