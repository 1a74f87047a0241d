//! Game Events
//!
//! Discrete state changes produced while applying commands, and the outbox
//! that batches them between flushes.

use crate::core::math::{Quat, Vec3};
use crate::game::entity::EntityId;

/// A discrete state change, mirroring the command that caused it.
#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    /// A player entity was created.
    PlayerSpawned {
        /// Spawned entity
        id: EntityId,
    },

    /// A player's velocity and rotation were overwritten.
    PlayerMoved {
        /// Moved entity
        id: EntityId,
        /// New linear velocity
        velocity: Vec3,
        /// New rotation
        rotation: Quat,
    },
}

/// Ordered, append-only event queue, emptied on flush.
///
/// Appends and flushes happen on the simulation task, so a flush takes
/// exactly the events appended before it and nothing is lost between
/// windows.
#[derive(Debug, Default)]
pub struct EventOutbox {
    events: Vec<GameEvent>,
}

impl EventOutbox {
    /// Create an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn push(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Take every pending event in append order, leaving the outbox empty.
    pub fn flush(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
