//! Full-State Snapshots
//!
//! A snapshot is every entity in the registry at one instant, in registry
//! order. It is never partial and is built even when nothing changed, so
//! clients that lost event batches can resynchronize.

use serde::{Serialize, Deserialize};

use crate::core::math::{Quat, Vec3};
use crate::game::entity::{Entity, EntityId};
use crate::game::registry::EntityRegistry;

/// State of one entity inside a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Entity id
    pub id: EntityId,
    /// Position
    pub position: Vec3,
    /// Linear velocity
    pub velocity: Vec3,
    /// Rotation
    pub rotation: Quat,
}

impl From<&Entity> for EntitySnapshot {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id.clone(),
            position: entity.position,
            velocity: entity.velocity,
            rotation: entity.rotation,
        }
    }
}

/// Every entity at one tick.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Tick the snapshot was taken after
    #[serde(skip)]
    pub tick: u64,
    /// Entities in registry order
    pub entities: Vec<EntitySnapshot>,
}

impl Snapshot {
    /// Capture the whole registry.
    pub fn capture(tick: u64, registry: &EntityRegistry) -> Self {
        let mut entities = Vec::with_capacity(registry.len());
        registry.for_each(|e| entities.push(EntitySnapshot::from(e)));
        Self { tick, entities }
    }

    /// Find an entity by id.
    pub fn get(&self, id: &str) -> Option<&EntitySnapshot> {
        self.entities.iter().find(|e| e.id.as_str() == id)
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True for a zero-entity snapshot.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
