//! Entity Registry
//!
//! Dense, insertion-ordered entity storage plus an id→slot index.
//! Mutated only by the simulation; everything else gets shared borrows.
//!
//! Iteration is in slot (insertion) order so anything that depends on it,
//! such as nearest-target search, replays identically for the same
//! command sequence.

use std::collections::HashMap;

use crate::game::entity::{Entity, EntityId};

/// Registry errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// An entity with this id already exists.
    #[error("Entity {0} already exists")]
    DuplicateId(EntityId),
}

/// Authoritative list of entities.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: Vec<Entity>,
    index: HashMap<EntityId, usize>,
}

impl EntityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entity. Returns its slot.
    pub fn spawn(&mut self, entity: Entity) -> Result<usize, RegistryError> {
        if self.index.contains_key(&entity.id) {
            return Err(RegistryError::DuplicateId(entity.id));
        }

        let slot = self.entities.len();
        self.index.insert(entity.id.clone(), slot);
        self.entities.push(entity);
        Ok(slot)
    }

    /// Look up an entity by id.
    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.index.get(id).map(|&slot| &self.entities[slot])
    }

    /// Mutable lookup by id.
    pub(crate) fn get_mut(&mut self, id: &EntityId) -> Option<&mut Entity> {
        let slot = *self.index.get(id)?;
        self.entities.get_mut(slot)
    }

    /// True if the id is present.
    pub fn contains(&self, id: &EntityId) -> bool {
        self.index.contains_key(id)
    }

    /// Slot of an id.
    pub fn slot_of(&self, id: &EntityId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Entity in a slot.
    pub fn at(&self, slot: usize) -> Option<&Entity> {
        self.entities.get(slot)
    }

    /// Visit every entity in slot order.
    pub fn for_each(&self, f: impl FnMut(&Entity)) {
        self.entities.iter().for_each(f);
    }

    /// Iterate in slot order.
    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.entities.iter()
    }

    /// Mutable iteration in slot order.
    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Entity> {
        self.entities.iter_mut()
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True if no entities exist.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Check that the index and the dense list agree.
    pub fn is_consistent(&self) -> bool {
        self.index.len() == self.entities.len()
            && self
                .index
                .iter()
                .all(|(id, &slot)| self.entities.get(slot).map(|e| &e.id) == Some(id))
    }
}
