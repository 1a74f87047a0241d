//! Game Logic Module
//!
//! Everything owned by the simulation task. Nothing in here performs I/O.
//!
//! ## Module Structure
//!
//! - `entity`: Entity records, kinds and capability table
//! - `physics`: Rigid-body world adapter
//! - `registry`: Authoritative entity storage
//! - `events`: Discrete events and the outbox
//! - `snapshot`: Full-state captures
//! - `ai`: Autonomous pursuit behavior
//! - `tick`: Simulation state machine

pub mod entity;
pub mod physics;
pub mod registry;
pub mod events;
pub mod snapshot;
pub mod ai;
pub mod tick;

// Re-export key types
pub use entity::{Entity, EntityId, EntityKind, Capabilities};
pub use physics::{PhysicsWorld, PhysicsError, BodyHandle};
pub use registry::EntityRegistry;
pub use events::{GameEvent, EventOutbox};
pub use snapshot::{Snapshot, EntitySnapshot};
pub use tick::{Simulation, Command, CommandError, SimulationError, SimulationStats, TickResult};
