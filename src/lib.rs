//! # Arena Game Server
//!
//! Authoritative multiplayer simulation bridged to a pub/sub bus.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ARENA SERVER                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/            - Value types                              │
//! │  └── math.rs      - Vec3 / Quat                              │
//! │                                                              │
//! │  game/            - Simulation (single task, no I/O)         │
//! │  ├── entity.rs    - Entity records, kinds, capabilities      │
//! │  ├── physics.rs   - rapier3d world adapter                   │
//! │  ├── registry.rs  - Authoritative entity storage             │
//! │  ├── events.rs    - Discrete events + outbox                 │
//! │  ├── snapshot.rs  - Full-state captures                      │
//! │  ├── ai.rs        - Enemy pursuit                            │
//! │  └── tick.rs      - Fixed-tick state machine                 │
//! │                                                              │
//! │  network/         - Bus I/O (bridge thread)                  │
//! │  ├── protocol.rs  - JSON wire codec                          │
//! │  ├── bus.rs       - NATS / in-process bus                    │
//! │  ├── bridge.rs    - Transport bridge + queues                │
//! │  └── server.rs    - Timers, supervisor, shutdown             │
//! │                                                              │
//! │  config.rs        - Layered configuration                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! client-events ─► bridge ─► [commands] ─► tick ─► outbox ─┐
//!                                            │             │ flush timer
//!                                            └─► snapshot ─┤ snapshot timer
//! server-events ◄─ bridge ◄─ [outbound] ◄──────────────────┘
//! ```
//!
//! The simulation steps physics by a fixed `1 / tick_rate_hz` every tick,
//! so identical command sequences produce identical state.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod config;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use crate::core::math::{Quat, Vec3};
pub use crate::config::ServerConfig;
pub use crate::game::tick::{Command, Simulation};
pub use crate::game::events::GameEvent;
pub use crate::game::snapshot::Snapshot;
pub use crate::network::{BusConnector, GameServer, MemoryBus};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default simulation tick rate (Hz)
pub const TICK_RATE: u32 = 144;
