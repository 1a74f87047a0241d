//! Server Configuration
//!
//! Layered configuration: built-in defaults, then an optional TOML file,
//! then `ARENA_*` environment variables (nested keys use `__`, e.g.
//! `ARENA_BUS__ENDPOINT`).

use std::path::Path;
use std::time::Duration;
use serde::{Serialize, Deserialize};

use crate::core::math::Vec3;

/// Highest accepted tick rate (Hz).
pub const MAX_TICK_RATE_HZ: u32 = 10_000;

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Simulation tick rate (Hz). Physics steps by `1 / tick_rate_hz`.
    pub tick_rate_hz: u32,
    /// Event outbox flush period (milliseconds).
    pub event_flush_ms: u64,
    /// Full-state snapshot period (milliseconds).
    pub snapshot_ms: u64,
    /// Bus connection settings.
    pub bus: BusConfig,
    /// Queue sizing between simulation and bridge.
    pub queues: QueueConfig,
    /// Physics world settings.
    pub physics: PhysicsConfig,
    /// Entity behavior settings.
    pub entities: EntityConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: crate::TICK_RATE,
            event_flush_ms: 50,
            snapshot_ms: 250,
            bus: BusConfig::default(),
            queues: QueueConfig::default(),
            physics: PhysicsConfig::default(),
            entities: EntityConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from defaults, an optional file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: ServerConfig = builder
            .add_source(
                config::Environment::with_prefix("ARENA")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check values that would make the timers or queues unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate_hz == 0 || self.tick_rate_hz > MAX_TICK_RATE_HZ {
            return Err(ConfigError::Invalid(format!(
                "tick_rate_hz must be in 1..={}",
                MAX_TICK_RATE_HZ
            )));
        }
        if self.event_flush_ms == 0 || self.snapshot_ms == 0 {
            return Err(ConfigError::Invalid("flush and snapshot periods must be > 0".into()));
        }
        if self.queues.inbound_capacity == 0 || self.queues.outbound_capacity == 0 {
            return Err(ConfigError::Invalid("queue capacities must be > 0".into()));
        }
        Ok(())
    }

    /// Fixed simulation timestep in seconds.
    pub fn fixed_dt(&self) -> f32 {
        1.0 / self.tick_rate_hz as f32
    }

    /// Wall-clock period of the tick timer.
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz as f64)
    }

    /// Wall-clock period of the event flush timer.
    pub fn event_flush_period(&self) -> Duration {
        Duration::from_millis(self.event_flush_ms)
    }

    /// Wall-clock period of the snapshot timer.
    pub fn snapshot_period(&self) -> Duration {
        Duration::from_millis(self.snapshot_ms)
    }
}

/// Bus endpoint and subjects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// NATS endpoint.
    pub endpoint: String,
    /// Subject carrying client commands.
    pub inbound_subject: String,
    /// Subject carrying server events and snapshots.
    pub outbound_subject: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            endpoint: "nats://localhost:4222".into(),
            inbound_subject: "client-events".into(),
            outbound_subject: "server-events".into(),
        }
    }
}

/// What the bridge does when the inbound command queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest queued command to make room.
    #[default]
    DropOldest,
    /// Discard the incoming command.
    DropNewest,
    /// Hold the bridge until the simulation drains the queue.
    Block,
}

/// Capacities of the in-process queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Inbound (bridge → simulation) command capacity.
    pub inbound_capacity: usize,
    /// Outbound (simulation → bridge) batch capacity.
    pub outbound_capacity: usize,
    /// Inbound overflow policy.
    pub overflow: OverflowPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: 4096,
            outbound_capacity: 256,
            overflow: OverflowPolicy::DropOldest,
        }
    }
}

/// Static physics world configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// World gravity.
    pub gravity: Vec3,
    /// Half-extents of the ground cuboid. Its top face sits at y = 0.
    pub ground_half_extents: Vec3,
    /// Where player bodies are created.
    pub spawn_position: Vec3,
    /// Half-extents of every entity's cuboid collider.
    pub body_half_extents: Vec3,
    /// Mass of every entity body.
    pub mass: f32,
    /// Friction of entity colliders (combined with `Min`).
    pub friction: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            ground_half_extents: Vec3::new(200.0, 0.1, 200.0),
            spawn_position: Vec3::new(0.0, 0.5, 0.0),
            body_half_extents: Vec3::new(0.5, 0.5, 0.5),
            mass: 1.0,
            friction: 0.0,
        }
    }
}

/// An enemy created when the server starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnemySpawn {
    /// Entity id.
    pub id: String,
    /// Initial position.
    pub position: Vec3,
}

/// Entity behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityConfig {
    /// Horizontal pursuit speed of enemies.
    pub enemy_speed: f32,
    /// Enemies seeded before the first tick.
    pub enemies: Vec<EnemySpawn>,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            enemy_speed: 3.0,
            enemies: Vec::new(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Source could not be read or deserialized.
    #[error("Failed to load config: {0}")]
    Load(#[from] config::ConfigError),

    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}
