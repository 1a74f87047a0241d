//! Simulation Loop
//!
//! The central state machine. A [`Simulation`] starts `Uninitialized`,
//! moves to `Running` once the physics world is created, and never goes
//! back. Each tick applies queued commands in arrival order, steps physics
//! by one fixed increment, syncs entity records from their bodies and then
//! runs autonomous behavior.
//!
//! Bad commands are rejected with a [`CommandError`], logged and skipped.
//! They never abort the tick for the commands around them.

use tracing::{debug, info};

use crate::config::{PhysicsConfig, ServerConfig};
use crate::core::math::{Quat, Vec3};
use crate::game::ai::plan_pursuit;
use crate::game::entity::{Entity, EntityId, EntityKind};
use crate::game::events::{EventOutbox, GameEvent};
use crate::game::physics::{PhysicsError, PhysicsWorld};
use crate::game::registry::{EntityRegistry, RegistryError};
use crate::game::snapshot::Snapshot;

// =============================================================================
// COMMANDS
// =============================================================================

/// A decoded intent, consumed exactly once by the simulation.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Create a player at the configured spawn position.
    Spawn {
        /// New player id
        id: EntityId,
    },

    /// Overwrite a player's velocity and rotation.
    Move {
        /// Target player
        id: EntityId,
        /// New linear velocity
        velocity: Vec3,
        /// New rotation (normalized on apply)
        rotation: Quat,
    },

    /// Create a server-controlled enemy. Never arrives from the bus.
    SpawnEnemy {
        /// New enemy id
        id: EntityId,
        /// Initial position
        position: Vec3,
    },
}

impl Command {
    /// Entity the command targets.
    pub fn entity_id(&self) -> &EntityId {
        match self {
            Command::Spawn { id } | Command::Move { id, .. } | Command::SpawnEnemy { id, .. } => id,
        }
    }
}

/// Why a command was ignored. None of these are surfaced to clients.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    /// No entity with this id.
    #[error("Unknown entity {0}")]
    UnknownEntity(EntityId),

    /// Spawn for an id that already exists.
    #[error("Entity {0} already spawned")]
    DuplicateSpawn(EntityId),

    /// Move for an entity whose kind does not accept client control.
    #[error("Entity {0} is not controllable")]
    NotControllable(EntityId),

    /// Velocity or position with NaN/infinite components.
    #[error("Non-finite vector for {0}")]
    NonFinite(EntityId),

    /// Rotation that cannot be normalized.
    #[error("Degenerate rotation for {0}")]
    DegenerateRotation(EntityId),
}

impl From<RegistryError> for CommandError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::DuplicateId(id) => CommandError::DuplicateSpawn(id),
        }
    }
}

/// Simulation lifecycle errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SimulationError {
    /// Tick requested before the physics world exists.
    #[error("Simulation not initialized")]
    NotInitialized,

    /// `initialize` called on a running simulation.
    #[error("Simulation already initialized")]
    AlreadyInitialized,

    /// Physics world could not be created.
    #[error("Physics initialization failed: {0}")]
    Physics(#[from] PhysicsError),
}

// =============================================================================
// STATE
// =============================================================================

/// Everything that exists only once physics is up.
struct World {
    physics: PhysicsWorld,
    registry: EntityRegistry,
}

enum SimulationState {
    Uninitialized,
    Running(Box<World>),
}

/// Result of a tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickResult {
    /// Tick number just completed (first tick is 1)
    pub tick: u64,
    /// Commands applied this tick
    pub applied: usize,
    /// Commands ignored this tick
    pub ignored: usize,
}

/// Running totals.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimulationStats {
    /// Completed ticks
    pub tick: u64,
    /// Entities in the registry
    pub entities: usize,
    /// Commands applied since start
    pub applied_commands: u64,
    /// Commands ignored since start
    pub ignored_commands: u64,
}

/// The authoritative simulation.
pub struct Simulation {
    physics_config: PhysicsConfig,
    enemy_speed: f32,
    dt: f32,
    state: SimulationState,
    outbox: EventOutbox,
    stats: SimulationStats,
}

impl Simulation {
    /// Create an uninitialized simulation.
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            physics_config: config.physics.clone(),
            enemy_speed: config.entities.enemy_speed,
            dt: config.fixed_dt(),
            state: SimulationState::Uninitialized,
            outbox: EventOutbox::new(),
            stats: SimulationStats::default(),
        }
    }

    /// Create the physics world and start running.
    ///
    /// This is the only transition. A failure is fatal for the caller.
    pub fn initialize(&mut self) -> Result<(), SimulationError> {
        if self.is_running() {
            return Err(SimulationError::AlreadyInitialized);
        }

        let physics = PhysicsWorld::new(&self.physics_config)?;
        self.state = SimulationState::Running(Box::new(World {
            physics,
            registry: EntityRegistry::new(),
        }));

        info!("Simulation running (dt = {:.5}s)", self.dt);
        Ok(())
    }

    /// True once initialized.
    pub fn is_running(&self) -> bool {
        matches!(self.state, SimulationState::Running(_))
    }

    /// Fixed step size in seconds.
    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// Run one tick with the commands received since the previous one.
    pub fn tick<I>(&mut self, commands: I) -> Result<TickResult, SimulationError>
    where
        I: IntoIterator<Item = Command>,
    {
        let SimulationState::Running(world) = &mut self.state else {
            return Err(SimulationError::NotInitialized);
        };

        let mut result = TickResult::default();

        // 1. Apply commands in arrival order
        for command in commands {
            #[cfg(feature = "debug-tracing")]
            tracing::trace!(?command, "apply");

            match world.apply(command, &self.physics_config, &mut self.outbox) {
                Ok(()) => result.applied += 1,
                Err(err) => {
                    debug!("Ignored command: {}", err);
                    result.ignored += 1;
                }
            }
        }

        // 2. Fixed step
        world.physics.step(self.dt);

        // 3. Pull body state into entity records
        world.sync_from_physics();

        // 4. Autonomous behavior
        world.run_pursuit(self.enemy_speed);

        self.stats.tick += 1;
        self.stats.entities = world.registry.len();
        self.stats.applied_commands += result.applied as u64;
        self.stats.ignored_commands += result.ignored as u64;
        result.tick = self.stats.tick;

        Ok(result)
    }

    /// Take every event produced since the last flush.
    pub fn flush_events(&mut self) -> Vec<GameEvent> {
        self.outbox.flush()
    }

    /// Full state of every entity. Empty before initialization.
    pub fn snapshot(&self) -> Snapshot {
        match &self.state {
            SimulationState::Running(world) => Snapshot::capture(self.stats.tick, &world.registry),
            SimulationState::Uninitialized => Snapshot::default(),
        }
    }

    /// Registry, once running.
    pub fn registry(&self) -> Option<&EntityRegistry> {
        match &self.state {
            SimulationState::Running(world) => Some(&world.registry),
            SimulationState::Uninitialized => None,
        }
    }

    /// Running totals.
    pub fn stats(&self) -> SimulationStats {
        self.stats
    }
}

impl World {
    fn apply(
        &mut self,
        command: Command,
        config: &PhysicsConfig,
        outbox: &mut EventOutbox,
    ) -> Result<(), CommandError> {
        match command {
            Command::Spawn { id } => {
                self.spawn(id.clone(), EntityKind::Player, config.spawn_position)?;
                info!("Player {} spawned", id);
                outbox.push(GameEvent::PlayerSpawned { id });
            }

            Command::SpawnEnemy { id, position } => {
                if !position.is_finite() {
                    return Err(CommandError::NonFinite(id));
                }
                self.spawn(id.clone(), EntityKind::Enemy, position)?;
                info!("Enemy {} spawned at {:?}", id, position);
            }

            Command::Move { id, velocity, rotation } => {
                let entity = self
                    .registry
                    .get_mut(&id)
                    .ok_or_else(|| CommandError::UnknownEntity(id.clone()))?;

                if !entity.capabilities().controllable {
                    return Err(CommandError::NotControllable(id));
                }
                if !velocity.is_finite() {
                    return Err(CommandError::NonFinite(id));
                }
                if !rotation.is_valid_rotation() {
                    return Err(CommandError::DegenerateRotation(id));
                }

                self.physics.set_linear_velocity(entity.body, velocity);
                self.physics.set_rotation(entity.body, rotation);

                entity.velocity = velocity;
                if let Some(t) = self.physics.transform(entity.body) {
                    entity.rotation = t.rotation;
                }

                outbox.push(GameEvent::PlayerMoved {
                    id,
                    velocity,
                    rotation: entity.rotation,
                });
            }
        }

        Ok(())
    }

    fn spawn(&mut self, id: EntityId, kind: EntityKind, position: Vec3) -> Result<(), CommandError> {
        // Check first so a duplicate never creates an orphan body
        if self.registry.contains(&id) {
            return Err(CommandError::DuplicateSpawn(id));
        }

        let body = self.physics.create_body(position);
        self.registry.spawn(Entity::new(id, kind, position, body))?;
        Ok(())
    }

    fn sync_from_physics(&mut self) {
        for entity in self.registry.iter_mut() {
            if let Some(t) = self.physics.transform(entity.body) {
                entity.position = t.position;
                entity.rotation = t.rotation;
            }
            if let Some(v) = self.physics.linear_velocity(entity.body) {
                entity.velocity = v;
            }
        }
    }

    fn run_pursuit(&mut self, speed: f32) {
        for step in plan_pursuit(&self.registry, speed) {
            let Some(entity) = self.registry.at(step.slot) else {
                continue;
            };
            let body = entity.body;
            let id = entity.id.clone();

            self.physics.set_linear_velocity(body, step.velocity);
            if let Some(rotation) = step.rotation {
                self.physics.set_rotation(body, rotation);
            }

            if let Some(entity) = self.registry.get_mut(&id) {
                entity.velocity = step.velocity;
                if let Some(rotation) = step.rotation {
                    entity.rotation = rotation;
                }
            }
        }
    }
}

/// Run a fresh simulation over per-tick command batches and return the
/// final snapshot plus every event produced.
pub fn replay(
    config: &ServerConfig,
    ticks: Vec<Vec<Command>>,
) -> Result<(Snapshot, Vec<GameEvent>), SimulationError> {
    let mut sim = Simulation::new(config);
    sim.initialize()?;

    let mut events = Vec::new();
    for commands in ticks {
        sim.tick(commands)?;
        events.extend(sim.flush_events());
    }

    Ok((sim.snapshot(), events))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> Simulation {
        let mut sim = Simulation::new(&ServerConfig::default());
        sim.initialize().unwrap();
        sim
    }

    fn spawn(id: &str) -> Command {
        Command::Spawn { id: id.into() }
    }

    fn move_x(id: &str) -> Command {
        Command::Move {
            id: id.into(),
            velocity: Vec3::new(1.0, 0.0, 0.0),
            rotation: Quat::IDENTITY,
        }
    }

    #[test]
    fn test_tick_before_initialize_fails() {
        let mut sim = Simulation::new(&ServerConfig::default());
        assert!(!sim.is_running());
        assert!(matches!(sim.tick(Vec::new()), Err(SimulationError::NotInitialized)));
        assert!(sim.snapshot().is_empty());
        assert!(sim.registry().is_none());
    }

    #[test]
    fn test_initialize_is_one_way() {
        let mut sim = running();
        assert!(sim.is_running());
        assert!(matches!(sim.initialize(), Err(SimulationError::AlreadyInitialized)));
        assert!(sim.is_running());
    }

    #[test]
    fn test_bad_physics_config_is_fatal() {
        let mut config = ServerConfig::default();
        config.physics.mass = -1.0;
        let mut sim = Simulation::new(&config);
        assert!(matches!(sim.initialize(), Err(SimulationError::Physics(_))));
        assert!(!sim.is_running());
    }

    #[test]
    fn test_spawn_is_idempotent() {
        let mut sim = running();
        let result = sim.tick(vec![spawn("p1"), spawn("p1")]).unwrap();

        assert_eq!(result.applied, 1);
        assert_eq!(result.ignored, 1);
        assert_eq!(sim.registry().unwrap().len(), 1);
        assert!(sim.registry().unwrap().is_consistent());
        assert_eq!(sim.flush_events(), vec![GameEvent::PlayerSpawned { id: "p1".into() }]);
    }

    #[test]
    fn test_move_unknown_entity_is_noop() {
        let mut sim = running();
        let result = sim.tick(vec![move_x("ghost")]).unwrap();

        assert_eq!(result.ignored, 1);
        assert!(sim.registry().unwrap().is_empty());
        assert!(sim.flush_events().is_empty());
    }

    #[test]
    fn test_bad_command_does_not_abort_tick() {
        let mut sim = running();
        let bad_rotation = Command::Move {
            id: "p1".into(),
            velocity: Vec3::ZERO,
            rotation: Quat::new(0.0, 0.0, 0.0, 0.0),
        };
        let bad_velocity = Command::Move {
            id: "p1".into(),
            velocity: Vec3::new(f32::NAN, 0.0, 0.0),
            rotation: Quat::IDENTITY,
        };

        let result = sim
            .tick(vec![spawn("p1"), bad_rotation, bad_velocity, spawn("p2")])
            .unwrap();

        assert_eq!(result.applied, 2);
        assert_eq!(result.ignored, 2);
        assert_eq!(sim.flush_events().len(), 2);
    }

    #[test]
    fn test_spawn_then_move_sequence() {
        let mut sim = running();
        sim.tick(vec![spawn("p1")]).unwrap();
        sim.tick(vec![move_x("p1")]).unwrap();

        let events = sim.flush_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], GameEvent::PlayerSpawned { id: "p1".into() });
        match &events[1] {
            GameEvent::PlayerMoved { id, velocity, rotation } => {
                assert_eq!(id.as_str(), "p1");
                assert_eq!(*velocity, Vec3::new(1.0, 0.0, 0.0));
                assert_eq!(*rotation, Quat::IDENTITY);
            }
            other => panic!("unexpected event {:?}", other),
        }

        for _ in 0..20 {
            sim.tick(Vec::new()).unwrap();
        }

        let snapshot = sim.snapshot();
        assert_eq!(snapshot.len(), 1);
        let p1 = snapshot.get("p1").unwrap();
        assert!((p1.velocity.x - 1.0).abs() < 1e-2, "vx = {}", p1.velocity.x);
        assert!(p1.velocity.z.abs() < 1e-2);
        assert!(p1.position.x > 0.0);
    }

    #[test]
    fn test_snapshot_matches_registry() {
        let mut sim = running();
        sim.tick(Vec::new()).unwrap();
        assert!(sim.snapshot().is_empty());

        sim.tick(vec![spawn("a"), spawn("b")]).unwrap();
        let snapshot = sim.snapshot();
        let registry = sim.registry().unwrap();

        assert_eq!(snapshot.len(), registry.len());
        for (snap, entity) in snapshot.entities.iter().zip(registry.iter()) {
            assert_eq!(snap.id, entity.id);
            assert_eq!(snap.position, entity.position);
            assert_eq!(snap.velocity, entity.velocity);
        }
    }

    #[test]
    fn test_n_ticks_equal_n_physics_steps() {
        let config = ServerConfig::default();
        let mut sim = running();

        // Reference world fed the same calls in the same order
        let mut world = PhysicsWorld::new(&config.physics).unwrap();

        sim.tick(vec![spawn("p1")]).unwrap();
        let body = world.create_body(config.physics.spawn_position);
        world.step(sim.dt());

        sim.tick(vec![move_x("p1")]).unwrap();
        world.set_linear_velocity(body, Vec3::new(1.0, 0.0, 0.0));
        world.set_rotation(body, Quat::IDENTITY);
        world.step(sim.dt());

        for _ in 0..120 {
            sim.tick(Vec::new()).unwrap();
            world.step(sim.dt());
        }

        let snapshot = sim.snapshot();
        let p1 = snapshot.get("p1").unwrap();
        let expected = world.transform(body).unwrap();
        assert_eq!(p1.position, expected.position);
        assert_eq!(p1.rotation, expected.rotation);
        assert_eq!(p1.velocity, world.linear_velocity(body).unwrap());
    }

    #[test]
    fn test_replay_is_deterministic() {
        let config = ServerConfig::default();
        let ticks = || {
            vec![
                vec![spawn("p1"), spawn("p2")],
                vec![move_x("p1")],
                vec![Command::SpawnEnemy { id: "e1".into(), position: Vec3::new(5.0, 0.5, 5.0) }],
                Vec::new(),
                vec![Command::Move {
                    id: "p2".into(),
                    velocity: Vec3::new(0.0, 0.0, -2.0),
                    rotation: Quat::from_yaw(3.0),
                }],
            ]
            .into_iter()
            .chain(std::iter::repeat_with(Vec::new).take(200))
            .collect::<Vec<_>>()
        };

        let (snap1, events1) = replay(&config, ticks()).unwrap();
        let (snap2, events2) = replay(&config, ticks()).unwrap();

        assert_eq!(snap1, snap2);
        assert_eq!(events1, events2);
        assert_eq!(snap1.len(), 3);
    }

    #[test]
    fn test_enemy_pursues_player() {
        let mut sim = running();
        sim.tick(vec![
            spawn("p1"),
            Command::SpawnEnemy { id: "e1".into(), position: Vec3::new(0.0, 0.5, 10.0) },
        ])
        .unwrap();

        // Enemy spawn emits nothing on the wire
        assert_eq!(sim.flush_events().len(), 1);

        let start = sim.snapshot().get("e1").unwrap().position.z;
        for _ in 0..60 {
            sim.tick(Vec::new()).unwrap();
        }

        let snapshot = sim.snapshot();
        let e1 = snapshot.get("e1").unwrap();
        assert!(e1.position.z < start, "enemy did not approach: z = {}", e1.position.z);
        assert!(e1.velocity.z < 0.0);
    }

    #[test]
    fn test_enemy_not_controllable() {
        let mut sim = running();
        let result = sim
            .tick(vec![
                Command::SpawnEnemy { id: "e1".into(), position: Vec3::new(0.0, 0.5, 0.0) },
                move_x("e1"),
            ])
            .unwrap();

        assert_eq!(result.ignored, 1);
        assert!(sim.flush_events().is_empty());
    }

    #[test]
    fn test_stats() {
        let mut sim = running();
        sim.tick(vec![spawn("a"), spawn("a"), move_x("zzz")]).unwrap();
        sim.tick(vec![move_x("a")]).unwrap();

        let stats = sim.stats();
        assert_eq!(stats.tick, 2);
        assert_eq!(stats.entities, 1);
        assert_eq!(stats.applied_commands, 2);
        assert_eq!(stats.ignored_commands, 2);
    }
}
