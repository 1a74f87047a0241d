//! Game Server
//!
//! Process supervisor. Owns the simulation task and the transport bridge,
//! drives the three fixed-rate timers and handles shutdown.
//!
//! All simulation state lives on one task, so ticks, flushes and snapshots
//! are serialized by the `select!` loop without locks.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ConfigError, ServerConfig};
use crate::game::entity::EntityId;
use crate::game::tick::{Command, Simulation, SimulationError};
use crate::network::bridge::{self, BridgeConfig, Outbound};
use crate::network::bus::BusConnector;

/// How long startup waits for the bridge before ticking without it.
const BRIDGE_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Seconds between tick summaries in the log.
const STATS_INTERVAL_SECS: u64 = 10;

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Configuration is unusable.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Simulation could not start.
    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),

    /// Bridge thread could not be spawned.
    #[error("Failed to spawn bridge: {0}")]
    Bridge(#[from] std::io::Error),
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Shutdown latch. Stays set once raised.
    shutdown_tx: watch::Sender<bool>,
    /// Set once the first tick is about to run.
    started_tx: watch::Sender<bool>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (started_tx, _) = watch::channel(false);

        Self {
            config,
            shutdown_tx,
            started_tx,
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run until [`GameServer::shutdown`] is called. A shutdown requested
    /// before or during startup stops the loop before its first tick.
    ///
    /// Physics initialization failure is fatal and returned before any
    /// bus I/O starts. Bus failures are logged and never stop the loop.
    #[instrument(skip_all)]
    pub async fn run(&self, connector: BusConnector) -> Result<(), GameServerError> {
        self.config.validate()?;

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let mut sim = Simulation::new(&self.config);
        sim.initialize()?;

        let mut seeded: Vec<Command> = self
            .config
            .entities
            .enemies
            .iter()
            .map(|enemy| Command::SpawnEnemy {
                id: EntityId::new(enemy.id.as_str()),
                position: enemy.position,
            })
            .collect();

        let mut bridge = bridge::spawn(BridgeConfig::from(&self.config), connector)?;
        match bridge.wait_ready(BRIDGE_READY_TIMEOUT).await {
            Ok(()) => info!("Bus bridge ready"),
            Err(e) => warn!("Bus bridge unavailable, simulating without it: {}", e),
        }

        let mut tick_timer = interval(self.config.tick_period());
        tick_timer.set_missed_tick_behavior(MissedTickBehavior::Burst);
        let mut flush_timer = interval(self.config.event_flush_period());
        flush_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut snapshot_timer = interval(self.config.snapshot_period());
        snapshot_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let stats_every = self.config.tick_rate_hz as u64 * STATS_INTERVAL_SECS;

        info!(
            "Simulation started: {} Hz, events every {:?}, snapshots every {:?}",
            self.config.tick_rate_hz,
            self.config.event_flush_period(),
            self.config.snapshot_period()
        );
        self.started_tx.send_replace(true);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.wait_for(|stop| *stop) => {
                    info!("Shutdown signal received");
                    break;
                }

                _ = tick_timer.tick() => {
                    // Only what is queued now; later arrivals wait for the next tick
                    let queued = bridge.commands.len();
                    let commands = std::mem::take(&mut seeded)
                        .into_iter()
                        .chain(bridge.commands.try_iter().take(queued));

                    let result = sim.tick(commands)?;
                    if result.tick % stats_every == 0 {
                        let stats = sim.stats();
                        debug!(
                            tick = stats.tick,
                            entities = stats.entities,
                            applied = stats.applied_commands,
                            ignored = stats.ignored_commands,
                            "Tick summary"
                        );
                    }
                }

                _ = flush_timer.tick() => {
                    let events = sim.flush_events();
                    if !events.is_empty() {
                        send_outbound(&bridge.outbound, Outbound::Events(events));
                    }
                }

                _ = snapshot_timer.tick() => {
                    send_outbound(&bridge.outbound, Outbound::Snapshot(sim.snapshot()));
                }
            }
        }

        // Events applied before shutdown still go out
        let events = sim.flush_events();
        if !events.is_empty() {
            send_outbound(&bridge.outbound, Outbound::Events(events));
        }

        self.started_tx.send_replace(false);
        if tokio::task::spawn_blocking(move || bridge.shutdown()).await.is_err() {
            error!("Bridge shutdown task failed");
        }

        info!("Game server stopped after {} ticks", sim.stats().tick);
        Ok(())
    }

    /// Resolve once the simulation loop is running.
    pub async fn wait_started(&self) {
        let mut rx = self.started_tx.subscribe();
        let _ = rx.wait_for(|started| *started).await;
    }

    /// Stop the server. Takes effect even if `run` has not started yet.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }
}

/// Hand a batch to the bridge without waiting. A full queue drops it.
fn send_outbound(outbound: &mpsc::Sender<Outbound>, batch: Outbound) {
    match outbound.try_send(batch) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!("Outbound queue full, dropping batch");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("Bridge closed, dropping batch");
        }
    }
}
