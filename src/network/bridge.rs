//! Transport Bridge
//!
//! ## Threading model
//!
//! ```text
//! Simulation task              │  Bridge thread (current-thread Tokio)
//! ──────────────────────────── │ ──────────────────────────────────────
//! tick:  commands.try_iter()   │  subscribe client-events
//!          ▲                   │    → decode_command
//!          └──── crossbeam ────┼──── InboundQueue::offer (overflow policy)
//!                              │
//! flush/snapshot:              │
//!   outbound.try_send(batch) ──┼──► outbound.recv()
//!                              │    → encode → publish server-events
//! ```
//!
//! The bridge thread owns the bus connection and its runtime. The
//! simulation never awaits the bus: it only calls non-blocking queue
//! operations. Malformed input is logged and dropped; publish failures are
//! logged and forgotten.

use std::io;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::{OverflowPolicy, ServerConfig};
use crate::game::events::GameEvent;
use crate::game::snapshot::Snapshot;
use crate::game::tick::Command;
use crate::network::bus::{BusConnection, BusConnector, BusError};
use crate::network::protocol::{decode_command, encode_events, encode_snapshot};

/// How long the `block` policy sleeps between retries.
const BLOCK_RETRY: Duration = Duration::from_millis(1);

/// Upper bound on the final bus flush at shutdown.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// A batch handed from the simulation to the bridge.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// One event flush, in append order
    Events(Vec<GameEvent>),
    /// One full-state snapshot
    Snapshot(Snapshot),
}

/// Bridge settings.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Subject carrying client commands
    pub inbound_subject: String,
    /// Subject for events and snapshots
    pub outbound_subject: String,
    /// Inbound command queue capacity
    pub inbound_capacity: usize,
    /// Outbound batch queue capacity
    pub outbound_capacity: usize,
    /// What to do when the inbound queue is full
    pub overflow: OverflowPolicy,
}

impl From<&ServerConfig> for BridgeConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            inbound_subject: config.bus.inbound_subject.clone(),
            outbound_subject: config.bus.outbound_subject.clone(),
            inbound_capacity: config.queues.inbound_capacity,
            outbound_capacity: config.queues.outbound_capacity,
            overflow: config.queues.overflow,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

/// Bridge startup errors.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Connect or subscribe failed.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Bridge runtime could not be created.
    #[error("Bridge runtime failed: {0}")]
    Runtime(String),

    /// Not ready within the timeout.
    #[error("Bridge not ready after {0:?}")]
    Timeout(Duration),

    /// Thread exited before reporting.
    #[error("Bridge exited during startup")]
    Exited,
}

// =============================================================================
// HANDLE
// =============================================================================

/// Simulation-side ends of the bridge queues.
pub struct BridgeHandle {
    /// Decoded commands (drain with `try_iter`, never block)
    pub commands: Receiver<Command>,
    /// Batches to publish (use `try_send`)
    pub outbound: mpsc::Sender<Outbound>,
    ready: Option<oneshot::Receiver<Result<(), BridgeError>>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl BridgeHandle {
    /// Wait until the bridge is subscribed. Only the first call waits.
    pub async fn wait_ready(&mut self, timeout: Duration) -> Result<(), BridgeError> {
        let Some(ready) = self.ready.take() else {
            return Ok(());
        };

        match tokio::time::timeout(timeout, ready).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BridgeError::Exited),
            Err(_) => Err(BridgeError::Timeout(timeout)),
        }
    }

    /// Close both queues and join the bridge thread.
    ///
    /// Blocks until queued outbound batches are published.
    pub fn shutdown(mut self) {
        let thread = self.thread.take();
        drop(self);

        if let Some(thread) = thread {
            if thread.join().is_err() {
                error!("Bridge thread panicked");
            }
        }
    }
}

/// Start the bridge thread.
pub fn spawn(config: BridgeConfig, connector: BusConnector) -> io::Result<BridgeHandle> {
    let (command_tx, command_rx) = crossbeam_channel::bounded(config.inbound_capacity);
    let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity);
    let (ready_tx, ready_rx) = oneshot::channel();

    let inbound = InboundQueue::new(command_tx, &command_rx, config.overflow);

    let thread = thread::Builder::new()
        .name("arena-bridge".into())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(rt) => rt,
                Err(e) => {
                    error!("Failed to create bridge runtime: {}", e);
                    let _ = ready_tx.send(Err(BridgeError::Runtime(e.to_string())));
                    return;
                }
            };

            rt.block_on(run_bridge(config, connector, inbound, outbound_rx, ready_tx));
        })?;

    Ok(BridgeHandle {
        commands: command_rx,
        outbound: outbound_tx,
        ready: Some(ready_rx),
        thread: Some(thread),
    })
}

// =============================================================================
// INBOUND QUEUE
// =============================================================================

/// Bridge-side end of the command queue, applying the overflow policy.
struct InboundQueue {
    tx: Sender<Command>,
    /// Receiver clone used to evict the oldest command (`drop_oldest` only)
    evict: Option<Receiver<Command>>,
    policy: OverflowPolicy,
    dropped: u64,
}

/// Whether the simulation is still listening.
#[derive(Debug, PartialEq, Eq)]
enum Offer {
    Open,
    Closed,
}

impl InboundQueue {
    fn new(tx: Sender<Command>, rx: &Receiver<Command>, policy: OverflowPolicy) -> Self {
        Self {
            tx,
            evict: (policy == OverflowPolicy::DropOldest).then(|| rx.clone()),
            policy,
            dropped: 0,
        }
    }

    async fn offer(&mut self, mut command: Command) -> Offer {
        loop {
            command = match self.tx.try_send(command) {
                Ok(()) => return Offer::Open,
                Err(TrySendError::Disconnected(_)) => return Offer::Closed,
                Err(TrySendError::Full(command)) => command,
            };

            match self.policy {
                OverflowPolicy::DropNewest => {
                    self.dropped += 1;
                    warn!(dropped = self.dropped, "Inbound queue full, dropping newest command");
                    return Offer::Open;
                }
                OverflowPolicy::DropOldest => {
                    let evicted = self.evict.as_ref().map(|rx| rx.try_recv().is_ok());
                    if evicted == Some(true) {
                        self.dropped += 1;
                        warn!(dropped = self.dropped, "Inbound queue full, dropped oldest command");
                    }
                }
                OverflowPolicy::Block => tokio::time::sleep(BLOCK_RETRY).await,
            }
        }
    }
}

// =============================================================================
// BRIDGE LOOP
// =============================================================================

async fn run_bridge(
    config: BridgeConfig,
    connector: BusConnector,
    mut inbound: InboundQueue,
    mut outbound_rx: mpsc::Receiver<Outbound>,
    ready_tx: oneshot::Sender<Result<(), BridgeError>>,
) {
    let conn = match connector.connect().await {
        Ok(conn) => conn,
        Err(e) => {
            error!("{}", e);
            let _ = ready_tx.send(Err(e.into()));
            discard_outbound(outbound_rx).await;
            return;
        }
    };

    let mut subscription = match conn.subscribe(&config.inbound_subject).await {
        Ok(sub) => sub,
        Err(e) => {
            error!("{}", e);
            let _ = ready_tx.send(Err(e.into()));
            discard_outbound(outbound_rx).await;
            return;
        }
    };

    info!(
        "Bridge ready: {} -> simulation -> {}",
        config.inbound_subject, config.outbound_subject
    );
    let _ = ready_tx.send(Ok(()));

    let mut inbound_open = true;
    loop {
        tokio::select! {
            payload = subscription.next(), if inbound_open => match payload {
                Some(payload) => {
                    if forward_inbound(&mut inbound, &payload).await == Offer::Closed {
                        debug!("Command queue closed");
                        inbound_open = false;
                    }
                }
                None => {
                    warn!("Inbound subscription closed");
                    inbound_open = false;
                }
            },

            batch = outbound_rx.recv() => match batch {
                Some(batch) => publish_outbound(&conn, &config.outbound_subject, batch).await,
                None => break,
            },
        }
    }

    conn.flush(FLUSH_TIMEOUT).await;
    info!("Bridge stopped ({} inbound commands dropped)", inbound.dropped);
}

async fn forward_inbound(inbound: &mut InboundQueue, payload: &[u8]) -> Offer {
    match decode_command(payload) {
        Ok(command) => inbound.offer(command).await,
        Err(e) => {
            debug!("Dropping inbound message: {}", e);
            Offer::Open
        }
    }
}

async fn publish_outbound(conn: &BusConnection, subject: &str, batch: Outbound) {
    let encoded = match &batch {
        Outbound::Events(events) if events.is_empty() => return,
        Outbound::Events(events) => encode_events(events),
        Outbound::Snapshot(snapshot) => encode_snapshot(snapshot),
    };

    match encoded {
        Ok(payload) => {
            if let Err(e) = conn.publish(subject, Bytes::from(payload)).await {
                warn!("{}", e);
            }
        }
        Err(e) => warn!("Failed to encode outbound batch: {}", e),
    }
}

/// Keep the outbound queue moving when there is no bus, so the simulation
/// side never sees a full queue.
async fn discard_outbound(mut outbound_rx: mpsc::Receiver<Outbound>) {
    while outbound_rx.recv().await.is_some() {}
}
