//! Pub/Sub Bus Backends
//!
//! The bus is an opaque at-most-once, unordered channel. Two backends:
//!
//! - NATS via `async-nats` for production
//! - [`MemoryBus`], an in-process broadcast bus for tests and local runs
//!
//! Only the transport bridge thread touches a [`BusConnection`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

/// Per-subject buffer of the memory bus. Slow subscribers lose messages.
const MEMORY_BUS_CAPACITY: usize = 1024;

/// Bus errors. All of them are best-effort failures for the caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BusError {
    /// Could not connect to the endpoint.
    #[error("Bus connect failed: {0}")]
    Connect(String),

    /// Could not subscribe to a subject.
    #[error("Subscribe to {subject} failed: {reason}")]
    Subscribe {
        /// Subject
        subject: String,
        /// Backend error
        reason: String,
    },

    /// Could not publish a message.
    #[error("Publish to {subject} failed: {reason}")]
    Publish {
        /// Subject
        subject: String,
        /// Backend error
        reason: String,
    },
}

// =============================================================================
// MEMORY BUS
// =============================================================================

/// In-process bus. Cloning shares the same subjects.
#[derive(Clone, Default)]
pub struct MemoryBus {
    subjects: Arc<RwLock<BTreeMap<String, broadcast::Sender<Bytes>>>>,
}

impl MemoryBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a subject, creating it if needed.
    pub async fn subscribe(&self, subject: &str) -> broadcast::Receiver<Bytes> {
        let mut subjects = self.subjects.write().await;
        subjects
            .entry(subject.to_string())
            .or_insert_with(|| broadcast::channel(MEMORY_BUS_CAPACITY).0)
            .subscribe()
    }

    /// Publish to every current subscriber. Messages with no subscriber
    /// are dropped, like on a real broker.
    pub async fn publish(&self, subject: &str, payload: Bytes) {
        let subjects = self.subjects.read().await;
        if let Some(tx) = subjects.get(subject) {
            let _ = tx.send(payload);
        }
    }
}

// =============================================================================
// CONNECTOR / CONNECTION
// =============================================================================

/// How to reach the bus.
#[derive(Clone)]
pub enum BusConnector {
    /// NATS server
    Nats {
        /// e.g. `nats://localhost:4222`
        endpoint: String,
    },
    /// Shared in-process bus
    Memory(MemoryBus),
}

impl BusConnector {
    /// NATS connector for an endpoint.
    pub fn nats(endpoint: impl Into<String>) -> Self {
        BusConnector::Nats { endpoint: endpoint.into() }
    }

    /// Open a connection.
    ///
    /// NATS connects with `retry_on_initial_connect`, so an unreachable
    /// broker does not fail startup; the client keeps retrying in the
    /// background.
    pub async fn connect(&self) -> Result<BusConnection, BusError> {
        match self {
            BusConnector::Nats { endpoint } => {
                info!("Connecting to NATS at {}", endpoint);
                let client = async_nats::ConnectOptions::new()
                    .retry_on_initial_connect()
                    .connect(endpoint.as_str())
                    .await
                    .map_err(|e| BusError::Connect(e.to_string()))?;
                Ok(BusConnection::Nats(client))
            }
            BusConnector::Memory(bus) => {
                debug!("Using in-process memory bus");
                Ok(BusConnection::Memory(bus.clone()))
            }
        }
    }
}

/// An open bus connection.
pub enum BusConnection {
    /// NATS client
    Nats(async_nats::Client),
    /// Memory bus
    Memory(MemoryBus),
}

impl BusConnection {
    /// Subscribe to a subject.
    pub async fn subscribe(&self, subject: &str) -> Result<BusSubscription, BusError> {
        match self {
            BusConnection::Nats(client) => {
                let subscriber = client
                    .subscribe(subject.to_string())
                    .await
                    .map_err(|e| BusError::Subscribe {
                        subject: subject.to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(BusSubscription::Nats(subscriber))
            }
            BusConnection::Memory(bus) => Ok(BusSubscription::Memory(bus.subscribe(subject).await)),
        }
    }

    /// Publish one message.
    pub async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError> {
        match self {
            BusConnection::Nats(client) => client
                .publish(subject.to_string(), payload)
                .await
                .map_err(|e| BusError::Publish {
                    subject: subject.to_string(),
                    reason: e.to_string(),
                }),
            BusConnection::Memory(bus) => {
                bus.publish(subject, payload).await;
                Ok(())
            }
        }
    }

    /// Push buffered publishes out. Best effort, gives up after `timeout`.
    pub async fn flush(&self, timeout: Duration) {
        if let BusConnection::Nats(client) = self {
            match tokio::time::timeout(timeout, client.flush()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Bus flush failed: {}", e),
                Err(_) => warn!("Bus flush timed out after {:?}", timeout),
            }
        }
    }
}

/// Stream of raw payloads from one subject.
pub enum BusSubscription {
    /// NATS subscriber
    Nats(async_nats::Subscriber),
    /// Memory bus receiver
    Memory(broadcast::Receiver<Bytes>),
}

impl BusSubscription {
    /// Next payload, or `None` once the subscription is closed.
    pub async fn next(&mut self) -> Option<Bytes> {
        match self {
            BusSubscription::Nats(subscriber) => subscriber.next().await.map(|msg| msg.payload),
            BusSubscription::Memory(rx) => loop {
                match rx.recv().await {
                    Ok(payload) => return Some(payload),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Memory bus subscriber lagged, {} messages lost", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            },
        }
    }
}
