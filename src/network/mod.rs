//! Network Layer
//!
//! Everything that touches the bus. The simulation only sees the queues
//! exposed by [`bridge::BridgeHandle`].

pub mod protocol;
pub mod bus;
pub mod bridge;
pub mod server;

pub use protocol::{decode_command, encode_events, encode_snapshot, MessageType, ProtocolError};
pub use bus::{BusConnector, BusConnection, BusError, MemoryBus};
pub use bridge::{BridgeConfig, BridgeHandle, BridgeError, Outbound};
pub use server::{GameServer, GameServerError};
