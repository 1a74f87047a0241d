//! Transport bridge tests over the in-process bus.

use std::time::Duration;

use arena::game::events::GameEvent;
use arena::game::snapshot::Snapshot;
use arena::network::bridge::{self, BridgeConfig, BridgeHandle, Outbound};
use arena::{BusConnector, Command, MemoryBus};
use bytes::Bytes;
use serde_json::Value;

const TIMEOUT: Duration = Duration::from_secs(2);

async fn start(bus: &MemoryBus) -> BridgeHandle {
    let mut handle = bridge::spawn(BridgeConfig::default(), BusConnector::Memory(bus.clone()))
        .expect("spawn bridge");
    handle.wait_ready(TIMEOUT).await.expect("bridge ready");
    handle
}

fn recv_command(handle: &BridgeHandle) -> Option<Command> {
    handle.commands.recv_timeout(TIMEOUT).ok()
}

#[tokio::test]
async fn test_invalid_json_produces_no_command() {
    let bus = MemoryBus::new();
    let handle = start(&bus).await;

    bus.publish("client-events", Bytes::from_static(b"{definitely not json")).await;
    bus.publish("client-events", Bytes::from_static(br#"{"type":5,"data":{}}"#)).await;
    bus.publish("client-events", Bytes::from_static(br#"{"type":0,"data":{"id":"p1"}}"#)).await;

    // Only the valid spawn makes it through, and the bridge is still alive
    assert_eq!(recv_command(&handle), Some(Command::Spawn { id: "p1".into() }));
    assert!(handle.commands.try_recv().is_err());

    tokio::task::spawn_blocking(move || handle.shutdown()).await.unwrap();
}

#[tokio::test]
async fn test_commands_keep_arrival_order() {
    let bus = MemoryBus::new();
    let handle = start(&bus).await;

    for i in 0..10 {
        let payload = format!(r#"{{"type":0,"data":{{"id":"p{}"}}}}"#, i);
        bus.publish("client-events", Bytes::from(payload)).await;
    }

    for i in 0..10 {
        let expected = Command::Spawn { id: format!("p{}", i).into() };
        assert_eq!(recv_command(&handle), Some(expected));
    }

    tokio::task::spawn_blocking(move || handle.shutdown()).await.unwrap();
}

#[tokio::test]
async fn test_outbound_batches_are_published() {
    let bus = MemoryBus::new();
    let mut server_events = bus.subscribe("server-events").await;
    let handle = start(&bus).await;

    handle
        .outbound
        .send(Outbound::Events(vec![GameEvent::PlayerSpawned { id: "p1".into() }]))
        .await
        .unwrap();
    // Empty flushes are not published
    handle.outbound.send(Outbound::Events(Vec::new())).await.unwrap();
    handle.outbound.send(Outbound::Snapshot(Snapshot::default())).await.unwrap();

    let first = tokio::time::timeout(TIMEOUT, server_events.recv()).await.unwrap().unwrap();
    let first: Value = serde_json::from_slice(&first).unwrap();
    assert_eq!(first, serde_json::json!([{"type": 0, "data": {"id": "p1"}}]));

    let second = tokio::time::timeout(TIMEOUT, server_events.recv()).await.unwrap().unwrap();
    let second: Value = serde_json::from_slice(&second).unwrap();
    assert_eq!(second, serde_json::json!({"type": 2, "data": {"entities": []}}));

    tokio::task::spawn_blocking(move || handle.shutdown()).await.unwrap();
}

#[tokio::test]
async fn test_shutdown_publishes_queued_batches() {
    let bus = MemoryBus::new();
    let mut server_events = bus.subscribe("server-events").await;
    let handle = start(&bus).await;

    for _ in 0..3 {
        handle.outbound.try_send(Outbound::Snapshot(Snapshot::default())).unwrap();
    }
    tokio::task::spawn_blocking(move || handle.shutdown()).await.unwrap();

    for _ in 0..3 {
        assert!(server_events.try_recv().is_ok());
    }
}
