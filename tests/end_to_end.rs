//! End-to-end: bus in, simulation, bus out.

use std::sync::Arc;
use std::time::Duration;

use arena::config::EnemySpawn;
use arena::{BusConnector, GameServer, MemoryBus, ServerConfig, Vec3};
use bytes::Bytes;
use serde_json::Value;
use tokio::sync::broadcast;

const DEADLINE: Duration = Duration::from_secs(5);

fn fast_config() -> ServerConfig {
    ServerConfig {
        tick_rate_hz: 144,
        event_flush_ms: 20,
        snapshot_ms: 60,
        ..Default::default()
    }
}

async fn start(config: ServerConfig, bus: &MemoryBus) -> (Arc<GameServer>, tokio::task::JoinHandle<()>) {
    let server = Arc::new(GameServer::new(config));
    let runner = server.clone();
    let connector = BusConnector::Memory(bus.clone());
    let task = tokio::spawn(async move {
        runner.run(connector).await.expect("server run");
    });
    server.wait_started().await;
    (server, task)
}

async fn next_message(rx: &mut broadcast::Receiver<Bytes>) -> Value {
    let payload = tokio::time::timeout(DEADLINE, rx.recv())
        .await
        .expect("timed out waiting for server-events")
        .expect("bus closed");
    serde_json::from_slice(&payload).expect("server-events payload is JSON")
}

fn is_snapshot(message: &Value) -> bool {
    message.get("type").and_then(Value::as_u64) == Some(2)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_spawn_then_move_end_to_end() {
    let bus = MemoryBus::new();
    let mut server_events = bus.subscribe("server-events").await;
    let (server, task) = start(fast_config(), &bus).await;

    bus.publish("client-events", Bytes::from_static(br#"{"type":0,"data":{"id":"p1"}}"#)).await;
    bus.publish(
        "client-events",
        Bytes::from_static(
            br#"{"type":1,"data":{"id":"p1","velocity":{"x":1,"y":0,"z":0},"rotation":{"x":0,"y":0,"z":0,"w":1}}}"#,
        ),
    )
    .await;

    // Collect events until both have been seen (they may straddle two flushes)
    let mut events = Vec::new();
    while events.len() < 2 {
        let message = next_message(&mut server_events).await;
        if !is_snapshot(&message) {
            events.extend(message.as_array().expect("event flush is an array").iter().cloned());
        }
    }

    assert_eq!(events.len(), 2);
    assert_eq!(events[0], serde_json::json!({"type": 0, "data": {"id": "p1"}}));
    assert_eq!(events[1]["type"], 1);
    assert_eq!(events[1]["data"]["id"], "p1");
    assert_eq!(events[1]["data"]["velocity"]["x"], 1.0);

    // Every snapshot from here on was taken after the move
    let snapshot = loop {
        let message = next_message(&mut server_events).await;
        if is_snapshot(&message) {
            break message;
        }
    };

    let entities = snapshot["data"]["entities"].as_array().unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0]["id"], "p1");
    let vx = entities[0]["velocity"]["x"].as_f64().unwrap();
    let vz = entities[0]["velocity"]["z"].as_f64().unwrap();
    assert!((vx - 1.0).abs() < 1e-2, "vx = {}", vx);
    assert!(vz.abs() < 1e-2, "vz = {}", vz);

    server.shutdown();
    tokio::time::timeout(DEADLINE, task).await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_empty_world_snapshots_and_malformed_input() {
    let bus = MemoryBus::new();
    let mut server_events = bus.subscribe("server-events").await;
    let (server, task) = start(fast_config(), &bus).await;

    bus.publish("client-events", Bytes::from_static(b"<<garbage>>")).await;

    // Snapshots keep flowing, empty, and nothing else is published
    for _ in 0..3 {
        let message = next_message(&mut server_events).await;
        assert_eq!(message, serde_json::json!({"type": 2, "data": {"entities": []}}));
    }

    server.shutdown();
    tokio::time::timeout(DEADLINE, task).await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_seeded_enemy_appears_in_snapshot_only() {
    let bus = MemoryBus::new();
    let mut server_events = bus.subscribe("server-events").await;

    let mut config = fast_config();
    config.entities.enemies.push(EnemySpawn {
        id: "e1".into(),
        position: Vec3::new(3.0, 0.5, 3.0),
    });
    let (server, task) = start(config, &bus).await;

    let message = next_message(&mut server_events).await;
    assert!(is_snapshot(&message), "enemy spawn must not produce an event");
    let entities = message["data"]["entities"].as_array().unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0]["id"], "e1");

    server.shutdown();
    tokio::time::timeout(DEADLINE, task).await.unwrap().unwrap();
}
