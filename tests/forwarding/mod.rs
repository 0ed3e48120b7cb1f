//! Bus activity mirrored as text lines.

use chanbus::decode_line;
use chanbus::BusBuilder;
use chanbus::Operation;
use chanbus::Packet;
use chanbus::TaskId;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::io::DuplexStream;
use tokio::io::Lines;
use tokio::sync::watch;

use crate::common::*;

const PREFIX: &str = "#BUS#";

async fn next_packet(lines: &mut Lines<BufReader<DuplexStream>>) -> Packet {
    let line = lines.next_line().await.unwrap().expect("forwarder still writing");
    decode_line(PREFIX, &line).unwrap()
}

/// # Case: forwarded stream of a persisted change
///
/// ## Criterias:
/// 1. READ and PUBL arrive in order, then CLBK and SAVED, with consecutive seq
/// 2. payloads carry the channel bytes, CLBK and SAVED carry none
/// 3. SAVED is attributed to the storage task
#[tokio::test]
async fn test_forwarded_event_stream() {
    enable_logger();
    let dir = tempfile::tempdir().unwrap();
    let mut config = flash_config(dir.path());
    config.forwarder.line_prefix = PREFIX.to_string();
    config.storage.flush_interval_ms = 100;

    let calls = Calls::new();
    let (writer, reader) = tokio::io::duplex(4096);
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let bus = BusBuilder::new(config, specs(&calls), shutdown_rx)
        .forward_to(writer)
        .build()
        .await
        .unwrap();
    let gate = bus.gate();
    let mut lines = BufReader::new(reader).lines();

    let mut out = [0u8; 4];
    gate.channel_get(TASK_B, FIRMWARE_VERSION, &mut out).await.unwrap();
    gate.channel_set(TASK_A, PERSISTENT_VAL, &[0x42]).await.unwrap();
    wait_until(|| calls.count() == 1).await;

    let read = next_packet(&mut lines).await;
    assert_eq!(read.event.op, Operation::Read);
    assert_eq!(read.event.actor, TASK_B);
    assert_eq!(read.event.payload, vec![0xF1, 0xF2, 0xF3, 0xF4]);

    let publish = next_packet(&mut lines).await;
    assert_eq!(publish.event.op, Operation::Publish);
    assert_eq!(publish.event.channel, PERSISTENT_VAL);
    assert_eq!(publish.event.payload, vec![0x42]);
    assert_eq!(publish.seq, read.seq + 1);

    // the dispatcher and the flush loop race for the channel after PUBL
    let mut rest = vec![next_packet(&mut lines).await, next_packet(&mut lines).await];
    assert_eq!(rest[0].seq + 1, rest[1].seq);
    rest.sort_by_key(|p| p.event.op.code());

    let callback = &rest[0];
    assert_eq!(callback.event.op, Operation::Callback);
    assert_eq!(callback.event.actor, TASK_C);
    assert!(callback.event.payload.is_empty());

    let saved = &rest[1];
    assert_eq!(saved.event.op, Operation::Saved);
    assert_eq!(saved.event.actor, TaskId::STORAGE);
    assert_eq!(saved.event.channel, PERSISTENT_VAL);
    assert!(saved.event.payload.is_empty());

    shutdown_tx.send(()).unwrap();
    drop(gate);
    bus.join().await;
    assert!(lines.next_line().await.unwrap().is_none());
}

#[tokio::test]
async fn test_bus_runs_without_forwarder() {
    enable_logger();
    let calls = Calls::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let bus = BusBuilder::new(volatile_config(), specs(&calls), shutdown_rx)
        .build()
        .await
        .unwrap();

    bus.gate().channel_set(TASK_A, CH, &[3, 4]).await.unwrap();
    wait_until(|| calls.count() == 1).await;

    shutdown_tx.send(()).unwrap();
    bus.join().await;
}
