//! Access rules and change delivery through a running bus.

use chanbus::Bus;
use chanbus::BusBuilder;
use chanbus::ErrorKind;
use tokio::sync::watch;

use crate::common::*;

async fn start(calls: &Calls) -> (Bus, watch::Sender<()>) {
    enable_logger();
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let bus = BusBuilder::new(volatile_config(), specs(calls), shutdown_rx)
        .build()
        .await
        .expect("bus starts");
    (bus, shutdown_tx)
}

async fn stop(
    bus: Bus,
    shutdown_tx: watch::Sender<()>,
) {
    shutdown_tx.send(()).expect("workers listening");
    bus.join().await;
}

#[tokio::test]
async fn test_firmware_version_is_read_only() {
    let calls = Calls::new();
    let (bus, shutdown_tx) = start(&calls).await;
    let gate = bus.gate();

    let mut out = [0u8; 4];
    gate.channel_get(TASK_B, FIRMWARE_VERSION, &mut out).await.unwrap();
    assert_eq!(out, [0xF1, 0xF2, 0xF3, 0xF4]);

    let err = gate.channel_set(TASK_A, FIRMWARE_VERSION, &[0, 0, 0, 1]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);

    stop(bus, shutdown_tx).await;
}

/// # Case: validated persistent channel
///
/// ## Criterias:
/// 1. zero is rejected and the value is untouched
/// 2. 0xF1 is accepted and read back
/// 3. the subscriber is notified once, for the accepted value only
#[tokio::test]
async fn test_persistent_value_validation() {
    let calls = Calls::new();
    let (bus, shutdown_tx) = start(&calls).await;
    let gate = bus.gate();

    let err = gate.channel_set(TASK_A, PERSISTENT_VAL, &[0x00]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);

    let mut out = [0u8; 1];
    gate.channel_get(TASK_C, PERSISTENT_VAL, &mut out).await.unwrap();
    assert_eq!(out, [0x01]);

    gate.channel_set(TASK_A, PERSISTENT_VAL, &[0xF1]).await.unwrap();
    gate.channel_get(TASK_C, PERSISTENT_VAL, &mut out).await.unwrap();
    assert_eq!(out, [0xF1]);

    wait_until(|| calls.count() == 1).await;
    settle().await;
    assert_eq!(calls.all(), vec![(TASK_C, PERSISTENT_VAL)]);

    stop(bus, shutdown_tx).await;
}

/// # Case: only publishers change a channel
///
/// ## Criterias:
/// 1. B is refused and nothing is dispatched
/// 2. A succeeds and C is called back exactly once
#[tokio::test]
async fn test_publisher_permission() {
    let calls = Calls::new();
    let (bus, shutdown_tx) = start(&calls).await;
    let gate = bus.gate();

    let err = gate.channel_set(TASK_B, CH, &[1, 2]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    settle().await;
    assert_eq!(calls.count(), 0);

    gate.channel_set(TASK_A, CH, &[1, 2]).await.unwrap();
    wait_until(|| calls.count() == 1).await;
    settle().await;
    assert_eq!(calls.all(), vec![(TASK_C, CH)]);

    stop(bus, shutdown_tx).await;
}

#[tokio::test]
async fn test_size_mismatch_is_rejected() {
    let calls = Calls::new();
    let (bus, shutdown_tx) = start(&calls).await;
    let gate = bus.gate();

    let err = gate.channel_set(TASK_A, CH, &[1, 2, 3]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSize);

    let mut out = [0xAAu8; 3];
    let err = gate.channel_get(TASK_C, CH, &mut out).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSize);
    assert_eq!(out, [0xAA; 3]);

    let mut out = [0xAAu8; 2];
    gate.channel_get(TASK_C, CH, &mut out).await.unwrap();
    assert_eq!(out, [0, 0]);

    stop(bus, shutdown_tx).await;
}

#[tokio::test]
async fn test_identical_sets_notify_once() {
    let calls = Calls::new();
    let (bus, shutdown_tx) = start(&calls).await;
    let gate = bus.gate();

    gate.channel_set(TASK_A, CH, &[7, 7]).await.unwrap();
    wait_until(|| calls.count() == 1).await;

    gate.channel_set(TASK_A, CH, &[7, 7]).await.unwrap();
    settle().await;
    assert_eq!(calls.count(), 1);

    stop(bus, shutdown_tx).await;
}

/// # Case: every subscriber sees one change
///
/// ## Criterias:
/// 1. B, C and D are each called once with the channel id
/// 2. callbacks follow declaration order
#[tokio::test]
async fn test_all_subscribers_notified() {
    let calls = Calls::new();
    let (bus, shutdown_tx) = start(&calls).await;

    bus.gate().channel_set(TASK_A, BROADCAST, &[9]).await.unwrap();
    wait_until(|| calls.count() == 3).await;
    settle().await;
    assert_eq!(
        calls.all(),
        vec![(TASK_B, BROADCAST), (TASK_C, BROADCAST), (TASK_D, BROADCAST)]
    );

    stop(bus, shutdown_tx).await;
}

#[tokio::test]
async fn test_unknown_channel() {
    let calls = Calls::new();
    let (bus, shutdown_tx) = start(&calls).await;
    let gate = bus.gate();

    let missing = chanbus::ChannelId(42);
    assert_eq!(gate.channel_size(missing).unwrap_err().kind(), ErrorKind::NotFound);
    let err = gate.channel_set(TASK_A, missing, &[1]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(gate.channel_size(CH).unwrap(), 2);
    assert_eq!(gate.channel_name(CH).unwrap(), "CH");

    stop(bus, shutdown_tx).await;
}

/// Concurrent producers on a multi-threaded runtime; every accepted change
/// leaves the channel holding one of the written values.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers() {
    let calls = Calls::new();
    let (bus, shutdown_tx) = start(&calls).await;

    let mut handles = Vec::new();
    for i in 0..16u8 {
        let gate = bus.gate();
        handles.push(tokio::spawn(async move {
            gate.channel_set(TASK_A, CH, &[i, i]).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut out = [0u8; 2];
    bus.gate().channel_get(TASK_C, CH, &mut out).await.unwrap();
    assert_eq!(out[0], out[1]);
    assert!(out[0] < 16);

    wait_until(|| calls.count() >= 1).await;

    stop(bus, shutdown_tx).await;
}
