//! Persistent channels surviving a restart of the bus.

use chanbus::BusBuilder;
use chanbus::BusConfig;
use chanbus::FileFlash;
use chanbus::FlashLogStore;
use chanbus::FlashRegion;
use tokio::sync::watch;

use crate::common::*;

async fn run_once(
    config: BusConfig,
    value: Option<u8>,
) -> u8 {
    let calls = Calls::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let bus = BusBuilder::new(config, specs(&calls), shutdown_rx)
        .build()
        .await
        .expect("bus starts");
    let gate = bus.gate();

    let mut out = [0u8; 1];
    gate.channel_get(TASK_C, PERSISTENT_VAL, &mut out).await.unwrap();

    if let Some(value) = value {
        gate.channel_set(TASK_A, PERSISTENT_VAL, &[value]).await.unwrap();
    }

    shutdown_tx.send(()).unwrap();
    drop(gate);
    bus.join().await;
    out[0]
}

/// # Case: flash image kept across restarts
///
/// ## Criterias:
/// 1. a fresh image yields the default value
/// 2. the value set before shutdown is restored on the next start
/// 3. a later change replaces it
#[tokio::test]
async fn test_flash_restart_recovers_value() {
    enable_logger();
    let dir = tempfile::tempdir().unwrap();

    assert_eq!(run_once(flash_config(dir.path()), Some(0xF1)).await, 0x01);
    assert_eq!(run_once(flash_config(dir.path()), Some(0x22)).await, 0xF1);
    assert_eq!(run_once(flash_config(dir.path()), None).await, 0x22);
}

#[tokio::test]
async fn test_sled_restart_recovers_value() {
    enable_logger();
    let dir = tempfile::tempdir().unwrap();

    assert_eq!(run_once(sled_config(dir.path()), Some(0x5A)).await, 0x01);
    assert_eq!(run_once(sled_config(dir.path()), None).await, 0x5A);
}

/// # Case: many restarts rotate the flash log
///
/// ## Criterias:
/// 1. a small region is rotated and collected several times
/// 2. the last value always survives
#[tokio::test]
async fn test_flash_restart_after_rotation() {
    enable_logger();
    let dir = tempfile::tempdir().unwrap();
    let mut config = flash_config(dir.path());
    config.storage.flash.sector_size = 512;
    config.storage.flash.sector_count = 2;

    let mut expected = 0x01;
    for value in 1..=200u8 {
        let restored = run_once(config.clone(), Some(value)).await;
        assert_eq!(restored, expected);
        expected = value;
    }

    let region = FlashRegion::from(&config.storage.flash);
    let device = FileFlash::open(&config.storage.flash.image_path, region.end()).unwrap();
    let store = FlashLogStore::mount(device, region).unwrap();
    assert_eq!(store.len(), 1);
}

/// Setting the value already stored leaves the flash image untouched.
#[tokio::test]
async fn test_unchanged_value_is_not_rewritten() {
    enable_logger();
    let dir = tempfile::tempdir().unwrap();

    assert_eq!(run_once(flash_config(dir.path()), Some(0x10)).await, 0x01);
    let image = std::fs::read(dir.path().join("flash.img")).unwrap();

    assert_eq!(run_once(flash_config(dir.path()), Some(0x10)).await, 0x10);
    assert_eq!(std::fs::read(dir.path().join("flash.img")).unwrap(), image);
}
