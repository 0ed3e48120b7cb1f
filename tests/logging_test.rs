//! Log output of the bus lifecycle.
//!
//! Kept in its own test binary: `#[traced_test]` installs the global
//! subscriber, so nothing here may call `enable_logger`.

use std::sync::Arc;

use chanbus::BusBuilder;
use chanbus::BusConfig;
use chanbus::ChannelSpec;
use chanbus::FlashLogStore;
use chanbus::FlashRegion;
use chanbus::MemFlash;
use chanbus::TaskId;
use tokio::sync::watch;
use tracing_test::traced_test;

fn specs() -> Vec<ChannelSpec> {
    vec![ChannelSpec::new("COUNTER", 1).persistent(true).publisher(TaskId(1))]
}

#[tokio::test]
#[traced_test]
async fn test_startup_and_shutdown_are_logged() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = BusConfig::default();
    config.storage.flash.image_path = dir.path().join("flash.img");

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let bus = BusBuilder::new(config, specs(), shutdown_rx).build().await.unwrap();

    assert!(logs_contain("no valid sector found, formatting flash region"));
    assert!(logs_contain("bus registry ready with 1 channels"));
    assert!(logs_contain("recovery restored 0 persistent channels"));

    shutdown_tx.send(()).unwrap();
    bus.join().await;
    assert!(logs_contain("bus stopped"));
}

#[tokio::test]
#[traced_test]
async fn test_ignored_store_is_reported() {
    let mut config = BusConfig::default();
    config.storage.enabled = false;
    let region = FlashRegion::new(0, 512, 2);
    let store = FlashLogStore::mount(MemFlash::new(region.end()), region).unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let bus = BusBuilder::new(config, specs(), shutdown_rx)
        .store(Arc::new(store))
        .build()
        .await
        .unwrap();

    assert!(logs_contain("storage is disabled, the provided store is ignored"));
    assert!(!logs_contain("persistent channels recovered"));

    shutdown_tx.send(()).unwrap();
    bus.join().await;
}
