#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chanbus::BusConfig;
use chanbus::ChannelId;
use chanbus::ChannelSpec;
use chanbus::StorageBackend;
use chanbus::TaskId;
use parking_lot::Mutex;

pub const WAIT_FOR_DISPATCH: Duration = Duration::from_secs(5);

// Channels of the shared test table, in declaration order
pub const FIRMWARE_VERSION: ChannelId = ChannelId(0);
pub const PERSISTENT_VAL: ChannelId = ChannelId(1);
pub const CH: ChannelId = ChannelId(2);
pub const BROADCAST: ChannelId = ChannelId(3);

pub const TASK_A: TaskId = TaskId(1);
pub const TASK_B: TaskId = TaskId(2);
pub const TASK_C: TaskId = TaskId(3);
pub const TASK_D: TaskId = TaskId(4);

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for integration test.");
}

/// Records subscriber invocations across tasks.
#[derive(Clone, Default)]
pub struct Calls(Arc<Mutex<Vec<(TaskId, ChannelId)>>>);

impl Calls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(
        &self,
        task: TaskId,
    ) -> impl Fn(ChannelId) + Send + Sync + 'static {
        let calls = self.0.clone();
        move |id| calls.lock().push((task, id))
    }

    pub fn all(&self) -> Vec<(TaskId, ChannelId)> {
        self.0.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.0.lock().len()
    }
}

/// | id | name             | size | notes                                    |
/// |----|------------------|------|------------------------------------------|
/// | 0  | FIRMWARE_VERSION | 4    | read-only                                |
/// | 1  | PERSISTENT_VAL   | 1    | persistent, rejects zero                 |
/// | 2  | CH               | 2    | published by A, watched by C             |
/// | 3  | BROADCAST        | 1    | published by A, watched by B, C and D    |
pub fn specs(calls: &Calls) -> Vec<ChannelSpec> {
    vec![
        ChannelSpec::new("FIRMWARE_VERSION", 4)
            .initial(&[0xF1, 0xF2, 0xF3, 0xF4])
            .read_only()
            .publisher(TASK_A),
        ChannelSpec::new("PERSISTENT_VAL", 1)
            .initial(&[0x01])
            .persistent(true)
            .validate(chanbus::non_zero)
            .publisher(TASK_A)
            .subscriber(TASK_C, calls.callback(TASK_C)),
        ChannelSpec::new("CH", 2)
            .publisher(TASK_A)
            .subscriber(TASK_C, calls.callback(TASK_C)),
        ChannelSpec::new("BROADCAST", 1)
            .publisher(TASK_A)
            .subscriber(TASK_B, calls.callback(TASK_B))
            .subscriber(TASK_C, calls.callback(TASK_C))
            .subscriber(TASK_D, calls.callback(TASK_D)),
    ]
}

/// Flash-backed configuration with the image under `dir`; the flush loop
/// only runs at shutdown.
pub fn flash_config(dir: &Path) -> BusConfig {
    let mut config = BusConfig::default();
    config.storage.backend = StorageBackend::Flash;
    config.storage.flash.image_path = dir.join("flash.img");
    config.storage.flush_interval_ms = 60_000;
    config
}

pub fn sled_config(dir: &Path) -> BusConfig {
    let mut config = flash_config(dir);
    config.storage.backend = StorageBackend::Sled;
    config.storage.sled_path = dir.join("channels");
    config
}

pub fn volatile_config() -> BusConfig {
    let mut config = BusConfig::default();
    config.storage.enabled = false;
    config
}

pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(WAIT_FOR_DISPATCH, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

/// Gives the dispatcher time to deliver anything still queued.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
