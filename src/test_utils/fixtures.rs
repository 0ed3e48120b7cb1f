use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::AccessGate;
use crate::ChannelId;
use crate::ChannelSpec;
use crate::Event;
use crate::EventSink;
use crate::GateConfig;
use crate::Registry;
use crate::TaskId;

/// Publisher of every fixture channel
pub const TASK_A: TaskId = TaskId(1);
/// Task without publish rights
pub const TASK_B: TaskId = TaskId(2);
/// Subscriber of every writable fixture channel
pub const TASK_C: TaskId = TaskId(3);

pub const FIRMWARE_VERSION: ChannelId = ChannelId(0);
pub const PERSISTENT_VAL: ChannelId = ChannelId(1);
pub const CH: ChannelId = ChannelId(2);

/// Records subscriber invocations in call order.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<(TaskId, ChannelId)>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(
        &self,
        task: TaskId,
    ) -> impl Fn(ChannelId) + Send + Sync + 'static {
        let calls = self.calls.clone();
        move |id| calls.lock().push((task, id))
    }

    pub fn calls(&self) -> Vec<(TaskId, ChannelId)> {
        self.calls.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn count_for(
        &self,
        id: ChannelId,
    ) -> usize {
        self.calls.lock().iter().filter(|(_, c)| *c == id).count()
    }
}

/// The channel table used across the unit tests:
///
/// | id | name             | size | notes                                  |
/// |----|------------------|------|----------------------------------------|
/// | 0  | FIRMWARE_VERSION | 4    | read-only, `F1 F2 F3 F4`               |
/// | 1  | PERSISTENT_VAL   | 1    | persistent, rejects zero, initial `01` |
/// | 2  | CH               | 2    | plain                                  |
pub fn fixture_specs(log: &CallLog) -> Vec<ChannelSpec> {
    vec![
        ChannelSpec::new("FIRMWARE_VERSION", 4)
            .initial(&[0xF1, 0xF2, 0xF3, 0xF4])
            .read_only()
            .publisher(TASK_A),
        ChannelSpec::new("PERSISTENT_VAL", 1)
            .initial(&[0x01])
            .persistent(true)
            .validate(crate::non_zero)
            .publisher(TASK_A)
            .subscriber(TASK_C, log.callback(TASK_C)),
        ChannelSpec::new("CH", 2)
            .publisher(TASK_A)
            .subscriber(TASK_C, log.callback(TASK_C)),
    ]
}

/// Gate wired to plain channels instead of running workers, so tests can
/// inspect what would be dispatched and forwarded.
pub struct TestGate {
    pub gate: AccessGate,
    pub registry: Arc<Registry>,
    pub notify_rx: mpsc::Receiver<ChannelId>,
    pub events_rx: mpsc::Receiver<Event>,
}

pub fn test_gate(
    specs: Vec<ChannelSpec>,
    queue_capacity: usize,
) -> TestGate {
    test_gate_with_config(specs, queue_capacity, GateConfig::default())
}

pub fn test_gate_with_config(
    specs: Vec<ChannelSpec>,
    queue_capacity: usize,
    config: GateConfig,
) -> TestGate {
    let registry = Arc::new(Registry::new(specs).unwrap());
    let (notify_tx, notify_rx) = mpsc::channel(queue_capacity);
    let (sink, events_rx) = EventSink::channel(64);
    let gate = AccessGate::new(registry.clone(), notify_tx, Some(sink), config);
    TestGate {
        gate,
        registry,
        notify_rx,
        events_rx,
    }
}

/// Drains whatever is currently queued.
pub fn drain<T>(rx: &mut mpsc::Receiver<T>) -> Vec<T> {
    let mut items = Vec::new();
    while let Ok(item) = rx.try_recv() {
        items.push(item);
    }
    items
}
