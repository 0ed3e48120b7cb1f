use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::sync::MutexGuard;
use tokio::time::timeout;

use crate::ChannelError;
use crate::ChannelId;
use crate::ChannelResult;
use crate::ChannelSpec;
use crate::Hooks;
use crate::Subscriber;
use crate::TaskId;

/// Mutable part of a channel, only touched while holding the channel lock.
#[derive(Debug)]
pub struct ChannelState {
    pub(crate) data: Box<[u8]>,
    pub(crate) pending_persist: bool,
}

impl ChannelState {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pending_persist(&self) -> bool {
        self.pending_persist
    }
}

#[derive(Debug)]
pub struct Channel {
    id: ChannelId,
    name: String,
    size: usize,
    persistent: bool,
    readable: bool,
    writable: bool,
    on_changed: bool,
    hooks: Hooks,
    publishers: Vec<TaskId>,
    subscribers: Vec<Subscriber>,
    /// Change sequence in the upper 63 bits, pending callback flag in bit 0.
    /// Only bumped under the channel lock, read and cleared without it so
    /// the dispatcher never waits on a publisher.
    change: AtomicU64,
    state: Mutex<ChannelState>,
}

const PENDING_CALLBACK: u64 = 1;


impl Channel {
    /// Assumes `spec` was already checked by the registry.
    pub(crate) fn from_spec(
        id: ChannelId,
        spec: ChannelSpec,
    ) -> Self {
        let mut data = vec![0u8; spec.size].into_boxed_slice();
        data[..spec.initial.len()].copy_from_slice(&spec.initial);

        Self {
            id,
            name: spec.name,
            size: spec.size,
            persistent: spec.persistent,
            readable: spec.readable,
            writable: spec.writable,
            on_changed: spec.on_changed,
            hooks: spec.hooks,
            publishers: spec.publishers,
            subscribers: spec.subscribers,
            change: AtomicU64::new(0),
            state: Mutex::new(ChannelState {
                data,
                pending_persist: false,
            }),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn is_readable(&self) -> bool {
        self.readable
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn on_changed(&self) -> bool {
        self.on_changed
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn publishers(&self) -> &[TaskId] {
        &self.publishers
    }

    pub fn subscribers(&self) -> &[Subscriber] {
        &self.subscribers
    }

    pub fn is_publisher(
        &self,
        task: TaskId,
    ) -> bool {
        self.publishers.iter().any(|p| *p == task)
    }

    pub fn pending_callback(&self) -> bool {
        self.change.load(Ordering::Acquire) & PENDING_CALLBACK != 0
    }

    /// Number of notifying commits so far.
    pub fn change_seq(&self) -> u64 {
        self.change.load(Ordering::Acquire) >> 1
    }

    /// Records a committed change; the caller holds the channel lock.
    pub(crate) fn mark_changed(&self) {
        let _ = self
            .change
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |mark| {
                Some(mark.wrapping_add(2) | PENDING_CALLBACK)
            });
    }

    /// Sequence of the pending change, `None` when no callback is due.
    pub(crate) fn pending_change(&self) -> Option<u64> {
        let mark = self.change.load(Ordering::Acquire);
        (mark & PENDING_CALLBACK != 0).then_some(mark >> 1)
    }

    /// Clears the pending flag if no change was committed after `seq`.
    pub(crate) fn clear_callback(
        &self,
        seq: u64,
    ) -> bool {
        let pending = (seq << 1) | PENDING_CALLBACK;
        self.change
            .compare_exchange(pending, seq << 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Acquire the channel lock, giving up after `wait`.
    pub(crate) async fn lock_for(
        &self,
        wait: Duration,
    ) -> ChannelResult<MutexGuard<'_, ChannelState>> {
        timeout(wait, self.state.lock()).await.map_err(|_| ChannelError::Busy {
            channel: self.id,
            waited: wait,
        })
    }

    /// Acquire the channel lock without bound; reserved for the workers.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().await
    }
}
