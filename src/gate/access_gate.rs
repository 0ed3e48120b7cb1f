use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use crate::Access;
use crate::ChannelError;
use crate::ChannelId;
use crate::ChannelResult;
use crate::Event;
use crate::EventSink;
use crate::GateConfig;
use crate::HookStage;
use crate::Registry;
use crate::TaskId;

/// Cloneable handle given to producers and consumers.
#[derive(Debug, Clone)]
pub struct AccessGate {
    registry: Arc<Registry>,
    notify_tx: mpsc::Sender<ChannelId>,
    events: Option<EventSink>,
    config: GateConfig,
}

impl AccessGate {
    pub(crate) fn new(
        registry: Arc<Registry>,
        notify_tx: mpsc::Sender<ChannelId>,
        events: Option<EventSink>,
        config: GateConfig,
    ) -> Self {
        Self {
            registry,
            notify_tx,
            events,
            config,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Configured size of the channel.
    ///
    /// An unknown id has no size and yields `NotFound`; it is never reported
    /// as a zero-sized channel.
    pub fn channel_size(
        &self,
        id: ChannelId,
    ) -> ChannelResult<usize> {
        self.registry.size_of(id)
    }

    pub fn channel_name(
        &self,
        id: ChannelId,
    ) -> ChannelResult<&str> {
        self.registry.name_of(id)
    }

    /// Copies the current value of channel `id` into `out`.
    ///
    /// `out` must be exactly the channel size; it is left untouched on any
    /// error. The `pre_get` hook runs before the lock is taken and its error
    /// is returned verbatim.
    pub async fn channel_get(
        &self,
        caller: TaskId,
        id: ChannelId,
        out: &mut [u8],
    ) -> ChannelResult<()> {
        let channel = self.registry.lookup(id)?;
        if !channel.is_readable() {
            return Err(ChannelError::Unsupported {
                channel: id,
                access: Access::Get,
            });
        }

        if let Some(pre_get) = &channel.hooks().pre_get {
            pre_get(id).map_err(|source| ChannelError::Hook {
                channel: id,
                stage: HookStage::PreGet,
                source,
            })?;
        }

        let state = channel.lock_for(self.config.lock_timeout()).await?;
        if out.len() != channel.size() {
            return Err(ChannelError::InvalidSize {
                channel: id,
                expected: channel.size(),
                actual: out.len(),
            });
        }

        out.copy_from_slice(state.data());
        self.emit(|| Event::read(caller, id, state.data()));
        trace!("task {} read channel #{}", caller, id);
        Ok(())
    }

    /// Replaces the value of channel `id` with `value` on behalf of `caller`.
    ///
    /// A committed change marks the channel for subscriber dispatch and, when
    /// persistent, for the next flush. With `on_changed` set, writing the
    /// current value is a successful no-op.
    ///
    /// # Errors
    /// Checked in this order: `NotFound`, `PermissionDenied`, `Unsupported`,
    /// `InvalidSize`, `InvalidValue`, `pre_set` hook, `Busy`. After the
    /// commit, `QueueTimeout` and `pos_set` failures are reported but the new
    /// value stays in place.
    pub async fn channel_set(
        &self,
        caller: TaskId,
        id: ChannelId,
        value: &[u8],
    ) -> ChannelResult<()> {
        let channel = self.registry.lookup(id)?;
        if !channel.is_publisher(caller) {
            return Err(ChannelError::PermissionDenied { caller, channel: id });
        }
        if !channel.is_writable() {
            return Err(ChannelError::Unsupported {
                channel: id,
                access: Access::Set,
            });
        }
        if value.len() != channel.size() {
            return Err(ChannelError::InvalidSize {
                channel: id,
                expected: channel.size(),
                actual: value.len(),
            });
        }

        let hooks = channel.hooks();
        if let Some(validate) = &hooks.validate {
            if !validate(value) {
                return Err(ChannelError::InvalidValue(id));
            }
        }

        let mut proposed = value.to_vec();
        if let Some(pre_set) = &hooks.pre_set {
            pre_set(id, &mut proposed).map_err(|source| ChannelError::Hook {
                channel: id,
                stage: HookStage::PreSet,
                source,
            })?;
        }

        let mut state = channel.lock_for(self.config.lock_timeout()).await?;
        let changed = state.data() != proposed.as_slice();
        if !changed && channel.on_changed() {
            trace!("channel #{} unchanged, skip notification", id);
            return Ok(());
        }

        state.data.copy_from_slice(&proposed);
        channel.mark_changed();

        let notified = self.notify(id).await;
        if changed && channel.is_persistent() {
            state.pending_persist = true;
        }
        self.emit(|| Event::publish(caller, id, &proposed));
        drop(state);
        debug!("task {} changed channel #{}", caller, id);

        let pos_set = match &hooks.pos_set {
            Some(pos_set) => pos_set(id, &proposed).map_err(|source| ChannelError::Hook {
                channel: id,
                stage: HookStage::PosSet,
                source,
            }),
            None => Ok(()),
        };

        notified.and(pos_set)
    }

    async fn notify(
        &self,
        id: ChannelId,
    ) -> ChannelResult<()> {
        let wait = self.config.notify_timeout();
        match self.notify_tx.send_timeout(id, wait).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => {
                warn!("change queue full, channel #{} not queued for dispatch", id);
                Err(ChannelError::QueueTimeout { channel: id, waited: wait })
            }
            Err(SendTimeoutError::Closed(_)) => {
                error!("dispatcher is gone, channel #{} not queued for dispatch", id);
                Err(ChannelError::QueueTimeout { channel: id, waited: wait })
            }
        }
    }

    fn emit(
        &self,
        event: impl FnOnce() -> Event,
    ) {
        if let Some(sink) = &self.events {
            sink.emit(event());
        }
    }
}
