use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::instrument;
use tracing::trace;
use tracing::warn;

use crate::Channel;
use crate::DurableStore;
use crate::Event;
use crate::EventSink;
use crate::Registry;
use crate::Result;

pub struct PersistenceEngine {
    registry: Arc<Registry>,
    store: Arc<dyn DurableStore>,
    events: Option<EventSink>,
    flush_interval: Duration,
    /// Bound on channel locks while recovering
    recovery_lock_timeout: Duration,
    /// Bound on channel locks while flushing
    lock_timeout: Duration,
    shutdown_signal: watch::Receiver<()>,
}

impl PersistenceEngine {
    pub fn new(
        registry: Arc<Registry>,
        store: Arc<dyn DurableStore>,
        events: Option<EventSink>,
        flush_interval: Duration,
        recovery_lock_timeout: Duration,
        lock_timeout: Duration,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        Self {
            registry,
            store,
            events,
            flush_interval,
            recovery_lock_timeout,
            lock_timeout,
            shutdown_signal,
        }
    }

    /// Loads the stored value of every persistent channel.
    ///
    /// A missing record keeps the default; a record of the wrong size, a
    /// read failure or a busy channel is logged and skipped. Returns the
    /// number of channels restored.
    #[instrument(skip(self))]
    pub async fn recover(&self) -> usize {
        info!("recovering persistent channels");
        let mut recovered = 0;

        for channel in self.registry.persistent() {
            let id = channel.id();
            let mut state = match channel.lock_for(self.recovery_lock_timeout).await {
                Ok(state) => state,
                Err(e) => {
                    warn!("skip recovery of channel #{}: {}", id, e);
                    continue;
                }
            };

            match self.store.read(id.storage_key()) {
                Ok(Some(value)) if value.len() == channel.size() => {
                    state.data.copy_from_slice(&value);
                    recovered += 1;
                    debug!("channel #{} ({}) recovered: {:02x?}", id, channel.name(), value);
                }
                Ok(Some(value)) => {
                    warn!(
                        "stored value of channel #{} has {} bytes, expected {}; keep default",
                        id,
                        value.len(),
                        channel.size()
                    );
                }
                Ok(None) => {
                    info!("no stored value for channel #{}", id);
                }
                Err(e) => {
                    error!("read stored value of channel #{}: {:?}", id, e);
                }
            }
        }

        info!("{} persistent channels recovered", recovered);
        recovered
    }

    /// Writes every channel marked for persistence. Returns the number of
    /// channels actually written.
    pub async fn flush(&self) -> usize {
        let mut saved = 0;
        for channel in self.registry.persistent() {
            if self.flush_channel(channel).await {
                saved += 1;
            }
        }
        saved
    }

    async fn flush_channel(
        &self,
        channel: &Channel,
    ) -> bool {
        let id = channel.id();
        let (value, seq) = {
            let state = match channel.lock_for(self.lock_timeout).await {
                Ok(state) => state,
                Err(_) => {
                    debug!("channel #{} busy, flush it next cycle", id);
                    return false;
                }
            };
            if !state.pending_persist() {
                return false;
            }
            (state.data().to_vec(), channel.change_seq())
        };

        let written = match self.store.write(id.storage_key(), &value) {
            Ok(written) => written,
            Err(e) => {
                error!("channel #{} could not be stored: {:?}", id, e);
                return false;
            }
        };

        let mut state = channel.lock().await;
        if channel.change_seq() == seq {
            state.pending_persist = false;
        }
        drop(state);

        if written == 0 {
            trace!("channel #{} value already stored", id);
            return false;
        }

        info!("channel #{} value updated in storage", id);
        if let Some(sink) = &self.events {
            sink.emit(Event::saved(id));
        }
        true
    }

    /// Flushes every `flush_interval` until shutdown, then flushes once more.
    #[instrument(skip(self), name = "persistence")]
    pub async fn run(self) -> Result<()> {
        let mut shutdown_signal = self.shutdown_signal.clone();
        let mut interval = tokio::time::interval_at(Instant::now() + self.flush_interval, self.flush_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_signal.changed() => {
                    debug!("shutdown signal received, final flush");
                    self.flush().await;
                    break;
                }

                _ = interval.tick() => {
                    trace!("flush tick");
                    self.flush().await;
                }
            }
        }
        Ok(())
    }
}
