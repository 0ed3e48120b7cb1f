use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::trace;
use tracing::warn;

use crate::ChannelId;
use crate::Event;
use crate::EventSink;
use crate::Registry;
use crate::Result;

pub struct Dispatcher {
    registry: Arc<Registry>,
    notify_rx: mpsc::Receiver<ChannelId>,
    events: Option<EventSink>,
    shutdown_signal: watch::Receiver<()>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<Registry>,
        notify_rx: mpsc::Receiver<ChannelId>,
        events: Option<EventSink>,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        Self {
            registry,
            notify_rx,
            events,
            shutdown_signal,
        }
    }

    /// Runs until shutdown or until every gate handle is dropped.
    #[instrument(skip(self), name = "dispatcher")]
    pub async fn run(mut self) -> Result<()> {
        let mut shutdown_signal = self.shutdown_signal.clone();

        loop {
            tokio::select! {
                biased;

                _ = shutdown_signal.changed() => {
                    debug!("shutdown signal received.");
                    break;
                }

                id = self.notify_rx.recv() => {
                    match id {
                        Some(id) => self.dispatch(id).await,
                        None => {
                            debug!("change queue closed");
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Runs the subscribers of `id` if it has a pending change.
    ///
    /// Never takes the channel lock, so a publisher blocked on a full queue
    /// cannot stall it. The pending flag is cleared only if no other change
    /// was committed meanwhile; that change keeps the flag set for its own
    /// queued notification.
    pub(crate) async fn dispatch(
        &self,
        id: ChannelId,
    ) {
        let channel = match self.registry.lookup(id) {
            Ok(channel) => channel,
            Err(_) => {
                warn!("drop change notification of unknown channel #{}", id);
                return;
            }
        };

        let Some(seq) = channel.pending_change() else {
            info!("channel #{} notified without a pending change", id);
            return;
        };

        for subscriber in channel.subscribers() {
            (subscriber.callback)(id);
            trace!("task {} notified of channel #{}", subscriber.task, id);
            if let Some(sink) = &self.events {
                sink.emit(Event::callback(subscriber.task, id));
            }
        }

        if !channel.clear_callback(seq) {
            debug!("channel #{} changed during dispatch, keep it pending", id);
        }
    }
}
