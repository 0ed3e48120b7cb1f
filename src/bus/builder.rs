use std::sync::Arc;

use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;
use tracing::warn;

use crate::open_store;
use crate::utils::async_task::join_tasks;
use crate::utils::async_task::spawn_task;
use crate::AccessGate;
use crate::BusConfig;
use crate::ChannelId;
use crate::ChannelSpec;
use crate::Dispatcher;
use crate::DurableStore;
use crate::EventSink;
use crate::Forwarder;
use crate::PersistenceEngine;
use crate::Registry;
use crate::Result;

type EventWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// Builder of a running [`Bus`].
///
/// Components left unset are created from the configuration: the durable
/// store through [`open_store`] and the event writer as stdout.
pub struct BusBuilder {
    pub(super) config: BusConfig,
    pub(super) specs: Vec<ChannelSpec>,
    pub(super) store: Option<Arc<dyn DurableStore>>,
    pub(super) writer: Option<EventWriter>,
    pub(super) shutdown_signal: watch::Receiver<()>,
}

impl BusBuilder {
    pub fn new(
        config: BusConfig,
        specs: Vec<ChannelSpec>,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        Self {
            config,
            specs,
            store: None,
            writer: None,
            shutdown_signal,
        }
    }

    /// Sets a custom durable store; storage must still be enabled in the
    /// configuration for it to be used.
    pub fn store(
        mut self,
        store: Arc<dyn DurableStore>,
    ) -> Self {
        self.store = Some(store);
        self
    }

    /// Forwards bus events to `writer`, enabling the forwarder regardless of
    /// the configuration.
    pub fn forward_to<W>(
        mut self,
        writer: W,
    ) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.writer = Some(Box::new(writer));
        self
    }

    /// Validates the configuration, builds the registry, restores persistent
    /// channels and spawns the workers.
    ///
    /// # Errors
    /// Invalid configuration, an inconsistent channel table or a store that
    /// cannot be opened.
    pub async fn build(self) -> Result<Bus> {
        let Self {
            config,
            specs,
            store,
            writer,
            shutdown_signal,
        } = self;

        let config = config.validate()?;
        let registry = Arc::new(Registry::new(specs)?);
        info!("bus registry ready with {} channels", registry.len());

        let mut handles: Vec<JoinHandle<()>> = Vec::new();
        let mut forwarder_handles: Vec<JoinHandle<()>> = Vec::new();

        // The forwarder outlives the other workers so the events of the
        // final flush still reach the writer; `Bus::join` stops it last.
        let (events, forwarder_stop) = if config.forwarder.enabled || writer.is_some() {
            let (sink, events_rx) = EventSink::channel(config.forwarder.queue_capacity);
            let (stop_tx, stop_rx) = watch::channel(());
            let writer: EventWriter = writer.unwrap_or_else(|| Box::new(tokio::io::stdout()));
            let forwarder = Forwarder::new(writer, config.forwarder.line_prefix.clone(), events_rx, stop_rx);
            spawn_task("forwarder", move || forwarder.run(), Some(&mut forwarder_handles));
            (Some(sink), Some(stop_tx))
        } else {
            (None, None)
        };

        if config.storage.enabled {
            let store = match store {
                Some(store) => store,
                None => open_store(&config.storage)?,
            };
            let engine = PersistenceEngine::new(
                registry.clone(),
                store,
                events.clone(),
                config.storage.flush_interval(),
                config.storage.recovery_lock_timeout(),
                config.gate.lock_timeout(),
                shutdown_signal.clone(),
            );
            let restored = engine.recover().await;
            info!("recovery restored {} persistent channels", restored);
            spawn_task("persistence", move || engine.run(), Some(&mut handles));
        } else if store.is_some() {
            warn!("storage is disabled, the provided store is ignored");
        }

        let (notify_tx, notify_rx) = mpsc::channel::<ChannelId>(config.dispatcher.queue_capacity);
        let dispatcher = Dispatcher::new(registry.clone(), notify_rx, events.clone(), shutdown_signal);
        spawn_task("dispatcher", move || dispatcher.run(), Some(&mut handles));

        let gate = AccessGate::new(registry, notify_tx, events, config.gate);
        Ok(Bus {
            gate,
            handles,
            forwarder_stop,
            forwarder_handles,
        })
    }
}

/// A running bus: the access gate plus its background workers.
#[derive(Debug)]
pub struct Bus {
    gate: AccessGate,
    handles: Vec<JoinHandle<()>>,
    /// Dropping the bus without `join` stops the forwarder as well.
    forwarder_stop: Option<watch::Sender<()>>,
    forwarder_handles: Vec<JoinHandle<()>>,
}

impl Bus {
    /// Cloneable gate handed to producers and consumers.
    pub fn gate(&self) -> AccessGate {
        self.gate.clone()
    }

    pub fn registry(&self) -> &Registry {
        self.gate.registry()
    }

    /// Waits for the workers to stop after the shutdown signal.
    ///
    /// The forwarder is stopped only once persistence and dispatch are done,
    /// so it writes their last events before the output is flushed. Gate
    /// clones still held elsewhere keep the dispatcher alive until the signal
    /// is sent.
    pub async fn join(self) {
        let Self {
            gate,
            handles,
            forwarder_stop,
            forwarder_handles,
        } = self;
        drop(gate);
        let mut failed = join_tasks(handles).await;

        if let Some(stop) = forwarder_stop {
            // a forwarder that already ended has no receiver left
            let _ = stop.send(());
        }
        failed += join_tasks(forwarder_handles).await;
        if failed > 0 {
            warn!("{} bus workers did not stop cleanly", failed);
        }
        info!("bus stopped");
    }
}
