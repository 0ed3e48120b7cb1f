use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::debug;
use tracing::instrument;
use tracing::trace;
use tracing::warn;

use super::encode_line;
use super::Event;
use super::Packet;
use crate::Result;

/// Worker writing queued events to `W`, one line each.
pub struct Forwarder<W> {
    writer: W,
    prefix: String,
    next_seq: u32,
    events_rx: mpsc::Receiver<Event>,
    shutdown_signal: watch::Receiver<()>,
}

impl<W> Forwarder<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(
        writer: W,
        prefix: impl Into<String>,
        events_rx: mpsc::Receiver<Event>,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        Self {
            writer,
            prefix: prefix.into(),
            next_seq: 0,
            events_rx,
            shutdown_signal,
        }
    }

    /// Runs until shutdown or until every sink is dropped. Events still queued
    /// at shutdown are written before returning.
    #[instrument(skip(self), name = "forwarder")]
    pub async fn run(mut self) -> Result<()> {
        let mut shutdown_signal = self.shutdown_signal.clone();

        loop {
            tokio::select! {
                biased;

                _ = shutdown_signal.changed() => {
                    debug!("shutdown signal received, drain pending events");
                    while let Ok(event) = self.events_rx.try_recv() {
                        self.forward(event).await;
                    }
                    break;
                }

                event = self.events_rx.recv() => {
                    match event {
                        Some(event) => self.forward(event).await,
                        None => {
                            debug!("every event sink dropped");
                            break;
                        }
                    }
                }
            }
        }

        if let Err(e) = self.writer.flush().await {
            warn!("flush forwarder output: {:?}", e);
        }
        Ok(())
    }

    async fn forward(
        &mut self,
        event: Event,
    ) {
        let packet = Packet {
            seq: self.next_seq,
            event,
        };
        self.next_seq = self.next_seq.wrapping_add(1);

        let line = encode_line(&self.prefix, &packet);
        trace!("forward {} of channel #{}", packet.event.op, packet.event.channel);
        // A broken output must not stop the bus; the event is lost.
        if let Err(e) = self.writer.write_all(line.as_bytes()).await {
            warn!("write forwarded event #{}: {:?}", packet.seq, e);
            return;
        }
        if let Err(e) = self.writer.flush().await {
            warn!("flush forwarded event #{}: {:?}", packet.seq, e);
        }
    }
}
