use std::fmt;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

use crate::ChannelId;
use crate::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operation {
    /// Committed get
    Read = 0,
    /// Committed set that changed (or re-notified) a channel
    Publish = 1,
    /// Subscriber callback fired
    Callback = 2,
    /// Channel value written to durable storage
    Saved = 3,
}

impl Operation {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Operation::Read),
            1 => Some(Operation::Publish),
            2 => Some(Operation::Callback),
            3 => Some(Operation::Saved),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Operation::Read => f.write_str("READ"),
            Operation::Publish => f.write_str("PUBL"),
            Operation::Callback => f.write_str("CLBK"),
            Operation::Saved => f.write_str("SAVED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub actor: TaskId,
    pub channel: ChannelId,
    pub op: Operation,
    /// Channel bytes for reads and publishes, empty otherwise
    pub payload: Vec<u8>,
}

impl Event {
    pub fn read(
        actor: TaskId,
        channel: ChannelId,
        payload: &[u8],
    ) -> Self {
        Self {
            actor,
            channel,
            op: Operation::Read,
            payload: payload.to_vec(),
        }
    }

    pub fn publish(
        actor: TaskId,
        channel: ChannelId,
        payload: &[u8],
    ) -> Self {
        Self {
            actor,
            channel,
            op: Operation::Publish,
            payload: payload.to_vec(),
        }
    }

    pub fn callback(
        subscriber: TaskId,
        channel: ChannelId,
    ) -> Self {
        Self {
            actor: subscriber,
            channel,
            op: Operation::Callback,
            payload: Vec::new(),
        }
    }

    pub fn saved(channel: ChannelId) -> Self {
        Self {
            actor: TaskId::STORAGE,
            channel,
            op: Operation::Saved,
            payload: Vec::new(),
        }
    }
}

/// Producer side of the forwarder queue.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<Event>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }

    /// Creates a sink and the receiver a [`crate::Forwarder`] drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Queues `event` unless the queue is full or closed; never waits.
    /// Returns whether the event was queued.
    pub fn emit(
        &self,
        event: Event,
    ) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                trace!("forwarder queue full, drop {} event of channel #{}", event.op, event.channel);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}
