//! Channel Bus Error Hierarchy
//!
//! Defines the error types returned by the bus, categorized by the layer
//! that produced them: access gate, durable storage, configuration and
//! manifest loading.

use std::time::Duration;

use config::ConfigError;

use crate::ChannelId;
use crate::HookStage;
use crate::TaskId;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

/// Result type returned by every access gate operation
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Access gate failures (permission, size, validation, locking)
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Durable storage failures (flash device, log store, embedded db)
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Bus configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Channel table or manifest inconsistencies detected at startup
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

/// Error-kind tags exposed to producers and consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    Unsupported,
    InvalidSize,
    InvalidValue,
    Busy,
    QueueTimeout,
    StorageError,
    Hook,
    Config,
    Fatal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Channel(e) => e.kind(),
            Error::Storage(_) => ErrorKind::StorageError,
            Error::Config(_) | Error::Manifest(_) => ErrorKind::Config,
            Error::Fatal(_) => ErrorKind::Fatal,
        }
    }
}

/// Which side of the access gate an operation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Get,
    Set,
}

impl std::fmt::Display for Access {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Access::Get => f.write_str("get"),
            Access::Set => f.write_str("set"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Channel id outside the registry
    #[error("Channel #{0} was not found")]
    NotFound(ChannelId),

    /// Caller is not one of the channel's publishers
    #[error("Task {caller} has no permission to change channel #{channel}")]
    PermissionDenied { caller: TaskId, channel: ChannelId },

    /// Channel lacks the requested capability (read-only / write-only)
    #[error("Channel #{channel} does not support {access}")]
    Unsupported { channel: ChannelId, access: Access },

    /// Caller buffer length differs from the channel size
    #[error("Channel #{channel} holds {expected} bytes, buffer has {actual}")]
    InvalidSize {
        channel: ChannelId,
        expected: usize,
        actual: usize,
    },

    /// Value rejected by the channel validator
    #[error("The value doesn't satisfy the validator of channel #{0}")]
    InvalidValue(ChannelId),

    /// Channel lock not acquired within the bounded wait
    #[error("Channel #{channel} is busy, lock not acquired after {waited:?}")]
    Busy { channel: ChannelId, waited: Duration },

    /// Change notification could not be queued in time.
    /// The channel value is already committed when this is returned.
    #[error("Change of channel #{channel} could not be queued for dispatch after {waited:?}")]
    QueueTimeout { channel: ChannelId, waited: Duration },

    /// A pre_get / pre_set / pos_set hook failed, returned verbatim
    #[error("Error on {stage} hook of channel #{channel}: {source}")]
    Hook {
        channel: ChannelId,
        stage: HookStage,
        #[source]
        source: HookError,
    },
}

impl ChannelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChannelError::NotFound(_) => ErrorKind::NotFound,
            ChannelError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            ChannelError::Unsupported { .. } => ErrorKind::Unsupported,
            ChannelError::InvalidSize { .. } => ErrorKind::InvalidSize,
            ChannelError::InvalidValue(_) => ErrorKind::InvalidValue,
            ChannelError::Busy { .. } => ErrorKind::Busy,
            ChannelError::QueueTimeout { .. } => ErrorKind::QueueTimeout,
            ChannelError::Hook { .. } => ErrorKind::Hook,
        }
    }
}

/// Failure reported by an application hook.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("code {code}: {message}")]
pub struct HookError {
    pub code: i32,
    pub message: String,
}

impl HookError {
    pub fn new(
        code: i32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Disk I/O failures on file-backed images
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// Raw flash device failures
    #[error(transparent)]
    Flash(#[from] FlashError),

    /// Region geometry unusable by the log-structured store
    #[error("Invalid flash region: {0}")]
    InvalidRegion(String),

    /// Record cannot fit in a single erase sector
    #[error("Record of {len} bytes does not fit in a {sector_size} bytes sector")]
    RecordTooLarge { len: usize, sector_size: u32 },

    /// Live records no longer fit in the region after garbage collection
    #[error("Flash region is full")]
    Full,

    /// Checksum or layout validation failures
    #[error("Data corruption detected at {location}")]
    Corrupted { location: String },

    /// Embedded database errors
    #[error("Embedded database error: {0}")]
    DbError(String),
}

impl From<sled::Error> for StorageError {
    fn from(e: sled::Error) -> Self {
        StorageError::DbError(e.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FlashError {
    #[error("Access of {len} bytes at offset {offset:#x} is out of bounds")]
    OutOfBounds { offset: u32, len: usize },

    #[error("Write failed at offset {offset:#x}")]
    WriteFailed { offset: u32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Channel name must not be empty (channel #{0})")]
    EmptyName(usize),

    #[error("Channel {0} is declared more than once")]
    DuplicateChannel(String),

    #[error("Channel {name} has size {size}, expected 1..={max}")]
    InvalidChannelSize { name: String, size: usize, max: usize },

    #[error("Channel {name} initial value has {len} bytes but size is {size}")]
    InitialValueTooLong { name: String, len: usize, size: usize },

    #[error("Channel {channel} uses reserved task id {task}")]
    ReservedTask { channel: String, task: TaskId },

    #[error("Too many channels: {0}")]
    TooManyChannels(usize),

    #[error("Task {0} is declared more than once")]
    DuplicateTask(String),

    #[error("Task {name} uses id {id}, which is taken or reserved")]
    InvalidTaskId { name: String, id: u8 },

    #[error("Channel {name} initial value has byte {value} outside 0..=255")]
    InvalidInitialByte { name: String, value: i64 },

    #[error("Channel {channel} references unknown task {task}")]
    UnknownTask { channel: String, task: String },

    #[error("Channel {channel} references unknown {kind} handler {handler}")]
    UnknownHandler {
        channel: String,
        kind: &'static str,
        handler: String,
    },

    #[error("Task {0} subscribes to channels but registered no callback")]
    MissingCallback(String),
}

/// Failures decoding a forwarded event line on the host side.
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("Line does not start with the event prefix")]
    MissingPrefix,

    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    #[error("Packet of {0} bytes is shorter than its header")]
    Truncated(usize),

    #[error("Unknown operation code {0}")]
    UnknownOperation(u8),

    #[error("Packet declares {declared} payload bytes but carries {actual}")]
    SizeMismatch { declared: usize, actual: usize },
}
