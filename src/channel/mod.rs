//! Channel identities and the declarative channel description consumed at
//! registry construction.

mod spec;

pub use spec::*;


use std::fmt;

/// Dense index of a channel inside the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(pub u16);

impl ChannelId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Key used for the channel record in durable storage
    #[inline]
    pub fn storage_key(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for ChannelId {
    fn from(id: u16) -> Self {
        ChannelId(id)
    }
}

/// Identity of a task calling into the bus.
///
/// Permission checks compare this against the publishers of a channel, so
/// callers pass it explicitly on every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u8);

impl TaskId {
    /// Reserved for the persistence worker; never a publisher or subscriber.
    pub const STORAGE: TaskId = TaskId(u8::MAX);
}

impl fmt::Display for TaskId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if *self == TaskId::STORAGE {
            f.write_str("storage")
        } else {
            write!(f, "{}", self.0)
        }
    }
}
