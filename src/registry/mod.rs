//! Channel registry: the immutable-after-init table of channel descriptors.
//!
//! Each [`Channel`] owns its fixed-size buffer, allocated once when the
//! registry is built, together with the per-channel lock that guards the
//! buffer and the persist flag. The pending callback flag and the change
//! sequence live in an atomic beside the lock. Lookup itself takes no lock.

mod channel;
mod channel_registry;

pub use channel::*;
pub use channel_registry::*;


/// Largest payload a channel may carry; sizes travel as one byte on the
/// forwarder wire.
pub const MAX_CHANNEL_SIZE: usize = u8::MAX as usize;

/// Channel ids double as flash record keys, `0xFFFF` marks erased flash.
pub const MAX_CHANNEL_COUNT: usize = u16::MAX as usize - 1;
