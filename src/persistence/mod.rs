//! Mirrors persistent channels to a [`crate::DurableStore`].
//!
//! Values are restored once before the bus is handed out, then written back
//! periodically: a committed change only marks the channel, the worker
//! writes whatever value is current at flush time.

mod persistence_engine;

pub use persistence_engine::*;
