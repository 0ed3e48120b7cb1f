//! A governed inter-task data bus.
//!
//! Tasks exchange fixed-size byte values through named channels. Every
//! access goes through the [`AccessGate`], which enforces capabilities,
//! publisher permissions, sizes and validators, runs per-channel hooks and
//! queues change notifications. Background workers deliver those
//! notifications to subscribers ([`Dispatcher`]), mirror persistent
//! channels to durable storage ([`PersistenceEngine`]) and optionally
//! forward bus activity to an external host ([`Forwarder`]).
//!
//! [`BusBuilder`] wires everything together from a [`BusConfig`] and a
//! channel table, written in code with [`ChannelSpec`] or loaded from a
//! [`Manifest`].

mod bus;
mod channel;
mod config;
mod dispatcher;
mod errors;
mod forwarder;
mod gate;
mod manifest;
mod persistence;
mod registry;
mod storage;
mod utils;

pub use bus::*;
pub use channel::*;
pub use config::*;
pub use dispatcher::*;
pub use errors::*;
pub use forwarder::*;
pub use gate::*;
pub use manifest::*;
pub use persistence::*;
pub use registry::*;
pub use storage::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
