//! The only public path for reading and writing channel values.
//!
//! Every operation validates the caller and the buffer before touching the
//! channel, takes the channel lock with a bounded wait and never holds it
//! across application hooks.

mod access_gate;

pub use access_gate::*;
