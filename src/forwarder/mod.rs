//! Best-effort mirror of bus activity to an external host.
//!
//! The gate, the dispatcher and the persistence worker push [`Event`]s
//! through an [`EventSink`] without ever blocking; when the queue is full
//! the event is dropped. A single [`Forwarder`] worker drains the queue and
//! writes one text line per event:
//!
//! ```text
//! <prefix><base64(seq u32 LE | actor u8 | channel u16 LE | op u8 | size u8 | payload)>\n
//! ```
//!
//! Host tools recover packets with [`decode_line`].

mod event;
mod forwarder;
mod packet;

pub use event::*;
pub use forwarder::*;
pub use packet::*;
