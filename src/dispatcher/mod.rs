//! Delivers channel changes to subscribers.
//!
//! A single worker drains the change queue fed by the access gate and runs
//! the subscriber callbacks of each changed channel, in declaration order.
//! Delivery is latest-value: several changes committed before the worker
//! gets to a channel are observed as one.

mod notification_dispatcher;

pub use notification_dispatcher::*;
