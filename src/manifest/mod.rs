//! Channel table described in a manifest file.
//!
//! A manifest names the tasks and channels of an application; behavior
//! (validators, hooks, subscriber callbacks) is referenced by name and
//! resolved against a [`Handlers`] registry built in code.
//!
//! ```toml
//! [[tasks]]
//! name = "sensor"
//! id = 1
//!
//! [[tasks]]
//! name = "display"
//! id = 2
//!
//! [[channels]]
//! name = "TEMPERATURE"
//! size = 2
//! persistent = true
//! validate = "non_zero"
//! publishers = ["sensor"]
//! subscribers = ["display"]
//! ```

mod handlers;
mod manifest;

pub use handlers::*;
pub use manifest::*;
