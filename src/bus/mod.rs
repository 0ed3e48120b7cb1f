//! Bootstrap of a running bus.
//!
//! [`BusBuilder`] assembles the registry, the access gate and the background
//! workers (dispatcher, persistence engine, event forwarder) and returns a
//! [`Bus`] once startup recovery has completed.
//!
//! ## Example
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(());
//! let bus = BusBuilder::new(BusConfig::new()?.validate()?, specs, shutdown_rx)
//!     .build()
//!     .await?;
//! let gate = bus.gate();
//! gate.channel_set(SENSOR, TEMPERATURE, &[0x10, 0x02]).await?;
//!
//! shutdown_tx.send(())?;
//! bus.join().await;
//! ```

mod builder;

pub use builder::*;
