//! Trigger hardware layer for the kiosk display lock.
//!
//! This crate turns the external trigger board (an ESP32 or Arduino that
//! prints a line per detected pulse over USB serial) into a stream of
//! [`TriggerEvent`](kiosklock_core::TriggerEvent)s for the lock controller.
//!
//! # Layers
//!
//! - [`traits`]: the blocking [`TriggerPort`]/[`TriggerLink`] contract
//! - [`serial`]: the real backend on top of the `serialport` crate
//! - [`mock`]: a scripted port for tests and development without hardware
//! - [`decoder`]: line splitting and the [`TriggerPolicy`] deciding what counts
//! - [`channel`]: the polling loop with reconnect and backoff
//!
//! # Examples
//!
//! ```no_run
//! use kiosklock_core::TriggerEvent;
//! use kiosklock_hardware::{SerialConfig, SerialTriggerPort, TriggerChannel, TriggerChannelConfig};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> kiosklock_hardware::Result<()> {
//!     let port = SerialTriggerPort::new(SerialConfig::new("COM5"))?;
//!     let (tx, mut rx) = mpsc::channel::<TriggerEvent>(16);
//!     let handle = TriggerChannel::new(port, TriggerChannelConfig::default()).start(tx)?;
//!
//!     while let Some(event) = rx.recv().await {
//!         println!("trigger at {:?}", event.timestamp);
//!     }
//!
//!     handle.shutdown()
//! }
//! ```

pub mod channel;
pub mod decoder;
pub mod error;
pub mod mock;
pub mod serial;
pub mod traits;
pub mod types;

pub use channel::{TriggerChannel, TriggerChannelConfig, TriggerChannelHandle, TriggerChannelStats};
pub use decoder::{TriggerDecoder, TriggerPolicy};
pub use error::{HardwareError, Result};
pub use serial::{SerialConfig, SerialTriggerPort, available_ports};
pub use traits::{TriggerLink, TriggerPort};
pub use types::PortInfo;
