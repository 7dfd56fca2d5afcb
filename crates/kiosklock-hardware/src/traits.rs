//! Trigger hardware trait definitions.
//!
//! These traits establish the contract between the trigger polling loop and
//! the physical line it listens on, so the loop can be exercised against a
//! scripted mock as easily as against a real serial port.
//!
//! Both traits are blocking. Serial drivers expose blocking reads with a
//! timeout, and the polling loop runs on its own thread where a bounded
//! read is the only place it waits.

use crate::error::Result;

/// A trigger line that can be (re)opened.
///
/// The polling loop calls [`open`](TriggerPort::open) whenever it has no
/// live link, including after a link failed mid-read.
///
/// # Examples
///
/// ```no_run
/// use kiosklock_hardware::traits::{TriggerLink, TriggerPort};
/// use kiosklock_hardware::Result;
///
/// fn read_once<P: TriggerPort>(port: &mut P) -> Result<usize> {
///     let mut link = port.open()?;
///     let mut buf = [0u8; 64];
///     link.read(&mut buf)
/// }
/// ```
pub trait TriggerPort: Send + 'static {
    /// Open connection type.
    type Link: TriggerLink;

    /// Human-readable port identifier (e.g. `COM5`, `/dev/ttyACM0`).
    fn name(&self) -> &str;

    /// Open the line.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is absent, busy, or rejects the
    /// configured parameters.
    fn open(&mut self) -> Result<Self::Link>;
}

/// An open, receive-only trigger connection.
///
/// Dropping the link closes it.
pub trait TriggerLink: Send {
    /// Read available bytes, blocking for at most the configured timeout.
    ///
    /// Returns `Ok(0)` if the timeout elapsed without data.
    ///
    /// # Errors
    ///
    /// Returns an error if the line failed. The link must then be dropped
    /// and the port reopened.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}
