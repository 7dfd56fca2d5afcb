//! Trigger channel: the polling loop that turns a serial line into events.
//!
//! The channel owns a [`TriggerPort`] and runs on a dedicated thread. It
//! opens the port, feeds every read into a [`TriggerDecoder`], and forwards
//! one [`TriggerEvent`] per accepted line to the controller's event queue.
//! The loop never terminates on its own because of hardware problems:
//!
//! ```text
//!            open ok                      read error
//! ┌─────────┐──────►┌───────────┐──────────────────┐
//! │ Opening │       │ Connected │                  │
//! └─────────┘◄──────└───────────┘                  │
//!   │  ▲   backoff        │ accepted line          │
//!   │  │                  ▼                        │
//!   │  │            event queue                    │
//!   └──┴──── open failed / backoff ◄───────────────┘
//! ```
//!
//! The first open failure in a streak is logged at `warn`; the rest of the
//! streak at `debug`, so an unplugged board does not flood the log.
//!
//! The loop stops when [`TriggerChannelHandle::shutdown`] is called or when
//! the receiving side of the event queue is dropped.
//!
//! # Examples
//!
//! ```no_run
//! use kiosklock_hardware::channel::{TriggerChannel, TriggerChannelConfig};
//! use kiosklock_hardware::serial::{SerialConfig, SerialTriggerPort};
//! use kiosklock_core::TriggerEvent;
//! use tokio::sync::mpsc;
//!
//! # fn main() -> kiosklock_hardware::Result<()> {
//! let port = SerialTriggerPort::new(SerialConfig::new("/dev/ttyACM0"))?;
//! let (tx, _rx) = mpsc::channel::<TriggerEvent>(16);
//!
//! let handle = TriggerChannel::new(port, TriggerChannelConfig::default()).start(tx)?;
//! // ... later
//! handle.shutdown()?;
//! # Ok(())
//! # }
//! ```

use crate::decoder::{TriggerDecoder, TriggerPolicy};
use crate::error::{HardwareError, Result};
use crate::traits::{TriggerLink, TriggerPort};
use kiosklock_core::TriggerEvent;
use kiosklock_core::constants::DEFAULT_RECONNECT_BACKOFF_MS;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Longest uninterrupted sleep while backing off, so shutdown stays prompt.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Read buffer size. Trigger lines are a handful of bytes.
const READ_BUFFER_SIZE: usize = 64;

/// Behaviour of the polling loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerChannelConfig {
    /// Which received lines count as triggers.
    pub policy: TriggerPolicy,

    /// Pause between a failure and the next open attempt.
    pub reconnect_backoff: Duration,
}

impl Default for TriggerChannelConfig {
    fn default() -> Self {
        Self {
            policy: TriggerPolicy::default(),
            reconnect_backoff: Duration::from_millis(DEFAULT_RECONNECT_BACKOFF_MS),
        }
    }
}

/// Counters describing the trigger line since the channel started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TriggerChannelStats {
    /// Successful opens.
    pub connects: u64,

    /// Links lost after a successful open.
    pub disconnects: u64,

    /// Failed open attempts.
    pub failed_opens: u64,

    /// Accepted trigger lines.
    pub triggers: u64,

    /// Whether a link is open right now.
    pub connected: bool,
}

/// State shared between the polling thread and its handle.
#[derive(Debug, Default)]
struct Shared {
    shutdown: AtomicBool,
    running: AtomicBool,
    connected: AtomicBool,
    connects: AtomicU64,
    disconnects: AtomicU64,
    failed_opens: AtomicU64,
    triggers: AtomicU64,
}

impl Shared {
    fn stopping(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Sleep for `duration`, returning early if shutdown is requested.
    fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while !self.stopping() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(SHUTDOWN_POLL));
        }
    }

    fn stats(&self) -> TriggerChannelStats {
        TriggerChannelStats {
            connects: self.connects.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
            failed_opens: self.failed_opens.load(Ordering::Relaxed),
            triggers: self.triggers.load(Ordering::Relaxed),
            connected: self.connected.load(Ordering::Relaxed),
        }
    }
}

/// Why the read pump returned.
enum PumpExit {
    /// Shutdown requested or the event queue closed.
    Stopped,

    /// The link failed and must be reopened.
    Failed(HardwareError),
}

/// Polling loop over a trigger port, not yet started.
#[derive(Debug)]
pub struct TriggerChannel<P: TriggerPort> {
    port: P,
    config: TriggerChannelConfig,
}

impl<P: TriggerPort> TriggerChannel<P> {
    /// Create a channel for `port`.
    pub fn new(port: P, config: TriggerChannelConfig) -> Self {
        Self { port, config }
    }

    /// Spawn the polling thread, delivering events through `tx`.
    ///
    /// Events are converted with `From<TriggerEvent>`, so the controller's
    /// own event type can be used directly.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::Io` if the thread cannot be spawned.
    pub fn start<E>(self, tx: mpsc::Sender<E>) -> Result<TriggerChannelHandle>
    where
        E: From<TriggerEvent> + Send + 'static,
    {
        let shared = Arc::new(Shared::default());
        shared.running.store(true, Ordering::Release);
        let port_name = self.port.name().to_string();

        let thread_shared = Arc::clone(&shared);
        let thread = std::thread::Builder::new()
            .name("kiosklock-trigger".to_string())
            .spawn(move || {
                self.run(&thread_shared, &tx);
                thread_shared.connected.store(false, Ordering::Relaxed);
                thread_shared.running.store(false, Ordering::Release);
            })?;

        info!(
            port = %port_name,
            "Trigger channel started"
        );

        Ok(TriggerChannelHandle {
            port_name,
            shared,
            thread: Some(thread),
        })
    }

    fn run<E>(mut self, shared: &Shared, tx: &mpsc::Sender<E>)
    where
        E: From<TriggerEvent>,
    {
        let mut decoder = TriggerDecoder::new(self.config.policy.clone());
        let mut failure_streak: u32 = 0;

        while !shared.stopping() {
            let mut link = match self.port.open() {
                Ok(link) => link,
                Err(e) => {
                    shared.failed_opens.fetch_add(1, Ordering::Relaxed);
                    if failure_streak == 0 {
                        warn!(port = %self.port.name(), error = %e, "Trigger port unavailable, retrying");
                    } else {
                        debug!(
                            port = %self.port.name(),
                            error = %e,
                            attempt = failure_streak + 1,
                            "Trigger port still unavailable"
                        );
                    }
                    failure_streak = failure_streak.saturating_add(1);
                    shared.sleep(self.config.reconnect_backoff);
                    continue;
                }
            };

            if failure_streak > 0 {
                info!(port = %self.port.name(), attempts = failure_streak, "Trigger port reconnected");
            } else {
                info!(port = %self.port.name(), policy = %self.config.policy, "Trigger port connected");
            }
            failure_streak = 0;
            shared.connects.fetch_add(1, Ordering::Relaxed);
            shared.connected.store(true, Ordering::Relaxed);
            decoder.reset();

            let exit = Self::pump(&mut link, &mut decoder, shared, tx);
            drop(link);
            shared.connected.store(false, Ordering::Relaxed);

            match exit {
                PumpExit::Stopped => break,
                PumpExit::Failed(e) => {
                    shared.disconnects.fetch_add(1, Ordering::Relaxed);
                    warn!(port = %self.port.name(), error = %e, "Trigger port lost");
                    failure_streak = 1;
                    shared.sleep(self.config.reconnect_backoff);
                }
            }
        }

        debug!(port = %self.port.name(), "Trigger channel stopped");
    }

    fn pump<E>(
        link: &mut P::Link,
        decoder: &mut TriggerDecoder,
        shared: &Shared,
        tx: &mpsc::Sender<E>,
    ) -> PumpExit
    where
        E: From<TriggerEvent>,
    {
        let mut buf = [0u8; READ_BUFFER_SIZE];

        loop {
            if shared.stopping() {
                return PumpExit::Stopped;
            }

            let triggers = match link.read(&mut buf) {
                Ok(0) => usize::from(decoder.flush_idle()),
                Ok(n) => decoder.feed(&buf[..n]),
                Err(e) => return PumpExit::Failed(e),
            };

            for _ in 0..triggers {
                shared.triggers.fetch_add(1, Ordering::Relaxed);
                if tx.blocking_send(TriggerEvent::hardware().into()).is_err() {
                    debug!("Event queue closed, stopping trigger channel");
                    return PumpExit::Stopped;
                }
            }
        }
    }
}

/// Handle to a running trigger channel.
///
/// Dropping the handle asks the thread to stop without waiting for it.
#[derive(Debug)]
pub struct TriggerChannelHandle {
    port_name: String,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl TriggerChannelHandle {
    /// Name of the port being polled.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Snapshot of the line counters.
    pub fn stats(&self) -> TriggerChannelStats {
        self.shared.stats()
    }

    /// Returns `true` while the polling thread is alive.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Stop the polling thread and wait for it to exit.
    ///
    /// Blocks for at most one read timeout (or one backoff step).
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::CommunicationError` if the thread panicked.
    pub fn shutdown(mut self) -> Result<()> {
        self.shared.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            return Err(HardwareError::communication("trigger thread panicked"));
        }
        info!(port = %self.port_name, "Trigger channel shut down");
        Ok(())
    }
}

impl Drop for TriggerChannelHandle {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockRead, MockSession, MockTriggerPort};
    use kiosklock_core::TriggerKind;

    fn fast_config(policy: TriggerPolicy) -> TriggerChannelConfig {
        TriggerChannelConfig {
            policy,
            reconnect_backoff: Duration::from_millis(5),
        }
    }

    async fn next_event(rx: &mut mpsc::Receiver<TriggerEvent>) -> TriggerEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for trigger")
            .expect("channel closed")
    }

    async fn stop(handle: TriggerChannelHandle) {
        tokio::task::spawn_blocking(move || handle.shutdown())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_token_lines_become_events() {
        let port = MockTriggerPort::with_sessions(
            "mock0",
            vec![MockSession::Connected(vec![
                MockRead::data("boot ok\r\n"),
                MockRead::data("TRIGGER\r\n"),
                MockRead::data("noise\r\nTRIG"),
                MockRead::data("GER\r\n"),
            ])],
        );
        let (tx, mut rx) = mpsc::channel(16);
        let handle = TriggerChannel::new(port, fast_config(TriggerPolicy::default()))
            .start(tx)
            .unwrap();

        assert_eq!(next_event(&mut rx).await.kind, TriggerKind::HardwareTrigger);
        assert_eq!(next_event(&mut rx).await.kind, TriggerKind::HardwareTrigger);
        assert_eq!(handle.stats().triggers, 2);
        assert!(rx.try_recv().is_err());

        stop(handle).await;
    }

    #[tokio::test]
    async fn test_any_line_policy_flushes_partial_line_on_idle() {
        let port = MockTriggerPort::with_sessions(
            "mock0",
            vec![MockSession::Connected(vec![
                MockRead::data("hello\n"),
                MockRead::Idle,
                MockRead::data("x"),
            ])],
        );
        let (tx, mut rx) = mpsc::channel(16);
        let handle = TriggerChannel::new(port, fast_config(TriggerPolicy::AnyLine))
            .start(tx)
            .unwrap();

        next_event(&mut rx).await;
        next_event(&mut rx).await;
        assert_eq!(handle.stats().triggers, 2);

        stop(handle).await;
    }

    #[tokio::test]
    async fn test_reconnects_after_open_failures_and_disconnect() {
        let port = MockTriggerPort::with_sessions(
            "mock0",
            vec![
                MockSession::OpenFails,
                MockSession::OpenFails,
                MockSession::Connected(vec![MockRead::Fail]),
                MockSession::Connected(vec![MockRead::data("TRIGGER\n")]),
            ],
        );
        let observer = port.clone();
        let (tx, mut rx) = mpsc::channel(16);
        let handle = TriggerChannel::new(port, fast_config(TriggerPolicy::default()))
            .start(tx)
            .unwrap();

        next_event(&mut rx).await;

        let stats = handle.stats();
        assert_eq!(stats.failed_opens, 2);
        assert_eq!(stats.connects, 2);
        assert_eq!(stats.disconnects, 1);
        assert!(stats.connected);
        assert_eq!(observer.open_attempts(), 4);
        assert_eq!(observer.open_links(), 1);

        stop(handle).await;
        assert_eq!(observer.open_links(), 0);
    }

    #[tokio::test]
    async fn test_keeps_retrying_while_port_absent() {
        let port = MockTriggerPort::new("mock0");
        let observer = port.clone();
        let (tx, mut rx) = mpsc::channel::<TriggerEvent>(16);
        let handle = TriggerChannel::new(port, fast_config(TriggerPolicy::default()))
            .start(tx)
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_running());
        assert!(observer.open_attempts() > 1);

        // Device plugged in later
        observer.push(MockSession::Connected(vec![MockRead::data("TRIGGER\n")]));
        next_event(&mut rx).await;

        stop(handle).await;
    }

    #[test]
    fn test_closed_queue_stops_thread() {
        let port = MockTriggerPort::with_sessions(
            "mock0",
            vec![MockSession::Connected(vec![MockRead::data("TRIGGER\n")])],
        );
        let observer = port.clone();
        let (tx, rx) = mpsc::channel::<TriggerEvent>(1);
        drop(rx);

        let handle = TriggerChannel::new(port, fast_config(TriggerPolicy::default()))
            .start(tx)
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.is_running() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!handle.is_running());
        assert_eq!(handle.stats().triggers, 1);
        assert_eq!(observer.open_links(), 0);
        handle.shutdown().unwrap();
    }

    #[test]
    fn test_dropping_receiver_releases_thread_blocked_on_full_queue() {
        let port = MockTriggerPort::with_sessions(
            "mock0",
            vec![MockSession::Connected(vec![MockRead::data(
                "TRIGGER\nTRIGGER\nTRIGGER\n",
            )])],
        );
        let (tx, rx) = mpsc::channel::<TriggerEvent>(1);
        let handle = TriggerChannel::new(port, fast_config(TriggerPolicy::default()))
            .start(tx)
            .unwrap();

        // First event fills the queue, the second send parks the thread
        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.stats().triggers < 2 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(handle.stats().triggers, 2);
        assert!(handle.is_running());

        drop(rx);
        let started = Instant::now();
        handle.shutdown().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_shutdown_interrupts_backoff() {
        let port = MockTriggerPort::new("mock0");
        let (tx, _rx) = mpsc::channel::<TriggerEvent>(1);
        let config = TriggerChannelConfig {
            policy: TriggerPolicy::default(),
            reconnect_backoff: Duration::from_secs(60),
        };
        let handle = TriggerChannel::new(port, config).start(tx).unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let started = Instant::now();
        handle.shutdown().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
