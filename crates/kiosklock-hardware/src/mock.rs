//! Scripted trigger port for testing and development.
//!
//! A [`MockTriggerPort`] replays a script of connection sessions: each call to
//! `open` consumes the next [`MockSession`], and each read on an open link
//! consumes the next [`MockRead`] of that session. Clones share the script, so
//! a test can keep one clone to extend the script and inspect counters while
//! the trigger channel owns the other.
//!
//! # Examples
//!
//! ```
//! use kiosklock_hardware::mock::{MockRead, MockSession, MockTriggerPort};
//! use kiosklock_hardware::traits::{TriggerLink, TriggerPort};
//!
//! let mut port = MockTriggerPort::new("mock0");
//! port.push(MockSession::OpenFails);
//! port.push(MockSession::Connected(vec![MockRead::data("TRIGGER\r\n")]));
//!
//! assert!(port.open().is_err());
//! let mut link = port.open().unwrap();
//! let mut buf = [0u8; 32];
//! assert_eq!(link.read(&mut buf).unwrap(), 9);
//! ```

use crate::error::{HardwareError, Result};
use crate::traits::{TriggerLink, TriggerPort};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// How long an idle mock read blocks, standing in for the port timeout.
const IDLE_READ_DELAY: Duration = Duration::from_millis(5);

/// One scripted read on an open link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockRead {
    /// Bytes delivered by the read.
    Data(Vec<u8>),

    /// The read times out without data.
    Idle,

    /// The line fails (device unplugged).
    Fail,
}

impl MockRead {
    /// Bytes delivered by a single read.
    pub fn data(bytes: impl AsRef<[u8]>) -> Self {
        MockRead::Data(bytes.as_ref().to_vec())
    }
}

/// One scripted call to `open`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockSession {
    /// Opening fails (device absent or busy).
    OpenFails,

    /// Opening succeeds and the link replays these reads, then stays idle.
    Connected(Vec<MockRead>),
}

#[derive(Debug, Default)]
struct MockState {
    sessions: VecDeque<MockSession>,
    open_attempts: usize,
    open_links: usize,
}

/// Trigger port replaying a shared script.
#[derive(Debug, Clone)]
pub struct MockTriggerPort {
    name: String,
    state: Arc<Mutex<MockState>>,
}

impl MockTriggerPort {
    /// Create a port with an empty script. Opening it fails until sessions
    /// are pushed.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Create a port with a prepared script.
    pub fn with_sessions(name: impl Into<String>, sessions: Vec<MockSession>) -> Self {
        let port = Self::new(name);
        port.lock().sessions.extend(sessions);
        port
    }

    /// Append a session to the script.
    pub fn push(&self, session: MockSession) {
        self.lock().sessions.push_back(session);
    }

    /// Number of `open` calls made so far.
    pub fn open_attempts(&self) -> usize {
        self.lock().open_attempts
    }

    /// Number of links currently open.
    pub fn open_links(&self) -> usize {
        self.lock().open_links
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        lock_state(&self.state)
    }
}

fn lock_state(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TriggerPort for MockTriggerPort {
    type Link = MockLink;

    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<MockLink> {
        let mut state = self.lock();
        state.open_attempts += 1;

        match state.sessions.pop_front() {
            Some(MockSession::Connected(reads)) => {
                state.open_links += 1;
                Ok(MockLink {
                    name: self.name.clone(),
                    reads: reads.into(),
                    state: Arc::clone(&self.state),
                })
            }
            Some(MockSession::OpenFails) => Err(HardwareError::initialization_failed(format!(
                "{}: scripted open failure",
                self.name
            ))),
            None => Err(HardwareError::disconnected(&self.name)),
        }
    }
}

/// Link produced by [`MockTriggerPort`].
#[derive(Debug)]
pub struct MockLink {
    name: String,
    reads: VecDeque<MockRead>,
    state: Arc<Mutex<MockState>>,
}

impl TriggerLink for MockLink {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.reads.pop_front() {
            Some(MockRead::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    // Deliver the remainder on the next read
                    self.reads.push_front(MockRead::Data(data.split_off(n)));
                }
                Ok(n)
            }
            Some(MockRead::Fail) => Err(HardwareError::disconnected(&self.name)),
            Some(MockRead::Idle) | None => {
                std::thread::sleep(IDLE_READ_DELAY);
                Ok(0)
            }
        }
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        lock_state(&self.state).open_links -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_script_fails_to_open() {
        let mut port = MockTriggerPort::new("mock0");
        assert!(port.open().is_err());
        assert_eq!(port.open_attempts(), 1);
        assert_eq!(port.open_links(), 0);
    }

    #[test]
    fn test_link_replays_reads_then_idles() {
        let mut port = MockTriggerPort::with_sessions(
            "mock0",
            vec![MockSession::Connected(vec![
                MockRead::data("ab"),
                MockRead::Idle,
                MockRead::Fail,
            ])],
        );
        let mut link = port.open().unwrap();
        let mut buf = [0u8; 8];

        assert_eq!(link.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ab");
        assert_eq!(link.read(&mut buf).unwrap(), 0);
        assert!(link.read(&mut buf).is_err());
        assert_eq!(link.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_large_data_split_over_reads() {
        let mut port = MockTriggerPort::with_sessions(
            "mock0",
            vec![MockSession::Connected(vec![MockRead::data("abcdef")])],
        );
        let mut link = port.open().unwrap();
        let mut buf = [0u8; 4];

        assert_eq!(link.read(&mut buf).unwrap(), 4);
        assert_eq!(link.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
    }

    #[test]
    fn test_open_links_tracks_drop() {
        let mut port = MockTriggerPort::new("mock0");
        port.push(MockSession::Connected(vec![]));
        let observer = port.clone();

        let link = port.open().unwrap();
        assert_eq!(observer.open_links(), 1);
        drop(link);
        assert_eq!(observer.open_links(), 0);
    }
}
