//! Translation of the raw serial byte stream into discrete triggers.
//!
//! The trigger firmware prints one line per detected pulse. The decoder
//! splits the stream into lines on `\n` or `\r` and asks the configured
//! [`TriggerPolicy`] whether each line is a trigger.
//!
//! # Acceptance Policy
//!
//! Two policies exist because deployed firmware differs:
//!
//! - [`TriggerPolicy::Token`] (default): only a line equal to the token
//!   (after trimming) counts. Line noise, boot banners and partial garbage
//!   never unlock the display.
//! - [`TriggerPolicy::AnyLine`]: any non-empty line counts. Works with
//!   adapters that emit arbitrary data per pulse, at the cost of treating
//!   noise as a trigger.
//!
//! A partial line left pending when a read times out is evaluated as if it
//! had been terminated, matching a timed-out `readline`.
//!
//! # Examples
//!
//! ```
//! use kiosklock_hardware::decoder::{TriggerDecoder, TriggerPolicy};
//!
//! let mut decoder = TriggerDecoder::new(TriggerPolicy::default());
//! assert_eq!(decoder.feed(b"TRIGGER\r\nboot ok\r\nTRIG"), 1);
//! assert_eq!(decoder.feed(b"GER\r\n"), 1);
//! ```

use bytes::{BufMut, BytesMut};
use kiosklock_core::constants::{DEFAULT_TRIGGER_TOKEN, MAX_TRIGGER_LINE_LENGTH};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

/// Rule deciding which received lines count as a trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPolicy {
    /// Only lines equal to this token (after trimming) are triggers.
    Token(String),

    /// Every non-empty line is a trigger.
    AnyLine,
}

impl TriggerPolicy {
    /// Returns `true` if `line` is a trigger under this policy.
    pub fn accepts(&self, line: &str) -> bool {
        let line = line.trim();
        match self {
            TriggerPolicy::Token(token) => line == token,
            TriggerPolicy::AnyLine => !line.is_empty(),
        }
    }
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        TriggerPolicy::Token(DEFAULT_TRIGGER_TOKEN.to_string())
    }
}

impl fmt::Display for TriggerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerPolicy::Token(token) => write!(f, "token '{token}'"),
            TriggerPolicy::AnyLine => write!(f, "any line"),
        }
    }
}

/// Incremental line decoder for the trigger stream.
#[derive(Debug)]
pub struct TriggerDecoder {
    policy: TriggerPolicy,

    /// Bytes of the line currently being received.
    pending: BytesMut,

    /// Set once the current line exceeded the length limit.
    overflow: bool,
}

impl TriggerDecoder {
    /// Create a decoder applying `policy`.
    pub fn new(policy: TriggerPolicy) -> Self {
        Self {
            policy,
            pending: BytesMut::with_capacity(MAX_TRIGGER_LINE_LENGTH),
            overflow: false,
        }
    }

    /// The acceptance policy in use.
    pub fn policy(&self) -> &TriggerPolicy {
        &self.policy
    }

    /// Feed received bytes. Returns how many triggers they completed.
    ///
    /// Every accepted line counts individually; nothing is coalesced.
    pub fn feed(&mut self, data: &[u8]) -> usize {
        let mut triggers = 0;
        for &byte in data {
            match byte {
                b'\n' | b'\r' => {
                    if self.complete_line() {
                        triggers += 1;
                    }
                }
                _ if self.pending.len() >= MAX_TRIGGER_LINE_LENGTH => self.overflow = true,
                _ => self.pending.put_u8(byte),
            }
        }
        triggers
    }

    /// Evaluate a partial line after a read timed out with no further data.
    ///
    /// Returns `true` if the pending bytes form a trigger.
    pub fn flush_idle(&mut self) -> bool {
        if self.pending.is_empty() && !self.overflow {
            return false;
        }
        self.complete_line()
    }

    /// Drop any partially received line (used after reconnecting).
    pub fn reset(&mut self) {
        self.pending.clear();
        self.overflow = false;
    }

    fn complete_line(&mut self) -> bool {
        let line = self.pending.split();
        if std::mem::take(&mut self.overflow) {
            trace!(len = line.len(), "Discarding overlong serial line");
            return false;
        }
        if line.is_empty() {
            return false;
        }

        let text = String::from_utf8_lossy(&line);
        let accepted = self.policy.accepts(&text);
        trace!(line = %text.trim(), accepted, "Serial line received");
        accepted
    }
}
