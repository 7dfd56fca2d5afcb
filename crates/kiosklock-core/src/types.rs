use crate::{Result, error::Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

/// Maximum card UID size in bytes (ISO 14443 triple-size UIDs are 10 bytes).
const MAX_UID_BYTES: usize = 16;

/// Lock state of the display.
///
/// Overlay visibility is derived from this value and never stored separately:
/// `Locked` means the overlay is shown, `Unlocked` means it is hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    /// Overlay shown, waiting for a credential or hardware trigger.
    Locked,
    /// Overlay hidden, relock countdown (if enabled) running.
    Unlocked,
}

impl LockState {
    /// Returns `true` if the overlay must be visible in this state.
    #[inline]
    #[must_use]
    pub fn overlay_visible(self) -> bool {
        matches!(self, LockState::Locked)
    }

    /// Returns `true` if the state is `Locked`.
    #[inline]
    #[must_use]
    pub fn is_locked(self) -> bool {
        matches!(self, LockState::Locked)
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LockState::Locked => write!(f, "Locked"),
            LockState::Unlocked => write!(f, "Unlocked"),
        }
    }
}

/// Origin of a trigger event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerKind {
    /// Pulse from the external reader over the serial line.
    HardwareTrigger,
    /// Complete code submitted at once by a keypad device.
    ManualPin(String),
    /// Card UID read by a card reader, submitted automatically.
    CardUid(String),
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TriggerKind::HardwareTrigger => write!(f, "HardwareTrigger"),
            TriggerKind::ManualPin(_) => write!(f, "ManualPin"),
            TriggerKind::CardUid(_) => write!(f, "CardUid"),
        }
    }
}

/// A trigger occurrence, stamped with its arrival time.
///
/// Trigger events are transient: they are produced by an input source,
/// handed to the lock controller and consumed immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    /// What kind of trigger occurred.
    pub kind: TriggerKind,
    /// When the trigger was observed.
    pub timestamp: Instant,
}

impl TriggerEvent {
    /// Create a trigger event stamped with the current time.
    #[must_use]
    pub fn new(kind: TriggerKind) -> Self {
        Self::at(kind, Instant::now())
    }

    /// Create a trigger event with an explicit timestamp.
    #[must_use]
    pub fn at(kind: TriggerKind, timestamp: Instant) -> Self {
        Self { kind, timestamp }
    }

    /// Hardware pulse observed now.
    #[must_use]
    pub fn hardware() -> Self {
        Self::new(TriggerKind::HardwareTrigger)
    }

    /// Card UID observed now.
    #[must_use]
    pub fn card(uid: impl Into<String>) -> Self {
        Self::new(TriggerKind::CardUid(uid.into()))
    }

    /// Full keypad code observed now.
    #[must_use]
    pub fn pin(code: impl Into<String>) -> Self {
        Self::new(TriggerKind::ManualPin(code.into()))
    }
}

/// Card UID in normalized hexadecimal form.
///
/// Readers report UIDs with different casing and separators (`04:a2:b3:c4`,
/// `04 A2 B3 C4`, `04a2b3c4`). Parsing strips separators and uppercases the
/// digits so all of them compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardUid(String);

impl CardUid {
    /// Parse a card UID from reader output.
    ///
    /// # Errors
    /// Returns `Error::InvalidCardUid` if:
    /// - The UID is empty after removing separators
    /// - It contains characters other than hexadecimal digits
    /// - It has an odd number of digits (UIDs are whole bytes)
    /// - It is longer than 16 bytes
    pub fn parse(raw: &str) -> Result<Self> {
        let hex: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ':' && *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if hex.is_empty() {
            return Err(Error::InvalidCardUid("UID is empty".to_string()));
        }
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidCardUid(format!(
                "UID must be hexadecimal ({} characters given)",
                hex.chars().count()
            )));
        }
        if hex.len() % 2 != 0 {
            return Err(Error::InvalidCardUid(format!(
                "UID must have an even number of digits, got {}",
                hex.len()
            )));
        }
        if hex.len() / 2 > MAX_UID_BYTES {
            return Err(Error::InvalidCardUid(format!(
                "UID must be at most {MAX_UID_BYTES} bytes, got {}",
                hex.len() / 2
            )));
        }

        Ok(CardUid(hex))
    }

    /// Build a UID from raw bytes as returned by a reader.
    ///
    /// # Errors
    /// Returns `Error::InvalidCardUid` if `bytes` is empty or longer than 16 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
        Self::parse(&hex)
    }

    /// Uppercase hexadecimal form without separators.
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// The UID bytes in reader order.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        self.0
            .as_bytes()
            .chunks(2)
            .filter_map(|pair| {
                std::str::from_utf8(pair)
                    .ok()
                    .and_then(|s| u8::from_str_radix(s, 16).ok())
            })
            .collect()
    }

    /// Decimal value of the UID read as a big-endian number.
    ///
    /// Some card printers and access systems list UIDs in this form.
    #[must_use]
    pub fn decimal(&self) -> String {
        Self::to_decimal(self.bytes().into_iter())
    }

    /// Decimal value of the UID with its byte order reversed.
    ///
    /// Readers that report the UID least-significant byte first produce this
    /// form.
    #[must_use]
    pub fn decimal_reversed(&self) -> String {
        Self::to_decimal(self.bytes().into_iter().rev())
    }

    fn to_decimal(bytes: impl Iterator<Item = u8>) -> String {
        bytes
            .fold(0u128, |acc, b| (acc << 8) | u128::from(b))
            .to_string()
    }
}

impl fmt::Display for CardUid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CardUid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CardUid::parse(s)
    }
}
