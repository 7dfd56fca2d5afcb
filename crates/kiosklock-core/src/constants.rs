//! Default values shared by the kiosk lock crates.
//!
//! Every tunable of the lock (debounce window, relock period, serial line
//! parameters, entry limits) has its default defined here so the
//! configuration layer, the controller and the trigger channel agree on a
//! single value.
//!
//! # Usage
//!
//! ```
//! use kiosklock_core::constants::*;
//! use std::time::Duration;
//!
//! let debounce = Duration::from_millis(DEFAULT_TRIGGER_MIN_INTERVAL_MS);
//! assert_eq!(debounce, Duration::from_secs(1));
//! assert_eq!(DEFAULT_TRIGGER_TOKEN, "TRIGGER");
//! ```

// ============================================================================
// Lock Behaviour
// ============================================================================

/// Idle period after which an unlocked display is locked again, in seconds.
///
/// A value of `0` in configuration disables auto-relock entirely.
pub const DEFAULT_AUTO_RELOCK_SECS: u64 = 90;

/// Minimum interval between two accepted hardware triggers, in milliseconds.
///
/// Triggers arriving sooner than this after the last *accepted* trigger are
/// dropped. This absorbs electrical bounce and duplicate pulses from the
/// external reader.
pub const DEFAULT_TRIGGER_MIN_INTERVAL_MS: u64 = 1_000;

/// Delay before the overlay is shown for the first time after startup, in seconds.
///
/// `0` locks the display immediately.
pub const DEFAULT_INITIAL_LOCK_DELAY_SECS: u64 = 0;

/// Maximum number of characters held by the entry buffer.
pub const MAX_ENTRY_LENGTH: usize = 32;

/// How long a transient error message stays visible, in milliseconds.
pub const DEFAULT_ERROR_DISPLAY_MS: u64 = 900;

/// Maximum number of lock transitions retained for diagnostics.
pub const MAX_TRANSITION_HISTORY: usize = 100;

// ============================================================================
// Serial Trigger Line
// ============================================================================

/// Baud rate used by the trigger microcontroller.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Bounded read timeout on the serial line, in milliseconds.
///
/// The polling thread only ever blocks inside a read of at most this long,
/// which bounds shutdown latency as well.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 200;

/// Pause between two attempts to open (or reopen) the serial port, in milliseconds.
pub const DEFAULT_RECONNECT_BACKOFF_MS: u64 = 1_000;

/// Line the trigger firmware prints for every detected pulse.
pub const DEFAULT_TRIGGER_TOKEN: &str = "TRIGGER";

/// Longest line accepted from the serial device, in bytes.
///
/// Anything longer is line noise and is discarded without producing a trigger.
pub const MAX_TRIGGER_LINE_LENGTH: usize = 256;

/// Default serial port name for the current platform.
#[cfg(windows)]
pub const DEFAULT_SERIAL_PORT: &str = "COM5";

/// Default serial port name for the current platform.
#[cfg(not(windows))]
pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyACM0";

// ============================================================================
// Credential Source
// ============================================================================

/// Default credential file name, resolved relative to the working directory.
pub const DEFAULT_CREDENTIALS_FILE: &str = "kiosklock_credentials.txt";

/// Comment marker in the credential file.
pub const CREDENTIAL_COMMENT_PREFIX: char = '#';

/// Separator between a code and its optional label.
pub const CREDENTIAL_LABEL_SEPARATOR: char = ':';

/// Content written when the credential file does not exist at startup.
///
/// Contains one documented example of each supported line form so a fresh
/// installation can be unlocked and the format is self-explanatory.
pub const SAMPLE_CREDENTIALS: &str = "\
# kiosklock credentials: one code per line
# Optional label: CODE: Name
# Card UIDs are written as hexadecimal (e.g. 04A2B3C4)
2580: Staff
8246
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_credentials_has_example_codes() {
        let codes: Vec<&str> = SAMPLE_CREDENTIALS
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with(CREDENTIAL_COMMENT_PREFIX))
            .collect();
        assert_eq!(codes, vec!["2580: Staff", "8246"]);
    }

    #[test]
    fn test_timing_defaults_are_consistent() {
        assert!(DEFAULT_READ_TIMEOUT_MS < DEFAULT_RECONNECT_BACKOFF_MS);
        assert!(DEFAULT_TRIGGER_MIN_INTERVAL_MS < DEFAULT_AUTO_RELOCK_SECS * 1_000);
    }
}
