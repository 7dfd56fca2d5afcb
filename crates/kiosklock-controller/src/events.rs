//! Events consumed and commands emitted by the lock controller.

use std::fmt;
use std::time::Duration;

use kiosklock_core::{LockState, TriggerEvent};

/// Input to the lock controller.
///
/// Every source (keypad surface, trigger channel, relock timer) posts one of
/// these into the controller's queue; they are handled strictly in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockEvent {
    /// A character typed on the entry surface.
    ManualDigit(char),

    /// Remove the last entered character.
    Backspace,

    /// Clear the whole entry.
    Clear,

    /// Submit the entry for a credential check.
    Submit,

    /// Trigger from an input device (hardware pulse, keypad PIN, card UID).
    Trigger(TriggerEvent),

    /// The relock countdown armed under `generation` expired.
    RelockFired {
        /// Generation token of the `arm` call that scheduled it.
        generation: u64,
    },

    /// Lock immediately.
    LockNow,

    /// The service entry surface was opened.
    ServiceOpened,

    /// The service entry surface was closed.
    ServiceClosed,

    /// Ask the dispatch loop to report the current status.
    StatusRequested,
}

impl From<TriggerEvent> for LockEvent {
    fn from(event: TriggerEvent) -> Self {
        LockEvent::Trigger(event)
    }
}

/// Short-lived error shown on the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransientError {
    /// Submitted code or card is not authorized.
    InvalidCode,

    /// Entry already holds the maximum number of characters.
    BufferFull,
}

impl TransientError {
    /// Text shown to the user.
    pub fn message(&self) -> &'static str {
        match self {
            TransientError::InvalidCode => "Invalid code",
            TransientError::BufferFull => "Entry too long",
        }
    }
}

impl fmt::Display for TransientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Instruction for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayCommand {
    /// Show the lock overlay.
    ShowOverlay,

    /// Hide the lock overlay.
    HideOverlay,

    /// Flash an error, clearing it after `duration`.
    ShowTransientError {
        error: TransientError,
        duration: Duration,
    },

    /// The entry changed; render `length` masked characters.
    EntryChanged { length: usize },
}

impl OverlayCommand {
    /// The overlay command matching `state`.
    pub fn for_state(state: LockState) -> Self {
        if state.overlay_visible() {
            OverlayCommand::ShowOverlay
        } else {
            OverlayCommand::HideOverlay
        }
    }
}
