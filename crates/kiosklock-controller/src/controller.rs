//! The lock controller: sole owner of the lock state and the entry buffer.
//!
//! The controller is a plain synchronous object. Every input arrives as a
//! [`LockEvent`] through [`LockController::dispatch`], which returns the
//! [`OverlayCommand`]s the presentation layer must apply. Callers serialize
//! dispatch (see [`crate::runtime::run`]); the controller never locks.
//!
//! # Rules
//!
//! - Overlay visibility follows the state: every transition to `Locked`
//!   emits `ShowOverlay`, every transition to `Unlocked` emits `HideOverlay`.
//! - Hardware triggers are debounced: a trigger closer than the minimum
//!   interval to the last accepted one is dropped and has no effect at all.
//! - Entry edits and submissions are serviced while locked, and while
//!   unlocked only if the service entry surface is open.
//! - A credential lookup failure counts as a mismatch. Nothing unlocks on
//!   uncertain input.
//! - Any accepted activity while unlocked restarts the relock countdown.

use std::time::Duration;

use chrono::{DateTime, Utc};
use kiosklock_core::constants::{
    DEFAULT_AUTO_RELOCK_SECS, DEFAULT_ERROR_DISPLAY_MS, DEFAULT_INITIAL_LOCK_DELAY_SECS,
    DEFAULT_TRIGGER_MIN_INTERVAL_MS, MAX_ENTRY_LENGTH,
};
use kiosklock_core::{CardUid, LockState, TriggerEvent, TriggerKind};
use kiosklock_storage::{Credential, CredentialCheck};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::entry::EntryBuffer;
use crate::events::{LockEvent, OverlayCommand, TransientError};
use crate::scheduler::RelockScheduler;
use crate::state_machine::{LockStateMachine, LockTransition, TransitionCause};

/// Which service-surface input counts as activity for the relock countdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceActivity {
    /// Only a successful submission restarts the countdown.
    #[default]
    Submission,

    /// Every keystroke on the service surface restarts the countdown.
    Keystroke,
}

/// Tunables of the lock controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Idle period before relocking. Zero disables auto-relock.
    pub relock_after: Duration,

    /// Minimum spacing between accepted hardware triggers.
    pub trigger_min_interval: Duration,

    /// Start unlocked and lock after this delay. Zero starts locked.
    pub initial_lock_delay: Duration,

    /// Maximum number of characters in the entry buffer.
    pub max_entry_length: usize,

    /// Code accepted in addition to the credential store.
    pub service_pin: Option<String>,

    /// Relock activity policy for the service surface.
    pub service_activity: ServiceActivity,

    /// How long transient errors stay visible.
    pub error_display: Duration,

    /// Also match card UIDs against entries written in decimal form.
    pub match_decimal_uid: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            relock_after: Duration::from_secs(DEFAULT_AUTO_RELOCK_SECS),
            trigger_min_interval: Duration::from_millis(DEFAULT_TRIGGER_MIN_INTERVAL_MS),
            initial_lock_delay: Duration::from_secs(DEFAULT_INITIAL_LOCK_DELAY_SECS),
            max_entry_length: MAX_ENTRY_LENGTH,
            service_pin: None,
            service_activity: ServiceActivity::default(),
            error_display: Duration::from_millis(DEFAULT_ERROR_DISPLAY_MS),
            match_decimal_uid: false,
        }
    }
}

/// Serializable snapshot of the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockStatus {
    pub state: LockState,
    pub entry_length: usize,
    pub service_open: bool,
    /// Milliseconds until the relock deadline, if one is armed.
    pub relock_in_ms: Option<u64>,
    pub credential_count: usize,
    pub credentials_loaded_at: Option<DateTime<Utc>>,
    pub transitions: usize,
    pub last_transition: Option<LockTransition>,
}

/// The lock state machine driven by events.
#[derive(Debug)]
pub struct LockController<C> {
    config: ControllerConfig,
    store: C,
    machine: LockStateMachine,
    entry: EntryBuffer,
    scheduler: RelockScheduler,
    last_trigger: Option<Instant>,
    service_open: bool,
}

impl<C: CredentialCheck> LockController<C> {
    /// Create a controller. Relock requests are posted into `events`, which
    /// must feed back into [`dispatch`](Self::dispatch).
    ///
    /// # Panics
    ///
    /// Panics if `config.initial_lock_delay` is non-zero and this is called
    /// outside a Tokio runtime.
    pub fn new(config: ControllerConfig, store: C, events: mpsc::Sender<LockEvent>) -> Self {
        let mut scheduler = RelockScheduler::new(events);
        let initial = if config.initial_lock_delay.is_zero() {
            LockState::Locked
        } else {
            scheduler.arm(config.initial_lock_delay);
            LockState::Unlocked
        };

        info!(
            state = %initial,
            relock_secs = config.relock_after.as_secs(),
            credentials = store.credential_count(),
            "Lock controller ready"
        );

        Self {
            entry: EntryBuffer::new(config.max_entry_length),
            machine: LockStateMachine::new(initial),
            config,
            store,
            scheduler,
            last_trigger: None,
            service_open: false,
        }
    }

    /// Handle one event, returning the commands for the presentation layer.
    pub fn dispatch(&mut self, event: LockEvent) -> Vec<OverlayCommand> {
        let mut commands = Vec::new();

        match event {
            LockEvent::ManualDigit(ch) => self.on_digit(ch, &mut commands),
            LockEvent::Backspace => {
                if self.entry_enabled() {
                    if self.entry.pop().is_some() {
                        commands.push(self.entry_changed());
                    }
                    self.note_service_keystroke();
                }
            }
            LockEvent::Clear => {
                if self.entry_enabled() {
                    self.clear_entry(&mut commands);
                    self.note_service_keystroke();
                }
            }
            LockEvent::Submit => {
                if self.entry_enabled() {
                    let code = self.entry.as_str().to_string();
                    self.submit_code(&code, &mut commands);
                }
            }
            LockEvent::Trigger(trigger) => self.on_trigger(trigger, &mut commands),
            LockEvent::RelockFired { generation } => {
                if !self.scheduler.acknowledge(generation) {
                    debug!(generation, "Ignoring stale relock");
                } else if self.state() == LockState::Unlocked {
                    self.lock(TransitionCause::RelockTimer, &mut commands);
                }
            }
            LockEvent::LockNow => {
                if self.state() == LockState::Unlocked {
                    self.lock(TransitionCause::LockNow, &mut commands);
                }
            }
            LockEvent::ServiceOpened => {
                debug!("Service entry opened");
                self.service_open = true;
            }
            LockEvent::ServiceClosed => {
                debug!("Service entry closed");
                self.service_open = false;
                self.clear_entry(&mut commands);
            }
            LockEvent::StatusRequested => {}
        }

        commands
    }

    /// Current lock state.
    pub fn state(&self) -> LockState {
        self.machine.state()
    }

    /// The overlay command matching the current state.
    pub fn overlay(&self) -> OverlayCommand {
        OverlayCommand::for_state(self.state())
    }

    /// Characters entered so far.
    pub fn entry(&self) -> &EntryBuffer {
        &self.entry
    }

    /// Returns `true` while the service entry surface is open.
    pub fn is_service_open(&self) -> bool {
        self.service_open
    }

    /// The pending relock deadline, if armed.
    pub fn relock_deadline(&self) -> Option<Instant> {
        self.scheduler.deadline()
    }

    /// State machine with transition history.
    pub fn machine(&self) -> &LockStateMachine {
        &self.machine
    }

    /// The credential backend.
    pub fn store(&self) -> &C {
        &self.store
    }

    /// Snapshot for diagnostics.
    pub fn status(&self) -> LockStatus {
        LockStatus {
            state: self.state(),
            entry_length: self.entry.len(),
            service_open: self.service_open,
            relock_in_ms: self
                .scheduler
                .remaining()
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            credential_count: self.store.credential_count(),
            credentials_loaded_at: self.store.loaded_at(),
            transitions: self.machine.history().len(),
            last_transition: self.machine.last_transition().cloned(),
        }
    }

    /// Cancel the pending relock deadline. Called when the dispatch loop exits.
    pub fn shutdown(&mut self) {
        self.scheduler.cancel();
    }

    fn entry_enabled(&self) -> bool {
        self.state() == LockState::Locked || self.service_open
    }

    fn entry_changed(&self) -> OverlayCommand {
        OverlayCommand::EntryChanged {
            length: self.entry.len(),
        }
    }

    fn clear_entry(&mut self, commands: &mut Vec<OverlayCommand>) {
        if self.entry.clear() {
            commands.push(self.entry_changed());
        }
    }

    fn show_error(&self, error: TransientError, commands: &mut Vec<OverlayCommand>) {
        commands.push(OverlayCommand::ShowTransientError {
            error,
            duration: self.config.error_display,
        });
    }

    fn on_digit(&mut self, ch: char, commands: &mut Vec<OverlayCommand>) {
        if !self.entry_enabled() {
            trace!("Entry ignored while unlocked");
            return;
        }
        if !ch.is_ascii_alphanumeric() {
            debug!(?ch, "Ignoring non-alphanumeric entry");
            return;
        }

        if self.entry.push(ch) {
            commands.push(self.entry_changed());
        } else {
            self.show_error(TransientError::BufferFull, commands);
        }
        self.note_service_keystroke();
    }

    /// Restart the countdown for a service keystroke, if that policy is on.
    fn note_service_keystroke(&mut self) {
        if self.service_open
            && self.state() == LockState::Unlocked
            && self.config.service_activity == ServiceActivity::Keystroke
        {
            self.restart_relock();
        }
    }

    fn on_trigger(&mut self, trigger: TriggerEvent, commands: &mut Vec<OverlayCommand>) {
        match trigger.kind {
            TriggerKind::HardwareTrigger => {
                if !self.debounce(trigger.timestamp) {
                    debug!("Hardware trigger dropped by debounce");
                    return;
                }
                match self.state() {
                    LockState::Locked => self.unlock(TransitionCause::HardwareTrigger, commands),
                    LockState::Unlocked => {
                        debug!("Hardware trigger while unlocked, restarting relock");
                        self.restart_relock();
                    }
                }
            }
            TriggerKind::ManualPin(code) => {
                if self.entry_enabled() {
                    self.submit_code(&code, commands);
                } else {
                    trace!("Keypad code ignored while unlocked");
                }
            }
            TriggerKind::CardUid(raw) => self.on_card(&raw, commands),
        }
    }

    /// Returns `true` if a hardware trigger at `timestamp` is accepted.
    fn debounce(&mut self, timestamp: Instant) -> bool {
        if let Some(last) = self.last_trigger
            && timestamp.saturating_duration_since(last) < self.config.trigger_min_interval
        {
            return false;
        }
        self.last_trigger = Some(timestamp);
        true
    }

    fn submit_code(&mut self, code: &str, commands: &mut Vec<OverlayCommand>) {
        if code.is_empty() {
            return;
        }

        let accepted = self.is_service_pin(code) || self.lookup(code).is_some();
        self.clear_entry(commands);

        match (self.state(), accepted) {
            (LockState::Locked, true) => self.unlock(TransitionCause::Credential, commands),
            (LockState::Unlocked, true) => {
                debug!("Service entry accepted, restarting relock");
                self.restart_relock();
            }
            (_, false) => {
                info!(length = code.chars().count(), "Code rejected");
                self.show_error(TransientError::InvalidCode, commands);
            }
        }
    }

    fn on_card(&mut self, raw: &str, commands: &mut Vec<OverlayCommand>) {
        let accepted = match CardUid::parse(raw) {
            Ok(uid) => self.lookup_card(&uid).is_some(),
            Err(e) => {
                warn!(error = %e, len = raw.len(), "Unreadable card UID");
                false
            }
        };

        match (self.state(), accepted) {
            (LockState::Locked, true) => self.unlock(TransitionCause::Card, commands),
            (LockState::Locked, false) => {
                info!("Card rejected");
                self.clear_entry(commands);
                self.show_error(TransientError::InvalidCode, commands);
            }
            (LockState::Unlocked, true) => {
                debug!("Card accepted while unlocked, restarting relock");
                self.restart_relock();
            }
            (LockState::Unlocked, false) => debug!("Unknown card ignored while unlocked"),
        }
    }

    fn is_service_pin(&self, code: &str) -> bool {
        let matched = self.config.service_pin.as_deref() == Some(code);
        if matched {
            info!("Service PIN accepted");
        }
        matched
    }

    /// Query the credential store. Failures count as no match.
    fn lookup(&mut self, code: &str) -> Option<Credential> {
        match self.store.check(code) {
            Ok(Some(credential)) => {
                info!(
                    label = credential.label.as_deref().unwrap_or("-"),
                    "Credential accepted"
                );
                Some(credential)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Credential store unavailable, treating as mismatch");
                None
            }
        }
    }

    fn lookup_card(&mut self, uid: &CardUid) -> Option<Credential> {
        if let Some(credential) = self.lookup(uid.as_hex()) {
            return Some(credential);
        }
        if !self.config.match_decimal_uid {
            return None;
        }
        self.lookup(&uid.decimal())
            .or_else(|| self.lookup(&uid.decimal_reversed()))
    }

    fn unlock(&mut self, cause: TransitionCause, commands: &mut Vec<OverlayCommand>) {
        if let Err(e) = self.machine.transition_to(LockState::Unlocked, cause) {
            warn!(error = %e, "Unlock rejected");
            return;
        }
        self.clear_entry(commands);
        commands.push(OverlayCommand::HideOverlay);
        self.restart_relock();
        info!(%cause, "Display unlocked");
    }

    fn lock(&mut self, cause: TransitionCause, commands: &mut Vec<OverlayCommand>) {
        if let Err(e) = self.machine.transition_to(LockState::Locked, cause) {
            warn!(error = %e, "Lock rejected");
            return;
        }
        self.scheduler.cancel();
        self.clear_entry(commands);
        commands.push(OverlayCommand::ShowOverlay);
        info!(%cause, "Display locked");
    }

    fn restart_relock(&mut self) {
        self.scheduler.arm(self.config.relock_after);
    }
}
