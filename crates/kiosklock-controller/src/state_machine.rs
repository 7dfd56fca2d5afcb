//! Lock state machine with transition history.
//!
//! The display has exactly two states, and the only legal transitions are
//! between them:
//!
//! - `Locked → Unlocked`: hardware trigger, matching credential or card
//! - `Unlocked → Locked`: relock timer, explicit lock request
//!
//! Staying in a state (e.g. a trigger while already unlocked) is not a
//! transition and is never recorded.
//!
//! # Examples
//!
//! ```
//! use kiosklock_controller::{LockStateMachine, TransitionCause};
//! use kiosklock_core::LockState;
//!
//! let mut machine = LockStateMachine::new(LockState::Locked);
//!
//! machine.transition_to(LockState::Unlocked, TransitionCause::HardwareTrigger).unwrap();
//! assert_eq!(machine.state(), LockState::Unlocked);
//!
//! // Self-transitions are rejected
//! assert!(machine.transition_to(LockState::Unlocked, TransitionCause::Credential).is_err());
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use kiosklock_core::constants::MAX_TRANSITION_HISTORY;
use kiosklock_core::{Error, LockState, Result};
use serde::Serialize;
use tokio::time::Instant;

/// What caused a lock state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    /// Debounced pulse from the trigger line.
    HardwareTrigger,

    /// Submitted code matched the credential store or service PIN.
    Credential,

    /// Card UID matched the credential store.
    Card,

    /// The relock countdown expired.
    RelockTimer,

    /// Explicit request to lock immediately.
    LockNow,
}

impl fmt::Display for TransitionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cause = match self {
            TransitionCause::HardwareTrigger => "hardware trigger",
            TransitionCause::Credential => "credential",
            TransitionCause::Card => "card",
            TransitionCause::RelockTimer => "relock timer",
            TransitionCause::LockNow => "lock now",
        };
        write!(f, "{cause}")
    }
}

/// A recorded state transition.
///
/// The timestamp is monotonic and process-local, so it is not serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockTransition {
    /// State before the transition.
    pub from: LockState,

    /// State after the transition.
    pub to: LockState,

    /// What triggered it.
    pub cause: TransitionCause,

    /// When it happened.
    #[serde(skip)]
    pub at: Instant,
}

impl LockTransition {
    /// Time elapsed since this transition.
    pub fn elapsed(&self) -> Duration {
        self.at.elapsed()
    }
}

/// Current lock state plus a bounded history of how it got there.
#[derive(Debug)]
pub struct LockStateMachine {
    state: LockState,
    entered_at: Instant,
    history: VecDeque<LockTransition>,
}

impl LockStateMachine {
    /// Create a machine starting in `initial`.
    pub fn new(initial: LockState) -> Self {
        Self {
            state: initial,
            entered_at: Instant::now(),
            history: VecDeque::with_capacity(MAX_TRANSITION_HISTORY),
        }
    }

    /// The current state.
    pub fn state(&self) -> LockState {
        self.state
    }

    /// Time spent in the current state.
    pub fn time_in_state(&self) -> Duration {
        self.entered_at.elapsed()
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<LockTransition> {
        &self.history
    }

    /// Most recent transition, if any.
    pub fn last_transition(&self) -> Option<&LockTransition> {
        self.history.back()
    }

    /// Move to `to`, recording the transition.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` if the machine is already in `to`.
    pub fn transition_to(&mut self, to: LockState, cause: TransitionCause) -> Result<LockTransition> {
        if self.state == to {
            return Err(Error::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }

        let now = Instant::now();
        let transition = LockTransition {
            from: self.state,
            to,
            cause,
            at: now,
        };

        self.state = to;
        self.entered_at = now;
        self.history.push_back(transition.clone());
        if self.history.len() > MAX_TRANSITION_HISTORY {
            self.history.pop_front();
        }

        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(LockState::Locked, LockState::Unlocked)]
    #[case(LockState::Unlocked, LockState::Locked)]
    fn test_valid_transitions(#[case] from: LockState, #[case] to: LockState) {
        let mut machine = LockStateMachine::new(from);
        let transition = machine.transition_to(to, TransitionCause::LockNow).unwrap();
        assert_eq!(transition.from, from);
        assert_eq!(transition.to, to);
        assert_eq!(machine.state(), to);
    }

    #[rstest]
    #[case(LockState::Locked)]
    #[case(LockState::Unlocked)]
    fn test_self_transition_rejected(#[case] state: LockState) {
        let mut machine = LockStateMachine::new(state);
        let err = machine
            .transition_to(state, TransitionCause::Credential)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
        assert!(machine.history().is_empty());
    }

    #[test]
    fn test_history_records_cause() {
        let mut machine = LockStateMachine::new(LockState::Locked);
        machine
            .transition_to(LockState::Unlocked, TransitionCause::Card)
            .unwrap();
        machine
            .transition_to(LockState::Locked, TransitionCause::RelockTimer)
            .unwrap();

        let causes: Vec<_> = machine.history().iter().map(|t| t.cause).collect();
        assert_eq!(causes, vec![TransitionCause::Card, TransitionCause::RelockTimer]);
        assert_eq!(
            machine.last_transition().map(|t| t.to),
            Some(LockState::Locked)
        );
    }

    #[test]
    fn test_history_is_bounded() {
        let mut machine = LockStateMachine::new(LockState::Locked);
        for _ in 0..(MAX_TRANSITION_HISTORY + 10) {
            let next = match machine.state() {
                LockState::Locked => LockState::Unlocked,
                LockState::Unlocked => LockState::Locked,
            };
            machine
                .transition_to(next, TransitionCause::HardwareTrigger)
                .unwrap();
        }
        assert_eq!(machine.history().len(), MAX_TRANSITION_HISTORY);
    }

    #[test]
    fn test_transition_serializes_without_timestamp() {
        let mut machine = LockStateMachine::new(LockState::Locked);
        let transition = machine
            .transition_to(LockState::Unlocked, TransitionCause::HardwareTrigger)
            .unwrap();
        let json = serde_json::to_string(&transition).unwrap();
        assert_eq!(
            json,
            r#"{"from":"locked","to":"unlocked","cause":"hardware_trigger"}"#
        );
    }
}
