//! Lock controller crate for the kiosk display lock.
//!
//! This crate contains the lock state machine, the restartable relock
//! countdown, and the serialized dispatch loop that feeds them.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐
//! │ TriggerChannel │──┐
//! │ (thread)       │  │      ┌──────────────┐     ┌────────────────┐
//! └────────────────┘  ├─────►│  mpsc queue  │────►│ LockController │──► OverlayPresenter
//! ┌────────────────┐  │      └──────────────┘     └────────────────┘
//! │ Entry surface  │──┤             ▲                     │
//! └────────────────┘  │             │ RelockFired         │ arm / cancel
//!                     │      ┌──────┴─────────┐           │
//!                     └──────│ RelockScheduler│◄──────────┘
//!                            └────────────────┘
//! ```

pub mod controller;
pub mod entry;
pub mod events;
pub mod runtime;
pub mod scheduler;
pub mod state_machine;

pub use controller::{ControllerConfig, LockController, LockStatus, ServiceActivity};
pub use entry::EntryBuffer;
pub use events::{LockEvent, OverlayCommand, TransientError};
pub use runtime::{OverlayPresenter, run};
pub use scheduler::RelockScheduler;
pub use state_machine::{LockStateMachine, LockTransition, TransitionCause};
