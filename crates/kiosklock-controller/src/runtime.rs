//! Serialized dispatch loop.
//!
//! All event sources (trigger channel thread, relock timer, entry surface)
//! post into one `mpsc` queue. This loop is its single consumer: it hands
//! each event to the controller in arrival order and forwards the resulting
//! commands to the presenter, so the controller is never entered from two
//! contexts at once.

use std::future::Future;

use kiosklock_storage::CredentialCheck;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::controller::{LockController, LockStatus};
use crate::events::{LockEvent, OverlayCommand};

/// Presentation layer fed by the dispatch loop.
///
/// Implementations render (or, headless, log) the overlay. They must not
/// block: the loop calls them inline.
pub trait OverlayPresenter {
    /// Apply one command.
    fn present(&mut self, command: &OverlayCommand);

    /// Report a status snapshot requested through [`LockEvent::StatusRequested`].
    fn report_status(&mut self, status: &LockStatus) {
        let _ = status;
    }
}

/// Records commands in order. Handy for tests and dry runs.
impl OverlayPresenter for Vec<OverlayCommand> {
    fn present(&mut self, command: &OverlayCommand) {
        self.push(command.clone());
    }
}

/// Run the dispatch loop until `shutdown` completes or every sender is gone.
///
/// The presenter first receives the overlay command matching the initial
/// state. On exit the pending relock deadline is cancelled.
pub async fn run<C, P, F>(
    controller: &mut LockController<C>,
    events: &mut mpsc::Receiver<LockEvent>,
    presenter: &mut P,
    shutdown: F,
) where
    C: CredentialCheck,
    P: OverlayPresenter,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    presenter.present(&controller.overlay());
    info!(state = %controller.state(), "Dispatch loop running");

    loop {
        let event = tokio::select! {
            biased;
            () = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
            event = events.recv() => match event {
                Some(event) => event,
                None => {
                    debug!("Event queue closed");
                    break;
                }
            },
        };

        if event == LockEvent::StatusRequested {
            presenter.report_status(&controller.status());
            continue;
        }

        for command in controller.dispatch(event) {
            presenter.present(&command);
        }
    }

    controller.shutdown();
    info!(state = %controller.state(), "Dispatch loop stopped");
}
