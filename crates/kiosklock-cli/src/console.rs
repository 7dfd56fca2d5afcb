//! Headless console surface: stdin commands in, log lines out.

use kiosklock_controller::{LockEvent, LockStatus, OverlayCommand, OverlayPresenter};
use kiosklock_core::TriggerEvent;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A console line that could not be understood
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("card command needs a UID")]
    MissingUid,

    #[error("service command needs 'open' or 'close'")]
    BadServiceAction,
}

/// Translate one console line into controller events.
///
/// Any other alphanumeric word (a PIN, a hex UID) is typed one character at
/// a time; an empty line submits.
pub fn parse_line(line: &str) -> Result<Vec<LockEvent>, CommandError> {
    let line = line.trim();
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(vec![LockEvent::Submit]);
    };

    let events = match command.to_ascii_lowercase().as_str() {
        "enter" => vec![LockEvent::Submit],
        "back" => vec![LockEvent::Backspace],
        "clear" => vec![LockEvent::Clear],
        "trigger" => vec![TriggerEvent::hardware().into()],
        "lock" => vec![LockEvent::LockNow],
        "status" => vec![LockEvent::StatusRequested],
        "card" => {
            let uid: Vec<&str> = words.collect();
            if uid.is_empty() {
                return Err(CommandError::MissingUid);
            }
            vec![TriggerEvent::card(uid.join(" ")).into()]
        }
        "service" => match words.next().map(str::to_ascii_lowercase).as_deref() {
            Some("open") => vec![LockEvent::ServiceOpened],
            Some("close") => vec![LockEvent::ServiceClosed],
            _ => return Err(CommandError::BadServiceAction),
        },
        _ if line.chars().all(|c| c.is_ascii_alphanumeric()) => {
            line.chars().map(LockEvent::ManualDigit).collect()
        }
        _ => return Err(CommandError::Unknown(line.to_string())),
    };

    Ok(events)
}

/// Read commands from stdin until EOF, posting them into the event queue.
pub async fn read_commands(events: mpsc::Sender<LockEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("Console input closed");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Console input failed");
                return;
            }
        };

        match parse_line(&line) {
            Ok(parsed) => {
                for event in parsed {
                    if events.send(event).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => warn!(error = %e, "Ignoring console input"),
        }
    }
}

/// Presenter that logs overlay commands instead of drawing them
#[derive(Debug, Default)]
pub struct ConsolePresenter {
    overlay_visible: Option<bool>,
}

impl ConsolePresenter {
    /// Whether the last command showed the overlay (`None` before the first).
    pub fn overlay_visible(&self) -> Option<bool> {
        self.overlay_visible
    }
}

impl OverlayPresenter for ConsolePresenter {
    fn present(&mut self, command: &OverlayCommand) {
        match command {
            OverlayCommand::ShowOverlay => {
                self.overlay_visible = Some(true);
                info!("Overlay shown");
            }
            OverlayCommand::HideOverlay => {
                self.overlay_visible = Some(false);
                info!("Overlay hidden");
            }
            OverlayCommand::ShowTransientError { error, duration } => {
                warn!(ms = duration.as_millis() as u64, "{error}");
            }
            OverlayCommand::EntryChanged { length } => {
                info!("Entry: {}", "*".repeat(*length));
            }
        }
    }

    fn report_status(&mut self, status: &LockStatus) {
        match serde_json::to_string(status) {
            Ok(json) => info!(status = %json, "Status"),
            Err(e) => warn!(error = %e, "Could not serialize status"),
        }
    }
}
