//! Integration tests for the controller against a file-backed credential store.
//!
//! Run with: cargo test --package kiosklock-controller --test credential_reload

use kiosklock_controller::{ControllerConfig, LockController, LockEvent, OverlayCommand};
use kiosklock_core::{LockState, TriggerEvent};
use kiosklock_storage::{CredentialCheck, CredentialStore};
use tempfile::TempDir;
use tokio::sync::mpsc;

fn submit<C: CredentialCheck>(controller: &mut LockController<C>, code: &str) -> Vec<OverlayCommand> {
    for ch in code.chars() {
        controller.dispatch(LockEvent::ManualDigit(ch));
    }
    controller.dispatch(LockEvent::Submit)
}

#[tokio::test]
async fn test_code_added_on_disk_unlocks_without_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.txt");
    std::fs::write(&path, "1111: Front desk\n").unwrap();

    let (tx, _rx) = mpsc::channel(8);
    let mut controller = LockController::new(
        ControllerConfig::default(),
        CredentialStore::open(&path),
        tx,
    );

    // Not yet authorized
    submit(&mut controller, "4242");
    assert_eq!(controller.state(), LockState::Locked);

    std::fs::write(&path, "1111: Front desk\n4242: Night shift\n").unwrap();

    let commands = submit(&mut controller, "4242");
    assert!(commands.contains(&OverlayCommand::HideOverlay));
    assert_eq!(controller.state(), LockState::Unlocked);
    assert_eq!(controller.store().credential_count(), 2);
}

#[tokio::test]
async fn test_code_removed_on_disk_stops_unlocking() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.txt");
    std::fs::write(&path, "1111\n2222\n").unwrap();

    let (tx, _rx) = mpsc::channel(8);
    let mut controller =
        LockController::new(ControllerConfig::default(), CredentialStore::open(&path), tx);

    std::fs::write(&path, "1111\n").unwrap();
    submit(&mut controller, "2222");

    assert_eq!(controller.state(), LockState::Locked);
}

#[tokio::test]
async fn test_missing_source_gets_sample_codes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.txt");

    let (tx, _rx) = mpsc::channel(8);
    let mut controller =
        LockController::new(ControllerConfig::default(), CredentialStore::open(&path), tx);

    assert!(path.exists());
    submit(&mut controller, "2580");
    assert_eq!(controller.state(), LockState::Unlocked);
}

#[tokio::test]
async fn test_deleted_source_fails_closed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.txt");
    std::fs::write(&path, "04A2B3C4: Badge\n").unwrap();

    let (tx, _rx) = mpsc::channel(8);
    let mut controller =
        LockController::new(ControllerConfig::default(), CredentialStore::open(&path), tx);

    std::fs::remove_file(&path).unwrap();
    controller.dispatch(TriggerEvent::card("04a2b3c4").into());

    assert_eq!(controller.state(), LockState::Locked);
    assert_eq!(controller.store().credential_count(), 0);
}
