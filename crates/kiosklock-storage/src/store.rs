//! Hot-reloading credential store.
//!
//! The store owns the current [`CredentialSet`] and the [`SourceToken`] of the
//! file it was parsed from. Every lookup first compares the file's current
//! token with the captured one (a single `metadata` call) and re-parses only
//! when they differ, so checking on every unlock attempt stays cheap.
//!
//! # Failure Semantics
//!
//! The store fails closed. A missing or unreadable source produces an empty
//! set and nothing unlocks; no error reaches the caller on the lookup path.
//!
//! # Examples
//!
//! ```no_run
//! use kiosklock_storage::CredentialStore;
//!
//! let mut store = CredentialStore::open("kiosklock_credentials.txt");
//!
//! // Picks up edits made while the process runs
//! store.reload_if_changed();
//! if store.contains("2580") {
//!     println!("unlock");
//! }
//! ```

use crate::credentials::{Credential, CredentialSet, SourceToken, parse_credentials};
use crate::error::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use kiosklock_core::constants::SAMPLE_CREDENTIALS;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Source of truth the lock controller consults on every unlock attempt.
///
/// Implementations may fail; the controller treats any error as "no match".
pub trait CredentialCheck {
    /// Look up `code`, returning the matching credential if it is authorized.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot answer. Callers must treat this
    /// as a mismatch, never as a match.
    fn check(&mut self, code: &str) -> StorageResult<Option<Credential>>;

    /// Number of codes currently authorized.
    fn credential_count(&self) -> usize;

    /// When the current credential generation was loaded, if known.
    fn loaded_at(&self) -> Option<DateTime<Utc>> {
        None
    }
}

/// Credential store backed by a line-oriented text file.
#[derive(Debug)]
pub struct CredentialStore {
    /// Path of the credential source.
    path: PathBuf,

    /// Current generation, shared cheaply with readers.
    current: Arc<CredentialSet>,

    /// Token captured at the last load (`None` if the source was missing).
    token: Option<SourceToken>,

    /// Number of times the source has been parsed.
    parse_count: u64,
}

impl CredentialStore {
    /// Create a store for `path` without touching the filesystem.
    ///
    /// The store starts with an empty set; call [`load`](Self::load) or
    /// [`reload_if_changed`](Self::reload_if_changed) to read the source.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: Arc::new(CredentialSet::empty()),
            token: None,
            parse_count: 0,
        }
    }

    /// Create a store, writing the sample source if it is missing, and load it.
    ///
    /// Failure to create the sample is logged and leaves the store empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut store = Self::new(path);
        if let Err(e) = store.ensure_source() {
            warn!(error = %e, "Could not create sample credential source");
        }
        store.load();
        store
    }

    /// Path of the credential source.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the sample credential source if the file does not exist.
    ///
    /// Returns `true` if the sample was written.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the parent directory or file cannot be created.
    pub fn ensure_source(&self) -> StorageResult<bool> {
        if self.path.exists() {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::io(parent.display().to_string(), e))?;
        }
        std::fs::write(&self.path, SAMPLE_CREDENTIALS)
            .map_err(|e| StorageError::io(self.path.display().to_string(), e))?;

        info!(path = %self.path.display(), "Created sample credential source");
        Ok(true)
    }

    /// Parse the source and replace the current set.
    ///
    /// A missing or unreadable source yields an empty set.
    pub fn load(&mut self) -> Arc<CredentialSet> {
        // Token first: an edit racing with the read shows up as stale next time.
        let token = Self::read_token(&self.path);
        self.parse_count += 1;

        let set = match std::fs::read_to_string(&self.path) {
            Ok(text) => {
                let parsed = parse_credentials(&text);
                if !parsed.skipped_lines.is_empty() {
                    warn!(
                        path = %self.path.display(),
                        lines = ?parsed.skipped_lines,
                        "Skipped malformed credential lines"
                    );
                }
                CredentialSet::from_entries(parsed.entries, token)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "Credential source missing, nothing will unlock");
                CredentialSet::empty()
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Credential source unreadable, nothing will unlock"
                );
                CredentialSet::from_entries(Default::default(), token)
            }
        };

        info!(
            path = %self.path.display(),
            count = set.len(),
            "Loaded credentials"
        );

        self.token = token;
        self.current = Arc::new(set);
        Arc::clone(&self.current)
    }

    /// Returns `true` if the source changed since the last load.
    ///
    /// This includes the source appearing after being missing and
    /// disappearing after being present.
    pub fn is_stale(&self) -> bool {
        Self::read_token(&self.path) != self.token
    }

    /// Reload the source only if it changed. Returns `true` if it was reloaded.
    pub fn reload_if_changed(&mut self) -> bool {
        if !self.is_stale() {
            return false;
        }
        debug!(path = %self.path.display(), "Credential source changed, reloading");
        self.load();
        true
    }

    /// Returns `true` if `code` or its uppercase form is in the current set.
    ///
    /// Does not check for staleness; see [`reload_if_changed`](Self::reload_if_changed).
    pub fn contains(&self, code: &str) -> bool {
        self.current.contains(code)
    }

    /// Label of `code` in the current set.
    pub fn label(&self, code: &str) -> Option<&str> {
        self.current.label(code)
    }

    /// The current credential generation.
    pub fn snapshot(&self) -> Arc<CredentialSet> {
        Arc::clone(&self.current)
    }

    /// How many times the source has been parsed since creation.
    pub fn parse_count(&self) -> u64 {
        self.parse_count
    }

    fn read_token(path: &Path) -> Option<SourceToken> {
        let metadata = std::fs::metadata(path).ok()?;
        let modified = metadata.modified().ok()?;
        Some(SourceToken {
            modified,
            len: metadata.len(),
        })
    }
}

impl CredentialCheck for CredentialStore {
    fn check(&mut self, code: &str) -> StorageResult<Option<Credential>> {
        self.reload_if_changed();
        Ok(self.current.get(code).cloned())
    }

    fn credential_count(&self) -> usize {
        self.current.len()
    }

    fn loaded_at(&self) -> Option<DateTime<Utc>> {
        Some(self.current.loaded_at())
    }
}

impl CredentialCheck for CredentialSet {
    fn check(&mut self, code: &str) -> StorageResult<Option<Credential>> {
        Ok(self.get(code).cloned())
    }

    fn credential_count(&self) -> usize {
        self.len()
    }

    fn loaded_at(&self) -> Option<DateTime<Utc>> {
        Some(CredentialSet::loaded_at(self))
    }
}
