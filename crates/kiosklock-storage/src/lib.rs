//! Credential storage for the kiosk lock.
//!
//! This crate loads the set of codes allowed to unlock the display from a
//! line-oriented text file and keeps it current while the process runs.
//!
//! # Components
//!
//! - [`CredentialStore`] - file-backed store with cheap staleness checks and hot-reload
//! - [`CredentialSet`] - one immutable generation of credentials
//! - [`CredentialCheck`] - the lookup seam the lock controller depends on
//! - [`parse_credentials`] - the source format parser
//!
//! # Examples
//!
//! ```no_run
//! use kiosklock_storage::{CredentialCheck, CredentialStore};
//!
//! let mut store = CredentialStore::open("kiosklock_credentials.txt");
//!
//! match store.check("2580") {
//!     Ok(Some(credential)) => println!("welcome {:?}", credential.label),
//!     Ok(None) => println!("invalid code"),
//!     Err(e) => println!("store unavailable: {e}"),
//! }
//! ```

pub mod credentials;
pub mod error;
pub mod store;

pub use credentials::{Credential, CredentialSet, ParsedCredentials, SourceToken, parse_credentials};
pub use error::{StorageError, StorageResult};
pub use store::{CredentialCheck, CredentialStore};
