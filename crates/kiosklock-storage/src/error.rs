use thiserror::Error;

/// Storage-specific error types for the kiosk lock.
///
/// The credential store itself never surfaces these to the lock controller
/// on the unlock path (an unreadable source fails closed), but they are
/// returned by explicit maintenance operations such as creating the sample
/// source, and by alternative [`CredentialCheck`](crate::CredentialCheck)
/// backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the credential source failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The credential backend cannot answer lookups right now
    #[error("Credential store unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Create an I/O error tagged with the path it occurred on.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an unavailable-backend error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let error = StorageError::io(
            "pins.txt",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(error.to_string(), "I/O error on pins.txt: denied");
    }

    #[test]
    fn test_unavailable_error_display() {
        let error = StorageError::unavailable("backend offline");
        assert!(matches!(error, StorageError::Unavailable(_)));
        assert_eq!(
            error.to_string(),
            "Credential store unavailable: backend offline"
        );
    }
}
