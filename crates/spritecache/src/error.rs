//! Error types for spritecache

use std::fmt;
use std::io;
use std::sync::Arc;

/// Result type alias for spritecache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for fetch and cache operations
///
/// A single resolution failure is delivered to every waiter of a key, so the
/// error is cheap to clone.
#[derive(Debug, Clone)]
pub enum Error {
    /// Cache keys must not be empty
    EmptyKey,

    /// No resource exists for the key
    NotFound(String),

    /// I/O error while resolving a key
    Io(Arc<io::Error>),

    /// Fetched bytes are not a recognized image
    Decode(String),

    /// Key cannot be mapped to a storage location
    InvalidPath(String),

    /// Resolution ended without producing a result
    Aborted(String),

    /// No async runtime available to dispatch fetches
    NoRuntime,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyKey => write!(f, "Cache key must not be empty"),
            Error::NotFound(key) => write!(f, "Asset not found: {}", key),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Decode(msg) => write!(f, "Decode error: {}", msg),
            Error::InvalidPath(msg) => write!(f, "Invalid asset path: {}", msg),
            Error::Aborted(key) => write!(f, "Fetch aborted before completion: {}", key),
            Error::NoRuntime => write!(f, "No tokio runtime available"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_is_shared_between_clones() {
        let err: Error = io::Error::new(io::ErrorKind::ConnectionReset, "reset").into();
        let clone = err.clone();

        match (&err, &clone) {
            (Error::Io(a), Error::Io(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("expected Io errors"),
        }
        assert!(std::error::Error::source(&clone).is_some());
    }

    #[test]
    fn test_display_names_the_key() {
        assert_eq!(Error::NotFound("img/1".into()).to_string(), "Asset not found: img/1");
        assert!(Error::Aborted("img/2".into()).to_string().ends_with("img/2"));
    }
}
