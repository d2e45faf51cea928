use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = TrawlError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum TrawlError {
    // Traversal
    #[error("permission denied")]
    PermissionDenied(PathBuf),

    #[error("path not found")]
    NotFound(PathBuf),

    #[error("path already exists")]
    AlreadyExists(PathBuf),

    #[error("path is not valid UTF-8")]
    NonUtf8Path(PathBuf),

    #[error("invalid source")]
    InvalidSource(PathBuf),

    // Config
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid ignore file")]
    Ignore(#[from] ignore::Error),

    // Runtime
    #[error("IO error")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TrawlError {
    /// Wrap an I/O failure at `path`, folding the common kinds into their
    /// dedicated variants.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match source.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            io::ErrorKind::NotFound => Self::NotFound(path),
            io::ErrorKind::AlreadyExists => Self::AlreadyExists(path),
            _ => Self::Io { path, source },
        }
    }

    /// The path this error occurred at, if applicable.
    /// Callers use this to present "Skipped: <path>" without pattern matching on variants.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::PermissionDenied(p)
            | Self::NotFound(p)
            | Self::AlreadyExists(p)
            | Self::NonUtf8Path(p)
            | Self::InvalidSource(p)
            | Self::Io { path: p, .. } => Some(p),
            _ => None,
        }
    }

    /// Whether the run can continue after this error.
    ///
    /// Recoverable errors are per-entry failures (access denied, entry vanished,
    /// target already present, I/O). The walker yields them as `Err` items and
    /// the sync engine and entry operations turn them into progress events.
    ///
    /// Everything else (invalid source, bad pattern, bad configuration) is
    /// fatal and aborts the run before or during traversal.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied(_)
                | Self::NotFound(_)
                | Self::AlreadyExists(_)
                | Self::NonUtf8Path(_)
                | Self::Io { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_folds_well_known_kinds() {
        let err = TrawlError::io("/x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, TrawlError::PermissionDenied(_)));
        assert_eq!(err.path(), Some(Path::new("/x")));

        let err = TrawlError::io("/y", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, TrawlError::NotFound(_)));

        let err = TrawlError::io("/z", io::Error::new(io::ErrorKind::Other, "boom"));
        assert!(matches!(err, TrawlError::Io { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn configuration_errors_are_fatal() {
        assert!(!TrawlError::InvalidConfig("x".into()).is_recoverable());
        assert!(!TrawlError::InvalidSource("/nope".into()).is_recoverable());
        assert!(TrawlError::InvalidPattern("(".into()).path().is_none());
    }
}
