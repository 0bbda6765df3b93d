//! Error taxonomy for reconciliation and lifecycle operations.

use std::path::{Path, PathBuf};

use crate::catalog::Platform;

/// Errors produced by catalog loading, scanning and title transitions.
#[derive(Debug, thiserror::Error)]
pub enum GogError {
    #[error("failed to parse catalog {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("{what} does not exist: {}", path.display())]
    PathNotFound { what: &'static str, path: PathBuf },

    #[error("no current installer for {id} in the download directory")]
    MissingInstaller { id: String },

    #[error("{id}: installing {platform} titles is not implemented")]
    UnsupportedPlatform { id: String, platform: Platform },

    #[error("{0} is not in the catalog")]
    UnknownTitle(String),

    #[error("{0} is not installed")]
    NotInstalled(String),

    #[error("{id} is DLC of {parent}, use {parent} instead")]
    DependentTitle { id: String, parent: String },

    #[error("archive {} contains nothing under {subtree}", archive.display())]
    EmptyPayload {
        archive: PathBuf,
        subtree: &'static str,
    },

    #[error("cannot create staging directory in {}: {source}", path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GogError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GogError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error aborts the whole run rather than a single title.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GogError::Parse { .. } | GogError::PathNotFound { .. } | GogError::Staging { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GogError>;

/// Attach a path to `std::io::Error`s.
pub(crate) trait IoResultExt<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|e| GogError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let parse = GogError::Parse {
            path: PathBuf::from("gamedetails.json"),
            reason: "eof".into(),
        };
        let missing = GogError::PathNotFound {
            what: "download directory",
            path: PathBuf::from("/nope"),
        };
        assert!(parse.is_fatal());
        assert!(missing.is_fatal());
        let staging = GogError::Staging {
            path: PathBuf::from("/games/tis100"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(staging.is_fatal());
        assert!(!GogError::NotInstalled("tis100".into()).is_fatal());
        assert!(!GogError::MissingInstaller { id: "tis100".into() }.is_fatal());
    }

    #[test]
    fn test_io_context_message() {
        let err: Result<()> = Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied))
            .at(Path::new("/games/tis100"));
        let msg = err.unwrap_err().to_string();
        assert!(msg.contains("/games/tis100"));
    }
}
