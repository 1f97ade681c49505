//! Custom error types for appvault
//!
//! This module defines the error hierarchy for the application using thiserror
//! for ergonomic error definitions. Variants follow the failure classes of the
//! backup/restore pipeline: configuration problems are fatal before any
//! archiving starts, while selection, retention and remote-upload problems are
//! isolated to the file, archive or strategy they affect.

use thiserror::Error;

/// The main error type for appvault operations
#[derive(Error, Debug)]
pub enum VaultError {
    /// Configuration-related errors (malformed definitions, duplicate slugs)
    #[error("Configuration error: {0}")]
    Config(String),

    /// File selection errors while walking a directory root
    #[error("Selection error: {0}")]
    Selection(String),

    /// Failures writing a backup archive
    #[error("Archive error: {0}")]
    Archive(String),

    /// Failures deleting stale archives
    #[error("Retention error: {0}")]
    Retention(String),

    /// Failures uploading an archive to a remote backend
    #[error("Remote upload error: {0}")]
    RemoteUpload(String),

    /// Failures restoring from an archive
    #[error("Restore error: {0}")]
    Restore(String),

    /// Secret envelope encryption/decryption errors
    #[error("Secret error: {0}")]
    Secret(String),

    /// Failures running service stop/start hooks
    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    /// General file I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

impl VaultError {
    /// Check if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type alias for appvault operations
pub type VaultResult<T> = Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VaultError::Config("duplicate slug".into());
        assert_eq!(err.to_string(), "Configuration error: duplicate slug");
        assert!(err.is_config());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let vault_err: VaultError = io_err.into();
        assert!(matches!(vault_err, VaultError::Io(_)));
    }
}
