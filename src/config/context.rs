//! Invocation context
//!
//! A `VaultContext` carries the resolved application identity and directory
//! roots through every component. It is passed explicitly rather than held in
//! any process-wide state, so tests and embedding callers can point the whole
//! pipeline at arbitrary directories.

use std::path::PathBuf;

use crate::config::definitions::slugify;
use crate::config::settings::Settings;
use crate::error::{VaultError, VaultResult};

/// Resolved context for one `backup`/`restore` invocation
#[derive(Debug, Clone)]
pub struct VaultContext {
    /// Application display name
    pub app_name: String,
    /// Application version recorded on new archives
    pub app_version: String,
    /// Root of the live configuration tree
    pub conf_dir: PathBuf,
    /// Root of the live data tree
    pub data_dir: PathBuf,
    /// Flat directory holding archive files
    pub backup_dir: PathBuf,
    /// Key file for secret envelopes, if configured
    pub key_file: Option<PathBuf>,
}

impl VaultContext {
    /// Build a context from loaded settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            app_name: settings.application.name.clone(),
            app_version: settings.application.version.clone(),
            conf_dir: settings.directories.conf_dir.clone(),
            data_dir: settings.directories.data_dir.clone(),
            backup_dir: settings.directories.backup_dir.clone(),
            key_file: settings.key_file.clone(),
        }
    }

    /// The slugified application name used in archive filenames
    pub fn app_slug(&self) -> String {
        slugify(&self.app_name)
    }

    /// Create the backup directory if it does not exist yet.
    pub fn ensure_backup_dir(&self) -> VaultResult<()> {
        std::fs::create_dir_all(&self.backup_dir).map_err(|e| {
            VaultError::Archive(format!(
                "Failed to create backup directory {}: {}",
                self.backup_dir.display(),
                e
            ))
        })
    }
}

/// Context rooted in a temporary directory, shared by tests across the crate
#[cfg(test)]
pub(crate) fn test_context(base: &std::path::Path) -> VaultContext {
    VaultContext {
        app_name: "Test App".to_string(),
        app_version: "1.0".to_string(),
        conf_dir: base.join("conf"),
        data_dir: base.join("data"),
        backup_dir: base.join("backup"),
        key_file: None,
    }
}
